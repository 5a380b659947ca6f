//! Service-supervision boundary call.
//!
//! Systemd readiness notification is out of scope beyond this single call
//! (§1 non-goals): after the agent starts, send the datagram `READY=1` to
//! the UNIX socket `/run/systemd/notify` when `--notify-systemd` was passed.

use std::os::unix::net::UnixDatagram;
use std::path::Path;

pub const SYSTEMD_SOCKET: &str = "/run/systemd/notify";
pub const SYSTEMD_NOTIFY_MESSAGE: &[u8] = b"READY=1";

/// Sends the systemd readiness datagram to `socket_path`. A no-op (returns
/// `Ok(())`) when `enabled` is false, matching the source's own
/// "disabled" branch rather than treating it as an error.
pub fn notify(enabled: bool, socket_path: &Path) -> std::io::Result<()> {
    if !enabled {
        return Ok(());
    }
    let socket = UnixDatagram::unbound()?;
    socket.connect(socket_path)?;
    socket.send(SYSTEMD_NOTIFY_MESSAGE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixDatagram as ListenerSocket;

    #[test]
    fn disabled_is_a_noop() {
        assert!(notify(false, Path::new("/nonexistent/socket")).is_ok());
    }

    #[test]
    fn enabled_sends_ready_datagram() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("notify.sock");
        let listener = ListenerSocket::bind(&socket_path).unwrap();

        notify(true, &socket_path).unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = listener.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], SYSTEMD_NOTIFY_MESSAGE);
    }
}
