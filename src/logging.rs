//! Rotating file logger.
//!
//! The core's own error-handling section asks for plain leveled log lines
//! consumed by an operator ("WARNING or ERROR with the originating
//! component name"), not structured spans, so this keeps the shape of the
//! donor's own dependency-free rotating logger rather than reaching for a
//! tracing subscriber: a size-rotated, gzip-archived file plus an always-on
//! stderr mirror, writing `component: LEVEL message` text lines.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use fs2::FileExt;

const LOG_ROTATION_SIZE_BYTES: u64 = 8 * 1024 * 1024;
const MAX_ARCHIVES: usize = 5;
const ROTATION_CHECK_INTERVAL: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warning,
    Info,
    Debug,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }

    /// Verbosity from repeated `-v` flags, additive with `RUST_LOG`.
    pub fn from_verbosity(v: u8) -> Self {
        match v {
            0 => Level::Warning,
            1 => Level::Info,
            _ => Level::Debug,
        }
    }
}

/// Leveled logger writing to stderr always, and to a rotating file when a
/// log directory is configured. Cheap to clone (an `Arc` around the shared
/// sink), so the agent and exporter tasks each hold their own handle onto
/// the same rotating file.
#[derive(Clone)]
pub struct MonitorLogger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    min_level: Level,
    file: Option<Mutex<RotatingFile>>,
}

struct RotatingFile {
    path: PathBuf,
    write_count: AtomicU32,
}

impl MonitorLogger {
    /// `log_dir = None` disables the file sink; only stderr is written.
    pub fn new(min_level: Level, log_dir: Option<&Path>) -> std::io::Result<Self> {
        let file = match log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Some(Mutex::new(RotatingFile {
                    path: dir.join("monitoring.log"),
                    write_count: AtomicU32::new(0),
                }))
            }
            None => None,
        };
        Ok(Self {
            inner: Arc::new(LoggerInner { min_level, file }),
        })
    }

    pub fn log(&self, component: &str, level: Level, message: &str) {
        if level > self.inner.min_level {
            return;
        }
        let timestamp = Utc::now().to_rfc3339();
        let line = format!("{timestamp} {component}: {} {message}", level.as_str());

        eprintln!("{line}");

        if let Some(file) = &self.inner.file {
            let file = file.lock().unwrap();
            let _ = file.write_with_rotation(&line);
        }
    }

    pub fn error(&self, component: &str, message: &str) {
        self.log(component, Level::Error, message);
    }

    pub fn warning(&self, component: &str, message: &str) {
        self.log(component, Level::Warning, message);
    }

    pub fn info(&self, component: &str, message: &str) {
        self.log(component, Level::Info, message);
    }
}

impl RotatingFile {
    fn write_with_rotation(&self, line: &str) -> std::io::Result<()> {
        if self.write_count.fetch_add(1, Ordering::Relaxed) % ROTATION_CHECK_INTERVAL == 0 {
            let _ = self.rotate_if_needed();
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }

    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.needs_rotation()? {
            return Ok(());
        }

        let lock_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {
                if self.needs_rotation()? {
                    self.perform_rotation()?;
                }
                let _ = std::fs::remove_file(&lock_path);
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }

    fn needs_rotation(&self) -> std::io::Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        Ok(std::fs::metadata(&self.path)?.len() >= LOG_ROTATION_SIZE_BYTES)
    }

    fn perform_rotation(&self) -> std::io::Result<()> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = self.path.file_name().unwrap().to_str().unwrap();
        let archive_name = format!("{filename}.{timestamp}.gz");
        let archive_path = self.path.parent().unwrap().join(archive_name);

        let temp_path = self.path.with_extension("rotating");
        std::fs::rename(&self.path, &temp_path)?;

        let source_file = File::open(&temp_path)?;
        let target_file = File::create(&archive_path)?;
        let mut encoder = GzEncoder::new(target_file, Compression::default());
        std::io::copy(&mut BufReader::new(source_file), &mut encoder)?;
        encoder.finish()?;
        std::fs::remove_file(&temp_path)?;

        self.prune_archives()
    }

    fn prune_archives(&self) -> std::io::Result<()> {
        let dir = self.path.parent().unwrap();
        let filename = self.path.file_name().unwrap().to_str().unwrap();
        let mut archives: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|n| n.starts_with(filename) && n.ends_with(".gz"))
                    .unwrap_or(false)
            })
            .collect();

        if archives.len() <= MAX_ARCHIVES {
            return Ok(());
        }

        archives.sort_by_key(|e| e.file_name());
        for old in archives.iter().take(archives.len() - MAX_ARCHIVES) {
            let _ = std::fs::remove_file(old.path());
        }
        Ok(())
    }
}
