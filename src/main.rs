//! Process entrypoint: parses the CLI, loads and validates configuration,
//! wires the Killswitch/Scheduler/Channel/Adapter, spawns the Agent and
//! Exporter, and waits for a clean shutdown.

use std::io::IsTerminal;
use std::path::PathBuf;

use sentrymon::agent::Agent;
use sentrymon::channel;
use sentrymon::cli::{Cli, Command, StartArgs};
use sentrymon::config::{self, MonitorConfig};
use sentrymon::exporter::Exporter;
use sentrymon::killswitch::Killswitch;
use sentrymon::logging::{Level, MonitorLogger};
use sentrymon::probe::ProbeClient;
use sentrymon::scheduler::PriorityScheduler;
use sentrymon::store::postgres::PostgresAdapter;
use sentrymon::systemd;

const COMPONENT: &str = "main";

fn log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".monitoring").join("logs"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    match cli.command {
        Command::Config => {
            eprintln!(
                "config management (create/show/add/remove/update service) is not supported by this build"
            );
            std::process::exit(1);
        }
        Command::Start(args) => {
            let code = run(args).await;
            std::process::exit(code);
        }
    }
}

async fn run(args: StartArgs) -> i32 {
    let logger = match MonitorLogger::new(Level::from_verbosity(args.verbosity), log_dir().as_deref()) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("{COMPONENT}: ERROR failed to initialize logger: {e}");
            return 1;
        }
    };

    let cfg: MonitorConfig = match config::load(
        &args.config,
        args.export_batch_size,
        args.export_interval,
        args.notify_systemd,
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            logger.error(COMPONENT, &format!("startup configuration invalid: {e}"));
            return 1;
        }
    };

    let workload = config::estimate_workload(&cfg.services);
    logger.warning(
        COMPONENT,
        &format!(
            "{} services configured, estimated {:.2} probes/sec",
            cfg.services.len(),
            workload
        ),
    );
    if cfg.services.len() > config::MAX_SERVICES_PER_WORKER {
        logger.warning(
            COMPONENT,
            &format!(
                "service count {} exceeds the advisory limit of {} per worker",
                cfg.services.len(),
                config::MAX_SERVICES_PER_WORKER
            ),
        );
    }

    if !args.yes && std::io::stdin().is_terminal() {
        println!(
            "About to start monitoring {} service(s) from {}, estimated {:.2} probes/sec.",
            cfg.services.len(),
            args.config.display(),
            workload
        );
        print!("Continue? [y/N] ");
        use std::io::Write;
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err()
            || !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
        {
            println!("Aborted.");
            return 1;
        }
    }

    let killswitch = Killswitch::new();

    let signal_killswitch = killswitch.clone();
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => return,
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        signal_killswitch.engage();
    });

    let scheduler = PriorityScheduler::new(cfg.services.clone());
    let (sender, receiver) = channel::bounded(cfg.services.len());
    let probe_client = ProbeClient::new();

    let agent = Agent::new(scheduler, sender, probe_client, killswitch.clone(), logger.clone());
    let agent_handle = tokio::spawn(agent.run());

    systemd::notify(cfg.notify_systemd, std::path::Path::new(systemd::SYSTEMD_SOCKET))
        .unwrap_or_else(|e| logger.warning(COMPONENT, &format!("systemd notify failed: {e}")));

    let adapter = PostgresAdapter::new(cfg.database_uri);
    let exporter = Exporter::new(
        adapter,
        receiver,
        killswitch.clone(),
        cfg.export_batch_size,
        cfg.export_interval,
        logger.clone(),
    );
    let exporter_handle = tokio::spawn(exporter.run());

    let _ = agent_handle.await;
    let clean = exporter_handle.await.unwrap_or(false);

    if clean {
        logger.info(COMPONENT, "shutdown complete");
        0
    } else {
        logger.error(COMPONENT, "exporter terminated fatally");
        1
    }
}
