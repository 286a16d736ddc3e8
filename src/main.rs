use std::{path::PathBuf, time::Instant};

use anyhow::{Result, anyhow};
use obs_show_sync::{
    config::Config,
    dispatch::TickOutcome,
    obs::ObsConnector,
    session::Session,
    signal,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Clone)]
struct Cli {
    once: bool,
    queue: Option<PathBuf>,
    obs_address: Option<String>,
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--once" => {
                cli.once = true;
                i += 1;
            }
            "--queue" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --queue"));
                };
                cli.queue = Some(PathBuf::from(v));
                i += 2;
            }
            "--obs-address" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --obs-address"));
                };
                cli.obs_address = Some(v.clone());
                i += 2;
            }
            other => {
                return Err(anyhow!(
                    "unknown argument: {other} (supported: --once, --queue <run_of_show.json>, --obs-address <host:port>)"
                ));
            }
        }
    }
    Ok(cli)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;
    init_tracing();

    let mut config = Config::from_env()?;
    if let Some(queue) = cli.queue {
        config.queue_path = queue;
    }
    if let Some(address) = cli.obs_address {
        config.obs_address = address;
    }

    let connector = ObsConnector {
        connect_timeout: config.connect_timeout,
        io_timeout: config.call_timeout,
    };
    let mut session = Session::new(&config, connector);

    if cli.once {
        match session.run_once(Instant::now()) {
            Some(TickOutcome::Dispatched(report)) => {
                println!("dispatched {}", report.id);
            }
            Some(outcome) => println!("nothing dispatched: {outcome:?}"),
            None => println!("nothing dispatched: queue unreadable"),
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    // Held so a failed signal listener cannot close the channel and end the loop.
    let _shutdown_guard = shutdown_tx.clone();
    signal::spawn_shutdown_listener(shutdown_tx)?;

    session.run(&shutdown_rx);
    Ok(())
}
