use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use mailbot::{Config, Daemon, Error};

/// Watch an IMAP mailbox and log newly arrived messages.
#[derive(Debug, Parser)]
#[command(name = "mailbotd", version)]
struct Args {
    /// Path to a configuration file; MAILBOT_* environment variables
    /// override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut daemon = Daemon::new(config);
    daemon.register_handler(|message| {
        let from = message
            .from
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        info!(
            "new message seq {} from {} subject {:?} ({} text segments, {} parts)",
            message.seq,
            from,
            message.subject,
            message.texts.len(),
            message.parts.len()
        );
    });

    let shutdown = daemon.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.trigger();
        }
    });

    match daemon.serve().await {
        Err(Error::Interrupted) => {
            info!("interrupted, shutting down");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("daemon terminated: {}", err);
            ExitCode::FAILURE
        }
        Ok(()) => ExitCode::SUCCESS,
    }
}
