mod args;
mod op;
mod ops;
mod runtime;
mod state;

use std::str::FromStr;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Cat, Cp, Init, Mkdir, Put, Rm, Stat, Version};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use state::AppState;

command_enum! {
    (Init, Init),
    (Mkdir, Mkdir),
    (Put, Put),
    (Cat, Cat),
    (Cp, Cp),
    (Rm, Rm),
    (Stat, Stat),
    (Version, Version),
}

/// Log to stderr so that command output on stdout stays clean.
/// The returned guard flushes pending lines when dropped.
fn init_logging(args: &Args) -> tracing_appender::non_blocking::WorkerGuard {
    // before `init` there is no config to read a level from
    let level = AppState::load(args.config_path.clone())
        .ok()
        .and_then(|state| Level::from_str(&state.config.log_level).ok())
        .unwrap_or(Level::INFO);

    let (stderr_writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stderr_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();
    guard
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let guard = init_logging(&args);

    let ctx = op::OpContext::new(args.config_path.clone());
    let result = args.command.execute(&ctx).await;
    drop(guard);

    match result {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
