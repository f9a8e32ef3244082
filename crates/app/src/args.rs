pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flatsync")]
#[command(about = "Flat-storage datasources kept coherent with a node index")]
pub struct Args {
    /// Path to the flatsync state directory (defaults to ~/.flatsync)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
