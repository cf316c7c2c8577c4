pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "depot")]
#[command(about = "Upload, organize and serve files from a local storage root")]
#[command(version)]
pub struct Args {
    /// Daemon URL (defaults to localhost on the configured api_port)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the depot config directory (defaults to ~/.depot)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Bearer token for authenticated routes (defaults to the configured api_token)
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
