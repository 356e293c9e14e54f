use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "encodebox")]
#[command(author, version, about = "Assemble stored audio, video and image assets into one mp4")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP front door
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config and APP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one request locally against a directory of assets
    Encode {
        /// Request file (JSON)
        #[arg(required = true)]
        request: PathBuf,

        /// Where to write the result (defaults to <jobId>.mp4 in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory holding the asset keys (defaults to the request's directory)
        #[arg(long)]
        store_root: Option<PathBuf>,
    },

    /// Print the encoder invocation a request would use, without running it
    Graph {
        /// Request file (JSON)
        #[arg(required = true)]
        request: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
