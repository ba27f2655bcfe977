//! Duocast CLI: capture screen and webcam, composite them, and edit clips.
//!
//! Usage:
//!   duocast check                  Check ffmpeg and capture prerequisites
//!   duocast devices                List cameras and microphones
//!   duocast record [OPTIONS]       Record until Ctrl+C or --duration
//!   duocast start / stop / status  Drive a capture across invocations
//!   duocast composite              Merge the captures into one video
//!   duocast trim <SRC> <OUT>       Cut a clip

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(
    name = "duocast",
    about = "Screen and webcam recording with a circular picture-in-picture composite",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check ffmpeg, platform capture prerequisites and the encoder
    Check,

    /// Print the effective configuration
    Config {
        /// Write it to the config file, filling in defaults
        #[arg(long)]
        save: bool,
    },

    /// List video and audio capture devices
    Devices {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List windows that can be recorded
    Windows,

    /// Probe and print the H.264 encoder in use
    Encoder,

    /// Record until Ctrl+C (or for a fixed duration), then stop
    Record {
        #[command(flatten)]
        source: commands::record::SourceArgs,

        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Composite the captures after stopping
        #[arg(long)]
        composite: bool,
    },

    /// Start a capture in the background and return
    Start {
        #[command(flatten)]
        source: commands::record::SourceArgs,
    },

    /// Stop the background capture and validate its output
    Stop,

    /// Show the current capture session
    Status {
        /// Print the raw session record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop any capture and delete all session files
    Reset,

    /// Composite screen and webcam captures into one video
    Composite {
        /// Screen capture (defaults to the last session's)
        #[arg(long)]
        screen: Option<PathBuf>,

        /// Webcam capture (defaults to the last session's)
        #[arg(long)]
        webcam: Option<PathBuf>,

        /// Output file (defaults to the session's composite.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Outer diameter of the webcam circle
        #[arg(long)]
        webcam_size: Option<u32>,

        /// Maximum output width
        #[arg(long)]
        max_width: Option<u32>,
    },

    /// Show media metadata
    Probe {
        path: PathBuf,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Extract a thumbnail strip
    Thumbnails {
        path: PathBuf,

        /// Output directory (defaults to the data directory's thumbnails/)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Seconds between thumbnails
        #[arg(long)]
        interval: Option<u32>,

        /// Thumbnail width
        #[arg(long)]
        width: Option<u32>,
    },

    /// Extract one frame
    Thumbnail {
        path: PathBuf,

        /// Offset in seconds
        #[arg(long)]
        at: f64,

        /// Output image
        #[arg(short, long)]
        output: PathBuf,

        /// Frame width
        #[arg(long)]
        width: Option<u32>,
    },

    /// Cut a clip
    Trim(commands::trim::TrimArgs),

    /// Join clips that share codecs and resolution
    Concat {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Clips, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = Context::load()?;

    let mut logging = ctx.config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    duocast_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Check => commands::check::run(&ctx),
        Commands::Config { save } => commands::check::config(&ctx, save),
        Commands::Devices { json } => commands::devices::devices(&ctx, json),
        Commands::Windows => commands::devices::windows(&ctx),
        Commands::Encoder => commands::check::encoder(&ctx),
        Commands::Record {
            source,
            duration,
            composite,
        } => commands::record::run(ctx, source, duration, composite).await,
        Commands::Start { source } => commands::session::start(&ctx, source),
        Commands::Stop => commands::session::stop(&ctx),
        Commands::Status { json } => commands::session::status(&ctx, json),
        Commands::Reset => commands::session::reset(&ctx),
        Commands::Composite {
            screen,
            webcam,
            output,
            webcam_size,
            max_width,
        } => commands::composite::run(&ctx, screen, webcam, output, webcam_size, max_width),
        Commands::Probe { path, json } => commands::probe::run(&ctx, path, json),
        Commands::Thumbnails {
            path,
            dir,
            interval,
            width,
        } => commands::thumbnails::strip(&ctx, path, dir, interval, width),
        Commands::Thumbnail {
            path,
            at,
            output,
            width,
        } => commands::thumbnails::single(&ctx, path, at, output, width),
        Commands::Trim(args) => commands::trim::run(&ctx, args),
        Commands::Concat { output, inputs } => commands::trim::concat(&ctx, inputs, output),
    }
}
