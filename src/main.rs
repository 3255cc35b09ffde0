// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use scanner::backends::camera::still_image::StillImageBackend;
use scanner::backends::camera::v4l2::V4l2Backend;
use scanner::backends::camera::{CameraBackend, CameraFacing, Size};
use scanner::config::ScanOptions;
use scanner::constants::app_info;
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod cli;

#[derive(Parser)]
#[command(name = "scanner")]
#[command(about = "Scan QR codes from a camera")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Decode a QR code from an image file
    Decode {
        /// Image to decode
        image: PathBuf,

        /// Character set for the payload bytes (UTF-8, ISO-8859-1)
        #[arg(long)]
        charset: Option<String>,
    },

    /// Scan from a camera (default)
    Scan(ScanArgs),
}

#[derive(Args, Default)]
struct ScanArgs {
    /// Camera index to use (from 'scanner list')
    #[arg(short, long)]
    camera: Option<usize>,

    /// Prefer a front-facing camera
    #[arg(long)]
    front: bool,

    /// Requested capture resolution, e.g. 1280x720
    #[arg(long, value_name = "WxH")]
    capture: Option<Size>,

    /// Framing rectangle size in screen pixels, e.g. 200x120
    #[arg(long, value_name = "WxH")]
    frame: Option<Size>,

    /// Character set for the payload bytes (UTF-8, ISO-8859-1)
    #[arg(long)]
    charset: Option<String>,

    /// Keep scanning after each result
    #[arg(long)]
    continuous: bool,

    /// Scan an image file through the live pipeline instead of a camera
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Print results without drawing a preview
    #[arg(long)]
    headless: bool,

    /// Give up after this many seconds (headless only)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Do not ring the terminal bell on results
    #[arg(long)]
    quiet: bool,

    /// Save the decoded frame as PNG into this directory
    #[arg(long, value_name = "DIR")]
    save_frame: Option<PathBuf>,

    /// Options file (default: ~/.config/scanner/options.json)
    #[arg(long, value_name = "PATH")]
    options: Option<PathBuf>,
}

impl ScanArgs {
    /// Options file overlaid with command line flags
    fn options(&self) -> Result<ScanOptions, Box<dyn std::error::Error>> {
        let mut options = match &self.options {
            Some(path) => ScanOptions::load_from(path)?,
            None => ScanOptions::load(),
        };
        if let Some(index) = self.camera {
            options.camera.index = Some(index);
        }
        if self.front {
            options.camera.facing = Some(CameraFacing::Front);
        }
        if self.capture.is_some() {
            options.capture_size = self.capture;
        }
        if self.frame.is_some() {
            options.frame_size = self.frame;
        }
        if self.charset.is_some() {
            options.character_set = self.charset.clone();
        }
        if self.continuous {
            options.continuous = true;
        }
        if self.save_frame.is_some() {
            options.keep_snapshot = true;
        }
        if self.quiet {
            options.beep_on_result = false;
        }
        Ok(options)
    }

    fn backend(&self) -> Arc<dyn CameraBackend> {
        match &self.image {
            Some(path) => Arc::new(StillImageBackend::new(path)),
            None => Arc::new(V4l2Backend::new()),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Scan(ScanArgs::default()));

    // The terminal host owns the screen, so its logs go to a file
    let interactive = matches!(&command, Commands::Scan(args) if !args.headless);
    init_logging(interactive);

    match command {
        Commands::List => cli::list_cameras(),
        Commands::Decode { image, charset } => cli::decode_file(&image, charset),
        Commands::Scan(args) => {
            let options = args.options()?;
            let backend = args.backend();
            if args.headless {
                cli::scan_headless(
                    backend,
                    options,
                    args.timeout.map(Duration::from_secs),
                    args.save_frame,
                )
            } else {
                scanner::terminal::run(backend, options, args.save_frame)
            }
        }
    }
}

// Set RUST_LOG environment variable to control log level
// Examples: RUST_LOG=debug, RUST_LOG=scanner=debug, RUST_LOG=info
fn init_logging(to_file: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    if to_file && let Some(file) = open_log_file() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}

fn open_log_file() -> Option<File> {
    let dir = dirs::cache_dir()?.join(app_info::CONFIG_DIR);
    std::fs::create_dir_all(&dir).ok()?;
    File::create(dir.join(app_info::LOG_FILE)).ok()
}
