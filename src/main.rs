use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_lens::config::LensConfig;
use doc_lens::core::{Quadrilateral, RgbaFrame, Size};
use doc_lens::identity::{DeviceIdentity, DeviceTraits, HttpSessionValidator, SessionValidator, TraitsFingerprinter};
use lens_scale::presets::{AspectMode, ScaleTarget, build_plan};
use log::info;

/// Command-line companion for the document lens: session validation,
/// device identity, downscale planning and offline cropping.
#[derive(Parser, Debug)]
#[command(name = "lens")]
#[command(about = "Document lens utilities")]
struct Args {
    /// JSON configuration file; defaults are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange a client id for a session key
    Validate {
        #[arg(help = "Partner CLIENT-ID")]
        client_id: String,
    },
    /// Print the device data bundle for a user agent and screen
    Device {
        #[arg(long, default_value = "Mozilla/5.0")]
        user_agent: String,
        #[arg(long, default_value_t = 1920)]
        screen_width: u32,
        #[arg(long, default_value_t = 1080)]
        screen_height: u32,
    },
    /// Show how a frame is downscaled before it is sent for detection
    Plan {
        width: u32,
        height: u32,
        #[arg(long, help = "Longest side cap (defaults to the socket cap)")]
        cap: Option<u32>,
    },
    /// Crop an image to the bounding box of four corners and write a JPEG
    Crop {
        input: PathBuf,
        #[arg(short, long, default_value = "cropped.jpg")]
        output: PathBuf,
        /// Corners as x,y pairs: x1,y1,x2,y2,x3,y3,x4,y4
        #[arg(long, value_delimiter = ',', num_args = 8)]
        corners: Vec<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            LensConfig::from_json_str(&json)?
        }
        None => LensConfig::default(),
    };

    match args.command {
        Command::Validate { client_id } => {
            let validator = HttpSessionValidator::new(
                config.validate_url.clone(),
                Duration::from_millis(config.transport_timeout_ms),
            );
            let session = validator.validate(&client_id).await?;
            println!("{}", session);
        }
        Command::Device {
            user_agent,
            screen_width,
            screen_height,
        } => {
            let traits = DeviceTraits {
                user_agent,
                screen_width,
                screen_height,
                ..Default::default()
            };
            let identity = DeviceIdentity::resolve(&traits, &TraitsFingerprinter).await?;
            println!("{}", serde_json::to_string_pretty(&identity.data())?);
        }
        Command::Plan { width, height, cap } => {
            let cap = cap.unwrap_or(config.socket_max_shape);
            let plan = build_plan(Size { w: width, h: height }, ScaleTarget::MaxLongSide(cap), AspectMode::Preserve);
            println!(
                "{}x{} -> {}x{} (scale {})",
                width, height, plan.out.w, plan.out.h, plan.factor
            );
        }
        Command::Crop { input, output, corners } => {
            let bytes = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let frame = RgbaFrame::from_encoded(&bytes)?;
            let pairs: Vec<[f64; 2]> = corners.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
            let quad = Quadrilateral::from_pairs(&pairs)?;
            let bbox = quad
                .bounding_box()
                .context("four corners are required")?;
            let cropped = frame.crop(&bbox)?;
            std::fs::write(&output, cropped.to_jpeg(config.jpeg_quality)?)
                .with_context(|| format!("writing {}", output.display()))?;
            info!("cropped {}x{} -> {}x{}", frame.width, frame.height, cropped.width, cropped.height);
            println!("{}", output.display());
        }
    }
    Ok(())
}
