//! retext - edit text on raster images in place
//!
//! Locates a target string with OCR, erases it by reconstructing the
//! surrounding background, and redraws a replacement fitted to the same
//! box. The rest of the image is never touched.

mod config;
mod detect;
mod edit;
mod error;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::{AppConfig, FillStrategy};
use crate::detect::TextDetector;

/// retext - in-place text replacement on images
#[derive(Parser, Debug)]
#[command(name = "retext")]
#[command(about = "Replace text on an image by erasing and redrawing it in place")]
struct Args {
    /// Input image (PNG or JPEG)
    input: PathBuf,

    /// Text to find (case-insensitive substring match)
    #[arg(short, long, default_value = "")]
    target: String,

    /// Replacement text (empty just erases the match)
    #[arg(short, long, default_value = "")]
    replacement: String,

    /// Where to write the edited PNG
    #[arg(short, long, default_value = "edited.png")]
    output: PathBuf,

    /// Fill strategy override: flat or blur
    #[arg(long)]
    fill: Option<String>,

    /// Only list detected text, do not edit
    #[arg(long)]
    list_text: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = load_or_create_config();
    if let Some(fill) = &args.fill {
        config.fill.strategy = match fill.as_str() {
            "flat" => FillStrategy::Flat,
            "blur" => FillStrategy::Blur,
            other => anyhow::bail!("Unknown fill strategy: {} (expected flat or blur)", other),
        };
    }

    let image_bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read input image: {:?}", args.input))?;

    // First use loads (and possibly downloads) the detector models
    let engine = detect::global_engine(config.detector.models_dir.as_deref())?;

    if args.list_text {
        return list_text(&image_bytes, engine);
    }

    if args.target.is_empty() {
        anyhow::bail!("--target is required unless --list-text is given");
    }

    let outcome = edit::edit_image(
        &image_bytes,
        &args.target,
        &args.replacement,
        &config,
        engine,
    )?;

    if outcome.detected_texts.is_empty() {
        println!("No text detected in the image");
    } else {
        println!("Detected text:");
        for text in &outcome.detected_texts {
            println!("  {}", text);
        }
    }

    if outcome.replaced_count == 0 {
        println!("\"{}\" not found; image written unchanged", args.target);
    } else {
        println!(
            "Replaced {} occurrence(s) of \"{}\" with \"{}\"",
            outcome.replaced_count, args.target, args.replacement
        );
    }

    std::fs::write(&args.output, &outcome.image_png)
        .with_context(|| format!("Failed to write output image: {:?}", args.output))?;
    info!("Wrote edited image to {:?}", args.output);

    Ok(())
}

/// Detection-only mode: print every recognized string with confidence.
fn list_text(image_bytes: &[u8], engine: &dyn TextDetector) -> Result<()> {
    let image = image::load_from_memory(image_bytes)
        .context("Failed to decode input image")?
        .to_rgb8();

    let detections = engine.detect(&image)?;
    if detections.is_empty() {
        println!("No text detected");
        return Ok(());
    }

    for detection in &detections {
        let bounds = detection.bounds(image.width(), image.height());
        println!(
            "  {:>5.1}%  ({:>4},{:>4})  {}",
            detection.confidence * 100.0,
            bounds.x1,
            bounds.y1,
            detection.text
        );
    }
    Ok(())
}

/// Load configuration from file or fall back to defaults
fn load_or_create_config() -> AppConfig {
    if let Ok(config_dir) = config::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}
