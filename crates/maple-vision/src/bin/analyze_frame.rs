//! CLI tool to run a saved screenshot through the detectors.
//! Usage: cargo run -p maple-vision --features cli --bin analyze_frame -- <screenshot.png> [assets_dir] [output_dir]

use anyhow::{Context, Result};
use maple_capture::{crop_region, regions};
use maple_vision::{
    calibrate, dark_fraction, detect_hazard, detect_rune, locate_player, minimap_view, Templates,
    VisionConfig,
};
use std::path::PathBuf;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <screenshot.png> [assets_dir] [output_dir]", args[0]);
        std::process::exit(1);
    }

    let input_path = PathBuf::from(&args[1]);
    let assets_dir = PathBuf::from(args.get(2).map(String::as_str).unwrap_or("assets"));
    let output_dir = PathBuf::from(args.get(3).map(String::as_str).unwrap_or("./debug_output"));
    let _ = std::fs::create_dir_all(&output_dir);

    let config = VisionConfig::default();
    let templates = Templates::load(&assets_dir, &config.rune_ranges)?;

    println!("Loading image: {}", input_path.display());
    let img = image::open(&input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?
        .to_rgba8();
    let gray = image::imageops::grayscale(&img);
    println!("Image size: {}x{}", img.width(), img.height());

    println!("\n=== Screen Checks ===");
    let dark = dark_fraction(&gray, config.black_level);
    println!(
        "Dark pixels: {:.1}% (alert above {:.1}%)",
        dark * 100.0,
        config.black_fraction * 100.0
    );
    let hazard = detect_hazard(&gray, &templates.elite, config.hazard_threshold)?;
    println!("Elite warning: {}", if hazard { "PRESENT" } else { "none" });
    let _ = crop_region(&img, &regions::center()).save(output_dir.join("center.png"));

    println!("\n=== Calibration ===");
    let data = match calibrate(&gray, &templates.minimap, &config) {
        Ok(data) => data,
        Err(e) => {
            println!("Minimap NOT FOUND: {}", e);
            return Ok(());
        }
    };
    println!(
        "Minimap: {:?}..{:?} (ratio {:.3})",
        data.top_left, data.bottom_right, data.ratio
    );

    let minimap = minimap_view(&img, &data);
    let _ = minimap.save(output_dir.join("minimap.png"));
    let minimap_gray = image::imageops::grayscale(&minimap);

    println!("\n=== Minimap ===");
    match locate_player(&minimap_gray, &templates.player, config.player_threshold)? {
        Some(pos) => println!("Player: ({:.3}, {:.3})", pos.x, pos.y),
        None => println!("Player: NOT FOUND"),
    }
    match detect_rune(
        &minimap,
        &templates.rune,
        &config.rune_ranges,
        config.rune_threshold,
    )? {
        Some(pos) => println!("Rune: ({:.3}, {:.3})", pos.x, pos.y),
        None => println!("Rune: none"),
    }

    let filtered = maple_vision::filter_color(&minimap, &config.rune_ranges);
    let _ = filtered.save(output_dir.join("minimap_rune_filter.png"));

    println!("\nDebug images saved to: {}", output_dir.display());
    Ok(())
}
