use image::{GrayImage, RgbaImage};
use maple_capture::{crop_pixels, regions};
use maple_state::Position;

use crate::calibration::CalibrationData;
use crate::config::HsvRange;
use crate::error::VisionError;
use crate::matching::{filter_color, match_all, to_relative, Template};

/// Fraction of pixels darker than `level`
pub fn dark_fraction(gray: &GrayImage, level: u8) -> f64 {
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let dark = gray.pixels().filter(|p| p[0] < level).count() as u64;
    dark as f64 / total as f64
}

/// Whether the elite warning is drawn in the middle of the screen
pub fn detect_hazard(
    gray: &GrayImage,
    elite: &Template,
    threshold: f64,
) -> Result<bool, VisionError> {
    let r = regions::center().to_pixels(gray.width(), gray.height());
    let center = image::imageops::crop_imm(gray, r.x, r.y, r.width, r.height).to_image();
    Ok(!match_all(&center, elite, threshold)?.is_empty())
}

/// The calibrated minimap area of a frame
pub fn minimap_view(frame: &RgbaImage, calibration: &CalibrationData) -> RgbaImage {
    crop_pixels(frame, &calibration.region())
}

/// Best player marker on the minimap, relative to the minimap
pub fn locate_player(
    minimap: &GrayImage,
    player: &Template,
    threshold: f64,
) -> Result<Option<Position>, VisionError> {
    let matches = match_all(minimap, player, threshold)?;
    Ok(matches
        .first()
        .map(|&center| to_relative(center, minimap.dimensions())))
}

/// Best rune marker on the color-filtered minimap, relative to the minimap
pub fn detect_rune(
    minimap: &RgbaImage,
    rune: &Template,
    ranges: &[HsvRange],
    threshold: f64,
) -> Result<Option<Position>, VisionError> {
    let filtered = image::imageops::grayscale(&filter_color(minimap, ranges));
    let matches = match_all(&filtered, rune, threshold)?;
    Ok(matches
        .first()
        .map(|&center| to_relative(center, minimap.dimensions())))
}
