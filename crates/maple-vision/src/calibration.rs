use image::GrayImage;
use maple_capture::{regions, PixelRegion};
use serde::Serialize;
use tracing::debug;

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::matching::{match_best, Template};

/// Location of the minimap within captured frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationData {
    pub top_left: (u32, u32),
    pub bottom_right: (u32, u32),
    /// Minimap width over height
    pub ratio: f64,
}

impl CalibrationData {
    /// Derive the minimap box from the bottom-right corner of the matched landmark
    pub fn from_landmark_corner(corner: (u32, u32), config: &VisionConfig) -> Self {
        let top_left = (config.minimap_border, config.minimap_top_border);
        let bottom_right = (
            corner.0.saturating_sub(config.minimap_border).max(config.minimap_min_extent),
            corner.1.saturating_sub(config.minimap_border).max(config.minimap_min_extent),
        );
        let ratio = (bottom_right.0 as f64 - top_left.0 as f64)
            / (bottom_right.1 as f64 - top_left.1 as f64);
        Self {
            top_left,
            bottom_right,
            ratio,
        }
    }

    pub fn region(&self) -> PixelRegion {
        PixelRegion::from_corners(self.top_left, self.bottom_right)
    }
}

/// Whether the minimap has been located. Only an explicit reset goes back.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Calibration {
    #[default]
    Uncalibrated,
    Calibrated(CalibrationData),
}

impl Calibration {
    pub fn data(&self) -> Option<&CalibrationData> {
        match self {
            Calibration::Calibrated(data) => Some(data),
            Calibration::Uncalibrated => None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self, Calibration::Calibrated(_))
    }

    pub fn reset(&mut self) {
        *self = Calibration::Uncalibrated;
    }
}

/// Find the minimap corner landmark in the top-left part of `frame`.
pub fn calibrate(
    frame: &GrayImage,
    landmark: &Template,
    config: &VisionConfig,
) -> Result<CalibrationData, VisionError> {
    let (w, h) = frame.dimensions();
    let search = regions::calibration_search().to_pixels(w, h);
    let view = image::imageops::crop_imm(frame, search.x, search.y, search.width, search.height)
        .to_image();

    let (score, top_left) = match_best(&view, landmark)?;
    if score < config.calibration_threshold {
        return Err(VisionError::LandmarkNotFound {
            score,
            threshold: config.calibration_threshold,
        });
    }

    let (tw, th) = landmark.dimensions();
    let corner = (top_left.0 + tw, top_left.1 + th);
    let data = CalibrationData::from_landmark_corner(corner, config);
    if !data.region().fits(w, h) {
        return Err(VisionError::MinimapOutOfFrame {
            top_left: data.top_left,
            bottom_right: data.bottom_right,
            frame: (w, h),
        });
    }

    debug!(
        "Minimap landmark corner at {:?} (score {:.3}), minimap {:?}..{:?}",
        corner, score, data.top_left, data.bottom_right
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::tests::noise;

    fn frame_with_corner_at(
        corner: (u32, u32),
        size: (u32, u32),
        patch_size: u32,
    ) -> (GrayImage, Template) {
        let patch = GrayImage::from_fn(patch_size, patch_size, noise(11));
        let mut frame = GrayImage::from_pixel(size.0, size.1, image::Luma([60]));
        image::imageops::replace(
            &mut frame,
            &patch,
            (corner.0 - patch_size) as i64,
            (corner.1 - patch_size) as i64,
        );
        (frame, Template::new(&patch).unwrap())
    }

    #[test]
    fn test_calibration_scenario() {
        let config = VisionConfig::default();
        let (frame, landmark) = frame_with_corner_at((300, 40), (960, 240), 20);
        let data = calibrate(&frame, &landmark, &config).unwrap();

        assert_eq!(data.top_left, (8, 21));
        assert_eq!(data.bottom_right, (292, 75));
        assert_eq!(data.ratio, (292.0 - 8.0) / (75.0 - 21.0));
    }

    #[test]
    fn test_calibration_fails_without_landmark() {
        let config = VisionConfig::default();
        let (_, landmark) = frame_with_corner_at((300, 40), (960, 240), 20);
        let blank = GrayImage::from_pixel(960, 240, image::Luma([60]));
        assert!(matches!(
            calibrate(&blank, &landmark, &config),
            Err(VisionError::LandmarkNotFound { .. })
        ));
    }

    #[test]
    fn test_calibration_rejects_minimap_outside_frame() {
        let config = VisionConfig::default();
        // Frame too short for the 75px minimum extent
        let (frame, landmark) = frame_with_corner_at((300, 15), (960, 72), 10);
        assert_eq!(
            calibrate(&frame, &landmark, &config),
            Err(VisionError::MinimapOutOfFrame {
                top_left: (8, 21),
                bottom_right: (292, 75),
                frame: (960, 72),
            })
        );
    }

    #[test]
    fn test_reset_returns_to_uncalibrated() {
        let data = CalibrationData::from_landmark_corner((200, 150), &VisionConfig::default());
        let mut calibration = Calibration::Calibrated(data);
        assert!(calibration.is_calibrated());
        assert_eq!(calibration.data().map(|d| d.bottom_right), Some((192, 142)));
        calibration.reset();
        assert_eq!(calibration, Calibration::Uncalibrated);
    }
}
