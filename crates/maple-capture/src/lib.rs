use anyhow::{Context, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;
use xcap::Monitor;

/// Normalized frame region (0.0-1.0 coordinates relative to the captured frame)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRegion {
    /// Scale to pixels within a `width` x `height` frame, clamped to its bounds
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRegion {
        let x = ((self.x * width as f64) as u32).min(width.saturating_sub(1));
        let y = ((self.y * height as f64) as u32).min(height.saturating_sub(1));
        let rw = ((self.width * width as f64).round() as u32).min(width - x);
        let rh = ((self.height * height as f64).round() as u32).min(height - y);
        PixelRegion {
            x,
            y,
            width: rw,
            height: rh,
        }
    }
}

/// Absolute pixel rectangle, either on screen or inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    /// Build a region from inclusive top-left and exclusive bottom-right corners.
    pub fn from_corners(top_left: (u32, u32), bottom_right: (u32, u32)) -> Self {
        Self {
            x: top_left.0,
            y: top_left.1,
            width: bottom_right.0.saturating_sub(top_left.0),
            height: bottom_right.1.saturating_sub(top_left.1),
        }
    }

    /// Whether the region is non-empty and lies fully inside a `width` x `height` frame.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.saturating_add(self.width) <= width
            && self.y.saturating_add(self.height) <= height
    }
}

/// Well-known frame regions used by the detectors
pub mod regions {
    use super::ScreenRegion;

    /// Search area for the minimap corner: top quarter, left third.
    pub fn calibration_search() -> ScreenRegion {
        ScreenRegion {
            x: 0.0,
            y: 0.0,
            width: 1.0 / 3.0,
            height: 0.25,
        }
    }

    /// Center of the screen where full-screen warnings are drawn.
    pub fn center() -> ScreenRegion {
        ScreenRegion {
            x: 0.25,
            y: 0.25,
            width: 0.5,
            height: 0.5,
        }
    }
}

/// Status of the capture loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub is_capturing: bool,
    pub calibrated: bool,
    pub fps: f64,
    pub last_capture_time: Option<u64>,
    pub resolution: Option<(u32, u32)>,
}

/// Source of frames for the capture loop.
///
/// Implementations are synchronous and return the current contents of a fixed
/// screen area on every call.
pub trait FrameSource: Send {
    fn grab_frame(&mut self) -> Result<RgbaImage>;
}

/// Captures a monitor through `xcap`, optionally cropped to a fixed pixel region.
pub struct MonitorSource {
    index: usize,
    region: Option<PixelRegion>,
}

impl MonitorSource {
    pub fn new(index: usize, region: Option<PixelRegion>) -> Self {
        Self { index, region }
    }
}

/// Find the monitor at `index` in enumeration order
fn find_monitor(index: usize) -> Result<Monitor> {
    let monitors = Monitor::all().context("Failed to enumerate monitors")?;
    let count = monitors.len();
    monitors
        .into_iter()
        .nth(index)
        .with_context(|| format!("No monitor at index {} ({} available)", index, count))
}

impl FrameSource for MonitorSource {
    fn grab_frame(&mut self) -> Result<RgbaImage> {
        let monitor = find_monitor(self.index)?;
        let img = monitor
            .capture_image()
            .context("Failed to capture monitor image")?;

        match self.region {
            Some(region) => {
                if !region.fits(img.width(), img.height()) {
                    anyhow::bail!(
                        "Capture region {:?} outside monitor {}x{}",
                        region,
                        img.width(),
                        img.height()
                    );
                }
                Ok(crop_pixels(&img, &region))
            }
            None => Ok(img),
        }
    }
}

/// Crop a region from a captured frame using normalized coordinates
pub fn crop_region(frame: &RgbaImage, region: &ScreenRegion) -> RgbaImage {
    let r = region.to_pixels(frame.width(), frame.height());
    image::imageops::crop_imm(frame, r.x, r.y, r.width, r.height).to_image()
}

/// Crop an absolute pixel region, clamped to the frame bounds
pub fn crop_pixels(frame: &RgbaImage, region: &PixelRegion) -> RgbaImage {
    let (w, h) = (frame.width(), frame.height());
    let x = region.x.min(w);
    let y = region.y.min(h);
    let rw = region.width.min(w - x);
    let rh = region.height.min(h - y);
    image::imageops::crop_imm(frame, x, y, rw, rh).to_image()
}

/// Rolling frames-per-second counter, reset every five seconds
pub struct FpsMeter {
    frame_count: u64,
    timer: Instant,
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self {
            frame_count: 0,
            timer: Instant::now(),
        }
    }
}

impl FpsMeter {
    /// Count one frame and return the current rate
    pub fn tick(&mut self) -> f64 {
        self.frame_count += 1;
        let elapsed = self.timer.elapsed().as_secs_f64();
        let fps = if elapsed > 0.0 {
            self.frame_count as f64 / elapsed
        } else {
            0.0
        };

        if elapsed > 5.0 {
            debug!("Capture rate: {:.1} fps", fps);
            self.frame_count = 0;
            self.timer = Instant::now();
        }
        fps
    }
}

/// Milliseconds since the unix epoch, for status timestamps
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
