use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use maple_bot::{Bot, InputDriver};
use maple_capture::{CaptureStatus, FrameSource};
use maple_state::{GameState, Position};
use maple_vision::{CaptureLoop, DisplaySnapshot, Templates};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::settings::Settings;

/// Runs the capture loop and the command engine side by side
pub struct Pipeline {
    state: Arc<GameState>,
    stop: Arc<AtomicBool>,
    recalibrate: Arc<AtomicBool>,
    status_rx: watch::Receiver<CaptureStatus>,
    display_rx: watch::Receiver<Option<Arc<DisplaySnapshot>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Start both loops on blocking tasks. Must be called inside a tokio runtime.
    pub fn start(
        settings: &Settings,
        state: Arc<GameState>,
        templates: Templates,
        mut source: Box<dyn FrameSource>,
        driver: Arc<dyn InputDriver>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));

        let capture = CaptureLoop::new(state.clone(), templates, settings.vision.clone());
        let recalibrate = capture.recalibrate_handle();
        let status_rx = capture.subscribe_status();
        let display_rx = capture.subscribe_display();

        let stop_capture = stop.clone();
        let capture_task = tokio::task::spawn_blocking(move || {
            capture.run(source.as_mut(), stop_capture);
        });

        let bot = Bot::new(state.clone(), driver, settings.bot.clone(), stop.clone());
        let bot_task = tokio::task::spawn_blocking(move || bot.run());

        // Log calibration changes as they happen
        let mut status_watch = status_rx.clone();
        let status_task = tokio::spawn(async move {
            let mut calibrated = false;
            while status_watch.changed().await.is_ok() {
                let now = status_watch.borrow().calibrated;
                if now != calibrated {
                    info!("Minimap {}", if now { "calibrated" } else { "lost" });
                    calibrated = now;
                }
            }
        });

        info!("Pipeline started");

        Self {
            state,
            stop,
            recalibrate,
            status_rx,
            display_rx,
            tasks: vec![capture_task, bot_task, status_task],
        }
    }

    pub fn state(&self) -> &Arc<GameState> {
        &self.state
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        info!("Pipeline stop requested");
    }

    /// Stop both loops and wait for them to finish
    pub async fn shutdown(self) {
        self.stop();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Pipeline task ended abnormally: {}", e);
            }
        }
        info!("Pipeline stopped");
    }

    pub fn request_recalibration(&self) {
        self.recalibrate.store(true, Ordering::SeqCst);
    }

    pub fn capture_status(&self) -> CaptureStatus {
        self.status_rx.borrow().clone()
    }

    pub fn latest_display(&self) -> Option<Arc<DisplaySnapshot>> {
        self.display_rx.borrow().clone()
    }

    /// Capture status and every store field as one JSON document
    pub fn status_json(&self) -> serde_json::Value {
        serde_json::json!({
            "capture": self.capture_status(),
            "state": self.state.snapshot(),
        })
    }

    /// Save the latest minimap with its overlays for debugging.
    /// Returns the written file.
    pub fn save_debug_minimap(&self) -> Result<PathBuf> {
        let display = self
            .latest_display()
            .context("No minimap captured yet (not calibrated?)")?;

        let debug_dir = std::env::temp_dir().join("auto_maple_debug");
        std::fs::create_dir_all(&debug_dir)
            .with_context(|| format!("Failed to create {}", debug_dir.display()))?;

        let path = debug_dir.join("minimap.png");
        render_overlay(&display)
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        info!("Debug minimap saved to {}", path.display());
        Ok(path)
    }
}

/// Minimap copy with the path, the player and the rune marked
pub fn render_overlay(display: &DisplaySnapshot) -> RgbaImage {
    let mut img = display.minimap.as_ref().clone();
    for pos in display.path.iter() {
        mark(&mut img, *pos, Rgba([0, 160, 255, 255]), 1);
    }
    if let Some(pos) = display.player_pos {
        mark(&mut img, pos, Rgba([255, 255, 0, 255]), 2);
    }
    if let (true, Some(pos)) = (display.rune_active, display.rune_pos) {
        mark(&mut img, pos, Rgba([255, 0, 255, 255]), 3);
    }
    img
}

/// Draw a small cross at a minimap-relative position
fn mark(img: &mut RgbaImage, pos: Position, color: Rgba<u8>, radius: i64) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let cx = (pos.x * w as f64).round() as i64;
    let cy = (pos.y * h as f64).round() as i64;
    for d in -radius..=radius {
        for (x, y) in [(cx + d, cy), (cx, cy + d)] {
            if x >= 0 && y >= 0 && x < w && y < h {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use maple_bot::LogDriver;
    use std::time::Duration;

    fn noise(seed: u32) -> impl Fn(u32, u32) -> image::Luma<u8> {
        move |x, y| {
            let h = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663) ^ seed.wrapping_mul(83_492_791))
                .wrapping_mul(2_654_435_761);
            image::Luma([(h >> 24) as u8])
        }
    }

    /// Serves the same synthetic game frame forever
    struct StillSource(RgbaImage);

    impl FrameSource for StillSource {
        fn grab_frame(&mut self) -> Result<RgbaImage> {
            Ok(self.0.clone())
        }
    }

    fn fixture() -> (Templates, RgbaImage) {
        let corner = GrayImage::from_fn(20, 20, noise(1));
        let player = GrayImage::from_fn(6, 6, noise(2));
        let rune = GrayImage::from_fn(6, 6, noise(3));
        let elite = GrayImage::from_fn(24, 10, noise(4));
        let templates = Templates::from_images(&corner, &player, &rune, &elite).unwrap();

        let mut gray = GrayImage::from_pixel(960, 540, image::Luma([70]));
        image::imageops::replace(&mut gray, &corner, 280, 109);
        image::imageops::replace(&mut gray, &player, 147, 68);
        let frame = RgbaImage::from_fn(960, 540, |x, y| {
            let v = gray.get_pixel(x, y)[0];
            Rgba([v, v, v, 255])
        });
        (templates, frame)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pipeline_tracks_player_and_shuts_down() {
        let (templates, frame) = fixture();
        let state = Arc::new(GameState::new());
        let pipeline = Pipeline::start(
            &Settings::default(),
            state.clone(),
            templates,
            Box::new(StillSource(frame)),
            Arc::new(LogDriver),
        );

        let mut waited = 0;
        while state.player_pos().is_none() && waited < 100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += 1;
        }

        let pos = state.player_pos().unwrap();
        assert!((pos.x - 0.5).abs() < 1e-9, "{:?}", pos);
        assert!((pos.y - 0.5).abs() < 1e-9, "{:?}", pos);
        assert!(pipeline.capture_status().calibrated);
        assert!(pipeline.latest_display().is_some());
        assert_eq!(pipeline.status_json()["state"]["enabled"], false);

        tokio::time::timeout(Duration::from_secs(5), pipeline.shutdown())
            .await
            .unwrap();
    }

    #[test]
    fn test_render_overlay_marks_player() {
        let display = DisplaySnapshot {
            minimap: Arc::new(RgbaImage::from_pixel(100, 50, Rgba([0, 0, 0, 255]))),
            player_pos: Some(Position::new(0.5, 0.5)),
            rune_active: false,
            rune_pos: Some(Position::new(0.1, 0.1)),
            path: Arc::new(Vec::new()),
        };
        let img = render_overlay(&display);
        assert_eq!(*img.get_pixel(50, 25), Rgba([255, 255, 0, 255]));
        // Inactive rune is not drawn
        assert_eq!(*img.get_pixel(10, 5), Rgba([0, 0, 0, 255]));
    }
}
