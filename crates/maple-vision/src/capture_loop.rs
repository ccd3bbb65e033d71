use image::RgbaImage;
use maple_capture::{now_millis, CaptureStatus, FpsMeter, FrameSource};
use maple_state::{GameState, Position};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::calibration::{calibrate, Calibration, CalibrationData};
use crate::config::VisionConfig;
use crate::detect::{dark_fraction, detect_hazard, detect_rune, locate_player, minimap_view};
use crate::error::VisionError;
use crate::templates::Templates;

/// What the monitoring window draws: the minimap plus its overlays
#[derive(Debug, Clone)]
pub struct DisplaySnapshot {
    pub minimap: Arc<RgbaImage>,
    pub player_pos: Option<Position>,
    pub rune_active: bool,
    pub rune_pos: Option<Position>,
    pub path: Arc<Vec<Position>>,
}

/// Turns frames into game-state facts.
///
/// Sole writer of the player position, the alert and the rune fields of the
/// shared [`GameState`].
pub struct CaptureLoop {
    state: Arc<GameState>,
    templates: Templates,
    config: VisionConfig,
    calibration: Calibration,
    failed_calibrations: u32,
    misfit_reported: bool,
    rune_counter: u32,
    recalibrate: Arc<AtomicBool>,
    display_tx: watch::Sender<Option<Arc<DisplaySnapshot>>>,
    status_tx: watch::Sender<CaptureStatus>,
}

impl CaptureLoop {
    pub fn new(state: Arc<GameState>, templates: Templates, config: VisionConfig) -> Self {
        let (display_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(CaptureStatus::default());
        Self {
            state,
            templates,
            config,
            calibration: Calibration::Uncalibrated,
            failed_calibrations: 0,
            misfit_reported: false,
            rune_counter: 0,
            recalibrate: Arc::new(AtomicBool::new(false)),
            display_tx,
            status_tx,
        }
    }

    pub fn subscribe_display(&self) -> watch::Receiver<Option<Arc<DisplaySnapshot>>> {
        self.display_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<CaptureStatus> {
        self.status_tx.subscribe()
    }

    /// Flag that, once set, drops the calibration at the start of the next cycle
    pub fn recalibrate_handle(&self) -> Arc<AtomicBool> {
        self.recalibrate.clone()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Locate the minimap if not done yet. `None` means this cycle has to be skipped.
    /// A minimap too small for the player or rune template, or a screen too
    /// small for the elite banner, counts as a failed calibration.
    fn ensure_calibrated(&mut self, gray: &image::GrayImage) -> Option<CalibrationData> {
        if self.recalibrate.swap(false, Ordering::SeqCst) {
            info!("Recalibration requested");
            self.calibration.reset();
        }

        if let Calibration::Calibrated(data) = self.calibration {
            return Some(data);
        }

        let checked = calibrate(gray, &self.templates.minimap, &self.config).and_then(|data| {
            let minimap = data.region();
            self.templates
                .check_fit(gray.dimensions(), (minimap.width, minimap.height))?;
            Ok(data)
        });

        match checked {
            Ok(data) => {
                info!(
                    "Calibrated minimap {:?}..{:?} (ratio {:.3}) after {} failed attempt(s)",
                    data.top_left, data.bottom_right, data.ratio, self.failed_calibrations
                );
                self.calibration = Calibration::Calibrated(data);
                self.failed_calibrations = 0;
                Some(data)
            }
            Err(e) => {
                self.failed_calibrations += 1;
                if let VisionError::TemplateTooLarge { .. } = e {
                    if !self.misfit_reported {
                        warn!("Templates do not fit the captured screen: {}", e);
                        self.misfit_reported = true;
                    }
                } else if self.failed_calibrations == self.config.calibration_warn_after {
                    warn!(
                        "Still uncalibrated after {} frames: {}. Is the game window in view?",
                        self.failed_calibrations, e
                    );
                } else {
                    debug!("Calibration failed: {}", e);
                }
                None
            }
        }
    }

    /// Run one perception cycle over `frame`
    pub fn process(&mut self, frame: &RgbaImage) -> Result<(), VisionError> {
        let gray = image::imageops::grayscale(frame);
        let Some(calibration) = self.ensure_calibrated(&gray) else {
            return Ok(());
        };

        // Unexpected black screen
        if self.state.enabled()
            && !self.state.alert_active()
            && dark_fraction(&gray, self.config.black_level) > self.config.black_fraction
        {
            self.state.trip_alert("screen went black");
        }

        // Elite boss warning
        if self.state.enabled()
            && !self.state.alert_active()
            && detect_hazard(&gray, &self.templates.elite, self.config.hazard_threshold)?
        {
            self.state.trip_alert("elite boss warning");
        }

        let minimap = minimap_view(frame, &calibration);
        let minimap_gray = image::imageops::grayscale(&minimap);

        if let Some(pos) = locate_player(
            &minimap_gray,
            &self.templates.player,
            self.config.player_threshold,
        )? {
            self.state.set_player_pos(pos);
        }

        if self.rune_counter == 0 && !self.state.rune_active() && self.state.routine_len() > 0 {
            self.check_rune(&minimap)?;
        }
        self.rune_counter = (self.rune_counter + 1) % self.config.rune_interval.max(1);

        let rune = self.state.rune();
        self.display_tx.send_replace(Some(Arc::new(DisplaySnapshot {
            minimap: Arc::new(minimap),
            player_pos: self.state.player_pos(),
            rune_active: rune.active,
            rune_pos: rune.position,
            path: self.state.path(),
        })));

        Ok(())
    }

    fn check_rune(&self, minimap: &RgbaImage) -> Result<(), VisionError> {
        let found = detect_rune(
            minimap,
            &self.templates.rune,
            &self.config.rune_ranges,
            self.config.rune_threshold,
        )?;

        let Some(rune_pos) = found else {
            return Ok(());
        };
        let (closest, distance) = self.state.nearest_point(rune_pos);
        let Some(point) = closest else {
            return Ok(());
        };
        info!(
            "Rune at ({:.3}, {:.3}), closest point {} at distance {:.3}",
            rune_pos.x,
            rune_pos.y,
            point.id(),
            distance
        );
        self.state.publish_rune(rune_pos, Some(point));
        Ok(())
    }

    /// Grab and process frames until `stop` is set. Per-cycle failures are
    /// logged and the next cycle starts after the configured delay.
    pub fn run(mut self, source: &mut dyn FrameSource, stop: Arc<AtomicBool>) {
        let delay = Duration::from_millis(self.config.cycle_delay_ms);
        let mut fps = FpsMeter::default();
        info!("Capture loop started");

        while !stop.load(Ordering::Relaxed) {
            match source.grab_frame() {
                Ok(frame) => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(&frame)));
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!("Capture cycle failed: {}", e),
                        Err(_) => warn!("Capture cycle panicked"),
                    }

                    self.status_tx.send_replace(CaptureStatus {
                        is_capturing: true,
                        calibrated: self.calibration.is_calibrated(),
                        fps: fps.tick(),
                        last_capture_time: Some(now_millis()),
                        resolution: Some(frame.dimensions()),
                    });
                }
                Err(e) => {
                    warn!("Frame grab failed: {:#}", e);
                    self.status_tx.send_replace(CaptureStatus {
                        calibrated: self.calibration.is_calibrated(),
                        ..CaptureStatus::default()
                    });
                }
            }

            std::thread::sleep(delay);
        }

        self.status_tx.send_replace(CaptureStatus::default());
        info!("Capture loop stopped");
    }
}
