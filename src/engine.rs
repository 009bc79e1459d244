use log::{debug, info, trace};

use crate::accumulator::FrameAccumulator;
use crate::batch_filter::{self, FilteredBatch};
use crate::config::FilterConfig;
use crate::density::DensityFilter;
use crate::error::Result;
use crate::event::Event;
use crate::grid::Resolution;
use crate::hot_pixel::{CalibrationController, CalibrationOutcome, CalibrationState};
use crate::mask::PixelMask;

/// State-changing requests, applied between batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ToggleDensityFilter,
    StartCalibration,
}

/// Human-readable status notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    DensityFilter(bool),
    CalibrationStarted,
    CalibrationFailed,
    HotPixelsMasked(usize),
    DeviceNotFound,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::DensityFilter(on) => {
                write!(f, "Status: Density Filter {}", if *on { "ON" } else { "OFF" })
            }
            Status::CalibrationStarted => write!(f, "Status: Calibrating... Cover lens."),
            Status::CalibrationFailed => write!(f, "Calibration Failed."),
            Status::HotPixelsMasked(n) => write!(f, "Active: Masked {} hot pixels.", n),
            Status::DeviceNotFound => write!(f, "Error: Camera not found!"),
        }
    }
}

/// Everything the engine hands to its consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineOutput {
    Status(Status),
    Data(FilteredBatch),
}

/// Batch accounting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub batches: u64,
    pub calibration_batches: u64,
    /// Batches in which every event was rejected.
    pub suppressed_batches: u64,
    pub events_in: u64,
    pub events_out: u64,
}

/// Noise-filtering engine for one capture session.
///
/// Owns the hot-pixel mask and the calibration state. While calibrating,
/// batches only feed the heatmap; otherwise they are filtered through the
/// hot-pixel mask, ANDed with the density mask when that filter is on.
pub struct Engine {
    resolution: Resolution,
    hot_pixels: PixelMask,
    calibration: CalibrationController,
    density: DensityFilter,
    accumulator: Option<Box<dyn FrameAccumulator>>,
    stats: FilterStats,
}

impl Engine {
    pub fn new(resolution: Resolution, config: &FilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            resolution,
            hot_pixels: PixelMask::all_valid(resolution),
            calibration: CalibrationController::new(
                resolution,
                config.calibration_duration,
                config.sigma_threshold,
            ),
            density: DensityFilter::new(
                resolution,
                config.blur_kernel_size,
                config.density_threshold,
            ),
            accumulator: None,
            stats: FilterStats::default(),
        })
    }

    /// Render a preview for every emitted batch through `accumulator`.
    pub fn with_accumulator(mut self, accumulator: Box<dyn FrameAccumulator>) -> Self {
        self.accumulator = Some(accumulator);
        self
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn hot_pixel_mask(&self) -> &PixelMask {
        &self.hot_pixels
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.calibration.state()
    }

    pub fn density_filter_enabled(&self) -> bool {
        self.density.is_enabled()
    }

    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    pub fn apply(&mut self, command: Command, now: f64) -> Status {
        match command {
            Command::ToggleDensityFilter => self.toggle_density_filter(),
            Command::StartCalibration => self.start_calibration(now),
        }
    }

    pub fn toggle_density_filter(&mut self) -> Status {
        Status::DensityFilter(self.density.toggle())
    }

    pub fn start_calibration(&mut self, now: f64) -> Status {
        self.calibration.start(now);
        Status::CalibrationStarted
    }

    /// Handle one batch from the source.
    ///
    /// Returns a status when the batch closed a calibration window, filtered
    /// data when any event survived, and nothing otherwise.
    pub fn process(&mut self, batch: &[Event], now: f64) -> Option<EngineOutput> {
        if batch.is_empty() {
            return self.idle(now);
        }
        self.stats.batches += 1;
        self.stats.events_in += batch.len() as u64;

        if self.calibration.is_calibrating() {
            self.stats.calibration_batches += 1;
            return self
                .calibration
                .observe(batch, now)
                .map(|outcome| EngineOutput::Status(self.finish_calibration(outcome)));
        }

        let combined = self.density.combine(&self.hot_pixels, batch);
        let preview = self.accumulator.as_mut().and_then(|acc| {
            acc.accept(batch);
            acc.generate_frame()
        });

        match batch_filter::apply(batch, &combined, preview) {
            Some(filtered) => {
                trace!("kept {}/{} events", filtered.events.len(), batch.len());
                self.stats.events_out += filtered.events.len() as u64;
                Some(EngineOutput::Data(filtered))
            }
            None => {
                debug!("all {} events of batch rejected", batch.len());
                self.stats.suppressed_batches += 1;
                None
            }
        }
    }

    /// Poll without a batch. Closes an elapsed calibration window.
    pub fn idle(&mut self, now: f64) -> Option<EngineOutput> {
        self.calibration
            .tick(now)
            .map(|outcome| EngineOutput::Status(self.finish_calibration(outcome)))
    }

    fn finish_calibration(&mut self, outcome: CalibrationOutcome) -> Status {
        match outcome {
            CalibrationOutcome::Masked { mask, masked, .. } => {
                assert_eq!(mask.resolution(), self.resolution);
                self.hot_pixels = mask;
                info!("hot-pixel mask replaced, {} pixels masked", masked);
                Status::HotPixelsMasked(masked)
            }
            CalibrationOutcome::Failed => Status::CalibrationFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::StepAccumulator;

    fn engine(w: u32, h: u32) -> Engine {
        Engine::new(Resolution::new(w, h).unwrap(), &FilterConfig::default()).unwrap()
    }

    fn repeated(x: u16, y: u16, n: usize) -> Vec<Event> {
        (0..n).map(|i| Event::new(x, y, i as i64, 1)).collect()
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(Status::DensityFilter(true).to_string(), "Status: Density Filter ON");
        assert_eq!(Status::DensityFilter(false).to_string(), "Status: Density Filter OFF");
        assert_eq!(Status::CalibrationStarted.to_string(), "Status: Calibrating... Cover lens.");
        assert_eq!(Status::CalibrationFailed.to_string(), "Calibration Failed.");
        assert_eq!(Status::HotPixelsMasked(3).to_string(), "Active: Masked 3 hot pixels.");
        assert_eq!(Status::DeviceNotFound.to_string(), "Error: Camera not found!");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FilterConfig {
            blur_kernel_size: 2,
            ..FilterConfig::default()
        };
        assert!(Engine::new(Resolution::new(4, 4).unwrap(), &config).is_err());
    }

    #[test]
    fn test_passthrough_before_calibration() {
        let mut e = engine(8, 8);
        let batch = vec![Event::new(1, 1, 10, 1), Event::new(2, 2, 11, -1)];
        match e.process(&batch, 0.0) {
            Some(EngineOutput::Data(out)) => {
                assert_eq!(out.events.events().collect::<Vec<_>>(), batch);
                assert!(out.preview.is_none());
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_calibrating_batches_not_emitted() {
        let mut e = engine(8, 8);
        assert_eq!(e.apply(Command::StartCalibration, 0.0), Status::CalibrationStarted);
        assert_eq!(e.calibration_state(), CalibrationState::Calibrating);
        assert!(e.process(&repeated(1, 1, 3), 0.5).is_none());
        assert_eq!(e.stats().calibration_batches, 1);
    }

    #[test]
    fn test_failed_calibration_keeps_mask() {
        let mut e = engine(128, 128);
        e.start_calibration(0.0);
        e.process(&repeated(5, 5, 200), 0.5);
        e.process(&repeated(6, 6, 1), 2.5);
        let before = e.hot_pixel_mask().clone();
        assert_eq!(before.masked_count(), 1);

        e.start_calibration(10.0);
        assert_eq!(
            e.idle(12.5),
            Some(EngineOutput::Status(Status::CalibrationFailed))
        );
        assert_eq!(e.hot_pixel_mask(), &before);
        assert_eq!(e.calibration_state(), CalibrationState::Idle);
    }

    #[test]
    fn test_hot_pixel_filtered_after_calibration() {
        let mut e = engine(128, 128);
        e.start_calibration(0.0);
        e.process(&repeated(0, 0, 100), 1.0);
        let status = e.process(&repeated(127, 127, 1), 2.5);
        assert_eq!(status, Some(EngineOutput::Status(Status::HotPixelsMasked(1))));

        assert!(e.process(&repeated(0, 0, 4), 3.0).is_none());
        assert_eq!(e.stats().suppressed_batches, 1);
        let kept = e.process(&[Event::new(0, 0, 1, 1), Event::new(9, 9, 2, 1)], 3.1);
        match kept {
            Some(EngineOutput::Data(out)) => assert_eq!(out.events.x, vec![9]),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_density_toggle_status() {
        let mut e = engine(8, 8);
        assert_eq!(e.apply(Command::ToggleDensityFilter, 0.0), Status::DensityFilter(true));
        assert!(e.density_filter_enabled());
        assert_eq!(e.apply(Command::ToggleDensityFilter, 0.0), Status::DensityFilter(false));
        assert!(!e.density_filter_enabled());
    }

    #[test]
    fn test_density_filter_drops_isolated_event() {
        let mut e = engine(100, 100);
        e.toggle_density_filter();
        assert!(e.process(&[Event::new(50, 50, 1, 1)], 0.0).is_none());
        let mut burst = repeated(10, 10, 6);
        burst.push(Event::new(80, 80, 7, 1));
        match e.process(&burst, 0.1) {
            Some(EngineOutput::Data(out)) => {
                assert_eq!(out.events.len(), 6);
                assert!(out.events.x.iter().all(|&x| x == 10));
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_preview_blanked_at_masked_pixels() {
        let res = Resolution::new(100, 100).unwrap();
        let mut e = Engine::new(res, &FilterConfig::default())
            .unwrap()
            .with_accumulator(Box::new(StepAccumulator::with_params(res, 0.25, 0.5, 0.0, 1.0)));
        e.toggle_density_filter();
        let mut batch = repeated(10, 10, 6);
        batch.push(Event::new(80, 80, 7, 1));
        match e.process(&batch, 0.0) {
            Some(EngineOutput::Data(out)) => {
                let preview = out.preview.unwrap();
                assert_eq!(*preview.get(10, 10), 255);
                assert_eq!(*preview.get(80, 80), 0);
                assert_eq!(*preview.get(0, 0), 0);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_empty_batch_is_idle() {
        let mut e = engine(8, 8);
        assert!(e.process(&[], 0.0).is_none());
        assert_eq!(e.stats().batches, 0);
    }
}
