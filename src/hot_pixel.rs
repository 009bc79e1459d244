use log::{debug, info, trace, warn};

use crate::event::Event;
use crate::grid::{Grid, Resolution};
use crate::mask::PixelMask;

/// Whether incoming batches feed calibration or normal filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CalibrationState {
    #[default]
    Idle,
    Calibrating,
}

/// Population statistics of a calibration heatmap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeatmapStats {
    pub mean: f64,
    pub std: f64,
    pub max: u32,
}

impl HeatmapStats {
    pub fn of(heatmap: &Grid<u32>) -> Self {
        let cells = heatmap.as_slice();
        let n = cells.len() as f64;
        let mean = cells.iter().map(|&c| c as f64).sum::<f64>() / n;
        let var = cells
            .iter()
            .map(|&c| {
                let d = c as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Self {
            mean,
            std: var.sqrt(),
            max: cells.iter().copied().max().unwrap_or(0),
        }
    }

    pub fn cutoff(&self, sigma_threshold: f64) -> f64 {
        self.mean + sigma_threshold * self.std
    }
}

/// Build a hot-pixel mask from a calibration heatmap.
///
/// A pixel stays valid only while its count is strictly below
/// `mean + sigma_threshold * std`. Returns `None` for an all-zero heatmap,
/// which carries no information about the sensor.
pub fn hot_pixel_mask(heatmap: &Grid<u32>, sigma_threshold: f64) -> Option<(PixelMask, f64)> {
    let stats = HeatmapStats::of(heatmap);
    if stats.max == 0 {
        return None;
    }
    let cutoff = stats.cutoff(sigma_threshold);
    let data = heatmap
        .as_slice()
        .iter()
        .map(|&c| (c as f64) < cutoff)
        .collect();
    debug!(
        "heatmap mean={:.4} std={:.4} max={} cutoff={:.4}",
        stats.mean, stats.std, stats.max, cutoff
    );
    Some((
        PixelMask::from_grid(Grid::from_vec(heatmap.resolution(), data)),
        cutoff,
    ))
}

/// Result of closing a calibration window.
#[derive(Clone, Debug, PartialEq)]
pub enum CalibrationOutcome {
    /// New hot-pixel mask; `masked` counts its `false` entries.
    Masked {
        mask: PixelMask,
        masked: usize,
        cutoff: f64,
    },
    /// No events were observed; the previous mask must be kept.
    Failed,
}

/// Hot pixel calibration controller.
///
/// Accumulates per-pixel event counts over a fixed time window and derives
/// a static mask of pixels firing far above the ambient rate. Time is passed
/// in by the caller in seconds.
pub struct CalibrationController {
    resolution: Resolution,
    heatmap: Option<Grid<u32>>,
    window_start: f64,
    duration: f64,
    sigma_threshold: f64,
}

impl CalibrationController {
    pub fn new(resolution: Resolution, duration: f64, sigma_threshold: f64) -> Self {
        assert!(duration > 0.0, "calibration duration must be positive");
        Self {
            resolution,
            heatmap: None,
            window_start: 0.0,
            duration,
            sigma_threshold,
        }
    }

    pub fn state(&self) -> CalibrationState {
        if self.heatmap.is_some() {
            CalibrationState::Calibrating
        } else {
            CalibrationState::Idle
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.heatmap.is_some()
    }

    /// Heatmap of the running window, if calibrating.
    pub fn heatmap(&self) -> Option<&Grid<u32>> {
        self.heatmap.as_ref()
    }

    /// Open a fresh calibration window at `now`. Restarts a running window.
    pub fn start(&mut self, now: f64) {
        if self.is_calibrating() {
            info!("restarting calibration window");
        }
        self.heatmap = Some(Grid::filled(self.resolution, 0));
        self.window_start = now;
        info!(
            "calibrating {} sensor for {:.2}s",
            self.resolution, self.duration
        );
    }

    /// Count a batch into the heatmap, finalizing once the window has elapsed.
    pub fn observe(&mut self, batch: &[Event], now: f64) -> Option<CalibrationOutcome> {
        let Some(heatmap) = self.heatmap.as_mut() else {
            trace!("observe called while idle, ignoring {} events", batch.len());
            return None;
        };

        let counts = heatmap.as_mut_slice();
        for event in batch {
            if let Some(idx) = self.resolution.index_of(event) {
                counts[idx] = counts[idx].saturating_add(1);
            }
        }

        self.tick(now)
    }

    /// Elapsed-time check, for polls that delivered no batch.
    pub fn tick(&mut self, now: f64) -> Option<CalibrationOutcome> {
        if self.is_calibrating() && now - self.window_start > self.duration {
            Some(self.finalize())
        } else {
            None
        }
    }

    /// Close the window and derive the mask. Returns to idle either way.
    pub fn finalize(&mut self) -> CalibrationOutcome {
        let Some(heatmap) = self.heatmap.take() else {
            warn!("finalize called without a calibration window");
            return CalibrationOutcome::Failed;
        };

        match hot_pixel_mask(&heatmap, self.sigma_threshold) {
            Some((mask, cutoff)) => {
                let masked = mask.masked_count();
                info!("calibration masked {} hot pixels (cutoff {:.3})", masked, cutoff);
                CalibrationOutcome::Masked {
                    mask,
                    masked,
                    cutoff,
                }
            }
            None => {
                warn!("calibration observed no events, keeping previous mask");
                CalibrationOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(w: u32, h: u32) -> Resolution {
        Resolution::new(w, h).unwrap()
    }

    fn repeated(x: u16, y: u16, n: usize) -> Vec<Event> {
        (0..n).map(|i| Event::new(x, y, i as i64, 1)).collect()
    }

    #[test]
    fn test_start_enters_calibrating() {
        let mut cal = CalibrationController::new(res(4, 4), 2.0, 8.0);
        assert_eq!(cal.state(), CalibrationState::Idle);
        cal.start(10.0);
        assert_eq!(cal.state(), CalibrationState::Calibrating);
        assert!(cal.heatmap().unwrap().as_slice().iter().all(|&c| c == 0));
    }

    #[test]
    fn test_observe_counts_events() {
        let mut cal = CalibrationController::new(res(4, 4), 2.0, 8.0);
        cal.start(0.0);
        assert!(cal.observe(&repeated(1, 2, 3), 0.5).is_none());
        assert_eq!(*cal.heatmap().unwrap().get(1, 2), 3);
    }

    #[test]
    fn test_restart_resets_heatmap() {
        let mut cal = CalibrationController::new(res(4, 4), 2.0, 8.0);
        cal.start(0.0);
        cal.observe(&repeated(0, 0, 5), 1.0);
        cal.start(1.5);
        assert_eq!(*cal.heatmap().unwrap().get(0, 0), 0);
        // window now measured from 1.5
        assert!(cal.tick(3.0).is_none());
        assert!(cal.tick(3.6).is_some());
    }

    #[test]
    fn test_window_closes_strictly_after_duration() {
        let mut cal = CalibrationController::new(res(4, 4), 2.0, 8.0);
        cal.start(0.0);
        assert!(cal.observe(&repeated(0, 0, 1), 2.0).is_none());
        assert!(cal.observe(&repeated(0, 0, 1), 2.01).is_some());
        assert_eq!(cal.state(), CalibrationState::Idle);
    }

    #[test]
    fn test_empty_window_fails() {
        let mut cal = CalibrationController::new(res(4, 4), 2.0, 8.0);
        cal.start(0.0);
        assert_eq!(cal.tick(2.5), Some(CalibrationOutcome::Failed));
        assert_eq!(cal.state(), CalibrationState::Idle);
    }

    #[test]
    fn test_observe_while_idle_ignored() {
        let mut cal = CalibrationController::new(res(4, 4), 2.0, 8.0);
        assert!(cal.observe(&repeated(0, 0, 10), 100.0).is_none());
        assert!(cal.heatmap().is_none());
    }

    #[test]
    fn test_mask_matches_cutoff_law() {
        let r = res(8, 8);
        let counts: Vec<u32> = (0..64).map(|i| (i * 7 % 13) as u32).collect();
        let heatmap = Grid::from_vec(r, counts.clone());
        for sigma in [0.0, 0.5, 1.0, 8.0] {
            let stats = HeatmapStats::of(&heatmap);
            let cutoff = stats.mean + sigma * stats.std;
            let (mask, reported) = hot_pixel_mask(&heatmap, sigma).unwrap();
            assert_eq!(reported, cutoff);
            for (i, &c) in counts.iter().enumerate() {
                assert_eq!(mask.as_slice()[i], (c as f64) < cutoff);
            }
        }
    }

    #[test]
    fn test_population_statistics() {
        let heatmap = Grid::from_vec(res(4, 1), vec![2, 4, 4, 6]);
        let stats = HeatmapStats::of(&heatmap);
        assert!((stats.mean - 4.0).abs() < 1e-12);
        // population std: sqrt((4 + 0 + 0 + 4) / 4)
        assert!((stats.std - 2.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.max, 6);
    }

    #[test]
    fn test_single_outlier_on_tiny_sensor_is_not_masked() {
        // On 16 pixels a lone outlier reaches at most sqrt(15) sigma.
        let mut cal = CalibrationController::new(res(4, 4), 2.0, 8.0);
        cal.start(0.0);
        cal.observe(&repeated(0, 0, 100), 0.5);
        cal.observe(&repeated(3, 3, 1), 1.0);
        match cal.observe(&[], 2.5) {
            Some(CalibrationOutcome::Masked { masked, .. }) => assert_eq!(masked, 0),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_hot_pixel_masked_on_realistic_sensor() {
        let mut cal = CalibrationController::new(res(128, 128), 2.0, 8.0);
        cal.start(0.0);
        cal.observe(&repeated(0, 0, 100), 0.5);
        cal.observe(&repeated(127, 127, 1), 1.0);
        match cal.observe(&[], 2.5) {
            Some(CalibrationOutcome::Masked { mask, masked, .. }) => {
                assert_eq!(masked, 1);
                assert!(!mask.is_valid(0, 0));
                assert!(mask.is_valid(127, 127));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_out_of_bounds_events_ignored() {
        let mut cal = CalibrationController::new(res(4, 4), 2.0, 8.0);
        cal.start(0.0);
        cal.observe(&[Event::new(9, 9, 0, 1)], 0.1);
        assert!(cal.heatmap().unwrap().as_slice().iter().all(|&c| c == 0));
    }
}
