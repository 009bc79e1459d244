use std::borrow::Cow;

use log::info;

use crate::blur::gaussian_blur;
use crate::event::Event;
use crate::grid::{Grid, Resolution};
use crate::mask::PixelMask;

/// Spatial density filter.
///
/// Builds a per-batch event-count field, blurs it, and keeps only pixels
/// whose smoothed density exceeds `threshold`. Isolated events spread thin
/// under the blur and are dropped; correlated clusters survive.
///
/// The filter is stateless between batches apart from its on/off switch.
pub struct DensityFilter {
    resolution: Resolution,
    kernel_size: usize,
    threshold: f32,
    enabled: bool,
}

impl DensityFilter {
    /// Create a disabled density filter.
    pub fn new(resolution: Resolution, kernel_size: usize, threshold: f32) -> Self {
        assert!(kernel_size % 2 == 1, "kernel size must be odd");
        Self {
            resolution,
            kernel_size,
            threshold,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flip the filter on or off. Returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        info!(
            "density filter {}",
            if self.enabled { "enabled" } else { "disabled" }
        );
        self.enabled
    }

    /// Per-pixel event counts of a single batch.
    pub fn heatmap(&self, batch: &[Event]) -> Grid<f32> {
        let mut heatmap = Grid::filled(self.resolution, 0.0f32);
        let cells = heatmap.as_mut_slice();
        for event in batch {
            if let Some(idx) = self.resolution.index_of(event) {
                cells[idx] += 1.0;
            }
        }
        heatmap
    }

    /// Density mask of a batch, regardless of the on/off switch.
    pub fn density_mask(&self, batch: &[Event]) -> PixelMask {
        let blurred = gaussian_blur(&self.heatmap(batch), self.kernel_size);
        let data = blurred
            .as_slice()
            .iter()
            .map(|&v| v > self.threshold)
            .collect();
        PixelMask::from_grid(Grid::from_vec(self.resolution, data))
    }

    /// Combined mask for a batch: the hot-pixel mask, ANDed with the density
    /// mask while the filter is enabled.
    pub fn combine<'a>(&self, hot_pixels: &'a PixelMask, batch: &[Event]) -> Cow<'a, PixelMask> {
        assert_eq!(
            hot_pixels.resolution(),
            self.resolution,
            "hot-pixel mask must match the session resolution"
        );
        if self.enabled {
            Cow::Owned(hot_pixels.and(&self.density_mask(batch)))
        } else {
            Cow::Borrowed(hot_pixels)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(w: u32, h: u32) -> DensityFilter {
        DensityFilter::new(Resolution::new(w, h).unwrap(), 5, 0.6)
    }

    #[test]
    fn test_disabled_by_default() {
        assert!(!filter(8, 8).is_enabled());
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let mut f = filter(8, 8);
        let before = f.is_enabled();
        f.toggle();
        assert_ne!(f.is_enabled(), before);
        f.toggle();
        assert_eq!(f.is_enabled(), before);
    }

    #[test]
    fn test_isolated_event_suppressed() {
        let f = filter(100, 100);
        let mask = f.density_mask(&[Event::new(50, 50, 1000, 1)]);
        assert!(!mask.is_valid(50, 50));
        assert_eq!(mask.valid_count(), 0);
    }

    #[test]
    fn test_repeated_pixel_survives() {
        let f = filter(100, 100);
        let batch: Vec<Event> = (0..5).map(|i| Event::new(20, 30, i, 1)).collect();
        let mask = f.density_mask(&batch);
        // 5 * 0.140625 > 0.6
        assert!(mask.is_valid(20, 30));
    }

    #[test]
    fn test_cluster_core_survives() {
        let f = filter(32, 32);
        let mut batch = Vec::new();
        for y in 9..=11 {
            for x in 9..=11 {
                batch.push(Event::new(x, y, 0, 1));
            }
        }
        let mask = f.density_mask(&batch);
        assert!(mask.is_valid(10, 10));
        assert!(!mask.is_valid(9, 9));
    }

    #[test]
    fn test_disabled_combine_is_identity() {
        let f = filter(8, 8);
        let mut hot = PixelMask::all_valid(Resolution::new(8, 8).unwrap());
        hot.set_pixel(3, 3, false);
        let batch = vec![Event::new(1, 1, 0, 1)];
        let combined = f.combine(&hot, &batch);
        assert!(matches!(combined, Cow::Borrowed(_)));
        assert_eq!(combined.as_ref(), &hot);
    }

    #[test]
    fn test_enabled_combine_ands_masks() {
        let mut f = filter(16, 16);
        f.toggle();
        let mut hot = PixelMask::all_valid(Resolution::new(16, 16).unwrap());
        hot.set_pixel(5, 5, false);
        let batch: Vec<Event> = (0..10).map(|i| Event::new(5, 5, i, 1)).collect();
        let combined = f.combine(&hot, &batch);
        // dense but hot, so still masked
        assert!(!combined.is_valid(5, 5));
        assert!(!combined.is_valid(0, 0));
    }
}
