use crate::event::Event;
use crate::grid::{Grid, Resolution};

/// Grayscale preview frame, one byte per sensor pixel.
pub type PreviewImage = Grid<u8>;

/// Turns accepted events into a displayable preview frame.
pub trait FrameAccumulator: Send {
    fn accept(&mut self, batch: &[Event]);

    /// Render the current frame, or `None` if nothing can be shown yet.
    fn generate_frame(&mut self) -> Option<PreviewImage>;
}

/// Event accumulation frame with step decay.
///
/// ON events (+1) add `contribution` to the pixel potential, OFF events (-1)
/// subtract it, clamped to [`min_potential`, `max_potential`]. Generating a
/// frame maps the potentials onto [0, 255] and then resets every pixel to the
/// neutral potential, so each frame shows only the events since the last one.
pub struct StepAccumulator {
    potentials: Grid<f32>,
    contribution: f32,
    neutral: f32,
    min_potential: f32,
    max_potential: f32,
}

impl StepAccumulator {
    pub fn new(resolution: Resolution) -> Self {
        Self::with_params(resolution, 0.15, 0.0, 0.0, 1.0)
    }

    pub fn with_params(
        resolution: Resolution,
        contribution: f32,
        neutral: f32,
        min_potential: f32,
        max_potential: f32,
    ) -> Self {
        assert!(contribution > 0.0, "contribution must be positive");
        assert!(
            min_potential < max_potential,
            "min_potential must be below max_potential"
        );
        assert!(
            min_potential <= neutral && neutral <= max_potential,
            "neutral must be in [min_potential, max_potential]"
        );
        Self {
            potentials: Grid::filled(resolution, neutral),
            contribution,
            neutral,
            min_potential,
            max_potential,
        }
    }

    /// Accumulate a single event into the frame.
    pub fn accumulate(&mut self, event: &Event) {
        let Some(idx) = self.potentials.resolution().index_of(event) else {
            return;
        };
        let cell = &mut self.potentials.as_mut_slice()[idx];
        let delta = self.contribution * event.polarity as f32;
        *cell = (*cell + delta).clamp(self.min_potential, self.max_potential);
    }

    pub fn potentials(&self) -> &[f32] {
        self.potentials.as_slice()
    }

    /// Reset the frame to the neutral potential.
    pub fn reset(&mut self) {
        self.potentials.fill(self.neutral);
    }
}

impl FrameAccumulator for StepAccumulator {
    fn accept(&mut self, batch: &[Event]) {
        for event in batch {
            self.accumulate(event);
        }
    }

    fn generate_frame(&mut self) -> Option<PreviewImage> {
        let range = self.max_potential - self.min_potential;
        let pixels = self
            .potentials
            .as_slice()
            .iter()
            .map(|&v| (((v - self.min_potential) / range) * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();
        let frame = Grid::from_vec(self.potentials.resolution(), pixels);
        self.reset();
        Some(frame)
    }
}
