use crate::event::Event;
use crate::grid::{Grid, Resolution};

/// Binary per-pixel validity mask.
///
/// `true` means the pixel is valid and its events pass; `false` means it is
/// masked out. Used both for the persistent hot-pixel mask and for the
/// transient per-batch density mask.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelMask {
    cells: Grid<bool>,
}

impl PixelMask {
    /// Create a mask with all pixels valid.
    pub fn all_valid(resolution: Resolution) -> Self {
        Self {
            cells: Grid::filled(resolution, true),
        }
    }

    pub fn from_grid(cells: Grid<bool>) -> Self {
        Self { cells }
    }

    pub fn resolution(&self) -> Resolution {
        self.cells.resolution()
    }

    pub fn as_slice(&self) -> &[bool] {
        self.cells.as_slice()
    }

    /// Returns true if the event lands on a valid pixel. Out-of-bounds events never pass.
    pub fn passes(&self, event: &Event) -> bool {
        match self.resolution().index_of(event) {
            Some(idx) => self.cells.as_slice()[idx],
            None => false,
        }
    }

    /// Check if a specific pixel is valid.
    pub fn is_valid(&self, x: u16, y: u16) -> bool {
        let res = self.resolution();
        if x as usize >= res.width() || y as usize >= res.height() {
            return false;
        }
        *self.cells.get(x as usize, y as usize)
    }

    /// Mark a single pixel valid or masked.
    pub fn set_pixel(&mut self, x: u16, y: u16, valid: bool) {
        let res = self.resolution();
        if (x as usize) < res.width() && (y as usize) < res.height() {
            *self.cells.get_mut(x as usize, y as usize) = valid;
        }
    }

    /// Logical AND with another mask of the same resolution.
    pub fn and(&self, other: &PixelMask) -> PixelMask {
        self.cells.assert_same_shape(&other.cells);
        let data = self
            .as_slice()
            .iter()
            .zip(other.as_slice())
            .map(|(&a, &b)| a && b)
            .collect();
        PixelMask::from_grid(Grid::from_vec(self.resolution(), data))
    }

    /// Count of valid pixels.
    pub fn valid_count(&self) -> usize {
        self.as_slice().iter().filter(|&&v| v).count()
    }

    /// Count of masked-out pixels.
    pub fn masked_count(&self) -> usize {
        self.as_slice().len() - self.valid_count()
    }
}
