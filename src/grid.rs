use crate::error::{Error, Result};
use crate::event::Event;

/// Sensor resolution, fixed for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0
            || height == 0
            || width > crate::MAX_SENSOR_DIM
            || height > crate::MAX_SENSOR_DIM
        {
            return Err(Error::InvalidResolution { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    pub fn pixel_count(&self) -> usize {
        self.width() * self.height()
    }

    /// Row-major index of the event's pixel, or `None` if it lies outside the sensor.
    pub fn index_of(&self, event: &Event) -> Option<usize> {
        let x = event.x as usize;
        let y = event.y as usize;
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(y * self.width() + x)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Row-major per-pixel array with the shape of a sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    data: Vec<T>,
    resolution: Resolution,
}

impl<T: Clone> Grid<T> {
    pub fn filled(resolution: Resolution, value: T) -> Self {
        Self {
            data: vec![value; resolution.pixel_count()],
            resolution,
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Grid<T> {
    /// Wrap existing row-major data. Panics if the length does not match the resolution.
    pub fn from_vec(resolution: Resolution, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            resolution.pixel_count(),
            "grid data does not match resolution {}",
            resolution
        );
        Self { data, resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        assert!(x < self.resolution.width() && y < self.resolution.height());
        &self.data[y * self.resolution.width() + x]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        assert!(x < self.resolution.width() && y < self.resolution.height());
        let w = self.resolution.width();
        &mut self.data[y * w + x]
    }

    /// Fail fast when two per-pixel arrays disagree on shape.
    pub fn assert_same_shape<U>(&self, other: &Grid<U>) {
        assert_eq!(
            self.resolution, other.resolution,
            "per-pixel arrays must share the session resolution"
        );
    }
}
