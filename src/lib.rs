//! Noise filtering for eDVS event streams.
//!
//! Two kinds of sensor noise are removed before events reach visualization
//! or downstream processing:
//!
//! - hot pixels, found by a timed calibration that flags pixels firing more
//!   than `sigma_threshold` standard deviations above the mean rate;
//! - spatially isolated events, dropped by a per-batch density filter that
//!   blurs the batch's event counts and thresholds the result.
//!
//! [`engine::Engine`] applies both to each batch. [`worker::Worker`] runs the
//! engine on a polling thread fed by an [`capture::EventSource`].

pub mod accumulator;
pub mod batch_filter;
pub mod blur;
pub mod capture;
pub mod config;
pub mod density;
pub mod engine;
pub mod error;
pub mod event;
pub mod grid;
pub mod hot_pixel;
pub mod mask;
pub mod slicer;
pub mod worker;

pub use error::{Error, Result};

/// Maximum allowed sensor dimension to prevent excessive memory allocation.
/// 32768 x 32768 = ~1 GB per mask, far beyond any real eDVS sensor.
pub const MAX_SENSOR_DIM: u32 = 32768;
