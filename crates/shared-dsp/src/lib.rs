//! Real-time DSP building blocks shared across the workspace.
//!
//! Nothing in here allocates after construction.

pub mod metrics;
pub mod ring_buffer;

pub use metrics::{LevelMeter, MetricsSnapshot};
pub use ring_buffer::QueueBuffer;
