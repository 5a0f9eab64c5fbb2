//! Utility functions and types

pub mod data_loader;

pub use data_loader::{DataLoader, FileFormat};

use std::time::{Duration, Instant};

/// Simple wall-clock timer for stage bookkeeping
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
