//! Progress reporting for long-running batches

use std::io::{self, Write};

/// Simple stderr progress reporter for CLI commands
pub struct ProgressReporter {
    label: String,
    total: usize,
    processed: usize,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, total: usize) -> Self {
        Self {
            label: label.into(),
            total,
            processed: 0,
        }
    }

    pub fn update(&mut self, done: usize) {
        self.processed = done;
        eprint!("\r{}: {}/{}", self.label, self.processed, self.total);
        io::stderr().flush().ok();
    }

    pub fn finish(&self) {
        eprintln!("\r{}: {}/{} done", self.label, self.processed, self.total);
    }
}
