use serde::{Deserialize, Serialize};

/// Progress counters for the batch currently running, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub active: bool,
    pub processed_count: usize,
    pub total: usize,
    pub interrupt_requested: bool,
}

impl ProcessingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, total: usize) {
        self.active = true;
        self.processed_count = 0;
        self.total = total;
        self.interrupt_requested = false;
    }

    pub fn increment(&mut self) {
        self.processed_count += 1;
    }

    pub fn finish(&mut self) {
        self.active = false;
        self.interrupt_requested = false;
    }

    pub fn progress_label(&self) -> String {
        format!("{}/{}", self.processed_count, self.total)
    }
}
