use crate::event::{Event, EventBatch};

/// How a continuous event stream is cut into batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceMode {
    /// A batch closes once it holds N events.
    ByCount(usize),
    /// A batch closes at the first event T microseconds after its first event.
    ByTime(i64),
}

/// Event stream slicer.
///
/// Buffers events and hands out complete batches at slice boundaries.
/// Event order is preserved across and within batches.
pub struct EventSlicer {
    mode: SliceMode,
    pending: EventBatch,
}

impl EventSlicer {
    pub fn new(mode: SliceMode) -> Self {
        match mode {
            SliceMode::ByCount(n) => assert!(n > 0, "batch size must be positive"),
            SliceMode::ByTime(us) => assert!(us > 0, "batch duration must be positive"),
        }
        Self {
            mode,
            pending: Vec::new(),
        }
    }

    /// Add an event. Returns the completed batch if a slice boundary was reached.
    pub fn push(&mut self, event: Event) -> Option<EventBatch> {
        match self.mode {
            SliceMode::ByCount(n) => {
                self.pending.push(event);
                if self.pending.len() >= n {
                    Some(std::mem::take(&mut self.pending))
                } else {
                    None
                }
            }
            SliceMode::ByTime(us) => {
                let closes = self
                    .pending
                    .first()
                    .is_some_and(|first| event.timestamp.saturating_sub(first.timestamp) >= us);
                let done = if closes {
                    Some(std::mem::take(&mut self.pending))
                } else {
                    None
                };
                self.pending.push(event);
                done
            }
        }
    }

    /// Hand out whatever is buffered, if anything.
    pub fn flush(&mut self) -> Option<EventBatch> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn mode(&self) -> SliceMode {
        self.mode
    }
}
