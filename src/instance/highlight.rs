//! Per-frame hooks that run just before the draw call.

/// Hook attached to an instance group for its whole activation
#[derive(Debug, Clone, PartialEq)]
pub enum FrameHook {
    None,
    /// Rotating lantern: one instance lit at a time, advanced on a timer
    Highlight(HighlightCycle),
}

/// Timer-driven highlighted index that walks the instance array
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightCycle {
    /// Seconds between advances
    pub interval: f32,
    pub last_update: f32,
    /// None until the first advance
    pub active_index: Option<u32>,
    /// Material property the index is written to
    pub property: String,
}

impl HighlightCycle {
    /// Backdate the timer by one interval so the first draw selects index 0
    pub fn new(interval: f32, start_time: f32, property: String) -> Self {
        Self {
            interval,
            last_update: start_time - interval,
            active_index: None,
            property,
        }
    }

    /// Advance when at least one interval has elapsed.
    ///
    /// Returns the new index when it changed, wrapping from `count - 1` to 0.
    pub fn advance(&mut self, now: f32, count: u32) -> Option<u32> {
        if count == 0 || now - self.last_update < self.interval {
            return None;
        }

        self.last_update = now;
        let next = match self.active_index {
            Some(index) if index + 1 < count => index + 1,
            _ => 0,
        };
        self.active_index = Some(next);
        Some(next)
    }
}
