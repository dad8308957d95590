//! Mouth animation for the narrating avatar.

use std::time::Duration;

/// Cyclic sequence of mouth frames shown while speaking.
pub const TALK_PATTERN: [u8; 11] = [0, 1, 2, 1, 2, 1, 0, 1, 2, 1, 0];

/// Interval between two animation ticks.
pub const FRAME_PERIOD: Duration = Duration::from_millis(95);

/// The frame shown whenever nothing is being said.
pub const NEUTRAL_FRAME: u8 = 0;

/// Steps through [`TALK_PATTERN`], wrapping at the end.
#[derive(Debug, Clone, Default)]
pub struct MouthAnimator {
    index: usize,
}

impl MouthAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances one tick and returns the frame to display.
    pub fn advance(&mut self) -> u8 {
        self.index = (self.index + 1) % TALK_PATTERN.len();
        TALK_PATTERN[self.index]
    }
}
