// Activity log
// Bounded, timestamped record of what happened during runs and on the realtime channel

use chrono::{DateTime, Local};
use std::collections::VecDeque;

/// Lines kept when no capacity is configured
pub const DEFAULT_ACTIVITY_LINES: usize = 500;

/// One line of the activity log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub at: DateTime<Local>,
    pub line: String,
}

impl ActivityEntry {
    /// Line prefixed with its local wall-clock time
    pub fn display(&self) -> String {
        format!("[{}] {}", self.at.format("%H:%M:%S"), self.line)
    }
}

/// Ring of the most recent activity lines
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    /// Maximum number of lines to keep (0 = unlimited)
    max_lines: usize,
}

impl ActivityLog {
    pub fn new(max_lines: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_lines,
        }
    }

    /// Add a line, evicting the oldest one when full
    pub fn push(&mut self, line: String) {
        self.entries.push_back(ActivityEntry {
            at: Local::now(),
            line,
        });
        if self.max_lines > 0 && self.entries.len() > self.max_lines {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_LINES)
    }
}
