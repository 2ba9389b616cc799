#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! FIFO broadcast queue for high-rarity catches.
//!
//! Announcements are displayed one at a time for a fixed duration in the order
//! they were queued. The board only guarantees ordering and timing; how an
//! announcement looks is left to renderers.

use std::{collections::VecDeque, time::Duration};

use tower_catch_core::{Announcement, Event, Timestamp};

/// Configuration parameters required to construct the announcement board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    display_duration: Duration,
}

impl Config {
    /// Creates a configuration showing every announcement for `display_duration`.
    #[must_use]
    pub const fn new(display_duration: Duration) -> Self {
        Self { display_duration }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[derive(Clone, Debug)]
struct Showing {
    announcement: Announcement,
    until: Timestamp,
}

/// Queue that drains announcements one at a time.
#[derive(Clone, Debug)]
pub struct AnnouncementBoard {
    display_duration: Duration,
    pending: VecDeque<Announcement>,
    showing: Option<Showing>,
}

impl AnnouncementBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            display_duration: config.display_duration,
            pending: VecDeque::new(),
            showing: None,
        }
    }

    /// Appends an announcement, displaying it at once when nothing is on display.
    pub fn enqueue(&mut self, announcement: Announcement, now: Timestamp, out: &mut Vec<Event>) {
        out.push(Event::AnnouncementQueued {
            announcement: announcement.clone(),
        });
        self.pending.push_back(announcement);
        if self.showing.is_none() {
            self.show_next(now, out);
        }
    }

    /// Retires announcements whose display duration elapsed and shows the next ones.
    pub fn tick(&mut self, now: Timestamp, out: &mut Vec<Event>) {
        while let Some(until) = self.showing.as_ref().map(|showing| showing.until) {
            if now < until {
                break;
            }
            self.showing = None;
            out.push(Event::AnnouncementCleared);
            self.show_next(until, out);
        }
    }

    /// Announcement currently on display.
    #[must_use]
    pub fn current(&self) -> Option<&Announcement> {
        self.showing.as_ref().map(|showing| &showing.announcement)
    }

    /// Number of announcements waiting behind the displayed one.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn show_next(&mut self, start: Timestamp, out: &mut Vec<Event>) {
        let Some(announcement) = self.pending.pop_front() else {
            return;
        };
        out.push(Event::AnnouncementShown {
            announcement: announcement.clone(),
        });
        self.showing = Some(Showing {
            announcement,
            until: start.saturating_add(self.display_duration),
        });
    }
}
