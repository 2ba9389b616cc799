use tower_catch_core::Timestamp;

const MILLIS_PER_SECOND: u64 = 1_000;

/// Converts wall-clock time into whole seconds of playtime.
///
/// Fractions of a second stay in the anchor and carry over into the next
/// accrual, so nothing is lost between ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PlaytimeTracker {
    anchor: Option<Timestamp>,
}

impl PlaytimeTracker {
    pub(crate) fn start(&mut self, now: Timestamp) {
        self.anchor = Some(now);
    }

    /// Whole seconds elapsed since the last accrual.
    pub(crate) fn accrue(&mut self, now: Timestamp) -> u64 {
        let Some(anchor) = self.anchor else {
            return 0;
        };
        let seconds = now.saturating_duration_since(anchor).as_secs();
        if seconds > 0 {
            self.anchor = Some(Timestamp::from_millis(
                anchor
                    .as_millis()
                    .saturating_add(seconds.saturating_mul(MILLIS_PER_SECOND)),
            ));
        }
        seconds
    }

    /// Commits the remaining whole seconds and stops tracking.
    pub(crate) fn stop(&mut self, now: Timestamp) -> u64 {
        let seconds = self.accrue(now);
        self.anchor = None;
        seconds
    }
}
