#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Round scheduler: the timed state machine behind every round.
//!
//! The scheduler never reads a clock or touches storage. Callers feed it the
//! current [`Timestamp`] through [`RoundScheduler::tick`] and the intent
//! methods, and it answers with [`Transition`] values describing what
//! happened. Only one phase is active at a time, so the pre-spawn countdown
//! and the resolution window can never run concurrently. Elapsed time is always
//! derived from the stored reveal instant, which lets a round resume after a
//! restart exactly where it left off.

use std::time::Duration;

use tower_catch_core::{RoundState, Timestamp};
use tracing::debug;

/// Configuration parameters required to construct the round scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    countdown_ticks: u32,
    tick: Duration,
    resolution_window: Duration,
    skip_after: Duration,
    repeat_catch_skip: u32,
    restart_after_catch: Duration,
    restart_after_miss: Duration,
    retry_after_empty: Duration,
}

impl Config {
    /// Creates a configuration with the supplied countdown and resolution timing.
    ///
    /// Skip rules and restart delays start at their standard values.
    #[must_use]
    pub const fn new(countdown_ticks: u32, tick: Duration, resolution_window: Duration) -> Self {
        Self {
            countdown_ticks,
            tick,
            resolution_window,
            skip_after: Duration::from_secs(10),
            repeat_catch_skip: 3,
            restart_after_catch: Duration::from_secs(3),
            restart_after_miss: Duration::from_secs(2),
            retry_after_empty: Duration::from_secs(3),
        }
    }

    /// Sets when a revealed round becomes skippable: after `after` has elapsed,
    /// or immediately once the entity was caught `repeat_catches` times.
    #[must_use]
    pub const fn with_skip_rules(mut self, after: Duration, repeat_catches: u32) -> Self {
        self.skip_after = after;
        self.repeat_catch_skip = repeat_catches;
        self
    }

    /// Sets the idle delays before the next countdown after a catch, after a skip
    /// or expiry, and after drawing an empty tier.
    #[must_use]
    pub const fn with_restart_delays(
        mut self,
        after_catch: Duration,
        after_miss: Duration,
        after_empty: Duration,
    ) -> Self {
        self.restart_after_catch = after_catch;
        self.restart_after_miss = after_miss;
        self.retry_after_empty = after_empty;
        self
    }

    /// Length of the resolution window that follows a reveal.
    #[must_use]
    pub const fn resolution_window(&self) -> Duration {
        self.resolution_window
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(15, Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Observable outcome of driving the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// A pre-spawn countdown began.
    CountdownStarted {
        /// Whole ticks before the reveal.
        ticks: u32,
    },
    /// A countdown tick elapsed.
    CountdownTicked {
        /// Whole ticks still remaining.
        ticks_remaining: u32,
    },
    /// The countdown finished; the caller must draw an entity and either call
    /// [`RoundScheduler::reveal`] or [`RoundScheduler::retry_later`].
    RevealDue,
    /// A freshly drawn round entered its resolution window.
    Revealed {
        /// Snapshot to persist.
        round: RoundState,
        /// Time left before expiry.
        remaining: Duration,
        /// Whether the round may be skipped right away.
        skippable: bool,
    },
    /// A persisted round was reconstructed.
    Resumed {
        /// Snapshot that was resumed.
        round: RoundState,
        /// Time left before expiry.
        remaining: Duration,
        /// Whether the round may be skipped right away.
        skippable: bool,
    },
    /// A whole second of the resolution window elapsed.
    Ticked {
        /// Snapshot to re-persist.
        round: RoundState,
        /// Time left before expiry.
        remaining: Duration,
        /// Whether the round may be skipped.
        skippable: bool,
    },
    /// A submitted guess did not match.
    GuessRejected {
        /// Trimmed guess.
        guess: String,
    },
    /// A submitted guess matched the revealed entity.
    Caught {
        /// Round that was caught.
        round: RoundState,
    },
    /// The player skipped the round.
    Skipped {
        /// Round that was skipped.
        round: RoundState,
    },
    /// A skip was requested before the round became skippable.
    SkipRejected,
    /// The resolution window closed without a catch.
    Expired {
        /// Round that expired.
        round: RoundState,
    },
}

/// Coarse phase reported to renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// No timer runs; a countdown may be scheduled.
    Idle,
    /// The pre-spawn countdown runs.
    Countdown,
    /// A round is revealed and awaits resolution.
    Revealed,
}

/// Read-only snapshot of the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundView {
    /// Current phase.
    pub phase: PhaseKind,
    /// Whole countdown ticks remaining while counting down.
    pub countdown_remaining: Option<u32>,
    /// Revealed round, if any.
    pub round: Option<RoundState>,
    /// Time left in the resolution window while revealed.
    pub remaining: Option<Duration>,
    /// Whether the revealed round may be skipped.
    pub skippable: bool,
    /// Instant at which an idle scheduler starts the next countdown.
    pub restart_at: Option<Timestamp>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ActiveRound {
    state: RoundState,
    lifetime_catches: u32,
    reported_seconds: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle { restart_at: Option<Timestamp> },
    Countdown { started_at: Timestamp, ticks_remaining: u32 },
    Revealed(ActiveRound),
}

/// Finite-state machine sequencing countdown, reveal and resolution.
#[derive(Clone, Debug)]
pub struct RoundScheduler {
    config: Config,
    phase: Phase,
}

impl RoundScheduler {
    /// Creates an idle scheduler with nothing scheduled.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: Phase::Idle { restart_at: None },
        }
    }

    /// Configuration the scheduler was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancels whatever runs and begins a fresh countdown at `now`.
    pub fn start(&mut self, now: Timestamp, out: &mut Vec<Transition>) {
        self.phase = Phase::Countdown {
            started_at: now,
            ticks_remaining: self.config.countdown_ticks,
        };
        debug!(ticks = self.config.countdown_ticks, "countdown started");
        out.push(Transition::CountdownStarted {
            ticks: self.config.countdown_ticks,
        });
        if self.config.countdown_ticks == 0 {
            out.push(Transition::RevealDue);
        }
    }

    /// Cancels both timers and forgets any scheduled restart.
    pub fn cancel(&mut self) {
        self.phase = Phase::Idle { restart_at: None };
    }

    /// Schedules the next countdown after the empty-tier retry delay.
    pub fn retry_later(&mut self, now: Timestamp) {
        self.schedule_restart(now, self.config.retry_after_empty);
    }

    /// Advances timers to `now`.
    pub fn tick(&mut self, now: Timestamp, out: &mut Vec<Transition>) {
        match &mut self.phase {
            Phase::Idle { restart_at } => {
                if restart_at.is_some_and(|at| now >= at) {
                    self.start(now, out);
                }
            }
            Phase::Countdown {
                started_at,
                ticks_remaining,
            } => {
                let elapsed = now.saturating_duration_since(*started_at);
                let remaining = self
                    .config
                    .countdown_ticks
                    .saturating_sub(whole_ticks(elapsed, self.config.tick));
                if remaining < *ticks_remaining {
                    *ticks_remaining = remaining;
                    if remaining > 0 {
                        out.push(Transition::CountdownTicked {
                            ticks_remaining: remaining,
                        });
                    }
                }
                if remaining == 0 {
                    out.push(Transition::RevealDue);
                }
            }
            Phase::Revealed(_) => {
                if self.expire_if_due(now, out) {
                    return;
                }
                let config = self.config;
                if let Phase::Revealed(active) = &mut self.phase {
                    let elapsed = now.saturating_duration_since(active.state.revealed_at());
                    let seconds = elapsed.as_secs();
                    if seconds > active.reported_seconds {
                        active.reported_seconds = seconds;
                        out.push(Transition::Ticked {
                            round: active.state.clone(),
                            remaining: remaining_after(&config, seconds),
                            skippable: skippable(&config, elapsed, active.lifetime_catches),
                        });
                    }
                }
            }
        }
    }

    /// Ends a running countdown early; the caller must then draw the round.
    pub fn advance_countdown(&mut self, out: &mut Vec<Transition>) {
        if let Phase::Countdown {
            ticks_remaining, ..
        } = &mut self.phase
        {
            *ticks_remaining = 0;
            out.push(Transition::RevealDue);
        }
    }

    /// Enters the resolution window for `round`, cancelling whatever ran before.
    ///
    /// `lifetime_catches` is the player's catch count for the entity and drives
    /// immediate skippability.
    pub fn reveal(
        &mut self,
        round: RoundState,
        lifetime_catches: u32,
        now: Timestamp,
        out: &mut Vec<Transition>,
    ) {
        let elapsed = now.saturating_duration_since(round.revealed_at());
        let seconds = elapsed.as_secs();
        debug!(entity = round.entity(), tier = %round.tier(), "round revealed");
        out.push(Transition::Revealed {
            round: round.clone(),
            remaining: remaining_after(&self.config, seconds),
            skippable: skippable(&self.config, elapsed, lifetime_catches),
        });
        self.phase = Phase::Revealed(ActiveRound {
            state: round,
            lifetime_catches,
            reported_seconds: seconds,
        });
    }

    /// Reconstructs a persisted round.
    ///
    /// Returns `false` and leaves the scheduler idle when the resolution window
    /// already closed; the caller discards the snapshot and starts a countdown.
    pub fn resume(
        &mut self,
        round: RoundState,
        lifetime_catches: u32,
        now: Timestamp,
        out: &mut Vec<Transition>,
    ) -> bool {
        let elapsed = now.saturating_duration_since(round.revealed_at());
        if elapsed >= self.config.resolution_window {
            debug!(entity = round.entity(), "persisted round already expired");
            self.phase = Phase::Idle {
                restart_at: Some(now),
            };
            return false;
        }

        let seconds = elapsed.as_secs();
        debug!(entity = round.entity(), elapsed_secs = seconds, "round resumed");
        out.push(Transition::Resumed {
            round: round.clone(),
            remaining: remaining_after(&self.config, seconds),
            skippable: skippable(&self.config, elapsed, lifetime_catches),
        });
        self.phase = Phase::Revealed(ActiveRound {
            state: round,
            lifetime_catches,
            reported_seconds: seconds,
        });
        true
    }

    /// Compares a guess against the revealed entity.
    ///
    /// Blank guesses and guesses outside the resolution window are ignored.
    pub fn submit(&mut self, guess: &str, now: Timestamp, out: &mut Vec<Transition>) {
        let guess = guess.trim();
        if guess.is_empty() || self.expire_if_due(now, out) {
            return;
        }
        let Phase::Revealed(active) = &self.phase else {
            return;
        };

        if guess.to_lowercase() != active.state.entity().trim().to_lowercase() {
            out.push(Transition::GuessRejected {
                guess: guess.to_owned(),
            });
            return;
        }

        let round = active.state.clone();
        debug!(entity = round.entity(), "round caught");
        self.schedule_restart(now, self.config.restart_after_catch);
        out.push(Transition::Caught { round });
    }

    /// Abandons the revealed round when it is skippable.
    pub fn skip(&mut self, now: Timestamp, out: &mut Vec<Transition>) {
        if self.expire_if_due(now, out) {
            return;
        }
        let Phase::Revealed(active) = &self.phase else {
            return;
        };

        let elapsed = now.saturating_duration_since(active.state.revealed_at());
        if !skippable(&self.config, elapsed, active.lifetime_catches) {
            out.push(Transition::SkipRejected);
            return;
        }

        let round = active.state.clone();
        debug!(entity = round.entity(), "round skipped");
        self.schedule_restart(now, self.config.restart_after_miss);
        out.push(Transition::Skipped { round });
    }

    /// Revealed round, if any.
    #[must_use]
    pub fn active_round(&self) -> Option<&RoundState> {
        match &self.phase {
            Phase::Revealed(active) => Some(&active.state),
            _ => None,
        }
    }

    /// Captures the scheduler state as seen at `now`.
    #[must_use]
    pub fn view(&self, now: Timestamp) -> RoundView {
        match &self.phase {
            Phase::Idle { restart_at } => RoundView {
                phase: PhaseKind::Idle,
                countdown_remaining: None,
                round: None,
                remaining: None,
                skippable: false,
                restart_at: *restart_at,
            },
            Phase::Countdown {
                ticks_remaining, ..
            } => RoundView {
                phase: PhaseKind::Countdown,
                countdown_remaining: Some(*ticks_remaining),
                round: None,
                remaining: None,
                skippable: false,
                restart_at: None,
            },
            Phase::Revealed(active) => {
                let elapsed = now.saturating_duration_since(active.state.revealed_at());
                RoundView {
                    phase: PhaseKind::Revealed,
                    countdown_remaining: None,
                    round: Some(active.state.clone()),
                    remaining: Some(self.config.resolution_window.saturating_sub(elapsed)),
                    skippable: skippable(&self.config, elapsed, active.lifetime_catches),
                    restart_at: None,
                }
            }
        }
    }

    fn expire_if_due(&mut self, now: Timestamp, out: &mut Vec<Transition>) -> bool {
        let Phase::Revealed(active) = &self.phase else {
            return false;
        };
        if now < active.state.deadline(self.config.resolution_window) {
            return false;
        }

        let round = active.state.clone();
        debug!(entity = round.entity(), "round expired");
        self.schedule_restart(now, self.config.restart_after_miss);
        out.push(Transition::Expired { round });
        true
    }

    fn schedule_restart(&mut self, now: Timestamp, delay: Duration) {
        self.phase = Phase::Idle {
            restart_at: Some(now.saturating_add(delay)),
        };
    }
}

fn whole_ticks(elapsed: Duration, tick: Duration) -> u32 {
    if tick.is_zero() {
        return u32::MAX;
    }
    let ticks = elapsed.as_millis() / tick.as_millis().max(1);
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

fn remaining_after(config: &Config, elapsed_seconds: u64) -> Duration {
    config
        .resolution_window
        .saturating_sub(Duration::from_secs(elapsed_seconds))
}

fn skippable(config: &Config, elapsed: Duration, lifetime_catches: u32) -> bool {
    lifetime_catches >= config.repeat_catch_skip || elapsed >= config.skip_after
}

#[cfg(test)]
mod tests {
    use tower_catch_core::Tier;

    use super::*;

    fn at(seconds: u64) -> Timestamp {
        Timestamp::from_millis(seconds * 1_000)
    }

    fn revealed_at(seconds: u64) -> RoundState {
        RoundState::new("Alpha".to_owned(), Tier::Easy, at(seconds), false)
    }

    #[test]
    fn countdown_counts_whole_ticks_then_requests_reveal() {
        let mut scheduler = RoundScheduler::new(Config::default());
        let mut out = Vec::new();
        scheduler.start(at(0), &mut out);
        scheduler.tick(Timestamp::from_millis(900), &mut out);
        scheduler.tick(at(1), &mut out);
        scheduler.tick(at(4), &mut out);
        assert_eq!(
            out,
            vec![
                Transition::CountdownStarted { ticks: 15 },
                Transition::CountdownTicked { ticks_remaining: 14 },
                Transition::CountdownTicked { ticks_remaining: 11 },
            ]
        );

        out.clear();
        scheduler.tick(at(15), &mut out);
        assert_eq!(out, vec![Transition::RevealDue]);
    }

    #[test]
    fn advancing_countdown_requests_reveal_immediately() {
        let mut scheduler = RoundScheduler::new(Config::default());
        let mut out = Vec::new();
        scheduler.advance_countdown(&mut out);
        assert!(out.is_empty(), "idle scheduler has no countdown to advance");

        scheduler.start(at(0), &mut out);
        out.clear();
        scheduler.advance_countdown(&mut out);
        assert_eq!(out, vec![Transition::RevealDue]);
    }

    #[test]
    fn resolution_ticks_report_skippability_after_threshold() {
        let mut scheduler = RoundScheduler::new(Config::default());
        let mut out = Vec::new();
        scheduler.reveal(revealed_at(100), 0, at(100), &mut out);
        assert!(matches!(
            out.as_slice(),
            [Transition::Revealed { skippable: false, remaining, .. }]
                if *remaining == Duration::from_secs(60)
        ));

        out.clear();
        scheduler.tick(at(109), &mut out);
        scheduler.tick(at(110), &mut out);
        let skippable: Vec<bool> = out
            .iter()
            .filter_map(|transition| match transition {
                Transition::Ticked { skippable, .. } => Some(*skippable),
                _ => None,
            })
            .collect();
        assert_eq!(skippable, vec![false, true]);
    }

    #[test]
    fn skip_is_rejected_until_skippable() {
        let mut scheduler = RoundScheduler::new(Config::default());
        let mut out = Vec::new();
        scheduler.reveal(revealed_at(0), 0, at(0), &mut out);
        out.clear();

        scheduler.skip(at(5), &mut out);
        assert_eq!(out, vec![Transition::SkipRejected]);
        assert!(scheduler.active_round().is_some());

        out.clear();
        scheduler.skip(at(10), &mut out);
        assert_eq!(
            out,
            vec![Transition::Skipped {
                round: revealed_at(0)
            }]
        );
        assert_eq!(scheduler.view(at(10)).restart_at, Some(at(12)));
    }

    #[test]
    fn repeat_catches_make_round_skippable_at_once() {
        let mut scheduler = RoundScheduler::new(Config::default());
        let mut out = Vec::new();
        scheduler.reveal(revealed_at(0), 3, at(0), &mut out);
        out.clear();
        scheduler.skip(at(1), &mut out);
        assert!(matches!(out.as_slice(), [Transition::Skipped { .. }]));
    }

    #[test]
    fn guesses_match_case_insensitively_after_trimming() {
        let mut scheduler = RoundScheduler::new(Config::default());
        let mut out = Vec::new();
        scheduler.reveal(revealed_at(0), 0, at(0), &mut out);
        out.clear();

        scheduler.submit("   ", at(1), &mut out);
        assert!(out.is_empty());

        scheduler.submit("beta", at(1), &mut out);
        assert_eq!(
            out,
            vec![Transition::GuessRejected {
                guess: "beta".to_owned()
            }]
        );

        out.clear();
        scheduler.submit("  aLPHA ", at(2), &mut out);
        assert_eq!(
            out,
            vec![Transition::Caught {
                round: revealed_at(0)
            }]
        );
        let view = scheduler.view(at(2));
        assert_eq!(view.phase, PhaseKind::Idle);
        assert_eq!(view.restart_at, Some(at(5)));
    }

    #[test]
    fn window_closing_expires_round_and_schedules_restart() {
        let mut scheduler = RoundScheduler::new(Config::default());
        let mut out = Vec::new();
        scheduler.reveal(revealed_at(0), 0, at(0), &mut out);
        out.clear();

        scheduler.tick(at(60), &mut out);
        assert_eq!(
            out,
            vec![Transition::Expired {
                round: revealed_at(0)
            }]
        );

        out.clear();
        scheduler.tick(at(61), &mut out);
        assert!(out.is_empty());
        scheduler.tick(at(62), &mut out);
        assert_eq!(out, vec![Transition::CountdownStarted { ticks: 15 }]);
    }

    #[test]
    fn late_guess_expires_instead_of_catching() {
        let mut scheduler = RoundScheduler::new(Config::default());
        let mut out = Vec::new();
        scheduler.reveal(revealed_at(0), 0, at(0), &mut out);
        out.clear();
        scheduler.submit("Alpha", at(75), &mut out);
        assert!(matches!(out.as_slice(), [Transition::Expired { .. }]));
    }

    #[test]
    fn retry_later_uses_empty_tier_delay() {
        let mut scheduler = RoundScheduler::new(Config::default());
        scheduler.retry_later(at(20));
        assert_eq!(scheduler.view(at(20)).restart_at, Some(at(23)));
        scheduler.cancel();
        assert_eq!(scheduler.view(at(20)).restart_at, None);
    }
}
