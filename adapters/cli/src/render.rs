//! Plain-text presentation of events and views.

use std::{fmt::Write as _, time::Duration};

use tower_catch_core::{Event, Timestamp};
use tower_catch_store::KeyValueStore;
use tower_catch_world::{
    query::{self, PhaseKind},
    Session,
};

use crate::input::{self, View};

const SIGN_IN_HINT: &str =
    "Sign in with /login <name> <password> or /register <name> <password> <password>.";
const COUNTDOWN_ECHO_FROM: u32 = 3;
const REMAINING_ECHO_EVERY: u64 = 15;

/// Hint printed when no session could be resumed.
pub(crate) fn sign_in_hint() -> &'static str {
    SIGN_IN_HINT
}

/// Line printed for an event, or `None` for events that stay silent.
pub(crate) fn event(event: &Event) -> Option<String> {
    let line = match event {
        Event::AccountRegistered { account } => format!("Account {account} created."),
        Event::SessionStarted { account } => format!("Signed in as {account}."),
        Event::SessionEnded { account } => format!("Signed out of {account}."),
        Event::AuthenticationRejected { reason } => format!("Sign-in failed: {reason}."),
        Event::SignInRequired => SIGN_IN_HINT.to_owned(),
        Event::CountdownStarted { ticks } => {
            format!("Next tower in {ticks}s. Type /go to stop waiting.")
        }
        Event::CountdownTicked { ticks_remaining } => {
            if *ticks_remaining == 0 || *ticks_remaining > COUNTDOWN_ECHO_FROM {
                return None;
            }
            format!("{ticks_remaining}...")
        }
        Event::RoundRevealed {
            entity,
            tier,
            remaining,
            intentional,
            ..
        } => {
            let source = if *intentional { " Shop spawn." } else { "" };
            format!(
                "[{tier}] {entity} appeared! Type its name within {}s.{source}",
                remaining.as_secs()
            )
        }
        Event::RoundResumed {
            entity,
            tier,
            remaining,
            ..
        } => format!("Back to [{tier}] {entity}, {}s left.", remaining.as_secs()),
        Event::RoundTicked { remaining, .. } => {
            let seconds = remaining.as_secs();
            if seconds == 0 || seconds % REMAINING_ECHO_EVERY != 0 {
                return None;
            }
            format!("{seconds}s left.")
        }
        Event::GuessRejected { guess } => format!("`{guess}` is not it."),
        Event::RoundCaught {
            entity,
            tier,
            catch_count,
            reward,
            badges,
        } => {
            let mut line = format!("Caught {entity} [{tier}]! You have caught it {catch_count}x.");
            if *reward > 0 {
                let _ = write!(line, " +{reward} gems.");
            }
            for badge in badges {
                let _ = write!(line, "\nBadge unlocked: {}", badge.display_name());
            }
            line
        }
        Event::RoundSkipped { entity, .. } => format!("Skipped {entity}."),
        Event::SkipRejected => "Too early to skip this one.".to_owned(),
        Event::RoundExpired { entity, tier } => format!("{entity} [{tier}] got away."),
        Event::RoundUnavailable { tier } => {
            format!("No {tier} towers are installed; drawing again shortly.")
        }
        Event::CurrencyChanged { balance } => format!("Balance: {balance} gems."),
        Event::ShopPurchaseRejected { tier, reason } => {
            format!("Cannot buy a {tier} spawn: {reason}.")
        }
        Event::AnnouncementShown { announcement } => {
            if announcement.amplified() {
                format!("*** {} ***", announcement.text())
            } else {
                format!("** {}", announcement.text())
            }
        }
        Event::UsernameChanged { from, to } => format!("Renamed {from} to {to}."),
        Event::UsernameChangeRejected { reason } => format!("Rename failed: {reason}."),
        Event::ProfileUpdated { .. } => "Profile updated.".to_owned(),
        Event::ProfileUpdateRejected { reason } => format!("Profile not updated: {reason}."),
        Event::PasswordChanged => "Password changed.".to_owned(),
        Event::PasswordChangeRejected { reason } => format!("Password not changed: {reason}."),
        Event::ProgressReset { account } => format!("Progress reset for {account}."),
        Event::AccountRemoved { account } => format!("Account {account} removed."),
        Event::AccountRemovalRejected { account, reason } => {
            format!("Cannot remove {account}: {reason}.")
        }
        Event::AnnouncementQueued { .. }
        | Event::AnnouncementCleared
        | Event::PlaytimeAccrued { .. } => return None,
    };
    Some(line)
}

/// Text of a read-only view.
pub(crate) fn view<S: KeyValueStore>(session: &Session<S>, view: &View, now: Timestamp) -> String {
    match view {
        View::Help => input::help(),
        View::Status => status(session, now),
        View::Shop => shop(session),
        View::Profile(username) => {
            let target = username
                .as_deref()
                .or_else(|| query::active_account(session));
            match target {
                Some(target) => profile(session, target),
                None => SIGN_IN_HINT.to_owned(),
            }
        }
        View::Badges => badges(session),
        View::Collection => collection(session),
        View::Stats => match query::global_stats(session) {
            Some(stats) => format!(
                "Players: {}\nPlaytime: {}\nTower catches: {}",
                stats.total_players,
                playtime(stats.total_playtime_seconds),
                stats.total_tower_catches
            ),
            None => "Only owners and co-owners can view global statistics.".to_owned(),
        },
        View::Search(text) => {
            let matches = query::search_accounts(session, text);
            if matches.is_empty() {
                format!("No accounts match `{text}`.")
            } else {
                matches.join("\n")
            }
        }
    }
}

fn status<S>(session: &Session<S>, now: Timestamp) -> String {
    let Some(account) = query::active_account(session) else {
        return SIGN_IN_HINT.to_owned();
    };
    let mut text = format!(
        "{account} ({}), {} gems",
        query::rank(session, account).label(),
        query::currency(session).unwrap_or(0)
    );

    let round = query::round(session, now);
    let _ = match (round.phase, &round.round) {
        (PhaseKind::Countdown, _) => write!(
            text,
            "\nNext tower in {}s.",
            round.countdown_remaining.unwrap_or(0)
        ),
        (PhaseKind::Revealed, Some(state)) => write!(
            text,
            "\n[{}] {}: {}s left, {}.",
            state.tier(),
            state.entity(),
            round.remaining.unwrap_or(Duration::ZERO).as_secs(),
            if round.skippable { "skippable" } else { "not skippable yet" }
        ),
        _ => write!(text, "\nWaiting for the next countdown."),
    };

    if let Some(announcement) = query::announcement(session) {
        let _ = write!(text, "\n** {}", announcement.text());
    }
    text
}

fn shop<S>(session: &Session<S>) -> String {
    let mut text = format!("Balance: {} gems", query::currency(session).unwrap_or(0));
    for offer in query::shop_offers(session) {
        let note = match (offer.available, offer.affordable) {
            (false, _) => "  (no towers)",
            (true, false) => "  (cannot afford)",
            (true, true) => "",
        };
        let _ = write!(
            text,
            "\n/shop {:<13} {:>5} gems{note}",
            offer.tier.key(),
            offer.cost
        );
    }
    text
}

fn profile<S: KeyValueStore>(session: &Session<S>, username: &str) -> String {
    let Some(summary) = query::profile_summary(session, username) else {
        return format!("No account named `{username}`.");
    };
    let unset = |value: &str| {
        if value.is_empty() {
            "-".to_owned()
        } else {
            value.to_owned()
        }
    };
    format!(
        concat!(
            "{} [{}]\n\"{}\"\n",
            "Favourite: {}\nLeast favourite: {}\nPlaytime: {}\n",
            "Unique: {}  Total: {}  Hardest: {}\nBadges: {}",
        ),
        summary.account,
        summary.rank.label(),
        summary.quote,
        unset(&summary.favorite_entity),
        unset(&summary.least_favorite_entity),
        playtime(summary.playtime_seconds),
        summary.unique_count,
        summary.total_count,
        summary
            .hardest_tier
            .map_or_else(|| "-".to_owned(), |tier| tier.to_string()),
        summary.badge_count,
    )
}

fn badges<S>(session: &Session<S>) -> String {
    query::badges(session)
        .into_iter()
        .map(|status| {
            let mark = if status.unlocked { 'x' } else { ' ' };
            format!("[{mark}] {}: {}", status.name, status.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn collection<S>(session: &Session<S>) -> String {
    let mut text = format!(
        "{} of {} towers caught",
        query::unique_count(session),
        query::catalog(session).len()
    );
    for page in query::collection(session) {
        if page.entries.is_empty() {
            continue;
        }
        let _ = write!(text, "\n{} ({}/{})", page.tier, page.caught(), page.entries.len());
        for entry in &page.entries {
            let _ = if entry.count > 0 {
                write!(text, "\n  {} x{}", entry.entity, entry.count)
            } else {
                write!(text, "\n  {}", entry.entity)
            };
        }
    }
    text
}

fn playtime(seconds: u64) -> String {
    format!("{}h {}m {}s", seconds / 3_600, seconds % 3_600 / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_catch_core::{Announcement, BadgeId, Catalog, Command, Tier};
    use tower_catch_store::MemoryStore;
    use tower_catch_world::{apply, Config};

    fn session() -> Session<MemoryStore> {
        let catalog = Catalog::from_tiers([(Tier::Easy, vec!["Alpha", "Beta"])]);
        Session::open(MemoryStore::new(), catalog, Config::new(7), Timestamp::from_millis(0))
            .expect("playable catalog")
    }

    #[test]
    fn countdown_only_echoes_final_ticks() {
        assert_eq!(event(&Event::CountdownTicked { ticks_remaining: 9 }), None);
        assert_eq!(
            event(&Event::CountdownTicked { ticks_remaining: 2 }),
            Some("2...".to_owned())
        );
        assert_eq!(
            event(&Event::RoundTicked {
                remaining: Duration::from_secs(30),
                skippable: false
            }),
            Some("30s left.".to_owned())
        );
    }

    #[test]
    fn catches_list_reward_and_badges() {
        let line = event(&Event::RoundCaught {
            entity: "Alpha".to_owned(),
            tier: Tier::Easy,
            catch_count: 1,
            reward: 2,
            badges: vec![BadgeId::Tier(Tier::Easy), BadgeId::FirstCatch],
        })
        .expect("caught is printed");
        assert!(line.starts_with("Caught Alpha [Easy]!"));
        assert!(line.contains("+2 gems"));
        assert!(line.contains("Badge unlocked: First Tower"));
    }

    #[test]
    fn amplified_announcements_stand_out() {
        let announcement = Announcement::for_catch("Ann", "Omega", Tier::Error).expect("announced");
        let line = event(&Event::AnnouncementShown { announcement }).expect("shown");
        assert!(line.starts_with("*** "));
        assert_eq!(event(&Event::AnnouncementCleared), None);
    }

    #[test]
    fn views_without_a_session_prompt_for_sign_in() {
        let session = session();
        let now = Timestamp::from_millis(0);
        assert_eq!(view(&session, &View::Status, now), SIGN_IN_HINT);
        assert!(view(&session, &View::Stats, now).starts_with("Only owners"));
    }

    #[test]
    fn profile_view_shows_placeholder_quote() {
        let mut session = session();
        let mut events = Vec::new();
        apply(
            &mut session,
            Command::Register {
                username: "Ann".to_owned(),
                password: "secret".to_owned(),
                confirmation: "secret".to_owned(),
            },
            Timestamp::from_millis(0),
            &mut events,
        );

        let text = view(&session, &View::Profile(None), Timestamp::from_millis(0));
        assert!(text.starts_with("Ann [Player]"));
        assert!(text.contains("\"No quote yet.\""));
        assert!(view(&session, &View::Profile(Some("nobody".to_owned())), Timestamp::from_millis(0))
            .starts_with("No account named"));
    }

    #[test]
    fn shop_marks_empty_tiers() {
        let session = session();
        let text = view(&session, &View::Shop, Timestamp::from_millis(0));
        assert!(text.contains("/shop easy"));
        assert!(text.contains("(no towers)"));
    }

    #[test]
    fn playtime_splits_units() {
        assert_eq!(playtime(3_725), "1h 2m 5s");
    }
}
