use std::collections::BTreeMap;

use tower_catch_core::{
    AccountError, BadgeId, Catalog, Command, Event, ProfilePreservation, Rank, Tier, Timestamp,
};
use tower_catch_store::{KeyValueStore, MemoryStore};
use tower_catch_world::{apply, query, Config, Session};

const START: u64 = 1_700_000_000_000;

fn at(seconds: u64) -> Timestamp {
    Timestamp::from_millis(START + seconds * 1_000)
}

fn catalog() -> Catalog {
    Catalog::from_tiers([
        (Tier::Easy, vec!["Alpha"]),
        (Tier::Hard, vec!["Hammer"]),
    ])
}

fn open(store: MemoryStore) -> Session<MemoryStore> {
    open_with(store, catalog())
}

fn open_with(store: MemoryStore, catalog: Catalog) -> Session<MemoryStore> {
    Session::open(store, catalog, Config::new(0x7ee), at(0)).expect("playable catalog")
}

fn run(session: &mut Session<MemoryStore>, command: Command, seconds: u64) -> Vec<Event> {
    let mut events = Vec::new();
    apply(session, command, at(seconds), &mut events);
    events
}

fn register(session: &mut Session<MemoryStore>, username: &str) -> Vec<Event> {
    run(
        session,
        Command::Register {
            username: username.to_owned(),
            password: "pass".to_owned(),
            confirmation: "pass".to_owned(),
        },
        0,
    )
}

/// Registers `username`, then signs back in over the given saved records.
fn register_with(
    session: &mut Session<MemoryStore>,
    username: &str,
    records: &[(&str, &str)],
) -> Vec<Event> {
    let _ = register(session, username);
    let _ = run(session, Command::Logout, 0);
    for (key, value) in records {
        session.store_mut().set(key, value).expect("seed record");
    }
    run(
        session,
        Command::Login {
            username: username.to_owned(),
            password: "pass".to_owned(),
        },
        0,
    )
}

fn guess(session: &mut Session<MemoryStore>, text: &str, seconds: u64) -> Vec<Event> {
    run(
        session,
        Command::SubmitGuess {
            guess: text.to_owned(),
        },
        seconds,
    )
}

/// Advances countdowns until a round of a non-empty tier is revealed.
fn reveal_next(session: &mut Session<MemoryStore>, clock: &mut u64) -> (String, Tier) {
    for _ in 0..256 {
        let events = run(session, Command::AdvanceCountdown, *clock);
        let revealed = events.iter().find_map(|event| match event {
            Event::RoundRevealed { entity, tier, .. } => Some((entity.clone(), *tier)),
            _ => None,
        });
        if let Some(revealed) = revealed {
            return revealed;
        }
        *clock += 3;
        let _ = run(session, Command::Tick, *clock);
    }
    panic!("no round revealed");
}

fn caught(events: &[Event]) -> Option<(u32, u64, Vec<BadgeId>)> {
    events.iter().find_map(|event| match event {
        Event::RoundCaught {
            catch_count,
            reward,
            badges,
            ..
        } => Some((*catch_count, *reward, badges.clone())),
        _ => None,
    })
}

fn account_records(store: &MemoryStore, account: &str) -> BTreeMap<String, String> {
    let suffix = format!("__{account}");
    store
        .snapshot()
        .iter()
        .filter(|(key, _)| key.ends_with(&suffix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[test]
fn catching_an_easy_round_rewards_and_unlocks_badge() {
    let easy_only = Catalog::from_tiers([(Tier::Easy, vec!["Alpha"])]);
    let mut session = open_with(MemoryStore::new(), easy_only);
    let _ = register(&mut session, "Ann");
    let mut clock = 1;

    let (entity, tier) = reveal_next(&mut session, &mut clock);
    assert_eq!((entity.as_str(), tier), ("Alpha", Tier::Easy));
    assert!(session.store().snapshot().contains_key("activeTower__Ann"));

    let rejected = guess(&mut session, "alphaa", clock + 1);
    assert_eq!(
        rejected,
        vec![Event::GuessRejected {
            guess: "alphaa".to_owned()
        }]
    );

    let events = guess(&mut session, "alpha", clock + 2);
    let (count, reward, badges) = caught(&events).expect("round caught");
    assert_eq!((count, reward), (1, Tier::Easy.reward()));
    assert_eq!(
        badges,
        vec![BadgeId::Tier(Tier::Easy), BadgeId::FirstCatch, BadgeId::Mastery]
    );
    assert!(events.contains(&Event::CurrencyChanged { balance: 2 }));
    assert_eq!(query::catch_count(&session, "Alpha"), 1);
    assert_eq!(query::currency(&session), Some(2));
    assert_eq!(query::hardest_tier(&session), Some(Tier::Easy));
    assert!(!session.store().snapshot().contains_key("activeTower__Ann"));
    assert_eq!(
        query::round(&session, at(clock + 2)).restart_at,
        Some(at(clock + 5))
    );
}

#[test]
fn shop_spawn_spends_currency_and_pays_no_reward() {
    let mut session = open(MemoryStore::new());
    let _ = register_with(&mut session, "Ann", &[("gems__Ann", "35")]);
    assert_eq!(query::currency(&session), Some(35));

    let events = run(&mut session, Command::SpawnFromShop { tier: Tier::Hard }, 1);
    assert!(events.contains(&Event::CurrencyChanged { balance: 0 }));
    assert!(events.iter().any(|event| matches!(
        event,
        Event::RoundRevealed {
            tier: Tier::Hard,
            intentional: true,
            ..
        }
    )));

    let events = guess(&mut session, " HAMMER ", 2);
    let (count, reward, badges) = caught(&events).expect("round caught");
    assert_eq!((count, reward), (1, 0));
    assert!(badges.contains(&BadgeId::Tier(Tier::Hard)));
    assert_eq!(query::currency(&session), Some(0));
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::CurrencyChanged { .. })));
}

#[test]
fn resumed_shop_round_still_pays_no_reward() {
    let mut first = open(MemoryStore::new());
    let _ = register_with(&mut first, "Ann", &[("gems__Ann", "100")]);
    let _ = run(&mut first, Command::SpawnFromShop { tier: Tier::Hard }, 1);
    let persisted = first.store().snapshot().clone();

    let mut second = open(MemoryStore::with_entries(persisted));
    let mut events = Vec::new();
    assert!(second.resume(at(46), &mut events));
    assert!(events.iter().any(|event| matches!(
        event,
        Event::RoundResumed {
            intentional: true,
            skippable: true,
            ..
        }
    )));
    let view = query::round(&second, at(46));
    assert_eq!(view.phase, query::PhaseKind::Revealed);

    let (_, reward, _) = caught(&guess(&mut second, "hammer", 47)).expect("round caught");
    assert_eq!(reward, 0);
    assert_eq!(query::currency(&second), Some(65));
}

#[test]
fn stale_persisted_round_is_discarded_on_resume() {
    let mut first = open(MemoryStore::new());
    let _ = register_with(&mut first, "Ann", &[("gems__Ann", "100")]);
    let _ = run(&mut first, Command::SpawnFromShop { tier: Tier::Hard }, 1);
    let persisted = first.store().snapshot().clone();

    let mut second = open(MemoryStore::with_entries(persisted));
    let mut events = Vec::new();
    assert!(second.resume(at(62), &mut events));
    assert!(events.contains(&Event::CountdownStarted { ticks: 15 }));
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::RoundResumed { .. })));
    assert!(!second.store().snapshot().contains_key("activeTower__Ann"));
}

#[test]
fn reset_keeping_username_zeroes_progression() {
    let mut session = open(MemoryStore::new());
    let _ = register_with(
        &mut session,
        "Ann",
        &[
            ("caughtTowers__Ann", r#"{"Alpha":6,"Hammer":4}"#),
            ("badges__Ann", r#"["easy","hard","firsttower"]"#),
            ("gems__Ann", "80"),
        ],
    );
    assert_eq!(query::total_count(&session), 10);
    assert_eq!(query::badges(&session).iter().filter(|badge| badge.unlocked).count(), 3);

    let events = run(
        &mut session,
        Command::ResetProgress {
            preserve: ProfilePreservation::everything(),
        },
        5,
    );
    assert!(events.contains(&Event::ProgressReset {
        account: "Ann".to_owned()
    }));
    assert_eq!(query::total_count(&session), 0);
    assert!(query::badges(&session).iter().all(|badge| !badge.unlocked));
    assert_eq!(query::currency(&session), Some(0));
    assert_eq!(query::active_account(&session), Some("Ann"));
    assert_eq!(query::search_accounts(&session, "ann"), vec!["Ann"]);
    assert_eq!(
        session.store().snapshot().get("caughtTowers__Ann").map(String::as_str),
        Some("{}")
    );
}

#[test]
fn reset_without_username_switches_to_auto_identity() {
    let mut session = open(MemoryStore::new());
    let _ = register(&mut session, "Ann");
    let _ = run(
        &mut session,
        Command::SetQuote {
            quote: "catch them all".to_owned(),
        },
        1,
    );

    let events = run(
        &mut session,
        Command::ResetProgress {
            preserve: ProfilePreservation::nothing(),
        },
        2,
    );
    let identity = query::active_account(&session).expect("still signed in").to_owned();
    assert!(identity.starts_with("Player"));
    assert!(events.contains(&Event::UsernameChanged {
        from: "Ann".to_owned(),
        to: identity.clone(),
    }));
    assert!(query::profile_summary(&session, "Ann").is_none());
    let summary = query::profile_summary(&session, &identity).expect("summary");
    assert_eq!(summary.quote, "No quote yet.");
    assert!(account_records(session.store(), "Ann").is_empty());
}

#[test]
fn rename_round_trip_restores_records_and_ranks() {
    let store = MemoryStore::with_entries([(
        "rankConfig",
        r#"{"ownerUsers":["I_Am_Grassy"],"coOwnerUsers":[],"testerUsers":["Ann"]}"#,
    )]);
    let mut session = open(store);
    let _ = register(&mut session, "Ann");
    let _ = run(
        &mut session,
        Command::SetFavorite {
            entity: "Hammer".to_owned(),
        },
        1,
    );
    let before = account_records(session.store(), "Ann");
    assert!(!before.is_empty());

    let events = run(
        &mut session,
        Command::ChangeUsername {
            username: "Zed".to_owned(),
        },
        2,
    );
    assert_eq!(
        events,
        vec![Event::UsernameChanged {
            from: "Ann".to_owned(),
            to: "Zed".to_owned()
        }]
    );
    assert_eq!(query::rank(&session, "zed"), Rank::Tester);
    assert_eq!(query::rank(&session, "Ann"), Rank::Player);
    assert!(account_records(session.store(), "Ann").is_empty());
    assert_eq!(
        session.store().snapshot().get("currentUsername").map(String::as_str),
        Some("Zed")
    );

    let _ = run(
        &mut session,
        Command::ChangeUsername {
            username: "Ann".to_owned(),
        },
        3,
    );
    assert_eq!(account_records(session.store(), "Ann"), before);
    assert_eq!(query::rank(&session, "Ann"), Rank::Tester);
}

#[test]
fn rename_rejects_taken_and_unchanged_names() {
    let mut session = open(MemoryStore::new());
    let _ = register(&mut session, "Bea");
    let _ = register(&mut session, "Ann");

    let taken = run(
        &mut session,
        Command::ChangeUsername {
            username: "BEA".to_owned(),
        },
        1,
    );
    assert_eq!(
        taken,
        vec![Event::UsernameChangeRejected {
            reason: AccountError::DuplicateUsername("BEA".to_owned())
        }]
    );
    let unchanged = run(
        &mut session,
        Command::ChangeUsername {
            username: " Ann ".to_owned(),
        },
        1,
    );
    assert_eq!(
        unchanged,
        vec![Event::UsernameChangeRejected {
            reason: AccountError::Unchanged
        }]
    );

    let recased = run(
        &mut session,
        Command::ChangeUsername {
            username: "ANN".to_owned(),
        },
        1,
    );
    assert_eq!(
        recased,
        vec![Event::UsernameChanged {
            from: "Ann".to_owned(),
            to: "ANN".to_owned()
        }]
    );
}

#[test]
fn removing_the_active_account_tears_down_the_session() {
    let mut session = open(MemoryStore::new());
    let _ = register_with(&mut session, "Ann", &[("gems__Ann", "50")]);
    let _ = run(&mut session, Command::SpawnFromShop { tier: Tier::Easy }, 1);
    assert!(session.store().snapshot().contains_key("activeTower__Ann"));

    let events = run(
        &mut session,
        Command::RemoveAccount {
            username: "ann".to_owned(),
        },
        2,
    );
    assert!(events.contains(&Event::SessionEnded {
        account: "Ann".to_owned()
    }));
    assert_eq!(
        events.last(),
        Some(&Event::AccountRemoved {
            account: "Ann".to_owned()
        })
    );
    assert_eq!(query::active_account(&session), None);
    assert!(account_records(session.store(), "Ann").is_empty());
    assert!(!session.store().snapshot().contains_key("currentUsername"));

    let events = run(&mut session, Command::Tick, 10);
    assert!(events.is_empty(), "no round runs without a session: {events:?}");
}

#[test]
fn failed_writes_leave_memory_authoritative() {
    let mut session = open(MemoryStore::new());
    let _ = register_with(&mut session, "Ann", &[("gems__Ann", "20")]);
    session.store_mut().reject_writes(true);

    let _ = run(&mut session, Command::SpawnFromShop { tier: Tier::Easy }, 1);
    let events = guess(&mut session, "Alpha", 2);
    assert!(caught(&events).is_some());
    assert_eq!(query::currency(&session), Some(10));
    assert_eq!(query::catch_count(&session, "Alpha"), 1);
    assert_eq!(
        session.store().snapshot().get("gems__Ann").map(String::as_str),
        Some("20")
    );
}

#[test]
fn new_accounts_ignore_unscoped_and_leftover_progress() {
    let store = MemoryStore::with_entries([
        (
            "accounts",
            r#"{"Oldie":{"passwordHash":"","createdAt":1,"updatedAt":1}}"#,
        ),
        ("gems", "500"),
        ("caughtTowers", r#"["Alpha","Alpha"]"#),
        ("badges", r#"["easy","firsttower"]"#),
        ("gems__Ann", "40"),
    ]);
    let mut session = open(store);
    let events = register(&mut session, "Ann");
    assert!(events.contains(&Event::SessionStarted {
        account: "Ann".to_owned()
    }));

    assert_eq!(query::currency(&session), Some(0));
    assert_eq!(query::catch_count(&session, "Alpha"), 0);
    assert_eq!(query::total_count(&session), 0);
    assert!(query::badges(&session).iter().all(|badge| !badge.unlocked));

    let _ = run(&mut session, Command::Logout, 1);
    let _ = run(
        &mut session,
        Command::Login {
            username: "ann".to_owned(),
            password: "pass".to_owned(),
        },
        2,
    );
    assert_eq!(query::currency(&session), Some(0));
    assert_eq!(
        session.store().snapshot().get("gems__Ann").map(String::as_str),
        Some("0")
    );
}

#[test]
fn legacy_records_migrate_into_first_account() {
    let store = MemoryStore::with_entries([
        ("profileData", r#"{"username":"Oldie","quote":"hey","playtimeSeconds":12}"#),
        ("caughtTowers", r#"["Alpha"," Alpha ","Hammer"]"#),
        ("badges", r#"["easy","unknownbadge"]"#),
        ("gems", "7"),
    ]);
    let mut session = open(store);
    let mut events = Vec::new();
    assert!(session.resume(at(0), &mut events));

    assert_eq!(query::active_account(&session), Some("Oldie"));
    assert_eq!(query::catch_count(&session, "Alpha"), 2);
    assert_eq!(query::currency(&session), Some(7));
    assert_eq!(query::profile(&session).map(|profile| profile.playtime_seconds), Some(12));
    let snapshot = session.store().snapshot();
    assert!(!snapshot.contains_key("profileData"));
    assert!(!snapshot.contains_key("gems"));
    assert!(snapshot.contains_key("caughtTowers__Oldie"));

    let _ = run(&mut session, Command::Logout, 1);
    let _ = run(
        &mut session,
        Command::Login {
            username: "oldie".to_owned(),
            password: String::new(),
        },
        2,
    );
    assert_eq!(query::active_account(&session), Some("Oldie"));
}

#[test]
fn legacy_owner_aliases_are_folded_away() {
    let store = MemoryStore::with_entries([
        (
            "accounts",
            r#"{"livingmy9lifes":{"passwordHash":"","createdAt":1,"updatedAt":1}}"#,
        ),
        (
            "rankConfig",
            r#"{"ownerUsers":["I_Am_Grassy","livingmy9lifes","IAmGrassy"]}"#,
        ),
    ]);
    let session = open(store);
    assert!(query::profile_summary(&session, "livingmy9lifes").is_none());
    assert_eq!(query::rank(&session, "IAmGrassy"), Rank::Player);
    assert!(query::profile_summary(&session, "I_Am_Grassy").is_some());
}

#[test]
fn global_stats_are_visible_to_privileged_viewers_only() {
    let mut session = open(MemoryStore::new());
    let _ = register(&mut session, "Ann");
    let _ = run(&mut session, Command::Tick, 4);
    assert_eq!(query::global_stats(&session), None);

    let _ = run(
        &mut session,
        Command::Login {
            username: "I_Am_Grassy".to_owned(),
            password: "towerofqwertyuiopcompleted".to_owned(),
        },
        5,
    );
    let stats = query::global_stats(&session).expect("owner sees global stats");
    assert_eq!(stats.total_players, 2);
    assert_eq!(stats.total_playtime_seconds, 5);
}

#[test]
fn skip_waits_until_round_is_skippable() {
    let mut session = open(MemoryStore::new());
    let _ = register_with(&mut session, "Ann", &[("gems__Ann", "10")]);
    let _ = run(&mut session, Command::SpawnFromShop { tier: Tier::Easy }, 0);

    assert_eq!(run(&mut session, Command::SkipRound, 5), vec![Event::SkipRejected]);
    let events = run(&mut session, Command::SkipRound, 10);
    assert_eq!(
        events,
        vec![Event::RoundSkipped {
            entity: "Alpha".to_owned(),
            tier: Tier::Easy
        }]
    );
    assert_eq!(query::round(&session, at(11)).restart_at, Some(at(12)));
}
