#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative session state for Tower Catch.
//!
//! A [`Session`] owns the account registry, the active account's progression,
//! the global statistics and the round systems. Adapters push [`Command`]s
//! through [`apply`] together with the current wall-clock [`Timestamp`] and
//! render the [`Event`]s it broadcasts; read access goes through [`query`].

mod accounts;
mod playtime;
mod progression;
mod ranks;

pub mod query;

use std::{collections::VecDeque, time::Duration};

use tower_catch_core::{
    normalize_username, validate_password, validate_username, AccountError, Announcement, Catalog,
    CatalogError, Command, Event, GlobalStats, ProfileError, ProfilePreservation, ProgressionError,
    RoundState, ShopError, Tier, Timestamp, UsernameError,
};
use tower_catch_store::{KeyValueStore, Repository};
use tower_catch_system_announcements::{self as announcements, AnnouncementBoard};
use tower_catch_system_rarity::{self as rarity, RarityResolver};
use tower_catch_system_round::{self as round, RoundScheduler, Transition};
use tracing::{error, info, warn};

pub use accounts::{
    verify_password, AccountStore, DEFAULT_OWNER_USERNAME, DEFAULT_QUOTE, LEGACY_OWNER_USERNAMES,
};
use playtime::PlaytimeTracker;
pub use progression::{hardest_tier, total_count, unique_count, CatchOutcome, ProgressionStore};
pub use ranks::RankRegistry;

const ACCOUNT_SEED_SALT: u64 = 0x6a09_e667_f3bc_c908;

/// Configuration parameters required to open a session.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    rarity: rarity::Config,
    round: round::Config,
    announcements: announcements::Config,
    account_seed: u64,
}

impl Config {
    /// Creates the standard configuration with every random stream derived from `seed`.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            rarity: rarity::Config::new(seed),
            round: round::Config::new(15, Duration::from_secs(1), Duration::from_secs(60)),
            announcements: announcements::Config::new(Duration::from_secs(5)),
            account_seed: seed ^ ACCOUNT_SEED_SALT,
        }
    }

    /// Replaces the round scheduler configuration.
    #[must_use]
    pub const fn with_round(mut self, round: round::Config) -> Self {
        self.round = round;
        self
    }

    /// Replaces the announcement board configuration.
    #[must_use]
    pub const fn with_announcements(mut self, announcements: announcements::Config) -> Self {
        self.announcements = announcements;
        self
    }
}

/// State bound to the signed-in account.
#[derive(Debug)]
pub struct SessionContext {
    progression: ProgressionStore,
    playtime: PlaytimeTracker,
}

impl SessionContext {
    /// Identifier of the signed-in account.
    #[must_use]
    pub fn account(&self) -> &str {
        self.progression.account()
    }

    /// Progression of the signed-in account.
    #[must_use]
    pub fn progression(&self) -> &ProgressionStore {
        &self.progression
    }
}

/// Session manager binding at most one account to the round systems.
#[derive(Debug)]
pub struct Session<S> {
    repository: Repository<S>,
    catalog: Catalog,
    accounts: AccountStore,
    ranks: RankRegistry,
    stats: GlobalStats,
    resolver: RarityResolver,
    scheduler: RoundScheduler,
    board: AnnouncementBoard,
    context: Option<SessionContext>,
}

impl<S: KeyValueStore> Session<S> {
    /// Loads every installation-wide record and prepares the account registry.
    ///
    /// Legacy single-player data is migrated, legacy owner aliases are folded
    /// away and the default owner is created when missing. Fails when the
    /// catalog cannot supply a single round.
    pub fn open(
        store: S,
        catalog: Catalog,
        config: Config,
        now: Timestamp,
    ) -> Result<Self, CatalogError> {
        catalog.ensure_playable()?;

        let mut repository = Repository::new(store);
        let mut accounts = AccountStore::load(&repository, config.account_seed);
        let mut ranks = RankRegistry::load(&repository);
        let stats = repository.load_global_stats();

        if let Some(id) = accounts.migrate_legacy(&mut repository, now) {
            info!(account = %id, "recovered single-player progress");
        }
        accounts.cleanup_legacy_owners(&mut repository, &mut ranks);
        accounts.ensure_default_owner(&mut repository, now);
        accounts.refresh_ledger(&mut repository);
        ranks.save(&mut repository);
        info!(
            accounts = accounts.len(),
            entities = catalog.len(),
            "session manager ready"
        );

        Ok(Self {
            repository,
            catalog,
            accounts,
            ranks,
            stats,
            resolver: RarityResolver::new(config.rarity),
            scheduler: RoundScheduler::new(config.round),
            board: AnnouncementBoard::new(config.announcements),
            context: None,
        })
    }

    /// Signs back into the account recorded as current, resuming its round.
    ///
    /// Returns `false` when no existing account was recorded.
    pub fn resume(&mut self, now: Timestamp, out: &mut Vec<Event>) -> bool {
        let Some(current) = self.repository.current_username() else {
            return false;
        };
        let Some(id) = self.accounts.resolve(&current).map(str::to_owned) else {
            warn!(account = %current, "current user no longer exists");
            self.repository.set_current_username(None);
            return false;
        };
        self.begin_session(&id, now, out);
        true
    }

    /// Raw store backing the session.
    pub fn store(&self) -> &S {
        self.repository.store()
    }

    /// Mutable access to the raw store.
    pub fn store_mut(&mut self) -> &mut S {
        self.repository.store_mut()
    }

    /// State of the signed-in account, if any.
    #[must_use]
    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    fn active_account(&self) -> Option<&str> {
        self.context.as_ref().map(SessionContext::account)
    }

    fn begin_session(&mut self, id: &str, now: Timestamp, out: &mut Vec<Event>) {
        if self.context.is_some() {
            self.end_session(now, out);
        }

        self.repository.set_current_username(Some(id));
        self.accounts.reserve(&mut self.repository, id);
        let progression = ProgressionStore::load(&mut self.repository, id);
        let persisted = self.repository.load_round(id);
        let catches = persisted
            .as_ref()
            .map_or(0, |round| progression.catch_count(round.entity()));
        let mut playtime = PlaytimeTracker::default();
        playtime.start(now);
        self.context = Some(SessionContext {
            progression,
            playtime,
        });
        info!(account = %id, "session started");
        out.push(Event::SessionStarted {
            account: id.to_owned(),
        });

        let mut transitions = Vec::new();
        let resumed = persisted
            .is_some_and(|round| self.scheduler.resume(round, catches, now, &mut transitions));
        if !resumed {
            self.repository.clear_round(id);
            self.scheduler.start(now, &mut transitions);
        }
        self.process(transitions, now, out);
    }

    fn end_session(&mut self, now: Timestamp, out: &mut Vec<Event>) {
        let Some(account) = self.active_account().map(str::to_owned) else {
            return;
        };
        self.stop_playtime(now, out);
        self.scheduler.cancel();
        self.repository.clear_round(&account);
        self.repository.set_current_username(None);
        self.context = None;
        info!(account = %account, "session ended");
        out.push(Event::SessionEnded { account });
    }

    fn register(
        &mut self,
        username: &str,
        password: &str,
        confirmation: &str,
        now: Timestamp,
    ) -> Result<String, AccountError> {
        let id = validate_username(username)?;
        if self.accounts.is_taken(&id, None) {
            return Err(AccountError::DuplicateUsername(id));
        }
        validate_password(password, confirmation)?;
        self.accounts.create(&mut self.repository, &id, password, now)
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<String, AccountError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(UsernameError::Empty.into());
        }
        let id = self
            .accounts
            .resolve(username)
            .ok_or_else(|| AccountError::UnknownAccount(username.to_owned()))?;
        if !self.accounts.verify(id, password) {
            return Err(AccountError::IncorrectPassword);
        }
        Ok(id.to_owned())
    }

    fn rename_active(
        &mut self,
        requested: &str,
        now: Timestamp,
    ) -> Result<(String, String), AccountError> {
        let Some(current) = self.active_account().map(str::to_owned) else {
            return Err(AccountError::Forbidden);
        };
        let id = validate_username(requested)?;
        if id == current {
            return Err(AccountError::Unchanged);
        }
        if self.accounts.is_taken(&id, Some(&current)) {
            return Err(AccountError::DuplicateUsername(id));
        }
        if !self
            .accounts
            .rename(&mut self.repository, &mut self.ranks, &current, &id, now)
        {
            return Err(AccountError::DuplicateUsername(id));
        }
        if let Some(context) = self.context.as_mut() {
            context.progression.rename(&mut self.repository, &id);
        }
        self.repository.set_current_username(Some(&id));
        Ok((current, id))
    }

    fn change_password(
        &mut self,
        password: &str,
        confirmation: &str,
        now: Timestamp,
        out: &mut Vec<Event>,
    ) {
        let Some(account) = self.active_account().map(str::to_owned) else {
            out.push(Event::SignInRequired);
            return;
        };
        if let Err(reason) = validate_password(password, confirmation) {
            out.push(Event::PasswordChangeRejected { reason });
            return;
        }
        if self
            .accounts
            .set_password(&mut self.repository, &account, password, now)
        {
            out.push(Event::PasswordChanged);
        } else {
            warn!(account = %account, "signed-in account has no credentials record");
            out.push(Event::SignInRequired);
        }
    }

    fn edit_profile<F>(&mut self, out: &mut Vec<Event>, edit: F)
    where
        F: FnOnce(&mut ProgressionStore, &mut Repository<S>, &Catalog) -> Result<(), ProfileError>,
    {
        let Some(context) = self.context.as_mut() else {
            out.push(Event::SignInRequired);
            return;
        };
        match edit(&mut context.progression, &mut self.repository, &self.catalog) {
            Ok(()) => out.push(Event::ProfileUpdated {
                profile: context.progression.profile().clone(),
            }),
            Err(reason) => out.push(Event::ProfileUpdateRejected { reason }),
        }
    }

    fn reset_progress(
        &mut self,
        preserve: ProfilePreservation,
        now: Timestamp,
        out: &mut Vec<Event>,
    ) {
        let Some(mut account) = self.active_account().map(str::to_owned) else {
            out.push(Event::SignInRequired);
            return;
        };
        self.stop_playtime(now, out);
        self.scheduler.cancel();
        self.repository.clear_round(&account);
        self.repository.clear_legacy();

        let Some(context) = self.context.as_mut() else {
            return;
        };
        context.progression.reset(&mut self.repository, preserve);
        if !preserve.keep_username {
            let identity = self.accounts.generate_identity(&mut self.repository);
            if self
                .accounts
                .rename(&mut self.repository, &mut self.ranks, &account, &identity, now)
            {
                context.progression.rename(&mut self.repository, &identity);
                self.repository.set_current_username(Some(&identity));
                out.push(Event::UsernameChanged {
                    from: account,
                    to: identity.clone(),
                });
                account = identity;
            } else {
                warn!(
                    account = %account,
                    identity = %identity,
                    "kept username after reset; identity only reserved"
                );
            }
        }
        context.playtime.start(now);
        info!(account = %account, "progress reset");
        out.push(Event::CurrencyChanged { balance: 0 });
        out.push(Event::ProgressReset { account });

        let mut transitions = Vec::new();
        self.scheduler.start(now, &mut transitions);
        self.process(transitions, now, out);
    }

    fn remove_account(&mut self, username: &str, now: Timestamp, out: &mut Vec<Event>) {
        let Some(actor) = self.active_account().map(str::to_owned) else {
            out.push(Event::SignInRequired);
            return;
        };
        let requested = username.trim().to_owned();
        let reject = |reason: AccountError, out: &mut Vec<Event>| {
            out.push(Event::AccountRemovalRejected {
                account: requested.clone(),
                reason,
            });
        };

        let Some(target) = self.accounts.resolve(&requested).map(str::to_owned) else {
            reject(AccountError::UnknownAccount(requested.clone()), out);
            return;
        };
        if normalize_username(&target) == normalize_username(DEFAULT_OWNER_USERNAME) {
            reject(AccountError::Protected(target), out);
            return;
        }
        let removing_self = target == actor;
        if !removing_self && !self.ranks.rank_of(&actor).is_privileged() {
            reject(AccountError::Forbidden, out);
            return;
        }

        if removing_self {
            self.end_session(now, out);
        }
        if !self
            .accounts
            .remove(&mut self.repository, &mut self.ranks, &target)
        {
            return;
        }
        if self.repository.current_username().as_deref() == Some(target.as_str()) {
            self.repository.set_current_username(None);
        }
        out.push(Event::AccountRemoved { account: target });
    }

    fn spawn_from_shop(&mut self, tier: Tier, now: Timestamp, out: &mut Vec<Event>) {
        let Some(context) = self.context.as_ref() else {
            out.push(Event::SignInRequired);
            return;
        };
        let cost = tier.spawn_cost();
        let balance = context.progression.currency();
        let rejection = if balance < cost {
            Some(ShopError::from(ProgressionError::InsufficientFunds {
                balance,
                required: cost,
            }))
        } else if self.catalog.entities(tier).is_empty() {
            Some(ShopError::from(CatalogError::EmptyTier(tier)))
        } else {
            None
        };
        if let Some(reason) = rejection {
            out.push(Event::ShopPurchaseRejected { tier, reason });
            return;
        }

        let entity = match self.resolver.select_entity(&self.catalog, tier) {
            Ok(entity) => entity,
            Err(error) => {
                out.push(Event::ShopPurchaseRejected {
                    tier,
                    reason: error.into(),
                });
                return;
            }
        };
        let Some(context) = self.context.as_mut() else {
            return;
        };
        let delta = i64::try_from(cost).map_or(i64::MIN, |cost| -cost);
        match context.progression.adjust_currency(&mut self.repository, delta) {
            Ok(balance) => out.push(Event::CurrencyChanged { balance }),
            Err(error) => {
                out.push(Event::ShopPurchaseRejected {
                    tier,
                    reason: error.into(),
                });
                return;
            }
        }

        let account = context.progression.account().to_owned();
        let catches = context.progression.catch_count(&entity);
        info!(account = %account, tier = %tier, entity = %entity, "shop spawn purchased");
        self.scheduler.cancel();
        self.repository.clear_round(&account);
        let mut transitions = Vec::new();
        self.scheduler.reveal(
            RoundState::new(entity, tier, now, true),
            catches,
            now,
            &mut transitions,
        );
        self.process(transitions, now, out);
    }

    fn tick(&mut self, now: Timestamp, out: &mut Vec<Event>) {
        self.board.tick(now, out);
        if self.context.is_none() {
            return;
        }
        self.accrue_playtime(now, out);
        self.drive(now, out, |scheduler, transitions| scheduler.tick(now, transitions));
    }

    fn drive<F>(&mut self, now: Timestamp, out: &mut Vec<Event>, step: F)
    where
        F: FnOnce(&mut RoundScheduler, &mut Vec<Transition>),
    {
        if self.context.is_none() {
            out.push(Event::SignInRequired);
            return;
        }
        let mut transitions = Vec::new();
        step(&mut self.scheduler, &mut transitions);
        self.process(transitions, now, out);
    }

    fn process(&mut self, transitions: Vec<Transition>, now: Timestamp, out: &mut Vec<Event>) {
        let Some(account) = self.active_account().map(str::to_owned) else {
            return;
        };
        let mut pending: VecDeque<Transition> = transitions.into();
        while let Some(transition) = pending.pop_front() {
            match transition {
                Transition::CountdownStarted { ticks } => {
                    out.push(Event::CountdownStarted { ticks });
                }
                Transition::CountdownTicked { ticks_remaining } => {
                    out.push(Event::CountdownTicked { ticks_remaining });
                }
                Transition::RevealDue => {
                    let mut follow_up = Vec::new();
                    self.draw_round(now, &mut follow_up, out);
                    pending.extend(follow_up);
                }
                Transition::Revealed {
                    round,
                    remaining,
                    skippable,
                } => {
                    self.repository.save_round(&account, &round);
                    out.push(Event::RoundRevealed {
                        entity: round.entity().to_owned(),
                        tier: round.tier(),
                        remaining,
                        skippable,
                        intentional: round.intentional(),
                    });
                }
                Transition::Resumed {
                    round,
                    remaining,
                    skippable,
                } => {
                    self.repository.save_round(&account, &round);
                    out.push(Event::RoundResumed {
                        entity: round.entity().to_owned(),
                        tier: round.tier(),
                        remaining,
                        skippable,
                        intentional: round.intentional(),
                    });
                }
                Transition::Ticked {
                    round,
                    remaining,
                    skippable,
                } => {
                    self.repository.save_round(&account, &round);
                    out.push(Event::RoundTicked {
                        remaining,
                        skippable,
                    });
                }
                Transition::GuessRejected { guess } => out.push(Event::GuessRejected { guess }),
                Transition::Caught { round } => self.complete_catch(&round, now, out),
                Transition::Skipped { round } => {
                    self.repository.clear_round(&account);
                    out.push(Event::RoundSkipped {
                        entity: round.entity().to_owned(),
                        tier: round.tier(),
                    });
                }
                Transition::SkipRejected => out.push(Event::SkipRejected),
                Transition::Expired { round } => {
                    self.repository.clear_round(&account);
                    out.push(Event::RoundExpired {
                        entity: round.entity().to_owned(),
                        tier: round.tier(),
                    });
                }
            }
        }
    }

    fn draw_round(
        &mut self,
        now: Timestamp,
        transitions: &mut Vec<Transition>,
        out: &mut Vec<Event>,
    ) {
        let Some(context) = self.context.as_ref() else {
            return;
        };
        match self.resolver.draw(&self.catalog) {
            Ok((tier, entity)) => {
                let catches = context.progression.catch_count(&entity);
                self.scheduler.reveal(
                    RoundState::new(entity, tier, now, false),
                    catches,
                    now,
                    transitions,
                );
            }
            Err(CatalogError::EmptyTier(tier)) => {
                warn!(tier = %tier, "drew an empty tier; retrying");
                self.scheduler.retry_later(now);
                out.push(Event::RoundUnavailable { tier });
            }
            Err(CatalogError::Empty) => {
                error!("catalog is empty; rounds stopped");
                self.scheduler.cancel();
            }
        }
    }

    fn complete_catch(&mut self, round: &RoundState, now: Timestamp, out: &mut Vec<Event>) {
        let Some(context) = self.context.as_mut() else {
            return;
        };
        let account = context.progression.account().to_owned();
        self.repository.clear_round(&account);
        let outcome = context.progression.record_catch(
            &mut self.repository,
            &self.catalog,
            round.entity(),
            round.tier(),
        );
        self.stats.total_tower_catches = self.stats.total_tower_catches.saturating_add(1);
        self.repository.save_global_stats(&self.stats);

        let reward = if round.intentional() {
            0
        } else {
            round.tier().reward()
        };
        if reward > 0 {
            let delta = i64::try_from(reward).unwrap_or(i64::MAX);
            if let Ok(balance) = context
                .progression
                .adjust_currency(&mut self.repository, delta)
            {
                out.push(Event::CurrencyChanged { balance });
            }
        }
        info!(
            account = %account,
            entity = round.entity(),
            tier = %round.tier(),
            count = outcome.new_count,
            "round caught"
        );
        out.push(Event::RoundCaught {
            entity: round.entity().to_owned(),
            tier: round.tier(),
            catch_count: outcome.new_count,
            reward,
            badges: outcome.badges_unlocked,
        });

        if let Some(announcement) =
            Announcement::for_catch(&account, round.entity(), round.tier())
        {
            self.board.enqueue(announcement, now, out);
        }
    }

    fn accrue_playtime(&mut self, now: Timestamp, out: &mut Vec<Event>) {
        let seconds = self
            .context
            .as_mut()
            .map_or(0, |context| context.playtime.accrue(now));
        self.commit_playtime(seconds, out);
    }

    fn stop_playtime(&mut self, now: Timestamp, out: &mut Vec<Event>) {
        let seconds = self
            .context
            .as_mut()
            .map_or(0, |context| context.playtime.stop(now));
        self.commit_playtime(seconds, out);
    }

    fn commit_playtime(&mut self, seconds: u64, out: &mut Vec<Event>) {
        if seconds == 0 {
            return;
        }
        let Some(context) = self.context.as_mut() else {
            return;
        };
        let total = context.progression.add_playtime(&mut self.repository, seconds);
        self.stats.total_playtime_seconds =
            self.stats.total_playtime_seconds.saturating_add(seconds);
        self.repository.save_global_stats(&self.stats);
        out.push(Event::PlaytimeAccrued { seconds, total });
    }
}

/// Applies the provided command to the session at wall-clock time `now`.
pub fn apply<S: KeyValueStore>(
    session: &mut Session<S>,
    command: Command,
    now: Timestamp,
    out_events: &mut Vec<Event>,
) {
    match command {
        Command::Register {
            username,
            password,
            confirmation,
        } => match session.register(&username, &password, &confirmation, now) {
            Ok(account) => {
                out_events.push(Event::AccountRegistered {
                    account: account.clone(),
                });
                session.begin_session(&account, now, out_events);
            }
            Err(reason) => {
                info!(reason = %reason, "registration rejected");
                out_events.push(Event::AuthenticationRejected { reason });
            }
        },
        Command::Login { username, password } => {
            match session.authenticate(&username, &password) {
                Ok(account) => session.begin_session(&account, now, out_events),
                Err(reason) => {
                    info!(reason = %reason, "login rejected");
                    out_events.push(Event::AuthenticationRejected { reason });
                }
            }
        }
        Command::Logout => {
            if session.context.is_none() {
                out_events.push(Event::SignInRequired);
            }
            session.end_session(now, out_events);
        }
        Command::Tick => session.tick(now, out_events),
        Command::AdvanceCountdown => {
            session.drive(now, out_events, |scheduler, transitions| {
                scheduler.advance_countdown(transitions);
            });
        }
        Command::SubmitGuess { guess } => {
            session.drive(now, out_events, |scheduler, transitions| {
                scheduler.submit(&guess, now, transitions);
            });
        }
        Command::SkipRound => {
            session.drive(now, out_events, |scheduler, transitions| {
                scheduler.skip(now, transitions);
            });
        }
        Command::SpawnFromShop { tier } => session.spawn_from_shop(tier, now, out_events),
        Command::ChangeUsername { username } => {
            if session.context.is_none() {
                out_events.push(Event::SignInRequired);
                return;
            }
            match session.rename_active(&username, now) {
                Ok((from, to)) => out_events.push(Event::UsernameChanged { from, to }),
                Err(reason) => out_events.push(Event::UsernameChangeRejected { reason }),
            }
        }
        Command::ChangePassword {
            password,
            confirmation,
        } => session.change_password(&password, &confirmation, now, out_events),
        Command::SetFavorite { entity } => {
            session.edit_profile(out_events, |progression, repository, catalog| {
                progression.set_favorite(repository, catalog, &entity)
            });
        }
        Command::SetLeastFavorite { entity } => {
            session.edit_profile(out_events, |progression, repository, catalog| {
                progression.set_least_favorite(repository, catalog, &entity)
            });
        }
        Command::SetQuote { quote } => {
            session.edit_profile(out_events, |progression, repository, _| {
                progression.set_quote(repository, &quote)
            });
        }
        Command::ResetProgress { preserve } => session.reset_progress(preserve, now, out_events),
        Command::RemoveAccount { username } => {
            session.remove_account(&username, now, out_events);
        }
    }
}

#[cfg(test)]
mod tests {
    use tower_catch_core::{BadgeId, Rank};
    use tower_catch_store::MemoryStore;

    use super::*;

    const START: u64 = 1_700_000_000_000;

    fn at(seconds: u64) -> Timestamp {
        Timestamp::from_millis(START + seconds * 1_000)
    }

    fn catalog() -> Catalog {
        Catalog::from_tiers(
            Tier::ALL.map(|tier| (tier, vec![format!("{} Tower", tier.display_name())])),
        )
    }

    fn open() -> Session<MemoryStore> {
        Session::open(MemoryStore::new(), catalog(), Config::new(9), at(0))
            .expect("playable catalog")
    }

    fn register(session: &mut Session<MemoryStore>, name: &str) -> Vec<Event> {
        let mut events = Vec::new();
        apply(
            session,
            Command::Register {
                username: name.to_owned(),
                password: "pass".to_owned(),
                confirmation: "pass".to_owned(),
            },
            at(0),
            &mut events,
        );
        events
    }

    #[test]
    fn open_refuses_empty_catalog() {
        let result = Session::open(MemoryStore::new(), Catalog::default(), Config::new(1), at(0));
        assert!(matches!(result, Err(CatalogError::Empty)));
    }

    #[test]
    fn open_creates_default_owner() {
        let session = open();
        assert!(session.accounts.verify(DEFAULT_OWNER_USERNAME, "towerofqwertyuiopcompleted"));
        assert_eq!(session.ranks.rank_of(DEFAULT_OWNER_USERNAME), Rank::Owner);
        assert_eq!(
            session.repository.load_profile(DEFAULT_OWNER_USERNAME).quote,
            DEFAULT_QUOTE
        );
    }

    #[test]
    fn registration_starts_session_and_countdown() {
        let mut session = open();
        let events = register(&mut session, "Ann");
        assert_eq!(
            events,
            vec![
                Event::AccountRegistered {
                    account: "Ann".to_owned()
                },
                Event::SessionStarted {
                    account: "Ann".to_owned()
                },
                Event::CountdownStarted { ticks: 15 },
            ]
        );
        assert_eq!(session.repository.current_username().as_deref(), Some("Ann"));
        assert_eq!(session.repository.load_profile("Ann").quote, DEFAULT_QUOTE);
    }

    #[test]
    fn registration_validates_before_creating() {
        let mut session = open();
        let mut events = Vec::new();
        apply(
            &mut session,
            Command::Register {
                username: "Bea".to_owned(),
                password: "abc".to_owned(),
                confirmation: "abc".to_owned(),
            },
            at(0),
            &mut events,
        );
        assert!(matches!(
            events.as_slice(),
            [Event::AuthenticationRejected {
                reason: AccountError::Password(_)
            }]
        ));

        events.clear();
        apply(
            &mut session,
            Command::Register {
                username: "i_am_GRASSY".to_owned(),
                password: "abcd".to_owned(),
                confirmation: "abcd".to_owned(),
            },
            at(0),
            &mut events,
        );
        assert_eq!(
            events,
            vec![Event::AuthenticationRejected {
                reason: AccountError::DuplicateUsername("i_am_GRASSY".to_owned())
            }]
        );
        assert!(session.context().is_none());
    }

    #[test]
    fn login_is_case_insensitive_and_checks_password() {
        let mut session = open();
        let _ = register(&mut session, "Ann");
        let mut events = Vec::new();
        apply(&mut session, Command::Logout, at(1), &mut events);

        events.clear();
        apply(
            &mut session,
            Command::Login {
                username: "ann".to_owned(),
                password: "nope".to_owned(),
            },
            at(2),
            &mut events,
        );
        assert_eq!(
            events,
            vec![Event::AuthenticationRejected {
                reason: AccountError::IncorrectPassword
            }]
        );

        events.clear();
        apply(
            &mut session,
            Command::Login {
                username: " ANN ".to_owned(),
                password: "pass".to_owned(),
            },
            at(2),
            &mut events,
        );
        assert_eq!(session.active_account(), Some("Ann"));
    }

    #[test]
    fn commands_without_session_require_sign_in() {
        let mut session = open();
        let mut events = Vec::new();
        for command in [
            Command::SkipRound,
            Command::SpawnFromShop { tier: Tier::Easy },
            Command::SetQuote {
                quote: "hi".to_owned(),
            },
        ] {
            apply(&mut session, command, at(0), &mut events);
        }
        assert_eq!(events, vec![Event::SignInRequired; 3]);
    }

    #[test]
    fn playtime_accrues_to_profile_and_global_stats() {
        let mut session = open();
        let _ = register(&mut session, "Ann");
        let mut events = Vec::new();
        apply(&mut session, Command::Tick, Timestamp::from_millis(START + 2_500), &mut events);
        assert!(events.contains(&Event::PlaytimeAccrued {
            seconds: 2,
            total: 2
        }));

        events.clear();
        apply(&mut session, Command::Logout, Timestamp::from_millis(START + 3_100), &mut events);
        assert!(events.contains(&Event::PlaytimeAccrued {
            seconds: 1,
            total: 3
        }));
        assert_eq!(session.repository.load_profile("Ann").playtime_seconds, 3);
        assert_eq!(session.repository.load_global_stats().total_playtime_seconds, 3);
    }

    #[test]
    fn shop_rejects_before_mutating() {
        let mut session = open();
        let _ = register(&mut session, "Ann");
        let mut events = Vec::new();
        apply(&mut session, Command::SpawnFromShop { tier: Tier::Hard }, at(1), &mut events);
        assert_eq!(
            events,
            vec![Event::ShopPurchaseRejected {
                tier: Tier::Hard,
                reason: ShopError::Funds(ProgressionError::InsufficientFunds {
                    balance: 0,
                    required: 35
                })
            }]
        );
        assert_eq!(session.scheduler.view(at(1)).countdown_remaining, Some(15));
    }

    #[test]
    fn removing_others_requires_privilege() {
        let mut session = open();
        let _ = register(&mut session, "Ann");
        let _ = register(&mut session, "Bea");
        let mut events = Vec::new();
        apply(
            &mut session,
            Command::RemoveAccount {
                username: "ann".to_owned(),
            },
            at(1),
            &mut events,
        );
        assert_eq!(
            events,
            vec![Event::AccountRemovalRejected {
                account: "ann".to_owned(),
                reason: AccountError::Forbidden
            }]
        );

        events.clear();
        apply(
            &mut session,
            Command::RemoveAccount {
                username: DEFAULT_OWNER_USERNAME.to_owned(),
            },
            at(1),
            &mut events,
        );
        assert_eq!(
            events,
            vec![Event::AccountRemovalRejected {
                account: DEFAULT_OWNER_USERNAME.to_owned(),
                reason: AccountError::Protected(DEFAULT_OWNER_USERNAME.to_owned())
            }]
        );
    }

    #[test]
    fn owner_may_remove_other_accounts() {
        let mut session = open();
        let _ = register(&mut session, "Ann");
        let mut events = Vec::new();
        apply(
            &mut session,
            Command::Login {
                username: DEFAULT_OWNER_USERNAME.to_owned(),
                password: "towerofqwertyuiopcompleted".to_owned(),
            },
            at(1),
            &mut events,
        );
        events.clear();
        apply(
            &mut session,
            Command::RemoveAccount {
                username: "ANN".to_owned(),
            },
            at(1),
            &mut events,
        );
        assert_eq!(
            events,
            vec![Event::AccountRemoved {
                account: "Ann".to_owned()
            }]
        );
        assert_eq!(session.active_account(), Some(DEFAULT_OWNER_USERNAME));
        assert!(session.accounts.resolve("Ann").is_none());
    }

    #[test]
    fn quote_and_favourites_are_validated() {
        let mut session = open();
        let _ = register(&mut session, "Ann");
        let mut events = Vec::new();
        apply(
            &mut session,
            Command::SetFavorite {
                entity: "Easy Tower".to_owned(),
            },
            at(1),
            &mut events,
        );
        apply(
            &mut session,
            Command::SetLeastFavorite {
                entity: "Nowhere".to_owned(),
            },
            at(1),
            &mut events,
        );
        assert!(matches!(
            events.as_slice(),
            [
                Event::ProfileUpdated { profile },
                Event::ProfileUpdateRejected {
                    reason: ProfileError::UnknownEntity(_)
                },
            ] if profile.favorite_entity == "Easy Tower"
        ));
    }

    #[test]
    fn catching_rare_round_queues_announcement() {
        let mut session = open();
        let _ = register(&mut session, "Ann");
        let _ = session
            .context
            .as_mut()
            .map(|context| context.progression.adjust_currency(&mut session.repository, 250));
        let mut events = Vec::new();
        apply(&mut session, Command::SpawnFromShop { tier: Tier::Insane }, at(1), &mut events);
        events.clear();
        apply(
            &mut session,
            Command::SubmitGuess {
                guess: "insane tower".to_owned(),
            },
            at(2),
            &mut events,
        );

        assert!(events.iter().any(|event| matches!(
            event,
            Event::RoundCaught { reward: 0, badges, .. }
                if badges.contains(&BadgeId::Tier(Tier::Insane))
        )));
        assert_eq!(
            session.board.current().map(Announcement::text),
            Some("Ann caught Insane Tower (Insane)!")
        );
        assert_eq!(session.repository.load_global_stats().total_tower_catches, 1);
    }

    #[test]
    fn password_change_replaces_credentials() {
        let mut session = open();
        let _ = register(&mut session, "Ann");
        let mut events = Vec::new();
        apply(
            &mut session,
            Command::ChangePassword {
                password: "fresh".to_owned(),
                confirmation: "fresh".to_owned(),
            },
            at(1),
            &mut events,
        );
        assert_eq!(events, vec![Event::PasswordChanged]);
        assert!(session.accounts.verify("Ann", "fresh"));
        assert!(!session.accounts.verify("Ann", "pass"));

        events.clear();
        apply(
            &mut session,
            Command::ChangePassword {
                password: "fresh".to_owned(),
                confirmation: "stale".to_owned(),
            },
            at(2),
            &mut events,
        );
        assert!(matches!(
            events.as_slice(),
            [Event::PasswordChangeRejected { .. }]
        ));
        assert!(session.accounts.verify("Ann", "fresh"));
    }
}
