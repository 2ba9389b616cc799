//! Per-account catches, badges, currency and profile fields.

use std::collections::{BTreeMap, BTreeSet};

use tower_catch_core::{
    BadgeId, Catalog, PlayerProfile, ProfileError, ProfilePreservation, ProgressionError, Tier,
    MAX_QUOTE_CHARS, PERFECTION_CATCHES, UNIQUE_MILESTONES,
};
use tower_catch_store::{KeyValueStore, RecordKind, Repository};
use tracing::debug;

/// Result of recording a catch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatchOutcome {
    /// Lifetime catch count of the entity after the catch.
    pub new_count: u32,
    /// Badges unlocked by the catch in evaluation order.
    pub badges_unlocked: Vec<BadgeId>,
}

/// In-memory progression of the active account, written through on every change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressionStore {
    account: String,
    profile: PlayerProfile,
    catches: BTreeMap<String, u32>,
    badges: BTreeSet<BadgeId>,
    currency: u64,
}

impl ProgressionStore {
    pub(crate) fn load<S: KeyValueStore>(repository: &mut Repository<S>, account: &str) -> Self {
        let stored: Option<PlayerProfile> = repository.get_record(RecordKind::Profile, account);
        let store = Self {
            account: account.to_owned(),
            profile: repository.load_profile(account),
            catches: repository.load_catches(account),
            badges: repository.load_badges(account),
            currency: repository.load_currency(account),
        };
        if stored.map_or(true, |profile| profile.username.is_empty()) {
            repository.save_profile(account, &store.profile);
        }
        store
    }

    /// Account the progression belongs to.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Profile fields.
    #[must_use]
    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    /// Lifetime catch counts keyed by entity name.
    #[must_use]
    pub fn catches(&self) -> &BTreeMap<String, u32> {
        &self.catches
    }

    /// Unlocked badges.
    #[must_use]
    pub fn badges(&self) -> &BTreeSet<BadgeId> {
        &self.badges
    }

    /// Currency balance.
    #[must_use]
    pub fn currency(&self) -> u64 {
        self.currency
    }

    /// Lifetime catch count of a trimmed entity name.
    #[must_use]
    pub fn catch_count(&self, entity: &str) -> u32 {
        self.catches.get(entity.trim()).copied().unwrap_or(0)
    }

    /// Increments the catch count and unlocks every newly satisfied badge.
    pub fn record_catch<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        catalog: &Catalog,
        entity: &str,
        tier: Tier,
    ) -> CatchOutcome {
        let entry = self.catches.entry(entity.trim().to_owned()).or_default();
        *entry = entry.saturating_add(1);
        let new_count = *entry;
        repository.save_catches(&self.account, &self.catches);

        let unique = unique_count(&self.catches, catalog);
        let mut candidates = vec![BadgeId::Tier(tier)];
        if unique >= 1 {
            candidates.push(BadgeId::FirstCatch);
        }
        candidates.extend(
            UNIQUE_MILESTONES
                .into_iter()
                .filter(|&milestone| unique >= milestone as usize)
                .map(BadgeId::UniqueMilestone),
        );
        if !catalog.is_empty() && unique == catalog.len() {
            candidates.push(BadgeId::Mastery);
        }
        if is_perfect(&self.catches, catalog) {
            candidates.push(BadgeId::Perfection);
        }

        let badges_unlocked: Vec<BadgeId> = candidates
            .into_iter()
            .filter(|badge| self.badges.insert(*badge))
            .collect();
        if !badges_unlocked.is_empty() {
            repository.save_badges(&self.account, &self.badges);
            debug!(account = %self.account, unlocked = badges_unlocked.len(), "badges unlocked");
        }

        CatchOutcome {
            new_count,
            badges_unlocked,
        }
    }

    /// Applies a signed change to the balance.
    pub fn adjust_currency<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        delta: i64,
    ) -> Result<u64, ProgressionError> {
        let magnitude = delta.unsigned_abs();
        let balance = if delta < 0 {
            self.currency
                .checked_sub(magnitude)
                .ok_or(ProgressionError::InsufficientFunds {
                    balance: self.currency,
                    required: magnitude,
                })?
        } else {
            self.currency.saturating_add(magnitude)
        };
        self.currency = balance;
        repository.save_currency(&self.account, balance);
        Ok(balance)
    }

    /// Zeroes catches, badges, currency and playtime, keeping the selected
    /// profile fields.
    pub fn reset<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        preserve: ProfilePreservation,
    ) {
        self.catches.clear();
        self.badges.clear();
        self.currency = 0;
        self.profile.playtime_seconds = 0;
        if !preserve.keep_favorites {
            self.profile.favorite_entity.clear();
            self.profile.least_favorite_entity.clear();
        }
        if !preserve.keep_quote {
            self.profile.quote.clear();
        }

        repository.save_catches(&self.account, &self.catches);
        repository.save_badges(&self.account, &self.badges);
        repository.save_currency(&self.account, self.currency);
        repository.save_profile(&self.account, &self.profile);
    }

    /// Sets the favourite entity; empty clears it.
    pub fn set_favorite<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        catalog: &Catalog,
        entity: &str,
    ) -> Result<(), ProfileError> {
        self.profile.favorite_entity = catalog_entity(catalog, entity)?;
        repository.save_profile(&self.account, &self.profile);
        Ok(())
    }

    /// Sets the least favourite entity; empty clears it.
    pub fn set_least_favorite<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        catalog: &Catalog,
        entity: &str,
    ) -> Result<(), ProfileError> {
        self.profile.least_favorite_entity = catalog_entity(catalog, entity)?;
        repository.save_profile(&self.account, &self.profile);
        Ok(())
    }

    /// Replaces the quote.
    pub fn set_quote<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        quote: &str,
    ) -> Result<(), ProfileError> {
        let quote = quote.trim();
        if quote.chars().count() > MAX_QUOTE_CHARS {
            return Err(ProfileError::QuoteTooLong {
                max: MAX_QUOTE_CHARS,
            });
        }
        self.profile.quote = quote.to_owned();
        repository.save_profile(&self.account, &self.profile);
        Ok(())
    }

    /// Adds whole seconds of playtime and returns the new total.
    pub fn add_playtime<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        seconds: u64,
    ) -> u64 {
        self.profile.playtime_seconds = self.profile.playtime_seconds.saturating_add(seconds);
        repository.save_profile(&self.account, &self.profile);
        self.profile.playtime_seconds
    }

    /// Follows an account rename whose records were already relocated.
    pub(crate) fn rename<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        account: &str,
    ) {
        account.clone_into(&mut self.account);
        account.clone_into(&mut self.profile.username);
        repository.save_profile(&self.account, &self.profile);
    }
}

/// Number of catalog entities caught at least once.
#[must_use]
pub fn unique_count(catches: &BTreeMap<String, u32>, catalog: &Catalog) -> usize {
    catalog
        .all_entities()
        .filter(|entity| catches.get(*entity).is_some_and(|&count| count > 0))
        .count()
}

/// Sum of every catch count.
#[must_use]
pub fn total_count(catches: &BTreeMap<String, u32>) -> u64 {
    catches.values().map(|&count| u64::from(count)).sum()
}

/// Rarest tier with at least one caught catalog entity.
#[must_use]
pub fn hardest_tier(catches: &BTreeMap<String, u32>, catalog: &Catalog) -> Option<Tier> {
    catalog
        .iter()
        .filter(|(_, entities)| {
            entities
                .iter()
                .any(|entity| catches.get(entity).is_some_and(|&count| count > 0))
        })
        .map(|(tier, _)| tier)
        .max()
}

fn is_perfect(catches: &BTreeMap<String, u32>, catalog: &Catalog) -> bool {
    !catalog.is_empty()
        && catalog
            .all_entities()
            .all(|entity| catches.get(entity).copied().unwrap_or(0) >= PERFECTION_CATCHES)
}

fn catalog_entity(catalog: &Catalog, entity: &str) -> Result<String, ProfileError> {
    let entity = entity.trim();
    if entity.is_empty() {
        return Ok(String::new());
    }
    match catalog.tier_of(entity) {
        Some(_) => Ok(entity.to_owned()),
        None => Err(ProfileError::UnknownEntity(entity.to_owned())),
    }
}
