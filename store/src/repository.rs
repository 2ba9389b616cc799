//! Typed records layered over a [`KeyValueStore`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tower_catch_core::{BadgeId, GlobalStats, PlayerProfile, RoundState, Timestamp};
use tracing::{debug, error, warn};

use crate::{KeyValueStore, StoreError};

const ACCOUNTS_KEY: &str = "accounts";
const TAKEN_USERNAMES_KEY: &str = "takenUsernames";
const GLOBAL_STATS_KEY: &str = "globalStats";
const RANK_CONFIG_KEY: &str = "rankConfig";
const CURRENT_USERNAME_KEY: &str = "currentUsername";

/// Group of per-account values stored under `base__account`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Editable profile fields and playtime.
    Profile,
    /// Lifetime catch counts per entity.
    Catches,
    /// Unlocked badge identifiers.
    Badges,
    /// Currency balance stored as a decimal string.
    Currency,
    /// Snapshot of the revealed round, absent while idle.
    ActiveRound,
}

impl RecordKind {
    /// Every per-account record kind.
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Profile,
        RecordKind::Catches,
        RecordKind::Badges,
        RecordKind::Currency,
        RecordKind::ActiveRound,
    ];

    /// Unscoped base key, also used by pre-account installations.
    #[must_use]
    pub const fn base(self) -> &'static str {
        match self {
            Self::Profile => "profileData",
            Self::Catches => "caughtTowers",
            Self::Badges => "badges",
            Self::Currency => "gems",
            Self::ActiveRound => "activeTower",
        }
    }

    /// Namespaced key of the record for `account`.
    #[must_use]
    pub fn key(self, account: &str) -> String {
        format!("{}__{account}", self.base())
    }

    const fn reads_legacy_fallback(self) -> bool {
        !matches!(self, Self::ActiveRound)
    }
}

/// Stored credentials and bookkeeping for one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Password hash; empty means no password is required.
    #[serde(default)]
    pub password_hash: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Timestamp,
    /// Time of the last credential or identity change.
    #[serde(default)]
    pub updated_at: Timestamp,
}

/// Stored privilege lists keyed by rank.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RankLists {
    /// Usernames holding the owner rank.
    pub owner_users: Vec<String>,
    /// Usernames holding the co-owner rank.
    pub co_owner_users: Vec<String>,
    /// Usernames holding the tester rank.
    pub tester_users: Vec<String>,
}

/// Typed access to every persisted record.
///
/// Failures never propagate: unreadable or corrupt values load as their empty
/// default and failed writes are logged, leaving the caller's in-memory state
/// authoritative.
#[derive(Debug)]
pub struct Repository<S> {
    store: S,
}

impl<S: KeyValueStore> Repository<S> {
    /// Wraps a raw store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Raw store backing the repository.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the raw store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Reads a per-account record, falling back to the unscoped legacy key.
    pub fn get_record<T: DeserializeOwned>(&self, kind: RecordKind, account: &str) -> Option<T> {
        let (key, raw) = self.read_account_raw(kind, account)?;
        decode(&key, &raw)
    }

    /// Replaces a per-account record.
    pub fn put_record<T: Serialize + ?Sized>(
        &mut self,
        kind: RecordKind,
        account: &str,
        value: &T,
    ) {
        self.write_json(&kind.key(account), value);
    }

    /// Deletes a per-account record.
    pub fn remove_record(&mut self, kind: RecordKind, account: &str) {
        self.delete(&kind.key(account));
    }

    /// Loads the profile, filling a missing username with the account id.
    pub fn load_profile(&self, account: &str) -> PlayerProfile {
        let mut profile: PlayerProfile = self
            .get_record(RecordKind::Profile, account)
            .unwrap_or_default();
        if profile.username.is_empty() {
            profile.username = account.to_owned();
        }
        profile
    }

    /// Persists the profile.
    pub fn save_profile(&mut self, account: &str, profile: &PlayerProfile) {
        self.put_record(RecordKind::Profile, account, profile);
    }

    /// Loads catch counts, accepting the legacy flat list and the count map.
    ///
    /// Names are trimmed and non-positive counts dropped.
    pub fn load_catches(&self, account: &str) -> BTreeMap<String, u32> {
        let Some(value) = self.get_record::<Value>(RecordKind::Catches, account) else {
            return BTreeMap::new();
        };

        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        match value {
            Value::Array(items) => {
                for item in items {
                    let Some(name) = item.as_str().map(str::trim) else {
                        continue;
                    };
                    if name.is_empty() {
                        continue;
                    }
                    let count = counts.entry(name.to_owned()).or_default();
                    *count = count.saturating_add(1);
                }
            }
            Value::Object(entries) => {
                for (name, count) in entries {
                    let name = name.trim();
                    let count = count_from_value(&count);
                    if name.is_empty() || count == 0 {
                        continue;
                    }
                    let total = counts.entry(name.to_owned()).or_default();
                    *total = total.saturating_add(count);
                }
            }
            other => {
                warn!(account = %account, found = %other, "ignoring malformed catch record");
            }
        }
        counts
    }

    /// Persists catch counts in map form.
    pub fn save_catches(&mut self, account: &str, counts: &BTreeMap<String, u32>) {
        self.put_record(RecordKind::Catches, account, counts);
    }

    /// Loads unlocked badges, skipping identifiers that are no longer known.
    pub fn load_badges(&self, account: &str) -> BTreeSet<BadgeId> {
        let ids: Vec<String> = self
            .get_record(RecordKind::Badges, account)
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| {
                let badge = BadgeId::parse(id);
                if badge.is_none() {
                    debug!(account = %account, badge = %id, "skipping unknown badge");
                }
                badge
            })
            .collect()
    }

    /// Persists unlocked badges as a list of identifiers.
    pub fn save_badges(&mut self, account: &str, badges: &BTreeSet<BadgeId>) {
        let ids: Vec<String> = badges.iter().map(BadgeId::key).collect();
        self.put_record(RecordKind::Badges, account, &ids);
    }

    /// Loads the currency balance; unparseable or negative values read as zero.
    pub fn load_currency(&self, account: &str) -> u64 {
        let Some((key, raw)) = self.read_account_raw(RecordKind::Currency, account) else {
            return 0;
        };
        let trimmed = raw.trim();
        if let Ok(balance) = trimmed.parse::<i64>() {
            return u64::try_from(balance).unwrap_or(0);
        }
        if let Ok(balance) = trimmed.parse::<f64>() {
            if balance.is_finite() && balance > 0.0 {
                return balance.trunc() as u64;
            }
            return 0;
        }
        warn!(key = %key, value = %trimmed, "discarding corrupt currency balance");
        0
    }

    /// Persists the currency balance as a decimal string.
    pub fn save_currency(&mut self, account: &str, balance: u64) {
        self.write_raw(&RecordKind::Currency.key(account), &balance.to_string());
    }

    /// Loads the persisted round, if any.
    pub fn load_round(&self, account: &str) -> Option<RoundState> {
        self.get_record(RecordKind::ActiveRound, account)
    }

    /// Persists the revealed round.
    pub fn save_round(&mut self, account: &str, round: &RoundState) {
        self.put_record(RecordKind::ActiveRound, account, round);
    }

    /// Discards the persisted round.
    pub fn clear_round(&mut self, account: &str) {
        self.remove_record(RecordKind::ActiveRound, account);
    }

    /// Loads every account keyed by identifier.
    pub fn load_accounts(&self) -> BTreeMap<String, AccountRecord> {
        self.read_json(ACCOUNTS_KEY).unwrap_or_default()
    }

    /// Persists every account.
    pub fn save_accounts(&mut self, accounts: &BTreeMap<String, AccountRecord>) {
        self.write_json(ACCOUNTS_KEY, accounts);
    }

    /// Loads the reserved-username ledger.
    pub fn load_taken_usernames(&self) -> BTreeSet<String> {
        self.read_json(TAKEN_USERNAMES_KEY).unwrap_or_default()
    }

    /// Persists the reserved-username ledger.
    pub fn save_taken_usernames(&mut self, taken: &BTreeSet<String>) {
        self.write_json(TAKEN_USERNAMES_KEY, taken);
    }

    /// Loads the installation-wide statistics.
    pub fn load_global_stats(&self) -> GlobalStats {
        self.read_json(GLOBAL_STATS_KEY).unwrap_or_default()
    }

    /// Persists the installation-wide statistics.
    pub fn save_global_stats(&mut self, stats: &GlobalStats) {
        self.write_json(GLOBAL_STATS_KEY, stats);
    }

    /// Loads the privilege lists, or `None` when never stored.
    pub fn load_rank_lists(&self) -> Option<RankLists> {
        self.read_json(RANK_CONFIG_KEY)
    }

    /// Persists the privilege lists.
    pub fn save_rank_lists(&mut self, lists: &RankLists) {
        self.write_json(RANK_CONFIG_KEY, lists);
    }

    /// Identifier of the last active account.
    pub fn current_username(&self) -> Option<String> {
        self.read_raw(CURRENT_USERNAME_KEY)
            .map(|raw| raw.trim().to_owned())
            .filter(|name| !name.is_empty())
    }

    /// Records or clears the last active account.
    pub fn set_current_username(&mut self, account: Option<&str>) {
        match account {
            Some(account) => self.write_raw(CURRENT_USERNAME_KEY, account),
            None => self.delete(CURRENT_USERNAME_KEY),
        }
    }

    /// Moves every namespaced record of `from` under `to` without re-encoding.
    pub fn relocate(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        for kind in RecordKind::ALL {
            let old_key = kind.key(from);
            let Some(raw) = self.read_raw(&old_key) else {
                continue;
            };
            self.write_raw(&kind.key(to), &raw);
            self.delete(&old_key);
        }
    }

    /// Deletes every namespaced record of `account`.
    pub fn purge(&mut self, account: &str) {
        for kind in RecordKind::ALL {
            self.remove_record(kind, account);
        }
    }

    /// Whether a pre-account installation left an unscoped profile behind.
    pub fn has_legacy_profile(&self) -> bool {
        self.read_raw(RecordKind::Profile.base()).is_some()
    }

    /// Unscoped profile of a pre-account installation; corrupt data reads as default.
    pub fn legacy_profile(&self) -> PlayerProfile {
        let key = RecordKind::Profile.base();
        self.read_raw(key)
            .and_then(|raw| decode(key, &raw))
            .unwrap_or_default()
    }

    /// Moves every unscoped record into the namespace of `account`.
    ///
    /// Kinds without an unscoped value start empty.
    pub fn migrate_legacy(&mut self, account: &str) {
        for kind in RecordKind::ALL {
            let legacy_key = kind.base();
            match self.read_raw(legacy_key) {
                Some(raw) => {
                    self.write_raw(&kind.key(account), &raw);
                    self.delete(legacy_key);
                }
                None => self.write_empty(kind, account),
            }
        }
    }

    /// Writes empty progression records for a new account.
    ///
    /// Explicit records shadow the unscoped fallback and any value left under
    /// the same name by an earlier account.
    pub fn start_progression(&mut self, account: &str) {
        for kind in RecordKind::ALL {
            if kind != RecordKind::Profile {
                self.write_empty(kind, account);
            }
        }
    }

    /// Deletes every unscoped record so fallbacks stop resurrecting old data.
    pub fn clear_legacy(&mut self) {
        for kind in RecordKind::ALL {
            self.delete(kind.base());
        }
    }

    fn write_empty(&mut self, kind: RecordKind, account: &str) {
        match kind {
            RecordKind::Catches => self.save_catches(account, &BTreeMap::new()),
            RecordKind::Badges => self.save_badges(account, &BTreeSet::new()),
            RecordKind::Currency => self.save_currency(account, 0),
            RecordKind::Profile | RecordKind::ActiveRound => self.remove_record(kind, account),
        }
    }

    fn read_account_raw(&self, kind: RecordKind, account: &str) -> Option<(String, String)> {
        let key = kind.key(account);
        if let Some(raw) = self.read_raw(&key) {
            return Some((key, raw));
        }
        if !kind.reads_legacy_fallback() {
            return None;
        }
        self.read_raw(kind.base())
            .map(|raw| (kind.base().to_owned(), raw))
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        decode(key, &raw)
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.write_raw(key, &raw),
            Err(error) => {
                let error = StoreError::from(error);
                error!(key = %key, error = %error, "failed to encode record");
            }
        }
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(error) => {
                error!(key = %key, error = %error, "failed to read stored value");
                None
            }
        }
    }

    fn write_raw(&mut self, key: &str, value: &str) {
        if let Err(error) = self.store.set(key, value) {
            error!(key = %key, error = %error, "failed to persist value, keeping in-memory state");
        }
    }

    fn delete(&mut self, key: &str) {
        if let Err(error) = self.store.remove(key) {
            error!(key = %key, error = %error, "failed to delete stored value");
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key = %key, error = %error, "discarding corrupt record");
            None
        }
    }
}

fn count_from_value(value: &Value) -> u32 {
    let count = match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|n| *n > 0.0).map(|n| n.trunc() as u64))
            .unwrap_or(0),
        Value::String(text) => text.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    };
    u32::try_from(count).unwrap_or(u32::MAX)
}
