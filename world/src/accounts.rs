//! Account identities, credentials and the reserved-username ledger.

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use tower_catch_core::{
    normalize_username, validate_username, AccountError, PlayerProfile, Timestamp,
};
use tower_catch_store::{AccountRecord, KeyValueStore, Repository};
use tracing::{info, warn};

use crate::ranks::RankRegistry;

/// Identifier of the owner account guaranteed to exist.
pub const DEFAULT_OWNER_USERNAME: &str = "I_Am_Grassy";

/// Former owner identities folded into [`DEFAULT_OWNER_USERNAME`] at startup.
pub const LEGACY_OWNER_USERNAMES: [&str; 2] = ["livingmy9lifes", "IAmGrassy"];

/// Quote written into freshly created profiles.
pub const DEFAULT_QUOTE: &str = "No quote yet.";

const DEFAULT_OWNER_PASSWORD: &str = "towerofqwertyuiopcompleted";
const AUTO_IDENTITY_PREFIX: &str = "Player";
const AUTO_IDENTITY_ATTEMPTS: u32 = 1_000;
const HASH_SCHEME: &str = "sha256";
const SALT_BYTES: usize = 16;
const LEGACY_HASH_SUFFIX: &str = "|tower-index";
const SEARCH_LIMIT: usize = 5;

/// Registry of accounts keyed by identifier.
///
/// Identifiers keep the case they were registered with, while uniqueness is
/// checked on the normalised form against both live accounts and the ledger of
/// every identifier ever handed out.
#[derive(Debug)]
pub struct AccountStore {
    accounts: BTreeMap<String, AccountRecord>,
    taken: BTreeSet<String>,
    rng: ChaCha8Rng,
}

impl AccountStore {
    pub(crate) fn load<S: KeyValueStore>(repository: &Repository<S>, seed: u64) -> Self {
        Self {
            accounts: repository.load_accounts(),
            taken: repository.load_taken_usernames(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Reports whether no account exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterates account identifiers in lexical order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.accounts.keys().map(String::as_str)
    }

    /// Stored record of the account with exactly this identifier.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<&AccountRecord> {
        self.accounts.get(id)
    }

    /// Resolves a typed username to the stored identifier, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn resolve(&self, username: &str) -> Option<&str> {
        let trimmed = username.trim();
        if let Some((id, _)) = self.accounts.get_key_value(trimmed) {
            return Some(id.as_str());
        }
        let normalized = normalize_username(trimmed);
        if normalized.is_empty() {
            return None;
        }
        self.ids().find(|id| normalize_username(id) == normalized)
    }

    /// Reports whether `username` collides with an account or a reserved name.
    ///
    /// Collisions with `owner` itself are ignored so an account may change the
    /// case of its own identifier.
    #[must_use]
    pub fn is_taken(&self, username: &str, owner: Option<&str>) -> bool {
        let normalized = normalize_username(username);
        let owner = owner.map(normalize_username);
        let collides = |name: &String| {
            let candidate = normalize_username(name);
            candidate == normalized && owner.as_deref() != Some(candidate.as_str())
        };
        self.accounts.keys().any(collides) || self.taken.iter().any(collides)
    }

    /// Creates an account and its initial profile.
    ///
    /// An empty password creates an account that only accepts an empty password.
    pub fn create<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        username: &str,
        password: &str,
        now: Timestamp,
    ) -> Result<String, AccountError> {
        let id = validate_username(username)?;
        if self.is_taken(&id, None) {
            return Err(AccountError::DuplicateUsername(id));
        }

        let password_hash = if password.is_empty() {
            String::new()
        } else {
            self.hash_password(password)
        };
        let _ = self.accounts.insert(
            id.clone(),
            AccountRecord {
                password_hash,
                created_at: now,
                updated_at: now,
            },
        );
        repository.save_accounts(&self.accounts);
        let profile = PlayerProfile {
            username: id.clone(),
            quote: DEFAULT_QUOTE.to_owned(),
            ..PlayerProfile::default()
        };
        repository.save_profile(&id, &profile);
        repository.start_progression(&id);
        self.reserve(repository, &id);
        info!(account = %id, "account created");
        Ok(id)
    }

    /// Checks a password against the account with exactly this identifier.
    #[must_use]
    pub fn verify(&self, id: &str, password: &str) -> bool {
        self.accounts
            .get(id)
            .is_some_and(|record| verify_password(&record.password_hash, password))
    }

    /// Replaces the password of an existing account.
    pub fn set_password<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        id: &str,
        password: &str,
        now: Timestamp,
    ) -> bool {
        let password_hash = self.hash_password(password);
        let Some(record) = self.accounts.get_mut(id) else {
            return false;
        };
        record.password_hash = password_hash;
        record.updated_at = now;
        repository.save_accounts(&self.accounts);
        info!(account = %id, "password changed");
        true
    }

    /// Moves an account and every namespaced record to a new identifier.
    ///
    /// Fails without side effects when `old` does not exist or another account
    /// already normalizes to `new`. Rank memberships follow the account.
    pub fn rename<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        ranks: &mut RankRegistry,
        old: &str,
        new: &str,
        now: Timestamp,
    ) -> bool {
        let (old, new) = (old.trim(), new.trim());
        if old.is_empty() || new.is_empty() || self.accounts.contains_key(new) {
            return false;
        }
        if self.resolve(new).is_some_and(|id| id != old) {
            return false;
        }
        let Some(mut record) = self.accounts.remove(old) else {
            return false;
        };

        repository.relocate(old, new);
        record.updated_at = now;
        let _ = self.accounts.insert(new.to_owned(), record);
        repository.save_accounts(&self.accounts);

        let _ = self.taken.remove(old);
        let _ = self.taken.insert(new.to_owned());
        self.refresh_ledger(repository);
        ranks.rename(repository, old, new);
        info!(from = %old, to = %new, "account renamed");
        true
    }

    /// Deletes an account, its namespaced records, its ledger entry and its ranks.
    pub fn remove<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        ranks: &mut RankRegistry,
        username: &str,
    ) -> bool {
        let Some(id) = self.resolve(username).map(str::to_owned) else {
            return false;
        };

        repository.purge(&id);
        let _ = self.accounts.remove(&id);
        repository.save_accounts(&self.accounts);
        let _ = self.taken.remove(&id);
        self.refresh_ledger(repository);
        ranks.remove(repository, &id);
        info!(account = %id, "account removed");
        true
    }

    /// Adds `name` to the reserved-username ledger.
    pub fn reserve<S: KeyValueStore>(&mut self, repository: &mut Repository<S>, name: &str) {
        if self.taken.insert(name.to_owned()) {
            repository.save_taken_usernames(&self.taken);
        }
    }

    /// Draws a fresh `Player########` identity and reserves it.
    pub fn generate_identity<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
    ) -> String {
        let mut candidate = String::new();
        for _ in 0..AUTO_IDENTITY_ATTEMPTS {
            let number: u32 = self.rng.gen_range(0..100_000_000);
            candidate = format!("{AUTO_IDENTITY_PREFIX}{number:08}");
            if !self.is_taken(&candidate, None) {
                break;
            }
        }
        self.reserve(repository, &candidate);
        candidate
    }

    /// Re-adds every live account identifier to the ledger.
    pub fn refresh_ledger<S: KeyValueStore>(&mut self, repository: &mut Repository<S>) {
        let before = self.taken.len();
        self.taken.extend(self.accounts.keys().cloned());
        if self.taken.len() != before {
            repository.save_taken_usernames(&self.taken);
        }
    }

    /// Creates the default owner account when it does not exist yet.
    pub(crate) fn ensure_default_owner<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        now: Timestamp,
    ) {
        if self.accounts.contains_key(DEFAULT_OWNER_USERNAME) {
            return;
        }
        // Owner identity may be squatted in the ledger by a removed account.
        let _ = self.taken.remove(DEFAULT_OWNER_USERNAME);
        let created = self.create(
            repository,
            DEFAULT_OWNER_USERNAME,
            DEFAULT_OWNER_PASSWORD,
            now,
        );
        if let Err(error) = created {
            warn!(error = %error, "failed to create default owner account");
        }
    }

    /// Folds legacy owner identities away: removed when they exist as accounts,
    /// otherwise dropped from the rank lists.
    pub(crate) fn cleanup_legacy_owners<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        ranks: &mut RankRegistry,
    ) {
        let owner = normalize_username(DEFAULT_OWNER_USERNAME);
        for legacy in LEGACY_OWNER_USERNAMES {
            if normalize_username(legacy) == owner {
                continue;
            }
            if self.resolve(legacy).is_some() {
                let _ = self.remove(repository, ranks, legacy);
            } else {
                ranks.remove(repository, legacy);
            }
        }
    }

    /// Turns the unscoped records of a pre-account installation into an account.
    ///
    /// Only runs when no account exists yet. The migrated account has no
    /// password and becomes the current user.
    pub(crate) fn migrate_legacy<S: KeyValueStore>(
        &mut self,
        repository: &mut Repository<S>,
        now: Timestamp,
    ) -> Option<String> {
        if !self.accounts.is_empty() || !repository.has_legacy_profile() {
            return None;
        }

        let legacy_name = repository.legacy_profile().username.trim().to_owned();
        let id = if legacy_name.is_empty() || self.accounts.contains_key(&legacy_name) {
            self.generate_identity(repository)
        } else {
            legacy_name
        };

        let _ = self.accounts.insert(
            id.clone(),
            AccountRecord {
                password_hash: String::new(),
                created_at: now,
                updated_at: now,
            },
        );
        repository.save_accounts(&self.accounts);
        repository.migrate_legacy(&id);
        repository.set_current_username(Some(&id));
        self.refresh_ledger(repository);
        info!(account = %id, "migrated legacy progress into account");
        Some(id)
    }

    /// Up to five identifiers matching `query`, best match first.
    ///
    /// An empty query lists the first identifiers. Otherwise matches are
    /// case-insensitive substrings ordered by match position, then name.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<String> {
        if query.is_empty() {
            return self.ids().take(SEARCH_LIMIT).map(str::to_owned).collect();
        }
        let needle = query.to_lowercase();
        let mut matches: Vec<(usize, &str)> = self
            .ids()
            .filter_map(|id| id.to_lowercase().find(&needle).map(|position| (position, id)))
            .collect();
        matches.sort();
        matches
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|(_, id)| id.to_owned())
            .collect()
    }

    fn hash_password(&mut self, password: &str) -> String {
        let mut salt = [0_u8; SALT_BYTES];
        self.rng.fill_bytes(&mut salt);
        salted_hash(password, &salt)
    }
}

/// Checks `password` against a stored hash.
///
/// Empty hashes accept only the empty password. Hashes without the salted
/// scheme prefix are verified with the legacy 32-bit rolling hash.
#[must_use]
pub fn verify_password(stored: &str, password: &str) -> bool {
    if stored.is_empty() {
        return password.is_empty();
    }

    let Some(rest) = stored
        .strip_prefix(HASH_SCHEME)
        .and_then(|rest| rest.strip_prefix('$'))
    else {
        return legacy_hash(password) == stored;
    };
    let Some((salt, _)) = rest.split_once('$') else {
        return false;
    };
    match hex::decode(salt) {
        Ok(salt) => salted_hash(password, &salt) == stored,
        Err(_) => false,
    }
}

fn salted_hash(password: &str, salt: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    format!(
        "{HASH_SCHEME}${}${}",
        hex::encode(salt),
        hex::encode(hasher.finalize())
    )
}

fn legacy_hash(password: &str) -> String {
    let text = format!("{password}{LEGACY_HASH_SUFFIX}");
    let hash = text.encode_utf16().fold(0_i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    });
    to_base36(hash)
}

fn to_base36(value: i32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut magnitude = i64::from(value).unsigned_abs();
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(magnitude % 36) as usize]);
        magnitude /= 36;
        if magnitude == 0 {
            break;
        }
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.iter().rev().map(|&digit| char::from(digit)).collect()
}
