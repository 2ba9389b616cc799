#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Tower Catch engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing player intents, the world executes those commands via its
//! `apply` entry point against the active session, and then broadcasts
//! [`Event`] values that adapters render. Systems own timing and randomness and
//! never touch storage directly.

mod badge;
mod catalog;
mod tier;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use badge::{BadgeId, UnknownBadge, PERFECTION_CATCHES, UNIQUE_MILESTONES};
pub use catalog::Catalog;
pub use tier::{Tier, UnknownTier};

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to Tower Catch.";

/// Maximum number of characters accepted in a username.
pub const MAX_USERNAME_CHARS: usize = 32;

/// Minimum number of characters accepted in a password.
pub const MIN_PASSWORD_CHARS: usize = 4;

/// Maximum number of characters accepted in a profile quote.
pub const MAX_QUOTE_CHARS: usize = 512;

/// Commands that express every player intent the world accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Creates a new account and signs into it.
    Register {
        /// Requested account identifier.
        username: String,
        /// Plain-text password chosen by the player.
        password: String,
        /// Repetition of the password that must match exactly.
        confirmation: String,
    },
    /// Signs into an existing account.
    Login {
        /// Account identifier, matched case-insensitively.
        username: String,
        /// Plain-text password to verify.
        password: String,
    },
    /// Signs out of the active account.
    Logout,
    /// Advances every wall-clock driven subsystem to the supplied time.
    Tick,
    /// Skips the remainder of the pre-spawn countdown.
    AdvanceCountdown,
    /// Submits a guess for the revealed entity.
    SubmitGuess {
        /// Raw text typed by the player.
        guess: String,
    },
    /// Abandons the revealed round without reward.
    SkipRound,
    /// Spends currency to reveal a round of the requested tier immediately.
    SpawnFromShop {
        /// Tier the player pays to force.
        tier: Tier,
    },
    /// Renames the active account.
    ChangeUsername {
        /// Requested new identifier.
        username: String,
    },
    /// Replaces the active account's password.
    ChangePassword {
        /// New plain-text password.
        password: String,
        /// Repetition of the new password.
        confirmation: String,
    },
    /// Sets the favourite entity shown on the profile; empty clears it.
    SetFavorite {
        /// Catalog entity name or an empty string.
        entity: String,
    },
    /// Sets the least favourite entity shown on the profile; empty clears it.
    SetLeastFavorite {
        /// Catalog entity name or an empty string.
        entity: String,
    },
    /// Replaces the profile quote.
    SetQuote {
        /// New quote text.
        quote: String,
    },
    /// Wipes progression for the active account.
    ResetProgress {
        /// Profile fields that survive the reset.
        preserve: ProfilePreservation,
    },
    /// Deletes an account together with all of its records.
    RemoveAccount {
        /// Identifier of the account to delete, matched case-insensitively.
        username: String,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that a new account was created.
    AccountRegistered {
        /// Identifier of the created account.
        account: String,
    },
    /// Confirms that an account became the active session.
    SessionStarted {
        /// Identifier of the signed-in account.
        account: String,
    },
    /// Confirms that the active session was torn down.
    SessionEnded {
        /// Identifier of the account that was signed out.
        account: String,
    },
    /// Reports that a registration or login attempt failed.
    AuthenticationRejected {
        /// Specific reason the attempt failed.
        reason: AccountError,
    },
    /// Reports that a command needs an active session.
    SignInRequired,
    /// Announces that a pre-spawn countdown began.
    CountdownStarted {
        /// Number of whole ticks before the reveal.
        ticks: u32,
    },
    /// Reports the countdown after a whole tick elapsed.
    CountdownTicked {
        /// Number of whole ticks still remaining.
        ticks_remaining: u32,
    },
    /// Announces that a round entered its resolution window.
    RoundRevealed {
        /// Name of the revealed entity.
        entity: String,
        /// Tier of the revealed entity.
        tier: Tier,
        /// Time left before the round expires.
        remaining: Duration,
        /// Whether the player may skip immediately.
        skippable: bool,
        /// Whether the round was forced through the shop.
        intentional: bool,
    },
    /// Announces that a persisted round was reconstructed after a restart.
    RoundResumed {
        /// Name of the resumed entity.
        entity: String,
        /// Tier of the resumed entity.
        tier: Tier,
        /// Time left before the round expires.
        remaining: Duration,
        /// Whether the player may skip immediately.
        skippable: bool,
        /// Whether the round was forced through the shop.
        intentional: bool,
    },
    /// Reports the resolution countdown after a whole tick elapsed.
    RoundTicked {
        /// Time left before the round expires.
        remaining: Duration,
        /// Whether the player may skip.
        skippable: bool,
    },
    /// Reports that a guess did not match the revealed entity.
    GuessRejected {
        /// Trimmed guess that was rejected.
        guess: String,
    },
    /// Confirms that the revealed entity was caught.
    RoundCaught {
        /// Name of the caught entity.
        entity: String,
        /// Tier of the caught entity.
        tier: Tier,
        /// Lifetime catch count of the entity after this catch.
        catch_count: u32,
        /// Currency granted for the catch.
        reward: u64,
        /// Badges unlocked by the catch in evaluation order.
        badges: Vec<BadgeId>,
    },
    /// Confirms that the player skipped the revealed round.
    RoundSkipped {
        /// Name of the skipped entity.
        entity: String,
        /// Tier of the skipped entity.
        tier: Tier,
    },
    /// Reports that a skip was requested before the round became skippable.
    SkipRejected,
    /// Reports that the resolution window closed without a catch.
    RoundExpired {
        /// Name of the expired entity.
        entity: String,
        /// Tier of the expired entity.
        tier: Tier,
    },
    /// Reports that the drawn tier had no entities and a new draw is scheduled.
    RoundUnavailable {
        /// Tier that turned out to be empty.
        tier: Tier,
    },
    /// Reports the currency balance after it changed.
    CurrencyChanged {
        /// Balance after the change.
        balance: u64,
    },
    /// Reports that a shop purchase was refused without mutating state.
    ShopPurchaseRejected {
        /// Tier the player attempted to buy.
        tier: Tier,
        /// Specific reason the purchase failed.
        reason: ShopError,
    },
    /// Confirms that an announcement joined the broadcast queue.
    AnnouncementQueued {
        /// Announcement that was queued.
        announcement: Announcement,
    },
    /// Announces that an announcement became the one on display.
    AnnouncementShown {
        /// Announcement now on display.
        announcement: Announcement,
    },
    /// Announces that the displayed announcement finished its display duration.
    AnnouncementCleared,
    /// Confirms that the active account was renamed.
    UsernameChanged {
        /// Identifier before the rename.
        from: String,
        /// Identifier after the rename.
        to: String,
    },
    /// Reports that a rename request failed.
    UsernameChangeRejected {
        /// Specific reason the rename failed.
        reason: AccountError,
    },
    /// Confirms that editable profile fields changed.
    ProfileUpdated {
        /// Profile after the update.
        profile: PlayerProfile,
    },
    /// Reports that a profile edit failed validation.
    ProfileUpdateRejected {
        /// Specific reason the edit failed.
        reason: ProfileError,
    },
    /// Confirms that the active account's password changed.
    PasswordChanged,
    /// Reports that a password change failed validation.
    PasswordChangeRejected {
        /// Specific reason the change failed.
        reason: PasswordError,
    },
    /// Confirms that progression was wiped for the active account.
    ProgressReset {
        /// Identifier of the account after the reset.
        account: String,
    },
    /// Confirms that an account and its records were deleted.
    AccountRemoved {
        /// Identifier of the deleted account.
        account: String,
    },
    /// Reports that an account removal request failed.
    AccountRemovalRejected {
        /// Identifier requested for removal.
        account: String,
        /// Specific reason the removal failed.
        reason: AccountError,
    },
    /// Reports that whole seconds of playtime were committed.
    PlaytimeAccrued {
        /// Seconds committed by this accrual.
        seconds: u64,
        /// Profile playtime after the accrual.
        total: u64,
    },
}

/// Wall-clock instant measured in milliseconds since the Unix epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Retrieves the epoch milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Reads the system clock; clocks set before the epoch read as zero.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self(millis)
    }

    /// Returns the instant `duration` later, saturating at the maximum.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }

    /// Time elapsed since `earlier`, or zero when `earlier` lies in the future.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

fn timer_started_default() -> bool {
    true
}

/// Persisted snapshot of a revealed round.
///
/// Absence of a snapshot means the scheduler is idle or counting down. The
/// reveal time is fixed when the round first appears and is never rewritten,
/// so the resolution deadline survives restarts unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    #[serde(rename = "tower")]
    entity: String,
    #[serde(rename = "difficulty")]
    tier: Tier,
    #[serde(rename = "startTime")]
    revealed_at: Timestamp,
    #[serde(rename = "timerStarted", default = "timer_started_default")]
    timer_started: bool,
    #[serde(default)]
    intentional: bool,
}

impl RoundState {
    /// Captures a round revealed at `revealed_at`.
    #[must_use]
    pub fn new(entity: String, tier: Tier, revealed_at: Timestamp, intentional: bool) -> Self {
        Self {
            entity,
            tier,
            revealed_at,
            timer_started: true,
            intentional,
        }
    }

    /// Name of the revealed entity.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Tier of the revealed entity.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Instant at which the round was first revealed.
    #[must_use]
    pub const fn revealed_at(&self) -> Timestamp {
        self.revealed_at
    }

    /// Whether the round was forced through the shop and pays no reward.
    #[must_use]
    pub const fn intentional(&self) -> bool {
        self.intentional
    }

    /// Instant at which the resolution window of length `window` closes.
    #[must_use]
    pub fn deadline(&self, window: Duration) -> Timestamp {
        self.revealed_at.saturating_add(window)
    }
}

/// Editable profile fields stored per account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerProfile {
    /// Display username; mirrors the account identifier.
    pub username: String,
    /// Favourite catalog entity, empty when unset.
    #[serde(rename = "favoriteTower")]
    pub favorite_entity: String,
    /// Least favourite catalog entity, empty when unset.
    #[serde(rename = "leastFavoriteTower")]
    pub least_favorite_entity: String,
    /// Free-form quote, empty when unset.
    pub quote: String,
    /// Whole seconds of accrued playtime.
    pub playtime_seconds: u64,
}

/// Installation-wide aggregates accumulated across every account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalStats {
    /// Whole seconds of playtime across all accounts.
    pub total_playtime_seconds: u64,
    /// Catches recorded across all accounts.
    pub total_tower_catches: u64,
}

/// Broadcast message describing a high-rarity catch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Announcement {
    text: String,
    tier: Tier,
}

impl Announcement {
    /// Builds the announcement for a catch, or `None` when the tier is not announced.
    #[must_use]
    pub fn for_catch(username: &str, entity: &str, tier: Tier) -> Option<Self> {
        tier.is_announced().then(|| Self {
            text: format!("{username} caught {entity} ({})!", tier.display_name()),
            tier,
        })
    }

    /// Text presented to players.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tier of the announced catch.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Whether renderers should apply the emphasised presentation.
    #[must_use]
    pub fn amplified(&self) -> bool {
        self.tier.is_amplified()
    }
}

/// Privilege tier assigned to a username.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    /// Full control over the installation.
    Owner,
    /// Shares the owner's visibility into global statistics.
    CoOwner,
    /// Recognised tester without extra visibility.
    Tester,
    /// Default rank for every other account.
    Player,
}

impl Rank {
    /// Label shown next to usernames.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::CoOwner => "Co-Owner",
            Self::Tester => "Tester",
            Self::Player => "Player",
        }
    }

    /// Whether the rank may view global statistics and manage accounts.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Owner | Self::CoOwner)
    }
}

/// Flags selecting which profile fields survive a progression reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProfilePreservation {
    /// Keep the account identifier instead of switching to an auto identity.
    pub keep_username: bool,
    /// Keep the favourite and least favourite entities.
    pub keep_favorites: bool,
    /// Keep the profile quote.
    pub keep_quote: bool,
}

impl ProfilePreservation {
    /// Preserves every identity-adjacent field.
    #[must_use]
    pub const fn everything() -> Self {
        Self {
            keep_username: true,
            keep_favorites: true,
            keep_quote: true,
        }
    }

    /// Preserves nothing; the account receives a fresh auto identity.
    #[must_use]
    pub const fn nothing() -> Self {
        Self {
            keep_username: false,
            keep_favorites: false,
            keep_quote: false,
        }
    }
}

impl Default for ProfilePreservation {
    fn default() -> Self {
        Self::everything()
    }
}

/// Normalised form used for uniqueness checks: trimmed and lowercased.
#[must_use]
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Validates a requested username and returns its trimmed form.
pub fn validate_username(raw: &str) -> Result<String, UsernameError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UsernameError::Empty);
    }
    if trimmed.chars().count() > MAX_USERNAME_CHARS {
        return Err(UsernameError::TooLong {
            max: MAX_USERNAME_CHARS,
        });
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-');
    if !trimmed.chars().all(allowed) {
        return Err(UsernameError::InvalidCharacter);
    }
    Ok(trimmed.to_owned())
}

/// Validates a new password against its confirmation.
pub fn validate_password(password: &str, confirmation: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(PasswordError::TooShort {
            min: MIN_PASSWORD_CHARS,
        });
    }
    if password != confirmation {
        return Err(PasswordError::Mismatch);
    }
    Ok(())
}

/// Reasons a username is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum UsernameError {
    /// Nothing but whitespace was supplied.
    #[error("username cannot be empty")]
    Empty,
    /// The trimmed username exceeds the length limit.
    #[error("username must be at most {max} characters")]
    TooLong {
        /// Maximum number of characters allowed.
        max: usize,
    },
    /// The username contains characters outside the permitted set.
    #[error("username may only contain letters, numbers, spaces, underscores and hyphens")]
    InvalidCharacter,
}

/// Reasons a new password is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum PasswordError {
    /// The password is shorter than the minimum.
    #[error("password must be at least {min} characters")]
    TooShort {
        /// Minimum number of characters required.
        min: usize,
    },
    /// The confirmation differs from the password.
    #[error("passwords do not match")]
    Mismatch,
}

/// Reasons an account operation is refused.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum AccountError {
    /// The username failed validation.
    #[error(transparent)]
    Username(#[from] UsernameError),
    /// The password failed validation.
    #[error(transparent)]
    Password(#[from] PasswordError),
    /// The normalised username collides with an account or the reserved ledger.
    #[error("username `{0}` is already taken")]
    DuplicateUsername(String),
    /// No account matches the supplied username.
    #[error("no account named `{0}`")]
    UnknownAccount(String),
    /// The supplied password does not verify.
    #[error("incorrect password")]
    IncorrectPassword,
    /// The requested username equals the current one.
    #[error("username is unchanged")]
    Unchanged,
    /// The account is the protected default owner.
    #[error("account `{0}` cannot be removed")]
    Protected(String),
    /// The active account lacks the rank required for the operation.
    #[error("insufficient privileges")]
    Forbidden,
}

/// Reasons a profile edit is refused.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ProfileError {
    /// The named entity is not part of the catalog.
    #[error("`{0}` is not a known tower")]
    UnknownEntity(String),
    /// The quote exceeds the length limit.
    #[error("quote must be at most {max} characters")]
    QuoteTooLong {
        /// Maximum number of characters allowed.
        max: usize,
    },
}

/// Reasons a progression mutation is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ProgressionError {
    /// Applying the delta would drive the balance below zero.
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds {
        /// Balance at the time of the request.
        balance: u64,
        /// Amount the request needed.
        required: u64,
    },
}

/// Reasons the catalog cannot supply an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum CatalogError {
    /// The requested tier holds no entities.
    #[error("no towers are available for the {0} tier")]
    EmptyTier(Tier),
    /// Every tier is empty, so no round can ever be revealed.
    #[error("the catalog is empty")]
    Empty,
}

/// Reasons a shop purchase is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ShopError {
    /// The balance does not cover the spawn cost.
    #[error(transparent)]
    Funds(#[from] ProgressionError),
    /// The purchased tier has no entities.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
