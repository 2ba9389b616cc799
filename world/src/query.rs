//! Read-only views exposed to renderers.

use tower_catch_core::{
    Announcement, BadgeId, Catalog, PlayerProfile, Rank, Tier, Timestamp, WELCOME_BANNER,
};
use tower_catch_store::KeyValueStore;
pub use tower_catch_system_round::{PhaseKind, RoundView};

use crate::{accounts::DEFAULT_QUOTE, progression, Session};

/// Reports the welcome banner that adapters may display to players.
#[must_use]
pub fn welcome_banner<S>(_session: &Session<S>) -> &'static str {
    WELCOME_BANNER
}

/// Identifier of the signed-in account.
#[must_use]
pub fn active_account<S>(session: &Session<S>) -> Option<&str> {
    session.context.as_ref().map(|context| context.account())
}

/// Profile of the signed-in account.
#[must_use]
pub fn profile<S>(session: &Session<S>) -> Option<&PlayerProfile> {
    session
        .context
        .as_ref()
        .map(|context| context.progression.profile())
}

/// Rank held by any username.
#[must_use]
pub fn rank<S>(session: &Session<S>, username: &str) -> Rank {
    session.ranks.rank_of(username)
}

/// Currency balance of the signed-in account.
#[must_use]
pub fn currency<S>(session: &Session<S>) -> Option<u64> {
    session
        .context
        .as_ref()
        .map(|context| context.progression.currency())
}

/// Lifetime catch count of an entity for the signed-in account.
#[must_use]
pub fn catch_count<S>(session: &Session<S>, entity: &str) -> u32 {
    session
        .context
        .as_ref()
        .map_or(0, |context| context.progression.catch_count(entity))
}

/// Number of catalog entities the signed-in account caught at least once.
#[must_use]
pub fn unique_count<S>(session: &Session<S>) -> usize {
    session.context.as_ref().map_or(0, |context| {
        progression::unique_count(context.progression.catches(), &session.catalog)
    })
}

/// Sum of every catch count of the signed-in account.
#[must_use]
pub fn total_count<S>(session: &Session<S>) -> u64 {
    session.context.as_ref().map_or(0, |context| {
        progression::total_count(context.progression.catches())
    })
}

/// Rarest tier the signed-in account caught.
#[must_use]
pub fn hardest_tier<S>(session: &Session<S>) -> Option<Tier> {
    session.context.as_ref().and_then(|context| {
        progression::hardest_tier(context.progression.catches(), &session.catalog)
    })
}

/// Badge shown in the badge list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BadgeStatus {
    /// Badge identifier.
    pub badge: BadgeId,
    /// Display name.
    pub name: String,
    /// Unlock condition.
    pub description: String,
    /// Whether the signed-in account unlocked the badge.
    pub unlocked: bool,
}

/// Every badge with the signed-in account's unlock state.
#[must_use]
pub fn badges<S>(session: &Session<S>) -> Vec<BadgeStatus> {
    let unlocked = session
        .context
        .as_ref()
        .map(|context| context.progression.badges());
    BadgeId::all()
        .into_iter()
        .map(|badge| BadgeStatus {
            name: badge.display_name(),
            description: badge.description(),
            unlocked: unlocked.is_some_and(|set| set.contains(&badge)),
            badge,
        })
        .collect()
}

/// Catalog entity together with its catch count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionEntry {
    /// Entity name.
    pub entity: String,
    /// Lifetime catch count; zero when never caught.
    pub count: u32,
}

/// Collection page of one tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionTier {
    /// Tier of the page.
    pub tier: Tier,
    /// Entities in catalog order.
    pub entries: Vec<CollectionEntry>,
}

impl CollectionTier {
    /// Number of entities caught at least once.
    #[must_use]
    pub fn caught(&self) -> usize {
        self.entries.iter().filter(|entry| entry.count > 0).count()
    }
}

/// Catalog grouped by tier with the signed-in account's catch counts.
#[must_use]
pub fn collection<S>(session: &Session<S>) -> Vec<CollectionTier> {
    session
        .catalog
        .iter()
        .map(|(tier, entities)| CollectionTier {
            tier,
            entries: entities
                .iter()
                .map(|entity| CollectionEntry {
                    entity: entity.clone(),
                    count: catch_count(session, entity),
                })
                .collect(),
        })
        .collect()
}

/// Purchasable shop spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShopOffer {
    /// Tier forced by the purchase.
    pub tier: Tier,
    /// Currency spent.
    pub cost: u64,
    /// Whether the balance covers the cost.
    pub affordable: bool,
    /// Whether the tier holds any entity.
    pub available: bool,
}

/// Every shop spawn, most common tier first.
#[must_use]
pub fn shop_offers<S>(session: &Session<S>) -> Vec<ShopOffer> {
    let balance = currency(session).unwrap_or(0);
    Tier::ALL
        .into_iter()
        .map(|tier| ShopOffer {
            tier,
            cost: tier.spawn_cost(),
            affordable: balance >= tier.spawn_cost(),
            available: !session.catalog.entities(tier).is_empty(),
        })
        .collect()
}

/// Round scheduler state as seen at `now`.
#[must_use]
pub fn round<S>(session: &Session<S>, now: Timestamp) -> RoundView {
    session.scheduler.view(now)
}

/// Announcement currently on display.
#[must_use]
pub fn announcement<S>(session: &Session<S>) -> Option<&Announcement> {
    session.board.current()
}

/// Number of announcements waiting behind the displayed one.
#[must_use]
pub fn pending_announcements<S>(session: &Session<S>) -> usize {
    session.board.pending()
}

/// Public profile card of any account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileSummary {
    /// Account identifier.
    pub account: String,
    /// Rank of the account.
    pub rank: Rank,
    /// Favourite entity, empty when unset.
    pub favorite_entity: String,
    /// Least favourite entity, empty when unset.
    pub least_favorite_entity: String,
    /// Quote, or the placeholder when unset.
    pub quote: String,
    /// Whole seconds of playtime.
    pub playtime_seconds: u64,
    /// Catalog entities caught at least once.
    pub unique_count: usize,
    /// Sum of every catch count.
    pub total_count: u64,
    /// Rarest tier caught.
    pub hardest_tier: Option<Tier>,
    /// Number of unlocked badges.
    pub badge_count: usize,
}

/// Profile card of the account matching `username`, case-insensitively.
#[must_use]
pub fn profile_summary<S: KeyValueStore>(
    session: &Session<S>,
    username: &str,
) -> Option<ProfileSummary> {
    let id = session.accounts.resolve(username)?;
    let active = session
        .context
        .as_ref()
        .filter(|context| context.account() == id)
        .map(|context| &context.progression);

    let (profile, catches, badge_count) = match active {
        Some(progression) => (
            progression.profile().clone(),
            progression.catches().clone(),
            progression.badges().len(),
        ),
        None => (
            session.repository.load_profile(id),
            session.repository.load_catches(id),
            session.repository.load_badges(id).len(),
        ),
    };
    let quote = if profile.quote.trim().is_empty() {
        DEFAULT_QUOTE.to_owned()
    } else {
        profile.quote
    };

    Some(ProfileSummary {
        account: id.to_owned(),
        rank: session.ranks.rank_of(id),
        favorite_entity: profile.favorite_entity,
        least_favorite_entity: profile.least_favorite_entity,
        quote,
        playtime_seconds: profile.playtime_seconds,
        unique_count: progression::unique_count(&catches, &session.catalog),
        total_count: progression::total_count(&catches),
        hardest_tier: progression::hardest_tier(&catches, &session.catalog),
        badge_count,
    })
}

/// Up to five account identifiers matching `query`.
#[must_use]
pub fn search_accounts<S>(session: &Session<S>, query: &str) -> Vec<String> {
    session.accounts.search(query)
}

/// Installation-wide statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalStatsView {
    /// Number of registered accounts.
    pub total_players: usize,
    /// Whole seconds of playtime across every account.
    pub total_playtime_seconds: u64,
    /// Catches across every account.
    pub total_tower_catches: u64,
}

/// Global statistics, visible only to owners and co-owners.
#[must_use]
pub fn global_stats<S>(session: &Session<S>) -> Option<GlobalStatsView> {
    let viewer = active_account(session)?;
    if !session.ranks.rank_of(viewer).is_privileged() {
        return None;
    }
    Some(GlobalStatsView {
        total_players: session.accounts.len(),
        total_playtime_seconds: session.stats.total_playtime_seconds,
        total_tower_catches: session.stats.total_tower_catches,
    })
}

/// Catalog the session draws from.
#[must_use]
pub fn catalog<S>(session: &Session<S>) -> &Catalog {
    &session.catalog
}
