//! Closed enumeration of unlockable badges.

use std::{fmt, str::FromStr};

use crate::Tier;

/// Unique-catch counts that unlock a milestone badge, in ascending order.
pub const UNIQUE_MILESTONES: [u32; 15] = [
    3, 5, 10, 25, 50, 75, 100, 150, 200, 300, 400, 500, 600, 700, 800,
];

/// Lifetime catch count at which every catalog entry counts as perfected.
pub const PERFECTION_CATCHES: u32 = 3;

const FIRST_CATCH_KEY: &str = "firsttower";
const MILESTONE_PREFIX: &str = "towercount_";
const MASTERY_KEY: &str = "mastery";
const PERFECTION_KEY: &str = "perfection";

/// Identifier of a permanently unlockable achievement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BadgeId {
    /// First catch of any entity belonging to the tier.
    Tier(Tier),
    /// First catch overall.
    FirstCatch,
    /// Unique-catch count reached the wrapped milestone.
    UniqueMilestone(u32),
    /// Every catalog entry has been caught at least once.
    Mastery,
    /// Every catalog entry has been caught at least [`PERFECTION_CATCHES`] times.
    Perfection,
}

impl BadgeId {
    /// Every badge in presentation order: tiers, first catch, milestones, completion.
    #[must_use]
    pub fn all() -> Vec<BadgeId> {
        let mut badges: Vec<BadgeId> = Tier::ALL.into_iter().map(BadgeId::Tier).collect();
        badges.push(BadgeId::FirstCatch);
        badges.extend(UNIQUE_MILESTONES.into_iter().map(BadgeId::UniqueMilestone));
        badges.push(BadgeId::Mastery);
        badges.push(BadgeId::Perfection);
        badges
    }

    /// Storage identifier of the badge.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Tier(tier) => tier.key().to_owned(),
            Self::FirstCatch => FIRST_CATCH_KEY.to_owned(),
            Self::UniqueMilestone(count) => format!("{MILESTONE_PREFIX}{count}"),
            Self::Mastery => MASTERY_KEY.to_owned(),
            Self::Perfection => PERFECTION_KEY.to_owned(),
        }
    }

    /// Parses a storage identifier, rejecting milestones outside [`UNIQUE_MILESTONES`].
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        match key {
            FIRST_CATCH_KEY => return Some(Self::FirstCatch),
            MASTERY_KEY => return Some(Self::Mastery),
            PERFECTION_KEY => return Some(Self::Perfection),
            _ => {}
        }

        if let Some(count) = key.strip_prefix(MILESTONE_PREFIX) {
            let count: u32 = count.parse().ok()?;
            return UNIQUE_MILESTONES
                .contains(&count)
                .then_some(Self::UniqueMilestone(count));
        }

        Tier::ALL
            .into_iter()
            .find(|tier| tier.key() == key)
            .map(Self::Tier)
    }

    /// Short label used in unlock notifications.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Tier(tier) => tier.display_name().to_owned(),
            Self::FirstCatch => "First Tower".to_owned(),
            Self::UniqueMilestone(count) => format!("{count} Towers"),
            Self::Mastery => "Mastery".to_owned(),
            Self::Perfection => "Perfection".to_owned(),
        }
    }

    /// Sentence describing the unlock condition.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Tier(tier) => format!("Catch your first {} tower", tier.display_name()),
            Self::FirstCatch => "Catch your first tower".to_owned(),
            Self::UniqueMilestone(count) => format!("Catch {count} unique towers"),
            Self::Mastery => "Catch every single tower in-game".to_owned(),
            Self::Perfection => format!(
                "Catch every single tower {PERFECTION_CATCHES} times each"
            ),
        }
    }
}

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Error produced when a string names no known badge.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown badge `{0}`")]
pub struct UnknownBadge(pub String);

impl FromStr for BadgeId {
    type Err = UnknownBadge;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| UnknownBadge(value.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_enumeration_has_expected_size() {
        assert_eq!(BadgeId::all().len(), 17 + 1 + UNIQUE_MILESTONES.len() + 2);
    }

    #[test]
    fn every_badge_key_parses_back() {
        for badge in BadgeId::all() {
            assert_eq!(BadgeId::parse(&badge.key()), Some(badge), "{badge}");
        }
    }

    #[test]
    fn rejects_unknown_milestones_and_keys() {
        assert_eq!(BadgeId::parse("towercount_4"), None);
        assert_eq!(BadgeId::parse("towercount_"), None);
        assert_eq!(BadgeId::parse("speedrun"), None);
        assert!("Easy".parse::<BadgeId>().is_err());
    }

    #[test]
    fn descriptions_use_tier_display_names() {
        assert_eq!(
            BadgeId::Tier(Tier::Error).description(),
            "Catch your first eRRoR tower"
        );
        assert_eq!(BadgeId::UniqueMilestone(25).display_name(), "25 Towers");
    }
}
