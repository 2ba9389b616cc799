//! Rarity tiers together with their fixed draw odds and economy tables.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Rarity bucket that groups catalog entities and fixes their reward, cost and odds.
///
/// Variants are declared from the most common tier to the rarest, so the derived
/// ordering doubles as a rarity ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Baseline tier selected whenever no rarer flip succeeds.
    Effortless,
    /// One-in-two flip.
    Easy,
    /// One-in-six flip.
    Medium,
    /// One-in-fifteen flip.
    Hard,
    /// One-in-forty flip.
    Difficult,
    /// One-in-eighty-five flip.
    Challenging,
    /// One-in-175 flip.
    Intense,
    /// One-in-300 flip.
    Remorseless,
    /// One-in-500 flip.
    Insane,
    /// One-in-750 flip.
    Extreme,
    /// One-in-1100 flip.
    Terrifying,
    /// One-in-1500 flip.
    Catastrophic,
    /// One-in-2500 flip.
    Horrific,
    /// One-in-3750 flip.
    Unreal,
    /// One-in-5000 flip.
    Nil,
    /// One-in-7000 flip.
    Error,
    /// One-in-10000 flip, the rarest tier.
    TooHard,
}

impl Tier {
    /// Every tier ordered from the most common to the rarest.
    pub const ALL: [Tier; 17] = [
        Tier::Effortless,
        Tier::Easy,
        Tier::Medium,
        Tier::Hard,
        Tier::Difficult,
        Tier::Challenging,
        Tier::Intense,
        Tier::Remorseless,
        Tier::Insane,
        Tier::Extreme,
        Tier::Terrifying,
        Tier::Catastrophic,
        Tier::Horrific,
        Tier::Unreal,
        Tier::Nil,
        Tier::Error,
        Tier::TooHard,
    ];

    /// Lowercase identifier used in storage and badge ids.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Effortless => "effortless",
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Difficult => "difficult",
            Self::Challenging => "challenging",
            Self::Intense => "intense",
            Self::Remorseless => "remorseless",
            Self::Insane => "insane",
            Self::Extreme => "extreme",
            Self::Terrifying => "terrifying",
            Self::Catastrophic => "catastrophic",
            Self::Horrific => "horrific",
            Self::Unreal => "unreal",
            Self::Nil => "nil",
            Self::Error => "error",
            Self::TooHard => "toohard",
        }
    }

    /// Name shown to players.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Effortless => "Effortless",
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
            Self::Difficult => "Difficult",
            Self::Challenging => "Challenging",
            Self::Intense => "Intense",
            Self::Remorseless => "Remorseless",
            Self::Insane => "Insane",
            Self::Extreme => "Extreme",
            Self::Terrifying => "Terrifying",
            Self::Catastrophic => "Catastrophic",
            Self::Horrific => "Horrific",
            Self::Unreal => "Unreal",
            Self::Nil => "nil",
            Self::Error => "eRRoR",
            Self::TooHard => "TooHard",
        }
    }

    /// File name of the tier's entity list inside a catalog directory.
    #[must_use]
    pub const fn catalog_file(self) -> &'static str {
        match self {
            Self::Effortless => "Effortless.txt",
            Self::Easy => "Easy.txt",
            Self::Medium => "Medium.txt",
            Self::Hard => "Hard.txt",
            Self::Difficult => "Difficult.txt",
            Self::Challenging => "Challenging.txt",
            Self::Intense => "Intense.txt",
            Self::Remorseless => "Remorseless.txt",
            Self::Insane => "Insane.txt",
            Self::Extreme => "Extreme.txt",
            Self::Terrifying => "Terrifying.txt",
            Self::Catastrophic => "Catastrophic.txt",
            Self::Horrific => "Horrific.txt",
            Self::Unreal => "Unreal.txt",
            Self::Nil => "nil.txt",
            Self::Error => "eRRoR.txt",
            Self::TooHard => "TooHard.txt",
        }
    }

    /// Denominator `n` of the tier's independent one-in-`n` flip.
    ///
    /// The baseline tier has no flip of its own and returns `None`.
    #[must_use]
    pub const fn flip_odds(self) -> Option<u32> {
        match self {
            Self::Effortless => None,
            Self::Easy => Some(2),
            Self::Medium => Some(6),
            Self::Hard => Some(15),
            Self::Difficult => Some(40),
            Self::Challenging => Some(85),
            Self::Intense => Some(175),
            Self::Remorseless => Some(300),
            Self::Insane => Some(500),
            Self::Extreme => Some(750),
            Self::Terrifying => Some(1_100),
            Self::Catastrophic => Some(1_500),
            Self::Horrific => Some(2_500),
            Self::Unreal => Some(3_750),
            Self::Nil => Some(5_000),
            Self::Error => Some(7_000),
            Self::TooHard => Some(10_000),
        }
    }

    /// Currency granted for catching an ambient (non-purchased) round of this tier.
    #[must_use]
    pub const fn reward(self) -> u64 {
        match self {
            Self::Effortless => 1,
            Self::Easy => 2,
            Self::Medium => 3,
            Self::Hard => 5,
            Self::Difficult => 10,
            Self::Challenging => 15,
            Self::Intense => 25,
            Self::Remorseless => 35,
            Self::Insane => 50,
            Self::Extreme => 75,
            Self::Terrifying => 100,
            Self::Catastrophic => 150,
            Self::Horrific => 200,
            Self::Unreal => 250,
            Self::Nil => 300,
            Self::Error => 350,
            Self::TooHard => 400,
        }
    }

    /// Currency charged by the shop to force a round of this tier.
    #[must_use]
    pub const fn spawn_cost(self) -> u64 {
        match self {
            Self::Effortless => 5,
            Self::Easy => 10,
            Self::Medium => 20,
            Self::Hard => 35,
            Self::Difficult => 60,
            Self::Challenging => 100,
            Self::Intense => 150,
            Self::Remorseless => 200,
            Self::Insane => 250,
            Self::Extreme => 325,
            Self::Terrifying => 400,
            Self::Catastrophic => 500,
            Self::Horrific => 700,
            Self::Unreal => 900,
            Self::Nil => 1_000,
            Self::Error => 1_111,
            Self::TooHard => 1_234,
        }
    }

    /// Reports whether catches of this tier are broadcast on the announcement channel.
    #[must_use]
    pub fn is_announced(self) -> bool {
        self >= Self::Insane
    }

    /// Reports whether announcements for this tier carry the emphasised presentation hint.
    #[must_use]
    pub fn is_amplified(self) -> bool {
        self >= Self::Horrific
    }

    /// Parses a tier from its key, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn from_key(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|tier| tier.key().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Error produced when a string names no known tier.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier `{0}`")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_key(value).ok_or_else(|| UnknownTier(value.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_runs_from_common_to_rare() {
        for pair in Tier::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should be more common than {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn flip_odds_grow_with_rarity() {
        let odds: Vec<u32> = Tier::ALL.iter().filter_map(|tier| tier.flip_odds()).collect();
        assert_eq!(odds.len(), 16);
        assert!(odds.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn nine_rarest_tiers_are_announced() {
        let announced = Tier::ALL.iter().filter(|tier| tier.is_announced()).count();
        assert_eq!(announced, 9);
        assert!(!Tier::Remorseless.is_announced());
        assert!(Tier::Insane.is_announced());
        assert!(!Tier::Catastrophic.is_amplified());
        assert!(Tier::Horrific.is_amplified());
    }

    #[test]
    fn keys_parse_back_case_insensitively() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from_key(tier.key()), Some(tier));
        }
        assert_eq!(" TooHard ".parse::<Tier>(), Ok(Tier::TooHard));
        assert_eq!(
            "legendary".parse::<Tier>(),
            Err(UnknownTier("legendary".to_owned()))
        );
    }

    #[test]
    fn serializes_as_lowercase_key() {
        let json = serde_json::to_string(&Tier::TooHard).expect("serialize");
        assert_eq!(json, "\"toohard\"");
        let parsed: Tier = serde_json::from_str("\"error\"").expect("deserialize");
        assert_eq!(parsed, Tier::Error);
    }

    #[test]
    fn economy_tables_match_shop_expectations() {
        assert_eq!(Tier::Easy.reward(), 2);
        assert_eq!(Tier::Hard.spawn_cost(), 35);
        assert_eq!(Tier::TooHard.spawn_cost(), 1_234);
        assert!(Tier::ALL.iter().all(|tier| tier.spawn_cost() > tier.reward()));
    }
}
