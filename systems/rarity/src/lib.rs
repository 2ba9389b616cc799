#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Rarity resolution: picks the tier and entity of the next round.
//!
//! Every tier except the baseline owns an independent one-in-`n` flip. All
//! flips are evaluated on every draw, from the rarest tier to the most common,
//! and the rarest successful flip decides the tier. When no flip succeeds the
//! baseline tier is used, which yields a long-tailed distribution without the
//! odds having to sum to one.

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tower_catch_core::{Catalog, CatalogError, Tier};

/// Configuration parameters required to construct the rarity resolver.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    rng_seed: u64,
}

impl Config {
    /// Creates a configuration seeding the resolver's random stream.
    #[must_use]
    pub const fn new(rng_seed: u64) -> Self {
        Self { rng_seed }
    }
}

/// Seeded random source drawing tiers and entities.
#[derive(Clone, Debug)]
pub struct RarityResolver {
    rng: ChaCha8Rng,
}

impl RarityResolver {
    /// Creates a resolver using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Draws the tier of the next ambient round.
    pub fn roll_tier(&mut self) -> Tier {
        resolve_tier(&mut self.rng)
    }

    /// Draws an entity of `tier` uniformly from the catalog.
    pub fn select_entity(&mut self, catalog: &Catalog, tier: Tier) -> Result<String, CatalogError> {
        select_entity(&mut self.rng, catalog, tier)
    }

    /// Draws a tier and then one of its entities.
    ///
    /// An empty tier surfaces as [`CatalogError::EmptyTier`] naming the drawn tier.
    pub fn draw(&mut self, catalog: &Catalog) -> Result<(Tier, String), CatalogError> {
        let tier = self.roll_tier();
        let entity = self.select_entity(catalog, tier)?;
        Ok((tier, entity))
    }
}

/// Evaluates every tier flip and returns the rarest tier that succeeded.
pub fn resolve_tier<R: Rng + ?Sized>(rng: &mut R) -> Tier {
    let mut selected = None;
    for tier in Tier::ALL.into_iter().rev() {
        let Some(odds) = tier.flip_odds() else {
            continue;
        };
        let hit = rng.gen_ratio(1, odds);
        if hit && selected.is_none() {
            selected = Some(tier);
        }
    }
    selected.unwrap_or(Tier::Effortless)
}

/// Draws an entity of `tier` uniformly, failing when the tier is empty.
pub fn select_entity<R: Rng + ?Sized>(
    rng: &mut R,
    catalog: &Catalog,
    tier: Tier,
) -> Result<String, CatalogError> {
    catalog
        .entities(tier)
        .choose(rng)
        .cloned()
        .ok_or(CatalogError::EmptyTier(tier))
}
