//! Read-only catalog of entity names grouped by tier.

use std::collections::{BTreeMap, HashMap};

use crate::{CatalogError, Tier};

/// Immutable mapping from tier to its ordered list of entity names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    tiers: BTreeMap<Tier, Vec<String>>,
    lookup: HashMap<String, Tier>,
}

impl Catalog {
    /// Builds a catalog from per-tier entity lists.
    ///
    /// Names are trimmed and blank entries dropped. When the same name appears in
    /// several tiers, [`Catalog::tier_of`] reports the rarest one.
    #[must_use]
    pub fn from_tiers<I, N>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Tier, Vec<N>)>,
        N: AsRef<str>,
    {
        let mut tiers: BTreeMap<Tier, Vec<String>> = BTreeMap::new();
        for (tier, names) in entries {
            let list = tiers.entry(tier).or_default();
            list.extend(
                names
                    .iter()
                    .map(|name| name.as_ref().trim())
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned),
            );
        }

        let mut lookup = HashMap::new();
        for (tier, names) in &tiers {
            for name in names {
                let _ = lookup.insert(name.clone(), *tier);
            }
        }

        Self { tiers, lookup }
    }

    /// Parses one tier list: one entity per line, trimmed, blanks ignored.
    #[must_use]
    pub fn parse_tier_list(contents: &str) -> Vec<String> {
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Ordered entity names for the tier; empty when the tier has none.
    #[must_use]
    pub fn entities(&self, tier: Tier) -> &[String] {
        self.tiers.get(&tier).map_or(&[], Vec::as_slice)
    }

    /// Total number of catalog entries across all tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.values().map(Vec::len).sum()
    }

    /// Reports whether every tier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tier owning the trimmed entity name, if it belongs to the catalog.
    #[must_use]
    pub fn tier_of(&self, name: &str) -> Option<Tier> {
        self.lookup.get(name.trim()).copied()
    }

    /// Iterates all tiers from common to rare alongside their entity lists.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &[String])> + '_ {
        Tier::ALL
            .into_iter()
            .map(move |tier| (tier, self.entities(tier)))
    }

    /// Iterates every catalog entry in tier order.
    pub fn all_entities(&self) -> impl Iterator<Item = &str> + '_ {
        self.tiers.values().flatten().map(String::as_str)
    }

    /// Fails with [`CatalogError::Empty`] when no tier holds any entity.
    pub fn ensure_playable(&self) -> Result<(), CatalogError> {
        if self.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(())
    }
}
