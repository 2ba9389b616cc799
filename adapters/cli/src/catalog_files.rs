//! Loads the per-tier catalog text files.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use tower_catch_core::{Catalog, Tier};
use tracing::{info, warn};

/// Reads every tier list from `dir`, honouring per-tier overrides.
///
/// Missing or unreadable files leave their tier empty.
pub(crate) fn load(dir: &Path, overrides: &BTreeMap<Tier, PathBuf>) -> Catalog {
    let tiers = Tier::ALL.map(|tier| {
        let path = overrides
            .get(&tier)
            .cloned()
            .unwrap_or_else(|| dir.join(tier.catalog_file()));
        let names = match fs::read_to_string(&path) {
            Ok(contents) => Catalog::parse_tier_list(&contents),
            Err(error) => {
                warn!(
                    %tier,
                    path = %path.display(),
                    %error,
                    "catalog file unavailable; tier left empty"
                );
                Vec::new()
            }
        };
        (tier, names)
    });

    let catalog = Catalog::from_tiers(tiers);
    info!(dir = %dir.display(), entities = catalog.len(), "catalog loaded");
    catalog
}
