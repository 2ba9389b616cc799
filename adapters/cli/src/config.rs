//! Settings file for the terminal adapter.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use tower_catch_core::Tier;

const SUPPORTED_CONFIG_VERSION: u32 = 1;
const DEFAULT_DATA_DIR: &str = "tower-catch-data";
const DEFAULT_CATALOG_DIR: &str = "catalog";

/// Resolved adapter settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Settings {
    /// Directory holding the persisted key-value records.
    pub(crate) data_dir: PathBuf,
    /// Directory holding the per-tier catalog files.
    pub(crate) catalog_dir: PathBuf,
    /// Seed for every random stream; the clock is used when absent.
    pub(crate) seed: Option<u64>,
    /// Catalog files that replace the default file name of a tier.
    pub(crate) catalog_files: BTreeMap<Tier, PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            catalog_dir: PathBuf::from(DEFAULT_CATALOG_DIR),
            seed: None,
            catalog_files: BTreeMap::new(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    version: u32,
    data_dir: Option<PathBuf>,
    catalog_dir: Option<PathBuf>,
    seed: Option<u64>,
    #[serde(default)]
    catalog: CatalogSection,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogSection {
    #[serde(default)]
    files: HashMap<String, PathBuf>,
}

impl Settings {
    /// Reads settings from `path`.
    ///
    /// A missing file yields the defaults unless `required` is set.
    pub(crate) fn load(path: &Path, required: bool) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read config file at {}", path.display()));
            }
        };
        let base_path = path.parent().unwrap_or_else(|| Path::new(""));
        parse_config(&contents, base_path)
            .with_context(|| format!("invalid config file at {}", path.display()))
    }
}

/// Relative paths resolve against `base_path`, the directory of the file.
fn parse_config(contents: &str, base_path: &Path) -> Result<Settings> {
    let file: ConfigFile =
        toml::from_str(contents).context("failed to parse config toml contents")?;
    if file.version != SUPPORTED_CONFIG_VERSION {
        bail!(
            "unsupported config version {}; expected {}",
            file.version,
            SUPPORTED_CONFIG_VERSION
        );
    }

    let defaults = Settings::default();
    let mut catalog_files = BTreeMap::new();
    for (name, relative_path) in file.catalog.files {
        let tier: Tier = name
            .parse()
            .with_context(|| format!("unknown tier `{name}` in [catalog.files]"))?;
        if catalog_files
            .insert(tier, base_path.join(relative_path))
            .is_some()
        {
            bail!("[catalog.files] contains duplicate entry for {tier}");
        }
    }

    Ok(Settings {
        data_dir: base_path.join(file.data_dir.unwrap_or(defaults.data_dir)),
        catalog_dir: base_path.join(file.catalog_dir.unwrap_or(defaults.catalog_dir)),
        seed: file.seed,
        catalog_files,
    })
}
