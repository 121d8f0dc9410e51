//! Site configuration module.
//!
//! Handles loading and validating `sleet.toml` from the project root. Every
//! key has a default except `production.url`, which the published-path guard
//! needs to print absolute URLs.
//!
//! ## Configuration Options
//!
//! ```toml
//! [production]
//! url = "example.com"            # Host the dist tree is served from
//!
//! [paths]
//! source = "src"                 # Documents and images
//! static = "public"              # Shared assets, published verbatim
//! templates = "src/templates"    # Any change here rebuilds every page
//! dist = "dist"                  # Output tree
//! known_uris = "src/uris.txt"    # Published-path registry
//! # cache = "/tmp/sleet"         # Image hash cache root (default: user cache dir)
//!
//! [dependencies]
//! shared_assets = ["public/style.css"]
//! aggregators = ["index.html", "archives.html", "writing.html"]
//!
//! [processing]
//! max_processes = 4              # Thumbnail encoders (omit for auto = CPU cores)
//!
//! [[gear]]
//! make = "Fujifilm"
//! model = "X100V"
//! link = "https://example.com/x100v"
//! exif = { make = "FUJIFILM", model = "X100V" }
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the project root.
pub const CONFIG_FILENAME: &str = "sleet.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("sleet.toml: gear item with make={make:?} and model={model:?} must have `{missing}` set")]
    Gear {
        make: String,
        model: String,
        missing: &'static str,
    },
}

/// Site configuration loaded from `sleet.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Where the site is served from.
    pub production: ProductionConfig,
    /// Input and output locations, relative to the project root.
    pub paths: PathsConfig,
    /// Rebuild triggers shared by every document.
    pub dependencies: DependenciesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Camera and lens table used to resolve EXIF make/model strings.
    pub gear: Vec<Gear>,
}

impl SiteConfig {
    /// Validate config values before any document is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.production.host().is_empty() {
            return Err(ConfigError::Validation(
                "production.url must be set".into(),
            ));
        }
        for gear in &self.gear {
            let missing = if gear.make.trim().is_empty() {
                Some("make")
            } else if gear.model.trim().is_empty() {
                Some("model")
            } else if gear.link.trim().is_empty() {
                Some("link")
            } else {
                None
            };
            if let Some(missing) = missing {
                return Err(ConfigError::Gear {
                    make: gear.make.clone(),
                    model: gear.model.clone(),
                    missing,
                });
            }
        }
        Ok(())
    }

    /// Gear lookup table built from the `[[gear]]` entries.
    pub fn gear_table(&self) -> GearTable {
        GearTable::new(self.gear.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductionConfig {
    /// Production host, e.g. `example.com`. A scheme or trailing slash is tolerated.
    pub url: String,
}

impl ProductionConfig {
    /// The bare host, with any `https://` prefix and trailing slash removed.
    pub fn host(&self) -> &str {
        let url = self.url.trim();
        let url = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);
        url.trim_end_matches('/')
    }
}

/// Filesystem layout of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub source: String,
    #[serde(rename = "static")]
    pub static_dir: String,
    pub templates: String,
    pub dist: String,
    pub known_uris: String,
    /// Image hash cache root. When absent, the user cache directory is used.
    pub cache: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: "src".to_string(),
            static_dir: "public".to_string(),
            templates: "src/templates".to_string(),
            dist: "dist".to_string(),
            known_uris: "src/uris.txt".to_string(),
            cache: None,
        }
    }
}

/// Paths that trigger rebuilds beyond a document's own source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DependenciesConfig {
    /// Assets every text document embeds, such as the site stylesheet.
    pub shared_assets: Vec<String>,
    /// Output names of pages summarizing the whole collection.
    pub aggregators: Vec<String>,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            shared_assets: vec!["public/style.css".to_string()],
            aggregators: vec![
                "index.html".to_string(),
                "archives.html".to_string(),
                "writing.html".to_string(),
            ],
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel thumbnail encoders.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// A camera body or lens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Gear {
    /// Human-readable brand.
    pub make: String,
    /// Human-readable model name.
    pub model: String,
    /// Page where a reader can buy or read about the gear.
    pub link: String,
    /// Strings a photograph's EXIF must carry to be attributed to this gear.
    pub exif: GearExif,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GearExif {
    pub make: String,
    pub model: String,
}

/// Characters stripped from both ends of an EXIF string before matching.
const EXIF_CUTSET: &[char] = &[' ', '"'];

/// Case-insensitive lookup from EXIF make/model to configured gear.
#[derive(Debug, Clone, Default)]
pub struct GearTable {
    gear: Vec<Gear>,
}

impl GearTable {
    pub fn new(gear: Vec<Gear>) -> Self {
        Self { gear }
    }

    /// Find the gear whose EXIF strings match `make` and `model`.
    ///
    /// Both sides are trimmed of spaces and double quotes and compared
    /// ignoring case, non-ASCII letters included.
    pub fn find(&self, make: &str, model: &str) -> Option<&Gear> {
        let make = fold(make);
        let model = fold(model);
        self.gear
            .iter()
            .find(|g| fold(&g.exif.make) == make && fold(&g.exif.model) == model)
    }
}

fn fold(exif: &str) -> String {
    exif.trim_matches(EXIF_CUTSET).to_lowercase()
}

/// Load and validate `sleet.toml` from the given project root.
///
/// A missing file yields the defaults, which then fail validation because
/// `production.url` has no default.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    let config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        toml::from_str(&content)?
    } else {
        SiteConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `sleet.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Sleet Configuration
# ===================
# Everything except production.url is optional; values shown are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Production
# ---------------------------------------------------------------------------
[production]
# Host the dist tree is served from. Used to print the absolute URLs of
# published paths that a build would remove.
url = "example.com"

# ---------------------------------------------------------------------------
# Paths (relative to the project root)
# ---------------------------------------------------------------------------
[paths]
source = "src"
static = "public"
templates = "src/templates"
dist = "dist"
# Registry of every path ever published. Commit it to the repository.
known_uris = "src/uris.txt"
# Image hash cache root. Defaults to the user cache directory.
# cache = "/tmp/sleet"

# ---------------------------------------------------------------------------
# Rebuild triggers
# ---------------------------------------------------------------------------
[dependencies]
# Changing any of these rebuilds every text document.
shared_assets = ["public/style.css"]
# Pages that summarize the whole collection rebuild on any change.
aggregators = ["index.html", "archives.html", "writing.html"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel thumbnail encoders. Omit for auto (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Gear
# ---------------------------------------------------------------------------
# Every camera or lens that appears in a photograph's EXIF must be listed.
# Matching ignores case and surrounding quotes.
#
# [[gear]]
# make = "Fujifilm"
# model = "X100V"
# link = "https://example.com/x100v"
# exif = { make = "FUJIFILM", model = "X100V" }
"##
}
