//! Configuration
//!
//! Sources, lowest precedence first: built-in defaults, a JSON file, then
//! `PINSHOT_*` environment variables. The binary applies CLI flags last.

use crate::browser::BrowserConfig;
use crate::capture::SweepTiming;
use crate::error::{Error, Result};
use crate::output::DEFAULT_JPEG_QUALITY;
use crate::overlay::OverlayConfig;
use crate::region::MIN_SELECTION_PX;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory saves land in
pub const OUTPUT_DIR_ENV_VAR: &str = "PINSHOT_OUTPUT_DIR";
/// Settle delay after each sweep scroll, in ms
pub const SETTLE_MS_ENV_VAR: &str = "PINSHOT_SETTLE_MS";
/// Pacing delay after each sweep capture, in ms
pub const PACING_MS_ENV_VAR: &str = "PINSHOT_PACING_MS";
/// Chrome/Chromium executable
pub const CHROME_PATH_ENV_VAR: &str = "PINSHOT_CHROME_PATH";

/// Complete Pinshot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinshotConfig {
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Full-page sweep delays
    pub sweep: SweepTiming,
    /// Pinned widget behaviour
    pub overlay: OverlayConfig,
    /// Where saves land
    pub output_dir: PathBuf,
    /// JPEG export quality
    pub jpeg_quality: u8,
    /// Minimum selection side in CSS pixels
    pub min_selection_px: u32,
}

impl Default for PinshotConfig {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            sweep: SweepTiming::default(),
            overlay: OverlayConfig::default(),
            output_dir: PathBuf::from("."),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            min_selection_px: MIN_SELECTION_PX,
        }
    }
}

impl PinshotConfig {
    /// Defaults, overlaid with `path` when given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Parse a JSON config file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        let config = serde_json::from_str(&text)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `PINSHOT_*` overrides read through `lookup`
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = lookup(OUTPUT_DIR_ENV_VAR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup(SETTLE_MS_ENV_VAR) {
            self.sweep.settle_ms = parse_ms(SETTLE_MS_ENV_VAR, &ms)?;
        }
        if let Some(ms) = lookup(PACING_MS_ENV_VAR) {
            self.sweep.pacing_ms = parse_ms(PACING_MS_ENV_VAR, &ms)?;
        }
        if let Some(path) = lookup(CHROME_PATH_ENV_VAR) {
            self.browser.chrome_path = Some(path);
        }
        Ok(self)
    }
}

fn parse_ms(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{key} must be milliseconds, got {value:?}")))
}
