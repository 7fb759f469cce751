use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::llm::GenerationOptions;
use crate::model::RealismBand;

pub const ENV_PREFIX: &str = "PRICEWATCH";
pub const DEFAULT_FILE: &str = "pricewatch.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub archive: ArchiveSettings,
    pub inference: InferenceSettings,
    pub extraction: ExtractionSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    pub cdx_endpoint: String,
    pub wayback_prefix: String,
    /// Minimum spacing between any two archive requests.
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub user_agent: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            cdx_endpoint: "http://web.archive.org/cdx/search/cdx".into(),
            wayback_prefix: "https://web.archive.org/web".into(),
            min_interval_ms: 500,
            timeout_secs: 30,
            max_retries: 3,
            backoff_ms: 2000,
            user_agent: concat!("pricewatch/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub host: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl InferenceSettings {
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            num_predict: self.max_tokens,
        }
    }
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            temperature: 0.1,
            max_tokens: 500,
            timeout_secs: 30,
            probe_timeout_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub min_price: f64,
    pub max_price: f64,
    /// Structural stage runs while fewer than this many candidates exist.
    pub structural_below: usize,
    /// Fallback stage runs while fewer than this many candidates exist.
    pub fallback_below: usize,
    pub fallback_max_chars: usize,
}

impl ExtractionSettings {
    pub fn band(&self) -> RealismBand {
        RealismBand {
            min: self.min_price,
            max: self.max_price,
        }
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        let band = RealismBand::default();
        Self {
            min_price: band.min,
            max_price: band.max,
            structural_below: 3,
            fallback_below: 2,
            fallback_max_chars: 4000,
        }
    }
}

impl Settings {
    /// Defaults, then `pricewatch.toml` in the working directory if present,
    /// then `PRICEWATCH_*` environment variables (`__` separates sections).
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }
}
