use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::categorize::CategoryRule;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub harvest: HarvestConfig,
    pub pacing: PacingConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
    /// Replaces the built-in category table when present.
    pub categories: Option<Vec<CategoryRule>>,
}

/// Knobs of the paginated review harvest.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Scheme and host of the marketplace, without a trailing slash.
    pub base_url: String,
    /// Upper bound on the number of reviews returned.
    pub max_reviews: usize,
    /// Number of reviews on a full page. Pages with fewer are weak.
    pub full_page_size: usize,
    /// Consecutive weak pages after which the harvest stops.
    pub max_weak_pages: usize,
    /// Consecutive failed fetches of the same page after which the harvest stops.
    pub max_page_retries: u32,
    /// Consecutive block challenges on the same page after which the harvest stops.
    pub max_block_retries: u32,
    /// Text that marks a bot challenge page.
    pub block_marker: String,
    pub request_timeout_secs: u64,
    pub output_path: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.amazon.in".to_string(),
            max_reviews: 500,
            full_page_size: 10,
            max_weak_pages: 3,
            max_page_retries: 5,
            max_block_retries: 5,
            block_marker: "Enter the characters you see below".to_string(),
            request_timeout_secs: 30,
            output_path: PathBuf::from("reviews.csv"),
        }
    }
}

/// Delay ranges in seconds, see [`crate::pacing::PacingPolicy`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub base_min_secs: f64,
    pub base_max_secs: f64,
    /// Chance of adding an extra pause on top of the base delay.
    pub long_pause_probability: f64,
    pub extra_min_secs: f64,
    pub extra_max_secs: f64,
    pub block_min_secs: f64,
    pub block_max_secs: f64,
    pub backoff_base_secs: f64,
    pub backoff_max_secs: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_min_secs: 2.0,
            base_max_secs: 4.0,
            long_pause_probability: 0.10,
            extra_min_secs: 2.0,
            extra_max_secs: 4.0,
            block_min_secs: 20.0,
            block_max_secs: 30.0,
            backoff_base_secs: 2.0,
            backoff_max_secs: 60.0,
        }
    }
}

impl PacingConfig {
    /// All delays zero. Handy when the pacing is not what is being tested.
    pub fn immediate() -> Self {
        Self {
            base_min_secs: 0.0,
            base_max_secs: 0.0,
            long_pause_probability: 0.0,
            extra_min_secs: 0.0,
            extra_max_secs: 0.0,
            block_min_secs: 0.0,
            block_max_secs: 0.0,
            backoff_base_secs: 0.0,
            backoff_max_secs: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub rating_column: String,
    pub comment_column: String,
    pub database_path: PathBuf,
    pub collection: String,
    pub chart_path: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rating_column: "Rating".to_string(),
            comment_column: "Comment".to_string(),
            database_path: PathBuf::from("review_analysis.db"),
            collection: "negative_reviews".to_string(),
            chart_path: PathBuf::from("ratings_distribution.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads the TOML file if one is given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str::<Config>(&raw)?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let h = &self.harvest;
        if h.full_page_size == 0 {
            return Err(Error::InvalidConfig("harvest.full_page_size must be > 0".into()));
        }
        if h.max_weak_pages == 0 {
            return Err(Error::InvalidConfig("harvest.max_weak_pages must be > 0".into()));
        }
        if !h.base_url.starts_with("http://") && !h.base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "harvest.base_url must be an http(s) URL, got '{}'",
                h.base_url
            )));
        }

        let p = &self.pacing;
        let ranges = [
            ("base", p.base_min_secs, p.base_max_secs),
            ("extra", p.extra_min_secs, p.extra_max_secs),
            ("block", p.block_min_secs, p.block_max_secs),
            ("backoff", p.backoff_base_secs, p.backoff_max_secs),
        ];
        for (name, min, max) in ranges {
            if !(min >= 0.0 && min <= max && max.is_finite()) {
                return Err(Error::InvalidConfig(format!(
                    "pacing {name} range [{min}, {max}] is invalid"
                )));
            }
        }
        if !(0.0..=1.0).contains(&p.long_pause_probability) {
            return Err(Error::InvalidConfig(format!(
                "pacing.long_pause_probability {} is outside [0, 1]",
                p.long_pause_probability
            )));
        }

        if let Some(rules) = &self.categories {
            if rules.iter().any(|r| r.name.trim().is_empty()) {
                return Err(Error::InvalidConfig("category names can't be empty".into()));
            }
        }
        Ok(())
    }
}
