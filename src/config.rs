//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section is optional and falls back to defaults. Secrets (the odds API
//! key) are referenced by env-var name and resolved at runtime.

use anyhow::{Context, Result};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::engine::EngineSettings;
use crate::market::books::BookClassifier;
use crate::market::fees::FeeSchedule;
use crate::types::FairlineError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub books: BooksConfig,
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub refresh_interval_secs: u64,
    pub page_size: usize,
    pub max_in_flight: usize,
    /// Stake EV amounts are quoted for.
    pub stake: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            page_size: 500,
            max_in_flight: 3,
            stake: dec!(100),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Mock,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub base_url: Option<String>,
    /// Name of the env var holding the API key.
    pub api_key_env: Option<String>,
    pub league: Option<String>,
    /// Records served by the mock source.
    pub mock_total: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Mock,
            base_url: None,
            api_key_env: Some("FAIRLINE_API_KEY".to_string()),
            league: None,
            mock_total: 1200,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BooksConfig {
    /// Replaces the default sharp list when set.
    pub sharp: Option<Vec<String>>,
    /// Per-sport sharp lists, keyed by league code.
    pub by_sport: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FeesConfig {
    /// Commission on winnings per book, layered over the built-in schedule.
    pub rates: HashMap<String, Decimal>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3000,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FairlineError> {
        if self.engine.page_size == 0 {
            return Err(FairlineError::Config("engine.page_size must be positive".into()));
        }
        if self.engine.max_in_flight == 0 {
            return Err(FairlineError::Config("engine.max_in_flight must be positive".into()));
        }
        if self.engine.stake <= Decimal::ZERO {
            return Err(FairlineError::Config("engine.stake must be positive".into()));
        }
        if let Some((book, rate)) = self
            .fees
            .rates
            .iter()
            .find(|(_, r)| **r < Decimal::ZERO || **r >= Decimal::ONE)
        {
            return Err(FairlineError::Config(format!("fee rate for {book} out of range: {rate}")));
        }
        if self.source.kind == SourceKind::Http && self.source.base_url.is_none() {
            return Err(FairlineError::Config("source.base_url is required for http".into()));
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The odds API key, if configured and present in the environment.
    pub fn api_key(&self) -> Option<String> {
        self.source
            .api_key_env
            .as_deref()
            .and_then(|env| Self::resolve_env(env).ok())
            .filter(|k| !k.is_empty())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            page_size: self.engine.page_size,
            max_in_flight: self.engine.max_in_flight,
        }
    }

    pub fn stake(&self) -> f64 {
        self.engine.stake.to_f64().unwrap_or(crate::strategy::ev::DEFAULT_STAKE)
    }

    pub fn book_classifier(&self) -> BookClassifier {
        BookClassifier::with_overrides(self.books.sharp.clone(), self.books.by_sport.clone())
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::with_rates(&self.fees.rates)
    }
}
