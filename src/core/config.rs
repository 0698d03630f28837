use crate::core::advisory::{AdvisoryCondition, AdvisoryRule};
use crate::core::market::HistoricalPeriod;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";

/// A tracked company: display name plus its upstream ticker symbol.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub symbol: String,
}

impl RosterEntry {
    pub fn new(name: &str, symbol: &str) -> Self {
        RosterEntry {
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }

    /// Symbol as sent upstream: whitespace trimmed, `$` prefixes stripped.
    pub fn clean_symbol(&self) -> String {
        self.symbol.trim().replace('$', "")
    }
}

fn default_roster() -> Vec<RosterEntry> {
    [
        ("Nike", "NKE"),
        ("Adidas", "ADS.DE"),
        ("Anta Sports", "2020.HK"),
        ("Lululemon Athletica", "LULU"),
        ("Amer Sports", "AS"),
        ("ASICS", "7936.T"),
        ("On Holding (On Running)", "ONON"),
        ("Deckers (HOKA, UGG)", "DECK"),
        ("Skechers", "SKX"),
        ("JD Sports Fashion", "JD.L"),
        ("Li Ning", "2331.HK"),
        ("VF Corporation (Vans)", "VFC"),
        ("Puma", "PUM.DE"),
        ("Columbia Sportswear", "COLM"),
        ("Yonex", "7906.T"),
        ("Under Armour (Class A)", "UAA"),
        ("Fila Holdings", "081660.KS"),
        ("361 Degrees", "1361.HK"),
        ("Mizuno", "8022.T"),
        ("BasicNet (Kappa)", "BAN.MI"),
    ]
    .into_iter()
    .map(|(name, symbol)| RosterEntry::new(name, symbol))
    .collect()
}

fn default_advisories() -> Vec<AdvisoryRule> {
    vec![AdvisoryRule {
        symbol: "SKX".to_string(),
        when: vec![
            AdvisoryCondition::DailyChangeMissing,
            AdvisoryCondition::MarketCapMissing,
        ],
        note: "SKX: corporate action/delisting risk may limit recent quotes; data may be incomplete."
            .to_string(),
    }]
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_cookie_url() -> String {
    DEFAULT_YAHOO_COOKIE_URL.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
    /// Page that hands out the session cookie the crumb is bound to.
    #[serde(default = "default_cookie_url")]
    pub cookie_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            cookie_url: default_cookie_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig::default()),
        }
    }
}

/// Tunable constants of the fetch pipeline.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Absolute daily move, in percent, above which a change is discarded.
    pub outlier_threshold_pct: f64,
    /// Minimum spacing between two entity fetches. Zero disables pacing.
    pub fetch_delay_ms: u64,
    pub cache_ttl_secs: u64,
    /// Close history consulted for the latest FX rate.
    pub fx_lookback: HistoricalPeriod,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            outlier_threshold_pct: 50.0,
            fetch_delay_ms: 250,
            cache_ttl_secs: 30 * 60,
            fx_lookback: HistoricalPeriod::FiveDays,
        }
    }
}

impl PolicyConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_roster")]
    pub companies: Vec<RosterEntry>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default = "default_advisories")]
    pub advisories: Vec<AdvisoryRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            companies: default_roster(),
            providers: ProvidersConfig::default(),
            policy: PolicyConfig::default(),
            advisories: default_advisories(),
        }
    }
}

impl AppConfig {
    /// Loads the config at the default location, falling back to built-in
    /// defaults when no file has been set up.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "sportstrack", "sportstrack")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn yahoo(&self) -> YahooProviderConfig {
        self.providers.yahoo.clone().unwrap_or_default()
    }
}
