//! LoanConfig - スケジューラ設定
//!
//! TOML では期間を秒の整数で書く:
//! ```toml
//! reminder_interval_secs = 86400
//! max_borrow_period_secs = 1209600
//! fine_per_day = 10
//! reconciliation_sweep_interval_secs = 600
//! ```
//! 省略したキーは下のデフォルトになる。

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::domain::FinePolicy;

const DAY_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanConfig {
    /// Time between reminders for one loan.
    pub reminder_interval_secs: u64,
    /// How long a loan is free before fines start.
    pub max_borrow_period_secs: u64,
    /// Fine per whole overdue day.
    pub fine_per_day: u64,
    /// How often the safety-net sweep restarts missing lifecycle tasks.
    pub reconciliation_sweep_interval_secs: u64,
}

/// ConfigError は設定が使えないときのエラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            reminder_interval_secs: DAY_SECS,
            max_borrow_period_secs: 14 * DAY_SECS,
            fine_per_day: 10,
            reconciliation_sweep_interval_secs: 10 * 60,
        }
    }
}

impl LoanConfig {
    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// スケジューラが動けない値をここで弾く（Fail-fast）
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reminder_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reminder_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.reconciliation_sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconciliation_sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_borrow_period_delta().is_none() {
            return Err(ConfigError::Invalid(format!(
                "max_borrow_period_secs is out of range: {}",
                self.max_borrow_period_secs
            )));
        }
        Ok(())
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    pub fn reconciliation_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.reconciliation_sweep_interval_secs)
    }

    pub fn max_borrow_period(&self) -> Duration {
        Duration::from_secs(self.max_borrow_period_secs)
    }

    fn max_borrow_period_delta(&self) -> Option<TimeDelta> {
        i64::try_from(self.max_borrow_period_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
    }

    /// Fine arithmetic derived from this config.
    pub fn fine_policy(&self) -> FinePolicy {
        let period = self.max_borrow_period_delta().unwrap_or(TimeDelta::MAX);
        FinePolicy::new(period, self.fine_per_day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_lending_rules() {
        let config = LoanConfig::default();
        assert_eq!(config.reminder_interval(), Duration::from_secs(86_400));
        assert_eq!(config.max_borrow_period(), Duration::from_secs(14 * 86_400));
        assert_eq!(config.fine_per_day, 10);
        assert_eq!(config.reconciliation_sweep_interval(), Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = LoanConfig::from_toml_str("fine_per_day = 5\n").unwrap();
        assert_eq!(config.fine_per_day, 5);
        assert_eq!(config.reminder_interval_secs, 86_400);
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let err = LoanConfig::from_toml_str("reminder_interval_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = LoanConfig::from_toml_str("reconciliation_sweep_interval_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn out_of_range_borrow_period_is_rejected() {
        let config = LoanConfig {
            max_borrow_period_secs: u64::MAX,
            ..LoanConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = LoanConfig::from_toml_str("fine_per_day = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lender.toml");
        std::fs::write(&path, "max_borrow_period_secs = 86400\nfine_per_day = 5\n").unwrap();

        let config = LoanConfig::from_file(&path).unwrap();
        assert_eq!(config.fine_policy().fine_per_day(), 5);
        assert_eq!(config.fine_policy().max_borrow_period(), TimeDelta::days(1));
    }
}
