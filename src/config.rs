use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::limits::*;

/// The working-day constants the scheduler needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub step_minutes: u32,
    /// Used when an appointment carries no (or a non-positive) duration.
    pub default_duration: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            day_start_hour: 9,
            day_end_hour: 20,
            step_minutes: 15,
            default_duration: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.day_end_hour > MAX_DAY_END_HOUR {
            return Err(ConfigError::Invalid("day end hour past midnight"));
        }
        if self.day_start_hour >= self.day_end_hour {
            return Err(ConfigError::Invalid("day start must be before day end"));
        }
        if self.step_minutes == 0 || self.step_minutes > MAX_STEP_MINUTES {
            return Err(ConfigError::Invalid("grid step must be within 1..=60 minutes"));
        }
        if self.default_duration < 1 || self.default_duration > MAX_DURATION_MINUTES {
            return Err(ConfigError::Invalid("default duration must be within 1..=1440 minutes"));
        }
        Ok(())
    }
}

/// Everything the `salonboard` binary reads from the environment.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub scheduler: SchedulerConfig,
    pub data_dir: PathBuf,
    pub directory_path: PathBuf,
    pub compact_threshold: u64,
    pub undo_window_ms: i64,
    pub metrics_port: Option<u16>,
    /// Board date to print; today when unset.
    pub date: Option<NaiveDate>,
}

impl BoardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            day_start_hour: parse_or(&lookup, "SALONBOARD_DAY_START", defaults.day_start_hour)?,
            day_end_hour: parse_or(&lookup, "SALONBOARD_DAY_END", defaults.day_end_hour)?,
            step_minutes: parse_or(&lookup, "SALONBOARD_STEP", defaults.step_minutes)?,
            default_duration: parse_or(
                &lookup,
                "SALONBOARD_DEFAULT_DURATION",
                defaults.default_duration,
            )?,
        };
        scheduler.validate()?;

        let data_dir = PathBuf::from(lookup("SALONBOARD_DATA_DIR").unwrap_or_else(|| "./data".into()));
        let directory_path = lookup("SALONBOARD_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("stylists.json"));

        let date = match lookup("SALONBOARD_DATE") {
            Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                ConfigError::Parse {
                    var: "SALONBOARD_DATE",
                    value: raw.clone(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            scheduler,
            data_dir,
            directory_path,
            compact_threshold: parse_or(&lookup, "SALONBOARD_COMPACT_THRESHOLD", 1000)?,
            undo_window_ms: parse_or(&lookup, "SALONBOARD_UNDO_WINDOW_MS", 10_000)?,
            metrics_port: parse_opt(&lookup, "SALONBOARD_METRICS_PORT")?,
            date,
        })
    }
}

fn parse_opt<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Parse { var, value: raw }),
        None => Ok(None),
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    Ok(parse_opt(lookup, var)?.unwrap_or(default))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid(&'static str),
    Parse { var: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
            ConfigError::Parse { var, value } => write!(f, "cannot parse {var}={value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}
