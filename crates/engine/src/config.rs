use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 10_000;
pub const DEFAULT_RETENTION_INTERVAL_MS: u64 = 3_600_000;

const MAX_PAGE_SIZE_RANGE: RangeInclusive<u64> = 1..=100_000;
const RETENTION_INTERVAL_RANGE: RangeInclusive<u64> = 1_000..=86_400_000;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite file; `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub retention_enabled: bool,
    pub retention_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            retention_enabled: true,
            retention_interval: Duration::from_millis(DEFAULT_RETENTION_INTERVAL_MS),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Missing or out-of-range values
    /// fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_page_size = parse_bounded(
            lookup("CROSSWALK_MAX_PAGE_SIZE"),
            MAX_PAGE_SIZE_RANGE,
            u64::from(DEFAULT_MAX_PAGE_SIZE),
        ) as u32;
        let default_page_size = parse_bounded(
            lookup("CROSSWALK_DEFAULT_PAGE_SIZE"),
            1..=u64::from(max_page_size),
            u64::from(DEFAULT_PAGE_SIZE.min(max_page_size)),
        ) as u32;
        let config = Self {
            database_path: lookup("CROSSWALK_DATABASE_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            default_page_size,
            max_page_size,
            retention_enabled: parse_enabled(lookup("CROSSWALK_RETENTION_ENABLED")),
            retention_interval: Duration::from_millis(parse_bounded(
                lookup("CROSSWALK_RETENTION_INTERVAL_MS"),
                RETENTION_INTERVAL_RANGE,
                DEFAULT_RETENTION_INTERVAL_MS,
            )),
        };
        debug!(?config, "loaded engine config");
        config
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }
}

fn parse_enabled(value: Option<String>) -> bool {
    match value {
        Some(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        None => true,
    }
}

fn parse_bounded(value: Option<String>, range: RangeInclusive<u64>, default: u64) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| range.contains(v))
        .unwrap_or(default)
}
