use std::time::Duration;

use galuchat_core::points::Granularity;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_UNIT: f64 = 0.001;
pub const DEFAULT_MAX_POINTS: usize = 10_000;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Provider mapset identifiers, one per granularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapsets {
    pub admin: String,
    pub estat: String,
    pub jarl: String,
}

impl Default for Mapsets {
    fn default() -> Self {
        Self {
            admin: "ma10000".to_string(),
            estat: "estatremap10000".to_string(),
            jarl: "ma10000".to_string(),
        }
    }
}

impl Mapsets {
    pub fn for_granularity(&self, granularity: Granularity) -> &str {
        match granularity {
            Granularity::Admin => &self.admin,
            Granularity::Estat => &self.estat,
            Granularity::Jarl => &self.jarl,
        }
    }
}

/// Everything the provider client needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Base URL without trailing slash
    pub api_url: String,
    pub timeout: Duration,
    /// Quantization step in degrees
    pub unit: f64,
    pub mapsets: Mapsets,
}

impl ResolverConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim().trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            unit: DEFAULT_UNIT,
            mapsets: Mapsets::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `GALUCHAT_*` settings through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_url = get("GALUCHAT_API_URL").ok_or(ConfigError::Missing("GALUCHAT_API_URL"))?;
        let mut config = Self::new(api_url);

        if let Some(raw) = get("GALUCHAT_TIMEOUT_MS") {
            let ms = raw
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::Invalid {
                    var: "GALUCHAT_TIMEOUT_MS",
                    value: raw,
                })?;
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = get("GALUCHAT_UNIT") {
            config.unit = parse_unit(&raw).ok_or(ConfigError::Invalid {
                var: "GALUCHAT_UNIT",
                value: raw,
            })?;
        }
        if let Some(value) = get("GALUCHAT_MAPSET_ADMIN") {
            config.mapsets.admin = value;
        }
        if let Some(value) = get("GALUCHAT_MAPSET_ESTAT") {
            config.mapsets.estat = value;
        }
        if let Some(value) = get("GALUCHAT_MAPSET_JARL") {
            config.mapsets.jarl = value;
        }
        Ok(config)
    }
}

pub fn parse_unit(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|unit| unit.is_finite() && *unit > 0.0)
}

/// Per-call ceilings enforced before any provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolLimits {
    pub max_points: usize,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

impl ToolLimits {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        match lookup("GALUCHAT_MAX_POINTS").map(|raw| raw.trim().to_string()) {
            None => Ok(Self::default()),
            Some(raw) if raw.is_empty() => Ok(Self::default()),
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|max| *max > 0)
                .map(|max_points| Self { max_points })
                .ok_or(ConfigError::Invalid {
                    var: "GALUCHAT_MAX_POINTS",
                    value: raw,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn api_url_is_required() {
        assert_eq!(
            ResolverConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("GALUCHAT_API_URL"))
        );
        assert_eq!(
            ResolverConfig::from_lookup(lookup(&[("GALUCHAT_API_URL", "  ")])),
            Err(ConfigError::Missing("GALUCHAT_API_URL"))
        );
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let config =
            ResolverConfig::from_lookup(lookup(&[("GALUCHAT_API_URL", "https://geo.test/api/")]))
                .unwrap();
        assert_eq!(config.api_url, "https://geo.test/api");
        assert_eq!(config.timeout, Duration::from_millis(10_000));
        assert_eq!(config.unit, 0.001);
        assert_eq!(config.mapsets.for_granularity(Granularity::Estat), "estatremap10000");
        assert_eq!(config.mapsets.for_granularity(Granularity::Jarl), "ma10000");
    }

    #[test]
    fn overrides_are_read() {
        let config = ResolverConfig::from_lookup(lookup(&[
            ("GALUCHAT_API_URL", "http://localhost:9000"),
            ("GALUCHAT_TIMEOUT_MS", "3000"),
            ("GALUCHAT_UNIT", "0.0001"),
            ("GALUCHAT_MAPSET_JARL", "jarl2024"),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.unit, 0.0001);
        assert_eq!(config.mapsets.jarl, "jarl2024");
        assert_eq!(config.mapsets.admin, "ma10000");
    }

    #[test]
    fn non_positive_unit_is_rejected() {
        let err = ResolverConfig::from_lookup(lookup(&[
            ("GALUCHAT_API_URL", "http://localhost:9000"),
            ("GALUCHAT_UNIT", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "GALUCHAT_UNIT", .. }));
    }

    #[test]
    fn max_points_defaults_and_parses() {
        assert_eq!(ToolLimits::from_lookup(lookup(&[])).unwrap().max_points, 10_000);
        assert_eq!(
            ToolLimits::from_lookup(lookup(&[("GALUCHAT_MAX_POINTS", "50")]))
                .unwrap()
                .max_points,
            50
        );
        assert!(ToolLimits::from_lookup(lookup(&[("GALUCHAT_MAX_POINTS", "lots")])).is_err());
    }
}
