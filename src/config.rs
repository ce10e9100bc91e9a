//! Platform configuration.
//!
//! [`PlatformOptions`] carries the policy knobs shared by every injector of a
//! tree. Options can be set in code, overridden from environment variables,
//! or (with the `config` feature) loaded from JSON.

use std::env;
use std::time::Duration;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{IocError, IocResult};

/// Default upper bound on nested constructions per thread.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Policy options for a [`Platform`](crate::Platform).
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::PlatformOptions;
/// use std::time::Duration;
///
/// let options = PlatformOptions::default()
///     .auto_register(false)
///     .max_depth(64)
///     .default_expiry(Some(Duration::from_secs(30)));
/// assert!(!options.auto_register);
/// assert_eq!(options.max_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct PlatformOptions {
    /// Register concrete parameter types on the fly during argument resolution
    pub auto_register: bool,
    /// Maximum nested constructions before `DepthExceeded`
    pub max_depth: usize,
    /// Fail with `DuplicateSingleton` instead of keeping the first singleton
    pub strict_singletons: bool,
    /// TTL applied to class records that declare neither `static` nor a TTL
    #[cfg_attr(feature = "config", serde(with = "duration_ms"))]
    pub default_expiry: Option<Duration>,
}

impl Default for PlatformOptions {
    fn default() -> Self {
        Self {
            auto_register: true,
            max_depth: DEFAULT_MAX_DEPTH,
            strict_singletons: true,
            default_expiry: None,
        }
    }
}

impl PlatformOptions {
    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn strict_singletons(mut self, strict: bool) -> Self {
        self.strict_singletons = strict;
        self
    }

    pub fn default_expiry(mut self, ttl: Option<Duration>) -> Self {
        self.default_expiry = ttl;
        self
    }

    /// Applies `{PREFIX}_AUTO_REGISTER`, `{PREFIX}_MAX_DEPTH`,
    /// `{PREFIX}_STRICT_SINGLETONS` and `{PREFIX}_DEFAULT_EXPIRY_MS`.
    ///
    /// Unset variables leave the current value untouched; malformed ones
    /// are reported as [`IocError::TypeMismatch`].
    pub fn with_env(mut self, prefix: &str) -> IocResult<Self> {
        let key = |name: &str| format!("{}_{}", prefix.to_uppercase(), name);

        if let Some(raw) = read_var(&key("AUTO_REGISTER")) {
            self.auto_register = parse_bool(&raw)?;
        }
        if let Some(raw) = read_var(&key("MAX_DEPTH")) {
            let depth = raw
                .parse::<usize>()
                .map_err(|_| IocError::TypeMismatch("max depth is not an integer"))?;
            self = self.max_depth(depth);
        }
        if let Some(raw) = read_var(&key("STRICT_SINGLETONS")) {
            self.strict_singletons = parse_bool(&raw)?;
        }
        if let Some(raw) = read_var(&key("DEFAULT_EXPIRY_MS")) {
            let ms = raw
                .parse::<u64>()
                .map_err(|_| IocError::TypeMismatch("expiry is not a millisecond count"))?;
            self.default_expiry = (ms > 0).then(|| Duration::from_millis(ms));
        }
        Ok(self)
    }

    /// Parses options from a JSON document; missing fields keep defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> IocResult<Self> {
        serde_json::from_str(json).map_err(|e| IocError::construction("PlatformOptions", e))
    }

    #[cfg(feature = "config")]
    pub fn to_json(&self) -> IocResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| IocError::construction("PlatformOptions", e))
    }
}

fn read_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(raw: &str) -> IocResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(IocError::TypeMismatch("value is not a boolean")),
    }
}

#[cfg(feature = "config")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_overrides_selected_fields() {
        env::set_var("IOCTEST_AUTO_REGISTER", "false");
        env::set_var("IOCTEST_DEFAULT_EXPIRY_MS", "250");

        let options = PlatformOptions::default().with_env("ioctest").unwrap();
        assert!(!options.auto_register);
        assert_eq!(options.default_expiry, Some(Duration::from_millis(250)));
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);

        env::remove_var("IOCTEST_AUTO_REGISTER");
        env::remove_var("IOCTEST_DEFAULT_EXPIRY_MS");
    }

    #[test]
    #[serial]
    fn malformed_env_values_are_rejected() {
        env::set_var("IOCBAD_MAX_DEPTH", "lots");
        assert!(PlatformOptions::default().with_env("iocbad").is_err());
        env::remove_var("IOCBAD_MAX_DEPTH");
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let options = PlatformOptions::from_json_str(r#"{ "max_depth": 32, "default_expiry": 100 }"#).unwrap();
        assert_eq!(options.max_depth, 32);
        assert!(options.auto_register);
        assert_eq!(options.default_expiry, Some(Duration::from_millis(100)));
    }
}
