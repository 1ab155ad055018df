//! Signing service configuration
//!
//! `QuorumConfig` is loaded from TOML or JSON, overlaid with `QUORUM_*`
//! environment variables and validated before the service starts. Every
//! field has a default, so an empty file is a valid configuration.

pub mod validation;

use crate::{BondAmount, QuorumError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use validation::ConfigValidator;

/// Threshold signature scheme used to combine partial signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdScheme {
    /// FROST over Ed25519
    #[default]
    Frost,
    /// CGGMP21 threshold ECDSA over secp256k1
    Cggmp21,
    /// Ringtail lattice-based threshold signatures
    Ringtail,
}

impl ThresholdScheme {
    /// Lowercase scheme name
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdScheme::Frost => "frost",
            ThresholdScheme::Cggmp21 => "cggmp21",
            ThresholdScheme::Ringtail => "ringtail",
        }
    }
}

impl fmt::Display for ThresholdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdScheme {
    type Err = QuorumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "frost" => Ok(ThresholdScheme::Frost),
            "cggmp21" => Ok(ThresholdScheme::Cggmp21),
            "ringtail" => Ok(ThresholdScheme::Ringtail),
            other => Err(QuorumError::invalid(format!(
                "unknown threshold scheme '{other}'"
            ))),
        }
    }
}

/// Registry and session manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    /// Cap on the number of Active signers; further registrations are waitlisted
    pub max_signers: usize,
    /// Minimum collateral to join or remain Active
    #[serde(with = "bond_amount")]
    pub min_signer_bond: BondAmount,
    /// Admission-control cap on non-terminal sessions
    pub max_pending_signs: usize,
    /// Time a session may stay open before it expires
    pub sign_timeout_ms: u64,
    /// Interval between expiry sweeps
    pub sweep_interval_ms: u64,
    /// How long terminal sessions are kept for polling before pruning
    pub session_retention_ms: u64,
    /// Scheme used by the default combiner
    pub scheme: ThresholdScheme,
}

impl QuorumConfig {
    /// Default cap on Active signers
    pub const DEFAULT_MAX_SIGNERS: usize = 100;
    /// Default minimum bond, in base units
    pub const DEFAULT_MIN_SIGNER_BOND: BondAmount = 1_000_000;
    /// Default admission-control cap
    pub const DEFAULT_MAX_PENDING_SIGNS: usize = 1000;
    /// Default session timeout (5 minutes)
    pub const DEFAULT_SIGN_TIMEOUT_MS: u64 = 5 * 60 * 1000;
    /// Default interval between expiry sweeps
    pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;
    /// Default retention for terminal sessions (1 hour)
    pub const DEFAULT_SESSION_RETENTION_MS: u64 = 60 * 60 * 1000;

    /// Load configuration from a `.toml` or `.json` file
    pub fn load_from_file(path: &Path) -> Result<Self, QuorumError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuorumError::invalid(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| QuorumError::invalid(format!("Invalid TOML: {e}"))),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| QuorumError::invalid(format!("Invalid JSON: {e}"))),
            _ => Err(QuorumError::invalid("Unsupported config file format")),
        }
    }

    /// Overlay `QUORUM_*` environment variables
    pub fn merge_with_env(&mut self) -> Result<(), QuorumError> {
        self.merge_with_vars(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable source
    pub fn merge_with_vars<F>(&mut self, lookup: F) -> Result<(), QuorumError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: FromStr>(key: &str, raw: String) -> Result<T, QuorumError> {
            raw.trim()
                .parse()
                .map_err(|_| QuorumError::invalid(format!("Invalid value in {key}: '{raw}'")))
        }

        if let Some(raw) = lookup("QUORUM_MAX_SIGNERS") {
            self.max_signers = parse("QUORUM_MAX_SIGNERS", raw)?;
        }
        if let Some(raw) = lookup("QUORUM_MIN_SIGNER_BOND") {
            self.min_signer_bond = parse("QUORUM_MIN_SIGNER_BOND", raw)?;
        }
        if let Some(raw) = lookup("QUORUM_MAX_PENDING_SIGNS") {
            self.max_pending_signs = parse("QUORUM_MAX_PENDING_SIGNS", raw)?;
        }
        if let Some(raw) = lookup("QUORUM_SIGN_TIMEOUT_MS") {
            self.sign_timeout_ms = parse("QUORUM_SIGN_TIMEOUT_MS", raw)?;
        }
        if let Some(raw) = lookup("QUORUM_SWEEP_INTERVAL_MS") {
            self.sweep_interval_ms = parse("QUORUM_SWEEP_INTERVAL_MS", raw)?;
        }
        if let Some(raw) = lookup("QUORUM_SESSION_RETENTION_MS") {
            self.session_retention_ms = parse("QUORUM_SESSION_RETENTION_MS", raw)?;
        }
        if let Some(raw) = lookup("QUORUM_SCHEME") {
            self.scheme = raw.parse()?;
        }
        Ok(())
    }

    /// Validate all fields, reporting every violation at once
    pub fn validate(&self) -> Result<(), QuorumError> {
        ConfigValidator::new()
            .range("max_signers", self.max_signers, Some(1), None)
            .range("min_signer_bond", self.min_signer_bond, Some(1), None)
            .range("max_pending_signs", self.max_pending_signs, Some(1), None)
            .range("sign_timeout_ms", self.sign_timeout_ms, Some(1), None)
            .range("sweep_interval_ms", self.sweep_interval_ms, Some(1), None)
            .custom(
                "session_retention_ms",
                self.session_retention_ms >= self.sign_timeout_ms,
                "must be at least sign_timeout_ms",
            )
            .finish()
            .map_err(|errors| {
                let joined = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                QuorumError::invalid(joined)
            })
    }
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            max_signers: Self::DEFAULT_MAX_SIGNERS,
            min_signer_bond: Self::DEFAULT_MIN_SIGNER_BOND,
            max_pending_signs: Self::DEFAULT_MAX_PENDING_SIGNS,
            sign_timeout_ms: Self::DEFAULT_SIGN_TIMEOUT_MS,
            sweep_interval_ms: Self::DEFAULT_SWEEP_INTERVAL_MS,
            session_retention_ms: Self::DEFAULT_SESSION_RETENTION_MS,
            scheme: ThresholdScheme::default(),
        }
    }
}

/// Bond amounts as integers when they fit in 64 bits, decimal strings otherwise.
///
/// TOML integers are 64-bit, so large bonds round-trip through strings.
mod bond_amount {
    use crate::BondAmount;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(u64),
        Str(String),
    }

    pub fn serialize<S: Serializer>(value: &BondAmount, s: S) -> Result<S::Ok, S::Error> {
        match u64::try_from(*value) {
            Ok(small) => s.serialize_u64(small),
            Err(_) => s.serialize_str(&value.to_string()),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BondAmount, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Int(v) => Ok(BondAmount::from(v)),
            Repr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = QuorumConfig::default();
        assert_eq!(config.max_signers, 100);
        assert_eq!(config.max_pending_signs, 1000);
        assert_eq!(config.sign_timeout_ms, 300_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_signers = 7\nscheme = \"ringtail\"").unwrap();

        let config = QuorumConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.max_signers, 7);
        assert_eq!(config.min_signer_bond, QuorumConfig::DEFAULT_MIN_SIGNER_BOND);
        assert_eq!(config.scheme, ThresholdScheme::Ringtail);
        assert_eq!(config.max_pending_signs, 1000);
    }

    #[test]
    fn large_bond_roundtrips_through_toml() {
        let config = QuorumConfig {
            min_signer_bond: 5_000_000_000_000_000_000_000,
            ..QuorumConfig::default()
        };
        let text = toml::to_string(&config).unwrap();
        let parsed: QuorumConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);

        let small: QuorumConfig = toml::from_str("min_signer_bond = 42").unwrap();
        assert_eq!(small.min_signer_bond, 42);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(QuorumConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("QUORUM_MAX_PENDING_SIGNS", "12"),
            ("QUORUM_SCHEME", "CGGMP21"),
        ]
        .into_iter()
        .collect();

        let mut config = QuorumConfig::default();
        config
            .merge_with_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.max_pending_signs, 12);
        assert_eq!(config.scheme, ThresholdScheme::Cggmp21);
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut config = QuorumConfig::default();
        let err = config
            .merge_with_vars(|k| (k == "QUORUM_MAX_SIGNERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("QUORUM_MAX_SIGNERS"));
    }

    #[test]
    fn validation_reports_every_field() {
        let config = QuorumConfig {
            max_signers: 0,
            max_pending_signs: 0,
            session_retention_ms: 1,
            ..QuorumConfig::default()
        };
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("max_signers"));
        assert!(message.contains("max_pending_signs"));
        assert!(message.contains("session_retention_ms"));
    }
}
