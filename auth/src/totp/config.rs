use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// HMAC algorithm used to derive codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TotpAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl TotpAlgorithm {
    /// Name used in `otpauth://` URIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TotpAlgorithm::Sha1 => "SHA1",
            TotpAlgorithm::Sha256 => "SHA256",
            TotpAlgorithm::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for TotpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters shared by code generation, verification and provisioning.
///
/// Defaults match what authenticator apps assume when a URI omits them:
/// SHA1, 6 digits, 30 second steps. `skew` is the number of adjacent steps
/// accepted on each side of the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpConfig {
    pub issuer: String,
    pub algorithm: TotpAlgorithm,
    pub digits: u32,
    pub period: u64,
    pub skew: u64,
}

impl TotpConfig {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..Self::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: TotpAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_period(mut self, period: u64) -> Self {
        self.period = period;
        self
    }

    pub fn with_skew(mut self, skew: u64) -> Self {
        self.skew = skew;
        self
    }
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: "Auth Server".to_string(),
            algorithm: TotpAlgorithm::Sha1,
            digits: 6,
            period: 30,
            skew: 1,
        }
    }
}
