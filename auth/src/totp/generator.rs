use std::fmt;

use data_encoding::BASE32_NOPAD;
use hmac::digest::KeyInit;
use hmac::Hmac;
use hmac::Mac;
use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use sha2::Sha256;
use sha2::Sha512;
use subtle::Choice;
use subtle::ConstantTimeEq;

use super::config::TotpAlgorithm;
use super::config::TotpConfig;
use super::errors::TotpError;

/// Characters left unescaped in `otpauth://` labels and parameters.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Shared secret between the server and an authenticator app.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpSecret(Vec<u8>);

impl TotpSecret {
    /// Secret length in bytes (160 bits, the RFC 4226 recommendation).
    pub const LENGTH: usize = 20;

    /// Generate a random secret from the OS entropy source.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; Self::LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a base32 secret (RFC 4648, padding and case tolerated).
    ///
    /// # Errors
    /// * `InvalidSecret` - Empty or not valid base32
    pub fn from_encoded(encoded: &str) -> Result<Self, TotpError> {
        let normalized = encoded.trim_end_matches('=').to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(TotpError::InvalidSecret("secret is empty".to_string()));
        }

        BASE32_NOPAD
            .decode(normalized.as_bytes())
            .map(Self)
            .map_err(|e| TotpError::InvalidSecret(e.to_string()))
    }

    /// Base32 encoding without padding, as expected in provisioning URIs.
    pub fn to_encoded(&self) -> String {
        BASE32_NOPAD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TotpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TotpSecret(<redacted>)")
    }
}

/// RFC 6238 time-based one-time password generator and verifier.
#[derive(Debug, Clone)]
pub struct TotpGenerator {
    config: TotpConfig,
}

impl TotpGenerator {
    /// Create a generator after validating the configuration.
    ///
    /// # Errors
    /// * `InvalidDigits` - Digits outside 6..=8
    /// * `ZeroPeriod` - Period of zero seconds
    pub fn new(config: TotpConfig) -> Result<Self, TotpError> {
        if !(6..=8).contains(&config.digits) {
            return Err(TotpError::InvalidDigits(config.digits));
        }
        if config.period == 0 {
            return Err(TotpError::ZeroPeriod);
        }

        Ok(Self { config })
    }

    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    /// Time step containing `unix_time`. Times before the epoch map to step 0.
    pub fn counter_at(&self, unix_time: i64) -> u64 {
        (unix_time.max(0) as u64) / self.config.period
    }

    /// Code for the step containing `unix_time`.
    pub fn generate_at(&self, secret: &TotpSecret, unix_time: i64) -> Result<String, TotpError> {
        self.hotp(secret.as_bytes(), self.counter_at(unix_time))
    }

    /// RFC 4226 HOTP value for an explicit counter.
    ///
    /// HMAC over the 8-byte big-endian counter, dynamic truncation at the
    /// offset given by the low nibble of the last digest byte, high bit
    /// masked, reduced modulo `10^digits` and zero-padded.
    pub fn hotp(&self, key: &[u8], counter: u64) -> Result<String, TotpError> {
        let message = counter.to_be_bytes();
        let digest = match self.config.algorithm {
            TotpAlgorithm::Sha1 => sign::<Hmac<Sha1>>(key, &message)?,
            TotpAlgorithm::Sha256 => sign::<Hmac<Sha256>>(key, &message)?,
            TotpAlgorithm::Sha512 => sign::<Hmac<Sha512>>(key, &message)?,
        };

        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);
        let code = binary % 10u32.pow(self.config.digits);

        Ok(format!(
            "{:0width$}",
            code,
            width = self.config.digits as usize
        ))
    }

    /// Check `code` against the step containing `unix_time` and `skew`
    /// steps on either side.
    ///
    /// Every candidate is compared in constant time and all of them are
    /// computed regardless of an earlier match.
    pub fn verify_at(
        &self,
        secret: &TotpSecret,
        code: &str,
        unix_time: i64,
    ) -> Result<bool, TotpError> {
        let counter = self.counter_at(unix_time);
        let first = counter.saturating_sub(self.config.skew);
        let last = counter.saturating_add(self.config.skew);

        let mut matched = Choice::from(0u8);
        for step in first..=last {
            let candidate = self.hotp(secret.as_bytes(), step)?;
            matched |= candidate.as_bytes().ct_eq(code.as_bytes());
        }

        Ok(bool::from(matched))
    }

    /// `otpauth://` URI for QR-code enrollment.
    ///
    /// `otpauth://totp/<issuer>:<account>?secret=..&issuer=..&algorithm=..&digits=..&period=..`
    pub fn provisioning_uri(&self, account: &str, secret: &TotpSecret) -> String {
        let issuer = utf8_percent_encode(&self.config.issuer, URI_COMPONENT).to_string();
        let account = utf8_percent_encode(account, URI_COMPONENT);

        format!(
            "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm={algorithm}&digits={digits}&period={period}",
            secret = secret.to_encoded(),
            algorithm = self.config.algorithm,
            digits = self.config.digits,
            period = self.config.period,
        )
    }
}

fn sign<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Result<Vec<u8>, TotpError> {
    let mut mac =
        <M as Mac>::new_from_slice(key).map_err(|e| TotpError::InvalidSecret(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}
