use std::collections::BTreeSet;

use rand::rngs::OsRng;
use rand::Rng;

/// Number of backup codes handed out per enrollment.
pub const BACKUP_CODE_COUNT: usize = 10;

/// Material returned once at enrollment for the user to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaSetup {
    /// Base32 secret, for manual entry
    pub secret: String,
    /// `otpauth://` URI, for QR rendering
    pub provisioning_uri: String,
    pub backup_codes: Vec<String>,
}

/// Ten distinct six-digit codes in 100000..=999999.
pub fn generate_backup_codes() -> BTreeSet<String> {
    let mut codes = BTreeSet::new();
    while codes.len() < BACKUP_CODE_COUNT {
        let code: u32 = OsRng.gen_range(100_000..1_000_000);
        codes.insert(code.to_string());
    }
    codes
}
