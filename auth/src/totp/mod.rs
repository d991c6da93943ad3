pub mod config;
pub mod errors;
pub mod generator;

pub use config::TotpAlgorithm;
pub use config::TotpConfig;
pub use errors::TotpError;
pub use generator::TotpGenerator;
pub use generator::TotpSecret;
