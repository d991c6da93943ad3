pub mod clock;
pub mod mfa;
pub mod session;
pub mod token;
pub mod user;
