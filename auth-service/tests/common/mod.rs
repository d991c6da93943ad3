#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use auth::Argon2Hasher;
use auth::CredentialHasher;
use auth::KeyPair;
use auth::TokenSigner;
use auth::TotpConfig;
use auth::TotpGenerator;
use auth_service::clock::Clock;
use auth_service::clock::ManualClock;
use auth_service::domain::user::ports::Notifier;
use auth_service::domain::user::ports::UserDirectory;
use auth_service::mfa::service::MfaEngine;
use auth_service::repositories::InMemoryTokenRecordStore;
use auth_service::repositories::InMemoryUserDirectory;
use auth_service::session::service::AuthOrchestrator;
use auth_service::token::service::RefreshTokenStore;
use auth_service::user::errors::NotifierError;
use auth_service::user::models::EmailAddress;
use auth_service::user::models::User;
use auth_service::user::models::Username;
use once_cell::sync::Lazy;

pub const START: i64 = 1_700_000_010;
pub const ACCESS_TTL: i64 = 3600;
pub const REFRESH_TTL: i64 = 86400;
pub const PASSWORD: &str = "correct horse battery staple";

static KEY_PAIR: Lazy<Arc<KeyPair>> =
    Lazy::new(|| Arc::new(KeyPair::generate().expect("Failed to generate key pair")));

static PASSWORD_HASH: Lazy<String> = Lazy::new(|| {
    Argon2Hasher::new()
        .hash(PASSWORD)
        .expect("Failed to hash password")
});

pub type TestTokens = RefreshTokenStore<InMemoryTokenRecordStore, InMemoryUserDirectory>;
pub type TestMfa = MfaEngine<InMemoryUserDirectory, RecordingNotifier>;
pub type TestOrchestrator =
    AuthOrchestrator<InMemoryUserDirectory, InMemoryTokenRecordStore, RecordingNotifier, Argon2Hasher>;

/// Notification kinds captured by the recording notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Verification { to: String, token: String },
    PasswordReset { to: String, token: String },
    Welcome { to: String, username: String },
    MfaEnabled { to: String, username: String },
}

/// Notifier that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Poll until at least `count` messages arrived (fire-and-forget sends).
    pub async fn wait_for(&self, count: usize) -> Vec<Sent> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} notifications, got {:?}", self.sent());
    }

    fn record(&self, message: Sent) -> Result<(), NotifierError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_verification_email(
        &self,
        to: &EmailAddress,
        token: &str,
    ) -> Result<(), NotifierError> {
        self.record(Sent::Verification {
            to: to.to_string(),
            token: token.to_string(),
        })
    }

    async fn send_password_reset(&self, to: &EmailAddress, token: &str) -> Result<(), NotifierError> {
        self.record(Sent::PasswordReset {
            to: to.to_string(),
            token: token.to_string(),
        })
    }

    async fn send_welcome(&self, to: &EmailAddress, username: &Username) -> Result<(), NotifierError> {
        self.record(Sent::Welcome {
            to: to.to_string(),
            username: username.to_string(),
        })
    }

    async fn send_mfa_enabled(
        &self,
        to: &EmailAddress,
        username: &Username,
    ) -> Result<(), NotifierError> {
        self.record(Sent::MfaEnabled {
            to: to.to_string(),
            username: username.to_string(),
        })
    }
}

/// Fully wired service over in-memory adapters and a manual clock.
pub struct TestApp {
    pub clock: Arc<ManualClock>,
    pub users: Arc<InMemoryUserDirectory>,
    pub records: Arc<InMemoryTokenRecordStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub signer: Arc<TokenSigner>,
    pub totp: TotpGenerator,
    pub tokens: Arc<TestTokens>,
    pub mfa: Arc<TestMfa>,
    pub orchestrator: Arc<TestOrchestrator>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let clock = Arc::new(ManualClock::at_timestamp(START));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let users = Arc::new(InMemoryUserDirectory::new());
        let records = Arc::new(InMemoryTokenRecordStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let signer = Arc::new(TokenSigner::new(KEY_PAIR.clone(), auth::DEFAULT_ISSUER));
        let totp = TotpGenerator::new(TotpConfig::default()).expect("Invalid TOTP config");

        let tokens = Arc::new(RefreshTokenStore::new(
            Arc::clone(&records),
            Arc::clone(&users),
            Arc::clone(&signer),
            Arc::clone(&dyn_clock),
            ACCESS_TTL,
        ));
        let mfa = Arc::new(MfaEngine::new(
            Arc::clone(&users),
            Arc::clone(&notifier),
            totp.clone(),
            Arc::clone(&dyn_clock),
        ));
        let orchestrator = Arc::new(AuthOrchestrator::new(
            Arc::clone(&users),
            Arc::clone(&tokens),
            Arc::clone(&mfa),
            Arc::clone(&signer),
            Arc::new(Argon2Hasher::new()),
            dyn_clock,
            REFRESH_TTL,
        ));

        Self {
            clock,
            users,
            records,
            notifier,
            signer,
            totp,
            tokens,
            mfa,
            orchestrator,
        }
    }

    /// Store an enabled account whose password is [`PASSWORD`].
    pub async fn register(&self, username: &str, roles: &[&str]) -> User {
        let user = User::new(
            Username::new(username).expect("Invalid username"),
            EmailAddress::new(format!("{username}@example.com")).expect("Invalid email"),
            PASSWORD_HASH.clone(),
        )
        .with_roles(roles.iter().copied());

        self.users.save(user).await.expect("Failed to save user")
    }

    pub async fn reload(&self, user: &User) -> User {
        self.users
            .find_by_id(&user.id)
            .await
            .expect("Directory failure")
            .expect("User vanished")
    }

    pub fn username(&self, name: &str) -> Username {
        Username::new(name).expect("Invalid username")
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(chrono::Duration::seconds(seconds));
    }

    pub fn now(&self) -> i64 {
        self.clock.now().timestamp()
    }
}
