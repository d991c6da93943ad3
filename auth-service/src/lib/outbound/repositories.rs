pub mod memory;
pub mod refresh_token;
pub mod user;

pub use memory::InMemoryTokenRecordStore;
pub use memory::InMemoryUserDirectory;
pub use refresh_token::PostgresTokenRecordStore;
pub use user::PostgresUserDirectory;
