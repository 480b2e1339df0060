//! Accounts, verification tokens, and collection membership.

mod collection;
mod memory;
mod models;
mod postgres;
mod service;
mod store;
mod tokens;

pub use collection::CollectionManager;
pub use memory::MemoryAccountStore;
pub use models::{Account, CollectionEntry, Relation};
pub use postgres::PgAccountStore;
pub use service::{AuthenticationService, Session};
pub use store::AccountStore;
pub use tokens::VerificationTokenManager;
