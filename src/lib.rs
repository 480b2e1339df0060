//! # Marquee (Account Identity & Movie Collections)
//!
//! `marquee` manages the account side of a movie catalog: registration with
//! email confirmation, credential checks, password reset, soft deletion, and
//! each account's favorite/watchlist collection.
//!
//! ## Identity Model
//!
//! Accounts are unique by email among live rows only.
//!
//! - **Soft Deletes:** Deleting an account keeps the row but hides it from
//!   every read and write path; the address becomes free to register again.
//! - **Email Confirmation:** Registration stores a single-use random token
//!   with a 24 hour expiry. Logging in with a correct password but an
//!   unconfirmed address re-issues the token instead of opening a session.
//! - **Enumeration Resistance:** An unknown address and a wrong password
//!   produce the same generic error, so responses never reveal which
//!   addresses are registered.
//!
//! ## External Capabilities
//!
//! Password hashing, bearer-token signing, verification delivery, and the
//! rate-limit store are trait seams ([`PasswordHasher`], [`TokenSigner`],
//! [`Notifier`], [`RateLimitCounter`]) with default implementations over
//! bcrypt, HS256 JWTs, tracing, and Redis. Persistence is the
//! [`AccountStore`] seam with Postgres and in-memory implementations.
//!
//! ## Collections
//!
//! A movie appears in an account's collection at most once, as either a
//! favorite or a watchlist entry. Storing the other relation overwrites in
//! place; removal must name the stored relation to take effect.

pub mod account;
pub mod bearer;
pub mod config;
pub mod error;
pub mod notify;
pub mod password;
pub mod rate_limit;

pub use account::{
    Account, AccountStore, AuthenticationService, CollectionEntry, CollectionManager,
    MemoryAccountStore, PgAccountStore, Relation, Session, VerificationTokenManager,
};
pub use bearer::{JwtTokenSigner, TokenSigner, strip_bearer};
pub use config::IdentityConfig;
pub use error::IdentityError;
pub use notify::{Notifier, RecordingNotifier, TracingNotifier};
pub use password::{BcryptPasswordHasher, PasswordHasher};
pub use rate_limit::{MemoryRateLimitCounter, RateLimitCounter, RedisRateLimitCounter};
