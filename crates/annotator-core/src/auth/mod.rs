//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `SessionStore`: login state with durable persistence and lazy expiry
//! - `token`: decoding of bearer token claims
//! - `CookieJar` / `MemoryStore`: durable key-value storage for the session
//! - `RouteGuard`: role-based access decisions for protected views
//! - `CredentialStore`: optional OS keychain storage of the login password
//!
//! Persisted session entries expire one day after they are written.

pub mod cookies;
pub mod credentials;
pub mod guard;
pub mod profile;
pub mod session;
pub mod token;

pub use cookies::{CookieAttributes, CookieJar, KeyValueStore, MemoryStore, SameSite};
pub use credentials::CredentialStore;
pub use guard::{GuardDecision, RouteGuard};
pub use profile::{LoginPayload, ProfileError, Role};
pub use session::{
    LogoutNotifier, Navigator, RecordingNavigator, SessionState, SessionStore, LOGIN_PATH,
};
pub use token::{decode_claims, is_token_expired, parse_claims, Claims, TokenError};
