//! Session credential storage for the hostel admin API client
//!
//! Holds the opaque bearer credential behind an injected key/value store and
//! publishes a process-wide "session invalidated" signal whenever it is
//! cleared. This crate has no network logic: the dispatcher and refresh
//! coordinator decide when to set or clear, this crate only remembers.
//!
//! Credential lifecycle:
//! 1. Login response parsed via `token::parse_login()` → `CredentialStore::set()`
//! 2. Outbound requests read it via `CredentialStore::get()`
//! 3. Renewal response parsed via `token::parse_renewal()` → `CredentialStore::set()`
//! 4. Logout or unrecoverable renewal failure → `CredentialStore::clear()`,
//!    which broadcasts `SessionEvent::Invalidated` to subscribers

pub mod constants;
pub mod credentials;
pub mod error;
pub mod storage;
pub mod token;

pub use constants::*;
pub use credentials::{Credential, CredentialStore, InvalidationReason, SessionEvent};
pub use error::{Error, Result};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use token::{LoginResponse, RenewalResponse, parse_login, parse_renewal};
