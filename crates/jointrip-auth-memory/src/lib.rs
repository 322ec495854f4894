//! In-memory storage backends for JoinTrip authentication.
//!
//! This crate implements the [`SessionStorage`] and [`AccountStorage`]
//! traits from `jointrip-auth` on top of `tokio::sync::RwLock`-guarded hash
//! maps. Writers are serialised behind one lock per store, which gives
//! per-record atomicity and optimistic concurrency on session updates.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use jointrip_auth::AuthService;
//! use jointrip_auth_memory::{InMemoryAccountStorage, InMemorySessionStorage};
//!
//! let service = AuthService::builder(config)
//!     .with_session_storage(Arc::new(InMemorySessionStorage::new()))
//!     .with_account_storage(Arc::new(
//!         InMemoryAccountStorage::new().with_atomic_profile_updates(true),
//!     ))
//!     .with_identity_exchange(identity)
//!     .build()?;
//! ```
//!
//! [`SessionStorage`]: jointrip_auth::SessionStorage
//! [`AccountStorage`]: jointrip_auth::AccountStorage

pub mod account;
pub mod session;

pub use account::InMemoryAccountStorage;
pub use session::InMemorySessionStorage;
