//! Storage contracts and built-in backends for credentials and cached responses.
//!
//! The gateway treats both stores as shared, out-of-process resources: writes become visible to
//! later calls eventually, never necessarily to a concurrent reader. [`MemoryStore`] and
//! [`FileStore`] implement both contracts so one backend can serve a whole deployment.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	cache::{CacheEntry, CacheKey},
};

/// Boxed future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable mapping from user identifier to that user's single [`TokenRecord`].
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches the record for `user_id`, if present.
	fn get_token<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Persists `record` under `record.user_id`, replacing any previous record.
	fn save_token(&self, record: TokenRecord) -> StoreFuture<'_, ()>;
}

/// Durable mapping from request fingerprint to a cached payload.
///
/// Backends store and return entries verbatim; expiry is enforced by
/// [`ResponseCache`](crate::cache::ResponseCache), not by the backend.
pub trait CacheStore
where
	Self: Send + Sync,
{
	/// Fetches the entry stored under `key`, expired or not.
	fn get_entry<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<CacheEntry>>;

	/// Stores `entry` under `entry.key`, overwriting any previous entry.
	fn put_entry(&self, entry: CacheEntry) -> StoreFuture<'_, ()>;

	/// Removes the entry stored under `key`. Removing a missing key succeeds.
	fn delete_entry<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, ()>;

	/// Removes every cached entry. Credentials are untouched.
	fn clear_entries(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] and [`CacheStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
