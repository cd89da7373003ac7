//! Thread-safe in-memory store for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	cache::{CacheEntry, CacheKey},
	store::{CacheStore, CredentialStore, StoreError, StoreFuture},
};

type TokenMap = Arc<RwLock<HashMap<UserId, TokenRecord>>>;
type EntryMap = Arc<RwLock<HashMap<CacheKey, CacheEntry>>>;

/// In-process backend implementing both [`CredentialStore`] and [`CacheStore`].
///
/// Clones share the same maps, so a test can keep a handle for inspection while the gateway
/// owns another.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	tokens: TokenMap,
	entries: EntryMap,
}
impl MemoryStore {
	/// Number of cache entries currently held, expired or not.
	pub fn cached_len(&self) -> usize {
		self.entries.read().len()
	}

	fn save_now(map: TokenMap, record: TokenRecord) -> Result<(), StoreError> {
		map.write().insert(record.user_id.clone(), record);

		Ok(())
	}

	fn put_now(map: EntryMap, entry: CacheEntry) -> Result<(), StoreError> {
		map.write().insert(entry.key.clone(), entry);

		Ok(())
	}
}
impl CredentialStore for MemoryStore {
	fn get_token<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<TokenRecord>> {
		let map = self.tokens.clone();

		Box::pin(async move { Ok(map.read().get(user_id).cloned()) })
	}

	fn save_token(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		let map = self.tokens.clone();

		Box::pin(async move { Self::save_now(map, record) })
	}
}
impl CacheStore for MemoryStore {
	fn get_entry<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<CacheEntry>> {
		let map = self.entries.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn put_entry(&self, entry: CacheEntry) -> StoreFuture<'_, ()> {
		let map = self.entries.clone();

		Box::pin(async move { Self::put_now(map, entry) })
	}

	fn delete_entry<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, ()> {
		let map = self.entries.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}

	fn clear_entries(&self) -> StoreFuture<'_, ()> {
		let map = self.entries.clone();

		Box::pin(async move {
			map.write().clear();

			Ok(())
		})
	}
}
