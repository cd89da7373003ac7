//! Fingerprinted response cache with read-time eviction.
//!
//! [`ResponseCache`] wraps any [`CacheStore`] and owns the expiry rules: an entry is trusted only
//! while `now < expires_at`, stale entries are deleted when a read finds them, and every storage
//! failure degrades to a miss (reads) or a logged no-op (writes). Caching is an optimization; no
//! method here can fail a gateway call.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::UserId,
	obs::{self, CacheEvent},
	store::CacheStore,
};

/// Logical resource family; selects the TTL applied to cached payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
	/// Athlete profile data; changes rarely.
	Profile,
	/// Activity lists; change often.
	Activities,
	/// Aggregated statistics.
	Stats,
	/// Any other read.
	#[default]
	Other,
}
impl ResourceKind {
	/// Returns a stable label used in fingerprints and telemetry.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Profile => "profile",
			Self::Activities => "activities",
			Self::Stats => "stats",
			Self::Other => "other",
		}
	}
}
impl Display for ResourceKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-request caching instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
	/// Whether GET responses may be served from and written to the cache.
	pub enabled: bool,
	/// Resource family used for the fingerprint and the default TTL.
	pub resource: ResourceKind,
	/// Explicit TTL overriding the configured per-resource TTL.
	pub ttl: Option<Duration>,
}
impl CachePolicy {
	/// Enables caching with the TTL configured for `resource`.
	pub const fn enabled(resource: ResourceKind) -> Self {
		Self { enabled: true, resource, ttl: None }
	}

	/// Disables caching; the call always reaches the upstream API.
	pub const fn disabled() -> Self {
		Self { enabled: false, resource: ResourceKind::Other, ttl: None }
	}

	/// Overrides the TTL for this request.
	pub const fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = Some(ttl);

		self
	}
}
impl Default for CachePolicy {
	fn default() -> Self {
		Self::enabled(ResourceKind::Other)
	}
}

/// Deterministic request fingerprint used as the cache key.
///
/// The digest covers the resource kind, user, method, path, and every normalized query
/// parameter, so different pages or filters never collide.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);
impl CacheKey {
	/// Computes the fingerprint for a normalized request.
	pub fn fingerprint(
		kind: ResourceKind,
		user_id: &UserId,
		method: &str,
		path: &str,
		params: &BTreeMap<String, String>,
	) -> Self {
		let mut hasher = Sha256::new();

		absorb(&mut hasher, kind.as_str());
		absorb(&mut hasher, user_id);
		absorb(&mut hasher, method);
		absorb(&mut hasher, path);

		for (name, value) in params {
			absorb(&mut hasher, name);
			absorb(&mut hasher, value);
		}

		Self(URL_SAFE_NO_PAD.encode(hasher.finalize()))
	}

	/// Wraps a caller-chosen key verbatim.
	pub fn from_raw(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	/// Returns the key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CacheKey({})", self.0)
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

// Length-prefixed so ("ab", "c") and ("a", "bc") hash differently.
fn absorb(hasher: &mut Sha256, part: &str) {
	hasher.update((part.len() as u64).to_le_bytes());
	hasher.update(part.as_bytes());
}

/// Cached payload plus its validity window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
	/// Fingerprint the entry is stored under.
	pub key: CacheKey,
	/// Upstream JSON payload.
	pub payload: Value,
	/// Instant the entry was written.
	#[serde(with = "time::serde::timestamp")]
	pub created_at: OffsetDateTime,
	/// Instant the entry stops being trusted (`created_at + ttl`).
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
}
impl CacheEntry {
	/// Creates an entry valid for `ttl` from `created_at`.
	pub fn new(key: CacheKey, payload: Value, created_at: OffsetDateTime, ttl: Duration) -> Self {
		Self { key, payload, created_at, expires_at: created_at + ttl }
	}

	/// Returns `true` while the entry may still be served.
	pub fn is_fresh_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}

/// Best-effort cache facade enforcing expiry on top of a [`CacheStore`].
#[derive(Clone)]
pub struct ResponseCache {
	store: Arc<dyn CacheStore>,
}
impl ResponseCache {
	/// Wraps the provided backend.
	pub fn new(store: Arc<dyn CacheStore>) -> Self {
		Self { store }
	}

	/// Returns the cached payload if present and fresh at the current clock.
	pub async fn get(&self, key: &CacheKey) -> Option<Value> {
		self.get_at(key, OffsetDateTime::now_utc()).await
	}

	/// Returns the cached payload if present and fresh at `now`.
	///
	/// Stale entries are removed as a side effect; backend failures read as a miss.
	pub async fn get_at(&self, key: &CacheKey, now: OffsetDateTime) -> Option<Value> {
		match self.store.get_entry(key).await {
			Ok(Some(entry)) if entry.is_fresh_at(now) => {
				obs::record_cache_event(CacheEvent::Hit, key);

				Some(entry.payload)
			},
			Ok(Some(_)) => {
				obs::record_cache_event(CacheEvent::Expired, key);
				self.delete(key).await;

				None
			},
			Ok(None) => {
				obs::record_cache_event(CacheEvent::Miss, key);

				None
			},
			Err(e) => {
				obs::record_cache_event(CacheEvent::Error, key);
				obs::record_degraded("cache.get", &e);

				None
			},
		}
	}

	/// Stores `payload` for `ttl` from the current clock. Returns whether the write landed.
	pub async fn set(&self, key: CacheKey, payload: Value, ttl: Duration) -> bool {
		self.set_at(key, payload, ttl, OffsetDateTime::now_utc()).await
	}

	/// Stores `payload` for `ttl` from `now`, overwriting any existing entry.
	///
	/// A non-positive TTL still replaces what was there: the key is removed and nothing is
	/// written, so a previous payload can never outlive the overwrite.
	pub async fn set_at(
		&self,
		key: CacheKey,
		payload: Value,
		ttl: Duration,
		now: OffsetDateTime,
	) -> bool {
		if !ttl.is_positive() {
			self.delete(&key).await;

			return false;
		}

		let entry = CacheEntry::new(key, payload, now, ttl);
		let key = entry.key.clone();

		match self.store.put_entry(entry).await {
			Ok(()) => {
				obs::record_cache_event(CacheEvent::Write, &key);

				true
			},
			Err(e) => {
				obs::record_cache_event(CacheEvent::Error, &key);
				obs::record_degraded("cache.set", &e);

				false
			},
		}
	}

	/// Drops every cached payload. Failures are logged and reported as `false`.
	pub async fn clear(&self) -> bool {
		match self.store.clear_entries().await {
			Ok(()) => true,
			Err(e) => {
				obs::record_degraded("cache.clear", &e);

				false
			},
		}
	}

	/// Removes the entry for `key`. Idempotent; failures are logged and reported as `false`.
	pub async fn delete(&self, key: &CacheKey) -> bool {
		match self.store.delete_entry(key).await {
			Ok(()) => true,
			Err(e) => {
				obs::record_degraded("cache.delete", &e);

				false
			},
		}
	}
}
impl Debug for ResponseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ResponseCache(..)")
	}
}
