//! File-backed store for single-host deployments and bots.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	cache::{CacheEntry, CacheKey},
	store::{CacheStore, CredentialStore, StoreError, StoreFuture},
};

#[derive(Clone, Debug, Default)]
struct Snapshot {
	tokens: HashMap<UserId, TokenRecord>,
	entries: HashMap<CacheKey, CacheEntry>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
	tokens: Vec<&'a TokenRecord>,
	entries: Vec<&'a CacheEntry>,
}

#[derive(Deserialize)]
struct SnapshotOwned {
	#[serde(default)]
	tokens: Vec<TokenRecord>,
	#[serde(default)]
	entries: Vec<CacheEntry>,
}

/// Persists credentials and cache entries to one JSON file after each mutation.
///
/// Writes go to a sibling `.tmp` file that is synced and renamed over the target, so a crash
/// never leaves a half-written snapshot behind. A mutation becomes visible to readers only once
/// its snapshot has been persisted.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Snapshot::default());
		}

		let owned: SnapshotOwned =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(Snapshot {
			tokens: owned.tokens.into_iter().map(|r| (r.user_id.clone(), r)).collect(),
			entries: owned.entries.into_iter().map(|e| (e.key.clone(), e)).collect(),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn commit(&self, mutate: impl FnOnce(&mut Snapshot)) -> Result<(), StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();

		mutate(&mut next);
		self.persist_locked(&next)?;

		*guard = next;

		Ok(())
	}

	fn persist_locked(&self, contents: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot = SnapshotRef {
			tokens: contents.tokens.values().collect(),
			entries: contents.entries.values().collect(),
		};
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn get_token<'a>(&'a self, user_id: &'a UserId) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.inner.read().tokens.get(user_id).cloned()) })
	}

	fn save_token(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.commit(|snapshot| {
				snapshot.tokens.insert(record.user_id.clone(), record);
			})
		})
	}
}
impl CacheStore for FileStore {
	fn get_entry<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<CacheEntry>> {
		Box::pin(async move { Ok(self.inner.read().entries.get(key).cloned()) })
	}

	fn put_entry(&self, entry: CacheEntry) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.commit(|snapshot| {
				snapshot.entries.insert(entry.key.clone(), entry);
			})
		})
	}

	fn delete_entry<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			if !self.inner.read().entries.contains_key(key) {
				return Ok(());
			}

			self.commit(|snapshot| {
				snapshot.entries.remove(key);
			})
		})
	}

	fn clear_entries(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			if self.inner.read().entries.is_empty() {
				return Ok(());
			}

			self.commit(|snapshot| snapshot.entries.clear())
		})
	}
}
