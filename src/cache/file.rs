//! JSON file persistence for [`crate::cache::TokenCache`], wired in through the notifier hooks.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::cache::{CacheNotificationArgs, CacheNotifier, StoreError};

/// Hydrates the cache from a file before each access and writes it back when it changed.
#[derive(Clone, Debug)]
pub struct FileCache {
	path: PathBuf,
}
impl FileCache {
	/// Creates a notifier for `path`, creating parent directories as needed.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		Ok(Self { path })
	}

	/// Snapshot file location.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(&self) -> Result<Vec<u8>, StoreError> {
		if !self.path.exists() {
			return Ok(Vec::new());
		}

		fs::read(&self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", self.path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create cache directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, serialized: &[u8]) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(serialized).map_err(|e| StoreError::Backend {
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
impl CacheNotifier for FileCache {
	fn before_access(&self, args: &mut CacheNotificationArgs<'_>) -> Result<(), StoreError> {
		let bytes = self.load_snapshot()?;

		args.deserialize(&bytes)
	}

	fn after_access(&self, args: &mut CacheNotificationArgs<'_>) -> Result<(), StoreError> {
		if !args.has_state_changed() {
			return Ok(());
		}

		self.persist(&args.serialize()?)?;
		args.set_state_changed(false);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;
	use crate::{
		_prelude::*,
		auth::{CachedCredential, ClientId, ResourceOrScope, SubjectType},
		authority::Authority,
		cache::{TokenCache, TokenCacheKey},
	};

	fn temp_path() -> PathBuf {
		let unique = format!(
			"oauth2_sts_client_file_cache_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn key() -> TokenCacheKey {
		TokenCacheKey::new(
			Authority::new("https://login.example.com/tenant").expect("Authority should parse."),
			ResourceOrScope::resource("https://graph.example.com"),
			ClientId::new("client-a").expect("Client fixture should be valid."),
			SubjectType::App,
		)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path();
		let notifier = FileCache::open(&path).expect("Failed to open file cache.");
		let cache = TokenCache::with_notifier(Arc::new(notifier.clone()));
		let value = CachedCredential::builder()
			.access_token("access-token")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Failed to build file-cache test credential.");

		cache.add(key(), value).expect("Failed to add fixture credential.");

		assert!(path.exists(), "The snapshot should be flushed after a write.");
		assert!(!cache.has_state_changed());

		let reopened = TokenCache::with_notifier(Arc::new(notifier));
		let fetched = reopened
			.try_get(&key())
			.expect("Failed to read from the reopened cache.")
			.expect("File cache lost the entry after reopen.");
		let access_token = fetched.access_token.expect("Reloaded entry should keep its token.");

		assert_eq!(access_token.expose(), "access-token");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file cache snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn corrupt_snapshot_surfaces_serialization_error() {
		let path = temp_path();

		fs::write(&path, b"{broken").expect("Failed to write corrupt snapshot.");

		let cache = TokenCache::with_notifier(Arc::new(
			FileCache::open(&path).expect("Failed to open file cache."),
		));
		let err = cache.try_get(&key()).expect_err("Corrupt snapshots must fail the access.");

		assert!(matches!(err, Error::Storage(StoreError::Serialization { .. })));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file cache snapshot {}: {e}", path.display())
		});
	}
}
