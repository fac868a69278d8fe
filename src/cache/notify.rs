//! Persistence hooks fired around every cache operation.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, DisplayableId, UniqueId},
	cache::{CacheState, StoreError},
};

/// Hooks an external persistence layer implements to hydrate and flush the cache.
///
/// Hooks run while the cache lock is held, in the order `before_access`, `before_write`
/// (writes only), operation, `after_access`. `after_access` fires even when the operation or an
/// earlier hook failed.
pub trait CacheNotifier
where
	Self: Send + Sync,
{
	/// Called before the cache is read or written.
	fn before_access(&self, args: &mut CacheNotificationArgs<'_>) -> Result<(), StoreError> {
		let _ = args;

		Ok(())
	}

	/// Called before the cache is written.
	fn before_write(&self, args: &mut CacheNotificationArgs<'_>) -> Result<(), StoreError> {
		let _ = args;

		Ok(())
	}

	/// Called after the cache was read or written.
	fn after_access(&self, args: &mut CacheNotificationArgs<'_>) -> Result<(), StoreError> {
		let _ = args;

		Ok(())
	}
}

/// Context handed to [`CacheNotifier`] hooks, with direct access to the locked cache state.
pub struct CacheNotificationArgs<'a> {
	pub(crate) client_id: Option<&'a ClientId>,
	pub(crate) unique_id: Option<&'a UniqueId>,
	pub(crate) displayable_id: Option<&'a DisplayableId>,
	pub(crate) state: &'a mut CacheState,
}
impl CacheNotificationArgs<'_> {
	/// Client the operation runs for, when known.
	pub fn client_id(&self) -> Option<&ClientId> {
		self.client_id
	}

	/// User unique id the operation targets, when known.
	pub fn unique_id(&self) -> Option<&UniqueId> {
		self.unique_id
	}

	/// User displayable id the operation targets, when known.
	pub fn displayable_id(&self) -> Option<&DisplayableId> {
		self.displayable_id
	}

	/// True when the cache was mutated since the last flush.
	pub fn has_state_changed(&self) -> bool {
		self.state.has_state_changed
	}

	/// Sets the state-changed flag; persistence layers reset it after a flush.
	pub fn set_state_changed(&mut self, changed: bool) {
		self.state.has_state_changed = changed;
	}

	/// Serializes the current cache contents.
	pub fn serialize(&self) -> Result<Vec<u8>, StoreError> {
		self.state.serialize()
	}

	/// Replaces the cache contents with a serialized snapshot.
	pub fn deserialize(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
		self.state.deserialize(bytes)
	}
}
impl Debug for CacheNotificationArgs<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CacheNotificationArgs")
			.field("client_id", &self.client_id)
			.field("unique_id", &self.unique_id)
			.field("displayable_id", &self.displayable_id)
			.field("has_state_changed", &self.state.has_state_changed)
			.finish()
	}
}

/// Identifies the caller of a cache operation for notification purposes.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct NotifyContext<'a> {
	pub(crate) client_id: Option<&'a ClientId>,
	pub(crate) unique_id: Option<&'a UniqueId>,
	pub(crate) displayable_id: Option<&'a DisplayableId>,
}
impl<'a> NotifyContext<'a> {
	pub(crate) fn args<'s>(&self, state: &'s mut CacheState) -> CacheNotificationArgs<'s>
	where
		'a: 's,
	{
		CacheNotificationArgs {
			client_id: self.client_id,
			unique_id: self.unique_id,
			displayable_id: self.displayable_id,
			state,
		}
	}
}
