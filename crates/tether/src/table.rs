//! Process-wide identity-keyed association table.
//!
//! # Role
//!
//! Owns every object's association store, keyed by the address of the host's
//! `Arc` payload. The table is sharded so unrelated objects never serialize
//! each other's operations; each object's entries sit behind their own store
//! mutex.
//!
//! # Invariants
//!
//! - Slots hold only `Weak` host handles; the table never extends a host's
//!   lifetime.
//! - A slot whose weak handle is dead is stale: lookups treat it as a miss
//!   and inserts replace it, so a reused payload address can never surface a
//!   dropped object's entries.
//! - Entry installation and removal are single map operations under the store
//!   mutex; a `set` racing a `remove_all` lands in either order, never torn.

use std::any::Any;
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap as HashMap;
use tracing::trace;

use crate::names::NameRegistry;
use crate::policy::OwnershipPolicy;
use crate::token::{AssocToken, NAME_REGISTRY_TOKEN};
use crate::value::{AssocEntry, Associated, SharedValue, StoredValue, TypeTag};

const SHARD_COUNT: usize = 16;

/// Slot count at which a shard first sweeps its dead slots.
const SWEEP_FLOOR: usize = 32;

static TABLE: LazyLock<AssociationTable> = LazyLock::new(AssociationTable::new);

/// Returns the process-wide table.
pub(crate) fn global() -> &'static AssociationTable {
	&TABLE
}

/// Stable identity of a host object: the address of its `Arc` payload.
///
/// Unique among live `Arc`s; reuse after drop is disarmed by the weak-handle
/// liveness check on every slot access.
pub(crate) fn identity<T>(host: &Arc<T>) -> usize {
	Arc::as_ptr(host) as *const () as usize
}

struct ObjectSlot {
	host: Weak<dyn Any + Send + Sync>,
	store: Arc<ObjectStore>,
}

impl ObjectSlot {
	fn is_live(&self) -> bool {
		self.host.strong_count() > 0
	}
}

struct Shard {
	slots: HashMap<usize, ObjectSlot>,
	/// Slot count that triggers the next dead-slot sweep.
	sweep_at: usize,
}

pub(crate) struct AssociationTable {
	shards: [RwLock<Shard>; SHARD_COUNT],
}

impl AssociationTable {
	fn new() -> Self {
		Self {
			shards: std::array::from_fn(|_| {
				RwLock::new(Shard {
					slots: HashMap::default(),
					sweep_at: SWEEP_FLOOR,
				})
			}),
		}
	}

	fn shard_for(&self, id: usize) -> &RwLock<Shard> {
		// Payload addresses share their low alignment bits; shift them out
		// before folding into the shard index.
		&self.shards[(id >> 4) & (SHARD_COUNT - 1)]
	}

	/// Returns the object's store, creating it on first use.
	pub(crate) fn store_for<T: Any + Send + Sync>(&self, host: &Arc<T>) -> Arc<ObjectStore> {
		let id = identity(host);
		let mut shard = self.shard_for(id).write();

		if let Some(slot) = shard.slots.get(&id) {
			if slot.is_live() {
				return slot.store.clone();
			}
		}

		// First association for this object, or a stale slot left by a
		// dropped object whose payload address got reused.
		if shard.slots.len() >= shard.sweep_at {
			shard.slots.retain(|_, slot| slot.is_live());
			shard.sweep_at = (shard.slots.len() * 2).max(SWEEP_FLOOR);
		}

		trace!(identity = id, "creating association store");
		let store = Arc::new(ObjectStore::default());
		let weak = Arc::downgrade(host) as Weak<dyn Any + Send + Sync>;
		shard.slots.insert(
			id,
			ObjectSlot {
				host: weak,
				store: store.clone(),
			},
		);
		store
	}

	/// Returns the object's store if one exists; never creates one.
	pub(crate) fn lookup_store<T: Any + Send + Sync>(
		&self,
		host: &Arc<T>,
	) -> Option<Arc<ObjectStore>> {
		let id = identity(host);
		{
			let shard = self.shard_for(id).read();
			let slot = shard.slots.get(&id)?;
			if slot.is_live() {
				return Some(slot.store.clone());
			}
		}
		// The host that owned this slot is gone; release its entries now
		// instead of waiting for the next sweep or address reuse.
		self.drop_if_dead(id);
		None
	}

	/// Drops the slot for `id` if its host is gone. No-op for live or absent
	/// slots.
	fn drop_if_dead(&self, id: usize) {
		let mut shard = self.shard_for(id).write();
		if let Some(slot) = shard.slots.get(&id) {
			if !slot.is_live() {
				shard.slots.remove(&id);
				trace!(identity = id, "dropped stale association store");
			}
		}
	}

	/// Drops the object's slot and every entry in it, including its name
	/// registry. Idempotent.
	pub(crate) fn remove_all<T: Any + Send + Sync>(&self, host: &Arc<T>) {
		let id = identity(host);
		let removed = self.shard_for(id).write().slots.remove(&id);
		if removed.is_some() {
			trace!(identity = id, "dropped association store");
		}
	}
}

/// Per-object token-keyed entry map.
#[derive(Default)]
pub(crate) struct ObjectStore {
	entries: Mutex<HashMap<AssocToken, AssocEntry>>,
}

impl ObjectStore {
	/// Installs or overwrites the entry for `token`.
	///
	/// The previous entry is dropped outside the lock, releasing any value it
	/// owned; an overwritten `Assign` entry releases nothing.
	pub(crate) fn set(&self, token: AssocToken, entry: AssocEntry) {
		let previous = self.entries.lock().insert(token, entry);
		drop(previous);
	}

	pub(crate) fn get(&self, token: AssocToken) -> Option<AssocEntry> {
		self.entries.lock().get(&token).cloned()
	}

	/// Returns the object's name registry, installing it under the reserved
	/// token on first use.
	///
	/// Installation happens under the entry lock, so two racing first-time
	/// interns agree on one registry.
	pub(crate) fn name_registry(&self) -> Arc<NameRegistry> {
		let mut entries = self.entries.lock();
		if let Some(registry) = entries.get(&NAME_REGISTRY_TOKEN).and_then(registry_of) {
			return registry;
		}

		let registry = Arc::new(NameRegistry::default());
		let shared: SharedValue = registry.clone();
		entries.insert(
			NAME_REGISTRY_TOKEN,
			AssocEntry::new(
				StoredValue::Retained(shared),
				OwnershipPolicy::Retain,
				TypeTag::of::<NameRegistry>(),
			),
		);
		registry
	}

	/// Returns the name registry only if one was ever created.
	pub(crate) fn existing_name_registry(&self) -> Option<Arc<NameRegistry>> {
		self.entries.lock().get(&NAME_REGISTRY_TOKEN).and_then(registry_of)
	}
}

fn registry_of(entry: &AssocEntry) -> Option<Arc<NameRegistry>> {
	entry
		.retrieve::<NameRegistry>()
		.ok()
		.and_then(Associated::into_shared)
}
