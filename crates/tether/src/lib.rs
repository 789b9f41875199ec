//! Identity-keyed runtime metadata for `Arc` objects.
//!
//! `tether` attaches arbitrary typed values to an existing `Arc` instance at
//! runtime, without touching the type's own definition: a process-wide side
//! table keyed by object identity. Values are stored under caller-chosen
//! keys — opaque [`AssocToken`]s, or plain strings interned per object — and
//! under an [`OwnershipPolicy`] deciding whether the table copies, retains,
//! or merely points at the value.
//!
//! ```
//! use std::sync::Arc;
//! use tether::AssociatedObjects;
//!
//! let user = Arc::new(String::from("somebody"));
//! user.set_associated("visits", &Arc::new(42u32));
//!
//! let visits = user
//! 	.get_associated::<u32, _>("visits")
//! 	.expect("stored as u32")
//! 	.and_then(|v| v.into_shared())
//! 	.expect("present");
//! assert_eq!(*visits, 42);
//!
//! user.remove_all_associated();
//! ```
//!
//! The table holds hosts weakly: associations never keep an object alive,
//! and a dropped object's entries become unreachable with it.

mod names;
mod policy;
mod table;
mod token;
mod value;


pub use policy::OwnershipPolicy;
pub use token::AssocToken;
pub use value::{AssocError, Associated};

use std::any::Any;
use std::sync::Arc;

/// A key addressing one association on an object: a caller-managed stable
/// token, or a string interned per object into one.
#[derive(Debug, Clone, Copy)]
pub enum AssocKey<'a> {
	/// Raw token; the caller keeps it and reuses it.
	Token(AssocToken),
	/// String key, resolved through the object's name registry.
	Name(&'a str),
}

impl<'a> From<AssocToken> for AssocKey<'a> {
	fn from(token: AssocToken) -> Self {
		Self::Token(token)
	}
}

impl<'a> From<&'a str> for AssocKey<'a> {
	fn from(name: &'a str) -> Self {
		Self::Name(name)
	}
}

impl<'a> From<&'a String> for AssocKey<'a> {
	fn from(name: &'a String) -> Self {
		Self::Name(name)
	}
}

/// Marker for values the side table can store under any policy.
///
/// `Clone` backs the copy policies; how deep a `Copy` association is
/// independent of the original is exactly the type's own `Clone` semantics.
pub trait Associable: Any + Send + Sync + Clone {}

impl<V> Associable for V where V: Any + Send + Sync + Clone {}

/// Associated-object surface, adopted by `Arc<T>` for any sendable `T`.
///
/// All operations are synchronous and keyed by the identity of `self`'s
/// payload: two clones of one `Arc` see the same associations, two distinct
/// allocations never do.
pub trait AssociatedObjects {
	/// Stores `value` under `key` with the default
	/// [`RetainAtomic`](OwnershipPolicy::RetainAtomic) policy.
	fn set_associated<'k, V, K>(&self, key: K, value: &Arc<V>)
	where
		V: Associable,
		K: Into<AssocKey<'k>>;

	/// Stores `value` under `key` under an explicit ownership policy.
	///
	/// Overwriting an existing entry releases the value it owned. The policy
	/// is per call: it governs this entry only until the next overwrite of
	/// the same key.
	fn set_associated_with<'k, V, K>(&self, key: K, value: &Arc<V>, policy: OwnershipPolicy)
	where
		V: Associable,
		K: Into<AssocKey<'k>>;

	/// Fetches the value stored under `key`.
	///
	/// `Ok(None)` when nothing is stored there — a miss is not an error, and
	/// a miss on a string key allocates neither a token nor a registry.
	/// `Err(TypeMismatch)` when the stored value was recorded as a type other
	/// than `V`.
	fn get_associated<'k, V, K>(&self, key: K) -> Result<Option<Associated<V>>, AssocError>
	where
		V: Any + Send + Sync,
		K: Into<AssocKey<'k>>;

	/// Drops every association on this object, including its interned string
	/// keys. Idempotent; unordered against concurrent sets.
	fn remove_all_associated(&self);
}

impl<T: Any + Send + Sync> AssociatedObjects for Arc<T> {
	fn set_associated<'k, V, K>(&self, key: K, value: &Arc<V>)
	where
		V: Associable,
		K: Into<AssocKey<'k>>,
	{
		self.set_associated_with(key, value, OwnershipPolicy::default());
	}

	fn set_associated_with<'k, V, K>(&self, key: K, value: &Arc<V>, policy: OwnershipPolicy)
	where
		V: Associable,
		K: Into<AssocKey<'k>>,
	{
		let store = table::global().store_for(self);
		let token = match key.into() {
			AssocKey::Token(token) => token,
			AssocKey::Name(name) => store.name_registry().resolve_or_create(name),
		};
		store.set(token, policy::materialize(value, policy));
	}

	fn get_associated<'k, V, K>(&self, key: K) -> Result<Option<Associated<V>>, AssocError>
	where
		V: Any + Send + Sync,
		K: Into<AssocKey<'k>>,
	{
		let Some(store) = table::global().lookup_store(self) else {
			return Ok(None);
		};
		let token = match key.into() {
			AssocKey::Token(token) => token,
			AssocKey::Name(name) => {
				match store.existing_name_registry().and_then(|r| r.lookup(name)) {
					Some(token) => token,
					None => return Ok(None),
				}
			}
		};
		match store.get(token) {
			Some(entry) => entry.retrieve::<V>().map(Some),
			None => Ok(None),
		}
	}

	fn remove_all_associated(&self) {
		table::global().remove_all(self);
	}
}
