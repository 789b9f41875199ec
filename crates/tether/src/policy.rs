//! Ownership policies and the store-time enforcer.

use std::ptr::NonNull;
use std::sync::Arc;

use crate::Associable;
use crate::value::{AssocEntry, StoredValue, TypeTag};

/// How the side table holds a stored value.
///
/// | Policy | Stores | Synchronization |
/// |---|---|---|
/// | [`Assign`](Self::Assign) | raw non-owning pointer | none |
/// | [`Copy`](Self::Copy) | owned duplicate | none |
/// | [`CopyAtomic`](Self::CopyAtomic) | owned duplicate | per-(object, token) store/fetch exclusion |
/// | [`Retain`](Self::Retain) | shared owning reference | none |
/// | [`RetainAtomic`](Self::RetainAtomic) | shared owning reference | per-(object, token) store/fetch exclusion |
///
/// The atomic guarantees are a floor, not a ceiling: the current
/// implementation serializes all entry access within one object's store,
/// which is permitted for the non-atomic variants but not promised by them.
///
/// The policy is evaluated once, at store time, and governs an entry only
/// until the next overwrite of the same key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnershipPolicy {
	/// Store a raw pointer to the value without taking ownership.
	Assign,
	/// Share the caller's allocation; store and fetch for the entry are
	/// mutually exclusive across threads.
	#[default]
	RetainAtomic,
	/// Duplicate the value at store time; store and fetch for the entry are
	/// mutually exclusive across threads.
	CopyAtomic,
	/// Share the caller's allocation.
	Retain,
	/// Duplicate the value at store time.
	Copy,
}

impl OwnershipPolicy {
	/// Raw value of the host association facility this policy models.
	pub const fn as_raw(self) -> u32 {
		match self {
			Self::Assign => 0,
			Self::RetainAtomic => 1,
			Self::CopyAtomic => 3,
			Self::Retain => 769,
			Self::Copy => 771,
		}
	}

	/// Reverse of [`as_raw`](Self::as_raw); unknown raw values map to `None`.
	pub const fn from_raw(raw: u32) -> Option<Self> {
		match raw {
			0 => Some(Self::Assign),
			1 => Some(Self::RetainAtomic),
			3 => Some(Self::CopyAtomic),
			769 => Some(Self::Retain),
			771 => Some(Self::Copy),
			_ => None,
		}
	}

	/// True for the variants that bound each store/fetch in a critical
	/// section.
	pub const fn is_atomic(self) -> bool {
		matches!(self, Self::RetainAtomic | Self::CopyAtomic)
	}

	/// True when a fresh duplicate is made at store time.
	pub const fn duplicates(self) -> bool {
		matches!(self, Self::Copy | Self::CopyAtomic)
	}

	/// True when the table owns or co-owns the stored value.
	pub const fn owns_value(self) -> bool {
		!matches!(self, Self::Assign)
	}
}

/// Materializes the stored entry for `value` under `policy`.
///
/// Runs at store time only: `Assign` captures the payload address without
/// retaining it, the copy policies clone the value into a fresh allocation,
/// and the retain policies share the caller's `Arc`.
pub(crate) fn materialize<V: Associable>(value: &Arc<V>, policy: OwnershipPolicy) -> AssocEntry {
	let stored = match policy {
		OwnershipPolicy::Assign => StoredValue::Assigned(NonNull::from(value.as_ref()).cast()),
		OwnershipPolicy::Copy | OwnershipPolicy::CopyAtomic => {
			StoredValue::Copied(Arc::new(value.as_ref().clone()))
		}
		OwnershipPolicy::Retain | OwnershipPolicy::RetainAtomic => {
			StoredValue::Retained(value.clone())
		}
	};
	AssocEntry::new(stored, policy, TypeTag::of::<V>())
}

#[cfg(test)]
mod tests {
	use super::*;

	const ALL: [OwnershipPolicy; 5] = [
		OwnershipPolicy::Assign,
		OwnershipPolicy::RetainAtomic,
		OwnershipPolicy::CopyAtomic,
		OwnershipPolicy::Retain,
		OwnershipPolicy::Copy,
	];

	/// Verifies the wire-constant table of the modeled host facility.
	#[test]
	fn test_raw_value_parity() {
		assert_eq!(OwnershipPolicy::Assign.as_raw(), 0);
		assert_eq!(OwnershipPolicy::RetainAtomic.as_raw(), 1);
		assert_eq!(OwnershipPolicy::CopyAtomic.as_raw(), 3);
		assert_eq!(OwnershipPolicy::Retain.as_raw(), 769);
		assert_eq!(OwnershipPolicy::Copy.as_raw(), 771);

		for policy in ALL {
			assert_eq!(OwnershipPolicy::from_raw(policy.as_raw()), Some(policy));
		}
		assert_eq!(OwnershipPolicy::from_raw(2), None);
		assert_eq!(OwnershipPolicy::from_raw(770), None);
	}

	/// The default policy matches the facade's documented default.
	#[test]
	fn test_default_is_retain_atomic() {
		assert_eq!(OwnershipPolicy::default(), OwnershipPolicy::RetainAtomic);
	}

	#[test]
	fn test_predicates() {
		assert!(OwnershipPolicy::RetainAtomic.is_atomic());
		assert!(OwnershipPolicy::CopyAtomic.is_atomic());
		assert!(!OwnershipPolicy::Retain.is_atomic());
		assert!(OwnershipPolicy::Copy.duplicates());
		assert!(!OwnershipPolicy::Retain.duplicates());
		assert!(!OwnershipPolicy::Assign.owns_value());
		assert!(OwnershipPolicy::Copy.owns_value());
	}

	/// A retained entry shares the caller's allocation; a copied entry gets
	/// its own.
	#[test]
	fn test_materialize_identity() {
		let value = Arc::new(String::from("payload"));

		let retained = materialize(&value, OwnershipPolicy::Retain)
			.retrieve::<String>()
			.expect("stored type")
			.into_shared()
			.expect("owning entry");
		assert!(Arc::ptr_eq(&value, &retained));

		let copied = materialize(&value, OwnershipPolicy::Copy)
			.retrieve::<String>()
			.expect("stored type")
			.into_shared()
			.expect("owning entry");
		assert!(!Arc::ptr_eq(&value, &copied));
		assert_eq!(*copied, *value);

		let assigned = materialize(&value, OwnershipPolicy::Assign)
			.retrieve::<String>()
			.expect("stored type")
			.as_assigned()
			.expect("non-owning entry");
		assert_eq!(assigned, NonNull::from(value.as_ref()));
	}
}
