//! Type-erased value storage and checked retrieval.
//!
//! Values enter the table erased to `dyn Any` (or, for `Assign`, to a bare
//! pointer) and carry a [`TypeTag`] recorded at store time. Retrieval checks
//! the tag against the requested type and fails with
//! [`AssocError::TypeMismatch`] instead of casting blindly.

use std::any::{Any, TypeId};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::policy::OwnershipPolicy;

/// Shared handle to an owned, type-erased value.
pub(crate) type SharedValue = Arc<dyn Any + Send + Sync>;

/// Storage representation chosen by the ownership policy at set time.
#[derive(Clone)]
pub(crate) enum StoredValue {
	/// Non-owning payload pointer (`Assign`). This crate never dereferences
	/// it; validity past the referent's lifetime is the caller's contract.
	Assigned(NonNull<()>),
	/// Owned duplicate made at store time (`Copy` variants).
	Copied(SharedValue),
	/// Shared reference to the caller's allocation (`Retain` variants).
	Retained(SharedValue),
}

// Assigned pointers are opaque data to this crate: they are stored and handed
// back but never dereferenced, so moving the pointer value across threads is
// sound. The owned representations are already Send + Sync.
unsafe impl Send for StoredValue {}
unsafe impl Sync for StoredValue {}

/// Type recorded for a stored value at set time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TypeTag {
	id: TypeId,
	name: &'static str,
}

impl TypeTag {
	pub(crate) fn of<V: Any>() -> Self {
		Self {
			id: TypeId::of::<V>(),
			name: std::any::type_name::<V>(),
		}
	}
}

/// One stored association: the value, the policy that stored it, and the type
/// it was stored as.
#[derive(Clone)]
pub(crate) struct AssocEntry {
	value: StoredValue,
	policy: OwnershipPolicy,
	tag: TypeTag,
}

impl AssocEntry {
	pub(crate) fn new(value: StoredValue, policy: OwnershipPolicy, tag: TypeTag) -> Self {
		Self { value, policy, tag }
	}

	pub(crate) fn policy(&self) -> OwnershipPolicy {
		self.policy
	}

	/// Downcasts the entry to the caller's requested type.
	///
	/// The tag check runs first, so a mismatch surfaces as an error before
	/// any representation-specific handling.
	pub(crate) fn retrieve<V: Any + Send + Sync>(&self) -> Result<Associated<V>, AssocError> {
		if self.tag.id != TypeId::of::<V>() {
			return Err(AssocError::TypeMismatch {
				expected: std::any::type_name::<V>(),
				found: self.tag.name,
			});
		}
		match &self.value {
			StoredValue::Assigned(ptr) => Ok(Associated::Assigned(ptr.cast::<V>())),
			StoredValue::Copied(value) | StoredValue::Retained(value) => value
				.clone()
				.downcast::<V>()
				.map(Associated::Shared)
				.map_err(|_| AssocError::TypeMismatch {
					expected: std::any::type_name::<V>(),
					found: self.tag.name,
				}),
		}
	}
}

impl fmt::Debug for AssocEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let repr = match &self.value {
			StoredValue::Assigned(_) => "assigned",
			StoredValue::Copied(_) => "copied",
			StoredValue::Retained(_) => "retained",
		};
		f.debug_struct("AssocEntry")
			.field("repr", &repr)
			.field("policy", &self.policy)
			.field("type", &self.tag.name)
			.finish()
	}
}

/// A value fetched from the side table.
pub enum Associated<V> {
	/// Shared owning handle: the stored duplicate for `Copy` entries, the
	/// retained original for `Retain` entries.
	Shared(Arc<V>),
	/// Non-owning pointer stored under `Assign`.
	///
	/// Dereferencing it is sound only while the original referent is alive;
	/// the side table neither tracks nor extends that lifetime.
	Assigned(NonNull<V>),
}

impl<V> Associated<V> {
	/// Returns the shared handle, if this entry owns one.
	pub fn into_shared(self) -> Option<Arc<V>> {
		match self {
			Self::Shared(value) => Some(value),
			Self::Assigned(_) => None,
		}
	}

	/// Returns the raw pointer stored under `Assign`.
	pub fn as_assigned(&self) -> Option<NonNull<V>> {
		match self {
			Self::Shared(_) => None,
			Self::Assigned(ptr) => Some(*ptr),
		}
	}
}

impl<V> Clone for Associated<V> {
	fn clone(&self) -> Self {
		match self {
			Self::Shared(value) => Self::Shared(value.clone()),
			Self::Assigned(ptr) => Self::Assigned(*ptr),
		}
	}
}

impl<V: fmt::Debug> fmt::Debug for Associated<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Shared(value) => f.debug_tuple("Shared").field(value).finish(),
			Self::Assigned(ptr) => f.debug_tuple("Assigned").field(ptr).finish(),
		}
	}
}

/// Error from associated-value retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AssocError {
	/// The stored value's recorded type differs from the requested type.
	#[error("associated value is `{found}`, not the requested `{expected}`")]
	TypeMismatch {
		/// Type requested by the caller.
		expected: &'static str,
		/// Type recorded when the value was stored.
		found: &'static str,
	},
}
