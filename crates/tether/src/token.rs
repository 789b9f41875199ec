//! Opaque association tokens.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Token reserved for the per-object name registry entry.
///
/// Public allocation starts above this value, so a caller-supplied token can
/// never alias it.
pub(crate) const NAME_REGISTRY_TOKEN: AssocToken = AssocToken(NonZeroU64::MIN);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(2);

/// Opaque identity key into an object's association store.
///
/// Equality is identity, not content: [`AssocToken::new`] never hands out the
/// same value twice, so two tokens compare equal only if one is a copy of the
/// other. Callers that manage their own stable tokens hold onto the copy and
/// reuse it; losing every copy makes the entry stored under it unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssocToken(NonZeroU64);

impl AssocToken {
	/// Allocates a token distinct from every token allocated before it.
	pub fn new() -> Self {
		let raw = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
		// The counter starts at 2; a u64 cannot wrap in a realistic process
		// lifetime.
		Self(NonZeroU64::new(raw).expect("token counter wrapped"))
	}
}

impl Default for AssocToken {
	fn default() -> Self {
		Self::new()
	}
}
