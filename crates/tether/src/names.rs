//! Per-object string-key interning.
//!
//! # Role
//!
//! The association primitive keys on token identity. This registry gives each
//! object a stable string → token mapping, so string keys behave as if the
//! primitive were content-keyed. The registry itself lives in the object's
//! store as an ordinary retained entry under a reserved token, which couples
//! its lifetime to the host exactly like any other association.
//!
//! # Invariants
//!
//! - A string key maps to the same token for the lifetime of the registry
//!   (token stability); repeated sets through the same string overwrite one
//!   entry instead of orphaning it.
//! - `resolve_or_create` performs its read-modify-write under a single lock
//!   acquisition with exactly one insertion, so concurrent interns of
//!   distinct new keys cannot lose each other's mapping.

use parking_lot::Mutex;
use rustc_hash::FxHashMap as HashMap;

use crate::token::AssocToken;

/// String key → token mapping for one host object.
#[derive(Default)]
pub(crate) struct NameRegistry {
	names: Mutex<HashMap<String, AssocToken>>,
}

impl NameRegistry {
	/// Returns the token for `key`, allocating and recording one if absent.
	pub(crate) fn resolve_or_create(&self, key: &str) -> AssocToken {
		let mut names = self.names.lock();
		if let Some(token) = names.get(key) {
			return *token;
		}
		let token = AssocToken::new();
		names.insert(key.to_owned(), token);
		token
	}

	/// Pure lookup; a miss allocates nothing.
	pub(crate) fn lookup(&self, key: &str) -> Option<AssocToken> {
		self.names.lock().get(key).copied()
	}
}
