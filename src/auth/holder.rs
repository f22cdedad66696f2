//! In-memory slot holding the current access credential.

// crates.io
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, Claims},
};

/// Point-in-time view of the holder: the credential (if any) and the generation it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialSnapshot {
	/// Credential current at the time of the snapshot.
	pub credential: Option<AccessCredential>,
	/// Monotonic counter bumped on every write to the holder.
	pub generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
	credential: Option<AccessCredential>,
	generation: u64,
}

/// Single source of truth for the current access credential.
///
/// Nothing is persisted; a fresh holder starts empty. Every write (including clearing) bumps the
/// generation so the dispatcher can tell whether a rejected request was sent with a credential
/// that has since been replaced.
#[derive(Debug, Default)]
pub struct CredentialHolder(RwLock<Slot>);
impl CredentialHolder {
	/// Returns the current credential, if any.
	pub fn get(&self) -> Option<AccessCredential> {
		self.0.read().credential.clone()
	}

	/// Replaces (or clears, with `None`) the current credential.
	pub fn set(&self, credential: Option<AccessCredential>) {
		let mut slot = self.0.write();

		slot.credential = credential;
		slot.generation += 1;
	}

	/// Clears the current credential.
	pub fn clear(&self) {
		self.set(None);
	}

	/// Returns `true` when a credential is present.
	pub fn is_set(&self) -> bool {
		self.0.read().credential.is_some()
	}

	/// Returns the current generation.
	pub fn generation(&self) -> u64 {
		self.0.read().generation
	}

	/// Reads the credential and generation under a single lock.
	pub fn snapshot(&self) -> CredentialSnapshot {
		let slot = self.0.read();

		CredentialSnapshot { credential: slot.credential.clone(), generation: slot.generation }
	}

	/// Decodes the claims of the current credential; empty when absent or malformed.
	pub fn claims(&self) -> Claims {
		self.get().map(|credential| credential.claims()).unwrap_or_default()
	}

	/// Returns the validated subject identifier of the current credential.
	pub fn subject_id(&self) -> Option<Uuid> {
		self.claims().subject_id()
	}

	/// Returns the roles of the current credential.
	pub fn roles(&self) -> Vec<String> {
		self.claims().roles
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn fresh_holder_is_empty() {
		let holder = CredentialHolder::default();

		assert!(holder.get().is_none());
		assert!(!holder.is_set());
		assert_eq!(holder.generation(), 0);
	}

	#[test]
	fn every_write_bumps_generation() {
		let holder = CredentialHolder::default();

		holder.set(Some(AccessCredential::new("a")));

		assert_eq!(holder.get(), Some(AccessCredential::new("a")));
		assert_eq!(holder.generation(), 1);

		holder.set(Some(AccessCredential::new("b")));

		let snapshot = holder.snapshot();

		assert_eq!(snapshot.credential, Some(AccessCredential::new("b")));
		assert_eq!(snapshot.generation, 2);

		holder.clear();

		assert!(holder.get().is_none());
		assert_eq!(holder.generation(), 3);
	}

	#[test]
	fn claim_accessors_degrade_without_a_valid_credential() {
		let holder = CredentialHolder::default();

		assert!(holder.claims().is_empty());
		assert_eq!(holder.subject_id(), None);
		assert!(holder.roles().is_empty());

		holder.set(Some(AccessCredential::new("not.a.jwt")));

		assert_eq!(holder.subject_id(), None);
		assert!(holder.roles().is_empty());
	}
}
