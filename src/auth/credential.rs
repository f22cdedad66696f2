//! Redacted bearer credential wrapper.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::Claims};

/// Short-lived bearer credential attached to outgoing requests.
///
/// The wrapper keeps the raw token out of `Debug`/`Display` output; logs should use
/// [`AccessCredential::fingerprint`] instead.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential(String);
impl AccessCredential {
	/// Wraps a raw bearer token.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns the `Authorization` header value for this credential.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}

	/// Returns a short, stable hex fingerprint safe to include in logs.
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());

		digest.iter().take(6).map(|byte| format!("{byte:02x}")).collect()
	}

	/// Decodes the embedded claims; malformed credentials yield empty claims.
	pub fn claims(&self) -> Claims {
		Claims::decode(self)
	}
}
impl AsRef<str> for AccessCredential {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessCredential").field(&"<redacted>").finish()
	}
}
impl Display for AccessCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
