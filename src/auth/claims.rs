//! Soft-failing decoder for the identity claims embedded in an access credential.
//!
//! The credential is treated as a JWT whose payload is read without signature verification;
//! the backend remains the authority on validity. Every public accessor degrades to an empty or
//! absent value when the credential is missing or malformed.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
use uuid::Uuid;
// self
use crate::{_prelude::*, auth::AccessCredential};

const SUBJECT_KEYS: [&str; 3] =
	["sub", "nameid", "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier"];
const ROLE_KEYS: [&str; 3] =
	["role", "roles", "http://schemas.microsoft.com/ws/2008/06/identity/claims/role"];
const CANONICAL_UUID_LEN: usize = 36;

/// Reasons a credential payload could not be decoded.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// The credential does not have the `header.payload.signature` shape.
	#[error("Credential is not a JWT.")]
	NotAJwt,
	/// The payload segment is not valid base64url.
	#[error("Credential payload is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// The payload is not JSON.
	#[error("Credential payload is not valid JSON.")]
	Json(#[from] serde_json::Error),
	/// The payload is JSON but not an object.
	#[error("Credential payload is not a JSON object.")]
	NotAnObject,
}

/// Identity and authorization facts derived from an access credential.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Claims {
	/// Raw subject claim, unvalidated.
	pub subject: Option<String>,
	/// Roles granted to the subject, in token order without duplicates.
	pub roles: Vec<String>,
	/// Issued-at instant.
	pub issued_at: Option<OffsetDateTime>,
	/// Expiry instant.
	pub expires_at: Option<OffsetDateTime>,
}
impl Claims {
	/// Decodes `credential`, returning empty claims when it is malformed.
	pub fn decode(credential: &AccessCredential) -> Self {
		match Self::try_decode(credential.expose()) {
			Ok(claims) => claims,
			Err(_err) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(
					fingerprint = %credential.fingerprint(),
					error = %_err,
					"credential claims are malformed"
				);

				Self::default()
			},
		}
	}

	/// Decodes a raw token, reporting why decoding failed.
	pub fn try_decode(token: &str) -> Result<Self, ClaimsError> {
		let mut segments = token.split('.');
		let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
			_ => return Err(ClaimsError::NotAJwt),
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
		let Value::Object(map) = serde_json::from_slice::<Value>(&bytes)? else {
			return Err(ClaimsError::NotAnObject);
		};

		Ok(Self {
			subject: read_subject(&map),
			roles: read_roles(&map),
			issued_at: read_instant(&map, "iat"),
			expires_at: read_instant(&map, "exp"),
		})
	}

	/// Returns the subject when it is a canonical hyphenated UUID.
	pub fn subject_id(&self) -> Option<Uuid> {
		let subject = self.subject.as_deref()?;

		if subject.len() != CANONICAL_UUID_LEN {
			return None;
		}

		Uuid::try_parse(subject).ok()
	}

	/// Returns `true` if `role` was granted.
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|granted| granted == role)
	}

	/// Returns `true` when nothing could be decoded.
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}

	/// Returns `true` when the expiry claim is at or before `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at <= instant)
	}

	/// Validity span between the issued-at and expiry claims, when both are present.
	pub fn lifetime(&self) -> Option<Duration> {
		Some(self.expires_at? - self.issued_at?)
	}

	/// Returns `true` when the expiry claim falls within `window` of `now`.
	pub fn expires_within(&self, now: OffsetDateTime, window: Duration) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at - now <= window)
	}
}

fn read_subject(map: &Map<String, Value>) -> Option<String> {
	SUBJECT_KEYS
		.iter()
		.filter_map(|key| map.get(*key))
		.find_map(|value| value.as_str())
		.map(str::to_owned)
}

fn read_roles(map: &Map<String, Value>) -> Vec<String> {
	let mut roles = Vec::new();

	for value in ROLE_KEYS.iter().filter_map(|key| map.get(*key)) {
		let found = match value {
			Value::String(role) => vec![role.as_str()],
			Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
			_ => Vec::new(),
		};

		for role in found {
			if !roles.iter().any(|existing| existing == role) {
				roles.push(role.to_owned());
			}
		}
	}

	roles
}

fn read_instant(map: &Map<String, Value>, key: &str) -> Option<OffsetDateTime> {
	let value = map.get(key)?;
	let secs = value.as_i64().or_else(|| value.as_f64().map(|secs| secs as i64))?;

	OffsetDateTime::from_unix_timestamp(secs).ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	use time::macros;
	// self
	use super::*;

	fn jwt(payload: &Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
		let body = URL_SAFE_NO_PAD.encode(payload.to_string());

		format!("{header}.{body}.sig")
	}

	#[test]
	fn decodes_standard_claims() {
		let token = jwt(&json!({
			"sub": "6f1c2a9e-0d4b-4c1e-9a57-3b2d7c8e9f10",
			"roles": ["instructor", "admin"],
			"iat": 1_735_689_600,
			"exp": 1_735_693_200,
		}));
		let claims = Claims::try_decode(&token).expect("Well-formed token should decode.");

		assert_eq!(claims.roles, vec!["instructor".to_string(), "admin".to_string()]);
		assert_eq!(claims.issued_at, Some(macros::datetime!(2025-01-01 00:00 UTC)));
		assert_eq!(claims.expires_at, Some(macros::datetime!(2025-01-01 01:00 UTC)));
		assert_eq!(
			claims.subject_id(),
			Some(
				Uuid::parse_str("6f1c2a9e-0d4b-4c1e-9a57-3b2d7c8e9f10")
					.expect("Fixture UUID should parse.")
			)
		);
		assert!(claims.has_role("admin"));
		assert!(!claims.has_role("student"));
	}

	#[test]
	fn subject_must_be_canonical_uuid() {
		let claims = Claims::try_decode(&jwt(&json!({ "sub": "not-a-guid" })))
			.expect("Token with an opaque subject should still decode.");

		assert_eq!(claims.subject.as_deref(), Some("not-a-guid"));
		assert_eq!(claims.subject_id(), None);

		let simple = Claims::try_decode(&jwt(&json!({ "sub": "6f1c2a9e0d4b4c1e9a573b2d7c8e9f10" })))
			.expect("Token with a hyphenless subject should decode.");

		assert_eq!(simple.subject_id(), None);
	}

	#[test]
	fn reads_dotnet_claim_names_and_single_role_strings() {
		let claims = Claims::try_decode(&jwt(&json!({
			"http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier":
				"6f1c2a9e-0d4b-4c1e-9a57-3b2d7c8e9f10",
			"http://schemas.microsoft.com/ws/2008/06/identity/claims/role": "student",
			"role": ["student", "spectator"],
		})))
		.expect("Token with .NET claim names should decode.");

		assert!(claims.subject_id().is_some());
		assert_eq!(claims.roles, vec!["student".to_string(), "spectator".to_string()]);
	}

	#[test]
	fn malformed_credentials_decode_to_empty_claims() {
		for raw in ["", "opaque", "a.%%%.c", "a.bm90LWpzb24.c", "a.WzEsMl0.c"] {
			let claims = Claims::decode(&AccessCredential::new(raw));

			assert!(claims.is_empty(), "`{raw}` should decode to empty claims.");
			assert_eq!(claims.subject_id(), None);
			assert!(claims.roles.is_empty());
		}

		assert!(matches!(Claims::try_decode("a.WzEsMl0.c"), Err(ClaimsError::NotAnObject)));
		assert!(matches!(Claims::try_decode("opaque"), Err(ClaimsError::NotAJwt)));

		let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": "x" }).to_string());

		for raw in [format!("a.{payload}.c.d"), format!("a.{payload}.c.d.e")] {
			assert!(
				matches!(Claims::try_decode(&raw), Err(ClaimsError::NotAJwt)),
				"`{raw}` has more than three segments."
			);
			assert!(Claims::decode(&AccessCredential::new(raw)).is_empty());
		}
		assert!(Claims::try_decode(&format!("a.{payload}.c")).is_ok());
	}

	#[test]
	fn expiry_helpers_compare_against_now() {
		let claims = Claims {
			expires_at: Some(macros::datetime!(2025-01-01 01:00 UTC)),
			..Claims::default()
		};

		assert!(!claims.is_expired_at(macros::datetime!(2025-01-01 00:59 UTC)));
		assert!(claims.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC)));
		assert!(claims.expires_within(macros::datetime!(2025-01-01 00:59 UTC), Duration::minutes(5)));
		assert!(
			!claims.expires_within(macros::datetime!(2025-01-01 00:30 UTC), Duration::minutes(5))
		);
		assert!(!Claims::default().expires_within(OffsetDateTime::now_utc(), Duration::hours(1)));
		assert_eq!(claims.lifetime(), None);

		let issued = Claims {
			issued_at: Some(macros::datetime!(2025-01-01 00:00 UTC)),
			..claims
		};

		assert_eq!(issued.lifetime(), Some(Duration::hours(1)));
	}
}
