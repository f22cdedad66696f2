//! Authenticated HTTP access layer with single-flight bearer renewal. Attach the current
//! credential to every request, catch expiry, renew exactly once, and replay every waiting call.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod obs;
pub mod renewal;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::{config::ClientConfig, dispatcher::AuthClient, http::ReqwestTransport};

	/// Builds a reqwest transport with a private cookie jar, matching the production client.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.cookie_store(true)
			.build()
			.expect("Failed to build cookie-aware Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs an [`AuthClient`] pointed at `base_url` using the default renewal path and a
	/// short renewal timeout.
	pub fn build_reqwest_test_client(base_url: &str) -> AuthClient<ReqwestTransport> {
		let config = ClientConfig::builder(
			Url::parse(base_url).expect("Mock server base URL should parse successfully."),
		)
		.renewal_timeout(std::time::Duration::from_secs(2))
		.build()
		.expect("Test client configuration should be valid.");

		AuthClient::with_transport(config, test_reqwest_transport())
			.expect("Test client should build from a valid configuration.")
	}

	/// Encodes an unsigned JWT carrying `claims` so claim decoding can be exercised without a
	/// signing key.
	pub fn encode_test_jwt(claims: &serde_json::Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

		format!("{header}.{payload}.signature")
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
