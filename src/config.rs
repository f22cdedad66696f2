//! Client configuration shared by the dispatcher and the renewal client.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Validated client configuration.
///
/// The base URL is supplied once at startup and shared by every request path, including the
/// renewal endpoint. Deserialization runs the same validation as [`ClientConfigBuilder::build`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawClientConfig")]
pub struct ClientConfig {
	/// Backend base URL, always ending with `/`.
	pub base_url: Url,
	/// Path of the session-renewal endpoint, relative to the base URL.
	pub renewal_path: String,
	/// Upper bound on a single renewal call.
	pub renewal_timeout: StdDuration,
	/// Renew ahead of sending when the credential expires within this window.
	pub preemptive_window: Option<Duration>,
}
impl ClientConfig {
	/// Default renewal path.
	pub const DEFAULT_RENEWAL_PATH: &'static str = "auth/refresh";
	/// Default renewal timeout.
	pub const DEFAULT_RENEWAL_TIMEOUT: StdDuration = StdDuration::from_secs(10);

	/// Returns a builder seeded with `base_url` and defaults for everything else.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves `path` against the base URL. Leading slashes are relative to the base path, and
	/// absolute URLs are returned unchanged.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let relative = path.trim_start_matches('/');

		self.base_url
			.join(relative)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}

	/// Absolute URL of the renewal endpoint.
	pub fn renewal_endpoint(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.renewal_path)
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Backend base URL.
	pub base_url: Url,
	/// Renewal endpoint path.
	pub renewal_path: String,
	/// Renewal timeout.
	pub renewal_timeout: StdDuration,
	/// Optional preemptive renewal window.
	pub preemptive_window: Option<Duration>,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			renewal_path: ClientConfig::DEFAULT_RENEWAL_PATH.into(),
			renewal_timeout: ClientConfig::DEFAULT_RENEWAL_TIMEOUT,
			preemptive_window: None,
		}
	}

	/// Overrides the renewal endpoint path.
	pub fn renewal_path(mut self, path: impl Into<String>) -> Self {
		self.renewal_path = path.into();

		self
	}

	/// Overrides the renewal timeout.
	pub fn renewal_timeout(mut self, timeout: StdDuration) -> Self {
		self.renewal_timeout = timeout;

		self
	}

	/// Enables preemptive renewal; negative windows are clamped to zero.
	///
	/// A request renews before it is sent when its credential's `exp` claim falls within
	/// `window`. Credentials whose `iat`..`exp` span is no longer than `window` are never renewed
	/// ahead of time, since a fresh one would already be inside the window; they still recover
	/// through the regular `401` path. Keep the window well below the backend's token lifetime.
	pub fn preemptive_window(mut self, window: Duration) -> Self {
		self.preemptive_window = Some(if window.is_negative() { Duration::ZERO } else { window });

		self
	}

	/// Validates the builder and produces a [`ClientConfig`].
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut base_url = self.base_url;

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { scheme: base_url.scheme().to_owned() });
		}
		if base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeABase { url: base_url.to_string() });
		}
		if self.renewal_timeout.is_zero() {
			return Err(ConfigError::ZeroRenewalTimeout);
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		let config = ClientConfig {
			base_url,
			renewal_path: self.renewal_path,
			renewal_timeout: self.renewal_timeout,
			preemptive_window: self.preemptive_window,
		};

		config.renewal_endpoint()?;

		Ok(config)
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClientConfig {
	base_url: Url,
	#[serde(default)]
	renewal_path: Option<String>,
	#[serde(default)]
	renewal_timeout_secs: Option<u64>,
	#[serde(default)]
	preemptive_window_secs: Option<i64>,
}
impl TryFrom<RawClientConfig> for ClientConfig {
	type Error = ConfigError;

	fn try_from(raw: RawClientConfig) -> Result<Self, Self::Error> {
		let mut builder = ClientConfig::builder(raw.base_url);

		if let Some(path) = raw.renewal_path {
			builder = builder.renewal_path(path);
		}
		if let Some(secs) = raw.renewal_timeout_secs {
			builder = builder.renewal_timeout(StdDuration::from_secs(secs));
		}
		if let Some(secs) = raw.preemptive_window_secs {
			builder = builder.preemptive_window(Duration::seconds(secs));
		}

		builder.build()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse config fixture URL.")
	}

	#[test]
	fn base_path_is_treated_as_a_directory() {
		let config = ClientConfig::builder(url("https://lms.example.com/api"))
			.build()
			.expect("Config with an API prefix should build.");

		assert_eq!(config.base_url.as_str(), "https://lms.example.com/api/");
		assert_eq!(
			config.endpoint("/courses/7").expect("Course path should resolve.").as_str(),
			"https://lms.example.com/api/courses/7"
		);
		assert_eq!(
			config.renewal_endpoint().expect("Renewal path should resolve.").as_str(),
			"https://lms.example.com/api/auth/refresh"
		);
		assert_eq!(
			config.endpoint("https://cdn.example.com/f.png").expect("Absolute URL should pass.").as_str(),
			"https://cdn.example.com/f.png"
		);
	}

	#[test]
	fn builder_rejects_invalid_settings() {
		assert!(matches!(
			ClientConfig::builder(url("ftp://lms.example.com")).build(),
			Err(ConfigError::UnsupportedScheme { .. })
		));
		assert!(matches!(
			ClientConfig::builder(url("https://lms.example.com"))
				.renewal_timeout(StdDuration::ZERO)
				.build(),
			Err(ConfigError::ZeroRenewalTimeout)
		));

		let config = ClientConfig::builder(url("https://lms.example.com"))
			.preemptive_window(Duration::seconds(-5))
			.build()
			.expect("Negative windows should be clamped, not rejected.");

		assert_eq!(config.preemptive_window, Some(Duration::ZERO));
	}

	#[test]
	fn deserialization_applies_defaults_and_validation() {
		let config: ClientConfig = serde_json::from_str(
			r#"{"baseUrl":"http://localhost:5000","renewalTimeoutSecs":3,"preemptiveWindowSecs":30}"#,
		)
		.expect("Config JSON should deserialize.");

		assert_eq!(config.renewal_path, ClientConfig::DEFAULT_RENEWAL_PATH);
		assert_eq!(config.renewal_timeout, StdDuration::from_secs(3));
		assert_eq!(config.preemptive_window, Some(Duration::seconds(30)));
		assert!(
			serde_json::from_str::<ClientConfig>(r#"{"baseUrl":"mailto:someone@example.com"}"#)
				.is_err()
		);
	}
}
