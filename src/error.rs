//! Crate-level error types shared by the dispatcher, coordinator, and renewal client.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error observed by callers of the dispatcher.
///
/// Callers only ever see a transport or configuration problem, a failed renewal, or a terminal
/// authorization failure; the single-flight machinery itself never leaks through this type.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The session could not be renewed; treat as a full logout.
	#[error("Session renewal failed.")]
	RenewalFailed(#[from] RenewalError),

	/// The request was rejected as unauthorized even after being replayed with a renewed
	/// credential.
	#[error("Request `{method} {url}` was rejected as unauthorized after renewal.")]
	TerminalAuthorizationFailure {
		/// HTTP method of the rejected request.
		method: String,
		/// Absolute URL of the rejected request.
		url: String,
	},
	/// Response body could not be decoded into the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}
impl Error {
	/// Returns `true` when the surrounding application should treat this error as a logout.
	pub fn is_session_end(&self) -> bool {
		matches!(self, Self::RenewalFailed(_))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] ::http::Error),
	/// Base URL uses a scheme other than `http`/`https`.
	#[error("Base URL scheme `{scheme}` is not supported.")]
	UnsupportedScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// Base URL cannot have paths joined onto it.
	#[error("Base URL `{url}` cannot be used as a base.")]
	CannotBeABase {
		/// Offending URL.
		url: String,
	},
	/// A request path could not be resolved against the base URL.
	#[error("Path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Serialize(#[from] serde_json::Error),
	/// Renewal timeout must be non-zero.
	#[error("Renewal timeout must be greater than zero.")]
	ZeroRenewalTimeout,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Reasons a credential renewal failed.
///
/// Values are cloned to every request waiting on the same renewal, so sources are flattened
/// into messages.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RenewalError {
	/// Backend rejected the session artifact (expired, revoked, or missing).
	#[error("Renewal endpoint rejected the session with HTTP {status}.")]
	Rejected {
		/// HTTP status code returned by the renewal endpoint.
		status: u16,
	},
	/// Renewal response did not carry a usable `accessToken`.
	#[error("Renewal response is missing an access token.")]
	MissingAccessToken,
	/// Renewal response body was not the expected JSON envelope.
	#[error("Renewal response is malformed: {message}.")]
	MalformedResponse {
		/// Parser-supplied message.
		message: String,
	},
	/// Renewal request never produced a response.
	#[error("Renewal request failed: {message}.")]
	Transport {
		/// Transport-supplied message.
		message: String,
	},
	/// Renewal did not settle within the configured timeout.
	#[error("Renewal timed out after {after:?}.")]
	TimedOut {
		/// Configured timeout.
		after: std::time::Duration,
	},
	/// The credential was cleared while the request was in flight.
	#[error("Session ended while the request was in flight.")]
	SessionEnded,
	/// The renewal task stopped before settling (runtime shutdown or a panicking renewer).
	#[error("Renewal was abandoned before it settled.")]
	Abandoned,
}
impl From<TransportError> for RenewalError {
	fn from(e: TransportError) -> Self {
		let mut message = e.to_string();

		if let Some(source) = StdError::source(&e) {
			message.push_str(": ");
			message.push_str(&source.to_string());
		}

		Self::Transport { message }
	}
}
