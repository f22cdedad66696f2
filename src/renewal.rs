//! Session renewal: exchanges the ambient session cookie for a fresh access credential.
//!
//! [`HttpRenewalClient`] talks to the transport directly. It never passes through the
//! dispatcher, so an unauthorized renewal response is a plain [`RenewalError::Rejected`] and can
//! never start a nested renewal.

// crates.io
use ::http::{
	HeaderValue, Method,
	header::{ACCEPT, AUTHORIZATION},
};
// self
use crate::{
	_prelude::*,
	auth::AccessCredential,
	config::ClientConfig,
	error::{ConfigError, RenewalError},
	http::{HttpRequest, HttpTransport},
};

/// Boxed future returned by [`CredentialRenewer::renew`].
pub type RenewalFuture<'a> =
	Pin<Box<dyn Future<Output = Result<AccessCredential, RenewalError>> + 'a + Send>>;

/// Anything able to mint a new access credential from the current session.
pub trait CredentialRenewer
where
	Self: 'static + Send + Sync,
{
	/// Performs a single renewal attempt.
	fn renew(&self) -> RenewalFuture<'_>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewalEnvelope {
	#[serde(default)]
	access_token: Option<String>,
}

/// Renewal client that `POST`s to the configured renewal endpoint.
pub struct HttpRenewalClient<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	endpoint: Url,
}
impl<T> HttpRenewalClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a renewal client for `config`'s renewal endpoint.
	pub fn new(config: &ClientConfig, transport: impl Into<Arc<T>>) -> Result<Self, ConfigError> {
		Ok(Self { transport: transport.into(), endpoint: config.renewal_endpoint()? })
	}

	/// Absolute renewal endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	fn build_request(&self) -> Result<HttpRequest, ConfigError> {
		let request = ::http::Request::builder()
			.method(Method::POST)
			.uri(self.endpoint.as_str())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.body(Vec::new())?;

		debug_assert!(!request.headers().contains_key(AUTHORIZATION));

		Ok(request)
	}

	async fn renew_once(&self) -> Result<AccessCredential, RenewalError> {
		let request = self
			.build_request()
			.map_err(|e| RenewalError::Transport { message: e.to_string() })?;
		let response = self.transport.execute(request).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(RenewalError::Rejected { status: status.as_u16() });
		}

		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let envelope: RenewalEnvelope = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| RenewalError::MalformedResponse { message: e.to_string() })?;

		match envelope.access_token {
			Some(token) if !token.trim().is_empty() => Ok(AccessCredential::new(token)),
			_ => Err(RenewalError::MissingAccessToken),
		}
	}
}
impl<T> CredentialRenewer for HttpRenewalClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn renew(&self) -> RenewalFuture<'_> {
		Box::pin(self.renew_once())
	}
}
impl<T> Debug for HttpRenewalClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpRenewalClient").field("endpoint", &self.endpoint.as_str()).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use ::http::StatusCode;
	// self
	use super::*;
	use crate::http::{HttpResponse, TransportFuture};

	struct CannedTransport {
		status: StatusCode,
		body: &'static str,
		seen: Mutex<Vec<HttpRequest>>,
	}
	impl HttpTransport for CannedTransport {
		fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
			self.seen.lock().push(request);

			Box::pin(async move {
				let mut response = HttpResponse::new(self.body.as_bytes().to_vec());

				*response.status_mut() = self.status;

				Ok(response)
			})
		}
	}

	fn client(status: StatusCode, body: &'static str) -> HttpRenewalClient<CannedTransport> {
		let config = ClientConfig::builder(
			Url::parse("https://lms.example.com/api").expect("Fixture URL should parse."),
		)
		.build()
		.expect("Fixture config should build.");

		HttpRenewalClient::new(&config, CannedTransport { status, body, seen: Mutex::new(Vec::new()) })
			.expect("Renewal client should build.")
	}

	#[tokio::test]
	async fn renewal_posts_without_authorization() {
		let renewal = client(StatusCode::OK, r#"{"accessToken":"fresh"}"#);
		let credential = renewal.renew().await.expect("Renewal should succeed.");

		assert_eq!(credential, AccessCredential::new("fresh"));

		let seen = renewal.transport.seen.lock();

		assert_eq!(seen.len(), 1);
		assert_eq!(seen[0].method(), Method::POST);
		assert_eq!(seen[0].uri(), "https://lms.example.com/api/auth/refresh");
		assert!(!seen[0].headers().contains_key(AUTHORIZATION));
	}

	#[tokio::test]
	async fn renewal_failures_are_classified() {
		assert_eq!(
			client(StatusCode::UNAUTHORIZED, "").renew().await,
			Err(RenewalError::Rejected { status: 401 })
		);
		assert_eq!(
			client(StatusCode::OK, r#"{"accessToken":"  "}"#).renew().await,
			Err(RenewalError::MissingAccessToken)
		);
		assert!(matches!(
			client(StatusCode::OK, "not json").renew().await,
			Err(RenewalError::MalformedResponse { .. })
		));
	}
}
