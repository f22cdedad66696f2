//! Outward-facing HTTP client that attaches the current credential and recovers from expiry.
//!
//! Every call runs through two explicitly composed stages around the transport:
//!
//! 1. **attach** reads the [`CredentialHolder`] once and sets `Authorization: Bearer …` when a
//!    credential is present (requests go out unauthenticated otherwise), remembering the holder
//!    generation it used.
//! 2. **recover** inspects the response. Anything but `401 Unauthorized` is returned unchanged. A
//!    first 401 is handed to the [`RefreshCoordinator`], which either replays the request right
//!    away, suspends it until the single in-flight renewal settles, or rejects it. A 401 on the
//!    replay is terminal.

// crates.io
use ::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, Claims, CredentialHolder},
	config::ClientConfig,
	coordinator::{Admission, LogoutHook, RefreshCoordinator},
	error::ConfigError,
	http::{ApiRequest, ApiResponse, HttpRequest, HttpResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	renewal::{CredentialRenewer, HttpRenewalClient},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestAuthClient = AuthClient<ReqwestTransport>;

/// What the recover stage decided for a response.
enum Recovery {
	/// Hand the response to the caller.
	Done(ApiResponse),
	/// Run the request again with whatever credential is now current.
	Replay,
}

/// Request dispatcher shared by every caller.
///
/// Cloning is cheap; clones share the transport, credential holder, and coordinator, so one
/// client constructed at startup can be handed to every call site.
pub struct AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	config: Arc<ClientConfig>,
	transport: Arc<T>,
	holder: Arc<CredentialHolder>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client whose renewal client shares `transport` (and therefore its cookie jar).
	pub fn with_transport(
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let transport = transport.into();
		let renewer: Arc<dyn CredentialRenewer> =
			Arc::new(HttpRenewalClient::<T>::new(&config, transport.clone())?);

		Ok(Self::with_parts(config, transport, renewer))
	}

	/// Creates a client from explicit parts, e.g. a custom renewer.
	pub fn with_parts(
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
		renewer: Arc<dyn CredentialRenewer>,
	) -> Self {
		let holder = Arc::new(CredentialHolder::default());
		let coordinator =
			Arc::new(RefreshCoordinator::new(holder.clone(), renewer, config.renewal_timeout));

		Self { config: Arc::new(config), transport: transport.into(), holder, coordinator }
	}

	/// Registers a callback run once per failed renewal, after the credential was cleared.
	pub fn on_logout<F>(&self, hook: F)
	where
		F: 'static + Fn(&crate::error::RenewalError) + Send + Sync,
	{
		let hook: LogoutHook = Arc::new(hook);

		self.coordinator.set_logout_hook(hook);
	}

	/// Client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Credential holder backing this client.
	pub fn holder(&self) -> &Arc<CredentialHolder> {
		&self.holder
	}

	/// Refresh coordinator backing this client.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		&self.coordinator
	}

	/// Stores the credential obtained from a successful login.
	pub fn sign_in(&self, credential: AccessCredential) {
		self.holder.set(Some(credential));
	}

	/// Forgets the current credential.
	pub fn sign_out(&self) {
		self.holder.clear();
	}

	/// Renews the credential from the session cookie, joining any renewal already in flight.
	pub async fn refresh(&self) -> Result<AccessCredential> {
		Ok(self.coordinator.refresh().await?)
	}

	/// Current credential, if any.
	pub fn credential(&self) -> Option<AccessCredential> {
		self.holder.get()
	}

	/// Claims of the current credential; empty when absent or malformed.
	pub fn claims(&self) -> Claims {
		self.holder.claims()
	}

	/// Validated subject identifier of the current credential.
	pub fn subject_id(&self) -> Option<uuid::Uuid> {
		self.holder.subject_id()
	}

	/// Roles of the current credential.
	pub fn roles(&self) -> Vec<String> {
		self.holder.roles()
	}

	/// Sends a `GET` request for `path`.
	pub async fn get(&self, path: &str) -> Result<ApiResponse> {
		self.send(ApiRequest::get(path)).await
	}

	/// Sends `request`, renewing and replaying transparently on credential expiry.
	///
	/// Callers observe either the backend response (whatever its status, except a recovered
	/// 401), [`Error::RenewalFailed`], [`Error::TerminalAuthorizationFailure`], or an unrelated
	/// transport/configuration error. Dropping the returned future while it waits on a renewal
	/// removes the request from the queue without disturbing the renewal.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::dispatch(request.method.as_str(), &request.path);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.dispatch(request)).await;

		obs::record_flow_result(KIND, &result);

		result
	}

	async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		self.renew_if_expiring().await?;

		let url = self.config.endpoint(&request.path)?;

		loop {
			let (outgoing, generation) = self.attach(&request, &url)?;
			let response = self.transport.execute(outgoing).await?;

			match self.recover(&request, &url, generation, response).await? {
				Recovery::Done(response) => return Ok(response),
				Recovery::Replay => request.mark_retried(),
			}
		}
	}

	/// Pre-call stage: builds the transport request with the current credential attached.
	fn attach(&self, request: &ApiRequest, url: &Url) -> Result<(HttpRequest, u64)> {
		let snapshot = self.holder.snapshot();
		let mut outgoing = request.to_http_request(url)?;

		if let Some(credential) = &snapshot.credential {
			let mut value = HeaderValue::from_str(&credential.bearer())
				.map_err(|e| ConfigError::HttpRequest(e.into()))?;

			value.set_sensitive(true);
			outgoing.headers_mut().insert(AUTHORIZATION, value);
		}

		Ok((outgoing, snapshot.generation))
	}

	/// Post-call stage: passes responses through or recovers from an expired credential.
	async fn recover(
		&self,
		request: &ApiRequest,
		url: &Url,
		generation: u64,
		response: HttpResponse,
	) -> Result<Recovery> {
		if response.status() != StatusCode::UNAUTHORIZED {
			return Ok(Recovery::Done(response.into()));
		}

		let description = format!("{} {}", request.method, url);

		if request.is_retried() {
			obs::terminal_authorization_failure(&description);

			return Err(Error::TerminalAuthorizationFailure {
				method: request.method.to_string(),
				url: url.to_string(),
			});
		}

		match self.coordinator.admit(generation, description) {
			Admission::Replay => Ok(Recovery::Replay),
			Admission::Reject(err) => Err(err.into()),
			Admission::Wait(waiter) => {
				waiter.settled().await?;

				Ok(Recovery::Replay)
			},
		}
	}

	async fn renew_if_expiring(&self) -> Result<()> {
		let Some(window) = self.config.preemptive_window else {
			return Ok(());
		};
		let Some(credential) = self.holder.get() else {
			return Ok(());
		};

		let claims = credential.claims();

		// A credential issued for no longer than the window would be renewed on every call.
		if claims.lifetime().is_some_and(|lifetime| lifetime <= window) {
			return Ok(());
		}
		if claims.expires_within(OffsetDateTime::now_utc(), window) {
			self.coordinator.refresh().await?;
		}

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl AuthClient<ReqwestTransport> {
	/// Creates a client with its own cookie-aware reqwest transport.
	pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
		Self::with_transport(config, ReqwestTransport::new()?)
	}
}
impl<T> Clone for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			holder: self.holder.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("authenticated", &self.holder.is_set())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}
