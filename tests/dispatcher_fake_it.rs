#![cfg(feature = "reqwest")]

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use tokio::sync::Notify;
// self
use auth_relay::{
	_preludet::*,
	auth::AccessCredential,
	config::ClientConfig,
	dispatcher::AuthClient,
	error::RenewalError,
	http::{HttpRequest, HttpTransport, TransportFuture},
	http_types::{Response, StatusCode, header::AUTHORIZATION},
	renewal::{CredentialRenewer, RenewalFuture},
};

const BASE_URL: &str = "https://lms.example.com/api/";

/// Accepts `/public` paths and `Bearer B`; everything else is unauthorized.
#[derive(Default)]
struct RecordingTransport {
	seen: Mutex<Vec<(String, Option<String>)>>,
}
impl RecordingTransport {
	fn seen(&self) -> Vec<(String, Option<String>)> {
		self.seen.lock().clone()
	}

	fn sent_with(&self, bearer: &str) -> usize {
		self.seen.lock().iter().filter(|(_, auth)| auth.as_deref() == Some(bearer)).count()
	}
}
impl HttpTransport for RecordingTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let path = request.uri().path().to_owned();
		let authorization = request
			.headers()
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);
		let status = if path.ends_with("/public") || authorization.as_deref() == Some("Bearer B") {
			StatusCode::OK
		} else {
			StatusCode::UNAUTHORIZED
		};

		self.seen.lock().push((path, authorization));

		Box::pin(async move {
			Ok(Response::builder()
				.status(status)
				.body(Vec::new())
				.expect("Static fake response should build."))
		})
	}
}

struct FakeRenewer {
	calls: AtomicUsize,
	gate: Option<Notify>,
}
impl FakeRenewer {
	fn open() -> Arc<Self> {
		Arc::new(Self { calls: AtomicUsize::new(0), gate: None })
	}

	fn gated() -> Arc<Self> {
		Arc::new(Self { calls: AtomicUsize::new(0), gate: Some(Notify::new()) })
	}

	fn release(&self) {
		if let Some(gate) = &self.gate {
			gate.notify_one();
		}
	}

	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl CredentialRenewer for FakeRenewer {
	fn renew(&self) -> RenewalFuture<'_> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if let Some(gate) = &self.gate {
				gate.notified().await;
			}

			Ok::<_, RenewalError>(AccessCredential::new("B"))
		})
	}
}

fn build_client(
	renewer: Arc<FakeRenewer>,
	preemptive_window: Option<Duration>,
) -> (AuthClient<RecordingTransport>, Arc<RecordingTransport>) {
	let mut builder =
		ClientConfig::builder(Url::parse(BASE_URL).expect("Fake base URL should parse."));

	if let Some(window) = preemptive_window {
		builder = builder.preemptive_window(window);
	}

	let config = builder.build().expect("Fake client configuration should be valid.");
	let transport = Arc::new(RecordingTransport::default());
	let client = AuthClient::with_parts(config, transport.clone(), renewer);

	(client, transport)
}

#[tokio::test]
async fn requests_without_a_credential_go_out_unauthenticated() {
	let renewer = FakeRenewer::open();
	let (client, transport) = build_client(renewer.clone(), None);
	let response = client.get("public").await.expect("Public endpoint should respond.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(transport.seen(), vec![("/api/public".to_string(), None)]);
	assert_eq!(renewer.calls(), 0);
}

#[tokio::test]
async fn aborted_caller_is_never_replayed() {
	let renewer = FakeRenewer::gated();
	let (client, transport) = build_client(renewer.clone(), None);

	client.sign_in(AccessCredential::new("A"));

	let kept = tokio::spawn({
		let client = client.clone();

		async move { client.get("courses").await }
	});
	let aborted = tokio::spawn({
		let client = client.clone();

		async move { client.get("quizzes").await }
	});

	while client.coordinator().pending() < 2 {
		tokio::task::yield_now().await;
	}

	aborted.abort();

	let join = aborted.await.expect_err("Aborted caller should not complete.");

	assert!(join.is_cancelled());
	assert_eq!(client.coordinator().pending(), 1);

	renewer.release();

	let response = kept
		.await
		.expect("Kept caller should not panic.")
		.expect("Kept caller should be replayed after renewal.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(renewer.calls(), 1);
	assert_eq!(transport.sent_with("Bearer A"), 2);
	assert_eq!(transport.sent_with("Bearer B"), 1);
	assert_eq!(client.coordinator().metrics().cancelled(), 1);
	assert_eq!(client.coordinator().metrics().released(), 1);
}

#[tokio::test]
async fn credential_near_expiry_is_renewed_before_sending() {
	let renewer = FakeRenewer::open();
	let (client, transport) = build_client(renewer.clone(), Some(Duration::seconds(60)));
	let token = encode_test_jwt(&serde_json::json!({
		"sub": "3f2504e0-4f89-11d3-9a0c-0305e82c3301",
		"exp": OffsetDateTime::now_utc().unix_timestamp() + 10,
	}));

	client.sign_in(AccessCredential::new(token));

	let response = client.get("grades").await.expect("Renewed request should succeed.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(renewer.calls(), 1);
	assert_eq!(transport.seen(), vec![("/api/grades".to_string(), Some("Bearer B".to_string()))]);
}

#[tokio::test]
async fn credential_far_from_expiry_is_sent_as_is() {
	let renewer = FakeRenewer::open();
	let (client, transport) = build_client(renewer.clone(), Some(Duration::seconds(60)));
	let token = encode_test_jwt(&serde_json::json!({
		"exp": OffsetDateTime::now_utc().unix_timestamp() + 3_600,
	}));

	client.sign_in(AccessCredential::new(token.clone()));

	let response = client.get("public").await.expect("Public endpoint should respond.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(renewer.calls(), 0);
	assert_eq!(transport.seen(), vec![("/api/public".to_string(), Some(format!("Bearer {token}")))]);
}

#[tokio::test]
async fn claims_follow_the_current_credential() {
	let (client, _) = build_client(FakeRenewer::open(), None);

	assert!(client.claims().is_empty());
	assert!(client.subject_id().is_none());
	assert!(client.roles().is_empty());

	client.sign_in(AccessCredential::new(encode_test_jwt(&serde_json::json!({
		"sub": "3f2504e0-4f89-11d3-9a0c-0305e82c3301",
		"role": ["instructor", "admin", "instructor"],
	}))));

	assert_eq!(
		client.subject_id(),
		Some(
			uuid::Uuid::parse_str("3f2504e0-4f89-11d3-9a0c-0305e82c3301")
				.expect("Literal UUID should parse.")
		)
	);
	assert_eq!(client.roles(), vec!["instructor".to_string(), "admin".to_string()]);
	assert!(client.claims().has_role("admin"));

	client.sign_in(AccessCredential::new(encode_test_jwt(&serde_json::json!({
		"sub": "not-a-guid",
		"roles": "student",
	}))));

	assert!(client.subject_id().is_none());
	assert_eq!(client.claims().subject.as_deref(), Some("not-a-guid"));
	assert_eq!(client.roles(), vec!["student".to_string()]);

	client.sign_out();

	assert!(client.claims().is_empty());
}

#[tokio::test]
async fn credential_shorter_lived_than_the_window_is_not_renewed_ahead() {
	let renewer = FakeRenewer::open();
	let (client, transport) = build_client(renewer.clone(), Some(Duration::seconds(60)));
	let now = OffsetDateTime::now_utc().unix_timestamp();
	let token = encode_test_jwt(&serde_json::json!({ "iat": now, "exp": now + 30 }));

	client.sign_in(AccessCredential::new(token.clone()));

	for _ in 0..3 {
		let response = client.get("public").await.expect("Public endpoint should respond.");

		assert_eq!(response.status(), StatusCode::OK);
	}

	assert_eq!(renewer.calls(), 0);
	assert_eq!(transport.sent_with(&format!("Bearer {token}")), 3);
}
