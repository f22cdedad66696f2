//! Demonstrates a session that expires mid-use: three concurrent calls hit a 401, a single
//! cookie-backed renewal runs, and every call is replayed with the renewed credential.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use auth_relay::{
	auth::AccessCredential, config::ClientConfig, dispatcher::AuthClient, http::ApiRequest,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(200)
				.header("content-type", "application/json")
				.header("set-cookie", "session=demo-session; Path=/; HttpOnly")
				.body("{\"accessToken\":\"expired-access\"}");
		})
		.await;
	let stale_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/courses").header("authorization", "Bearer expired-access");
			then.status(401);
		})
		.await;
	let fresh_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/courses").header("authorization", "Bearer renewed-access");
			then.status(200)
				.header("content-type", "application/json")
				.body("[{\"id\":7,\"title\":\"Operating Systems\"}]");
		})
		.await;
	let renewal_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh").header("cookie", "session=demo-session");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"accessToken\":\"renewed-access\"}");
		})
		.await;
	let config = ClientConfig::builder(Url::parse(&server.base_url())?).build()?;
	let client = AuthClient::new(config)?;

	client.on_logout(|err| eprintln!("Session ended: {err}."));

	let login = client
		.send(ApiRequest::post("auth/login").json(&serde_json::json!({
			"username": "demo",
			"password": "demo",
		}))?)
		.await?
		.json::<serde_json::Value>()?;
	let access = login["accessToken"].as_str().unwrap_or_default().to_owned();

	client.sign_in(AccessCredential::new(access));

	let (first, second, third) =
		tokio::join!(client.get("courses"), client.get("courses"), client.get("courses"));

	for response in [first?, second?, third?] {
		println!("HTTP {}: {}", response.status(), response.text());
	}

	println!("Renewals performed: {}.", client.coordinator().metrics().attempts());

	login_mock.assert_async().await;
	stale_mock.assert_calls_async(3).await;
	fresh_mock.assert_calls_async(3).await;
	renewal_mock.assert_async().await;

	Ok(())
}
