//! Walks an athlete through consent, a cached profile read, and a transparent token refresh
//! against a local mock of the fitness API.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use tracing_subscriber::EnvFilter;
// self
use fitness_gateway::{
	config::GatewayConfig,
	gateway::{ActivityQuery, Gateway},
	store::MemoryStore,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
		)
		.init();

	let server = MockServer::start_async().await;
	let consent = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes("grant_type=authorization_code");
			then.status(200).header("content-type", "application/json").body(
				"{\"token_type\":\"Bearer\",\"access_token\":\"demo-access\",\
				 \"refresh_token\":\"demo-refresh\",\"expires_in\":21600,\
				 \"athlete\":{\"id\":3329857}}",
			);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes("grant_type=refresh_token");
			then.status(200).header("content-type", "application/json").body(
				"{\"token_type\":\"Bearer\",\"access_token\":\"demo-access-2\",\
				 \"refresh_token\":\"demo-refresh-2\",\"expires_in\":21600}",
			);
		})
		.await;
	let profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v3/athlete");
			then.status(200)
				.header("remaining-quota", "598")
				.header("quota-reset-unix-time", "1700000000")
				.body("{\"id\":3329857,\"firstname\":\"Demo\"}");
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v3/athlete/activities")
				.header("authorization", "Bearer demo-access");
			then.status(401).body("{\"message\":\"Authorization Error\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v3/athlete/activities")
				.header("authorization", "Bearer demo-access-2");
			then.status(200).body("[{\"id\":1,\"name\":\"Morning Run\"}]");
		})
		.await;

	let config = GatewayConfig::builder()
		.api_base(Url::parse(&server.url("/api/v3"))?)
		.token_endpoint(Url::parse(&server.url("/oauth/token"))?)
		.build()?;
	let store = MemoryStore::default();
	let gateway = Gateway::new(config, Arc::new(store.clone()), Arc::new(store), "demo-client")?
		.with_client_secret("demo-secret");
	let record = gateway.exchange_code("demo-code").await?;
	let user_id = record.user_id.to_string();

	println!("Authorized athlete {user_id}.");

	for _ in 0..2 {
		let payload = gateway.athlete(&user_id).await?;

		println!("Profile (cached: {}): {}.", payload.cached, payload.body);
	}

	let activities = gateway.activities(&user_id, ActivityQuery::default()).await?;

	println!("Activities after refresh: {}.", activities.body);
	println!("Quota: {:?}.", gateway.rate_limit());
	println!("Stats: {:?}.", gateway.stats());

	consent.assert_async().await;
	refresh.assert_async().await;
	profile.assert_async().await;

	Ok(())
}
