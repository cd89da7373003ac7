//! Shared fixtures for the gateway integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	future::Future,
	io,
	pin::Pin,
	sync::{Arc, Mutex},
};
// crates.io
use time::{Duration, OffsetDateTime};
// self
use fitness_gateway::{
	auth::{TokenRecord, UserId},
	config::{GatewayConfig, GatewayConfigBuilder},
	error::TransportError,
	gateway::Gateway,
	http::{ApiHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::{
		TransportErrorMapper,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{Response, StatusCode},
		},
	},
	store::{CredentialStore, MemoryStore},
	url::Url,
};
#[cfg(feature = "reqwest")] use fitness_gateway::gateway::ReqwestGateway;
#[cfg(feature = "reqwest")] use httpmock::MockServer;

pub const USER: &str = "3329857";
pub const CLIENT_ID: &str = "client-gateway";
pub const CLIENT_SECRET: &str = "secret-gateway";

pub fn user() -> UserId {
	UserId::new(USER).expect("User fixture should be valid.")
}

pub fn record(access: &str, refresh: &str) -> TokenRecord {
	TokenRecord::builder(user())
		.access_token(access)
		.refresh_token(refresh)
		.expires_in(Duration::hours(6))
		.build()
		.expect("Token record fixture should build successfully.")
}

pub async fn seed_record(store: &MemoryStore, access: &str, refresh: &str) {
	store.save_token(record(access, refresh)).await.expect("Failed to seed credential fixture.");
}

pub async fn stored_record(store: &MemoryStore) -> TokenRecord {
	store
		.get_token(&user())
		.await
		.expect("Memory store reads should succeed.")
		.expect("Credential fixture should be present.")
}

pub fn config_for(base: &str) -> GatewayConfigBuilder {
	let api_base = Url::parse(base).expect("Mock API base should parse successfully.");
	let token_endpoint = Url::parse(&format!("{}/oauth/token", base.trim_end_matches('/')))
		.expect("Mock token endpoint should parse successfully.");

	GatewayConfig::builder().api_base(api_base).token_endpoint(token_endpoint)
}

pub fn bearer(access: &str) -> String {
	format!("Bearer {access}")
}

/// Builds a reqwest-backed gateway pointed at `server`, sharing one memory store for credentials
/// and cache entries.
#[cfg(feature = "reqwest")]
pub fn build_reqwest_test_gateway(server: &MockServer) -> (ReqwestGateway, MemoryStore) {
	build_reqwest_test_gateway_with(server, |builder| builder)
}

#[cfg(feature = "reqwest")]
pub fn build_reqwest_test_gateway_with(
	server: &MockServer,
	configure: impl FnOnce(GatewayConfigBuilder) -> GatewayConfigBuilder,
) -> (ReqwestGateway, MemoryStore) {
	let store = MemoryStore::default();
	let config = configure(config_for(&server.base_url()))
		.build()
		.expect("Gateway config fixture should validate.");
	let gateway = Gateway::new(config, Arc::new(store.clone()), Arc::new(store.clone()), CLIENT_ID)
		.expect("Gateway should build for tests.")
		.with_client_secret(CLIENT_SECRET);

	(gateway, store)
}

pub type ScriptedGateway = Gateway<ScriptedTransport, ScriptedMapper>;

/// One canned transport outcome.
pub enum Scripted {
	Respond(HttpResponse),
	Fail(io::ErrorKind),
}

#[derive(Default)]
struct ScriptState {
	script: Mutex<VecDeque<Scripted>>,
	requests: Mutex<Vec<HttpRequest>>,
}

/// Transport that replays canned responses in order and records every request it receives.
///
/// Clones share the script, so a test keeps one handle while the gateway owns another.
#[derive(Clone, Default)]
pub struct ScriptedTransport(Arc<ScriptState>);
impl ScriptedTransport {
	pub fn push(&self, outcome: Scripted) {
		self.0.script.lock().expect("Script lock should not be poisoned.").push_back(outcome);
	}

	pub fn respond(&self, status: u16, headers: &[(&str, String)], body: &str) {
		let mut builder = Response::builder().status(
			StatusCode::from_u16(status).expect("Scripted status should be a valid HTTP code."),
		);

		for (name, value) in headers {
			builder = builder.header(*name, value.as_str());
		}

		let response =
			builder.body(body.as_bytes().to_vec()).expect("Scripted response should build.");

		self.push(Scripted::Respond(response));
	}

	pub fn request_count(&self) -> usize {
		self.0.requests.lock().expect("Request log lock should not be poisoned.").len()
	}

	pub fn authorizations(&self) -> Vec<String> {
		self.0
			.requests
			.lock()
			.expect("Request log lock should not be poisoned.")
			.iter()
			.filter_map(|request| request.headers().get("authorization"))
			.filter_map(|value| value.to_str().ok().map(ToOwned::to_owned))
			.collect()
	}
}
impl ApiHttpClient for ScriptedTransport {
	type Handle = ScriptedHandle;
	type TransportError = io::Error;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { state: self.0.clone(), slot }
	}
}

/// Handle produced by [`ScriptedTransport`].
pub struct ScriptedHandle {
	state: Arc<ScriptState>,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
	type Error = HttpClientError<io::Error>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();
			self.state.requests.lock().expect("Request log lock should not be poisoned.").push(request);

			let next = self.state.script.lock().expect("Script lock should not be poisoned.").pop_front();

			match next {
				Some(Scripted::Respond(response)) => {
					self.slot.store(ResponseMetadata { status: Some(response.status().as_u16()) });

					Ok(response)
				},
				Some(Scripted::Fail(kind)) => Err(HttpClientError::Io(io::Error::from(kind))),
				None => Err(HttpClientError::Other("script exhausted".into())),
			}
		})
	}
}

/// Maps scripted IO failures the same way the reqwest mapper treats network failures.
#[derive(Clone, Debug, Default)]
pub struct ScriptedMapper;
impl TransportErrorMapper<io::Error> for ScriptedMapper {
	fn map_transport_error(
		&self,
		_metadata: Option<&ResponseMetadata>,
		error: HttpClientError<io::Error>,
	) -> TransportError {
		match error {
			HttpClientError::Io(inner) if inner.kind() == io::ErrorKind::TimedOut =>
				TransportError::Timeout,
			HttpClientError::Io(inner) => TransportError::Io(inner),
			other => TransportError::network(io::Error::other(other.to_string())),
		}
	}
}

/// Builds a gateway over a scripted transport with the provided configuration tweaks.
pub fn build_scripted_test_gateway(
	configure: impl FnOnce(GatewayConfigBuilder) -> GatewayConfigBuilder,
) -> (ScriptedGateway, ScriptedTransport, MemoryStore) {
	let store = MemoryStore::default();
	let transport = ScriptedTransport::default();
	let config = configure(config_for("https://api.fitness.test/api/v3"))
		.build()
		.expect("Gateway config fixture should validate.");
	let gateway = Gateway::with_http_client(
		config,
		Arc::new(store.clone()),
		Arc::new(store.clone()),
		CLIENT_ID,
		transport.clone(),
		ScriptedMapper,
	)
	.expect("Scripted gateway should build.");

	(gateway, transport, store)
}

/// Quota headers announcing `remaining` calls until `reset_in` from now.
pub fn quota_headers(remaining: i64, reset_in: Duration) -> Vec<(&'static str, String)> {
	let reset_at = (OffsetDateTime::now_utc() + reset_in).unix_timestamp();

	vec![("remaining-quota", remaining.to_string()), ("quota-reset-unix-time", reset_at.to_string())]
}
