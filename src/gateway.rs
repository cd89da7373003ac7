//! The authenticated API gateway and its supporting operations.
//!
//! [`Gateway`] owns every piece of per-process state a resource call needs: the HTTP transport,
//! the credential store, the response cache, the quota tracker, and the per-user refresh guards.
//! Handlers build an [`ApiRequest`] (or use the typed helpers in [`resources`]) and receive
//! either a [`Payload`] or one of the closed [`Error`] variants.

pub mod metrics;
pub mod request;
pub mod resources;

mod authorize;
mod call;
mod refresh;

pub use metrics::*;
pub use request::*;
pub use resources::*;

// self
use crate::{
	_prelude::*,
	auth::UserId,
	cache::ResponseCache,
	config::GatewayConfig,
	error::ConfigError,
	http::ApiHttpClient,
	oauth::{TokenFacade, TransportErrorMapper},
	ratelimit::{RateLimitState, RateLimitTracker},
	store::{CacheStore, CredentialStore},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport stack.
pub type ReqwestGateway = Gateway<ReqwestHttpClient, ReqwestTransportErrorMapper>;

type FlowGuards = Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>;

/// Coordinates cached, quota-aware, self-refreshing calls against one upstream API.
///
/// Clones share the transport, stores, tracker, counters, and refresh guards, so a clone per
/// task behaves exactly like a shared reference.
pub struct Gateway<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	config: Arc<GatewayConfig>,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	credentials: Arc<dyn CredentialStore>,
	cache: ResponseCache,
	tokens: TokenFacade<C, M>,
	rate_limit: Arc<RateLimitTracker>,
	metrics: Arc<CallMetrics>,
	flow_guards: FlowGuards,
}
impl<C, M> Gateway<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	/// Creates a gateway that reuses the caller-provided transport + mapper pair.
	///
	/// The transport is expected to apply [`GatewayConfig::request_timeout`] itself.
	pub fn with_http_client(
		config: GatewayConfig,
		credentials: Arc<dyn CredentialStore>,
		cache_store: Arc<dyn CacheStore>,
		client_id: impl Into<String>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		let client_id: String = client_id.into();
		let http_client = http_client.into();
		let transport_mapper = mapper.into();
		let tokens = TokenFacade::new(
			&config.token_endpoint,
			&client_id,
			http_client.clone(),
			transport_mapper.clone(),
		)?;
		let rate_limit =
			Arc::new(RateLimitTracker::new(config.quota_headers.clone(), config.quota_wait));

		Ok(Self {
			config: Arc::new(config),
			http_client,
			transport_mapper,
			credentials,
			cache: ResponseCache::new(cache_store),
			tokens,
			rate_limit,
			metrics: Default::default(),
			flow_guards: Default::default(),
		})
	}

	/// Sets the client secret sent alongside the client id on token requests.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.tokens = self.tokens.with_client_secret(secret);

		self
	}

	/// Configuration the gateway was built with.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Snapshot of the call counters.
	pub fn stats(&self) -> GatewayStats {
		self.metrics.snapshot()
	}

	/// Most recent quota state reported by the upstream, if any.
	pub fn rate_limit(&self) -> Option<RateLimitState> {
		self.rate_limit.snapshot()
	}

	/// Drops every cached response; the next read of any resource reaches the upstream.
	///
	/// Returns `false` when the cache backend failed to clear.
	pub async fn clear_cache(&self) -> bool {
		self.cache.clear().await
	}

	/// Returns (and creates on demand) the singleflight guard for a user.
	fn flow_guard(&self, user_id: &UserId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(user_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a gateway backed by a reqwest client with the configured timeout and no redirects.
	///
	/// Use [`Gateway::with_client_secret`] to attach the confidential client secret.
	pub fn new(
		config: GatewayConfig,
		credentials: Arc<dyn CredentialStore>,
		cache_store: Arc<dyn CacheStore>,
		client_id: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)?;

		Self::with_http_client(
			config,
			credentials,
			cache_store,
			client_id,
			http_client,
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> Clone for Gateway<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			credentials: self.credentials.clone(),
			cache: self.cache.clone(),
			tokens: self.tokens.clone(),
			rate_limit: self.rate_limit.clone(),
			metrics: self.metrics.clone(),
			flow_guards: self.flow_guards.clone(),
		}
	}
}
impl<C, M> Debug for Gateway<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("api_base", &self.config.api_base.as_str())
			.field("rate_limit", &self.rate_limit.snapshot())
			.field("stats", &self.metrics.snapshot())
			.finish()
	}
}
