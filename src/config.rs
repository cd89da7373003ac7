//! Validated gateway configuration and its builder.
//!
//! [`GatewayConfig`] captures everything about the upstream that does not change per call:
//! endpoints, the fixed client timeout, page-size ceiling, cache TTLs per resource family, the
//! quota header names, and the optional upper bound on quota waits.

// self
use crate::{_prelude::*, cache::ResourceKind, error::ConfigError};

/// Strava REST API base.
pub const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
/// Strava OAuth token endpoint.
pub const STRAVA_TOKEN_ENDPOINT: &str = "https://www.strava.com/oauth/token";

/// Cache lifetimes per [`ResourceKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtls {
	/// Athlete profile data.
	pub profile: Duration,
	/// Activity lists.
	pub activities: Duration,
	/// Aggregated statistics.
	pub stats: Duration,
	/// Anything uncategorized.
	pub default: Duration,
}
impl CacheTtls {
	/// Returns the TTL for the provided resource family.
	pub fn for_kind(&self, kind: ResourceKind) -> Duration {
		match kind {
			ResourceKind::Profile => self.profile,
			ResourceKind::Activities => self.activities,
			ResourceKind::Stats => self.stats,
			ResourceKind::Other => self.default,
		}
	}
}
impl Default for CacheTtls {
	fn default() -> Self {
		Self {
			profile: Duration::hours(1),
			activities: Duration::minutes(30),
			stats: Duration::hours(2),
			default: Duration::minutes(5),
		}
	}
}

/// Names of the response headers that carry quota state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaHeaders {
	/// Header holding the number of requests left in the current window.
	pub remaining: String,
	/// Header holding the unix timestamp at which the window resets.
	pub reset: String,
}
impl Default for QuotaHeaders {
	fn default() -> Self {
		Self { remaining: "remaining-quota".into(), reset: "quota-reset-unix-time".into() }
	}
}

/// Decides when an upstream reset instant makes the next call wait.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaWait {
	/// Wait whenever the last reported reset instant is still ahead of now.
	#[default]
	UntilReset,
	/// Wait only when the last response also reported no requests remaining.
	WhenExhausted,
}

/// Immutable configuration consumed by [`Gateway`](crate::gateway::Gateway).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// Base URL every resource path is appended to.
	pub api_base: Url,
	/// OAuth token endpoint used for refreshes and code exchanges.
	pub token_endpoint: Url,
	/// Fixed per-request timeout applied by the HTTP client.
	pub request_timeout: Duration,
	/// Ceiling applied to `per_page` before fingerprinting and dispatch.
	pub max_per_page: u32,
	/// Cache lifetimes per resource family.
	pub ttl: CacheTtls,
	/// Quota header names.
	pub quota_headers: QuotaHeaders,
	/// When a reported reset instant makes the next call wait.
	#[serde(default)]
	pub quota_wait: QuotaWait,
	/// Longest quota wait a call may sleep through; `None` leaves only the request deadline.
	pub max_rate_limit_wait: Option<Duration>,
}
impl GatewayConfig {
	/// Default fixed request timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(10);
	/// Default `per_page` ceiling.
	pub const DEFAULT_MAX_PER_PAGE: u32 = 200;

	/// Creates an empty builder; both endpoints must be supplied.
	pub fn builder() -> GatewayConfigBuilder {
		GatewayConfigBuilder::new()
	}

	/// Returns a builder preset with Strava's API base and token endpoint.
	pub fn strava() -> GatewayConfigBuilder {
		let builder = GatewayConfigBuilder::new();

		GatewayConfigBuilder {
			api_base: Url::parse(STRAVA_API_BASE).ok(),
			token_endpoint: Url::parse(STRAVA_TOKEN_ENDPOINT).ok(),
			..builder
		}
	}

	/// Resolves a resource path (which must start with `/`) against [`api_base`](Self::api_base).
	///
	/// Unlike [`Url::join`], the base path is preserved: `/athlete` under
	/// `https://host/api/v3` becomes `https://host/api/v3/athlete`.
	pub fn resource_url(&self, path: &str) -> Result<Url, url::ParseError> {
		let base = self.api_base.as_str().trim_end_matches('/');

		Url::parse(&format!("{base}{path}"))
	}

	fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("api", &self.api_base)?;
		validate_endpoint("token", &self.token_endpoint)?;

		if !self.request_timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout);
		}
		if self.max_per_page == 0 {
			return Err(ConfigError::ZeroPageSize);
		}

		validate_header_name(&self.quota_headers.remaining)?;
		validate_header_name(&self.quota_headers.reset)?;

		Ok(())
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	/// Base URL for resource calls.
	pub api_base: Option<Url>,
	/// OAuth token endpoint.
	pub token_endpoint: Option<Url>,
	/// Fixed per-request timeout.
	pub request_timeout: Duration,
	/// `per_page` ceiling.
	pub max_per_page: u32,
	/// Cache lifetimes.
	pub ttl: CacheTtls,
	/// Quota header names.
	pub quota_headers: QuotaHeaders,
	/// Quota wait trigger.
	pub quota_wait: QuotaWait,
	/// Optional quota wait ceiling.
	pub max_rate_limit_wait: Option<Duration>,
}
impl GatewayConfigBuilder {
	/// Creates a builder seeded with defaults and no endpoints.
	pub fn new() -> Self {
		Self {
			api_base: None,
			token_endpoint: None,
			request_timeout: GatewayConfig::DEFAULT_REQUEST_TIMEOUT,
			max_per_page: GatewayConfig::DEFAULT_MAX_PER_PAGE,
			ttl: CacheTtls::default(),
			quota_headers: QuotaHeaders::default(),
			quota_wait: QuotaWait::default(),
			max_rate_limit_wait: None,
		}
	}

	/// Sets the API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the fixed request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the `per_page` ceiling.
	pub fn max_per_page(mut self, max: u32) -> Self {
		self.max_per_page = max;

		self
	}

	/// Overrides the cache lifetimes.
	pub fn ttl(mut self, ttl: CacheTtls) -> Self {
		self.ttl = ttl;

		self
	}

	/// Overrides the quota header names. Names are matched case-insensitively.
	pub fn quota_headers(mut self, remaining: impl Into<String>, reset: impl Into<String>) -> Self {
		self.quota_headers = QuotaHeaders { remaining: remaining.into(), reset: reset.into() };

		self
	}

	/// Selects when a reported reset instant makes the next call wait.
	pub fn quota_wait(mut self, wait: QuotaWait) -> Self {
		self.quota_wait = wait;

		self
	}

	/// Bounds how long a call may sleep waiting for the quota window to reset.
	pub fn max_rate_limit_wait(mut self, wait: Duration) -> Self {
		self.max_rate_limit_wait = Some(wait);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		let api_base = self.api_base.ok_or(ConfigError::MissingApiBase)?;
		let token_endpoint = self.token_endpoint.ok_or(ConfigError::MissingTokenEndpoint)?;
		let config = GatewayConfig {
			api_base,
			token_endpoint,
			request_timeout: self.request_timeout,
			max_per_page: self.max_per_page,
			ttl: self.ttl,
			quota_headers: QuotaHeaders {
				remaining: self.quota_headers.remaining.to_ascii_lowercase(),
				reset: self.quota_headers.reset.to_ascii_lowercase(),
			},
			quota_wait: self.quota_wait,
			max_rate_limit_wait: self.max_rate_limit_wait,
		};

		config.validate()?;

		Ok(config)
	}
}
impl Default for GatewayConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"http" | "https" => Ok(()),
		_ => Err(ConfigError::UnsupportedScheme { endpoint: name, url: url.to_string() }),
	}
}

// RFC 9110 `token` characters.
fn validate_header_name(name: &str) -> Result<(), ConfigError> {
	let valid = !name.is_empty()
		&& name.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));

	if valid { Ok(()) } else { Err(ConfigError::InvalidQuotaHeader { name: name.to_owned() }) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("URL fixture should parse.")
	}

	#[test]
	fn strava_preset_uses_documented_defaults() {
		let config = GatewayConfig::strava().build().expect("Strava preset should validate.");

		assert_eq!(config.api_base.as_str(), STRAVA_API_BASE);
		assert_eq!(config.request_timeout, Duration::seconds(10));
		assert_eq!(config.max_per_page, 200);
		assert_eq!(config.ttl.for_kind(ResourceKind::Profile), Duration::hours(1));
		assert_eq!(config.ttl.for_kind(ResourceKind::Activities), Duration::minutes(30));
		assert_eq!(config.ttl.for_kind(ResourceKind::Stats), Duration::hours(2));
		assert_eq!(config.ttl.for_kind(ResourceKind::Other), Duration::minutes(5));
		assert_eq!(config.quota_headers, QuotaHeaders::default());
		assert_eq!(config.quota_wait, QuotaWait::UntilReset);
		assert_eq!(config.max_rate_limit_wait, None);
	}

	#[test]
	fn resource_url_keeps_base_path() {
		let config = GatewayConfig::strava().build().expect("Strava preset should validate.");
		let resolved = config.resource_url("/athlete").expect("Path should resolve.");

		assert_eq!(resolved.as_str(), "https://www.strava.com/api/v3/athlete");

		let config = GatewayConfig::builder()
			.api_base(url("http://127.0.0.1:8080/"))
			.token_endpoint(url("http://127.0.0.1:8080/oauth/token"))
			.build()
			.expect("Local config should validate.");
		let resolved = config.resource_url("/athlete/activities").expect("Path should resolve.");

		assert_eq!(resolved.as_str(), "http://127.0.0.1:8080/athlete/activities");
	}

	#[test]
	fn builder_rejects_invalid_values() {
		let missing = GatewayConfig::builder().token_endpoint(url("https://a/token")).build();

		assert!(matches!(missing, Err(ConfigError::MissingApiBase)));

		let scheme = GatewayConfig::strava().api_base(url("ftp://example.com/api")).build();

		assert!(matches!(scheme, Err(ConfigError::UnsupportedScheme { endpoint: "api", .. })));

		let timeout = GatewayConfig::strava().request_timeout(Duration::ZERO).build();

		assert!(matches!(timeout, Err(ConfigError::NonPositiveTimeout)));

		let page = GatewayConfig::strava().max_per_page(0).build();

		assert!(matches!(page, Err(ConfigError::ZeroPageSize)));

		let header = GatewayConfig::strava().quota_headers("bad header", "reset").build();

		assert!(matches!(header, Err(ConfigError::InvalidQuotaHeader { .. })));
	}

	#[test]
	fn quota_header_names_are_normalized() {
		let config = GatewayConfig::strava()
			.quota_headers("X-RateLimit-Remaining", "X-RateLimit-Reset")
			.build()
			.expect("Custom header names should validate.");

		assert_eq!(config.quota_headers.remaining, "x-ratelimit-remaining");
		assert_eq!(config.quota_headers.reset, "x-ratelimit-reset");
	}
}
