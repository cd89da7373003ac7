//! Gateway-level error types shared across calls, refreshes, stores, and configuration.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Closed set of failures returned by [`Gateway::call`](crate::gateway::Gateway::call).
///
/// Handlers pattern-match on the variant (or use [`Error::status_code`] + [`Error::code`]) to
/// build their own transport-level responses; raw transport errors never escape this enum.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The request did not name a user.
	#[error("User identifier is required.")]
	MissingUserId,
	/// A request parameter is malformed or out of bounds.
	#[error("Request parameter `{name}` is invalid: {reason}.")]
	InvalidParameter {
		/// Parameter name as supplied by the caller.
		name: String,
		/// Human-readable validation failure.
		reason: String,
	},
	/// No usable credential is stored for the user.
	#[error("User `{user_id}` is not authenticated.")]
	Unauthenticated {
		/// User identifier that failed the lookup.
		user_id: String,
	},
	/// The upstream rejected the token and a single refresh could not recover it.
	#[error("Authentication expired and could not be renewed: {reason}.")]
	AuthenticationExpired {
		/// Why the refresh-and-retry cycle failed.
		reason: String,
	},
	/// Upstream returned a non-success status, timed out, or was unreachable.
	#[error("Upstream request failed ({}): {body}", status_label(.status))]
	Upstream {
		/// HTTP status code, absent for timeouts and network failures.
		status: Option<u16>,
		/// Response body or transport failure summary.
		body: String,
	},
	/// The locally observed quota is exhausted and waiting would exceed the caller's budget.
	#[error("Rate limit exhausted; retry in {retry_in}.")]
	RateLimited {
		/// Time remaining until the quota window resets.
		retry_in: Duration,
	},
	/// Unexpected internal failure (request construction, invariant breach).
	#[error("Internal gateway failure: {detail}.")]
	Internal {
		/// Diagnostic detail for logs.
		detail: String,
	},
}
impl Error {
	/// HTTP-style status code a handler should answer with.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::MissingUserId | Self::InvalidParameter { .. } => 400,
			Self::Unauthenticated { .. } | Self::AuthenticationExpired { .. } => 401,
			Self::RateLimited { .. } | Self::Upstream { status: Some(429), .. } => 429,
			Self::Upstream { status: None, .. } => 504,
			Self::Upstream { .. } => 502,
			Self::Internal { .. } => 500,
		}
	}

	/// Stable machine-readable error code.
	pub fn code(&self) -> &'static str {
		match self {
			Self::MissingUserId => "MISSING_USER_ID",
			Self::InvalidParameter { .. } => "INVALID_PARAMETER",
			Self::Unauthenticated { .. } => "UNAUTHENTICATED",
			Self::AuthenticationExpired { .. } => "TOKEN_REFRESH_FAILED",
			Self::Upstream { .. } => "UPSTREAM_ERROR",
			Self::RateLimited { .. } => "RATE_LIMITED",
			Self::Internal { .. } => "INTERNAL_ERROR",
		}
	}

	/// Returns `true` for failures caused by the caller's input or missing credentials.
	pub fn is_client_error(&self) -> bool {
		matches!(
			self,
			Self::MissingUserId | Self::InvalidParameter { .. } | Self::Unauthenticated { .. }
		)
	}

	pub(crate) fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::InvalidParameter { name: name.into(), reason: reason.into() }
	}

	pub(crate) fn internal(detail: impl Display) -> Self {
		Self::Internal { detail: detail.to_string() }
	}
}
impl From<TransportError> for Error {
	fn from(e: TransportError) -> Self {
		match e {
			TransportError::Request { .. } => Self::internal(e),
			_ => Self::Upstream { status: None, body: e.to_string() },
		}
	}
}

fn status_label(status: &Option<u16>) -> String {
	match status {
		Some(code) => format!("status {code}"),
		None => "no response".into(),
	}
}

/// Failures raised by the refresh protocol and the authorization-code exchange.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Storage-layer failure while loading the credential.
	#[error(transparent)]
	Storage(#[from] crate::store::StoreError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (timeout, DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The identifier returned by the token endpoint is unusable.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),

	/// No credential is stored for the user, so there is nothing to refresh.
	#[error("No stored credential for user `{user_id}`.")]
	MissingCredential {
		/// User identifier that failed the lookup.
		user_id: String,
	},
	/// Token endpoint rejected the grant (bad code, revoked refresh token, bad client).
	#[error("Token endpoint rejected the grant: {reason}.")]
	Rejected {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// OAuth error code or description.
		reason: String,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint returned an unexpected but well-formed response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	UnexpectedResponse {
		/// Summary of the unexpected payload.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token response carried neither `expires_at` nor `expires_in`.
	#[error("Token endpoint response is missing an expiry.")]
	MissingExpiry,
	/// Authorization-code response did not identify the athlete.
	#[error("Token endpoint response is missing the athlete identifier.")]
	MissingAthlete,
}

/// Configuration and construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Token endpoint URL was rejected by the OAuth client.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// The API base URL was not configured.
	#[error("Missing API base URL.")]
	MissingApiBase,
	/// The token endpoint was not configured.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTP(S).
	#[error("The {endpoint} endpoint must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Upstream calls need a positive timeout.
	#[error("Request timeout must be positive.")]
	NonPositiveTimeout,
	/// The page-size ceiling must allow at least one item.
	#[error("Maximum page size must be positive.")]
	ZeroPageSize,
	/// Quota header names must be valid HTTP header names.
	#[error("Quota header name `{name}` is invalid.")]
	InvalidQuotaHeader {
		/// Offending header name.
		name: String,
	},
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

/// Transport-level failures (timeouts, network, IO, request construction).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The request exceeded the client's fixed timeout.
	#[error("Request timed out.")]
	Timeout,
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the upstream API.")]
	Io(#[from] std::io::Error),
	/// The outbound request could not be constructed.
	#[error("Outbound request could not be constructed.")]
	Request {
		/// Builder failure.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a request construction failure.
	pub fn request(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Request { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			Self::Timeout
		} else if e.is_builder() {
			Self::request(e)
		} else {
			Self::network(e)
		}
	}
}
