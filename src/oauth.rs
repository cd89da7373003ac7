//! OAuth token-endpoint facade built on the `oauth2` crate.
//!
//! The facade covers the two grants the gateway needs (`refresh_token` and
//! `authorization_code`), sends client credentials in the request body, and decodes the
//! provider's extra response fields (`expires_at`, `athlete`). Failures are mapped into
//! [`AuthError`] so the gateway never sees `oauth2` or transport types.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, RefreshToken, RequestTokenError, StandardRevocableToken,
	StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	error::{AuthError, ConfigError, TransportError},
	http::{ApiHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type GrantResponse = StandardTokenResponse<AthleteTokenFields, BasicTokenType>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	GrantResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + 'a + Send>>;

/// Maps HTTP transport failures into [`TransportError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a gateway transport error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> TransportError;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_metadata: Option<&ResponseMetadata>,
		error: HttpClientError<ReqwestError>,
	) -> TransportError {
		match error {
			HttpClientError::Reqwest(inner) => TransportError::from(*inner),
			HttpClientError::Http(inner) => TransportError::request(inner),
			HttpClientError::Io(inner) => TransportError::Io(inner),
			HttpClientError::Other(message) =>
				TransportError::network(std::io::Error::other(message)),
			_ => TransportError::network(std::io::Error::other("unknown HTTP client failure")),
		}
	}
}

/// Non-standard fields the provider adds to token responses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AthleteTokenFields {
	/// Absolute expiry as unix seconds; preferred over `expires_in` when present.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<i64>,
	/// Athlete summary returned by the authorization-code grant.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub athlete: Option<Value>,
}
impl AthleteTokenFields {
	/// Returns the athlete identifier as a string, accepting numeric or string ids.
	pub fn athlete_id(&self) -> Option<String> {
		match self.athlete.as_ref()?.get("id")? {
			Value::Number(id) => Some(id.to_string()),
			Value::String(id) if !id.is_empty() => Some(id.clone()),
			_ => None,
		}
	}
}
impl ExtraTokenFields for AthleteTokenFields {}

/// Decoded token-endpoint response, before it is bound to a user.
#[derive(Clone)]
pub struct TokenGrant {
	/// New access token.
	pub access_token: String,
	/// Rotated refresh token, when the provider issued one.
	pub refresh_token: Option<String>,
	/// Absolute expiry of the access token.
	pub expires_at: OffsetDateTime,
	/// Token type label.
	pub token_type: String,
	/// Provider extras (athlete summary).
	pub extra: AthleteTokenFields,
}
impl TokenGrant {
	/// Binds the grant to `user_id`, keeping `previous_refresh` when no new refresh token came back.
	pub fn into_record(
		self,
		user_id: UserId,
		previous_refresh: Option<&str>,
	) -> Result<TokenRecord, AuthError> {
		let refresh = self
			.refresh_token
			.or_else(|| previous_refresh.map(ToOwned::to_owned))
			.ok_or_else(|| AuthError::UnexpectedResponse {
				message: "no refresh token was issued".into(),
				status: None,
			})?;

		TokenRecord::builder(user_id)
			.access_token(self.access_token)
			.refresh_token(refresh)
			.expires_at(self.expires_at)
			.token_type(self.token_type)
			.build()
			.map_err(|e| AuthError::UnexpectedResponse { message: e.to_string(), status: None })
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Token-endpoint client bound to one transport + mapper pair.
pub(crate) struct TokenFacade<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> TokenFacade<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		token_endpoint: &Url,
		client_id: &str,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let oauth_client: ConfiguredClient = Client::new(ClientId::new(client_id.to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	pub(crate) fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.oauth_client = self.oauth_client.set_client_secret(ClientSecret::new(secret.into()));

		self
	}

	pub(crate) fn refresh_token<'a>(
		&'a self,
		refresh_token: &'a str,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.with_metadata(meta.clone());
			let secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&secret)
				.request_async(&handle)
				.await
				.map_err(|e| map_request_error(meta.take(), e, self.error_mapper.as_ref()))?;

			decode_grant(response, OffsetDateTime::now_utc())
		})
	}

	pub(crate) fn exchange_code<'a>(&'a self, code: &'a str) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.http_client.with_metadata(meta.clone());
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.request_async(&handle)
				.await
				.map_err(|e| map_request_error(meta.take(), e, self.error_mapper.as_ref()))?;

			decode_grant(response, OffsetDateTime::now_utc())
		})
	}
}
impl<C, M> Clone for TokenFacade<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			oauth_client: self.oauth_client.clone(),
			http_client: self.http_client.clone(),
			error_mapper: self.error_mapper.clone(),
		}
	}
}

fn decode_grant(response: GrantResponse, now: OffsetDateTime) -> Result<TokenGrant, AuthError> {
	let extra = response.extra_fields().clone();
	let expires_at = match (extra.expires_at, response.expires_in()) {
		(Some(unix), _) =>
			OffsetDateTime::from_unix_timestamp(unix).map_err(|e| AuthError::UnexpectedResponse {
				message: format!("expires_at out of range: {e}"),
				status: None,
			})?,
		(None, Some(delta)) => i64::try_from(delta.as_secs())
			.ok()
			.and_then(|secs| now.checked_add(Duration::seconds(secs)))
			.ok_or_else(|| AuthError::UnexpectedResponse {
				message: "expires_in out of range".into(),
				status: None,
			})?,
		(None, None) => return Err(AuthError::MissingExpiry),
	};

	Ok(TokenGrant {
		access_token: response.access_token().secret().to_owned(),
		refresh_token: response.refresh_token().map(|token| token.secret().to_owned()),
		expires_at,
		token_type: token_type_label(response.token_type()),
		extra,
	})
}

fn token_type_label(token_type: &BasicTokenType) -> String {
	match token_type {
		BasicTokenType::Bearer => TokenRecord::DEFAULT_TOKEN_TYPE.to_owned(),
		other => other.as_ref().to_owned(),
	}
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: RequestTokenError<HttpClientError<E>, BasicErrorResponse>,
	mapper: &M,
) -> AuthError
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let status = meta.as_ref().and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) => format!("{}: {description}", response.error().as_ref()),
				None => response.error().as_ref().to_owned(),
			};

			AuthError::Rejected { status, reason }
		},
		RequestTokenError::Request(error) =>
			AuthError::Transport(mapper.map_transport_error(meta.as_ref(), error)),
		RequestTokenError::Parse(source, _body) => AuthError::MalformedResponse { source, status },
		RequestTokenError::Other(message) => AuthError::UnexpectedResponse { message, status },
	}
}
