//! Token record stored per user and replaced wholesale on every refresh.

// self
use crate::{
	_prelude::*,
	auth::{UserId, token::secret::TokenSecret},
};

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when `issued_at + expires_in` falls outside the representable range.
	#[error("Relative expiry overflows the supported date range.")]
	ExpiryOutOfRange,
}

/// Credential the gateway holds for one user.
///
/// Exactly one record exists per user; refreshes build a new record and replace the old one
/// instead of patching fields in place. `expires_at` serializes as a unix timestamp.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Owner of the credential.
	pub user_id: UserId,
	/// Short-lived bearer token sent on resource calls.
	pub access_token: TokenSecret,
	/// Long-lived secret exchanged for new access tokens.
	pub refresh_token: TokenSecret,
	/// Instant the access token stops being valid.
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
	/// Token type reported by the provider (usually `Bearer`).
	pub token_type: String,
}
impl TokenRecord {
	/// Token type assumed when the provider omits one.
	pub const DEFAULT_TOKEN_TYPE: &'static str = "Bearer";

	/// Returns a builder for the provided user.
	pub fn builder(user_id: UserId) -> TokenRecordBuilder {
		TokenRecordBuilder::new(user_id)
	}

	/// Returns `true` if the access token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` if the access token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Expiry as unix seconds, the shape the upstream token endpoint reports.
	pub fn expires_at_unix(&self) -> i64 {
		self.expires_at.unix_timestamp()
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("user_id", &self.user_id)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	user_id: UserId,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	token_type: Option<String>,
}
impl TokenRecordBuilder {
	fn new(user_id: UserId) -> Self {
		Self {
			user_id,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
			token_type: None,
		}
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the instant relative expiries are measured from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant. Takes precedence over [`expires_in`](Self::expires_in).
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Overrides the token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(TokenRecordBuilderError::MissingRefreshToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) =>
				issued_at.checked_add(delta).ok_or(TokenRecordBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			user_id: self.user_id,
			access_token,
			refresh_token,
			expires_at,
			token_type: self
				.token_type
				.unwrap_or_else(|| TokenRecord::DEFAULT_TOKEN_TYPE.to_owned()),
		})
	}
}
