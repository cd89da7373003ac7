//! Authorization-code exchange that creates a user's first credential.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	error::AuthError,
	gateway::Gateway,
	http::ApiHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, CallKind, FlowOutcome, FlowSpan},
};

impl<C, M> Gateway<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	/// Exchanges an authorization code and stores the resulting credential.
	///
	/// The user is identified by the athlete id in the token response. Unlike a refresh, the
	/// record must be persisted for the authorization to count, so store failures propagate.
	pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord, AuthError> {
		const KIND: CallKind = CallKind::Authorize;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_call_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let grant = self.tokens.exchange_code(code).await?;
				let athlete_id = grant.extra.athlete_id().ok_or(AuthError::MissingAthlete)?;
				let user_id = UserId::new(athlete_id)?;
				let record = grant.into_record(user_id, None)?;

				self.credentials.save_token(record.clone()).await?;

				Ok(record)
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
