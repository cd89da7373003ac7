//! Refresh protocol with per-user singleflight guards.
//!
//! Within one gateway, concurrent refreshes for the same user serialize on a guard; the task
//! that wins rotates the credential and later tasks see the new access token when they re-read
//! the store, so one rejection burst costs one token exchange. Separate gateway instances do not
//! coordinate and the store's last write wins.

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
	/// Exchanges the stored refresh token for a new access token and persists the result.
	///
	/// The new record replaces the old one wholesale. When the token endpoint omits a refresh
	/// token the previous one is kept. A failure to persist is logged and the new record is still
	/// returned, since the upstream has already rotated it.
	pub async fn refresh(&self, user_id: &UserId) -> Result<TokenRecord, AuthError> {
		let guard = self.flow_guard(user_id);
		let _singleflight = guard.lock().await;

		self.refresh_locked(user_id).await
	}

	/// Recovers from a `401` on `rejected`, reusing a rotation another task already completed.
	pub(crate) async fn renew_after_rejection(
		&self,
		user_id: &UserId,
		rejected: &TokenRecord,
	) -> Result<TokenRecord> {
		let guard = self.flow_guard(user_id);
		let _singleflight = guard.lock().await;

		let stored = self.credentials.get_token(user_id).await.ok().flatten();

		if let Some(current) = stored.filter(|r| r.access_token != rejected.access_token) {
			return Ok(current);
		}

		self.refresh_locked(user_id)
			.await
			.map_err(|e| Error::AuthenticationExpired { reason: e.to_string() })
	}

	async fn refresh_locked(&self, user_id: &UserId) -> Result<TokenRecord, AuthError> {
		const KIND: CallKind = CallKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_call_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let current = self
					.credentials
					.get_token(user_id)
					.await?
					.ok_or_else(|| AuthError::MissingCredential { user_id: user_id.to_string() })?;
				let previous_refresh = current.refresh_token.expose();
				let grant = self.tokens.refresh_token(previous_refresh).await?;
				let record = grant.into_record(user_id.clone(), Some(previous_refresh))?;

				if let Err(e) = self.credentials.save_token(record.clone()).await {
					obs::record_degraded("credentials.save", &e);
				}

				obs::record_rotation(user_id, record.expires_at_unix());
				self.metrics.record_refresh();

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
