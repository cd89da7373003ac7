//! The `call` pipeline: cache, credential, quota, dispatch, one refresh-and-retry, cache write.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		HeaderValue, Request,
		header::{ACCEPT, AUTHORIZATION},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, UserId},
	gateway::{ApiRequest, Gateway, Payload, PreparedRequest},
	http::{ApiHttpClient, ResponseMetadataSlot},
	oauth::TransportErrorMapper,
	obs::{self, CallKind, FlowOutcome, FlowSpan},
	ratelimit::RateLimitDecision,
};

const UNAUTHORIZED: u16 = 401;

impl<C, M> Gateway<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	/// Performs an authenticated, cached, quota-aware call against the resource API.
	///
	/// 1. Validates the request (`MissingUserId`, `InvalidParameter`) and clamps `per_page`.
	/// 2. Serves a fresh cache entry for enabled `GET` requests without touching the network.
	/// 3. Loads the user's credential; absence or a store failure is `Unauthenticated`.
	/// 4. Waits out an exhausted quota window unless that would overrun the deadline or the
	///    configured ceiling (`RateLimited`).
	/// 5. On `401`, renews the credential once and retries once; a second rejection or a failed
	///    renewal is `AuthenticationExpired`.
	/// 6. Any other non-2xx status, timeout, or network failure is `Upstream` and is not retried.
	/// 7. Caches successful `GET` bodies for the resource TTL.
	pub async fn call(&self, request: ApiRequest) -> Result<Payload> {
		const KIND: CallKind = CallKind::Resource;

		let span = FlowSpan::new(KIND, "call");

		obs::record_call_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.call_inner(request)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, FlowOutcome::Success),
			Err(_) => {
				obs::record_call_outcome(KIND, FlowOutcome::Failure);
				self.metrics.record_failure();
			},
		}

		result
	}

	async fn call_inner(&self, request: ApiRequest) -> Result<Payload> {
		let request = request.prepare(self.config.max_per_page)?;
		let cache_key = request.cache_key();

		let cached = match &cache_key {
			Some(key) => self.cache.get(key).await,
			None => None,
		};

		if let Some(body) = cached {
			self.metrics.record_cache_hit();

			return Ok(Payload { body, cached: true });
		}

		let record = self.load_credential(&request.user_id).await?;
		let mut response = self.dispatch(&request, &record).await?;

		if response.status().as_u16() == UNAUTHORIZED {
			let renewed = self.renew_after_rejection(&request.user_id, &record).await?;

			response = self.dispatch(&request, &renewed).await?;

			if response.status().as_u16() == UNAUTHORIZED {
				return Err(Error::AuthenticationExpired {
					reason: "the upstream rejected the renewed access token".into(),
				});
			}
		}

		let status = response.status().as_u16();

		if !response.status().is_success() {
			return Err(Error::Upstream {
				status: Some(status),
				body: String::from_utf8_lossy(response.body()).into_owned(),
			});
		}

		let body = decode_body(status, response.body())?;

		if let Some(key) = cache_key {
			let ttl =
				request.cache.ttl.unwrap_or_else(|| self.config.ttl.for_kind(request.cache.resource));

			self.cache.set(key, body.clone(), ttl).await;
		}

		Ok(Payload { body, cached: false })
	}

	async fn load_credential(&self, user_id: &UserId) -> Result<TokenRecord> {
		match self.credentials.get_token(user_id).await {
			Ok(Some(record)) => Ok(record),
			Ok(None) => Err(Error::Unauthenticated { user_id: user_id.to_string() }),
			Err(e) => {
				obs::record_degraded("credentials.get", &e);

				Err(Error::Unauthenticated { user_id: user_id.to_string() })
			},
		}
	}

	/// Paces against the quota window, sends one request, and records its quota headers.
	async fn dispatch(
		&self,
		request: &PreparedRequest,
		record: &TokenRecord,
	) -> Result<HttpResponse> {
		self.pace(request.deadline).await?;

		let http_request = self.build_request(request, record)?;
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(slot.clone());

		self.metrics.record_upstream_request();

		let response = handle.call(http_request).await.map_err(|e| {
			Error::from(self.transport_mapper.map_transport_error(slot.take().as_ref(), e))
		})?;

		self.rate_limit.record_headers(response.headers());

		Ok(response)
	}

	async fn pace(&self, deadline: Option<OffsetDateTime>) -> Result<()> {
		let now = OffsetDateTime::now_utc();

		match self.rate_limit.evaluate(now, deadline, self.config.max_rate_limit_wait) {
			RateLimitDecision::Allow => Ok(()),
			RateLimitDecision::Delay(wait) => {
				obs::record_rate_limit_wait(wait);
				tokio::time::sleep(wait.unsigned_abs()).await;

				Ok(())
			},
			RateLimitDecision::Exceeded { retry_in } => Err(Error::RateLimited { retry_in }),
		}
	}

	fn build_request(
		&self,
		request: &PreparedRequest,
		record: &TokenRecord,
	) -> Result<HttpRequest> {
		let mut url = self.config.resource_url(&request.path).map_err(Error::internal)?;

		if !request.params.is_empty() {
			url.query_pairs_mut().extend_pairs(&request.params);
		}

		let mut authorization =
			HeaderValue::from_str(&record.access_token.bearer()).map_err(Error::internal)?;

		authorization.set_sensitive(true);

		Request::builder()
			.method(request.method.clone())
			.uri(url.as_str())
			.header(AUTHORIZATION, authorization)
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(Error::internal)
	}
}

fn decode_body(status: u16, body: &[u8]) -> Result<Value> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(Value::Null);
	}

	serde_json::from_slice(body).map_err(|e| Error::Upstream {
		status: Some(status),
		body: format!("response body is not valid JSON: {e}"),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn empty_bodies_decode_as_null() {
		assert_eq!(decode_body(200, b"").expect("Empty body should decode."), Value::Null);
		assert_eq!(decode_body(204, b" \n").expect("Blank body should decode."), Value::Null);
	}

	#[test]
	fn non_json_success_bodies_are_upstream_errors() {
		let err = decode_body(200, b"<html>").expect_err("HTML must not decode.");

		assert!(matches!(err, Error::Upstream { status: Some(200), .. }));
	}
}
