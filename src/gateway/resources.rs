//! Typed helpers for the resources handlers read most often.

// self
use crate::{
	_prelude::*,
	cache::ResourceKind,
	gateway::{ApiRequest, Gateway, Payload},
	http::ApiHttpClient,
	oauth::TransportErrorMapper,
};

/// Filters and pagination for the authenticated athlete's activity list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityQuery {
	/// One-based page number.
	pub page: u32,
	/// Items per page; clamped to the configured ceiling.
	pub per_page: u32,
	/// Only activities that started before this unix timestamp.
	pub before: Option<i64>,
	/// Only activities that started after this unix timestamp.
	pub after: Option<i64>,
}
impl ActivityQuery {
	/// Default page size.
	pub const DEFAULT_PER_PAGE: u32 = 30;

	/// Selects a page.
	pub fn page(mut self, page: u32) -> Self {
		self.page = page;

		self
	}

	/// Overrides the page size.
	pub fn per_page(mut self, per_page: u32) -> Self {
		self.per_page = per_page;

		self
	}

	/// Restricts the list to activities before `instant`.
	pub fn before(mut self, instant: OffsetDateTime) -> Self {
		self.before = Some(instant.unix_timestamp());

		self
	}

	/// Restricts the list to activities after `instant`.
	pub fn after(mut self, instant: OffsetDateTime) -> Self {
		self.after = Some(instant.unix_timestamp());

		self
	}

	/// Builds the gateway request for `user_id`.
	pub fn into_request(self, user_id: impl Into<String>) -> ApiRequest {
		ApiRequest::get(user_id, "/athlete/activities")
			.resource(ResourceKind::Activities)
			.param("page", self.page)
			.param("per_page", self.per_page)
			.param_opt("before", self.before)
			.param_opt("after", self.after)
	}
}
impl Default for ActivityQuery {
	fn default() -> Self {
		Self { page: 1, per_page: Self::DEFAULT_PER_PAGE, before: None, after: None }
	}
}

impl<C, M> Gateway<C, M>
where
	C: ApiHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	/// Fetches the authenticated athlete's profile (`GET /athlete`).
	pub async fn athlete(&self, user_id: &str) -> Result<Payload> {
		self.call(ApiRequest::get(user_id, "/athlete").resource(ResourceKind::Profile)).await
	}

	/// Fetches another athlete's public profile (`GET /athletes/{id}`).
	pub async fn athlete_by_id(&self, user_id: &str, athlete_id: u64) -> Result<Payload> {
		self.call(
			ApiRequest::get(user_id, format!("/athletes/{athlete_id}"))
				.resource(ResourceKind::Profile),
		)
		.await
	}

	/// Fetches one activity (`GET /activities/{id}`), optionally with every segment effort.
	pub async fn activity(
		&self,
		user_id: &str,
		activity_id: u64,
		include_all_efforts: bool,
	) -> Result<Payload> {
		self.call(
			ApiRequest::get(user_id, format!("/activities/{activity_id}"))
				.resource(ResourceKind::Activities)
				.param("include_all_efforts", include_all_efforts),
		)
		.await
	}

	/// Fetches aggregated statistics for an athlete (`GET /athletes/{id}/stats`).
	pub async fn athlete_stats(&self, user_id: &str, athlete_id: u64) -> Result<Payload> {
		self.call(
			ApiRequest::get(user_id, format!("/athletes/{athlete_id}/stats"))
				.resource(ResourceKind::Stats),
		)
		.await
	}

	/// Lists the authenticated athlete's activities (`GET /athlete/activities`).
	pub async fn activities(&self, user_id: &str, query: ActivityQuery) -> Result<Payload> {
		self.call(query.into_request(user_id)).await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn activity_query_defaults_and_filters() {
		let request = ActivityQuery::default().into_request("42");

		assert_eq!(request.path, "/athlete/activities");
		assert_eq!(request.cache.resource, ResourceKind::Activities);
		assert_eq!(request.params["page"], "1");
		assert_eq!(request.params["per_page"], "30");
		assert!(!request.params.contains_key("before"));

		let request = ActivityQuery::default()
			.page(3)
			.after(OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Valid timestamp."))
			.into_request("42");

		assert_eq!(request.params["page"], "3");
		assert_eq!(request.params["after"], "1700000000");
	}
}
