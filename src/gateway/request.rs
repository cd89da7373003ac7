//! Request and response values exchanged between handlers and the gateway.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::UserId,
	cache::{CacheKey, CachePolicy, ResourceKind},
};

/// Logical operation a handler asks the gateway to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
	/// Raw user identifier as received by the handler.
	pub user_id: String,
	/// HTTP method; only `GET` responses are cached.
	pub method: Method,
	/// Resource path relative to the API base, starting with `/`.
	pub path: String,
	/// Query parameters sent with the request.
	pub params: BTreeMap<String, String>,
	/// Caching instructions.
	pub cache: CachePolicy,
	/// Instant after which the call must not still be waiting on the quota window.
	pub deadline: Option<OffsetDateTime>,
}
impl ApiRequest {
	/// Creates a request with caching enabled for [`ResourceKind::Other`].
	pub fn new(user_id: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
		Self {
			user_id: user_id.into(),
			method,
			path: path.into(),
			params: BTreeMap::new(),
			cache: CachePolicy::default(),
			deadline: None,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(user_id: impl Into<String>, path: impl Into<String>) -> Self {
		Self::new(user_id, Method::GET, path)
	}

	/// Adds or replaces a query parameter.
	pub fn param(mut self, name: impl Into<String>, value: impl Display) -> Self {
		self.params.insert(name.into(), value.to_string());

		self
	}

	/// Adds the parameter only when a value is present.
	pub fn param_opt(self, name: impl Into<String>, value: Option<impl Display>) -> Self {
		match value {
			Some(value) => self.param(name, value),
			None => self,
		}
	}

	/// Tags the request with a resource family, keeping caching enabled.
	pub fn resource(mut self, kind: ResourceKind) -> Self {
		self.cache = CachePolicy { resource: kind, ..self.cache };

		self
	}

	/// Replaces the caching instructions.
	pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
		self.cache = policy;

		self
	}

	/// Sets an absolute deadline.
	pub fn deadline(mut self, instant: OffsetDateTime) -> Self {
		self.deadline = Some(instant);

		self
	}

	/// Sets the deadline to `budget` from now.
	pub fn budget(self, budget: Duration) -> Self {
		self.deadline(OffsetDateTime::now_utc() + budget)
	}

	/// Validates and normalizes the request.
	pub(crate) fn prepare(self, max_per_page: u32) -> Result<PreparedRequest> {
		if self.user_id.trim().is_empty() {
			return Err(Error::MissingUserId);
		}

		let user_id = UserId::new(self.user_id).map_err(|e| {
			Error::invalid_parameter("user_id", e.to_string().trim_end_matches('.'))
		})?;

		validate_path(&self.path)?;

		let mut params = self.params;

		for name in ["page", "per_page"] {
			if let Some(raw) = params.get_mut(name) {
				let value = parse_positive(name, raw)?;
				let value = if name == "per_page" { value.min(max_per_page) } else { value };

				*raw = value.to_string();
			}
		}

		Ok(PreparedRequest {
			user_id,
			method: self.method,
			path: self.path,
			params,
			cache: self.cache,
			deadline: self.deadline,
		})
	}
}

/// Request after validation, with pagination normalized.
#[derive(Clone, Debug)]
pub(crate) struct PreparedRequest {
	pub(crate) user_id: UserId,
	pub(crate) method: Method,
	pub(crate) path: String,
	pub(crate) params: BTreeMap<String, String>,
	pub(crate) cache: CachePolicy,
	pub(crate) deadline: Option<OffsetDateTime>,
}
impl PreparedRequest {
	/// Fingerprint for cacheable requests; `None` when the response must not be cached.
	pub(crate) fn cache_key(&self) -> Option<CacheKey> {
		if !self.cache.enabled || self.method != Method::GET {
			return None;
		}

		Some(CacheKey::fingerprint(
			self.cache.resource,
			&self.user_id,
			self.method.as_str(),
			&self.path,
			&self.params,
		))
	}
}

/// Successful gateway response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payload {
	/// Decoded JSON body; an empty upstream body decodes as `null`.
	pub body: Value,
	/// `true` when the body came from the response cache.
	pub cached: bool,
}

fn validate_path(path: &str) -> Result<()> {
	let reason = if !path.starts_with('/') {
		"must start with `/`"
	} else if path.starts_with("//") {
		"must be relative to the API base"
	} else if path.contains(['?', '#']) {
		"must not carry a query or fragment; use params instead"
	} else if path.chars().any(char::is_whitespace) {
		"must not contain whitespace"
	} else {
		return Ok(());
	};

	Err(Error::invalid_parameter("path", reason))
}

fn parse_positive(name: &str, raw: &str) -> Result<u32> {
	match raw.trim().parse::<u32>() {
		Ok(0) => Err(Error::invalid_parameter(name, "must be at least 1")),
		Ok(value) => Ok(value),
		Err(_) => Err(Error::invalid_parameter(name, format!("`{raw}` is not a positive integer"))),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn empty_user_is_missing_and_malformed_user_is_invalid() {
		let missing = ApiRequest::get("", "/athlete").prepare(200).expect_err("Empty user must fail.");

		assert!(matches!(missing, Error::MissingUserId));

		let blank = ApiRequest::get("  ", "/athlete").prepare(200).expect_err("Blank user must fail.");

		assert!(matches!(blank, Error::MissingUserId));

		let malformed =
			ApiRequest::get("a b", "/athlete").prepare(200).expect_err("Malformed user must fail.");

		assert!(matches!(malformed, Error::InvalidParameter { ref name, .. } if name == "user_id"));
	}

	#[test]
	fn pagination_is_validated_and_clamped() {
		let zero = ApiRequest::get("42", "/athlete/activities")
			.param("page", 0)
			.prepare(200)
			.expect_err("Page zero must fail.");

		assert!(matches!(zero, Error::InvalidParameter { ref name, .. } if name == "page"));

		let text = ApiRequest::get("42", "/athlete/activities")
			.param("per_page", "many")
			.prepare(200)
			.expect_err("Non-numeric page size must fail.");

		assert!(matches!(text, Error::InvalidParameter { ref name, .. } if name == "per_page"));

		let clamped = ApiRequest::get("42", "/athlete/activities")
			.param("page", "02")
			.param("per_page", 500)
			.prepare(200)
			.expect("Oversized page size should be clamped.");

		assert_eq!(clamped.params["page"], "2");
		assert_eq!(clamped.params["per_page"], "200");
	}

	#[test]
	fn clamped_and_unclamped_requests_share_a_fingerprint() {
		let over = ApiRequest::get("42", "/athlete/activities")
			.resource(ResourceKind::Activities)
			.param("per_page", 500)
			.prepare(200)
			.expect("Request should prepare.");
		let exact = ApiRequest::get("42", "/athlete/activities")
			.resource(ResourceKind::Activities)
			.param("per_page", 200)
			.prepare(200)
			.expect("Request should prepare.");

		assert_eq!(over.cache_key(), exact.cache_key());
	}

	#[test]
	fn only_enabled_get_requests_have_cache_keys() {
		let get = ApiRequest::get("42", "/athlete").prepare(200).expect("GET should prepare.");
		let put = ApiRequest::new("42", Method::PUT, "/athlete")
			.prepare(200)
			.expect("PUT should prepare.");
		let disabled = ApiRequest::get("42", "/athlete")
			.cache_policy(CachePolicy::disabled())
			.prepare(200)
			.expect("Uncached GET should prepare.");

		assert!(get.cache_key().is_some());
		assert!(put.cache_key().is_none());
		assert!(disabled.cache_key().is_none());
	}

	#[test]
	fn paths_must_stay_under_the_api_base() {
		for path in ["athlete", "//evil.example/x", "/athlete?page=1", "/a b"] {
			let err = ApiRequest::get("42", path).prepare(200).expect_err("Bad path must fail.");

			assert!(matches!(err, Error::InvalidParameter { ref name, .. } if name == "path"));
		}
	}
}
