#![cfg(feature = "reqwest")]

mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use common::*;
use fitness_gateway::{
	auth::UserId,
	cache::CachePolicy,
	error::{AuthError, Error},
	gateway::ApiRequest,
	store::CredentialStore,
};

const ROTATED_EXPIRY: i64 = 4_102_444_800;

fn rotated_grant(access: &str, refresh: Option<&str>) -> serde_json::Value {
	let mut body = json!({
		"token_type": "Bearer",
		"access_token": access,
		"expires_at": ROTATED_EXPIRY,
		"expires_in": 21600,
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = json!(refresh);
	}

	body
}

#[tokio::test]
async fn rejected_token_is_refreshed_once_and_the_call_retried() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server);

	seed_record(&store, "A1", "R1").await;

	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/athlete").header("authorization", bearer("A1"));
			then.status(401).json_body(json!({ "message": "Authorization Error" }));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/athlete").header("authorization", bearer("A2"));
			then.status(200).json_body(json!({ "id": 3_329_857 }));
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=R1")
				.body_includes("client_secret=secret-gateway");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(rotated_grant("A2", Some("R2")));
		})
		.await;
	let payload = gateway.athlete(USER).await.expect("Call should recover after one refresh.");

	rejected.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
	token.assert_calls_async(1).await;

	assert_eq!(payload.body, json!({ "id": 3_329_857 }));

	let stored = stored_record(&store).await;

	assert_eq!(stored.access_token.expose(), "A2");
	assert_eq!(stored.refresh_token.expose(), "R2");
	assert_eq!(stored.expires_at_unix(), ROTATED_EXPIRY);
	assert_eq!(gateway.stats().refreshes, 1);
}

#[tokio::test]
async fn omitted_refresh_token_keeps_the_previous_one() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server);

	seed_record(&store, "A1", "R1").await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(rotated_grant("A2", None));
		})
		.await;

	let record = gateway.refresh(&user()).await.expect("Explicit refresh should succeed.");

	assert_eq!(record.access_token.expose(), "A2");
	assert_eq!(record.refresh_token.expose(), "R1");
	assert_eq!(stored_record(&store).await.refresh_token.expose(), "R1");
}

#[tokio::test]
async fn second_rejection_is_authentication_expired() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server);

	seed_record(&store, "A1", "R1").await;

	let resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/athlete");
			then.status(401);
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(rotated_grant("A2", Some("R2")));
		})
		.await;
	let err = gateway.athlete(USER).await.expect_err("Second 401 must not be retried again.");

	resource.assert_calls_async(2).await;
	token.assert_calls_async(1).await;

	assert!(matches!(err, Error::AuthenticationExpired { .. }), "Unexpected error: {err:?}");
	assert_eq!(err.code(), "TOKEN_REFRESH_FAILED");
}

#[tokio::test]
async fn failed_refresh_is_authentication_expired() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server);

	seed_record(&store, "A1", "R1").await;

	let resource = server
		.mock_async(|when, then| {
			when.method(GET).path("/athlete");
			then.status(401);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400).header("content-type", "application/json").json_body(json!({
				"error": "invalid_grant",
				"error_description": "refresh token revoked",
			}));
		})
		.await;

	let err = gateway.athlete(USER).await.expect_err("Revoked refresh token must fail the call.");

	resource.assert_calls_async(1).await;

	match err {
		Error::AuthenticationExpired { reason } => assert!(reason.contains("invalid_grant")),
		other => panic!("Unexpected error: {other:?}"),
	}
	assert_eq!(stored_record(&store).await.access_token.expose(), "A1");
}

#[tokio::test]
async fn concurrent_rejections_share_one_refresh() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server);

	seed_record(&store, "A1", "R1").await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/athlete").header("authorization", bearer("A1"));
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/athlete").header("authorization", bearer("A2"));
			then.status(200).json_body(json!({ "id": 1 }));
		})
		.await;

	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(100))
				.json_body(rotated_grant("A2", Some("R2")));
		})
		.await;
	let request = || ApiRequest::get(USER, "/athlete").cache_policy(CachePolicy::disabled());
	let (first, second) = tokio::join!(gateway.call(request()), gateway.call(request()));

	first.expect("First concurrent call should succeed.");
	second.expect("Second concurrent call should succeed.");
	token.assert_calls_async(1).await;

	assert_eq!(gateway.stats().refreshes, 1);
}

#[tokio::test]
async fn explicit_refresh_without_credential_is_missing_credential() {
	let server = MockServer::start_async().await;
	let (gateway, _store) = build_reqwest_test_gateway(&server);
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200);
		})
		.await;
	let err = gateway.refresh(&user()).await.expect_err("Unknown users cannot be refreshed.");

	token.assert_calls_async(0).await;

	assert!(matches!(err, AuthError::MissingCredential { ref user_id } if user_id == USER));
}

#[tokio::test]
async fn code_exchange_stores_the_first_credential() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server);
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=consent-code");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"token_type": "Bearer",
				"access_token": "A1",
				"refresh_token": "R1",
				"expires_at": ROTATED_EXPIRY,
				"athlete": { "id": 3_329_857, "firstname": "Rogerio" },
			}));
		})
		.await;
	let record = gateway.exchange_code("consent-code").await.expect("Code exchange should succeed.");

	token.assert_async().await;

	assert_eq!(record.user_id.as_ref(), USER);

	let stored = store
		.get_token(&UserId::new(USER).expect("User fixture should be valid."))
		.await
		.expect("Memory store reads should succeed.")
		.expect("Exchanged credential should be stored.");

	assert_eq!(stored.access_token.expose(), "A1");
	assert_eq!(stored.refresh_token.expose(), "R1");
}

#[tokio::test]
async fn code_exchange_requires_an_athlete() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(rotated_grant("A1", Some("R1")));
		})
		.await;

	let err = gateway.exchange_code("consent-code").await.expect_err("Athlete id is required.");

	assert!(matches!(err, AuthError::MissingAthlete));
	assert_eq!(store.get_token(&user()).await.expect("Memory store reads should succeed."), None);
}
