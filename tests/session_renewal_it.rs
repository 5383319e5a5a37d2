#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use bearer_session::{
	_preludet::*, event::SessionEvent, request::RequestDescriptor, serde_json,
	store::CredentialStore,
};

const STALE: &str = "stale-token";
const FRESH: &str = "fresh-token";

fn bearer(token: &str) -> String {
	format!("Bearer {token}")
}

async fn mock_protected<'a>(
	server: &'a MockServer,
	path: &str,
) -> (httpmock::Mock<'a>, httpmock::Mock<'a>) {
	let rejects_stale = server
		.mock_async(|when, then| {
			when.method(GET).path(path.to_string()).header("authorization", bearer(STALE));
			then.status(401);
		})
		.await;
	let accepts_fresh = server
		.mock_async(|when, then| {
			when.method(GET).path(path.to_string()).header("authorization", bearer(FRESH));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"items\":[]}");
		})
		.await;

	(rejects_stale, accepts_fresh)
}

fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
	let mut events = Vec::new();

	while let Ok(event) = rx.try_recv() {
		events.push(event);
	}

	events
}

#[tokio::test]
async fn concurrent_401s_share_a_single_renewal() {
	let server = MockServer::start_async().await;
	let (session, store) = build_test_session(test_session_config(&server.base_url()));

	seed_token(&session, STALE).await;

	let mut events = session.subscribe();
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!("{{\"access_token\":\"{FRESH}\"}}"))
				.delay(std::time::Duration::from_millis(200));
		})
		.await;
	let (orders_stale, orders_fresh) = mock_protected(&server, "/orders").await;
	let (profile_stale, profile_fresh) = mock_protected(&server, "/profile").await;

	let (orders, profile) = tokio::join!(
		session.issue(RequestDescriptor::get("/orders")),
		session.issue(RequestDescriptor::get("/profile")),
	);
	let orders = orders.expect("Orders request should succeed after renewal.");
	let profile = profile.expect("Profile request should succeed after renewal.");

	assert_eq!(orders.status, 200);
	assert_eq!(profile.status, 200);

	refresh.assert_calls_async(1).await;
	orders_stale.assert_calls_async(1).await;
	profile_stale.assert_calls_async(1).await;
	orders_fresh.assert_calls_async(1).await;
	profile_fresh.assert_calls_async(1).await;

	assert_eq!(
		session.current_token().map(|token| token.expose().to_string()),
		Some(FRESH.into()),
		"The renewed token must replace the stale one.",
	);

	let persisted = store
		.load()
		.await
		.expect("Store load should succeed after renewal.")
		.expect("Renewed credential should be persisted.");

	assert_eq!(persisted.access_token.expose(), FRESH);
	assert!(drain_events(&mut events).contains(&SessionEvent::TokenRefreshed));
}

#[tokio::test]
async fn late_401_joins_inflight_renewal_instead_of_starting_another() {
	let server = MockServer::start_async().await;
	let (session, _store) = build_test_session(test_session_config(&server.base_url()));

	seed_token(&session, STALE).await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!("{{\"access_token\":\"{FRESH}\"}}"))
				.delay(std::time::Duration::from_millis(300));
		})
		.await;
	let _orders = mock_protected(&server, "/orders").await;
	let _profile = mock_protected(&server, "/profile").await;

	let early = session.issue(RequestDescriptor::get("/orders"));
	let late = async {
		// Arrives while the renewal call is still outstanding.
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		session.issue(RequestDescriptor::get("/profile")).await
	};
	let (early, late) = tokio::join!(early, late);

	early.expect("Early request should succeed after renewal.");
	late.expect("Late request should succeed by joining the in-flight renewal.");

	refresh.assert_calls_async(1).await;
}

#[tokio::test]
async fn renewal_failure_rejects_all_waiters_and_wipes_the_credential() {
	let server = MockServer::start_async().await;
	let (session, store) = build_test_session(test_session_config(&server.base_url()));

	seed_token(&session, STALE).await;

	let mut events = session.subscribe();
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401).delay(std::time::Duration::from_millis(200));
		})
		.await;
	let _orders = mock_protected(&server, "/orders").await;
	let _profile = mock_protected(&server, "/profile").await;

	let (orders, profile) = tokio::join!(
		session.issue(RequestDescriptor::get("/orders")),
		session.issue(RequestDescriptor::get("/profile")),
	);
	let orders = orders.expect_err("Orders request must fail when renewal fails.");
	let profile = profile.expect_err("Profile request must fail when renewal fails.");

	assert!(orders.is_session_expired());
	assert!(profile.is_session_expired());

	refresh.assert_calls_async(1).await;

	assert!(session.current_token().is_none(), "Credential must be wiped on renewal failure.");
	assert!(
		store.load().await.expect("Store load should succeed.").is_none(),
		"Persisted credential must be wiped on renewal failure.",
	);
	assert!(drain_events(&mut events).contains(&SessionEvent::SessionExpired));
}

#[tokio::test]
async fn second_401_after_renewal_is_fatal_not_a_second_renewal() {
	let server = MockServer::start_async().await;
	let (session, _store) = build_test_session(test_session_config(&server.base_url()));

	seed_token(&session, STALE).await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!("{{\"access_token\":\"{FRESH}\"}}"));
		})
		.await;
	// The endpoint rejects the fresh token too, so the replay 401s again.
	let orders = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders");
			then.status(401);
		})
		.await;
	let err = session
		.issue(RequestDescriptor::get("/orders"))
		.await
		.expect_err("A replay that 401s again must end the session.");

	assert!(err.is_session_expired());

	refresh.assert_calls_async(1).await;
	orders.assert_calls_async(2).await;
}

#[tokio::test]
async fn auth_endpoint_401_propagates_without_renewal() {
	let server = MockServer::start_async().await;
	let (session, _store) = build_test_session(test_session_config(&server.base_url()));

	seed_token(&session, STALE).await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!("{{\"access_token\":\"{FRESH}\"}}"));
		})
		.await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(401);
		})
		.await;
	let descriptor = RequestDescriptor::post("/auth/login")
		.with_json(serde_json::json!({ "username": "diver", "password": "wrong" }));
	let err = session
		.issue(descriptor)
		.await
		.expect_err("A rejected login must propagate directly.");

	assert!(err.is_session_expired());

	login.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn malformed_renewal_payload_ends_the_session() {
	let server = MockServer::start_async().await;
	let (session, _store) = build_test_session(test_session_config(&server.base_url()));

	seed_token(&session, STALE).await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).header("content-type", "application/json").body("{\"token\":\"x\"}");
		})
		.await;
	let _orders = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders");
			then.status(401);
		})
		.await;
	let err = session
		.issue(RequestDescriptor::get("/orders"))
		.await
		.expect_err("A renewal payload without an access token must fail the session.");

	assert!(err.is_session_expired());

	refresh.assert_calls_async(1).await;
}
