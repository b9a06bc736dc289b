use std::sync::Mutex;
use std::time::Duration;

use myalgorithm_session::{
    ClientConfig, Error, ExchangeOutcome, GuardDecision, HttpBackend, Navigator, PaymentOutcome,
    Plan, Reconciliation, Session, SessionManager,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingNavigator(Mutex<Vec<String>>);

impl RecordingNavigator {
    fn visits(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn replace(&self, path: &str) {
        self.0.lock().unwrap().push(path.to_owned());
    }
}

fn user_json(id: &str, plan: &str) -> serde_json::Value {
    json!({
        "user_id": id,
        "email": format!("{id}@example.com"),
        "name": "Test User",
        "picture": "",
        "plan": plan,
    })
}

fn manager(server: &MockServer) -> SessionManager<HttpBackend> {
    let config = ClientConfig::new(server.uri().parse().unwrap())
        .with_payment_poll_interval(Duration::from_millis(10));
    let backend = HttpBackend::new(&config).unwrap();
    SessionManager::new(backend, config)
}

fn app(location: &str) -> Url {
    format!("https://app.example.com{location}").parse().unwrap()
}

async fn mount_me(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(response)
        .mount(server)
        .await;
}

// ── Reconciliation ─────────────────────────────────────────────────

#[tokio::test]
async fn unauthorized_me_resolves_signed_out() {
    let server = MockServer::start().await;
    mount_me(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({"detail": "Not authenticated"})),
    )
    .await;
    let sessions = manager(&server);
    let nav = RecordingNavigator::default();

    assert_eq!(sessions.guard("/dashboard"), GuardDecision::Loading);
    let r = sessions.reconcile(&app("/dashboard"), &nav).await;

    assert_eq!(r, Reconciliation::Probed);
    assert_eq!(sessions.snapshot(), Session::Unauthenticated);
    assert_eq!(
        sessions.guard("/dashboard"),
        GuardDecision::RedirectToSignIn {
            location: "/login?from=%2Fdashboard".into()
        }
    );
}

#[tokio::test]
async fn me_success_stores_exact_user() {
    let server = MockServer::start().await;
    mount_me(&server, ResponseTemplate::new(200).set_body_json(user_json("u1", "pro"))).await;
    let sessions = manager(&server);

    let session = sessions.probe_session().await;

    let user = session.user().expect("signed in");
    assert_eq!(user.id.to_string(), "u1");
    assert_eq!(user.plan, Plan::Pro);
    assert_eq!(user.email, "u1@example.com");
    assert_eq!(sessions.snapshot(), session);
    assert_eq!(sessions.guard("/dashboard"), GuardDecision::Render);
}

#[tokio::test]
async fn oauth_fragment_is_exchanged_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/session"))
        .and(body_json(json!({"session_id": "abc123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u2", "free")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u2", "free")))
        .expect(1)
        .mount(&server)
        .await;
    let sessions = manager(&server);
    let nav = RecordingNavigator::default();
    let callback = app("/dashboard#session_id=abc123");

    let first = sessions.reconcile(&callback, &nav).await;
    let second = sessions.reconcile(&callback, &nav).await;

    assert_eq!(first, Reconciliation::OAuth(ExchangeOutcome::SignedIn));
    assert_eq!(second, Reconciliation::AlreadyRan);
    let session = sessions.snapshot();
    assert_eq!(session.user().map(|u| u.id.to_string()), Some("u2".into()));
    assert_eq!(session.user().map(|u| u.plan), Some(Plan::Free));
    assert_eq!(nav.visits(), vec!["/dashboard".to_owned()]);
}

#[tokio::test]
async fn oauth_rejection_redirects_without_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/session"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Invalid Google session"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u1", "pro")))
        .expect(0)
        .mount(&server)
        .await;
    let sessions = manager(&server);
    let nav = RecordingNavigator::default();

    let r = sessions
        .reconcile(&app("/dashboard#session_id=abc123"), &nav)
        .await;

    assert_eq!(r, Reconciliation::OAuth(ExchangeOutcome::Rejected));
    assert_eq!(sessions.snapshot(), Session::Unauthenticated);
    assert_eq!(nav.visits(), vec!["/login".to_owned()]);
}

#[tokio::test]
async fn callback_without_token_never_calls_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/session"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let sessions = manager(&server);
    let nav = RecordingNavigator::default();

    let r = sessions
        .reconcile(&app("/dashboard#foo=bar&session_id="), &nav)
        .await;

    assert_eq!(r, Reconciliation::OAuth(ExchangeOutcome::MissingToken));
    assert_eq!(nav.visits(), vec!["/login".to_owned()]);
    assert_eq!(sessions.snapshot(), Session::Unauthenticated);
}

// ── Transitions ────────────────────────────────────────────────────

#[tokio::test]
async fn logout_failure_still_signs_out() {
    let server = MockServer::start().await;
    mount_me(&server, ResponseTemplate::new(200).set_body_json(user_json("u1", "pro"))).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    let sessions = manager(&server);
    sessions.probe_session().await;
    assert!(sessions.snapshot().is_authenticated());

    sessions.logout().await;

    assert_eq!(sessions.snapshot(), Session::Unauthenticated);
    assert!(sessions.snapshot().user().is_none());
}

#[tokio::test]
async fn failed_login_keeps_existing_user() {
    let server = MockServer::start().await;
    mount_me(&server, ResponseTemplate::new(200).set_body_json(user_json("userA", "premium"))).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid credentials"})))
        .mount(&server)
        .await;
    let sessions = manager(&server);
    let before = sessions.probe_session().await;

    let err = sessions.login("userA@example.com", "wrong").await.unwrap_err();

    assert!(matches!(err, Error::Rejected { status: 401, .. }));
    assert_eq!(err.user_message("Login failed"), "Invalid credentials");
    assert_eq!(sessions.snapshot(), before);
}

#[tokio::test]
async fn login_cookie_is_sent_on_next_probe() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "a@example.com", "password": "hunter22"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session_token=sess_abc; Path=/; HttpOnly")
                .set_body_json(user_json("u3", "free")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("cookie", "session_token=sess_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u3", "pro")))
        .expect(1)
        .mount(&server)
        .await;
    let sessions = manager(&server);

    let user = sessions.login("a@example.com", "hunter22").await.unwrap();
    assert_eq!(user.plan, Plan::Free);

    let refreshed = sessions.refresh().await;
    assert!(refreshed.has_access(Plan::Pro));
}

#[tokio::test]
async fn duplicate_registration_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Email already registered"})))
        .mount(&server)
        .await;
    let sessions = manager(&server);

    let err = sessions
        .register("Ann", "ann@example.com", "secret1")
        .await
        .unwrap_err();

    assert_eq!(err.user_message("Registration failed"), "Email already registered");
    assert_eq!(sessions.snapshot(), Session::Unknown);
}

#[tokio::test]
async fn short_registration_secret_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u4", "free")))
        .expect(0)
        .mount(&server)
        .await;
    let sessions = manager(&server);

    let err = sessions.register("Ann", "ann@example.com", "abc").await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn profile_update_adopts_returned_user() {
    let server = MockServer::start().await;
    mount_me(&server, ResponseTemplate::new(200).set_body_json(user_json("u1", "free"))).await;
    Mock::given(method("PUT"))
        .and(path("/api/account/profile"))
        .and(body_json(json!({"name": "Renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "u1",
            "email": "u1@example.com",
            "name": "Renamed",
            "plan": "free",
        })))
        .expect(1)
        .mount(&server)
        .await;
    let sessions = manager(&server);
    sessions.probe_session().await;

    sessions.update_profile(Some("Renamed"), Some("  ")).await.unwrap();

    assert_eq!(
        sessions.snapshot().user().map(|u| u.name.clone()),
        Some("Renamed".into())
    );
}

#[tokio::test]
async fn password_reset_posts_trimmed_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/reset-password"))
        .and(body_json(json!({"email": "ann@example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "sent"})))
        .expect(1)
        .mount(&server)
        .await;
    let sessions = manager(&server);

    sessions.request_password_reset("  ann@example.com ").await.unwrap();

    assert_eq!(sessions.snapshot(), Session::Unknown);
}

#[tokio::test]
async fn password_reset_rejection_carries_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/reset-password"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "No account for that email"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let sessions = manager(&server);

    let err = sessions.request_password_reset("nobody@example.com").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.user_message("Could not send reset email"), "No account for that email");
}

#[tokio::test]
async fn blank_reset_email_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/reset-password"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let sessions = manager(&server);

    let err = sessions.request_password_reset("   ").await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
}

// ── Billing ────────────────────────────────────────────────────────

#[tokio::test]
async fn paid_checkout_refreshes_plan() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/billing/status/cs_test_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "complete",
            "payment_status": "paid",
            "amount_total": 7900,
            "currency": "usd",
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_me(&server, ResponseTemplate::new(200).set_body_json(user_json("u1", "premium"))).await;
    let sessions = manager(&server);

    let outcome = sessions.await_payment("cs_test_1").await.unwrap();

    match outcome {
        PaymentOutcome::Paid(status) => assert_eq!(status.amount_total, Some(7900)),
        other => panic!("expected paid, got {other:?}"),
    }
    assert!(sessions.snapshot().has_access(Plan::Premium));
}

#[tokio::test]
async fn expired_checkout_stops_polling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/billing/status/cs_test_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "expired",
            "payment_status": "unpaid",
        })))
        .expect(1)
        .mount(&server)
        .await;
    let sessions = manager(&server);

    let outcome = sessions.await_payment("cs_test_2").await.unwrap();

    assert!(matches!(outcome, PaymentOutcome::Expired(_)));
    assert_eq!(sessions.snapshot(), Session::Unknown);
}

#[tokio::test]
async fn pending_checkout_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/billing/status/cs_test_3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "open",
            "payment_status": "unpaid",
        })))
        .expect(5)
        .mount(&server)
        .await;
    let sessions = manager(&server);

    let outcome = sessions.await_payment("cs_test_3").await.unwrap();

    assert_eq!(outcome, PaymentOutcome::TimedOut { attempts: 5 });
}
