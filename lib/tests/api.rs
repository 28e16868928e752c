#![cfg(feature = "axum")]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use musicpreneur::auth::login::issue_token;
use musicpreneur::axum::{app, State};
use musicpreneur::collective::{self, ApplicationStatus};
use musicpreneur::mock::{FakeGateway, RecordingMailer};
use musicpreneur::user::{self, Access};
use musicpreneur::{Config, Database, User};

const ADMIN: &str = "admin@musicpreneur.test";
const WEBHOOK_SECRET: &str = "whsec_test";

struct TestApp {
    router: axum::Router,
    db: Arc<Database>,
    mailer: Arc<RecordingMailer>,
    gateway: Arc<FakeGateway>,
    /// Created on first upload only
    pdfs: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.pdfs);
    }
}

impl TestApp {
    fn new() -> Self {
        let pdfs = std::env::temp_dir().join(format!("musicpreneur-api-{}", uuid::Uuid::new_v4()));
        let mut config = Config::default();
        config.admins = vec![ADMIN.to_string()];
        config.storage.pdfs = pdfs.to_string_lossy().to_string();
        config.payments.stripe.signing_secret = WEBHOOK_SECRET.to_string();
        config.payments.stripe.test_signing_secret = WEBHOOK_SECRET.to_string();

        let db = Database::temporary().unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let gateway = Arc::new(FakeGateway::default());
        let router = app(State {
            config,
            db: db.clone(),
            mailer: mailer.clone(),
            gateway: gateway.clone(),
            cookie_key: cookie::Key::generate(),
        });
        Self {
            router,
            db: Arc::new(db),
            mailer,
            gateway,
            pdfs,
        }
    }

    fn user(&self, email: &str, access: Access) -> (User, String) {
        let user = User::new(email, "Test");
        user::create(&self.db, &user).unwrap();
        user::grant_access(&self.db, user.id, access).unwrap();
        let token = issue_token(&user.id, &self.db).unwrap();
        (user, token.id.to_string())
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = self.request(method, uri, token, body).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Places a guide order through checkout, returning the pending order.
    async fn pending_order(&self, token: &str) -> musicpreneur::Order {
        let (status, _) = self
            .json(
                Method::POST,
                "/api/checkout",
                Some(token),
                Some(json!({ "productId": "guide" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let orders = self.db.get_collection::<musicpreneur::Order>().unwrap();
        assert_eq!(orders.len(), 1);
        orders.into_iter().next().unwrap()
    }

    /// Delivers the event to the webhook the way stripe does, signed with
    /// the configured secret.
    #[cfg(feature = "stripe")]
    async fn deliver(&self, event: &Value) -> (StatusCode, Value) {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let payload = event.to_string();
        let t = chrono::Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(format!("{t}.{payload}").as_bytes());
        let signature = format!("t={t},v1={}", hex::encode(mac.finalize().into_bytes()));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/stripe")
            .header("stripe-signature", signature)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn upload(&self, token: &str, parts: &[(&str, &str)]) -> (StatusCode, Value) {
        const BOUNDARY: &str = "musicpreneur-boundary";
        let mut body = Vec::new();
        for (name, value) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            if *name == "file" {
                body.extend_from_slice(
                    b"Content-Disposition: form-data; name=\"file\"; filename=\"upload.pdf\"\r\n\
                      Content-Type: application/pdf\r\n\r\n",
                );
            } else {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/admin/content/upload-pdf")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

#[cfg(feature = "stripe")]
fn stripe_event(type_: &str, object: Value) -> Value {
    json!({
        "id": "evt_test_1",
        "object": "event",
        "api_version": "2023-10-16",
        "created": 1_700_000_000,
        "data": { "object": object },
        "livemode": false,
        "pending_webhooks": 1,
        "request": null,
        "type": type_,
    })
}

#[cfg(feature = "stripe")]
fn checkout_completed_event(order: &musicpreneur::Order) -> Value {
    stripe_event(
        "checkout.session.completed",
        json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "automatic_tax": { "enabled": false },
            "created": 1_700_000_000,
            "custom_fields": [],
            "custom_text": {},
            "expires_at": 1_700_086_400,
            "livemode": false,
            "metadata": {
                "orderId": order.id.to_string(),
                "userId": order.user_id.to_string(),
                "productId": "guide",
                "isBogoOrder": "false",
            },
            "mode": "payment",
            "payment_intent": "pi_test_1",
            "payment_method_types": ["card"],
            "payment_status": "paid",
            "shipping_options": [],
        }),
    )
}

#[cfg(feature = "stripe")]
fn subscription_event(type_: &str, status: &str, user: &User) -> Value {
    stripe_event(
        type_,
        json!({
            "id": "sub_test_1",
            "object": "subscription",
            "automatic_tax": { "enabled": false },
            "billing_cycle_anchor": 1_700_000_000,
            "cancel_at_period_end": false,
            "created": 1_700_000_000,
            "currency": "usd",
            "current_period_end": 1_702_592_000,
            "current_period_start": 1_700_000_000,
            "customer": "cus_test_1",
            "items": { "object": "list", "data": [], "has_more": false, "url": "/v1/subscription_items" },
            "livemode": false,
            "metadata": { "userId": user.id.to_string() },
            "start_date": 1_700_000_000,
            "status": status,
        }),
    )
}

fn application_form() -> Value {
    json!({
        "whyJoin": "I want peers who get it",
        "musicGoals": "Release an album",
        "guideImpact": "Changed how I plan",
        "communityHopes": "Accountability",
        "currentStage": "Independent artist",
    })
}

#[tokio::test]
async fn signup_then_login() {
    let app = TestApp::new();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "New@Artist.com",
                "password": "longenough",
                "firstName": "Nova",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "new@artist.com");

    let (status, _) = app
        .json(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "new@artist.com",
                "password": "longenough",
                "firstName": "Nova",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "new@artist.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "new@artist.com", "password": "longenough" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = app
        .json(
            Method::GET,
            "/api/collective/application-status",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = TestApp::new();
    let (status, _) = app
        .json(Method::GET, "/api/collective/application-status", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::GET,
            "/api/collective/application-status",
            Some("not-a-token"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn checkout_creates_pending_order() {
    let app = TestApp::new();
    let (user, token) = app.user("buyer@x.com", Access::default());

    let (status, body) = app
        .json(
            Method::POST,
            "/api/checkout",
            Some(&token),
            Some(json!({ "productId": "guide" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().contains("session_id=cs_test_"));

    let requests = app.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].user_id, user.id);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/checkout",
            Some(&token),
            Some(json!({ "productId": "poster" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bogo_checkout_rejects_self_gift() {
    let app = TestApp::new();
    let (_, token) = app.user("buyer@x.com", Access::default());

    let (status, _) = app
        .json(
            Method::POST,
            "/api/checkout",
            Some(&token),
            Some(json!({
                "productId": "bogo",
                "recipientInfo": { "firstName": "Me", "email": "BUYER@x.com" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/checkout",
            Some(&token),
            Some(json!({ "productId": "bogo" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.gateway.requests().is_empty());
}

#[tokio::test]
async fn downloads_require_ownership() {
    let app = TestApp::new();
    let (_, token) = app.user("reader@x.com", Access::default());

    let (status, _) = app
        .json(Method::GET, "/api/downloads/guide", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, owner) = app.user("owner@x.com", Access::for_product(musicpreneur::ProductId::Guide));
    let (status, body) = app
        .json(Method::GET, "/api/downloads/guide", Some(&owner), None)
        .await;
    // no pdf files are present in the test storage
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["productId"], "guide");
}

#[tokio::test]
async fn collective_application_review() {
    let app = TestApp::new();
    let (_, reader) = app.user("reader@x.com", Access::default());
    let (applicant, token) = app.user("artist@x.com", Access::GUIDE_AND_PLANNER);
    let (_, admin) = app.user(ADMIN, Access::default());

    let (status, _) = app
        .json(
            Method::POST,
            "/api/collective/apply",
            Some(&reader),
            Some(application_form()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/collective/apply",
            Some(&token),
            Some(application_form()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["applicationId"].as_str().unwrap().to_string();

    let (status, _) = app
        .json(
            Method::POST,
            "/api/collective/apply",
            Some(&token),
            Some(application_form()),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            Method::GET,
            "/api/collective/portal-content",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let approve = format!("/api/admin/collective/applications/{id}/approve");
    let (status, _) = app
        .json(Method::POST, &approve, Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(
            Method::POST,
            &approve,
            Some(&admin),
            Some(json!({ "welcomeMessage": "See you Thursday" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.json(Method::POST, &approve, Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stored = collective::latest_application(&app.db, applicant.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ApplicationStatus::Approved);
    assert_eq!(stored.reviewed_by.as_deref(), Some(ADMIN));

    let welcome = app
        .mailer
        .sent()
        .into_iter()
        .filter(|e| e.to == "artist@x.com")
        .count();
    assert_eq!(welcome, 1);

    // Approval alone doesn't make a member, membership comes with the
    // subscription or a manual grant.
    let (status, _) = app
        .json(
            Method::GET,
            "/api/collective/portal-content",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let toggle = format!("/api/admin/collective/members/{}/toggle-access", applicant.id);
    let (status, _) = app
        .json(
            Method::POST,
            &toggle,
            Some(&admin),
            Some(json!({ "grantAccess": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .json(
            Method::GET,
            "/api/collective/portal-content",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["welcomeMessage"].is_string());

    let (status, body) = app
        .json(
            Method::GET,
            "/api/admin/collective/applications?status=approved",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app
        .json(
            Method::GET,
            "/api/admin/collective/applications?status=maybe",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_toggles_member_access() {
    let app = TestApp::new();
    let (member, _) = app.user("member@x.com", Access::GUIDE_AND_PLANNER);
    let (_, admin) = app.user(ADMIN, Access::default());

    let uri = format!("/api/admin/collective/members/{}/toggle-access", member.id);
    let (status, body) = app
        .json(
            Method::POST,
            &uri,
            Some(&admin),
            Some(json!({ "grantAccess": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isCollectiveMember"], true);

    let (status, body) = app
        .json(Method::GET, "/api/admin/collective/members", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["email"], "member@x.com");

    let unknown = format!(
        "/api/admin/collective/members/{}/toggle-access",
        uuid::Uuid::new_v4()
    );
    let (status, _) = app
        .json(
            Method::POST,
            &unknown,
            Some(&admin),
            Some(json!({ "grantAccess": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let app = TestApp::new();
    let (_, token) = app.user("someone@x.com", Access::default());
    let (user, _) = app.user("other@x.com", Access::default());
    let user_uri = format!("/api/admin/users/{}", user.id);
    for uri in [
        "/api/admin/stats",
        "/api/admin/analytics",
        "/api/admin/orders",
        "/api/admin/emails",
        "/api/admin/emails/export",
        user_uri.as_str(),
    ] {
        let (status, _) = app.json(Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
    let (status, _) = app
        .json(
            Method::PATCH,
            &user_uri,
            Some(&token),
            Some(json!({ "ownsGuide": true })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.upload(&token, &[("type", "guide"), ("file", "%PDF")]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!app.pdfs.exists());
}

#[tokio::test]
async fn admin_inspects_and_updates_user() {
    let app = TestApp::new();
    let (_, admin) = app.user(ADMIN, Access::default());
    let (buyer, token) = app.user("buyer@x.com", Access::default());
    let order = app.pending_order(&token).await;

    let uri = format!("/api/admin/users/{}", buyer.id);
    let (status, body) = app.json(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "buyer@x.com");
    assert_eq!(body["user"]["orders"][0]["id"], order.id.to_string());
    assert_eq!(body["user"]["orders"][0]["status"], "pending");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app
        .json(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "ownsGuide": true, "isCollectiveMember": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["ownsGuide"], true);
    assert_eq!(body["user"]["ownsPlanner"], false);
    assert_eq!(body["user"]["isCollectiveMember"], true);
    let stored = app.db.get::<User>(buyer.id).unwrap();
    assert!(stored.owns_guide && stored.collective_approved_at.is_some());

    let (status, _) = app
        .json(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "isCollectiveMember": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let stored = app.db.get::<User>(buyer.id).unwrap();
    assert!(!stored.is_collective_member && stored.collective_approved_at.is_none());
    assert!(stored.owns_guide);

    let unknown = format!("/api/admin/users/{}", uuid::Uuid::new_v4());
    let (status, _) = app.json(Method::GET, &unknown, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_analytics_cover_window() {
    let app = TestApp::new();
    let (_, admin) = app.user(ADMIN, Access::default());
    let (_, token) = app.user("buyer@x.com", Access::default());
    app.pending_order(&token).await;

    let (status, body) = app
        .json(Method::GET, "/api/admin/analytics?days=7", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["revenueByDate"].as_object().unwrap().is_empty());
    assert!(body["recentOrders"].as_array().unwrap().is_empty());
    assert_eq!(body["collective"]["totalApplications"], 0);
    assert_eq!(body["collective"]["approvalRate"], 0.0);
    let signups: u64 = body["userGrowth"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(signups, 2);

    let (status, _) = app
        .json(Method::GET, "/api/admin/analytics?days=soon", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn uploaded_pdf_becomes_downloadable() {
    let app = TestApp::new();
    let (_, admin) = app.user(ADMIN, Access::default());
    let (_, owner) = app.user("owner@x.com", Access::GUIDE_AND_PLANNER);

    let (status, body) = app
        .upload(&admin, &[("type", "guide"), ("file", "%PDF-1.7")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "The_Mindful_Musicpreneur_Guide.pdf");
    assert_eq!(body["size"], 8);

    let (status, bytes) = app
        .request(Method::GET, "/api/downloads/guide", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"%PDF-1.7");

    let (status, _) = app
        .upload(&admin, &[("type", "ebook"), ("file", "%PDF")])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.upload(&admin, &[("type", "planner")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn freebie_signup_and_export() {
    let app = TestApp::new();
    let (_, admin) = app.user(ADMIN, Access::default());

    let (status, body) = app
        .json(
            Method::POST,
            "/api/freebie",
            None,
            Some(json!({ "firstName": "Fay", "email": "fay@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(app.mailer.sent().iter().any(|e| e.to == "fay@x.com"));

    let (status, bytes) = app
        .request(Method::GET, "/api/admin/emails/export", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(bytes).unwrap();
    assert!(csv.starts_with("Email,First Name,Source,Subscribed At"));
    assert!(csv.contains("fay@x.com,Fay,freebie,"));

    let (status, _) = app
        .json(
            Method::POST,
            "/api/unsubscribe",
            None,
            Some(json!({ "email": "fay@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, bytes) = app
        .request(Method::GET, "/api/admin/emails/export", Some(&admin), None)
        .await;
    assert!(!String::from_utf8(bytes).unwrap().contains("fay@x.com"));

    let (status, body) = app
        .json(Method::GET, "/api/admin/emails", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let subscribers = body["subscribers"].as_array().unwrap();
    assert_eq!(subscribers.len(), 1);
    assert_eq!(subscribers[0]["email"], "fay@x.com");
    assert_eq!(subscribers[0]["subscribed"], false);
}

#[cfg(feature = "stripe")]
#[tokio::test]
async fn webhook_requires_valid_signature() {
    let app = TestApp::new();
    let payload = json!({ "type": "checkout.session.completed" });

    let (status, _) = app
        .json(Method::POST, "/api/webhooks/stripe", None, Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/stripe")
        .header("stripe-signature", "t=1,v1=deadbeef")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[cfg(feature = "stripe")]
#[tokio::test]
async fn webhook_fulfills_order_once() {
    let app = TestApp::new();
    let (buyer, token) = app.user("buyer@x.com", Access::default());
    let order = app.pending_order(&token).await;
    let event = checkout_completed_event(&order);

    let (status, body) = app.deliver(&event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    let stored = app.db.get::<musicpreneur::Order>(order.id).unwrap();
    assert!(stored.is_completed() && stored.completed_at.is_some());
    assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_test_1"));
    let stored = app.db.get::<User>(buyer.id).unwrap();
    assert!(stored.owns_guide && stored.owns_planner);
    assert_eq!(app.mailer.sent().len(), 1);

    let (status, body) = app.deliver(&event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));
    assert_eq!(app.mailer.sent().len(), 1);
}

#[cfg(feature = "stripe")]
#[tokio::test]
async fn webhook_store_failure_asks_for_redelivery() {
    use musicpreneur::db::Collectable;

    let app = TestApp::new();
    let (buyer, token) = app.user("buyer@x.com", Access::default());
    let order = app.pending_order(&token).await;
    let event = checkout_completed_event(&order);

    app.db
        .set_raw_at(User::get_collection_name(), &"corrupted", buyer.id)
        .unwrap();
    let (status, _) = app.deliver(&event).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!app.db.get::<musicpreneur::Order>(order.id).unwrap().is_completed());
    assert!(app.mailer.sent().is_empty());

    app.db.set(&buyer).unwrap();
    let (status, _) = app.deliver(&event).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.db.get::<musicpreneur::Order>(order.id).unwrap().is_completed());
    assert!(app.db.get::<User>(buyer.id).unwrap().owns_guide);
    assert_eq!(app.mailer.sent().len(), 1);
}

#[cfg(feature = "stripe")]
#[tokio::test]
async fn webhook_subscription_events_set_membership() {
    let app = TestApp::new();
    let (member, _) = app.user("member@x.com", Access::GUIDE_AND_PLANNER);

    let created = subscription_event("customer.subscription.created", "active", &member);
    let (status, _) = app.deliver(&created).await;
    assert_eq!(status, StatusCode::OK);
    let stored = app.db.get::<User>(member.id).unwrap();
    assert!(stored.is_collective_member && stored.collective_approved_at.is_some());
    assert_eq!(stored.collective_stripe_subscription_id.as_deref(), Some("sub_test_1"));

    let deleted = subscription_event("customer.subscription.deleted", "canceled", &member);
    let (status, _) = app.deliver(&deleted).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.db.get::<User>(member.id).unwrap().is_collective_member);
}
