//! End-to-end HTTP tests against a real listener.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tujali_server::{build_app, AppConfig, AppState, SharedState};
use tujali_storage::Database;

const SERVICE_CODE: &str = "*384*123#";
const PHONE: &str = "+254722100200";

struct TestServer {
    base: String,
    client: Client,
    state: SharedState,
}

impl TestServer {
    async fn start() -> Self {
        let store = Arc::new(Database::open_in_memory().unwrap());
        let state = Arc::new(AppState::new(store, &AppConfig::default()).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        Self {
            base: format!("http://{addr}"),
            client: Client::new(),
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn dial(&self, session_id: &str, text: &str) -> (StatusCode, String) {
        let response = self
            .client
            .post(self.url("/ussd"))
            .form(&[
                ("sessionId", session_id),
                ("serviceCode", SERVICE_CODE),
                ("phoneNumber", PHONE),
                ("text", text),
            ])
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.text().await.unwrap())
    }

    /// Register a provider and return a bearer token for it
    async fn provider_token(&self, username: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@tujali.health"),
                "password": "s3cure-passw0rd",
                "name": "Dr. Wanjiru Kamau",
                "specialization": "General Practice",
                "license_number": "KMPDC-7781",
                "location": "Nakuru",
                "consultation_fee": 800.0
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let login: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": "s3cure-passw0rd" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        login["token"].as_str().unwrap().to_string()
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let response = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        (response.status(), response.json().await.unwrap())
    }

    async fn send(&self, token: &str, method: reqwest::Method, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        (response.status(), response.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_ussd_registration_round_trips() {
    let server = TestServer::start().await;

    let (status, body) = server.dial("ATUid_r1", "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("CON Welcome to Tujali Health"));

    let (_, body) = server.dial("ATUid_r1", "4").await;
    assert!(body.starts_with("CON "));

    let (_, body) = server.dial("ATUid_r1", "4*Amina Hassan*29*2*Garissa").await;
    assert_eq!(body, "END Thank you Amina Hassan. You are now registered with Tujali Health.");
    assert!(server.state.ussd.sessions().is_empty());
}

#[tokio::test]
async fn test_ussd_rejects_unknown_service_code() {
    let server = TestServer::start().await;
    let response = server
        .client
        .post(server.url("/ussd"))
        .form(&[
            ("sessionId", "ATUid_x"),
            ("serviceCode", "*000#"),
            ("phoneNumber", PHONE),
            ("text", ""),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().starts_with("END "));
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let server = TestServer::start().await;
    server.provider_token("wkamau").await;

    let response = server
        .client
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": "wkamau@tujali.health", "password": "s3cure-passw0rd" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("tujali_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let session = cookie.split(';').next().unwrap().to_string();
    let me: Value = server
        .client
        .get(server.url("/api/auth/me"))
        .header(reqwest::header::COOKIE, session)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["user"]["username"], "wkamau");
    assert!(me["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_bad_login_and_logout() {
    let server = TestServer::start().await;
    let token = server.provider_token("ochieng").await;

    let response = server
        .client
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": "ochieng", "password": "not-the-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = server.send(&token, reqwest::Method::POST, "/api/auth/logout", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = server.get(&token, "/api/patients").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_booking_payment_and_refund() {
    let server = TestServer::start().await;
    let token = server.provider_token("njeri").await;

    // Book over USSD near Nakuru: physical visit, nearest provider, tomorrow, 09:00, confirm
    let (_, body) = server.dial("ATUid_b1", "1*Nakuru*1*1*2*1*1").await;
    assert!(body.starts_with("END Appointment confirmed!"), "{body}");
    assert!(body.contains("Fee: KES 800"));

    let (status, appointments) = server.get(&token, "/api/appointments").await;
    assert_eq!(status, StatusCode::OK);
    let appointment = &appointments["data"][0];
    let appointment_id = appointment["id"].as_i64().unwrap();
    assert_eq!(appointment["source"], "ussd");
    assert_eq!(appointment["status"], "confirmed");

    let (status, payment) = server
        .send(
            &token,
            reqwest::Method::POST,
            "/api/payments",
            json!({ "appointment_id": appointment_id, "method": "cash" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let payment_id = payment["data"]["id"].as_i64().unwrap();
    assert_eq!(payment["data"]["amount"], 800.0);

    let path = format!("/api/payments/{payment_id}/status");
    let (status, _) = server
        .send(&token, reqwest::Method::PUT, &path, json!({ "status": "completed" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = server
        .send(&token, reqwest::Method::PUT, &path, json!({ "status": "failed" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let refunds = format!("/api/payments/{payment_id}/refunds");
    let (status, body) = server
        .send(
            &token,
            reqwest::Method::POST,
            &refunds,
            json!({ "amount": 300.0, "reason": "Partial service" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["payment"]["status"], "partially_refunded");

    let (status, _) = server
        .send(
            &token,
            reqwest::Method::POST,
            &refunds,
            json!({ "amount": 900.0, "reason": "Too much" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, summary) = server.get(&token, "/api/payments/summary").await;
    assert_eq!(summary["data"]["completed_amount"], 800.0);
    assert_eq!(summary["data"]["refunded_amount"], 300.0);
    assert_eq!(summary["data"]["by_method"]["cash"]["count"], 1);

    let response = server
        .client
        .get(server.url(&format!("/api/payments/{payment_id}/receipt")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        format!("attachment; filename=\"receipt_{payment_id}.txt\"").as_str()
    );
    let receipt = response.text().await.unwrap();
    assert!(receipt.contains(&format!("Receipt No: TJ-{payment_id:06}")));
    assert!(receipt.contains("Balance: KES 500.00"));
    let (_, details) = server.get(&token, &format!("/api/payments/{payment_id}")).await;
    assert!(details["data"]["payment"]["receipt_sent_at"].is_string());
}

#[tokio::test]
async fn test_status_change_lands_in_journey() {
    let server = TestServer::start().await;
    let token = server.provider_token("akinyi").await;

    let (status, patient) = server
        .send(
            &token,
            reqwest::Method::POST,
            "/api/patients",
            json!({ "phone_number": "+254733000111", "name": "Juma Otieno", "age": 52 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let patient_id = patient["data"]["id"].as_i64().unwrap();

    let (status, appointment) = server
        .send(
            &token,
            reqwest::Method::POST,
            "/api/appointments",
            json!({
                "patient_id": patient_id,
                "date": "2030-03-14",
                "time": "14:00",
                "visit_type": "teleconsult"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(appointment["data"]["status"], "pending");
    let appointment_id = appointment["data"]["id"].as_i64().unwrap();

    let (status, _) = server
        .send(
            &token,
            reqwest::Method::PUT,
            &format!("/api/appointments/{appointment_id}/status"),
            json!({ "status": "completed" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, journey) = server.get(&token, &format!("/api/patients/{patient_id}/journey")).await;
    let timeline = journey["data"]["timeline"].as_array().unwrap();
    let descriptions: Vec<&str> = timeline.iter().filter_map(|i| i["description"].as_str()).collect();
    assert!(descriptions.iter().any(|d| d.starts_with("Booked teleconsult appointment")));
    assert!(descriptions.contains(&format!("Appointment {appointment_id} marked completed").as_str()));
}

#[tokio::test]
async fn test_symptom_dashboard_flags_outbreak() {
    let server = TestServer::start().await;
    let token = server.provider_token("mutua").await;

    for (session, phone_text) in [("ATUid_s1", "2*fever and chills*3"), ("ATUid_s2", "2*fever since monday*2")] {
        let (_, body) = server.dial(session, phone_text).await;
        assert!(body.starts_with("END Thank you."), "{body}");
    }
    let (status, _) = server
        .send(
            &token,
            reqwest::Method::POST,
            "/api/symptoms",
            json!({ "content": "Chief complaint: fever\nSeverity: mild\nLocation: Kisumu" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, dashboard) = server.get(&token, "/api/symptoms/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    let data = &dashboard["data"];
    assert_eq!(data["total_symptoms"], 3);
    assert_eq!(data["category_counts"]["fever"], 3);
    assert_eq!(data["severity_counts"]["severe"], 1);

    let (_, outbreaks) = server.get(&token, "/api/symptoms/outbreaks").await;
    let signals = outbreaks["data"].as_array().unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0]["symptom"], "fever");
    assert_eq!(signals[0]["category"], "fever");
    assert_eq!(signals[0]["count"], 3);
}

#[tokio::test]
async fn test_walk_in_creates_patient_visit_and_report() {
    let server = TestServer::start().await;
    let token = server.provider_token("wafula").await;

    let (status, walk_in) = server
        .send(
            &token,
            reqwest::Method::POST,
            "/api/walk-ins",
            json!({
                "name": "Halima Said",
                "phone_number": "+254733000222",
                "age": 27,
                "gender": "female",
                "location": "Mombasa",
                "schedule": { "type": "see_now" },
                "chief_complaint": "Vomiting and stomach pain",
                "duration": "1-3_days",
                "severity": "severe",
                "body_site": "abdomen"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{walk_in}");
    let data = &walk_in["data"];
    assert_eq!(data["patient_created"], true);
    assert_eq!(data["appointment"]["status"], "completed");
    assert_eq!(data["appointment"]["source"], "walk_in");
    assert_eq!(data["symptom"]["category"], "gastrointestinal");
    assert!(data["symptom"]["report"]["content"]
        .as_str()
        .unwrap()
        .starts_with("Chief Complaint: Vomiting and stomach pain\nDuration: 1-3 days\nSeverity: Severe\nLocation: Abdomen"));
    let patient_id = data["patient"]["id"].as_i64().unwrap();

    let (_, journey) = server.get(&token, &format!("/api/patients/{patient_id}/journey")).await;
    let timeline = journey["data"]["timeline"].as_array().unwrap();
    assert!(timeline.iter().any(|i| i["description"] == "Checked in as a walk-in"));

    let (_, dashboard) = server.get(&token, "/api/symptoms/dashboard").await;
    assert_eq!(dashboard["data"]["total_symptoms"], 1);

    let (status, body) = server
        .send(
            &token,
            reqwest::Method::POST,
            "/api/walk-ins",
            json!({
                "name": "Halima Said",
                "phone_number": "+254733000222",
                "schedule": { "type": "later", "date": "2020-01-01", "time": "10:00" },
                "chief_complaint": "Follow-up",
                "duration": "1-2_weeks",
                "severity": "mild",
                "body_site": "abdomen"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn test_username_and_email_availability() {
    let server = TestServer::start().await;
    server.provider_token("kiptoo").await;

    let check = |path: &str| {
        let request = server.client.get(server.url(path));
        async move {
            let response = request.send().await.unwrap();
            let status = response.status();
            (status, response.json::<Value>().await.unwrap())
        }
    };

    let (status, body) = check("/api/auth/check-username?username=kiptoo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "exists": true }));
    let (_, body) = check("/api/auth/check-username?username=wambui").await;
    assert_eq!(body["exists"], false);
    let (_, body) = check("/api/auth/check-email?email=KIPTOO%40tujali.health").await;
    assert_eq!(body["exists"], true);

    let (status, body) = check("/api/auth/check-username?username=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username is required");
    let (status, body) = check("/api/auth/check-email").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email is required");
}
