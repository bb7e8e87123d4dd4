use std::sync::Arc;
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};

use crate::jwt::issue_token;

pub struct TestConfig {
    pub jwt_secret: String,
    pub auth_service_url: String,
    pub cal_base_url: String,
    pub cal_api_key: String,
    pub cal_event_type_id: i64,
    pub gemini_base_url: String,
    pub gemini_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            auth_service_url: "http://localhost:5000/api".to_string(),
            cal_base_url: "http://localhost:54321".to_string(),
            cal_api_key: "cal_test_key".to_string(),
            cal_event_type_id: 4133458,
            gemini_base_url: "http://localhost:54322".to_string(),
            gemini_api_key: "test-gemini-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            port: 0,
            auth_service_url: self.auth_service_url.clone(),
            session_secret: self.jwt_secret.clone(),
            session_ttl_hours: 24,
            cal_api_key: self.cal_api_key.clone(),
            cal_event_type_id: self.cal_event_type_id,
            cal_base_url: self.cal_base_url.clone(),
            clinic_time_zone: "Europe/London".to_string(),
            clinic_name: "DentalCare Hospital".to_string(),
            gemini_api_key: self.gemini_api_key.clone(),
            gemini_base_url: self.gemini_base_url.clone(),
            gemini_model: "gemini-test".to_string(),
            assistant_max_tool_rounds: 5,
            assistant_max_attempts: 3,
            assistant_retry_step_ms: 0,
            assistant_session_idle_minutes: 30,
            assistant_max_sessions_per_user: 5,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::patient("test@example.com")
    }
}

impl TestUser {
    pub fn new(email: &str, role: UserRole) -> Self {
        let username = email.split('@').next().unwrap_or(email).to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            name: format!("Test {}", username),
            username,
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, UserRole::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, UserRole::Patient)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            created_at: None,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        issue_token(&user.to_user(), secret, exp_hours.unwrap_or(24))
            .expect("test secret must not be empty")
            .token
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned payloads in the shape the booking provider returns.
pub struct MockCalResponses;

impl MockCalResponses {
    pub fn booking(id: i64, start: &str, end: &str, name: &str, email: &str) -> serde_json::Value {
        json!({
            "id": id,
            "uid": format!("uid-{}", id),
            "title": format!("Dental Appointment between DentalCare and {}", name),
            "description": "",
            "startTime": start,
            "endTime": end,
            "attendees": [
                { "name": name, "email": email, "timeZone": "Europe/London" }
            ],
            "status": "ACCEPTED"
        })
    }

    pub fn bookings(bookings: Vec<serde_json::Value>) -> serde_json::Value {
        json!({ "bookings": bookings })
    }

    pub fn error_response(message: &str) -> serde_json::Value {
        json!({ "message": message })
    }
}
