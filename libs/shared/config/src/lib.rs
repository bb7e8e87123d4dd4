use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub auth_service_url: String,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub cal_api_key: String,
    pub cal_event_type_id: i64,
    pub cal_base_url: String,
    pub clinic_time_zone: String,
    pub clinic_name: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    /// Upper bound on chained tool rounds per user message. Guards against
    /// a model that keeps requesting tools forever.
    pub assistant_max_tool_rounds: u32,
    pub assistant_max_attempts: u32,
    pub assistant_retry_step_ms: u64,
    pub assistant_session_idle_minutes: u64,
    pub assistant_max_sessions_per_user: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            port: parsed_var("PORT", 3000),
            auth_service_url: env::var("AUTH_SERVICE_URL")
                .unwrap_or_else(|_| {
                    warn!("AUTH_SERVICE_URL not set, using default");
                    "http://localhost:5000/api".to_string()
                }),
            session_secret: env::var("SESSION_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SESSION_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            session_ttl_hours: parsed_var("SESSION_TTL_HOURS", 24),
            cal_api_key: env::var("CAL_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("CAL_API_KEY not set, using empty value");
                    String::new()
                }),
            cal_event_type_id: parsed_var("CAL_EVENT_TYPE_ID", 0),
            cal_base_url: env::var("CAL_BASE_URL")
                .unwrap_or_else(|_| "https://api.cal.com/v1".to_string()),
            clinic_time_zone: env::var("CLINIC_TIME_ZONE")
                .unwrap_or_else(|_| "UTC".to_string()),
            clinic_name: env::var("CLINIC_NAME")
                .unwrap_or_else(|_| "DentalCare Hospital".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("GEMINI_API_KEY not set, using empty value");
                    String::new()
                }),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            assistant_max_tool_rounds: parsed_var("ASSISTANT_MAX_TOOL_ROUNDS", 5),
            assistant_max_attempts: parsed_var("ASSISTANT_MAX_ATTEMPTS", 3),
            assistant_retry_step_ms: parsed_var("ASSISTANT_RETRY_STEP_MS", 1500),
            assistant_session_idle_minutes: parsed_var("ASSISTANT_SESSION_IDLE_MINUTES", 30),
            assistant_max_sessions_per_user: parsed_var("ASSISTANT_MAX_SESSIONS_PER_USER", 5),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_scheduling_configured() {
            warn!("Scheduling provider not configured - bookings will fail");
        }
        if !config.is_assistant_configured() {
            warn!("Assistant model not configured - chat requests will fail");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.session_secret.is_empty() && !self.auth_service_url.is_empty()
    }

    pub fn is_scheduling_configured(&self) -> bool {
        !self.cal_api_key.is_empty() && self.cal_event_type_id > 0
    }

    pub fn is_assistant_configured(&self) -> bool {
        !self.gemini_api_key.is_empty() && !self.gemini_model.is_empty()
    }
}

fn parsed_var<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
