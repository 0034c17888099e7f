use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use dialtone_core::RateLimiter;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    voice: Arc<RateLimiter>,
    sms: Arc<RateLimiter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LimiterHealth {
    pub quota_per_day: u32,
    pub active_callers: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub voice: LimiterHealth,
    pub sms: LimiterHealth,
    pub checked_at: String,
}

pub fn router(voice: Arc<RateLimiter>, sms: Arc<RateLimiter>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { voice, sms })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "dialtone-server webhooks accepting traffic".to_string(),
        },
        voice: limiter_health(&state.voice),
        sms: limiter_health(&state.sms),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

fn limiter_health(limiter: &RateLimiter) -> LimiterHealth {
    LimiterHealth { quota_per_day: limiter.quota(), active_callers: limiter.active_callers() }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use dialtone_core::RateLimiter;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_tracked_callers_per_channel() {
        let voice = Arc::new(RateLimiter::new("voice", 3));
        let sms = Arc::new(RateLimiter::new("sms", 7));
        assert!(voice.can_proceed("+15551112222"));
        assert!(voice.can_proceed("+15553334444"));

        let (status, Json(payload)) =
            health(State(HealthState { voice: voice.clone(), sms: sms.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.voice.active_callers, 2);
        assert_eq!(payload.voice.quota_per_day, 3);
        assert_eq!(payload.sms.active_callers, 0);
        assert_eq!(payload.sms.quota_per_day, 7);
    }
}
