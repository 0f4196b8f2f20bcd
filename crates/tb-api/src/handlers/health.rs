use axum::extract::State;

use crate::error::ApiError;
use crate::SharedState;

pub async fn livez() -> &'static str {
    "ok"
}

/// Ready as long as shutdown has not started; load balancers watch this
/// to drain instances before the listener closes.
pub async fn readyz(State(state): State<SharedState>) -> Result<&'static str, ApiError> {
    if state.readiness.load(std::sync::atomic::Ordering::SeqCst) {
        Ok("ok")
    } else {
        Err(ApiError::Unavailable("shutting down".into()))
    }
}
