//! Liveness and CORS preflight.

/// GET /healthz
pub async fn healthz() -> &'static str {
    "OK"
}

/// OPTIONS /encode
pub async fn preflight() -> &'static str {
    "OK"
}
