pub mod credits;
pub mod translate;

/// Liveness probe
pub async fn health() -> &'static str {
    "ok"
}
