use crate::models::{HealthResponse, VenueHealth};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;

/// Health surface: queue depth, live channels, venue reachability.
/// Counters never block; venue probes are bounded by the ping timeout and
/// an unreachable venue degrades to `false` rather than an error.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let venues = state
        .quote_router
        .venue_health()
        .await
        .into_iter()
        .map(|(venue, reachable)| VenueHealth { venue, reachable })
        .collect();

    Json(HealthResponse {
        pipeline: state.scheduler.stats(),
        live_channels: state.notifier.channel_count(),
        venues,
    })
}
