// Export route modules
pub mod rpc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(rpc::routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
