pub mod dashboard;
pub mod error;
pub mod runner;
pub mod tickets;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::{RunnerContext, TicketContext};

pub fn ticket_app(ctx: TicketContext) -> Router {
    tickets::ticket_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(ctx))
}

pub fn runner_app(ctx: Arc<RunnerContext>) -> Router {
    runner::runner_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
