use crate::state::AppState;
use axum::Router;

pub mod catalog;
pub mod handlers;
pub mod ledger;
pub mod plan;

pub fn router() -> Router<AppState> {
    handlers::subscription_routes()
}
