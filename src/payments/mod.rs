use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod gateway;
pub mod handlers;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::payment_routes()
}
