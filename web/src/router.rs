use crate::controller::{form_controller, publish_controller};
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(form_routes())
        .merge(publish_routes(app_state))
}

fn form_routes() -> Router {
    Router::new().route("/", get(form_controller::index))
}

fn publish_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/publish", post(publish_controller::create))
        .with_state(app_state)
}
