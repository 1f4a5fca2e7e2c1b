use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use super::controller;
use crate::modules::auth::middleware::require_auth;
use crate::AppState;

pub fn profile_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/me",
            get(controller::get_profile)
                .patch(controller::update_profile)
                .delete(controller::delete_account),
        )
        .route("/me/notifications", put(controller::update_notifications))
        .route("/me/change-password", post(controller::change_password))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
