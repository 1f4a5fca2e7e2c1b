use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use super::{controller, middleware::require_auth};
use crate::AppState;

pub fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/signup", post(controller::signup))
        .route("/login", post(controller::login))
        .route("/oauth/{provider}", post(controller::oauth_login))
        .route("/verify-email", post(controller::verify_email))
        .route("/resend-verification", post(controller::resend_verification))
        .route("/forgot-password", post(controller::forgot_password))
        .route("/reset-password", post(controller::reset_password))
        .route("/refresh", post(controller::refresh));

    let protected = Router::new()
        .route("/me", get(controller::me))
        .route("/logout", post(controller::logout))
        .route("/logout-all", post(controller::logout_all))
        .route("/2fa/setup", post(controller::two_factor_setup))
        .route("/2fa/verify", post(controller::two_factor_verify))
        .route("/2fa/disable", post(controller::two_factor_disable))
        .route("/2fa/backup-codes", post(controller::regenerate_backup_codes))
        .route("/sessions", get(controller::list_sessions))
        .route("/sessions/{id}", delete(controller::revoke_session))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    public.merge(protected)
}
