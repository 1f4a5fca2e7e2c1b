use axum::{extract::State, http::HeaderMap, Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::error::ApiError;
use crate::modules::auth::controller::{client_meta, REFRESH_COOKIE};
use crate::modules::auth::crud::UserCrud;
use crate::modules::auth::middleware::CurrentUser;
use crate::modules::auth::service::AuthService;
use crate::modules::profile::schema::{
    ChangePasswordRequest, DeleteAccountRequest, ProfileView, UpdateNotificationsRequest,
    UpdateProfileRequest,
};
use crate::response::ApiResponse;
use crate::AppState;

pub async fn get_profile(
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<ProfileView>>, ApiError> {
    Ok(Json(ApiResponse::data(ProfileView::from(&current.user))))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<ProfileView>>, ApiError> {
    let crud = UserCrud::new(state.db.clone());
    crud.update_profile(&current.user.id, req.name.as_deref(), req.phone.as_deref())
        .await?;

    let user = crud
        .find_by_id(&current.user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::data(ProfileView::from(&user))))
}

pub async fn update_notifications(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateNotificationsRequest>,
) -> Result<Json<ApiResponse<ProfileView>>, ApiError> {
    let crud = UserCrud::new(state.db.clone());
    crud.update_notifications(
        &current.user.id,
        req.notify_email,
        req.notify_sms,
        req.notify_marketing,
    )
    .await?;

    let user = crud
        .find_by_id(&current.user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::data(ProfileView::from(&user))))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let meta = client_meta(&headers);
    AuthService::from_state(&state)
        .change_password(
            &current.user,
            &req.current_password,
            &req.new_password,
            &meta,
        )
        .await?;

    Ok(Json(ApiResponse::message(
        "Password changed. Please log in again.",
    )))
}

pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Option<Json<DeleteAccountRequest>>,
) -> Result<(CookieJar, Json<ApiResponse<()>>), ApiError> {
    let meta = client_meta(&headers);
    let password = body.and_then(|Json(req)| req.password);

    AuthService::from_state(&state)
        .delete_account(&current.user, password.as_deref(), &meta)
        .await?;

    let jar = jar.remove({
        let mut cookie = axum_extra::extract::cookie::Cookie::new(REFRESH_COOKIE, "");
        cookie.set_path("/auth");
        cookie
    });

    Ok((jar, Json(ApiResponse::message("Account deleted"))))
}
