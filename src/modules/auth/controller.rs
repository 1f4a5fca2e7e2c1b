use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::modules::auth::middleware::CurrentUser;
use crate::modules::auth::model::OAuthProvider;
use crate::modules::auth::schema::{
    AuthResponse, BackupCodesResponse, Disable2faRequest, ForgotPasswordRequest, LoginRequest,
    LogoutRequest, OAuthRequest, OAuthResponse, RefreshRequest, RefreshResponse,
    RegenerateBackupCodesRequest, ResendVerificationRequest, ResetPasswordRequest, SessionView,
    SignupRequest, TwoFactorChallengeResponse, TwoFactorSetupResponse, UserView,
    Verify2faRequest, VerifyEmailRequest,
};
use crate::modules::auth::service::{
    AuthService, AuthSuccess, ClientMeta, LoginOutcome, OAuthInput, SignupInput,
    GENERIC_RESET_MESSAGE, GENERIC_VERIFICATION_MESSAGE,
};
use crate::response::ApiResponse;
use crate::AppState;

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Client IP (x-forwarded-for first hop, then x-real-ip) and user agent,
/// for session rows and audit entries.
pub fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientMeta { ip, user_agent }
}

fn refresh_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, value);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/auth");
    cookie.set_secure(crate::config::environment::is_production());
    cookie.set_max_age(time::Duration::days(30));
    cookie
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, "");
    cookie.set_path("/auth");
    cookie
}

fn auth_response(success: &AuthSuccess) -> AuthResponse {
    AuthResponse {
        user: UserView::from(&success.user),
        access_token: success.access_token.clone(),
        refresh_token: success.refresh_token.clone(),
        token_type: "Bearer",
        expires_in: success.expires_in,
    }
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<ApiResponse<AuthResponse>>), ApiError> {
    req.validate()?;

    let meta = client_meta(&headers);
    let service = AuthService::from_state(&state);

    let success = service
        .signup(
            SignupInput {
                email: req.email,
                password: req.password,
                name: req.name,
                phone: req.phone,
            },
            &meta,
        )
        .await?;

    let jar = jar.add(refresh_cookie(success.refresh_token.clone()));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(ApiResponse::data(auth_response(&success))),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, CookieJar, Json<serde_json::Value>), ApiError> {
    let meta = client_meta(&headers);
    let service = AuthService::from_state(&state);

    let outcome = service
        .login(
            &req.email,
            &req.password,
            req.two_factor_code.as_deref(),
            &meta,
        )
        .await?;

    match outcome {
        LoginOutcome::Success(success) => {
            let jar = jar.add(refresh_cookie(success.refresh_token.clone()));
            let body = serde_json::to_value(ApiResponse::data(auth_response(&success)))
                .map_err(|e| ApiError::internal(e.to_string()))?;
            Ok((StatusCode::OK, jar, Json(body)))
        }
        LoginOutcome::TwoFactorRequired { user_id } => {
            let body = serde_json::to_value(ApiResponse::data(TwoFactorChallengeResponse {
                requires_two_factor: true,
                user_id,
            }))
            .map_err(|e| ApiError::internal(e.to_string()))?;
            Ok((StatusCode::OK, jar, Json(body)))
        }
    }
}

pub async fn oauth_login(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(req): Json<OAuthRequest>,
) -> Result<(StatusCode, CookieJar, Json<ApiResponse<OAuthResponse>>), ApiError> {
    req.validate()?;

    let provider: OAuthProvider = provider
        .parse()
        .map_err(|_| ApiError::validation("Unsupported OAuth provider"))?;

    let meta = client_meta(&headers);
    let service = AuthService::from_state(&state);

    let (success, is_new_user) = service
        .oauth_login(
            OAuthInput {
                provider,
                provider_id: req.provider_id,
                email: req.email,
                name: req.name,
            },
            &meta,
        )
        .await?;

    let jar = jar.add(refresh_cookie(success.refresh_token.clone()));

    Ok((
        StatusCode::OK,
        jar,
        Json(ApiResponse::data(OAuthResponse {
            auth: auth_response(&success),
            is_new_user,
        })),
    ))
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let meta = client_meta(&headers);
    AuthService::from_state(&state)
        .verify_email(&req.token, &meta)
        .await?;

    Ok(Json(ApiResponse::message("Email verified")))
}

pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResendVerificationRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    AuthService::from_state(&state)
        .resend_verification(&req.email)
        .await?;

    Ok(Json(ApiResponse::message(GENERIC_VERIFICATION_MESSAGE)))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let meta = client_meta(&headers);
    AuthService::from_state(&state)
        .request_password_reset(&req.email, &meta)
        .await?;

    Ok(Json(ApiResponse::message(GENERIC_RESET_MESSAGE)))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let meta = client_meta(&headers);
    AuthService::from_state(&state)
        .reset_password(&req.token, &req.password, &meta)
        .await?;

    Ok(Json(ApiResponse::message(
        "Password has been reset. Please log in again.",
    )))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|Json(req)| req.refresh_token))
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token"))?;

    let refreshed = AuthService::from_state(&state)
        .refresh_access_token(&token)
        .await?;

    Ok(Json(ApiResponse::data(RefreshResponse {
        access_token: refreshed.access_token,
        token_type: "Bearer",
        expires_in: refreshed.expires_in,
    })))
}

pub async fn me(
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    Ok(Json(ApiResponse::data(UserView::from(&current.user))))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> Result<(CookieJar, Json<ApiResponse<()>>), ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|Json(req)| req.refresh_token));

    let meta = client_meta(&headers);
    AuthService::from_state(&state)
        .logout(token.as_deref(), &current.user.id, &meta)
        .await?;

    let jar = jar.remove(removal_cookie());

    Ok((jar, Json(ApiResponse::message("Logged out"))))
}

pub async fn logout_all(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<ApiResponse<()>>), ApiError> {
    let meta = client_meta(&headers);
    AuthService::from_state(&state)
        .logout_all(&current.user.id, &meta)
        .await?;

    let jar = jar.remove(removal_cookie());

    Ok((jar, Json(ApiResponse::message("Logged out of all devices"))))
}

pub async fn two_factor_setup(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<TwoFactorSetupResponse>>, ApiError> {
    let setup = AuthService::from_state(&state)
        .enable_2fa_init(&current.user)
        .await?;

    Ok(Json(ApiResponse::data(TwoFactorSetupResponse {
        secret: setup.secret,
        otpauth_url: setup.otpauth_url,
    })))
}

pub async fn two_factor_verify(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(req): Json<Verify2faRequest>,
) -> Result<Json<ApiResponse<BackupCodesResponse>>, ApiError> {
    let meta = client_meta(&headers);
    let backup_codes = AuthService::from_state(&state)
        .enable_2fa_verify(&current.user, &req.code, &meta)
        .await?;

    Ok(Json(ApiResponse::data_with_message(
        BackupCodesResponse { backup_codes },
        "Two-factor authentication enabled. Store these backup codes safely; they will not be shown again.",
    )))
}

pub async fn two_factor_disable(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(req): Json<Disable2faRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let meta = client_meta(&headers);
    AuthService::from_state(&state)
        .disable_2fa(&current.user, &req.password, &meta)
        .await?;

    Ok(Json(ApiResponse::message("Two-factor authentication disabled")))
}

pub async fn regenerate_backup_codes(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    Json(req): Json<RegenerateBackupCodesRequest>,
) -> Result<Json<ApiResponse<BackupCodesResponse>>, ApiError> {
    let meta = client_meta(&headers);
    let backup_codes = AuthService::from_state(&state)
        .regenerate_backup_codes(&current.user, &req.code, &meta)
        .await?;

    Ok(Json(ApiResponse::data_with_message(
        BackupCodesResponse { backup_codes },
        "Previous backup codes are no longer valid.",
    )))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<SessionView>>>, ApiError> {
    let sessions = AuthService::from_state(&state)
        .list_sessions(&current.user.id)
        .await?;

    let views = sessions
        .iter()
        .map(|s| SessionView::from_session(s, current.session_id.as_deref()))
        .collect();

    Ok(Json(ApiResponse::data(views)))
}

pub async fn revoke_session(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    AuthService::from_state(&state)
        .revoke_session(&current.user.id, &session_id)
        .await?;

    Ok(Json(ApiResponse::message("Session revoked")))
}
