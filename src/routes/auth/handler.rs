use axum::{
    extract::{Json, State},
    http::{HeaderMap, header::USER_AGENT},
};

use crate::{
    AppState,
    auth::{ActiveSession, AuthenticatedIdentity, MaybeIdentity},
    cache::Session,
    error::AppError,
    result::{ApiResponse, success_response},
    utils::{verify_password, with_timeout},
};

use super::model::{LoginRequest, LoginResponse, LogoutResponse, StatusResponse};

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let timeout = state.config.store_timeout();

    let user = with_timeout(timeout, state.users.find_user_by_email(&req.email))
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or(AppError::InvalidCredentials)?;
    match verify_password(&req.password, hash) {
        Ok(true) => (),
        Ok(false) => {
            tracing::info!("Failed login for {}", req.email);
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => return Err(AppError::Internal(format!("password check failed: {e}"))),
    }

    if !user.is_active {
        return Err(AppError::UserInactive);
    }
    let tenant_active = with_timeout(timeout, state.tenant_directory.find_tenant(&user.tenant_id))
        .await?
        .is_some_and(|t| t.is_active);
    if !tenant_active {
        return Err(AppError::TenantInactive);
    }

    let device_info = req.device_info.or_else(|| {
        headers
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    });
    let session = Session::new(&user.id, &user.tenant_id, device_info);
    with_timeout(
        timeout,
        state.sessions.create(&session, state.config.session_ttl()),
    )
    .await?;

    let (token, expires_at) = state.authenticator.verifier().issue(
        &user.id,
        &user.email,
        &user.tenant_id,
        &session.session_id,
    )?;

    tracing::info!("User {} logged in, session {}", user.id, session.session_id);
    Ok(success_response(LoginResponse {
        token,
        expires_at,
        session_id: session.session_id,
        user: user.into(),
    }))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    session: ActiveSession,
) -> Result<Json<ApiResponse<LogoutResponse>>, AppError> {
    with_timeout(
        state.config.store_timeout(),
        state.sessions.destroy(&session.session_id),
    )
    .await?;

    tracing::info!("User {} logged out, session {}", identity.user_id, session.session_id);
    Ok(success_response(LogoutResponse {}))
}

#[axum::debug_handler]
pub async fn me(identity: AuthenticatedIdentity) -> Json<ApiResponse<AuthenticatedIdentity>> {
    success_response(identity)
}

#[axum::debug_handler]
pub async fn status(MaybeIdentity(identity): MaybeIdentity) -> Json<ApiResponse<StatusResponse>> {
    success_response(StatusResponse {
        authenticated: identity.is_some(),
        user: identity,
    })
}
