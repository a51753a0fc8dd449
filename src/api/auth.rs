// Session flows
// The only writers of the credential store besides the gateway itself

use serde::Serialize;
use serde_json::json;

use crate::auth::types::{AuthResponse, SessionUser};
use crate::error::ApiError;
use crate::gateway::RequestGateway;
use crate::transport::RequestDescriptor;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Exchange credentials for a token pair and store it
pub async fn login(
    gateway: &RequestGateway,
    request: &LoginRequest,
) -> Result<Option<SessionUser>, ApiError> {
    let value = gateway
        .dispatch(RequestDescriptor::post("/auth/login").with_json(json!(request)))
        .await?;
    let auth: AuthResponse = serde_json::from_value(value)?;
    gateway
        .store()
        .set_tokens(&auth.access_token, &auth.refresh_token);
    tracing::info!("Logged in");
    Ok(auth.user)
}

/// Create an account; the backend logs the new user straight in
pub async fn register(
    gateway: &RequestGateway,
    request: &RegisterRequest,
) -> Result<Option<SessionUser>, ApiError> {
    let value = gateway
        .dispatch(RequestDescriptor::post("/auth/register").with_json(json!(request)))
        .await?;
    let auth: AuthResponse = serde_json::from_value(value)?;
    gateway
        .store()
        .set_tokens(&auth.access_token, &auth.refresh_token);
    Ok(auth.user)
}

/// Best-effort server-side logout. Local credentials are cleared regardless
/// of whether the backend accepted the request.
pub async fn logout(gateway: &RequestGateway) {
    if let Err(e) = gateway.dispatch(RequestDescriptor::post("/auth/logout")).await {
        tracing::warn!("Logout request failed: {}", e);
    }
    gateway.store().clear_tokens();
}

/// Fetch the user the current access token belongs to
pub async fn current_user(gateway: &RequestGateway) -> Result<SessionUser, ApiError> {
    let value = gateway.dispatch(RequestDescriptor::get("/auth/me")).await?;
    Ok(serde_json::from_value(value)?)
}
