use super::error::ClientError;
use super::http::{ApiRequest, AuthenticatedClient};
use crate::types::{
    LoginRequest, MessageResponse, PasswordChange, RefreshRequest, RegisterRequest, TokenPair,
    User, UserUpdate,
};

/// `/auth/*` routes.
#[derive(Clone)]
pub struct AuthApi {
    client: AuthenticatedClient,
}

impl AuthApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<User, ClientError> {
        let req = ApiRequest::post(&["auth", "register"]).public().json(req)?;
        self.client.send_json(req).await
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<TokenPair, ClientError> {
        let req = ApiRequest::post(&["auth", "login"]).public().json(req)?;
        self.client.send_json(req).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let req = ApiRequest::post(&["auth", "refresh"]).public().json(&body)?;
        self.client.send_json(req).await
    }

    pub async fn logout(&self) -> Result<MessageResponse, ClientError> {
        self.client.send_json(ApiRequest::post(&["auth", "logout"])).await
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        self.client.send_json(ApiRequest::get(&["auth", "me"])).await
    }

    pub async fn update_me(&self, update: &UserUpdate) -> Result<User, ClientError> {
        let req = ApiRequest::put(&["auth", "me"]).json(update)?;
        self.client.send_json(req).await
    }

    pub async fn change_password(
        &self,
        change: &PasswordChange,
    ) -> Result<MessageResponse, ClientError> {
        let req = ApiRequest::put(&["auth", "password"]).json(change)?;
        self.client.send_json(req).await
    }
}
