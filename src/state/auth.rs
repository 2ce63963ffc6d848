use tracing::warn;

use super::Status;
use crate::client::{AuthApi, AuthenticatedClient, ClientError, TokenStore};
use crate::types::{LoginRequest, RegisterRequest, User};

pub struct AuthState {
    api: AuthApi,
    store: TokenStore,
    pub status: Status,
}

impl AuthState {
    pub fn new(client: AuthenticatedClient) -> Self {
        let store = client.store().clone();
        Self {
            api: AuthApi::new(client),
            store,
            status: Status::default(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// The signed-in account, read from the session so a cleared session
    /// (logout or a failed refresh) never leaves a stale user behind.
    pub fn user(&self) -> Option<User> {
        self.store.user()
    }

    /// Exchange credentials for a session, then load the account.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, ClientError> {
        let creds = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let (api, store) = (&self.api, &self.store);
        let user = self
            .status
            .track(async {
                store.replace(api.login(&creds).await?);
                api.me().await
            })
            .await?;
        self.store.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Create the account and sign straight in.
    pub async fn register(&mut self, req: &RegisterRequest) -> Result<User, ClientError> {
        let api = &self.api;
        self.status.track(api.register(req)).await?;
        self.login(&req.email, &req.password).await
    }

    /// Tell the server (best effort) and drop the local session regardless.
    pub async fn logout(&mut self) {
        self.status.begin();
        if self.store.is_authenticated()
            && let Err(e) = self.api.logout().await
        {
            warn!(error = %e, "server logout failed; clearing local session anyway");
        }
        self.store.clear();
        self.status.finish();
    }

    pub async fn load_user(&mut self) -> Result<User, ClientError> {
        let api = &self.api;
        let user = self.status.track(api.me()).await?;
        self.store.set_user(Some(user.clone()));
        Ok(user)
    }
}
