use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::api::{ApiClient, ClientError, ParsedBody, RequestOptions};
use crate::config::ClientConfig;

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The signed-in user as reported by the backend. Fields the dashboard does
/// not model are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionUser {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Unknown user")
    }
}

/// Session endpoints of the backend.
#[derive(Clone)]
pub struct AuthApi {
    client: ApiClient,
    login_path: String,
    register_path: String,
    logout_path: String,
    me_path: String,
}

impl AuthApi {
    pub fn new(client: ApiClient, config: &ClientConfig) -> Self {
        Self {
            client,
            login_path: config.login_path.clone(),
            register_path: config.register_path.clone(),
            logout_path: config.logout_path.clone(),
            me_path: config.me_path.clone(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Sign in. A rejected login surfaces as an authentication error with
    /// the backend's message.
    pub async fn login(&self, credentials: &Credentials) -> Result<ParsedBody, ClientError> {
        let body = to_value(credentials)?;
        let response = self
            .client
            .post(&self.login_path, Some(body), RequestOptions::SKIP_AUTH)
            .await?;
        info!(email = %credentials.email, "Logged in");
        Ok(response)
    }

    pub async fn register(&self, registration: &Registration) -> Result<ParsedBody, ClientError> {
        let body = to_value(registration)?;
        self.client
            .post(&self.register_path, Some(body), RequestOptions::SKIP_AUTH)
            .await
    }

    /// Sign out. An already-expired session counts as signed out.
    pub async fn logout(&self) -> Result<(), ClientError> {
        match self
            .client
            .post(&self.logout_path, None, RequestOptions::SKIP_REFRESH)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_authentication() => {
                debug!("Logout with no active session");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn current_user(&self) -> Result<SessionUser, ClientError> {
        let mut value: Value = self
            .client
            .get(&self.me_path, RequestOptions::default())
            .await?
            .into_json()?;
        if let Some(user) = value.get_mut("user").map(Value::take) {
            value = user;
        }
        serde_json::from_value(value)
            .map_err(|e| ClientError::InvalidResponse(format!("unexpected user shape: {}", e)))
    }

    /// Whether a session is active, refreshing it if needed.
    pub async fn is_authenticated(&self) -> Result<bool, ClientError> {
        match self.current_user().await {
            Ok(_) => Ok(true),
            Err(e) if e.is_authentication() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn refresh(&self) -> bool {
        self.client.refresh_session().await
    }
}

fn to_value<T: Serialize>(body: &T) -> Result<Value, ClientError> {
    serde_json::to_value(body)
        .map_err(|e| ClientError::InvalidRequest(format!("failed to serialize body: {}", e)))
}
