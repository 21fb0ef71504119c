//! Read-side client for the fleet's REST API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Report, User};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("request to {path} failed: {message}")]
    Transport { path: String, message: String },
    #[error("{path} returned {status}: {detail}")]
    Status {
        path: String,
        status: u16,
        detail: String,
    },
    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },
    #[error("not logged in; run `login` first")]
    MissingToken,
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401, .. } | ApiError::MissingToken)
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

/// FastAPI error bodies carry `detail` as a string or a list of validation items.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "no response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    http: Client,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|err| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ApiError::Transport {
                path: base_url.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self { base, http, token })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// `POST /auth/login`. Stores the returned bearer token on success.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let path = "/auth/login";
        let request = self
            .http
            .post(self.url(path)?)
            .json(&LoginRequest { username, password });
        let token: TokenResponse = self.send(path, request).await?;
        self.token = Some(token.access_token.clone());
        Ok(token)
    }

    /// `GET /users/me`.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get("/users/me").await
    }

    /// `GET /users/`.
    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get("/users/").await
    }

    /// Drivers that can be monitored: role `driver` and status `active`.
    pub async fn list_active_drivers(&self) -> Result<Vec<User>, ApiError> {
        Ok(active_drivers(self.list_users().await?))
    }

    /// `GET /video/reports`.
    pub async fn list_reports(&self) -> Result<Vec<Report>, ApiError> {
        self.get("/video/reports").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::MissingToken)?;
        let request = self.http.get(self.url(path)?).bearer_auth(token);
        self.send(path, request).await
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|err| ApiError::InvalidBaseUrl {
            url: format!("{}{path}", self.base),
            reason: err.to_string(),
        })
    }

    async fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> Result<T, ApiError> {
        log::debug!("api request {path}");
        let response = request.send().await.map_err(|err| ApiError::Transport {
            path: path.to_string(),
            message: err.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        response.json().await.map_err(|err| ApiError::Decode {
            path: path.to_string(),
            message: err.to_string(),
        })
    }
}

pub fn active_drivers(users: Vec<User>) -> Vec<User> {
    users.into_iter().filter(User::is_active_driver).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserRole, UserStatus};

    fn user(id: i64, role: UserRole, status: UserStatus) -> User {
        User {
            id,
            username: format!("user{id}"),
            first_name: "N".into(),
            last_name: "M".into(),
            email: String::new(),
            phone_number: String::new(),
            dni: String::new(),
            status,
            role,
            url_video: None,
        }
    }

    #[test]
    fn keeps_only_active_drivers() {
        let users = vec![
            user(1, UserRole::Driver, UserStatus::Active),
            user(2, UserRole::Admin, UserStatus::Active),
            user(3, UserRole::Driver, UserStatus::Inactive),
        ];
        let ids: Vec<i64> = active_drivers(users).iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn extracts_fastapi_detail() {
        assert_eq!(error_detail(r#"{"detail": "Incorrect username or password"}"#), "Incorrect username or password");
        assert_eq!(
            error_detail(r#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#),
            r#"[{"loc":["body"],"msg":"field required"}]"#
        );
        assert_eq!(error_detail("Internal Server Error"), "Internal Server Error");
        assert_eq!(error_detail(""), "no response body");
    }

    #[test]
    fn joins_paths_onto_base() {
        let client = ApiClient::new("http://localhost:8000", None).unwrap();
        assert_eq!(client.url("/users/").unwrap().as_str(), "http://localhost:8000/users/");
        assert!(ApiClient::new("not a url", None).is_err());
    }

    #[tokio::test]
    async fn reads_require_a_token() {
        let client = ApiClient::new("http://localhost:8000", None).unwrap();
        let err = client.list_users().await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken));
        assert!(err.is_unauthorized());
    }
}
