//! REST access to the task backend.
//!
//! Every call takes the [`Session`] explicitly; the client itself holds no
//! credential, so one `RestClient` serves the whole application instance.

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::DashboardConfig;
use crate::models::{Task, TitlePayload, UserProfile};
use crate::session::Session;

const PROFILE_PATH: &[&str] = &["auth", "profile"];
const TASKS_PATH: &[&str] = &["tasks"];

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("session rejected by server (http {0})")]
    Unauthorized(u16),
    #[error("http {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response json: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl From<url::ParseError> for ApiError {
    fn from(value: url::ParseError) -> Self {
        ApiError::InvalidUrl(value.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn get_profile(&self, session: &Session) -> ApiResult<UserProfile>;
    async fn list_tasks(&self, session: &Session, search: &str) -> ApiResult<Vec<Task>>;
    async fn create_task(&self, session: &Session, title: &str) -> ApiResult<()>;
    async fn update_task(&self, session: &Session, id: &str, title: &str) -> ApiResult<()>;
    async fn delete_task(&self, session: &Session, id: &str) -> ApiResult<()>;
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: HttpClient,
    base_url: Url,
}

impl RestClient {
    pub fn new(config: &DashboardConfig) -> ApiResult<Self> {
        let base_url = Url::parse(config.api_base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let mut builder =
            HttpClient::builder().user_agent(concat!("task-dashboard/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, base_url })
    }

    /// Appends `segments` to the base path, so `http://host/api` + `tasks`
    /// becomes `http://host/api/tasks`. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn task_endpoint(&self, id: &str) -> ApiResult<Url> {
        self.endpoint(&[TASKS_PATH[0], id])
    }

    fn request(&self, method: Method, url: Url, session: &Session) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(session.token())
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<String> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let text = self.send(request).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl TaskApi for RestClient {
    async fn get_profile(&self, session: &Session) -> ApiResult<UserProfile> {
        let url = self.endpoint(PROFILE_PATH)?;
        self.send_json(self.request(Method::GET, url, session)).await
    }

    async fn list_tasks(&self, session: &Session, search: &str) -> ApiResult<Vec<Task>> {
        let mut url = self.endpoint(TASKS_PATH)?;
        url.query_pairs_mut().append_pair("search", search);
        self.send_json(self.request(Method::GET, url, session)).await
    }

    // Writes only report the status; the list is reloaded afterwards, so
    // whatever body the server sends back is not read.
    async fn create_task(&self, session: &Session, title: &str) -> ApiResult<()> {
        let url = self.endpoint(TASKS_PATH)?;
        let request = self
            .request(Method::POST, url, session)
            .json(&TitlePayload::new(title));
        self.send(request).await.map(|_| ())
    }

    async fn update_task(&self, session: &Session, id: &str, title: &str) -> ApiResult<()> {
        let url = self.task_endpoint(id)?;
        let request = self
            .request(Method::PUT, url, session)
            .json(&TitlePayload::new(title));
        self.send(request).await.map(|_| ())
    }

    async fn delete_task(&self, session: &Session, id: &str) -> ApiResult<()> {
        let url = self.task_endpoint(id)?;
        self.send(self.request(Method::DELETE, url, session))
            .await
            .map(|_| ())
    }
}
