use async_trait::async_trait;
use geotrackr_core::AssetSnapshot;
use geotrackr_ports::{FetchError, SnapshotSource};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<RestError> for FetchError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Http(e) => FetchError::Network(e.to_string()),
            RestError::Api { status, message } => FetchError::Api { status, message },
            RestError::Parse(msg) => FetchError::Parse(msg),
        }
    }
}

/// Envelope around every REST response
#[derive(Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

/// Asset list polled from the REST API
#[derive(Clone)]
pub struct RestSnapshotSource {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl RestSnapshotSource {
    pub fn new(base_url: Url, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, RestError> {
        let status = resp.status();
        let text = resp.text().await?;

        let envelope = serde_json::from_str::<ApiResponse<T>>(&text);
        if !status.is_success() {
            let message = envelope
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| text.clone());
            return Err(RestError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = envelope.map_err(|e| RestError::Parse(e.to_string()))?;
        if !envelope.success {
            return Err(RestError::Api {
                status: status.as_u16(),
                message: envelope.message.unwrap_or_default(),
            });
        }
        envelope
            .data
            .ok_or_else(|| RestError::Parse("response has no data".to_string()))
    }

    pub async fn assets(&self) -> Result<Vec<AssetSnapshot>, RestError> {
        self.get("/assets").await
    }
}

#[async_trait]
impl SnapshotSource for RestSnapshotSource {
    async fn fetch_assets(&self) -> Result<Vec<AssetSnapshot>, FetchError> {
        Ok(self.assets().await?)
    }
}
