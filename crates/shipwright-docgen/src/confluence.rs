//! Confluence page store over the REST content API.

use crate::error::PageError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Existing page identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub id: String,
    pub version: u64,
}

/// Page content to create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDraft {
    pub title: String,
    pub space_key: String,
    /// Body in Confluence wiki markup
    pub body: String,
    pub parent_id: Option<String>,
}

impl PageDraft {
    /// REST payload. `update` carries the page id and new version number.
    pub fn to_payload(&self, update: Option<(&str, u64)>) -> Value {
        let mut payload = json!({
            "type": "page",
            "title": self.title,
            "space": { "key": self.space_key },
            "body": {
                "wiki": {
                    "value": self.body,
                    "representation": "wiki",
                }
            },
        });
        if let Some(parent) = &self.parent_id {
            payload["ancestors"] = json!([{ "id": parent }]);
        }
        if let Some((id, version)) = update {
            payload["id"] = json!(id);
            payload["version"] = json!({ "number": version });
        }
        payload
    }
}

/// Storage for documentation pages.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Look up a page by exact title within a space.
    async fn find_page(&self, title: &str, space_key: &str) -> Result<Option<PageRef>, PageError>;

    /// Create a page, returning its id.
    async fn create_page(&self, draft: &PageDraft) -> Result<String, PageError>;

    /// Replace a page's content. `version` is the new version number.
    async fn update_page(&self, id: &str, version: u64, draft: &PageDraft)
        -> Result<String, PageError>;
}

/// Confluence Cloud REST client
pub struct ConfluenceClient {
    http_client: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    id: String,
    version: VersionInfo,
}

#[derive(Deserialize)]
struct VersionInfo {
    number: u64,
}

#[derive(Deserialize)]
struct ContentResponse {
    id: String,
}

impl ConfluenceClient {
    /// Create a client for `base_url` (the site URL ending in `/wiki`).
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self, PageError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("shipwright-docgen/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(ConfluenceClient {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email: email.into(),
            api_token: api_token.into(),
        })
    }

    fn content_url(&self) -> String {
        format!("{}/rest/api/content", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CONFLICT {
            Err(PageError::Conflict(message))
        } else {
            Err(PageError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl PageStore for ConfluenceClient {
    async fn find_page(&self, title: &str, space_key: &str) -> Result<Option<PageRef>, PageError> {
        let response = self
            .http_client
            .get(self.content_url())
            .basic_auth(&self.email, Some(&self.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("title", title), ("spaceKey", space_key), ("expand", "version")])
            .send()
            .await?;
        let found: SearchResponse = Self::check(response).await?.json().await?;

        Ok(found.results.into_iter().next().map(|r| PageRef {
            id: r.id,
            version: r.version.number,
        }))
    }

    async fn create_page(&self, draft: &PageDraft) -> Result<String, PageError> {
        debug!(title = %draft.title, "creating page");
        let response = self
            .http_client
            .post(self.content_url())
            .basic_auth(&self.email, Some(&self.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&draft.to_payload(None))
            .send()
            .await?;
        let created: ContentResponse = Self::check(response).await?.json().await?;
        Ok(created.id)
    }

    async fn update_page(
        &self,
        id: &str,
        version: u64,
        draft: &PageDraft,
    ) -> Result<String, PageError> {
        debug!(title = %draft.title, id = %id, version, "updating page");
        let response = self
            .http_client
            .put(format!("{}/{}", self.content_url(), id))
            .basic_auth(&self.email, Some(&self.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&draft.to_payload(Some((id, version))))
            .send()
            .await?;
        let updated: ContentResponse = Self::check(response).await?.json().await?;
        Ok(updated.id)
    }
}
