//! Create-or-update publishing with retries.

use crate::confluence::{PageDraft, PageRef, PageStore};
use crate::error::PageError;
use crate::retry::RetryPolicy;
use std::sync::Arc;
use tracing::{info, warn};

/// Publishes pages into a [`PageStore`], creating or updating by title.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn PageStore>,
    policy: RetryPolicy,
}

impl Publisher {
    pub fn new(store: Arc<dyn PageStore>) -> Self {
        Publisher {
            store,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create the page if no page with `title` exists, else bump its
    /// version and replace the body.
    ///
    /// Returns the page id, or `None` once every attempt failed. A conflict
    /// re-reads the page version; if the page vanished in the meantime the
    /// next attempt creates it without waiting.
    pub async fn publish(
        &self,
        title: &str,
        body: &str,
        space_key: &str,
        parent_id: Option<&str>,
    ) -> Option<String> {
        let draft = PageDraft {
            title: title.to_string(),
            space_key: space_key.to_string(),
            body: body.to_string(),
            parent_id: parent_id.map(str::to_string),
        };

        let mut existing = self.lookup(title, space_key).await;

        for attempt in 1..=self.policy.max_attempts {
            let result = match &existing {
                Some(page) => {
                    self.store
                        .update_page(&page.id, page.version + 1, &draft)
                        .await
                }
                None => self.store.create_page(&draft).await,
            };
            let action = if existing.is_some() { "update" } else { "create" };

            match result {
                Ok(id) => {
                    info!(title = %title, id = %id, action, "published page");
                    return Some(id);
                }
                Err(PageError::Conflict(reason)) => {
                    warn!(title = %title, attempt, reason = %reason, "page conflict, re-reading version");
                    existing = self.lookup(title, space_key).await;
                    if existing.is_none() {
                        info!(title = %title, "page disappeared, creating instead");
                        continue;
                    }
                }
                Err(e) => {
                    warn!(title = %title, attempt, action, error = %e, "failed to publish page");
                }
            }

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        warn!(
            title = %title,
            attempts = self.policy.max_attempts,
            "giving up on page"
        );
        None
    }

    async fn lookup(&self, title: &str, space_key: &str) -> Option<PageRef> {
        match self.store.find_page(title, space_key).await {
            Ok(page) => page,
            Err(e) => {
                warn!(title = %title, error = %e, "page lookup failed, treating as absent");
                None
            }
        }
    }
}
