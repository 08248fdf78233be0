//! In-memory fakes for the page store and documentation writer (testing only)
//!
//! `MemoryPageStore` follows Confluence's versioning rules: an update must
//! carry exactly the next version number, otherwise it conflicts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::confluence::{PageDraft, PageRef, PageStore};
use crate::error::{LlmError, PageError};
use crate::llm::DocWriter;

/// A page held by [`MemoryPageStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub id: String,
    pub title: String,
    pub space_key: String,
    pub body: String,
    pub parent_id: Option<String>,
    pub version: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    pages: HashMap<String, StoredPage>,
    next_id: u64,
    write_attempts: usize,
    queued_failures: VecDeque<PageError>,
    failing_titles: HashSet<String>,
    delete_on_write: Option<String>,
    published: Vec<String>,
}

/// In-memory page store keyed by page id.
#[derive(Debug, Default)]
pub struct MemoryPageStore {
    state: Mutex<StoreState>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next writes fail with these errors, in order.
    pub fn fail_next_writes(&self, errors: Vec<PageError>) {
        self.state.lock().unwrap().queued_failures.extend(errors);
    }

    /// Every write for `title` fails with a 500.
    pub fn fail_title(&self, title: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_titles
            .insert(title.to_string());
    }

    /// Delete the page titled `title` when the next write arrives.
    pub fn delete_on_next_write(&self, title: &str) {
        self.state.lock().unwrap().delete_on_write = Some(title.to_string());
    }

    /// Look up a page by title.
    pub fn page(&self, title: &str) -> Option<StoredPage> {
        self.state
            .lock()
            .unwrap()
            .pages
            .values()
            .find(|p| p.title == title)
            .cloned()
    }

    pub fn page_count(&self) -> usize {
        self.state.lock().unwrap().pages.len()
    }

    /// Create and update calls seen, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.state.lock().unwrap().write_attempts
    }

    /// Titles successfully written, in order.
    pub fn published_titles(&self) -> Vec<String> {
        self.state.lock().unwrap().published.clone()
    }

    fn begin_write(state: &mut StoreState, title: &str) -> Result<(), PageError> {
        state.write_attempts += 1;
        if let Some(doomed) = state.delete_on_write.take() {
            state.pages.retain(|_, p| p.title != doomed);
        }
        if let Some(err) = state.queued_failures.pop_front() {
            return Err(err);
        }
        if state.failing_titles.contains(title) {
            return Err(PageError::Http {
                status: 500,
                message: format!("scripted failure for '{}'", title),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PageStore for MemoryPageStore {
    async fn find_page(&self, title: &str, space_key: &str) -> Result<Option<PageRef>, PageError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pages
            .values()
            .find(|p| p.title == title && p.space_key == space_key)
            .map(|p| PageRef {
                id: p.id.clone(),
                version: p.version,
            }))
    }

    async fn create_page(&self, draft: &PageDraft) -> Result<String, PageError> {
        let mut state = self.state.lock().unwrap();
        Self::begin_write(&mut state, &draft.title)?;

        if state
            .pages
            .values()
            .any(|p| p.title == draft.title && p.space_key == draft.space_key)
        {
            return Err(PageError::Http {
                status: 400,
                message: format!("a page titled '{}' already exists", draft.title),
            });
        }

        state.next_id += 1;
        let id = (100 + state.next_id).to_string();
        state.pages.insert(
            id.clone(),
            StoredPage {
                id: id.clone(),
                title: draft.title.clone(),
                space_key: draft.space_key.clone(),
                body: draft.body.clone(),
                parent_id: draft.parent_id.clone(),
                version: 1,
            },
        );
        state.published.push(draft.title.clone());
        Ok(id)
    }

    async fn update_page(
        &self,
        id: &str,
        version: u64,
        draft: &PageDraft,
    ) -> Result<String, PageError> {
        let mut state = self.state.lock().unwrap();
        Self::begin_write(&mut state, &draft.title)?;

        let page = state.pages.get_mut(id).ok_or_else(|| PageError::Http {
            status: 404,
            message: format!("no page with id {}", id),
        })?;
        if version != page.version + 1 {
            return Err(PageError::Conflict(format!(
                "version {} does not follow {}",
                version, page.version
            )));
        }
        page.version = version;
        page.title = draft.title.clone();
        page.body = draft.body.clone();
        page.parent_id = draft.parent_id.clone();
        state.published.push(draft.title.clone());
        Ok(id.to_string())
    }
}

/// Documentation writer that replays scripted responses, then falls back
/// to a canned page per file.
#[derive(Debug, Default)]
pub struct ScriptedDocWriter {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedDocWriter {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        ScriptedDocWriter {
            script: Mutex::new(script.into()),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    /// File paths passed to `document`, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocWriter for ScriptedDocWriter {
    async fn document(&self, _file_content: &str, file_path: &str) -> Result<String, LlmError> {
        self.requested.lock().unwrap().push(file_path.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(format!("h1. {}", file_path)),
        }
    }
}
