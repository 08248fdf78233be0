//! Directory walker that mirrors a code tree as a Confluence page tree.

use crate::config::DocgenConfig;
use crate::confluence::{ConfluenceClient, PageStore};
use crate::error::{DocgenError, Result};
use crate::llm::{generate_documentation, DocWriter, OpenAiClient};
use crate::markup;
use crate::publisher::Publisher;
use crate::retry::RetryPolicy;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a documentation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocReport {
    /// Id of the root documentation page.
    pub root_page_id: String,
    /// Pages created or updated, root included.
    pub pages_published: usize,
    /// Source files whose page was published.
    pub files_documented: usize,
    /// Empty source files and files with other extensions.
    pub files_skipped: usize,
    /// Pages that could not be published and files that could not be read.
    pub failures: Vec<String>,
}

impl DocReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Generates and publishes documentation for every source file under a
/// code root.
pub struct DocGenerator {
    root_title: String,
    space_key: String,
    code_root_label: String,
    code_dir: PathBuf,
    extensions: Vec<String>,
    writer: Arc<dyn DocWriter>,
    publisher: Publisher,
    llm_policy: RetryPolicy,
}

impl DocGenerator {
    pub fn new(
        config: &DocgenConfig,
        writer: Arc<dyn DocWriter>,
        store: Arc<dyn PageStore>,
    ) -> Self {
        DocGenerator {
            root_title: config.root_doc_title.clone(),
            space_key: config.space_key.clone(),
            code_root_label: config.code_root_path.to_string_lossy().into_owned(),
            code_dir: config.code_dir(),
            extensions: vec!["py".to_string()],
            writer,
            publisher: Publisher::new(store),
            llm_policy: RetryPolicy::default(),
        }
    }

    /// Build a generator backed by OpenAI and Confluence Cloud.
    pub fn from_config(config: &DocgenConfig) -> Result<Self> {
        let writer = OpenAiClient::new(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.openai_base_url.clone(),
        )
        .map_err(|e| DocgenError::Http(e.to_string()))?;
        let store = ConfluenceClient::new(
            config.confluence_url.clone(),
            config.confluence_email.clone(),
            config.confluence_api_token.clone(),
        )
        .map_err(|e| DocgenError::Http(e.to_string()))?;

        Ok(Self::new(config, Arc::new(writer), Arc::new(store)))
    }

    /// File extensions (without the dot) that get documented.
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_retry_policies(mut self, llm: RetryPolicy, publish: RetryPolicy) -> Self {
        self.llm_policy = llm;
        self.publisher = self.publisher.with_policy(publish);
        self
    }

    /// Publish the root page, then walk the code directory in sorted order.
    ///
    /// Directories become pages under their parent and are only descended
    /// when their page was published. Matching non-empty files get a
    /// generated page. Per-file problems are collected in the report.
    pub async fn run(&self) -> Result<DocReport> {
        info!(
            title = %self.root_title,
            space = %self.space_key,
            code_root = %self.code_root_label,
            "starting documentation run"
        );

        let root_body = markup::root_page_body(&self.root_title, &self.code_root_label);
        let root_id = self
            .publisher
            .publish(&self.root_title, &root_body, &self.space_key, None)
            .await
            .ok_or_else(|| DocgenError::RootPageFailed(self.root_title.clone()))?;

        let mut report = DocReport {
            root_page_id: root_id.clone(),
            pages_published: 1,
            ..DocReport::default()
        };

        let is_dir = tokio::fs::metadata(&self.code_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(DocgenError::NotADirectory(self.code_dir.clone()));
        }

        // depth-first, children pushed in reverse so they pop in sorted order
        let mut pending: Vec<(PathBuf, String)> = sorted_entries(&self.code_dir)
            .await?
            .into_iter()
            .rev()
            .map(|p| (p, root_id.clone()))
            .collect();

        while let Some((path, parent_id)) = pending.pop() {
            let relative = path
                .strip_prefix(&self.code_dir)
                .unwrap_or(&path)
                .to_path_buf();

            let is_dir = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);

            if is_dir {
                let Some(page_id) = self.publish_directory(&path, &relative, &parent_id).await
                else {
                    warn!(dir = %path.display(), "skipping subdirectory, its page was not published");
                    report
                        .failures
                        .push(markup::directory_title(&self.root_title, &relative));
                    continue;
                };
                report.pages_published += 1;

                match sorted_entries(&path).await {
                    Ok(children) => {
                        pending.extend(children.into_iter().rev().map(|c| (c, page_id.clone())))
                    }
                    Err(e) => {
                        warn!(dir = %path.display(), error = %e, "cannot list directory");
                        report
                            .failures
                            .push(format!("{}: {}", markup::display_path(&relative), e));
                    }
                }
            } else if self.is_source(&path) {
                self.document_file(&path, &relative, &parent_id, &mut report)
                    .await;
            } else {
                debug!(file = %path.display(), "skipping non-source file");
                report.files_skipped += 1;
            }
        }

        info!(
            pages = report.pages_published,
            documented = report.files_documented,
            skipped = report.files_skipped,
            failures = report.failures.len(),
            "documentation run finished"
        );
        Ok(report)
    }

    async fn publish_directory(
        &self,
        path: &Path,
        relative: &Path,
        parent_id: &str,
    ) -> Option<String> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = markup::directory_title(&self.root_title, relative);
        debug!(title = %title, "publishing directory page");
        self.publisher
            .publish(
                &title,
                &markup::directory_page_body(&name),
                &self.space_key,
                Some(parent_id),
            )
            .await
    }

    async fn document_file(
        &self,
        path: &Path,
        relative: &Path,
        parent_id: &str,
        report: &mut DocReport,
    ) {
        let shown = markup::display_path(relative);
        let title = markup::file_title(&self.root_title, relative);

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot read source file");
                report.failures.push(format!("{}: {}", shown, e));
                return;
            }
        };
        if content.trim().is_empty() {
            info!(file = %shown, "skipping empty file");
            report.files_skipped += 1;
            return;
        }

        info!(title = %title, "generating documentation");
        let doc =
            generate_documentation(self.writer.as_ref(), &content, &shown, &self.llm_policy)
                .await;

        match self
            .publisher
            .publish(&title, &doc, &self.space_key, Some(parent_id))
            .await
        {
            Some(_) => {
                report.pages_published += 1;
                report.files_documented += 1;
            }
            None => report.failures.push(title),
        }
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|x| x == ext))
            .unwrap_or(false)
    }
}

async fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryPageStore, ScriptedDocWriter};

    fn config(workspace: &Path) -> DocgenConfig {
        let workspace = workspace.to_string_lossy().into_owned();
        DocgenConfig::from_lookup(move |key| match key {
            "OPENAI_API_KEY" => Some("sk".to_string()),
            "CONFLUENCE_URL" => Some("https://example.atlassian.net/wiki".to_string()),
            "CONFLUENCE_EMAIL" => Some("dev@example.com".to_string()),
            "CONFLUENCE_API_TOKEN" => Some("tok".to_string()),
            "CONFLUENCE_SPACE_KEY" => Some("APD".to_string()),
            "GITHUB_WORKSPACE" => Some(workspace.clone()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_is_source_respects_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let generator = DocGenerator::new(
            &config(dir.path()),
            Arc::new(ScriptedDocWriter::default()),
            Arc::new(MemoryPageStore::new()),
        );
        assert!(generator.is_source(Path::new("a/b.py")));
        assert!(!generator.is_source(Path::new("a/b.pyc")));
        assert!(!generator.is_source(Path::new("README")));

        let generator = generator.with_extensions(&["rs"]);
        assert!(generator.is_source(Path::new("lib.rs")));
        assert!(!generator.is_source(Path::new("a/b.py")));
    }

    #[tokio::test]
    async fn test_missing_code_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryPageStore::new());
        let generator = DocGenerator::new(
            &config(dir.path()),
            Arc::new(ScriptedDocWriter::default()),
            store.clone(),
        );

        let err = generator.run().await.unwrap_err();
        assert!(matches!(err, DocgenError::NotADirectory(_)));
        // root page is published before the code path is checked
        assert!(store.page("Project Documentation").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_root_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("app")).unwrap();
        let store = Arc::new(MemoryPageStore::new());
        store.fail_title("Project Documentation");
        let writer = Arc::new(ScriptedDocWriter::default());
        let generator = DocGenerator::new(&config(dir.path()), writer.clone(), store.clone());

        let err = generator.run().await.unwrap_err();
        assert!(matches!(err, DocgenError::RootPageFailed(_)));
        assert_eq!(store.write_attempts(), 3);
        assert_eq!(writer.calls(), 0);
    }
}
