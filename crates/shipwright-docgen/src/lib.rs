//! Shipwright Docgen - AI-generated code documentation for Confluence
//!
//! Walks a code directory, asks a language model to document every source
//! file in Confluence wiki markup, and mirrors the directory tree as a
//! page tree under a single root page.
//!
//! The model and the page store sit behind the [`DocWriter`] and
//! [`PageStore`] traits; [`fakes`] has in-memory versions of both.

pub mod config;
pub mod confluence;
pub mod error;
pub mod fakes;
pub mod generator;
pub mod llm;
pub mod markup;
pub mod publisher;
pub mod retry;

pub use config::DocgenConfig;
pub use confluence::{ConfluenceClient, PageDraft, PageRef, PageStore};
pub use error::{DocgenError, LlmError, PageError, Result};
pub use generator::{DocGenerator, DocReport};
pub use llm::{generate_documentation, DocWriter, OpenAiClient};
pub use publisher::Publisher;
pub use retry::RetryPolicy;
