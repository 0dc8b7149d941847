use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::splitter::RecursiveCharacterSplitter;
use super::store::{ChunkMetadata, ChunkRecord, StoreError, VectorStore};
use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::types::IngestReport;

pub const VALID_EXTENSIONS: &[&str] = &["py", "js", "ts", "html", "css", "md", "java", "cpp"];
const TOP_K: usize = 5;
/// Upper bound on inputs per embeddings request.
const EMBED_BATCH: usize = 64;

#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("'{0}' is not a directory")]
    NotADirectory(String),
}

/// Answers questions about a codebase from its indexed chunks.
pub struct CodebaseAssistant<S: VectorStore> {
    chat: LlmClient,
    embedder: LlmClient,
    store: S,
    splitter: RecursiveCharacterSplitter,
}

fn has_valid_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VALID_EXTENSIONS.contains(&ext))
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        r#"
You are an expert AI software engineering assistant. Your task is to answer questions about a codebase.
You will be given a user's question and a context of relevant code snippets.
Your answer must be based ONLY on the provided context.
If the context does not contain the information needed to answer the question, you must state that you cannot answer.

CONTEXT:
{context}

QUESTION:
{question}

ANSWER:
"#
    )
}

impl<S: VectorStore> CodebaseAssistant<S> {
    pub fn new(chat: LlmClient, embedder: LlmClient, store: S) -> Self {
        Self {
            chat,
            embedder,
            store,
            splitter: RecursiveCharacterSplitter::default(),
        }
    }

    /// Discover, chunk, embed and index every source file under `root`.
    pub async fn ingest(&mut self, root: &Path) -> Result<IngestReport, RagError> {
        if !root.is_dir() {
            return Err(RagError::NotADirectory(root.display().to_string()));
        }
        info!("Starting ingestion for directory: {}", root.display());

        let mut report = IngestReport::default();
        let files = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && has_valid_extension(entry.path()));

        for entry in files {
            let file_path = entry.path().display().to_string();
            info!("Processing file: {}", file_path);
            match self.ingest_file(entry.path(), &file_path).await {
                Ok(chunks) => {
                    info!("Split {} into {} chunks", file_path, chunks);
                    report.files_processed += 1;
                    report.chunks_added += chunks;
                }
                Err(e) => {
                    warn!("ERROR processing file {}: {}", file_path, e);
                    report.files_failed += 1;
                }
            }
        }

        self.store.flush().await?;
        report.total_documents = self.store.count();
        info!(
            "Ingestion complete: {} files, {} chunks, {} documents in collection",
            report.files_processed, report.chunks_added, report.total_documents
        );
        Ok(report)
    }

    async fn ingest_file(&mut self, path: &Path, file_path: &str) -> Result<usize, IngestFileError> {
        let content = tokio::fs::read_to_string(path).await?;
        let chunks = self.splitter.split_text(&content);

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            embeddings.extend(self.embedder.embed(batch).await?);
        }
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (document, embedding))| ChunkRecord {
                id: format!("{file_path}-{i}"),
                document,
                embedding,
                metadata: ChunkMetadata {
                    source: file_path.to_string(),
                },
            })
            .collect();
        let added = records.len();
        // chunks from an older, longer version of the file would otherwise linger
        let stale = self.store.remove_source(file_path);
        if stale > 0 {
            debug!("Replaced {} previous chunks of {}", stale, file_path);
        }
        self.store.add(records)?;
        Ok(added)
    }

    /// Retrieve the closest chunks and let the chat model answer from them only.
    pub async fn query(&self, question: &str) -> Result<String, RagError> {
        let mut embeddings = self.embedder.embed(&[question.to_string()]).await?;
        let question_embedding = embeddings.pop().ok_or_else(|| LlmError::ParseError {
            message: "No embedding returned for question".to_string(),
        })?;

        let matches = self.store.query(&question_embedding, TOP_K);
        info!("Retrieved {} context chunks", matches.len());
        for m in &matches {
            debug!("  - {} from {} (score {:.3})", m.id, m.metadata.source, m.score);
        }
        let context = matches
            .iter()
            .map(|m| m.document.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n");

        let prompt = build_prompt(&context, question);
        Ok(self.chat.chat_text(&[ChatMessage::user(prompt)]).await?)
    }
}

/// Per-file failures; logged and skipped during ingestion.
#[derive(Debug, Error)]
enum IngestFileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
