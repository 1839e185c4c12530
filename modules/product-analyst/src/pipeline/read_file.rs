use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use llm_client::{Tool, ToolDefinition};
use serde::Deserialize;
use thiserror::Error;

use crate::materializer::Manifest;

#[derive(Debug, Deserialize)]
pub struct ReadFileArgs {
    pub file_path: String,
}

#[derive(Debug, Error)]
pub enum ReadFileError {
    #[error("{0} is not one of this run's descriptor files")]
    NotAllowed(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reads descriptor files of the current run, and nothing else.
#[derive(Clone)]
pub struct ReadFileTool {
    allowed: Arc<HashSet<PathBuf>>,
    max_bytes: usize,
}

impl ReadFileTool {
    pub fn for_manifest(manifest: &Manifest, max_bytes: usize) -> Self {
        let mut allowed = HashSet::new();
        for path in manifest.paths() {
            allowed.insert(path.to_path_buf());
            if let Ok(canonical) = path.canonicalize() {
                allowed.insert(canonical);
            }
        }
        Self {
            allowed: Arc::new(allowed),
            max_bytes,
        }
    }

    fn is_allowed(&self, path: &Path) -> bool {
        self.allowed.contains(path)
            || path
                .canonicalize()
                .map(|c| self.allowed.contains(&c))
                .unwrap_or(false)
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    const NAME: &'static str = "read_file";
    type Error = ReadFileError;
    type Args = ReadFileArgs;
    type Output = String;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Read the full content of one product descriptor file. \
                          Pass one of the file paths listed in the task."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path of the descriptor file to read"
                    }
                },
                "required": ["file_path"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let requested = args.file_path.trim();
        let path = Path::new(requested);
        if !self.is_allowed(path) {
            tracing::warn!(path = requested, "Agent asked for a file outside the manifest");
            return Err(ReadFileError::NotAllowed(requested.to_string()));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ReadFileError::Io {
                path: requested.to_string(),
                source,
            })?;

        Ok(truncate_to_char_boundary(&content, self.max_bytes).to_string())
    }
}

fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
