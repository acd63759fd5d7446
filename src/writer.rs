use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ExportError;
use crate::markdown::sanitize_filename;

/// Writes rendered documents into the destination directory.
#[derive(Debug, Clone)]
pub struct DocumentWriter {
    dir: PathBuf,
    max_filename_len: usize,
}

impl DocumentWriter {
    pub fn new(dir: PathBuf, max_filename_len: usize) -> Self {
        Self {
            dir,
            max_filename_len,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the destination directory if needed.
    pub async fn ensure_dir(&self) -> Result<(), ExportError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ExportError::WriteFailed(format!("{}: {}", self.dir.display(), e)))
    }

    /// Write one document, deriving the filename from the sanitized title.
    pub async fn write_document(&self, title: &str, content: &str) -> Result<PathBuf, ExportError> {
        let filename = format!("{}.md", sanitize_filename(title, self.max_filename_len));
        let path = self.dir.join(filename);

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ExportError::WriteFailed(format!("{}: {}", path.display(), e)))?;

        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_document() {
        let temp = TempDir::new().unwrap();
        let writer = DocumentWriter::new(temp.path().join("out"), 150);

        writer.ensure_dir().await.unwrap();
        let path = writer
            .write_document("A Title: With/Illegal Chars?", "# hello\n")
            .await
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "A Title WithIllegal Chars.md"
        );
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "# hello\n");
    }

    #[tokio::test]
    async fn test_missing_directory_is_write_failed() {
        let temp = TempDir::new().unwrap();
        let writer = DocumentWriter::new(temp.path().join("never_created"), 150);

        let err = writer.write_document("title", "content").await.unwrap_err();
        assert!(matches!(err, ExportError::WriteFailed(_)));
    }
}
