//! Raw request/response capture for debugging.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::warn;

/// Writes numbered files into a debug directory.
///
/// Files are named `{tag}_{counter:04}_{name}.{ext}` so that several clients
/// can share one directory.
#[derive(Debug)]
pub struct DebugCapture {
    dir: PathBuf,
    tag: String,
    counter: AtomicU32,
}

impl DebugCapture {
    /// Create the capture directory if needed.
    pub fn new(dir: impl Into<PathBuf>, tag: &str) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            tag: sanitize(tag),
            counter: AtomicU32::new(0),
        })
    }

    /// Write one capture file. Failures are logged, never propagated.
    pub async fn save(&self, name: &str, ext: &str, content: &str) -> Option<PathBuf> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let path = self
            .dir
            .join(format!("{}_{:04}_{}.{}", self.tag, n, sanitize(name), ext));
        match tokio::fs::write(&path, content).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Failed to write debug capture {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Keep file names portable.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_files_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let capture = DebugCapture::new(dir.path().join("debug"), "Köln").unwrap();

        let first = capture.save("GET response", "html", "<html/>").await.unwrap();
        let second = capture.save("POST request", "txt", "a=b").await.unwrap();

        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "K_ln_0001_GET_response.html"
        );
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "K_ln_0002_POST_request.txt"
        );
        assert_eq!(std::fs::read_to_string(second).unwrap(), "a=b");
    }
}
