//! Sequential upload pipeline.
//!
//! Files are sent one at a time: a queue of pending paths, a single in-flight
//! slot, and a list of result lines. The next file only leaves the queue once
//! the previous one has settled, successfully or not.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::{file_label, ApiError, Backend, IngestResponse};

/// Result line for one settled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub line: String,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
pub struct Uploader {
    pending: VecDeque<PathBuf>,
    in_flight: Option<PathBuf>,
    lines: Vec<String>,
    uploading: bool,
}

impl Uploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// True from the first file's start until the last file settles.
    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn in_flight(&self) -> Option<&Path> {
        self.in_flight.as_deref()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queue a selection. Empty selections and selections made while a batch
    /// is running are ignored.
    pub fn start(&mut self, files: Vec<PathBuf>) -> bool {
        if files.is_empty() || self.uploading {
            return false;
        }
        info!(files = files.len(), "starting upload batch");
        self.pending.extend(files);
        self.uploading = true;
        true
    }

    /// Move the next file into the in-flight slot.
    ///
    /// Returns `None` while a file is still in flight. Once the queue drains
    /// with nothing in flight, the batch is over.
    pub fn next_file(&mut self) -> Option<PathBuf> {
        if self.in_flight.is_some() {
            return None;
        }
        match self.pending.pop_front() {
            Some(path) => {
                self.in_flight = Some(path.clone());
                Some(path)
            }
            None => {
                if self.uploading {
                    info!("upload batch finished");
                }
                self.uploading = false;
                None
            }
        }
    }

    /// Settle the in-flight file and record its result line.
    pub fn complete(&mut self, result: Result<IngestResponse, ApiError>) -> Settled {
        let label = self
            .in_flight
            .take()
            .map(|path| file_label(&path))
            .unwrap_or_default();

        let settled = match result {
            Ok(response) => {
                info!(file = %response.filename, chunks = response.chunks, "file indexed");
                Settled {
                    line: format!("Indexed {} chunks from {}", response.chunks, response.filename),
                    succeeded: true,
                }
            }
            Err(e) => {
                warn!(file = %label, error = %e, "upload failed");
                Settled {
                    line: format!("Upload failed for {}", label),
                    succeeded: false,
                }
            }
        };

        if !self.lines.contains(&settled.line) {
            self.lines.push(settled.line.clone());
        }
        settled
    }
}

/// Drive a whole batch to completion against `backend`, one file at a time.
///
/// `on_settled` runs after each file. Returns the number of files processed.
pub async fn run_batch<B, F>(
    uploader: &mut Uploader,
    backend: &B,
    files: Vec<PathBuf>,
    mut on_settled: F,
) -> usize
where
    B: Backend + ?Sized,
    F: FnMut(&Settled),
{
    if !uploader.start(files) {
        return 0;
    }

    let mut processed = 0;
    while let Some(path) = uploader.next_file() {
        let result = backend.ingest(&path).await;
        let settled = uploader.complete(result);
        on_settled(&settled);
        processed += 1;
    }
    processed
}

/// Split a typed selection into paths.
///
/// Paths are separated by whitespace; wrap a path in double quotes to keep its
/// spaces. A leading `~/` expands to the home directory.
pub fn parse_selection(input: &str) -> Vec<PathBuf> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens.into_iter().map(|t| expand_home(&t)).collect()
}

fn expand_home(token: &str) -> PathBuf {
    if let Some(rest) = token.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeBackend;
    use std::sync::atomic::Ordering;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[tokio::test]
    async fn test_resume_upload_reports_chunks() {
        let backend = FakeBackend::new().with_chunks(12);
        let mut uploader = Uploader::new();

        let processed = run_batch(&mut uploader, &backend, paths(&["resume.pdf"]), |_| {}).await;

        assert_eq!(processed, 1);
        assert_eq!(uploader.lines(), ["Indexed 12 chunks from resume.pdf"]);
        assert!(!uploader.is_uploading());
    }

    #[tokio::test]
    async fn test_files_are_uploaded_strictly_in_order() {
        let backend = FakeBackend::new();
        let mut uploader = Uploader::new();

        let processed =
            run_batch(&mut uploader, &backend, paths(&["a.pdf", "b.docx", "c.txt"]), |_| {}).await;

        assert_eq!(processed, 3);
        assert_eq!(
            backend.calls(),
            [
                "start a.pdf",
                "end a.pdf",
                "start b.docx",
                "end b.docx",
                "start c.txt",
                "end c.txt",
            ]
        );
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_block_later_files() {
        let backend = FakeBackend::new().with_chunks(2).failing_on("bad.exe");
        let mut uploader = Uploader::new();
        let mut seen = Vec::new();

        run_batch(
            &mut uploader,
            &backend,
            paths(&["bad.exe", "good.pdf"]),
            |settled| seen.push(settled.succeeded),
        )
        .await;

        assert_eq!(seen, [false, true]);
        assert_eq!(
            uploader.lines(),
            ["Upload failed for bad.exe", "Indexed 2 chunks from good.pdf"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_suppressed() {
        let backend = FakeBackend::new().with_chunks(4);
        let mut uploader = Uploader::new();

        run_batch(&mut uploader, &backend, paths(&["a.pdf", "a.pdf"]), |_| {}).await;
        run_batch(&mut uploader, &backend, paths(&["a.pdf"]), |_| {}).await;

        assert_eq!(backend.calls().len(), 6);
        assert_eq!(uploader.lines(), ["Indexed 4 chunks from a.pdf"]);
    }

    #[tokio::test]
    async fn test_empty_selection_is_ignored() {
        let backend = FakeBackend::new();
        let mut uploader = Uploader::new();

        let processed = run_batch(&mut uploader, &backend, Vec::new(), |_| {}).await;

        assert_eq!(processed, 0);
        assert!(backend.calls().is_empty());
        assert!(!uploader.is_uploading());
        assert!(uploader.lines().is_empty());
    }

    #[test]
    fn test_one_in_flight_slot() {
        let mut uploader = Uploader::new();
        assert!(uploader.start(paths(&["a.pdf", "b.pdf"])));
        assert!(uploader.is_uploading());

        assert_eq!(uploader.next_file(), Some(PathBuf::from("a.pdf")));
        assert_eq!(uploader.next_file(), None);
        assert!(uploader.is_uploading());
        assert_eq!(uploader.pending_count(), 1);

        uploader.complete(Ok(IngestResponse {
            filename: "a.pdf".to_string(),
            chunks: 1,
        }));
        assert!(uploader.is_uploading());
        assert_eq!(uploader.next_file(), Some(PathBuf::from("b.pdf")));

        uploader.complete(Err(ApiError::Task("panicked".to_string())));
        assert!(uploader.is_uploading());
        assert_eq!(uploader.next_file(), None);
        assert!(!uploader.is_uploading());
    }

    #[test]
    fn test_new_batch_rejected_while_uploading() {
        let mut uploader = Uploader::new();
        assert!(uploader.start(paths(&["a.pdf"])));
        assert!(!uploader.start(paths(&["b.pdf"])));
        assert_eq!(uploader.pending_count(), 1);
    }

    #[test]
    fn test_parse_selection_splits_and_quotes() {
        assert_eq!(
            parse_selection(r#"resume.pdf  "my jd.txt" notes.md"#),
            paths(&["resume.pdf", "my jd.txt", "notes.md"])
        );
        assert!(parse_selection("   ").is_empty());
    }

    #[test]
    fn test_parse_selection_expands_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(parse_selection("~/cv.pdf"), vec![home.join("cv.pdf")]);
        }
    }
}
