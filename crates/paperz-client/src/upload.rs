//! Upload status tracking and file-to-record orchestration.
//!
//! A small status machine around each upload: `Initial` while idle,
//! `Saving` while a submission is in flight, back to `Initial` once it
//! lands. `Success` exists but the flow never rests there; `Failed` holds
//! the error until the next reset.

use std::path::Path;

use tracing::warn;

use paperz_core::hash::{ActionHash, EntryHash};
use paperz_core::types::{Meme, Paper};

use crate::error::ClientError;
use crate::memez::MemezClient;
use crate::paperz::PaperzClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadStatus {
    #[default]
    Initial,
    Saving,
    Success,
    Failed,
}

/// Records every status an upload passes through, plus the last error.
#[derive(Debug, Default)]
pub struct UploadTracker {
    history: Vec<UploadStatus>,
    error: Option<String>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self {
            history: vec![UploadStatus::Initial],
            error: None,
        }
    }

    pub fn status(&self) -> UploadStatus {
        self.history.last().copied().unwrap_or_default()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Every status since construction, oldest first.
    pub fn history(&self) -> &[UploadStatus] {
        &self.history
    }

    /// Back to `Initial`, clearing any recorded error.
    pub fn reset(&mut self) {
        self.error = None;
        self.push(UploadStatus::Initial);
    }

    pub fn begin(&mut self) {
        self.push(UploadStatus::Saving);
    }

    pub fn finish_ok(&mut self) {
        self.push(UploadStatus::Initial);
    }

    pub fn finish_err(&mut self, message: String) {
        warn!(%message, "upload failed");
        self.error = Some(message);
        self.push(UploadStatus::Failed);
    }

    fn push(&mut self, status: UploadStatus) {
        self.history.push(status);
    }
}

/// Read a file into a paper record; the filename is the path's final
/// component.
pub async fn read_paper(path: &Path) -> Result<Paper, ClientError> {
    let bytes = read_file(path).await?;
    Ok(Paper::from_bytes(filename_of(path), &bytes))
}

/// Read a file into a meme record.
pub async fn read_meme(path: &Path) -> Result<Meme, ClientError> {
    let bytes = read_file(path).await?;
    Ok(Meme::from_bytes(filename_of(path), &bytes))
}

/// Read and upload one paper, tracking status along the way.
///
/// Success leaves the tracker back at `Initial`; any failure parks it at
/// `Failed` with the error recorded. There is no retry.
pub async fn upload_paper_file(
    paperz: &PaperzClient,
    tracker: &mut UploadTracker,
    path: &Path,
) -> Result<(EntryHash, ActionHash), ClientError> {
    tracker.begin();
    let paper = match read_paper(path).await {
        Ok(paper) => paper,
        Err(err) => {
            tracker.finish_err(err.to_string());
            return Err(err);
        }
    };
    match paperz.upload_paper(&paper).await {
        Ok(ids) => {
            tracker.finish_ok();
            Ok(ids)
        }
        Err(err) => {
            tracker.finish_err(err.to_string());
            Err(err)
        }
    }
}

/// Read and upload one meme, tracking status along the way.
pub async fn upload_meme_file(
    memez: &MemezClient,
    tracker: &mut UploadTracker,
    path: &Path,
) -> Result<(EntryHash, ActionHash), ClientError> {
    tracker.begin();
    let meme = match read_meme(path).await {
        Ok(meme) => meme,
        Err(err) => {
            tracker.finish_err(err.to_string());
            return Err(err);
        }
    };
    match memez.upload_meme(&meme).await {
        Ok(ids) => {
            tracker.finish_ok();
            Ok(ids)
        }
        Err(err) => {
            tracker.finish_err(err.to_string());
            Err(err)
        }
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ClientError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ClientError::File {
            path: path.to_path_buf(),
            source,
        })
}

fn filename_of(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use paperz_conductor::testing::StubConductor;

    async fn session_with_app() -> (StubConductor, Session) {
        let stub = StubConductor::start().await;
        stub.install_paperz_app("test-app");
        let session = Session::connect(stub.config()).await.unwrap();
        (stub, session)
    }

    fn write_temp(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn tracker_starts_initial() {
        let tracker = UploadTracker::new();
        assert_eq!(tracker.status(), UploadStatus::Initial);
        assert_eq!(tracker.history(), &[UploadStatus::Initial]);
        assert!(tracker.error().is_none());
    }

    #[tokio::test]
    async fn successful_upload_returns_to_initial() {
        let (stub, session) = session_with_app().await;
        let paperz = session.paperz();
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_temp(&dir, "draft.pdf", b"%PDF");

        let mut tracker = UploadTracker::new();
        upload_paper_file(&paperz, &mut tracker, &path).await.unwrap();

        // saving is visible in between, but the flow ends back at initial
        assert_eq!(
            tracker.history(),
            &[
                UploadStatus::Initial,
                UploadStatus::Saving,
                UploadStatus::Initial
            ]
        );
        assert!(tracker.error().is_none());

        let papers = stub.papers();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].1.filename, "draft.pdf");
    }

    #[tokio::test]
    async fn failed_upload_parks_at_failed() {
        let (stub, session) = session_with_app().await;
        let paperz = session.paperz();
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_temp(&dir, "draft.pdf", b"%PDF");

        stub.fail_next_zome_call("no space left in dht");
        let mut tracker = UploadTracker::new();
        let err = upload_paper_file(&paperz, &mut tracker, &path)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no space left in dht"));

        assert_eq!(tracker.status(), UploadStatus::Failed);
        assert_eq!(
            tracker.history(),
            &[
                UploadStatus::Initial,
                UploadStatus::Saving,
                UploadStatus::Failed
            ]
        );
        assert!(tracker.error().unwrap().contains("no space left in dht"));
    }

    #[tokio::test]
    async fn unreadable_file_parks_at_failed() {
        let (_stub, session) = session_with_app().await;
        let paperz = session.paperz();

        let mut tracker = UploadTracker::new();
        let err = upload_paper_file(
            &paperz,
            &mut tracker,
            Path::new("/definitely/not/here.pdf"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::File { .. }));
        assert_eq!(tracker.status(), UploadStatus::Failed);
    }

    #[tokio::test]
    async fn reset_clears_the_error() {
        let (stub, session) = session_with_app().await;
        let paperz = session.paperz();
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_temp(&dir, "draft.pdf", b"%PDF");

        stub.fail_next_zome_call("transient");
        let mut tracker = UploadTracker::new();
        let _ = upload_paper_file(&paperz, &mut tracker, &path).await;
        assert_eq!(tracker.status(), UploadStatus::Failed);

        tracker.reset();
        assert_eq!(tracker.status(), UploadStatus::Initial);
        assert!(tracker.error().is_none());
    }

    #[tokio::test]
    async fn meme_uploads_track_the_same_way() {
        let (stub, session) = session_with_app().await;
        let memez = session.memez();
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_temp(&dir, "cat.png", &[0x89, b'P']);

        let mut tracker = UploadTracker::new();
        upload_meme_file(&memez, &mut tracker, &path).await.unwrap();
        assert_eq!(tracker.status(), UploadStatus::Initial);
        assert_eq!(stub.memez().len(), 1);
    }
}
