//! Attachment staging for pending submissions
//!
//! Files, dropped URLs, and audio recordings queue here until the next
//! submission. File batches pass an admission check against the remote
//! upload policy before any bytes are read; a single disallowed file
//! rejects the whole batch and stages nothing. Accepted files are read
//! concurrently and appended atomically once every read completes.
//!
//! File-backed attachments hold a revocable preview handle allocated from
//! the injected [`PreviewResources`]. Handles are revoked exactly once:
//! on removal, on clear, or when the staging area is drained at submission.

use crate::api::types::{UploadPayload, UploadsConfig};
use crate::error::{ParlanceError, Result};
use crate::session::message::{AttachmentKind, MessageAttachment};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Allocator of revocable preview resources
///
/// The widget host decides what a preview is (an object URL, a thumbnail,
/// a texture). The staging area only guarantees the create/revoke pairing.
pub trait PreviewResources: Send + Sync {
    /// Allocate a preview for a staged file, returning its handle
    fn create(&self, name: &str, mime: &str) -> u64;

    /// Release a previously created preview
    fn revoke(&self, handle: u64);
}

/// Preview allocator that hands out handles and releases nothing
///
/// For hosts without preview resources, such as the CLI.
#[derive(Default)]
pub struct NullPreviews;

impl PreviewResources for NullPreviews {
    fn create(&self, _name: &str, _mime: &str) -> u64 {
        0
    }

    fn revoke(&self, _handle: u64) {}
}

/// Asynchronous source of file bytes
#[async_trait]
pub trait FileReader: Send + Sync {
    /// Read the full contents of the named file
    async fn read(&self, name: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed reader; `name` is interpreted as a path
pub struct FsFileReader;

#[async_trait]
impl FileReader for FsFileReader {
    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(name).await?)
    }
}

/// A file offered for staging, before its bytes are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// File name (or path, for filesystem readers)
    pub name: String,
    /// MIME type used for admission
    pub mime: String,
    /// Size in bytes used for admission
    pub size_bytes: u64,
}

/// One item from a drop gesture
#[derive(Debug, Clone)]
pub enum DropItem {
    /// A dropped file
    File(FileCandidate),
    /// A plain URL string (`text/uri-list`)
    UriList(String),
    /// An HTML fragment that may carry an `href`
    Html(String),
}

/// Payload of a staged attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentData {
    /// Inline text, used for URL attachments
    Text(String),
    /// Base64-encoded binary payload
    Base64(String),
}

impl AttachmentData {
    /// Wire form of the payload: data URI for binary, text as-is
    pub fn as_payload_string(&self, mime: &str) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Base64(encoded) => format!("data:{};base64,{}", mime, encoded),
        }
    }
}

/// An attachment queued for the next submission
#[derive(Debug)]
pub struct StagedAttachment {
    /// Staging-local identifier, used for removal
    pub id: u64,
    /// Attachment kind
    pub kind: AttachmentKind,
    /// Name shown to the user
    pub name: String,
    /// MIME type, empty for URLs
    pub mime: String,
    /// Payload sent with the submission
    pub data: AttachmentData,
    preview: Option<u64>,
}

impl StagedAttachment {
    /// Returns true while a preview resource is held
    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    /// Wire payload for a prediction request
    pub fn to_upload_payload(&self) -> UploadPayload {
        UploadPayload {
            data: self.data.as_payload_string(&self.mime),
            kind: self.kind.to_string(),
            name: self.name.clone(),
            mime: self.mime.clone(),
        }
    }

    /// Trimmed record stored on the sent message
    pub fn to_message_attachment(&self) -> MessageAttachment {
        MessageAttachment {
            kind: self.kind,
            name: self.name.clone(),
            mime: self.mime.clone(),
        }
    }
}

/// Staging area for pending attachments
pub struct AttachmentStaging {
    policy: Option<UploadsConfig>,
    previews: std::sync::Arc<dyn PreviewResources>,
    staged: Vec<StagedAttachment>,
    next_id: u64,
}

impl AttachmentStaging {
    /// Create an empty staging area
    ///
    /// No files are admitted until a policy arrives via [`set_policy`].
    ///
    /// [`set_policy`]: AttachmentStaging::set_policy
    pub fn new(previews: std::sync::Arc<dyn PreviewResources>) -> Self {
        Self {
            policy: None,
            previews,
            staged: Vec::new(),
            next_id: 0,
        }
    }

    /// Install the remote upload policy
    pub fn set_policy(&mut self, policy: Option<UploadsConfig>) {
        self.policy = policy;
    }

    /// Stage a batch of files
    ///
    /// The whole batch is admitted first; any disallowed file rejects the
    /// batch with `ParlanceError::Validation` and stages nothing. Accepted
    /// files are read concurrently and appended together once all reads
    /// complete.
    ///
    /// # Errors
    ///
    /// `Validation` on admission failure; read errors propagate and leave
    /// the staging area untouched
    pub async fn add_files(
        &mut self,
        candidates: &[FileCandidate],
        reader: &dyn FileReader,
    ) -> Result<usize> {
        for candidate in candidates {
            if let Err(reason) = self.admit(candidate) {
                return Err(ParlanceError::Validation(reason).into());
            }
        }

        let payloads =
            futures::future::try_join_all(candidates.iter().map(|c| reader.read(&c.name))).await?;

        for (candidate, bytes) in candidates.iter().zip(payloads) {
            self.stage_file(candidate, &bytes);
        }
        Ok(candidates.len())
    }

    /// Stage the contents of a drop gesture
    ///
    /// Dropped files take the same admission path as [`add_files`]; a
    /// single disallowed file rejects the entire drop, URLs included.
    /// `text/uri-list` items become URL attachments directly; HTML
    /// fragments contribute a URL when a first-occurrence `href` scan
    /// finds one and are skipped otherwise.
    ///
    /// [`add_files`]: AttachmentStaging::add_files
    pub async fn add_from_drop(
        &mut self,
        items: Vec<DropItem>,
        reader: &dyn FileReader,
    ) -> Result<usize> {
        let files: Vec<FileCandidate> = items
            .iter()
            .filter_map(|item| match item {
                DropItem::File(candidate) => Some(candidate.clone()),
                _ => None,
            })
            .collect();

        let mut staged = self.add_files(&files, reader).await?;

        for item in items {
            match item {
                DropItem::File(_) => {}
                DropItem::UriList(url) => {
                    self.stage_url(&url);
                    staged += 1;
                }
                DropItem::Html(fragment) => {
                    if let Some(url) = extract_href(&fragment) {
                        self.stage_url(&url);
                        staged += 1;
                    }
                }
            }
        }
        Ok(staged)
    }

    /// Stage a finished audio recording
    ///
    /// Recordings bypass admission; capturing one is an explicit user
    /// action. Codec parameters after `;` are stripped from the MIME type.
    pub fn add_audio_recording(&mut self, mime: &str, bytes: &[u8]) {
        let mime = mime.split(';').next().unwrap_or(mime).to_string();
        let id = self.allocate_id();
        self.staged.push(StagedAttachment {
            id,
            kind: AttachmentKind::Audio,
            name: "audio.wav".to_string(),
            mime,
            data: AttachmentData::Base64(BASE64.encode(bytes)),
            preview: None,
        });
    }

    /// Remove one staged attachment, revoking its preview
    ///
    /// Returns false when no attachment has the given id.
    pub fn remove(&mut self, id: u64) -> bool {
        let Some(position) = self.staged.iter().position(|a| a.id == id) else {
            return false;
        };
        let mut attachment = self.staged.remove(position);
        if let Some(handle) = attachment.preview.take() {
            self.previews.revoke(handle);
        }
        true
    }

    /// Empty the staging area, revoking every preview
    pub fn clear(&mut self) {
        for attachment in &mut self.staged {
            if let Some(handle) = attachment.preview.take() {
                self.previews.revoke(handle);
            }
        }
        self.staged.clear();
    }

    /// Take every staged attachment for submission
    ///
    /// Previews are revoked and detached; the returned attachments carry
    /// only the payload. This is the exactly-once release point of a
    /// submission.
    pub fn drain_for_submit(&mut self) -> Vec<StagedAttachment> {
        for attachment in &mut self.staged {
            if let Some(handle) = attachment.preview.take() {
                self.previews.revoke(handle);
            }
        }
        std::mem::take(&mut self.staged)
    }

    /// Staged attachments, in staging order
    pub fn staged(&self) -> &[StagedAttachment] {
        &self.staged
    }

    /// Returns true when nothing is staged
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Number of staged attachments
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Returns true when any staged attachment is an audio recording
    pub fn has_audio(&self) -> bool {
        self.staged.iter().any(|a| a.kind == AttachmentKind::Audio)
    }

    /// Check one candidate against the upload policy
    fn admit(&self, candidate: &FileCandidate) -> std::result::Result<(), String> {
        let policy = match &self.policy {
            Some(policy) if policy.is_image_upload_allowed => policy,
            _ => return Err("file uploads are not enabled for this chatflow".to_string()),
        };

        let size_mb = candidate.size_bytes as f64 / 1024.0 / 1024.0;
        let allowed = policy.img_upload_size_and_types.iter().any(|constraint| {
            constraint.file_types.iter().any(|t| t == &candidate.mime)
                && size_mb <= constraint.max_upload_size as f64
        });

        if allowed {
            Ok(())
        } else {
            Err(format!(
                "cannot upload {}: check the allowed file types and maximum size",
                candidate.name
            ))
        }
    }

    fn stage_file(&mut self, candidate: &FileCandidate, bytes: &[u8]) {
        let id = self.allocate_id();
        let preview = self.previews.create(&candidate.name, &candidate.mime);
        self.staged.push(StagedAttachment {
            id,
            kind: AttachmentKind::File,
            name: candidate.name.clone(),
            mime: candidate.mime.clone(),
            data: AttachmentData::Base64(BASE64.encode(bytes)),
            preview: Some(preview),
        });
    }

    fn stage_url(&mut self, url: &str) {
        let id = self.allocate_id();
        self.staged.push(StagedAttachment {
            id,
            kind: AttachmentKind::Url,
            name: name_from_url(url),
            mime: String::new(),
            data: AttachmentData::Text(url.to_string()),
            preview: None,
        });
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// First-occurrence `href="..."` scan over an HTML fragment
fn extract_href(fragment: &str) -> Option<String> {
    let index = fragment.find("href")?;
    let rest = fragment.get(index + 6..)?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// The path tail of a URL, used as the attachment name
fn name_from_url(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::ImageUploadConstraint;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    /// Preview allocator that counts revocations per handle
    #[derive(Default)]
    struct CountingPreviews {
        next: AtomicU64,
        revoked: Mutex<HashMap<u64, usize>>,
    }

    impl CountingPreviews {
        fn revocations(&self, handle: u64) -> usize {
            *self.revoked.lock().unwrap().get(&handle).unwrap_or(&0)
        }

        fn total_revocations(&self) -> usize {
            self.revoked.lock().unwrap().values().sum()
        }
    }

    impl PreviewResources for CountingPreviews {
        fn create(&self, _name: &str, _mime: &str) -> u64 {
            self.next.fetch_add(1, Ordering::SeqCst)
        }

        fn revoke(&self, handle: u64) {
            *self.revoked.lock().unwrap().entry(handle).or_insert(0) += 1;
        }
    }

    /// Reader that serves fixed bytes for any file
    struct FixedReader;

    #[async_trait]
    impl FileReader for FixedReader {
        async fn read(&self, _name: &str) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }
    }

    /// Reader that fails every read
    struct FailingReader;

    #[async_trait]
    impl FileReader for FailingReader {
        async fn read(&self, name: &str) -> Result<Vec<u8>> {
            Err(ParlanceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                name.to_string(),
            ))
            .into())
        }
    }

    fn permissive_policy() -> UploadsConfig {
        UploadsConfig {
            img_upload_size_and_types: vec![ImageUploadConstraint {
                file_types: vec!["image/png".to_string(), "image/jpeg".to_string()],
                max_upload_size: 5,
            }],
            is_image_upload_allowed: true,
            is_speech_to_text_enabled: false,
        }
    }

    fn candidate(name: &str, mime: &str, size_bytes: u64) -> FileCandidate {
        FileCandidate {
            name: name.to_string(),
            mime: mime.to_string(),
            size_bytes,
        }
    }

    fn staging(previews: Arc<CountingPreviews>) -> AttachmentStaging {
        let mut staging = AttachmentStaging::new(previews);
        staging.set_policy(Some(permissive_policy()));
        staging
    }

    #[tokio::test]
    async fn test_add_files_stages_accepted_batch() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(Arc::clone(&previews));

        let staged = staging
            .add_files(
                &[
                    candidate("a.png", "image/png", 1024),
                    candidate("b.jpg", "image/jpeg", 2048),
                ],
                &FixedReader,
            )
            .await
            .unwrap();

        assert_eq!(staged, 2);
        assert_eq!(staging.len(), 2);
        assert!(staging.staged()[0].has_preview());
        assert_eq!(staging.staged()[0].kind, AttachmentKind::File);
    }

    #[tokio::test]
    async fn test_one_bad_file_rejects_entire_batch() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(Arc::clone(&previews));

        let result = staging
            .add_files(
                &[
                    candidate("ok.png", "image/png", 1024),
                    candidate("bad.exe", "application/octet-stream", 1024),
                ],
                &FixedReader,
            )
            .await;

        let err = result.unwrap_err().downcast::<ParlanceError>().unwrap();
        assert!(matches!(err, ParlanceError::Validation(_)));
        assert!(staging.is_empty());
        assert_eq!(previews.total_revocations(), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(previews);

        let result = staging
            .add_files(
                &[candidate("huge.png", "image/png", 6 * 1024 * 1024)],
                &FixedReader,
            )
            .await;

        assert!(result.is_err());
        assert!(staging.is_empty());
    }

    #[tokio::test]
    async fn test_no_policy_rejects_files() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = AttachmentStaging::new(previews);

        let result = staging
            .add_files(&[candidate("a.png", "image/png", 10)], &FixedReader)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_failure_stages_nothing() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(previews);

        let result = staging
            .add_files(&[candidate("a.png", "image/png", 10)], &FailingReader)
            .await;

        assert!(result.is_err());
        assert!(staging.is_empty());
    }

    #[tokio::test]
    async fn test_remove_revokes_preview_exactly_once() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(Arc::clone(&previews));

        staging
            .add_files(&[candidate("a.png", "image/png", 10)], &FixedReader)
            .await
            .unwrap();
        let id = staging.staged()[0].id;

        assert!(staging.remove(id));
        staging.clear();

        assert_eq!(previews.revocations(0), 1);
        assert!(staging.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_id_is_false() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(previews);
        assert!(!staging.remove(42));
    }

    #[tokio::test]
    async fn test_clear_revokes_all_previews() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(Arc::clone(&previews));

        staging
            .add_files(
                &[
                    candidate("a.png", "image/png", 10),
                    candidate("b.png", "image/png", 10),
                ],
                &FixedReader,
            )
            .await
            .unwrap();

        staging.clear();
        staging.clear();

        assert_eq!(previews.total_revocations(), 2);
    }

    #[tokio::test]
    async fn test_drain_for_submit_revokes_and_empties() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(Arc::clone(&previews));

        staging
            .add_files(&[candidate("a.png", "image/png", 10)], &FixedReader)
            .await
            .unwrap();
        staging.add_audio_recording("audio/wav", &[0u8; 4]);

        let drained = staging.drain_for_submit();

        assert_eq!(drained.len(), 2);
        assert!(drained.iter().all(|a| !a.has_preview()));
        assert!(staging.is_empty());
        assert_eq!(previews.total_revocations(), 1);

        staging.clear();
        assert_eq!(previews.total_revocations(), 1);
    }

    #[tokio::test]
    async fn test_drop_with_disallowed_file_rejects_urls_too() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(previews);

        let result = staging
            .add_from_drop(
                vec![
                    DropItem::File(candidate("bad.exe", "application/octet-stream", 10)),
                    DropItem::UriList("https://example.com/job".to_string()),
                ],
                &FixedReader,
            )
            .await;

        assert!(result.is_err());
        assert!(staging.is_empty());
    }

    #[tokio::test]
    async fn test_drop_uri_list_stages_url() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(previews);

        let staged = staging
            .add_from_drop(
                vec![DropItem::UriList("https://example.com/postings/42".to_string())],
                &FixedReader,
            )
            .await
            .unwrap();

        assert_eq!(staged, 1);
        let attachment = &staging.staged()[0];
        assert_eq!(attachment.kind, AttachmentKind::Url);
        assert_eq!(attachment.name, "42");
        assert_eq!(
            attachment.data,
            AttachmentData::Text("https://example.com/postings/42".to_string())
        );
    }

    #[tokio::test]
    async fn test_drop_html_extracts_first_href() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(previews);

        let staged = staging
            .add_from_drop(
                vec![DropItem::Html(
                    r#"<a href="https://example.com/a">one</a> <a href="https://example.com/b">two</a>"#
                        .to_string(),
                )],
                &FixedReader,
            )
            .await
            .unwrap();

        assert_eq!(staged, 1);
        assert_eq!(
            staging.staged()[0].data,
            AttachmentData::Text("https://example.com/a".to_string())
        );
    }

    #[tokio::test]
    async fn test_drop_html_without_href_is_skipped() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = staging(previews);

        let staged = staging
            .add_from_drop(
                vec![DropItem::Html("<p>no links here</p>".to_string())],
                &FixedReader,
            )
            .await
            .unwrap();

        assert_eq!(staged, 0);
        assert!(staging.is_empty());
    }

    #[test]
    fn test_audio_recording_strips_codec_params() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = AttachmentStaging::new(previews);

        staging.add_audio_recording("audio/webm;codecs=opus", &[1, 2, 3]);

        let attachment = &staging.staged()[0];
        assert_eq!(attachment.mime, "audio/webm");
        assert_eq!(attachment.kind, AttachmentKind::Audio);
        assert!(staging.has_audio());
    }

    #[test]
    fn test_payload_string_forms() {
        assert_eq!(
            AttachmentData::Text("https://a.io".to_string()).as_payload_string(""),
            "https://a.io"
        );
        let data = AttachmentData::Base64(BASE64.encode(b"abc"));
        assert_eq!(
            data.as_payload_string("image/png"),
            format!("data:image/png;base64,{}", BASE64.encode(b"abc"))
        );
    }

    #[test]
    fn test_to_upload_payload_and_trimmed_record() {
        let previews = Arc::new(CountingPreviews::default());
        let mut staging = AttachmentStaging::new(previews);
        staging.add_audio_recording("audio/wav", &[0u8; 2]);

        let attachment = &staging.staged()[0];
        let payload = attachment.to_upload_payload();
        assert_eq!(payload.kind, "audio");
        assert!(payload.data.starts_with("data:audio/wav;base64,"));

        let trimmed = attachment.to_message_attachment();
        assert_eq!(trimmed.kind, AttachmentKind::Audio);
        assert_eq!(trimmed.name, "audio.wav");
    }

    #[test]
    fn test_extract_href() {
        assert_eq!(
            extract_href(r#"<a href="https://x.io/p">x</a>"#),
            Some("https://x.io/p".to_string())
        );
        assert_eq!(extract_href("<p>none</p>"), None);
        assert_eq!(extract_href("href"), None);
    }

    #[test]
    fn test_name_from_url() {
        assert_eq!(name_from_url("https://a.io/jobs/12"), "12");
        assert_eq!(name_from_url("plain"), "plain");
    }
}
