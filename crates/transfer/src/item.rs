//! Upload item sources: files on disk and caller-supplied byte streams.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tokio::io::AsyncRead;

use crate::{DEFAULT_FIELD_NAME, DEFAULT_MIME_TYPE, TransferError};

/// Byte stream yielded by an opened item.
pub type ItemReader = Box<dyn AsyncRead + Send + Unpin>;

/// Something to upload as one file part of the form.
///
/// Size-dependent behavior (framing choice, progress baseline) matches on
/// the variant; everything else goes through the shared accessors.
#[derive(Debug)]
pub enum UploadItem {
    /// A file whose size is read from filesystem metadata.
    File(FileSource),
    /// An opaque stream whose size is unknown until it is exhausted.
    Stream(StreamSource),
}

impl UploadItem {
    /// Creates a file item with filename and MIME type derived from `path`.
    pub fn file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        FileSource::new(path).map(Self::File)
    }

    /// Creates a stream item. The stream is consumed by the first upload.
    pub fn stream(
        reader: impl AsyncRead + Send + Unpin + 'static,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self::Stream(StreamSource::new(reader, filename, mime_type))
    }

    /// Payload size in bytes, `None` when unknown.
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::File(f) => Some(f.size),
            Self::Stream(_) => None,
        }
    }

    pub fn size_is_known(&self) -> bool {
        self.size().is_some()
    }

    /// Filename sent in the part's `Content-Disposition`.
    pub fn filename(&self) -> &str {
        match self {
            Self::File(f) => &f.filename,
            Self::Stream(s) => &s.filename,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Self::File(f) => &f.mime_type,
            Self::Stream(s) => &s.mime_type,
        }
    }

    /// Form field the part is posted under.
    pub fn field_name(&self) -> &str {
        match self {
            Self::File(f) => &f.field_name,
            Self::Stream(s) => &s.field_name,
        }
    }

    /// Local path for file items.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(f) => Some(&f.path),
            Self::Stream(_) => None,
        }
    }

    /// Human-readable identifier used in logs and errors.
    pub fn label(&self) -> String {
        match self {
            Self::File(f) => f.path.display().to_string(),
            Self::Stream(s) => s.filename.clone(),
        }
    }

    /// Opens the item's byte stream.
    ///
    /// File items open a fresh handle each time; stream items hand out
    /// their reader once and fail afterwards.
    pub async fn open(&self) -> Result<ItemReader, TransferError> {
        match self {
            Self::File(f) => {
                let file = tokio::fs::File::open(&f.path)
                    .await
                    .map_err(|source| TransferError::ItemRead {
                        item: self.label(),
                        source,
                    })?;
                Ok(Box::new(file))
            }
            Self::Stream(s) => s
                .reader
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .ok_or_else(|| TransferError::StreamConsumed(s.filename.clone())),
        }
    }
}

impl From<FileSource> for UploadItem {
    fn from(source: FileSource) -> Self {
        Self::File(source)
    }
}

impl From<StreamSource> for UploadItem {
    fn from(source: StreamSource) -> Self {
        Self::Stream(source)
    }
}

/// A file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    size: u64,
    filename: String,
    mime_type: String,
    field_name: String,
}

impl FileSource {
    /// Reads `path`'s metadata and derives the filename hint and MIME type.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = detect_content_type(&filename)
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        Ok(Self {
            path,
            size: metadata.len(),
            filename,
            mime_type,
            field_name: DEFAULT_FIELD_NAME.to_string(),
        })
    }

    /// Overrides the filename sent to the server.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size captured when the source was created.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A caller-supplied stream of unknown length.
pub struct StreamSource {
    reader: Mutex<Option<ItemReader>>,
    filename: String,
    mime_type: String,
    field_name: String,
}

impl StreamSource {
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
            filename: filename.into(),
            mime_type: mime_type.into(),
            field_name: DEFAULT_FIELD_NAME.to_string(),
        }
    }

    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let consumed = self
            .reader
            .lock()
            .map(|r| r.is_none())
            .unwrap_or(true);
        f.debug_struct("StreamSource")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("field_name", &self.field_name)
            .field("consumed", &consumed)
            .finish()
    }
}

/// Guesses a MIME type from a file name's extension.
pub fn detect_content_type(path: &str) -> Option<&'static str> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("txt" | "log") => Some("text/plain"),
        Some("html" | "htm") => Some("text/html"),
        Some("css") => Some("text/css"),
        Some("csv") => Some("text/csv"),
        Some("xml") => Some("application/xml"),
        Some("json") => Some("application/json"),
        Some("js") => Some("text/javascript"),
        Some("pdf") => Some("application/pdf"),
        Some("zip") => Some("application/zip"),
        Some("gz" | "tgz") => Some("application/gzip"),
        Some("tar") => Some("application/x-tar"),
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("gif") => Some("image/gif"),
        Some("webp") => Some("image/webp"),
        Some("bmp") => Some("image/bmp"),
        Some("svg") => Some("image/svg+xml"),
        Some("ico") => Some("image/x-icon"),
        Some("mp3") => Some("audio/mpeg"),
        Some("wav") => Some("audio/wav"),
        Some("mp4") => Some("video/mp4"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn file_source_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, vec![7u8; 1234]).unwrap();

        let item = UploadItem::file(&path).unwrap();
        assert_eq!(item.size(), Some(1234));
        assert!(item.size_is_known());
        assert_eq!(item.filename(), "report.pdf");
        assert_eq!(item.mime_type(), "application/pdf");
        assert_eq!(item.field_name(), "file");
        assert_eq!(item.path(), Some(path.as_path()));
    }

    #[test]
    fn file_source_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"x").unwrap();

        let item: UploadItem = FileSource::new(&path)
            .unwrap()
            .with_filename("renamed.bin")
            .with_mime_type("application/x-custom")
            .with_field_name("attachment")
            .into();
        assert_eq!(item.filename(), "renamed.bin");
        assert_eq!(item.mime_type(), "application/x-custom");
        assert_eq!(item.field_name(), "attachment");
    }

    #[test]
    fn file_source_unknown_extension_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.xyz");
        std::fs::write(&path, b"x").unwrap();

        let item = UploadItem::file(&path).unwrap();
        assert_eq!(item.mime_type(), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn file_source_rejects_missing_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(UploadItem::file(dir.path().join("missing.txt")).is_err());
        assert!(UploadItem::file(dir.path()).is_err());
    }

    #[tokio::test]
    async fn stream_source_opens_once() {
        let item = UploadItem::stream(&b"payload"[..], "s.txt", "text/plain");
        assert_eq!(item.size(), None);
        assert!(item.path().is_none());

        let mut reader = item.open().await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"payload");

        let second = item.open().await;
        assert!(matches!(second, Err(TransferError::StreamConsumed(name)) if name == "s.txt"));
    }

    #[tokio::test]
    async fn file_open_failure_is_item_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, b"abc").unwrap();
        let item = UploadItem::file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let result = item.open().await;
        assert!(matches!(result, Err(TransferError::ItemRead { .. })));
    }

    #[test]
    fn detect_content_type_known() {
        assert_eq!(detect_content_type("image.png"), Some("image/png"));
        assert_eq!(detect_content_type("photo.jpeg"), Some("image/jpeg"));
        assert_eq!(detect_content_type("notes.txt"), Some("text/plain"));
        assert_eq!(detect_content_type("archive.zip"), Some("application/zip"));
    }

    #[test]
    fn detect_content_type_unknown() {
        assert_eq!(detect_content_type("noext"), None);
        assert_eq!(detect_content_type(""), None);
    }

    #[test]
    fn detect_content_type_case_insensitive() {
        assert_eq!(detect_content_type("IMAGE.PNG"), Some("image/png"));
        assert_eq!(detect_content_type("Photo.JPG"), Some("image/jpeg"));
    }
}
