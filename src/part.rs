use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;
use tracing::trace;

use crate::headers::parse_content_disposition;
use crate::save::SaveOperation;
use crate::Result;

/// Discriminates plain text fields from file uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// Plain text field.
    Field,
    /// File upload carrying an incremental content digest.
    File,
}

/// A completed file upload.
#[derive(Debug, Clone, Serialize)]
pub struct FileDescriptor {
    /// Part headers, lowercased, repeated names merged with `", "`.
    pub headers: HashMap<String, String>,
    /// Declared content type, empty when absent.
    pub content_type: String,
    /// Form field name the file arrived under.
    pub field_name: String,
    /// Client-declared file name.
    pub file_name: Option<String>,
    /// Lowercase MD5 hex digest over the exact bytes received.
    pub content_hash: String,
    /// Final location on disk when the part was persisted.
    pub saved_path: Option<PathBuf>,
}

/// One field or file unit of a request body.
///
/// A part accumulates content strictly in arrival order and is
/// finalized exactly once; only then is a field's text materialized or
/// a file's digest sealed.
pub struct Part {
    kind: PartKind,
    field_name: String,
    file_name: Option<String>,
    headers: HashMap<String, String>,
    complete: bool,
    length: u64,
    // arrival-order chunks, `None` once a save sink took over buffering
    chunks: Option<Vec<Bytes>>,
    digest: Option<md5::Context>,
    hash: Option<String>,
    text: Option<String>,
    save: Option<SaveOperation>,
    saved_path: Option<PathBuf>,
}

impl Part {
    /// Builds a part from its parsed header map. Identity comes from
    /// `content-disposition` when present (file kind iff a `filename`
    /// attribute exists, even an empty one), otherwise from the
    /// `x-field-name` / `x-file-name` side-channel headers.
    pub(crate) fn from_headers(headers: HashMap<String, String>) -> Self {
        let (field_name, file_name) = match headers.get("content-disposition") {
            Some(disposition) => {
                let (name, filename) = parse_content_disposition(disposition);
                (name.unwrap_or_default(), filename)
            }
            None => (
                headers.get("x-field-name").cloned().unwrap_or_default(),
                headers.get("x-file-name").cloned(),
            ),
        };
        let kind = if file_name.is_some() {
            PartKind::File
        } else {
            PartKind::Field
        };

        Self {
            kind,
            field_name,
            file_name,
            headers,
            complete: false,
            length: 0,
            chunks: Some(Vec::new()),
            digest: (kind == PartKind::File).then(md5::Context::new),
            hash: None,
            text: None,
            save: None,
            saved_path: None,
        }
    }

    /// The part kind.
    #[must_use]
    pub fn kind(&self) -> PartKind {
        self.kind
    }

    /// Whether this part is a file upload.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == PartKind::File
    }

    /// The form field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.field_name
    }

    /// The client-declared file name, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The part's headers, lowercased and duplicate-merged.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// The declared content type, empty when absent.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.headers.get("content-type").map_or("", String::as_str)
    }

    /// Bytes received so far.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Whether no content has arrived yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Where the part was persisted, once saved and complete.
    #[must_use]
    pub fn saved_path(&self) -> Option<&Path> {
        self.saved_path.as_deref()
    }

    /// Starts persisting this part under `dir` (or the nearest existing
    /// parent directory). Already-accumulated bytes are flushed to a
    /// temporary file and subsequent content streams through.
    ///
    /// A no-op for text fields and when a save is already active.
    pub fn save_to(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        if self.kind != PartKind::File || self.save.is_some() || self.saved_path.is_some() {
            return Ok(());
        }

        let mut save = SaveOperation::begin(dir.as_ref())?;
        if let Some(chunks) = self.chunks.take() {
            for chunk in &chunks {
                save.write(chunk)?;
            }
        }
        if self.complete {
            self.saved_path = Some(save.finish(self.file_name.as_deref().unwrap_or(""))?);
        } else {
            self.save = Some(save);
        }
        Ok(())
    }

    /// Appends one content chunk, in arrival order.
    pub(crate) fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.length += chunk.len() as u64;
        if let Some(digest) = self.digest.as_mut() {
            digest.consume(&chunk);
        }
        if let Some(save) = self.save.as_mut() {
            save.write(&chunk)?;
        } else if let Some(chunks) = self.chunks.as_mut() {
            chunks.push(chunk);
        }
        Ok(())
    }

    /// Finalizes the part: seals the digest of a file, materializes the
    /// UTF-8 text of a field (the only point text decoding happens) and
    /// completes any active save. Invoked at most once.
    pub(crate) fn end(&mut self) -> Result<()> {
        if self.complete {
            return Ok(());
        }
        self.complete = true;

        if let Some(digest) = self.digest.take() {
            self.hash = Some(format!("{:x}", digest.compute()));
        }
        if self.kind == PartKind::Field {
            let chunks = self.chunks.take().unwrap_or_default();
            let mut data = Vec::with_capacity(self.length as usize);
            for chunk in &chunks {
                data.extend_from_slice(chunk);
            }
            self.text = Some(String::from_utf8_lossy(&data).into_owned());
        }
        if let Some(save) = self.save.take() {
            self.saved_path = Some(save.finish(self.file_name.as_deref().unwrap_or(""))?);
        }
        trace!("part `{}` ended after {} bytes", self.field_name, self.length);
        Ok(())
    }

    /// The finalized field text.
    pub(crate) fn take_text(&mut self) -> String {
        self.text.take().unwrap_or_default()
    }

    /// The finalized file metadata.
    pub(crate) fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            headers: self.headers.clone(),
            content_type: self.content_type().to_owned(),
            field_name: self.field_name.clone(),
            file_name: self.file_name.clone(),
            content_hash: self.hash.clone().unwrap_or_default(),
            saved_path: self.saved_path.clone(),
        }
    }
}
