use crate::UploadItem;

/// A plain-text form field sent after the file parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

impl FormField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a field whose missing value is sent as an empty string.
    pub fn from_optional(name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            value: value.map(Into::into).unwrap_or_default(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for FormField {
    fn from((name, value): (K, V)) -> Self {
        Self::new(name, value)
    }
}

/// How the request body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length` with the exact body size.
    Fixed(u64),
    /// Open-ended transfer (chunked), used when any item size is unknown.
    Streamed,
}

/// What a part carries between its header and footer.
#[derive(Debug)]
pub enum PartSource<'a> {
    Item(&'a UploadItem),
    Field(&'a FormField),
    /// The trailing `--boundary--` line.
    Closing,
}

/// One segment of the multipart body with its precomputed framing bytes.
#[derive(Debug)]
pub struct Part<'a> {
    pub header: Vec<u8>,
    pub footer: Vec<u8>,
    /// Payload length, `None` for items of unknown size.
    pub payload_len: Option<u64>,
    pub source: PartSource<'a>,
}

impl Part<'_> {
    /// Header + payload + footer, counting unknown payloads as zero.
    pub fn byte_len(&self) -> u64 {
        self.header.len() as u64 + self.payload_len.unwrap_or(0) + self.footer.len() as u64
    }
}

/// Ordered parts of a multipart body plus its precomputed total size.
///
/// Parts are always: every item (caller order), every field (caller
/// order), then exactly one closing boundary.
#[derive(Debug)]
pub struct UploadPlan<'a> {
    pub(crate) parts: Vec<Part<'a>>,
    pub(crate) boundary: String,
    pub(crate) total_bytes: u64,
    pub(crate) size_is_known: bool,
}

impl<'a> UploadPlan<'a> {
    pub fn parts(&self) -> &[Part<'a>] {
        &self.parts
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Exact body length. Only meaningful when [`size_is_known`](Self::size_is_known).
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn size_is_known(&self) -> bool {
        self.size_is_known
    }

    pub fn framing(&self) -> Framing {
        if self.size_is_known {
            Framing::Fixed(self.total_bytes)
        } else {
            Framing::Streamed
        }
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data;boundary={}", self.boundary)
    }

    pub fn items(&self) -> impl Iterator<Item = &'a UploadItem> + '_ {
        self.parts.iter().filter_map(|p| match p.source {
            PartSource::Item(item) => Some(item),
            _ => None,
        })
    }

    pub fn item_count(&self) -> usize {
        self.items().count()
    }

    /// Sum of known item sizes; unknown-size items contribute nothing.
    pub fn total_data_bytes(&self) -> u64 {
        self.items().filter_map(UploadItem::size).sum()
    }
}
