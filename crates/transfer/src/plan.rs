//! Multipart plan builder.
//!
//! Every part's header and footer is rendered before any byte is sent so the
//! total body length can be declared up front with `Content-Length`. Without
//! it the HTTP stack would have to buffer the whole body to learn its size.

use tracing::debug;

use crate::types::{FormField, Part, PartSource, UploadPlan};
use crate::validation::{validate_header_token, validate_header_value};
use crate::{DEFAULT_BOUNDARY, TransferError, UploadItem};

const CRLF: &str = "\r\n";

/// Builds [`UploadPlan`]s for a given boundary.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    boundary: String,
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanBuilder {
    /// Creates a builder using [`DEFAULT_BOUNDARY`].
    pub fn new() -> Self {
        Self {
            boundary: DEFAULT_BOUNDARY.to_string(),
        }
    }

    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Lays out `items` then `fields` then the closing boundary.
    pub fn build<'a>(
        &self,
        items: &'a [UploadItem],
        fields: &'a [FormField],
    ) -> Result<UploadPlan<'a>, TransferError> {
        if self.boundary.is_empty() {
            return Err(TransferError::InvalidHeaderValue("empty boundary".into()));
        }
        validate_header_value("boundary", &self.boundary)?;

        let mut parts = Vec::with_capacity(items.len() + fields.len() + 1);

        for item in items {
            validate_header_token("form field name", item.field_name())?;
            validate_header_token("filename", item.filename())?;
            validate_header_value("MIME type", item.mime_type())?;

            let header = format!(
                "--{boundary}{CRLF}\
                 Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"{CRLF}\
                 Content-Type: {mime}{CRLF}\
                 {CRLF}",
                boundary = self.boundary,
                field = item.field_name(),
                filename = item.filename(),
                mime = item.mime_type(),
            );
            parts.push(Part {
                header: header.into_bytes(),
                footer: CRLF.as_bytes().to_vec(),
                payload_len: item.size(),
                source: PartSource::Item(item),
            });
        }

        for field in fields {
            validate_header_token("form field name", &field.name)?;

            let header = format!(
                "--{boundary}{CRLF}\
                 Content-Disposition: form-data; name=\"{name}\"{CRLF}\
                 {CRLF}",
                boundary = self.boundary,
                name = field.name,
            );
            parts.push(Part {
                header: header.into_bytes(),
                footer: CRLF.as_bytes().to_vec(),
                payload_len: Some(field.value.len() as u64),
                source: PartSource::Field(field),
            });
        }

        parts.push(Part {
            header: format!("--{}--{CRLF}", self.boundary).into_bytes(),
            footer: Vec::new(),
            payload_len: Some(0),
            source: PartSource::Closing,
        });

        // A single unknown-length item makes the whole body open-ended.
        let size_is_known = items.iter().all(UploadItem::size_is_known);
        let total_bytes: u64 = parts.iter().map(Part::byte_len).sum();

        debug!(
            items = items.len(),
            fields = fields.len(),
            size_is_known,
            total_bytes,
            "multipart plan built"
        );

        Ok(UploadPlan {
            parts,
            boundary: self.boundary.clone(),
            total_bytes,
            size_is_known,
        })
    }
}

impl<'a> UploadPlan<'a> {
    /// Builds a plan with the default boundary.
    pub fn build(
        items: &'a [UploadItem],
        fields: &'a [FormField],
    ) -> Result<UploadPlan<'a>, TransferError> {
        PlanBuilder::new().build(items, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Framing;
    use std::path::{Path, PathBuf};

    fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, vec![b'a'; len]).unwrap();
        path
    }

    fn expected_body(plan: &UploadPlan<'_>, payloads: &[&[u8]]) -> Vec<u8> {
        let mut body = Vec::new();
        let mut payloads = payloads.iter();
        for part in plan.parts() {
            body.extend_from_slice(&part.header);
            match part.source {
                PartSource::Item(_) => body.extend_from_slice(payloads.next().unwrap()),
                PartSource::Field(f) => body.extend_from_slice(f.value.as_bytes()),
                PartSource::Closing => {}
            }
            body.extend_from_slice(&part.footer);
        }
        body
    }

    #[test]
    fn single_file_total_matches_literal_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "big.bin", 20_000);
        let items = vec![UploadItem::file(&path).unwrap()];

        let plan = UploadPlan::build(&items, &[]).unwrap();
        assert_eq!(plan.parts().len(), 2);
        assert!(plan.size_is_known());

        let body = expected_body(&plan, &[&vec![b'a'; 20_000][..]]);
        assert_eq!(plan.total_bytes(), body.len() as u64);
        assert_eq!(plan.framing(), Framing::Fixed(body.len() as u64));

        let header = String::from_utf8(plan.parts()[0].header.clone()).unwrap();
        assert_eq!(
            header,
            "--*****X99611299X******\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"big.bin\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        );
        assert_eq!(plan.parts()[1].header, b"--*****X99611299X******--\r\n");
    }

    #[test]
    fn parts_ordered_items_fields_closing() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(dir.path(), "one.txt", 10);
        let second = write_file(dir.path(), "two.txt", 20);
        let items = vec![
            UploadItem::file(&first).unwrap(),
            UploadItem::file(&second).unwrap(),
        ];
        let fields = vec![FormField::new("email", "a@b.com")];

        let plan = UploadPlan::build(&items, &fields).unwrap();
        let order: Vec<String> = plan
            .parts()
            .iter()
            .map(|p| match p.source {
                PartSource::Item(i) => i.filename().to_string(),
                PartSource::Field(f) => f.name.clone(),
                PartSource::Closing => "closing".to_string(),
            })
            .collect();
        assert_eq!(order, vec!["one.txt", "two.txt", "email", "closing"]);

        let body = expected_body(&plan, &[&[b'a'; 10][..], &[b'a'; 20][..]]);
        assert_eq!(plan.total_bytes(), body.len() as u64);

        let text = String::from_utf8(body).unwrap();
        assert!(text.contains(
            "Content-Disposition: form-data; name=\"email\"\r\n\r\na@b.com\r\n--*****X99611299X******--\r\n"
        ));
    }

    #[test]
    fn unknown_size_forces_streamed_framing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "known.txt", 100);
        let items = vec![
            UploadItem::file(&path).unwrap(),
            UploadItem::stream(&b"abc"[..], "s.bin", "application/octet-stream"),
        ];

        let plan = UploadPlan::build(&items, &[]).unwrap();
        assert!(!plan.size_is_known());
        assert_eq!(plan.framing(), Framing::Streamed);
        assert_eq!(plan.parts()[1].payload_len, None);
        assert_eq!(plan.total_data_bytes(), 100);
        assert_eq!(plan.item_count(), 2);
    }

    #[test]
    fn no_items_still_has_closing_boundary() {
        let plan = UploadPlan::build(&[], &[]).unwrap();
        assert!(plan.size_is_known());
        assert_eq!(plan.parts().len(), 1);
        assert_eq!(plan.total_bytes(), "--*****X99611299X******--\r\n".len() as u64);
    }

    #[test]
    fn missing_field_value_is_empty() {
        let fields = vec![FormField::from_optional("comment", None::<String>)];
        let plan = UploadPlan::build(&[], &fields).unwrap();
        assert_eq!(plan.parts()[0].payload_len, Some(0));
    }

    #[test]
    fn field_length_counts_utf8_bytes() {
        let fields = vec![FormField::new("name", "Zoë")];
        let plan = UploadPlan::build(&[], &fields).unwrap();
        assert_eq!(plan.parts()[0].payload_len, Some(4));
    }

    #[test]
    fn custom_boundary_used_everywhere() {
        let fields = vec![FormField::new("k", "v")];
        let plan = PlanBuilder::new()
            .with_boundary("xyz")
            .build(&[], &fields)
            .unwrap();
        assert_eq!(plan.content_type(), "multipart/form-data;boundary=xyz");
        assert!(plan.parts()[0].header.starts_with(b"--xyz\r\n"));
        assert_eq!(plan.parts()[1].header, b"--xyz--\r\n");
    }

    #[test]
    fn invalid_names_rejected() {
        let fields = vec![FormField::new("bad\r\nname", "v")];
        assert!(matches!(
            UploadPlan::build(&[], &fields),
            Err(TransferError::InvalidHeaderValue(_))
        ));

        assert!(PlanBuilder::new().with_boundary("").build(&[], &[]).is_err());
    }
}
