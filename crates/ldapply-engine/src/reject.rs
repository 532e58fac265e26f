//! Reject sink.
//!
//! Failed change records are appended to an LDIF file together with a
//! commented diagnostic trailer. The version header is written exactly once,
//! before the first entry. Write failures are logged and never interrupt
//! processing.

use std::fs::{File, OpenOptions};
use std::path::Path;

use tracing::warn;

use ldapply_client::OperationResult;
use ldapply_ldif::{ChangeRecord, LdifWriter};

/// Appends rejected change records to the configured reject file.
pub struct RejectSink {
    writer: Option<LdifWriter<File>>,
    path: String,
    header_written: bool,
}

impl RejectSink {
    /// A sink that silently discards everything (no reject file configured).
    #[must_use]
    pub fn disabled() -> Self {
        RejectSink {
            writer: None,
            path: String::new(),
            header_written: false,
        }
    }

    /// Opens (or creates) the reject file for appending. Comments are not
    /// wrapped so diagnostic lines stay intact.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(RejectSink {
            writer: Some(LdifWriter::new(file).without_wrapping()),
            path: path.display().to_string(),
            header_written: false,
        })
    }

    /// Whether a reject file is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Records one rejected change. Any of the parts may be absent; the
    /// result, when present, is rendered as a commented trailer ahead of
    /// the record.
    pub fn reject(
        &mut self,
        comment: Option<&str>,
        record: Option<&ChangeRecord>,
        result: Option<&OperationResult>,
    ) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        if !self.header_written {
            self.header_written = true;
            if let Err(e) = writer.write_version_header() {
                warn!(path = %self.path, error = %e, "unable to write reject file header");
            }
        }

        let mut text = String::new();
        if let Some(comment) = comment {
            text.push_str(comment);
        }
        if let Some(result) = result {
            for line in result.format_lines() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&line);
            }
        }

        let outcome = (|| {
            if !text.is_empty() {
                writer.write_comment(&text)?;
            }
            if let Some(record) = record {
                writer.write_change_record(record)?;
            } else if !text.is_empty() {
                // Keep entries separated even when only a comment is written.
                writer.write_comment("")?;
            }
            writer.flush()
        })();

        if let Err(e) = outcome {
            warn!(path = %self.path, error = %e, "unable to write rejected change");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapply_client::ResultCode;
    use ldapply_ldif::DeleteRecord;

    fn delete_record(dn: &str) -> ChangeRecord {
        ChangeRecord::Delete(DeleteRecord {
            dn: dn.to_string(),
            controls: vec![],
        })
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejects.ldif");
        let mut sink = RejectSink::open(&path).unwrap();

        let result = OperationResult::new(ResultCode::NO_SUCH_OBJECT).with_diagnostic("missing");
        sink.reject(None, Some(&delete_record("uid=a,dc=x")), Some(&result));
        sink.reject(None, Some(&delete_record("uid=b,dc=x")), Some(&result));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("version: 1").count(), 1);
        assert!(text.starts_with("version: 1\n"));
        assert_eq!(text.matches("dn: uid=").count(), 2);
        assert_eq!(text.matches("# result code: 32 (no such object)").count(), 2);
        assert_eq!(text.matches("# diagnostic message: missing").count(), 2);
    }

    #[test]
    fn test_comment_and_trailer_precede_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejects.ldif");
        let mut sink = RejectSink::open(&path).unwrap();

        let result = OperationResult::new(ResultCode::ASSERTION_FAILED);
        sink.reject(
            Some("assertion filter '(objectClass=person)' did not match"),
            Some(&delete_record("uid=a,dc=x")),
            Some(&result),
        );

        let text = std::fs::read_to_string(&path).unwrap();
        let comment_pos = text.find("# assertion filter").unwrap();
        let trailer_pos = text.find("# result code: 122").unwrap();
        let record_pos = text.find("dn: uid=a,dc=x").unwrap();
        assert!(comment_pos < trailer_pos);
        assert!(trailer_pos < record_pos);
    }

    #[test]
    fn test_long_comment_is_not_folded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejects.ldif");
        let mut sink = RejectSink::open(&path).unwrap();

        let long = format!("failure: {}", "x".repeat(200));
        sink.reject(Some(&long), None, None);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().any(|l| l.len() > 200));
    }

    #[test]
    fn test_disabled_sink_is_a_no_op() {
        let mut sink = RejectSink::disabled();
        assert!(!sink.is_enabled());
        sink.reject(Some("nothing happens"), None, None);
    }
}
