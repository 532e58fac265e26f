//! LDIF writer.
//!
//! Writes change records and comments. A wrap column may be configured for
//! value lines; comments are folded at the same column unless wrapping is
//! disabled, which is what the reject file uses so that long diagnostic
//! messages stay on one greppable line.

use std::io::{self, Write};

use crate::record::ChangeRecord;

/// Writes LDIF change records and comments to an underlying sink.
pub struct LdifWriter<W: Write> {
    out: W,
    wrap_column: Option<usize>,
}

impl<W: Write> LdifWriter<W> {
    /// Creates a writer that folds lines at the customary 76 columns.
    pub fn new(out: W) -> Self {
        LdifWriter {
            out,
            wrap_column: Some(76),
        }
    }

    /// Disables line folding entirely (comments and values stay unwrapped).
    #[must_use]
    pub fn without_wrapping(mut self) -> Self {
        self.wrap_column = None;
        self
    }

    /// Writes the `version: 1` header line.
    pub fn write_version_header(&mut self) -> io::Result<()> {
        writeln!(self.out, "version: 1")
    }

    /// Writes a comment block, one `# ` prefixed line per (possibly folded)
    /// input line. Embedded newlines in `comment` start new comment lines.
    pub fn write_comment(&mut self, comment: &str) -> io::Result<()> {
        for line in comment.split('\n') {
            match self.wrap_column {
                Some(col) if line.len() + 2 > col => {
                    for chunk in wrap_text(line, col.saturating_sub(2).max(1)) {
                        writeln!(self.out, "# {chunk}")?;
                    }
                }
                _ => writeln!(self.out, "# {line}")?,
            }
        }
        Ok(())
    }

    /// Writes one change record followed by a blank separator line.
    pub fn write_change_record(&mut self, record: &ChangeRecord) -> io::Result<()> {
        for line in record.to_ldif_lines() {
            match self.wrap_column {
                Some(col) if line.len() > col => {
                    let (first, rest) = line.split_at(floor_char_boundary(&line, col));
                    writeln!(self.out, "{first}")?;
                    let mut rest = rest;
                    while !rest.is_empty() {
                        let take = floor_char_boundary(rest, col.saturating_sub(1).max(1));
                        writeln!(self.out, " {}", &rest[..take])?;
                        rest = &rest[take..];
                    }
                }
                _ => writeln!(self.out, "{line}")?,
            }
        }
        writeln!(self.out)
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Greedy word wrap; words longer than the width are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split(' ') {
        let mut word = word;
        loop {
            if current.is_empty() {
                if word.len() <= width {
                    current.push_str(word);
                    break;
                }
                let cut = floor_char_boundary(word, width);
                lines.push(word[..cut].to_string());
                word = &word[cut..];
            } else if current.len() + 1 + word.len() <= width {
                current.push(' ');
                current.push_str(word);
                break;
            } else {
                lines.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Largest index `<= at` that lies on a char boundary.
fn floor_char_boundary(s: &str, at: usize) -> usize {
    if at >= s.len() {
        return s.len();
    }
    let mut i = at;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DeleteRecord, ModType, Modification, ModifyRecord};

    #[test]
    fn test_version_header_and_record() {
        let mut buf = Vec::new();
        let mut w = LdifWriter::new(&mut buf);
        w.write_version_header().unwrap();
        w.write_change_record(&ChangeRecord::Delete(DeleteRecord {
            dn: "uid=a,dc=example,dc=com".to_string(),
            controls: vec![],
        }))
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "version: 1\ndn: uid=a,dc=example,dc=com\nchangetype: delete\n\n"
        );
    }

    #[test]
    fn test_comment_not_wrapped_without_wrapping() {
        let long = "x".repeat(200);
        let mut buf = Vec::new();
        let mut w = LdifWriter::new(&mut buf).without_wrapping();
        w.write_comment(&long).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert_eq!(text, format!("# {long}\n"));
    }

    #[test]
    fn test_comment_wrapped_by_default() {
        let long = "word ".repeat(40);
        let mut buf = Vec::new();
        let mut w = LdifWriter::new(&mut buf);
        w.write_comment(long.trim_end()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.lines().count() > 1);
        assert!(text.lines().all(|l| l.starts_with("# ") && l.len() <= 76));
    }

    #[test]
    fn test_value_line_folding_round_trips() {
        let long_value = "v".repeat(150);
        let record = ChangeRecord::Modify(ModifyRecord {
            dn: "uid=a,dc=example,dc=com".to_string(),
            modifications: vec![Modification {
                op: ModType::Replace,
                attribute: "description".to_string(),
                values: vec![long_value.clone().into_bytes()],
            }],
            controls: vec![],
        });

        let mut buf = Vec::new();
        let mut w = LdifWriter::new(&mut buf);
        w.write_change_record(&record).unwrap();

        let mut r = crate::reader::LdifReader::new(&buf[..]);
        let parsed = r.read_change_record().unwrap().unwrap();
        let ChangeRecord::Modify(m) = parsed else {
            panic!("expected modify record");
        };
        assert_eq!(m.modifications[0].values[0], long_value.as_bytes());
    }

    #[test]
    fn test_multiline_comment() {
        let mut buf = Vec::new();
        let mut w = LdifWriter::new(&mut buf).without_wrapping();
        w.write_comment("first\nsecond").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "# first\n# second\n");
    }
}
