//! Lazy LDIF change-record reader.
//!
//! Reads one change record at a time from any byte source. Logical lines are
//! unfolded, comments are skipped, and values may be given as safe strings or
//! base64. URL values (`attr:< file:///...`) are not supported and produce a
//! recoverable parse error.

use std::io::{BufRead, BufReader, Read};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use crate::record::{
    AddRecord, Attribute, ChangeRecord, DeleteRecord, Modification, ModifyDnRecord, ModifyRecord,
    ModType, RecordControl,
};

/// How trailing spaces on non-base64 values are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingSpaceBehavior {
    /// Treat a trailing space as a parse error (the LDIF default).
    #[default]
    Reject,
    /// Silently remove trailing spaces.
    Strip,
    /// Keep trailing spaces as part of the value.
    Retain,
}

/// The character set used to decode input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8 (the default).
    #[default]
    Utf8,
    /// ISO-8859-1 / Latin-1.
    Latin1,
}

impl Charset {
    /// Resolves a charset name as given on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Charset> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "iso-8859-1" | "latin-1" | "latin1" => Some(Charset::Latin1),
            _ => None,
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<String, String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| format!("input is not valid UTF-8: {e}")),
            Charset::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// An error produced while reading LDIF.
#[derive(Debug, Error)]
pub enum LdifError {
    /// An I/O failure on the underlying source. Never recoverable.
    #[error("I/O error reading LDIF: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A malformed record or line.
    #[error("LDIF parse error at line {line}: {message}")]
    Parse {
        /// The 1-based input line the error was detected on.
        line: usize,
        /// Human-readable description of the problem.
        message: String,
        /// Whether the reader can continue with the next record.
        may_continue: bool,
        /// The logical lines of the offending record, if framed.
        record_lines: Vec<String>,
    },
}

impl LdifError {
    /// Whether the reader is positioned to continue with the next record.
    #[must_use]
    pub fn may_continue_reading(&self) -> bool {
        match self {
            LdifError::Io { .. } => false,
            LdifError::Parse { may_continue, .. } => *may_continue,
        }
    }

    /// The logical lines of the offending record, if any.
    #[must_use]
    pub fn record_lines(&self) -> &[String] {
        match self {
            LdifError::Io { .. } => &[],
            LdifError::Parse { record_lines, .. } => record_lines,
        }
    }
}

/// A parsed `name: value` line.
enum ValueSpec {
    Plain(String),
    Base64(String),
    Url(String),
}

/// A lazy LDIF change-record reader.
pub struct LdifReader<R: Read> {
    src: BufReader<R>,
    charset: Charset,
    trailing: TrailingSpaceBehavior,
    default_add: bool,
    line_no: usize,
    first_record: bool,
}

impl<R: Read> LdifReader<R> {
    /// Creates a reader with default options (UTF-8, reject trailing spaces,
    /// explicit `changetype` required).
    pub fn new(src: R) -> Self {
        LdifReader {
            src: BufReader::new(src),
            charset: Charset::default(),
            trailing: TrailingSpaceBehavior::default(),
            default_add: false,
            line_no: 0,
            first_record: true,
        }
    }

    /// Sets the input character set.
    #[must_use]
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Sets the trailing-space behavior.
    #[must_use]
    pub fn with_trailing_space_behavior(mut self, behavior: TrailingSpaceBehavior) -> Self {
        self.trailing = behavior;
        self
    }

    /// When set, records without a `changetype` parse as adds.
    #[must_use]
    pub fn with_default_add(mut self, default_add: bool) -> Self {
        self.default_add = default_add;
        self
    }

    /// Reads the next change record, or `None` at end of stream.
    ///
    /// On a parse error the reader has already consumed the offending record,
    /// so the caller may keep reading when
    /// [`LdifError::may_continue_reading`] allows it.
    pub fn read_change_record(&mut self) -> Result<Option<ChangeRecord>, LdifError> {
        loop {
            let Some((start_line, lines)) = self.gather_logical_lines()? else {
                return Ok(None);
            };

            let mut lines = lines;
            if self.first_record {
                self.first_record = false;
                let version = match lines.first() {
                    Some((no, line)) => line
                        .strip_prefix("version:")
                        .map(|v| (*no, v.trim().to_string())),
                    None => None,
                };
                if let Some((no, version)) = version {
                    if version != "1" {
                        return Err(self.parse_error(
                            no,
                            format!("unsupported LDIF version {version:?}"),
                            &lines,
                        ));
                    }
                    lines.remove(0);
                }
            }

            if lines.is_empty() {
                continue;
            }

            return self.parse_record(start_line, &lines).map(Some);
        }
    }

    /// Collects the logical lines of the next record, unfolding continuations
    /// and dropping comments. Returns `None` at end of stream.
    fn gather_logical_lines(&mut self) -> Result<Option<(usize, Vec<(usize, String)>)>, LdifError> {
        let mut lines: Vec<(usize, String)> = Vec::new();
        let mut start_line = 0;
        let mut last_was_comment = false;

        loop {
            let mut raw = Vec::new();
            let n = self.src.read_until(b'\n', &mut raw)?;
            if n == 0 {
                if lines.is_empty() {
                    return Ok(None);
                }
                return Ok(Some((start_line, lines)));
            }
            self.line_no += 1;

            while raw.last() == Some(&b'\n') || raw.last() == Some(&b'\r') {
                raw.pop();
            }

            let line = match self.charset.decode(&raw) {
                Ok(line) => line,
                Err(message) => {
                    // Drain the rest of the record so the caller can resume.
                    let line_no = self.line_no;
                    self.skip_to_blank_line()?;
                    return Err(self.parse_error(line_no, message, &lines));
                }
            };

            if line.is_empty() {
                if lines.is_empty() {
                    continue;
                }
                return Ok(Some((start_line, lines)));
            }

            if let Some(rest) = line.strip_prefix(' ') {
                // Continuation of the previous logical line.
                if last_was_comment {
                    continue;
                }
                match lines.last_mut() {
                    Some((_, prev)) => prev.push_str(rest),
                    None => {
                        let line_no = self.line_no;
                        self.skip_to_blank_line()?;
                        return Err(self.parse_error(
                            line_no,
                            "continuation line with nothing to continue".to_string(),
                            &lines,
                        ));
                    }
                }
                continue;
            }

            if line.starts_with('#') {
                last_was_comment = true;
                continue;
            }
            last_was_comment = false;

            if lines.is_empty() {
                start_line = self.line_no;
            }
            lines.push((self.line_no, line));
        }
    }

    /// Consumes input until a blank line or end of stream.
    fn skip_to_blank_line(&mut self) -> Result<(), LdifError> {
        loop {
            let mut raw = Vec::new();
            let n = self.src.read_until(b'\n', &mut raw)?;
            if n == 0 {
                return Ok(());
            }
            self.line_no += 1;
            if raw.iter().all(|&b| b == b'\n' || b == b'\r') {
                return Ok(());
            }
        }
    }

    fn parse_error(
        &self,
        line: usize,
        message: String,
        lines: &[(usize, String)],
    ) -> LdifError {
        LdifError::Parse {
            line,
            message,
            may_continue: true,
            record_lines: lines.iter().map(|(_, l)| l.clone()).collect(),
        }
    }

    /// Splits a logical line into its attribute name and value spec.
    fn split_line(
        &self,
        line_no: usize,
        line: &str,
        lines: &[(usize, String)],
    ) -> Result<(String, ValueSpec), LdifError> {
        let Some(colon) = line.find(':') else {
            return Err(self.parse_error(
                line_no,
                format!("expected 'name: value', got {line:?}"),
                lines,
            ));
        };
        let name = line[..colon].trim_end().to_string();
        if name.is_empty() {
            return Err(self.parse_error(line_no, "empty attribute name".to_string(), lines));
        }
        let rest = &line[colon + 1..];
        let spec = if let Some(b64) = rest.strip_prefix(':') {
            ValueSpec::Base64(b64.trim().to_string())
        } else if let Some(url) = rest.strip_prefix('<') {
            ValueSpec::Url(url.trim().to_string())
        } else {
            ValueSpec::Plain(rest.trim_start_matches(' ').to_string())
        };
        Ok((name, spec))
    }

    /// Decodes a value spec into raw bytes, applying the trailing-space
    /// policy to plain values.
    fn decode_value(
        &self,
        line_no: usize,
        name: &str,
        spec: ValueSpec,
        lines: &[(usize, String)],
    ) -> Result<Vec<u8>, LdifError> {
        match spec {
            ValueSpec::Plain(value) => {
                if value.ends_with(' ') {
                    match self.trailing {
                        TrailingSpaceBehavior::Reject => {
                            return Err(self.parse_error(
                                line_no,
                                format!(
                                    "value of attribute '{name}' has a trailing space; \
                                     use --stripTrailingSpaces to remove it"
                                ),
                                lines,
                            ));
                        }
                        TrailingSpaceBehavior::Strip => {
                            return Ok(value.trim_end_matches(' ').as_bytes().to_vec());
                        }
                        TrailingSpaceBehavior::Retain => {}
                    }
                }
                Ok(value.into_bytes())
            }
            ValueSpec::Base64(value) => BASE64.decode(value.as_bytes()).map_err(|e| {
                self.parse_error(
                    line_no,
                    format!("invalid base64 value for attribute '{name}': {e}"),
                    lines,
                )
            }),
            ValueSpec::Url(url) => Err(self.parse_error(
                line_no,
                format!("URL value '{url}' for attribute '{name}' is not supported"),
                lines,
            )),
        }
    }

    fn decode_string_value(
        &self,
        line_no: usize,
        name: &str,
        spec: ValueSpec,
        lines: &[(usize, String)],
    ) -> Result<String, LdifError> {
        let bytes = self.decode_value(line_no, name, spec, lines)?;
        String::from_utf8(bytes).map_err(|e| {
            self.parse_error(
                line_no,
                format!("value of '{name}' is not valid UTF-8: {e}"),
                lines,
            )
        })
    }

    /// Parses a `control:` line value: `oid [criticality] [: value | :: b64]`.
    fn parse_control(
        &self,
        line_no: usize,
        value: &str,
        lines: &[(usize, String)],
    ) -> Result<RecordControl, LdifError> {
        let (head, control_value) = match value.find(':') {
            Some(i) => {
                let tail = &value[i + 1..];
                let control_value = if let Some(b64) = tail.strip_prefix(':') {
                    BASE64.decode(b64.trim().as_bytes()).map_err(|e| {
                        self.parse_error(
                            line_no,
                            format!("invalid base64 control value: {e}"),
                            lines,
                        )
                    })?
                } else {
                    tail.trim_start_matches(' ').as_bytes().to_vec()
                };
                (&value[..i], Some(control_value))
            }
            None => (value, None),
        };

        let mut parts = head.split_whitespace();
        let oid = parts
            .next()
            .ok_or_else(|| self.parse_error(line_no, "control line has no OID".to_string(), lines))?
            .to_string();
        let critical = match parts.next() {
            None => false,
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(self.parse_error(
                    line_no,
                    format!("invalid control criticality {other:?} (expected true or false)"),
                    lines,
                ));
            }
        };
        if parts.next().is_some() {
            return Err(self.parse_error(
                line_no,
                "unexpected extra token on control line".to_string(),
                lines,
            ));
        }

        Ok(RecordControl {
            oid,
            critical,
            value: control_value,
        })
    }

    /// Parses the framed logical lines of one record.
    fn parse_record(
        &self,
        start_line: usize,
        lines: &[(usize, String)],
    ) -> Result<ChangeRecord, LdifError> {
        let (first_no, first) = &lines[0];
        let (name, spec) = self.split_line(*first_no, first, lines)?;
        if !name.eq_ignore_ascii_case("dn") {
            return Err(self.parse_error(
                *first_no,
                format!("record must start with a dn line, got '{name}'"),
                lines,
            ));
        }
        let dn = self.decode_string_value(*first_no, "dn", spec, lines)?;

        let mut idx = 1;
        let mut controls = Vec::new();
        while idx < lines.len() {
            let (line_no, line) = &lines[idx];
            let (name, spec) = self.split_line(*line_no, line, lines)?;
            if !name.eq_ignore_ascii_case("control") {
                break;
            }
            let value = self.decode_string_value(*line_no, "control", spec, lines)?;
            controls.push(self.parse_control(*line_no, &value, lines)?);
            idx += 1;
        }

        let mut changetype: Option<String> = None;
        if idx < lines.len() {
            let (line_no, line) = &lines[idx];
            let (name, spec) = self.split_line(*line_no, line, lines)?;
            if name.eq_ignore_ascii_case("changetype") {
                changetype = Some(
                    self.decode_string_value(*line_no, "changetype", spec, lines)?
                        .to_ascii_lowercase(),
                );
                idx += 1;
            }
        }

        let body = &lines[idx..];
        match changetype.as_deref() {
            Some("add") => self.parse_add(dn, controls, body, lines),
            Some("delete") => {
                if let Some((line_no, _)) = body.first() {
                    return Err(self.parse_error(
                        *line_no,
                        "unexpected content after 'changetype: delete'".to_string(),
                        lines,
                    ));
                }
                Ok(ChangeRecord::Delete(DeleteRecord { dn, controls }))
            }
            Some("modify") => self.parse_modify(dn, controls, body, lines),
            Some("moddn") | Some("modrdn") => self.parse_modify_dn(dn, controls, body, lines),
            Some(other) => Err(self.parse_error(
                start_line,
                format!("unsupported changetype {other:?}"),
                lines,
            )),
            None if self.default_add => self.parse_add(dn, controls, body, lines),
            None => Err(self.parse_error(
                start_line,
                "record has no changetype (use --defaultAdd to treat it as an add)".to_string(),
                lines,
            )),
        }
    }

    fn parse_add(
        &self,
        dn: String,
        controls: Vec<RecordControl>,
        body: &[(usize, String)],
        lines: &[(usize, String)],
    ) -> Result<ChangeRecord, LdifError> {
        if body.is_empty() {
            return Err(self.parse_error(
                lines[0].0,
                format!("add record for '{dn}' has no attributes"),
                lines,
            ));
        }
        let mut attributes: Vec<Attribute> = Vec::new();
        for (line_no, line) in body {
            let (name, spec) = self.split_line(*line_no, line, lines)?;
            let value = self.decode_value(*line_no, &name, spec, lines)?;
            match attributes.iter_mut().find(|a| a.name == name) {
                Some(attr) => attr.values.push(value),
                None => attributes.push(Attribute {
                    name,
                    values: vec![value],
                }),
            }
        }
        Ok(ChangeRecord::Add(AddRecord {
            dn,
            attributes,
            controls,
        }))
    }

    fn parse_modify(
        &self,
        dn: String,
        controls: Vec<RecordControl>,
        body: &[(usize, String)],
        lines: &[(usize, String)],
    ) -> Result<ChangeRecord, LdifError> {
        let mut modifications = Vec::new();
        let mut idx = 0;
        while idx < body.len() {
            let (line_no, line) = &body[idx];
            if line == "-" {
                idx += 1;
                continue;
            }
            let (op_name, spec) = self.split_line(*line_no, line, lines)?;
            let op = match op_name.to_ascii_lowercase().as_str() {
                "add" => ModType::Add,
                "delete" => ModType::Delete,
                "replace" => ModType::Replace,
                "increment" => ModType::Increment,
                other => {
                    return Err(self.parse_error(
                        *line_no,
                        format!(
                            "expected add/delete/replace/increment in modify record, got '{other}'"
                        ),
                        lines,
                    ));
                }
            };
            let attribute = self.decode_string_value(*line_no, &op_name, spec, lines)?;
            idx += 1;

            let mut values = Vec::new();
            while idx < body.len() {
                let (value_no, value_line) = &body[idx];
                if value_line == "-" {
                    idx += 1;
                    break;
                }
                let (name, spec) = self.split_line(*value_no, value_line, lines)?;
                if !name.eq_ignore_ascii_case(&attribute) {
                    return Err(self.parse_error(
                        *value_no,
                        format!(
                            "value line names attribute '{name}' but the modification \
                             targets '{attribute}'"
                        ),
                        lines,
                    ));
                }
                values.push(self.decode_value(*value_no, &name, spec, lines)?);
                idx += 1;
            }

            if op == ModType::Increment && values.len() != 1 {
                return Err(self.parse_error(
                    *line_no,
                    format!(
                        "increment of '{attribute}' requires exactly one value, got {}",
                        values.len()
                    ),
                    lines,
                ));
            }

            modifications.push(Modification {
                op,
                attribute,
                values,
            });
        }

        if modifications.is_empty() {
            return Err(self.parse_error(
                lines[0].0,
                format!("modify record for '{dn}' has no modifications"),
                lines,
            ));
        }

        Ok(ChangeRecord::Modify(ModifyRecord {
            dn,
            modifications,
            controls,
        }))
    }

    fn parse_modify_dn(
        &self,
        dn: String,
        controls: Vec<RecordControl>,
        body: &[(usize, String)],
        lines: &[(usize, String)],
    ) -> Result<ChangeRecord, LdifError> {
        let mut new_rdn: Option<String> = None;
        let mut delete_old_rdn: Option<bool> = None;
        let mut new_superior: Option<String> = None;

        for (line_no, line) in body {
            let (name, spec) = self.split_line(*line_no, line, lines)?;
            match name.to_ascii_lowercase().as_str() {
                "newrdn" => {
                    new_rdn = Some(self.decode_string_value(*line_no, &name, spec, lines)?);
                }
                "deleteoldrdn" => {
                    let value = self.decode_string_value(*line_no, &name, spec, lines)?;
                    delete_old_rdn = Some(match value.trim() {
                        "1" | "true" => true,
                        "0" | "false" => false,
                        other => {
                            return Err(self.parse_error(
                                *line_no,
                                format!("invalid deleteoldrdn value {other:?}"),
                                lines,
                            ));
                        }
                    });
                }
                "newsuperior" => {
                    new_superior = Some(self.decode_string_value(*line_no, &name, spec, lines)?);
                }
                other => {
                    return Err(self.parse_error(
                        *line_no,
                        format!("unexpected line '{other}' in moddn record"),
                        lines,
                    ));
                }
            }
        }

        let Some(new_rdn) = new_rdn else {
            return Err(self.parse_error(
                lines[0].0,
                format!("moddn record for '{dn}' is missing newrdn"),
                lines,
            ));
        };
        let Some(delete_old_rdn) = delete_old_rdn else {
            return Err(self.parse_error(
                lines[0].0,
                format!("moddn record for '{dn}' is missing deleteoldrdn"),
                lines,
            ));
        };

        Ok(ChangeRecord::ModifyDn(ModifyDnRecord {
            dn,
            new_rdn,
            delete_old_rdn,
            new_superior,
            controls,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(input: &str) -> LdifReader<&[u8]> {
        LdifReader::new(input.as_bytes())
    }

    #[test]
    fn test_read_add_record() {
        let mut r = reader(
            "version: 1\n\
             dn: uid=a,dc=example,dc=com\n\
             changetype: add\n\
             objectClass: person\n\
             objectClass: top\n\
             cn: Test User\n",
        );
        let rec = r.read_change_record().unwrap().unwrap();
        let ChangeRecord::Add(add) = rec else {
            panic!("expected add record");
        };
        assert_eq!(add.dn, "uid=a,dc=example,dc=com");
        assert_eq!(add.attributes.len(), 2);
        assert_eq!(add.attributes[0].values.len(), 2);
        assert!(r.read_change_record().unwrap().is_none());
    }

    #[test]
    fn test_line_folding_and_comments() {
        let mut r = reader(
            "# a comment\n\
             #  folded comment continuation is also skipped\n\
             dn: uid=long,dc=exam\n\
              ple,dc=com\n\
             changetype: delete\n",
        );
        let rec = r.read_change_record().unwrap().unwrap();
        assert_eq!(rec.dn(), "uid=long,dc=example,dc=com");
    }

    #[test]
    fn test_base64_value() {
        let mut r = reader(
            "dn: uid=a,dc=example,dc=com\n\
             changetype: add\n\
             description:: aGVsbG8=\n",
        );
        let ChangeRecord::Add(add) = r.read_change_record().unwrap().unwrap() else {
            panic!("expected add record");
        };
        assert_eq!(add.attributes[0].values[0], b"hello");
    }

    #[test]
    fn test_url_value_is_recoverable_error() {
        let mut r = reader(
            "dn: uid=a,dc=example,dc=com\n\
             changetype: add\n\
             jpegPhoto:< file:///tmp/photo.jpg\n\
             \n\
             dn: uid=b,dc=example,dc=com\n\
             changetype: delete\n",
        );
        let err = r.read_change_record().unwrap_err();
        assert!(err.may_continue_reading());
        let rec = r.read_change_record().unwrap().unwrap();
        assert_eq!(rec.dn(), "uid=b,dc=example,dc=com");
    }

    #[test]
    fn test_modify_record_with_separators() {
        let mut r = reader(
            "dn: uid=a,dc=example,dc=com\n\
             changetype: modify\n\
             replace: mail\n\
             mail: a@example.com\n\
             -\n\
             delete: description\n\
             -\n\
             increment: loginCount\n\
             loginCount: 1\n",
        );
        let ChangeRecord::Modify(modify) = r.read_change_record().unwrap().unwrap() else {
            panic!("expected modify record");
        };
        assert_eq!(modify.modifications.len(), 3);
        assert_eq!(modify.modifications[0].op, ModType::Replace);
        assert_eq!(modify.modifications[1].op, ModType::Delete);
        assert!(modify.modifications[1].values.is_empty());
        assert_eq!(modify.modifications[2].op, ModType::Increment);
    }

    #[test]
    fn test_moddn_record() {
        let mut r = reader(
            "dn: uid=a,ou=people,dc=example,dc=com\n\
             changetype: modrdn\n\
             newrdn: uid=b\n\
             deleteoldrdn: 1\n\
             newsuperior: ou=staff,dc=example,dc=com\n",
        );
        let ChangeRecord::ModifyDn(moddn) = r.read_change_record().unwrap().unwrap() else {
            panic!("expected moddn record");
        };
        assert_eq!(moddn.new_rdn, "uid=b");
        assert!(moddn.delete_old_rdn);
        assert_eq!(
            moddn.new_superior.as_deref(),
            Some("ou=staff,dc=example,dc=com")
        );
    }

    #[test]
    fn test_record_controls() {
        let mut r = reader(
            "dn: uid=a,dc=example,dc=com\n\
             control: 1.2.840.113556.1.4.805 true\n\
             control: 1.3.6.1.4.1.42.2.27.8.5.1\n\
             changetype: delete\n",
        );
        let rec = r.read_change_record().unwrap().unwrap();
        let controls = rec.controls();
        assert_eq!(controls.len(), 2);
        assert_eq!(controls[0].oid, "1.2.840.113556.1.4.805");
        assert!(controls[0].critical);
        assert!(!controls[1].critical);
    }

    #[test]
    fn test_control_with_value() {
        let mut r = reader(
            "dn: uid=a,dc=example,dc=com\n\
             control: 1.2.3.4 false: some value\n\
             changetype: delete\n",
        );
        let rec = r.read_change_record().unwrap().unwrap();
        assert_eq!(rec.controls()[0].value.as_deref(), Some(&b"some value"[..]));
    }

    #[test]
    fn test_default_add() {
        let input = "dn: uid=a,dc=example,dc=com\n\
                     objectClass: person\n";
        let mut strict = reader(input);
        assert!(strict.read_change_record().is_err());

        let mut lenient = LdifReader::new(input.as_bytes()).with_default_add(true);
        let rec = lenient.read_change_record().unwrap().unwrap();
        assert!(matches!(rec, ChangeRecord::Add(_)));
    }

    #[test]
    fn test_trailing_space_behaviors() {
        let input = "dn: uid=a,dc=example,dc=com\n\
                     changetype: add\n\
                     cn: padded \n";

        let mut reject = reader(input);
        assert!(reject.read_change_record().is_err());

        let mut strip = LdifReader::new(input.as_bytes())
            .with_trailing_space_behavior(TrailingSpaceBehavior::Strip);
        let ChangeRecord::Add(add) = strip.read_change_record().unwrap().unwrap() else {
            panic!("expected add record");
        };
        assert_eq!(add.attributes[0].values[0], b"padded");

        let mut retain = LdifReader::new(input.as_bytes())
            .with_trailing_space_behavior(TrailingSpaceBehavior::Retain);
        let ChangeRecord::Add(add) = retain.read_change_record().unwrap().unwrap() else {
            panic!("expected add record");
        };
        assert_eq!(add.attributes[0].values[0], b"padded ");
    }

    #[test]
    fn test_latin1_decoding() {
        let mut bytes = b"dn: uid=a,dc=example,dc=com\nchangetype: add\ncn: J".to_vec();
        bytes.push(0xFC); // u-umlaut in ISO-8859-1
        bytes.extend_from_slice(b"rgen\n");
        let mut r = LdifReader::new(&bytes[..]).with_charset(Charset::Latin1);
        let ChangeRecord::Add(add) = r.read_change_record().unwrap().unwrap() else {
            panic!("expected add record");
        };
        assert_eq!(add.attributes[0].values[0], "Jürgen".as_bytes());
    }

    #[test]
    fn test_bad_record_then_good_record() {
        let mut r = reader(
            "dn: uid=a,dc=example,dc=com\n\
             changetype: modify\n\
             frobnicate: cn\n\
             \n\
             dn: uid=b,dc=example,dc=com\n\
             changetype: delete\n",
        );
        let err = r.read_change_record().unwrap_err();
        assert!(err.may_continue_reading());
        assert!(!err.record_lines().is_empty());
        let rec = r.read_change_record().unwrap().unwrap();
        assert_eq!(rec.dn(), "uid=b,dc=example,dc=com");
    }
}
