//! RFC 4515 search filter parsing and BER encoding.
//!
//! The assertion request control carries a BER-encoded filter, so the
//! client layer needs to turn the familiar string form into the RFC 4511
//! `Filter` CHOICE. Supported constructs: and, or, not, equality,
//! substrings, greater-or-equal, less-or-equal, presence, and approximate
//! match. Extensible matching rules are rejected.

use lber::structures::Tag;

use crate::ber;
use crate::error::ClientError;

/// Parses a filter string and returns its BER `Filter` tag.
pub fn encode_filter(input: &str) -> Result<Tag, ClientError> {
    let bytes = input.trim().as_bytes();
    let mut parser = Parser { input: bytes, pos: 0 };
    let tag = if parser.peek() == Some(b'(') {
        let tag = parser.parse_filter()?;
        if parser.pos != parser.input.len() {
            return Err(parser.error("trailing characters after filter"));
        }
        tag
    } else {
        // Bare "attr=value" form, tolerated the way command-line tools do.
        parser.parse_item(parser.input.len())?
    };
    Ok(tag)
}

/// Parses a filter string and returns its BER byte representation.
pub fn encode_filter_bytes(input: &str) -> Result<Vec<u8>, ClientError> {
    ber::encode(encode_filter(input)?)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> ClientError {
        ClientError::Filter {
            offset: self.pos,
            message: message.into(),
        }
    }

    /// `filter = "(" filtercomp ")"`
    fn parse_filter(&mut self) -> Result<Tag, ClientError> {
        if self.peek() != Some(b'(') {
            return Err(self.error("expected '('"));
        }
        self.pos += 1;

        let tag = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                ber::ctx_seq(0, self.parse_filter_list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                ber::ctx_seq(1, self.parse_filter_list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                ber::ctx_seq(2, vec![self.parse_filter()?])
            }
            Some(_) => {
                let end = self.find_close()?;
                let tag = self.parse_item(end)?;
                self.pos = end;
                tag
            }
            None => return Err(self.error("unexpected end of filter")),
        };

        if self.peek() != Some(b')') {
            return Err(self.error("expected ')'"));
        }
        self.pos += 1;
        Ok(tag)
    }

    /// One or more nested filters, as inside `(&...)`.
    fn parse_filter_list(&mut self) -> Result<Vec<Tag>, ClientError> {
        let mut filters = Vec::new();
        while self.peek() == Some(b'(') {
            filters.push(self.parse_filter()?);
        }
        if filters.is_empty() {
            return Err(self.error("expected at least one nested filter"));
        }
        Ok(filters)
    }

    /// Position of the ')' terminating the current item, honoring escapes.
    fn find_close(&self) -> Result<usize, ClientError> {
        let mut i = self.pos;
        while i < self.input.len() {
            match self.input[i] {
                b'\\' => i += 2,
                b')' => return Ok(i),
                b'(' => {
                    return Err(ClientError::Filter {
                        offset: i,
                        message: "unexpected '(' inside a filter item".to_string(),
                    })
                }
                _ => i += 1,
            }
        }
        Err(ClientError::Filter {
            offset: i,
            message: "unterminated filter item".to_string(),
        })
    }

    /// A single `attr OP value` item spanning `self.pos..end`.
    fn parse_item(&mut self, end: usize) -> Result<Tag, ClientError> {
        let item = &self.input[self.pos..end];
        let eq = item
            .iter()
            .position(|&b| b == b'=')
            .ok_or_else(|| self.error("filter item has no '='"))?;
        if eq == 0 {
            return Err(self.error("filter item has an empty attribute name"));
        }

        let (attr, op): (&[u8], u64) = match item[eq - 1] {
            b'>' => (&item[..eq - 1], 5),
            b'<' => (&item[..eq - 1], 6),
            b'~' => (&item[..eq - 1], 8),
            b':' => {
                return Err(self.error("extensible match filters are not supported"));
            }
            _ => (&item[..eq], 3),
        };
        let attr = std::str::from_utf8(attr)
            .map_err(|_| self.error("attribute name is not valid UTF-8"))?
            .trim()
            .to_string();
        if attr.is_empty() {
            return Err(self.error("filter item has an empty attribute name"));
        }

        let raw_value = &item[eq + 1..];
        if op != 3 {
            let value = unescape(raw_value).map_err(|off| ClientError::Filter {
                offset: self.pos + eq + 1 + off,
                message: "invalid escape sequence".to_string(),
            })?;
            return Ok(ber::ctx_seq(
                op,
                vec![ber::octet_string(attr), ber::octet_string(value)],
            ));
        }

        // Equality: may actually be a presence or substring filter.
        let segments = split_on_stars(raw_value).map_err(|off| ClientError::Filter {
            offset: self.pos + eq + 1 + off,
            message: "invalid escape sequence".to_string(),
        })?;

        match segments.len() {
            1 => {
                let value = segments.into_iter().next().unwrap_or_default();
                Ok(ber::ctx_seq(
                    3,
                    vec![ber::octet_string(attr), ber::octet_string(value)],
                ))
            }
            2 if segments[0].is_empty() && segments[1].is_empty() => {
                Ok(ber::ctx_prim(7, attr.into_bytes()))
            }
            _ => {
                let last = segments.len() - 1;
                let mut parts = Vec::new();
                for (i, segment) in segments.into_iter().enumerate() {
                    if segment.is_empty() {
                        continue;
                    }
                    let id = if i == 0 {
                        0 // initial
                    } else if i == last {
                        2 // final
                    } else {
                        1 // any
                    };
                    parts.push(ber::ctx_prim(id, segment));
                }
                if parts.is_empty() {
                    return Err(self.error("substring filter has no substrings"));
                }
                Ok(ber::ctx_seq(
                    4,
                    vec![ber::octet_string(attr), ber::seq(parts)],
                ))
            }
        }
    }
}

/// Splits an assertion value on unescaped '*', unescaping each segment.
/// Returns the byte offset of a bad escape on failure.
fn split_on_stars(raw: &[u8]) -> Result<Vec<Vec<u8>>, usize> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'*' => {
                segments.push(std::mem::take(&mut current));
                i += 1;
            }
            b'\\' => {
                current.push(unescape_at(raw, i)?);
                i += 3;
            }
            b => {
                current.push(b);
                i += 1;
            }
        }
    }
    segments.push(current);
    Ok(segments)
}

/// Unescapes a full assertion value ('*' is literal here).
fn unescape(raw: &[u8]) -> Result<Vec<u8>, usize> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' {
            out.push(unescape_at(raw, i)?);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Decodes the `\xx` escape starting at `i`.
fn unescape_at(raw: &[u8], i: usize) -> Result<u8, usize> {
    let hi = raw.get(i + 1).copied().and_then(hex_digit).ok_or(i)?;
    let lo = raw.get(i + 2).copied().and_then(hex_digit).ok_or(i)?;
    Ok(hi << 4 | lo)
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_filter() {
        let bytes = encode_filter_bytes("(uid=jdoe)").unwrap();
        // [3] SEQUENCE { "uid", "jdoe" }
        assert_eq!(
            bytes,
            vec![0xA3, 0x0B, 0x04, 0x03, b'u', b'i', b'd', 0x04, 0x04, b'j', b'd', b'o', b'e']
        );
    }

    #[test]
    fn test_presence_filter() {
        let bytes = encode_filter_bytes("(objectClass=*)").unwrap();
        assert_eq!(bytes[0], 0x87);
        assert_eq!(&bytes[2..], b"objectClass");
    }

    #[test]
    fn test_and_filter_nesting() {
        let bytes = encode_filter_bytes("(&(objectClass=person)(uid=jdoe))").unwrap();
        assert_eq!(bytes[0], 0xA0);
        // Both nested equality filters are present.
        let inner = &bytes[2..];
        assert_eq!(inner[0], 0xA3);
    }

    #[test]
    fn test_not_filter() {
        let bytes = encode_filter_bytes("(!(uid=jdoe))").unwrap();
        assert_eq!(bytes[0], 0xA2);
    }

    #[test]
    fn test_ge_le_approx() {
        assert_eq!(encode_filter_bytes("(createTimestamp>=2024)").unwrap()[0], 0xA5);
        assert_eq!(encode_filter_bytes("(createTimestamp<=2024)").unwrap()[0], 0xA6);
        assert_eq!(encode_filter_bytes("(cn~=john)").unwrap()[0], 0xA8);
    }

    #[test]
    fn test_substring_filter() {
        let bytes = encode_filter_bytes("(cn=jo*hn*doe)").unwrap();
        assert_eq!(bytes[0], 0xA4);
        // initial "jo", any "hn", final "doe"
        let parsed = ber::decode(&bytes).unwrap();
        let parts = parsed.expect_constructed().unwrap();
        assert_eq!(parts.len(), 2);
        let subs = parts[1].clone().expect_constructed().unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0].id, 0);
        assert_eq!(subs[1].id, 1);
        assert_eq!(subs[2].id, 2);
    }

    #[test]
    fn test_leading_star_substring() {
        let bytes = encode_filter_bytes("(cn=*smith)").unwrap();
        assert_eq!(bytes[0], 0xA4);
        let parsed = ber::decode(&bytes).unwrap();
        let parts = parsed.expect_constructed().unwrap();
        let subs = parts[1].clone().expect_constructed().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, 2); // final only
    }

    #[test]
    fn test_escapes() {
        let bytes = encode_filter_bytes(r"(cn=a\2ab)").unwrap();
        // The escaped '*' is a literal, so this stays an equality match.
        assert_eq!(bytes[0], 0xA3);
        let parsed = ber::decode(&bytes).unwrap();
        let parts = parsed.expect_constructed().unwrap();
        assert_eq!(parts[1].clone().expect_primitive().unwrap(), b"a*b");
    }

    #[test]
    fn test_bare_item_tolerated() {
        let bytes = encode_filter_bytes("uid=jdoe").unwrap();
        assert_eq!(bytes[0], 0xA3);
    }

    #[test]
    fn test_errors() {
        assert!(encode_filter_bytes("(uid=jdoe").is_err());
        assert!(encode_filter_bytes("(=value)").is_err());
        assert!(encode_filter_bytes("(&)").is_err());
        assert!(encode_filter_bytes(r"(cn=bad\9)").is_err());
        assert!(encode_filter_bytes("(cn:caseExactMatch:=x)").is_err());
    }
}
