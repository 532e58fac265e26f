//! Progress and result output.
//!
//! Progress goes to standard output as `#`-prefixed comment lines, matching
//! the LDIF-flavored output of directory tooling. Failed results and other
//! error reporting go to standard error in the same shape so the two
//! streams can be separated cleanly.

use ldapply_client::OperationResult;
use ldapply_client::ResultCode;
use ldapply_ldif::ChangeRecord;

/// Column at which comment output is wrapped.
const WRAP_COLUMN: usize = 79;

/// Writes progress comments and operation results.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    /// Echo outgoing requests and per-page search results.
    pub verbose: bool,
}

impl Reporter {
    /// Writes a wrapped comment block to standard output.
    pub fn comment(&self, message: &str) {
        for line in wrap(message, WRAP_COLUMN - 2) {
            println!("# {line}");
        }
    }

    /// Writes a wrapped comment block to standard error.
    pub fn comment_err(&self, message: &str) {
        for line in wrap(message, WRAP_COLUMN - 2) {
            eprintln!("# {line}");
        }
    }

    /// Writes an operation result: standard output when successful,
    /// standard error otherwise, followed by a blank line.
    pub fn result(&self, result: &OperationResult) {
        if result.result_code() == ResultCode::SUCCESS {
            for line in result.format_lines() {
                println!("{line}");
            }
            println!();
        } else {
            for line in result.format_lines() {
                eprintln!("{line}");
            }
            eprintln!();
        }
    }

    /// Echoes the outgoing request as LDIF when verbose output is on.
    pub fn echo_record(&self, record: &ChangeRecord) {
        if !self.verbose {
            return;
        }
        for line in record.to_ldif_lines() {
            println!("{line}");
        }
        println!();
    }
}

/// Greedy word wrap for comment output.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for input_line in text.split('\n') {
        if input_line.len() <= width {
            lines.push(input_line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in input_line.split(' ') {
            if current.is_empty() {
                current.push_str(word);
            } else if current.len() + 1 + word.len() <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_short_line_untouched() {
        assert_eq!(wrap("short", 20), vec!["short"]);
    }

    #[test]
    fn test_wrap_splits_on_words() {
        let wrapped = wrap("alpha beta gamma delta", 11);
        assert_eq!(wrapped, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn test_wrap_preserves_embedded_newlines() {
        assert_eq!(wrap("a\nb", 20), vec!["a", "b"]);
    }
}
