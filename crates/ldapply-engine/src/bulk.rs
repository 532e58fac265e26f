//! Bulk modification.
//!
//! Applies one modify change record to many entries: either entries
//! matching a filter (found with a paged subtree search below the record's
//! DN) or entries named directly (on the command line or in files). The
//! paged loop borrows a single connection per page, bypassing the pool's
//! automatic retry, and keeps a per-(record, filter) set of processed DNs
//! so a retried page never modifies an entry twice.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;

use ldapply_client::controls::{self, Control};
use ldapply_client::filter as ldap_filter;
use ldapply_client::{ConnectionPool, ResultCode};
use ldapply_ldif::{ChangeRecord, ModifyRecord};

use crate::compose;
use crate::control_sets::RequestControlSets;
use crate::engine::Abort;
use crate::progress::Reporter;
use crate::rate::RateBudget;
use crate::reject::RejectSink;
use crate::settings::Settings;

/// Bulk-modify state shared across the selectors of one run.
pub struct BulkModifier<'a> {
    pub pool: &'a mut ConnectionPool,
    pub sets: &'a RequestControlSets,
    pub settings: &'a Settings,
    pub reject: &'a mut RejectSink,
    pub rate: Option<&'a RateBudget>,
    pub reporter: Reporter,
}

impl BulkModifier<'_> {
    /// Applies every configured selector to one change record, in the
    /// order the selector kinds are documented: filters, filter files,
    /// DNs, DN files. Returns the first non-success code observed.
    /// An unreadable selector file aborts the whole run.
    pub async fn apply_selectors(&mut self, record: &ChangeRecord) -> Result<ResultCode, Abort> {
        let mut final_code = ResultCode::SUCCESS;
        fn merge(code: ResultCode, final_code: &mut ResultCode) {
            if final_code.is_success() && !code.is_success() {
                *final_code = code;
            }
        }

        let filters = self.settings.bulk.filters.clone();
        for filter in &filters {
            let code = self
                .handle_filter(record, "--modifyEntriesMatchingFilter", filter)
                .await;
            merge(code, &mut final_code);
        }

        let filter_files = self.settings.bulk.filter_files.clone();
        for path in &filter_files {
            let items = self.read_selector_file(path, "filter")?;
            for (line_no, filter) in items {
                if let Err(e) = ldap_filter::encode_filter(&filter) {
                    let message = format!(
                        "unable to parse filter {:?} at {}:{}: {}",
                        filter,
                        path.display(),
                        line_no,
                        e
                    );
                    self.reporter.comment_err(&message);
                    if self.settings.continue_on_error {
                        merge(e.result_code(), &mut final_code);
                        continue;
                    }
                    return Err(Abort::new(e.result_code()));
                }
                let code = self
                    .handle_filter(record, "--modifyEntriesMatchingFiltersFromFile", &filter)
                    .await;
                merge(code, &mut final_code);
            }
        }

        let dns = self.settings.bulk.dns.clone();
        for dn in &dns {
            let code = self.handle_dn(record, "--modifyEntryWithDN", dn).await;
            merge(code, &mut final_code);
        }

        let dn_files = self.settings.bulk.dn_files.clone();
        for path in &dn_files {
            let items = self.read_selector_file(path, "DN")?;
            for (line_no, line) in items {
                let dn = match parse_dn_line(&line) {
                    Ok(dn) => dn,
                    Err(message) => {
                        let message = format!(
                            "unable to parse DN at {}:{}: {}",
                            path.display(),
                            line_no,
                            message
                        );
                        self.reporter.comment_err(&message);
                        if self.settings.continue_on_error {
                            merge(ResultCode::DECODING_ERROR, &mut final_code);
                            continue;
                        }
                        return Err(Abort::new(ResultCode::DECODING_ERROR));
                    }
                };
                let code = self
                    .handle_dn(record, "--modifyEntriesWithDNsFromFile", &dn)
                    .await;
                merge(code, &mut final_code);
            }
        }

        Ok(final_code)
    }

    /// Reads the non-blank, non-comment lines of a selector file.
    fn read_selector_file(
        &mut self,
        path: &Path,
        what: &str,
    ) -> Result<Vec<(usize, String)>, Abort> {
        let file = File::open(path).map_err(|e| {
            self.reporter.comment_err(&format!(
                "unable to open {} file {}: {}",
                what,
                path.display(),
                e
            ));
            Abort::new(ResultCode::LOCAL_ERROR)
        })?;

        let mut items = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                self.reporter.comment_err(&format!(
                    "I/O error reading {} file {}: {}",
                    what,
                    path.display(),
                    e
                ));
                Abort::new(ResultCode::LOCAL_ERROR)
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            items.push((idx + 1, trimmed.to_string()));
        }
        Ok(items)
    }

    /// Requires a modify record; anything else is rejected with a
    /// parameter error and never dispatched.
    fn require_modify<'r>(
        &mut self,
        record: &'r ChangeRecord,
        selector: &str,
    ) -> Result<&'r ModifyRecord, ResultCode> {
        match record {
            ChangeRecord::Modify(modify) => Ok(modify),
            other => {
                self.reject.reject(
                    Some(&format!(
                        "only modify change records may be used with {selector}"
                    )),
                    Some(other),
                    None,
                );
                Err(ResultCode::PARAM_ERROR)
            }
        }
    }

    /// Applies the record to every entry below its DN matching `filter`,
    /// page by page.
    async fn handle_filter(
        &mut self,
        record: &ChangeRecord,
        selector: &str,
        filter: &str,
    ) -> ResultCode {
        let modify = match self.require_modify(record, selector) {
            Ok(modify) => modify.clone(),
            Err(code) => return code,
        };

        let base = modify.dn.clone();
        let mut processed: HashSet<String> = HashSet::new();
        let mut entries_processed: u64 = 0;
        let mut result_code = ResultCode::SUCCESS;
        let mut cookie: Vec<u8> = Vec::new();

        loop {
            let mut search_controls: Vec<Control> = self.sets.search.to_vec();
            if let Some(page_size) = self.settings.search_page_size {
                match controls::paged_results(page_size, &cookie) {
                    Ok(control) => search_controls.push(control),
                    Err(e) => {
                        self.reject.reject(
                            Some(&format!(
                                "unable to build the paged results control for filter \
                                 '{filter}': {e}"
                            )),
                            Some(record),
                            None,
                        );
                        return e.result_code();
                    }
                }
            }

            // The pool's automatic retry cannot replay a search that already
            // returned entries, so the page runs on a borrowed connection
            // and the retry is handled here.
            let mut conn = match self.pool.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    self.reject.reject(
                        Some(&format!(
                            "unable to obtain a connection to search for entries \
                             matching '{filter}' below '{base}': {e}"
                        )),
                        Some(record),
                        None,
                    );
                    return e.result_code();
                }
            };

            let mut outcome = conn.search_dns(&base, filter, &search_controls).await;
            let mut code = outcome.result.result_code();

            if code == ResultCode::SUCCESS {
                self.pool.release(conn);
            } else if code.is_connection_usable() {
                self.pool.release(conn);
                self.reject.reject(
                    Some(&format!(
                        "search for entries matching '{filter}' below '{base}' failed"
                    )),
                    Some(record),
                    Some(&outcome.result),
                );
                return code;
            } else if self.settings.retry_failed_operations {
                match self.pool.replace_defunct(conn, code).await {
                    Ok(mut replacement) => {
                        debug!(filter, "retrying search page on a new connection");
                        outcome = replacement.search_dns(&base, filter, &search_controls).await;
                        code = outcome.result.result_code();
                        if code == ResultCode::SUCCESS {
                            self.pool.release(replacement);
                        } else {
                            if code.is_connection_usable() {
                                self.pool.release(replacement);
                            } else {
                                self.pool.release_defunct(replacement, code);
                            }
                            self.reject.reject(
                                Some(&format!(
                                    "search for entries matching '{filter}' below \
                                     '{base}' failed"
                                )),
                                Some(record),
                                Some(&outcome.result),
                            );
                            return code;
                        }
                    }
                    Err(_) => {
                        self.reject.reject(
                            Some(&format!(
                                "search for entries matching '{filter}' below '{base}' \
                                 failed and a replacement connection could not be \
                                 established"
                            )),
                            Some(record),
                            Some(&outcome.result),
                        );
                        return code;
                    }
                }
            } else {
                self.pool.release_defunct(conn, code);
                self.reject.reject(
                    Some(&format!(
                        "search for entries matching '{filter}' below '{base}' failed"
                    )),
                    Some(record),
                    Some(&outcome.result),
                );
                return code;
            }

            entries_processed += outcome.entry_dns.len() as u64;

            for dn in &outcome.entry_dns {
                if !processed.insert(dn.to_ascii_lowercase()) {
                    continue;
                }
                let code = self.dispatch_modify(&modify, dn).await;
                if result_code.is_success() && !code.is_success() {
                    result_code = code;
                }
            }

            if self.settings.search_page_size.is_none() {
                self.report_search_done(entries_processed, filter, &base, &outcome.result);
                return result_code;
            }

            match controls::find_paged_results(&outcome.result) {
                Err(e) => {
                    self.reject.reject(
                        Some(&format!(
                            "unable to decode the paged results response control for \
                             '{filter}' below '{base}': {e}"
                        )),
                        Some(record),
                        None,
                    );
                    return e.result_code();
                }
                Ok(None) => {
                    self.reject.reject(
                        Some(&format!(
                            "the search result for '{filter}' below '{base}' did not \
                             include a paged results response control"
                        )),
                        Some(record),
                        None,
                    );
                    return ResultCode::CONTROL_NOT_FOUND;
                }
                Ok(Some(info)) => {
                    if info.more_pages() {
                        cookie = info.cookie;
                        if self.reporter.verbose {
                            self.reporter.comment(&format!(
                                "processed {entries_processed} entries matching '{filter}' \
                                 below '{base}' so far; requesting the next page"
                            ));
                            self.reporter.result(&outcome.result);
                        }
                    } else {
                        self.report_search_done(entries_processed, filter, &base, &outcome.result);
                        return result_code;
                    }
                }
            }
        }
    }

    fn report_search_done(
        &self,
        entries: u64,
        filter: &str,
        base: &str,
        result: &ldapply_client::OperationResult,
    ) {
        self.reporter.comment(&format!(
            "processed {entries} entries matching '{filter}' below '{base}'"
        ));
        if self.reporter.verbose {
            self.reporter.result(result);
        }
    }

    /// Applies the record to one explicitly named entry.
    async fn handle_dn(&mut self, record: &ChangeRecord, selector: &str, dn: &str) -> ResultCode {
        let modify = match self.require_modify(record, selector) {
            Ok(modify) => modify.clone(),
            Err(code) => return code,
        };
        self.dispatch_modify(&modify, dn).await
    }

    /// Composes and dispatches one modify with the target DN substituted.
    async fn dispatch_modify(&mut self, record: &ModifyRecord, dn: &str) -> ResultCode {
        if let Some(rate) = self.rate {
            rate.acquire().await;
        }

        let swapped = record.with_target_dn(dn);
        let request = compose::modify_request(&swapped, &self.sets.modify, &self.settings.controls);
        let echo = ChangeRecord::Modify(swapped);

        self.reporter.comment(&format!("Modifying entry {dn}"));
        self.reporter.echo_record(&echo);

        let result = self.pool.apply(&request).await;
        self.reporter.result(&result);

        let code = result.result_code();
        if !code.is_success() {
            if code == ResultCode::ASSERTION_FAILED {
                let filter = self
                    .settings
                    .controls
                    .assertion_filter
                    .as_deref()
                    .unwrap_or("");
                self.reject.reject(
                    Some(&format!(
                        "the assertion filter '{filter}' did not match the target entry \
                         {dn}"
                    )),
                    Some(&echo),
                    Some(&result),
                );
            } else {
                self.reject.reject(None, Some(&echo), Some(&result));
            }
        }
        code
    }
}

/// Parses one line of a DN file: a bare DN, `dn: ...`, or `dn:: base64`.
fn parse_dn_line(line: &str) -> Result<String, String> {
    if let Some(rest) = strip_prefix_ci(line, "dn::") {
        let bytes = BASE64
            .decode(rest.trim().as_bytes())
            .map_err(|e| format!("invalid base64 DN: {e}"))?;
        return String::from_utf8(bytes).map_err(|e| format!("DN is not valid UTF-8: {e}"));
    }
    if let Some(rest) = strip_prefix_ci(line, "dn:") {
        return Ok(rest.trim().to_string());
    }
    Ok(line.to_string())
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    if line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dn_line_forms() {
        assert_eq!(parse_dn_line("uid=a,dc=x").unwrap(), "uid=a,dc=x");
        assert_eq!(parse_dn_line("dn: uid=a,dc=x").unwrap(), "uid=a,dc=x");
        assert_eq!(parse_dn_line("DN: uid=a,dc=x").unwrap(), "uid=a,dc=x");
        // "dAo=" is base64 for "uid" truncated? Use a real value.
        let encoded = BASE64.encode("uid=á,dc=x".as_bytes());
        assert_eq!(parse_dn_line(&format!("dn:: {encoded}")).unwrap(), "uid=á,dc=x");
        assert!(parse_dn_line("dn:: !!!").is_err());
    }
}
