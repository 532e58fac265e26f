//! The change-application engine.
//!
//! Streams change records and drives them through composition, grouping,
//! and dispatch. The loop owns every resource (pool, reader, reject sink,
//! grouping state) and releases them on all exit paths. The final result
//! code is the first non-success outcome observed; success otherwise.

use std::fs::File;
use std::io::{self, Read};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use ldapply_client::exop;
use ldapply_client::{
    ConnectionPool, Control, OperationResult, PoolConfig, ResultCode, ServerNotice, UpdateRequest,
};
use ldapply_ldif::{
    AddRecord, ChangeRecord, DeleteRecord, LdifError, LdifReader, ModifyDnRecord, ModifyRecord,
};

use crate::bulk::BulkModifier;
use crate::compose;
use crate::control_sets::{self, RequestControlSets};
use crate::progress::Reporter;
use crate::rate::RateBudget;
use crate::reject::RejectSink;
use crate::settings::{GroupingMode, Settings};

/// A failure that ends the change loop.
#[derive(Debug, Clone, Copy)]
pub struct Abort {
    /// The result code the run will report.
    pub code: ResultCode,
}

impl Abort {
    /// Wraps a result code as a loop-ending failure.
    #[must_use]
    pub fn new(code: ResultCode) -> Self {
        Abort { code }
    }
}

/// The engine for one tool invocation.
pub struct Engine {
    settings: Settings,
    sets: RequestControlSets,
    pool: Option<ConnectionPool>,
    reject: RejectSink,
    rate: Option<RateBudget>,
    reporter: Reporter,
    multi_buffer: Vec<UpdateRequest>,
    txn_id: Option<Vec<u8>>,
}

impl Engine {
    /// Runs the tool: connects (unless dry-run), starts the grouping mode,
    /// applies every change record, finalizes the grouping, and releases
    /// all resources. Returns the final result code.
    pub async fn run(
        settings: Settings,
        mut pool_config: PoolConfig,
        notices: Option<UnboundedSender<ServerNotice>>,
    ) -> ResultCode {
        let reporter = Reporter {
            verbose: settings.verbose,
        };

        if let Err(e) = settings.validate() {
            reporter.comment_err(&e.to_string());
            return e.result_code();
        }

        let sets = match control_sets::build(&settings) {
            Ok(sets) => sets,
            Err(e) => {
                reporter.comment_err(&e.to_string());
                return e.result_code();
            }
        };

        // Dry-run performs no network activity at all, not even a bind.
        let pool = if settings.dry_run {
            None
        } else {
            pool_config.bind_controls = match control_sets::bind_controls(&settings) {
                Ok(controls) => controls,
                Err(e) => {
                    reporter.comment_err(&e.to_string());
                    return e.result_code();
                }
            };
            match ConnectionPool::connect(pool_config, notices).await {
                Ok(mut pool) => {
                    if settings.retry_failed_operations {
                        pool.set_retry_failed_operations(true);
                    }
                    if let Some(server) = pool.current_server() {
                        reporter.comment(&format!("Connection established to {server}"));
                    }
                    Some(pool)
                }
                Err(e) => {
                    let code = e.result_code();
                    // The health check already reported a failed bind; an
                    // invalid-credentials result would only repeat it.
                    if code != ResultCode::INVALID_CREDENTIALS {
                        reporter.comment_err(&e.to_string());
                    }
                    return code;
                }
            }
        };

        let rate = match settings.rate_per_second {
            Some(per_second) => match RateBudget::per_second(per_second) {
                Ok(rate) => Some(rate),
                Err(e) => {
                    reporter.comment_err(&e.to_string());
                    return e.result_code();
                }
            },
            None => None,
        };

        let mut engine = Engine {
            settings,
            sets,
            pool,
            reject: RejectSink::disabled(),
            rate,
            reporter,
            multi_buffer: Vec::new(),
            txn_id: None,
        };

        let code = engine.execute().await;

        if let Some(pool) = engine.pool.as_mut() {
            pool.close().await;
        }
        code
    }

    async fn execute(&mut self) -> ResultCode {
        if let Err(code) = self.start_transaction_if_configured().await {
            return code;
        }

        let mut ldif = match self.open_reader() {
            Ok(reader) => reader,
            Err(code) => return code,
        };

        match &self.settings.reject_file {
            Some(path) => match RejectSink::open(path) {
                Ok(sink) => self.reject = sink,
                Err(e) => {
                    self.reporter.comment_err(&format!(
                        "unable to open the reject file {}: {}",
                        path.display(),
                        e
                    ));
                    return ResultCode::LOCAL_ERROR;
                }
            },
            None => {}
        }

        let (mut final_code, commit) = self.run_loop(&mut ldif).await;
        self.finalize_grouping(&mut final_code, commit).await;
        final_code.unwrap_or(ResultCode::SUCCESS)
    }

    /// Builds the LDIF reader over the configured files, or standard input.
    fn open_reader(&self) -> Result<LdifReader<Box<dyn Read>>, ResultCode> {
        let source: Box<dyn Read> = if self.settings.ldif_files.is_empty() {
            Box::new(io::stdin())
        } else {
            let mut combined: Box<dyn Read> = Box::new(io::empty());
            for path in &self.settings.ldif_files {
                let file = File::open(path).map_err(|e| {
                    self.reporter.comment_err(&format!(
                        "unable to open the LDIF file {}: {}",
                        path.display(),
                        e
                    ));
                    ResultCode::LOCAL_ERROR
                })?;
                combined = Box::new(combined.chain(file));
            }
            combined
        };

        Ok(LdifReader::new(source)
            .with_charset(self.settings.charset)
            .with_trailing_space_behavior(self.settings.trailing_spaces)
            .with_default_add(self.settings.default_add))
    }

    /// Starts the transaction and arranges for the transaction-specification
    /// control on every subsequent modifying request.
    async fn start_transaction_if_configured(&mut self) -> Result<(), ResultCode> {
        if !self.settings.use_transaction {
            return Ok(());
        }
        let Some(pool) = self.pool.as_mut() else {
            return Err(ResultCode::PARAM_ERROR);
        };

        // In a transaction, proxied authorization belongs to the
        // start-transaction request alone, never to the inner operations.
        let outer_controls = match control_sets::proxy_control(&self.settings.controls) {
            Ok(control) => control.into_iter().collect::<Vec<Control>>(),
            Err(e) => {
                self.reporter.comment_err(&e.to_string());
                return Err(e.result_code());
            }
        };

        let outcome = pool.extended(exop::start_transaction(), &outer_controls).await;
        if outcome.result.result_code() != ResultCode::SUCCESS {
            self.reporter.comment_err(&format!(
                "unable to start a transaction: {}",
                outcome.result.summary()
            ));
            return Err(outcome.result.result_code());
        }

        let txn_id = match exop::start_transaction_id(&outcome) {
            Ok(id) => id,
            Err(e) => {
                self.reporter.comment_err(&e.to_string());
                return Err(e.result_code());
            }
        };

        self.sets
            .push_modifying(&ldapply_client::controls::transaction_specification(&txn_id));
        self.reporter.comment(&format!(
            "Started transaction {}",
            printable_bytes(&txn_id)
        ));
        self.txn_id = Some(txn_id);
        Ok(())
    }

    /// The record loop. Returns the accumulated result code and whether a
    /// transaction should still commit.
    async fn run_loop(&mut self, ldif: &mut LdifReader<Box<dyn Read>>) -> (Option<ResultCode>, bool) {
        let mut final_code: Option<ResultCode> = None;
        let mut commit = true;
        let is_bulk = self.settings.is_bulk();

        loop {
            // Bulk passes rate-limit inside the per-entry handler instead.
            if !is_bulk {
                if let Some(rate) = &self.rate {
                    rate.acquire().await;
                }
            }

            let record = match ldif.read_change_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e @ LdifError::Io { .. }) => {
                    let message = format!("unable to read the next change record: {e}");
                    self.reporter.comment_err(&message);
                    self.reject.reject(Some(&message), None, None);
                    commit = false;
                    final_code = Some(ResultCode::LOCAL_ERROR);
                    break;
                }
                Err(e) => {
                    let recoverable = e.may_continue_reading() && !self.settings.use_transaction;
                    let mut message = if recoverable {
                        format!("recoverable error reading a change record: {e}")
                    } else {
                        format!("unrecoverable error reading a change record: {e}")
                    };
                    if !e.record_lines().is_empty() {
                        message.push_str("\nthe invalid lines were:");
                        for line in e.record_lines() {
                            message.push('\n');
                            message.push_str(line);
                        }
                    }
                    self.reporter.comment_err(&message);
                    self.reject.reject(Some(&message), None, None);
                    if final_code.map_or(true, ResultCode::is_success) {
                        final_code = Some(ResultCode::LOCAL_ERROR);
                    }
                    if recoverable {
                        continue;
                    }
                    commit = false;
                    break;
                }
            };

            if is_bulk {
                let Some(pool) = self.pool.as_mut() else {
                    final_code = Some(ResultCode::PARAM_ERROR);
                    break;
                };
                let mut bulk = BulkModifier {
                    pool,
                    sets: &self.sets,
                    settings: &self.settings,
                    reject: &mut self.reject,
                    rate: self.rate.as_ref(),
                    reporter: self.reporter,
                };
                match bulk.apply_selectors(&record).await {
                    Ok(code) => {
                        if final_code.map_or(true, ResultCode::is_success) && !code.is_success() {
                            final_code = Some(code);
                        }
                    }
                    Err(abort) => {
                        final_code = Some(abort.code);
                        commit = false;
                        break;
                    }
                }
                continue;
            }

            let outcome = match &record {
                ChangeRecord::Add(r) => self.do_add(r).await,
                ChangeRecord::Delete(r) => self.do_delete(r).await,
                ChangeRecord::Modify(r) => self.do_modify(r).await,
                ChangeRecord::ModifyDn(r) => self.do_modify_dn(r).await,
            };
            match outcome {
                Ok(code) => {
                    if final_code.map_or(true, ResultCode::is_success) && !code.is_success() {
                        final_code = Some(code);
                    }
                }
                Err(abort) => {
                    commit = false;
                    if final_code.map_or(true, ResultCode::is_success) {
                        final_code = Some(abort.code);
                    }
                    break;
                }
            }
        }

        (final_code, commit)
    }

    /// Ends the transaction or sends the multi-update request, folding the
    /// outcome into the final code.
    async fn finalize_grouping(&mut self, final_code: &mut Option<ResultCode>, commit: bool) {
        match self.settings.grouping() {
            GroupingMode::Immediate => {}
            GroupingMode::Transaction => {
                let Some(txn_id) = self.txn_id.clone() else {
                    return;
                };
                let Some(pool) = self.pool.as_mut() else {
                    return;
                };
                debug!(commit, "ending transaction");
                let request = match exop::end_transaction(&txn_id, commit) {
                    Ok(request) => request,
                    Err(e) => {
                        self.reporter.comment_err(&e.to_string());
                        if final_code.map_or(true, ResultCode::is_success) {
                            *final_code = Some(e.result_code());
                        }
                        return;
                    }
                };
                let outcome = pool.extended(request, &[]).await;
                self.reporter.result(&outcome.result);
                let end_code = outcome.result.result_code();
                if final_code.map_or(true, |c| c == ResultCode::SUCCESS)
                    && end_code != ResultCode::SUCCESS
                {
                    *final_code = Some(end_code);
                }
            }
            GroupingMode::MultiUpdate(behavior) => {
                let Some(pool) = self.pool.as_mut() else {
                    return;
                };
                let outer_controls = match control_sets::proxy_control(&self.settings.controls) {
                    Ok(control) => control.into_iter().collect::<Vec<Control>>(),
                    Err(e) => {
                        self.reporter.comment_err(&e.to_string());
                        *final_code = Some(e.result_code());
                        return;
                    }
                };
                self.reporter.comment(&format!(
                    "Sending a multi-update extended request containing {} operations",
                    self.multi_buffer.len()
                ));
                let request = match exop::multi_update(behavior, &self.multi_buffer) {
                    Ok(request) => request,
                    Err(e) => {
                        self.reporter.comment_err(&e.to_string());
                        *final_code = Some(e.result_code());
                        return;
                    }
                };
                let outcome = pool.extended(request, &outer_controls).await;
                self.reporter.result(&outcome.result);
                *final_code = Some(outcome.result.result_code());
            }
        }
    }

    async fn dispatch(&mut self, request: &UpdateRequest) -> OperationResult {
        match self.pool.as_mut() {
            Some(pool) => pool.apply(request).await,
            None => OperationResult::new(ResultCode::PARAM_ERROR)
                .with_diagnostic("no connection is available"),
        }
    }

    /// Common post-dispatch policy: assertion failures always end the run;
    /// other failures end it unless continue-on-error applies.
    fn check_result(
        &mut self,
        result: OperationResult,
        record: &ChangeRecord,
    ) -> Result<ResultCode, Abort> {
        let code = result.result_code();
        if code.is_success() {
            return Ok(code);
        }

        if code == ResultCode::ASSERTION_FAILED {
            let filter = self
                .settings
                .controls
                .assertion_filter
                .as_deref()
                .unwrap_or("");
            self.reject.reject(
                Some(&format!(
                    "the assertion filter '{filter}' did not match the target entry {}",
                    record.dn()
                )),
                Some(record),
                Some(&result),
            );
            return Err(Abort::new(code));
        }

        self.reject.reject(None, Some(record), Some(&result));
        if self.settings.use_transaction || !self.settings.continue_on_error {
            Err(Abort::new(code))
        } else {
            Ok(code)
        }
    }

    async fn do_add(&mut self, record: &AddRecord) -> Result<ResultCode, Abort> {
        let request = compose::add_request(record, &self.sets.add, &self.settings.controls);

        if self.settings.multi_update_error_behavior.is_some() {
            self.reporter.comment(&format!(
                "Buffered the add of entry {} for the multi-update request",
                record.dn
            ));
            self.multi_buffer.push(request);
            return Ok(ResultCode::SUCCESS);
        }
        if self.settings.dry_run {
            self.reporter
                .comment(&format!("dry run: not adding entry {}", record.dn));
            return Ok(ResultCode::SUCCESS);
        }

        self.reporter.comment(&format!("Adding entry {}", record.dn));
        let echo = ChangeRecord::Add(record.clone());
        self.reporter.echo_record(&echo);

        let result = self.dispatch(&request).await;
        self.reporter.result(&result);
        self.check_result(result, &echo)
    }

    async fn do_delete(&mut self, record: &DeleteRecord) -> Result<ResultCode, Abort> {
        let request = compose::delete_request(record, &self.sets.delete);

        if self.settings.multi_update_error_behavior.is_some() {
            self.reporter.comment(&format!(
                "Buffered the delete of entry {} for the multi-update request",
                record.dn
            ));
            self.multi_buffer.push(request);
            return Ok(ResultCode::SUCCESS);
        }
        if self.settings.dry_run {
            self.reporter
                .comment(&format!("dry run: not deleting entry {}", record.dn));
            return Ok(ResultCode::SUCCESS);
        }

        self.reporter
            .comment(&format!("Deleting entry {}", record.dn));
        let echo = ChangeRecord::Delete(record.clone());
        self.reporter.echo_record(&echo);

        let result = self.dispatch(&request).await;
        self.reporter.result(&result);
        self.check_result(result, &echo)
    }

    async fn do_modify(&mut self, record: &ModifyRecord) -> Result<ResultCode, Abort> {
        let request = compose::modify_request(record, &self.sets.modify, &self.settings.controls);

        if self.settings.multi_update_error_behavior.is_some() {
            self.reporter.comment(&format!(
                "Buffered the modify of entry {} for the multi-update request",
                record.dn
            ));
            self.multi_buffer.push(request);
            return Ok(ResultCode::SUCCESS);
        }
        if self.settings.dry_run {
            self.reporter
                .comment(&format!("dry run: not modifying entry {}", record.dn));
            return Ok(ResultCode::SUCCESS);
        }

        self.reporter
            .comment(&format!("Modifying entry {}", record.dn));
        let echo = ChangeRecord::Modify(record.clone());
        self.reporter.echo_record(&echo);

        let result = self.dispatch(&request).await;
        self.reporter.result(&result);
        self.check_result(result, &echo)
    }

    async fn do_modify_dn(&mut self, record: &ModifyDnRecord) -> Result<ResultCode, Abort> {
        let request = compose::modify_dn_request(record, &self.sets.modify_dn);

        if self.settings.multi_update_error_behavior.is_some() {
            self.reporter.comment(&format!(
                "Buffered the modify DN of entry {} for the multi-update request",
                record.dn
            ));
            self.multi_buffer.push(request);
            return Ok(ResultCode::SUCCESS);
        }

        // The new DN is derived locally when possible; a malformed DN does
        // not block dispatch since the server may apply its own handling.
        let action = if record.new_superior.is_some() {
            "Moving"
        } else {
            "Renaming"
        };
        let destination = match record.new_dn() {
            Some(new_dn) => format!("{} entry {} to {}", action, record.dn, new_dn),
            None => format!("{} entry {}", action, record.dn),
        };

        if self.settings.dry_run {
            self.reporter
                .comment(&format!("dry run: not {}", lowercase_first(&destination)));
            return Ok(ResultCode::SUCCESS);
        }

        self.reporter.comment(&destination);
        let echo = ChangeRecord::ModifyDn(record.clone());
        self.reporter.echo_record(&echo);

        let result = self.dispatch(&request).await;
        self.reporter.result(&result);
        self.check_result(result, &echo)
    }
}

/// Renders bytes as text when printable, colon-separated hex otherwise.
fn printable_bytes(bytes: &[u8]) -> String {
    if !bytes.is_empty() && bytes.iter().all(|&b| (0x20..0x7F).contains(&b)) {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
