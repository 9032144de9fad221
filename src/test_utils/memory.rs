//! Scripted in-memory implementation of the native client traits.
//!
//! Results are scripted per exact SQL text. Every call the driver makes is
//! recorded so tests can assert on logons, executed statements and their
//! commit modes, binds, and large-object contents. Failures can be injected
//! at each native call the driver makes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::native::{
    BindValue, CommitMode, LobDescriptor, LobKind, LogonRequest, NativeConnection, NativeCursor,
    NativeDriver, NativeError, NativeStatement,
};
use crate::types::RowValues;

/// Error code the engine reports for an unscripted select.
pub const NO_SUCH_TABLE: i32 = 942;

#[derive(Debug, Clone)]
enum Script {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<RowValues>>,
    },
    Affected(usize),
    Error(NativeError),
}

/// A logon the driver performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonRecord {
    pub username: String,
    pub password: String,
    pub service: String,
    pub persistent: bool,
    pub home: Option<String>,
}

/// Value a placeholder was bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Null,
    Scalar(RowValues),
    Lob { locator: u64, kind: LobKind },
}

/// One bind-by-name call.
#[derive(Debug, Clone, PartialEq)]
pub struct BindRecord {
    pub sql: String,
    pub name: String,
    pub value: BoundValue,
}

/// A large-object descriptor and everything written into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobRecord {
    pub locator: u64,
    pub kind: LobKind,
    pub data: Vec<u8>,
    pub chunks: usize,
    pub freed: bool,
}

#[derive(Debug, Default)]
struct Failures {
    logon: Option<NativeError>,
    parse: HashSet<String>,
    commit: Option<NativeError>,
    rollback: Option<NativeError>,
    descriptor_alloc: bool,
    /// 1-based index over all large-object writes.
    lob_write_on: Option<usize>,
    bind_on: Option<String>,
}

#[derive(Debug, Default)]
struct EngineState {
    scripts: HashMap<String, VecDeque<Script>>,
    failures: Failures,
    logons: Vec<LogonRecord>,
    logoffs: usize,
    executed: Vec<(String, CommitMode)>,
    commits: usize,
    rollbacks: usize,
    binds: Vec<BindRecord>,
    lobs: Vec<LobRecord>,
    lob_writes: usize,
    fetches: usize,
    cursors_freed: usize,
    statements_freed: usize,
    last_error: Option<NativeError>,
}

impl EngineState {
    fn fail(&mut self, err: NativeError) -> NativeError {
        self.last_error = Some(err.clone());
        err
    }

    /// Next scripted result for `sql`; the last script for a query repeats.
    fn next_script(&mut self, sql: &str) -> Script {
        if let Some(queue) = self.scripts.get_mut(sql) {
            if queue.len() > 1
                && let Some(script) = queue.pop_front()
            {
                return script;
            }
            if let Some(script) = queue.front() {
                return script.clone();
            }
        }
        let head = sql.trim_start().to_ascii_uppercase();
        if head.starts_with("SELECT") || head.starts_with("WITH") {
            Script::Error(NativeError::new(
                NO_SUCH_TABLE,
                "ORA-00942: table or view does not exist",
            ))
        } else {
            Script::Affected(0)
        }
    }
}

type Shared = Arc<Mutex<EngineState>>;

fn lock(state: &Shared) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a scripted engine; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    state: Shared,
}

impl MemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The engine as the trait object the driver consumes.
    #[must_use]
    pub fn into_driver(self) -> Arc<dyn NativeDriver> {
        Arc::new(self)
    }

    fn push_script(&self, sql: &str, script: Script) {
        lock(&self.state)
            .scripts
            .entry(sql.to_owned())
            .or_default()
            .push_back(script);
    }

    /// Script `sql` to return `rows` under `columns`.
    pub fn script_rows(&self, sql: &str, columns: &[&str], rows: Vec<Vec<RowValues>>) {
        self.push_script(
            sql,
            Script::Rows {
                columns: columns.iter().map(|c| (*c).to_owned()).collect(),
                rows,
            },
        );
    }

    pub fn script_affected(&self, sql: &str, affected: usize) {
        self.push_script(sql, Script::Affected(affected));
    }

    /// Script `sql` to fail at execution with `code`.
    pub fn script_error(&self, sql: &str, code: i32, message: &str) {
        self.push_script(sql, Script::Error(NativeError::new(code, message)));
    }

    pub fn fail_logon(&self, code: i32, message: &str) {
        lock(&self.state).failures.logon = Some(NativeError::new(code, message));
    }

    pub fn fail_parse(&self, sql: &str) {
        lock(&self.state).failures.parse.insert(sql.to_owned());
    }

    pub fn fail_commit(&self, code: i32, message: &str) {
        lock(&self.state).failures.commit = Some(NativeError::new(code, message));
    }

    pub fn fail_rollback(&self, code: i32, message: &str) {
        lock(&self.state).failures.rollback = Some(NativeError::new(code, message));
    }

    pub fn fail_descriptor_alloc(&self) {
        lock(&self.state).failures.descriptor_alloc = true;
    }

    /// Fail the `nth` large-object write (1-based, counted across descriptors).
    pub fn fail_lob_write_on(&self, nth: usize) {
        lock(&self.state).failures.lob_write_on = Some(nth);
    }

    pub fn fail_bind_on(&self, name: &str) {
        lock(&self.state).failures.bind_on = Some(name.to_owned());
    }

    pub fn clear_failures(&self) {
        lock(&self.state).failures = Failures::default();
    }

    #[must_use]
    pub fn logon_count(&self) -> usize {
        lock(&self.state).logons.len()
    }

    #[must_use]
    pub fn logons(&self) -> Vec<LogonRecord> {
        lock(&self.state).logons.clone()
    }

    #[must_use]
    pub fn logoff_count(&self) -> usize {
        lock(&self.state).logoffs
    }

    /// Executed statements with the commit mode they ran under.
    #[must_use]
    pub fn executed(&self) -> Vec<(String, CommitMode)> {
        lock(&self.state).executed.clone()
    }

    /// Executed statements other than the session setup ones.
    #[must_use]
    pub fn executed_sql(&self) -> Vec<String> {
        lock(&self.state)
            .executed
            .iter()
            .filter(|(sql, _)| !sql.starts_with("ALTER SESSION"))
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    #[must_use]
    pub fn commit_count(&self) -> usize {
        lock(&self.state).commits
    }

    #[must_use]
    pub fn rollback_count(&self) -> usize {
        lock(&self.state).rollbacks
    }

    #[must_use]
    pub fn binds(&self) -> Vec<BindRecord> {
        lock(&self.state).binds.clone()
    }

    #[must_use]
    pub fn lobs(&self) -> Vec<LobRecord> {
        lock(&self.state).lobs.clone()
    }

    /// Native row fetches, including rows skipped for an offset.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        lock(&self.state).fetches
    }

    #[must_use]
    pub fn cursors_freed(&self) -> usize {
        lock(&self.state).cursors_freed
    }

    #[must_use]
    pub fn statements_freed(&self) -> usize {
        lock(&self.state).statements_freed
    }
}

impl NativeDriver for MemoryDriver {
    fn logon(&self, request: &LogonRequest<'_>) -> Result<Box<dyn NativeConnection>, NativeError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.failures.logon.clone() {
            return Err(state.fail(err));
        }
        state.logons.push(LogonRecord {
            username: request.username.to_owned(),
            password: request.password.to_owned(),
            service: request.service.to_owned(),
            persistent: request.persistent,
            home: request.home.map(str::to_owned),
        });
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
        }))
    }

    fn last_error(&self) -> Option<NativeError> {
        lock(&self.state).last_error.clone()
    }
}

struct MemoryConnection {
    state: Shared,
}

impl NativeConnection for MemoryConnection {
    fn parse(&mut self, sql: &str) -> Result<Box<dyn NativeStatement>, NativeError> {
        let mut state = lock(&self.state);
        if state.failures.parse.contains(sql) {
            return Err(state.fail(NativeError::new(900, "ORA-00900: invalid SQL statement")));
        }
        Ok(Box::new(MemoryStatement {
            state: Arc::clone(&self.state),
            sql: sql.to_owned(),
            row_count: 0,
            pending: None,
        }))
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.failures.commit.clone() {
            return Err(state.fail(err));
        }
        state.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.failures.rollback.clone() {
            return Err(state.fail(err));
        }
        state.rollbacks += 1;
        Ok(())
    }

    fn new_lob_descriptor(
        &mut self,
        kind: LobKind,
    ) -> Result<Box<dyn LobDescriptor>, NativeError> {
        let mut state = lock(&self.state);
        if state.failures.descriptor_alloc {
            return Err(state.fail(NativeError::new(
                22275,
                "ORA-22275: invalid LOB locator specified",
            )));
        }
        let locator = state.lobs.len() as u64 + 1;
        state.lobs.push(LobRecord {
            locator,
            kind,
            data: Vec::new(),
            chunks: 0,
            freed: false,
        });
        Ok(Box::new(MemoryLob {
            state: Arc::clone(&self.state),
            locator,
        }))
    }

    fn last_error(&self) -> Option<NativeError> {
        lock(&self.state).last_error.clone()
    }

    fn logoff(&mut self) -> Result<(), NativeError> {
        lock(&self.state).logoffs += 1;
        Ok(())
    }
}

struct MemoryStatement {
    state: Shared,
    sql: String,
    row_count: usize,
    pending: Option<MemoryCursor>,
}

impl NativeStatement for MemoryStatement {
    fn bind_by_name(&mut self, name: &str, value: BindValue<'_>) -> Result<(), NativeError> {
        let mut state = lock(&self.state);
        if state.failures.bind_on.as_deref() == Some(name) {
            return Err(state.fail(NativeError::new(
                1036,
                format!("ORA-01036: illegal variable name/number :{name}"),
            )));
        }
        let value = match value {
            BindValue::Null => BoundValue::Null,
            BindValue::Scalar(value) => BoundValue::Scalar(value.clone()),
            BindValue::Lob(descriptor, kind) => BoundValue::Lob {
                locator: descriptor.locator(),
                kind,
            },
        };
        state.binds.push(BindRecord {
            sql: self.sql.clone(),
            name: name.to_owned(),
            value,
        });
        Ok(())
    }

    fn execute(&mut self, mode: CommitMode) -> Result<(), NativeError> {
        let mut state = lock(&self.state);
        state.executed.push((self.sql.clone(), mode));
        self.pending = None;
        match state.next_script(&self.sql) {
            Script::Rows { columns, rows } => {
                self.row_count = 0;
                self.pending = Some(MemoryCursor {
                    state: Arc::clone(&self.state),
                    columns,
                    rows: rows.into(),
                });
                Ok(())
            }
            Script::Affected(n) => {
                self.row_count = n;
                Ok(())
            }
            Script::Error(err) => Err(state.fail(err)),
        }
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn take_cursor(&mut self) -> Result<Box<dyn NativeCursor>, NativeError> {
        match self.pending.take() {
            Some(cursor) => Ok(Box::new(cursor)),
            None => Err(lock(&self.state).fail(NativeError::new(
                24338,
                "ORA-24338: statement handle not executed",
            ))),
        }
    }

    fn free(&mut self) {
        lock(&self.state).statements_freed += 1;
    }
}

struct MemoryCursor {
    state: Shared,
    columns: Vec<String>,
    rows: VecDeque<Vec<RowValues>>,
}

impl NativeCursor for MemoryCursor {
    fn fetch_row(&mut self) -> Result<Option<Vec<RowValues>>, NativeError> {
        lock(&self.state).fetches += 1;
        Ok(self.rows.pop_front())
    }

    fn num_cols(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> Option<String> {
        self.columns.get(index).cloned()
    }

    fn free(&mut self) -> Result<(), NativeError> {
        lock(&self.state).cursors_freed += 1;
        Ok(())
    }
}

struct MemoryLob {
    state: Shared,
    locator: u64,
}

impl LobDescriptor for MemoryLob {
    fn locator(&self) -> u64 {
        self.locator
    }

    fn write(&mut self, chunk: &[u8]) -> Result<usize, NativeError> {
        let mut state = lock(&self.state);
        state.lob_writes += 1;
        if state.failures.lob_write_on == Some(state.lob_writes) {
            return Err(state.fail(NativeError::new(
                22990,
                "ORA-22990: LOB locators cannot span transactions",
            )));
        }
        let Some(record) = state.lobs.iter_mut().find(|lob| lob.locator == self.locator) else {
            return Err(NativeError::new(22275, "ORA-22275: invalid LOB locator specified"));
        };
        record.data.extend_from_slice(chunk);
        record.chunks += 1;
        Ok(chunk.len())
    }

    fn free(&mut self) {
        let mut state = lock(&self.state);
        if let Some(record) = state.lobs.iter_mut().find(|lob| lob.locator == self.locator) {
            record.freed = true;
        }
    }
}
