use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};

use crate::error::{ErrorKind, SqlMiddlewareDbError};
use crate::native::{LogonRequest, NativeConnection, NativeDriver};
use crate::options::{ConnectionParams, DriverOptions};
use crate::registry::SessionDeregister;

use super::error_map::{ErrorInfo, ErrorSource, error_info};

/// Session-level settings applied right after logon.
pub const SESSION_SETUP: [&str; 2] = [
    "ALTER SESSION SET NLS_DATE_FORMAT='YYYY-MM-DD HH24:MI:SS'",
    "ALTER SESSION SET NLS_NUMERIC_CHARACTERS='. '",
];

/// A driver session over a native client.
///
/// The native session is opened lazily by [`connect`](Self::connect) and
/// reused while the DSN and persistence mode stay the same. Cursors and
/// statements handed out by the session hold a weak link to it; once the
/// session closes or reconnects they report
/// [`ErrorKind::AlreadyFreed`] instead of touching stale handles.
///
/// Dropping a session that is in explicit-transaction mode rolls back
/// pending writes before logging off.
pub struct OciConnection {
    driver: Arc<dyn NativeDriver>,
    pub(crate) native: Option<Box<dyn NativeConnection>>,
    dsn: ConnectionParams,
    connected_dsn: Option<ConnectionParams>,
    opened_persistent: bool,
    pub(crate) options: DriverOptions,
    pub(crate) auto_commit: bool,
    pub(crate) in_transaction: bool,
    pub(crate) uncommitted: usize,
    pub(crate) rollback_on_drop: bool,
    pub(crate) supports_transactions: bool,
    pub(crate) last_query: Option<String>,
    pub(crate) row_limit: usize,
    pub(crate) row_offset: usize,
    registry: Option<(Arc<dyn SessionDeregister>, usize)>,
    liveness: Arc<()>,
}

impl OciConnection {
    #[must_use]
    pub fn new(
        driver: Arc<dyn NativeDriver>,
        dsn: ConnectionParams,
        options: DriverOptions,
    ) -> Self {
        Self {
            driver,
            native: None,
            dsn,
            connected_dsn: None,
            opened_persistent: false,
            options,
            auto_commit: true,
            in_transaction: false,
            uncommitted: 0,
            rollback_on_drop: false,
            supports_transactions: true,
            last_query: None,
            row_limit: 0,
            row_offset: 0,
            registry: None,
            liveness: Arc::new(()),
        }
    }

    /// Deregister from `registry` under `index` when the session closes.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn SessionDeregister>, index: usize) -> Self {
        self.registry = Some((registry, index));
        self
    }

    /// Declare that the backend has no transaction support.
    #[must_use]
    pub fn without_transactions(mut self) -> Self {
        self.supports_transactions = false;
        self
    }

    #[must_use]
    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Options take effect on the next connect, query or fetch.
    pub fn options_mut(&mut self) -> &mut DriverOptions {
        &mut self.options
    }

    #[must_use]
    pub fn dsn(&self) -> &ConnectionParams {
        &self.dsn
    }

    /// Replace the DSN; the next [`connect`](Self::connect) reopens the session.
    pub fn set_dsn(&mut self, dsn: ConnectionParams) {
        self.dsn = dsn;
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.native.is_some()
    }

    #[must_use]
    pub fn auto_commit_enabled(&self) -> bool {
        self.auto_commit
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Writes issued since the last commit or rollback.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.uncommitted
    }

    /// Last query sent (or, with `disable_query`, recorded) by this session.
    #[must_use]
    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// Error triple from the session error state, or the process state when closed.
    #[must_use]
    pub fn error_info(&self, kind: Option<ErrorKind>) -> ErrorInfo {
        match self.native.as_deref() {
            Some(native) => error_info(ErrorSource::Session(native), kind),
            None => error_info(ErrorSource::Process(self.driver.as_ref()), kind),
        }
    }

    pub(crate) fn session_link(&self) -> Weak<()> {
        Arc::downgrade(&self.liveness)
    }

    pub(crate) fn native_mut(
        &mut self,
    ) -> Result<&mut (dyn NativeConnection + 'static), SqlMiddlewareDbError> {
        self.native
            .as_deref_mut()
            .ok_or_else(|| SqlMiddlewareDbError::ExecutionError("session is not connected".into()))
    }

    /// DSN after applying database emulation.
    fn effective_dsn(&self) -> ConnectionParams {
        let mut dsn = self.dsn.clone();
        if self.options.emulate_database
            && let Some(database) = dsn.database.as_deref()
        {
            let prefix = self.options.database_name_prefix.as_deref().unwrap_or("");
            dsn.username = format!("{prefix}{database}");
        }
        dsn
    }

    pub(crate) fn do_connect(
        &self,
        username: &str,
        password: &str,
        persistent: bool,
    ) -> Result<Box<dyn NativeConnection>, SqlMiddlewareDbError> {
        let service = self.dsn.resolve_service()?;
        let request = LogonRequest {
            username,
            password,
            service: &service,
            persistent,
            home: self.options.home.as_deref(),
        };
        self.driver.logon(&request).map_err(|err| {
            SqlMiddlewareDbError::from_native(ErrorKind::ConnectFailed, &err, Some("connect"))
        })
    }

    /// Open the session, or keep the current one if nothing relevant changed.
    ///
    /// # Errors
    /// Returns `ConfigError` if no service identifier resolves, a
    /// `ConnectFailed` error if the logon fails, or the error of a failed
    /// session setup statement (the session is closed again in that case).
    pub fn connect(&mut self) -> Result<(), SqlMiddlewareDbError> {
        let dsn = self.effective_dsn();
        if self.native.is_some() {
            if self.connected_dsn.as_ref() == Some(&dsn)
                && self.opened_persistent == self.options.persistent
            {
                return Ok(());
            }
            self.close()?;
        }

        let persistent = self.options.persistent;
        let native = self.do_connect(&dsn.username, &dsn.password, persistent)?;
        info!(user = %dsn.username, persistent, "session opened");
        self.native = Some(native);
        self.connected_dsn = Some(dsn);
        self.opened_persistent = persistent;

        for statement in SESSION_SETUP {
            if let Err(err) = self.do_query(statement, true) {
                self.release_native();
                return Err(err);
            }
        }
        // session settings are not pending writes
        self.uncommitted = 0;
        Ok(())
    }

    /// Close the session, rolling back pending explicit-mode writes first.
    ///
    /// A failed rollback is returned and leaves the session open.
    ///
    /// # Errors
    /// Returns the rollback error, if any.
    pub fn close(&mut self) -> Result<(), SqlMiddlewareDbError> {
        if self.native.is_none() {
            return Ok(());
        }
        if self.supports_transactions && !self.auto_commit {
            self.rollback()?;
        }
        self.release_native();
        Ok(())
    }

    fn release_native(&mut self) {
        if let Some(mut native) = self.native.take()
            && let Err(err) = native.logoff()
        {
            warn!(error = %err, "logoff failed");
        }
        self.uncommitted = 0;
        self.connected_dsn = None;
        // invalidate cursors and statements of the old session
        self.liveness = Arc::new(());
        if let Some((registry, index)) = &self.registry {
            registry.deregister(*index);
        }
        info!("session closed");
    }

    /// Open an independent session with other credentials.
    ///
    /// The returned session shares driver, service and options but none of
    /// this session's state. The caller closes it.
    ///
    /// # Errors
    /// Returns the connect error of the new session.
    pub fn standalone_connect(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<OciConnection, SqlMiddlewareDbError> {
        let mut dsn = self.dsn.clone();
        dsn.username = username.into();
        dsn.password = password.into();
        dsn.database = None;
        let mut options = self.options.clone();
        options.emulate_database = false;
        let mut standalone = OciConnection::new(Arc::clone(&self.driver), dsn, options);
        standalone.connect()?;
        debug!(user = %standalone.dsn.username, "standalone session opened");
        Ok(standalone)
    }
}

impl fmt::Debug for OciConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OciConnection")
            .field("username", &self.dsn.username)
            .field("connected", &self.native.is_some())
            .field("auto_commit", &self.auto_commit)
            .field("uncommitted", &self.uncommitted)
            .finish_non_exhaustive()
    }
}

impl Drop for OciConnection {
    fn drop(&mut self) {
        if self.native.is_none() {
            return;
        }
        if self.rollback_on_drop && !self.auto_commit && self.uncommitted > 0 {
            if let Some(native) = self.native.as_deref_mut() {
                match native.rollback() {
                    Ok(()) => debug!(pending = self.uncommitted, "rolled back on drop"),
                    Err(err) => warn!(error = %err, "rollback on drop failed"),
                }
            }
        }
        self.release_native();
    }
}
