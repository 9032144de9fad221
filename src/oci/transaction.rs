use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::error::SqlMiddlewareDbError;

use super::connection::OciConnection;
use super::error_map::translate;

impl OciConnection {
    /// Switch between autocommit and explicit-transaction mode.
    ///
    /// Leaving explicit mode commits pending writes first; the mode stays
    /// explicit if that commit fails. Entering explicit mode arms the
    /// rollback-on-drop guarantee.
    ///
    /// # Errors
    /// Returns the commit error when leaving explicit mode fails.
    pub fn auto_commit(&mut self, on: bool) -> Result<(), SqlMiddlewareDbError> {
        if self.auto_commit == on {
            return Ok(());
        }
        if on {
            if self.native.is_some() {
                self.commit()?;
            }
        } else {
            self.rollback_on_drop = true;
        }
        debug!(auto_commit = on, "transaction mode changed");
        self.auto_commit = on;
        self.in_transaction = !on;
        Ok(())
    }

    fn check_explicit_mode(&self, op: &str) -> Result<(), SqlMiddlewareDbError> {
        if !self.supports_transactions {
            return Err(SqlMiddlewareDbError::Unimplemented(format!(
                "{op}: transactions are not in use"
            )));
        }
        if self.auto_commit {
            return Err(SqlMiddlewareDbError::ExecutionError(format!(
                "{op}: transaction changes are being auto committed"
            )));
        }
        Ok(())
    }

    /// Commit pending writes.
    ///
    /// # Errors
    /// Fails with `Unimplemented` without transaction support, with
    /// `ExecutionError` in autocommit mode, or with the translated native
    /// error. The pending counter is left untouched on failure.
    pub fn commit(&mut self) -> Result<(), SqlMiddlewareDbError> {
        self.check_explicit_mode("commit")?;
        if self.uncommitted > 0 {
            let native = self.native_mut()?;
            if let Err(err) = native.commit() {
                return Err(translate(&err, Some("commit")));
            }
            debug!(writes = self.uncommitted, "committed");
            self.uncommitted = 0;
        }
        Ok(())
    }

    /// Roll back pending writes.
    ///
    /// # Errors
    /// Same failure modes as [`commit`](Self::commit).
    pub fn rollback(&mut self) -> Result<(), SqlMiddlewareDbError> {
        self.check_explicit_mode("rollback")?;
        if self.uncommitted > 0 {
            let native = self.native_mut()?;
            if let Err(err) = native.rollback() {
                return Err(translate(&err, Some("rollback")));
            }
            debug!(writes = self.uncommitted, "rolled back");
            self.uncommitted = 0;
        }
        Ok(())
    }

    /// Enter explicit-transaction mode for the lifetime of the returned guard.
    ///
    /// ```rust
    /// use sql_middleware_oci::prelude::*;
    ///
    /// fn double_salaries(conn: &mut OciConnection) -> Result<(), SqlMiddlewareDbError> {
    ///     let mut tx = conn.begin()?;
    ///     tx.exec("UPDATE emp SET sal = sal * 2")?;
    ///     tx.exec("INSERT INTO audit (what) VALUES ('raise')")?;
    ///     tx.commit()
    /// }
    /// # let _ = double_salaries;
    /// ```
    ///
    /// # Errors
    /// Returns `Unimplemented` when the backend has no transaction support.
    pub fn begin(&mut self) -> Result<ExplicitTransaction<'_>, SqlMiddlewareDbError> {
        if !self.supports_transactions {
            return Err(SqlMiddlewareDbError::Unimplemented(
                "begin: transactions are not in use".into(),
            ));
        }
        let restore_auto_commit = self.auto_commit;
        self.auto_commit(false)?;
        Ok(ExplicitTransaction {
            conn: self,
            restore_auto_commit,
            finished: false,
        })
    }
}

/// Scoped explicit transaction.
///
/// Dereferences to the session, so queries and prepared statements run
/// through it. Dropping an unfinished guard rolls back; the previous
/// autocommit mode is restored only after a successful commit or rollback.
pub struct ExplicitTransaction<'a> {
    conn: &'a mut OciConnection,
    restore_auto_commit: bool,
    finished: bool,
}

impl ExplicitTransaction<'_> {
    /// # Errors
    /// Returns the commit error; the guard then rolls back on drop.
    pub fn commit(mut self) -> Result<(), SqlMiddlewareDbError> {
        self.conn.commit()?;
        self.finish()
    }

    /// # Errors
    /// Returns the rollback error.
    pub fn rollback(mut self) -> Result<(), SqlMiddlewareDbError> {
        self.conn.rollback()?;
        self.finish()
    }

    fn finish(&mut self) -> Result<(), SqlMiddlewareDbError> {
        self.finished = true;
        if self.restore_auto_commit {
            // nothing is pending, so this cannot reach the server
            self.conn.auto_commit(true)?;
        }
        Ok(())
    }
}

impl Deref for ExplicitTransaction<'_> {
    type Target = OciConnection;

    fn deref(&self) -> &Self::Target {
        self.conn
    }
}

impl DerefMut for ExplicitTransaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
    }
}

impl Drop for ExplicitTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.rollback() {
            Ok(()) => {
                if self.restore_auto_commit
                    && let Err(err) = self.conn.auto_commit(true)
                {
                    warn!(error = %err, "restoring autocommit after rollback failed");
                }
            }
            Err(err) => warn!(error = %err, "rollback of abandoned transaction failed"),
        }
    }
}
