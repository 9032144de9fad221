use serde::{Deserialize, Serialize};

use crate::error::SqlMiddlewareDbError;
use crate::types::FetchMode;

/// Environment variable consulted when the DSN carries no service identifier.
pub const SERVICE_ENV_VAR: &str = "ORACLE_SID";

/// Connection parameters (the DSN) a session is opened with.
///
/// Two sessions are interchangeable only when these compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Service identifier (SID) of the target instance.
    #[serde(default)]
    pub hostspec: Option<String>,
    /// Logical database name; with `emulate_database` it selects the schema user.
    #[serde(default)]
    pub database: Option<String>,
}

impl ConnectionParams {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hostspec: None,
            database: None,
        }
    }

    #[must_use]
    pub fn with_hostspec(mut self, hostspec: impl Into<String>) -> Self {
        self.hostspec = Some(hostspec.into());
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Service identifier from the DSN, falling back to `ORACLE_SID`.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` if neither source yields a non-empty value.
    pub fn resolve_service(&self) -> Result<String, SqlMiddlewareDbError> {
        let sid = match self.hostspec.as_deref() {
            Some(host) => host.to_owned(),
            None => std::env::var(SERVICE_ENV_VAR).unwrap_or_default(),
        };
        if sid.trim().is_empty() {
            return Err(SqlMiddlewareDbError::ConfigError(
                "it was not specified a valid Oracle Service Identifier (SID)".into(),
            ));
        }
        Ok(sid)
    }
}

/// Portability adjustments applied to fetched rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Portability {
    /// Lower-case column names in mapped rows and column listings.
    pub lowercase: bool,
    /// Strip trailing whitespace from text values.
    pub rtrim: bool,
}

/// Driver option store.
///
/// Loads from JSON with defaults for every missing key:
/// ```rust
/// use sql_middleware_oci::options::DriverOptions;
///
/// let opts = DriverOptions::from_json(r#"{ "lob_buffer_length": 4096 }"#).unwrap();
/// assert_eq!(opts.lob_buffer_length, 4096);
/// assert!(opts.result_buffering);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    /// Record queries without sending them to the server.
    pub disable_query: bool,
    pub portability: Portability,
    pub fetch_mode: FetchMode,
    /// Bytes per large-object write.
    pub lob_buffer_length: usize,
    pub persistent: bool,
    /// Queries return buffered (seekable, countable) cursors when set.
    pub result_buffering: bool,
    pub dba_username: Option<String>,
    pub dba_password: Option<String>,
    pub database_name_prefix: Option<String>,
    pub emulate_database: bool,
    /// Client installation directory passed to the native logon.
    pub home: Option<String>,
    /// Sequence naming pattern; `%s` is replaced by the logical name.
    pub seqname_format: String,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            disable_query: false,
            portability: Portability::default(),
            fetch_mode: FetchMode::Ordered,
            lob_buffer_length: 8192,
            persistent: false,
            result_buffering: true,
            dba_username: None,
            dba_password: None,
            database_name_prefix: None,
            emulate_database: true,
            home: None,
            seqname_format: "%s_seq".into(),
        }
    }
}

impl DriverOptions {
    /// Parse options from a JSON document.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::RecordDecode` if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, SqlMiddlewareDbError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    #[must_use]
    pub fn result_buffering(mut self, buffered: bool) -> Self {
        self.result_buffering = buffered;
        self
    }

    #[must_use]
    pub fn disable_query(mut self, disabled: bool) -> Self {
        self.disable_query = disabled;
        self
    }

    #[must_use]
    pub fn portability(mut self, portability: Portability) -> Self {
        self.portability = portability;
        self
    }

    #[must_use]
    pub fn fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = mode;
        self
    }

    #[must_use]
    pub fn lob_buffer_length(mut self, len: usize) -> Self {
        self.lob_buffer_length = len.max(1);
        self
    }

    #[must_use]
    pub fn dba_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.dba_username = Some(username.into());
        self.dba_password = Some(password.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostspec_wins_over_environment() {
        let params = ConnectionParams::new("scott", "tiger").with_hostspec("ORCL");
        assert_eq!(params.resolve_service().unwrap(), "ORCL");
    }

    #[test]
    fn blank_hostspec_is_a_config_error() {
        let params = ConnectionParams::new("scott", "tiger").with_hostspec("  ");
        let err = params.resolve_service().unwrap_err();
        assert!(matches!(err, SqlMiddlewareDbError::ConfigError(_)));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts = DriverOptions::from_json(
            r#"{ "portability": { "rtrim": true }, "fetch_mode": "mapped", "persistent": true }"#,
        )
        .unwrap();
        assert!(opts.portability.rtrim);
        assert!(!opts.portability.lowercase);
        assert_eq!(opts.fetch_mode, FetchMode::Mapped);
        assert!(opts.persistent);
        assert_eq!(opts.lob_buffer_length, 8192);
        assert_eq!(opts.seqname_format, "%s_seq");
    }
}
