//! Native error code translation.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::error::{ErrorKind, SqlMiddlewareDbError};
use crate::native::{NativeConnection, NativeDriver, NativeError};

lazy_static! {
    static ref ERROR_CODE_MAP: HashMap<i32, ErrorKind> = [
        (900, ErrorKind::Syntax),
        (904, ErrorKind::NoSuchField),
        (921, ErrorKind::Syntax),
        (923, ErrorKind::Syntax),
        (942, ErrorKind::NoSuchTable),
        (955, ErrorKind::AlreadyExists),
        (1476, ErrorKind::DivZero),
        (1722, ErrorKind::InvalidNumber),
        (2289, ErrorKind::NoSuchTable),
        (2291, ErrorKind::Constraint),
        (2292, ErrorKind::Constraint),
        (2449, ErrorKind::Constraint),
    ]
    .into_iter()
    .collect();
}

/// Where the error state is read from.
pub enum ErrorSource<'a> {
    /// Error raised by a specific handle. Any caller-supplied kind is discarded.
    Handle(&'a NativeError),
    /// Error state of the open session.
    Session(&'a dyn NativeConnection),
    /// Process-level error state, when no session is open.
    Process(&'a dyn NativeDriver),
}

/// `(kind, native code, native message)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub native_code: Option<i32>,
    pub native_message: Option<String>,
}

impl ErrorInfo {
    /// Turn the triple into a caller-visible error.
    #[must_use]
    pub fn into_error(self, context: Option<&str>) -> SqlMiddlewareDbError {
        match (self.native_code, self.native_message) {
            (Some(code), message) => SqlMiddlewareDbError::Native {
                kind: self.kind,
                code,
                message: message.unwrap_or_default(),
                context: context.map(str::to_owned),
            },
            (None, _) => SqlMiddlewareDbError::ExecutionError(format!(
                "{}: {}",
                context.unwrap_or("native call failed"),
                self.kind
            )),
        }
    }
}

/// Generic kind for a native code, if the code is a well-known one.
#[must_use]
pub fn map_code(code: i32) -> Option<ErrorKind> {
    ERROR_CODE_MAP.get(&code).copied()
}

/// Collect error information from `source`.
///
/// `kind` is what the caller already knows about the failure; it is kept
/// unless the error came from a specific handle, in which case the code
/// table decides.
#[must_use]
pub fn error_info(source: ErrorSource<'_>, kind: Option<ErrorKind>) -> ErrorInfo {
    let (native, kind) = match source {
        ErrorSource::Handle(err) => (Some(err.clone()), None),
        ErrorSource::Session(conn) => (conn.last_error(), kind),
        ErrorSource::Process(driver) => (driver.last_error(), kind),
    };
    let kind = kind
        .or_else(|| native.as_ref().and_then(|err| map_code(err.code)))
        .unwrap_or(ErrorKind::Unclassified);
    ErrorInfo {
        kind,
        native_code: native.as_ref().map(|err| err.code),
        native_message: native.map(|err| err.message),
    }
}

/// Translate an error returned by a native handle.
pub(crate) fn translate(err: &NativeError, context: Option<&str>) -> SqlMiddlewareDbError {
    error_info(ErrorSource::Handle(err), None).into_error(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDriver(Option<NativeError>);

    impl NativeDriver for FixedDriver {
        fn logon(
            &self,
            _request: &crate::native::LogonRequest<'_>,
        ) -> Result<Box<dyn NativeConnection>, NativeError> {
            Err(NativeError::new(12154, "could not resolve the connect identifier"))
        }

        fn last_error(&self) -> Option<NativeError> {
            self.0.clone()
        }
    }

    #[test]
    fn well_known_codes_translate() {
        assert_eq!(map_code(900), Some(ErrorKind::Syntax));
        assert_eq!(map_code(942), Some(ErrorKind::NoSuchTable));
        assert_eq!(map_code(2289), Some(ErrorKind::NoSuchTable));
        assert_eq!(map_code(1476), Some(ErrorKind::DivZero));
        assert_eq!(map_code(2292), Some(ErrorKind::Constraint));
        assert_eq!(map_code(1), None);
    }

    #[test]
    fn unknown_codes_are_unclassified_and_unchanged() {
        let err = NativeError::new(1017, "invalid username/password; logon denied");
        let info = error_info(ErrorSource::Handle(&err), None);
        assert_eq!(info.kind, ErrorKind::Unclassified);
        assert_eq!(info.native_code, Some(1017));
        assert_eq!(
            info.native_message.as_deref(),
            Some("invalid username/password; logon denied")
        );
    }

    #[test]
    fn handle_source_discards_caller_kind() {
        let err = NativeError::new(955, "name is already used by an existing object");
        let info = error_info(ErrorSource::Handle(&err), Some(ErrorKind::Generic));
        assert_eq!(info.kind, ErrorKind::AlreadyExists);
    }

    #[test]
    fn process_source_keeps_caller_kind() {
        let driver = FixedDriver(Some(NativeError::new(942, "table or view does not exist")));
        let info = error_info(ErrorSource::Process(&driver), Some(ErrorKind::ConnectFailed));
        assert_eq!(info.kind, ErrorKind::ConnectFailed);
        assert_eq!(info.native_code, Some(942));

        let info = error_info(ErrorSource::Process(&driver), None);
        assert_eq!(info.kind, ErrorKind::NoSuchTable);
    }

    #[test]
    fn missing_error_state_becomes_generic_error() {
        let driver = FixedDriver(None);
        let info = error_info(ErrorSource::Process(&driver), None);
        assert_eq!(info.kind, ErrorKind::Unclassified);
        let err = info.into_error(Some("commit"));
        assert!(matches!(err, SqlMiddlewareDbError::ExecutionError(_)));
    }
}
