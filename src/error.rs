use std::fmt;

use thiserror::Error;

use crate::native::NativeError;

/// Backend-independent error taxonomy surfaced by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed SQL.
    Syntax,
    /// Referenced table, view or sequence does not exist.
    NoSuchTable,
    /// Referenced column does not exist.
    NoSuchField,
    /// Object being created already exists.
    AlreadyExists,
    DivZero,
    InvalidNumber,
    /// Integrity constraint violated.
    Constraint,
    ConnectFailed,
    /// No service identifier could be resolved.
    ConfigMissing,
    /// Operation not supported by this backend or cursor variant.
    Unsupported,
    /// Cursor, statement or session was already released.
    AlreadyFreed,
    /// Generic driver-level failure (misuse, statement creation, descriptor allocation).
    Generic,
    /// Native failure whose code is not in the translation table.
    Unclassified,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::NoSuchTable => "no such table",
            ErrorKind::NoSuchField => "no such field",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::DivZero => "division by zero",
            ErrorKind::InvalidNumber => "invalid number",
            ErrorKind::Constraint => "constraint violation",
            ErrorKind::ConnectFailed => "connect failed",
            ErrorKind::ConfigMissing => "configuration missing",
            ErrorKind::Unsupported => "unsupported operation",
            ErrorKind::AlreadyFreed => "resource already freed",
            ErrorKind::Generic => "error",
            ErrorKind::Unclassified => "unknown error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum SqlMiddlewareDbError {
    /// A native call failed; `kind` is the translated category.
    #[error("{kind} [ORA-{code:05}]: {message}{}", context_suffix(.context))]
    Native {
        kind: ErrorKind,
        code: i32,
        message: String,
        context: Option<String>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Resource already freed: {0}")]
    AlreadyFreed(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Result conversion error: {0}")]
    ConversionError(String),

    #[error(transparent)]
    LobIo(#[from] std::io::Error),

    #[error(transparent)]
    RecordDecode(#[from] serde_json::Error),
}

fn context_suffix(context: &Option<String>) -> String {
    context
        .as_ref()
        .map(|ctx| format!(" ({ctx})"))
        .unwrap_or_default()
}

impl SqlMiddlewareDbError {
    /// Build a caller-visible error from a translated native failure.
    #[must_use]
    pub fn from_native(kind: ErrorKind, native: &NativeError, context: Option<&str>) -> Self {
        SqlMiddlewareDbError::Native {
            kind,
            code: native.code,
            message: native.message.clone(),
            context: context.map(str::to_owned),
        }
    }

    /// Generic category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlMiddlewareDbError::Native { kind, .. } => *kind,
            SqlMiddlewareDbError::ConfigError(_) => ErrorKind::ConfigMissing,
            SqlMiddlewareDbError::Unimplemented(_) => ErrorKind::Unsupported,
            SqlMiddlewareDbError::AlreadyFreed(_) => ErrorKind::AlreadyFreed,
            SqlMiddlewareDbError::ExecutionError(_)
            | SqlMiddlewareDbError::ParameterError(_)
            | SqlMiddlewareDbError::ConversionError(_)
            | SqlMiddlewareDbError::LobIo(_)
            | SqlMiddlewareDbError::RecordDecode(_) => ErrorKind::Generic,
        }
    }

    #[must_use]
    pub fn native_code(&self) -> Option<i32> {
        match self {
            SqlMiddlewareDbError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[must_use]
    pub fn native_message(&self) -> Option<&str> {
        match self {
            SqlMiddlewareDbError::Native { message, .. } => Some(message),
            _ => None,
        }
    }
}
