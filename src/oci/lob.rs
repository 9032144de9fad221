//! Large-object sources and chunked streaming into server descriptors.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::SqlMiddlewareDbError;
use crate::native::{LobDescriptor, LobKind};
use crate::types::RowValues;

use super::error_map::translate;

/// Scheme whose references are opened from the local filesystem.
pub const FILE_SCHEME: &str = "file://";

/// Stream shared with the caller. The driver reads from it but never closes it.
pub type SharedReader = Arc<Mutex<dyn Read + Send>>;

/// Value bound to a prepared-statement parameter.
#[derive(Clone)]
pub enum ParamValue {
    Null,
    Value(RowValues),
    /// Open stream for a large-object parameter.
    Stream(SharedReader),
}

impl std::fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Null => f.write_str("Null"),
            ParamValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ParamValue::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

pub(crate) enum LobSource {
    Shared(SharedReader),
    /// Opened for this execution; closed when dropped.
    Owned(File),
}

impl LobSource {
    /// Resolve where a large-object value is read from.
    pub(crate) fn open(value: &ParamValue) -> Result<Self, SqlMiddlewareDbError> {
        let bytes = match value {
            ParamValue::Stream(reader) => return Ok(LobSource::Shared(Arc::clone(reader))),
            ParamValue::Null => Vec::new(),
            ParamValue::Value(RowValues::Text(text)) => {
                if let Some(path) = text.strip_prefix(FILE_SCHEME) {
                    debug!(path, "opening large-object source file");
                    return Ok(LobSource::Owned(File::open(path)?));
                }
                text.as_bytes().to_vec()
            }
            ParamValue::Value(RowValues::Blob(bytes)) => bytes.clone(),
            ParamValue::Value(RowValues::JSON(json)) => json.to_string().into_bytes(),
            ParamValue::Value(other) => match other.to_json() {
                serde_json::Value::String(text) => text.into_bytes(),
                json => json.to_string().into_bytes(),
            },
        };
        let mut file = tempfile::tempfile()?;
        file.write_all(&bytes)?;
        file.rewind()?;
        Ok(LobSource::Owned(file))
    }
}

/// One large-object parameter of an execution.
pub(crate) struct LobBinding {
    pub(crate) name: String,
    pub(crate) kind: LobKind,
    pub(crate) descriptor: Box<dyn LobDescriptor>,
    pub(crate) source: LobSource,
}

impl LobBinding {
    /// Copy the source into the descriptor `chunk` bytes at a time.
    pub(crate) fn stream(&mut self, chunk: usize) -> Result<usize, SqlMiddlewareDbError> {
        let written = match &mut self.source {
            LobSource::Owned(file) => write_chunks(file, self.descriptor.as_mut(), chunk)?,
            LobSource::Shared(reader) => {
                let mut guard = reader.lock().map_err(|_| {
                    SqlMiddlewareDbError::ExecutionError(format!(
                        "stream for LOB parameter {} is poisoned",
                        self.name
                    ))
                })?;
                write_chunks(&mut *guard, self.descriptor.as_mut(), chunk)?
            }
        };
        debug!(param = %self.name, kind = ?self.kind, bytes = written, "streamed large object");
        Ok(written)
    }
}

fn write_chunks(
    reader: &mut dyn Read,
    descriptor: &mut dyn LobDescriptor,
    chunk: usize,
) -> Result<usize, SqlMiddlewareDbError> {
    let mut buf = Vec::with_capacity(chunk);
    let mut total = 0;
    loop {
        buf.clear();
        let read = (&mut *reader).take(chunk as u64).read_to_end(&mut buf)?;
        if read == 0 {
            break;
        }
        descriptor
            .write(&buf)
            .map_err(|err| translate(&err, Some("lob write")))?;
        total += read;
        if read < chunk {
            break;
        }
    }
    Ok(total)
}

/// Stream every binding in order, stopping at the first failure.
pub(crate) fn stream_all(
    bindings: &mut [LobBinding],
    chunk: usize,
) -> Result<(), SqlMiddlewareDbError> {
    for binding in bindings {
        binding.stream(chunk)?;
    }
    Ok(())
}

/// Free every descriptor and close sources opened for this execution.
pub(crate) fn release_all(bindings: Vec<LobBinding>) {
    for mut binding in bindings {
        binding.descriptor.free();
        if matches!(binding.source, LobSource::Owned(_)) {
            debug!(param = %binding.name, "closing large-object source");
        }
    }
}
