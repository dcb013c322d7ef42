use std::fmt;
use std::io;
use std::path::Path;

use crate::error::EidError;

/// Error reported by the command line tools, with the exit status to use.
#[derive(Debug)]
pub struct CliError {
    pub msg: String,
    pub code: i32,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.msg.fmt(f)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Format an I/O failure on a bitstream or pattern file with a suggestion.
pub fn format_io_error(operation: &str, path: &Path, err: &io::Error) -> String {
    use io::ErrorKind::*;
    let suggestion = match err.kind() {
        NotFound => "Check the bitstream and error pattern paths.",
        PermissionDenied => "Check the file permissions.",
        UnexpectedEof => "The file ends in the middle of a record.",
        WriteZero => "Disk may be full.",
        Other if err.raw_os_error() == Some(28) => "Disk may be full.",
        _ => "",
    };
    let msg = format!("Error {operation} '{}': {err}.", path.display());
    if suggestion.is_empty() {
        msg
    } else {
        format!("{msg} {suggestion}")
    }
}

/// Convert an I/O error into a CLI error with context.
pub fn io_cli_error(operation: &str, path: &Path, err: io::Error) -> CliError {
    CliError {
        msg: format_io_error(operation, path, &err),
        code: 7,
        source: Some(Box::new(err)),
    }
}

/// Convert an I/O error into a std::io::Error with context.
pub fn io_error(operation: &str, path: &Path, err: io::Error) -> io::Error {
    io::Error::new(err.kind(), format_io_error(operation, path, &err))
}

/// Simple CLI error from string.
pub fn simple_cli_error(msg: &str) -> CliError {
    CliError {
        msg: msg.to_string(),
        code: 1,
        source: None,
    }
}

/// Convert a library error into a CLI error with a hint.
pub fn eid_cli_error(context: &str, err: EidError) -> CliError {
    CliError {
        msg: format!("{}: {}", context, cli_hint(&err)),
        code: err.exit_code(),
        source: Some(Box::new(err)),
    }
}

/// Return an actionable hint for an error variant.
pub fn cli_hint(err: &EidError) -> String {
    match err {
        EidError::Config(msg) => format!("{msg}. Check the layer setup and pattern files."),
        EidError::IllegalFrameLength { frame, len } => format!(
            "illegal frame length {len} in input frame {frame}. \
             Frame lengths must be 0 or one of the --layers boundaries."
        ),
        EidError::TruncatedFrame { frame, expected, got } => format!(
            "frame {frame} holds {got} of {expected} elements. \
             Check that the bitstream is not corrupted."
        ),
        EidError::Io(io) => format!("{io}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_keep_exit_codes() {
        let e = eid_cli_error("processing", EidError::IllegalFrameLength { frame: 3, len: 7 });
        assert_eq!(e.code, 5);
        assert!(e.msg.contains("--layers"));

        let io = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e = io_cli_error("opening", Path::new("x.g192"), io);
        assert_eq!(e.code, 7);
        assert!(e.msg.contains("x.g192"));
        assert!(e.msg.contains("Check the bitstream"));
    }
}
