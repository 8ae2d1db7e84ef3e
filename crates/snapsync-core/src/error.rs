use std::fmt;
use std::io;
use std::path::PathBuf;

/// Machine-readable error codes attached to fatal errors and failed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DirectoryUnreadable,
    DuplicateIdentifier,
    TimestampUnavailable,
    ToolUnavailable,
    ConfigUnreadable,
    ConfigParseError,
    TransferFailed,
    DeleteFailed,
    Timeout,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DirectoryUnreadable => "E1001",
            Self::DuplicateIdentifier => "E1002",
            Self::TimestampUnavailable => "E1003",
            Self::ToolUnavailable => "E2001",
            Self::ConfigUnreadable => "E2101",
            Self::ConfigParseError => "E2102",
            Self::TransferFailed => "E3001",
            Self::DeleteFailed => "E3002",
            Self::Timeout => "E3003",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::DirectoryUnreadable => "Snapshot directory could not be read",
            Self::DuplicateIdentifier => "Duplicate snapshot identifier",
            Self::TimestampUnavailable => "Snapshot creation time unavailable",
            Self::ToolUnavailable => "Storage tool could not be started",
            Self::ConfigUnreadable => "Config file could not be read",
            Self::ConfigParseError => "Config file is not valid TOML for snapsync",
            Self::TransferFailed => "Snapshot transfer failed",
            Self::DeleteFailed => "Snapshot deletion failed",
            Self::Timeout => "External command timed out",
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::DirectoryUnreadable => Some("Check that the directory exists and is readable."),
            Self::DuplicateIdentifier => {
                Some("Rename or remove one of the snapshots sharing the name.")
            }
            Self::TimestampUnavailable => {
                Some("Inspect the entry with `btrfs subvolume show` and retry.")
            }
            Self::ToolUnavailable => Some("Install btrfs-progs or point --btrfs at the binary."),
            Self::ConfigUnreadable => Some("Check the --config path and its permissions."),
            Self::ConfigParseError => {
                Some("Expected [transfer] btrfs/timeout_secs and [reconcile] strict.")
            }
            Self::TransferFailed => {
                Some("Check free space on the destination and that the parent still exists.")
            }
            Self::DeleteFailed => Some("Check permissions on the destination directory."),
            Self::Timeout => Some("Raise --timeout or investigate the stalled transfer."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Fatal errors that stop a run before or during reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to read snapshot directory {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Two entries of one listing share an identifier; matching by name is
    /// meaningless in that case, so nothing is planned.
    #[error("duplicate snapshot identifier '{identifier}' in {}", location.display())]
    DuplicateIdentifier {
        identifier: String,
        location: PathBuf,
    },

    #[error("could not resolve creation time of {}: {reason}", path.display())]
    TimestampUnavailable { path: PathBuf, reason: String },

    #[error("failed to start `{program}`: {source}")]
    ToolUnavailable {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read config {}: {source}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl SyncError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DirectoryUnreadable { .. } => ErrorCode::DirectoryUnreadable,
            Self::DuplicateIdentifier { .. } => ErrorCode::DuplicateIdentifier,
            Self::TimestampUnavailable { .. } => ErrorCode::TimestampUnavailable,
            Self::ToolUnavailable { .. } => ErrorCode::ToolUnavailable,
            Self::ConfigUnreadable { .. } => ErrorCode::ConfigUnreadable,
            Self::ConfigParseError { .. } => ErrorCode::ConfigParseError,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
