use crate::{arena::NodeId, value::ValueKind};

/// How bad an error is
///
/// `Fatal` errors are contract violations by the caller, `Critical` errors are policy or
/// input failures that a well behaved caller can run into and recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("node {} belongs to another bank", .0)]
    ForeignNode(NodeId),

    #[error("node {} does not exist", .0)]
    UnknownNode(NodeId),

    #[error("node {} is a {}, expected a record", .node, .kind)]
    NotARecord { node: NodeId, kind: ValueKind },

    #[error("a data point can not hold a value of kind {}", .0)]
    InvalidDataPointKind(ValueKind),

    #[error("primary key {} is reserved for the root", u64::MAX)]
    ReservedPrimaryKey,

    #[error("invalid filter: {}", .0)]
    InvalidFilter(&'static str),

    #[error("can not copy node {} into its own subtree", .0)]
    CopyIntoSelf(NodeId),

    #[error("node {} has no parent", .0)]
    Detached(NodeId),

    #[error("invalid config: {}", .0)]
    InvalidConfig(&'static str),

    #[error("invalid value kind bits {:#x}", .0)]
    InvalidKind(u32),

    #[error("value kind {} is disabled for this bank", .0)]
    TypeDisabled(ValueKind),

    #[error("arena exhausted: {} bytes requested, {} of {} bytes used", .requested, .used, .cap)]
    ArenaExhausted { requested: u64, used: u64, cap: u64 },

    #[error("no record with primary key {}", .0)]
    RecordNotFound(u64),

    #[error("bad magic {:#010x}", .0)]
    BadMagic(u32),

    #[error("input too short for a bank header")]
    TruncatedHeader,

    #[error("bad bank header: {}", .0)]
    BadHeader(&'static str),

    #[error("input truncated at offset {}", .0)]
    Truncated(usize),

    #[error("parent record {} of a serialized node does not exist", .0)]
    UnknownParent(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "metrics")]
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::ForeignNode(_)
            | Error::UnknownNode(_)
            | Error::NotARecord { .. }
            | Error::InvalidDataPointKind(_)
            | Error::ReservedPrimaryKey
            | Error::InvalidFilter(_)
            | Error::CopyIntoSelf(_)
            | Error::Detached(_)
            | Error::InvalidConfig(_)
            | Error::InvalidKind(_) => Severity::Fatal,
            _ => Severity::Critical,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// log the error at a level matching its severity, and pass it on
    pub(crate) fn report(self) -> Self {
        match self.severity() {
            Severity::Fatal => tracing::error!(error = %self, "api misuse"),
            Severity::Critical => tracing::warn!(error = %self, "operation failed"),
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities() {
        assert_eq!(Error::ReservedPrimaryKey.severity(), Severity::Fatal);
        assert_eq!(Error::InvalidKind(3).severity(), Severity::Fatal);
        assert_eq!(Error::RecordNotFound(1).severity(), Severity::Critical);
        assert_eq!(Error::TypeDisabled(ValueKind::F32).severity(), Severity::Critical);
        assert!(!Error::Truncated(4).is_fatal());
        assert!(!Error::BadHeader("slot count").is_fatal());
        assert!(Severity::Fatal > Severity::Critical);
    }

    #[test]
    fn messages() {
        assert_eq!(Error::BadMagic(1).to_string(), "bad magic 0x00000001");
        assert_eq!(
            Error::TypeDisabled(ValueKind::String).to_string(),
            "value kind string is disabled for this bank"
        );
    }
}
