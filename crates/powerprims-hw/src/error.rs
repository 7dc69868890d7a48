use std::path::PathBuf;

use powerprims_rpc::RpcError;

use crate::topology::{CpuId, VirtualCoreId};

/// Result type for hardware façade operations.
pub type Result<T> = std::result::Result<T, HwError>;

/// Errors raised by local and remote hardware façades.
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    /// Reading or writing a sysfs/procfs file failed.
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sysfs/procfs file held an unexpected value.
    #[error("unexpected content in {path}: {value:?} ({reason})")]
    Parse {
        path: PathBuf,
        value: String,
        reason: String,
    },

    /// The remote call failed at the transport or protocol level, or the
    /// server reported an error.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("unknown cpu {0}")]
    UnknownCpu(CpuId),

    #[error("unknown virtual core {0}")]
    UnknownVirtualCore(VirtualCoreId),

    #[error("unknown frequency domain {0}")]
    UnknownDomain(u32),

    #[error("virtual core {virtual_core} has no idle level {level}")]
    UnknownIdleLevel { virtual_core: VirtualCoreId, level: u32 },

    /// The machine does not expose what the operation needs.
    #[error("not supported: {0}")]
    Unsupported(String),

    /// A module was activated without the module it depends on.
    #[error("module {module} requires module {requires}")]
    MissingDependency {
        module: &'static str,
        requires: &'static str,
    },

    /// A rollback point could not be re-applied.
    #[error("rollback failed: {0}")]
    Rollback(String),

    /// A background thread could not be started.
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl HwError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(
        path: impl Into<PathBuf>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
