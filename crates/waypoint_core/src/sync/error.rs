use crate::model::entity::{EntityId, EntityKind};
use crate::repo::RepoError;
use thiserror::Error;

/// Which side of a reconciliation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSide {
    Local,
    Remote,
}

impl std::fmt::Display for SyncSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Failure of a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Cancellation was observed between units of work. Not a failure.
    #[error("sync cancelled")]
    Cancelled,
    #[error("{side} {kind} store failed{}: {source}", .id.map(|id| format!(" on {id}")).unwrap_or_default())]
    Store {
        side: SyncSide,
        kind: EntityKind,
        id: Option<EntityId>,
        #[source]
        source: RepoError,
    },
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn local(kind: EntityKind, id: Option<EntityId>, source: RepoError) -> Self {
        Self::Store {
            side: SyncSide::Local,
            kind,
            id,
            source,
        }
    }

    pub(crate) fn remote(kind: EntityKind, id: Option<EntityId>, source: RepoError) -> Self {
        Self::Store {
            side: SyncSide::Remote,
            kind,
            id,
            source,
        }
    }
}
