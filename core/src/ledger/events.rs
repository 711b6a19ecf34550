use serde::Serialize;

use gradeseal_handle::{Category, Handle};
use gradeseal_identity::Identity;

/// Observable ledger transitions, published after they are committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    RecordWritten {
        owner: Identity,
        category: Category,
        handle: Handle,
    },
    ViewerGranted {
        owner: Identity,
        category: Category,
        viewer: Identity,
    },
}
