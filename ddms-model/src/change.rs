//! Normalized, queued filesystem changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a normalized filesystem notification asks the index to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Delete,
    Modify,
    /// Relocation to another root-relative path. Rename and move are the
    /// same operation at this level.
    Move {
        dst: String,
    },
}

/// One normalized filesystem change waiting in the coalescing buffer.
///
/// Created by the path normalizer (live notifications) or the walker, held
/// until `not_before` elapses, then consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    pub kind: ChangeKind,
    /// Root-relative source path.
    pub path: String,
    pub enqueued_at: DateTime<Utc>,
}

impl ChangeDescriptor {
    pub fn new(kind: ChangeKind, path: String) -> Self {
        Self {
            kind,
            path,
            enqueued_at: Utc::now(),
        }
    }

    /// The path the descriptor ultimately concerns: the destination for a
    /// move, the source for everything else.
    pub fn effective_path(&self) -> &str {
        match &self.kind {
            ChangeKind::Move { dst } => dst,
            _ => &self.path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_path_prefers_move_destination() {
        let mv = ChangeDescriptor::new(
            ChangeKind::Move {
                dst: "b/x.txt".into(),
            },
            "a/x.txt".into(),
        );
        assert_eq!(mv.effective_path(), "b/x.txt");

        let add = ChangeDescriptor::new(ChangeKind::Add, "a/x.txt".into());
        assert_eq!(add.effective_path(), "a/x.txt");
    }
}
