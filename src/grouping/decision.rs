use crate::classifier::GroupingVerdict;

/// What to do with a freshly captured tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Keep appending to the active session.
    Continue,
    /// Reopen an ended session and append the tab to it.
    Merge {
        session_id: String,
        label: Option<String>,
    },
    /// Start a fresh session.
    CreateNew { suggested_label: Option<String> },
    /// Append nothing; optionally adopt `session_id` as the current session.
    NoAction {
        session_id: Option<String>,
        label: Option<String>,
        reason: Option<String>,
    },
}

impl Decision {
    pub fn create_new() -> Self {
        Decision::CreateNew {
            suggested_label: None,
        }
    }
}

impl From<GroupingVerdict> for Decision {
    fn from(verdict: GroupingVerdict) -> Self {
        match verdict {
            GroupingVerdict::Merge { session_id, label } => Decision::Merge { session_id, label },
            GroupingVerdict::CreateNew { suggested_label } => {
                Decision::CreateNew { suggested_label }
            }
            GroupingVerdict::NoAction {
                session_id,
                label,
                reason,
            } => Decision::NoAction {
                session_id,
                label,
                reason,
            },
        }
    }
}
