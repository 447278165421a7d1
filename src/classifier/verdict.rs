use serde::Deserialize;
use serde_json::Value;

use super::label::sanitize_label;

/// Classifier grouping verdict, validated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupingVerdict {
    Merge {
        session_id: String,
        label: Option<String>,
    },
    CreateNew {
        suggested_label: Option<String>,
    },
    NoAction {
        session_id: Option<String>,
        label: Option<String>,
        reason: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawVerdict {
    action: Option<String>,
    session_id: Option<String>,
    label: Option<String>,
    updated_label: Option<String>,
    suggested_label: Option<String>,
    reason: Option<String>,
}

fn clean(label: Option<String>) -> Option<String> {
    label.as_deref().and_then(sanitize_label)
}

/// Parse a `/group` response body. Unknown or missing actions, and merges without a target,
/// yield `None` so the caller falls back to creating a new session.
pub fn parse_verdict(body: &Value) -> Option<GroupingVerdict> {
    let raw: RawVerdict = serde_json::from_value(body.clone()).ok()?;
    let action = raw.action.as_deref()?.trim().to_ascii_lowercase();
    let session_id = raw.session_id.filter(|id| !id.trim().is_empty());

    match action.as_str() {
        "merge" => Some(GroupingVerdict::Merge {
            session_id: session_id?,
            label: clean(raw.label).or_else(|| clean(raw.updated_label)),
        }),
        "create_new" | "new" => Some(GroupingVerdict::CreateNew {
            suggested_label: clean(raw.suggested_label).or_else(|| clean(raw.label)),
        }),
        "no_action" => Some(GroupingVerdict::NoAction {
            session_id,
            label: clean(raw.updated_label).or_else(|| clean(raw.label)),
            reason: raw.reason.filter(|reason| !reason.trim().is_empty()),
        }),
        _ => None,
    }
}
