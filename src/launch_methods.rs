use serde::{Deserialize, Serialize};

use crate::ids::Id;

/// How a flight gets into the air.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchKind {
    Winch,
    Airtow,
    SelfLaunch,
    #[default]
    Other,
}

/// A launch method from the reference entity list.
///
/// Air tow methods may name a fixed towplane by registration; when they do
/// not, the towed flight carries the towplane id itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchMethod {
    pub id: Id,
    pub name: String,
    pub short_name: String,
    /// Abbreviation used in printed logbooks.
    pub log_string: String,
    /// Shortcut key for picking this method in an editor, empty for none.
    pub keyboard_shortcut: String,
    pub kind: LaunchKind,
    /// Registration of the fixed towplane, empty when the towplane varies.
    pub towplane_registration: String,
    /// Whether flights with this launch method need a pilot entry.
    pub person_required: bool,
}

impl LaunchMethod {
    pub fn new(id: Id, kind: LaunchKind) -> Self {
        LaunchMethod {
            id,
            kind,
            person_required: true,
            ..LaunchMethod::default()
        }
    }

    pub fn is_airtow(&self) -> bool {
        self.kind == LaunchKind::Airtow
    }

    /// Whether this method determines the towplane itself.
    pub fn towplane_known(&self) -> bool {
        self.is_airtow() && !self.towplane_registration.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_towplane_known() {
        let mut method = LaunchMethod::new(Id::new(1), LaunchKind::Airtow);
        assert!(method.is_airtow());
        assert!(!method.towplane_known());

        method.towplane_registration = "D-EFGH".to_string();
        assert!(method.towplane_known());

        // A fixed registration on a non-airtow method means nothing
        method.kind = LaunchKind::Winch;
        assert!(!method.towplane_known());
    }
}
