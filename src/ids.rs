use serde::{Deserialize, Serialize};

/// Entity identifier as assigned by the backing store.
///
/// The value 0 is reserved as the invalid sentinel: references to entities
/// that are not set carry the invalid id rather than an `Option`, matching
/// the storage layer where unset foreign keys are stored as 0.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id(pub i64);

impl Id {
    pub const INVALID: Id = Id(0);

    pub fn new(value: i64) -> Self {
        Id(value)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    pub fn is_invalid(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Id(value)
    }
}
