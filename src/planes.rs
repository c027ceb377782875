use serde::{Deserialize, Serialize};

use crate::ids::Id;

/// Aircraft category, as recorded in the plane list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneCategory {
    Airplane,
    Glider,
    Motorglider,
    Ultralight,
    #[default]
    Other,
}

/// A plane from the reference entity list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Plane {
    pub id: Id,
    /// Registration mark, e.g. "D-1234". Lookups by registration are
    /// case-insensitive.
    pub registration: String,
    pub category: PlaneCategory,
    /// Type designation, e.g. "ASK 21".
    pub model: String,
    pub club: String,
    pub num_seats: i32,
    /// Identifier of the tracking device carried by the plane, empty when
    /// it has none.
    pub device_id: String,
}

impl Plane {
    pub fn new(id: Id) -> Self {
        Plane {
            id,
            ..Plane::default()
        }
    }

    pub fn is_glider(&self) -> bool {
        self.category == PlaneCategory::Glider
    }

    /// Whether the plane has at most one seat. Unknown seat counts (0) are
    /// treated as single-seaters by the validation rules.
    pub fn is_single_seater(&self) -> bool {
        self.num_seats <= 1
    }
}
