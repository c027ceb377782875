//! Flightline - entity cache and flight board engine for aerodrome operations
//!
//! This library keeps an in-memory cache of the reference entities (planes,
//! people, launch methods) and of date-partitioned flight windows in sync
//! with a storage backend, validates flights against the operational rules,
//! and derives a flight board that publishes row changes, with a towflight
//! row for every air tow.

pub mod ids;
pub mod settings;
pub mod planes;
pub mod people;
pub mod launch_methods;
pub mod flights;
pub mod flight_checks;
pub mod events;
pub mod storage;
pub mod cache;
pub mod flight_board;

pub use cache::Cache;
pub use events::{DataEvent, DataEventKind, EntityData, EntityKind, NotFound};
pub use flight_board::{BoardEvent, FlightBoard};
pub use flight_checks::{CheckContext, FlightError};
pub use flights::{Denial, Flight, FlightMode, FlightType};
pub use ids::Id;
pub use launch_methods::{LaunchKind, LaunchMethod};
pub use people::Person;
pub use planes::{Plane, PlaneCategory};
pub use settings::Settings;
pub use storage::{MemoryStorage, Storage};
