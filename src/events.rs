use crate::flights::Flight;
use crate::ids::Id;
use crate::launch_methods::LaunchMethod;
use crate::people::Person;
use crate::planes::Plane;

/// The entity collections the cache knows about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Plane,
    Person,
    LaunchMethod,
    Flight,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Plane => "plane",
            EntityKind::Person => "person",
            EntityKind::LaunchMethod => "launch method",
            EntityKind::Flight => "flight",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A full entity payload, tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityData {
    Plane(Plane),
    Person(Person),
    LaunchMethod(LaunchMethod),
    Flight(Flight),
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Plane(_) => EntityKind::Plane,
            EntityData::Person(_) => EntityKind::Person,
            EntityData::LaunchMethod(_) => EntityKind::LaunchMethod,
            EntityData::Flight(_) => EntityKind::Flight,
        }
    }

    pub fn id(&self) -> Id {
        match self {
            EntityData::Plane(plane) => plane.id,
            EntityData::Person(person) => person.id,
            EntityData::LaunchMethod(launch_method) => launch_method.id,
            EntityData::Flight(flight) => flight.id,
        }
    }
}

/// What happened, without the payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataEventKind {
    Added,
    Updated,
    Deleted,
    Refreshed,
}

/// A committed change, applied to the cache and forwarded to subscribers in
/// apply order. `Added` and `Updated` carry the entity, `Deleted` only the
/// id. `Refreshed` signals a bulk reload of one collection; subscribers
/// re-read instead of patching.
#[derive(Debug, Clone, PartialEq)]
pub enum DataEvent {
    Added(EntityData),
    Updated(EntityData),
    Deleted(EntityKind, Id),
    Refreshed(EntityKind),
}

impl DataEvent {
    pub fn kind(&self) -> DataEventKind {
        match self {
            DataEvent::Added(_) => DataEventKind::Added,
            DataEvent::Updated(_) => DataEventKind::Updated,
            DataEvent::Deleted(_, _) => DataEventKind::Deleted,
            DataEvent::Refreshed(_) => DataEventKind::Refreshed,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            DataEvent::Added(data) => data.kind(),
            DataEvent::Updated(data) => data.kind(),
            DataEvent::Deleted(kind, _) => *kind,
            DataEvent::Refreshed(kind) => *kind,
        }
    }

    /// Get the id of the affected entity. Refresh events affect a whole
    /// collection and have none.
    pub fn id(&self) -> Option<Id> {
        match self {
            DataEvent::Added(data) => Some(data.id()),
            DataEvent::Updated(data) => Some(data.id()),
            DataEvent::Deleted(_, id) => Some(*id),
            DataEvent::Refreshed(_) => None,
        }
    }
}

/// A single-entity lookup found nothing in the searched scope. Absence is
/// often legitimate (a flight may have aged out of the cached date windows);
/// the caller decides whether it is a defect.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NotFound {
    pub kind: EntityKind,
    pub id: Id,
}

impl NotFound {
    pub fn new(kind: EntityKind, id: Id) -> Self {
        NotFound { kind, id }
    }
}

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no {} with id {}", self.kind, self.id)
    }
}

impl std::error::Error for NotFound {}
