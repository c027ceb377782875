use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::flights::{Flight, entry_is_empty};
use crate::ids::Id;
use crate::launch_methods::LaunchMethod;
use crate::people::Person;
use crate::planes::Plane;

/// Source of record for the cache. Implementations deliver either a complete
/// result or an error, never a partial list.
pub trait Storage: Send + Sync {
    fn fetch_planes(&self) -> Result<Vec<Plane>>;
    fn fetch_people(&self) -> Result<Vec<Person>>;
    fn fetch_launch_methods(&self) -> Result<Vec<LaunchMethod>>;

    /// Get the flights that happened on the given date.
    fn fetch_flights_on(&self, date: NaiveDate) -> Result<Vec<Flight>>;

    /// Get the flights that have not happened yet, regardless of date.
    fn fetch_prepared_flights(&self) -> Result<Vec<Flight>>;

    /// Get a single flight regardless of date.
    fn fetch_flight(&self, id: Id) -> Result<Option<Flight>>;

    /// Get the distinct locations mentioned by any flight, sorted.
    fn list_locations(&self) -> Result<Vec<String>>;

    /// Get the distinct accounting notes mentioned by any flight, sorted.
    fn list_accounting_notes(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct MemoryStorageData {
    planes: Vec<Plane>,
    people: Vec<Person>,
    launch_methods: Vec<LaunchMethod>,
    flights: Vec<Flight>,
}

/// In-memory storage. Used as the fixture backend in tests and wherever no
/// external database is wired up.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    data: Arc<Mutex<MemoryStorageData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// Load a complete dataset from a JSON document with the keys `planes`,
    /// `people`, `launch_methods` and `flights`, each optional.
    pub fn from_json(json: &str) -> Result<Self> {
        let data: MemoryStorageData = serde_json::from_str(json)?;
        Ok(MemoryStorage {
            data: Arc::new(Mutex::new(data)),
        })
    }

    pub fn put_plane(&self, plane: Plane) {
        let mut data = self.data.lock().unwrap();
        put_by_id(&mut data.planes, plane.id, plane, |p| p.id);
    }

    pub fn put_person(&self, person: Person) {
        let mut data = self.data.lock().unwrap();
        put_by_id(&mut data.people, person.id, person, |p| p.id);
    }

    pub fn put_launch_method(&self, launch_method: LaunchMethod) {
        let mut data = self.data.lock().unwrap();
        put_by_id(&mut data.launch_methods, launch_method.id, launch_method, |lm| lm.id);
    }

    pub fn put_flight(&self, flight: Flight) {
        let mut data = self.data.lock().unwrap();
        put_by_id(&mut data.flights, flight.id, flight, |f| f.id);
    }

    pub fn remove_flight(&self, id: Id) {
        let mut data = self.data.lock().unwrap();
        data.flights.retain(|f| f.id != id);
    }
}

// Replace the entry with the same id, or append.
fn put_by_id<T>(list: &mut Vec<T>, id: Id, value: T, id_of: fn(&T) -> Id) {
    match list.iter_mut().find(|entry| id_of(entry) == id) {
        Some(entry) => *entry = value,
        None => list.push(value),
    }
}

impl Storage for MemoryStorage {
    fn fetch_planes(&self) -> Result<Vec<Plane>> {
        Ok(self.data.lock().unwrap().planes.clone())
    }

    fn fetch_people(&self) -> Result<Vec<Person>> {
        Ok(self.data.lock().unwrap().people.clone())
    }

    fn fetch_launch_methods(&self) -> Result<Vec<LaunchMethod>> {
        Ok(self.data.lock().unwrap().launch_methods.clone())
    }

    fn fetch_flights_on(&self, date: NaiveDate) -> Result<Vec<Flight>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .flights
            .iter()
            .filter(|f| f.happened() && f.effective_date() == Some(date))
            .cloned()
            .collect())
    }

    fn fetch_prepared_flights(&self) -> Result<Vec<Flight>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .flights
            .iter()
            .filter(|f| f.is_prepared())
            .cloned()
            .collect())
    }

    fn fetch_flight(&self, id: Id) -> Result<Option<Flight>> {
        let data = self.data.lock().unwrap();
        Ok(data.flights.iter().find(|f| f.id == id).cloned())
    }

    fn list_locations(&self) -> Result<Vec<String>> {
        let data = self.data.lock().unwrap();
        let mut locations = BTreeSet::new();
        for flight in &data.flights {
            for location in [
                &flight.departure_location,
                &flight.landing_location,
                &flight.towflight_landing_location,
            ] {
                if !entry_is_empty(location) {
                    locations.insert(location.clone());
                }
            }
        }
        Ok(locations.into_iter().collect())
    }

    fn list_accounting_notes(&self) -> Result<Vec<String>> {
        let data = self.data.lock().unwrap();
        let mut notes = BTreeSet::new();
        for flight in &data.flights {
            if !flight.accounting_notes.trim().is_empty() {
                notes.insert(flight.accounting_notes.clone());
            }
        }
        Ok(notes.into_iter().collect())
    }
}
