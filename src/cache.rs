use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::events::{DataEvent, EntityData, EntityKind, NotFound};
use crate::flights::Flight;
use crate::ids::Id;
use crate::launch_methods::{LaunchKind, LaunchMethod};
use crate::people::Person;
use crate::planes::Plane;
use crate::storage::Storage;

/// In-memory cache of the reference entities (planes, people, launch
/// methods) and of three flight windows: the flights of today, the flights
/// of one other selectable date, and the prepared flights (any date).
///
/// All reads return copies made under the lock, so callers iterate without
/// holding anything. Mutation events are applied and forwarded to
/// subscribers in the order they arrive; the producer is responsible for
/// delivering them in commit order.
#[derive(Clone)]
pub struct Cache {
    storage: Arc<dyn Storage>,
    data: Arc<Mutex<CacheData>>,
}

struct CacheData {
    planes: Vec<Plane>,
    people: Vec<Person>,
    launch_methods: Vec<LaunchMethod>,

    today: NaiveDate,
    other_date: Option<NaiveDate>,
    flights_today: Vec<Flight>,
    flights_other: Vec<Flight>,
    prepared_flights: Vec<Flight>,

    locations: Vec<String>,
    accounting_notes: Vec<String>,

    subscribers: Vec<flume::Sender<DataEvent>>,
}

impl Cache {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Cache {
            storage,
            data: Arc::new(Mutex::new(CacheData {
                planes: Vec::new(),
                people: Vec::new(),
                launch_methods: Vec::new(),
                today: Utc::now().date_naive(),
                other_date: None,
                flights_today: Vec::new(),
                flights_other: Vec::new(),
                prepared_flights: Vec::new(),
                locations: Vec::new(),
                accounting_notes: Vec::new(),
                subscribers: Vec::new(),
            })),
        }
    }

    /// Subscribe to the change notifications forwarded by this cache.
    /// Disconnected subscribers are dropped on the next notification.
    pub fn subscribe(&self) -> flume::Receiver<DataEvent> {
        let (tx, rx) = flume::unbounded();
        self.data.lock().unwrap().subscribers.push(tx);
        rx
    }

    pub fn today(&self) -> NaiveDate {
        self.data.lock().unwrap().today
    }

    pub fn other_date(&self) -> Option<NaiveDate> {
        self.data.lock().unwrap().other_date
    }

    // ** Lists **

    pub fn planes(&self) -> Vec<Plane> {
        self.data.lock().unwrap().planes.clone()
    }

    pub fn people(&self) -> Vec<Person> {
        self.data.lock().unwrap().people.clone()
    }

    pub fn launch_methods(&self) -> Vec<LaunchMethod> {
        self.data.lock().unwrap().launch_methods.clone()
    }

    pub fn flights_today(&self) -> Vec<Flight> {
        self.data.lock().unwrap().flights_today.clone()
    }

    pub fn flights_other(&self) -> Vec<Flight> {
        self.data.lock().unwrap().flights_other.clone()
    }

    pub fn prepared_flights(&self) -> Vec<Flight> {
        self.data.lock().unwrap().prepared_flights.clone()
    }

    pub fn locations(&self) -> Vec<String> {
        self.data.lock().unwrap().locations.clone()
    }

    pub fn accounting_notes(&self) -> Vec<String> {
        self.data.lock().unwrap().accounting_notes.clone()
    }

    // ** Individual entities **

    pub fn plane(&self, id: Id) -> Result<Plane, NotFound> {
        let data = self.data.lock().unwrap();
        find_entity(&data.planes, id, |p| p.id, EntityKind::Plane)
    }

    pub fn person(&self, id: Id) -> Result<Person, NotFound> {
        let data = self.data.lock().unwrap();
        find_entity(&data.people, id, |p| p.id, EntityKind::Person)
    }

    pub fn launch_method(&self, id: Id) -> Result<LaunchMethod, NotFound> {
        let data = self.data.lock().unwrap();
        find_entity(&data.launch_methods, id, |lm| lm.id, EntityKind::LaunchMethod)
    }

    /// Get a flight from the cached windows, searched in the order today,
    /// other date, prepared. A flight outside all three windows is not
    /// found even if it exists in storage.
    pub fn flight(&self, id: Id) -> Result<Flight, NotFound> {
        let not_found = NotFound::new(EntityKind::Flight, id);
        if id.is_invalid() {
            return Err(not_found);
        }

        let data = self.data.lock().unwrap();
        for window in [&data.flights_today, &data.flights_other, &data.prepared_flights] {
            if let Some(flight) = window.iter().find(|f| f.id == id) {
                return Ok(flight.clone());
            }
        }
        Err(not_found)
    }

    /// Get a flight straight from storage, bypassing the windows. For
    /// flights outside the cached scope.
    pub fn fetch_flight(&self, id: Id) -> Result<Flight> {
        let flight = self
            .storage
            .fetch_flight(id)
            .with_context(|| format!("Failed to fetch flight {}", id))?;
        Ok(flight.ok_or(NotFound::new(EntityKind::Flight, id))?)
    }

    /// Check if an entity of the given kind is cached. Flights are searched
    /// across all three windows.
    pub fn exists(&self, kind: EntityKind, id: Id) -> bool {
        match kind {
            EntityKind::Plane => self.plane(id).is_ok(),
            EntityKind::Person => self.person(id).is_ok(),
            EntityKind::LaunchMethod => self.launch_method(id).is_ok(),
            EntityKind::Flight => self.flight(id).is_ok(),
        }
    }

    // ** Lookups **

    /// Get the id of the plane with the given registration, compared case
    /// insensitively. Invalid if there is none.
    pub fn plane_id_by_registration(&self, registration: &str) -> Id {
        let data = self.data.lock().unwrap();
        data.planes
            .iter()
            .find(|plane| plane.registration.eq_ignore_ascii_case(registration))
            .map(|plane| plane.id)
            .unwrap_or(Id::INVALID)
    }

    /// Get the id of the plane carrying the given tracking device. Invalid
    /// if there is none. Planes without a device never match.
    pub fn plane_id_by_device_id(&self, device_id: &str) -> Id {
        let data = self.data.lock().unwrap();
        data.planes
            .iter()
            .find(|plane| {
                !plane.device_id.is_empty() && plane.device_id.eq_ignore_ascii_case(device_id)
            })
            .map(|plane| plane.id)
            .unwrap_or(Id::INVALID)
    }

    /// Get the id of the first launch method of the given kind. Invalid if
    /// there is none.
    pub fn launch_method_by_kind(&self, kind: LaunchKind) -> Id {
        let data = self.data.lock().unwrap();
        data.launch_methods
            .iter()
            .find(|lm| lm.kind == kind)
            .map(|lm| lm.id)
            .unwrap_or(Id::INVALID)
    }

    /// Get the ids of all people with the given name, compared case
    /// insensitively.
    pub fn person_ids_by_name(&self, last_name: &str, first_name: &str) -> Vec<Id> {
        let data = self.data.lock().unwrap();
        data.people
            .iter()
            .filter(|person| {
                person.last_name.eq_ignore_ascii_case(last_name)
                    && person.first_name.eq_ignore_ascii_case(first_name)
            })
            .map(|person| person.id)
            .collect()
    }

    /// Get the ids of all people with the given last name, compared case
    /// insensitively.
    pub fn person_ids_by_last_name(&self, last_name: &str) -> Vec<Id> {
        let data = self.data.lock().unwrap();
        data.people
            .iter()
            .filter(|person| person.last_name.eq_ignore_ascii_case(last_name))
            .map(|person| person.id)
            .collect()
    }

    /// Get the ids of all people with the given first name, compared case
    /// insensitively.
    pub fn person_ids_by_first_name(&self, first_name: &str) -> Vec<Id> {
        let data = self.data.lock().unwrap();
        data.people
            .iter()
            .filter(|person| person.first_name.eq_ignore_ascii_case(first_name))
            .map(|person| person.id)
            .collect()
    }

    /// Get the id of the person with the given name if there is exactly one
    /// match, invalid otherwise.
    pub fn unique_person_id_by_name(&self, last_name: &str, first_name: &str) -> Id {
        let ids = self.person_ids_by_name(last_name, first_name);
        if ids.len() == 1 { ids[0] } else { Id::INVALID }
    }

    /// Get the id of the flight the given plane is currently flying in,
    /// either as the flight's plane or as its towplane. Only today's
    /// flights are considered.
    pub fn plane_currently_flying(&self, id: Id) -> Id {
        let data = self.data.lock().unwrap();
        for flight in &data.flights_today {
            if (flight.is_flying() && flight.plane_id == id)
                || (flight.is_towplane_flying() && flight.towplane_id == id)
            {
                return flight.id;
            }
        }
        Id::INVALID
    }

    /// Get the id of the flight the given person is currently flying in, as
    /// pilot, copilot or towpilot. Only today's flights are considered.
    pub fn person_currently_flying(&self, id: Id) -> Id {
        let data = self.data.lock().unwrap();
        for flight in &data.flights_today {
            if (flight.is_flying() && flight.pilot_id == id)
                || (flight.is_flying() && flight.copilot_id == id)
                || (flight.is_towplane_flying() && flight.towpilot_id == id)
            {
                return flight.id;
            }
        }
        Id::INVALID
    }

    // ** Entry lists **

    pub fn plane_registrations(&self) -> Vec<String> {
        let data = self.data.lock().unwrap();
        let mut registrations: Vec<String> = data
            .planes
            .iter()
            .map(|plane| plane.registration.clone())
            .collect();
        registrations.sort();
        registrations
    }

    pub fn person_first_names(&self) -> Vec<String> {
        let data = self.data.lock().unwrap();
        sorted_unique(data.people.iter().map(|person| &person.first_name))
    }

    pub fn person_last_names(&self) -> Vec<String> {
        let data = self.data.lock().unwrap();
        sorted_unique(data.people.iter().map(|person| &person.last_name))
    }

    /// Get the first names of all people with the given last name, compared
    /// case insensitively.
    pub fn person_first_names_by_last_name(&self, last_name: &str) -> Vec<String> {
        let data = self.data.lock().unwrap();
        sorted_unique(
            data.people
                .iter()
                .filter(|person| person.last_name.eq_ignore_ascii_case(last_name))
                .map(|person| &person.first_name),
        )
    }

    /// Get the last names of all people with the given first name, compared
    /// case insensitively.
    pub fn person_last_names_by_first_name(&self, first_name: &str) -> Vec<String> {
        let data = self.data.lock().unwrap();
        sorted_unique(
            data.people
                .iter()
                .filter(|person| person.first_name.eq_ignore_ascii_case(first_name))
                .map(|person| &person.last_name),
        )
    }

    pub fn plane_models(&self) -> Vec<String> {
        let data = self.data.lock().unwrap();
        sorted_unique(
            data.planes
                .iter()
                .map(|plane| &plane.model)
                .filter(|model| !model.trim().is_empty()),
        )
    }

    pub fn clubs(&self) -> Vec<String> {
        let data = self.data.lock().unwrap();
        sorted_unique(
            data.planes
                .iter()
                .map(|plane| &plane.club)
                .chain(data.people.iter().map(|person| &person.club))
                .filter(|club| !club.trim().is_empty()),
        )
    }

    // ** Refreshing **

    pub fn refresh_planes(&self) -> Result<usize> {
        let planes = self.storage.fetch_planes().context("Failed to fetch planes")?;
        let count = planes.len();
        let mut data = self.data.lock().unwrap();
        data.planes = planes;
        forward(&mut data, DataEvent::Refreshed(EntityKind::Plane));
        metrics::counter!("cache_refreshes").increment(1);
        debug!("Refreshed {} planes", count);
        Ok(count)
    }

    pub fn refresh_people(&self) -> Result<usize> {
        let people = self.storage.fetch_people().context("Failed to fetch people")?;
        let count = people.len();
        let mut data = self.data.lock().unwrap();
        data.people = people;
        forward(&mut data, DataEvent::Refreshed(EntityKind::Person));
        metrics::counter!("cache_refreshes").increment(1);
        debug!("Refreshed {} people", count);
        Ok(count)
    }

    pub fn refresh_launch_methods(&self) -> Result<usize> {
        let launch_methods = self
            .storage
            .fetch_launch_methods()
            .context("Failed to fetch launch methods")?;
        let count = launch_methods.len();
        let mut data = self.data.lock().unwrap();
        data.launch_methods = launch_methods;
        forward(&mut data, DataEvent::Refreshed(EntityKind::LaunchMethod));
        metrics::counter!("cache_refreshes").increment(1);
        debug!("Refreshed {} launch methods", count);
        Ok(count)
    }

    /// Reload the flights of today. Also re-reads the current date, so this
    /// is the operation that moves the today window across midnight.
    pub fn refresh_today(&self) -> Result<usize> {
        let today = Utc::now().date_naive();
        let flights = self
            .storage
            .fetch_flights_on(today)
            .context("Failed to fetch the flights of today")?;
        let count = flights.len();
        let mut data = self.data.lock().unwrap();
        data.today = today;
        data.flights_today = flights;
        forward(&mut data, DataEvent::Refreshed(EntityKind::Flight));
        metrics::counter!("cache_refreshes").increment(1);
        debug!("Refreshed {} flights of today ({})", count, today);
        Ok(count)
    }

    /// Reload the flights of the other date. Does nothing if no other date
    /// has been fetched yet.
    pub fn refresh_other(&self) -> Result<usize> {
        let Some(other_date) = self.other_date() else {
            return Ok(0);
        };

        let flights = self
            .storage
            .fetch_flights_on(other_date)
            .context("Failed to fetch the flights of the other date")?;
        let count = flights.len();
        let mut data = self.data.lock().unwrap();
        data.flights_other = flights;
        forward(&mut data, DataEvent::Refreshed(EntityKind::Flight));
        metrics::counter!("cache_refreshes").increment(1);
        debug!("Refreshed {} flights of {}", count, other_date);
        Ok(count)
    }

    /// Load the flights of the given date into the other window and make it
    /// the date the window tracks from now on.
    pub fn fetch_other(&self, date: NaiveDate) -> Result<usize> {
        let flights = self
            .storage
            .fetch_flights_on(date)
            .context("Failed to fetch the flights of the other date")?;
        let count = flights.len();
        let mut data = self.data.lock().unwrap();
        data.other_date = Some(date);
        data.flights_other = flights;
        forward(&mut data, DataEvent::Refreshed(EntityKind::Flight));
        metrics::counter!("cache_refreshes").increment(1);
        debug!("Fetched {} flights of {}", count, date);
        Ok(count)
    }

    pub fn refresh_prepared(&self) -> Result<usize> {
        let flights = self
            .storage
            .fetch_prepared_flights()
            .context("Failed to fetch the prepared flights")?;
        let count = flights.len();
        let mut data = self.data.lock().unwrap();
        data.prepared_flights = flights;
        forward(&mut data, DataEvent::Refreshed(EntityKind::Flight));
        metrics::counter!("cache_refreshes").increment(1);
        debug!("Refreshed {} prepared flights", count);
        Ok(count)
    }

    pub fn refresh_locations(&self) -> Result<usize> {
        let locations = self
            .storage
            .list_locations()
            .context("Failed to fetch the location list")?;
        let count = locations.len();
        self.data.lock().unwrap().locations = locations;
        Ok(count)
    }

    pub fn refresh_accounting_notes(&self) -> Result<usize> {
        let notes = self
            .storage
            .list_accounting_notes()
            .context("Failed to fetch the accounting note list")?;
        let count = notes.len();
        self.data.lock().unwrap().accounting_notes = notes;
        Ok(count)
    }

    /// Reload everything from storage.
    pub fn refresh_all(&self) -> Result<()> {
        info!("Refreshing all cached data");
        metrics::counter!("cache_full_refreshes").increment(1);

        // The reference entities must be refreshed before the flights:
        // flight routing and derived views consult them.
        self.refresh_planes()?;
        self.refresh_people()?;
        self.refresh_launch_methods()?;
        self.refresh_today()?;
        self.refresh_other()?;
        self.refresh_prepared()?;
        self.refresh_locations()?;
        self.refresh_accounting_notes()?;
        Ok(())
    }

    // ** Change handling **

    /// Apply a committed mutation to the cached data and forward it to the
    /// subscribers. Events are applied and forwarded in call order.
    pub fn handle_event(&self, event: DataEvent) {
        metrics::counter!("cache_events_handled").increment(1);

        let mut data = self.data.lock().unwrap();
        match &event {
            DataEvent::Added(entity) => match entity {
                EntityData::Plane(plane) => data.planes.push(plane.clone()),
                EntityData::Person(person) => data.people.push(person.clone()),
                EntityData::LaunchMethod(lm) => data.launch_methods.push(lm.clone()),
                EntityData::Flight(flight) => route_added(&mut data, flight),
            },
            DataEvent::Updated(entity) => match entity {
                EntityData::Plane(plane) => {
                    update_entity(&mut data.planes, plane, |p| p.id, EntityKind::Plane)
                }
                EntityData::Person(person) => {
                    update_entity(&mut data.people, person, |p| p.id, EntityKind::Person)
                }
                EntityData::LaunchMethod(lm) => update_entity(
                    &mut data.launch_methods,
                    lm,
                    |l| l.id,
                    EntityKind::LaunchMethod,
                ),
                EntityData::Flight(flight) => route_updated(&mut data, flight),
            },
            DataEvent::Deleted(kind, id) => match kind {
                EntityKind::Plane => data.planes.retain(|p| p.id != *id),
                EntityKind::Person => data.people.retain(|p| p.id != *id),
                EntityKind::LaunchMethod => data.launch_methods.retain(|lm| lm.id != *id),
                EntityKind::Flight => {
                    let id = *id;
                    remove_by_id(&mut data.prepared_flights, id);
                    remove_by_id(&mut data.flights_today, id);
                    remove_by_id(&mut data.flights_other, id);
                }
            },
            DataEvent::Refreshed(kind) => {
                // Refreshes are produced by this cache, not consumed;
                // callers wanting a reload use the refresh methods.
                debug!("Ignoring inbound refresh event for {}", kind);
                return;
            }
        }

        forward(&mut data, event);
    }
}

// Send the event to all subscribers, dropping the disconnected ones. Called
// with the data lock held so that events leave in apply order.
fn forward(data: &mut CacheData, event: DataEvent) {
    let before = data.subscribers.len();
    data.subscribers
        .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    let pruned = before - data.subscribers.len();
    if pruned > 0 {
        debug!("Dropped {} disconnected cache subscribers", pruned);
    }
    metrics::counter!("cache_events_forwarded").increment(1);
}

fn sorted_unique<'a>(entries: impl Iterator<Item = &'a String>) -> Vec<String> {
    let set: BTreeSet<String> = entries.cloned().collect();
    set.into_iter().collect()
}

fn find_entity<T: Clone>(
    list: &[T],
    id: Id,
    id_of: fn(&T) -> Id,
    kind: EntityKind,
) -> Result<T, NotFound> {
    if id.is_invalid() {
        return Err(NotFound::new(kind, id));
    }
    list.iter()
        .find(|entity| id_of(entity) == id)
        .cloned()
        .ok_or(NotFound::new(kind, id))
}

fn update_entity<T: Clone>(list: &mut Vec<T>, value: &T, id_of: fn(&T) -> Id, kind: EntityKind) {
    let id = id_of(value);
    let mut found = false;
    for existing in list.iter_mut() {
        if id_of(existing) == id {
            *existing = value.clone();
            found = true;
        }
    }
    if !found {
        // Tolerated, but worth noticing: the producer updated something we
        // never saw.
        warn!("Update event for unknown {} {}", kind, id);
    }
}

fn replace_or_add(list: &mut Vec<Flight>, flight: &Flight) {
    match list.iter_mut().find(|f| f.id == flight.id) {
        Some(existing) => *existing = flight.clone(),
        None => list.push(flight.clone()),
    }
}

fn remove_by_id(list: &mut Vec<Flight>, id: Id) {
    list.retain(|flight| flight.id != id);
}

// A new flight goes into the window its status and effective date select,
// or into none of them.
fn route_added(data: &mut CacheData, flight: &Flight) {
    if flight.is_prepared() {
        data.prepared_flights.push(flight.clone());
    } else if flight.effective_date() == Some(data.today) {
        data.flights_today.push(flight.clone());
    } else if flight.effective_date() == data.other_date {
        // When the other date equals today, the today window wins
        data.flights_other.push(flight.clone());
    }
    // Anything else is outside the cached windows
}

// An update may change the routing key, so the flight is placed into the
// window it now belongs to and removed from the others. A flight whose date
// moved outside all windows is removed entirely; callers needing it must
// fetch its date explicitly.
fn route_updated(data: &mut CacheData, flight: &Flight) {
    let id = flight.id;
    if flight.is_prepared() {
        replace_or_add(&mut data.prepared_flights, flight);
        remove_by_id(&mut data.flights_today, id);
        remove_by_id(&mut data.flights_other, id);
    } else if flight.effective_date() == Some(data.today) {
        remove_by_id(&mut data.prepared_flights, id);
        replace_or_add(&mut data.flights_today, flight);
        remove_by_id(&mut data.flights_other, id);
    } else if flight.effective_date() == data.other_date {
        remove_by_id(&mut data.prepared_flights, id);
        remove_by_id(&mut data.flights_today, id);
        replace_or_add(&mut data.flights_other, flight);
    } else {
        remove_by_id(&mut data.prepared_flights, id);
        remove_by_id(&mut data.flights_today, id);
        remove_by_id(&mut data.flights_other, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flights::{FlightMode, FlightType};
    use crate::planes::PlaneCategory;
    use crate::storage::MemoryStorage;
    use chrono::TimeDelta;

    fn plane(id: i64, registration: &str) -> Plane {
        let mut plane = Plane::new(Id::new(id));
        plane.registration = registration.to_string();
        plane.category = PlaneCategory::Glider;
        plane.num_seats = 2;
        plane
    }

    fn person(id: i64, last_name: &str, first_name: &str) -> Person {
        let mut person = Person::new(Id::new(id));
        person.last_name = last_name.to_string();
        person.first_name = first_name.to_string();
        person
    }

    fn prepared_flight(id: i64) -> Flight {
        let mut flight = Flight::new(Id::new(id));
        flight.plane_id = Id::new(100);
        flight.pilot_id = Id::new(200);
        flight.flight_type = Some(FlightType::Normal);
        flight.mode = Some(FlightMode::Local);
        flight.departure_location = "Rheinstetten".to_string();
        flight
    }

    fn cache_with_storage() -> (Cache, MemoryStorage) {
        let storage = MemoryStorage::new();
        let cache = Cache::new(Arc::new(storage.clone()));
        (cache, storage)
    }

    #[test]
    fn test_refresh_all_loads_everything() {
        let (cache, storage) = cache_with_storage();
        let events = cache.subscribe();

        storage.put_plane(plane(100, "D-1234"));
        storage.put_person(person(200, "Mustermann", "Max"));
        storage.put_launch_method(LaunchMethod::new(Id::new(300), LaunchKind::Winch));

        let mut flown = prepared_flight(1);
        flown.depart(Utc::now()).unwrap();
        storage.put_flight(flown);
        storage.put_flight(prepared_flight(2));

        cache.refresh_all().unwrap();

        assert_eq!(cache.planes().len(), 1);
        assert_eq!(cache.people().len(), 1);
        assert_eq!(cache.launch_methods().len(), 1);
        assert_eq!(cache.flights_today().len(), 1);
        assert_eq!(cache.prepared_flights().len(), 1);
        assert_eq!(cache.flights_other().len(), 0);
        assert_eq!(cache.locations(), vec!["Rheinstetten".to_string()]);

        // Reference entities are announced before the flight windows; the
        // other window stays quiet because no other date was ever fetched.
        let announced: Vec<EntityKind> = events.try_iter().map(|ev| ev.entity_kind()).collect();
        assert_eq!(
            announced,
            [
                EntityKind::Plane,
                EntityKind::Person,
                EntityKind::LaunchMethod,
                EntityKind::Flight,
                EntityKind::Flight,
            ]
        );
    }

    #[test]
    fn test_flight_lookup_searches_all_windows() {
        let (cache, storage) = cache_with_storage();

        let mut flown = prepared_flight(1);
        flown.depart(Utc::now()).unwrap();
        storage.put_flight(flown);
        storage.put_flight(prepared_flight(2));

        let mut old = prepared_flight(3);
        old.depart(Utc::now() - TimeDelta::days(7)).unwrap();
        storage.put_flight(old);

        cache.refresh_all().unwrap();
        cache
            .fetch_other((Utc::now() - TimeDelta::days(7)).date_naive())
            .unwrap();

        assert_eq!(cache.flight(Id::new(1)).unwrap().id, Id::new(1));
        assert_eq!(cache.flight(Id::new(2)).unwrap().id, Id::new(2));
        assert_eq!(cache.flight(Id::new(3)).unwrap().id, Id::new(3));

        let err = cache.flight(Id::new(99)).unwrap_err();
        assert_eq!(err, NotFound::new(EntityKind::Flight, Id::new(99)));
        assert!(cache.flight(Id::INVALID).is_err());

        // Flights outside every window can still be fetched from storage
        let mut ancient = prepared_flight(4);
        ancient.depart(Utc::now() - TimeDelta::days(400)).unwrap();
        storage.put_flight(ancient);
        assert!(cache.flight(Id::new(4)).is_err());
        assert_eq!(cache.fetch_flight(Id::new(4)).unwrap().id, Id::new(4));
        assert!(cache.fetch_flight(Id::new(99)).is_err());
    }

    #[test]
    fn test_reference_lookups() {
        let (cache, storage) = cache_with_storage();

        let mut tracked = plane(100, "D-1234");
        tracked.device_id = "FLRDDA5BA".to_string();
        storage.put_plane(tracked);
        storage.put_plane(plane(101, "D-5678"));
        storage.put_person(person(200, "Mustermann", "Max"));
        storage.put_person(person(201, "Mustermann", "Moritz"));
        storage.put_person(person(202, "mustermann", "max"));
        let mut self_launch = LaunchMethod::new(Id::new(301), LaunchKind::SelfLaunch);
        self_launch.name = "Self launch".to_string();
        storage.put_launch_method(self_launch);
        cache.refresh_all().unwrap();

        assert_eq!(cache.plane_id_by_registration("d-1234"), Id::new(100));
        assert_eq!(cache.plane_id_by_registration("D-9999"), Id::INVALID);

        assert_eq!(cache.plane_id_by_device_id("flrdda5ba"), Id::new(100));
        assert_eq!(cache.plane_id_by_device_id("FLRF00F00"), Id::INVALID);
        // The untracked plane must not match an empty key
        assert_eq!(cache.plane_id_by_device_id(""), Id::INVALID);

        assert_eq!(
            cache.person_ids_by_name("Mustermann", "Moritz"),
            vec![Id::new(201)]
        );
        assert_eq!(
            cache.person_ids_by_last_name("MUSTERMANN"),
            vec![Id::new(200), Id::new(201), Id::new(202)]
        );
        assert_eq!(
            cache.person_ids_by_first_name("max"),
            vec![Id::new(200), Id::new(202)]
        );
        assert_eq!(
            cache.unique_person_id_by_name("Mustermann", "Moritz"),
            Id::new(201)
        );
        // Two case-insensitive matches: not unique
        assert_eq!(
            cache.unique_person_id_by_name("Mustermann", "Max"),
            Id::INVALID
        );

        assert_eq!(
            cache.launch_method_by_kind(LaunchKind::SelfLaunch),
            Id::new(301)
        );
        assert_eq!(cache.launch_method_by_kind(LaunchKind::Airtow), Id::INVALID);

        assert!(cache.exists(EntityKind::Plane, Id::new(100)));
        assert!(cache.exists(EntityKind::Person, Id::new(202)));
        assert!(!cache.exists(EntityKind::Plane, Id::new(999)));
        assert!(!cache.exists(EntityKind::LaunchMethod, Id::INVALID));
    }

    #[test]
    fn test_entry_lists() {
        let (cache, storage) = cache_with_storage();

        let mut ka8 = plane(100, "D-5678");
        ka8.model = "Ka 8".to_string();
        ka8.club = "FSV Rheinstetten".to_string();
        storage.put_plane(ka8);
        let mut ask21 = plane(101, "D-1234");
        ask21.model = "ASK 21".to_string();
        storage.put_plane(ask21);

        storage.put_person(person(200, "Mustermann", "Max"));
        storage.put_person(person(201, "Mustermann", "Moritz"));
        let mut other_club = person(202, "Beispiel", "Max");
        other_club.club = "LSV Speyer".to_string();
        storage.put_person(other_club);

        cache.refresh_all().unwrap();

        assert_eq!(cache.plane_registrations(), vec!["D-1234", "D-5678"]);
        assert_eq!(cache.person_first_names(), vec!["Max", "Moritz"]);
        assert_eq!(cache.person_last_names(), vec!["Beispiel", "Mustermann"]);
        assert_eq!(
            cache.person_first_names_by_last_name("mustermann"),
            vec!["Max", "Moritz"]
        );
        assert_eq!(
            cache.person_last_names_by_first_name("MAX"),
            vec!["Beispiel", "Mustermann"]
        );
        assert_eq!(cache.plane_models(), vec!["ASK 21", "Ka 8"]);
        assert_eq!(cache.clubs(), vec!["FSV Rheinstetten", "LSV Speyer"]);
    }

    #[test]
    fn test_currently_flying_scans_today_only() {
        let (cache, storage) = cache_with_storage();

        let mut flying = prepared_flight(1);
        flying.copilot_id = Id::new(201);
        flying.towplane_id = Id::new(101);
        flying.towpilot_id = Id::new(202);
        flying.towflight_mode = Some(FlightMode::Local);
        flying.depart(Utc::now()).unwrap();
        storage.put_flight(flying);

        cache.refresh_all().unwrap();

        assert_eq!(cache.plane_currently_flying(Id::new(100)), Id::new(1));
        assert_eq!(cache.plane_currently_flying(Id::new(101)), Id::new(1));
        assert_eq!(cache.person_currently_flying(Id::new(200)), Id::new(1));
        assert_eq!(cache.person_currently_flying(Id::new(201)), Id::new(1));
        assert_eq!(cache.person_currently_flying(Id::new(202)), Id::new(1));
        assert_eq!(cache.person_currently_flying(Id::new(999)), Id::INVALID);

        // After landing, the plane is free again, but the towplane is not
        let mut flight = cache.flight(Id::new(1)).unwrap();
        flight.land(Utc::now(), "Rheinstetten").unwrap();
        cache.handle_event(DataEvent::Updated(EntityData::Flight(flight)));

        assert_eq!(cache.plane_currently_flying(Id::new(100)), Id::INVALID);
        assert_eq!(cache.plane_currently_flying(Id::new(101)), Id::new(1));
        assert_eq!(cache.person_currently_flying(Id::new(202)), Id::new(1));
    }

    #[test]
    fn test_event_routing_between_windows() {
        let (cache, _storage) = cache_with_storage();
        cache.fetch_other(Utc::now().date_naive() - TimeDelta::days(1)).unwrap();

        // Added prepared
        let flight = prepared_flight(1);
        cache.handle_event(DataEvent::Added(EntityData::Flight(flight.clone())));
        assert_eq!(cache.prepared_flights().len(), 1);

        // Departing today moves it to the today window
        let mut flight = flight;
        flight.depart(Utc::now()).unwrap();
        cache.handle_event(DataEvent::Updated(EntityData::Flight(flight.clone())));
        assert_eq!(cache.prepared_flights().len(), 0);
        assert_eq!(cache.flights_today().len(), 1);

        // Redating it to the other date moves it again
        flight.departure_time = Some(Utc::now() - TimeDelta::days(1));
        cache.handle_event(DataEvent::Updated(EntityData::Flight(flight.clone())));
        assert_eq!(cache.flights_today().len(), 0);
        assert_eq!(cache.flights_other().len(), 1);

        // A date outside all windows drops it entirely
        flight.departure_time = Some(Utc::now() - TimeDelta::days(30));
        cache.handle_event(DataEvent::Updated(EntityData::Flight(flight.clone())));
        assert_eq!(cache.prepared_flights().len(), 0);
        assert_eq!(cache.flights_today().len(), 0);
        assert_eq!(cache.flights_other().len(), 0);
        assert!(cache.flight(flight.id).is_err());

        // An add outside all windows is not cached either
        cache.handle_event(DataEvent::Added(EntityData::Flight(flight)));
        assert_eq!(cache.flights_today().len(), 0);
        assert_eq!(cache.flights_other().len(), 0);
    }

    #[test]
    fn test_events_forwarded_in_order() {
        let (cache, _storage) = cache_with_storage();
        let events = cache.subscribe();

        let flight = prepared_flight(1);
        cache.handle_event(DataEvent::Added(EntityData::Flight(flight.clone())));
        cache.handle_event(DataEvent::Deleted(EntityKind::Flight, flight.id));

        assert_eq!(
            events.try_recv().unwrap(),
            DataEvent::Added(EntityData::Flight(flight.clone()))
        );
        assert_eq!(
            events.try_recv().unwrap(),
            DataEvent::Deleted(EntityKind::Flight, flight.id)
        );
        assert!(events.try_recv().is_err());

        // Dropping the receiver must not break later notifications
        drop(events);
        cache.handle_event(DataEvent::Added(EntityData::Flight(prepared_flight(2))));
        assert_eq!(cache.prepared_flights().len(), 1);
    }

    #[test]
    fn test_reference_update_and_delete() {
        let (cache, storage) = cache_with_storage();
        storage.put_plane(plane(100, "D-1234"));
        cache.refresh_all().unwrap();

        let mut updated = plane(100, "D-1234");
        updated.model = "ASK 13".to_string();
        cache.handle_event(DataEvent::Updated(EntityData::Plane(updated)));
        assert_eq!(cache.plane(Id::new(100)).unwrap().model, "ASK 13");

        // Updating an unknown entity is tolerated and changes nothing
        cache.handle_event(DataEvent::Updated(EntityData::Plane(plane(999, "D-0000"))));
        assert_eq!(cache.planes().len(), 1);

        cache.handle_event(DataEvent::Deleted(EntityKind::Plane, Id::new(100)));
        assert!(cache.plane(Id::new(100)).is_err());
    }

    #[test]
    fn test_fetch_other_tracks_new_date() {
        let (cache, storage) = cache_with_storage();

        let day_one = Utc::now() - TimeDelta::days(7);
        let day_two = Utc::now() - TimeDelta::days(14);

        let mut first = prepared_flight(1);
        first.depart(day_one).unwrap();
        storage.put_flight(first);
        let mut second = prepared_flight(2);
        second.depart(day_two).unwrap();
        storage.put_flight(second);

        assert_eq!(cache.other_date(), None);
        assert_eq!(cache.refresh_other().unwrap(), 0);

        assert_eq!(cache.fetch_other(day_one.date_naive()).unwrap(), 1);
        assert_eq!(cache.other_date(), Some(day_one.date_naive()));
        assert_eq!(cache.flights_other()[0].id, Id::new(1));

        // Fetching another date replaces the window contents
        assert_eq!(cache.fetch_other(day_two.date_naive()).unwrap(), 1);
        assert_eq!(cache.flights_other()[0].id, Id::new(2));
        assert!(cache.flight(Id::new(1)).is_err());
    }
}
