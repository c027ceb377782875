//! Integration test for the entity cache
//!
//! Drives a day of operations against an in-memory storage backend and
//! verifies window routing, the forwarded event stream and the validation
//! flow on cached data.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use flightline::{
    Cache, CheckContext, DataEvent, EntityData, EntityKind, Flight, FlightError, FlightMode,
    FlightType, Id, MemoryStorage, Settings,
};

const FIXTURE: &str = r#"{
    "planes": [
        {"id": 100, "registration": "D-1234", "category": "glider", "model": "ASK 21", "num_seats": 2},
        {"id": 101, "registration": "D-EJBQ", "category": "airplane", "model": "DR 400", "num_seats": 4}
    ],
    "people": [
        {"id": 200, "last_name": "Mustermann", "first_name": "Max"},
        {"id": 201, "last_name": "Beispiel", "first_name": "Bettina"}
    ],
    "launch_methods": [
        {"id": 301, "name": "Winch", "kind": "winch", "person_required": true},
        {"id": 302, "name": "Airtow", "kind": "airtow", "towplane_registration": "D-EJBQ", "person_required": true},
        {"id": 303, "name": "Self launch", "kind": "self_launch", "person_required": true}
    ]
}"#;

fn fixture() -> (Cache, MemoryStorage) {
    let storage = MemoryStorage::from_json(FIXTURE).unwrap();
    let cache = Cache::new(Arc::new(storage.clone()));
    cache.refresh_all().unwrap();
    (cache, storage)
}

fn new_flight(id: i64) -> Flight {
    let mut flight = Flight::new(Id::new(id));
    flight.plane_id = Id::new(100);
    flight.pilot_id = Id::new(200);
    flight.launch_method_id = Id::new(301);
    flight.flight_type = Some(FlightType::Normal);
    flight.mode = Some(FlightMode::Local);
    flight.departure_location = "Rheinstetten".to_string();
    flight
}

/// Every flight id must be in at most one of the three windows.
fn assert_windows_disjoint(cache: &Cache) {
    let mut ids: Vec<Id> = Vec::new();
    ids.extend(cache.flights_today().iter().map(|f| f.id));
    ids.extend(cache.flights_other().iter().map(|f| f.id));
    ids.extend(cache.prepared_flights().iter().map(|f| f.id));

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(ids.len(), unique.len(), "flight cached in more than one window");
}

/// A flight is created, departs, does a touch-and-go and lands, with the
/// cache following along through change events.
#[test]
fn test_flight_lifecycle_moves_through_windows() {
    let (cache, _storage) = fixture();
    let events = cache.subscribe();

    // Created as prepared
    let flight = new_flight(1);
    cache.handle_event(DataEvent::Added(EntityData::Flight(flight.clone())));
    assert_eq!(cache.prepared_flights().len(), 1);
    assert_eq!(cache.flights_today().len(), 0);
    assert_windows_disjoint(&cache);

    // Departure moves it to today's window
    let mut flight = flight;
    flight.depart(Utc::now()).unwrap();
    cache.handle_event(DataEvent::Updated(EntityData::Flight(flight.clone())));
    assert_eq!(cache.prepared_flights().len(), 0);
    assert_eq!(cache.flights_today().len(), 1);
    assert_windows_disjoint(&cache);
    assert_eq!(cache.plane_currently_flying(Id::new(100)), Id::new(1));

    // Touch-and-go and landing keep it there
    flight.touch_and_go().unwrap();
    cache.handle_event(DataEvent::Updated(EntityData::Flight(flight.clone())));
    flight.land(Utc::now(), "Rheinstetten").unwrap();
    cache.handle_event(DataEvent::Updated(EntityData::Flight(flight.clone())));

    let cached = cache.flight(Id::new(1)).unwrap();
    assert!(cached.landed);
    assert_eq!(cached.num_landings, 2);
    assert_eq!(cached.landing_location, "Rheinstetten");
    assert_eq!(cache.plane_currently_flying(Id::new(100)), Id::INVALID);
    assert_windows_disjoint(&cache);

    // Deleting removes it everywhere
    cache.handle_event(DataEvent::Deleted(EntityKind::Flight, Id::new(1)));
    assert!(cache.flight(Id::new(1)).is_err());

    // The subscriber saw every change in order
    let kinds: Vec<&'static str> = events
        .try_iter()
        .map(|event| match event {
            DataEvent::Added(_) => "added",
            DataEvent::Updated(_) => "updated",
            DataEvent::Deleted(_, _) => "deleted",
            DataEvent::Refreshed(_) => "refreshed",
        })
        .collect();
    assert_eq!(kinds, vec!["added", "updated", "updated", "updated", "deleted"]);
}

/// Validation resolves the referenced entities from the cache and applies
/// the towpilot rules only when towpilot recording is on.
#[test]
fn test_validation_uses_cached_references() {
    let (cache, _storage) = fixture();
    let settings = Settings::default();

    // The towpilot was entered by name but never resolved to a person
    let mut flight = new_flight(1);
    flight.launch_method_id = Id::new(302);
    flight.towplane_id = cache.plane_id_by_registration("d-ejbq");
    flight.towflight_mode = Some(FlightMode::Local);
    flight.towpilot_first_name = "Peter".to_string();
    flight.towpilot_last_name = "Schleppmeister".to_string();

    let plane = cache.plane(flight.plane_id).ok();
    let towplane = cache.plane(flight.towplane_id).ok();
    let launch_method = cache.launch_method(flight.launch_method_id).ok();
    let context = CheckContext {
        flight: &flight,
        plane: plane.as_ref(),
        towplane: towplane.as_ref(),
        launch_method: launch_method.as_ref(),
        record_towpilot: settings.record_towpilot,
    };

    // An air tow without a towpilot entry is flagged
    let errors: Vec<FlightError> = context.errors().collect();
    assert!(errors.contains(&FlightError::TowpilotNotIdentified));

    // With towpilot recording off the flight is fine
    let context = CheckContext {
        record_towpilot: false,
        ..context
    };
    assert!(!context.has_errors());
    assert_eq!(context.first_error(), None);
}

/// The other window follows the fetched date and ages out flights that are
/// redated off it.
#[test]
fn test_other_window_tracks_fetched_date() {
    let (cache, storage) = fixture();

    let last_week = Utc::now() - TimeDelta::days(7);
    let mut old = new_flight(1);
    old.depart(last_week).unwrap();
    storage.put_flight(old.clone());

    // Not cached until its date is fetched
    assert!(cache.flight(Id::new(1)).is_err());
    assert_eq!(cache.fetch_other(last_week.date_naive()).unwrap(), 1);
    assert_eq!(cache.other_date(), Some(last_week.date_naive()));
    assert_eq!(cache.flight(Id::new(1)).unwrap().id, Id::new(1));

    // Redating the flight to today moves it between windows
    let mut redated = old.clone();
    redated.departure_time = Some(Utc::now());
    cache.handle_event(DataEvent::Updated(EntityData::Flight(redated)));
    assert_eq!(cache.flights_other().len(), 0);
    assert_eq!(cache.flights_today().len(), 1);
    assert_windows_disjoint(&cache);

    // Refreshing the other window reloads it from storage
    assert_eq!(cache.refresh_other().unwrap(), 1);
    assert_eq!(cache.flights_other().len(), 1);

    // Fetching a different date replaces the window
    let last_month = (Utc::now() - TimeDelta::days(30)).date_naive();
    assert_eq!(cache.fetch_other(last_month).unwrap(), 0);
    assert_eq!(cache.other_date(), Some(last_month));
    assert_eq!(cache.flights_other().len(), 0);
}

/// Refreshes replace window contents wholesale and announce themselves.
#[test]
fn test_refresh_replaces_window_contents() {
    let (cache, storage) = fixture();
    let events = cache.subscribe();

    storage.put_flight(new_flight(1));
    storage.put_flight(new_flight(2));
    assert_eq!(cache.refresh_prepared().unwrap(), 2);
    assert_eq!(cache.prepared_flights().len(), 2);
    assert_eq!(
        events.try_recv().unwrap(),
        DataEvent::Refreshed(EntityKind::Flight)
    );

    storage.remove_flight(Id::new(2));
    assert_eq!(cache.refresh_prepared().unwrap(), 1);
    assert_eq!(cache.prepared_flights().len(), 1);
    assert_eq!(cache.prepared_flights()[0].id, Id::new(1));
}
