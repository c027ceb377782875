use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

use crate::cache::Cache;
use crate::events::{DataEvent, EntityData, EntityKind};
use crate::flights::Flight;
use crate::ids::Id;
use crate::launch_methods::LaunchKind;

/// A change to the flight board's row list.
///
/// Rows are addressed by combined index: the flights come first, the derived
/// towflights after them. Indices refer to the row list at the moment the
/// event is published; an insertion shifts the rows behind it up by one and
/// a removal shifts them down, without further events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    /// Rows `first..=last` were inserted.
    Inserted { first: usize, last: usize },
    /// Rows `first..=last` were removed.
    Removed { first: usize, last: usize },
    /// Rows `first..=last` changed in place.
    Updated { first: usize, last: usize },
    /// The whole row list was rebuilt.
    Reset,
}

/// The list of flights for one display date, with a towflight row derived
/// for every air tow.
///
/// The board follows the cache: feed it the cache's change notifications
/// via [`handle_event`](FlightBoard::handle_event) and it keeps its rows and
/// the derived towflights in step, publishing a [`BoardEvent`] for every row
/// it touches. Towflights are never stored; they are rebuilt from the towed
/// flight whenever it changes.
#[derive(Clone)]
pub struct FlightBoard {
    cache: Cache,
    data: Arc<Mutex<BoardData>>,
}

struct BoardData {
    display_date: NaiveDate,
    flights: Vec<Flight>,
    towflights: Vec<Flight>,
    subscribers: Vec<flume::Sender<BoardEvent>>,
}

impl FlightBoard {
    /// Create a board showing today's flights, populated from the cache's
    /// current contents.
    pub fn new(cache: Cache) -> Self {
        let board = FlightBoard {
            data: Arc::new(Mutex::new(BoardData {
                display_date: cache.today(),
                flights: Vec::new(),
                towflights: Vec::new(),
                subscribers: Vec::new(),
            })),
            cache,
        };
        board.reset();
        board
    }

    /// Subscribe to the row changes published by this board. Disconnected
    /// subscribers are dropped on the next notification.
    pub fn subscribe(&self) -> flume::Receiver<BoardEvent> {
        let (tx, rx) = flume::unbounded();
        self.data.lock().unwrap().subscribers.push(tx);
        rx
    }

    pub fn display_date(&self) -> NaiveDate {
        self.data.lock().unwrap().display_date
    }

    /// Switch the board to another date and rebuild the rows. Flights of a
    /// date the cache does not hold yet are fetched first.
    pub fn set_display_date(&self, date: NaiveDate) -> Result<()> {
        if date != self.cache.today() && self.cache.other_date() != Some(date) {
            self.cache.fetch_other(date)?;
        }

        let mut guard = self.data.lock().unwrap();
        let data = &mut *guard;
        data.display_date = date;
        Self::rebuild(&self.cache, data);
        Ok(())
    }

    /// Rebuild the rows from the cache's current contents.
    pub fn reset(&self) {
        let mut guard = self.data.lock().unwrap();
        Self::rebuild(&self.cache, &mut guard);
    }

    /// Apply one cache notification to the board.
    ///
    /// Flight additions and updates are admitted by display date: on today's
    /// board a flight belongs if it is prepared or flew today, on another
    /// date only if it flew on that date. An update that moves a flight off
    /// the board removes its rows.
    pub fn handle_event(&self, event: &DataEvent) {
        match event {
            DataEvent::Added(EntityData::Flight(flight)) => {
                let mut guard = self.data.lock().unwrap();
                let data = &mut *guard;
                if Self::belongs(data.display_date, self.cache.today(), flight) {
                    Self::insert(&self.cache, data, flight);
                }
            }
            DataEvent::Updated(EntityData::Flight(flight)) => {
                let mut guard = self.data.lock().unwrap();
                let data = &mut *guard;
                if Self::belongs(data.display_date, self.cache.today(), flight) {
                    Self::replace_or_add(&self.cache, data, flight);
                } else {
                    Self::remove(data, flight.id);
                }
            }
            DataEvent::Deleted(EntityKind::Flight, id) => {
                let mut guard = self.data.lock().unwrap();
                Self::remove(&mut guard, *id);
            }
            DataEvent::Refreshed(EntityKind::Flight) => self.reset(),
            // Reference entity changes do not move rows. Their effect on
            // derived towflights shows up with the next flight update.
            _ => {}
        }
    }

    // ** Rows **

    /// The number of rows, flights and towflights combined.
    pub fn len(&self) -> usize {
        let data = self.data.lock().unwrap();
        data.flights.len() + data.towflights.len()
    }

    /// The number of flight rows, which is also the combined index of the
    /// first towflight row.
    pub fn base_len(&self) -> usize {
        self.data.lock().unwrap().flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the flight at the given combined index.
    pub fn at(&self, index: usize) -> Option<Flight> {
        let data = self.data.lock().unwrap();
        let base_len = data.flights.len();
        if index < base_len {
            Some(data.flights[index].clone())
        } else {
            data.towflights.get(index - base_len).cloned()
        }
    }

    pub fn flights(&self) -> Vec<Flight> {
        self.data.lock().unwrap().flights.clone()
    }

    pub fn towflights(&self) -> Vec<Flight> {
        self.data.lock().unwrap().towflights.clone()
    }

    /// Check if the given combined index addresses a towflight row.
    pub fn is_tow_row(&self, index: usize) -> bool {
        let data = self.data.lock().unwrap();
        (data.flights.len()..data.flights.len() + data.towflights.len()).contains(&index)
    }

    /// Map a position in the flight list to its combined row index. Flights
    /// occupy the head of the combined view, so this is the identity for
    /// indices in range.
    pub fn base_to_combined(&self, index: usize) -> Option<usize> {
        let data = self.data.lock().unwrap();
        (index < data.flights.len()).then_some(index)
    }

    /// Map a combined row index to a position in the flight list: the
    /// identity for flight rows, the towed flight's position for towflight
    /// rows.
    pub fn combined_to_base(&self, index: usize) -> Option<usize> {
        let data = self.data.lock().unwrap();
        let base_len = data.flights.len();
        if index < base_len {
            return Some(index);
        }
        let id = data.towflights.get(index - base_len)?.id;
        data.flights.iter().position(|f| f.id == id)
    }

    /// Get the combined index of the row paired with the given one: for a
    /// flight its towflight row, for a towflight the towed flight's row.
    pub fn tow_partner(&self, index: usize) -> Option<usize> {
        let data = self.data.lock().unwrap();
        let base_len = data.flights.len();
        if index < base_len {
            let id = data.flights[index].id;
            data.towflights
                .iter()
                .position(|f| f.id == id)
                .map(|tow_index| base_len + tow_index)
        } else {
            let id = data.towflights.get(index - base_len)?.id;
            data.flights.iter().position(|f| f.id == id)
        }
    }

    /// Get the combined index of the flight with the given id.
    pub fn find_flight(&self, id: Id) -> Option<usize> {
        self.data.lock().unwrap().flights.iter().position(|f| f.id == id)
    }

    /// Get the combined index of the towflight derived from the flight with
    /// the given id.
    pub fn find_towflight(&self, id: Id) -> Option<usize> {
        let data = self.data.lock().unwrap();
        data.towflights
            .iter()
            .position(|f| f.id == id)
            .map(|tow_index| data.flights.len() + tow_index)
    }

    /// The number of flights on the board currently flying, towflights not
    /// counted.
    pub fn count_flying(&self) -> usize {
        Flight::count_flying(&self.data.lock().unwrap().flights)
    }

    /// The number of flights on the board that actually happened.
    pub fn count_happened(&self) -> usize {
        Flight::count_happened(&self.data.lock().unwrap().flights)
    }

    // ** Row maintenance **

    fn belongs(display_date: NaiveDate, today: NaiveDate, flight: &Flight) -> bool {
        if display_date == today {
            flight.is_prepared() || flight.effective_date() == Some(display_date)
        } else {
            flight.effective_date() == Some(display_date)
        }
    }

    fn rebuild(cache: &Cache, data: &mut BoardData) {
        data.flights = if data.display_date == cache.today() {
            let mut flights = cache.flights_today();
            flights.extend(cache.prepared_flights());
            flights
        } else {
            cache.flights_other()
        };

        data.towflights.clear();
        for flight in &data.flights {
            if let Some(towflight) = derive_towflight(cache, flight) {
                data.towflights.push(towflight);
            }
        }

        debug!(
            "Rebuilt flight board for {}: {} flights, {} towflights",
            data.display_date,
            data.flights.len(),
            data.towflights.len()
        );
        send(data, BoardEvent::Reset);
    }

    fn insert(cache: &Cache, data: &mut BoardData, flight: &Flight) {
        data.flights.push(flight.clone());
        let index = data.flights.len() - 1;
        send(data, BoardEvent::Inserted { first: index, last: index });

        if let Some(towflight) = derive_towflight(cache, flight) {
            data.towflights.push(towflight);
            let combined = data.flights.len() + data.towflights.len() - 1;
            send(data, BoardEvent::Inserted { first: combined, last: combined });
        }
    }

    // The towflight row goes before the flight row so that the indices of
    // both events are valid when they are published.
    fn remove(data: &mut BoardData, id: Id) {
        if let Some(tow_index) = data.towflights.iter().position(|f| f.id == id) {
            data.towflights.remove(tow_index);
            let combined = data.flights.len() + tow_index;
            send(data, BoardEvent::Removed { first: combined, last: combined });
        }

        if let Some(index) = data.flights.iter().position(|f| f.id == id) {
            data.flights.remove(index);
            send(data, BoardEvent::Removed { first: index, last: index });
        }
    }

    fn replace_or_add(cache: &Cache, data: &mut BoardData, flight: &Flight) {
        match data.flights.iter().position(|f| f.id == flight.id) {
            Some(index) => {
                data.flights[index] = flight.clone();
                send(data, BoardEvent::Updated { first: index, last: index });
                Self::sync_towflight(cache, data, flight);
            }
            None => Self::insert(cache, data, flight),
        }
    }

    // Bring the towflight row in line with the updated flight: rederive it
    // in place, append it if the flight became an air tow, drop it if it
    // stopped being one.
    fn sync_towflight(cache: &Cache, data: &mut BoardData, flight: &Flight) {
        let towflight = derive_towflight(cache, flight);
        let existing = data.towflights.iter().position(|f| f.id == flight.id);

        match (towflight, existing) {
            (Some(towflight), Some(tow_index)) => {
                data.towflights[tow_index] = towflight;
                let combined = data.flights.len() + tow_index;
                send(data, BoardEvent::Updated { first: combined, last: combined });
            }
            (Some(towflight), None) => {
                data.towflights.push(towflight);
                let combined = data.flights.len() + data.towflights.len() - 1;
                send(data, BoardEvent::Inserted { first: combined, last: combined });
            }
            (None, Some(tow_index)) => {
                data.towflights.remove(tow_index);
                let combined = data.flights.len() + tow_index;
                send(data, BoardEvent::Removed { first: combined, last: combined });
            }
            (None, None) => {}
        }
    }
}

/// Derive the towflight row for a flight, if its launch method is an air
/// tow. The towplane is resolved from the launch method's registration when
/// it names one, otherwise taken from the flight. The towflight itself is
/// marked self-launching.
fn derive_towflight(cache: &Cache, flight: &Flight) -> Option<Flight> {
    let launch_method = cache.launch_method(flight.launch_method_id).ok()?;
    if !launch_method.is_airtow() {
        return None;
    }

    let towplane_id = if launch_method.towplane_known() {
        cache.plane_id_by_registration(&launch_method.towplane_registration)
    } else {
        flight.towplane_id
    };

    Some(flight.make_towflight(towplane_id, cache.launch_method_by_kind(LaunchKind::SelfLaunch)))
}

// Publish the event to all subscribers, dropping the disconnected ones.
// Called with the data lock held so that events are seen in apply order.
fn send(data: &mut BoardData, event: BoardEvent) {
    data.subscribers
        .retain(|subscriber| subscriber.send(event).is_ok());
    metrics::counter!("board_events_published").increment(1);
}
