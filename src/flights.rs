use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ids::Id;

/// Flight type as entered on the flight. The towflight records synthesized
/// for air tows are forced to `Tow`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightType {
    Normal,
    TwoSeatTraining,
    SoloTraining,
    Tow,
    GuestPrivate,
    GuestExternal,
}

impl FlightType {
    /// Whether a copilot is recorded for this type. For two-seat training
    /// the copilot is the instructor, for guest flights the guest.
    pub fn copilot_recorded(&self) -> bool {
        matches!(
            self,
            FlightType::Normal
                | FlightType::TwoSeatTraining
                | FlightType::GuestPrivate
                | FlightType::GuestExternal
        )
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, FlightType::GuestPrivate | FlightType::GuestExternal)
    }

    pub fn is_training(&self) -> bool {
        matches!(self, FlightType::TwoSeatTraining | FlightType::SoloTraining)
    }
}

/// Where a flight takes place relative to this airfield.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightMode {
    /// Departs and lands here.
    Local,
    /// Arrives here from elsewhere.
    Coming,
    /// Departs here for elsewhere.
    Leaving,
}

impl FlightMode {
    pub fn departs_here(&self) -> bool {
        matches!(self, FlightMode::Local | FlightMode::Leaving)
    }

    pub fn lands_here(&self) -> bool {
        matches!(self, FlightMode::Local | FlightMode::Coming)
    }
}

/// Reason a lifecycle transition was not allowed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Denial {
    DoesNotDepartHere,
    AlreadyDeparted,
    DoesNotLandHere,
    NotYetDeparted,
    AlreadyLanded,
    TowflightAlreadyLanded,
    TowflightsCannotTouchAndGo,
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Denial::DoesNotDepartHere => "the flight does not depart here",
            Denial::AlreadyDeparted => "the flight has already departed",
            Denial::DoesNotLandHere => "the flight does not land here",
            Denial::NotYetDeparted => "the flight has not departed yet",
            Denial::AlreadyLanded => "the flight has already landed",
            Denial::TowflightAlreadyLanded => "the towflight has already landed",
            Denial::TowflightsCannotTouchAndGo => "towflights cannot perform a touch-and-go",
        };
        write!(f, "{}", s)
    }
}

/// An entry counts as empty when it is blank or the explicit "-" marker.
pub(crate) fn entry_is_empty(entry: &str) -> bool {
    let trimmed = entry.trim();
    trimmed.is_empty() || trimmed == "-"
}

/// A flight log entry.
///
/// People can be referenced by id or, for people not in the reference list,
/// by free-form first/last name fallbacks. The towflight fields record the
/// towplane's side of an air tow; they belong to this flight, not to the
/// towflight record derived from it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Flight {
    pub id: Id,
    pub plane_id: Id,
    pub pilot_id: Id,
    pub pilot_first_name: String,
    pub pilot_last_name: String,
    pub copilot_id: Id,
    pub copilot_first_name: String,
    pub copilot_last_name: String,
    pub towpilot_id: Id,
    pub towpilot_first_name: String,
    pub towpilot_last_name: String,
    pub towplane_id: Id,
    pub launch_method_id: Id,
    pub flight_type: Option<FlightType>,
    pub mode: Option<FlightMode>,
    pub towflight_mode: Option<FlightMode>,
    pub departed: bool,
    pub landed: bool,
    pub towflight_landed: bool,
    pub departure_time: Option<DateTime<Utc>>,
    pub landing_time: Option<DateTime<Utc>>,
    pub towflight_landing_time: Option<DateTime<Utc>>,
    pub departure_location: String,
    pub landing_location: String,
    pub towflight_landing_location: String,
    pub num_landings: i32,
    pub comments: String,
    pub accounting_notes: String,
}

impl Flight {
    pub fn new(id: Id) -> Self {
        Flight {
            id,
            ..Flight::default()
        }
    }

    // ** Status **

    pub fn departs_here(&self) -> bool {
        self.mode.is_some_and(|m| m.departs_here())
    }

    pub fn lands_here(&self) -> bool {
        self.mode.is_some_and(|m| m.lands_here())
    }

    pub fn towflight_lands_here(&self) -> bool {
        self.towflight_mode.is_some_and(|m| m.lands_here())
    }

    /// Check if the flight has taken place as far as this airfield is
    /// concerned: departed if it departs here, or landed if it lands here.
    pub fn happened(&self) -> bool {
        (self.departs_here() && self.departed) || (self.lands_here() && self.landed)
    }

    pub fn is_prepared(&self) -> bool {
        !self.happened()
    }

    /// Check if nothing more will happen here. A towflight is finished when
    /// it has landed, wherever that is; other flights when they have landed
    /// if they land here, or departed otherwise.
    pub fn finished(&self) -> bool {
        if self.is_towflight() || self.lands_here() {
            self.landed
        } else {
            self.departed
        }
    }

    pub fn is_flying(&self) -> bool {
        self.happened() && !self.finished()
    }

    /// Check if the towplane of this flight is still up.
    pub fn is_towplane_flying(&self) -> bool {
        self.happened() && !self.towflight_landed
    }

    /// Check if this record is a towflight, either entered as one or derived
    /// from an air tow.
    pub fn is_towflight(&self) -> bool {
        self.flight_type == Some(FlightType::Tow)
    }

    /// Get the time this flight is attributed to: the departure time if it
    /// departs here and has departed, else the landing time if it lands here
    /// and has landed.
    pub fn effective_time(&self) -> Option<DateTime<Utc>> {
        if self.departs_here() && self.departed {
            return self.departure_time;
        }
        if self.lands_here() && self.landed {
            return self.landing_time;
        }
        None
    }

    /// Get the operational date this flight is attributed to.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.effective_time().map(|t| t.date_naive())
    }

    pub fn duration(&self) -> Option<TimeDelta> {
        if !(self.departed && self.landed) {
            return None;
        }
        match (self.departure_time, self.landing_time) {
            (Some(departure), Some(landing)) => Some(landing.signed_duration_since(departure)),
            _ => None,
        }
    }

    pub fn towflight_duration(&self) -> Option<TimeDelta> {
        if !(self.departed && self.towflight_landed) {
            return None;
        }
        match (self.departure_time, self.towflight_landing_time) {
            (Some(departure), Some(landing)) => Some(landing.signed_duration_since(departure)),
            _ => None,
        }
    }

    pub fn count_flying(flights: &[Flight]) -> usize {
        flights.iter().filter(|f| f.is_flying()).count()
    }

    pub fn count_happened(flights: &[Flight]) -> usize {
        flights.iter().filter(|f| f.happened()).count()
    }

    // ** Transitions **

    pub fn check_depart(&self) -> Result<(), Denial> {
        if self.lands_here() && self.landed && !self.departed {
            return Err(Denial::AlreadyLanded);
        }
        if !self.departs_here() {
            return Err(Denial::DoesNotDepartHere);
        }
        if self.departed {
            return Err(Denial::AlreadyDeparted);
        }
        Ok(())
    }

    /// Record the departure at `now`.
    pub fn depart(&mut self, now: DateTime<Utc>) -> Result<(), Denial> {
        self.check_depart()?;
        self.apply_depart(now);
        Ok(())
    }

    /// Record the departure regardless of the guard.
    pub fn force_depart(&mut self, now: DateTime<Utc>) {
        if let Err(denial) = self.check_depart() {
            warn!("Forcing departure of flight {}: {}", self.id, denial);
        }
        self.apply_depart(now);
    }

    fn apply_depart(&mut self, now: DateTime<Utc>) {
        self.departure_time = Some(now);
        self.departed = true;
    }

    pub fn check_land(&self) -> Result<(), Denial> {
        if self.landed {
            return Err(Denial::AlreadyLanded);
        }
        // A towflight record lands here regardless of its mode; for the
        // towed flight the mode decides.
        if !self.is_towflight() && !self.lands_here() {
            return Err(Denial::DoesNotLandHere);
        }
        if self.departs_here() && !self.departed {
            return Err(Denial::NotYetDeparted);
        }
        Ok(())
    }

    /// Record the landing at `now`. An unset landing location defaults to
    /// the departure location for flights departing here, or to
    /// `home_location` otherwise.
    pub fn land(&mut self, now: DateTime<Utc>, home_location: &str) -> Result<(), Denial> {
        self.check_land()?;
        self.apply_land(now, home_location);
        Ok(())
    }

    /// Record the landing regardless of the guard.
    pub fn force_land(&mut self, now: DateTime<Utc>, home_location: &str) {
        if let Err(denial) = self.check_land() {
            warn!("Forcing landing of flight {}: {}", self.id, denial);
        }
        self.apply_land(now, home_location);
    }

    fn apply_land(&mut self, now: DateTime<Utc>, home_location: &str) {
        self.landing_time = Some(now);
        self.num_landings += 1;
        self.landed = true;
        if entry_is_empty(&self.landing_location) {
            if self.departs_here() {
                self.landing_location = self.departure_location.clone();
            } else {
                self.landing_location = home_location.to_string();
            }
        }
    }

    pub fn check_touch_and_go(&self) -> Result<(), Denial> {
        if self.is_towflight() {
            return Err(Denial::TowflightsCannotTouchAndGo);
        }
        if self.landed {
            return Err(Denial::AlreadyLanded);
        }
        if self.departs_here() && !self.departed {
            return Err(Denial::NotYetDeparted);
        }
        Ok(())
    }

    /// Count a touch-and-go. Only the landing count changes.
    pub fn touch_and_go(&mut self) -> Result<(), Denial> {
        self.check_touch_and_go()?;
        self.num_landings += 1;
        Ok(())
    }

    pub fn force_touch_and_go(&mut self) {
        if let Err(denial) = self.check_touch_and_go() {
            warn!("Forcing touch-and-go of flight {}: {}", self.id, denial);
        }
        self.num_landings += 1;
    }

    pub fn check_land_towflight(&self) -> Result<(), Denial> {
        if self.towflight_landed {
            return Err(Denial::TowflightAlreadyLanded);
        }
        if self.departs_here() && !self.departed {
            return Err(Denial::NotYetDeparted);
        }
        Ok(())
    }

    /// Record the towplane's landing at `now` on the towed flight.
    pub fn land_towflight(
        &mut self,
        now: DateTime<Utc>,
        home_location: &str,
    ) -> Result<(), Denial> {
        self.check_land_towflight()?;
        self.apply_land_towflight(now, home_location);
        Ok(())
    }

    pub fn force_land_towflight(&mut self, now: DateTime<Utc>, home_location: &str) {
        if let Err(denial) = self.check_land_towflight() {
            warn!("Forcing towflight landing of flight {}: {}", self.id, denial);
        }
        self.apply_land_towflight(now, home_location);
    }

    fn apply_land_towflight(&mut self, now: DateTime<Utc>, home_location: &str) {
        self.towflight_landing_time = Some(now);
        self.towflight_landed = true;
        if self.towflight_lands_here() && entry_is_empty(&self.towflight_landing_location) {
            if self.departs_here() {
                self.towflight_landing_location = self.departure_location.clone();
            } else {
                self.towflight_landing_location = home_location.to_string();
            }
        }
    }

    // ** Towflight derivation **

    /// Derive the towflight record for this flight.
    ///
    /// The towflight keeps the id of the towed flight; it has no id of its
    /// own. The two records are told apart by the forced `Tow` type.
    pub fn make_towflight(&self, towplane_id: Id, launch_method_id: Id) -> Flight {
        let mut towflight = Flight::new(self.id);

        // The towplane either comes from the caller (resolved from the
        // launch method registration) or is recorded on the flight itself.
        towflight.plane_id = if towplane_id.is_valid() {
            towplane_id
        } else {
            self.towplane_id
        };

        // The pilot of the towflight is the towpilot of the towed flight.
        // There is no tow copilot, and the name fallbacks stay empty.
        towflight.pilot_id = self.towpilot_id;
        towflight.launch_method_id = launch_method_id;
        towflight.flight_type = Some(FlightType::Tow);
        towflight.mode = self.towflight_mode;
        towflight.towflight_mode = None;

        towflight.departed = self.departed;
        towflight.landed = self.towflight_landed;
        towflight.towflight_landed = false;
        towflight.departure_time = self.departure_time;
        towflight.landing_time = self.towflight_landing_time;
        towflight.towflight_landing_time = None;

        towflight.departure_location = self.departure_location.clone();
        towflight.landing_location = self.towflight_landing_location.clone();
        towflight.towflight_landing_location = String::new();
        towflight.num_landings = if self.towflight_lands_here() && self.towflight_landed {
            1
        } else {
            0
        };

        towflight.comments = format!("Towflight for flight {}", self.id);
        towflight.towplane_id = Id::INVALID;

        towflight
    }
}
