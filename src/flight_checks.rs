use crate::flights::{Flight, FlightType, entry_is_empty};
use crate::launch_methods::LaunchMethod;
use crate::planes::Plane;

/// Everything that can be wrong with a flight log entry. A violation is a
/// finding, not a failure; callers decide severity and presentation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlightError {
    MissingId,
    MissingPlane,
    MissingPilot,
    PilotOnlyFirstName,
    PilotOnlyLastName,
    PilotNotIdentified,
    CopilotOnlyFirstName,
    CopilotOnlyLastName,
    CopilotNotIdentified,
    PilotEqualsCopilot,
    TowpilotOnlyFirstName,
    TowpilotOnlyLastName,
    TowpilotNotIdentified,
    PilotEqualsTowpilot,
    TrainingWithoutInstructor,
    CopilotNotAllowed,
    LandedButNotDeparted,
    LandingBeforeDeparture,
    MissingLaunchMethod,
    MissingMode,
    MissingTowflightMode,
    MissingFlightType,
    NegativeLandings,
    LandedWithZeroLandings,
    TowflightLandedButNotDeparted,
    TowflightLandingBeforeDeparture,
    TwoSeatTrainingInSingleSeater,
    MissingDepartureLocation,
    MissingLandingLocation,
    MissingTowflightLandingLocation,
    GliderWithMultipleLandings,
    GliderLandingsWithoutLandingTime,
    CopilotInSingleSeater,
    GuestFlightInSingleSeater,
    LandingsWithoutDeparture,
    DepartureLocationEqualsLandingLocation,
    MissingTowplane,
    TowplaneIsGlider,
}

impl std::fmt::Display for FlightError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlightError::MissingId => "the flight has no id",
            FlightError::MissingPlane => "no plane specified",
            FlightError::MissingPilot => "no pilot specified",
            FlightError::PilotOnlyFirstName => "only a first name is specified for the pilot",
            FlightError::PilotOnlyLastName => "only a last name is specified for the pilot",
            FlightError::PilotNotIdentified => "the pilot is not identified",
            FlightError::CopilotOnlyFirstName => "only a first name is specified for the copilot",
            FlightError::CopilotOnlyLastName => "only a last name is specified for the copilot",
            FlightError::CopilotNotIdentified => "the copilot is not identified",
            FlightError::PilotEqualsCopilot => "pilot and copilot are identical",
            FlightError::TowpilotOnlyFirstName => "only a first name is specified for the towpilot",
            FlightError::TowpilotOnlyLastName => "only a last name is specified for the towpilot",
            FlightError::TowpilotNotIdentified => "the towpilot is not identified",
            FlightError::PilotEqualsTowpilot => "pilot and towpilot are identical",
            FlightError::TrainingWithoutInstructor => "two-seat training without an instructor",
            FlightError::CopilotNotAllowed => "a copilot is not allowed for this flight type",
            FlightError::LandedButNotDeparted => "the flight has landed but not departed",
            FlightError::LandingBeforeDeparture => "the landing is before the departure",
            FlightError::MissingLaunchMethod => "no launch method specified",
            FlightError::MissingMode => "no mode specified",
            FlightError::MissingTowflightMode => "no mode specified for the towflight",
            FlightError::MissingFlightType => "no flight type specified",
            FlightError::NegativeLandings => "negative number of landings",
            FlightError::LandedWithZeroLandings => {
                "the flight has landed but the number of landings is zero"
            }
            FlightError::TowflightLandedButNotDeparted => {
                "the towflight has landed but not departed"
            }
            FlightError::TowflightLandingBeforeDeparture => {
                "the towflight landing is before the departure"
            }
            FlightError::TwoSeatTrainingInSingleSeater => "two-seat training in a single-seater",
            FlightError::MissingDepartureLocation => "no departure location specified",
            FlightError::MissingLandingLocation => "no landing location specified",
            FlightError::MissingTowflightLandingLocation => {
                "no landing location specified for the towplane"
            }
            FlightError::GliderWithMultipleLandings => "a glider makes more than one landing",
            FlightError::GliderLandingsWithoutLandingTime => {
                "a glider has landings without a landing time"
            }
            FlightError::CopilotInSingleSeater => "copilot in a single-seater",
            FlightError::GuestFlightInSingleSeater => "guest flight in a single-seater",
            FlightError::LandingsWithoutDeparture => "landings recorded without a departure",
            FlightError::DepartureLocationEqualsLandingLocation => {
                "departure location equals landing location"
            }
            FlightError::MissingTowplane => "no towplane specified",
            FlightError::TowplaneIsGlider => "the towplane is a glider",
        };
        write!(f, "{}", s)
    }
}

/// Everything the rules may look at: the flight plus the referenced plane,
/// towplane and launch method where they could be resolved, and the setting
/// that decides whether towpilots are recorded at all.
#[derive(Debug, Copy, Clone)]
pub struct CheckContext<'a> {
    pub flight: &'a Flight,
    pub plane: Option<&'a Plane>,
    pub towplane: Option<&'a Plane>,
    pub launch_method: Option<&'a LaunchMethod>,
    pub record_towpilot: bool,
}

// A launch method that could not be resolved counts as requiring a person
// and as not being an air tow.
fn person_required(ctx: &CheckContext) -> bool {
    ctx.launch_method.is_none_or(|lm| lm.person_required)
}

fn is_airtow(ctx: &CheckContext) -> bool {
    ctx.launch_method.is_some_and(|lm| lm.is_airtow())
}

fn towplane_known(ctx: &CheckContext) -> bool {
    ctx.launch_method.is_some_and(|lm| lm.towplane_known())
}

fn copilot_recorded(ctx: &CheckContext) -> bool {
    ctx.flight.flight_type.is_some_and(|t| t.copilot_recorded())
}

fn plane_is_single_seater(ctx: &CheckContext) -> bool {
    ctx.plane.is_some_and(|p| p.is_single_seater())
}

fn plane_is_glider(ctx: &CheckContext) -> bool {
    ctx.plane.is_some_and(|p| p.is_glider())
}

struct Rule {
    on_flight: bool,
    on_towflight: bool,
    code: FlightError,
    violated: fn(&CheckContext) -> bool,
}

/// The rule list. Evaluation order is declaration order and is part of the
/// contract: an iterator position refers to a fixed rule, so iteration can
/// be resumed as long as the data does not change in between. Every rule
/// occupies a position whether or not its scope is being checked.
const RULES: &[Rule] = &[
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingId,
        violated: |ctx: &CheckContext| ctx.flight.id.is_invalid(),
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingPlane,
        violated: |ctx: &CheckContext| ctx.flight.plane_id.is_invalid(),
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingPilot,
        violated: |ctx: &CheckContext| {
            person_required(ctx)
                && ctx.flight.pilot_id.is_invalid()
                && ctx.flight.pilot_first_name.is_empty()
                && ctx.flight.pilot_last_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::PilotOnlyFirstName,
        violated: |ctx: &CheckContext| {
            ctx.flight.pilot_id.is_invalid()
                && !ctx.flight.pilot_first_name.is_empty()
                && ctx.flight.pilot_last_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::PilotOnlyLastName,
        violated: |ctx: &CheckContext| {
            ctx.flight.pilot_id.is_invalid()
                && !ctx.flight.pilot_last_name.is_empty()
                && ctx.flight.pilot_first_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::PilotNotIdentified,
        violated: |ctx: &CheckContext| {
            ctx.flight.pilot_id.is_invalid()
                && !ctx.flight.pilot_last_name.is_empty()
                && !ctx.flight.pilot_first_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::CopilotOnlyFirstName,
        violated: |ctx: &CheckContext| {
            copilot_recorded(ctx)
                && ctx.flight.copilot_id.is_invalid()
                && !ctx.flight.copilot_first_name.is_empty()
                && ctx.flight.copilot_last_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::CopilotOnlyLastName,
        violated: |ctx: &CheckContext| {
            copilot_recorded(ctx)
                && ctx.flight.copilot_id.is_invalid()
                && !ctx.flight.copilot_last_name.is_empty()
                && ctx.flight.copilot_first_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::CopilotNotIdentified,
        violated: |ctx: &CheckContext| {
            copilot_recorded(ctx)
                && ctx.flight.copilot_id.is_invalid()
                && !ctx.flight.copilot_last_name.is_empty()
                && !ctx.flight.copilot_first_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::PilotEqualsCopilot,
        violated: |ctx: &CheckContext| {
            copilot_recorded(ctx)
                && ctx.flight.pilot_id.is_valid()
                && ctx.flight.pilot_id == ctx.flight.copilot_id
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::TowpilotOnlyFirstName,
        violated: |ctx: &CheckContext| {
            ctx.record_towpilot
                && is_airtow(ctx)
                && ctx.flight.towpilot_id.is_invalid()
                && !ctx.flight.towpilot_first_name.is_empty()
                && ctx.flight.towpilot_last_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::TowpilotOnlyLastName,
        violated: |ctx: &CheckContext| {
            ctx.record_towpilot
                && is_airtow(ctx)
                && ctx.flight.towpilot_id.is_invalid()
                && !ctx.flight.towpilot_last_name.is_empty()
                && ctx.flight.towpilot_first_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::TowpilotNotIdentified,
        violated: |ctx: &CheckContext| {
            ctx.record_towpilot
                && is_airtow(ctx)
                && ctx.flight.towpilot_id.is_invalid()
                && !ctx.flight.towpilot_last_name.is_empty()
                && !ctx.flight.towpilot_first_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::PilotEqualsTowpilot,
        violated: |ctx: &CheckContext| {
            ctx.record_towpilot
                && is_airtow(ctx)
                && ctx.flight.towpilot_id.is_valid()
                && ctx.flight.pilot_id == ctx.flight.towpilot_id
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::TrainingWithoutInstructor,
        violated: |ctx: &CheckContext| {
            ctx.flight.copilot_id.is_invalid()
                && ctx.flight.flight_type == Some(FlightType::TwoSeatTraining)
                && ctx.flight.copilot_last_name.is_empty()
                && ctx.flight.copilot_first_name.is_empty()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::CopilotNotAllowed,
        violated: |ctx: &CheckContext| ctx.flight.copilot_id.is_valid() && !copilot_recorded(ctx),
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::LandedButNotDeparted,
        violated: |ctx: &CheckContext| {
            ctx.flight.departs_here()
                && ctx.flight.lands_here()
                && ctx.flight.landed
                && !ctx.flight.departed
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::LandingBeforeDeparture,
        violated: |ctx: &CheckContext| {
            ctx.flight.departs_here()
                && ctx.flight.lands_here()
                && ctx.flight.departed
                && ctx.flight.landed
                && ctx
                    .flight
                    .departure_time
                    .zip(ctx.flight.landing_time)
                    .is_some_and(|(departure, landing)| departure > landing)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingLaunchMethod,
        violated: |ctx: &CheckContext| {
            ctx.flight.launch_method_id.is_invalid()
                && ctx.flight.departed
                && ctx.flight.departs_here()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingMode,
        violated: |ctx: &CheckContext| ctx.flight.mode.is_none(),
    },
    Rule {
        on_flight: false,
        on_towflight: true,
        code: FlightError::MissingTowflightMode,
        violated: |ctx: &CheckContext| ctx.flight.towflight_mode.is_none(),
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingFlightType,
        violated: |ctx: &CheckContext| ctx.flight.flight_type.is_none(),
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::NegativeLandings,
        violated: |ctx: &CheckContext| ctx.flight.num_landings < 0,
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::LandedWithZeroLandings,
        violated: |ctx: &CheckContext| {
            ctx.flight.lands_here() && ctx.flight.num_landings == 0 && ctx.flight.landed
        },
    },
    Rule {
        on_flight: false,
        on_towflight: true,
        code: FlightError::TowflightLandedButNotDeparted,
        violated: |ctx: &CheckContext| {
            ctx.flight.departs_here()
                && ctx.flight.towflight_lands_here()
                && ctx.flight.towflight_landed
                && !ctx.flight.departed
        },
    },
    Rule {
        on_flight: false,
        on_towflight: true,
        code: FlightError::TowflightLandingBeforeDeparture,
        violated: |ctx: &CheckContext| {
            ctx.flight.departs_here()
                && ctx.flight.towflight_lands_here()
                && ctx.flight.departed
                && ctx.flight.towflight_landed
                && ctx
                    .flight
                    .departure_time
                    .zip(ctx.flight.towflight_landing_time)
                    .is_some_and(|(departure, landing)| departure > landing)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::TwoSeatTrainingInSingleSeater,
        violated: |ctx: &CheckContext| {
            plane_is_single_seater(ctx)
                && ctx.flight.flight_type == Some(FlightType::TwoSeatTraining)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingDepartureLocation,
        violated: |ctx: &CheckContext| {
            (ctx.flight.departed || !ctx.flight.departs_here())
                && entry_is_empty(&ctx.flight.departure_location)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingLandingLocation,
        violated: |ctx: &CheckContext| {
            (ctx.flight.landed || !ctx.flight.lands_here())
                && entry_is_empty(&ctx.flight.landing_location)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingTowflightLandingLocation,
        violated: |ctx: &CheckContext| {
            // Only meaningful for air tows. A missing towflight mode is
            // reported by its own rule, not by demanding a location.
            is_airtow(ctx)
                && (ctx.flight.towflight_landed
                    || ctx.flight.towflight_mode.is_some_and(|m| !m.lands_here()))
                && entry_is_empty(&ctx.flight.towflight_landing_location)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::GliderWithMultipleLandings,
        violated: |ctx: &CheckContext| {
            plane_is_glider(ctx) && ctx.flight.num_landings > 1 && !is_airtow(ctx)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::GliderLandingsWithoutLandingTime,
        violated: |ctx: &CheckContext| {
            plane_is_glider(ctx)
                && !ctx.flight.landed
                && ctx.flight.num_landings > 0
                && !is_airtow(ctx)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::CopilotInSingleSeater,
        violated: |ctx: &CheckContext| {
            plane_is_single_seater(ctx) && copilot_recorded(ctx) && ctx.flight.copilot_id.is_valid()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::GuestFlightInSingleSeater,
        violated: |ctx: &CheckContext| {
            plane_is_single_seater(ctx) && ctx.flight.flight_type == Some(FlightType::GuestPrivate)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::GuestFlightInSingleSeater,
        violated: |ctx: &CheckContext| {
            plane_is_single_seater(ctx) && ctx.flight.flight_type == Some(FlightType::GuestExternal)
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::LandingsWithoutDeparture,
        violated: |ctx: &CheckContext| {
            ctx.flight.departs_here() && ctx.flight.num_landings > 0 && !ctx.flight.departed
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::DepartureLocationEqualsLandingLocation,
        violated: |ctx: &CheckContext| {
            ctx.flight.departs_here() != ctx.flight.lands_here()
                && ctx.flight.departure_location == ctx.flight.landing_location
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::MissingTowplane,
        violated: |ctx: &CheckContext| {
            is_airtow(ctx) && !towplane_known(ctx) && ctx.flight.towplane_id.is_invalid()
        },
    },
    Rule {
        on_flight: true,
        on_towflight: false,
        code: FlightError::TowplaneIsGlider,
        violated: |ctx: &CheckContext| {
            is_airtow(ctx)
                && !towplane_known(ctx)
                && ctx.towplane.is_some_and(|p| p.is_glider())
        },
    },
];

impl<'a> CheckContext<'a> {
    /// Iterate the violations of the flight itself.
    pub fn errors(self) -> ErrorIter<'a> {
        ErrorIter {
            context: self,
            index: 0,
            check_flight: true,
            check_towflight: false,
        }
    }

    /// Iterate the violations of the towflight side of an air tow.
    pub fn towflight_errors(self) -> ErrorIter<'a> {
        ErrorIter {
            context: self,
            index: 0,
            check_flight: false,
            check_towflight: true,
        }
    }

    /// Get the first violation of the flight, if any.
    pub fn first_error(self) -> Option<FlightError> {
        self.errors().next()
    }

    pub fn has_errors(self) -> bool {
        self.errors().next().is_some()
    }

    pub fn has_towflight_errors(self) -> bool {
        self.towflight_errors().next().is_some()
    }
}

/// Iterator over the violated rules, in rule list order. The iterator only
/// borrows the context, so enumeration can stop at any point and a fresh
/// iterator re-checks from the top.
pub struct ErrorIter<'a> {
    context: CheckContext<'a>,
    index: usize,
    check_flight: bool,
    check_towflight: bool,
}

impl Iterator for ErrorIter<'_> {
    type Item = FlightError;

    fn next(&mut self) -> Option<FlightError> {
        while self.index < RULES.len() {
            let rule = &RULES[self.index];
            self.index += 1;
            let in_scope = (self.check_flight && rule.on_flight)
                || (self.check_towflight && rule.on_towflight);
            if in_scope && (rule.violated)(&self.context) {
                return Some(rule.code);
            }
        }
        None
    }
}
