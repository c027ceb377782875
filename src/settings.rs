use tracing::debug;

/// Operational settings of the synchronization core.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Name of the airfield this installation runs at. Used as the default
    /// landing location when a flight lands here and no location was entered.
    pub home_location: String,
    /// Whether towpilots are recorded on flights. When disabled, the
    /// towpilot validation rules are skipped.
    pub record_towpilot: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            home_location: String::new(),
            record_towpilot: true,
        }
    }
}

impl Settings {
    /// Read settings from the environment, falling back to the defaults for
    /// anything that is not set.
    ///
    /// Recognized variables: `FLIGHTLINE_HOME_LOCATION` and
    /// `FLIGHTLINE_RECORD_TOWPILOT` (`1`/`true`/`yes` to enable).
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        let record_towpilot = match std::env::var("FLIGHTLINE_RECORD_TOWPILOT") {
            Ok(value) => matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "y"
            ),
            Err(_) => defaults.record_towpilot,
        };

        let home_location =
            std::env::var("FLIGHTLINE_HOME_LOCATION").unwrap_or(defaults.home_location);

        debug!(
            "Settings: home location {:?}, record towpilot: {}",
            home_location, record_towpilot
        );

        Settings {
            home_location,
            record_towpilot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.home_location.is_empty());
        assert!(settings.record_towpilot);
    }
}
