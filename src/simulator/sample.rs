use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::signals::{next_pressure, status_toggles_at, temperature_at};

pub const INITIAL_TEMPERATURE: f64 = 25.0;
pub const INITIAL_PRESSURE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SampleStatus {
    Running,
    Stopped,
}

impl SampleStatus {
    pub fn toggled(self) -> Self {
        match self {
            SampleStatus::Running => SampleStatus::Stopped,
            SampleStatus::Stopped => SampleStatus::Running,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStatus::Running => "Running",
            SampleStatus::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Running" => Ok(SampleStatus::Running),
            "Stopped" => Ok(SampleStatus::Stopped),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

/// In-memory state of `MyObject`, advanced once per driver tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleObject {
    pub tick: u64,
    pub temperature: f64,
    pub pressure: f64,
    pub status: SampleStatus,
}

impl Default for SampleObject {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleObject {
    pub fn new() -> Self {
        Self {
            tick: 0,
            temperature: INITIAL_TEMPERATURE,
            pressure: INITIAL_PRESSURE,
            status: SampleStatus::Running,
        }
    }

    pub fn tick(&mut self) {
        self.tick += 1;

        self.temperature = temperature_at(self.tick);
        self.pressure = next_pressure(self.pressure, self.tick);

        if status_toggles_at(self.tick) {
            self.status = self.status.toggled();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_from_initial_values() {
        let sample = SampleObject::new();
        assert_eq!(sample.tick, 0);
        assert_eq!(sample.temperature, 25.0);
        assert_eq!(sample.pressure, 1.0);
        assert_eq!(sample.status, SampleStatus::Running);
    }

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in [SampleStatus::Running, SampleStatus::Stopped] {
            assert_eq!(status.to_string().parse::<SampleStatus>(), Ok(status));
        }
        assert!("Paused".parse::<SampleStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_pascal_case() {
        let json = serde_json::to_string(&SampleStatus::Stopped).unwrap();
        assert_eq!(json, "\"Stopped\"");
    }
}
