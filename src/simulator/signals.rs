//! Waveforms driving the sample variables.
//!
//! Every function here is pure in the tick counter so the driver loop and the
//! tests agree on the exact value at any tick.

/// Temperature baseline in degrees.
pub const TEMPERATURE_BASE: f64 = 25.0;
/// Peak deviation of the temperature sine wave.
pub const TEMPERATURE_AMPLITUDE: f64 = 5.0;
/// Angular step per tick of the temperature wave.
pub const TEMPERATURE_RATE: f64 = 0.1;

/// Peak pressure change per tick in hPa.
pub const PRESSURE_AMPLITUDE: f64 = 2.0;
/// Angular step per tick of the pressure drift.
pub const PRESSURE_RATE: f64 = 0.05;

/// Number of ticks between two status flips.
pub const STATUS_PERIOD: u64 = 5;

pub fn temperature_at(tick: u64) -> f64 {
    TEMPERATURE_BASE + TEMPERATURE_AMPLITUDE * (TEMPERATURE_RATE * tick as f64).sin()
}

/// Pressure after `tick`, given the value it held before that tick.
pub fn next_pressure(previous: f64, tick: u64) -> f64 {
    previous + PRESSURE_AMPLITUDE * (PRESSURE_RATE * tick as f64).sin()
}

pub fn status_toggles_at(tick: u64) -> bool {
    tick != 0 && tick % STATUS_PERIOD == 0
}
