//! Fixed-point conversion helpers.
//!
//! The device reports physical quantities as scaled integers: temperatures
//! at 1/100 resolution, electrical quantities at 1/1000. Scaling is applied
//! by the accessor layer, never by the frame codec, so these helpers are the
//! single place the resolution constants live.

/// Convert a raw 1/100-degree reading to degrees Celsius.
///
/// # Example
///
/// ```
/// use pmulib_core::celsius_from_centi;
///
/// assert_eq!(celsius_from_centi(2345), 23.45);
/// assert_eq!(celsius_from_centi(-1050), -10.5);
/// ```
pub fn celsius_from_centi(raw: i64) -> f64 {
    raw as f64 / 100.0
}

/// Convert a raw millivolt reading to volts.
///
/// # Example
///
/// ```
/// use pmulib_core::volts_from_milli;
///
/// assert_eq!(volts_from_milli(12150), 12.15);
/// ```
pub fn volts_from_milli(raw: i64) -> f64 {
    raw as f64 / 1000.0
}

/// Convert a raw milliamp reading to amps.
///
/// Battery current is signed: negative values mean the battery is
/// discharging into the system.
///
/// # Example
///
/// ```
/// use pmulib_core::amps_from_milli;
///
/// assert_eq!(amps_from_milli(1500), 1.5);
/// assert_eq!(amps_from_milli(-500), -0.5);
/// ```
pub fn amps_from_milli(raw: i64) -> f64 {
    raw as f64 / 1000.0
}

/// Convert a raw milliwatt reading to watts.
///
/// Battery power is signed, with the same discharge convention as
/// [`amps_from_milli`].
///
/// # Example
///
/// ```
/// use pmulib_core::watts_from_milli;
///
/// assert_eq!(watts_from_milli(4750), 4.75);
/// ```
pub fn watts_from_milli(raw: i64) -> f64 {
    raw as f64 / 1000.0
}
