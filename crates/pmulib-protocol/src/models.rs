//! Typed views of the device's single-byte enums and packed descriptors.
//!
//! The wire carries bare bytes; these types give them names and make
//! illegal values unrepresentable past the decode boundary. Decoding an
//! unknown byte is a protocol error, not a panic — firmware newer than
//! this crate may grow values we do not know about.

use std::fmt;

use pmulib_core::{Error, Result};

/// Power path the device is currently running on.
///
/// Read-only: the device selects its own mode from supply and battery
/// conditions, hosts can only observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkingMode {
    /// On external power, battery charging.
    Charging,
    /// On external power, battery full.
    FullyCharged,
    /// Running from the battery.
    BatteryPowered,
}

impl WorkingMode {
    /// Decode the wire byte.
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(WorkingMode::Charging),
            2 => Ok(WorkingMode::FullyCharged),
            3 => Ok(WorkingMode::BatteryPowered),
            other => Err(Error::Protocol(format!("unknown working mode {other}"))),
        }
    }
}

impl fmt::Display for WorkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkingMode::Charging => "charging",
            WorkingMode::FullyCharged => "fully-charged",
            WorkingMode::BatteryPowered => "battery-powered",
        };
        write!(f, "{s}")
    }
}

/// Fan control policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanMode {
    /// Fan forced on.
    On,
    /// Fan forced off.
    Off,
    /// Fan driven by the temperature automation thresholds.
    Auto,
}

impl FanMode {
    /// Decode the wire byte.
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(FanMode::On),
            2 => Ok(FanMode::Off),
            3 => Ok(FanMode::Auto),
            other => Err(Error::Protocol(format!("unknown fan mode {other}"))),
        }
    }

    /// Wire byte for this mode.
    pub fn as_byte(&self) -> u8 {
        match self {
            FanMode::On => 1,
            FanMode::Off => 2,
            FanMode::Auto => 3,
        }
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FanMode::On => "on",
            FanMode::Off => "off",
            FanMode::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// Result of the device's fan self-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanHealth {
    /// Fan spins when driven.
    Healthy,
    /// Fan does not respond to drive.
    Broken,
}

impl FanHealth {
    /// Decode the wire byte.
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(FanHealth::Healthy),
            2 => Ok(FanHealth::Broken),
            other => Err(Error::Protocol(format!("unknown fan health {other}"))),
        }
    }
}

impl fmt::Display for FanHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FanHealth::Healthy => "healthy",
            FanHealth::Broken => "broken",
        };
        write!(f, "{s}")
    }
}

/// Temperature thresholds driving the fan in [`FanMode::Auto`].
///
/// Below `slow_threshold` the fan is off; between the thresholds it runs
/// slow; at or above `fast_threshold` it runs full speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanAutomation {
    /// Slow-spin onset, degrees Celsius. Valid range 0..=100.
    pub slow_threshold: u8,
    /// Full-speed onset, degrees Celsius. Valid range 0..=100.
    pub fast_threshold: u8,
}

impl FanAutomation {
    /// Hottest expressible threshold.
    pub const MAX_THRESHOLD: u8 = 100;

    /// Encode as the 2-byte request payload.
    pub fn encode(&self) -> Result<[u8; 2]> {
        if self.slow_threshold > Self::MAX_THRESHOLD {
            return Err(Error::InvalidParameter(format!(
                "slow threshold {} C out of range 0..=100",
                self.slow_threshold
            )));
        }
        if self.fast_threshold > Self::MAX_THRESHOLD {
            return Err(Error::InvalidParameter(format!(
                "fast threshold {} C out of range 0..=100",
                self.fast_threshold
            )));
        }
        Ok([self.slow_threshold, self.fast_threshold])
    }

    /// Decode from a 2-byte response payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() != 2 {
            return Err(Error::InvalidPayloadLength {
                expected: 2,
                got: payload.len(),
            });
        }
        Ok(FanAutomation {
            slow_threshold: payload[0],
            fast_threshold: payload[1],
        })
    }
}

/// Last event recorded on a user button.
///
/// The device latches the most recent press; zero means nothing has been
/// recorded since the last read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonEvent {
    /// No press recorded.
    NoEvent,
    /// Short press.
    ShortPress,
    /// Long press.
    LongPress,
    /// Button released.
    Released,
}

impl ButtonEvent {
    /// Decode the wire byte.
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(ButtonEvent::NoEvent),
            1 => Ok(ButtonEvent::ShortPress),
            2 => Ok(ButtonEvent::LongPress),
            3 => Ok(ButtonEvent::Released),
            other => Err(Error::Protocol(format!("unknown button event {other}"))),
        }
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ButtonEvent::NoEvent => "none",
            ButtonEvent::ShortPress => "short-press",
            ButtonEvent::LongPress => "long-press",
            ButtonEvent::Released => "released",
        };
        write!(f, "{s}")
    }
}

/// RGB LED animation pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RgbAnimationKind {
    /// LEDs off.
    Disabled,
    /// Pulsing heartbeat.
    Heartbeat,
    /// Color mapped from battery temperature.
    TempMap,
}

impl RgbAnimationKind {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(RgbAnimationKind::Disabled),
            2 => Ok(RgbAnimationKind::Heartbeat),
            3 => Ok(RgbAnimationKind::TempMap),
            other => Err(Error::Protocol(format!("unknown rgb animation {other}"))),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            RgbAnimationKind::Disabled => 1,
            RgbAnimationKind::Heartbeat => 2,
            RgbAnimationKind::TempMap => 3,
        }
    }
}

/// RGB LED base color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RgbColor {
    Red,
    Green,
    Blue,
    Yellow,
    Cyan,
    Magenta,
    White,
    Black,
}

impl RgbColor {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(RgbColor::Red),
            2 => Ok(RgbColor::Green),
            3 => Ok(RgbColor::Blue),
            4 => Ok(RgbColor::Yellow),
            5 => Ok(RgbColor::Cyan),
            6 => Ok(RgbColor::Magenta),
            7 => Ok(RgbColor::White),
            8 => Ok(RgbColor::Black),
            other => Err(Error::Protocol(format!("unknown rgb color {other}"))),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            RgbColor::Red => 1,
            RgbColor::Green => 2,
            RgbColor::Blue => 3,
            RgbColor::Yellow => 4,
            RgbColor::Cyan => 5,
            RgbColor::Magenta => 6,
            RgbColor::White => 7,
            RgbColor::Black => 8,
        }
    }
}

/// RGB animation speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RgbSpeed {
    Slow,
    Normal,
    Fast,
}

impl RgbSpeed {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(RgbSpeed::Slow),
            2 => Ok(RgbSpeed::Normal),
            3 => Ok(RgbSpeed::Fast),
            other => Err(Error::Protocol(format!("unknown rgb speed {other}"))),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            RgbSpeed::Slow => 1,
            RgbSpeed::Normal => 2,
            RgbSpeed::Fast => 3,
        }
    }
}

/// Full RGB LED animation setting, one wire byte per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbAnimation {
    pub kind: RgbAnimationKind,
    pub color: RgbColor,
    pub speed: RgbSpeed,
}

impl RgbAnimation {
    /// Encode as the 3-byte request payload.
    pub fn encode(&self) -> [u8; 3] {
        [
            self.kind.as_byte(),
            self.color.as_byte(),
            self.speed.as_byte(),
        ]
    }

    /// Decode from a 3-byte response payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() != 3 {
            return Err(Error::InvalidPayloadLength {
                expected: 3,
                got: payload.len(),
            });
        }
        Ok(RgbAnimation {
            kind: RgbAnimationKind::from_byte(payload[0])?,
            color: RgbColor::from_byte(payload[1])?,
            speed: RgbSpeed::from_byte(payload[2])?,
        })
    }
}

impl fmt::Display for RgbAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}",
            self.kind, self.color, self.speed
        )
    }
}

/// Power-outage cycling behavior.
///
/// On supply loss the device keeps the host up for `run_minutes`, cuts
/// power, sleeps for `sleep_minutes`, then powers the host back on. The
/// cycle repeats until external power returns. Setting `sleep_minutes`
/// to the maximum (1439) disables the wake-up entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerOutageParams {
    /// Off time per cycle, minutes. Valid range 2..=1439.
    pub sleep_minutes: u16,
    /// On time per cycle, minutes. Valid range 0..=1437.
    pub run_minutes: u16,
}

impl PowerOutageParams {
    /// Largest expressible sleep time; also the "never wake" sentinel.
    pub const MAX_SLEEP_MINUTES: u16 = 1439;

    /// Encode as the 4-byte request payload, both fields big-endian.
    pub fn encode(&self) -> Result<[u8; 4]> {
        if !(2..=Self::MAX_SLEEP_MINUTES).contains(&self.sleep_minutes) {
            return Err(Error::InvalidParameter(format!(
                "sleep time {} min out of range 2..=1439",
                self.sleep_minutes
            )));
        }
        if self.run_minutes > 1437 {
            return Err(Error::InvalidParameter(format!(
                "run time {} min out of range 0..=1437",
                self.run_minutes
            )));
        }
        let mut out = [0u8; 4];
        out[0..2].copy_from_slice(&self.sleep_minutes.to_be_bytes());
        out[2..4].copy_from_slice(&self.run_minutes.to_be_bytes());
        Ok(out)
    }

    /// Decode from a 4-byte response payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() != 4 {
            return Err(Error::InvalidPayloadLength {
                expected: 4,
                got: payload.len(),
            });
        }
        Ok(PowerOutageParams {
            sleep_minutes: u16::from_be_bytes([payload[0], payload[1]]),
            run_minutes: u16::from_be_bytes([payload[2], payload[3]]),
        })
    }
}

/// When a scheduled event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleKind {
    /// Slot disabled.
    NoEvent,
    /// At a fixed daily wall-clock time.
    Time,
    /// Every N seconds/minutes/hours.
    Interval,
}

impl ScheduleKind {
    pub fn as_byte(&self) -> u8 {
        match self {
            ScheduleKind::NoEvent => 0,
            ScheduleKind::Time => 1,
            ScheduleKind::Interval => 2,
        }
    }
}

/// Whether a scheduled event re-arms after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepeatMode {
    OneShot,
    Repeated,
}

impl RepeatMode {
    pub fn as_byte(&self) -> u8 {
        match self {
            RepeatMode::OneShot => 0,
            RepeatMode::Repeated => 1,
        }
    }
}

/// Unit for interval-type schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
}

impl IntervalUnit {
    pub fn as_byte(&self) -> u8 {
        match self {
            IntervalUnit::Seconds => 1,
            IntervalUnit::Minutes => 2,
            IntervalUnit::Hours => 3,
        }
    }
}

/// What the device does when a scheduled event fires.
///
/// Wire values are bit-like (1, 2, 4); the device reserves the gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAction {
    /// Power the host on.
    Start,
    /// Cut host power without negotiation.
    HardShutdown,
    /// Cut and restore host power.
    HardReboot,
}

impl EventAction {
    pub fn as_byte(&self) -> u8 {
        match self {
            EventAction::Start => 1,
            EventAction::HardShutdown => 2,
            EventAction::HardReboot => 4,
        }
    }
}

/// One scheduled-event slot, as installed on the device.
///
/// For [`ScheduleKind::Time`] events `time_or_interval` is seconds past
/// local midnight (`epoch_local % 86400`) and `day_mask` selects weekdays.
/// For [`ScheduleKind::Interval`] events it is a count of
/// [`IntervalUnit`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEvent {
    /// Slot id, 1..=10.
    pub id: u8,
    pub schedule: ScheduleKind,
    pub repeat: RepeatMode,
    /// Daily time in seconds, or interval count, depending on `schedule`.
    pub time_or_interval: u32,
    pub interval_unit: IntervalUnit,
    /// Weekday selector: bit 0 is Monday through bit 6 Sunday. Bit 7 is
    /// reserved and must stay clear.
    pub day_mask: u8,
    pub action: EventAction,
}

impl ScheduledEvent {
    /// Smallest valid slot id.
    pub const MIN_ID: u8 = 1;
    /// Largest valid slot id.
    pub const MAX_ID: u8 = 10;
    /// Day mask selecting all seven weekdays.
    pub const EVERY_DAY: u8 = 0x7F;

    /// Encode as the 10-byte request payload.
    ///
    /// Layout: id, schedule, repeat, time/interval (u32 big-endian), unit,
    /// day mask, action.
    pub fn encode(&self) -> Result<[u8; 10]> {
        if !(Self::MIN_ID..=Self::MAX_ID).contains(&self.id) {
            return Err(Error::InvalidParameter(format!(
                "event id {} out of range 1..=10",
                self.id
            )));
        }
        if self.day_mask & 0x80 != 0 {
            return Err(Error::InvalidParameter(
                "day mask bit 7 is reserved".to_string(),
            ));
        }
        let mut out = [0u8; 10];
        out[0] = self.id;
        out[1] = self.schedule.as_byte();
        out[2] = self.repeat.as_byte();
        out[3..7].copy_from_slice(&self.time_or_interval.to_be_bytes());
        out[7] = self.interval_unit.as_byte();
        out[8] = self.day_mask;
        out[9] = self.action.as_byte();
        Ok(out)
    }
}

/// Expand the installed-event bitmask into slot ids.
///
/// Bit `i` of the mask marks slot `i + 1` as occupied; ids come back in
/// ascending order.
pub fn event_ids_from_mask(mask: u16) -> Vec<u8> {
    (0..ScheduledEvent::MAX_ID)
        .filter(|i| mask & (1 << i) != 0)
        .map(|i| i + 1)
        .collect()
}

/// Firmware revision string reported by the device.
///
/// Always eight ASCII characters on the wire, e.g. `v1.00.00`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FirmwareVersion(String);

impl FirmwareVersion {
    /// Parse from the 8-byte response payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() != 8 {
            return Err(Error::InvalidPayloadLength {
                expected: 8,
                got: payload.len(),
            });
        }
        if !payload.iter().all(|b| b.is_ascii_graphic()) {
            return Err(Error::Protocol(format!(
                "firmware version is not printable ascii: {payload:02X?}"
            )));
        }
        // Checked ascii above, so this cannot fail.
        let s = String::from_utf8_lossy(payload).into_owned();
        Ok(FirmwareVersion(s))
    }

    /// The version text, e.g. `v1.00.00`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
