//! Command descriptors and the device opcode table.
//!
//! Every operation the MCU understands is described by a [`Command`]:
//! opcode, declared request payload width, and expected response length.
//! The full table lives in [`CommandSet`], built once and passed by
//! reference into the protocol engine — descriptors are plain immutable
//! data, never mutated after construction.
//!
//! Opcodes are grouped by function family: telemetry reads in `0x01..`,
//! configuration in `0x20..`, buttons/watchdog/RTC in `0x40..`, scheduled
//! events in `0x50..`, firmware and lifecycle in `0x60..`.

use crate::frame::{
    response_size, RESPONSE_SIZE_I16, RESPONSE_SIZE_I32, RESPONSE_SIZE_I64, RESPONSE_SIZE_U8,
};

// ---------------------------------------------------------------
// Telemetry opcodes
// ---------------------------------------------------------------

/// Input (supply) temperature, 1/100 degC.
pub const OP_GET_INPUT_TEMP: u8 = 0x01;
/// Input rail voltage, millivolts.
pub const OP_GET_INPUT_VOLTAGE: u8 = 0x02;
/// Input rail current, milliamps.
pub const OP_GET_INPUT_CURRENT: u8 = 0x03;
/// Input power, milliwatts.
pub const OP_GET_INPUT_POWER: u8 = 0x04;
/// Push the host's core temperature to the device (1/100 degC, 4 bytes).
///
/// The device's fan automation runs off this reading, so hosts should send
/// it periodically.
pub const OP_SEND_SYSTEM_TEMP: u8 = 0x05;
/// System (output) rail voltage, millivolts.
pub const OP_GET_SYSTEM_VOLTAGE: u8 = 0x06;
/// System rail current, milliamps.
pub const OP_GET_SYSTEM_CURRENT: u8 = 0x07;
/// System power, milliwatts.
pub const OP_GET_SYSTEM_POWER: u8 = 0x08;
/// Battery temperature, 1/100 degC.
pub const OP_GET_BATTERY_TEMP: u8 = 0x09;
/// Battery voltage, millivolts.
pub const OP_GET_BATTERY_VOLTAGE: u8 = 0x0A;
/// Battery current, milliamps, **signed** (negative while discharging).
pub const OP_GET_BATTERY_CURRENT: u8 = 0x0B;
/// Battery power, milliwatts, **signed** (negative while discharging).
pub const OP_GET_BATTERY_POWER: u8 = 0x0C;
/// Battery state of charge, percent.
pub const OP_GET_BATTERY_LEVEL: u8 = 0x0D;
/// Battery health estimate, percent.
pub const OP_GET_BATTERY_HEALTH: u8 = 0x0E;
/// Fan health flag.
pub const OP_GET_FAN_HEALTH: u8 = 0x0F;
/// Fan speed, rpm.
pub const OP_GET_FAN_SPEED: u8 = 0x10;

// ---------------------------------------------------------------
// Configuration opcodes
// ---------------------------------------------------------------

/// RGB LED animation (type, color, speed), 3-byte descriptor.
pub const OP_SET_RGB_ANIMATION: u8 = 0x20;
pub const OP_GET_RGB_ANIMATION: u8 = 0x21;
/// Fan automation thresholds (slow, fast), two bytes of degC.
pub const OP_SET_FAN_AUTOMATION: u8 = 0x22;
pub const OP_GET_FAN_AUTOMATION: u8 = 0x23;
/// Fan mode override.
pub const OP_SET_FAN_MODE: u8 = 0x24;
pub const OP_GET_FAN_MODE: u8 = 0x25;
/// Battery charge ceiling, percent.
pub const OP_SET_BATTERY_MAX_CHARGE_LEVEL: u8 = 0x26;
pub const OP_GET_BATTERY_MAX_CHARGE_LEVEL: u8 = 0x27;
/// Battery design capacity, mAh.
pub const OP_SET_BATTERY_DESIGN_CAPACITY: u8 = 0x28;
pub const OP_GET_BATTERY_DESIGN_CAPACITY: u8 = 0x29;
/// Charge level below which the device cuts system power.
pub const OP_SET_SAFE_SHUTDOWN_LEVEL: u8 = 0x2A;
pub const OP_GET_SAFE_SHUTDOWN_LEVEL: u8 = 0x2B;
/// Safe-shutdown arming status.
pub const OP_SET_SAFE_SHUTDOWN_STATUS: u8 = 0x2C;
pub const OP_GET_SAFE_SHUTDOWN_STATUS: u8 = 0x2D;
/// Low-power mode (disables status LEDs between events).
pub const OP_SET_LPM_STATUS: u8 = 0x2E;
pub const OP_GET_LPM_STATUS: u8 = 0x2F;
/// Easy-deployment mode (ship mode: battery disconnected until power-up).
pub const OP_SET_EDM_STATUS: u8 = 0x30;
pub const OP_GET_EDM_STATUS: u8 = 0x31;
/// Battery separation (run without battery attached).
pub const OP_SET_BATTERY_SEPARATION: u8 = 0x32;
pub const OP_GET_BATTERY_SEPARATION: u8 = 0x33;
/// Power outage behavior: sleep/run durations, minutes (u16 each).
pub const OP_SET_POWER_OUTAGE_PARAMS: u8 = 0x34;
pub const OP_GET_POWER_OUTAGE_PARAMS: u8 = 0x35;
/// Whether the power-outage scheduled action is armed.
pub const OP_SET_POWER_OUTAGE_EVENT_STATUS: u8 = 0x36;
pub const OP_GET_POWER_OUTAGE_EVENT_STATUS: u8 = 0x37;
/// Current draw floor, mA, below which the end device counts as off.
pub const OP_SET_END_DEVICE_ALIVE_THRESHOLD: u8 = 0x38;
pub const OP_GET_END_DEVICE_ALIVE_THRESHOLD: u8 = 0x39;
/// Current working mode (read-only: the device picks it from power state).
pub const OP_GET_WORKING_MODE: u8 = 0x3A;

// ---------------------------------------------------------------
// Button / watchdog / RTC opcodes
// ---------------------------------------------------------------

/// Last recorded event on user button 1.
pub const OP_GET_BUTTON1_STATUS: u8 = 0x40;
/// Last recorded event on user button 2.
pub const OP_GET_BUTTON2_STATUS: u8 = 0x41;
/// Host watchdog enable flag.
pub const OP_SET_WATCHDOG_STATUS: u8 = 0x42;
pub const OP_GET_WATCHDOG_STATUS: u8 = 0x43;
/// Watchdog interval, minutes.
pub const OP_SET_WATCHDOG_INTERVAL: u8 = 0x44;
pub const OP_GET_WATCHDOG_INTERVAL: u8 = 0x45;
/// Host heartbeat; must arrive inside the watchdog interval once armed.
pub const OP_WATCHDOG_SIGNAL: u8 = 0x46;
/// RTC time as a 4-byte epoch.
pub const OP_SET_RTC_TIME: u8 = 0x47;
pub const OP_GET_RTC_TIME: u8 = 0x48;

// ---------------------------------------------------------------
// Scheduled event opcodes
// ---------------------------------------------------------------

/// Install a scheduled event from its 10-byte descriptor.
pub const OP_CREATE_SCHEDULED_EVENT: u8 = 0x50;
/// Bitmask of installed event ids.
pub const OP_GET_SCHEDULED_EVENT_IDS: u8 = 0x51;
/// Remove one scheduled event by id.
pub const OP_REMOVE_SCHEDULED_EVENT: u8 = 0x52;
/// Remove every scheduled event.
pub const OP_REMOVE_ALL_SCHEDULED_EVENTS: u8 = 0x53;

// ---------------------------------------------------------------
// Firmware / lifecycle opcodes
// ---------------------------------------------------------------

/// Firmware version string, 8 ASCII characters.
pub const OP_GET_FIRMWARE_VERSION: u8 = 0x60;
/// Erase the staging area for a new firmware image.
pub const OP_CLEAR_PROGRAM_STORAGE: u8 = 0x61;
/// One firmware image chunk (flow-controlled by the device's reply).
pub const OP_FIRMWARE_CHUNK: u8 = 0x62;
/// Reboot the MCU. Fire-and-forget: the device resets instead of replying.
pub const OP_RESET_MCU: u8 = 0x63;
/// Reboot the MCU into its bootloader. Fire-and-forget.
pub const OP_RESET_FOR_BOOT_UPDATE: u8 = 0x64;
/// Reset all configuration to factory values. Fire-and-forget.
pub const OP_RESTORE_FACTORY_DEFAULTS: u8 = 0x65;

/// An immutable command descriptor.
///
/// Ties an opcode to the payload width the request must carry and the total
/// response length the device will answer with. The retry engine needs
/// nothing else to run an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Single-byte operation identifier.
    pub opcode: u8,
    /// Exact request payload width in bytes (0 for parameterless reads).
    pub payload_len: usize,
    /// Exact total response length in bytes, header and trailer included.
    pub response_size: usize,
}

impl Command {
    /// Describe a command.
    pub const fn new(opcode: u8, payload_len: usize, response_size: usize) -> Self {
        Command {
            opcode,
            payload_len,
            response_size,
        }
    }
}

/// The full table of device commands.
///
/// Built once (it is `const`-constructible) and shared by reference — the
/// engine and the typed client never mutate it. Keeping the table as one
/// value rather than scattered constants makes the opcode/size pairing
/// reviewable in a single screenful and testable as a whole.
#[derive(Debug, Clone)]
pub struct CommandSet {
    pub input_temp: Command,
    pub input_voltage: Command,
    pub input_current: Command,
    pub input_power: Command,
    pub send_system_temp: Command,
    pub system_voltage: Command,
    pub system_current: Command,
    pub system_power: Command,
    pub battery_temp: Command,
    pub battery_voltage: Command,
    pub battery_current: Command,
    pub battery_power: Command,
    pub battery_level: Command,
    pub battery_health: Command,
    pub fan_health: Command,
    pub fan_speed: Command,

    pub set_rgb_animation: Command,
    pub get_rgb_animation: Command,
    pub set_fan_automation: Command,
    pub get_fan_automation: Command,
    pub set_fan_mode: Command,
    pub get_fan_mode: Command,
    pub set_battery_max_charge_level: Command,
    pub get_battery_max_charge_level: Command,
    pub set_battery_design_capacity: Command,
    pub get_battery_design_capacity: Command,
    pub set_safe_shutdown_level: Command,
    pub get_safe_shutdown_level: Command,
    pub set_safe_shutdown_status: Command,
    pub get_safe_shutdown_status: Command,
    pub set_lpm_status: Command,
    pub get_lpm_status: Command,
    pub set_edm_status: Command,
    pub get_edm_status: Command,
    pub set_battery_separation: Command,
    pub get_battery_separation: Command,
    pub set_power_outage_params: Command,
    pub get_power_outage_params: Command,
    pub set_power_outage_event_status: Command,
    pub get_power_outage_event_status: Command,
    pub set_end_device_alive_threshold: Command,
    pub get_end_device_alive_threshold: Command,
    pub get_working_mode: Command,

    pub get_button1_status: Command,
    pub get_button2_status: Command,
    pub set_watchdog_status: Command,
    pub get_watchdog_status: Command,
    pub set_watchdog_interval: Command,
    pub get_watchdog_interval: Command,
    pub watchdog_signal: Command,
    pub set_rtc_time: Command,
    pub get_rtc_time: Command,

    pub create_scheduled_event: Command,
    pub get_scheduled_event_ids: Command,
    pub remove_scheduled_event: Command,
    pub remove_all_scheduled_events: Command,

    pub get_firmware_version: Command,
    pub clear_program_storage: Command,
    pub firmware_chunk: Command,
    pub reset_mcu: Command,
    pub reset_for_boot_update: Command,
    pub restore_factory_defaults: Command,
}

impl CommandSet {
    /// Build the command table.
    pub const fn new() -> Self {
        CommandSet {
            input_temp: Command::new(OP_GET_INPUT_TEMP, 0, RESPONSE_SIZE_I32),
            input_voltage: Command::new(OP_GET_INPUT_VOLTAGE, 0, RESPONSE_SIZE_I32),
            input_current: Command::new(OP_GET_INPUT_CURRENT, 0, RESPONSE_SIZE_I32),
            input_power: Command::new(OP_GET_INPUT_POWER, 0, RESPONSE_SIZE_I32),
            send_system_temp: Command::new(OP_SEND_SYSTEM_TEMP, 4, RESPONSE_SIZE_U8),
            system_voltage: Command::new(OP_GET_SYSTEM_VOLTAGE, 0, RESPONSE_SIZE_I32),
            system_current: Command::new(OP_GET_SYSTEM_CURRENT, 0, RESPONSE_SIZE_I32),
            system_power: Command::new(OP_GET_SYSTEM_POWER, 0, RESPONSE_SIZE_I32),
            battery_temp: Command::new(OP_GET_BATTERY_TEMP, 0, RESPONSE_SIZE_I32),
            battery_voltage: Command::new(OP_GET_BATTERY_VOLTAGE, 0, RESPONSE_SIZE_I32),
            battery_current: Command::new(OP_GET_BATTERY_CURRENT, 0, RESPONSE_SIZE_I32),
            battery_power: Command::new(OP_GET_BATTERY_POWER, 0, RESPONSE_SIZE_I32),
            battery_level: Command::new(OP_GET_BATTERY_LEVEL, 0, RESPONSE_SIZE_I32),
            battery_health: Command::new(OP_GET_BATTERY_HEALTH, 0, RESPONSE_SIZE_I32),
            fan_health: Command::new(OP_GET_FAN_HEALTH, 0, RESPONSE_SIZE_I32),
            fan_speed: Command::new(OP_GET_FAN_SPEED, 0, RESPONSE_SIZE_I32),

            set_rgb_animation: Command::new(OP_SET_RGB_ANIMATION, 3, RESPONSE_SIZE_U8),
            get_rgb_animation: Command::new(OP_GET_RGB_ANIMATION, 0, response_size(3)),
            set_fan_automation: Command::new(OP_SET_FAN_AUTOMATION, 2, RESPONSE_SIZE_U8),
            get_fan_automation: Command::new(OP_GET_FAN_AUTOMATION, 0, RESPONSE_SIZE_I16),
            set_fan_mode: Command::new(OP_SET_FAN_MODE, 1, RESPONSE_SIZE_U8),
            get_fan_mode: Command::new(OP_GET_FAN_MODE, 0, RESPONSE_SIZE_U8),
            set_battery_max_charge_level: Command::new(
                OP_SET_BATTERY_MAX_CHARGE_LEVEL,
                1,
                RESPONSE_SIZE_U8,
            ),
            get_battery_max_charge_level: Command::new(
                OP_GET_BATTERY_MAX_CHARGE_LEVEL,
                0,
                RESPONSE_SIZE_U8,
            ),
            set_battery_design_capacity: Command::new(
                OP_SET_BATTERY_DESIGN_CAPACITY,
                2,
                RESPONSE_SIZE_U8,
            ),
            get_battery_design_capacity: Command::new(
                OP_GET_BATTERY_DESIGN_CAPACITY,
                0,
                RESPONSE_SIZE_I16,
            ),
            set_safe_shutdown_level: Command::new(OP_SET_SAFE_SHUTDOWN_LEVEL, 1, RESPONSE_SIZE_U8),
            get_safe_shutdown_level: Command::new(OP_GET_SAFE_SHUTDOWN_LEVEL, 0, RESPONSE_SIZE_U8),
            set_safe_shutdown_status: Command::new(
                OP_SET_SAFE_SHUTDOWN_STATUS,
                1,
                RESPONSE_SIZE_U8,
            ),
            get_safe_shutdown_status: Command::new(
                OP_GET_SAFE_SHUTDOWN_STATUS,
                0,
                RESPONSE_SIZE_U8,
            ),
            set_lpm_status: Command::new(OP_SET_LPM_STATUS, 1, RESPONSE_SIZE_U8),
            get_lpm_status: Command::new(OP_GET_LPM_STATUS, 0, RESPONSE_SIZE_U8),
            set_edm_status: Command::new(OP_SET_EDM_STATUS, 1, RESPONSE_SIZE_U8),
            get_edm_status: Command::new(OP_GET_EDM_STATUS, 0, RESPONSE_SIZE_U8),
            set_battery_separation: Command::new(OP_SET_BATTERY_SEPARATION, 1, RESPONSE_SIZE_U8),
            get_battery_separation: Command::new(OP_GET_BATTERY_SEPARATION, 0, RESPONSE_SIZE_U8),
            set_power_outage_params: Command::new(OP_SET_POWER_OUTAGE_PARAMS, 4, RESPONSE_SIZE_U8),
            get_power_outage_params: Command::new(
                OP_GET_POWER_OUTAGE_PARAMS,
                0,
                RESPONSE_SIZE_I32,
            ),
            set_power_outage_event_status: Command::new(
                OP_SET_POWER_OUTAGE_EVENT_STATUS,
                1,
                RESPONSE_SIZE_U8,
            ),
            get_power_outage_event_status: Command::new(
                OP_GET_POWER_OUTAGE_EVENT_STATUS,
                0,
                RESPONSE_SIZE_U8,
            ),
            set_end_device_alive_threshold: Command::new(
                OP_SET_END_DEVICE_ALIVE_THRESHOLD,
                2,
                RESPONSE_SIZE_U8,
            ),
            get_end_device_alive_threshold: Command::new(
                OP_GET_END_DEVICE_ALIVE_THRESHOLD,
                0,
                RESPONSE_SIZE_I16,
            ),
            get_working_mode: Command::new(OP_GET_WORKING_MODE, 0, RESPONSE_SIZE_U8),

            get_button1_status: Command::new(OP_GET_BUTTON1_STATUS, 0, RESPONSE_SIZE_U8),
            get_button2_status: Command::new(OP_GET_BUTTON2_STATUS, 0, RESPONSE_SIZE_U8),
            set_watchdog_status: Command::new(OP_SET_WATCHDOG_STATUS, 1, RESPONSE_SIZE_U8),
            get_watchdog_status: Command::new(OP_GET_WATCHDOG_STATUS, 0, RESPONSE_SIZE_U8),
            set_watchdog_interval: Command::new(OP_SET_WATCHDOG_INTERVAL, 1, RESPONSE_SIZE_U8),
            get_watchdog_interval: Command::new(OP_GET_WATCHDOG_INTERVAL, 0, RESPONSE_SIZE_U8),
            watchdog_signal: Command::new(OP_WATCHDOG_SIGNAL, 1, RESPONSE_SIZE_U8),
            set_rtc_time: Command::new(OP_SET_RTC_TIME, 4, RESPONSE_SIZE_U8),
            get_rtc_time: Command::new(OP_GET_RTC_TIME, 0, RESPONSE_SIZE_I32),

            create_scheduled_event: Command::new(OP_CREATE_SCHEDULED_EVENT, 10, RESPONSE_SIZE_U8),
            get_scheduled_event_ids: Command::new(
                OP_GET_SCHEDULED_EVENT_IDS,
                0,
                RESPONSE_SIZE_I16,
            ),
            remove_scheduled_event: Command::new(OP_REMOVE_SCHEDULED_EVENT, 1, RESPONSE_SIZE_U8),
            remove_all_scheduled_events: Command::new(
                OP_REMOVE_ALL_SCHEDULED_EVENTS,
                0,
                RESPONSE_SIZE_U8,
            ),

            get_firmware_version: Command::new(OP_GET_FIRMWARE_VERSION, 0, RESPONSE_SIZE_I64),
            clear_program_storage: Command::new(OP_CLEAR_PROGRAM_STORAGE, 0, RESPONSE_SIZE_U8),
            // Chunk replies carry the next-requested id, a 16-bit field.
            firmware_chunk: Command::new(OP_FIRMWARE_CHUNK, 0, RESPONSE_SIZE_I16),
            // Fire-and-forget commands never produce a response frame.
            reset_mcu: Command::new(OP_RESET_MCU, 0, 0),
            reset_for_boot_update: Command::new(OP_RESET_FOR_BOOT_UPDATE, 0, 0),
            restore_factory_defaults: Command::new(OP_RESTORE_FACTORY_DEFAULTS, 0, 0),
        }
    }

    /// Iterate every command in the table.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        [
            &self.input_temp,
            &self.input_voltage,
            &self.input_current,
            &self.input_power,
            &self.send_system_temp,
            &self.system_voltage,
            &self.system_current,
            &self.system_power,
            &self.battery_temp,
            &self.battery_voltage,
            &self.battery_current,
            &self.battery_power,
            &self.battery_level,
            &self.battery_health,
            &self.fan_health,
            &self.fan_speed,
            &self.set_rgb_animation,
            &self.get_rgb_animation,
            &self.set_fan_automation,
            &self.get_fan_automation,
            &self.set_fan_mode,
            &self.get_fan_mode,
            &self.set_battery_max_charge_level,
            &self.get_battery_max_charge_level,
            &self.set_battery_design_capacity,
            &self.get_battery_design_capacity,
            &self.set_safe_shutdown_level,
            &self.get_safe_shutdown_level,
            &self.set_safe_shutdown_status,
            &self.get_safe_shutdown_status,
            &self.set_lpm_status,
            &self.get_lpm_status,
            &self.set_edm_status,
            &self.get_edm_status,
            &self.set_battery_separation,
            &self.get_battery_separation,
            &self.set_power_outage_params,
            &self.get_power_outage_params,
            &self.set_power_outage_event_status,
            &self.get_power_outage_event_status,
            &self.set_end_device_alive_threshold,
            &self.get_end_device_alive_threshold,
            &self.get_working_mode,
            &self.get_button1_status,
            &self.get_button2_status,
            &self.set_watchdog_status,
            &self.get_watchdog_status,
            &self.set_watchdog_interval,
            &self.get_watchdog_interval,
            &self.watchdog_signal,
            &self.set_rtc_time,
            &self.get_rtc_time,
            &self.create_scheduled_event,
            &self.get_scheduled_event_ids,
            &self.remove_scheduled_event,
            &self.remove_all_scheduled_events,
            &self.get_firmware_version,
            &self.clear_program_storage,
            &self.firmware_chunk,
            &self.reset_mcu,
            &self.reset_for_boot_update,
            &self.restore_factory_defaults,
        ]
        .into_iter()
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        CommandSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FRAME_OVERHEAD, MAX_REQUEST_PAYLOAD};
    use std::collections::HashSet;

    #[test]
    fn opcodes_are_unique() {
        let set = CommandSet::new();
        let mut seen = HashSet::new();
        for cmd in set.iter() {
            assert!(
                seen.insert(cmd.opcode),
                "duplicate opcode 0x{:02X}",
                cmd.opcode
            );
        }
    }

    #[test]
    fn payload_widths_within_protocol_bound() {
        let set = CommandSet::new();
        for cmd in set.iter() {
            assert!(
                cmd.payload_len <= MAX_REQUEST_PAYLOAD,
                "opcode 0x{:02X} payload {} too wide",
                cmd.opcode,
                cmd.payload_len
            );
        }
    }

    #[test]
    fn response_sizes_cover_framing() {
        let set = CommandSet::new();
        for cmd in set.iter() {
            // Fire-and-forget commands declare no response at all.
            if cmd.response_size != 0 {
                assert!(
                    cmd.response_size >= FRAME_OVERHEAD,
                    "opcode 0x{:02X} response {} below framing overhead",
                    cmd.opcode,
                    cmd.response_size
                );
            }
        }
    }

    #[test]
    fn fire_and_forget_commands_have_no_response() {
        let set = CommandSet::new();
        assert_eq!(set.reset_mcu.response_size, 0);
        assert_eq!(set.reset_for_boot_update.response_size, 0);
        assert_eq!(set.restore_factory_defaults.response_size, 0);
    }

    #[test]
    fn signed_telemetry_uses_i32_class() {
        let set = CommandSet::new();
        assert_eq!(set.battery_current.response_size, RESPONSE_SIZE_I32);
        assert_eq!(set.battery_power.response_size, RESPONSE_SIZE_I32);
    }

    #[test]
    fn scheduled_event_descriptor_is_widest_payload() {
        let set = CommandSet::new();
        assert_eq!(set.create_scheduled_event.payload_len, MAX_REQUEST_PAYLOAD);
    }

    #[test]
    fn firmware_version_spans_eight_chars() {
        let set = CommandSet::new();
        assert_eq!(set.get_firmware_version.response_size, RESPONSE_SIZE_I64);
        assert_eq!(set.get_firmware_version.response_size - FRAME_OVERHEAD, 8);
    }
}
