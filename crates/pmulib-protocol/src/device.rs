//! The typed device client.
//!
//! [`PowerDevice`] puts one method on every operation the MCU understands.
//! Telemetry reads scale the device's fixed-point payloads into physical
//! units, configuration setters validate documented ranges before anything
//! reaches the wire, and the device's accept/reject status byte becomes a
//! [`Result`] instead of a magic number.
//!
//! Methods take `&mut self`: the bus is half duplex and one exchange must
//! finish before the next starts, so exclusive access is the API, not a
//! runtime check.

use std::time::Duration;

use tracing::debug;

use pmulib_core::{
    amps_from_milli, celsius_from_centi, volts_from_milli, watts_from_milli, Error, Result,
};

use crate::commands::CommandSet;
use crate::engine::ProtocolEngine;
use crate::firmware::{UpdateMethod, UpdateSession, ERASE_RESPONSE_DELAY};
use crate::frame::{read_i32_be, read_u16_be, read_u32_be, ResponseFrame};
use crate::models::{
    event_ids_from_mask, ButtonEvent, FanAutomation, FanHealth, FanMode, FirmwareVersion,
    PowerOutageParams, RgbAnimation, ScheduledEvent, WorkingMode,
};

/// Response delay for the few reads the device prepares slowly: the power
/// products and the scheduled-event bitmask.
const SLOW_READ_DELAY: Duration = Duration::from_millis(50);

/// Response delay for scheduled-event writes, which hit persistent storage.
const EVENT_WRITE_DELAY: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------
// Wire conventions shared across accessors
// ---------------------------------------------------------------

/// Interpret a set-command acknowledgement: status 1 is acceptance,
/// anything else is a rejection.
fn ack_status(frame: &ResponseFrame) -> Result<()> {
    match frame.status() {
        Some(1) => Ok(()),
        Some(code) => Err(Error::CommandRejected(code)),
        None => Err(Error::Protocol(
            "acknowledgement carried no status byte".to_string(),
        )),
    }
}

/// The single payload byte of a one-byte response.
fn value_byte(frame: &ResponseFrame) -> Result<u8> {
    frame
        .status()
        .ok_or_else(|| Error::Protocol("response carried no payload".to_string()))
}

/// Enable flags travel as 1 (enabled) / 2 (disabled) in both directions.
fn flag_to_byte(enabled: bool) -> u8 {
    if enabled {
        1
    } else {
        2
    }
}

fn flag_from_byte(b: u8) -> Result<bool> {
    match b {
        1 => Ok(true),
        2 => Ok(false),
        other => Err(Error::Protocol(format!("unknown enable flag {other}"))),
    }
}

/// Narrow a 32-bit reading whose value is specified to fit one byte.
fn narrow_u8(raw: u32, what: &str) -> Result<u8> {
    u8::try_from(raw)
        .map_err(|_| Error::Protocol(format!("{what} reading {raw} does not fit a byte")))
}

/// A connected power-management device.
///
/// Constructed via [`PowerDeviceBuilder`](crate::builder::PowerDeviceBuilder).
/// All communication goes through the bus provided at build time, one
/// exchange at a time.
pub struct PowerDevice {
    engine: ProtocolEngine,
    commands: CommandSet,
}

impl PowerDevice {
    /// Wrap a ready protocol engine. Called by the builder.
    pub(crate) fn new(engine: ProtocolEngine) -> Self {
        PowerDevice {
            engine,
            commands: CommandSet::new(),
        }
    }

    // ---------------------------------------------------------------
    // Telemetry
    // ---------------------------------------------------------------

    /// Supply-side temperature in degrees Celsius.
    pub async fn input_temperature(&mut self) -> Result<f64> {
        debug!("reading input temperature");
        let frame = self.engine.execute(&self.commands.input_temp, &[]).await?;
        Ok(celsius_from_centi(read_u32_be(&frame.payload)?.into()))
    }

    /// Input rail voltage in volts.
    pub async fn input_voltage(&mut self) -> Result<f64> {
        debug!("reading input voltage");
        let frame = self
            .engine
            .execute(&self.commands.input_voltage, &[])
            .await?;
        Ok(volts_from_milli(read_u32_be(&frame.payload)?.into()))
    }

    /// Input rail current in amps.
    pub async fn input_current(&mut self) -> Result<f64> {
        debug!("reading input current");
        let frame = self
            .engine
            .execute(&self.commands.input_current, &[])
            .await?;
        Ok(amps_from_milli(read_u32_be(&frame.payload)?.into()))
    }

    /// Input power draw in watts.
    pub async fn input_power(&mut self) -> Result<f64> {
        debug!("reading input power");
        let frame = self
            .engine
            .execute_with_delay(&self.commands.input_power, &[], SLOW_READ_DELAY)
            .await?;
        Ok(watts_from_milli(read_u32_be(&frame.payload)?.into()))
    }

    /// Push the host's core temperature to the device.
    ///
    /// The fan automation runs off this reading, so hosts should send it
    /// periodically — once a minute is plenty.
    pub async fn send_system_temperature(&mut self, celsius: f64) -> Result<()> {
        if !celsius.is_finite() || celsius < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "system temperature {celsius} C must be finite and non-negative"
            )));
        }
        let centi = (celsius * 100.0) as u32;
        debug!(celsius, "sending system temperature");
        let frame = self
            .engine
            .execute(&self.commands.send_system_temp, &centi.to_be_bytes())
            .await?;
        ack_status(&frame)
    }

    /// System (output) rail voltage in volts.
    pub async fn system_voltage(&mut self) -> Result<f64> {
        debug!("reading system voltage");
        let frame = self
            .engine
            .execute(&self.commands.system_voltage, &[])
            .await?;
        Ok(volts_from_milli(read_u32_be(&frame.payload)?.into()))
    }

    /// System rail current in amps.
    pub async fn system_current(&mut self) -> Result<f64> {
        debug!("reading system current");
        let frame = self
            .engine
            .execute_with_delay(&self.commands.system_current, &[], SLOW_READ_DELAY)
            .await?;
        Ok(amps_from_milli(read_u32_be(&frame.payload)?.into()))
    }

    /// System power draw in watts.
    pub async fn system_power(&mut self) -> Result<f64> {
        debug!("reading system power");
        let frame = self
            .engine
            .execute_with_delay(&self.commands.system_power, &[], SLOW_READ_DELAY)
            .await?;
        Ok(watts_from_milli(read_u32_be(&frame.payload)?.into()))
    }

    /// Battery temperature in degrees Celsius.
    pub async fn battery_temperature(&mut self) -> Result<f64> {
        debug!("reading battery temperature");
        let frame = self.engine.execute(&self.commands.battery_temp, &[]).await?;
        Ok(celsius_from_centi(read_u32_be(&frame.payload)?.into()))
    }

    /// Battery voltage in volts.
    pub async fn battery_voltage(&mut self) -> Result<f64> {
        debug!("reading battery voltage");
        let frame = self
            .engine
            .execute(&self.commands.battery_voltage, &[])
            .await?;
        Ok(volts_from_milli(read_u32_be(&frame.payload)?.into()))
    }

    /// Battery current in amps. Negative while the battery discharges.
    pub async fn battery_current(&mut self) -> Result<f64> {
        debug!("reading battery current");
        let frame = self
            .engine
            .execute(&self.commands.battery_current, &[])
            .await?;
        Ok(amps_from_milli(read_i32_be(&frame.payload)?.into()))
    }

    /// Battery power in watts. Negative while the battery discharges.
    pub async fn battery_power(&mut self) -> Result<f64> {
        debug!("reading battery power");
        let frame = self
            .engine
            .execute(&self.commands.battery_power, &[])
            .await?;
        Ok(watts_from_milli(read_i32_be(&frame.payload)?.into()))
    }

    /// Battery state of charge, percent.
    pub async fn battery_level(&mut self) -> Result<u8> {
        debug!("reading battery level");
        let frame = self
            .engine
            .execute(&self.commands.battery_level, &[])
            .await?;
        narrow_u8(read_u32_be(&frame.payload)?, "battery level")
    }

    /// Battery health estimate, percent.
    pub async fn battery_health(&mut self) -> Result<u8> {
        debug!("reading battery health");
        let frame = self
            .engine
            .execute(&self.commands.battery_health, &[])
            .await?;
        narrow_u8(read_u32_be(&frame.payload)?, "battery health")
    }

    /// Result of the fan self-test.
    pub async fn fan_health(&mut self) -> Result<FanHealth> {
        debug!("reading fan health");
        let frame = self.engine.execute(&self.commands.fan_health, &[]).await?;
        FanHealth::from_byte(narrow_u8(read_u32_be(&frame.payload)?, "fan health")?)
    }

    /// Fan speed in rpm.
    pub async fn fan_speed(&mut self) -> Result<u32> {
        debug!("reading fan speed");
        let frame = self.engine.execute(&self.commands.fan_speed, &[]).await?;
        read_u32_be(&frame.payload)
    }

    // ---------------------------------------------------------------
    // LED and fan configuration
    // ---------------------------------------------------------------

    /// Install an RGB LED animation.
    pub async fn set_rgb_animation(&mut self, animation: RgbAnimation) -> Result<()> {
        debug!(%animation, "setting rgb animation");
        let frame = self
            .engine
            .execute(&self.commands.set_rgb_animation, &animation.encode())
            .await?;
        ack_status(&frame)
    }

    /// The installed RGB LED animation.
    pub async fn rgb_animation(&mut self) -> Result<RgbAnimation> {
        debug!("reading rgb animation");
        let frame = self
            .engine
            .execute(&self.commands.get_rgb_animation, &[])
            .await?;
        RgbAnimation::decode(&frame.payload)
    }

    /// Set the fan automation temperature thresholds.
    pub async fn set_fan_automation(&mut self, automation: FanAutomation) -> Result<()> {
        let payload = automation.encode()?;
        debug!(
            slow = automation.slow_threshold,
            fast = automation.fast_threshold,
            "setting fan automation"
        );
        let frame = self
            .engine
            .execute(&self.commands.set_fan_automation, &payload)
            .await?;
        ack_status(&frame)
    }

    /// The fan automation temperature thresholds.
    pub async fn fan_automation(&mut self) -> Result<FanAutomation> {
        debug!("reading fan automation");
        let frame = self
            .engine
            .execute(&self.commands.get_fan_automation, &[])
            .await?;
        FanAutomation::decode(&frame.payload)
    }

    /// Set the fan control policy.
    pub async fn set_fan_mode(&mut self, mode: FanMode) -> Result<()> {
        debug!(%mode, "setting fan mode");
        let frame = self
            .engine
            .execute(&self.commands.set_fan_mode, &[mode.as_byte()])
            .await?;
        ack_status(&frame)
    }

    /// The fan control policy.
    pub async fn fan_mode(&mut self) -> Result<FanMode> {
        debug!("reading fan mode");
        let frame = self.engine.execute(&self.commands.get_fan_mode, &[]).await?;
        FanMode::from_byte(value_byte(&frame)?)
    }

    // ---------------------------------------------------------------
    // Battery and power configuration
    // ---------------------------------------------------------------

    /// Cap the battery's charge level.
    ///
    /// Keeping lithium cells below full charge extends their service life;
    /// the device stops charging at this level.
    pub async fn set_battery_max_charge_level(&mut self, percent: u8) -> Result<()> {
        if !(60..=100).contains(&percent) {
            return Err(Error::InvalidParameter(format!(
                "max charge level {percent}% out of range 60..=100"
            )));
        }
        debug!(percent, "setting battery max charge level");
        let frame = self
            .engine
            .execute(&self.commands.set_battery_max_charge_level, &[percent])
            .await?;
        ack_status(&frame)
    }

    /// The battery charge ceiling, percent.
    pub async fn battery_max_charge_level(&mut self) -> Result<u8> {
        debug!("reading battery max charge level");
        let frame = self
            .engine
            .execute(&self.commands.get_battery_max_charge_level, &[])
            .await?;
        value_byte(&frame)
    }

    /// Declare the battery's design capacity in mAh.
    ///
    /// The charge-level estimate is computed against this value.
    pub async fn set_battery_design_capacity(&mut self, mah: u16) -> Result<()> {
        if !(100..=10_000).contains(&mah) {
            return Err(Error::InvalidParameter(format!(
                "design capacity {mah} mAh out of range 100..=10000"
            )));
        }
        debug!(mah, "setting battery design capacity");
        let frame = self
            .engine
            .execute(&self.commands.set_battery_design_capacity, &mah.to_be_bytes())
            .await?;
        ack_status(&frame)
    }

    /// The declared battery design capacity in mAh.
    pub async fn battery_design_capacity(&mut self) -> Result<u16> {
        debug!("reading battery design capacity");
        let frame = self
            .engine
            .execute(&self.commands.get_battery_design_capacity, &[])
            .await?;
        read_u16_be(&frame.payload)
    }

    /// Charge level below which the device cuts system power.
    pub async fn set_safe_shutdown_level(&mut self, percent: u8) -> Result<()> {
        debug!(percent, "setting safe shutdown level");
        let frame = self
            .engine
            .execute(&self.commands.set_safe_shutdown_level, &[percent])
            .await?;
        ack_status(&frame)
    }

    /// The safe-shutdown charge level, percent.
    pub async fn safe_shutdown_level(&mut self) -> Result<u8> {
        debug!("reading safe shutdown level");
        let frame = self
            .engine
            .execute(&self.commands.get_safe_shutdown_level, &[])
            .await?;
        value_byte(&frame)
    }

    /// Arm or disarm safe shutdown.
    pub async fn set_safe_shutdown_status(&mut self, enabled: bool) -> Result<()> {
        debug!(enabled, "setting safe shutdown status");
        let frame = self
            .engine
            .execute(
                &self.commands.set_safe_shutdown_status,
                &[flag_to_byte(enabled)],
            )
            .await?;
        ack_status(&frame)
    }

    /// Whether safe shutdown is armed.
    pub async fn safe_shutdown_status(&mut self) -> Result<bool> {
        debug!("reading safe shutdown status");
        let frame = self
            .engine
            .execute(&self.commands.get_safe_shutdown_status, &[])
            .await?;
        flag_from_byte(value_byte(&frame)?)
    }

    /// Enable or disable low-power mode (status LEDs off between events).
    pub async fn set_low_power_mode(&mut self, enabled: bool) -> Result<()> {
        debug!(enabled, "setting low power mode");
        let frame = self
            .engine
            .execute(&self.commands.set_lpm_status, &[flag_to_byte(enabled)])
            .await?;
        ack_status(&frame)
    }

    /// Whether low-power mode is enabled.
    pub async fn low_power_mode(&mut self) -> Result<bool> {
        debug!("reading low power mode");
        let frame = self.engine.execute(&self.commands.get_lpm_status, &[]).await?;
        flag_from_byte(value_byte(&frame)?)
    }

    /// Enable or disable easy-deployment (ship) mode.
    ///
    /// With the mode enabled the device disconnects its battery until
    /// external power is next applied, so units can be stored and shipped
    /// without draining.
    pub async fn set_easy_deployment_mode(&mut self, enabled: bool) -> Result<()> {
        debug!(enabled, "setting easy deployment mode");
        let frame = self
            .engine
            .execute(&self.commands.set_edm_status, &[flag_to_byte(enabled)])
            .await?;
        ack_status(&frame)
    }

    /// Whether easy-deployment mode is enabled.
    pub async fn easy_deployment_mode(&mut self) -> Result<bool> {
        debug!("reading easy deployment mode");
        let frame = self.engine.execute(&self.commands.get_edm_status, &[]).await?;
        flag_from_byte(value_byte(&frame)?)
    }

    /// Enable or disable battery separation (run without a battery).
    pub async fn set_battery_separation(&mut self, enabled: bool) -> Result<()> {
        debug!(enabled, "setting battery separation");
        let frame = self
            .engine
            .execute(
                &self.commands.set_battery_separation,
                &[flag_to_byte(enabled)],
            )
            .await?;
        ack_status(&frame)
    }

    /// Whether battery separation is enabled.
    pub async fn battery_separation(&mut self) -> Result<bool> {
        debug!("reading battery separation");
        let frame = self
            .engine
            .execute(&self.commands.get_battery_separation, &[])
            .await?;
        flag_from_byte(value_byte(&frame)?)
    }

    /// Configure the power-outage sleep/run cycle.
    pub async fn set_power_outage_params(&mut self, params: PowerOutageParams) -> Result<()> {
        let payload = params.encode()?;
        debug!(
            sleep_minutes = params.sleep_minutes,
            run_minutes = params.run_minutes,
            "setting power outage params"
        );
        let frame = self
            .engine
            .execute(&self.commands.set_power_outage_params, &payload)
            .await?;
        ack_status(&frame)
    }

    /// The configured power-outage sleep/run cycle.
    pub async fn power_outage_params(&mut self) -> Result<PowerOutageParams> {
        debug!("reading power outage params");
        let frame = self
            .engine
            .execute(&self.commands.get_power_outage_params, &[])
            .await?;
        PowerOutageParams::decode(&frame.payload)
    }

    /// Arm or disarm the power-outage event.
    pub async fn set_power_outage_event_status(&mut self, enabled: bool) -> Result<()> {
        debug!(enabled, "setting power outage event status");
        let frame = self
            .engine
            .execute(
                &self.commands.set_power_outage_event_status,
                &[flag_to_byte(enabled)],
            )
            .await?;
        ack_status(&frame)
    }

    /// Whether the power-outage event is armed.
    pub async fn power_outage_event_status(&mut self) -> Result<bool> {
        debug!("reading power outage event status");
        let frame = self
            .engine
            .execute(&self.commands.get_power_outage_event_status, &[])
            .await?;
        flag_from_byte(value_byte(&frame)?)
    }

    /// Current draw floor, in mA, below which the end device counts as off.
    ///
    /// Used by the power-outage logic to decide whether the host finished
    /// shutting down before power is cut.
    pub async fn set_end_device_alive_threshold(&mut self, milliamps: u16) -> Result<()> {
        if milliamps > 3000 {
            return Err(Error::InvalidParameter(format!(
                "alive threshold {milliamps} mA out of range 0..=3000"
            )));
        }
        debug!(milliamps, "setting end device alive threshold");
        let frame = self
            .engine
            .execute(
                &self.commands.set_end_device_alive_threshold,
                &milliamps.to_be_bytes(),
            )
            .await?;
        ack_status(&frame)
    }

    /// The end-device alive threshold in mA.
    pub async fn end_device_alive_threshold(&mut self) -> Result<u16> {
        debug!("reading end device alive threshold");
        let frame = self
            .engine
            .execute(&self.commands.get_end_device_alive_threshold, &[])
            .await?;
        read_u16_be(&frame.payload)
    }

    /// Power path the device is currently running on.
    pub async fn working_mode(&mut self) -> Result<WorkingMode> {
        debug!("reading working mode");
        let frame = self
            .engine
            .execute(&self.commands.get_working_mode, &[])
            .await?;
        WorkingMode::from_byte(value_byte(&frame)?)
    }

    // ---------------------------------------------------------------
    // Buttons, watchdog, RTC
    // ---------------------------------------------------------------

    /// Last event latched on user button 1.
    pub async fn button1_event(&mut self) -> Result<ButtonEvent> {
        debug!("reading button 1 event");
        let frame = self
            .engine
            .execute(&self.commands.get_button1_status, &[])
            .await?;
        ButtonEvent::from_byte(value_byte(&frame)?)
    }

    /// Last event latched on user button 2.
    pub async fn button2_event(&mut self) -> Result<ButtonEvent> {
        debug!("reading button 2 event");
        let frame = self
            .engine
            .execute(&self.commands.get_button2_status, &[])
            .await?;
        ButtonEvent::from_byte(value_byte(&frame)?)
    }

    /// Arm or disarm the host watchdog.
    pub async fn set_watchdog_status(&mut self, enabled: bool) -> Result<()> {
        debug!(enabled, "setting watchdog status");
        let frame = self
            .engine
            .execute(&self.commands.set_watchdog_status, &[flag_to_byte(enabled)])
            .await?;
        ack_status(&frame)
    }

    /// Whether the host watchdog is armed.
    pub async fn watchdog_status(&mut self) -> Result<bool> {
        debug!("reading watchdog status");
        let frame = self
            .engine
            .execute(&self.commands.get_watchdog_status, &[])
            .await?;
        flag_from_byte(value_byte(&frame)?)
    }

    /// Set the watchdog interval in minutes.
    pub async fn set_watchdog_interval(&mut self, minutes: u8) -> Result<()> {
        if !(4..=180).contains(&minutes) {
            return Err(Error::InvalidParameter(format!(
                "watchdog interval {minutes} min out of range 4..=180"
            )));
        }
        debug!(minutes, "setting watchdog interval");
        let frame = self
            .engine
            .execute(&self.commands.set_watchdog_interval, &[minutes])
            .await?;
        ack_status(&frame)
    }

    /// The watchdog interval in minutes.
    pub async fn watchdog_interval(&mut self) -> Result<u8> {
        debug!("reading watchdog interval");
        let frame = self
            .engine
            .execute(&self.commands.get_watchdog_interval, &[])
            .await?;
        value_byte(&frame)
    }

    /// Feed the watchdog.
    ///
    /// Once armed, this must arrive inside every interval or the device
    /// power-cycles the host.
    pub async fn signal_watchdog(&mut self) -> Result<()> {
        debug!("feeding watchdog");
        let frame = self
            .engine
            .execute(&self.commands.watchdog_signal, &[1])
            .await?;
        ack_status(&frame)
    }

    /// Set the device clock to a Unix epoch timestamp.
    pub async fn set_rtc_time(&mut self, epoch: u32) -> Result<()> {
        debug!(epoch, "setting rtc time");
        let frame = self
            .engine
            .execute(&self.commands.set_rtc_time, &epoch.to_be_bytes())
            .await?;
        ack_status(&frame)
    }

    /// The device clock as a Unix epoch timestamp.
    pub async fn rtc_time(&mut self) -> Result<u32> {
        debug!("reading rtc time");
        let frame = self.engine.execute(&self.commands.get_rtc_time, &[]).await?;
        read_u32_be(&frame.payload)
    }

    // ---------------------------------------------------------------
    // Scheduled events
    // ---------------------------------------------------------------

    /// Install a scheduled event in its slot.
    ///
    /// The device keeps events in persistent storage, so the write takes
    /// longer than ordinary configuration.
    pub async fn create_scheduled_event(&mut self, event: &ScheduledEvent) -> Result<()> {
        let payload = event.encode()?;
        debug!(id = event.id, "creating scheduled event");
        let frame = self
            .engine
            .execute_with_delay(
                &self.commands.create_scheduled_event,
                &payload,
                EVENT_WRITE_DELAY,
            )
            .await?;
        ack_status(&frame)
    }

    /// Slot ids of every installed scheduled event, ascending.
    pub async fn scheduled_event_ids(&mut self) -> Result<Vec<u8>> {
        debug!("reading scheduled event ids");
        let frame = self
            .engine
            .execute_with_delay(&self.commands.get_scheduled_event_ids, &[], SLOW_READ_DELAY)
            .await?;
        Ok(event_ids_from_mask(read_u16_be(&frame.payload)?))
    }

    /// Remove one scheduled event by slot id.
    pub async fn remove_scheduled_event(&mut self, id: u8) -> Result<()> {
        if !(ScheduledEvent::MIN_ID..=ScheduledEvent::MAX_ID).contains(&id) {
            return Err(Error::InvalidParameter(format!(
                "event id {id} out of range 1..=10"
            )));
        }
        debug!(id, "removing scheduled event");
        let frame = self
            .engine
            .execute_with_delay(
                &self.commands.remove_scheduled_event,
                &[id],
                EVENT_WRITE_DELAY,
            )
            .await?;
        ack_status(&frame)
    }

    /// Remove every scheduled event.
    pub async fn remove_all_scheduled_events(&mut self) -> Result<()> {
        debug!("removing all scheduled events");
        let frame = self
            .engine
            .execute_with_delay(
                &self.commands.remove_all_scheduled_events,
                &[],
                EVENT_WRITE_DELAY,
            )
            .await?;
        ack_status(&frame)
    }

    // ---------------------------------------------------------------
    // Firmware and lifecycle
    // ---------------------------------------------------------------

    /// The device's firmware revision.
    pub async fn firmware_version(&mut self) -> Result<FirmwareVersion> {
        debug!("reading firmware version");
        let frame = self
            .engine
            .execute(&self.commands.get_firmware_version, &[])
            .await?;
        FirmwareVersion::from_payload(&frame.payload)
    }

    /// Erase the firmware staging storage.
    ///
    /// [`update_firmware`](Self::update_firmware) erases as its first step;
    /// the standalone command exists to reclaim the storage without
    /// flashing anything.
    pub async fn clear_program_storage(&mut self) -> Result<()> {
        debug!("clearing program storage");
        let frame = self
            .engine
            .execute_with_delay(
                &self.commands.clear_program_storage,
                &[],
                ERASE_RESPONSE_DELAY,
            )
            .await?;
        ack_status(&frame)
    }

    /// Start a firmware update, handing its pacing to the caller.
    ///
    /// The session borrows the device exclusively; nothing else can talk
    /// to it until the session is dropped. Most callers want
    /// [`update_firmware`](Self::update_firmware) instead.
    pub fn begin_update<'a>(
        &'a mut self,
        image: &'a [u8],
        method: UpdateMethod,
    ) -> Result<UpdateSession<'a>> {
        UpdateSession::new(&mut self.engine, &self.commands, image, method)
    }

    /// Flash a firmware image, reporting whole-percent progress steps.
    pub async fn update_firmware(
        &mut self,
        image: &[u8],
        method: UpdateMethod,
        mut on_progress: impl FnMut(u8),
    ) -> Result<()> {
        let mut session = self.begin_update(image, method)?;
        while let Some(pct) = session.next_progress().await? {
            on_progress(pct);
        }
        Ok(())
    }

    /// Reboot the MCU.
    ///
    /// The device resets instead of replying, so success means only that
    /// the request left the host.
    pub async fn reset_mcu(&mut self) -> Result<()> {
        self.engine.send_only(&self.commands.reset_mcu, &[]).await
    }

    /// Reboot the MCU into its bootloader.
    pub async fn reset_for_boot_update(&mut self) -> Result<()> {
        self.engine
            .send_only(&self.commands.reset_for_boot_update, &[])
            .await
    }

    /// Reset every configuration value to its factory default.
    pub async fn restore_factory_defaults(&mut self) -> Result<()> {
        self.engine
            .send_only(&self.commands.restore_factory_defaults, &[])
            .await
    }

    // ---------------------------------------------------------------
    // Connection
    // ---------------------------------------------------------------

    /// Whether the underlying bus is open.
    pub fn is_connected(&self) -> bool {
        self.engine.is_connected()
    }

    /// Close the underlying bus.
    pub async fn close(&mut self) -> Result<()> {
        self.engine.close().await
    }
}

impl std::fmt::Debug for PowerDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerDevice")
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DEFAULT_RESPONSE_DELAY;
    use crate::frame::{encode_request, encode_response};
    use crate::models::{
        EventAction, IntervalUnit, RepeatMode, RgbAnimationKind, RgbColor, RgbSpeed, ScheduleKind,
    };
    use pmulib_test_harness::MockBus;

    fn device_with(mock: &MockBus) -> PowerDevice {
        let engine = ProtocolEngine::new(Box::new(mock.clone()), DEFAULT_RESPONSE_DELAY);
        PowerDevice::new(engine)
    }

    fn set() -> CommandSet {
        CommandSet::new()
    }

    // ---------------------------------------------------------------
    // Telemetry scaling
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn input_temperature_scales_centi_degrees() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().input_temp.opcode,
            &2345u32.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        assert_eq!(device.input_temperature().await.unwrap(), 23.45);
        assert_eq!(
            mock.sent_frames(),
            vec![encode_request(set().input_temp.opcode, &[]).unwrap()]
        );
    }

    #[tokio::test]
    async fn voltage_scales_millivolts() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().battery_voltage.opcode,
            &4125u32.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        assert_eq!(device.battery_voltage().await.unwrap(), 4.125);
    }

    #[tokio::test]
    async fn battery_current_is_signed() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().battery_current.opcode,
            &(-500i32).to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        assert_eq!(device.battery_current().await.unwrap(), -0.5);
    }

    #[tokio::test]
    async fn battery_power_is_signed() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().battery_power.opcode,
            &(-2100i32).to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        assert_eq!(device.battery_power().await.unwrap(), -2.1);
    }

    #[tokio::test]
    async fn battery_level_narrows_to_percent() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().battery_level.opcode,
            &87u32.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        assert_eq!(device.battery_level().await.unwrap(), 87);
    }

    #[tokio::test]
    async fn oversize_level_reading_is_a_protocol_error() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().battery_level.opcode,
            &300u32.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        let err = device.battery_level().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn fan_health_decodes() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().fan_health.opcode,
            &1u32.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        assert_eq!(device.fan_health().await.unwrap(), FanHealth::Healthy);
    }

    #[tokio::test]
    async fn fan_speed_is_raw_rpm() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().fan_speed.opcode,
            &3200u32.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        assert_eq!(device.fan_speed().await.unwrap(), 3200);
    }

    #[tokio::test(start_paused = true)]
    async fn power_reads_use_the_slow_delay() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().input_power.opcode,
            &12190u32.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        let start = tokio::time::Instant::now();
        assert_eq!(device.input_power().await.unwrap(), 12.19);
        assert_eq!(start.elapsed(), SLOW_READ_DELAY);
    }

    #[tokio::test]
    async fn send_system_temperature_encodes_centi() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().send_system_temp.opcode, &[1]));

        let mut device = device_with(&mock);
        device.send_system_temperature(36.5).await.unwrap();

        let expected =
            encode_request(set().send_system_temp.opcode, &3650u32.to_be_bytes()).unwrap();
        assert_eq!(mock.sent_frames(), vec![expected]);
    }

    #[tokio::test]
    async fn send_system_temperature_rejects_negative() {
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        let err = device.send_system_temperature(-4.0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(mock.write_calls(), 0);
    }

    // ---------------------------------------------------------------
    // Configuration round trips
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn rgb_animation_set_and_get() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().set_rgb_animation.opcode, &[1]));
        mock.expect_reply(encode_response(set().get_rgb_animation.opcode, &[2, 2, 3]));

        let mut device = device_with(&mock);
        let anim = RgbAnimation {
            kind: RgbAnimationKind::Heartbeat,
            color: RgbColor::Green,
            speed: RgbSpeed::Fast,
        };
        device.set_rgb_animation(anim).await.unwrap();
        assert_eq!(device.rgb_animation().await.unwrap(), anim);
    }

    #[tokio::test]
    async fn rejected_set_maps_to_command_rejected() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().set_fan_mode.opcode, &[2]));

        let mut device = device_with(&mock);
        let err = device.set_fan_mode(FanMode::Auto).await.unwrap_err();
        assert!(matches!(err, Error::CommandRejected(2)));
    }

    #[tokio::test]
    async fn fan_automation_set_and_get() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().set_fan_automation.opcode, &[1]));
        mock.expect_reply(encode_response(set().get_fan_automation.opcode, &[45, 70]));

        let mut device = device_with(&mock);
        let auto = FanAutomation {
            slow_threshold: 45,
            fast_threshold: 70,
        };
        device.set_fan_automation(auto).await.unwrap();
        assert_eq!(device.fan_automation().await.unwrap(), auto);
    }

    #[tokio::test]
    async fn max_charge_level_is_range_checked() {
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        assert!(device.set_battery_max_charge_level(59).await.is_err());
        assert!(device.set_battery_max_charge_level(101).await.is_err());
        assert_eq!(mock.write_calls(), 0);

        mock.expect_reply(encode_response(set().set_battery_max_charge_level.opcode, &[1]));
        device.set_battery_max_charge_level(80).await.unwrap();
    }

    #[tokio::test]
    async fn design_capacity_round_trip() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().set_battery_design_capacity.opcode, &[1]));
        mock.expect_reply(encode_response(
            set().get_battery_design_capacity.opcode,
            &5000u16.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        device.set_battery_design_capacity(5000).await.unwrap();
        assert_eq!(device.battery_design_capacity().await.unwrap(), 5000);

        let expected =
            encode_request(set().set_battery_design_capacity.opcode, &[0x13, 0x88]).unwrap();
        assert_eq!(mock.sent_frames()[0], expected);
    }

    #[tokio::test]
    async fn design_capacity_is_range_checked() {
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        assert!(device.set_battery_design_capacity(99).await.is_err());
        assert!(device.set_battery_design_capacity(10_001).await.is_err());
        assert_eq!(mock.write_calls(), 0);
    }

    #[tokio::test]
    async fn enable_flags_travel_as_one_and_two() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().set_safe_shutdown_status.opcode, &[1]));
        mock.expect_reply(encode_response(set().set_safe_shutdown_status.opcode, &[1]));
        mock.expect_reply(encode_response(set().get_safe_shutdown_status.opcode, &[2]));

        let mut device = device_with(&mock);
        device.set_safe_shutdown_status(true).await.unwrap();
        device.set_safe_shutdown_status(false).await.unwrap();
        assert!(!device.safe_shutdown_status().await.unwrap());

        let frames = mock.sent_frames();
        let on = encode_request(set().set_safe_shutdown_status.opcode, &[1]).unwrap();
        let off = encode_request(set().set_safe_shutdown_status.opcode, &[2]).unwrap();
        assert_eq!(frames[0], on);
        assert_eq!(frames[1], off);
    }

    #[tokio::test]
    async fn unknown_flag_byte_is_a_protocol_error() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().get_lpm_status.opcode, &[9]));

        let mut device = device_with(&mock);
        let err = device.low_power_mode().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn working_mode_reads() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().get_working_mode.opcode, &[3]));

        let mut device = device_with(&mock);
        assert_eq!(
            device.working_mode().await.unwrap(),
            WorkingMode::BatteryPowered
        );
    }

    #[tokio::test]
    async fn power_outage_params_round_trip() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().set_power_outage_params.opcode, &[1]));
        mock.expect_reply(encode_response(
            set().get_power_outage_params.opcode,
            &[0x00, 0x78, 0x00, 0x05],
        ));

        let mut device = device_with(&mock);
        let params = PowerOutageParams {
            sleep_minutes: 120,
            run_minutes: 5,
        };
        device.set_power_outage_params(params).await.unwrap();
        assert_eq!(device.power_outage_params().await.unwrap(), params);
    }

    #[tokio::test]
    async fn power_outage_params_validated_before_the_bus() {
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        let err = device
            .set_power_outage_params(PowerOutageParams {
                sleep_minutes: 1,
                run_minutes: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(mock.write_calls(), 0);
    }

    #[tokio::test]
    async fn alive_threshold_range_and_wire() {
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        assert!(device.set_end_device_alive_threshold(3001).await.is_err());
        assert_eq!(mock.write_calls(), 0);

        mock.expect_reply(encode_response(
            set().set_end_device_alive_threshold.opcode,
            &[1],
        ));
        mock.expect_reply(encode_response(
            set().get_end_device_alive_threshold.opcode,
            &300u16.to_be_bytes(),
        ));
        device.set_end_device_alive_threshold(200).await.unwrap();
        assert_eq!(device.end_device_alive_threshold().await.unwrap(), 300);

        let expected =
            encode_request(set().set_end_device_alive_threshold.opcode, &[0x00, 0xC8]).unwrap();
        assert_eq!(mock.sent_frames()[0], expected);
    }

    // ---------------------------------------------------------------
    // Buttons, watchdog, RTC
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn button_events_decode() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().get_button1_status.opcode, &[1]));
        mock.expect_reply(encode_response(set().get_button2_status.opcode, &[0]));

        let mut device = device_with(&mock);
        assert_eq!(device.button1_event().await.unwrap(), ButtonEvent::ShortPress);
        assert_eq!(device.button2_event().await.unwrap(), ButtonEvent::NoEvent);
    }

    #[tokio::test]
    async fn watchdog_interval_is_range_checked() {
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        assert!(device.set_watchdog_interval(3).await.is_err());
        assert!(device.set_watchdog_interval(181).await.is_err());
        assert_eq!(mock.write_calls(), 0);

        mock.expect_reply(encode_response(set().set_watchdog_interval.opcode, &[1]));
        mock.expect_reply(encode_response(set().set_watchdog_interval.opcode, &[1]));
        device.set_watchdog_interval(4).await.unwrap();
        device.set_watchdog_interval(180).await.unwrap();
    }

    #[tokio::test]
    async fn watchdog_signal_carries_a_one() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().watchdog_signal.opcode, &[1]));

        let mut device = device_with(&mock);
        device.signal_watchdog().await.unwrap();

        let expected = encode_request(set().watchdog_signal.opcode, &[1]).unwrap();
        assert_eq!(mock.sent_frames(), vec![expected]);
    }

    #[tokio::test]
    async fn rtc_round_trip() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().set_rtc_time.opcode, &[1]));
        mock.expect_reply(encode_response(
            set().get_rtc_time.opcode,
            &0x5E7C_90A4u32.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        device.set_rtc_time(0x5E7C_90A4).await.unwrap();
        assert_eq!(device.rtc_time().await.unwrap(), 0x5E7C_90A4);

        let expected =
            encode_request(set().set_rtc_time.opcode, &[0x5E, 0x7C, 0x90, 0xA4]).unwrap();
        assert_eq!(mock.sent_frames()[0], expected);
    }

    // ---------------------------------------------------------------
    // Scheduled events
    // ---------------------------------------------------------------

    fn nightly_start() -> ScheduledEvent {
        ScheduledEvent {
            id: 2,
            schedule: ScheduleKind::Time,
            repeat: RepeatMode::Repeated,
            time_or_interval: 6 * 60 * 60,
            interval_unit: IntervalUnit::Seconds,
            day_mask: ScheduledEvent::EVERY_DAY,
            action: EventAction::Start,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_event_uses_the_write_delay() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().create_scheduled_event.opcode, &[1]));

        let mut device = device_with(&mock);
        let event = nightly_start();
        let start = tokio::time::Instant::now();
        device.create_scheduled_event(&event).await.unwrap();
        assert_eq!(start.elapsed(), EVENT_WRITE_DELAY);

        let expected =
            encode_request(set().create_scheduled_event.opcode, &event.encode().unwrap())
                .unwrap();
        assert_eq!(mock.sent_frames(), vec![expected]);
    }

    #[tokio::test]
    async fn invalid_event_never_reaches_the_bus() {
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        let mut event = nightly_start();
        event.id = 0;
        assert!(device.create_scheduled_event(&event).await.is_err());
        assert_eq!(mock.write_calls(), 0);
    }

    #[tokio::test]
    async fn event_ids_expand_the_bitmask() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(
            set().get_scheduled_event_ids.opcode,
            &0b0000_0101u16.to_be_bytes(),
        ));

        let mut device = device_with(&mock);
        assert_eq!(device.scheduled_event_ids().await.unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn remove_event_validates_the_id() {
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        assert!(device.remove_scheduled_event(0).await.is_err());
        assert!(device.remove_scheduled_event(11).await.is_err());
        assert_eq!(mock.write_calls(), 0);

        mock.expect_reply(encode_response(set().remove_scheduled_event.opcode, &[1]));
        device.remove_scheduled_event(3).await.unwrap();
        let expected = encode_request(set().remove_scheduled_event.opcode, &[3]).unwrap();
        assert_eq!(mock.sent_frames(), vec![expected]);
    }

    #[tokio::test]
    async fn remove_all_events() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().remove_all_scheduled_events.opcode, &[1]));

        let mut device = device_with(&mock);
        device.remove_all_scheduled_events().await.unwrap();
    }

    // ---------------------------------------------------------------
    // Firmware and lifecycle
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn firmware_version_reads() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().get_firmware_version.opcode, b"v1.00.00"));

        let mut device = device_with(&mock);
        let ver = device.firmware_version().await.unwrap();
        assert_eq!(ver.as_str(), "v1.00.00");
    }

    #[tokio::test(start_paused = true)]
    async fn clear_program_storage_waits_for_the_erase() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().clear_program_storage.opcode, &[1]));

        let mut device = device_with(&mock);
        let start = tokio::time::Instant::now();
        device.clear_program_storage().await.unwrap();
        assert_eq!(start.elapsed(), ERASE_RESPONSE_DELAY);
    }

    #[tokio::test]
    async fn clear_program_storage_rejection() {
        let mock = MockBus::new();
        mock.expect_reply(encode_response(set().clear_program_storage.opcode, &[2]));

        let mut device = device_with(&mock);
        let err = device.clear_program_storage().await.unwrap_err();
        assert!(matches!(err, Error::CommandRejected(2)));
    }

    #[tokio::test]
    async fn update_firmware_reports_progress() {
        let commands = set();
        let mock = MockBus::new();
        mock.expect_reply(encode_response(commands.clear_program_storage.opcode, &[1]));
        mock.expect_reply(encode_response(
            commands.firmware_chunk.opcode,
            &2u16.to_be_bytes(),
        ));
        mock.expect_reply(encode_response(
            commands.firmware_chunk.opcode,
            &0xFFFFu16.to_be_bytes(),
        ));

        let image = vec![0xABu8; 40];
        let mut device = device_with(&mock);
        let mut steps = Vec::new();
        device
            .update_firmware(&image, UpdateMethod::FirmwareMode, |pct| steps.push(pct))
            .await
            .unwrap();

        assert_eq!(steps, vec![50, 100]);
        // Erase, two chunks, final reset.
        assert_eq!(mock.write_calls(), 4);
    }

    #[tokio::test]
    async fn reset_commands_write_once_and_never_read() {
        let commands = set();
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        device.reset_mcu().await.unwrap();

        assert_eq!(mock.write_calls(), 1);
        assert_eq!(mock.read_calls(), 0);
        let expected = encode_request(commands.reset_mcu.opcode, &[]).unwrap();
        assert_eq!(mock.sent_frames(), vec![expected]);
    }

    #[tokio::test]
    async fn factory_restore_is_fire_and_forget() {
        let commands = set();
        let mock = MockBus::new();

        let mut device = device_with(&mock);
        device.restore_factory_defaults().await.unwrap();

        let expected = encode_request(commands.restore_factory_defaults.opcode, &[]).unwrap();
        assert_eq!(mock.sent_frames(), vec![expected]);
        assert_eq!(mock.read_calls(), 0);
    }

    // ---------------------------------------------------------------
    // Connection
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn close_disconnects() {
        let mock = MockBus::new();
        let mut device = device_with(&mock);

        assert!(device.is_connected());
        device.close().await.unwrap();
        assert!(!device.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_device_surfaces_as_unavailable() {
        let mock = MockBus::new();
        // Nothing scripted: every read comes back silent.

        let mut device = device_with(&mock);
        let err = device.battery_level().await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
