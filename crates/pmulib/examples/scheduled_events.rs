//! Scheduled power events example.
//!
//! Installs a repeating morning wakeup, lists the occupied event slots,
//! then removes the event again.
//!
//! # Requirements
//!
//! - The HAT connected on the primary I2C bus
//! - The device RTC set (see [`PowerDevice::set_rtc_time`]), or time-based
//!   events will fire at the wrong moment
//!
//! # Usage
//!
//! ```sh
//! cargo run -p pmulib --example scheduled_events
//! ```
//!
//! [`PowerDevice::set_rtc_time`]: pmulib::PowerDevice::set_rtc_time

use pmulib::models::{EventAction, IntervalUnit, RepeatMode, ScheduleKind, ScheduledEvent};
use pmulib::PowerDeviceBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut device = PowerDeviceBuilder::new().build().await?;

    // Power the host on at 07:00 every day.
    let wakeup = ScheduledEvent {
        id: 1,
        schedule: ScheduleKind::Time,
        repeat: RepeatMode::Repeated,
        time_or_interval: 7 * 60 * 60,
        interval_unit: IntervalUnit::Seconds,
        day_mask: ScheduledEvent::EVERY_DAY,
        action: EventAction::Start,
    };
    device.create_scheduled_event(&wakeup).await?;
    println!("Installed wakeup in slot {}", wakeup.id);

    let ids = device.scheduled_event_ids().await?;
    println!("Occupied slots: {:?}", ids);

    device.remove_scheduled_event(wakeup.id).await?;
    println!("Removed slot {}", wakeup.id);

    let ids = device.scheduled_event_ids().await?;
    println!("Occupied slots now: {:?}", ids);

    device.close().await?;
    Ok(())
}
