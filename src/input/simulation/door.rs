//! Simulated garage door controller.
//!
//! Answers commands written to a [`MemoryTransport`] the way a real controller
//! does: Kogan-style doors report `opening`/`closing` straight away and the
//! end position after the travel time; boolean doors only report the end
//! position. A command while travelling halts the door without a report.

use crate::datapoint::{DpChanges, DpValue};
use crate::door::{DeviceProfile, VendorKind};
use crate::transport::MemoryTransport;
use log::info;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep_until};

/// Device-side model of the door, in the device's own polarity.
struct SimulatedDoor {
    profile: DeviceProfile,
    travel: Duration,
    open: bool,
    /// Direction (true = opening) and arrival time of a move in progress.
    heading: Option<(bool, Instant)>,
}

impl SimulatedDoor {
    fn new(profile: DeviceProfile, travel: Duration) -> Self {
        Self {
            profile,
            travel,
            open: false,
            heading: None,
        }
    }

    fn status(&self, open: bool, moving: bool) -> DpValue {
        match (self.profile.vendor, open, moving) {
            (VendorKind::KoganLike, true, true) => "opening".into(),
            (VendorKind::KoganLike, false, true) => "closing".into(),
            (VendorKind::KoganLike, true, false) => "opened".into(),
            (VendorKind::KoganLike, false, false) => "closed".into(),
            (_, open, _) => DpValue::Bool(open),
        }
    }

    fn initial_report(&self) -> DpChanges {
        let mut report = DpChanges::new();
        report.insert(self.profile.status_dp.clone(), self.status(self.open, false));
        report.insert(self.profile.alarm_dp.clone(), "none".into());
        if let Some(dp) = &self.profile.travel_time_dp {
            report.insert(dp.clone(), DpValue::Integer(self.travel.as_secs() as i64));
        }
        report
    }

    fn arrival(&self) -> Option<Instant> {
        self.heading.map(|(_, at)| at)
    }

    /// Apply a command; returns the report the device sends straight away, if any.
    fn command(&mut self, dp: &str, value: &DpValue, now: Instant) -> Option<DpChanges> {
        if dp != self.profile.action_dp {
            return None;
        }

        if self.heading.take().is_some() {
            info!("[Sim] Door halted mid-travel");
            // Halted doors are treated as open by the bridge
            self.open = true;
            return None;
        }

        let opening = match value {
            DpValue::Bool(b) => *b,
            DpValue::String(s) => s == "open",
            _ => return None,
        };
        info!("[Sim] Door {}", if opening { "opening" } else { "closing" });
        self.heading = Some((opening, now + self.travel));

        if self.profile.vendor.uses_boolean_status() {
            None
        } else {
            let mut report = DpChanges::new();
            report.insert(self.profile.status_dp.clone(), self.status(opening, true));
            Some(report)
        }
    }

    /// Finish the move in progress and return the final status report.
    fn arrive(&mut self) -> Option<DpChanges> {
        let (opening, _) = self.heading.take()?;
        self.open = opening;
        info!("[Sim] Door {}", if opening { "opened" } else { "closed" });

        let mut report = DpChanges::new();
        report.insert(self.profile.status_dp.clone(), self.status(opening, false));
        Some(report)
    }
}

/// Spawn a simulated door that reacts to commands written to `transport`.
///
/// Reports are stored in the transport and sent on `reports`. The task ends
/// when either channel closes.
pub fn run_door_simulation(
    profile: DeviceProfile,
    transport: Arc<MemoryTransport>,
    mut commands: mpsc::UnboundedReceiver<(String, DpValue)>,
    reports: mpsc::Sender<DpChanges>,
    travel: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut door = SimulatedDoor::new(profile, travel);
        if reports
            .send(transport.report(door.initial_report()))
            .await
            .is_err()
        {
            return;
        }

        loop {
            let arrival = door.arrival();
            let report = tokio::select! {
                command = commands.recv() => {
                    let Some((dp, value)) = command else { break };
                    door.command(&dp, &value, Instant::now())
                }
                _ = sleep_until(arrival.unwrap_or_else(Instant::now)), if arrival.is_some() => {
                    door.arrive()
                }
            };

            if let Some(report) = report
                && reports.send(transport.report(report)).await.is_err()
            {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn profile(manufacturer: &str) -> DeviceProfile {
        let mut config = Config::default().door;
        config.manufacturer = Some(manufacturer.to_string());
        DeviceProfile::resolve(&config)
    }

    #[test]
    fn test_kogan_reports_motion_then_end_position() {
        let mut door = SimulatedDoor::new(profile("Kogan"), Duration::from_secs(10));
        let now = Instant::now();

        let report = door.command("101", &"open".into(), now).unwrap();
        assert_eq!(report["102"], DpValue::from("opening"));
        assert_eq!(door.arrival(), Some(now + Duration::from_secs(10)));

        let report = door.arrive().unwrap();
        assert_eq!(report["102"], DpValue::from("opened"));
        assert!(door.arrival().is_none());
    }

    #[test]
    fn test_boolean_door_reports_only_end_position() {
        let mut door = SimulatedDoor::new(profile("Wofea"), Duration::from_secs(10));
        assert!(door.command("1", &DpValue::Bool(true), Instant::now()).is_none());
        assert_eq!(door.arrive().unwrap()["101"], DpValue::Bool(true));
    }

    #[test]
    fn test_command_mid_travel_halts_silently() {
        let mut door = SimulatedDoor::new(profile("Wofea"), Duration::from_secs(10));
        door.command("1", &DpValue::Bool(false), Instant::now());
        assert!(door.command("1", &DpValue::Bool(true), Instant::now()).is_none());
        assert!(door.arrival().is_none());
        assert!(door.arrive().is_none());
    }

    #[test]
    fn test_other_datapoints_are_ignored() {
        let mut door = SimulatedDoor::new(profile("Kogan"), Duration::from_secs(10));
        assert!(door.command("7", &"open".into(), Instant::now()).is_none());
        assert!(door.arrival().is_none());
    }
}
