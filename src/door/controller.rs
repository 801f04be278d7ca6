//! Garage door controller.
//!
//! One controller per physical door. It reconciles datapoint report batches
//! into the canonical door state, turns target-state requests into device
//! commands, and tracks in-flight moves with a safety timer.
//!
//! All state lives behind a per-door lock that is never held across an
//! `.await`. Commands are additionally serialized by an async gate, so two
//! near-simultaneous requests run one after the other.

use super::motion::MotionSession;
use super::notifier::DoorNotifier;
use super::profile::DeviceProfile;
use super::state::{CurrentDoorState, DoorEvent, TargetDoorState};
use super::translate::{
    activate_command, from_target, to_canonical, to_device_target, to_obstructed, to_target,
};
use crate::datapoint::{DpChanges, changes_to_json};
use crate::error::{BridgeError, Result};
use crate::transport::DatapointTransport;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Mutable per-door state, guarded by the controller's lock.
struct DoorInner {
    current: CurrentDoorState,
    target: TargetDoorState,
    obstructed: bool,
    motion: MotionSession,
}

pub struct GarageDoorController {
    profile: DeviceProfile,
    log_prefix: String,
    transport: Arc<dyn DatapointTransport>,
    inner: Arc<Mutex<DoorInner>>,
    notifier: DoorNotifier,
    /// Serializes `set_target_state` calls.
    command_gate: AsyncMutex<()>,
    /// Safety timer tasks that have not finished yet.
    timers: TaskTracker,
}

impl GarageDoorController {
    /// Create a controller for a door described by `profile`.
    ///
    /// The door starts out closed and unobstructed until the first report or
    /// [`refresh`](Self::refresh) says otherwise.
    pub fn new(profile: DeviceProfile, transport: Arc<dyn DatapointTransport>) -> Self {
        let log_prefix = profile.log_prefix();
        debug!(
            "[{}] Using action dp {}, status dp {}, alarm dp {}, travel time dp {:?}, flipped {}",
            log_prefix,
            profile.action_dp,
            profile.status_dp,
            profile.alarm_dp,
            profile.travel_time_dp,
            profile.flip_state
        );

        Self {
            profile,
            log_prefix,
            transport,
            inner: Arc::new(Mutex::new(DoorInner {
                current: CurrentDoorState::Closed,
                target: TargetDoorState::Closed,
                obstructed: false,
                motion: MotionSession::new(),
            })),
            notifier: DoorNotifier::new(),
            command_gate: AsyncMutex::new(()),
            timers: TaskTracker::new(),
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn current_state(&self) -> CurrentDoorState {
        self.inner.lock().current
    }

    pub fn target_state(&self) -> TargetDoorState {
        self.inner.lock().target
    }

    pub fn is_obstructed(&self) -> bool {
        self.inner.lock().obstructed
    }

    /// Whether a move issued by this controller is still in flight.
    pub fn is_moving(&self) -> bool {
        self.inner.lock().motion.is_active()
    }

    pub fn travel_time_secs(&self) -> u32 {
        self.inner.lock().motion.travel_time_secs()
    }

    /// Number of safety timers still running (cancelled ones exit on their next poll).
    pub fn live_timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Subscribe to upward change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<DoorEvent> {
        self.notifier.subscribe()
    }

    /// Number of change notifications emitted so far.
    pub fn version(&self) -> u32 {
        self.notifier.version()
    }

    fn set_current(&self, inner: &mut DoorInner, state: CurrentDoorState) {
        if inner.current != state {
            debug!(
                "[{}] Current state {} -> {}",
                self.log_prefix, inner.current, state
            );
            inner.current = state;
            self.notifier.notify(DoorEvent::CurrentState(state));
        }
    }

    fn set_target(&self, inner: &mut DoorInner, target: TargetDoorState) {
        if inner.target != target {
            debug!(
                "[{}] Target state {} -> {}",
                self.log_prefix, inner.target, target
            );
            inner.target = target;
            self.notifier.notify(DoorEvent::TargetState(target));
        }
    }

    /// Halted doors are reported open: the controllers have no native stopped report.
    fn snap_open(&self, inner: &mut DoorInner) {
        inner.motion.clear();
        self.set_current(inner, CurrentDoorState::Open);
        self.set_target(inner, TargetDoorState::Open);
    }

    /// Apply one batch of datapoint changes.
    ///
    /// Status is handled before the alarm, and the alarm before travel time.
    /// An obstruction reverses the door if it was moving when the batch
    /// arrived, even when the same batch carries a final status.
    pub fn handle_changes(&self, changes: &DpChanges) {
        info!("[{}] changed: {}", self.log_prefix, changes_to_json(changes));

        let mut inner = self.inner.lock();
        let was_moving = inner.motion.is_active();

        if let Some(raw) = changes.get(&self.profile.status_dp) {
            match to_canonical(self.profile.vendor, raw, self.profile.flip_state) {
                Some(state) => {
                    debug!(
                        "[{}] new/old current state {} {}",
                        self.log_prefix, state, inner.current
                    );
                    if state.is_terminal() && inner.motion.clear() {
                        debug!("[{}] Move finished with status {}", self.log_prefix, state);
                    }
                    self.set_target(&mut inner, to_target(state));
                    self.set_current(&mut inner, state);
                }
                None => warn!("[{}] Unknown door status {}", self.log_prefix, raw),
            }
        }

        if let Some(raw) = changes.get(&self.profile.alarm_dp) {
            let obstructed = to_obstructed(Some(raw));
            if inner.obstructed != obstructed {
                info!(
                    "[{}] Obstruction update: {} (obstructed: {})",
                    self.log_prefix, raw, obstructed
                );
                inner.obstructed = obstructed;
                self.notifier.notify(DoorEvent::Obstruction(obstructed));
            }
            if obstructed && was_moving {
                warn!(
                    "[{}] Obstruction while moving, assuming the door reversed to open",
                    self.log_prefix
                );
                self.snap_open(&mut inner);
            }
        }

        if let Some(dp) = &self.profile.travel_time_dp
            && let Some(raw) = changes.get(dp)
        {
            match raw.as_integer() {
                Some(secs) => {
                    let stored = inner.motion.set_travel_time_secs(secs);
                    debug!("[{}] Travel time now {}s", self.log_prefix, stored);
                }
                None => warn!(
                    "[{}] Ignoring malformed travel time {}, keeping {}s",
                    self.log_prefix,
                    raw,
                    inner.motion.travel_time_secs()
                ),
            }
        }
    }

    /// Request a new target state.
    ///
    /// While the door is moving this is a stop gesture: the activate command is
    /// sent and, once accepted, the door is reported open regardless of
    /// `target`. Returns once the transport accepts the command.
    pub async fn set_target_state(&self, target: TargetDoorState) -> Result<()> {
        let _gate = self.command_gate.lock().await;

        let moving = self.inner.lock().motion.is_active();
        if moving {
            self.stop_in_place(target).await
        } else {
            self.start_move(target).await
        }
    }

    async fn stop_in_place(&self, target: TargetDoorState) -> Result<()> {
        let device_target = to_device_target(target, self.profile.flip_state);
        let value = activate_command(self.profile.vendor, device_target);
        info!(
            "[{}] Door is moving, sending stop ({} = {})",
            self.log_prefix, self.profile.action_dp, value
        );

        if let Err(e) = self.transport.set_state(&self.profile.action_dp, value).await {
            warn!("[{}] Stop command failed: {}", self.log_prefix, e);
            return Err(e);
        }

        let mut inner = self.inner.lock();
        self.snap_open(&mut inner);
        Ok(())
    }

    async fn start_move(&self, target: TargetDoorState) -> Result<()> {
        let (generation, previous_target) = {
            let mut inner = self.inner.lock();
            let generation = inner.motion.begin();
            let previous_target = inner.target;
            self.set_target(&mut inner, target);
            (generation, previous_target)
        };

        let device_target = to_device_target(target, self.profile.flip_state);
        let value = from_target(self.profile.vendor, device_target);
        debug!(
            "[{}] setTargetDoorState {} -> dp {} = {}",
            self.log_prefix, target, self.profile.action_dp, value
        );

        match self.transport.set_state(&self.profile.action_dp, value).await {
            Ok(()) => {
                self.arm_safety_timer(generation);
                Ok(())
            }
            Err(e) => {
                warn!("[{}] Command failed: {}", self.log_prefix, e);
                let mut inner = self.inner.lock();
                if inner.motion.rollback(generation) {
                    self.set_target(&mut inner, previous_target);
                }
                Err(e)
            }
        }
    }

    /// Start the timer that clears a move nobody reported the end of.
    ///
    /// Expiry only clears the motion flag; it never changes the door state.
    fn arm_safety_timer(&self, generation: u64) {
        let token = CancellationToken::new();

        let timeout = {
            let mut inner = self.inner.lock();
            let timeout = inner.motion.safety_timeout();
            if !inner.motion.arm(generation, token.clone()) {
                debug!(
                    "[{}] Move ended before the command was acknowledged",
                    self.log_prefix
                );
                return;
            }
            timeout
        };

        let inner = Arc::downgrade(&self.inner);
        let log_prefix = self.log_prefix.clone();
        self.timers.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let Some(inner) = inner.upgrade() else { return };
                    let expired = inner.lock().motion.expire(generation);
                    if expired {
                        warn!(
                            "[{}] No final status within {:?}, clearing motion flag",
                            log_prefix, timeout
                        );
                    }
                }
            }
        });
    }

    /// Read the status datapoint from the device and translate it.
    ///
    /// An unrecognized value yields the cached state.
    pub async fn read_current_state(&self) -> Result<CurrentDoorState> {
        let raw = self.transport.get_state(&self.profile.status_dp).await?;
        match to_canonical(self.profile.vendor, &raw, self.profile.flip_state) {
            Some(state) => Ok(state),
            None => {
                warn!("[{}] Unknown door status {}", self.log_prefix, raw);
                Ok(self.current_state())
            }
        }
    }

    /// Read the status datapoint and derive the target state from it.
    pub async fn read_target_state(&self) -> Result<TargetDoorState> {
        let raw = self.transport.get_state(&self.profile.status_dp).await?;
        match to_canonical(self.profile.vendor, &raw, self.profile.flip_state) {
            Some(state) => Ok(to_target(state)),
            None => {
                warn!("[{}] Unknown door status {}", self.log_prefix, raw);
                Ok(self.target_state())
            }
        }
    }

    /// Read the alarm datapoint. An alarm never reported counts as "none".
    pub async fn read_obstructed(&self) -> Result<bool> {
        match self.transport.get_state(&self.profile.alarm_dp).await {
            Ok(raw) => Ok(to_obstructed(Some(&raw))),
            Err(BridgeError::DatapointUnavailable(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Pull status, alarm and travel time from the device and apply them as one batch.
    ///
    /// Fails only if the status datapoint cannot be read.
    pub async fn refresh(&self) -> Result<()> {
        let mut batch = DpChanges::new();
        let status = self.transport.get_state(&self.profile.status_dp).await?;
        batch.insert(self.profile.status_dp.clone(), status);

        let optional = [Some(&self.profile.alarm_dp), self.profile.travel_time_dp.as_ref()];
        for dp in optional.into_iter().flatten() {
            match self.transport.get_state(dp).await {
                Ok(value) => {
                    batch.insert(dp.clone(), value);
                }
                Err(e) => debug!("[{}] Skipping dp {} on refresh: {}", self.log_prefix, dp, e),
            }
        }

        self.handle_changes(&batch);
        Ok(())
    }
}

impl Drop for GarageDoorController {
    fn drop(&mut self) {
        self.inner.lock().motion.clear();
        self.timers.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::datapoint::DpValue;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    fn profile(manufacturer: Option<&str>, flip_state: bool) -> DeviceProfile {
        let mut config = Config::default().door;
        config.manufacturer = manufacturer.map(str::to_string);
        config.dp_travel_time = Some("103".to_string());
        config.flip_state = flip_state;
        DeviceProfile::resolve(&config)
    }

    fn door(
        manufacturer: Option<&str>,
        flip_state: bool,
    ) -> (GarageDoorController, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let controller = GarageDoorController::new(profile(manufacturer, flip_state), transport.clone());
        (controller, transport)
    }

    fn batch(entries: &[(&str, DpValue)]) -> DpChanges {
        entries
            .iter()
            .map(|(dp, value)| (dp.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_kogan_opening_then_opened() {
        let (door, _) = door(Some("Kogan"), false);

        door.handle_changes(&batch(&[("102", "opening".into())]));
        assert_eq!(door.current_state(), CurrentDoorState::Opening);
        assert_eq!(door.target_state(), TargetDoorState::Open);

        door.handle_changes(&batch(&[("102", "opened".into())]));
        assert_eq!(door.current_state(), CurrentDoorState::Open);
        assert_eq!(door.target_state(), TargetDoorState::Open);

        let version = door.version();
        door.handle_changes(&batch(&[("102", "opened".into())]));
        assert_eq!(door.version(), version);
    }

    #[test]
    fn test_repeated_status_is_a_noop() {
        let (door, _) = door(None, false);
        let mut rx = door.subscribe();

        door.handle_changes(&batch(&[("2", true.into())]));
        let after_first = door.version();
        assert!(after_first > 0);

        door.handle_changes(&batch(&[("2", true.into())]));
        assert_eq!(door.version(), after_first);

        assert_eq!(rx.try_recv().unwrap(), DoorEvent::TargetState(TargetDoorState::Open));
        assert_eq!(rx.try_recv().unwrap(), DoorEvent::CurrentState(CurrentDoorState::Open));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_target_follows_terminal_current() {
        let (door, _) = door(None, false);
        for raw in [true, false, true] {
            door.handle_changes(&batch(&[("2", raw.into())]));
            assert_eq!(door.target_state(), to_target(door.current_state()));
        }
    }

    #[test]
    fn test_flipped_door_mirrors_status() {
        let (plain, _) = door(Some("Kogan"), false);
        let (flipped, _) = door(Some("Kogan"), true);

        for raw in ["opening", "opened", "closing", "closed", "openning"] {
            let changes = batch(&[("102", raw.into())]);
            plain.handle_changes(&changes);
            flipped.handle_changes(&changes);
            assert_eq!(flipped.current_state(), plain.current_state().flipped(), "{}", raw);
        }

        flipped.handle_changes(&batch(&[("102", "opened".into())]));
        assert_eq!(flipped.current_state(), CurrentDoorState::Closed);
        assert_eq!(flipped.target_state(), TargetDoorState::Closed);
    }

    #[test]
    fn test_unknown_status_keeps_previous_state() {
        let (door, _) = door(Some("Kogan"), false);
        door.handle_changes(&batch(&[("102", "opened".into())]));
        let version = door.version();

        door.handle_changes(&batch(&[("102", "sideways".into())]));
        door.handle_changes(&batch(&[("102", true.into())]));
        assert_eq!(door.current_state(), CurrentDoorState::Open);
        assert_eq!(door.target_state(), TargetDoorState::Open);
        assert_eq!(door.version(), version);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boolean_door_open_then_status_true() {
        let (door, transport) = door(Some("Wofea"), false);

        tokio_test::assert_ok!(door.set_target_state(TargetDoorState::Open).await);
        assert_eq!(transport.sent(), vec![("1".to_string(), DpValue::Bool(true))]);
        assert!(door.is_moving());
        assert_eq!(door.target_state(), TargetDoorState::Open);
        assert_eq!(door.live_timer_count(), 1);

        door.handle_changes(&batch(&[("101", true.into())]));
        assert_eq!(door.current_state(), CurrentDoorState::Open);
        assert_eq!(door.target_state(), TargetDoorState::Open);
        assert!(!door.is_moving());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(door.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_timer_only_clears_motion() {
        let (door, _) = door(None, false);

        door.set_target_state(TargetDoorState::Open).await.unwrap();
        tokio::time::sleep(Duration::from_secs(24)).await;
        assert!(door.is_moving());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!door.is_moving());
        assert_eq!(door.current_state(), CurrentDoorState::Closed);
        assert_eq!(door.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_in_place_snaps_open() {
        let (door, transport) = door(None, false);
        door.handle_changes(&batch(&[("2", false.into())]));

        door.set_target_state(TargetDoorState::Open).await.unwrap();
        assert!(door.is_moving());

        door.set_target_state(TargetDoorState::Closed).await.unwrap();
        assert_eq!(
            transport.sent(),
            vec![
                ("1".to_string(), DpValue::Bool(true)),
                ("1".to_string(), DpValue::Bool(true)),
            ]
        );
        assert_eq!(door.current_state(), CurrentDoorState::Open);
        assert_eq!(door.target_state(), TargetDoorState::Open);
        assert!(!door.is_moving());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(door.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kogan_commands() {
        let (door, transport) = door(Some("kogan"), false);

        door.set_target_state(TargetDoorState::Closed).await.unwrap();
        door.handle_changes(&batch(&[("102", "closing".into())]));
        assert!(door.is_moving());

        // Second request while closing is the stop gesture
        door.set_target_state(TargetDoorState::Open).await.unwrap();
        assert_eq!(
            transport.sent(),
            vec![
                ("101".to_string(), DpValue::from("close")),
                ("101".to_string(), DpValue::from("open")),
            ]
        );
        assert_eq!(door.current_state(), CurrentDoorState::Open);
        assert!(!door.is_moving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flipped_command_uses_device_polarity() {
        let (door, transport) = door(None, true);
        door.set_target_state(TargetDoorState::Open).await.unwrap();
        assert_eq!(transport.sent(), vec![("1".to_string(), DpValue::Bool(false))]);
        assert_eq!(door.target_state(), TargetDoorState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_obstruction_while_moving_forces_open() {
        let (door, transport) = door(Some("Kogan"), false);

        door.set_target_state(TargetDoorState::Closed).await.unwrap();
        door.handle_changes(&batch(&[("102", "closing".into())]));

        door.handle_changes(&batch(&[("12", "unclosed_time".into())]));
        assert!(door.is_obstructed());
        assert_eq!(door.current_state(), CurrentDoorState::Open);
        assert_eq!(door.target_state(), TargetDoorState::Open);
        assert!(!door.is_moving());
        assert_eq!(transport.sent().len(), 1);

        door.handle_changes(&batch(&[("12", "none".into())]));
        assert!(!door.is_obstructed());
    }

    #[test]
    fn test_obstruction_while_idle_only_flags() {
        let (door, _) = door(None, false);
        door.handle_changes(&batch(&[("2", false.into())]));

        door.handle_changes(&batch(&[("12", "unclosed_time".into())]));
        assert!(door.is_obstructed());
        assert_eq!(door.current_state(), CurrentDoorState::Closed);
        assert_eq!(door.target_state(), TargetDoorState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_with_final_status_reverses_moving_door() {
        let (door, _) = door(None, false);
        door.set_target_state(TargetDoorState::Closed).await.unwrap();

        door.handle_changes(&batch(&[("2", false.into()), ("12", "unclosed_time".into())]));
        assert!(door.is_obstructed());
        assert!(!door.is_moving());
        assert_eq!(door.current_state(), CurrentDoorState::Open);
        assert_eq!(door.target_state(), TargetDoorState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moving_status_and_alarm_in_one_batch() {
        let (door, _) = door(Some("Kogan"), false);
        door.set_target_state(TargetDoorState::Closed).await.unwrap();

        door.handle_changes(&batch(&[("102", "closing".into()), ("12", "obstacle".into())]));
        assert_eq!(door.current_state(), CurrentDoorState::Open);
        assert_eq!(door.target_state(), TargetDoorState::Open);
        assert!(!door.is_moving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_command_rolls_back() {
        let (door, transport) = door(None, false);
        transport.set_fail_writes(true);

        tokio_test::assert_err!(door.set_target_state(TargetDoorState::Open).await);
        assert!(!door.is_moving());
        assert_eq!(door.target_state(), TargetDoorState::Closed);
        assert_eq!(door.live_timer_count(), 0);

        // A failure does not block later commands
        transport.set_fail_writes(false);
        tokio_test::assert_ok!(door.set_target_state(TargetDoorState::Open).await);
        assert!(door.is_moving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stop_keeps_session() {
        let (door, transport) = door(None, false);
        door.set_target_state(TargetDoorState::Open).await.unwrap();

        transport.set_fail_writes(true);
        tokio_test::assert_err!(door.set_target_state(TargetDoorState::Closed).await);
        assert!(door.is_moving());
        assert_eq!(door.current_state(), CurrentDoorState::Closed);

        transport.set_fail_writes(false);
        door.set_target_state(TargetDoorState::Closed).await.unwrap();
        assert!(!door.is_moving());
        assert_eq!(door.current_state(), CurrentDoorState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_taps_start_then_stop() {
        let (door, transport) = door(None, false);

        let (first, second) = tokio::join!(
            door.set_target_state(TargetDoorState::Open),
            door.set_target_state(TargetDoorState::Open)
        );
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(transport.sent().len(), 2);
        assert!(!door.is_moving());
        assert_eq!(door.current_state(), CurrentDoorState::Open);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(door.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_live_timer_across_moves() {
        let (door, _) = door(None, false);

        for _ in 0..3 {
            door.set_target_state(TargetDoorState::Open).await.unwrap();
            door.handle_changes(&batch(&[("2", true.into())]));
            door.set_target_state(TargetDoorState::Closed).await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(door.live_timer_count(), 1);
            door.handle_changes(&batch(&[("2", false.into())]));
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(door.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_travel_time_updates() {
        let (door, _) = door(None, false);

        door.handle_changes(&batch(&[("103", DpValue::Integer(40))]));
        assert_eq!(door.travel_time_secs(), 40);

        door.handle_changes(&batch(&[("103", "slow".into())]));
        assert_eq!(door.travel_time_secs(), 40);

        door.handle_changes(&batch(&[("103", DpValue::Integer(0))]));
        assert_eq!(door.travel_time_secs(), 1);

        door.handle_changes(&batch(&[("103", "30".into())]));
        door.set_target_state(TargetDoorState::Open).await.unwrap();
        tokio::time::sleep(Duration::from_secs(34)).await;
        assert!(door.is_moving());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!door.is_moving());
    }

    #[tokio::test]
    async fn test_reads_go_to_the_device() {
        let (door, transport) = door(Some("Kogan"), false);
        tokio_test::assert_err!(door.read_current_state().await);
        assert!(!door.read_obstructed().await.unwrap());

        transport.report(batch(&[("102", "closing".into()), ("12", "unclosed_time".into())]));
        assert_eq!(door.read_current_state().await.unwrap(), CurrentDoorState::Closing);
        assert_eq!(door.read_target_state().await.unwrap(), TargetDoorState::Closed);
        assert!(door.read_obstructed().await.unwrap());

        // Reads do not touch cached state
        assert_eq!(door.current_state(), CurrentDoorState::Closed);

        transport.set_fail_reads(true);
        tokio_test::assert_err!(door.read_obstructed().await);
    }

    #[tokio::test]
    async fn test_refresh_applies_device_snapshot() {
        let (door, transport) = door(Some("Kogan"), false);
        tokio_test::assert_err!(door.refresh().await);

        transport.report(batch(&[
            ("102", "opened".into()),
            ("12", "unclosed_time".into()),
            ("103", DpValue::Integer(45)),
        ]));
        door.refresh().await.unwrap();
        assert_eq!(door.current_state(), CurrentDoorState::Open);
        assert_eq!(door.target_state(), TargetDoorState::Open);
        assert!(door.is_obstructed());
        assert_eq!(door.travel_time_secs(), 45);
    }
}
