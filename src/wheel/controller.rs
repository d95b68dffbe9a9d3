// High-level command surface for one wheel unit.
//
// Combines the wire protocol, the shared-bus lock and the completion poller
// into the public API: rotate / on / off / turn / reset / absolute rotation,
// plus position and rotation queries.
//
// Direction-calibration contract: turn-class commands are only directionally
// trustworthy after a `reset_rotation(true, ..)` round trip has succeeded at
// least once since the last device reset. The unit does not refuse commands
// before that, matching the firmware contract, but the state is observable
// through `is_direction_calibrated` instead of being silently wrong. If the
// device resets, the latch is stale and the caller must recalibrate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::bus::{BusError, SharedBus};
use crate::config::{POLL_INTERVAL, WheelConfig};

use super::completion::CompletionTracker;
use super::poller::{DoneCallback, ResponseSink, spawn_response_poller};
use super::protocol::{self, DriveDirection, Opcode, REPLY_LEN, TurnDirection};

/// One motorized wheel unit on the bus: a drive motor plus a steering motor
/// with a rotary encoder.
///
/// Cheap to clone; clones share the bus, the completion flags and the
/// calibration latch.
#[derive(Clone)]
pub struct Wheel {
    bus: SharedBus,
    address: u8,
    forward_is_positive: bool,
    right_is_positive: bool,
    poll_timeout: Option<Duration>,
    completion: Arc<CompletionTracker>,
    direction_calibrated: Arc<AtomicBool>,
}

impl Wheel {
    /// Bind a wheel unit to its bus endpoint.
    ///
    /// With `calibrate_on_startup` set (the default) this spawns a
    /// zero-and-learn-direction round trip; a failure there only logs a
    /// warning and leaves the unit uncalibrated, it never fails
    /// construction. Must be called within a tokio runtime.
    pub fn new(bus: SharedBus, config: WheelConfig) -> Self {
        let wheel = Self {
            bus,
            address: config.address,
            forward_is_positive: config.forward_is_positive,
            right_is_positive: config.right_is_positive,
            poll_timeout: config.poll_timeout,
            completion: Arc::new(CompletionTracker::default()),
            direction_calibrated: Arc::new(AtomicBool::new(false)),
        };

        if config.calibrate_on_startup {
            let unit = wheel.clone();
            tokio::spawn(async move {
                let notify: DoneCallback = Box::new(|outcome| {
                    if let Err(error) = outcome {
                        warn!("startup direction calibration failed: {}", error);
                    }
                });
                if let Err(error) = unit.reset_rotation(true, Some(notify)).await {
                    warn!("startup direction calibration never reached the bus: {}", error);
                }
            });
        }

        wheel
    }

    /// Rotate the drive motor by `revolutions` (sign and named direction both
    /// toggle polarity). Completion arrives via `done` or, when `None`, the
    /// drive-done flag.
    pub async fn rotate(
        &self,
        revolutions: f64,
        direction: DriveDirection,
        done: Option<DoneCallback>,
    ) -> Result<(), BusError> {
        let payload =
            protocol::motion_payload(revolutions, self.forward_is_positive, direction.is_reversed());
        self.write_and_poll(Opcode::Rotate, payload, done, false).await
    }

    /// Turn the drive motor on continuously; stays on until [`Wheel::off`].
    /// Fire-and-forget, no completion tracking.
    pub async fn on(&self, direction: DriveDirection) -> Result<(), BusError> {
        let polarity = self.forward_is_positive ^ direction.is_reversed();
        self.write(Opcode::MotorOn, vec![polarity as u8]).await
    }

    /// Turn the drive motor off. Fire-and-forget.
    pub async fn off(&self) -> Result<(), BusError> {
        self.write(Opcode::MotorOff, Vec::new()).await
    }

    /// Turn the wheel by a relative number of degrees.
    pub async fn turn_wheel(
        &self,
        degrees: f64,
        direction: TurnDirection,
        done: Option<DoneCallback>,
    ) -> Result<(), BusError> {
        let payload =
            protocol::motion_payload(degrees, self.right_is_positive, direction.is_reversed());
        self.write_and_poll(Opcode::Turn, payload, done, false).await
    }

    /// Turn the wheel back to its zero position. With `set_direction` the
    /// device also relearns which encoder sign is positive; a successful
    /// round trip then latches [`Wheel::is_direction_calibrated`].
    pub async fn reset_rotation(
        &self,
        set_direction: bool,
        done: Option<DoneCallback>,
    ) -> Result<(), BusError> {
        let opcode = if set_direction {
            Opcode::ZeroAndLearnDirection
        } else {
            Opcode::Zero
        };
        self.write_and_poll(opcode, Vec::new(), done, set_direction).await
    }

    /// Turn the wheel to an absolute angle in degrees from the zero position.
    pub async fn set_rotation(
        &self,
        degrees: f64,
        direction: TurnDirection,
        done: Option<DoneCallback>,
    ) -> Result<(), BusError> {
        let payload =
            protocol::motion_payload(degrees, self.right_is_positive, direction.is_reversed());
        self.write_and_poll(Opcode::SetRotation, payload, done, false).await
    }

    /// Distance travelled in revolutions since the device powered on.
    /// Blocks the caller for one bus round trip.
    pub async fn get_position(&self) -> Result<f64, BusError> {
        self.read_scaled(Opcode::Position, self.forward_is_positive).await
    }

    /// Rotation in degrees from the zero position, positive to the right.
    /// Blocks the caller for one bus round trip.
    pub async fn get_rotation(&self) -> Result<f64, BusError> {
        self.read_scaled(Opcode::Rotation, self.right_is_positive).await
    }

    /// Non-blocking [`Wheel::get_position`]: the round trip runs on a
    /// spawned task and the callback receives the result.
    pub fn get_position_async(
        &self,
        callback: impl FnOnce(Result<f64, BusError>) + Send + 'static,
    ) {
        let unit = self.clone();
        tokio::spawn(async move { callback(unit.get_position().await) });
    }

    /// Non-blocking [`Wheel::get_rotation`].
    pub fn get_rotation_async(
        &self,
        callback: impl FnOnce(Result<f64, BusError>) + Send + 'static,
    ) {
        let unit = self.clone();
        tokio::spawn(async move { callback(unit.get_rotation().await) });
    }

    /// Consume-on-read: has the drive motor finished a flag-tracked task?
    pub fn is_wheel_motor_done(&self) -> bool {
        self.completion.take_drive_done()
    }

    /// Consume-on-read: has the turn motor finished a flag-tracked task?
    pub fn is_turn_motor_done(&self) -> bool {
        self.completion.take_turn_done()
    }

    /// Consume-on-read: did a flag-tracked command fail?
    pub fn has_response_failed(&self) -> bool {
        self.completion.take_failed()
    }

    /// Has a set-direction reset completed successfully since construction?
    /// Not consumed by reading. Stale after a device reset.
    pub fn is_direction_calibrated(&self) -> bool {
        self.direction_calibrated.load(Ordering::SeqCst)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// One locked write transaction on the shared bus
    async fn write(&self, opcode: Opcode, payload: Vec<u8>) -> Result<(), BusError> {
        debug!(
            "write to 0x{:02X}: opcode {:?}, payload {:02X?}",
            self.address, opcode, payload
        );
        let mut bus = self.bus.lock().await;
        bus.write(self.address, opcode as u8, &payload).await
    }

    /// Write a command frame, then spawn the completion poller for it
    async fn write_and_poll(
        &self,
        opcode: Opcode,
        payload: Vec<u8>,
        done: Option<DoneCallback>,
        latch_calibration: bool,
    ) -> Result<(), BusError> {
        self.write(opcode, payload).await?;

        let sink = ResponseSink {
            tracker: Arc::clone(&self.completion),
            callback: done,
            calibration_latch: latch_calibration
                .then(|| Arc::clone(&self.direction_calibrated)),
        };
        spawn_response_poller(
            Arc::clone(&self.bus),
            self.address,
            POLL_INTERVAL,
            self.poll_timeout,
            sink,
        );
        Ok(())
    }

    /// One locked read transaction, decoded and sign-corrected
    async fn read_scaled(
        &self,
        opcode: Opcode,
        positive_calibration: bool,
    ) -> Result<f64, BusError> {
        let bytes = {
            let mut bus = self.bus.lock().await;
            bus.read(self.address, opcode as u8, REPLY_LEN).await?
        };
        if bytes.len() != REPLY_LEN {
            return Err(BusError::InvalidReply {
                address: self.address,
                reason: format!("expected {} bytes, got {}", REPLY_LEN, bytes.len()),
            });
        }

        let value = protocol::decode_fixed_point(&bytes);
        Ok(if positive_calibration { value } else { -value })
    }
}
