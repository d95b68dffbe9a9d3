// Background completion poller.
//
// Every state-mutating command spawns one of these tasks. The task sleeps a
// poll interval, then reads the 4-byte status register until a terminal code
// (500 drive done / 600 turn done) or a transport error appears. A read
// failure is terminal for the poll, never retried.
//
// Protocol limitation, inherited from the device firmware: the status
// register carries no correlation id. When drive and turn commands are in
// flight at once, each poller resolves on whichever terminal code it happens
// to read first; correctness relies on the device serializing its motors and
// reporting codes in issue order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::bus::{BusError, SharedBus};

use super::completion::CompletionTracker;
use super::protocol::{self, DRIVE_DONE_CODE, Opcode, REPLY_LEN, TURN_DONE_CODE};

/// Completion callback: `Ok(())` when the device reports done, `Err` on a
/// transport failure or timeout.
pub type DoneCallback = Box<dyn FnOnce(Result<(), BusError>) + Send + 'static>;

/// Where a poll outcome goes: a one-shot callback when the caller supplied
/// one, otherwise the unit's consume-on-read flags. Optionally latches the
/// unit's direction-calibration state on success.
pub(crate) struct ResponseSink {
    pub tracker: Arc<CompletionTracker>,
    pub callback: Option<DoneCallback>,
    pub calibration_latch: Option<Arc<AtomicBool>>,
}

impl ResponseSink {
    pub(crate) fn resolve(self, outcome: Result<i32, BusError>) {
        if let Err(error) = &outcome {
            warn!("command did not complete: {}", error);
        } else if let Some(latch) = &self.calibration_latch {
            latch.store(true, Ordering::SeqCst);
        }

        match self.callback {
            Some(callback) => callback(outcome.map(|_| ())),
            None => match outcome {
                Ok(DRIVE_DONE_CODE) => self.tracker.mark_drive_done(),
                Ok(TURN_DONE_CODE) => self.tracker.mark_turn_done(),
                Ok(_) | Err(_) => self.tracker.mark_failed(),
            },
        }
    }
}

/// Spawn the poll loop for one in-flight command.
///
/// With `deadline` set, exceeding it resolves the sink with
/// [`BusError::Timeout`]; without it the loop runs until the device answers
/// or the bus fails, matching the firmware's own contract.
pub(crate) fn spawn_response_poller(
    bus: SharedBus,
    address: u8,
    poll_interval: Duration,
    deadline: Option<Duration>,
    sink: ResponseSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        loop {
            sleep(poll_interval).await;

            if let Some(limit) = deadline {
                if started.elapsed() >= limit {
                    sink.resolve(Err(BusError::Timeout { address }));
                    return;
                }
            }

            let reply = {
                let mut bus = bus.lock().await;
                bus.read(address, Opcode::TaskStatus as u8, REPLY_LEN).await
            };

            match reply {
                Ok(bytes) => match protocol::decode_status(&bytes) {
                    Some(code) if code == DRIVE_DONE_CODE || code == TURN_DONE_CODE => {
                        debug!("address 0x{:02X} reported terminal code {}", address, code);
                        sink.resolve(Ok(code));
                        return;
                    }
                    Some(_) => {} // still running, keep polling
                    None => {
                        sink.resolve(Err(BusError::InvalidReply {
                            address,
                            reason: format!("status reply was {} bytes", bytes.len()),
                        }));
                        return;
                    }
                },
                Err(error) => {
                    sink.resolve(Err(error));
                    return;
                }
            }
        }
    })
}
