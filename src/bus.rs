// Bus transport seam.
//
// The physical transport (I2C, serial bridge, ...) lives outside this crate;
// it only has to implement `BusTransport`. The bus is serial and half-duplex,
// so every transaction must run under the `SharedBus` mutex - the lock is
// scoped to the bus, not to a wheel unit, because several units can share one
// physical bus and concurrent pollers would otherwise interleave bytes
// mid-transaction.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Error type for all bus-layer failures
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus transport failure at address 0x{address:02X}: {reason}")]
    Transport { address: u8, reason: String },

    #[error("invalid reply from address 0x{address:02X}: {reason}")]
    InvalidReply { address: u8, reason: String },

    #[error("timed out waiting on address 0x{address:02X}")]
    Timeout { address: u8 },
}

/// Raw register-addressed read/write primitives for one bus.
///
/// `register` is the command opcode byte; payloads and replies are raw byte
/// runs as laid out in [`crate::wheel::protocol`].
#[async_trait]
pub trait BusTransport: Send {
    async fn write(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<(), BusError>;

    async fn read(&mut self, address: u8, register: u8, len: usize) -> Result<Vec<u8>, BusError>;
}

/// One bus shared by a foreground caller and any number of background
/// pollers. Locking per transaction is a hard requirement, not an
/// optimization.
pub type SharedBus = Arc<Mutex<dyn BusTransport>>;

/// Wrap a transport into a [`SharedBus`]
pub fn shared<T: BusTransport + 'static>(transport: T) -> SharedBus {
    Arc::new(Mutex::new(transport))
}

pub mod mock {
    //! Scripted in-memory transport for tests and demos.
    //!
    //! Reads are served from per-register queues pushed through the handle;
    //! an empty queue yields an all-zero reply (device still busy). Every
    //! write and read is recorded so tests can assert on exact frames.

    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{BusError, BusTransport};

    /// One recorded write transaction
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct WriteRecord {
        pub address: u8,
        pub register: u8,
        pub payload: Vec<u8>,
    }

    #[derive(Debug, Default)]
    struct MockState {
        writes: Vec<WriteRecord>,
        write_errors: VecDeque<BusError>,
        reads: HashMap<u8, VecDeque<Result<Vec<u8>, BusError>>>,
        read_log: Vec<u8>,
    }

    /// The transport half, handed to [`super::shared`]
    #[derive(Debug)]
    pub struct MockBus {
        state: Arc<Mutex<MockState>>,
    }

    /// The scripting/inspection half, kept by the test
    #[derive(Debug, Clone)]
    pub struct MockBusHandle {
        state: Arc<Mutex<MockState>>,
    }

    impl MockBus {
        pub fn new() -> (Self, MockBusHandle) {
            let state = Arc::new(Mutex::new(MockState::default()));
            (
                Self {
                    state: Arc::clone(&state),
                },
                MockBusHandle { state },
            )
        }
    }

    impl MockBusHandle {
        /// Queue the next reply for reads of `register`
        pub fn push_read(&self, register: u8, reply: Result<Vec<u8>, BusError>) {
            let mut state = self.state.lock().expect("mock bus lock poisoned");
            state.reads.entry(register).or_default().push_back(reply);
        }

        /// Queue `count` "still busy" (all-zero) replies for `register`
        pub fn push_busy(&self, register: u8, count: usize) {
            for _ in 0..count {
                self.push_read(register, Ok(vec![0; 4]));
            }
        }

        /// Fail the next write with `error`
        pub fn push_write_error(&self, error: BusError) {
            let mut state = self.state.lock().expect("mock bus lock poisoned");
            state.write_errors.push_back(error);
        }

        /// All writes seen so far, in order
        pub fn writes(&self) -> Vec<WriteRecord> {
            let state = self.state.lock().expect("mock bus lock poisoned");
            state.writes.clone()
        }

        /// Number of reads issued against `register`
        pub fn reads_of(&self, register: u8) -> usize {
            let state = self.state.lock().expect("mock bus lock poisoned");
            state.read_log.iter().filter(|&&r| r == register).count()
        }
    }

    #[async_trait]
    impl BusTransport for MockBus {
        async fn write(
            &mut self,
            address: u8,
            register: u8,
            bytes: &[u8],
        ) -> Result<(), BusError> {
            let mut state = self.state.lock().expect("mock bus lock poisoned");
            if let Some(error) = state.write_errors.pop_front() {
                return Err(error);
            }
            state.writes.push(WriteRecord {
                address,
                register,
                payload: bytes.to_vec(),
            });
            Ok(())
        }

        async fn read(
            &mut self,
            _address: u8,
            register: u8,
            len: usize,
        ) -> Result<Vec<u8>, BusError> {
            let mut state = self.state.lock().expect("mock bus lock poisoned");
            state.read_log.push(register);
            match state.reads.get_mut(&register).and_then(VecDeque::pop_front) {
                Some(reply) => reply,
                None => Ok(vec![0; len]),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockBus;
    use super::*;

    #[tokio::test]
    async fn test_mock_records_writes() {
        let (bus, handle) = MockBus::new();
        let bus = shared(bus);

        bus.lock().await.write(0x04, 0x00, &[1, 2, 3]).await.unwrap();

        let writes = handle.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].address, 0x04);
        assert_eq!(writes[0].register, 0x00);
        assert_eq!(writes[0].payload, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_mock_scripted_reads_then_busy() {
        let (bus, handle) = MockBus::new();
        let bus = shared(bus);
        handle.push_read(0x09, Ok(vec![0xF4, 0x01, 0, 0]));

        let first = bus.lock().await.read(0x04, 0x09, 4).await.unwrap();
        assert_eq!(first, vec![0xF4, 0x01, 0, 0]);

        // Script exhausted: device reads as still busy
        let second = bus.lock().await.read(0x04, 0x09, 4).await.unwrap();
        assert_eq!(second, vec![0, 0, 0, 0]);
        assert_eq!(handle.reads_of(0x09), 2);
    }

    #[tokio::test]
    async fn test_mock_write_error() {
        let (bus, handle) = MockBus::new();
        let bus = shared(bus);
        handle.push_write_error(BusError::Transport {
            address: 0x04,
            reason: "device absent".into(),
        });

        let result = bus.lock().await.write(0x04, 0x03, &[]).await;
        assert!(matches!(result, Err(BusError::Transport { .. })));
        assert!(handle.writes().is_empty());
    }
}
