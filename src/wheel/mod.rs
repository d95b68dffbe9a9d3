// Wheel-unit control module
//
// Provides:
// - Wire protocol: opcodes, fixed-point codec, direction resolution
// - Consume-on-read completion flags
// - Background completion poller
// - High-level Wheel command API

mod completion;
mod controller;
mod poller;
pub mod protocol;

pub use controller::Wheel;
pub use poller::DoneCallback;
pub use protocol::{DriveDirection, TurnDirection};
