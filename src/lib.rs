// Command/response layer for motorized wheel units on a shared half-duplex
// bus. The physical transport is pluggable through `bus::BusTransport`; this
// crate owns the frame encoding, direction calibration, and the asynchronous
// completion-tracking protocol.

pub mod bus;
pub mod config;
pub mod wheel;

pub use bus::{BusError, BusTransport, SharedBus, shared};
pub use config::WheelConfig;
pub use wheel::{DoneCallback, DriveDirection, TurnDirection, Wheel};
