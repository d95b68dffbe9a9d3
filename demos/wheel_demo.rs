// Wheel command walkthrough against the in-memory mock bus.
//
// Shows the full command/response cycle without hardware: the frames each
// command puts on the wire, the completion poll loop, and the consume-on-read
// flags.
//
// Usage: cargo run --example wheel_demo -- [--address 4] [--revolutions -2.5]

use std::time::Duration;

use clap::Parser;
use tokio::time::sleep;

use wheel_runtime::bus::mock::MockBus;
use wheel_runtime::wheel::protocol::{DRIVE_DONE_CODE, Opcode, TURN_DONE_CODE};
use wheel_runtime::{DriveDirection, TurnDirection, Wheel, WheelConfig, shared};

#[derive(Parser)]
#[command(about = "Drive a simulated wheel unit through its command surface")]
struct Args {
    /// Bus address of the wheel unit
    #[arg(long, default_value_t = 0x04)]
    address: u8,

    /// Revolutions for the rotate command
    #[arg(long, default_value_t = -2.5)]
    revolutions: f64,

    /// Degrees for the turn command
    #[arg(long, default_value_t = 90.0)]
    degrees: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().expect("valid directive")),
        )
        .init();

    let args = Args::parse();
    let status = Opcode::TaskStatus as u8;

    let (mock, handle) = MockBus::new();
    let bus = shared(mock);

    // Script the device side: the startup calibration answers first, then
    // each motion command after a couple of busy polls.
    handle.push_read(status, Ok(TURN_DONE_CODE.to_le_bytes().to_vec()));
    handle.push_busy(status, 2);
    handle.push_read(status, Ok(DRIVE_DONE_CODE.to_le_bytes().to_vec()));
    handle.push_busy(status, 1);
    handle.push_read(status, Ok(TURN_DONE_CODE.to_le_bytes().to_vec()));
    handle.push_read(
        Opcode::Rotation as u8,
        Ok(45000i32.to_le_bytes().to_vec()),
    );

    let config = WheelConfig::new(args.address).with_calibration(true, false);
    let wheel = Wheel::new(bus, config);

    // Let the startup zero-and-learn-direction round trip settle
    sleep(Duration::from_millis(100)).await;
    println!("direction calibrated: {}", wheel.is_direction_calibrated());

    println!("rotate({} rev, Forward)...", args.revolutions);
    wheel.rotate(args.revolutions, DriveDirection::Forward, None).await?;
    while !wheel.is_wheel_motor_done() {
        sleep(Duration::from_millis(50)).await;
        if wheel.has_response_failed() {
            eprintln!("rotate failed");
            break;
        }
    }
    println!("drive motor done");

    println!("turn_wheel({} deg, Right)...", args.degrees);
    wheel.turn_wheel(args.degrees, TurnDirection::Right, None).await?;
    while !wheel.is_turn_motor_done() {
        sleep(Duration::from_millis(50)).await;
        if wheel.has_response_failed() {
            eprintln!("turn failed");
            break;
        }
    }
    println!("turn motor done");

    let rotation = wheel.get_rotation().await?;
    println!("rotation now {} deg (right calibration inverted)", rotation);

    wheel.on(DriveDirection::Backward).await?;
    wheel.off().await?;

    println!("\nframes on the wire:");
    for record in handle.writes() {
        println!(
            "  addr 0x{:02X} reg 0x{:02X} payload {:02X?}",
            record.address, record.register, record.payload
        );
    }

    Ok(())
}
