// Wire protocol for the wheel-unit controller board
//
// Command frame format for motion commands:
// [byte_count, magnitude..., exponent, direction_bit]
//
// The magnitude is a minimal little-endian byte run (low byte first, at
// least one byte). Values with a fractional part are scaled by 1000 before
// encoding and tagged with exponent -3; the device reconstructs the true
// value as magnitude * 10^exponent. Replies are 4-byte little-endian signed
// integers, always scaled by 1000.

/// Opcodes understood by the wheel-unit firmware
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Rotate the drive motor by a signed number of revolutions
    Rotate = 0x00,
    /// Read current position in revolutions (4 bytes)
    Position = 0x01,
    /// Turn the drive motor on continuously
    MotorOn = 0x02,
    /// Turn the drive motor off
    MotorOff = 0x03,
    /// Relative turn by signed degrees
    Turn = 0x04,
    /// Zero rotation AND relearn which encoder sign is positive
    ZeroAndLearnDirection = 0x05,
    /// Zero rotation only
    Zero = 0x06,
    /// Move to an absolute turn angle in degrees
    SetRotation = 0x07,
    /// Read current rotation in degrees (4 bytes)
    Rotation = 0x08,
    /// Task-status poll register (4 bytes)
    TaskStatus = 0x09,
}

/// Terminal status code reported when the drive motor finishes a task
pub const DRIVE_DONE_CODE: i32 = 500;
/// Terminal status code reported when the turn motor finishes a task
pub const TURN_DONE_CODE: i32 = 600;

/// All device replies are this many bytes
pub const REPLY_LEN: usize = 4;

/// Named direction for the drive motor. `Forward` is the default; `Backward`
/// reverses the wire polarity on top of the unit's calibration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriveDirection {
    #[default]
    Forward,
    Backward,
}

impl DriveDirection {
    pub fn is_reversed(self) -> bool {
        matches!(self, Self::Backward)
    }
}

/// Named direction for the steering motor. `Right` is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnDirection {
    #[default]
    Right,
    Left,
}

impl TurnDirection {
    pub fn is_reversed(self) -> bool {
        matches!(self, Self::Left)
    }
}

/// Encode a non-negative magnitude as (minimal LE byte run, decimal exponent).
///
/// Integral values encode directly with exponent 0. Fractional values are
/// scaled by 1000 and truncated, conveying up to three decimal digits with
/// exponent -3. Zero encodes as a single zero byte.
pub fn encode_magnitude(value: f64) -> (Vec<u8>, i8) {
    debug_assert!(value >= 0.0, "magnitude must be non-negative");

    let (mut remaining, exponent) = if value.fract() == 0.0 {
        (value as u64, 0)
    } else {
        ((value * 1000.0).trunc() as u64, -3)
    };

    let mut bytes = Vec::new();
    loop {
        bytes.push((remaining & 0xFF) as u8);
        remaining >>= 8;
        if remaining == 0 {
            break;
        }
    }

    (bytes, exponent)
}

/// Decode a little-endian signed two's-complement reply, inverting the x1000
/// scaling the device applies to all outgoing values.
pub fn decode_fixed_point(bytes: &[u8]) -> f64 {
    let mut raw: i64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        raw |= (b as i64) << (8 * i);
    }

    // Sign-extend from the reply's own width
    let bits = 8 * bytes.len() as u32;
    if bits > 0 && bits < 64 && bytes[bytes.len() - 1] & 0x80 != 0 {
        raw -= 1i64 << bits;
    }

    raw as f64 / 1000.0
}

/// Decode a 4-byte status reply into its raw code
pub fn decode_status(bytes: &[u8]) -> Option<i32> {
    let arr: [u8; REPLY_LEN] = bytes.try_into().ok()?;
    Some(i32::from_le_bytes(arr))
}

/// Resolve the wire polarity bit and the magnitude to encode.
///
/// The calibration bit is the base polarity; a negative value flips it, and a
/// reversed named direction flips it again. The two toggles compose by XOR,
/// so a negative value combined with a reversed direction cancels back to the
/// calibrated polarity.
pub fn resolve_direction(calibration: bool, value: f64, reversed: bool) -> (bool, f64) {
    let polarity = calibration ^ (value < 0.0) ^ reversed;
    (polarity, value.abs())
}

/// Build the payload for a magnitude-carrying motion command:
/// `[byte_count, magnitude..., exponent, direction_bit]`
pub fn motion_payload(value: f64, calibration: bool, reversed: bool) -> Vec<u8> {
    let (polarity, magnitude) = resolve_direction(calibration, value, reversed);
    let (mag_bytes, exponent) = encode_magnitude(magnitude);

    let mut payload = Vec::with_capacity(mag_bytes.len() + 3);
    payload.push(mag_bytes.len() as u8);
    payload.extend_from_slice(&mag_bytes);
    payload.push(exponent as u8);
    payload.push(polarity as u8);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reassemble a little-endian byte run into the integer it encodes
    fn reassemble(bytes: &[u8]) -> u64 {
        bytes
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &b)| acc | (b as u64) << (8 * i))
    }

    #[test]
    fn test_encode_zero_is_single_byte() {
        let (bytes, exp) = encode_magnitude(0.0);
        assert_eq!(bytes, vec![0]);
        assert_eq!(exp, 0);
    }

    #[test]
    fn test_encode_integral() {
        let (bytes, exp) = encode_magnitude(2500.0);
        // 2500 = 0x09C4, low byte first
        assert_eq!(bytes, vec![0xC4, 0x09]);
        assert_eq!(exp, 0);
    }

    #[test]
    fn test_encode_fractional_scales_by_1000() {
        let (bytes, exp) = encode_magnitude(2.5);
        assert_eq!(bytes, vec![0xC4, 0x09]); // 2500
        assert_eq!(exp, -3);
    }

    #[test]
    fn test_encode_minimality() {
        assert_eq!(encode_magnitude(255.0).0.len(), 1);
        assert_eq!(encode_magnitude(256.0).0.len(), 2);
        assert_eq!(encode_magnitude(65535.0).0.len(), 2);
        assert_eq!(encode_magnitude(65536.0).0.len(), 3);
    }

    #[test]
    fn test_encode_round_trip_integers() {
        for n in [0u64, 1, 7, 255, 256, 1000, 65535, 65536, 12_345_678, 1 << 40] {
            let (bytes, exp) = encode_magnitude(n as f64);
            assert_eq!(reassemble(&bytes), n, "round trip failed for {}", n);
            assert_eq!(exp, 0);
        }
    }

    #[test]
    fn test_encode_round_trip_rationals() {
        for x in [0.001, 0.5, 2.5, 45.125, 359.999] {
            let (bytes, exp) = encode_magnitude(x);
            assert_eq!(exp, -3);
            let recovered = reassemble(&bytes) as f64 * 1e-3;
            assert!(
                (recovered - x).abs() < 1e-3,
                "round trip for {} gave {}",
                x,
                recovered
            );
        }
    }

    #[test]
    fn test_decode_fixed_point_positive() {
        let bytes = 45000i32.to_le_bytes();
        assert_eq!(decode_fixed_point(&bytes), 45.0);
    }

    #[test]
    fn test_decode_fixed_point_negative() {
        let bytes = (-2500i32).to_le_bytes();
        assert_eq!(decode_fixed_point(&bytes), -2.5);
    }

    #[test]
    fn test_decode_status() {
        assert_eq!(decode_status(&500i32.to_le_bytes()), Some(500));
        assert_eq!(decode_status(&(-1i32).to_le_bytes()), Some(-1));
        assert_eq!(decode_status(&[0, 0]), None); // short reply
    }

    #[test]
    fn test_direction_truth_table() {
        // polarity = calibration XOR (value < 0) XOR reversed, all 8 cases
        for calibration in [false, true] {
            for negative in [false, true] {
                for reversed in [false, true] {
                    let value = if negative { -5.0 } else { 5.0 };
                    let (polarity, magnitude) = resolve_direction(calibration, value, reversed);
                    assert_eq!(polarity, calibration ^ negative ^ reversed);
                    assert_eq!(magnitude, 5.0);
                }
            }
        }
    }

    #[test]
    fn test_direction_flips_cancel() {
        // Negative value plus reversed direction lands back on the
        // calibrated-forward polarity
        let (polarity, magnitude) = resolve_direction(true, -5.0, true);
        assert!(polarity);
        assert_eq!(magnitude, 5.0);
    }

    #[test]
    fn test_motion_payload_layout() {
        // -2.5 revolutions, calibration true, direction not reversed:
        // magnitude 2500 over two bytes, exponent -3, polarity flipped once
        let payload = motion_payload(-2.5, true, false);
        assert_eq!(payload, vec![2, 0xC4, 0x09, 0xFD, 0]);
    }
}
