//! Indoor Bike Data and Heart Rate payload decoding.
//!
//! The bike layout is fixed to the notification format of a single vendor:
//! four little-endian `i16` words (`features`, speed, cadence, power)
//! followed by a trailing byte that is ignored. It is not a general FTMS
//! flag-driven parser.

use uuid::Uuid;

use crate::sensors::types::{BikeReading, DecodeError, HeartRateReading};

/// Indoor Bike Data Characteristic UUID (0x2AD2)
pub const INDOOR_BIKE_DATA_UUID: Uuid = Uuid::from_u128(0x0000_2ad2_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Measurement UUID (0x2A37)
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a37_0000_1000_8000_0080_5f9b_34fb);

/// km/h to mph
pub const KMH_TO_MPH: f64 = 0.6213711922;

/// Words read from the bike payload (features, speed, cadence, power)
const BIKE_WORDS: usize = 4;

/// Bytes of fixed layout plus the trailing byte
pub const BIKE_PAYLOAD_MIN_LEN: usize = BIKE_WORDS * 2 + 1;

/// Largest heart rate payload that still fits the decoded integer
pub const HEART_RATE_PAYLOAD_MAX_LEN: usize = 4;

/// Decode an Indoor Bike Data notification.
///
/// - speed: hundredths of km/h, converted to mph
/// - cadence: half RPM, rounded half to even
/// - power: watts, unchanged
pub fn decode_indoor_bike_data(data: &[u8]) -> Result<BikeReading, DecodeError> {
    if data.len() < BIKE_PAYLOAD_MIN_LEN {
        return Err(DecodeError::TooShort {
            expected: BIKE_PAYLOAD_MIN_LEN,
            actual: data.len(),
        });
    }

    // Drop the trailing byte, then read the leading words
    let body = &data[..data.len() - 1];
    let mut words = [0i16; BIKE_WORDS];
    for (word, chunk) in words.iter_mut().zip(body.chunks_exact(2)) {
        *word = i16::from_le_bytes([chunk[0], chunk[1]]);
    }
    let [_features, speed_raw, cadence_raw, power_raw] = words;

    let speed_mph = (speed_raw as f64 / 100.0) * KMH_TO_MPH;
    let cadence_rpm = (cadence_raw as f64 * 0.5).round_ties_even().max(0.0) as u16;

    Ok(BikeReading {
        speed_mph,
        cadence_rpm,
        power_watts: power_raw,
    })
}

/// Decode a heart rate notification.
///
/// The whole payload is read as one big-endian unsigned integer.
pub fn decode_heart_rate(data: &[u8]) -> Result<HeartRateReading, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::TooShort {
            expected: 1,
            actual: 0,
        });
    }
    if data.len() > HEART_RATE_PAYLOAD_MAX_LEN {
        return Err(DecodeError::TooLong {
            max: HEART_RATE_PAYLOAD_MAX_LEN,
            actual: data.len(),
        });
    }

    let heart_rate_bpm = data
        .iter()
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte));

    Ok(HeartRateReading { heart_rate_bpm })
}

/// Encode a bike payload in the same layout (used by simulators and tests).
pub fn encode_indoor_bike_data(speed_raw: i16, cadence_raw: i16, power_raw: i16) -> Vec<u8> {
    let mut data = Vec::with_capacity(BIKE_PAYLOAD_MIN_LEN);
    for word in [0x0244i16, speed_raw, cadence_raw, power_raw] {
        data.extend_from_slice(&word.to_le_bytes());
    }
    data.push(0x00);
    data
}
