//! Binary decoders for headband notification payloads.
//!
//! All functions here are pure and never panic on short input: a payload
//! too small to hold one sample decodes to an empty vector, and trailing
//! bytes that do not complete a sample group are ignored.
//!
//! | Format | Layout | Scale |
//! |---|---|---|
//! | `Signed24Le` | 3 bytes LE, sign from bit 23 | 0.02235174445530707 µV/LSB |
//! | `Signed16Le` | 2 bytes LE two's complement | 0.48828125 µV/LSB |
//! | `Packed12` | index header + 12-bit BE pairs | (raw − 2048) × 0.48828125 µV |

use crate::protocol::{SampleFormat, OFFSET_12BIT};

/// Decode little-endian signed 24-bit integers, 3 bytes per sample.
pub fn decode_signed_24bit_le(data: &[u8]) -> Vec<i32> {
    data.chunks_exact(3)
        .map(|c| {
            let raw = (c[0] as i32) | ((c[1] as i32) << 8) | ((c[2] as i32) << 16);
            // Shift the sign bit into bit 31, then arithmetic shift back
            (raw << 8) >> 8
        })
        .collect()
}

/// Encode one value into its 3-byte little-endian 24-bit representation.
///
/// Values outside `-8_388_608..=8_388_607` are clamped to the representable range.
pub fn encode_signed_24bit_le(value: i32) -> [u8; 3] {
    let clamped = value.clamp(-(1 << 23), (1 << 23) - 1);
    let bytes = clamped.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}

/// Decode little-endian signed 16-bit integers.
pub fn decode_signed_16bit_le(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

/// Decode the Muse classic packed 12-bit format (3 bytes → 2 samples, big-endian).
///
/// ```text
/// [AA BB CC] → sample0 = (AA << 4) | (BB >> 4)
///              sample1 = ((BB & 0x0F) << 8) | CC
/// ```
pub fn decode_unsigned_12bit(data: &[u8]) -> Vec<u16> {
    let mut out = Vec::with_capacity(data.len() / 3 * 2);
    for c in data.chunks_exact(3) {
        out.push(((c[0] as u16) << 4) | ((c[1] as u16) >> 4));
        out.push((((c[1] as u16) & 0x0F) << 8) | (c[2] as u16));
    }
    out
}

/// Decode a full notification payload into µV according to `format`.
///
/// Returns an empty vector when the payload cannot hold a single sample.
pub fn decode_payload(payload: &[u8], format: SampleFormat) -> Vec<f64> {
    if payload.len() < format.min_payload_len() {
        return Vec::new();
    }
    let scale = format.scale();
    match format {
        SampleFormat::Signed24Le => decode_signed_24bit_le(payload)
            .into_iter()
            .map(|n| n as f64 * scale)
            .collect(),
        SampleFormat::Signed16Le => decode_signed_16bit_le(payload)
            .into_iter()
            .map(|n| n as f64 * scale)
            .collect(),
        SampleFormat::Packed12 { header_bytes } => decode_unsigned_12bit(&payload[header_bytes..])
            .into_iter()
            .map(|n| (n as f64 - OFFSET_12BIT) * scale)
            .collect(),
    }
}

/// Read the big-endian packet index carried by Muse classic payloads.
pub fn packet_index(payload: &[u8]) -> Option<u16> {
    match payload {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SCALE_24BIT_UV;

    #[test]
    fn test_decode_24bit_sign_extension() {
        assert_eq!(decode_signed_24bit_le(&[0xFF, 0xFF, 0xFF]), vec![-1]);
        assert_eq!(decode_signed_24bit_le(&[0x00, 0x00, 0x80]), vec![-8_388_608]);
        assert_eq!(decode_signed_24bit_le(&[0xFF, 0xFF, 0x7F]), vec![8_388_607]);
        assert_eq!(decode_signed_24bit_le(&[0x01, 0x00, 0x00]), vec![1]);
    }

    #[test]
    fn test_24bit_encode_decode_recovers_value() {
        for x in [-8_388_608, -123_456, -1, 0, 1, 42, 1_000_000, 8_388_607] {
            let bytes = encode_signed_24bit_le(x);
            let decoded = decode_payload(&bytes, SampleFormat::Signed24Le);
            assert_eq!(decoded.len(), 1);
            let expected = x as f64 * SCALE_24BIT_UV;
            assert!((decoded[0] - expected).abs() < 1e-9, "x = {x}");
            assert!((decoded[0] / SCALE_24BIT_UV - x as f64).abs() < 1e-6);
        }
    }

    #[test]
    fn test_encode_24bit_clamps() {
        assert_eq!(encode_signed_24bit_le(i32::MAX), [0xFF, 0xFF, 0x7F]);
        assert_eq!(encode_signed_24bit_le(i32::MIN), [0x00, 0x00, 0x80]);
    }

    #[test]
    fn test_decode_16bit() {
        assert_eq!(decode_signed_16bit_le(&[0x01, 0x00, 0xFF, 0xFF]), vec![1, -1]);
        let uv = decode_payload(&[0x00, 0x80], SampleFormat::Signed16Le);
        assert_eq!(uv, vec![-32768.0 * 0.48828125]);
    }

    #[test]
    fn test_decode_12bit_classic() {
        // index 0x0001, then 0x800 and 0x801 packed
        let payload = [0x00, 0x01, 0x80, 0x08, 0x01];
        let uv = decode_payload(&payload, SampleFormat::Packed12 { header_bytes: 2 });
        assert_eq!(uv, vec![0.0, 0.48828125]);
        assert_eq!(packet_index(&payload), Some(1));
    }

    #[test]
    fn test_short_payload_yields_nothing() {
        assert!(decode_payload(&[0x01, 0x02], SampleFormat::Signed24Le).is_empty());
        assert!(decode_payload(&[0x01], SampleFormat::Signed16Le).is_empty());
        assert!(decode_payload(&[0x00, 0x01, 0x80], SampleFormat::Packed12 { header_bytes: 2 })
            .is_empty());
        assert!(decode_payload(&[], SampleFormat::Signed24Le).is_empty());
        assert_eq!(packet_index(&[0x01]), None);
    }

    #[test]
    fn test_trailing_partial_group_ignored() {
        let uv = decode_payload(&[0x01, 0x00, 0x00, 0xAA], SampleFormat::Signed24Le);
        assert_eq!(uv.len(), 1);
    }
}
