//! GATT UUIDs, the ordered service probe list, sample formats and command framing.
//!
//! Muse UUIDs live in the vendor namespace `273eXXXX-4c4d-454d-96be-f03bac821358`.
//! Discovery walks [`MUSE_PROBES`] front to back and binds the first probe
//! whose service and characteristic are both exposed by the peripheral, so the
//! order of that list is the fallback order.

use uuid::Uuid;

// ── Services ─────────────────────────────────────────────────────────────────

/// Primary GATT service advertised by all Muse headbands.
pub const MUSE_SERVICE: Uuid = Uuid::from_u128(0x0000fe8d_0000_1000_8000_00805f9b34fb);

/// Nordic UART service, used by generic BLE EEG boards.
pub const NORDIC_UART_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

// ── Characteristics ───────────────────────────────────────────────────────────

/// Muse control channel. Length-prefixed ASCII commands in, JSON fragments out.
pub const MUSE_CONTROL_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x273e0001_4c4d_454d_96be_f03bac821358);

/// Muse classic per-electrode EEG characteristics in electrode order.
pub const MUSE_EEG_CHARACTERISTICS: [Uuid; 5] = [
    Uuid::from_u128(0x273e0003_4c4d_454d_96be_f03bac821358), // TP9
    Uuid::from_u128(0x273e0004_4c4d_454d_96be_f03bac821358), // AF7
    Uuid::from_u128(0x273e0005_4c4d_454d_96be_f03bac821358), // AF8
    Uuid::from_u128(0x273e0006_4c4d_454d_96be_f03bac821358), // TP10
    Uuid::from_u128(0x273e0007_4c4d_454d_96be_f03bac821358), // AUX
];

/// Muse universal sensor characteristic (newer Muse S firmware).
pub const MUSE_UNIVERSAL_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x273e0013_4c4d_454d_96be_f03bac821358);

/// Nordic UART TX characteristic (peripheral → central notifications).
pub const NORDIC_UART_TX_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// Electrode names in [`MUSE_EEG_CHARACTERISTICS`] order.
pub const MUSE_CHANNEL_NAMES: [&str; 5] = ["TP9", "AF7", "AF8", "TP10", "AUX"];

/// Neurosity Crown electrode names in SDK order.
pub const NEUROSITY_CHANNEL_NAMES: [&str; 8] =
    ["CP3", "C3", "F5", "PO3", "PO4", "F6", "C4", "CP4"];

// ── Scale constants ───────────────────────────────────────────────────────────

/// µV per LSB for signed 24-bit samples.
pub const SCALE_24BIT_UV: f64 = 0.02235174445530707;

/// µV per LSB for signed 16-bit samples.
pub const SCALE_16BIT_UV: f64 = 0.48828125;

/// µV per LSB for Muse classic 12-bit samples (1000 µV / 2048 steps).
pub const SCALE_12BIT_UV: f64 = 0.48828125;

/// Mid-scale offset of the unsigned 12-bit Muse classic ADC.
pub const OFFSET_12BIT: f64 = 2048.0;

// ── Sample formats ────────────────────────────────────────────────────────────

/// Bit layout of a notification payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleFormat {
    /// Muse classic: `header_bytes` of packet index, then 12-bit big-endian packed
    /// unsigned samples centred at 2048.
    Packed12 { header_bytes: usize },
    /// Little-endian two's complement 16-bit.
    Signed16Le,
    /// Little-endian 24-bit, sign-extended from bit 23.
    Signed24Le,
}

impl SampleFormat {
    /// Bytes needed before the first sample can be decoded.
    pub fn min_payload_len(&self) -> usize {
        match self {
            SampleFormat::Packed12 { header_bytes } => header_bytes + 3,
            SampleFormat::Signed16Le => 2,
            SampleFormat::Signed24Le => 3,
        }
    }

    /// Conversion factor from raw counts to µV.
    pub fn scale(&self) -> f64 {
        match self {
            SampleFormat::Packed12 { .. } => SCALE_12BIT_UV,
            SampleFormat::Signed16Le => SCALE_16BIT_UV,
            SampleFormat::Signed24Le => SCALE_24BIT_UV,
        }
    }
}

// ── Probe list ────────────────────────────────────────────────────────────────

/// One service/characteristic pair to try during discovery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    pub label: &'static str,
    pub service: Uuid,
    pub characteristic: Uuid,
    pub format: SampleFormat,
    /// Channel label stamped on frames from this characteristic
    pub channel: &'static str,
}

/// Known EEG sources on Muse-family headbands, in fallback order.
pub const MUSE_PROBES: &[Probe] = &[
    Probe {
        label: "muse-universal",
        service: MUSE_SERVICE,
        characteristic: MUSE_UNIVERSAL_CHARACTERISTIC,
        format: SampleFormat::Signed24Le,
        channel: "ALL",
    },
    Probe {
        label: "muse-classic-tp9",
        service: MUSE_SERVICE,
        characteristic: MUSE_EEG_CHARACTERISTICS[0],
        format: SampleFormat::Packed12 { header_bytes: 2 },
        channel: MUSE_CHANNEL_NAMES[0],
    },
    Probe {
        label: "nordic-uart",
        service: NORDIC_UART_SERVICE,
        characteristic: NORDIC_UART_TX_CHARACTERISTIC,
        format: SampleFormat::Signed16Le,
        channel: "RAW",
    },
];

/// Return the first probe whose service and characteristic are both available.
///
/// `available` yields `(service, characteristic)` pairs as discovered on the
/// peripheral.
pub fn select_probe<'a>(
    probes: &'a [Probe],
    available: &[(Uuid, Uuid)],
) -> Option<&'a Probe> {
    probes.iter().find(|probe| {
        available
            .iter()
            .any(|&(service, characteristic)| {
                service == probe.service && characteristic == probe.characteristic
            })
    })
}

/// A characteristic to subscribe to once a probe has matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamPlan {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub channel: &'static str,
    pub format: SampleFormat,
}

/// Every stream to bind for `probe`.
///
/// A match on the classic TP9 characteristic also brings in AF7, AF8 and
/// TP10 when the peripheral exposes them, so all four electrodes stream.
/// Other probes bind only themselves.
pub fn expand_probe(probe: &Probe, available: &[(Uuid, Uuid)]) -> Vec<StreamPlan> {
    let mut plan = vec![StreamPlan {
        service: probe.service,
        characteristic: probe.characteristic,
        channel: probe.channel,
        format: probe.format,
    }];
    if probe.service == MUSE_SERVICE && probe.characteristic == MUSE_EEG_CHARACTERISTICS[0] {
        for (uuid, channel) in MUSE_EEG_CHARACTERISTICS[1..4]
            .iter()
            .zip(&MUSE_CHANNEL_NAMES[1..4])
        {
            if available.contains(&(MUSE_SERVICE, *uuid)) {
                plan.push(StreamPlan {
                    service: MUSE_SERVICE,
                    characteristic: *uuid,
                    channel: *channel,
                    format: probe.format,
                });
            }
        }
    }
    plan
}

// ── Control commands ──────────────────────────────────────────────────────────

/// Commands sent, in order, to start Muse streaming: halt, preset 21, data.
pub const MUSE_START_SEQUENCE: [&str; 3] = ["h", "p21", "d"];

/// Command that halts Muse streaming.
pub const MUSE_STOP_COMMAND: &str = "h";

/// Longest command whose length prefix still fits in one byte.
pub const MAX_COMMAND_LEN: usize = u8::MAX as usize - 1;

/// Encode a text command for the Muse control characteristic.
///
/// Wire format is `[len, cmd…, '\n']` where `len` counts the command and the
/// trailing newline. Returns `None` for commands longer than
/// [`MAX_COMMAND_LEN`].
pub fn encode_command(cmd: &str) -> Option<Vec<u8>> {
    let len = u8::try_from(cmd.len() + 1).ok()?;
    let mut bytes = Vec::with_capacity(cmd.len() + 2);
    bytes.push(len);
    bytes.extend_from_slice(cmd.as_bytes());
    bytes.push(b'\n');
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        assert_eq!(encode_command("d"), Some(vec![0x02, b'd', b'\n']));
        assert_eq!(
            encode_command("p21"),
            Some(vec![0x04, b'p', b'2', b'1', b'\n'])
        );
    }

    #[test]
    fn test_encode_command_length_limit() {
        let longest = "x".repeat(MAX_COMMAND_LEN);
        let bytes = encode_command(&longest).expect("254 bytes still fit");
        assert_eq!(bytes[0], 0xff);
        assert_eq!(bytes.len(), MAX_COMMAND_LEN + 2);

        assert!(encode_command(&"x".repeat(MAX_COMMAND_LEN + 1)).is_none());
        assert!(encode_command(&"x".repeat(300)).is_none());
    }

    #[test]
    fn test_expand_classic_binds_all_electrodes() {
        let available: Vec<(Uuid, Uuid)> = MUSE_EEG_CHARACTERISTICS
            .iter()
            .map(|c| (MUSE_SERVICE, *c))
            .chain([(MUSE_SERVICE, MUSE_CONTROL_CHARACTERISTIC)])
            .collect();
        let probe = select_probe(MUSE_PROBES, &available).expect("classic table should match");
        assert_eq!(probe.label, "muse-classic-tp9");

        let plan = expand_probe(probe, &available);
        let channels: Vec<_> = plan.iter().map(|p| p.channel).collect();
        assert_eq!(channels, vec!["TP9", "AF7", "AF8", "TP10"]);
        assert_eq!(plan[3].characteristic, MUSE_EEG_CHARACTERISTICS[3]);
        assert!(plan
            .iter()
            .all(|p| p.format == SampleFormat::Packed12 { header_bytes: 2 }));
    }

    #[test]
    fn test_expand_classic_skips_missing_electrodes() {
        let available = vec![
            (MUSE_SERVICE, MUSE_EEG_CHARACTERISTICS[0]),
            (MUSE_SERVICE, MUSE_EEG_CHARACTERISTICS[2]),
        ];
        let probe = select_probe(MUSE_PROBES, &available).unwrap();
        let channels: Vec<_> = expand_probe(probe, &available)
            .iter()
            .map(|p| p.channel)
            .collect();
        assert_eq!(channels, vec!["TP9", "AF8"]);
    }

    #[test]
    fn test_expand_universal_is_single_stream() {
        let available = vec![
            (MUSE_SERVICE, MUSE_UNIVERSAL_CHARACTERISTIC),
            (MUSE_SERVICE, MUSE_EEG_CHARACTERISTICS[1]),
        ];
        let probe = select_probe(MUSE_PROBES, &available).unwrap();
        let plan = expand_probe(probe, &available);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].channel, "ALL");
    }

    #[test]
    fn test_select_probe_prefers_list_order() {
        let available = vec![
            (MUSE_SERVICE, MUSE_EEG_CHARACTERISTICS[0]),
            (MUSE_SERVICE, MUSE_UNIVERSAL_CHARACTERISTIC),
        ];
        let probe = select_probe(MUSE_PROBES, &available).expect("a probe should match");
        assert_eq!(probe.label, "muse-universal");
    }

    #[test]
    fn test_select_probe_falls_back() {
        let available = vec![(NORDIC_UART_SERVICE, NORDIC_UART_TX_CHARACTERISTIC)];
        let probe = select_probe(MUSE_PROBES, &available).expect("fallback should match");
        assert_eq!(probe.format, SampleFormat::Signed16Le);
    }

    #[test]
    fn test_select_probe_requires_matching_service() {
        // Right characteristic under the wrong service is not a match
        let available = vec![(NORDIC_UART_SERVICE, MUSE_UNIVERSAL_CHARACTERISTIC)];
        assert!(select_probe(MUSE_PROBES, &available).is_none());
    }

    #[test]
    fn test_min_payload_len() {
        assert_eq!(SampleFormat::Packed12 { header_bytes: 2 }.min_payload_len(), 5);
        assert_eq!(SampleFormat::Signed24Le.min_payload_len(), 3);
    }
}
