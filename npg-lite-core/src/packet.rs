//! Sample Encoder
//!
//! Turns one conversion frame into the 175-byte wire packet, and decodes it
//! again the way the host companion does.
//!
//! # Wire Format
//! ```text
//! row    = seq:u8 | ch0:u16be | ch1:u16be | ch2:u16be      (7 bytes)
//! packet = row[0] .. row[24]                                (175 bytes)
//! ```
//! Sequence numbers are consecutive mod 256 within a packet and continue
//! across packets for as long as the device is up.

use crate::config::{
    ADC_CODE_MASK, AcquisitionConfig, DATA_CHANNELS, PACKET_SIZE, RESCALE_DENOMINATOR, RESCALE_NUMERATOR,
    ROW_SIZE, ROWS_PER_PACKET,
};
use crate::error::{DecodeError, EncodeError};

/// One wireless notification worth of rows
pub type Packet = [u8; PACKET_SIZE];

/// One timestamped multi-channel sample as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketRow {
    /// Rolling 8-bit counter
    pub sequence: u8,
    /// Rescaled channel values
    pub channels: [u16; DATA_CHANNELS],
}

impl PacketRow {
    /// Writes the row in wire order
    pub fn encode_into(&self, out: &mut [u8; ROW_SIZE]) {
        out[0] = self.sequence;
        for (i, value) in self.channels.iter().enumerate() {
            out[1 + i * 2..3 + i * 2].copy_from_slice(&value.to_be_bytes());
        }
    }

    /// Reads a row from wire order
    pub fn decode(bytes: &[u8; ROW_SIZE]) -> Self {
        let mut channels = [0u16; DATA_CHANNELS];
        for (i, value) in channels.iter_mut().enumerate() {
            *value = u16::from_be_bytes([bytes[1 + i * 2], bytes[2 + i * 2]]);
        }
        Self {
            sequence: bytes[0],
            channels,
        }
    }
}

/// Maps a raw ADC code onto the transmitted range: `raw * 4095 / 3329`,
/// clamped to 16 bits. Only the 12 data bits of `raw` are used.
pub const fn rescale(raw: u16) -> u16 {
    let scaled = (raw & ADC_CODE_MASK) as u32 * RESCALE_NUMERATOR / RESCALE_DENOMINATOR;
    if scaled > u16::MAX as u32 { u16::MAX } else { scaled as u16 }
}

/// Encodes a conversion frame into `packet`.
///
/// Rows are stamped `first_sequence`, `first_sequence + 1`, ... (wrapping).
/// Returns the sequence number the next packet should start at. A frame of
/// the wrong size leaves `packet` untouched.
pub fn encode_packet(
    frame: &[u16],
    config: &AcquisitionConfig,
    first_sequence: u8,
    packet: &mut Packet,
) -> Result<u8, EncodeError> {
    let expected = config.frame_len();
    if frame.len() != expected {
        return Err(EncodeError::FrameSize {
            expected,
            actual: frame.len(),
        });
    }

    let mut sequence = first_sequence;
    let strides = frame.chunks_exact(config.stride());
    for (stride, out) in strides.zip(packet.chunks_exact_mut(ROW_SIZE)) {
        let mut row = PacketRow {
            sequence,
            channels: [0; DATA_CHANNELS],
        };
        for (value, raw) in row.channels.iter_mut().zip(stride) {
            *value = rescale(*raw);
        }
        // chunks_exact_mut(ROW_SIZE) always yields ROW_SIZE-long slices
        if let Ok(out) = <&mut [u8; ROW_SIZE]>::try_from(out) {
            row.encode_into(out);
        }
        sequence = sequence.wrapping_add(1);
    }
    Ok(sequence)
}

/// Splits a received notification back into its rows
pub fn decode_packet(bytes: &[u8]) -> Result<[PacketRow; ROWS_PER_PACKET], DecodeError> {
    if bytes.len() != PACKET_SIZE {
        return Err(DecodeError::Length {
            expected: PACKET_SIZE,
            actual: bytes.len(),
        });
    }

    let mut rows = [PacketRow::default(); ROWS_PER_PACKET];
    for (row, chunk) in rows.iter_mut().zip(bytes.chunks_exact(ROW_SIZE)) {
        if let Ok(chunk) = <&[u8; ROW_SIZE]>::try_from(chunk) {
            *row = PacketRow::decode(chunk);
        }
    }
    Ok(rows)
}

/// Counts counter discontinuities, the way a host detects lost rows.
///
/// `previous` is the last sequence number seen before `rows`, if any.
pub fn sequence_gaps(previous: Option<u8>, rows: &[PacketRow]) -> usize {
    let mut gaps = 0;
    let mut last = previous;
    for row in rows {
        if let Some(last) = last {
            if row.sequence != last.wrapping_add(1) {
                gaps += 1;
            }
        }
        last = Some(row.sequence);
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatteryTap, ChannelSet};

    const WITH_BATTERY: AcquisitionConfig = AcquisitionConfig {
        channels: ChannelSet::Primary,
        battery: BatteryTap::Multiplexed,
    };

    const DATA_ONLY: AcquisitionConfig = AcquisitionConfig {
        channels: ChannelSet::Primary,
        battery: BatteryTap::None,
    };

    fn synthetic_frame(config: &AcquisitionConfig) -> Vec<u16> {
        (0..config.frame_len()).map(|i| ((i * 37) % 4096) as u16).collect()
    }

    #[test]
    fn rescale_matches_reference_formula() {
        assert_eq!(rescale(0), 0);
        assert_eq!(rescale(3329), 4095);
        assert_eq!(rescale(1000), (1000u32 * 4095 / 3329) as u16);
        assert_eq!(rescale(4095), 5037);
    }

    #[test]
    fn rescale_ignores_flag_bits_above_the_code() {
        assert_eq!(rescale(0x8000 | 1000), rescale(1000));
    }

    #[test]
    fn row_layout_is_sequence_then_big_endian_channels() {
        let row = PacketRow {
            sequence: 0xAB,
            channels: [0x0102, 0x0304, 0x0506],
        };
        let mut out = [0u8; ROW_SIZE];
        row.encode_into(&mut out);
        assert_eq!(out, [0xAB, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn encoded_rows_carry_consecutive_sequences_and_rescaled_codes() {
        let frame = synthetic_frame(&WITH_BATTERY);
        let mut packet = [0u8; PACKET_SIZE];
        let next = encode_packet(&frame, &WITH_BATTERY, 250, &mut packet).unwrap();

        // 250 + 25 wraps past 255
        assert_eq!(next, 19);
        let rows = decode_packet(&packet).unwrap();
        for (j, row) in rows.iter().enumerate() {
            assert_eq!(row.sequence, 250u8.wrapping_add(j as u8));
            for i in 0..DATA_CHANNELS {
                assert_eq!(row.channels[i], rescale(frame[j * 4 + i]));
            }
        }
    }

    #[test]
    fn battery_slot_is_never_transmitted() {
        let mut frame = vec![0u16; WITH_BATTERY.frame_len()];
        for stride in frame.chunks_exact_mut(4) {
            stride[3] = 4095;
        }
        let mut packet = [0u8; PACKET_SIZE];
        encode_packet(&frame, &WITH_BATTERY, 0, &mut packet).unwrap();
        let rows = decode_packet(&packet).unwrap();
        assert!(rows.iter().all(|row| row.channels == [0, 0, 0]));
    }

    #[test]
    fn data_only_frames_use_a_stride_of_three() {
        let frame = synthetic_frame(&DATA_ONLY);
        let mut packet = [0u8; PACKET_SIZE];
        encode_packet(&frame, &DATA_ONLY, 0, &mut packet).unwrap();
        let rows = decode_packet(&packet).unwrap();
        assert_eq!(rows[24].channels[2], rescale(frame[24 * 3 + 2]));
    }

    #[test]
    fn wrong_frame_size_is_rejected_without_touching_the_packet() {
        let frame = vec![1u16; WITH_BATTERY.frame_len() - 1];
        let mut packet = [0x55u8; PACKET_SIZE];
        let err = encode_packet(&frame, &WITH_BATTERY, 0, &mut packet).unwrap_err();
        assert_eq!(err, EncodeError::FrameSize {
            expected: 100,
            actual: 99
        });
        assert!(packet.iter().all(|b| *b == 0x55));
    }

    #[test]
    fn counters_10_to_34_survive_decode_bit_exact() {
        let frame = synthetic_frame(&WITH_BATTERY);
        let mut packet = [0u8; PACKET_SIZE];
        encode_packet(&frame, &WITH_BATTERY, 10, &mut packet).unwrap();
        let rows = decode_packet(&packet).unwrap();
        let sequences: Vec<u8> = rows.iter().map(|row| row.sequence).collect();
        assert_eq!(sequences, (10..=34).collect::<Vec<u8>>());
        assert_eq!(rows[3].channels, [
            rescale(frame[12]),
            rescale(frame[13]),
            rescale(frame[14])
        ]);
    }

    #[test]
    fn decode_rejects_short_notifications() {
        assert_eq!(decode_packet(&[0u8; 174]), Err(DecodeError::Length {
            expected: 175,
            actual: 174
        }));
    }

    #[test]
    fn gaps_are_counted_at_each_discontinuity() {
        let rows: Vec<PacketRow> = [254u8, 255, 0, 5, 6]
            .iter()
            .map(|seq| PacketRow {
                sequence: *seq,
                channels: [0; 3],
            })
            .collect();
        assert_eq!(sequence_gaps(Some(253), &rows), 1);
        assert_eq!(sequence_gaps(Some(200), &rows), 2);
        assert_eq!(sequence_gaps(None, &rows[..3]), 0);
    }
}
