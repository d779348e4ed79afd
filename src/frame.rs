//! Frame codec for the Solivia serial protocol
//!
//! Implements the request/response framing from the Public Solar Inverter
//! Communication Protocol (version 1.2): a fixed sync marker, target address,
//! command and subcommand, payload, CRC-16 and an end marker. Encoding is a
//! pure function of (address, command); decoding validates sync, length, CRC
//! and responder address before any payload byte is interpreted.
//!
//! The exact Variant-15 payload layout is fixed in [`parse_variant15`]; scale
//! factors are part of the protocol, not configurable.

use crate::error::FrameError;
use crate::measurement::Measurement;

/// Start of protocol
pub const STX: u8 = 0x02;
/// End of protocol
pub const ETX: u8 = 0x03;
/// Enquiry (request frames)
pub const ENQ: u8 = 0x05;
/// Acknowledge (response frames)
pub const ACK: u8 = 0x06;
/// Negative acknowledge
pub const NAK: u8 = 0x15;

/// Command byte for the Variant-15 measurement/statistics query
pub const CMD_MEASUREMENT: u8 = 0x60;
/// Subcommand byte for the Variant-15 measurement/statistics query
pub const SUB_MEASUREMENT: u8 = 0x01;

/// Size of the Variant-15 measurement payload in bytes
pub const VARIANT15_PAYLOAD_LEN: usize = 58;

const PART_NUMBER_LEN: usize = 11;
const SERIAL_NUMBER_LEN: usize = 13;

/// Minimum number of bytes any valid frame occupies:
/// STX, type, address, length, cmd, sub, CRC low, CRC high, ETX.
pub const MIN_FRAME_LEN: usize = 9;

/// CRC-16 over `data`, reflected polynomial 0xA001, initial value 0x0000.
///
/// Computed from the byte after STX through the last data byte, matching the
/// inverter firmware.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// A validated response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Address of the inverter that answered
    pub address: u8,
    /// Command byte echoed by the inverter
    pub command: u8,
    /// Subcommand byte echoed by the inverter
    pub subcommand: u8,
    /// Payload bytes (command and subcommand stripped)
    pub payload: Vec<u8>,
}

/// Encode a request frame for the given inverter address and command.
///
/// Layout: `STX ENQ addr len cmd sub crc_lo crc_hi ETX` with `len` fixed to 2
/// (command and subcommand, no payload). Deterministic, no side effects.
pub fn encode_request(address: u8, command: u8, subcommand: u8) -> Vec<u8> {
    let mut frame = vec![STX, ENQ, address, 0x02, command, subcommand];
    let crc = crc16(&frame[1..]);
    frame.push((crc & 0xFF) as u8);
    frame.push((crc >> 8) as u8);
    frame.push(ETX);
    frame
}

/// Encode the standard measurement enquiry for an inverter.
pub fn encode_measurement_request(address: u8) -> Vec<u8> {
    encode_request(address, CMD_MEASUREMENT, SUB_MEASUREMENT)
}

/// Encode a response frame. Used by the bus simulator in tests and by the
/// gateway-facing side of dual-mode setups.
pub fn encode_response(address: u8, command: u8, subcommand: u8, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 2) as u8;
    let mut frame = vec![STX, ACK, address, len, command, subcommand];
    frame.extend_from_slice(payload);
    let crc = crc16(&frame[1..]);
    frame.push((crc & 0xFF) as u8);
    frame.push((crc >> 8) as u8);
    frame.push(ETX);
    frame
}

/// Decode and validate a response frame.
///
/// Checks, in order: minimum length, sync marker, acknowledge byte, declared
/// length against actual length, end marker, CRC, and finally that the
/// responding address matches `expected_address`. Sync/CRC failures yield
/// [`FrameError::Malformed`]; a wrong responder yields
/// [`FrameError::AddressMismatch`]. Neither is fatal to the caller.
pub fn decode_response(buf: &[u8], expected_address: u8) -> Result<ResponseFrame, FrameError> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(FrameError::malformed(format!(
            "frame too short: {} bytes",
            buf.len()
        )));
    }
    if buf[0] != STX {
        return Err(FrameError::malformed(format!(
            "bad sync marker 0x{:02X}",
            buf[0]
        )));
    }
    if buf[1] == NAK {
        return Err(FrameError::malformed("inverter rejected request (NAK)"));
    }
    if buf[1] != ACK {
        return Err(FrameError::malformed(format!(
            "bad frame type 0x{:02X}",
            buf[1]
        )));
    }

    let data_len = buf[3] as usize;
    if data_len < 2 || buf.len() != data_len + 7 {
        return Err(FrameError::malformed(format!(
            "length mismatch: header says {} data bytes, frame is {} bytes",
            data_len,
            buf.len()
        )));
    }
    if buf[buf.len() - 1] != ETX {
        return Err(FrameError::malformed("missing end marker"));
    }

    let crc_pos = 4 + data_len;
    let expected_crc = u16::from(buf[crc_pos]) | (u16::from(buf[crc_pos + 1]) << 8);
    let actual_crc = crc16(&buf[1..crc_pos]);
    if expected_crc != actual_crc {
        return Err(FrameError::malformed(format!(
            "CRC mismatch: frame 0x{:04X}, calculated 0x{:04X}",
            expected_crc, actual_crc
        )));
    }

    let address = buf[2];
    if address != expected_address {
        return Err(FrameError::AddressMismatch {
            expected: expected_address,
            actual: address,
        });
    }

    Ok(ResponseFrame {
        address,
        command: buf[4],
        subcommand: buf[5],
        payload: buf[6..crc_pos].to_vec(),
    })
}

/// Incremental frame reassembly over a byte stream.
///
/// The bus delivers bytes in arbitrary chunks and may carry noise between
/// frames. The assembler buffers incoming bytes, drops leading garbage one
/// byte at a time until a plausible header lines up, and yields one complete
/// raw frame at a time.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes to the reassembly buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Discard any buffered bytes. Called between poll cycles so a stale
    /// partial frame cannot leak into the next transaction.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Try to extract the next complete frame from the buffer.
    ///
    /// Returns `None` when more bytes are needed. Leading bytes that cannot
    /// start a response frame are silently discarded.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            // Resync: slide until the buffer starts with a plausible header
            while !self.buf.is_empty() && !Self::plausible_start(&self.buf) {
                self.buf.remove(0);
            }
            if self.buf.len() < 4 {
                return None;
            }

            let data_len = self.buf[3] as usize;
            let total = data_len + 7;
            if data_len < 2 {
                // Corrupt length byte; drop the sync byte and resync
                self.buf.remove(0);
                continue;
            }
            if self.buf.len() < total {
                return None;
            }

            let frame: Vec<u8> = self.buf.drain(..total).collect();
            return Some(frame);
        }
    }

    fn plausible_start(buf: &[u8]) -> bool {
        if buf[0] != STX {
            return false;
        }
        if buf.len() >= 2 && buf[1] != ACK && buf[1] != NAK {
            return false;
        }
        if buf.len() >= 3 && buf[2] == 0 {
            return false;
        }
        true
    }
}

/// Decoded Variant-15 measurement payload: identification strings plus all
/// numeric fields with their protocol scale factors already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant15 {
    pub part_number: String,
    pub serial_number: String,
    /// Scaled readings in payload order
    pub readings: Vec<(Measurement, f64)>,
}

fn extract_u16(data: &[u8]) -> u16 {
    (u16::from(data[0]) << 8) | u16::from(data[1])
}

fn extract_u32(data: &[u8]) -> u32 {
    (u32::from(data[0]) << 24)
        | (u32::from(data[1]) << 16)
        | (u32::from(data[2]) << 8)
        | u32::from(data[3])
}

fn extract_ascii(data: &[u8]) -> String {
    let text: String = data
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                ' '
            }
        })
        .collect();
    text.trim().to_string()
}

/// Per-field protocol scale factor (raw integer -> physical unit).
fn scale_of(kind: Measurement) -> f64 {
    match kind {
        Measurement::SolarVoltage
        | Measurement::SolarCurrent
        | Measurement::AcCurrent
        | Measurement::AcVoltage
        | Measurement::GridVoltage
        | Measurement::SuppliedEnergyTotal => 0.1,
        Measurement::AcFrequency | Measurement::GridFrequency => 0.01,
        Measurement::AcPower
        | Measurement::SuppliedEnergyToday
        | Measurement::RuntimeMinutes
        | Measurement::MaxAcPowerToday
        | Measurement::MaxSolarInputPower
        | Measurement::RuntimeHours => 1.0,
    }
}

/// Parse a Variant-15 measurement payload.
///
/// Layout (big-endian): 11 bytes part number, 13 bytes serial number, then
/// eleven 16-bit and three 32-bit fields in [`Measurement::ALL`] order.
pub fn parse_variant15(payload: &[u8]) -> Result<Variant15, FrameError> {
    if payload.len() < VARIANT15_PAYLOAD_LEN {
        return Err(FrameError::malformed(format!(
            "measurement payload too short: {} bytes, need {}",
            payload.len(),
            VARIANT15_PAYLOAD_LEN
        )));
    }

    let part_number = extract_ascii(&payload[0..PART_NUMBER_LEN]);
    let serial_number =
        extract_ascii(&payload[PART_NUMBER_LEN..PART_NUMBER_LEN + SERIAL_NUMBER_LEN]);

    let mut pos = PART_NUMBER_LEN + SERIAL_NUMBER_LEN;
    let mut readings = Vec::with_capacity(Measurement::ALL.len());
    for kind in Measurement::ALL {
        let raw = match kind {
            Measurement::SuppliedEnergyToday
            | Measurement::SuppliedEnergyTotal
            | Measurement::RuntimeHours => {
                let v = f64::from(extract_u32(&payload[pos..pos + 4]));
                pos += 4;
                v
            }
            _ => {
                let v = f64::from(extract_u16(&payload[pos..pos + 2]));
                pos += 2;
                v
            }
        };
        readings.push((kind, raw * scale_of(kind)));
    }

    Ok(Variant15 {
        part_number,
        serial_number,
        readings,
    })
}

/// Build a Variant-15 payload from raw (unscaled) field values. Inverse of
/// [`parse_variant15`]; used by tests and the bus simulator.
pub fn build_variant15(part_number: &str, serial_number: &str, raw: &[(Measurement, u32)]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(VARIANT15_PAYLOAD_LEN);

    let mut part = part_number.as_bytes().to_vec();
    part.resize(PART_NUMBER_LEN, b' ');
    payload.extend_from_slice(&part);

    let mut serial = serial_number.as_bytes().to_vec();
    serial.resize(SERIAL_NUMBER_LEN, b' ');
    payload.extend_from_slice(&serial);

    for kind in Measurement::ALL {
        let value = raw
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, v)| *v);
        match kind {
            Measurement::SuppliedEnergyToday
            | Measurement::SuppliedEnergyTotal
            | Measurement::RuntimeHours => payload.extend_from_slice(&value.to_be_bytes()),
            _ => payload.extend_from_slice(&(value as u16).to_be_bytes()),
        }
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_is_stable() {
        // Reference vector for CRC-16 with poly 0xA001, init 0x0000
        assert_eq!(crc16(b"123456789"), 0xBB3D);
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn encode_request_layout() {
        let frame = encode_measurement_request(1);
        assert_eq!(frame.len(), MIN_FRAME_LEN);
        assert_eq!(frame[0], STX);
        assert_eq!(frame[1], ENQ);
        assert_eq!(frame[2], 1);
        assert_eq!(frame[3], 0x02);
        assert_eq!(frame[4], CMD_MEASUREMENT);
        assert_eq!(frame[5], SUB_MEASUREMENT);
        assert_eq!(frame[8], ETX);

        let crc = crc16(&frame[1..6]);
        assert_eq!(frame[6], (crc & 0xFF) as u8);
        assert_eq!(frame[7], (crc >> 8) as u8);

        // Deterministic
        assert_eq!(frame, encode_measurement_request(1));
    }

    #[test]
    fn response_roundtrip() {
        let payload = build_variant15("EOE46010287", "1234567890123", &[
            (Measurement::AcPower, 1234),
            (Measurement::SolarVoltage, 3451),
        ]);
        let raw = encode_response(2, CMD_MEASUREMENT, SUB_MEASUREMENT, &payload);
        let frame = decode_response(&raw, 2).unwrap();
        assert_eq!(frame.address, 2);
        assert_eq!(frame.command, CMD_MEASUREMENT);
        assert_eq!(frame.payload, payload);

        let parsed = parse_variant15(&frame.payload).unwrap();
        assert_eq!(parsed.part_number, "EOE46010287");
        assert_eq!(parsed.serial_number, "1234567890123");
        let ac_power = parsed
            .readings
            .iter()
            .find(|(k, _)| *k == Measurement::AcPower)
            .map(|(_, v)| *v)
            .unwrap();
        assert!((ac_power - 1234.0).abs() < 1e-9);
        let solar_v = parsed
            .readings
            .iter()
            .find(|(k, _)| *k == Measurement::SolarVoltage)
            .map(|(_, v)| *v)
            .unwrap();
        assert!((solar_v - 345.1).abs() < 1e-9);
    }

    #[test]
    fn decode_rejects_bad_crc() {
        let payload = build_variant15("P", "S", &[]);
        let mut raw = encode_response(1, CMD_MEASUREMENT, SUB_MEASUREMENT, &payload);
        let idx = raw.len() - 3;
        raw[idx] ^= 0xFF;
        let err = decode_response(&raw, 1).unwrap_err();
        assert!(matches!(err, FrameError::Malformed { .. }));
    }

    #[test]
    fn decode_rejects_bad_sync() {
        let mut raw = encode_response(1, CMD_MEASUREMENT, SUB_MEASUREMENT, &[0u8; 4]);
        raw[0] = 0x55;
        assert!(matches!(
            decode_response(&raw, 1),
            Err(FrameError::Malformed { .. })
        ));
    }

    #[test]
    fn decode_detects_wrong_responder() {
        let raw = encode_response(3, CMD_MEASUREMENT, SUB_MEASUREMENT, &[0u8; 4]);
        let err = decode_response(&raw, 1).unwrap_err();
        assert_eq!(
            err,
            FrameError::AddressMismatch {
                expected: 1,
                actual: 3
            }
        );
    }

    #[test]
    fn decode_rejects_nak() {
        let mut raw = encode_response(1, CMD_MEASUREMENT, SUB_MEASUREMENT, &[0u8; 4]);
        raw[1] = NAK;
        assert!(matches!(
            decode_response(&raw, 1),
            Err(FrameError::Malformed { .. })
        ));
    }

    #[test]
    fn assembler_resyncs_over_garbage() {
        let payload = build_variant15("P", "S", &[(Measurement::AcPower, 42)]);
        let frame = encode_response(1, CMD_MEASUREMENT, SUB_MEASUREMENT, &payload);

        let mut asm = FrameAssembler::new();
        asm.push(&[0xFF, 0x00, 0x02, 0x99]); // noise, including a lone STX
        asm.push(&frame);

        let got = asm.next_frame().unwrap();
        assert_eq!(got, frame);
        assert!(asm.next_frame().is_none());
    }

    #[test]
    fn assembler_waits_for_complete_frame() {
        let payload = build_variant15("P", "S", &[]);
        let frame = encode_response(1, CMD_MEASUREMENT, SUB_MEASUREMENT, &payload);

        let mut asm = FrameAssembler::new();
        asm.push(&frame[..10]);
        assert!(asm.next_frame().is_none());
        asm.push(&frame[10..]);
        assert_eq!(asm.next_frame().unwrap(), frame);
    }

    #[test]
    fn parse_variant15_rejects_short_payload() {
        assert!(matches!(
            parse_variant15(&[0u8; 10]),
            Err(FrameError::Malformed { .. })
        ));
    }
}
