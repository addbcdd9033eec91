//! LLC/SNAP header and SecureData container framing for application data.

use crate::{ensure_len, read_u16_be, FrameError, LLC_HEADER_SIZE, SECURE_DATA_HEADER_SIZE};

const SNAP_EXTENSION_USED: u8 = 0xAA;
const UNNUMBERED_INFORMATION: u8 = 0x03;

// The first four bytes of the SecureData header are left out of
// `securedata_size`; they look like the header of an outer container.
const SECURE_DATA_SIZE_EXCLUDED: u16 = 4;

const MANAGEMENT_FLAG: u8 = 0x01;

/// Protocol tag carried in the LLC/SNAP header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EtherType {
    SecureData,
    Eapol,
    Unknown(u16),
}

impl EtherType {
    pub const SECURE_DATA_VALUE: u16 = 0x876D;
    pub const EAPOL_VALUE: u16 = 0x888E;

    pub const fn value(self) -> u16 {
        match self {
            EtherType::SecureData => Self::SECURE_DATA_VALUE,
            EtherType::Eapol => Self::EAPOL_VALUE,
            EtherType::Unknown(v) => v,
        }
    }

    pub const fn from_value(value: u16) -> Self {
        match value {
            Self::SECURE_DATA_VALUE => EtherType::SecureData,
            Self::EAPOL_VALUE => EtherType::Eapol,
            other => EtherType::Unknown(other),
        }
    }
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        EtherType::from_value(value)
    }
}

impl From<EtherType> for u16 {
    fn from(ether_type: EtherType) -> Self {
        ether_type.value()
    }
}

/// SNAP-enabled 802.2 LLC header. 8 bytes: DSAP, SSAP, control, OUI(3), protocol (BE).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LlcHeader {
    pub dsap: u8,
    pub ssap: u8,
    pub control: u8,
    pub oui: [u8; 3],
    pub protocol: EtherType,
}

impl LlcHeader {
    pub const fn new(protocol: EtherType) -> Self {
        Self {
            dsap: SNAP_EXTENSION_USED,
            ssap: SNAP_EXTENSION_USED,
            control: UNNUMBERED_INFORMATION,
            oui: [0; 3],
            protocol,
        }
    }

    pub fn encode(&self) -> [u8; LLC_HEADER_SIZE] {
        let mut out = [0u8; LLC_HEADER_SIZE];
        out[0] = self.dsap;
        out[1] = self.ssap;
        out[2] = self.control;
        out[3..6].copy_from_slice(&self.oui);
        out[6..8].copy_from_slice(&self.protocol.value().to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        ensure_len(bytes, LLC_HEADER_SIZE)?;
        Ok(Self {
            dsap: bytes[0],
            ssap: bytes[1],
            control: bytes[2],
            oui: [bytes[3], bytes[4], bytes[5]],
            protocol: EtherType::from_value(read_u16_be(bytes, 6)),
        })
    }
}

pub fn build_llc_header(protocol: EtherType) -> [u8; LLC_HEADER_SIZE] {
    LlcHeader::new(protocol).encode()
}

pub fn parse_llc_header(frame: &[u8]) -> Result<LlcHeader, FrameError> {
    LlcHeader::decode(frame)
}

/// Protocol tag of a received frame.
pub fn frame_ether_type(frame: &[u8]) -> Result<EtherType, FrameError> {
    Ok(LlcHeader::decode(frame)?.protocol)
}

/// UDS SecureData header, carried right after the LLC header.
///
/// Wire layout (14 bytes, BE): protocol_size (2), reserved (2), securedata_size (2),
/// flags (1, bit 0 = management), data_channel (1), sequence_number (2),
/// dest_node_id (2), src_node_id (2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SecureDataHeader {
    pub protocol_size: u16,
    pub securedata_size: u16,
    pub is_management: bool,
    pub data_channel: u8,
    pub sequence_number: u16,
    pub dest_node_id: u16,
    pub src_node_id: u16,
}

impl SecureDataHeader {
    /// Header for an application frame carrying `data_size` bytes.
    /// Both size fields are derived from `data_size`; the frame is never a management frame.
    pub fn for_payload(
        data_size: usize,
        data_channel: u8,
        dest_node_id: u16,
        src_node_id: u16,
        sequence_number: u16,
    ) -> Result<Self, FrameError> {
        let protocol_size = data_size
            .checked_add(SECURE_DATA_HEADER_SIZE)
            .and_then(|size| u16::try_from(size).ok())
            .ok_or(FrameError::InvalidArgument(
                "payload does not fit the 16-bit SecureData size field",
            ))?;

        Ok(Self {
            protocol_size,
            securedata_size: protocol_size - SECURE_DATA_SIZE_EXCLUDED,
            is_management: false,
            data_channel,
            sequence_number,
            dest_node_id,
            src_node_id,
        })
    }

    pub fn encode(&self) -> [u8; SECURE_DATA_HEADER_SIZE] {
        let mut out = [0u8; SECURE_DATA_HEADER_SIZE];
        out[0..2].copy_from_slice(&self.protocol_size.to_be_bytes());
        // [2..4] reserved
        out[4..6].copy_from_slice(&self.securedata_size.to_be_bytes());
        out[6] = if self.is_management { MANAGEMENT_FLAG } else { 0 };
        out[7] = self.data_channel;
        out[8..10].copy_from_slice(&self.sequence_number.to_be_bytes());
        out[10..12].copy_from_slice(&self.dest_node_id.to_be_bytes());
        out[12..14].copy_from_slice(&self.src_node_id.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        ensure_len(bytes, SECURE_DATA_HEADER_SIZE)?;
        Ok(Self {
            protocol_size: read_u16_be(bytes, 0),
            securedata_size: read_u16_be(bytes, 4),
            is_management: bytes[6] & MANAGEMENT_FLAG != 0,
            data_channel: bytes[7],
            sequence_number: read_u16_be(bytes, 8),
            dest_node_id: read_u16_be(bytes, 10),
            src_node_id: read_u16_be(bytes, 12),
        })
    }

    /// Number of application bytes following the header.
    pub fn actual_data_size(&self) -> usize {
        usize::from(self.protocol_size).saturating_sub(SECURE_DATA_HEADER_SIZE)
    }
}

pub fn build_secure_data_header(
    payload_size: usize,
    channel: u8,
    dest_node_id: u16,
    src_node_id: u16,
    sequence_number: u16,
) -> Result<[u8; SECURE_DATA_HEADER_SIZE], FrameError> {
    let header = SecureDataHeader::for_payload(
        payload_size,
        channel,
        dest_node_id,
        src_node_id,
        sequence_number,
    )?;
    Ok(header.encode())
}

/// Read the SecureData header that follows the LLC header. The LLC tag is not checked.
pub fn parse_secure_data_header(frame: &[u8]) -> Result<SecureDataHeader, FrameError> {
    ensure_len(frame, LLC_HEADER_SIZE + SECURE_DATA_HEADER_SIZE)?;
    SecureDataHeader::decode(&frame[LLC_HEADER_SIZE..])
}

/// LLC (SecureData) || SecureData header || data
pub fn build_data_payload(
    data: &[u8],
    channel: u8,
    dest_node_id: u16,
    src_node_id: u16,
    sequence_number: u16,
) -> Result<Vec<u8>, FrameError> {
    let header = SecureDataHeader::for_payload(
        data.len(),
        channel,
        dest_node_id,
        src_node_id,
        sequence_number,
    )?;

    let mut out = Vec::with_capacity(LLC_HEADER_SIZE + SECURE_DATA_HEADER_SIZE + data.len());
    out.extend_from_slice(&build_llc_header(EtherType::SecureData));
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(data);

    tracing::trace!(
        channel,
        dest_node_id,
        src_node_id,
        sequence_number,
        len = out.len(),
        "built SecureData payload"
    );
    Ok(out)
}

/// Split a SecureData frame into its header and application data.
/// Bytes past `protocol_size` are ignored.
pub fn parse_data_payload(frame: &[u8]) -> Result<(SecureDataHeader, &[u8]), FrameError> {
    if frame_ether_type(frame)? != EtherType::SecureData {
        return Err(FrameError::MalformedFrame("not a SecureData frame"));
    }

    let header = parse_secure_data_header(frame)?;
    let data_start = LLC_HEADER_SIZE + SECURE_DATA_HEADER_SIZE;
    let data_end = data_start + header.actual_data_size();
    ensure_len(frame, data_end)?;

    Ok((header, &frame[data_start..data_end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llc_header_layout() {
        assert_eq!(
            build_llc_header(EtherType::Eapol),
            [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E]
        );
        assert_eq!(
            build_llc_header(EtherType::SecureData),
            [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x87, 0x6D]
        );
    }

    #[test]
    fn ether_type_keeps_unknown_tags() {
        let mut frame = build_llc_header(EtherType::SecureData).to_vec();
        frame[6..8].copy_from_slice(&0x0800u16.to_be_bytes());
        assert_eq!(frame_ether_type(&frame), Ok(EtherType::Unknown(0x0800)));
        assert_eq!(u16::from(EtherType::Unknown(0x0800)), 0x0800);
    }

    #[test]
    fn ether_type_rejects_short_frame() {
        assert_eq!(
            frame_ether_type(&[0xAA, 0xAA, 0x03]),
            Err(FrameError::TruncatedFrame { needed: 8, actual: 3 })
        );
    }

    #[test]
    fn secure_data_header_sizes() {
        let bytes = build_secure_data_header(10, 1, 2, 3, 5).expect("header");
        let header = SecureDataHeader::decode(&bytes).expect("decode");
        assert_eq!(header.protocol_size, 10 + SECURE_DATA_HEADER_SIZE as u16);
        assert_eq!(header.securedata_size, 10 + SECURE_DATA_HEADER_SIZE as u16 - 4);
        assert_eq!(header.actual_data_size(), 10);
        assert!(!header.is_management);
        assert_eq!(header.data_channel, 1);
        assert_eq!(header.dest_node_id, 2);
        assert_eq!(header.src_node_id, 3);
        assert_eq!(header.sequence_number, 5);
    }

    #[test]
    fn secure_data_header_byte_order() {
        let bytes = build_secure_data_header(0x0102, 0x07, 0x0A0B, 0x0C0D, 0x0809).expect("header");
        assert_eq!(
            bytes,
            [0x01, 0x10, 0x00, 0x00, 0x01, 0x0C, 0x00, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D]
        );
    }

    #[test]
    fn secure_data_header_rejects_oversized_payload() {
        let max = usize::from(u16::MAX) - SECURE_DATA_HEADER_SIZE;
        assert!(build_secure_data_header(max, 0, 0, 0, 0).is_ok());
        assert_eq!(
            build_secure_data_header(max + 1, 0, 0, 0, 0),
            Err(FrameError::InvalidArgument(
                "payload does not fit the 16-bit SecureData size field"
            ))
        );
        assert!(build_secure_data_header(usize::MAX, 0, 0, 0, 0).is_err());
    }

    #[test]
    fn management_bit_is_read_from_flags() {
        let mut frame = build_data_payload(b"x", 0, 0, 0, 0).expect("payload");
        frame[LLC_HEADER_SIZE + 6] = 0x01;
        assert!(parse_secure_data_header(&frame).expect("parse").is_management);
    }

    #[test]
    fn data_payload_roundtrip() {
        let data = b"hello uds";
        let frame = build_data_payload(data, 3, 0xFFFF, 1, 42).expect("payload");
        assert_eq!(frame.len(), LLC_HEADER_SIZE + SECURE_DATA_HEADER_SIZE + data.len());

        let (header, body) = parse_data_payload(&frame).expect("parse");
        assert_eq!(body, data);
        assert_eq!(header.data_channel, 3);
        assert_eq!(header.dest_node_id, 0xFFFF);
        assert_eq!(header.src_node_id, 1);
        assert_eq!(header.sequence_number, 42);
    }

    #[test]
    fn parse_rejects_truncated_frames() {
        let frame = build_data_payload(b"abcdef", 1, 2, 3, 4).expect("payload");

        let short = &frame[..LLC_HEADER_SIZE + SECURE_DATA_HEADER_SIZE - 1];
        assert!(matches!(
            parse_secure_data_header(short),
            Err(FrameError::TruncatedFrame { .. })
        ));

        let missing_data = &frame[..frame.len() - 1];
        assert!(matches!(
            parse_data_payload(missing_data),
            Err(FrameError::TruncatedFrame { .. })
        ));
    }

    #[test]
    fn parse_data_payload_rejects_eapol_frames() {
        let mut frame = build_data_payload(b"abc", 1, 2, 3, 4).expect("payload");
        frame[..LLC_HEADER_SIZE].copy_from_slice(&build_llc_header(EtherType::Eapol));
        assert_eq!(
            parse_data_payload(&frame),
            Err(FrameError::MalformedFrame("not a SecureData frame"))
        );
    }
}
