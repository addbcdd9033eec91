//! CCMP additional authenticated data and nonce construction (IEEE 802.11-2007 8.3.3.3).

use crate::{FrameError, MacAddress, AAD_LEN, MAC_ADDRESS_BYTES, NONCE_BYTES};

pub const FC_TO_DS: u16 = 1 << 0;
pub const FC_FROM_DS: u16 = 1 << 1;

/// Frame control bits covered by the MIC. Retry, power management, more data
/// and the subtype bits that change in flight are cleared.
pub const AAD_FRAME_CONTROL_MASK: u16 = 0x8FC7;

/// Which DS bit a data frame carries. Frames with both or neither bit set are
/// not produced by the console and have no defined address mapping here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressingMode {
    ToDs,
    FromDs,
}

impl AddressingMode {
    pub fn from_frame_control(frame_control: u16) -> Result<Self, FrameError> {
        let to_ds = frame_control & FC_TO_DS != 0;
        let from_ds = frame_control & FC_FROM_DS != 0;
        match (to_ds, from_ds) {
            (true, false) => Ok(AddressingMode::ToDs),
            (false, true) => Ok(AddressingMode::FromDs),
            _ => Err(FrameError::AddressingModeViolation { frame_control }),
        }
    }

    /// Frame control bits selecting this mode.
    pub const fn frame_control_bits(self) -> u16 {
        match self {
            AddressingMode::ToDs => FC_TO_DS,
            AddressingMode::FromDs => FC_FROM_DS,
        }
    }
}

/// Build the 22-byte AAD: masked FC (BE) || A1 || A2 || A3 || SC (always 0).
///
/// # Panics
///
/// Panics unless exactly one of to-DS / from-DS is set in `frame_control`.
pub fn build_aad(
    sender: &MacAddress,
    receiver: &MacAddress,
    bssid: &MacAddress,
    frame_control: u16,
) -> [u8; AAD_LEN] {
    let mode = AddressingMode::from_frame_control(frame_control)
        .unwrap_or_else(|err| panic!("cannot build CCMP AAD: {err}"));

    let (a1, a2, a3) = match mode {
        AddressingMode::FromDs => (receiver, bssid, sender),
        AddressingMode::ToDs => (bssid, sender, receiver),
    };

    let mut out = [0u8; AAD_LEN];
    out[0..2].copy_from_slice(&(frame_control & AAD_FRAME_CONTROL_MASK).to_be_bytes());
    out[2..8].copy_from_slice(a1.as_bytes());
    out[8..14].copy_from_slice(a2.as_bytes());
    out[14..20].copy_from_slice(a3.as_bytes());
    // [20..22] sequence control, masked to zero
    out
}

/// Build the 13-byte CCM nonce: priority (0) || sender || PN.
/// The PN's upper four bytes are zero; the low two carry the sequence number (BE).
pub fn build_nonce(sender: &MacAddress, sequence_number: u16) -> [u8; NONCE_BYTES] {
    let mut out = [0u8; NONCE_BYTES];
    out[1..1 + MAC_ADDRESS_BYTES].copy_from_slice(sender.as_bytes());
    out[NONCE_BYTES - 2..].copy_from_slice(&sequence_number.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENDER: MacAddress = MacAddress([0x11; 6]);
    const RECEIVER: MacAddress = MacAddress([0x22; 6]);
    const BSSID: MacAddress = MacAddress([0x33; 6]);

    #[test]
    fn to_ds_address_order() {
        let aad = build_aad(&SENDER, &RECEIVER, &BSSID, 0x0801);
        assert_eq!(&aad[2..8], BSSID.as_bytes());
        assert_eq!(&aad[8..14], SENDER.as_bytes());
        assert_eq!(&aad[14..20], RECEIVER.as_bytes());
    }

    #[test]
    fn from_ds_address_order() {
        let aad = build_aad(&SENDER, &RECEIVER, &BSSID, 0x0802);
        assert_eq!(&aad[2..8], RECEIVER.as_bytes());
        assert_eq!(&aad[8..14], BSSID.as_bytes());
        assert_eq!(&aad[14..20], SENDER.as_bytes());
    }

    #[test]
    fn frame_control_is_masked_and_sequence_control_zeroed() {
        let aad = build_aad(&SENDER, &RECEIVER, &BSSID, 0xFFFD);
        assert_eq!(u16::from_be_bytes([aad[0], aad[1]]), 0xFFFD & AAD_FRAME_CONTROL_MASK);
        assert_eq!(&aad[0..2], &[0x8F, 0xC5]);
        assert_eq!(&aad[20..22], &[0, 0]);
    }

    #[test]
    #[should_panic(expected = "to-DS/from-DS")]
    fn both_ds_bits_panic() {
        build_aad(&SENDER, &RECEIVER, &BSSID, FC_TO_DS | FC_FROM_DS);
    }

    #[test]
    #[should_panic(expected = "to-DS/from-DS")]
    fn no_ds_bit_panics() {
        build_aad(&SENDER, &RECEIVER, &BSSID, 0x0800);
    }

    #[test]
    fn addressing_mode_reports_violation() {
        assert_eq!(AddressingMode::from_frame_control(0x0001), Ok(AddressingMode::ToDs));
        assert_eq!(AddressingMode::from_frame_control(0x0002), Ok(AddressingMode::FromDs));
        assert_eq!(
            AddressingMode::from_frame_control(0x0003),
            Err(FrameError::AddressingModeViolation { frame_control: 0x0003 })
        );
        assert_eq!(AddressingMode::FromDs.frame_control_bits(), FC_FROM_DS);
    }

    #[test]
    fn nonce_layout() {
        let sender = MacAddress::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(
            build_nonce(&sender, 0xABCD),
            [0, 1, 2, 3, 4, 5, 6, 0, 0, 0, 0, 0xAB, 0xCD]
        );
    }
}
