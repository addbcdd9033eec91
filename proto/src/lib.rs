//! Frame codec and CCMP data-frame crypto for the UDS local wireless link.
//! Keeps LLC/SecureData/EAPoL layouts, key derivation, and the AES-CCM pipeline
//! byte-exact with real peers.
//!
//! Every operation is a pure transform: nothing here keeps session state,
//! caches key material, or touches the radio.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

mod aead;
pub mod backend;
mod ccmp;
mod eapol;
mod frame;
mod keys;

pub use aead::{decrypt_data_frame, encrypt_data_frame, AesCcm, CcmEngine, CryptoError, FrameCipher};
pub use backend::{InMemoryKeyStorage, KeySlotId, KeyStorage};
pub use ccmp::{build_aad, build_nonce, AddressingMode, AAD_FRAME_CONTROL_MASK, FC_FROM_DS, FC_TO_DS};
pub use eapol::{
    build_eapol_logoff_frame, build_eapol_start_frame, deserialize_node_info,
    deserialize_node_info_from_frame, eapol_frame_type, parse_eapol_logoff_frame,
    parse_eapol_start_frame, serialize_node_info, EapolLogoffPacket, EapolStartPacket, NodeInfo,
    EAPOL_LOGOFF_TYPE, EAPOL_START_TYPE,
};
pub use frame::{
    build_data_payload, build_llc_header, build_secure_data_header, frame_ether_type,
    parse_data_payload, parse_llc_header, parse_secure_data_header, EtherType, LlcHeader,
    SecureDataHeader,
};
pub use keys::{derive_crypto_counter, derive_data_key, digest16, NetworkInfo};

pub const MAC_ADDRESS_BYTES: usize = 6;
pub const KEY_BYTES: usize = 16; // AES-128
pub const DIGEST_BYTES: usize = 16; // MD5 output
pub const MAC_LEN: usize = 8; // CCM authentication tag
pub const NONCE_BYTES: usize = 13; // priority (1) + sender (6) + packet number (6)
pub const AAD_LEN: usize = 22; // FC (2) + A1/A2/A3 (18) + SC (2)

pub const LLC_HEADER_SIZE: usize = 8;
pub const SECURE_DATA_HEADER_SIZE: usize = 14;
pub const USERNAME_UNITS: usize = 10; // UTF-16 code units
pub const EAPOL_NODE_INFO_SIZE: usize = 0x28;
pub const EAPOL_START_PACKET_SIZE: usize = 0x30;
pub const EAPOL_LOGOFF_PACKET_SIZE: usize = 0x298;
pub const UDS_MAX_NODES: usize = 16;

/// Symmetric key handed to the CCM engine for data frames.
pub type CcmpKey = [u8; KEY_BYTES];
/// Normal key produced by key storage for a hardware key slot.
pub type AesKey = [u8; KEY_BYTES];

/// Link-layer endpoint address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacAddress(pub [u8; MAC_ADDRESS_BYTES]);

impl MacAddress {
    pub const ZERO: MacAddress = MacAddress([0; MAC_ADDRESS_BYTES]);
    pub const BROADCAST: MacAddress = MacAddress([0xFF; MAC_ADDRESS_BYTES]);

    pub const fn new(octets: [u8; MAC_ADDRESS_BYTES]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; MAC_ADDRESS_BYTES] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; MAC_ADDRESS_BYTES] {
        &self.0
    }
}

impl From<[u8; MAC_ADDRESS_BYTES]> for MacAddress {
    fn from(octets: [u8; MAC_ADDRESS_BYTES]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid MAC address `{0}`: expected six colon-separated hex octets")]
pub struct MacAddressParseError(String);

impl FromStr for MacAddress {
    type Err = MacAddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; MAC_ADDRESS_BYTES];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| MacAddressParseError(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| MacAddressParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(MacAddressParseError(s.to_string()));
        }
        Ok(Self(octets))
    }
}

/// Codec failures. Everything except the addressing violation is recoverable:
/// the caller drops the frame or rejects its own arguments.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated: needed {needed} bytes, got {actual}")]
    TruncatedFrame { needed: usize, actual: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    #[error("frame control {frame_control:#06x} must set exactly one of to-DS/from-DS")]
    AddressingModeViolation { frame_control: u16 },
}

pub(crate) fn ensure_len(bytes: &[u8], needed: usize) -> Result<(), FrameError> {
    if bytes.len() < needed {
        return Err(FrameError::TruncatedFrame {
            needed,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Big-endian u16 at `offset`. Callers check the length first.
pub(crate) fn read_u16_be(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}
