//! CCMP key derivation for UDS data frames.
//!
//! The CCMP key is MD5(passphrase) encrypted with AES-128-CTR under the normal
//! key of slot 0x2D, using MD5 of the network parameters as the initial counter
//! block. MD5 is only a fixed 16-byte mixing step here.

use aes::Aes128;
use ctr::cipher::generic_array::GenericArray;
use ctr::cipher::{KeyIvInit, StreamCipher};
use md5::{Digest, Md5};

use crate::backend::{KeySlotId, KeyStorage};
use crate::{AesKey, CcmpKey, MacAddress, DIGEST_BYTES, MAC_ADDRESS_BYTES};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

const CTR_INPUT_LEN: usize = 16; // host MAC (6) + wlan_comm_id (4) + id (2) + network_id (4)

/// Network parameters that feed data-key derivation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkInfo {
    pub host_mac_address: MacAddress,
    /// Wireless community id of the application.
    pub wlan_comm_id: u32,
    /// Network instantiation id.
    pub id: u8,
    pub network_id: u32,
}

impl NetworkInfo {
    /// Digest input: host MAC || wlan_comm_id || id (as u16) || network_id, BE.
    ///
    /// Widening `id` to u16 puts a zero at byte 10. This layout is assumed, not
    /// checked against a captured key; keys only interoperate if peers agree on it.
    pub fn crypto_ctr_input(&self) -> [u8; CTR_INPUT_LEN] {
        let mut out = [0u8; CTR_INPUT_LEN];
        out[0..MAC_ADDRESS_BYTES].copy_from_slice(self.host_mac_address.as_bytes());
        out[6..10].copy_from_slice(&self.wlan_comm_id.to_be_bytes());
        out[10..12].copy_from_slice(&u16::from(self.id).to_be_bytes());
        out[12..16].copy_from_slice(&self.network_id.to_be_bytes());
        out
    }
}

/// Fixed 16-byte digest (MD5).
pub fn digest16(bytes: &[u8]) -> [u8; DIGEST_BYTES] {
    let digest = Md5::digest(bytes);
    let mut out = [0u8; DIGEST_BYTES];
    out.copy_from_slice(&digest);
    out
}

/// Initial AES-CTR counter block for data-key derivation.
pub fn derive_crypto_counter(network_info: &NetworkInfo) -> [u8; DIGEST_BYTES] {
    digest16(&network_info.crypto_ctr_input())
}

/// Derive the CCMP key protecting data frames of one network.
pub fn derive_data_key(
    passphrase: &[u8],
    network_info: &NetworkInfo,
    key_storage: &dyn KeyStorage,
) -> CcmpKey {
    let passphrase_hash = digest16(passphrase);
    let counter = derive_crypto_counter(network_info);
    let normal_key = key_storage.normal_key(KeySlotId::UDS_DATA_KEY);

    tracing::trace!(
        host = %network_info.host_mac_address,
        network_id = network_info.network_id,
        "deriving UDS data key"
    );
    aes_ctr_apply(&normal_key, &counter, passphrase_hash)
}

fn aes_ctr_apply(key: &AesKey, counter: &[u8; DIGEST_BYTES], mut block: [u8; 16]) -> [u8; 16] {
    let mut cipher = Aes128Ctr::new(GenericArray::from_slice(key), GenericArray::from_slice(counter));
    cipher.apply_keystream(&mut block);
    block
}
