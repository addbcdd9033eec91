use aes::Aes128;
use ccm::aead::consts::{U13, U8};
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{AeadInPlace, KeyInit};
use ccm::Ccm;
use thiserror::Error;

use crate::ccmp::{build_aad, build_nonce};
use crate::{CcmpKey, MacAddress, MAC_LEN, NONCE_BYTES};

type Aes128Ccm = Ccm<Aes128, U8, U13>;

/// Failures of the CCM pipeline. They never cross [`FrameCipher::encrypt`] /
/// [`FrameCipher::decrypt`]; those log them and yield no output.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    #[error("CCM authentication failed")]
    AuthenticationFailure,
    #[error("CCM engine failure: {0}")]
    CryptoEngineFailure(&'static str),
}

/// CCM engine seam: `seal` returns ciphertext || tag, `open` verifies and decrypts it.
pub trait CcmEngine {
    fn seal(
        &self,
        key: &CcmpKey,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
        tag_len: usize,
    ) -> Result<Vec<u8>, CryptoError>;

    fn open(
        &self,
        key: &CcmpKey,
        nonce: &[u8],
        aad: &[u8],
        sealed: &[u8],
        tag_len: usize,
    ) -> Result<Vec<u8>, CryptoError>;
}

/// AES-128-CCM with a 13-byte nonce and 8-byte tag.
#[derive(Clone, Copy, Debug, Default)]
pub struct AesCcm;

impl AesCcm {
    fn check_params(nonce: &[u8], tag_len: usize) -> Result<(), CryptoError> {
        if nonce.len() != NONCE_BYTES {
            return Err(CryptoError::CryptoEngineFailure("nonce must be 13 bytes"));
        }
        if tag_len != MAC_LEN {
            return Err(CryptoError::CryptoEngineFailure("tag must be 8 bytes"));
        }
        Ok(())
    }
}

impl CcmEngine for AesCcm {
    fn seal(
        &self,
        key: &CcmpKey,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
        tag_len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        Self::check_params(nonce, tag_len)?;

        let cipher = Aes128Ccm::new(GenericArray::from_slice(key));
        let mut buf = Vec::with_capacity(plaintext.len() + tag_len);
        buf.extend_from_slice(plaintext);
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, &mut buf)
            .map_err(|_| CryptoError::CryptoEngineFailure("CCM encryption rejected input"))?;
        buf.extend_from_slice(&tag);
        Ok(buf)
    }

    fn open(
        &self,
        key: &CcmpKey,
        nonce: &[u8],
        aad: &[u8],
        sealed: &[u8],
        tag_len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        Self::check_params(nonce, tag_len)?;
        if sealed.len() < tag_len {
            return Err(CryptoError::AuthenticationFailure);
        }

        let (ciphertext, tag) = sealed.split_at(sealed.len() - tag_len);
        let cipher = Aes128Ccm::new(GenericArray::from_slice(key));
        let mut buf = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(nonce),
                aad,
                &mut buf,
                GenericArray::from_slice(tag),
            )
            .map_err(|_| CryptoError::AuthenticationFailure)?;
        Ok(buf)
    }
}

/// Encrypts and decrypts 802.11 data-frame payloads with a caller-supplied CCMP key.
///
/// Stateless: AAD and nonce are rebuilt from the addressing fields on every call,
/// and the key is only borrowed for the duration of the call.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCipher<E = AesCcm> {
    engine: E,
}

impl<E: CcmEngine> FrameCipher<E> {
    pub const fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Ciphertext || 8-byte tag, or the engine's failure.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one of to-DS / from-DS is set in `frame_control`.
    #[allow(clippy::too_many_arguments)]
    pub fn seal(
        &self,
        payload: &[u8],
        key: &CcmpKey,
        sender: &MacAddress,
        receiver: &MacAddress,
        bssid: &MacAddress,
        sequence_number: u16,
        frame_control: u16,
    ) -> Result<Vec<u8>, CryptoError> {
        let aad = build_aad(sender, receiver, bssid, frame_control);
        let nonce = build_nonce(sender, sequence_number);
        self.engine.seal(key, &nonce, &aad, payload, MAC_LEN)
    }

    /// Plaintext of `encrypted_payload` (ciphertext || tag), or why it was rejected.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one of to-DS / from-DS is set in `frame_control`.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &self,
        encrypted_payload: &[u8],
        key: &CcmpKey,
        sender: &MacAddress,
        receiver: &MacAddress,
        bssid: &MacAddress,
        sequence_number: u16,
        frame_control: u16,
    ) -> Result<Vec<u8>, CryptoError> {
        if encrypted_payload.len() < MAC_LEN {
            return Err(CryptoError::AuthenticationFailure);
        }
        let aad = build_aad(sender, receiver, bssid, frame_control);
        let nonce = build_nonce(sender, sequence_number);
        self.engine.open(key, &nonce, &aad, encrypted_payload, MAC_LEN)
    }

    /// Like [`seal`](Self::seal), but failures are logged and reported as `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn encrypt(
        &self,
        payload: &[u8],
        key: &CcmpKey,
        sender: &MacAddress,
        receiver: &MacAddress,
        bssid: &MacAddress,
        sequence_number: u16,
        frame_control: u16,
    ) -> Option<Vec<u8>> {
        match self.seal(payload, key, sender, receiver, bssid, sequence_number, frame_control) {
            Ok(sealed) => Some(sealed),
            Err(err) => {
                tracing::error!(%sender, sequence_number, error = %err, "failed to encrypt data frame");
                None
            }
        }
    }

    /// Like [`open`](Self::open), but failures are logged and reported as `None`.
    /// Corrupt or foreign payloads are normal on the air and are not fatal.
    #[allow(clippy::too_many_arguments)]
    pub fn decrypt(
        &self,
        encrypted_payload: &[u8],
        key: &CcmpKey,
        sender: &MacAddress,
        receiver: &MacAddress,
        bssid: &MacAddress,
        sequence_number: u16,
        frame_control: u16,
    ) -> Option<Vec<u8>> {
        match self.open(
            encrypted_payload,
            key,
            sender,
            receiver,
            bssid,
            sequence_number,
            frame_control,
        ) {
            Ok(plaintext) => Some(plaintext),
            Err(err) => {
                tracing::error!(
                    %sender,
                    sequence_number,
                    len = encrypted_payload.len(),
                    error = %err,
                    "failed to decrypt data frame"
                );
                None
            }
        }
    }
}

/// Encrypt a data-frame payload with AES-128-CCM. `None` if the engine fails.
pub fn encrypt_data_frame(
    payload: &[u8],
    key: &CcmpKey,
    sender: &MacAddress,
    receiver: &MacAddress,
    bssid: &MacAddress,
    sequence_number: u16,
    frame_control: u16,
) -> Option<Vec<u8>> {
    FrameCipher::new(AesCcm).encrypt(
        payload,
        key,
        sender,
        receiver,
        bssid,
        sequence_number,
        frame_control,
    )
}

/// Verify and decrypt a data-frame payload. `None` on authentication failure.
pub fn decrypt_data_frame(
    encrypted_payload: &[u8],
    key: &CcmpKey,
    sender: &MacAddress,
    receiver: &MacAddress,
    bssid: &MacAddress,
    sequence_number: u16,
    frame_control: u16,
) -> Option<Vec<u8>> {
    FrameCipher::new(AesCcm).decrypt(
        encrypted_payload,
        key,
        sender,
        receiver,
        bssid,
        sequence_number,
        frame_control,
    )
}
