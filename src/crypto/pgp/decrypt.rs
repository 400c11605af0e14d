//! Reverse message pipeline: armor, encryption, compression, signature, literal data.
//!
//! Plaintext is staged in a spooled temporary file and only handed to the
//! caller once every layer has been peeled and the signature (if any) has
//! been checked. A failure therefore never leaves partial plaintext behind.

use crate::config::PipelineConfig;
use crate::crypto::pgp::armor::sniff_armor;
use crate::crypto::pgp::encrypt::Layer;
use crate::crypto::pgp::keypair::SecurePassphrase;
use crate::crypto::pgp::keyring::{PublicKeyRing, SecretKeyRing};
use crate::crypto::pgp::unlock::SecretKeyUnlocker;
use crate::error::{PgpError, PgpResult};
use pgp::composed::{Esk, Message};
use pgp::types::KeyId;
use std::fmt::Debug;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};

/// Outcome of checking the signature layer of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationResult {
    /// Signature present and made by the verifier key over the exact plaintext.
    Valid,
    /// Signature present but it does not check out against the verifier key.
    Invalid,
    /// The message carried no signature layer.
    Absent,
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid)
    }
}

/// What [`DecryptionPipeline::decrypt`] found while peeling a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptOutcome {
    pub verification: VerificationResult,
    /// Layers in the order they were removed, outermost first.
    pub layers: Vec<Layer>,
    pub bytes_written: u64,
}

/// Reads OpenPGP messages back into plaintext.
#[derive(Debug, Clone, Default)]
pub struct DecryptionPipeline {
    config: PipelineConfig,
}

impl DecryptionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Decrypt `message` with a key from `secret_ring` and write the plaintext to `out`.
    ///
    /// When the message is signed, `verifier` must be given and the result
    /// reports whether any verification key in it confirms the signature. Nothing is written to `out`
    /// unless every layer was read successfully.
    pub fn decrypt<R, W>(
        &self,
        message: R,
        mut out: W,
        secret_ring: &SecretKeyRing,
        passphrase: &SecurePassphrase,
        verifier: Option<&PublicKeyRing>,
    ) -> PgpResult<DecryptOutcome>
    where
        R: Read + Debug + Send,
        W: Write,
    {
        let mut layers = Vec::new();
        let msg = open_message(message, &mut layers)?;

        let recipients = recipient_key_ids(&msg)?;
        let key = secret_ring.key_for_recipients(&recipients).ok_or_else(|| {
            log::warn!(
                "No decryption key in ring matches recipients {:?}",
                recipients
            );
            PgpError::DecryptionKeyMismatch
        })?;

        let unlocked = SecretKeyUnlocker::unlock(key, passphrase)?;
        log::debug!("Decrypting with key {}", key.fingerprint());
        let msg = msg
            .decrypt(&unlocked.password(), key.parent())
            .map_err(|e| PgpError::CorruptMessage(format!("decryption failed: {}", e)))?;
        layers.push(Layer::Encryption);

        let msg = unwrap_compression(msg, &mut layers)?;

        let mut spool = tempfile::spooled_tempfile(self.config.spool_threshold);
        let verification = read_payload(msg, verifier, &mut spool, &mut layers)?;

        spool.seek(SeekFrom::Start(0))?;
        let bytes_written = io::copy(&mut spool, &mut out)?;
        out.flush()?;

        log::info!(
            "Decrypted {} bytes, layers {:?}, signature {:?}",
            bytes_written,
            layers,
            verification
        );

        Ok(DecryptOutcome {
            verification,
            layers,
            bytes_written,
        })
    }
}

/// Parse the outer message, stripping armor when the data carries it.
pub(crate) fn open_message<'a, R>(reader: R, layers: &mut Vec<Layer>) -> PgpResult<Message<'a>>
where
    R: Read + Debug + Send + 'a,
{
    let mut reader = BufReader::new(reader);
    let armored = match sniff_armor(&mut reader) {
        Ok(armored) => armored,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(PgpError::MalformedContainer("empty message".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let parsed = if armored {
        layers.push(Layer::Armor);
        Message::from_armor(reader).map(|(msg, _headers)| msg)
    } else {
        Message::from_bytes(reader)
    };

    parsed.map_err(|e| PgpError::MalformedContainer(format!("not an OpenPGP message: {}", e)))
}

/// Key ids named by the public-key session key packets of an encrypted message.
pub(crate) fn recipient_key_ids(msg: &Message<'_>) -> PgpResult<Vec<KeyId>> {
    match msg {
        Message::Encrypted { esk, .. } => Ok(esk
            .iter()
            .filter_map(|esk| match esk {
                Esk::PublicKeyEncryptedSessionKey(pkesk) => pkesk.id().ok().cloned(),
                _ => None,
            })
            .collect()),
        _ => Err(PgpError::CorruptMessage(
            "message has no encryption layer".to_string(),
        )),
    }
}

pub(crate) fn unwrap_compression<'a>(
    mut msg: Message<'a>,
    layers: &mut Vec<Layer>,
) -> PgpResult<Message<'a>> {
    while msg.is_compressed() {
        msg = msg
            .decompress()
            .map_err(|e| PgpError::CorruptMessage(format!("decompression failed: {}", e)))?;
        layers.push(Layer::Compression);
    }
    Ok(msg)
}

/// Drain the literal payload into `sink` and check the signature wrapped around it.
///
/// Every verification key in `verifier` is tried; only the issuer's key can
/// confirm the signature, so the verdict does not depend on key order.
pub(crate) fn read_payload<W: Write>(
    mut msg: Message<'_>,
    verifier: Option<&PublicKeyRing>,
    sink: &mut W,
    layers: &mut Vec<Layer>,
) -> PgpResult<VerificationResult> {
    let signed = matches!(msg, Message::Signed { .. } | Message::SignedOnePass { .. });
    if !signed && !matches!(msg, Message::Literal { .. }) {
        return Err(PgpError::CorruptMessage(
            "unexpected packet where literal data was expected".to_string(),
        ));
    }

    let verifier = match (signed, verifier) {
        (true, None) => return Err(PgpError::VerifierKeyRequired),
        (true, Some(verifier)) => Some(verifier),
        (false, _) => None,
    };

    io::copy(&mut msg, sink)
        .map_err(|e| PgpError::CorruptMessage(format!("failed to read literal data: {}", e)))?;

    let Some(verifier) = verifier else {
        layers.push(Layer::Literal);
        return Ok(VerificationResult::Absent);
    };
    layers.push(Layer::Signature);
    layers.push(Layer::Literal);

    for key in verifier.verification_keys() {
        match msg.verify(key.as_verifier()) {
            Ok(_) => {
                log::debug!("Signature verified against {}", key.fingerprint());
                return Ok(VerificationResult::Valid);
            }
            Err(e) => {
                log::debug!("Signature check against {} failed: {}", key.fingerprint(), e)
            }
        }
    }

    log::warn!("No verification key confirms the message signature");
    Ok(VerificationResult::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::pgp::keypair::KeyPairGenerator;
    use crate::crypto::pgp::keyring::KeyRingLoader;
    use crate::crypto::pgp::unlock::SecretKeyUnlocker;
    use pgp::composed::MessageBuilder;
    use pgp::crypto::hash::HashAlgorithm;
    use pgp::types::CompressionAlgorithm;
    use rand::thread_rng;

    fn signed_only(passphrase: &SecurePassphrase) -> (Vec<u8>, String) {
        let pair = KeyPairGenerator::default()
            .generate("signer@example.com", passphrase)
            .unwrap();
        let ring = KeyRingLoader::read_secret(pair.secret_armored.as_bytes()).unwrap();
        let unlocked = SecretKeyUnlocker::unlock(ring.signing_key().unwrap(), passphrase).unwrap();

        let mut builder = MessageBuilder::from_bytes("", &b"hello world"[..]);
        builder.sign(unlocked.signer(), unlocked.password(), HashAlgorithm::Sha256);
        let bytes = builder.to_vec(thread_rng()).unwrap();
        (bytes, pair.public_armored)
    }

    #[test]
    fn test_empty_message_is_malformed() {
        let mut layers = Vec::new();
        let err = open_message(&b""[..], &mut layers).unwrap_err();
        assert!(matches!(err, PgpError::MalformedContainer(_)));
    }

    #[test]
    fn test_garbage_message_is_malformed() {
        let mut layers = Vec::new();
        let err = open_message(&b"definitely not pgp"[..], &mut layers).unwrap_err();
        assert!(matches!(err, PgpError::MalformedContainer(_)));
    }

    #[test]
    fn test_unencrypted_message_is_corrupt() {
        let passphrase = SecurePassphrase::new("Test123".to_string());
        let (bytes, _) = signed_only(&passphrase);
        let mut layers = Vec::new();
        let msg = open_message(&bytes[..], &mut layers).unwrap();
        let err = recipient_key_ids(&msg).unwrap_err();
        assert!(matches!(err, PgpError::CorruptMessage(_)));
    }

    #[test]
    fn test_signed_layer_verifies() {
        let passphrase = SecurePassphrase::new("Test123".to_string());
        let (bytes, public) = signed_only(&passphrase);
        let public_ring = KeyRingLoader::load_verification_key(public.as_bytes()).unwrap();

        let mut layers = Vec::new();
        let msg = open_message(&bytes[..], &mut layers).unwrap();
        let mut sink = Vec::new();
        let result = read_payload(msg, Some(&public_ring), &mut sink, &mut layers).unwrap();

        assert_eq!(result, VerificationResult::Valid);
        assert_eq!(sink, b"hello world");
        assert_eq!(layers, vec![Layer::Signature, Layer::Literal]);
    }

    #[test]
    fn test_tampered_literal_fails_verification() {
        let passphrase = SecurePassphrase::new("Test123".to_string());
        let (mut bytes, public) = signed_only(&passphrase);
        let public_ring = KeyRingLoader::load_verification_key(public.as_bytes()).unwrap();

        let at = bytes
            .windows(b"hello world".len())
            .position(|w| w == b"hello world")
            .unwrap();
        bytes[at] ^= 0x01;

        let mut layers = Vec::new();
        let msg = open_message(&bytes[..], &mut layers).unwrap();
        let mut sink = Vec::new();
        let result = read_payload(msg, Some(&public_ring), &mut sink, &mut layers).unwrap();

        assert_eq!(result, VerificationResult::Invalid);
    }

    #[test]
    fn test_signed_layer_needs_verifier() {
        let passphrase = SecurePassphrase::new("Test123".to_string());
        let (bytes, _) = signed_only(&passphrase);
        let mut layers = Vec::new();
        let msg = open_message(&bytes[..], &mut layers).unwrap();
        let mut sink = Vec::new();
        let err = read_payload(msg, None, &mut sink, &mut layers).unwrap_err();
        assert!(matches!(err, PgpError::VerifierKeyRequired));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_compression_is_detected_without_caller_hint() {
        let mut builder = MessageBuilder::from_bytes("", &b"hello world"[..]);
        builder.compression(CompressionAlgorithm::ZLIB);
        let bytes = builder.to_vec(thread_rng()).unwrap();

        let mut layers = Vec::new();
        let msg = open_message(&bytes[..], &mut layers).unwrap();
        let msg = unwrap_compression(msg, &mut layers).unwrap();
        let mut sink = Vec::new();
        let result = read_payload(msg, None, &mut sink, &mut layers).unwrap();

        assert_eq!(result, VerificationResult::Absent);
        assert_eq!(sink, b"hello world");
        assert_eq!(layers, vec![Layer::Compression, Layer::Literal]);
    }
}
