//! Round-trip scenarios through the encryption and decryption pipelines.

mod common;

use anyhow::Result;
use common::{TestContext, TestIdentity};
use pgp::composed::{Deserializable, SignedPublicKey};
use pgp::ser::Serialize;
use pgpfile::crypto::pgp::{Layer, Signer};
use pgpfile::{
    Crypto, DecryptionPipeline, EncryptOptions, EncryptionPipeline, KeyRingLoader, PipelineConfig,
    VerificationResult,
};

/// Armored, compressed, signed and encrypted to the signer's own key
#[test]
fn test_mark_signs_and_encrypts_hello_world() -> Result<()> {
    common::init_test_logging();
    let mark = TestIdentity::new("mark@example.com", "Test123");

    let public_ring = KeyRingLoader::load_public_key(mark.public())?;
    let secret_ring = KeyRingLoader::load_secret_key(mark.secret())?;

    let mut message = Vec::new();
    let plan = EncryptionPipeline::default().encrypt(
        &b"hello world"[..],
        &mut message,
        public_ring.encryption_key()?,
        Some(Signer {
            key: secret_ring.signing_key()?,
            passphrase: &mark.passphrase,
        }),
        &EncryptOptions::default(),
    )?;
    assert_eq!(
        plan.layers(),
        &[
            Layer::Literal,
            Layer::Signature,
            Layer::Compression,
            Layer::Encryption,
            Layer::Armor,
        ]
    );
    assert!(String::from_utf8_lossy(&message).starts_with("-----BEGIN PGP MESSAGE-----"));

    let mut plaintext = Vec::new();
    let outcome = DecryptionPipeline::default().decrypt(
        &message[..],
        &mut plaintext,
        &secret_ring,
        &mark.passphrase,
        Some(&public_ring),
    )?;

    assert_eq!(plaintext, b"hello world");
    assert_eq!(outcome.verification, VerificationResult::Valid);
    assert_eq!(outcome.bytes_written, 11);
    assert_eq!(&outcome.layers[..2], &[Layer::Armor, Layer::Encryption]);
    assert!(outcome.layers.contains(&Layer::Compression));
    assert!(outcome.layers.contains(&Layer::Signature));
    assert_eq!(outcome.layers.last(), Some(&Layer::Literal));
    Ok(())
}

#[test]
fn test_unsigned_round_trip() -> Result<()> {
    let ctx = TestContext::new();
    let plaintext = b"The quick brown fox jumps over the lazy dog".to_vec();

    let message = ctx
        .crypto
        .encrypt(&plaintext, ctx.bob.public(), &EncryptOptions::default())?;
    let decrypted = ctx
        .crypto
        .decrypt(&message, ctx.bob.secret(), &ctx.bob.passphrase)?;

    assert_eq!(decrypted, plaintext);
    Ok(())
}

#[test]
fn test_signed_round_trip_between_parties() -> Result<()> {
    let ctx = TestContext::new();
    let plaintext = b"from alice to bob".to_vec();

    let message = ctx.crypto.encrypt_and_sign(
        &plaintext,
        ctx.bob.public(),
        ctx.alice.secret(),
        &ctx.alice.passphrase,
        &EncryptOptions::default(),
    )?;
    let (decrypted, verification) = ctx.crypto.decrypt_and_verify(
        &message,
        ctx.bob.secret(),
        &ctx.bob.passphrase,
        ctx.alice.public(),
    )?;

    assert_eq!(decrypted, plaintext);
    assert_eq!(verification, VerificationResult::Valid);
    Ok(())
}

/// Binary container holding each identity's certificate, in the given order
fn certificate_bundle(identities: &[&TestIdentity]) -> Result<Vec<u8>> {
    let mut bundle = Vec::new();
    for identity in identities {
        let (cert, _) = SignedPublicKey::from_string(&identity.public_armored)?;
        bundle.extend(cert.to_bytes()?);
    }
    Ok(bundle)
}

#[test]
fn test_signer_found_anywhere_in_verifier_container() -> Result<()> {
    let ctx = TestContext::new();
    let message = ctx.crypto.encrypt_and_sign(
        b"signed by alice",
        ctx.bob.public(),
        ctx.alice.secret(),
        &ctx.alice.passphrase,
        &EncryptOptions::default(),
    )?;

    for order in [[&ctx.bob, &ctx.alice], [&ctx.alice, &ctx.bob]] {
        let verifiers = certificate_bundle(&order)?;
        let (decrypted, verification) = ctx.crypto.decrypt_and_verify(
            &message,
            ctx.bob.secret(),
            &ctx.bob.passphrase,
            &verifiers,
        )?;
        assert_eq!(decrypted, b"signed by alice");
        assert_eq!(verification, VerificationResult::Valid);
    }

    let eve = TestIdentity::new("eve@example.com", "eve-pass");
    let strangers = certificate_bundle(&[&ctx.bob, &eve])?;
    let (_, verification) = ctx.crypto.decrypt_and_verify(
        &message,
        ctx.bob.secret(),
        &ctx.bob.passphrase,
        &strangers,
    )?;
    assert_eq!(verification, VerificationResult::Invalid);
    Ok(())
}

#[test]
fn test_unsigned_message_reports_absent_signature() -> Result<()> {
    let ctx = TestContext::new();
    let message = ctx
        .crypto
        .encrypt(b"no signature", ctx.bob.public(), &EncryptOptions::default())?;

    let (decrypted, verification) = ctx.crypto.decrypt_and_verify(
        &message,
        ctx.bob.secret(),
        &ctx.bob.passphrase,
        ctx.alice.public(),
    )?;

    assert_eq!(decrypted, b"no signature");
    assert_eq!(verification, VerificationResult::Absent);
    Ok(())
}

#[test]
fn test_compression_is_transparent_to_decryption() -> Result<()> {
    let ctx = TestContext::new();
    let plaintext = "compressible ".repeat(500).into_bytes();

    let compressed = ctx
        .crypto
        .encrypt(&plaintext, ctx.bob.public(), &EncryptOptions::default())?;
    let uncompressed = ctx.crypto.encrypt(
        &plaintext,
        ctx.bob.public(),
        &EncryptOptions::default().with_compression(false),
    )?;
    assert!(compressed.len() < uncompressed.len());

    for message in [compressed, uncompressed] {
        let decrypted = ctx
            .crypto
            .decrypt(&message, ctx.bob.secret(), &ctx.bob.passphrase)?;
        assert_eq!(decrypted, plaintext);
    }
    Ok(())
}

#[test]
fn test_binary_output_is_detected_without_hint() -> Result<()> {
    let ctx = TestContext::new();
    let options = EncryptOptions::default().with_armor(false);

    let message = ctx.crypto.encrypt(b"binary", ctx.bob.public(), &options)?;
    assert!(!message.starts_with(b"-----BEGIN"));

    let secret_ring = KeyRingLoader::read_secret(ctx.bob.secret())?;
    let mut plaintext = Vec::new();
    let outcome = DecryptionPipeline::default().decrypt(
        &message[..],
        &mut plaintext,
        &secret_ring,
        &ctx.bob.passphrase,
        None,
    )?;

    assert_eq!(plaintext, b"binary");
    assert_eq!(outcome.layers.first(), Some(&Layer::Encryption));
    assert!(!outcome.layers.contains(&Layer::Armor));
    Ok(())
}

#[test]
fn test_empty_plaintext_round_trip() -> Result<()> {
    let ctx = TestContext::new();
    let message = ctx
        .crypto
        .encrypt(b"", ctx.bob.public(), &EncryptOptions::default())?;
    let decrypted = ctx
        .crypto
        .decrypt(&message, ctx.bob.secret(), &ctx.bob.passphrase)?;
    assert!(decrypted.is_empty());
    Ok(())
}

#[test]
fn test_large_plaintext_spills_spool_to_disk() -> Result<()> {
    let ctx = TestContext::new();
    let crypto = Crypto::new(PipelineConfig::default().with_spool_threshold(4096));
    let plaintext: Vec<u8> = (0..512 * 1024u32).map(|i| (i % 251) as u8).collect();

    let message = crypto.encrypt(&plaintext, ctx.bob.public(), &EncryptOptions::default())?;
    let decrypted = crypto.decrypt(&message, ctx.bob.secret(), &ctx.bob.passphrase)?;

    assert_eq!(decrypted, plaintext);
    Ok(())
}

#[test]
fn test_non_default_algorithms_round_trip() -> Result<()> {
    use pgp::crypto::hash::HashAlgorithm;
    use pgp::crypto::sym::SymmetricKeyAlgorithm;
    use pgp::types::CompressionAlgorithm;

    let ctx = TestContext::new();
    let crypto = Crypto::new(
        PipelineConfig::default()
            .with_compression(CompressionAlgorithm::ZLIB)
            .with_symmetric(SymmetricKeyAlgorithm::AES128)
            .with_hash(HashAlgorithm::Sha512),
    );

    let message = crypto.encrypt_and_sign(
        b"tuned",
        ctx.bob.public(),
        ctx.alice.secret(),
        &ctx.alice.passphrase,
        &EncryptOptions::default(),
    )?;
    let (decrypted, verification) = crypto.decrypt_and_verify(
        &message,
        ctx.bob.secret(),
        &ctx.bob.passphrase,
        ctx.alice.public(),
    )?;

    assert_eq!(decrypted, b"tuned");
    assert!(verification.is_valid());
    Ok(())
}
