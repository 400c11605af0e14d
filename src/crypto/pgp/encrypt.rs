//! Forward message pipeline: literal data, signature, compression, encryption, armor.

use crate::config::PipelineConfig;
use crate::crypto::pgp::keypair::SecurePassphrase;
use crate::crypto::pgp::keyring::{PublicComponent, PublicKeyHandle, SecretKeyHandle};
use crate::crypto::pgp::unlock::{SecretKeyUnlocker, UnlockedPrivateKey};
use crate::error::{PgpError, PgpResult};
use pgp::composed::{ArmorOptions, MessageBuilder};
use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::types::CompressionAlgorithm;
use rand::thread_rng;
use std::io::{Read, Write};

/// One OpenPGP layer, as produced by encryption or peeled by decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Literal,
    Signature,
    Compression,
    Encryption,
    Armor,
}

/// Per-call choices for [`EncryptionPipeline::encrypt`].
#[derive(Debug, Clone)]
pub struct EncryptOptions {
    pub armor: bool,
    pub compress: bool,
    /// Name recorded in the literal data packet.
    pub file_name: String,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            armor: true,
            compress: true,
            file_name: String::new(),
        }
    }
}

impl EncryptOptions {
    pub fn with_armor(mut self, armor: bool) -> Self {
        self.armor = armor;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

/// Signer key plus the pass-phrase that unlocks it.
#[derive(Debug, Clone, Copy)]
pub struct Signer<'a> {
    pub key: SecretKeyHandle<'a>,
    pub passphrase: &'a SecurePassphrase,
}

/// Ordered layers of a message, innermost first, with the algorithm chosen for each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPlan {
    layers: Vec<Layer>,
    hash: Option<HashAlgorithm>,
    compression: Option<CompressionAlgorithm>,
    symmetric: SymmetricKeyAlgorithm,
}

impl LayerPlan {
    pub fn new(config: &PipelineConfig, options: &EncryptOptions, signed: bool) -> Self {
        let mut layers = vec![Layer::Literal];
        let hash = signed.then_some(config.hash);
        if hash.is_some() {
            layers.push(Layer::Signature);
        }
        let compression = (options.compress
            && config.compression != CompressionAlgorithm::Uncompressed)
            .then_some(config.compression);
        if compression.is_some() {
            layers.push(Layer::Compression);
        }
        layers.push(Layer::Encryption);
        if options.armor {
            layers.push(Layer::Armor);
        }
        Self {
            layers,
            hash,
            compression,
            symmetric: config.symmetric,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn compression(&self) -> Option<CompressionAlgorithm> {
        self.compression
    }

    pub fn signature_hash(&self) -> Option<HashAlgorithm> {
        self.hash
    }

    pub fn symmetric(&self) -> SymmetricKeyAlgorithm {
        self.symmetric
    }

    pub fn is_armored(&self) -> bool {
        self.layers.contains(&Layer::Armor)
    }
}

/// Builds OpenPGP messages from plaintext streams.
#[derive(Debug, Clone, Default)]
pub struct EncryptionPipeline {
    config: PipelineConfig,
}

impl EncryptionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Encrypt `plaintext` to `recipient`, optionally signing, and stream the message to `out`.
    ///
    /// Returns the layer plan that was applied.
    pub fn encrypt<R, W>(
        &self,
        plaintext: R,
        out: W,
        recipient: PublicKeyHandle<'_>,
        signer: Option<Signer<'_>>,
        options: &EncryptOptions,
    ) -> PgpResult<LayerPlan>
    where
        R: Read,
        W: Write,
    {
        if !recipient.is_encryption_key() {
            return Err(PgpError::EncryptionKeyUnusable);
        }

        let unlocked = match signer {
            Some(signer) => {
                if !signer.key.is_signing_key() {
                    return Err(PgpError::SigningKeyUnusable);
                }
                Some(SecretKeyUnlocker::unlock(signer.key, signer.passphrase)?)
            }
            None => None,
        };

        let plan = LayerPlan::new(&self.config, options, unlocked.is_some());
        log::info!(
            "Encrypting to {} with layers {:?}",
            recipient.fingerprint(),
            plan.layers()
        );

        write_message(plaintext, out, recipient, unlocked.as_ref(), options, &plan)?;
        Ok(plan)
    }
}

fn write_message<R, W>(
    plaintext: R,
    out: W,
    recipient: PublicKeyHandle<'_>,
    signer: Option<&UnlockedPrivateKey<'_>>,
    options: &EncryptOptions,
    plan: &LayerPlan,
) -> PgpResult<()>
where
    R: Read,
    W: Write,
{
    let mut rng = thread_rng();
    let mut builder = MessageBuilder::from_reader(options.file_name.clone(), plaintext)
        .seipd_v1(&mut rng, plan.symmetric());

    if let (Some(signer), Some(hash)) = (signer, plan.signature_hash()) {
        builder.sign(signer.signer(), signer.password(), hash);
    }

    if let Some(algorithm) = plan.compression() {
        builder.compression(algorithm);
    }

    match recipient.component() {
        PublicComponent::Primary(key) => builder.encrypt_to_key(&mut rng, key),
        PublicComponent::Subkey(key) => builder.encrypt_to_key(&mut rng, key),
    }
    .map_err(|e| {
        log::warn!("Recipient key {} rejected: {}", recipient.fingerprint(), e);
        PgpError::EncryptionKeyUnusable
    })?;

    let written = if plan.is_armored() {
        builder.to_armored_writer(&mut rng, ArmorOptions::default(), out)
    } else {
        builder.to_writer(&mut rng, out)
    };
    written.map_err(|e| {
        PgpError::Io(std::io::Error::other(format!(
            "failed to write message: {}",
            e
        )))
    })?;

    Ok(())
}
