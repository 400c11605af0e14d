//! Key-ring loading and capability-based key selection.
//!
//! A container may hold several key rings, each bundling a primary key with
//! its subkeys. Selection scans rings in container order and keys in stored
//! order (primary first) and returns the first key with the requested
//! capability.

use crate::crypto::pgp::armor::looks_armored;
use crate::error::{PgpError, PgpResult};
use pgp::composed::{Deserializable, SignedPublicKey, SignedSecretKey};
use pgp::crypto::public_key::PublicKeyAlgorithm;
use pgp::packet::{self, Signature, SubpacketData};
use pgp::types::{Fingerprint, KeyDetails, KeyId, PublicKeyTrait, SecretKeyTrait};
use std::fmt;
use std::io::Read;

/// Capability a key must carry to be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Public key that session keys can be encrypted to.
    Encryption,
    /// Public key that checks signatures.
    Verification,
    /// Secret key that creates signatures.
    Signing,
    /// Secret key that recovers session keys.
    Decryption,
}

impl Capability {
    pub fn label(&self) -> &'static str {
        match self {
            Capability::Encryption => "encryption",
            Capability::Verification => "verification",
            Capability::Signing => "signing",
            Capability::Decryption => "decryption",
        }
    }
}

fn algorithm_encrypts(algorithm: PublicKeyAlgorithm) -> bool {
    matches!(
        algorithm,
        PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::ElgamalEncrypt
            | PublicKeyAlgorithm::Elgamal
            | PublicKeyAlgorithm::ECDH
            | PublicKeyAlgorithm::X25519
    )
}

fn algorithm_signs(algorithm: PublicKeyAlgorithm) -> bool {
    matches!(
        algorithm,
        PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSASign
            | PublicKeyAlgorithm::DSA
            | PublicKeyAlgorithm::ECDSA
            | PublicKeyAlgorithm::EdDSALegacy
            | PublicKeyAlgorithm::Ed25519
    )
}

/// Usage declared by the key-flags subpacket of a self-signature.
#[derive(Debug, Clone, Copy)]
struct DeclaredUsage {
    sign: bool,
    encrypt: bool,
}

fn declared_usage<'s, I>(signatures: I) -> Option<DeclaredUsage>
where
    I: IntoIterator<Item = &'s Signature>,
{
    signatures.into_iter().find_map(|sig| {
        sig.config().and_then(|config| {
            config
                .hashed_subpackets
                .iter()
                .find_map(|subpkt| match &subpkt.data {
                    SubpacketData::KeyFlags(flags) => Some(DeclaredUsage {
                        sign: flags.sign(),
                        encrypt: flags.encrypt_comms() || flags.encrypt_storage(),
                    }),
                    _ => None,
                })
        })
    })
}

/// A key may only do what its algorithm allows, narrowed by its key flags if present.
fn capabilities(algorithm: PublicKeyAlgorithm, usage: Option<DeclaredUsage>) -> (bool, bool) {
    let signs = algorithm_signs(algorithm) && usage.map_or(true, |u| u.sign);
    let encrypts = algorithm_encrypts(algorithm) && usage.map_or(true, |u| u.encrypt);
    (signs, encrypts)
}

fn primary_signatures(
    details: &pgp::composed::SignedKeyDetails,
) -> impl Iterator<Item = &Signature> {
    details
        .direct_signatures
        .iter()
        .chain(details.users.iter().flat_map(|user| user.signatures.iter()))
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum PublicComponent<'a> {
    Primary(&'a packet::PublicKey),
    Subkey(&'a packet::PublicSubkey),
}

/// Non-owning view of one public key inside a loaded [`PublicKeyRing`].
#[derive(Debug, Clone, Copy)]
pub struct PublicKeyHandle<'a> {
    component: PublicComponent<'a>,
    encryption: bool,
    verification: bool,
}

impl<'a> PublicKeyHandle<'a> {
    /// View the primary key of a certificate, whatever its capabilities.
    pub fn primary(key: &'a SignedPublicKey) -> Self {
        let (signs, encrypts) = capabilities(
            key.primary_key.algorithm(),
            declared_usage(primary_signatures(&key.details)),
        );
        Self {
            component: PublicComponent::Primary(&key.primary_key),
            encryption: encrypts,
            verification: signs,
        }
    }

    fn subkey(subkey: &'a pgp::composed::SignedPublicSubKey) -> Self {
        let (signs, encrypts) =
            capabilities(subkey.key.algorithm(), declared_usage(&subkey.signatures));
        Self {
            component: PublicComponent::Subkey(&subkey.key),
            encryption: encrypts,
            verification: signs,
        }
    }

    pub fn is_encryption_key(&self) -> bool {
        self.encryption
    }

    pub fn is_verification_key(&self) -> bool {
        self.verification
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Encryption => self.encryption,
            Capability::Verification => self.verification,
            Capability::Signing | Capability::Decryption => false,
        }
    }

    pub fn key_id(&self) -> KeyId {
        match self.component {
            PublicComponent::Primary(key) => key.key_id(),
            PublicComponent::Subkey(key) => key.key_id(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        match self.component {
            PublicComponent::Primary(key) => key.fingerprint(),
            PublicComponent::Subkey(key) => key.fingerprint(),
        }
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        match self.component {
            PublicComponent::Primary(key) => key.algorithm(),
            PublicComponent::Subkey(key) => key.algorithm(),
        }
    }

    /// The key as a signature verifier.
    pub fn as_verifier(&self) -> &'a dyn PublicKeyTrait {
        match self.component {
            PublicComponent::Primary(key) => key,
            PublicComponent::Subkey(key) => key,
        }
    }

    pub(crate) fn component(&self) -> PublicComponent<'a> {
        self.component
    }
}

#[derive(Clone, Copy)]
pub(crate) enum SecretComponent<'a> {
    Primary(&'a packet::SecretKey),
    Subkey(&'a packet::SecretSubkey),
}

/// Non-owning view of one locked secret key inside a loaded [`SecretKeyRing`].
#[derive(Clone, Copy)]
pub struct SecretKeyHandle<'a> {
    parent: &'a SignedSecretKey,
    component: SecretComponent<'a>,
    signing: bool,
    decryption: bool,
}

impl<'a> SecretKeyHandle<'a> {
    /// View the primary key of a secret certificate, whatever its capabilities.
    pub fn primary(key: &'a SignedSecretKey) -> Self {
        let (signs, encrypts) = capabilities(
            key.primary_key.algorithm(),
            declared_usage(primary_signatures(&key.details)),
        );
        Self {
            parent: key,
            component: SecretComponent::Primary(&key.primary_key),
            signing: signs,
            decryption: encrypts,
        }
    }

    fn subkey(parent: &'a SignedSecretKey, subkey: &'a pgp::composed::SignedSecretSubKey) -> Self {
        let (signs, encrypts) =
            capabilities(subkey.key.algorithm(), declared_usage(&subkey.signatures));
        Self {
            parent,
            component: SecretComponent::Subkey(&subkey.key),
            signing: signs,
            decryption: encrypts,
        }
    }

    pub fn is_signing_key(&self) -> bool {
        self.signing
    }

    pub fn is_decryption_key(&self) -> bool {
        self.decryption
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Signing => self.signing,
            Capability::Decryption => self.decryption,
            Capability::Encryption | Capability::Verification => false,
        }
    }

    pub fn key_id(&self) -> KeyId {
        match self.component {
            SecretComponent::Primary(key) => key.key_id(),
            SecretComponent::Subkey(key) => key.key_id(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        match self.component {
            SecretComponent::Primary(key) => key.fingerprint(),
            SecretComponent::Subkey(key) => key.fingerprint(),
        }
    }

    /// The certificate this key belongs to.
    pub fn parent(&self) -> &'a SignedSecretKey {
        self.parent
    }

    pub(crate) fn component(&self) -> SecretComponent<'a> {
        self.component
    }

    pub(crate) fn as_signer(&self) -> &'a dyn SecretKeyTrait {
        match self.component {
            SecretComponent::Primary(key) => key,
            SecretComponent::Subkey(key) => key,
        }
    }
}

impl fmt::Debug for SecretKeyHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKeyHandle")
            .field("fingerprint", &self.fingerprint())
            .field("signing", &self.signing)
            .field("decryption", &self.decryption)
            .finish()
    }
}

/// Ordered, non-empty collection of key rings read from one container.
#[derive(Debug, Clone)]
pub struct KeyRing<K> {
    entries: Vec<K>,
}

pub type PublicKeyRing = KeyRing<SignedPublicKey>;
pub type SecretKeyRing = KeyRing<SignedSecretKey>;

impl<K> KeyRing<K> {
    pub fn entries(&self) -> &[K] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a successfully parsed ring.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PublicKeyRing {
    /// All keys in scan order.
    pub fn keys(&self) -> impl Iterator<Item = PublicKeyHandle<'_>> {
        self.entries.iter().flat_map(|entry| {
            std::iter::once(PublicKeyHandle::primary(entry))
                .chain(entry.public_subkeys.iter().map(PublicKeyHandle::subkey))
        })
    }

    /// First key carrying `capability`.
    pub fn select(&self, capability: Capability) -> PgpResult<PublicKeyHandle<'_>> {
        let found = self
            .keys()
            .find(|key| key.has(capability))
            .ok_or(PgpError::KeyNotFound(capability.label()))?;
        log::debug!(
            "Selected {} key {} ({:?})",
            capability.label(),
            found.fingerprint(),
            found.algorithm()
        );
        Ok(found)
    }

    pub fn encryption_key(&self) -> PgpResult<PublicKeyHandle<'_>> {
        self.select(Capability::Encryption)
    }

    pub fn verification_key(&self) -> PgpResult<PublicKeyHandle<'_>> {
        self.select(Capability::Verification)
    }

    /// Every key able to check signatures, across all rings in the container.
    pub fn verification_keys(&self) -> impl Iterator<Item = PublicKeyHandle<'_>> {
        self.keys().filter(|key| key.is_verification_key())
    }
}

impl SecretKeyRing {
    /// All keys with secret material, in scan order.
    pub fn keys(&self) -> impl Iterator<Item = SecretKeyHandle<'_>> {
        self.entries.iter().flat_map(|entry| {
            std::iter::once(SecretKeyHandle::primary(entry)).chain(
                entry
                    .secret_subkeys
                    .iter()
                    .map(move |sub| SecretKeyHandle::subkey(entry, sub)),
            )
        })
    }

    /// First key carrying `capability`.
    pub fn select(&self, capability: Capability) -> PgpResult<SecretKeyHandle<'_>> {
        let found = self
            .keys()
            .find(|key| key.has(capability))
            .ok_or(PgpError::KeyNotFound(capability.label()))?;
        log::debug!("Selected {} key {}", capability.label(), found.fingerprint());
        Ok(found)
    }

    pub fn signing_key(&self) -> PgpResult<SecretKeyHandle<'_>> {
        self.select(Capability::Signing)
    }

    /// First decryption key whose key-id is one of `recipients`.
    pub fn key_for_recipients(&self, recipients: &[KeyId]) -> Option<SecretKeyHandle<'_>> {
        self.keys().find(|key| {
            key.is_decryption_key() && recipients.iter().any(|id| *id == key.key_id())
        })
    }
}

/// Parses key-ring containers, armored or binary.
pub struct KeyRingLoader;

impl KeyRingLoader {
    /// Parse a public key container without capability checks.
    pub fn read_public<R: Read>(reader: R) -> PgpResult<PublicKeyRing> {
        let entries: Vec<SignedPublicKey> = Self::parse_container(reader)?;
        for entry in &entries {
            entry
                .verify()
                .map_err(|e| PgpError::MalformedContainer(format!("bad self-signature: {}", e)))?;
        }
        Ok(KeyRing { entries })
    }

    /// Parse a secret key container without capability checks.
    pub fn read_secret<R: Read>(reader: R) -> PgpResult<SecretKeyRing> {
        let entries: Vec<SignedSecretKey> = Self::parse_container(reader)?;
        for entry in &entries {
            entry
                .verify()
                .map_err(|e| PgpError::MalformedContainer(format!("bad self-signature: {}", e)))?;
        }
        Ok(KeyRing { entries })
    }

    /// Parse a public container and make sure it holds an encryption key.
    pub fn load_public_key<R: Read>(reader: R) -> PgpResult<PublicKeyRing> {
        let ring = Self::read_public(reader)?;
        ring.encryption_key()?;
        Ok(ring)
    }

    /// Parse a public container and make sure it holds a verification key.
    pub fn load_verification_key<R: Read>(reader: R) -> PgpResult<PublicKeyRing> {
        let ring = Self::read_public(reader)?;
        ring.verification_key()?;
        Ok(ring)
    }

    /// Parse a secret container and make sure it holds a signing key.
    pub fn load_secret_key<R: Read>(reader: R) -> PgpResult<SecretKeyRing> {
        let ring = Self::read_secret(reader)?;
        ring.signing_key()?;
        Ok(ring)
    }

    fn parse_container<K, R>(mut reader: R) -> PgpResult<Vec<K>>
    where
        K: Deserializable,
        R: Read,
    {
        // Key containers are small; buffer them to sniff armor and iterate.
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(PgpError::MalformedContainer("empty key container".to_string()));
        }

        let parsed: Vec<pgp::errors::Result<K>> = if looks_armored(&bytes) {
            let (iter, _headers) = K::from_armor_many(&bytes[..])
                .map_err(|e| PgpError::MalformedContainer(e.to_string()))?;
            iter.collect()
        } else {
            K::from_bytes_many(&bytes[..])
                .map_err(|e| PgpError::MalformedContainer(e.to_string()))?
                .collect()
        };

        let entries = parsed
            .into_iter()
            .collect::<pgp::errors::Result<Vec<K>>>()
            .map_err(|e| PgpError::MalformedContainer(e.to_string()))?;

        if entries.is_empty() {
            return Err(PgpError::MalformedContainer(
                "no key rings in container".to_string(),
            ));
        }
        log::debug!("Parsed {} key ring(s) from container", entries.len());
        Ok(entries)
    }
}
