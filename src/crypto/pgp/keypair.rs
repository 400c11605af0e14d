//! PGP key pair generation using rPGP 0.16

use crate::config::KeyAlgorithm;
use crate::error::{PgpError, PgpResult};
use pgp::composed::{
    KeyType, SecretKeyParamsBuilder, SignedPublicKey, SignedSecretKey, SubkeyParamsBuilder,
};
use pgp::crypto::ecc_curve::ECCCurve;
use pgp::types::{KeyDetails, Password};
use rand::thread_rng;
use std::fmt;
use std::io::Write;
use zeroize::ZeroizeOnDrop;

/// Secure passphrase for PGP operations.
///
/// Implements ZeroizeOnDrop to securely clear passphrase from memory when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecurePassphrase {
    passphrase: String,
}

impl SecurePassphrase {
    /// Create a new SecurePassphrase from a string.
    pub fn new(passphrase: String) -> Self {
        Self { passphrase }
    }

    /// Prompt on the terminal with echo disabled.
    pub fn from_user_input_with_prompt(prompt: &str) -> std::io::Result<Self> {
        let passphrase = rpassword::prompt_password(format!("{}: ", prompt))?;
        Ok(Self::new(passphrase))
    }

    /// Generate a strong random passphrase (32 alphanumeric characters).
    pub fn generate_strong() -> Self {
        use rand::distributions::{Alphanumeric, DistString};
        let passphrase = Alphanumeric.sample_string(&mut thread_rng(), 32);
        Self::new(passphrase)
    }

    /// Get the passphrase as a string slice.
    pub fn as_str(&self) -> &str {
        &self.passphrase
    }

    /// Convert to PGP Password type for use with rPGP.
    pub fn to_pgp_password(&self) -> Password {
        Password::from(self.passphrase.as_str())
    }
}

impl fmt::Debug for SecurePassphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurePassphrase(<redacted>)")
    }
}

/// A freshly generated key pair, both halves armored.
#[cfg_attr(test, derive(Debug))]
pub struct GeneratedKeyPair {
    pub public_key: SignedPublicKey,
    pub secret_key: SignedSecretKey,
    pub public_armored: String,
    pub secret_armored: String,
}

/// Creates matched public/secret key pairs.
///
/// Every pair has three keys:
/// - a certification-only primary key
/// - a signing subkey
/// - an encryption subkey
///
/// All secret material is locked with the supplied passphrase.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyPairGenerator {
    algorithm: KeyAlgorithm,
}

impl KeyPairGenerator {
    pub fn new(algorithm: KeyAlgorithm) -> Self {
        Self { algorithm }
    }

    fn key_types(&self) -> (KeyType, KeyType, KeyType) {
        match self.algorithm {
            KeyAlgorithm::Curve25519 => (
                KeyType::Ed25519Legacy,
                KeyType::Ed25519Legacy,
                KeyType::ECDH(ECCCurve::Curve25519),
            ),
            KeyAlgorithm::Rsa(bits) => (KeyType::Rsa(bits), KeyType::Rsa(bits), KeyType::Rsa(bits)),
        }
    }

    /// Generate a key pair bound to `identity`.
    pub fn generate(
        &self,
        identity: &str,
        passphrase: &SecurePassphrase,
    ) -> PgpResult<GeneratedKeyPair> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(PgpError::InvalidIdentity);
        }

        log::info!(
            "Generating {:?} PGP keypair for identity: {}",
            self.algorithm,
            identity
        );

        let (primary_type, sign_type, encrypt_type) = self.key_types();

        let mut signkey = SubkeyParamsBuilder::default();
        signkey
            .key_type(sign_type)
            .can_sign(true)
            .can_encrypt(false)
            .can_authenticate(false)
            .passphrase(Some(passphrase.as_str().to_string()));

        let mut encryptkey = SubkeyParamsBuilder::default();
        encryptkey
            .key_type(encrypt_type)
            .can_sign(false)
            .can_encrypt(true)
            .can_authenticate(false)
            .passphrase(Some(passphrase.as_str().to_string()));

        let mut key_params = SecretKeyParamsBuilder::default();
        key_params
            .key_type(primary_type)
            .can_certify(true)
            .can_sign(false)
            .can_encrypt(false)
            .primary_user_id(identity.into())
            .passphrase(Some(passphrase.as_str().to_string()))
            .subkeys(vec![
                signkey.build().map_err(|e| {
                    PgpError::KeyGeneration(format!("failed to build signing subkey: {}", e))
                })?,
                encryptkey.build().map_err(|e| {
                    PgpError::KeyGeneration(format!("failed to build encryption subkey: {}", e))
                })?,
            ]);

        let secret_key_params = key_params.build().map_err(|e| {
            PgpError::KeyGeneration(format!("failed to build secret key params: {}", e))
        })?;
        let secret_key = secret_key_params
            .generate(thread_rng())
            .map_err(|e| PgpError::KeyGeneration(format!("failed to generate secret key: {}", e)))?;

        let signed_secret_key = secret_key
            .sign(&mut thread_rng(), &passphrase.to_pgp_password())
            .map_err(|e| PgpError::KeyGeneration(format!("failed to self-sign key: {}", e)))?;

        let signed_public_key = SignedPublicKey::from(signed_secret_key.clone());

        let public_armored = signed_public_key
            .to_armored_string(Default::default())
            .map_err(|e| PgpError::KeyGeneration(format!("failed to armor public key: {}", e)))?;
        let secret_armored = signed_secret_key
            .to_armored_string(Default::default())
            .map_err(|e| PgpError::KeyGeneration(format!("failed to armor secret key: {}", e)))?;

        log::info!(
            "Generated PGP keypair {} for identity: {}",
            signed_public_key.fingerprint(),
            identity
        );

        Ok(GeneratedKeyPair {
            public_key: signed_public_key,
            secret_key: signed_secret_key,
            public_armored,
            secret_armored,
        })
    }

    /// Generate a key pair and write both halves, armored, to the given streams.
    pub fn generate_to<P: Write, S: Write>(
        &self,
        identity: &str,
        passphrase: &SecurePassphrase,
        mut public_out: P,
        mut secret_out: S,
    ) -> PgpResult<()> {
        let pair = self.generate(identity, passphrase)?;
        public_out.write_all(pair.public_armored.as_bytes())?;
        public_out.flush()?;
        secret_out.write_all(pair.secret_armored.as_bytes())?;
        secret_out.flush()?;
        Ok(())
    }
}
