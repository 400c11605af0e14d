//! Pass-phrase unlocking of secret keys.
//!
//! An [`UnlockedPrivateKey`] proves that its pass-phrase opens the key's
//! secret material. It borrows the key ring it came from, so it cannot
//! outlive the operation that loaded the ring, and its pass-phrase copy is
//! wiped when it is dropped. Any failure to open the secret material is
//! reported as a wrong pass-phrase.

use crate::crypto::pgp::keypair::SecurePassphrase;
use crate::crypto::pgp::keyring::{SecretComponent, SecretKeyHandle};
use crate::error::{PgpError, PgpResult};
use pgp::types::{Password, SecretKeyTrait};
use std::fmt;

/// A secret key whose pass-phrase has been checked.
pub struct UnlockedPrivateKey<'a> {
    handle: SecretKeyHandle<'a>,
    passphrase: SecurePassphrase,
}

impl<'a> UnlockedPrivateKey<'a> {
    pub fn handle(&self) -> SecretKeyHandle<'a> {
        self.handle
    }

    /// Password for the primitives library; built fresh for every use.
    pub(crate) fn password(&self) -> Password {
        self.passphrase.to_pgp_password()
    }

    pub(crate) fn signer(&self) -> &'a dyn SecretKeyTrait {
        self.handle.as_signer()
    }
}

impl fmt::Debug for UnlockedPrivateKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedPrivateKey")
            .field("fingerprint", &self.handle.fingerprint())
            .finish_non_exhaustive()
    }
}

pub struct SecretKeyUnlocker;

impl SecretKeyUnlocker {
    /// Apply `passphrase` to the secret material behind `handle`.
    pub fn unlock<'a>(
        handle: SecretKeyHandle<'a>,
        passphrase: &SecurePassphrase,
    ) -> PgpResult<UnlockedPrivateKey<'a>> {
        let password = passphrase.to_pgp_password();
        let unlocked = match handle.component() {
            SecretComponent::Primary(key) => key.unlock(&password, |_, _| Ok(())),
            SecretComponent::Subkey(key) => key.unlock(&password, |_, _| Ok(())),
        };

        // rPGP cannot tell a wrong pass-phrase from damaged secret material.
        if let Err(e) = unlocked.and_then(|checked| checked) {
            log::warn!(
                "Pass-phrase rejected for key {}: {}",
                handle.fingerprint(),
                e
            );
            return Err(PgpError::InvalidPassPhrase);
        }

        log::debug!("Unlocked secret key {}", handle.fingerprint());
        Ok(UnlockedPrivateKey {
            handle,
            passphrase: passphrase.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::pgp::keypair::KeyPairGenerator;
    use crate::crypto::pgp::keyring::KeyRingLoader;

    #[test]
    fn test_unlock_with_correct_passphrase() {
        let passphrase = SecurePassphrase::new("Test123".to_string());
        let pair = KeyPairGenerator::default()
            .generate("unlock@example.com", &passphrase)
            .unwrap();
        let ring = KeyRingLoader::read_secret(pair.secret_armored.as_bytes()).unwrap();

        for handle in ring.keys() {
            let unlocked = SecretKeyUnlocker::unlock(handle, &passphrase).unwrap();
            assert_eq!(unlocked.handle().key_id(), handle.key_id());
        }
    }

    #[test]
    fn test_unlock_with_wrong_passphrase() {
        let passphrase = SecurePassphrase::new("Test123".to_string());
        let pair = KeyPairGenerator::default()
            .generate("unlock@example.com", &passphrase)
            .unwrap();
        let ring = KeyRingLoader::read_secret(pair.secret_armored.as_bytes()).unwrap();
        let signer = ring.signing_key().unwrap();

        let wrong = SecurePassphrase::new("Test124".to_string());
        let err = SecretKeyUnlocker::unlock(signer, &wrong).unwrap_err();
        assert!(matches!(err, PgpError::InvalidPassPhrase));
        assert!(!err.to_string().contains("Test124"));

        // The material stays locked: the right pass-phrase still works afterwards.
        assert!(SecretKeyUnlocker::unlock(signer, &passphrase).is_ok());
    }

    #[test]
    fn test_every_component_rejects_wrong_passphrase_the_same_way() {
        let passphrase = SecurePassphrase::new("Test123".to_string());
        let pair = KeyPairGenerator::default()
            .generate("unlock@example.com", &passphrase)
            .unwrap();
        let ring = KeyRingLoader::read_secret(pair.secret_armored.as_bytes()).unwrap();
        let wrong = SecurePassphrase::new(String::new());

        assert_eq!(ring.keys().count(), 3);
        for handle in ring.keys() {
            let err = SecretKeyUnlocker::unlock(handle, &wrong).unwrap_err();
            assert!(matches!(err, PgpError::InvalidPassPhrase));
        }
    }

    #[test]
    fn test_debug_hides_passphrase() {
        let passphrase = SecurePassphrase::new("Test123".to_string());
        let pair = KeyPairGenerator::default()
            .generate("unlock@example.com", &passphrase)
            .unwrap();
        let ring = KeyRingLoader::read_secret(pair.secret_armored.as_bytes()).unwrap();
        let unlocked = SecretKeyUnlocker::unlock(ring.signing_key().unwrap(), &passphrase).unwrap();

        assert!(!format!("{:?}", unlocked).contains("Test123"));
    }
}
