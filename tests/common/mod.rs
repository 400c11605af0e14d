//! Common test setup and utilities for integration tests
//!
//! This module provides shared key material and assertions for all integration tests.

#![allow(dead_code)]

use pgpfile::{Crypto, SecurePassphrase};

/// Initialize test logging (safe to call from every test)
pub fn init_test_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_module("pgpfile", log::LevelFilter::Debug)
        .try_init();
}

/// A generated key pair together with the pass-phrase protecting it
pub struct TestIdentity {
    pub identity: String,
    pub passphrase: SecurePassphrase,
    pub public_armored: String,
    pub secret_armored: String,
}

impl TestIdentity {
    pub fn new(identity: &str, passphrase: &str) -> Self {
        let passphrase = SecurePassphrase::new(passphrase.to_string());
        let pair = Crypto::default()
            .generate_key_pair(identity, &passphrase)
            .expect("key generation");
        Self {
            identity: identity.to_string(),
            passphrase,
            public_armored: pair.public_armored,
            secret_armored: pair.secret_armored,
        }
    }

    pub fn public(&self) -> &[u8] {
        self.public_armored.as_bytes()
    }

    pub fn secret(&self) -> &[u8] {
        self.secret_armored.as_bytes()
    }
}

/// Test context holding a sender and a recipient
pub struct TestContext {
    pub alice: TestIdentity,
    pub bob: TestIdentity,
    pub crypto: Crypto,
}

impl TestContext {
    pub fn new() -> Self {
        init_test_logging();
        Self {
            alice: TestIdentity::new("alice@example.com", "alice-pass"),
            bob: TestIdentity::new("bob@example.com", "bob-pass"),
            crypto: Crypto::default(),
        }
    }
}

/// Assert that a result is Ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => panic!("Expected Ok but got Err: {:?}", e),
        }
    };
}

/// Assert that a result is Err matching the given pattern
#[macro_export]
macro_rules! assert_err {
    ($expr:expr, $pattern:pat) => {
        match $expr {
            Ok(_) => panic!("Expected Err but got Ok"),
            Err(e) => assert!(
                matches!(e, $pattern),
                "Unexpected error variant: {:?}",
                e
            ),
        }
    };
}
