//! Ed25519 key derivation.

use ed25519_dalek::SigningKey;
use lattice_types::{Account, KeyPair, PrivateKey};

/// Generate a new key pair from the thread-local secure random source.
pub fn generate_keypair() -> KeyPair {
    let seed: [u8; 32] = rand::random();
    keypair_from_seed(&seed)
}

/// The account (public key) a private key signs for.
pub fn account_from_private(private: &PrivateKey) -> Account {
    let signing_key = SigningKey::from_bytes(&private.0);
    Account::new(signing_key.verifying_key().to_bytes())
}

pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let account = account_from_private(&private);
    KeyPair { account, private }
}

/// Derive a key pair from a 32-byte seed (deterministic).
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing_key = SigningKey::from_bytes(seed);
    KeyPair {
        account: Account::new(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_keys() {
        let a = generate_keypair();
        let b = generate_keypair();
        assert_ne!(a.account, b.account);
        assert!(!a.account.is_zero());
    }

    #[test]
    fn account_from_private_is_deterministic() {
        let kp = keypair_from_seed(&[42u8; 32]);
        assert_eq!(account_from_private(&kp.private), kp.account);
        let again = keypair_from_private(PrivateKey(kp.private.0));
        assert_eq!(again.account, kp.account);
    }

    #[test]
    fn different_seeds_produce_different_accounts() {
        let kp1 = keypair_from_seed(&[1u8; 32]);
        let kp2 = keypair_from_seed(&[2u8; 32]);
        assert_ne!(kp1.account, kp2.account);
    }
}
