//! sr25519 keys, SS58 addresses and raw-message signatures.
//!
//! Keys are derived from a 32-byte secret seed the way Substrate does it, so a
//! seed printed by `subkey inspect` yields the same address here. Messages signed
//! as `bytes` payloads are wrapped in `<Bytes>` tags first, matching what browser
//! extensions do and what backends verify against.

use std::{fmt, str::FromStr};

use blake2::{Blake2b512, Digest};
use schnorrkel::{ExpansionMode, MiniSecretKey, PublicKey, Signature, signing_context};

use crate::api::{Error, Result};

/// SS58 prefix of the generic Substrate network, addresses starting with `5`.
pub const GENERIC_PREFIX: u8 = 42;

const SIGNING_CONTEXT: &[u8] = b"substrate";
const SS58_PRE: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;
const BYTES_PREFIX: &[u8] = b"<Bytes>";
const BYTES_SUFFIX: &[u8] = b"</Bytes>";

/// An sr25519 key pair with its SS58 address.
#[derive(Clone)]
pub struct Keypair {
    inner: schnorrkel::Keypair,
    address: String,
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Keypair {
    /// Derives the key pair from a 32-byte secret seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let secret = MiniSecretKey::from_bytes(seed)
            .map_err(|err| Error::Wallet(format!("invalid secret seed: {err}")))?;
        let inner = secret.expand_to_keypair(ExpansionMode::Ed25519);
        let address = ss58_encode(&inner.public.to_bytes(), GENERIC_PREFIX);
        Ok(Self { inner, address })
    }

    /// SS58 address under [`GENERIC_PREFIX`].
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.inner.public.to_bytes()
    }

    /// Signs `message` as is.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.inner
            .sign(signing_context(SIGNING_CONTEXT).bytes(message))
            .to_bytes()
    }
}

impl FromStr for Keypair {
    type Err = Error;

    /// Parses a hex secret seed, with or without `0x`.
    fn from_str(s: &str) -> Result<Self> {
        let seed = const_hex::decode(s.trim())
            .map_err(|err| Error::Wallet(format!("invalid secret seed: {err}")))?;
        Self::from_seed(&seed)
    }
}

/// Wraps `message` in `<Bytes>` tags unless it already is.
pub fn wrap_bytes(message: &[u8]) -> Vec<u8> {
    if message.starts_with(BYTES_PREFIX) && message.ends_with(BYTES_SUFFIX) {
        return message.to_vec();
    }
    [BYTES_PREFIX, message, BYTES_SUFFIX].concat()
}

/// Verifies a hex `signature` of `message` by the account at `address`.
///
/// Accepts signatures over the bare message and over its `<Bytes>` wrapping.
pub fn verify_signature(address: &str, message: &[u8], signature: &str) -> bool {
    let Some((_, public)) = ss58_decode(address) else {
        return false;
    };
    let Ok(public) = PublicKey::from_bytes(&public) else {
        return false;
    };
    let Some(signature) = const_hex::decode(signature)
        .ok()
        .and_then(|bytes| Signature::from_bytes(&bytes).ok())
    else {
        return false;
    };

    let context = signing_context(SIGNING_CONTEXT);
    public.verify(context.bytes(message), &signature).is_ok()
        || public
            .verify(context.bytes(&wrap_bytes(message)), &signature)
            .is_ok()
}

/// Encodes a public key as an SS58 address. Only simple prefixes (below 64) are
/// supported.
pub fn ss58_encode(public: &[u8; 32], prefix: u8) -> String {
    let mut data = Vec::with_capacity(1 + public.len() + CHECKSUM_LEN);
    data.push(prefix & 0x3f);
    data.extend_from_slice(public);
    let checksum = ss58_hash(&data);
    data.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(data).into_string()
}

/// Decodes an SS58 address into its prefix and public key.
///
/// Returns `None` for malformed addresses, bad checksums and prefixes above 63.
pub fn ss58_decode(address: &str) -> Option<(u8, [u8; 32])> {
    let data = bs58::decode(address).into_vec().ok()?;
    if data.len() != 1 + 32 + CHECKSUM_LEN || data[0] >= 64 {
        return None;
    }

    let (body, checksum) = data.split_at(1 + 32);
    if ss58_hash(body)[..CHECKSUM_LEN] != *checksum {
        return None;
    }

    let public = <[u8; 32]>::try_from(&body[1..]).ok()?;
    Some((body[0], public))
}

fn ss58_hash(data: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PRE);
    hasher.update(data);

    let mut hash = [0; 64];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    // Substrate development account //Alice.
    const ALICE_SEED: &str = "0xe5be9a5092b81bca64be81d212e7f2f9eba183bb7a90954f7b76361f6edb5c0a";
    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const ALICE_PUBLIC: &str = "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";

    #[test]
    fn test_seed_derives_dev_account() {
        let alice: Keypair = ALICE_SEED.parse().unwrap();
        assert_eq!(alice.address(), ALICE);
        assert_eq!(const_hex::encode(alice.public_key()), ALICE_PUBLIC);
    }

    #[test]
    fn test_ss58() {
        let public: [u8; 32] = const_hex::decode_to_array(ALICE_PUBLIC).unwrap();
        assert_eq!(ss58_encode(&public, GENERIC_PREFIX), ALICE);
        assert_eq!(ss58_decode(ALICE), Some((GENERIC_PREFIX, public)));

        let mut tampered = ALICE.to_owned();
        tampered.replace_range(10..11, "Z");
        assert_eq!(ss58_decode(&tampered), None);
        assert_eq!(ss58_decode("0xcD49bbAc6E85fdEB167EB7cA41A945d2b8758F6F"), None);
    }

    #[test]
    fn test_rejects_bad_seed() {
        assert!("0x1234".parse::<Keypair>().is_err());
        assert!("not hex".parse::<Keypair>().is_err());
    }

    #[test]
    fn test_wrap_bytes() {
        assert_eq!(wrap_bytes(b"hi"), b"<Bytes>hi</Bytes>".to_vec());
        assert_eq!(wrap_bytes(b"<Bytes>hi</Bytes>"), b"<Bytes>hi</Bytes>".to_vec());
    }

    #[test]
    fn test_verify_signature() {
        let alice: Keypair = ALICE_SEED.parse().unwrap();
        let message = b"Sign in to PolkaPay: 1762596000000";

        let wrapped = const_hex::encode_prefixed(alice.sign(&wrap_bytes(message)));
        assert!(verify_signature(ALICE, message, &wrapped));

        let bare = const_hex::encode_prefixed(alice.sign(message));
        assert!(verify_signature(ALICE, message, &bare));

        assert!(!verify_signature(ALICE, b"another message", &wrapped));
        assert!(!verify_signature(
            "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty",
            message,
            &wrapped
        ));
        assert!(!verify_signature(ALICE, message, "0x1234"));
    }
}
