use k256::ecdsa::{RecoveryId, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::{CryptoRng, RngCore};

use primitive_types::{H160, H256};

use crate::error::Error;
use crate::{hash_personal_message, keccak256};

pub const SECRET_KEY_LENGTH: usize = 32;
pub const PUBLIC_KEY_LENGTH: usize = 65;
pub const SIG_LENGTH: usize = 65;

/// Recovery ids on the wire are shifted by this amount (`v` of 27 or 28).
const RECOVERY_ID_OFFSET: u8 = 27;

#[derive(Eq, PartialEq, Clone, Debug)]
pub struct Keypair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl Keypair {
    pub fn generate<T>(csprng: &mut T) -> Self
    where
        T: CryptoRng + RngCore,
    {
        let secret = SecretKey::generate(csprng);
        let public = secret.public();
        Self { secret, public }
    }

    pub fn address(&self) -> H160 {
        self.public.address()
    }
}

#[derive(Eq, PartialEq, Clone, Debug)]
pub struct SecretKey {
    inner: SigningKey,
}

impl SecretKey {
    pub fn generate<T>(csprng: &mut T) -> SecretKey
    where
        T: CryptoRng + RngCore,
    {
        Self {
            inner: SigningKey::random(csprng),
        }
    }

    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let inner = SigningKey::from_slice(bytes)?;
        Ok(SecretKey { inner })
    }

    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let raw = hex::decode(s.trim_start_matches("0x"))?;
        Self::from_bytes(&raw)
    }

    /// Signs a 32 byte digest as is, without any prefixing.
    pub fn sign(&self, prehash: &H256) -> Result<Signature, Error> {
        let (sig, recovery_id) = self.inner.sign_prehash_recoverable(prehash.as_bytes())?;
        let mut bytes = [0_u8; SIG_LENGTH];
        bytes[..64].copy_from_slice(sig.to_bytes().as_slice());
        bytes[64] = recovery_id.to_byte() + RECOVERY_ID_OFFSET;
        Ok(Signature(bytes))
    }

    /// Signs `hash` under the personal message convention.
    pub fn sign_message_hash(&self, hash: &H256) -> Result<Signature, Error> {
        self.sign(&hash_personal_message(hash))
    }

    #[inline]
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        let mut secret_key = [0_u8; SECRET_KEY_LENGTH];
        secret_key.copy_from_slice(self.inner.to_bytes().as_slice());
        secret_key
    }

    pub fn public(&self) -> PublicKey {
        PublicKey {
            inner: *self.inner.verifying_key(),
        }
    }

    pub fn address(&self) -> H160 {
        self.public().address()
    }
}

#[derive(Eq, PartialEq, Clone, Debug)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let inner = VerifyingKey::from_sec1_bytes(bytes)?;
        Ok(Self { inner })
    }

    /// Uncompressed SEC1 encoding, `0x04 || x || y`.
    #[inline]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut pub_key = [0_u8; PUBLIC_KEY_LENGTH];
        pub_key.copy_from_slice(self.inner.to_encoded_point(false).as_bytes());
        pub_key
    }

    pub fn address(&self) -> H160 {
        let encoded = self.to_bytes();
        let hash = keccak256(&encoded[1..]);
        H160::from_slice(&hash.as_bytes()[12..])
    }
}

/// Recoverable signature laid out as `r || s || v`.
#[derive(Eq, PartialEq, Copy, Clone, Hash)]
pub struct Signature([u8; SIG_LENGTH]);

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature(0x{})", hex::encode(self.0))
    }
}

impl Signature {
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != SIG_LENGTH {
            return Err(Error::InvalidSignatureLength(bytes.len()));
        }
        let mut sig = [0_u8; SIG_LENGTH];
        sig.copy_from_slice(bytes);
        Ok(Self(sig))
    }

    #[inline]
    pub fn from_rsv<B: AsRef<[u8]>>(rsv: (B, B, u8)) -> Result<Self, Error> {
        if rsv.0.as_ref().len() != 32_usize || rsv.1.as_ref().len() != 32_usize {
            return Err(Error::RSVInvalid);
        }
        let mut bytes = [0_u8; SIG_LENGTH];
        bytes[..32].copy_from_slice(rsv.0.as_ref());
        bytes[32..64].copy_from_slice(rsv.1.as_ref());
        bytes[64] = rsv.2;
        Ok(Self(bytes))
    }

    #[inline]
    pub fn to_bytes(&self) -> [u8; SIG_LENGTH] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn rsv(&self) -> (H256, H256, u8) {
        (
            H256::from_slice(&self.0[..32]),
            H256::from_slice(&self.0[32..64]),
            self.0[64],
        )
    }

    fn recovery_id(&self) -> Result<RecoveryId, Error> {
        let v = self.0[64];
        let normalized = if v >= RECOVERY_ID_OFFSET {
            v - RECOVERY_ID_OFFSET
        } else {
            v
        };
        RecoveryId::from_byte(normalized).ok_or(Error::InvalidRecoveryId(v))
    }

    /// Recovers the key that signed the 32 byte digest `prehash`.
    pub fn recover_public_key(&self, prehash: &H256) -> Result<PublicKey, Error> {
        let sig = k256::ecdsa::Signature::from_slice(&self.0[..64])?;
        let inner = VerifyingKey::recover_from_prehash(prehash.as_bytes(), &sig, self.recovery_id()?)?;
        Ok(PublicKey { inner })
    }

    pub fn recover_address(&self, prehash: &H256) -> Result<H160, Error> {
        self.recover_public_key(prehash).map(|pk| pk.address())
    }

    /// Recovers the signer of `hash` under the personal message convention.
    pub fn recover_message_signer(&self, hash: &H256) -> Result<H160, Error> {
        self.recover_address(&hash_personal_message(hash))
    }
}

#[cfg(test)]
mod test {
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    use super::*;

    #[test]
    fn test_pair_derivation() {
        let mut csprng = ChaCha20Rng::seed_from_u64(7);
        let secret = SecretKey::generate(&mut csprng);
        let public = secret.public();

        let derived_pub = PublicKey::from_bytes(&public.to_bytes()).unwrap();
        let derived_secret = SecretKey::from_bytes(&secret.to_bytes()).unwrap();
        let derived_pub_2 = derived_secret.public();

        assert_eq!(public, derived_pub);
        assert_eq!(public, derived_pub_2);
        assert_eq!(secret, derived_secret);
    }

    #[test]
    fn test_signing_and_recovery() {
        let mut csprng = ChaCha20Rng::seed_from_u64(11);
        let keypair = Keypair::generate(&mut csprng);
        let digest = keccak256(b"Hello");
        let sig = keypair.secret.sign(&digest).unwrap();
        let derived_sig = Signature::from_bytes(&sig.to_bytes()).unwrap();
        assert_eq!(derived_sig.recover_public_key(&digest).unwrap(), keypair.public);
        let rsv_derived = Signature::from_rsv(sig.rsv()).unwrap();
        assert_eq!(rsv_derived.recover_address(&digest).unwrap(), keypair.address());
        let v = sig.to_bytes()[64];
        assert!(v == 27 || v == 28);
    }

    #[test]
    fn test_message_signer_differs_from_raw_signer() {
        let mut csprng = ChaCha20Rng::seed_from_u64(13);
        let keypair = Keypair::generate(&mut csprng);
        let hash = keccak256(b"tx");
        let sig = keypair.secret.sign_message_hash(&hash).unwrap();
        assert_eq!(sig.recover_message_signer(&hash).unwrap(), keypair.address());
        assert_ne!(sig.recover_address(&hash).ok(), Some(keypair.address()));
    }

    #[test]
    fn test_known_address() {
        // Well known development key, address 0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf
        let mut raw = [0_u8; 32];
        raw[31] = 1;
        let secret = SecretKey::from_bytes(&raw).unwrap();
        assert_eq!(
            hex::encode(secret.address()),
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(Signature::from_bytes(&[0_u8; 64]).is_err());
        let zero = Signature::from_bytes(&[0_u8; 65]).unwrap();
        assert!(zero.recover_address(&H256::zero()).is_err());
    }
}
