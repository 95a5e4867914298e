use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::curve::{CurvePoint, CurveScalar, NonZeroCurveScalar};
use crate::keys::{PublicKey, Signature, Signer};
use crate::traits::SerializableToArray;

/// A SHA-256 state prefixed with a length-tagged domain separation tag.
pub(crate) struct Hash(Sha256);

impl Hash {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn new_with_dst(dst: &[u8]) -> Self {
        Self::new().chain_bytes(&(dst.len() as u32).to_be_bytes()).chain_bytes(dst)
    }

    pub fn chain_bytes<T: AsRef<[u8]>>(self, bytes: T) -> Self {
        Self(self.0.chain_update(bytes.as_ref()))
    }

    pub fn digest(self) -> Sha256 {
        self.0
    }
}

pub(crate) struct ScalarDigest(Hash);

impl ScalarDigest {
    pub fn new_with_dst(dst: &[u8]) -> Self {
        Self(Hash::new_with_dst(dst))
    }

    pub fn chain_bytes<T: AsRef<[u8]>>(self, bytes: T) -> Self {
        Self(self.0.chain_bytes(bytes))
    }

    pub fn chain_scalar(self, scalar: &CurveScalar) -> Self {
        self.chain_bytes(scalar.to_array())
    }

    pub fn chain_point(self, point: &CurvePoint) -> Self {
        self.chain_bytes(point.to_array())
    }

    pub fn chain_points(self, points: &[CurvePoint]) -> Self {
        let mut digest = self;
        for point in points {
            digest = digest.chain_point(point);
        }
        digest
    }

    pub fn finalize(self) -> NonZeroCurveScalar {
        NonZeroCurveScalar::from_digest(self.0.digest())
    }
}

pub(crate) struct SignatureDigest(Hash);

impl SignatureDigest {
    pub fn new_with_dst(dst: &[u8]) -> Self {
        Self(Hash::new_with_dst(dst))
    }

    pub fn chain_bytes<T: AsRef<[u8]>>(self, bytes: T) -> Self {
        Self(self.0.chain_bytes(bytes))
    }

    pub fn chain_point(self, point: &CurvePoint) -> Self {
        self.chain_bytes(point.to_array())
    }

    pub fn chain_pubkey(self, pk: &PublicKey) -> Self {
        self.chain_bytes(pk.to_array())
    }

    pub fn sign_with_rng(self, rng: &mut (impl CryptoRng + RngCore), signer: &Signer) -> Signature {
        signer.sign_digest_with_rng(rng, self.0.digest())
    }

    pub fn verify(self, pk: &PublicKey, signature: &Signature) -> bool {
        pk.verify_digest(self.0.digest(), signature)
    }
}

#[cfg(test)]
mod tests {

    use rand_core::OsRng;

    use super::{Hash, ScalarDigest, SignatureDigest};
    use crate::curve::{CurvePoint, CurveScalar, NonZeroCurveScalar};
    use crate::keys::{SecretKey, Signer};

    #[test]
    fn test_dst_is_length_prefixed() {
        // "AB" || "C" and "A" || "BC" must not collide.
        let d1 = Hash::new_with_dst(b"AB").chain_bytes(b"C").digest();
        let d2 = Hash::new_with_dst(b"A").chain_bytes(b"BC").digest();
        assert_ne!(
            sha2::Digest::finalize(d1),
            sha2::Digest::finalize(d2)
        );
    }

    #[test]
    fn test_scalar_digest() {
        let g = CurvePoint::generator();
        let g2 = &g + &g;
        let scalar: CurveScalar = NonZeroCurveScalar::random(&mut OsRng).into();

        let digest = |dst: &[u8], points: &[CurvePoint]| {
            ScalarDigest::new_with_dst(dst)
                .chain_points(points)
                .chain_scalar(&scalar)
                .chain_bytes(b"payload")
                .finalize()
        };

        let reference = digest(b"DST", &[g, g2]);
        assert_eq!(reference, digest(b"DST", &[g, g2]));
        // Point order and tag both matter.
        assert_ne!(reference, digest(b"DST", &[g2, g]));
        assert_ne!(reference, digest(b"OTHER", &[g, g2]));
    }

    #[test]
    fn test_signature_digest() {
        let g = CurvePoint::generator();
        let bystander_pk = SecretKey::random_with_rng(&mut OsRng).public_key();

        let signing_sk = SecretKey::random_with_rng(&mut OsRng);
        let signer = Signer::new(&signing_sk);
        let signing_pk = signing_sk.public_key();

        let message = |point: &CurvePoint| {
            SignatureDigest::new_with_dst(b"DST")
                .chain_point(point)
                .chain_pubkey(&bystander_pk)
        };

        let point = &g + &g;
        let signature = message(&point).sign_with_rng(&mut OsRng, &signer);

        assert!(message(&point).verify(&signing_pk, &signature));
        assert!(!message(&point).verify(&bystander_pk, &signature));
        assert!(!message(&g).verify(&signing_pk, &signature));
    }
}
