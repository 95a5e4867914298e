use core::fmt;

use generic_array::GenericArray;
use k256::ecdsa::signature::{DigestVerifier, RandomizedDigestSigner};
use k256::ecdsa::{Signature as BackendSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::{PublicKey as BackendPublicKey, SecretKey as BackendSecretKey};
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;
use typenum::U64;

#[cfg(feature = "default-rng")]
use rand_core::OsRng;

use crate::curve::{CurvePoint, CurveType, NonZeroCurveScalar, ScalarSize};
use crate::secret_box::SecretBox;
use crate::traits::{
    fmt_public, ConstructionError, DeserializableFromArray, HasTypeName, RepresentableAsArray,
    SerializableToArray,
};

/// ECDSA signature object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(BackendSignature);

impl RepresentableAsArray for Signature {
    type Size = U64;
}

impl SerializableToArray for Signature {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        *GenericArray::<u8, Self::Size>::from_slice(self.0.to_bytes().as_slice())
    }
}

impl DeserializableFromArray for Signature {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        // Note that it will not normalize `s` automatically,
        // and if it is not normalized, verification will fail.
        BackendSignature::from_slice(arr.as_slice())
            .map(Self)
            .map_err(|_| ConstructionError::new("Signature", "Internal backend error"))
    }
}

#[cfg(feature = "serde")]
crate::serde::serde_via_array!(Signature, Base64);

impl HasTypeName for Signature {
    fn type_name() -> &'static str {
        "Signature"
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_public(self, f)
    }
}

/// A secret key.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(BackendSecretKey<CurveType>);

impl SecretKey {
    /// Generates a secret key using the given RNG and returns it.
    pub fn random_with_rng(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        Self(BackendSecretKey::<CurveType>::random(rng))
    }

    /// Generates a secret key using the default RNG and returns it.
    #[cfg(feature = "default-rng")]
    #[cfg_attr(docsrs, doc(cfg(feature = "default-rng")))]
    pub fn random() -> Self {
        Self::random_with_rng(&mut OsRng)
    }

    /// Returns a public key corresponding to this secret key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    /// Returns the underlying scalar of the secret key.
    pub(crate) fn to_secret_scalar(&self) -> SecretBox<NonZeroCurveScalar> {
        SecretBox::new(NonZeroCurveScalar::from_backend_scalar(
            self.0.to_nonzero_scalar(),
        ))
    }

    /// Serializes the secret key as a big-endian scalar.
    /// The result is wrapped in a [`SecretBox`] and zeroized on drop.
    pub fn to_be_bytes(&self) -> SecretBox<GenericArray<u8, ScalarSize>> {
        SecretBox::new(self.0.to_bytes())
    }
}

impl RepresentableAsArray for SecretKey {
    type Size = ScalarSize;
}

impl DeserializableFromArray for SecretKey {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        BackendSecretKey::<CurveType>::from_bytes(arr)
            .map(Self)
            .map_err(|_| ConstructionError::new("SecretKey", "Zero or out of range scalar"))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey:...")
    }
}

/// Signs digests with ECDSA on behalf of the delegating party.
#[derive(Clone)]
pub(crate) struct Signer(SigningKey);

impl Signer {
    pub fn new(secret_key: &SecretKey) -> Self {
        Self(SigningKey::from(&secret_key.0))
    }

    pub fn sign_digest_with_rng(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        digest: Sha256,
    ) -> Signature {
        let signature: BackendSignature = self.0.sign_digest_with_rng(rng, digest);
        Signature(signature)
    }
}

/// A public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(BackendPublicKey<CurveType>);

impl PublicKey {
    /// Returns the underlying curve point of the public key.
    pub(crate) fn to_point(self) -> CurvePoint {
        CurvePoint::from_backend_point(&self.0.to_projective())
    }

    pub(crate) fn verify_digest(&self, digest: Sha256, signature: &Signature) -> bool {
        let verifier = VerifyingKey::from(&self.0);
        verifier.verify_digest(digest, &signature.0).is_ok()
    }
}

impl RepresentableAsArray for PublicKey {
    type Size = <CurvePoint as RepresentableAsArray>::Size;
}

impl SerializableToArray for PublicKey {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.to_point().to_array()
    }
}

impl DeserializableFromArray for PublicKey {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let cp = CurvePoint::from_array(arr)?;
        let backend_pk = BackendPublicKey::<CurveType>::from_affine(cp.to_affine())
            .map_err(|_| ConstructionError::new("PublicKey", "Internal backend error"))?;
        Ok(Self(backend_pk))
    }
}

#[cfg(feature = "serde")]
crate::serde::serde_via_array!(PublicKey, Hex);

impl HasTypeName for PublicKey {
    fn type_name() -> &'static str {
        "PublicKey"
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_public(self, f)
    }
}

/// A secret key together with its public key.
///
/// The same pair is used to decrypt, to delegate, and to sign key fragments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new key pair using the given RNG.
    pub fn random_with_rng(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        Self::from_secret_key(SecretKey::random_with_rng(rng))
    }

    /// Completes a secret key with its public counterpart.
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key();
        Self {
            secret_key,
            public_key,
        }
    }

    /// Returns the secret half of the pair.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Returns the public half of the pair.
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }
}
