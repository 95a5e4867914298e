use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use generic_array::sequence::Concat;
use generic_array::GenericArray;
use hkdf::Hkdf;
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use typenum::{op, U32};

use crate::capsule_frag::{CapsuleFrag, VerifiedCapsuleFrag};
use crate::curve::{CurvePoint, CurveScalar, NonZeroCurveScalar};
use crate::hashing_ds::{hash_capsule_points, hash_to_polynomial_arg, hash_to_shared_secret};
use crate::keys::{PublicKey, SecretKey};
use crate::secret_box::SecretBox;
use crate::traits::{
    fmt_public, ConstructionError, DeserializableFromArray, HasTypeName, RepresentableAsArray,
    SerializableToArray,
};

type SymmetricKeySize = U32;

const KDF_INFO: &[u8] = b"SYMMETRIC_KEY";

/// A 32-byte symmetric key recovered from a [`Capsule`].
///
/// Zeroized on drop, compared in constant time.
#[derive(Clone)]
pub struct SymmetricKey(SecretBox<GenericArray<u8, SymmetricKeySize>>);

impl SymmetricKey {
    /// Derives the key from a shared point with HKDF-SHA256
    /// (no salt, the compressed point as the input keying material).
    fn from_shared_point(shared_point: &CurvePoint) -> Self {
        let ikm = SecretBox::new(shared_point.to_array());
        let hk = Hkdf::<Sha256>::new(None, ikm.as_secret());

        let mut okm = SecretBox::new(GenericArray::<u8, SymmetricKeySize>::default());

        // We can only get an error here if `SymmetricKeySize` is too large,
        // and it's known at compile-time.
        hk.expand(KDF_INFO, okm.as_mut_secret()).unwrap();

        Self(okm)
    }

    /// Returns the raw key bytes.
    pub fn as_secret(&self) -> &GenericArray<u8, SymmetricKeySize> {
        self.0.as_secret()
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.as_secret()
            .as_slice()
            .ct_eq(other.as_secret().as_slice())
            .into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey:...")
    }
}

/// Errors that can happen when opening a [`Capsule`] using the original secret key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOriginalError {
    /// The capsule does not pass its self-check.
    InvalidCapsule,
}

impl fmt::Display for OpenOriginalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCapsule => write!(f, "Capsule self-check failed"),
        }
    }
}

/// Errors that can happen when opening a [`Capsule`] using verified [`CapsuleFrag`] objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenReencryptedError {
    /// Fewer fragments with distinct identifiers than the threshold.
    InsufficientFragments {
        /// The threshold the fragments were created with.
        required: usize,
        /// The number of fragments with distinct identifiers.
        received: usize,
    },
    /// Capsule fragments are from different delegations.
    MismatchedFragments,
    /// Fragments are internally consistent, but do not combine into
    /// a key matching the capsule.
    CombinationFailed,
}

impl fmt::Display for OpenReencryptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientFragments { required, received } => write!(
                f,
                "Not enough capsule fragments: {} required, {} received",
                required, received
            ),
            Self::MismatchedFragments => write!(f, "Capsule fragments are mismatched"),
            Self::CombinationFailed => write!(f, "Failed to combine capsule fragments"),
        }
    }
}

/// Encapsulated symmetric key used to encrypt the plaintext.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capsule {
    pub(crate) point_e: CurvePoint,
    pub(crate) point_v: CurvePoint,
    pub(crate) signature: CurveScalar,
}

type PointSize = <CurvePoint as RepresentableAsArray>::Size;
type ScalarSize = <CurveScalar as RepresentableAsArray>::Size;

impl RepresentableAsArray for Capsule {
    type Size = op!(PointSize + PointSize + ScalarSize);
}

impl SerializableToArray for Capsule {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.point_e
            .to_array()
            .concat(self.point_v.to_array())
            .concat(self.signature.to_array())
    }
}

impl DeserializableFromArray for Capsule {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let (point_e, rest) = CurvePoint::take(*arr)?;
        let (point_v, rest) = CurvePoint::take(rest)?;
        let signature = CurveScalar::take_last(rest)?;
        Ok(Self {
            point_e,
            point_v,
            signature,
        })
    }
}

#[cfg(feature = "serde")]
crate::serde::serde_via_array!(Capsule, Base64);

impl HasTypeName for Capsule {
    fn type_name() -> &'static str {
        "Capsule"
    }
}

impl fmt::Display for Capsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_public(self, f)
    }
}

impl Capsule {
    /// Checks that `(E, V)` is bound by the capsule's proof of knowledge:
    /// `s * G == V + h * E`.
    pub fn verify(&self) -> bool {
        let g = CurvePoint::generator();
        let h = hash_capsule_points(&self.point_e, &self.point_v);
        &g * &self.signature == &self.point_v + &(&self.point_e * &h)
    }

    /// Generates a symmetric key and its associated KEM ciphertext.
    pub(crate) fn from_public_key(
        rng: &mut (impl CryptoRng + RngCore),
        delegating_pk: &PublicKey,
    ) -> (Capsule, SymmetricKey) {
        let g = CurvePoint::generator();

        let priv_r = SecretBox::new(NonZeroCurveScalar::random(rng));
        let pub_r = &g * priv_r.as_secret();

        let priv_u = SecretBox::new(NonZeroCurveScalar::random(rng));
        let pub_u = &g * priv_u.as_secret();

        let h = hash_capsule_points(&pub_r, &pub_u);

        let r_times_h = SecretBox::new(&CurveScalar::from(priv_r.as_secret()) * &h);
        let s = r_times_h.as_secret() + priv_u.as_secret();

        let exponent = SecretBox::new(priv_r.as_secret() + priv_u.as_secret());
        let shared_point = SecretBox::new(&delegating_pk.to_point() * exponent.as_secret());

        let capsule = Self {
            point_e: pub_r,
            point_v: pub_u,
            signature: s,
        };

        (capsule, SymmetricKey::from_shared_point(shared_point.as_secret()))
    }

    /// Derives the same symmetric key with the delegator's secret key.
    pub(crate) fn open_original(
        &self,
        delegating_sk: &SecretKey,
    ) -> Result<SymmetricKey, OpenOriginalError> {
        if !self.verify() {
            debug!("capsule self-check failed on direct opening");
            return Err(OpenOriginalError::InvalidCapsule);
        }

        let sum = &self.point_e + &self.point_v;
        let shared_point = SecretBox::new(&sum * delegating_sk.to_secret_scalar().as_secret());
        Ok(SymmetricKey::from_shared_point(shared_point.as_secret()))
    }

    /// Combines verified capsule fragments and derives the symmetric key
    /// with the delegatee's secret key.
    #[allow(clippy::many_single_char_names)]
    pub(crate) fn open_reencrypted(
        &self,
        receiving_sk: &SecretKey,
        delegating_pk: &PublicKey,
        cfrags: &[VerifiedCapsuleFrag],
        threshold: usize,
    ) -> Result<SymmetricKey, OpenReencryptedError> {
        // Duplicates do not contribute to the reconstruction.
        let mut seen_ids = BTreeSet::new();
        let distinct: Vec<&CapsuleFrag> = cfrags
            .iter()
            .map(|vcfrag| &vcfrag.cfrag)
            .filter(|cfrag| seen_ids.insert(cfrag.kfrag_id))
            .collect();

        let required = threshold.max(1);
        if distinct.len() < required {
            debug!(
                required,
                received = distinct.len(),
                "not enough distinct capsule fragments"
            );
            return Err(OpenReencryptedError::InsufficientFragments {
                required,
                received: distinct.len(),
            });
        }

        let precursor = distinct[0].precursor;
        if distinct.iter().any(|cfrag| cfrag.precursor != precursor) {
            debug!("capsule fragments carry different precursors");
            return Err(OpenReencryptedError::MismatchedFragments);
        }

        let pub_key = receiving_sk.public_key().to_point();
        let dh_point = SecretBox::new(&precursor * receiving_sk.to_secret_scalar().as_secret());

        // Combination of CFrags via Shamir's Secret Sharing reconstruction
        let lc: Vec<CurveScalar> = distinct
            .iter()
            .map(|cfrag| {
                hash_to_polynomial_arg(&precursor, &pub_key, dh_point.as_secret(), &cfrag.kfrag_id)
                    .into()
            })
            .collect();

        let mut e_prime = CurvePoint::identity();
        let mut v_prime = CurvePoint::identity();
        for (i, cfrag) in distinct.iter().enumerate() {
            let lambda_i = lambda_coeff(&lc, i).ok_or(OpenReencryptedError::CombinationFailed)?;
            e_prime = &e_prime + &(&cfrag.point_e1 * &lambda_i);
            v_prime = &v_prime + &(&cfrag.point_v1 * &lambda_i);
        }

        // Secret value 'd' allows to make the scheme non-interactive
        let d = hash_to_shared_secret(&precursor, &pub_key, dh_point.as_secret());

        let s = self.signature;
        let h = hash_capsule_points(&self.point_e, &self.point_v);

        let orig_pub_key = delegating_pk.to_point();

        if &orig_pub_key * &(&s * &d.invert()) != &(&e_prime * &h) + &v_prime {
            debug!("combined capsule fragments do not match the capsule");
            return Err(OpenReencryptedError::CombinationFailed);
        }

        let shared_point = SecretBox::new(&(&e_prime + &v_prime) * &d);
        Ok(SymmetricKey::from_shared_point(shared_point.as_secret()))
    }
}

/// Lagrange coefficient at zero for the `i`-th of the evaluation points `xs`.
fn lambda_coeff(xs: &[CurveScalar], i: usize) -> Option<CurveScalar> {
    let mut res = CurveScalar::one();
    for j in 0..xs.len() {
        if j != i {
            let inv_diff = Option::<CurveScalar>::from((&xs[j] - &xs[i]).invert())?;
            res = &(&res * &xs[j]) * &inv_diff;
        }
    }
    Some(res)
}
