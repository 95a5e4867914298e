//! Splitting of the delegator's key into signed shares for the proxies.

use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use generic_array::sequence::Concat;
use generic_array::GenericArray;
use rand_core::{CryptoRng, RngCore};
use tracing::debug;
use typenum::{op, U32};

use crate::curve::{CurvePoint, CurveScalar, NonZeroCurveScalar};
use crate::hashing_ds::{hash_to_polynomial_arg, hash_to_shared_secret, kfrag_signature_digest};
use crate::keys::{PublicKey, SecretKey, Signature, Signer};
use crate::params::Parameters;
use crate::secret_box::SecretBox;
use crate::traits::{
    fmt_public, ConstructionError, DeserializableFromArray, HasTypeName, RepresentableAsArray,
    SerializableToArray,
};

type KeyFragIdSize = U32;

/// Random identifier of a key fragment, never all zeros.
/// Capsule fragments inherit it from the key fragment they were made with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyFragID(GenericArray<u8, KeyFragIdSize>);

impl KeyFragID {
    fn random(rng: &mut impl RngCore) -> Self {
        let mut bytes = GenericArray::<u8, KeyFragIdSize>::default();
        // An all-zero draw has probability 2^-256, but would not decode.
        while bytes.iter().all(|byte| *byte == 0) {
            rng.fill_bytes(&mut bytes);
        }
        Self(bytes)
    }
}

impl AsRef<[u8]> for KeyFragID {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl RepresentableAsArray for KeyFragID {
    type Size = KeyFragIdSize;
}

impl SerializableToArray for KeyFragID {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.0
    }
}

impl DeserializableFromArray for KeyFragID {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        if arr.iter().all(|byte| *byte == 0) {
            return Err(ConstructionError::new("KeyFragID", "Identifier is all zeros"));
        }
        Ok(Self(*arr))
    }
}

/// One share of a re-encryption key, as handed to a proxy.
///
/// Has to pass [`KeyFrag::verify`] before it can be used in
/// [`reencrypt`](`crate::reencrypt`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyFrag {
    pub(crate) id: KeyFragID,
    pub(crate) key: CurveScalar,
    pub(crate) precursor: CurvePoint,
    pub(crate) commitment: CurvePoint,
    pub(crate) signature: Signature,
}

type SignatureSize = <Signature as RepresentableAsArray>::Size;
type ScalarSize = <CurveScalar as RepresentableAsArray>::Size;
type PointSize = <CurvePoint as RepresentableAsArray>::Size;

impl RepresentableAsArray for KeyFrag {
    type Size = op!(KeyFragIdSize + ScalarSize + PointSize + PointSize + SignatureSize);
}

impl SerializableToArray for KeyFrag {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        let head = self.id.to_array().concat(self.key.to_array());
        let points = self.precursor.to_array().concat(self.commitment.to_array());
        head.concat(points).concat(self.signature.to_array())
    }
}

impl DeserializableFromArray for KeyFrag {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let (id, rest) = KeyFragID::take(*arr)?;
        let (key, rest) = CurveScalar::take(rest)?;
        let (precursor, rest) = CurvePoint::take(rest)?;
        let (commitment, rest) = CurvePoint::take(rest)?;
        Ok(Self {
            id,
            key,
            precursor,
            commitment,
            signature: Signature::take_last(rest)?,
        })
    }
}

#[cfg(feature = "serde")]
crate::serde::serde_via_array!(KeyFrag, Base64);

impl HasTypeName for KeyFrag {
    fn type_name() -> &'static str {
        "KeyFrag"
    }
}

impl fmt::Display for KeyFrag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_public(self, f)
    }
}

/// Errors returned by [`split_rekey`](`crate::split_rekey`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFragGenerationError {
    /// `threshold` is zero or larger than `shares`.
    InvalidThreshold {
        /// The requested threshold.
        threshold: usize,
        /// The requested number of fragments.
        shares: usize,
    },
}

impl fmt::Display for KeyFragGenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidThreshold { threshold, shares } => write!(
                f,
                "Threshold must be between 1 and {}, got {}",
                shares, threshold
            ),
        }
    }
}

/// Errors returned by [`KeyFrag::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFragVerificationError {
    /// The share does not open the commitment.
    IncorrectCommitment,
    /// The delegator's signature does not cover these fields and keys.
    IncorrectSignature,
}

impl fmt::Display for KeyFragVerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncorrectCommitment => write!(f, "Key fragment share does not match its commitment"),
            Self::IncorrectSignature => write!(f, "Key fragment signature is invalid"),
        }
    }
}

impl KeyFrag {
    /// The public commitment `share * U`.
    ///
    /// Publish it next to the fragment: the delegatee checks capsule fragments
    /// against it (see [`verify`](`crate::verify`)).
    pub fn commitment(&self) -> CurvePoint {
        self.commitment
    }

    /// Checks the share against its commitment and the delegator's signature
    /// over the public fields, for the given pair of keys.
    pub fn verify(
        self,
        delegating_pk: &PublicKey,
        receiving_pk: &PublicKey,
    ) -> Result<VerifiedKeyFrag, KeyFragVerificationError> {
        if self.commitment != &Parameters::global().u * &self.key {
            debug!("kfrag share does not open its commitment");
            return Err(KeyFragVerificationError::IncorrectCommitment);
        }

        let signed = kfrag_signature_digest(
            &self.id,
            delegating_pk,
            receiving_pk,
            &self.commitment,
            &self.precursor,
        );
        if !signed.verify(delegating_pk, &self.signature) {
            debug!("kfrag signature does not verify");
            return Err(KeyFragVerificationError::IncorrectSignature);
        }

        Ok(VerifiedKeyFrag { kfrag: self })
    }
}

/// A key fragment that passed [`KeyFrag::verify`],
/// or was produced by [`split_rekey`](`crate::split_rekey`) in this process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedKeyFrag {
    pub(crate) kfrag: KeyFrag,
}

impl VerifiedKeyFrag {
    /// See [`KeyFrag::commitment`].
    pub fn commitment(&self) -> CurvePoint {
        self.kfrag.commitment
    }

    /// Drops the verification mark, e.g. before sending the fragment to a proxy.
    pub fn unverify(self) -> KeyFrag {
        self.kfrag
    }
}

impl RepresentableAsArray for VerifiedKeyFrag {
    type Size = <KeyFrag as RepresentableAsArray>::Size;
}

impl SerializableToArray for VerifiedKeyFrag {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.kfrag.to_array()
    }
}

impl HasTypeName for VerifiedKeyFrag {
    fn type_name() -> &'static str {
        "VerifiedKeyFrag"
    }
}

impl fmt::Display for VerifiedKeyFrag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_public(self, f)
    }
}

/// Secret state of one `split_rekey` call, shared by all the fragments it issues.
pub(crate) struct KeyFragFactory {
    signer: Signer,
    delegating_pk: PublicKey,
    receiving_pk: PublicKey,
    precursor: CurvePoint,
    dh_point: SecretBox<CurvePoint>,
    // Coefficient `i` is at index `i`; the constant term is `sk_a / d`.
    polynomial: Box<[SecretBox<CurveScalar>]>,
}

impl KeyFragFactory {
    pub fn new(
        rng: &mut (impl CryptoRng + RngCore),
        delegating_sk: &SecretKey,
        receiving_pk: &PublicKey,
        threshold: usize,
    ) -> Self {
        let receiving_point = receiving_pk.to_point();

        // Ephemeral DH with the delegatee. Only the delegatee can recompute
        // `dh_point`, and with it `d` and the evaluation points.
        let precursor_sk = SecretBox::new(NonZeroCurveScalar::random(rng));
        let precursor = &CurvePoint::generator() * precursor_sk.as_secret();
        let dh_point = SecretBox::new(&receiving_point * precursor_sk.as_secret());
        let d = hash_to_shared_secret(&precursor, &receiving_point, dh_point.as_secret());

        let sk_a = SecretBox::new(CurveScalar::from(delegating_sk.to_secret_scalar().as_secret()));
        let polynomial: Vec<SecretBox<CurveScalar>> = core::iter::once(SecretBox::new(
            sk_a.as_secret() * &d.invert(),
        ))
        .chain((1..threshold).map(|_| SecretBox::new(NonZeroCurveScalar::random(rng).into())))
        .collect();

        Self {
            signer: Signer::new(delegating_sk),
            delegating_pk: delegating_sk.public_key(),
            receiving_pk: *receiving_pk,
            precursor,
            dh_point,
            polynomial: polynomial.into_boxed_slice(),
        }
    }

    fn make_kfrag(&self, rng: &mut (impl CryptoRng + RngCore), id: KeyFragID) -> KeyFrag {
        let x = hash_to_polynomial_arg(
            &self.precursor,
            &self.receiving_pk.to_point(),
            self.dh_point.as_secret(),
            &id,
        );
        let key = poly_eval(&self.polynomial, &x);
        let commitment = &Parameters::global().u * &key;

        let signature = kfrag_signature_digest(
            &id,
            &self.delegating_pk,
            &self.receiving_pk,
            &commitment,
            &self.precursor,
        )
        .sign_with_rng(rng, &self.signer);

        KeyFrag {
            id,
            key,
            precursor: self.precursor,
            commitment,
            signature,
        }
    }

    /// Issues `count` fragments with pairwise distinct identifiers.
    pub fn issue(
        &self,
        rng: &mut (impl CryptoRng + RngCore),
        count: usize,
    ) -> Box<[VerifiedKeyFrag]> {
        let mut used_ids = BTreeSet::new();
        let mut kfrags = Vec::with_capacity(count);
        while kfrags.len() < count {
            let id = KeyFragID::random(rng);
            if used_ids.insert(id) {
                kfrags.push(VerifiedKeyFrag {
                    kfrag: self.make_kfrag(rng, id),
                });
            }
        }
        kfrags.into_boxed_slice()
    }
}

/// `sum(coefficients[i] * x^i)`, keeping the partial sums in secret storage.
fn poly_eval(coefficients: &[SecretBox<CurveScalar>], x: &NonZeroCurveScalar) -> CurveScalar {
    let mut acc = SecretBox::new(CurveScalar::zero());
    for coefficient in coefficients.iter().rev() {
        let scaled = SecretBox::new(acc.as_secret() * x);
        *acc.as_mut_secret() = scaled.as_secret() + coefficient.as_secret();
    }
    *acc.as_secret()
}
