use core::fmt;

use generic_array::sequence::Concat;
use generic_array::GenericArray;
use rand_core::{CryptoRng, RngCore};
use tracing::debug;
use typenum::op;

use crate::capsule::Capsule;
use crate::curve::{CurvePoint, CurveScalar, NonZeroCurveScalar};
use crate::hashing_ds::{hash_metadata, hash_to_cfrag_verification, kfrag_signature_digest};
use crate::key_frag::{KeyFrag, KeyFragID, VerifiedKeyFrag};
use crate::keys::{PublicKey, Signature};
use crate::params::Parameters;
use crate::secret_box::SecretBox;
use crate::traits::{
    fmt_public, ConstructionError, DeserializableFromArray, HasTypeName, RepresentableAsArray,
    SerializableToArray,
};

/// Proof of knowledge of the share `rk` behind a capsule fragment:
/// `E1 = rk * E`, `V1 = rk * V` and `U1 = rk * U` for the same `rk`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CapsuleFragProof {
    point_e2: CurvePoint,
    point_v2: CurvePoint,
    // The commitment of the key fragment, signed by the delegator.
    point_u1: CurvePoint,
    point_u2: CurvePoint,
    response: CurveScalar,
    kfrag_signature: Signature,
    // Hashed, so that the proof has a fixed size. Zero if there is no metadata.
    metadata: CurveScalar,
}

type PointSize = <CurvePoint as RepresentableAsArray>::Size;
type ScalarSize = <CurveScalar as RepresentableAsArray>::Size;
type SignatureSize = <Signature as RepresentableAsArray>::Size;
type KeyFragIDSize = <KeyFragID as RepresentableAsArray>::Size;
type CapsuleFragProofSize =
    op!(PointSize + PointSize + PointSize + PointSize + ScalarSize + SignatureSize + ScalarSize);

impl RepresentableAsArray for CapsuleFragProof {
    type Size = CapsuleFragProofSize;
}

impl SerializableToArray for CapsuleFragProof {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        let points = self
            .point_e2
            .to_array()
            .concat(self.point_v2.to_array())
            .concat(self.point_u1.to_array())
            .concat(self.point_u2.to_array());
        points
            .concat(self.response.to_array())
            .concat(self.kfrag_signature.to_array())
            .concat(self.metadata.to_array())
    }
}

impl DeserializableFromArray for CapsuleFragProof {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let (point_e2, rest) = CurvePoint::take(*arr)?;
        let (point_v2, rest) = CurvePoint::take(rest)?;
        let (point_u1, rest) = CurvePoint::take(rest)?;
        let (point_u2, rest) = CurvePoint::take(rest)?;
        let (response, rest) = CurveScalar::take(rest)?;
        let (kfrag_signature, rest) = Signature::take(rest)?;
        Ok(Self {
            point_e2,
            point_v2,
            point_u1,
            point_u2,
            response,
            kfrag_signature,
            metadata: CurveScalar::take_last(rest)?,
        })
    }
}

impl CapsuleFragProof {
    fn new(
        rng: &mut (impl CryptoRng + RngCore),
        capsule: &Capsule,
        kfrag: &KeyFrag,
        point_e1: &CurvePoint,
        point_v1: &CurvePoint,
        metadata: CurveScalar,
    ) -> Self {
        let nonce = SecretBox::new(NonZeroCurveScalar::random(rng));

        let mut proof = Self {
            point_e2: &capsule.point_e * nonce.as_secret(),
            point_v2: &capsule.point_v * nonce.as_secret(),
            point_u1: kfrag.commitment,
            point_u2: &Parameters::global().u * nonce.as_secret(),
            response: CurveScalar::zero(),
            kfrag_signature: kfrag.signature.clone(),
            metadata,
        };

        let h = proof.challenge(capsule, point_e1, point_v1);
        proof.response = &(&kfrag.key * &h) + nonce.as_secret();
        proof
    }

    /// Fiat-Shamir challenge over the whole public transcript.
    fn challenge(
        &self,
        capsule: &Capsule,
        point_e1: &CurvePoint,
        point_v1: &CurvePoint,
    ) -> NonZeroCurveScalar {
        let transcript = [
            capsule.point_e,
            *point_e1,
            self.point_e2,
            capsule.point_v,
            *point_v1,
            self.point_v2,
            Parameters::global().u,
            self.point_u1,
            self.point_u2,
        ];
        hash_to_cfrag_verification(&transcript, &self.metadata)
    }

    /// `z*E == E2 + h*E1`, `z*V == V2 + h*V1` and `z*U == U2 + h*U1`.
    fn holds(&self, capsule: &Capsule, point_e1: &CurvePoint, point_v1: &CurvePoint) -> bool {
        let h = self.challenge(capsule, point_e1, point_v1);
        let z = &self.response;

        let e_ok = &capsule.point_e * z == &self.point_e2 + &(point_e1 * &h);
        let v_ok = &capsule.point_v * z == &self.point_v2 + &(point_v1 * &h);
        let u_ok = &Parameters::global().u * z == &self.point_u2 + &(&self.point_u1 * &h);

        e_ok & v_ok & u_ok
    }
}

/// A capsule reencrypted by a proxy with one [`KeyFrag`].
///
/// Has to pass [`CapsuleFrag::verify`] before it can be combined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapsuleFrag {
    pub(crate) point_e1: CurvePoint,
    pub(crate) point_v1: CurvePoint,
    pub(crate) kfrag_id: KeyFragID,
    pub(crate) precursor: CurvePoint,
    pub(crate) proof: CapsuleFragProof,
}

impl RepresentableAsArray for CapsuleFrag {
    type Size = op!(PointSize + PointSize + KeyFragIDSize + PointSize + CapsuleFragProofSize);
}

impl SerializableToArray for CapsuleFrag {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        let reencrypted = self.point_e1.to_array().concat(self.point_v1.to_array());
        let origin = self.kfrag_id.to_array().concat(self.precursor.to_array());
        reencrypted.concat(origin).concat(self.proof.to_array())
    }
}

impl DeserializableFromArray for CapsuleFrag {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let (point_e1, rest) = CurvePoint::take(*arr)?;
        let (point_v1, rest) = CurvePoint::take(rest)?;
        let (kfrag_id, rest) = KeyFragID::take(rest)?;
        let (precursor, rest) = CurvePoint::take(rest)?;
        Ok(Self {
            point_e1,
            point_v1,
            kfrag_id,
            precursor,
            proof: CapsuleFragProof::take_last(rest)?,
        })
    }
}

#[cfg(feature = "serde")]
crate::serde::serde_via_array!(CapsuleFrag, Base64);

impl HasTypeName for CapsuleFrag {
    fn type_name() -> &'static str {
        "CapsuleFrag"
    }
}

impl fmt::Display for CapsuleFrag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_public(self, f)
    }
}

/// Errors returned by [`CapsuleFrag::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapsuleFragVerificationError {
    /// The capsule does not pass its self-check.
    InvalidCapsule,
    /// The fragment was made with a key fragment other than the expected one.
    CommitmentMismatch,
    /// The delegator's signature over the key fragment's public fields is invalid.
    IncorrectKeyFragSignature,
    /// The correctness proof does not hold.
    IncorrectReencryption,
}

impl fmt::Display for CapsuleFragVerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::InvalidCapsule => "Capsule self-check failed",
            Self::CommitmentMismatch => "Capsule fragment was made with another key fragment",
            Self::IncorrectKeyFragSignature => "Key fragment signature is invalid",
            Self::IncorrectReencryption => "Reencryption proof does not hold",
        };
        f.write_str(message)
    }
}

impl CapsuleFrag {
    fn reencrypted(
        rng: &mut (impl CryptoRng + RngCore),
        capsule: &Capsule,
        kfrag: &KeyFrag,
        metadata: Option<&[u8]>,
    ) -> Self {
        let point_e1 = &capsule.point_e * &kfrag.key;
        let point_v1 = &capsule.point_v * &kfrag.key;
        let metadata = metadata.map_or_else(CurveScalar::zero, hash_metadata);
        let proof = CapsuleFragProof::new(rng, capsule, kfrag, &point_e1, &point_v1, metadata);

        Self {
            point_e1,
            point_v1,
            kfrag_id: kfrag.id,
            precursor: kfrag.precursor,
            proof,
        }
    }

    pub(crate) fn check(
        &self,
        capsule: &Capsule,
        delegating_pk: &PublicKey,
        receiving_pk: &PublicKey,
        kfrag_commitment: &CurvePoint,
    ) -> Result<(), CapsuleFragVerificationError> {
        if !capsule.verify() {
            debug!("capsule self-check failed on cfrag verification");
            return Err(CapsuleFragVerificationError::InvalidCapsule);
        }

        if &self.proof.point_u1 != kfrag_commitment {
            debug!("cfrag was made with an unexpected kfrag");
            return Err(CapsuleFragVerificationError::CommitmentMismatch);
        }

        let signed = kfrag_signature_digest(
            &self.kfrag_id,
            delegating_pk,
            receiving_pk,
            &self.proof.point_u1,
            &self.precursor,
        );
        if !signed.verify(delegating_pk, &self.proof.kfrag_signature) {
            debug!("kfrag signature inside the cfrag proof is invalid");
            return Err(CapsuleFragVerificationError::IncorrectKeyFragSignature);
        }

        if !self.proof.holds(capsule, &self.point_e1, &self.point_v1) {
            debug!("cfrag correctness proof does not hold");
            return Err(CapsuleFragVerificationError::IncorrectReencryption);
        }

        Ok(())
    }

    /// Checks that the fragment is a reencryption of `capsule` made with the key fragment
    /// whose commitment is `kfrag_commitment`, issued by `delegating_pk` for `receiving_pk`.
    ///
    /// Only verified fragments are accepted by
    /// [`decapsulate_reencrypted`](`crate::decapsulate_reencrypted`).
    pub fn verify(
        self,
        capsule: &Capsule,
        delegating_pk: &PublicKey,
        receiving_pk: &PublicKey,
        kfrag_commitment: &CurvePoint,
    ) -> Result<VerifiedCapsuleFrag, CapsuleFragVerificationError> {
        self.check(capsule, delegating_pk, receiving_pk, kfrag_commitment)?;
        Ok(VerifiedCapsuleFrag { cfrag: self })
    }
}

/// A capsule fragment that passed [`CapsuleFrag::verify`],
/// or was produced by [`reencrypt`](`crate::reencrypt`) in this process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedCapsuleFrag {
    pub(crate) cfrag: CapsuleFrag,
}

impl VerifiedCapsuleFrag {
    pub(crate) fn reencrypted(
        rng: &mut (impl CryptoRng + RngCore),
        capsule: &Capsule,
        kfrag: &VerifiedKeyFrag,
        metadata: Option<&[u8]>,
    ) -> Self {
        Self {
            cfrag: CapsuleFrag::reencrypted(rng, capsule, &kfrag.kfrag, metadata),
        }
    }

    /// Drops the verification mark, e.g. before sending the fragment to the delegatee.
    pub fn unverify(self) -> CapsuleFrag {
        self.cfrag
    }
}

impl RepresentableAsArray for VerifiedCapsuleFrag {
    type Size = <CapsuleFrag as RepresentableAsArray>::Size;
}

impl SerializableToArray for VerifiedCapsuleFrag {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.cfrag.to_array()
    }
}

impl HasTypeName for VerifiedCapsuleFrag {
    fn type_name() -> &'static str {
        "VerifiedCapsuleFrag"
    }
}

impl fmt::Display for VerifiedCapsuleFrag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_public(self, f)
    }
}
