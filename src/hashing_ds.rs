//! This module contains hashing sequences with included domain separation tags
//! shared between different parts of the code.

use crate::curve::{CurvePoint, CurveScalar, NonZeroCurveScalar};
use crate::hashing::{ScalarDigest, SignatureDigest};
use crate::key_frag::KeyFragID;
use crate::keys::PublicKey;

pub(crate) fn hash_capsule_points(
    capsule_e: &CurvePoint,
    capsule_v: &CurvePoint,
) -> NonZeroCurveScalar {
    ScalarDigest::new_with_dst(b"CAPSULE_POINTS")
        .chain_point(capsule_e)
        .chain_point(capsule_v)
        .finalize()
}

pub(crate) fn hash_to_polynomial_arg(
    precursor: &CurvePoint,
    pubkey: &CurvePoint,
    dh_point: &CurvePoint,
    kfrag_id: &KeyFragID,
) -> NonZeroCurveScalar {
    ScalarDigest::new_with_dst(b"POLYNOMIAL_ARG")
        .chain_point(precursor)
        .chain_point(pubkey)
        .chain_point(dh_point)
        .chain_bytes(kfrag_id)
        .finalize()
}

pub(crate) fn hash_to_shared_secret(
    precursor: &CurvePoint,
    pubkey: &CurvePoint,
    dh_point: &CurvePoint,
) -> NonZeroCurveScalar {
    ScalarDigest::new_with_dst(b"SHARED_SECRET")
        .chain_point(precursor)
        .chain_point(pubkey)
        .chain_point(dh_point)
        .finalize()
}

/// Hashes the public transcript of a capsule fragment correctness proof
/// into the challenge scalar.
pub(crate) fn hash_to_cfrag_verification(
    points: &[CurvePoint],
    metadata: &CurveScalar,
) -> NonZeroCurveScalar {
    ScalarDigest::new_with_dst(b"CFRAG_VERIFICATION")
        .chain_points(points)
        .chain_scalar(metadata)
        .finalize()
}

pub(crate) fn hash_metadata(metadata: &[u8]) -> CurveScalar {
    ScalarDigest::new_with_dst(b"CFRAG_METADATA")
        .chain_bytes(metadata)
        .finalize()
        .into()
}

pub(crate) fn kfrag_signature_digest(
    kfrag_id: &KeyFragID,
    delegating_pk: &PublicKey,
    receiving_pk: &PublicKey,
    commitment: &CurvePoint,
    precursor: &CurvePoint,
) -> SignatureDigest {
    SignatureDigest::new_with_dst(b"KFRAG_SIGNATURE")
        .chain_bytes(kfrag_id)
        .chain_pubkey(delegating_pk)
        .chain_pubkey(receiving_pk)
        .chain_point(commitment)
        .chain_point(precursor)
}
