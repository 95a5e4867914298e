//! Scalar and point newtypes over the `k256` backend.
//! All the backend-specific arithmetic and encodings live here.

use core::ops::{Add, Mul, Sub};

use generic_array::GenericArray;
use k256::elliptic_curve::bigint::U256;
use k256::elliptic_curve::ff::PrimeField;
use k256::elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest};
use k256::elliptic_curve::ops::{Invert, Reduce};
use k256::elliptic_curve::sec1::{
    CompressedPointSize, EncodedPoint, FromEncodedPoint, Tag, ToEncodedPoint,
};
use k256::elliptic_curve::{FieldBytesSize, NonZeroScalar, ProjectivePoint, Scalar};
use k256::Secp256k1;
use rand_core::{CryptoRng, RngCore};
use sha2::digest::FixedOutput;
use sha2::Sha256;
use subtle::CtOption;
use zeroize::{DefaultIsZeroes, Zeroize};

use crate::traits::{
    ConstructionError, DeserializableFromArray, RepresentableAsArray, SerializableToArray,
};

pub(crate) type CurveType = Secp256k1;

type BackendScalar = Scalar<CurveType>;
type BackendNonZeroScalar = NonZeroScalar<CurveType>;
type BackendPoint = ProjectivePoint<CurveType>;

pub(crate) type ScalarSize = FieldBytesSize<CurveType>;
pub(crate) type PointSize = CompressedPointSize<CurveType>;

// Newtypes, so that the array traits and the mixed-operand arithmetic
// can be implemented for the backend types.

/// A scalar of the secp256k1 group (a number modulo the group order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CurveScalar(BackendScalar);

impl CurveScalar {
    pub(crate) fn invert(&self) -> CtOption<Self> {
        self.0.invert().map(Self)
    }

    pub(crate) fn one() -> Self {
        Self(BackendScalar::ONE)
    }

    pub(crate) fn zero() -> Self {
        Self(BackendScalar::ZERO)
    }
}

impl DefaultIsZeroes for CurveScalar {}

impl RepresentableAsArray for CurveScalar {
    type Size = ScalarSize;
}

impl SerializableToArray for CurveScalar {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.0.to_repr()
    }
}

impl DeserializableFromArray for CurveScalar {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        Option::<BackendScalar>::from(BackendScalar::from_repr(*arr))
            .map(Self)
            .ok_or_else(|| ConstructionError::new("CurveScalar", "Internal backend error"))
    }
}

/// A non-zero scalar. Guaranteed to be invertible.
#[derive(Clone, Copy)]
pub struct NonZeroCurveScalar(BackendNonZeroScalar);

impl core::fmt::Debug for NonZeroCurveScalar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("NonZeroCurveScalar").field(&*self.0).finish()
    }
}

impl PartialEq for NonZeroCurveScalar {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Eq for NonZeroCurveScalar {}

impl NonZeroCurveScalar {
    /// Generates a random non-zero scalar (in nearly constant-time).
    pub(crate) fn random(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        Self(BackendNonZeroScalar::random(rng))
    }

    pub(crate) fn from_backend_scalar(source: BackendNonZeroScalar) -> Self {
        Self(source)
    }

    pub(crate) fn invert(&self) -> Self {
        Self(Invert::invert(&self.0))
    }

    /// Reduces a 32-byte digest output to a non-zero scalar.
    pub(crate) fn from_digest(d: impl FixedOutput<OutputSize = ScalarSize>) -> Self {
        let bytes = d.finalize_fixed();
        Self(<BackendNonZeroScalar as Reduce<U256>>::reduce_bytes(&bytes))
    }
}

impl From<NonZeroCurveScalar> for CurveScalar {
    fn from(source: NonZeroCurveScalar) -> Self {
        CurveScalar(*source.0)
    }
}

impl From<&NonZeroCurveScalar> for CurveScalar {
    fn from(source: &NonZeroCurveScalar) -> Self {
        CurveScalar(*source.0)
    }
}

impl Zeroize for NonZeroCurveScalar {
    fn zeroize(&mut self) {
        // The backend resets the value to one, since zero is not representable.
        self.0.zeroize()
    }
}

impl RepresentableAsArray for NonZeroCurveScalar {
    type Size = ScalarSize;
}

impl SerializableToArray for NonZeroCurveScalar {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        self.0.to_repr()
    }
}

impl DeserializableFromArray for NonZeroCurveScalar {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        Option::<BackendNonZeroScalar>::from(BackendNonZeroScalar::from_repr(*arr))
            .map(Self)
            .ok_or_else(|| {
                ConstructionError::new("NonZeroCurveScalar", "Zero or out of range scalar")
            })
    }
}

/// A point of the secp256k1 group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CurvePoint(BackendPoint);

impl DefaultIsZeroes for CurvePoint {}

impl CurvePoint {
    pub(crate) fn from_backend_point(point: &BackendPoint) -> Self {
        Self(*point)
    }

    pub(crate) fn generator() -> Self {
        Self(BackendPoint::GENERATOR)
    }

    pub(crate) fn identity() -> Self {
        Self(BackendPoint::IDENTITY)
    }

    pub(crate) fn to_affine(self) -> k256::AffinePoint {
        self.0.to_affine()
    }

    /// Hashes arbitrary data with the given domain separation tag
    /// into a valid EC point of the specified curve, using the algorithm described in the
    /// [IETF hash-to-curve standard](https://datatracker.ietf.org/doc/draft-irtf-cfrg-hash-to-curve/)
    pub(crate) fn from_data(dst: &[u8], data: &[u8]) -> Option<Self> {
        CurveType::hash_from_bytes::<ExpandMsgXmd<Sha256>>(&[data], &[dst])
            .ok()
            .map(Self)
    }
}

impl Add<&CurveScalar> for &CurveScalar {
    type Output = CurveScalar;

    fn add(self, other: &CurveScalar) -> CurveScalar {
        CurveScalar(self.0 + other.0)
    }
}

impl Add<&NonZeroCurveScalar> for &CurveScalar {
    type Output = CurveScalar;

    fn add(self, other: &NonZeroCurveScalar) -> CurveScalar {
        CurveScalar(self.0 + *other.0)
    }
}

impl Add<&NonZeroCurveScalar> for &NonZeroCurveScalar {
    type Output = CurveScalar;

    fn add(self, other: &NonZeroCurveScalar) -> CurveScalar {
        CurveScalar(*self.0 + *other.0)
    }
}

impl Add<&CurvePoint> for &CurvePoint {
    type Output = CurvePoint;

    fn add(self, other: &CurvePoint) -> CurvePoint {
        CurvePoint(self.0 + other.0)
    }
}

impl Sub<&CurveScalar> for &CurveScalar {
    type Output = CurveScalar;

    fn sub(self, other: &CurveScalar) -> CurveScalar {
        CurveScalar(self.0 - other.0)
    }
}

impl Mul<&CurveScalar> for &CurvePoint {
    type Output = CurvePoint;

    fn mul(self, other: &CurveScalar) -> CurvePoint {
        CurvePoint(self.0 * other.0)
    }
}

impl Mul<&NonZeroCurveScalar> for &CurvePoint {
    type Output = CurvePoint;

    fn mul(self, other: &NonZeroCurveScalar) -> CurvePoint {
        CurvePoint(self.0 * *other.0)
    }
}

impl Mul<&CurveScalar> for &CurveScalar {
    type Output = CurveScalar;

    fn mul(self, other: &CurveScalar) -> CurveScalar {
        CurveScalar(self.0 * other.0)
    }
}

impl Mul<&NonZeroCurveScalar> for &CurveScalar {
    type Output = CurveScalar;

    fn mul(self, other: &NonZeroCurveScalar) -> CurveScalar {
        CurveScalar(self.0 * *other.0)
    }
}

impl RepresentableAsArray for CurvePoint {
    type Size = PointSize;
}

impl SerializableToArray for CurvePoint {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        // The identity has a one-byte SEC1 encoding.
        // It is represented by zeros here and is rejected on deserialization.
        let encoded = self.0.to_affine().to_encoded_point(true);
        let mut arr = GenericArray::<u8, Self::Size>::default();
        let bytes = encoded.as_bytes();
        if bytes.len() == arr.len() {
            arr.copy_from_slice(bytes);
        }
        arr
    }
}

impl DeserializableFromArray for CurvePoint {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let ep = EncodedPoint::<CurveType>::from_bytes(arr.as_slice())
            .map_err(|_| ConstructionError::new("CurvePoint", "Invalid SEC1 encoding"))?;
        // Only the compressed form is canonical; the compact form (`0x05`)
        // would otherwise decode to the same point.
        if !matches!(ep.tag(), Tag::CompressedEvenY | Tag::CompressedOddY) {
            return Err(ConstructionError::new(
                "CurvePoint",
                "Expected a compressed SEC1 encoding",
            ));
        }
        let cp_opt: Option<BackendPoint> = BackendPoint::from_encoded_point(&ep).into();
        cp_opt
            .map(Self)
            .ok_or_else(|| ConstructionError::new("CurvePoint", "Not a point on the curve"))
    }
}

#[cfg(test)]
mod tests {

    use rand_core::OsRng;

    use super::{CurvePoint, CurveScalar, NonZeroCurveScalar};
    use crate::traits::{DeserializableFromArray, SerializableToArray};

    #[test]
    fn test_scalar_arithmetic() {
        let a = NonZeroCurveScalar::random(&mut OsRng);
        let b = NonZeroCurveScalar::random(&mut OsRng);
        let a_s: CurveScalar = a.into();
        let b_s: CurveScalar = b.into();

        assert_eq!(&(&a_s + &b_s) - &b_s, a_s);
        assert_eq!(&a_s * &a.invert(), CurveScalar::one());
        assert_eq!(&a_s * &b, &a_s * &b_s);
        assert_eq!(&a_s - &a_s, CurveScalar::zero());
    }

    #[test]
    fn test_point_arithmetic() {
        let g = CurvePoint::generator();
        let a = NonZeroCurveScalar::random(&mut OsRng);
        let b = NonZeroCurveScalar::random(&mut OsRng);
        let ab = &a + &b;

        assert_eq!(&(&g * &a) + &(&g * &b), &g * &ab);
        assert_eq!(&g * &CurveScalar::zero(), CurvePoint::identity());
        assert_eq!(&CurvePoint::identity() + &g, g);
    }

    #[test]
    fn test_serialize_point() {
        let p = &CurvePoint::generator() * &NonZeroCurveScalar::random(&mut OsRng);
        let arr = p.to_array();
        assert_eq!(arr.len(), 33);
        assert_eq!(CurvePoint::from_array(&arr).unwrap(), p);
    }

    #[test]
    fn test_identity_does_not_deserialize() {
        let arr = CurvePoint::identity().to_array();
        assert!(arr.iter().all(|byte| *byte == 0));
        assert!(CurvePoint::from_array(&arr).is_err());
    }

    #[test]
    fn test_reject_malformed_point() {
        let mut arr = CurvePoint::generator().to_array();
        arr[0] = 0x05;
        assert!(CurvePoint::from_array(&arr).is_err());
    }

    #[test]
    fn test_only_compressed_tags_decode() {
        let p = &CurvePoint::generator() * &NonZeroCurveScalar::random(&mut OsRng);
        let arr = p.to_array();
        let mut accepted = 0;
        for tag in 0u8..=255 {
            let mut tagged = arr;
            tagged[0] = tag;
            if let Ok(decoded) = CurvePoint::from_array(&tagged) {
                assert!(tag == 0x02 || tag == 0x03, "tag {:#04x} accepted", tag);
                // The other parity is the negated point.
                assert_eq!(decoded.to_array(), tagged);
                accepted += 1;
            }
        }
        assert_eq!(accepted, 2);
    }

    #[test]
    fn test_reject_out_of_range_scalar() {
        // All-ones exceeds the group order.
        let bytes = [0xffu8; 32];
        assert!(CurveScalar::from_bytes(bytes).is_err());
        assert!(NonZeroCurveScalar::from_bytes([0u8; 32]).is_err());
        assert!(CurveScalar::from_bytes([0u8; 32]).is_ok());
    }

    #[test]
    fn test_from_data() {
        let p = CurvePoint::from_data(b"DST", b"abcdefg").unwrap();
        let p_same = CurvePoint::from_data(b"DST", b"abcdefg").unwrap();
        assert_eq!(p, p_same);

        let p_data2 = CurvePoint::from_data(b"DST", b"abcdefgh").unwrap();
        assert_ne!(p, p_data2);

        let p_dst2 = CurvePoint::from_data(b"DST2", b"abcdefg").unwrap();
        assert_ne!(p, p_dst2);
    }
}
