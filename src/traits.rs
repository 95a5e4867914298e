use alloc::string::String;
use core::fmt;
use core::ops::Sub;

use generic_array::sequence::Split;
use generic_array::{ArrayLength, GenericArray};
use typenum::{Diff, Unsigned, U1};

/// Errors that can happen during object construction from a fixed-size array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructionError {
    /// The name of the type that was being constructed.
    type_name: String,
    /// The reason for the construction failure.
    message: String,
}

impl ConstructionError {
    /// Creates a new construction error.
    pub fn new(type_name: &str, message: &str) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to construct a {} object: {}",
            self.type_name, self.message
        )
    }
}

/// The provided bytestring is of an incorrect size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeMismatchError {
    pub(crate) received_size: usize,
    pub(crate) expected_size: usize,
}

impl SizeMismatchError {
    /// Creates a new size mismatch error.
    pub fn new(received_size: usize, expected_size: usize) -> Self {
        Self {
            received_size,
            expected_size,
        }
    }
}

impl fmt::Display for SizeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bytestring size mismatch: expected {} bytes, got {}",
            self.expected_size, self.received_size
        )
    }
}

/// Errors that can happen during object deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeserializationError {
    /// Failed to construct the object from a given bytestring (with the correct length).
    ConstructionFailure(ConstructionError),
    /// The given bytestring is too short or too long.
    SizeMismatch(SizeMismatchError),
}

impl fmt::Display for DeserializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstructionFailure(err) => write!(f, "{}", err),
            Self::SizeMismatch(err) => write!(f, "{}", err),
        }
    }
}

/// A trait denoting that the object can be represented as an array of bytes
/// with size known at compile time.
pub trait RepresentableAsArray: Sized {
    /// Resulting array length.
    type Size: ArrayLength<u8>;

    /// Resulting array length exposed as a runtime method.
    fn serialized_size() -> usize {
        Self::Size::to_usize()
    }
}

/// A trait denoting that the object can be serialized to an array of bytes
/// with size known at compile time.
pub trait SerializableToArray: RepresentableAsArray {
    /// Produces a byte array with the object's contents.
    fn to_array(&self) -> GenericArray<u8, Self::Size>;
}

/// A trait denoting that the object can be deserialized from an array of bytes
/// with size known at compile time.
pub trait DeserializableFromArray: RepresentableAsArray {
    /// Attempts to produce the object back from the serialized form.
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError>;

    /// Attempts to produce the object back from a dynamically sized byte array,
    /// checking that its length is correct.
    fn from_bytes(data: impl AsRef<[u8]>) -> Result<Self, DeserializationError> {
        let data_slice = data.as_ref();
        let received_size = data_slice.len();
        let expected_size = Self::serialized_size();
        if received_size != expected_size {
            return Err(DeserializationError::SizeMismatch(SizeMismatchError::new(
                received_size,
                expected_size,
            )));
        }
        Self::from_array(GenericArray::<u8, Self::Size>::from_slice(data_slice))
            .map_err(DeserializationError::ConstructionFailure)
    }

    /// Used to implement [`from_array()`](`Self::from_array()`) for structs whose fields
    /// implement [`SerializableToArray`].
    ///
    /// Attempts to split off enough bytes from `arr` to create an object,
    /// returning it together with the remaining bytes.
    #[allow(clippy::type_complexity)]
    fn take<U>(
        arr: GenericArray<u8, U>,
    ) -> Result<(Self, GenericArray<u8, Diff<U, Self::Size>>), ConstructionError>
    where
        U: ArrayLength<u8> + Sub<Self::Size>,
        Diff<U, Self::Size>: ArrayLength<u8>,
    {
        let (res_bytes, rest): (GenericArray<u8, Self::Size>, GenericArray<u8, _>) = arr.split();
        let res = Self::from_array(&res_bytes)?;
        Ok((res, rest))
    }

    /// A version of [`take()`](`Self::take()`) for the last field of a struct,
    /// where all the remaining bytes belong to it.
    fn take_last(arr: GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        Self::from_array(&arr)
    }
}

impl RepresentableAsArray for bool {
    type Size = U1;
}

impl SerializableToArray for bool {
    fn to_array(&self) -> GenericArray<u8, Self::Size> {
        GenericArray::<u8, Self::Size>::from([*self as u8])
    }
}

impl DeserializableFromArray for bool {
    fn from_array(arr: &GenericArray<u8, Self::Size>) -> Result<Self, ConstructionError> {
        let bytes_slice = arr.as_slice();
        match bytes_slice[0] {
            0u8 => Ok(false),
            1u8 => Ok(true),
            _ => Err(ConstructionError::new(
                "bool",
                "Expected 0x0 or 0x1 as the only byte",
            )),
        }
    }
}

/// A name used in human-readable representations of an object.
pub trait HasTypeName {
    /// Returns the type name.
    fn type_name() -> &'static str;
}

/// Writes a short, non-secret summary of an object: its type name
/// and the beginning of its serialized representation.
pub(crate) fn fmt_public<T>(obj: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result
where
    T: SerializableToArray + HasTypeName,
{
    let bytes = obj.to_array();
    let to_show = &bytes.as_slice()[..8usize.min(bytes.len())];
    write!(f, "{}:{}", T::type_name(), hex::encode(to_show))
}
