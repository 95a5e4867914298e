//! `serde` support for the fixed-size types of the crate.
//!
//! Human-readable formats get a string (Base64, or Hex for public keys),
//! binary formats get the canonical bytes as they are.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{de, Deserializer, Serializer};

use crate::traits::{DeserializableFromArray, HasTypeName, SerializableToArray};

/// String encoding of the canonical bytes in human-readable formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Representation {
    Base64,
    Hex,
}

impl Representation {
    fn name(self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::Hex => "hex",
        }
    }

    pub(crate) fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Base64 => BASE64.encode(bytes),
            Self::Hex => hex::encode(bytes),
        }
    }

    fn decode<E: de::Error>(self, text: &str) -> Result<Vec<u8>, E> {
        match self {
            Self::Base64 => BASE64.decode(text).map_err(E::custom),
            Self::Hex => hex::decode(text).map_err(E::custom),
        }
    }
}

pub(crate) fn serde_serialize<T, S>(
    obj: &T,
    serializer: S,
    representation: Representation,
) -> Result<S::Ok, S::Error>
where
    T: SerializableToArray,
    S: Serializer,
{
    let bytes = obj.to_array();
    if serializer.is_human_readable() {
        serializer.serialize_str(&representation.encode(&bytes))
    } else {
        serializer.serialize_bytes(&bytes)
    }
}

/// Accepts either the string form or the raw bytes,
/// and checks the length and contents with [`DeserializableFromArray::from_bytes`].
struct ArrayVisitor<T> {
    representation: Representation,
    target: PhantomData<T>,
}

impl<'de, T> de::Visitor<'de> for ArrayVisitor<T>
where
    T: DeserializableFromArray + HasTypeName,
{
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes, raw or as a {} string",
            T::type_name(),
            self.representation.name()
        )
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let bytes = self.representation.decode::<E>(v)?;
        T::from_bytes(bytes).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        T::from_bytes(v).map_err(E::custom)
    }
}

pub(crate) fn serde_deserialize<'de, T, D>(
    deserializer: D,
    representation: Representation,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializableFromArray + HasTypeName,
{
    let visitor = ArrayVisitor {
        representation,
        target: PhantomData,
    };
    if deserializer.is_human_readable() {
        deserializer.deserialize_str(visitor)
    } else {
        deserializer.deserialize_bytes(visitor)
    }
}

/// Implements `Serialize` and `Deserialize` for a type through its canonical bytes.
macro_rules! serde_via_array {
    ($type:ty, $repr:ident) => {
        #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
        impl ::serde::Serialize for $type {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                $crate::serde::serde_serialize(
                    self,
                    serializer,
                    $crate::serde::Representation::$repr,
                )
            }
        }

        #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
        impl<'de> ::serde::Deserialize<'de> for $type {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                $crate::serde::serde_deserialize(deserializer, $crate::serde::Representation::$repr)
            }
        }
    };
}

pub(crate) use serde_via_array;

#[cfg(test)]
pub(crate) mod tests {

    use core::fmt;

    use serde::de::DeserializeOwned;
    use serde::Serialize;

    use super::{Representation, BASE64};
    use crate::traits::SerializableToArray;

    /// Checks that `obj` survives JSON and MessagePack, and that the encoded forms
    /// carry the canonical bytes (as a string in JSON, verbatim in MessagePack).
    pub(crate) fn assert_serde_roundtrip<T>(obj: &T, representation: Representation)
    where
        T: SerializableToArray + fmt::Debug + PartialEq + Serialize + DeserializeOwned,
    {
        let bytes = obj.to_array();

        let json = serde_json::to_string(obj).unwrap();
        assert_eq!(json, alloc::format!("\"{}\"", representation.encode(&bytes)));
        let from_json: T = serde_json::from_str(&json).unwrap();
        assert_eq!(&from_json, obj);

        let packed = rmp_serde::to_vec(obj).unwrap();
        assert!(packed
            .windows(bytes.len())
            .any(|window| window == bytes.as_slice()));
        let from_packed: T = rmp_serde::from_slice(&packed).unwrap();
        assert_eq!(&from_packed, obj);
    }

    #[test]
    fn test_keys_and_capsule() {
        use rand_core::OsRng;

        use crate::capsule::Capsule;
        use crate::keys::SecretKey;

        let pk = SecretKey::random_with_rng(&mut OsRng).public_key();
        assert_serde_roundtrip(&pk, Representation::Hex);

        let (capsule, _key) = Capsule::from_public_key(&mut OsRng, &pk);
        assert_serde_roundtrip(&capsule, Representation::Base64);
    }

    #[test]
    fn test_wrong_size_rejected() {
        use base64::Engine as _;

        use crate::capsule::Capsule;

        let json = serde_json::to_string(&BASE64.encode([1u8; 10])).unwrap();
        assert!(serde_json::from_str::<Capsule>(&json).is_err());

        let packed = rmp_serde::to_vec(&serde_bytes_of(&[1u8; 97])).unwrap();
        assert!(rmp_serde::from_slice::<Capsule>(&packed).is_err());
    }

    #[test]
    fn test_wrong_encoding_rejected() {
        use crate::keys::PublicKey;

        // Public keys are hex in text formats.
        let json = serde_json::to_string("not hex at all").unwrap();
        assert!(serde_json::from_str::<PublicKey>(&json).is_err());
    }

    // MessagePack `bin` wrapper for a plain slice.
    fn serde_bytes_of(bytes: &[u8]) -> impl Serialize + '_ {
        struct Bin<'a>(&'a [u8]);
        impl Serialize for Bin<'_> {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_bytes(self.0)
            }
        }
        Bin(bytes)
    }
}
