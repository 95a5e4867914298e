//! `threshold-pre` is a threshold proxy re-encryption scheme over secp256k1.
//!
//! Using `threshold-pre`, a delegator (Alice) can let a delegatee (Bob) open
//! capsules made for her, through a re-encryption performed by a set of
//! semi-trusted proxies. Any `threshold` of `shares` proxies are enough;
//! the proxies never learn the symmetric key or either party's secret key,
//! and Alice does not need to be online during re-encryption.
//! Every capsule fragment carries a proof of correctness that anyone
//! can check with public data only, and only checked fragments
//! ([`VerifiedCapsuleFrag`]) can be combined.
//!
//! ## Available feature flags
//!
//! * `default-rng` - adds methods that use the system RNG (default).
//! * `serde` - implements `serde`-based serialization and deserialization.
//! * `std` - links the standard library.
//! * `parallel` - adds `rayon`-based batch re-encryption and verification.
//!
//! # Usage
//!
//! ```
//! use threshold_pre::*;
//!
//! // Key generation (on Alice's side). Alice's key pair also signs the key fragments.
//! let alice = generate_keypair();
//!
//! // Key generation (on Bob's side)
//! let bob = generate_keypair();
//!
//! // Anyone with Alice's public key can encapsulate a fresh symmetric key.
//! let (capsule, key) = encapsulate(&alice.public_key());
//!
//! // Alice can open the capsule with her secret key.
//! let key_alice = open(&capsule, alice.secret_key()).unwrap();
//! assert_eq!(key_alice, key);
//!
//! // When Alice wants to grant Bob access, she creates key fragments,
//! // which are then sent to `shares` proxies.
//! let shares = 3; // how many fragments to create
//! let threshold = 2; // how many should be enough to open the capsule
//! let kfrags = split_rekey(alice.secret_key(), &bob.public_key(), threshold, shares).unwrap();
//! let commitments: Vec<CurvePoint> = kfrags.iter().map(|kfrag| kfrag.commitment()).collect();
//!
//! // Each proxy checks the fragment it received and re-encrypts the capsule with it.
//! let cfrags: Vec<CapsuleFrag> = kfrags[..threshold]
//!     .iter()
//!     .map(|kfrag| {
//!         let received: KeyFrag = kfrag.clone().unverify();
//!         let kfrag = received.verify(&alice.public_key(), &bob.public_key()).unwrap();
//!         reencrypt(&capsule, &kfrag).unwrap().unverify()
//!     })
//!     .collect();
//!
//! // Bob checks the capsule fragments against the published fragment commitments...
//! assert!(verify(&cfrags[0], &capsule, &alice.public_key(), &bob.public_key(), &commitments[0]));
//! let verified: Vec<VerifiedCapsuleFrag> = cfrags
//!     .into_iter()
//!     .zip(commitments.iter())
//!     .map(|(cfrag, commitment)| {
//!         cfrag.verify(&capsule, &alice.public_key(), &bob.public_key(), commitment).unwrap()
//!     })
//!     .collect();
//!
//! // ...and combines them to recover the key.
//! let key_bob = decapsulate_reencrypted(
//!     bob.secret_key(), &alice.public_key(), &capsule, &verified, threshold).unwrap();
//! assert_eq!(key_bob, key);
//! ```

#![doc(html_root_url = "https://docs.rs/threshold-pre")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]
#![no_std]
// Allows us to mark items in the documentation as gated under specific features.
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

mod capsule;
mod capsule_frag;
mod curve;
mod dem;
mod hashing;
mod hashing_ds;
mod key_frag;
mod keys;
mod params;
mod pre;
mod secret_box;
mod traits;

#[cfg(feature = "serde")]
mod serde;

pub use capsule::{Capsule, OpenOriginalError, OpenReencryptedError, SymmetricKey};
pub use capsule_frag::{CapsuleFrag, CapsuleFragVerificationError, VerifiedCapsuleFrag};
pub use curve::CurvePoint;
pub use dem::{DecryptionError, EncryptionError};
pub use key_frag::{KeyFrag, KeyFragGenerationError, KeyFragVerificationError, VerifiedKeyFrag};
pub use keys::{KeyPair, PublicKey, SecretKey, Signature};
pub use params::Parameters;
pub use pre::{
    decapsulate_reencrypted, decrypt_original, decrypt_reencrypted, encapsulate_with_rng,
    encrypt_with_rng, generate_keypair_with_rng, open, reencrypt_with_rng, split_rekey_with_rng,
    verify, DecryptOriginalError, DecryptReencryptedError, ReencryptionError,
};
pub use secret_box::SecretBox;
pub use traits::{
    ConstructionError, DeserializableFromArray, DeserializationError, HasTypeName,
    RepresentableAsArray, SerializableToArray, SizeMismatchError,
};

#[cfg(feature = "default-rng")]
pub use pre::{encapsulate, encrypt, generate_keypair, reencrypt, split_rekey};

#[cfg(feature = "parallel")]
pub use pre::{reencrypt_all, verify_all};
