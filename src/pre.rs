//! The high-level functional reencryption API.

use alloc::boxed::Box;
use core::fmt;

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, instrument};

#[cfg(feature = "default-rng")]
use rand_core::OsRng;

#[cfg(feature = "parallel")]
use alloc::vec::Vec;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::capsule::{Capsule, OpenOriginalError, OpenReencryptedError, SymmetricKey};
#[cfg(feature = "parallel")]
use crate::capsule_frag::CapsuleFragVerificationError;
use crate::capsule_frag::{CapsuleFrag, VerifiedCapsuleFrag};
use crate::curve::CurvePoint;
use crate::dem::{DecryptionError, EncryptionError, DEM};
use crate::key_frag::{KeyFragFactory, KeyFragGenerationError, VerifiedKeyFrag};
use crate::keys::{KeyPair, PublicKey, SecretKey};
use crate::traits::SerializableToArray;

/// Errors that can happen during reencryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReencryptionError {
    /// The capsule does not pass its self-check.
    InvalidCapsule,
}

impl fmt::Display for ReencryptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCapsule => write!(f, "Capsule self-check failed"),
        }
    }
}

/// Errors that can happen when decrypting a ciphertext with the original secret key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOriginalError {
    /// An error when opening a capsule. See [`OpenOriginalError`] for the options.
    OnOpen(OpenOriginalError),
    /// An error when decrypting the ciphertext. See [`DecryptionError`] for the options.
    OnDecryption(DecryptionError),
}

impl fmt::Display for DecryptOriginalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnOpen(err) => write!(f, "Failed to open the capsule: {}", err),
            Self::OnDecryption(err) => write!(f, "Decryption error: {}", err),
        }
    }
}

/// Errors that can happen when decrypting a reencrypted ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptReencryptedError {
    /// An error when opening a capsule. See [`OpenReencryptedError`] for the options.
    OnOpen(OpenReencryptedError),
    /// An error when decrypting the ciphertext. See [`DecryptionError`] for the options.
    OnDecryption(DecryptionError),
}

impl fmt::Display for DecryptReencryptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnOpen(err) => write!(f, "Failed to open the capsule: {}", err),
            Self::OnDecryption(err) => write!(f, "Decryption error: {}", err),
        }
    }
}

/// Generates a new key pair using the given RNG.
pub fn generate_keypair_with_rng(rng: &mut (impl CryptoRng + RngCore)) -> KeyPair {
    KeyPair::random_with_rng(rng)
}

/// Generates a new key pair using the system RNG.
#[cfg(feature = "default-rng")]
#[cfg_attr(docsrs, doc(cfg(feature = "default-rng")))]
pub fn generate_keypair() -> KeyPair {
    generate_keypair_with_rng(&mut OsRng)
}

/// Generates a fresh symmetric key and its KEM [`Capsule`] for `delegating_pk`.
#[instrument(level = "debug", skip_all)]
pub fn encapsulate_with_rng(
    rng: &mut (impl CryptoRng + RngCore),
    delegating_pk: &PublicKey,
) -> (Capsule, SymmetricKey) {
    Capsule::from_public_key(rng, delegating_pk)
}

/// A synonym for [`encapsulate_with_rng`] with the system RNG.
#[cfg(feature = "default-rng")]
#[cfg_attr(docsrs, doc(cfg(feature = "default-rng")))]
pub fn encapsulate(delegating_pk: &PublicKey) -> (Capsule, SymmetricKey) {
    encapsulate_with_rng(&mut OsRng, delegating_pk)
}

/// Recovers the symmetric key of a [`Capsule`] with the delegator's secret key.
#[instrument(level = "debug", skip_all)]
pub fn open(capsule: &Capsule, delegating_sk: &SecretKey) -> Result<SymmetricKey, OpenOriginalError> {
    capsule.open_original(delegating_sk)
}

/// Creates `shares` fragments of `delegating_sk`,
/// any `threshold` of which allow the owner of `receiving_pk`
/// to open capsules made for `delegating_sk`.
///
/// The fragments are signed with `delegating_sk`. A proxy receiving one
/// over the network checks it with [`KeyFrag::verify`](`crate::KeyFrag::verify`).
#[instrument(level = "info", skip_all, fields(threshold = threshold, shares = shares))]
pub fn split_rekey_with_rng(
    rng: &mut (impl CryptoRng + RngCore),
    delegating_sk: &SecretKey,
    receiving_pk: &PublicKey,
    threshold: usize,
    shares: usize,
) -> Result<Box<[VerifiedKeyFrag]>, KeyFragGenerationError> {
    if threshold == 0 || threshold > shares {
        debug!("rejected threshold parameters");
        return Err(KeyFragGenerationError::InvalidThreshold { threshold, shares });
    }

    let factory = KeyFragFactory::new(rng, delegating_sk, receiving_pk, threshold);
    Ok(factory.issue(rng, shares))
}

/// A synonym for [`split_rekey_with_rng`] with the system RNG.
#[cfg(feature = "default-rng")]
#[cfg_attr(docsrs, doc(cfg(feature = "default-rng")))]
pub fn split_rekey(
    delegating_sk: &SecretKey,
    receiving_pk: &PublicKey,
    threshold: usize,
    shares: usize,
) -> Result<Box<[VerifiedKeyFrag]>, KeyFragGenerationError> {
    split_rekey_with_rng(&mut OsRng, delegating_sk, receiving_pk, threshold, shares)
}

/// Reencrypts a [`Capsule`] with a key fragment, creating a capsule fragment
/// with a proof of correctness.
///
/// `metadata`, if given, is bound into the proof.
#[instrument(level = "debug", skip_all, fields(has_metadata = metadata.is_some()))]
pub fn reencrypt_with_rng(
    rng: &mut (impl CryptoRng + RngCore),
    capsule: &Capsule,
    kfrag: &VerifiedKeyFrag,
    metadata: Option<&[u8]>,
) -> Result<VerifiedCapsuleFrag, ReencryptionError> {
    if !capsule.verify() {
        debug!("refusing to reencrypt an invalid capsule");
        return Err(ReencryptionError::InvalidCapsule);
    }
    Ok(VerifiedCapsuleFrag::reencrypted(rng, capsule, kfrag, metadata))
}

/// A synonym for [`reencrypt_with_rng`] with the system RNG and no metadata.
#[cfg(feature = "default-rng")]
#[cfg_attr(docsrs, doc(cfg(feature = "default-rng")))]
pub fn reencrypt(
    capsule: &Capsule,
    kfrag: &VerifiedKeyFrag,
) -> Result<VerifiedCapsuleFrag, ReencryptionError> {
    reencrypt_with_rng(&mut OsRng, capsule, kfrag, None)
}

/// Checks that `cfrag` is a correct reencryption of `capsule`
/// made with the key fragment whose commitment is `kfrag_commitment`
/// (see [`KeyFrag::commitment`](`crate::KeyFrag::commitment`)).
///
/// Needs no secret keys. Returns `false` on any failure.
/// [`CapsuleFrag::verify`] does the same checks, reports the reason,
/// and produces the [`VerifiedCapsuleFrag`] the combiner needs.
#[instrument(level = "debug", skip_all)]
pub fn verify(
    cfrag: &CapsuleFrag,
    capsule: &Capsule,
    delegating_pk: &PublicKey,
    receiving_pk: &PublicKey,
    kfrag_commitment: &CurvePoint,
) -> bool {
    cfrag
        .check(capsule, delegating_pk, receiving_pk, kfrag_commitment)
        .is_ok()
}

/// Combines at least `threshold` verified capsule fragments
/// and recovers the symmetric key of `capsule` with the delegatee's secret key.
///
/// `delegating_pk` is the public key of the delegator,
/// used to check the result of the combination.
#[instrument(level = "info", skip_all, fields(threshold = threshold, received = cfrags.len()))]
pub fn decapsulate_reencrypted(
    receiving_sk: &SecretKey,
    delegating_pk: &PublicKey,
    capsule: &Capsule,
    cfrags: &[VerifiedCapsuleFrag],
    threshold: usize,
) -> Result<SymmetricKey, OpenReencryptedError> {
    capsule.open_reencrypted(receiving_sk, delegating_pk, cfrags, threshold)
}

/// Encrypts the given plaintext message using a DEM scheme,
/// and encapsulates the key for later reencryption.
/// Returns the KEM [`Capsule`] and the ciphertext.
pub fn encrypt_with_rng(
    rng: &mut (impl CryptoRng + RngCore),
    delegating_pk: &PublicKey,
    plaintext: &[u8],
) -> Result<(Capsule, Box<[u8]>), EncryptionError> {
    let (capsule, key) = encapsulate_with_rng(rng, delegating_pk);
    let dem = DEM::new(&key);
    dem.encrypt(rng, plaintext, &capsule.to_array())
        .map(|ciphertext| (capsule, ciphertext))
}

/// A synonym for [`encrypt_with_rng`] with the system RNG.
#[cfg(feature = "default-rng")]
#[cfg_attr(docsrs, doc(cfg(feature = "default-rng")))]
pub fn encrypt(
    delegating_pk: &PublicKey,
    plaintext: &[u8],
) -> Result<(Capsule, Box<[u8]>), EncryptionError> {
    encrypt_with_rng(&mut OsRng, delegating_pk, plaintext)
}

/// Attempts to decrypt the ciphertext using the original encryptor's
/// secret key.
pub fn decrypt_original(
    delegating_sk: &SecretKey,
    capsule: &Capsule,
    ciphertext: impl AsRef<[u8]>,
) -> Result<Box<[u8]>, DecryptOriginalError> {
    let key = open(capsule, delegating_sk).map_err(DecryptOriginalError::OnOpen)?;
    DEM::new(&key)
        .decrypt(ciphertext, &capsule.to_array())
        .map_err(DecryptOriginalError::OnDecryption)
}

/// Decrypts the ciphertext using verified capsule fragments.
pub fn decrypt_reencrypted(
    receiving_sk: &SecretKey,
    delegating_pk: &PublicKey,
    capsule: &Capsule,
    cfrags: &[VerifiedCapsuleFrag],
    threshold: usize,
    ciphertext: impl AsRef<[u8]>,
) -> Result<Box<[u8]>, DecryptReencryptedError> {
    let key = decapsulate_reencrypted(receiving_sk, delegating_pk, capsule, cfrags, threshold)
        .map_err(DecryptReencryptedError::OnOpen)?;
    DEM::new(&key)
        .decrypt(ciphertext, &capsule.to_array())
        .map_err(DecryptReencryptedError::OnDecryption)
}

/// Reencrypts one capsule with each of the given key fragments in parallel.
///
/// Each worker uses the system RNG.
#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
#[instrument(level = "info", skip_all, fields(kfrags = kfrags.len()))]
pub fn reencrypt_all(
    capsule: &Capsule,
    kfrags: &[VerifiedKeyFrag],
) -> Result<Vec<VerifiedCapsuleFrag>, ReencryptionError> {
    if !capsule.verify() {
        debug!("refusing to reencrypt an invalid capsule");
        return Err(ReencryptionError::InvalidCapsule);
    }
    Ok(kfrags
        .par_iter()
        .map(|kfrag| VerifiedCapsuleFrag::reencrypted(&mut OsRng, capsule, kfrag, None))
        .collect())
}

/// Runs [`CapsuleFrag::verify`] in parallel over capsule fragments,
/// each paired with the commitment of the key fragment it should come from.
///
/// The results are in the order of the input.
#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
#[instrument(level = "info", skip_all, fields(cfrags = cfrags.len()))]
pub fn verify_all(
    capsule: &Capsule,
    delegating_pk: &PublicKey,
    receiving_pk: &PublicKey,
    cfrags: Vec<(CapsuleFrag, CurvePoint)>,
) -> Vec<Result<VerifiedCapsuleFrag, CapsuleFragVerificationError>> {
    cfrags
        .into_par_iter()
        .map(|(cfrag, commitment)| cfrag.verify(capsule, delegating_pk, receiving_pk, &commitment))
        .collect()
}

#[cfg(test)]
mod tests {

    use alloc::vec::Vec;

    use rand_core::OsRng;

    use crate::capsule::{OpenReencryptedError, SymmetricKey};
    use crate::capsule_frag::CapsuleFragVerificationError;
    use crate::curve::{CurvePoint, CurveScalar, NonZeroCurveScalar};
    use crate::hashing_ds::hash_capsule_points;
    use crate::key_frag::KeyFragGenerationError;
    use crate::traits::{DeserializableFromArray, SerializableToArray};
    use crate::{Capsule, CapsuleFrag, KeyFrag, VerifiedCapsuleFrag};

    use super::{
        decapsulate_reencrypted, decrypt_original, decrypt_reencrypted, encapsulate_with_rng,
        encrypt_with_rng, generate_keypair_with_rng, open, reencrypt_with_rng,
        split_rekey_with_rng, verify, ReencryptionError,
    };

    #[test]
    fn test_encapsulate_and_open() {
        let alice = generate_keypair_with_rng(&mut OsRng);

        let (capsule, key) = encapsulate_with_rng(&mut OsRng, &alice.public_key());
        assert_eq!(open(&capsule, alice.secret_key()).unwrap(), key);

        // Two encapsulations for the same key differ in both the capsule and the key.
        let (capsule2, key2) = encapsulate_with_rng(&mut OsRng, &alice.public_key());
        assert_ne!(capsule, capsule2);
        assert_ne!(key, key2);
    }

    #[test]
    fn test_invalid_threshold() {
        let alice = generate_keypair_with_rng(&mut OsRng);
        let bob = generate_keypair_with_rng(&mut OsRng);

        for (threshold, shares) in [(0, 3), (4, 3), (0, 0), (1, 0)] {
            assert_eq!(
                split_rekey_with_rng(
                    &mut OsRng,
                    alice.secret_key(),
                    &bob.public_key(),
                    threshold,
                    shares
                )
                .map(|kfrags| kfrags.len()),
                Err(KeyFragGenerationError::InvalidThreshold { threshold, shares })
            );
        }
    }

    #[test]
    fn test_reencrypt_invalid_capsule() {
        let alice = generate_keypair_with_rng(&mut OsRng);
        let bob = generate_keypair_with_rng(&mut OsRng);
        let (capsule, _key) = encapsulate_with_rng(&mut OsRng, &alice.public_key());

        let kfrags =
            split_rekey_with_rng(&mut OsRng, alice.secret_key(), &bob.public_key(), 1, 1).unwrap();

        let mut capsule_arr = capsule.to_array();
        // Flip a bit of the capsule's scalar
        capsule_arr[97] ^= 1;
        let invalid = Capsule::from_array(&capsule_arr).unwrap();
        assert_eq!(
            reencrypt_with_rng(&mut OsRng, &invalid, &kfrags[0], None),
            Err(ReencryptionError::InvalidCapsule)
        );
    }

    #[test]
    fn test_three_of_five() {
        // Alice delegates to Bob through five proxies, any three of which suffice.
        let alice = generate_keypair_with_rng(&mut OsRng);
        let bob = generate_keypair_with_rng(&mut OsRng);

        let plaintext = b"peace at dawn";
        let (capsule, ciphertext) =
            encrypt_with_rng(&mut OsRng, &alice.public_key(), plaintext).unwrap();

        let plaintext_alice = decrypt_original(alice.secret_key(), &capsule, &ciphertext).unwrap();
        assert_eq!(&plaintext_alice as &[u8], plaintext);

        let kfrags =
            split_rekey_with_rng(&mut OsRng, alice.secret_key(), &bob.public_key(), 3, 5).unwrap();
        assert_eq!(kfrags.len(), 5);
        let commitments: Vec<CurvePoint> = kfrags.iter().map(|kfrag| kfrag.commitment()).collect();

        // Simulate network transfer to the proxies, which check what they received.
        let kfrags: Vec<_> = kfrags
            .iter()
            .map(|kfrag| {
                KeyFrag::from_array(&kfrag.to_array())
                    .unwrap()
                    .verify(&alice.public_key(), &bob.public_key())
                    .unwrap()
            })
            .collect();

        // Proxies 0, 2 and 4 respond.
        let cfrags: Vec<CapsuleFrag> = [0usize, 2, 4]
            .iter()
            .map(|i| reencrypt_with_rng(&mut OsRng, &capsule, &kfrags[*i], None).unwrap())
            .map(|cfrag| CapsuleFrag::from_array(&cfrag.to_array()).unwrap())
            .collect();

        let verified: Vec<VerifiedCapsuleFrag> = cfrags
            .into_iter()
            .zip([0usize, 2, 4])
            .map(|(cfrag, i)| {
                assert!(verify(
                    &cfrag,
                    &capsule,
                    &alice.public_key(),
                    &bob.public_key(),
                    &commitments[i]
                ));
                cfrag
                    .verify(
                        &capsule,
                        &alice.public_key(),
                        &bob.public_key(),
                        &commitments[i],
                    )
                    .unwrap()
            })
            .collect();

        let plaintext_bob = decrypt_reencrypted(
            bob.secret_key(),
            &alice.public_key(),
            &capsule,
            &verified,
            3,
            &ciphertext,
        )
        .unwrap();
        assert_eq!(&plaintext_bob as &[u8], plaintext);

        // Two fragments are not enough.
        assert_eq!(
            decapsulate_reencrypted(
                bob.secret_key(),
                &alice.public_key(),
                &capsule,
                &verified[..2],
                3
            ),
            Err(OpenReencryptedError::InsufficientFragments {
                required: 3,
                received: 2
            })
        );

        // Understating the threshold does not help either.
        assert_eq!(
            decapsulate_reencrypted(
                bob.secret_key(),
                &alice.public_key(),
                &capsule,
                &verified[..2],
                2
            ),
            Err(OpenReencryptedError::CombinationFailed)
        );
    }

    #[test]
    fn test_forged_fragment_cannot_be_combined() {
        let alice = generate_keypair_with_rng(&mut OsRng);
        let bob = generate_keypair_with_rng(&mut OsRng);
        let (capsule, key) = encapsulate_with_rng(&mut OsRng, &alice.public_key());

        let kfrags =
            split_rekey_with_rng(&mut OsRng, alice.secret_key(), &bob.public_key(), 2, 2).unwrap();
        let cfrags: Vec<_> = kfrags
            .iter()
            .map(|kfrag| reencrypt_with_rng(&mut OsRng, &capsule, kfrag, None).unwrap())
            .collect();

        // A malicious proxy moves its E1 by X and its V1 by -h*X.
        // The combination `h*E' + V'` is unchanged, while `E' + V'` is not.
        let mut forged = cfrags[0].clone().unverify();
        let shift = &CurvePoint::generator() * &NonZeroCurveScalar::random(&mut OsRng);
        let h = CurveScalar::from(hash_capsule_points(&capsule.point_e, &capsule.point_v));
        forged.point_e1 = &forged.point_e1 + &shift;
        forged.point_v1 = &forged.point_v1 + &(&shift * &(&CurveScalar::zero() - &h));
        let received = CapsuleFrag::from_array(&forged.to_array()).unwrap();

        assert!(!verify(
            &received,
            &capsule,
            &alice.public_key(),
            &bob.public_key(),
            &kfrags[0].commitment()
        ));
        assert_eq!(
            received.verify(
                &capsule,
                &alice.public_key(),
                &bob.public_key(),
                &kfrags[0].commitment()
            ),
            Err(CapsuleFragVerificationError::IncorrectReencryption)
        );

        // Without the forged fragment the honest one alone is not enough...
        assert_eq!(
            decapsulate_reencrypted(
                bob.secret_key(),
                &alice.public_key(),
                &capsule,
                &cfrags[1..],
                2
            ),
            Err(OpenReencryptedError::InsufficientFragments {
                required: 2,
                received: 1
            })
        );

        // ...and the honest pair still opens the capsule.
        let key_bob =
            decapsulate_reencrypted(bob.secret_key(), &alice.public_key(), &capsule, &cfrags, 2)
                .unwrap();
        assert_eq!(key, key_bob);
    }

    #[test]
    fn test_metadata_is_bound() {
        let alice = generate_keypair_with_rng(&mut OsRng);
        let bob = generate_keypair_with_rng(&mut OsRng);
        let (capsule, key) = encapsulate_with_rng(&mut OsRng, &alice.public_key());

        let kfrags =
            split_rekey_with_rng(&mut OsRng, alice.secret_key(), &bob.public_key(), 2, 2).unwrap();
        let cfrags: Vec<_> = kfrags
            .iter()
            .map(|kfrag| {
                reencrypt_with_rng(&mut OsRng, &capsule, kfrag, Some(&b"request 42"[..])).unwrap()
            })
            .collect();

        for (cfrag, kfrag) in cfrags.iter().zip(kfrags.iter()) {
            assert!(verify(
                &cfrag.cfrag,
                &capsule,
                &alice.public_key(),
                &bob.public_key(),
                &kfrag.commitment()
            ));
        }

        let key_bob = decapsulate_reencrypted(
            bob.secret_key(),
            &alice.public_key(),
            &capsule,
            &cfrags,
            2,
        )
        .unwrap();
        assert_eq!(key, key_bob);
    }

    #[test]
    fn test_all_thresholds() {
        let alice = generate_keypair_with_rng(&mut OsRng);
        let bob = generate_keypair_with_rng(&mut OsRng);
        let (capsule, key) = encapsulate_with_rng(&mut OsRng, &alice.public_key());

        for shares in 1..=20 {
            for threshold in 1..=shares {
                let kfrags = split_rekey_with_rng(
                    &mut OsRng,
                    alice.secret_key(),
                    &bob.public_key(),
                    threshold,
                    shares,
                )
                .unwrap();

                // Take the last `threshold` fragments.
                let cfrags: Vec<_> = kfrags[shares - threshold..]
                    .iter()
                    .map(|kfrag| reencrypt_with_rng(&mut OsRng, &capsule, kfrag, None).unwrap())
                    .collect();

                let key_bob: SymmetricKey = decapsulate_reencrypted(
                    bob.secret_key(),
                    &alice.public_key(),
                    &capsule,
                    &cfrags,
                    threshold,
                )
                .unwrap();
                assert_eq!(key, key_bob, "threshold {} of {}", threshold, shares);

                if threshold > 1 {
                    assert_eq!(
                        decapsulate_reencrypted(
                            bob.secret_key(),
                            &alice.public_key(),
                            &capsule,
                            &cfrags[1..],
                            threshold,
                        ),
                        Err(OpenReencryptedError::InsufficientFragments {
                            required: threshold,
                            received: threshold - 1
                        })
                    );
                }
            }
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel() {
        use super::{reencrypt_all, verify_all};

        let alice = generate_keypair_with_rng(&mut OsRng);
        let bob = generate_keypair_with_rng(&mut OsRng);
        let (capsule, key) = encapsulate_with_rng(&mut OsRng, &alice.public_key());

        let kfrags =
            split_rekey_with_rng(&mut OsRng, alice.secret_key(), &bob.public_key(), 3, 8).unwrap();
        let cfrags = reencrypt_all(&capsule, &kfrags).unwrap();
        assert_eq!(cfrags.len(), 8);

        let mut pairs: Vec<_> = cfrags
            .iter()
            .cloned()
            .map(VerifiedCapsuleFrag::unverify)
            .zip(kfrags.iter().map(|kfrag| kfrag.commitment()))
            .collect();
        // Mismatch the last pair.
        pairs[7].1 = kfrags[0].commitment();
        let results = verify_all(&capsule, &alice.public_key(), &bob.public_key(), pairs);
        assert_eq!(
            results[7],
            Err(CapsuleFragVerificationError::CommitmentMismatch)
        );

        let verified: Vec<VerifiedCapsuleFrag> =
            results.into_iter().take(7).collect::<Result<_, _>>().unwrap();
        assert_eq!(verified, cfrags[..7]);

        let key_bob = decapsulate_reencrypted(
            bob.secret_key(),
            &alice.public_key(),
            &capsule,
            &verified,
            3,
        )
        .unwrap();
        assert_eq!(key, key_bob);
    }
}
