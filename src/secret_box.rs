use alloc::boxed::Box;
use core::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Heap storage for a secret scalar, point or key, wiped when dropped.
///
/// The value stays behind a pointer for its whole life,
/// so moving the container does not scatter copies of it over the stack.
pub struct SecretBox<T: Zeroize + Clone> {
    inner: Box<T>,
}

impl<T: Zeroize + Clone> SecretBox<T> {
    /// Takes ownership of `secret`.
    pub fn new(secret: T) -> Self {
        Self {
            inner: Box::new(secret),
        }
    }

    /// Read access to the secret.
    pub fn as_secret(&self) -> &T {
        &self.inner
    }

    /// Write access to the secret, for in-place updates.
    pub fn as_mut_secret(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: Zeroize + Clone> Clone for SecretBox<T> {
    fn clone(&self) -> Self {
        Self::new(self.as_secret().clone())
    }
}

impl<T: Zeroize + Clone + PartialEq> PartialEq for SecretBox<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_secret() == other.as_secret()
    }
}

impl<T: Zeroize + Clone> fmt::Debug for SecretBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBox(<redacted>)")
    }
}

impl<T: Zeroize + Clone> Drop for SecretBox<T> {
    fn drop(&mut self) {
        self.as_mut_secret().zeroize();
    }
}

impl<T: Zeroize + Clone> ZeroizeOnDrop for SecretBox<T> {}

#[cfg(test)]
mod tests {

    use generic_array::GenericArray;
    use typenum::U4;
    use zeroize::Zeroize;

    use super::SecretBox;
    use crate::curve::CurveScalar;

    #[test]
    fn test_access_and_mutate() {
        let mut secret = SecretBox::new(GenericArray::<u8, U4>::from([1, 2, 3, 4]));
        assert_eq!(secret.as_secret().as_slice(), &[1, 2, 3, 4]);

        secret.as_mut_secret()[0] = 5;
        assert_eq!(secret.as_secret().as_slice(), &[5, 2, 3, 4]);

        let copy = secret.clone();
        assert!(copy == secret);

        secret.as_mut_secret().zeroize();
        assert_eq!(secret.as_secret().as_slice(), &[0, 0, 0, 0]);
        assert!(copy != secret);
    }

    #[test]
    fn test_clone_is_independent() {
        let one = CurveScalar::one();
        let mut original = SecretBox::new(one);
        let copy = original.clone();
        *original.as_mut_secret() = CurveScalar::zero();
        assert_eq!(copy.as_secret(), &one);
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretBox::new(GenericArray::<u8, U4>::from([0xab, 0xcd, 0xef, 0x01]));
        let debug = alloc::format!("{:?}", secret);
        assert_eq!(debug, "SecretBox(<redacted>)");
    }
}
