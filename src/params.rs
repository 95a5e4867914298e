use alloc::boxed::Box;

use once_cell::race::OnceBox;

use crate::curve::CurvePoint;

/// Scheme parameters shared by all parties: the second generator `U`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parameters {
    pub(crate) u: CurvePoint,
}

static PARAMETERS: OnceBox<Parameters> = OnceBox::new();

impl Parameters {
    /// Derives the parameters from their fixed seeds.
    pub fn new() -> Self {
        // `U` is hashed to the curve, so nobody knows its discrete log relative to `G`.
        // Hashing to the curve only fails for tags over 255 bytes.
        let u = CurvePoint::from_data(b"PARAMETERS", b"POINT_U").unwrap();

        Self { u }
    }

    /// Returns the process-wide parameters, computing them on first use.
    pub fn global() -> &'static Self {
        PARAMETERS.get_or_init(|| Box::new(Self::new()))
    }
}

impl Default for Parameters {
    fn default() -> Self {
        *Self::global()
    }
}
