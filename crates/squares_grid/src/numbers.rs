//! Row and column digit assignment.
//!
//! Payouts depend on the digits being unpredictable, so assignment only
//! accepts generators marked [`CryptoRng`]. The digits are drawn once, at
//! release, and never regenerated.

use crate::coord::GRID_SIZE;
use crate::error::ValidationError;
use derive_more::Display;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// A cryptographically secure random source that can move between threads.
pub trait SecureRandom: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send> SecureRandom for T {}

/// Returns a ChaCha-based generator seeded from the operating system.
pub fn os_random() -> StdRng {
    StdRng::from_os_rng()
}

/// An ordering of the ten digits 0-9, one per row (or column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("{_0:?}")]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct DigitPermutation([u8; GRID_SIZE]);

impl DigitPermutation {
    /// Validates that `digits` holds each of 0-9 exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDigits`] on any out-of-range or
    /// repeated digit.
    pub fn new(digits: [u8; GRID_SIZE]) -> Result<Self, ValidationError> {
        let mut seen = [false; GRID_SIZE];
        for digit in digits {
            let slot = seen
                .get_mut(usize::from(digit))
                .ok_or_else(|| ValidationError::InvalidDigits(format!("{digit} is not a digit")))?;
            if *slot {
                return Err(ValidationError::InvalidDigits(format!("{digit} appears twice")));
            }
            *slot = true;
        }
        Ok(Self(digits))
    }

    /// The digits in axis order.
    pub fn digits(&self) -> &[u8; GRID_SIZE] {
        &self.0
    }

    /// Axis index carrying `digit`.
    pub fn position_of(&self, digit: u8) -> Option<usize> {
        self.0.iter().position(|d| *d == digit)
    }
}

impl TryFrom<Vec<u8>> for DigitPermutation {
    type Error = ValidationError;

    fn try_from(digits: Vec<u8>) -> Result<Self, Self::Error> {
        let len = digits.len();
        let array: [u8; GRID_SIZE] = digits
            .try_into()
            .map_err(|_| {
                ValidationError::InvalidDigits(format!("expected {GRID_SIZE} digits, got {len}"))
            })?;
        Self::new(array)
    }
}

impl From<DigitPermutation> for Vec<u8> {
    fn from(permutation: DigitPermutation) -> Self {
        permutation.0.to_vec()
    }
}

/// Row and column digits of a released grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedNumbers {
    rows: DigitPermutation,
    cols: DigitPermutation,
}

impl AssignedNumbers {
    /// Pairs row and column digits.
    pub fn new(rows: DigitPermutation, cols: DigitPermutation) -> Self {
        Self { rows, cols }
    }

    /// Row digits, top to bottom.
    pub fn rows(&self) -> &DigitPermutation {
        &self.rows
    }

    /// Column digits, left to right.
    pub fn cols(&self) -> &DigitPermutation {
        &self.cols
    }
}

/// Draws the row and column permutations for a grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberAssignor;

impl NumberAssignor {
    /// Draws two independent uniform permutations, rows first.
    #[instrument(skip(self, rng))]
    pub fn assign<R: SecureRandom + ?Sized>(&self, rng: &mut R) -> AssignedNumbers {
        let rows = Self::permutation(rng);
        let cols = Self::permutation(rng);
        debug!(rows = %rows, cols = %cols, "Digits drawn");
        AssignedNumbers { rows, cols }
    }

    fn permutation<R: SecureRandom + ?Sized>(rng: &mut R) -> DigitPermutation {
        let mut digits: [u8; GRID_SIZE] = std::array::from_fn(|i| i as u8);
        digits.shuffle(rng);
        DigitPermutation(digits)
    }
}
