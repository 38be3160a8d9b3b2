//! Counter arithmetic and fixed-shape distribution tallies.
//!
//! Every aggregate counter in herostat is unsigned. Additions saturate;
//! decrements below zero are handled by the [`ClampPolicy`] carried in a
//! [`ClampGuard`] for the duration of one apply step. Out-of-range bucket
//! indices are skipped with a warning rather than aborting the rule.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{HerostatError, Result};

// ---------------------------------------------------------------------------
// Counter trait
// ---------------------------------------------------------------------------

/// An unsigned counter type usable in aggregates.
pub trait Counter: Copy + Default + PartialOrd + std::fmt::Debug + std::iter::Sum {
    /// The value one.
    const ONE: Self;
    /// The largest value.
    const MAX: Self;
    /// Checked addition; `None` on overflow.
    fn checked_plus(self, rhs: Self) -> Option<Self>;
    /// Checked subtraction; `None` on underflow.
    fn checked_minus(self, rhs: Self) -> Option<Self>;
    /// Widen for error reporting.
    fn widen(self) -> u128;
}

macro_rules! impl_counter {
    ($($t:ty),*) => {
        $(
            impl Counter for $t {
                const ONE: Self = 1;
                const MAX: Self = <$t>::MAX;
                fn checked_plus(self, rhs: Self) -> Option<Self> {
                    self.checked_add(rhs)
                }
                fn checked_minus(self, rhs: Self) -> Option<Self> {
                    self.checked_sub(rhs)
                }
                fn widen(self) -> u128 {
                    u128::from(self)
                }
            }
        )*
    };
}

impl_counter!(u32, u64, u128);

// ---------------------------------------------------------------------------
// Clamp policy
// ---------------------------------------------------------------------------

/// What to do when a decrement would take a counter below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampPolicy {
    /// Clamp to zero and log a warning.
    #[default]
    Saturate,
    /// Fail the event with [`HerostatError::CounterUnderflow`].
    Reject,
}

/// Direction in which a footprint or delta is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Increment.
    Add,
    /// Decrement.
    Remove,
}

/// Tracks clamp and skip events for a single apply step.
#[derive(Debug)]
pub struct ClampGuard {
    policy: ClampPolicy,
    clamps: u32,
    skipped: u32,
    first_violation: Option<HerostatError>,
}

impl ClampGuard {
    /// Create a guard for one apply step.
    #[must_use]
    pub fn new(policy: ClampPolicy) -> Self {
        Self {
            policy,
            clamps: 0,
            skipped: 0,
            first_violation: None,
        }
    }

    /// Add `by` to `slot`, saturating at the type's max.
    pub fn add<T: Counter>(&mut self, slot: &mut T, by: T, field: &'static str) {
        match slot.checked_plus(by) {
            Some(v) => *slot = v,
            None => {
                warn!(field, current = ?slot, by = ?by, "Counter saturated");
                *slot = T::MAX;
                self.clamps += 1;
            }
        }
    }

    /// Subtract `by` from `slot` under the configured policy.
    pub fn sub<T: Counter>(&mut self, slot: &mut T, by: T, field: &'static str) {
        match slot.checked_minus(by) {
            Some(v) => *slot = v,
            None => {
                self.clamps += 1;
                match self.policy {
                    ClampPolicy::Saturate => {
                        warn!(field, current = ?slot, by = ?by, "Decrement clamped to zero");
                        *slot = T::default();
                    }
                    ClampPolicy::Reject => {
                        if self.first_violation.is_none() {
                            self.first_violation = Some(HerostatError::CounterUnderflow {
                                field,
                                current: slot.widen(),
                                requested: by.widen(),
                            });
                        }
                        *slot = T::default();
                    }
                }
            }
        }
    }

    /// Add or subtract depending on `sign`.
    pub fn shift<T: Counter>(&mut self, slot: &mut T, by: T, sign: Sign, field: &'static str) {
        match sign {
            Sign::Add => self.add(slot, by, field),
            Sign::Remove => self.sub(slot, by, field),
        }
    }

    /// Record a clamp applied outside a counter, e.g. a balance shortfall.
    pub fn clamped(&mut self) {
        self.clamps += 1;
    }

    /// Record that a bucket update was skipped.
    pub fn skipped(&mut self) {
        self.skipped += 1;
    }

    /// Number of clamped or saturated updates so far.
    #[must_use]
    pub fn clamps(&self) -> u32 {
        self.clamps
    }

    /// Number of skipped bucket updates so far.
    #[must_use]
    pub fn skips(&self) -> u32 {
        self.skipped
    }

    /// The policy in force.
    #[must_use]
    pub fn policy(&self) -> ClampPolicy {
        self.policy
    }

    /// Surface the first underflow recorded under [`ClampPolicy::Reject`].
    ///
    /// # Errors
    /// Returns [`HerostatError::CounterUnderflow`] if any decrement underflowed.
    pub fn finish(&mut self) -> Result<()> {
        match self.first_violation.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// A fixed-shape, row-major grid of counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally<T> {
    shape: Vec<usize>,
    cells: Vec<T>,
}

impl<T: Counter> Tally<T> {
    /// A zero-filled grid with the given dimensions.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            cells: vec![T::default(); len],
        }
    }

    /// A zero-filled 1-D grid.
    #[must_use]
    pub fn flat(len: usize) -> Self {
        Self::zeros(&[len])
    }

    /// The grid's dimensions.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for (&i, &dim) in index.iter().zip(&self.shape) {
            if i >= dim {
                return None;
            }
            offset = offset * dim + i;
        }
        Some(offset)
    }

    /// Value at `index`, or zero when out of range.
    #[must_use]
    pub fn get(&self, index: &[usize]) -> T {
        self.offset(index)
            .and_then(|o| self.cells.get(o).copied())
            .unwrap_or_default()
    }

    /// Shift the cell at `index` by `by`. Out-of-range indices are skipped
    /// with a warning.
    pub fn shift(
        &mut self,
        index: &[usize],
        by: T,
        sign: Sign,
        guard: &mut ClampGuard,
        field: &'static str,
    ) {
        match self.offset(index).and_then(|o| self.cells.get_mut(o)) {
            Some(cell) => guard.shift(cell, by, sign, field),
            None => {
                warn!(field, ?index, shape = ?self.shape, "Bucket index out of range, skipped");
                guard.skipped();
            }
        }
    }

    /// Increment the cell at `index` by one.
    pub fn bump(&mut self, index: &[usize], guard: &mut ClampGuard, field: &'static str) {
        self.shift(index, T::ONE, Sign::Add, guard, field);
    }

    /// Sum of every cell.
    #[must_use]
    pub fn sum(&self) -> T {
        self.cells.iter().copied().sum()
    }

    /// Sum of the cells whose leading index is `first`.
    #[must_use]
    pub fn row_sum(&self, first: usize) -> T {
        let Some(&rows) = self.shape.first() else {
            return T::default();
        };
        if first >= rows {
            return T::default();
        }
        let stride = self.cells.len() / rows;
        self.cells[first * stride..(first + 1) * stride]
            .iter()
            .copied()
            .sum()
    }

    /// Raw cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    /// Element-wise accumulate `other` into `self` (shapes must match).
    pub fn accumulate(&mut self, other: &Self) {
        if self.shape != other.shape {
            warn!(lhs = ?self.shape, rhs = ?other.shape, "Tally shape mismatch, not accumulated");
            return;
        }
        for (a, b) in self.cells.iter_mut().zip(&other.cells) {
            *a = a.checked_plus(*b).unwrap_or(T::MAX);
        }
    }
}
