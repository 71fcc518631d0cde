// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Data frequency lattice.
//!
//! Datasets are organised as a grid of __data nodes__ spanned by a small set
//! of orthogonal axes. In clinical imaging studies those axes are typically
//! the study group (test and control), the member within that group (matched
//! subjects), and the timepoint of a longitudinal study. A scanning session is
//! then uniquely identified by its position along all three axes.
//!
//! # Frequencies
//!
//! A __frequency__ is a bit-vector stating which axes a node varies along.
//! Every axis is given a single bit, with the least frequently varying axis
//! holding the lowest bit. Combining axis bits with OR gives the frequency of
//! aggregate nodes, e.g., a subject varies along group and member. The zero
//! frequency is dataset-wide, and the all-ones frequency is the most granular
//! node (the session).
//!
//! # Parent Relation
//!
//! Frequency `a` is a __parent__ of frequency `b` when every bit of `a` is
//! also set in `b`. This is bitwise containment and has nothing to do with
//! numeric ordering: `0b100` is numerically greater than `0b011` yet neither
//! contains the other.
//!
//! # Data Spaces
//!
//! The set of named frequencies is declared by a zero-sized marker type that
//! implements [`DataSpace`]. Frequencies of different spaces are different
//! types, so mixing them in the typed API fails to compile. Values whose space
//! is only known at runtime go through [`AnyFrequency`], which reports a
//! [`LatticeError::SpaceMismatch`] instead.

pub mod clinical;

pub use clinical::Clinical;

use std::{
    any::TypeId,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    hash::Hash,
    marker::PhantomData,
    ops::{Add, BitAnd, BitOr, BitXor, Not, Sub},
    str::FromStr,
};

/// Declaration of a data space.
///
/// Implementors list every named frequency of the space. The maximum member
/// must have all bits set, and each of its bits must be declared as a named
/// basis member. Use [`validate`] to check a declaration.
pub trait DataSpace:
    Debug + Default + Clone + Copy + PartialEq + Eq + PartialOrd + Ord + Hash + Send + Sync + 'static
{
    /// Name of the space.
    const NAME: &'static str;

    /// Named members of the space in declaration order.
    const MEMBERS: &'static [(&'static str, u32)];
}

/// Frequency value inside data space `S`.
///
/// Defaults to the most granular member, see [`Frequency::max`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frequency<S: DataSpace> {
    bits: u32,
    space: PhantomData<S>,
}

impl<S: DataSpace> Default for Frequency<S> {
    fn default() -> Self {
        Self::max()
    }
}

impl<S: DataSpace> Frequency<S> {
    /// Dataset-wide frequency.
    pub const ZERO: Self = Self::from_const(0);

    /// Construct frequency from raw bits.
    ///
    /// # Errors
    ///
    /// - Return [`LatticeError::OutOfRange`] if bits fall outside of the
    ///   width of the space.
    pub fn new(bits: u32) -> Result<Self> {
        if bits & !mask::<S>() != 0 {
            return Err(LatticeError::OutOfRange {
                space: S::NAME,
                bits,
            });
        }

        Ok(Self::from_bits_masked(bits))
    }

    /// Construct frequency in constant context.
    ///
    /// Bits are trusted, so only use this for declared members.
    pub(crate) const fn from_const(bits: u32) -> Self {
        Self {
            bits,
            space: PhantomData,
        }
    }

    fn from_bits_masked(bits: u32) -> Self {
        Self {
            bits: bits & mask::<S>(),
            space: PhantomData,
        }
    }

    /// Most granular frequency of the space, i.e., all bits set.
    ///
    /// Derived purely from the declared members.
    pub fn max() -> Self {
        Self::from_bits_masked(mask::<S>())
    }

    /// Raw bit-vector value.
    pub fn value(&self) -> u32 {
        self.bits
    }

    /// Name of the member matching this value, if declared.
    pub fn name(&self) -> Option<&'static str> {
        S::MEMBERS
            .iter()
            .find(|(_, bits)| *bits == self.bits)
            .map(|(name, _)| *name)
    }

    /// Number of axes in the space.
    pub fn width() -> u32 {
        u32::BITS - mask::<S>().leading_zeros()
    }

    /// Basis frequencies of the space, most significant first.
    pub fn basis() -> Vec<Self> {
        Self::max().nonzero_basis()
    }

    /// Decompose into the basis frequencies this frequency projects into,
    /// most significant first.
    ///
    /// The zero frequency decomposes into nothing.
    pub fn nonzero_basis(&self) -> Vec<Self> {
        let mut remaining = self.bits;
        let mut basis = Vec::new();
        while remaining != 0 {
            let rest = remaining & (remaining - 1);
            basis.push(Self::from_bits_masked(rest ^ remaining));
            remaining = rest;
        }
        basis.reverse();

        basis
    }

    /// Check if frequency consists of exactly one axis.
    pub fn is_basis(&self) -> bool {
        self.bits.count_ones() == 1
    }

    /// Check if frequency is the dataset-wide frequency.
    pub fn is_zero(&self) -> bool {
        self.bits == 0
    }

    /// Check if this frequency is a parent of `child`.
    ///
    /// Every axis of `self` must also be an axis of `child`. Equal frequencies
    /// only count as parents of each other when `if_match` is set.
    pub fn is_parent(&self, child: Self, if_match: bool) -> bool {
        (*self & child) == *self && (child != *self || if_match)
    }

    /// Bitwise OR over a sequence of frequencies.
    ///
    /// An empty sequence yields the dataset-wide frequency.
    pub fn union(freqs: impl IntoIterator<Item = Self>) -> Self {
        freqs.into_iter().fold(Self::ZERO, |acc, freq| acc | freq)
    }

    /// Iterate the bit string from the most significant axis to the least.
    pub fn bits(&self) -> impl Iterator<Item = bool> {
        let bits = self.bits;
        (0..Self::width())
            .rev()
            .map(move |shift| bits & (1 << shift) != 0)
    }

    /// Erase the space from the type.
    pub fn erase(&self) -> AnyFrequency {
        AnyFrequency {
            space: TypeId::of::<S>(),
            space_name: S::NAME,
            bits: self.bits,
        }
    }
}

impl<S: DataSpace> Display for Frequency<S> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self.name() {
            Some(name) => fmt.write_str(name),
            None => write!(fmt, "{:#0width$b}", self.bits, width = Self::width() as usize + 2),
        }
    }
}

impl<S: DataSpace> FromStr for Frequency<S> {
    type Err = LatticeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        S::MEMBERS
            .iter()
            .find(|(member, _)| *member == name)
            .map(|(_, bits)| Self::from_bits_masked(*bits))
            .ok_or_else(|| LatticeError::UnknownName {
                space: S::NAME,
                name: name.to_string(),
            })
    }
}

impl<S: DataSpace> BitXor for Frequency<S> {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        Self::from_bits_masked(self.bits ^ rhs.bits)
    }
}

impl<S: DataSpace> BitAnd for Frequency<S> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::from_bits_masked(self.bits & rhs.bits)
    }
}

impl<S: DataSpace> BitOr for Frequency<S> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::from_bits_masked(self.bits | rhs.bits)
    }
}

impl<S: DataSpace> Not for Frequency<S> {
    type Output = Self;

    fn not(self) -> Self {
        Self::from_bits_masked(!self.bits)
    }
}

impl<S: DataSpace> Add for Frequency<S> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_bits_masked(self.bits.wrapping_add(rhs.bits))
    }
}

impl<S: DataSpace> Sub for Frequency<S> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_bits_masked(self.bits.wrapping_sub(rhs.bits))
    }
}

/// Frequency whose data space is only known at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnyFrequency {
    space: TypeId,
    space_name: &'static str,
    bits: u32,
}

impl AnyFrequency {
    /// Name of the data space this value belongs to.
    pub fn space_name(&self) -> &'static str {
        self.space_name
    }

    /// Raw bit-vector value.
    pub fn value(&self) -> u32 {
        self.bits
    }

    /// Recover the typed frequency.
    ///
    /// # Errors
    ///
    /// - Return [`LatticeError::SpaceMismatch`] if value is not from space `S`.
    pub fn downcast<S: DataSpace>(&self) -> Result<Frequency<S>> {
        if self.space != TypeId::of::<S>() {
            return Err(LatticeError::SpaceMismatch {
                expected: S::NAME,
                found: self.space_name,
            });
        }

        Frequency::new(self.bits)
    }

    /// Parent check across erased values.
    ///
    /// # Errors
    ///
    /// - Return [`LatticeError::SpaceMismatch`] if spaces differ.
    pub fn try_is_parent(&self, child: &AnyFrequency, if_match: bool) -> Result<bool> {
        self.check_space(child)?;
        Ok((self.bits & child.bits) == self.bits && (child.bits != self.bits || if_match))
    }

    /// Bitwise OR across erased values.
    ///
    /// # Errors
    ///
    /// - Return [`LatticeError::SpaceMismatch`] if spaces differ.
    pub fn try_union(&self, other: &AnyFrequency) -> Result<AnyFrequency> {
        self.check_space(other)?;
        Ok(AnyFrequency {
            bits: self.bits | other.bits,
            ..*self
        })
    }

    fn check_space(&self, other: &AnyFrequency) -> Result<()> {
        if self.space != other.space {
            return Err(LatticeError::SpaceMismatch {
                expected: self.space_name,
                found: other.space_name,
            });
        }

        Ok(())
    }
}

impl<S: DataSpace> From<Frequency<S>> for AnyFrequency {
    fn from(freq: Frequency<S>) -> Self {
        freq.erase()
    }
}

/// Check that data space `S` is a well-formed lattice declaration.
///
/// # Errors
///
/// - Return [`LatticeError::InvalidSpace`] if the maximum member is not all
///   ones, a basis bit has no declared member, or values or names repeat.
pub fn validate<S: DataSpace>() -> Result<()> {
    let invalid = |reason: String| LatticeError::InvalidSpace {
        space: S::NAME,
        reason,
    };

    let max = mask::<S>();
    if max.checked_add(1).is_some_and(|next| !next.is_power_of_two()) {
        return Err(invalid(format!("maximum member {max:#b} is not all ones")));
    }

    for (index, (name, bits)) in S::MEMBERS.iter().enumerate() {
        let later = &S::MEMBERS[index + 1..];
        if later.iter().any(|(other, _)| other == name) {
            return Err(invalid(format!("member name {name:?} declared twice")));
        }
        if later.iter().any(|(_, other)| other == bits) {
            return Err(invalid(format!("member value {bits:#b} declared twice")));
        }
    }

    for axis in Frequency::<S>::basis() {
        if axis.name().is_none() {
            return Err(invalid(format!("basis bit {:#b} has no member", axis.bits)));
        }
    }

    Ok(())
}

fn mask<S: DataSpace>() -> u32 {
    S::MEMBERS.iter().map(|(_, bits)| *bits).max().unwrap_or(0)
}

/// Lattice error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LatticeError {
    /// Name does not refer to a member of the space.
    #[error("{name:?} is not a frequency of the {space} space")]
    UnknownName { space: &'static str, name: String },

    /// Bits exceed width of the space.
    #[error("{bits:#b} is outside of the {space} space")]
    OutOfRange { space: &'static str, bits: u32 },

    /// Frequencies of two different spaces were combined.
    #[error("expected a frequency of the {expected} space, found one of the {found} space")]
    SpaceMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Space declaration is malformed.
    #[error("invalid {space} space: {reason}")]
    InvalidSpace { space: &'static str, reason: String },
}

/// Friendly result alias :3
pub type Result<T, E = LatticeError> = std::result::Result<T, E>;
