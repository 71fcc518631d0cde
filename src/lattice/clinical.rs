// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Clinical research data space.

use crate::lattice::{DataSpace, Frequency};

/// Data space of clinical studies.
///
/// Subjects split into groups, scanned at different timepoints in
/// longitudinal studies. The member axis identifies a subject relative to its
/// group, so matched test and control subjects share a member id. For
/// datasets with one group, subject and member are equivalent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Clinical;

impl DataSpace for Clinical {
    const NAME: &'static str = "clinical";
    const MEMBERS: &'static [(&'static str, u32)] = &[
        ("dataset", 0b000),
        ("member", 0b001),
        ("group", 0b010),
        ("timepoint", 0b100),
        ("session", 0b111),
        ("subject", 0b011),
        ("batch", 0b110),
        ("matchedpoint", 0b101),
    ];
}

impl Clinical {
    pub const DATASET: Frequency<Clinical> = clinical(0b000);
    pub const MEMBER: Frequency<Clinical> = clinical(0b001);
    pub const GROUP: Frequency<Clinical> = clinical(0b010);
    pub const TIMEPOINT: Frequency<Clinical> = clinical(0b100);
    pub const SESSION: Frequency<Clinical> = clinical(0b111);
    pub const SUBJECT: Frequency<Clinical> = clinical(0b011);
    pub const BATCH: Frequency<Clinical> = clinical(0b110);
    pub const MATCHEDPOINT: Frequency<Clinical> = clinical(0b101);
}

const fn clinical(bits: u32) -> Frequency<Clinical> {
    Frequency::from_const(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn constants_match_names() {
        for (name, bits) in Clinical::MEMBERS {
            let parsed: Frequency<Clinical> = name.parse().unwrap();
            assert_eq!(parsed.value(), *bits);
        }
        assert_eq!(Clinical::SUBJECT, "subject".parse().unwrap());
        assert_eq!(Frequency::<Clinical>::max(), Clinical::SESSION);
    }

    #[test]
    fn decompositions() {
        assert!(Clinical::DATASET.nonzero_basis().is_empty());
        assert_eq!(
            Clinical::SUBJECT.nonzero_basis(),
            vec![Clinical::GROUP, Clinical::MEMBER]
        );
        assert_eq!(
            Clinical::BATCH.nonzero_basis(),
            vec![Clinical::TIMEPOINT, Clinical::GROUP]
        );
        assert_eq!(
            Clinical::MATCHEDPOINT.nonzero_basis(),
            vec![Clinical::TIMEPOINT, Clinical::MEMBER]
        );
    }
}
