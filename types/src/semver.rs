//! API version triple and the compatibility gate applied to RPC peers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `major.minor.patch` JSON-RPC API version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemVer {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemVer {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether `self`, as advertised by a peer, satisfies `required`.
    pub fn is_compatible_with(&self, required: &SemVer) -> bool {
        semver_compatible(*required, *self)
    }
}

/// Returns true when `candidate` can be used where `required` is expected.
///
/// The major versions must match exactly. Within a major version the
/// candidate must be at least the required minor, and at least the required
/// patch when the minors are equal.
pub fn semver_compatible(required: SemVer, candidate: SemVer) -> bool {
    if required.major != candidate.major {
        return false;
    }
    if required.minor != candidate.minor {
        return candidate.minor > required.minor;
    }
    candidate.patch >= required.patch
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: SemVer = SemVer::new(6, 1, 1);

    #[test]
    fn exact_match_is_compatible() {
        assert!(semver_compatible(REQUIRED, SemVer::new(6, 1, 1)));
    }

    #[test]
    fn newer_patch_and_minor_are_compatible() {
        assert!(semver_compatible(REQUIRED, SemVer::new(6, 1, 7)));
        assert!(semver_compatible(REQUIRED, SemVer::new(6, 2, 0)));
    }

    #[test]
    fn older_patch_or_minor_is_rejected() {
        assert!(!semver_compatible(REQUIRED, SemVer::new(6, 1, 0)));
        assert!(!semver_compatible(REQUIRED, SemVer::new(6, 0, 9)));
    }

    #[test]
    fn other_majors_are_rejected() {
        assert!(!semver_compatible(REQUIRED, SemVer::new(7, 1, 1)));
        assert!(!semver_compatible(REQUIRED, SemVer::new(5, 9, 9)));
    }

    #[test]
    fn display_format() {
        assert_eq!(SemVer::new(6, 2, 0).to_string(), "6.2.0");
    }

    #[test]
    fn method_form_matches_function() {
        assert!(SemVer::new(6, 2, 0).is_compatible_with(&REQUIRED));
        assert!(!SemVer::new(6, 0, 0).is_compatible_with(&REQUIRED));
    }
}
