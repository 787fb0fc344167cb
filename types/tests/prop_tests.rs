use proptest::prelude::*;

use stakepool_types::{semver_compatible, ChainHash, SemVer};

fn semver() -> impl Strategy<Value = SemVer> {
    (0u32..20, 0u32..20, 0u32..20).prop_map(|(major, minor, patch)| SemVer::new(major, minor, patch))
}

proptest! {
    /// Differing majors are never compatible, whatever the minor and patch.
    #[test]
    fn different_majors_never_compatible(required in semver(), candidate in semver()) {
        prop_assume!(required.major != candidate.major);
        prop_assert!(!semver_compatible(required, candidate));
    }

    /// Every version is compatible with itself.
    #[test]
    fn semver_reflexive(v in semver()) {
        prop_assert!(semver_compatible(v, v));
    }

    /// Within one major, compatibility is exactly (minor, patch) ordering.
    #[test]
    fn same_major_follows_minor_patch_order(required in semver(), minor in 0u32..20, patch in 0u32..20) {
        let candidate = SemVer::new(required.major, minor, patch);
        let expected = (minor, patch) >= (required.minor, required.patch);
        prop_assert_eq!(semver_compatible(required, candidate), expected);
    }

    /// A newer minor is compatible regardless of its patch level.
    #[test]
    fn newer_minor_ignores_patch(required in semver(), patch in 0u32..20) {
        let candidate = SemVer::new(required.major, required.minor + 1, patch);
        prop_assert!(semver_compatible(required, candidate));
    }

    /// ChainHash string form parses back to the same hash.
    #[test]
    fn chain_hash_string_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = ChainHash::new(bytes);
        let parsed: ChainHash = hash.to_string().parse().unwrap();
        prop_assert_eq!(parsed, hash);
    }
}
