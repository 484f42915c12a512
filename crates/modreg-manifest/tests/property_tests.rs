use modreg_manifest::{VersionRequirement, normalize_version};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_bare_requirement_is_minimum(
        req in (0u64..50, 0u64..50, 0u64..50),
        ver in (0u64..50, 0u64..50, 0u64..50),
    ) {
        let required = format!("{}.{}.{}", req.0, req.1, req.2);
        let installed = format!("{}.{}.{}", ver.0, ver.1, ver.2);

        let requirement = VersionRequirement::parse(&required).unwrap();

        prop_assert_eq!(requirement.satisfies(&installed), ver >= req);
    }

    #[test]
    fn test_short_forms_pad_with_zero(major in 0u64..1000, minor in 0u64..1000) {
        prop_assert_eq!(
            normalize_version(&major.to_string()).unwrap(),
            semver::Version::new(major, 0, 0)
        );
        prop_assert_eq!(
            normalize_version(&format!("{major}.{minor}")).unwrap(),
            semver::Version::new(major, minor, 0)
        );
    }

    #[test]
    fn test_requirement_always_satisfied_by_itself(
        parts in proptest::collection::vec(0u64..100, 1..5),
    ) {
        let version = parts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");

        let requirement = VersionRequirement::parse(&version).unwrap();

        prop_assert!(requirement.satisfies(&version));
    }
}
