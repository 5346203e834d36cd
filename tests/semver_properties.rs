use launch_sync::versioning::{latest_semver_tag, SemverTag};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn triple() -> impl Strategy<Value = (u64, u64, u64)> {
    (0_u64..50, 0_u64..50, 0_u64..50)
}

proptest! {
    #![proptest_config(Config::with_cases(256))]

    #[test]
    fn prefix_does_not_change_the_triple((major, minor, patch) in triple()) {
        let bare = SemverTag::parse(&format!("{major}.{minor}.{patch}")).unwrap();
        let prefixed = SemverTag::parse(&format!("v{major}.{minor}.{patch}")).unwrap();
        prop_assert_eq!(bare.triple(), (major, minor, patch));
        prop_assert_eq!(prefixed.triple(), bare.triple());
    }

    #[test]
    fn latest_is_the_integer_maximum(
        triples in prop::collection::vec(triple(), 1..20),
        noise in prop::collection::vec("[a-z]{1,8}", 0..5),
    ) {
        let mut tags: Vec<String> = triples
            .iter()
            .enumerate()
            .map(|(i, (a, b, c))| if i % 2 == 0 { format!("v{a}.{b}.{c}") } else { format!("{a}.{b}.{c}") })
            .collect();
        tags.extend(noise);

        let latest = latest_semver_tag(&tags).unwrap();
        let expected = triples.iter().copied().max().unwrap();
        prop_assert_eq!(latest.triple(), expected);
        prop_assert!(tags.contains(&latest.tag));
    }

    #[test]
    fn prerelease_and_partial_tags_are_ignored(
        (major, minor, patch) in triple(),
        suffix in "-(rc|beta|alpha)[0-9]{0,2}",
    ) {
        let prerelease = format!("v{major}.{minor}.{patch}{suffix}");
        let partial = format!("v{major}.{minor}");
        prop_assert!(SemverTag::parse(&prerelease).is_none());
        prop_assert!(latest_semver_tag([prerelease, partial]).is_none());
    }
}
