//! Property tests for section documents.
//!
//! For any declaration and any pair of distinct sections, writing the two
//! sections in either order yields the same document, and each section reads
//! back exactly what was written. A blank document parses back into one
//! empty slot per declared section, in declaration order.

use proptest::prelude::*;

use section_comment::SectionConfig;
use section_comment::document::{
    blank_document, contains_marker, get_section_content, parse, replace_section,
};

// ============================================================================
// STRATEGIES
// ============================================================================

fn arb_section_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}"
}

/// Markdown-ish text, plus arbitrary unicode, minus anything that could be
/// read back as a marker.
fn arb_content() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 |*#.:`\n-]{0,60}",
        any::<String>(),
        Just(String::new()),
        Just("\n".to_string()),
    ]
    .prop_filter("content must not contain markers", |s| !contains_marker(s))
}

fn arb_config(min_sections: usize) -> impl Strategy<Value = SectionConfig> {
    (
        prop::collection::btree_set(arb_section_id(), min_sections..8)
            .prop_map(|ids| ids.into_iter().collect::<Vec<_>>())
            .prop_shuffle(),
        proptest::option::of("[A-Za-z0-9 ]{1,20}"),
        proptest::option::of("[A-Za-z0-9 .\n]{1,40}"),
    )
        .prop_map(|(sections, title, intro)| SectionConfig {
            sections,
            title,
            intro,
        })
}

/// A declaration with at least two sections and two distinct ids from it.
fn arb_config_with_pair() -> impl Strategy<Value = (SectionConfig, String, String)> {
    arb_config(2).prop_flat_map(|config| {
        let len = config.sections.len();
        (Just(config), 0..len, 1..len).prop_map(|(config, first, offset)| {
            let a = config.sections[first].clone();
            let b = config.sections[(first + offset) % config.sections.len()].clone();
            (config, a, b)
        })
    })
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_distinct_sections_commute(
        (config, a, b) in arb_config_with_pair(),
        x in arb_content(),
        y in arb_content(),
    ) {
        prop_assert_ne!(&a, &b);
        let blank = blank_document(&config);

        let ab = replace_section(&replace_section(&blank, &a, &x).unwrap(), &b, &y).unwrap();
        let ba = replace_section(&replace_section(&blank, &b, &y).unwrap(), &a, &x).unwrap();

        prop_assert_eq!(&ab, &ba, "write order must not matter");
        prop_assert_eq!(get_section_content(&ab, &a).unwrap(), Some(x));
        prop_assert_eq!(get_section_content(&ab, &b).unwrap(), Some(y));
        for other in config.sections.iter().filter(|id| **id != a && **id != b) {
            prop_assert_eq!(get_section_content(&ab, other).unwrap(), Some(String::new()));
        }
    }

    #[test]
    fn prop_rewriting_a_section_replaces_it(
        (config, a, _b) in arb_config_with_pair(),
        first in arb_content(),
        second in arb_content(),
    ) {
        let blank = blank_document(&config);
        let once = replace_section(&blank, &a, &second).unwrap();
        let twice = replace_section(&replace_section(&blank, &a, &first).unwrap(), &a, &second).unwrap();

        prop_assert_eq!(twice, once);
    }

    #[test]
    fn prop_blank_document_has_one_empty_slot_per_section(config in arb_config(1)) {
        let slots = parse(&blank_document(&config)).unwrap();

        let ids: Vec<&str> = slots.iter().map(|slot| slot.id.as_str()).collect();
        let declared: Vec<&str> = config.sections.iter().map(String::as_str).collect();
        prop_assert_eq!(ids, declared);
        prop_assert!(slots.iter().all(|slot| slot.content.is_empty()));
    }
}
