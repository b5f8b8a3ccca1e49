use dbz_path::Path;
use proptest::prelude::*;

fn edge_segment() -> impl Strategy<Value = String> {
    // The parser trims whitespace and `/` from both ends of the text, so the
    // first and last segments must be non-empty without edge whitespace.
    "[a-zA-Z0-9_.~/-]{1,8}"
}

fn inner_segment() -> impl Strategy<Value = String> {
    "[ a-zA-Z0-9_.~/-]{0,8}"
}

fn segment_list(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop_oneof![
        Just(Vec::new()),
        edge_segment().prop_map(|s| vec![s]),
        (
            edge_segment(),
            prop::collection::vec(inner_segment(), 0..max.saturating_sub(2)),
            edge_segment(),
        )
            .prop_map(|(first, middle, last)| {
                let mut all = vec![first];
                all.extend(middle);
                all.push(last);
                all
            }),
    ]
}

fn segment() -> impl Strategy<Value = String> {
    edge_segment()
}

proptest! {
    #[test]
    fn textual_roundtrip(segments in segment_list(6)) {
        let path = Path::from_segments(segments);
        let text = path.to_string();
        prop_assert_eq!(Path::parse(&text, true), path);
    }

    #[test]
    fn chained_and_flat_paths_agree(segments in prop::collection::vec(segment(), 1..6)) {
        let flat = Path::from_segments(segments.clone());
        let chained = segments
            .iter()
            .fold(Path::root(), |path, segment| path.child(segment.as_str()));
        prop_assert_eq!(&chained, &flat);
        prop_assert_eq!(chained.to_string(), flat.to_string());
        prop_assert_eq!(chained.parent(), flat.parent());
    }

    #[test]
    fn subpath_is_prefix(segments in prop::collection::vec(segment(), 0..6), cut in 0usize..6) {
        let path = Path::from_segments(segments.clone());
        let length = cut.min(path.size());
        let sub = path.subpath(length).unwrap();
        prop_assert_eq!(sub.size(), length);
        prop_assert!(path.starts_with(&sub));
    }
}

#[test]
fn textual_matrix() {
    let cases = [
        ("/", "/"),
        ("", "/"),
        ("a", "/a"),
        ("/a/b/", "/a/b"),
        ("/a~0b/c~1d", "/a~0b/c~1d"),
        ("  /x/0  ", "/x/0"),
    ];
    for (input, rendered) in cases {
        assert_eq!(Path::parse(input, true).to_string(), rendered, "input {input:?}");
    }
}

#[test]
fn unresolved_escapes_stay_literal() {
    let path = Path::parse("/a~1b/c", false);
    assert_eq!(path.segment(0), Some("a~1b"));
    // Rendering escapes the literal tilde, so resolving on re-parse restores it.
    assert_eq!(Path::parse(&path.to_string(), true), path);
}

#[test]
fn edge_segments_are_trimmed_on_reparse() {
    let cases: [(&[&str], &[&str]); 4] = [
        (&["a", "b "], &["a", "b"]),
        (&[" a", "b"], &["a", "b"]),
        (&["", "a"], &["a"]),
        (&["a", ""], &["a"]),
    ];
    for (built, reparsed) in cases {
        let path = Path::from_segments(built.iter().copied());
        assert_eq!(
            Path::parse(&path.to_string(), true),
            Path::from_segments(reparsed.iter().copied()),
            "segments {built:?}"
        );
    }

    let inner = Path::from_segments(["a", "", " b ", "c"]);
    assert_eq!(Path::parse(&inner.to_string(), true), inner);
}
