//! End-to-end scenarios S1-S6 and the quantified invariants from
//! `spec.md` §8, driving [`xbis::Writer`] and [`xbis::Reader`] together
//! rather than either in isolation.

use pretty_assertions::assert_eq;
use xbis::{EventType, Reader, Writer};

fn encode(build: impl FnOnce(&mut Writer<Vec<u8>>) -> xbis::Result<()>) -> Vec<u8> {
    let mut w = Writer::new(Vec::new()).unwrap();
    build(&mut w).unwrap();
    w.close().unwrap();
    w.into_inner().unwrap()
}

#[test]
fn s1_empty_document() {
    let bytes = encode(|w| w.write_xml_decl());
    let mut r = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

#[test]
fn s2_single_empty_element_has_children_flag_clear() {
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.start_tag_open("", "", "a")?;
        w.close_empty_tag()
    });
    let mut r = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.name().unwrap(), "a");
    assert_eq!(r.namespace().unwrap(), "");
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

#[test]
fn s3_nested_element_with_text_sets_haschildren_on_both() {
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.start_tag_open("", "", "a")?;
        w.close_start_tag()?;
        w.start_tag_open("", "", "b")?;
        w.close_start_tag()?;
        w.write_text_content("hi")?;
        w.end_tag("", "", "b")?;
        w.end_tag("", "", "a")
    });
    let mut r = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.name().unwrap(), "a");
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.name().unwrap(), "b");
    assert_eq!(r.next().unwrap(), EventType::Text);
    assert_eq!(r.text().unwrap(), "hi");
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

#[test]
fn s4_attribute_sharing() {
    const LONG: &str = "this-value-is-long-enough-to-share";
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.start_tag_open("", "", "r")?;
        w.close_start_tag()?;
        for _ in 0..10 {
            w.start_tag_open("", "", "c")?;
            w.add_attribute("", "", "x", LONG)?;
            w.close_empty_tag()?;
        }
        w.end_tag("", "", "r")
    });
    let needle = LONG.as_bytes();
    let occurrences = bytes.windows(needle.len()).filter(|w| *w == needle).count();
    assert_eq!(occurrences, 1, "LONGVALUE must appear exactly once on the wire");

    let mut r = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    for _ in 0..10 {
        assert_eq!(r.next().unwrap(), EventType::StartTag);
        assert_eq!(r.attribute_count().unwrap(), 1);
        assert_eq!(r.attribute_value(0).unwrap(), LONG);
        assert_eq!(r.next().unwrap(), EventType::EndTag);
    }
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

#[test]
fn s5_namespace_scoping_ends_at_matching_end_tag() {
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.begin_namespace_mapping("p", "urn:x")?;
        w.start_tag_open("p", "urn:x", "e")?;
        w.close_empty_tag()?;
        w.start_tag_open("", "", "f")?;
        w.close_empty_tag()
    });
    let mut r = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.name().unwrap(), "e");
    assert_eq!(r.namespace().unwrap(), "urn:x");
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.name().unwrap(), "f");
    assert_eq!(r.namespace().unwrap(), "", "urn:x is no longer in scope");
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

#[test]
fn s6_same_local_name_two_namespaces_get_distinct_handles() {
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.start_tag_open("", "urn:a", "v")?;
        w.close_empty_tag()?;
        w.start_tag_open("", "urn:b", "v")?;
        w.close_empty_tag()
    });
    let mut r = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.namespace().unwrap(), "urn:a");
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.namespace().unwrap(), "urn:b");
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

/// Invariant 1(a)/1(b): round-tripping a document with mixed content
/// doesn't insert whitespace or surface namespace declarations as events.
#[test]
fn roundtrip_preserves_structure_without_inserting_whitespace() {
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.begin_namespace_mapping("p", "urn:x")?;
        w.start_tag_open("p", "urn:x", "root")?;
        w.add_attribute("", "", "id", "1")?;
        w.close_start_tag()?;
        w.write_text_content("no")?;
        w.write_text_content("pad")?;
        w.end_tag("p", "urn:x", "root")
    });
    let mut r = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.attribute_value(0).unwrap(), "1");
    assert_eq!(r.next().unwrap(), EventType::Text);
    assert_eq!(r.text().unwrap(), "no");
    assert_eq!(r.next().unwrap(), EventType::Text);
    assert_eq!(r.text().unwrap(), "pad");
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

/// Invariant 1(c): entity references have no wire representation and are
/// rejected before any byte is emitted for them.
#[test]
fn unsupported_event_kind_rejected_before_encode() {
    let mut w = Writer::new(Vec::new()).unwrap();
    w.write_xml_decl().unwrap();
    let err = w.write_entity_ref("amp").unwrap_err();
    assert!(matches!(err, xbis::Error::UnsupportedOperation("write_entity_ref")));
}

/// Invariant 2: re-encoding what was just decoded reproduces the same
/// bytes, i.e. the reader is lossless and the writer is deterministic for
/// a single decode pass.
#[test]
fn byte_level_canonicalization_is_stable() {
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.start_tag_open("", "", "a")?;
        w.add_attribute("", "", "k", "v")?;
        w.close_start_tag()?;
        w.write_text_content("hi")?;
        w.end_tag("", "", "a")
    });

    let mut r = Reader::new(bytes.as_slice()).unwrap();
    let mut w2 = Writer::new(Vec::new()).unwrap();
    loop {
        match r.next_token().unwrap() {
            EventType::StartDocument => w2.write_xml_decl().unwrap(),
            EventType::StartTag => {
                let local = r.name().unwrap().to_string();
                let ns = r.namespace().unwrap().to_string();
                w2.start_tag_open("", &ns, &local).unwrap();
                for i in 0..r.attribute_count().unwrap() {
                    let aname = r.attribute_name(i).unwrap().to_string();
                    let ans = r.attribute_namespace(i).unwrap().to_string();
                    let avalue = r.attribute_value(i).unwrap().to_string();
                    w2.add_attribute("", &ans, &aname, &avalue).unwrap();
                }
                w2.close_start_tag().unwrap();
            }
            EventType::EndTag => {
                let local = r.name().unwrap().to_string();
                let ns = r.namespace().unwrap().to_string();
                w2.end_tag("", &ns, &local).unwrap();
            }
            EventType::Text => {
                let text = r.text().unwrap().to_string();
                w2.write_text_content(&text).unwrap();
            }
            EventType::EndDocument => break,
            other => panic!("unexpected event {:?}", other),
        }
    }
    w2.close().unwrap();
    assert_eq!(w2.into_inner().unwrap(), bytes);
}

/// Invariant 3: a handle is always defined strictly before any reference
/// to it — exercised here by repeating the same element/attribute/text
/// three times and confirming the decoded identity is consistent.
#[test]
fn handle_monotonicity_across_repeats() {
    const LONG_TEXT: &str = "repeated-enough-to-be-shared-text";
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.start_tag_open("", "", "root")?;
        w.close_start_tag()?;
        for _ in 0..3 {
            w.start_tag_open("", "", "item")?;
            w.add_attribute("", "", "tag", "same-value-1234")?;
            w.close_start_tag()?;
            w.write_text_content(LONG_TEXT)?;
            w.end_tag("", "", "item")?;
        }
        w.end_tag("", "", "root")
    });
    let mut r = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    for _ in 0..3 {
        assert_eq!(r.next().unwrap(), EventType::StartTag);
        assert_eq!(r.name().unwrap(), "item");
        assert_eq!(r.attribute_value(0).unwrap(), "same-value-1234");
        assert_eq!(r.next().unwrap(), EventType::Text);
        assert_eq!(r.text().unwrap(), LONG_TEXT);
        assert_eq!(r.next().unwrap(), EventType::EndTag);
    }
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

/// Invariant 5: a 0x00 byte found at a lead-byte position (top of the
/// child-event loop, top of the attribute-list loop) always means "list
/// ends here", and is never misread when it instead occurs as payload: a
/// length-prefixed string is free to embed a literal NUL byte because the
/// reader consumes it by byte count, not by scanning for a delimiter.
#[test]
fn zero_byte_is_unambiguous_even_inside_payload() {
    let text_with_nul = "before\0after-padded-long-enough-to-share";
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.start_tag_open("", "", "root")?;
        w.add_attribute("", "", "a", "x\0y")?;
        w.close_start_tag()?;
        w.write_text_content(text_with_nul)?;
        w.start_tag_open("", "", "child")?;
        w.close_empty_tag()?;
        w.end_tag("", "", "root")
    });
    let mut r = Reader::new(bytes.as_slice()).unwrap();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.attribute_value(0).unwrap(), "x\0y");
    assert_eq!(r.next().unwrap(), EventType::Text);
    assert_eq!(r.text().unwrap(), text_with_nul);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

/// Invariant 7: resetting twice in a row is identical to resetting once,
/// and resetting a writer that never did anything is a no-op.
#[test]
fn reset_is_idempotent() {
    // No-op on a fresh instance: output is unaffected by a reset before any
    // write.
    let plain = {
        let mut w = Writer::new(Vec::new()).unwrap();
        w.write_xml_decl().unwrap();
        w.close().unwrap();
        w.into_inner().unwrap()
    };
    let after_noop_reset = {
        let mut w = Writer::new(Vec::new()).unwrap();
        w.reset();
        w.write_xml_decl().unwrap();
        w.close().unwrap();
        w.into_inner().unwrap()
    };
    assert_eq!(plain, after_noop_reset);

    // Two consecutive resets leave the same fresh starting point as one:
    // the same document written after either produces identical bytes.
    let after_one_reset = {
        let mut w = Writer::new(Vec::new()).unwrap();
        w.reset();
        w.write_xml_decl().unwrap();
        w.start_tag_open("", "", "a").unwrap();
        w.close_empty_tag().unwrap();
        w.close().unwrap();
        w.into_inner().unwrap()
    };
    let after_two_resets = {
        let mut w = Writer::new(Vec::new()).unwrap();
        w.reset();
        w.reset();
        w.write_xml_decl().unwrap();
        w.start_tag_open("", "", "a").unwrap();
        w.close_empty_tag().unwrap();
        w.close().unwrap();
        w.into_inner().unwrap()
    };
    assert_eq!(after_one_reset, after_two_resets);

    let mut r = Reader::new(after_two_resets.as_slice()).unwrap();
    r.reset();
    r.reset();
    assert_eq!(r.next().unwrap(), EventType::StartDocument);
    assert_eq!(r.next().unwrap(), EventType::StartTag);
    assert_eq!(r.next().unwrap(), EventType::EndTag);
    assert_eq!(r.next().unwrap(), EventType::EndDocument);
}

/// Invariant 8: below share-depth, nothing is ever shared even on repeat;
/// at/above share-depth, a repeated value is shared starting with its
/// second occurrence.
#[test]
fn share_threshold_law() {
    let short_repeated = "abcd"; // shorter than the default share-depth (6)
    let long_repeated = "abcdefgh"; // at/above the default share-depth
    let bytes = encode(|w| {
        w.write_xml_decl()?;
        w.start_tag_open("", "", "root")?;
        w.close_start_tag()?;
        for _ in 0..3 {
            w.write_text_content(short_repeated)?;
            w.write_text_content(long_repeated)?;
        }
        w.end_tag("", "", "root")
    });
    let short_count = bytes
        .windows(short_repeated.len())
        .filter(|w| *w == short_repeated.as_bytes())
        .count();
    let long_count = bytes
        .windows(long_repeated.len())
        .filter(|w| *w == long_repeated.as_bytes())
        .count();
    assert_eq!(short_count, 3, "below share-depth, every occurrence is written by value");
    assert_eq!(long_count, 1, "at/above share-depth, only the first occurrence is written by value");
}
