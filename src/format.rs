//! Wire-format constants: header bytes, lead-byte flags, discrete node types.
//!
//! The lead-byte flag families are tested in priority order by the reader
//! (`spec.md` §4.5): `NODE_ELEMENT_FLAG` first, then `NODE_PLAINTEXT_FLAG`,
//! then `NODE_TEXTREF_FLAG`, then `NODE_NAMESPACEDECL_FLAG`. Because the
//! reader never tests a lower-priority flag once a higher one has matched,
//! each matched byte is free to reuse the unmatched higher bits for its own
//! payload — see DESIGN.md Open Question #1 for the full reasoning.

/// Fixed magic sequence that opens every XBIS stream.
pub const MAGIC: &[u8; 4] = b"XBIS";

/// Producer-dialect byte following the magic sequence. This codec always
/// writes and expects this value.
pub const SOURCE_ID: u8 = 0x01;

/// Default share-depth: the minimum string length, in UTF-8 bytes, at which
/// a text or attribute value becomes eligible for the shared-value tables.
pub const DEFAULT_SHARE_DEPTH: usize = 6;

/// Zero-byte list terminator: end of attributes, end of an element's
/// children, or end of the document-child list.
pub const TERMINATOR: u8 = 0x00;

// --- top-level lead-byte flags (bits 7..4) ---------------------------------

/// Element start. See [`ELEMENT_HASATTRIBUTES_FLAG`], [`ELEMENT_HASCHILDREN_FLAG`],
/// [`ELEMENT_NEWNAME_FLAG`], [`ELEMENT_HANDLE_MASK`] for the rest of this byte.
pub const NODE_ELEMENT_FLAG: u8 = 0b1000_0000;
/// Text content short enough that sharing was never considered.
pub const NODE_PLAINTEXT_FLAG: u8 = 0b0100_0000;
/// Text content at or above the share-depth threshold: either a new
/// shared-content definition or a reference to one.
pub const NODE_TEXTREF_FLAG: u8 = 0b0010_0000;
/// In-band namespace declaration.
pub const NODE_NAMESPACEDECL_FLAG: u8 = 0b0001_0000;

/// Mask selecting the four flag bits above.
pub const TOP_FLAG_MASK: u8 = NODE_ELEMENT_FLAG | NODE_PLAINTEXT_FLAG | NODE_TEXTREF_FLAG | NODE_NAMESPACEDECL_FLAG;

// --- element lead byte (bit 7 set): bits 6..0 are element-local -----------

/// Set once the element's attribute list is non-empty.
pub const ELEMENT_HASATTRIBUTES_FLAG: u8 = 0b0100_0000;
/// Set by back-patching the mark once the first child node is observed.
/// Never set by attributes alone; informational only, the reader does not
/// rely on it to find the end of the child list (it reads to the 0
/// terminator either way).
pub const ELEMENT_HASCHILDREN_FLAG: u8 = 0b0010_0000;
/// Set when the element name that follows has never been assigned a handle:
/// a namespace reference and local name follow, and the next element handle
/// is assigned to them.
pub const ELEMENT_NEWNAME_FLAG: u8 = 0b0001_0000;
/// Quick-value field carrying an existing element-name handle reference,
/// inline capacity 0..14, sentinel 15 means "read a continuation `value`".
pub const ELEMENT_HANDLE_MASK: u8 = 0b0000_1111;

// --- shared-content reference byte (bit 5 set): bits 4..0 are local -------

/// Set when the shared-content string that follows is new: read it and
/// append to the shared-content table, assigning the next handle.
pub const TEXTREF_NEW_FLAG: u8 = 0b0001_0000;
/// Quick-value field carrying an existing shared-content handle reference.
pub const TEXTREF_HANDLE_MASK: u8 = 0b0000_1111;

// --- namespace declaration byte (bit 4 set): bits 3..0 are local ----------

/// Set when the namespace that follows is new: a prefix string and a URI
/// string follow, and the next namespace handle is assigned.
pub const NSDECL_NEW_FLAG: u8 = 0b0000_1000;
/// Quick-value field carrying an existing namespace handle reference.
pub const NSDECL_HANDLE_MASK: u8 = 0b0000_0111;

// --- attribute name byte (own tagged byte, inside the attribute list) ----

/// Set when the attribute name that follows is new: a namespace reference
/// and local name follow, and the next attribute handle is assigned.
///
/// This cannot collide with [`TERMINATOR`]: the all-zero byte has this flag
/// clear and a zero handle field, and handle 0 is never assigned, so a
/// plain `0x00` is unambiguous as "end of attribute list".
pub const ATTRIBUTE_NEWREF_FLAG: u8 = 0b1000_0000;
/// Quick-value field carrying an existing attribute-name handle reference.
pub const ATTRIBUTE_HANDLE_MASK: u8 = 0b0111_1111;

// --- attribute value byte (own tagged byte, follows the name byte) -------

/// Set when the value is a reference into the shared-attribute-value table
/// (bits 6..0 hold the quick-value handle). Clear means an inline,
/// length-prefixed string follows; if that string's length meets the
/// share-depth threshold it is also appended to the shared table so both
/// sides grow it identically without any extra "new" bit.
pub const ATTRIBUTE_VALUEREF_FLAG: u8 = 0b1000_0000;
/// Quick-value field carrying an existing shared-attribute-value handle.
pub const ATTRIBUTE_VALUE_HANDLE_MASK: u8 = 0b0111_1111;

// --- discrete node-type bytes (bits 7..4 clear, i.e. value < 0x10) --------

/// Document start.
pub const NODE_TYPE_DOCUMENT: u8 = 1;
/// CDATA section: one string, never shared.
pub const NODE_TYPE_CDATA: u8 = 2;
/// Comment: one string.
pub const NODE_TYPE_COMMENT: u8 = 3;
/// Processing instruction: two strings (target, data).
pub const NODE_TYPE_PI: u8 = 4;
/// Document type declaration: three strings (root name, public id, system id).
pub const NODE_TYPE_DOCTYPE: u8 = 5;
/// Notation declaration: three strings (name, public id, system id).
pub const NODE_TYPE_NOTATION: u8 = 6;
/// Element declaration: two strings (name, content model).
pub const NODE_TYPE_ELEMENTDECL: u8 = 7;
/// Attribute-list declaration: five strings (element name, attribute name,
/// type, default-value type, default value).
pub const NODE_TYPE_ATTRIBUTEDECL: u8 = 8;
/// External entity declaration: three strings (name, public id, system id).
pub const NODE_TYPE_EXTERNALENTITYDECL: u8 = 9;
/// Unparsed entity declaration: four strings (name, public id, system id,
/// notation name).
pub const NODE_TYPE_UNPARSEDENTITY: u8 = 10;
/// Skipped entity reference: one string (name).
pub const NODE_TYPE_SKIPPEDENTITY: u8 = 11;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_flags_are_distinct_bits() {
        let flags = [
            NODE_ELEMENT_FLAG,
            NODE_PLAINTEXT_FLAG,
            NODE_TEXTREF_FLAG,
            NODE_NAMESPACEDECL_FLAG,
        ];
        for (i, a) in flags.iter().enumerate() {
            for (j, b) in flags.iter().enumerate() {
                if i != j {
                    assert_eq!(a & b, 0);
                }
            }
        }
    }

    #[test]
    fn discrete_node_types_never_collide_with_top_flags() {
        for ty in [
            NODE_TYPE_DOCUMENT,
            NODE_TYPE_CDATA,
            NODE_TYPE_COMMENT,
            NODE_TYPE_PI,
            NODE_TYPE_DOCTYPE,
            NODE_TYPE_NOTATION,
            NODE_TYPE_ELEMENTDECL,
            NODE_TYPE_ATTRIBUTEDECL,
            NODE_TYPE_EXTERNALENTITYDECL,
            NODE_TYPE_UNPARSEDENTITY,
            NODE_TYPE_SKIPPEDENTITY,
        ] {
            assert_eq!(ty & TOP_FLAG_MASK, 0);
            assert_ne!(ty, TERMINATOR);
        }
    }

    #[test]
    fn terminator_never_matches_attribute_newref() {
        assert_eq!(TERMINATOR & ATTRIBUTE_NEWREF_FLAG, 0);
        assert_eq!(TERMINATOR & ATTRIBUTE_HANDLE_MASK, 0);
    }
}
