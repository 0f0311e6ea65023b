//! The reader's event surface (`spec.md` §4.5/§6): a lightweight
//! [`EventType`] cursor plus the `attributes` submodule used to query an
//! open start tag, modeled on `tafia-quick-xml`'s `events/mod.rs` +
//! `events/attributes.rs` split.

pub mod attributes;

/// Every event kind the reader's `next_token` can produce. `next` filters
/// this down to the six "principal" kinds (`spec.md` §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    StartDocument,
    EndDocument,
    StartTag,
    EndTag,
    Text,
    CData,
    /// Transient: content was decoded off the wire (to keep the stream
    /// position consistent) and then discarded, matching `spec.md` §4.5's
    /// "(skipped)" annotation — there is no accessor for it.
    Comment,
    ProcessingInstruction,
    DocType,
    Notation,
    ElementDecl,
    AttributeDecl,
    ExternalEntityDecl,
    UnparsedEntity,
    SkippedEntity,
}

impl EventType {
    /// Whether `next()` surfaces this event kind directly (`spec.md` §4.5:
    /// "consolidates by filtering out events other than START_DOCUMENT,
    /// END_DOCUMENT, START_TAG, END_TAG, TEXT, CDSECT").
    pub fn is_principal(self) -> bool {
        matches!(
            self,
            EventType::StartDocument
                | EventType::EndDocument
                | EventType::StartTag
                | EventType::EndTag
                | EventType::Text
                | EventType::CData
        )
    }
}
