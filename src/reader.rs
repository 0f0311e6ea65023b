//! Pull-based reader: `spec.md` §4.5's `nextToken` algorithm, exposed
//! through the `next_token`/`next`/accessor surface named in §6. Modeled
//! on `tafia-quick-xml`'s `Reader<R>` (`src/reader.rs`): a byte source plus
//! a cursor over "the current event", queried through a handful of
//! state-gated accessor methods rather than an owned `Event` value per
//! call.
//!
//! `nextToken` surfaces every lead byte the stream contains; `next` filters
//! that down to the six "principal" [`EventType`]s
//! ([`EventType::is_principal`]) the way `spec.md` §4.5 describes. Comment,
//! PI, DocType, notation and declaration node kinds are read off the wire
//! (to keep the stream position correct for whatever follows) and then
//! discarded — `spec.md`'s own `nextToken` table marks every one of them
//! "(skipped)", not just comments.

use std::io::Read;

use crate::error::{Error, Result};
use crate::events::attributes::{Attribute, Attributes};
use crate::events::EventType;
use crate::format;
use crate::io::ByteReader;
use crate::name::ReaderNameTable;
use crate::namespace::{ActiveScope, NamespaceTable};
use crate::primitive;
use crate::shared::SharedValueTable;

#[derive(Debug)]
struct ElementFrame {
    namespace: u32,
    local: String,
}

#[derive(Debug)]
enum CurrentEvent {
    StartDocument,
    EndDocument,
    StartTag {
        namespace: u32,
        local: String,
        attributes: Attributes,
    },
    EndTag {
        namespace: u32,
        local: String,
    },
    Text(String),
    CData(String),
    /// Comment, PI, DocType, notation, and the various declaration kinds:
    /// `event_type()` reports which one occurred, but none of them expose
    /// their decoded payload (see the module doc comment).
    Transient(EventType),
}

impl CurrentEvent {
    fn event_type(&self) -> EventType {
        match self {
            CurrentEvent::StartDocument => EventType::StartDocument,
            CurrentEvent::EndDocument => EventType::EndDocument,
            CurrentEvent::StartTag { .. } => EventType::StartTag,
            CurrentEvent::EndTag { .. } => EventType::EndTag,
            CurrentEvent::Text(_) => EventType::Text,
            CurrentEvent::CData(_) => EventType::CData,
            CurrentEvent::Transient(ty) => *ty,
        }
    }
}

/// Pull-based reader over an XBIS byte stream.
#[derive(Debug)]
pub struct Reader<R> {
    inp: ByteReader<R>,
    /// The share-depth this stream's producer declared in its header
    /// capability byte. Needed, not just cosmetic: an inline attribute
    /// value is appended to the shared-attribute-value table precisely
    /// when its length meets this threshold (`spec.md` §4.1), and the
    /// reader must grow that table in the same places the writer did to
    /// keep handle numbering in lock step — there is no explicit "new" bit
    /// for attribute values the way there is for text (`NODE_TEXTREF_FLAG`).
    share_depth: usize,
    element_names: ReaderNameTable,
    attribute_names: ReaderNameTable,
    shared_content: SharedValueTable,
    shared_attr_values: SharedValueTable,
    namespaces: NamespaceTable,
    active: ActiveScope,
    frames: Vec<ElementFrame>,
    pending_namespaces: Vec<u32>,
    current: Option<CurrentEvent>,
    finished: bool,
}

impl<R: Read> Reader<R> {
    /// Reads and validates the header, expecting [`format::DEFAULT_SHARE_DEPTH`].
    pub fn new(inner: R) -> Result<Self> {
        Self::with_share_depth(inner, format::DEFAULT_SHARE_DEPTH)
    }

    /// Reads and validates the header, expecting `share_depth` to match the
    /// capability byte the producer wrote. A mismatch is rejected rather
    /// than silently tolerated: decoding attribute-value sharing with the
    /// wrong threshold would desynchronize the shared-attribute-value
    /// table's handle numbering from the one the writer built.
    pub fn with_share_depth(inner: R, share_depth: usize) -> Result<Self> {
        let mut inp = ByteReader::new(inner);
        let magic = inp.read_exact_vec(format::MAGIC.len())?;
        if magic.as_slice() != format::MAGIC.as_slice() {
            return Err(Error::Malformed("stream does not start with the XBIS magic sequence".into()));
        }
        let source_id = inp.read_byte()?;
        if source_id != format::SOURCE_ID {
            return Err(Error::Malformed(format!(
                "unrecognized source id 0x{:02x}",
                source_id
            )));
        }
        let declared = primitive::read_value(&mut inp)? as usize;
        if declared != share_depth {
            return Err(Error::Malformed(format!(
                "stream share-depth {} does not match configured share-depth {}",
                declared, share_depth
            )));
        }
        log::debug!("reader: header ok, share_depth={}", share_depth);
        Ok(Reader {
            inp,
            share_depth,
            element_names: ReaderNameTable::new(),
            attribute_names: ReaderNameTable::new(),
            shared_content: SharedValueTable::new(),
            shared_attr_values: SharedValueTable::new(),
            namespaces: NamespaceTable::new(),
            active: ActiveScope::new(),
            frames: Vec::new(),
            pending_namespaces: Vec::new(),
            current: None,
            finished: false,
        })
    }

    /// Restores the reader to its freshly constructed in-memory state (all
    /// handle tables, the element stack, the current-event cursor). Does
    /// not rewind the underlying byte source or re-read the header.
    pub fn reset(&mut self) {
        self.element_names.reset();
        self.attribute_names.reset();
        self.shared_content.reset();
        self.shared_attr_values.reset();
        self.namespaces.reset();
        self.active.reset();
        self.frames.clear();
        self.pending_namespaces.clear();
        self.current = None;
        self.finished = false;
    }

    /// Advances and decodes the next raw token, including kinds `next`
    /// filters out. Implements `spec.md` §4.5's `nextToken` loop.
    pub fn next_token(&mut self) -> Result<EventType> {
        if self.finished {
            return Err(Error::IllegalState("next_token called after END_DOCUMENT".into()));
        }
        loop {
            let lead = match self.inp.peek()? {
                None => {
                    if !self.frames.is_empty() {
                        return Err(Error::Malformed(
                            "end of stream with unclosed elements".into(),
                        ));
                    }
                    self.finished = true;
                    self.current = Some(CurrentEvent::EndDocument);
                    return Ok(EventType::EndDocument);
                }
                Some(b) => {
                    self.inp.read_byte()?;
                    b
                }
            };

            if lead == format::TERMINATOR {
                if let Some(frame) = self.frames.pop() {
                    self.active.pop_frame();
                    log::trace!("reader: end tag {:?} ns={}", frame.local, frame.namespace);
                    self.current = Some(CurrentEvent::EndTag {
                        namespace: frame.namespace,
                        local: frame.local,
                    });
                    return Ok(EventType::EndTag);
                }
                self.finished = true;
                self.current = Some(CurrentEvent::EndDocument);
                return Ok(EventType::EndDocument);
            } else if lead & format::NODE_ELEMENT_FLAG != 0 {
                return self.read_element_start(lead);
            } else if lead & format::NODE_PLAINTEXT_FLAG != 0 {
                let text = primitive::read_string(&mut self.inp)?;
                self.current = Some(CurrentEvent::Text(text));
                return Ok(EventType::Text);
            } else if lead & format::NODE_TEXTREF_FLAG != 0 {
                let text = if lead & format::TEXTREF_NEW_FLAG != 0 {
                    let s = primitive::read_string(&mut self.inp)?;
                    self.shared_content.push(&s);
                    s
                } else {
                    let handle = primitive::read_quick_value(&mut self.inp, lead, format::TEXTREF_HANDLE_MASK)? as u32;
                    self.shared_content
                        .get(handle)
                        .ok_or_else(|| Error::Malformed(format!("unknown shared-content handle {}", handle)))?
                        .to_string()
                };
                self.current = Some(CurrentEvent::Text(text));
                return Ok(EventType::Text);
            } else if lead & format::NODE_NAMESPACEDECL_FLAG != 0 {
                let handle = if lead & format::NSDECL_NEW_FLAG != 0 {
                    let prefix = primitive::read_string(&mut self.inp)?;
                    let uri = primitive::read_string(&mut self.inp)?;
                    let handle = self.namespaces.define(&prefix, &uri);
                    log::trace!("reader: defining namespace handle={} prefix={:?}", handle, prefix);
                    handle
                } else {
                    primitive::read_quick_value(&mut self.inp, lead, format::NSDECL_HANDLE_MASK)? as u32
                };
                self.pending_namespaces.push(handle);
                continue;
            } else {
                return self.read_discrete_node(lead);
            }
        }
    }

    /// `next`: `nextToken` filtered to `START_DOCUMENT`, `END_DOCUMENT`,
    /// `START_TAG`, `END_TAG`, `TEXT`, `CDSECT`.
    pub fn next(&mut self) -> Result<EventType> {
        loop {
            let ty = self.next_token()?;
            if ty.is_principal() {
                return Ok(ty);
            }
        }
    }

    fn read_element_start(&mut self, lead: u8) -> Result<EventType> {
        let is_new = lead & format::ELEMENT_NEWNAME_FLAG != 0;
        let has_attrs = lead & format::ELEMENT_HASATTRIBUTES_FLAG != 0;
        let (namespace, local) = if is_new {
            let namespace = primitive::read_value(&mut self.inp)? as u32;
            let local = primitive::read_string(&mut self.inp)?;
            let handle = self.element_names.define(namespace, &local);
            log::trace!("reader: defining element handle={} local={:?}", handle, local);
            (namespace, local)
        } else {
            let handle = primitive::read_quick_value(&mut self.inp, lead, format::ELEMENT_HANDLE_MASK)? as u32;
            let name = self
                .element_names
                .get(handle)
                .ok_or_else(|| Error::Malformed(format!("unknown element handle {}", handle)))?;
            (name.namespace, name.local.clone())
        };
        let attributes = if has_attrs {
            self.read_attribute_list()?
        } else {
            Attributes::new(Vec::new())
        };
        let declared_here = std::mem::take(&mut self.pending_namespaces);
        self.active.push_frame(declared_here);
        log::debug!(
            "reader: start tag ns={} local={:?} attrs={}",
            namespace,
            local,
            attributes.len()
        );
        self.frames.push(ElementFrame {
            namespace,
            local: local.clone(),
        });
        self.current = Some(CurrentEvent::StartTag {
            namespace,
            local,
            attributes,
        });
        Ok(EventType::StartTag)
    }

    fn read_attribute_list(&mut self) -> Result<Attributes> {
        let mut items = Vec::new();
        loop {
            let b = self.inp.read_byte()?;
            if b == format::TERMINATOR {
                break;
            }
            let (namespace, local_name) = if b & format::ATTRIBUTE_NEWREF_FLAG != 0 {
                let namespace = primitive::read_value(&mut self.inp)? as u32;
                let local = primitive::read_string(&mut self.inp)?;
                self.attribute_names.define(namespace, &local);
                (namespace, local)
            } else {
                let handle = primitive::read_quick_value(&mut self.inp, b, format::ATTRIBUTE_HANDLE_MASK)? as u32;
                let name = self
                    .attribute_names
                    .get(handle)
                    .ok_or_else(|| Error::Malformed(format!("unknown attribute handle {}", handle)))?;
                (name.namespace, name.local.clone())
            };
            let value_lead = self.inp.read_byte()?;
            let value = if value_lead & format::ATTRIBUTE_VALUEREF_FLAG != 0 {
                let handle = primitive::read_quick_value(&mut self.inp, value_lead, format::ATTRIBUTE_VALUE_HANDLE_MASK)? as u32;
                self.shared_attr_values
                    .get(handle)
                    .ok_or_else(|| Error::Malformed(format!("unknown shared attribute-value handle {}", handle)))?
                    .to_string()
            } else {
                let s = primitive::read_string(&mut self.inp)?;
                if s.len() >= self.share_depth {
                    self.shared_attr_values.push(&s);
                }
                s
            };
            items.push(Attribute {
                local_name,
                namespace,
                value,
            });
        }
        Ok(Attributes::new(items))
    }

    fn read_discrete_node(&mut self, lead: u8) -> Result<EventType> {
        match lead {
            format::NODE_TYPE_DOCUMENT => {
                self.current = Some(CurrentEvent::StartDocument);
                Ok(EventType::StartDocument)
            }
            format::NODE_TYPE_CDATA => {
                let text = primitive::read_string(&mut self.inp)?;
                self.current = Some(CurrentEvent::CData(text));
                Ok(EventType::CData)
            }
            format::NODE_TYPE_COMMENT => self.skip_discrete(1, EventType::Comment),
            format::NODE_TYPE_PI => self.skip_discrete(2, EventType::ProcessingInstruction),
            format::NODE_TYPE_DOCTYPE => self.skip_discrete(3, EventType::DocType),
            format::NODE_TYPE_NOTATION => self.skip_discrete(3, EventType::Notation),
            format::NODE_TYPE_ELEMENTDECL => self.skip_discrete(2, EventType::ElementDecl),
            format::NODE_TYPE_ATTRIBUTEDECL => self.skip_discrete(5, EventType::AttributeDecl),
            format::NODE_TYPE_EXTERNALENTITYDECL => self.skip_discrete(3, EventType::ExternalEntityDecl),
            format::NODE_TYPE_UNPARSEDENTITY => self.skip_discrete(4, EventType::UnparsedEntity),
            format::NODE_TYPE_SKIPPEDENTITY => self.skip_discrete(1, EventType::SkippedEntity),
            other => Err(Error::UnknownNodeType(other)),
        }
    }

    fn skip_discrete(&mut self, string_count: usize, ty: EventType) -> Result<EventType> {
        for _ in 0..string_count {
            primitive::read_string(&mut self.inp)?;
        }
        self.current = Some(CurrentEvent::Transient(ty));
        Ok(ty)
    }

    fn current(&self) -> Result<&CurrentEvent> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::IllegalState("no current event; call next_token or next first".into()))
    }

    /// The current event's kind, without advancing.
    pub fn event_type(&self) -> Result<EventType> {
        self.current().map(CurrentEvent::event_type)
    }

    /// Valid at `START_TAG`/`END_TAG`.
    pub fn name(&self) -> Result<&str> {
        match self.current()? {
            CurrentEvent::StartTag { local, .. } | CurrentEvent::EndTag { local, .. } => Ok(local),
            _ => Err(Error::IllegalState("name() is only valid at START_TAG/END_TAG".into())),
        }
    }

    /// Valid at `START_TAG`/`END_TAG`.
    pub fn namespace(&self) -> Result<&str> {
        match self.current()? {
            CurrentEvent::StartTag { namespace, .. } | CurrentEvent::EndTag { namespace, .. } => {
                Ok(self.namespaces.get(*namespace).map(|n| n.uri.as_str()).unwrap_or(""))
            }
            _ => Err(Error::IllegalState("namespace() is only valid at START_TAG/END_TAG".into())),
        }
    }

    /// Valid at `START_TAG`/`END_TAG`.
    pub fn prefix(&self) -> Result<&str> {
        match self.current()? {
            CurrentEvent::StartTag { namespace, .. } | CurrentEvent::EndTag { namespace, .. } => {
                Ok(self.namespaces.get(*namespace).map(|n| n.prefix.as_str()).unwrap_or(""))
            }
            _ => Err(Error::IllegalState("prefix() is only valid at START_TAG/END_TAG".into())),
        }
    }

    fn current_attributes(&self) -> Result<&Attributes> {
        match self.current()? {
            CurrentEvent::StartTag { attributes, .. } => Ok(attributes),
            _ => Err(Error::IllegalState("attribute access is only valid at START_TAG".into())),
        }
    }

    pub fn attribute_count(&self) -> Result<usize> {
        self.current_attributes().map(Attributes::len)
    }

    fn attribute_at(&self, index: usize) -> Result<&Attribute> {
        self.current_attributes()?
            .get(index)
            .ok_or_else(|| Error::IllegalState(format!("attribute index {} out of range", index)))
    }

    pub fn attribute_name(&self, index: usize) -> Result<&str> {
        self.attribute_at(index).map(|a| a.local_name.as_str())
    }

    pub fn attribute_namespace(&self, index: usize) -> Result<&str> {
        let attr = self.attribute_at(index)?;
        Ok(self.namespaces.get(attr.namespace).map(|n| n.uri.as_str()).unwrap_or(""))
    }

    pub fn attribute_prefix(&self, index: usize) -> Result<&str> {
        let attr = self.attribute_at(index)?;
        Ok(self.namespaces.get(attr.namespace).map(|n| n.prefix.as_str()).unwrap_or(""))
    }

    pub fn attribute_value(&self, index: usize) -> Result<&str> {
        self.attribute_at(index).map(|a| a.value.as_str())
    }

    /// Looks an attribute up by `(namespace URI, local name)`; `None` and
    /// `Some("")` are equivalent for `namespace_uri` (`spec.md` §4.6).
    pub fn attribute_value_by_name(&self, namespace_uri: Option<&str>, local_name: &str) -> Result<Option<&str>> {
        let attrs = self.current_attributes()?;
        let namespaces = &self.namespaces;
        Ok(attrs.value_by_name(namespace_uri, local_name, move |h| {
            namespaces.get(h).map(|n| n.uri.as_str()).unwrap_or("")
        }))
    }

    /// Valid at `TEXT`/`CDSECT`.
    pub fn text(&self) -> Result<&str> {
        match self.current()? {
            CurrentEvent::Text(s) | CurrentEvent::CData(s) => Ok(s),
            _ => Err(Error::IllegalState("text() is only valid at TEXT/CDSECT".into())),
        }
    }

    /// Always `true` — this codec has no non-namespace-aware mode.
    pub fn is_namespace_aware(&self) -> bool {
        true
    }

    /// Unspecified (`spec.md` §9 Open Question 3): this codec is not
    /// byte-encoding-oriented, text is always UTF-8.
    pub fn input_encoding(&self) -> Option<&str> {
        None
    }

    /// Unspecified sentinel (`spec.md` §9 Open Question 3).
    pub fn document_name(&self) -> Option<&str> {
        None
    }

    /// Unspecified sentinel (`spec.md` §9 Open Question 3): position
    /// reporting is not part of this codec's core.
    pub fn line_number(&self) -> i64 {
        -1
    }

    /// Unspecified sentinel (`spec.md` §9 Open Question 3).
    pub fn column_number(&self) -> i64 {
        -1
    }
}
