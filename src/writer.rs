//! Push-based writer: `spec.md` §4.4's element-start/attribute/end-tag
//! algorithm, exposed through the naming from §6's external interface
//! table. Modeled on `tafia-quick-xml`'s `Writer<W: Write>` (`src/writer.rs`):
//! a thin struct wrapping a generic sink plus per-call dispatch, here
//! extended with the handle tables and the deferred lead-byte patch XBIS
//! needs that angle-bracket XML never did.
//!
//! An element's lead byte cannot be finalized at `start_tag_open` time: its
//! `ELEMENT_HASATTRIBUTES_FLAG` bit depends on attributes added after the
//! call, and its `ELEMENT_HASCHILDREN_FLAG` bit depends on what, if
//! anything, gets written before the matching `end_tag`. So `start_tag_open`
//! only stages a [`PendingElement`]; the lead byte is physically written by
//! [`Writer::close_start_tag`] / [`Writer::close_empty_tag`], and
//! `ELEMENT_HASCHILDREN_FLAG` is back-patched into the *parent* frame's
//! already-written lead byte the moment this element's own lead byte goes
//! out (`spec.md` §5's buffer-mark invariant, upheld by [`crate::io::ByteWriter`]
//! never flushing on its own).

use std::cell::RefCell;
use std::collections::HashSet;
use std::io::Write;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::format;
use crate::io::ByteWriter;
use crate::name::WriterNameTable;
use crate::namespace::NamespaceTable;
use crate::primitive;
use crate::shared::SharedValueTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    InDocument,
    Closed,
}

struct PendingAttribute {
    namespace: u32,
    local: String,
    value: String,
}

struct PendingElement {
    namespace: u32,
    local: String,
    attributes: Vec<PendingAttribute>,
}

/// One open element frame: the mark of its own lead byte (for the
/// `ELEMENT_HASCHILDREN_FLAG` back-patch) and its own identity, kept so
/// [`Writer::end_tag`] can check the caller closed the element it thinks it
/// did.
struct ElementFrame {
    mark: usize,
    namespace: u32,
    local: String,
}

/// The state actually shared between a writer and any
/// [`Writer::create_child_writer`] it spawns: one handle space, one byte
/// sink, one frame stack. `spec.md` §5: "a child writer shares the parent's
/// underlying byte writer and must not be used concurrently with it."
struct WriterCore<W> {
    out: ByteWriter<W>,
    share_depth: usize,
    element_names: WriterNameTable,
    attribute_names: WriterNameTable,
    shared_content: SharedValueTable,
    shared_attr_values: SharedValueTable,
    namespaces: NamespaceTable,
    namespace_defined_on_wire: HashSet<u32>,
    pending_namespaces: Vec<u32>,
    frames: Vec<ElementFrame>,
    pending_element: Option<PendingElement>,
    phase: Phase,
}

impl<W: Write> WriterCore<W> {
    /// Writes the stream header: magic, source id, and the one capability
    /// byte `spec.md` §6 names ("share depths etc.") — this codec's share
    /// depth, as a `value` so a future larger threshold never needs a wire
    /// format change.
    fn new(inner: W, share_depth: usize) -> Result<Self> {
        let mut namespace_defined_on_wire = HashSet::new();
        namespace_defined_on_wire.insert(crate::namespace::EMPTY_NAMESPACE_HANDLE);
        namespace_defined_on_wire.insert(crate::namespace::XML_NAMESPACE_HANDLE);
        let mut out = ByteWriter::new(inner);
        out.write_bytes(format::MAGIC)?;
        out.write_byte(format::SOURCE_ID)?;
        primitive::write_value(&mut out, share_depth as u64)?;
        Ok(WriterCore {
            out,
            share_depth,
            element_names: WriterNameTable::new(),
            attribute_names: WriterNameTable::new(),
            shared_content: SharedValueTable::new(),
            shared_attr_values: SharedValueTable::new(),
            namespaces: NamespaceTable::new(),
            namespace_defined_on_wire,
            pending_namespaces: Vec::new(),
            frames: Vec::new(),
            pending_element: None,
            phase: Phase::Idle,
        })
    }

    fn reset(&mut self) {
        self.element_names.reset();
        self.attribute_names.reset();
        self.shared_content.reset();
        self.shared_attr_values.reset();
        self.namespaces.reset();
        self.namespace_defined_on_wire.clear();
        self.namespace_defined_on_wire
            .insert(crate::namespace::EMPTY_NAMESPACE_HANDLE);
        self.namespace_defined_on_wire
            .insert(crate::namespace::XML_NAMESPACE_HANDLE);
        self.pending_namespaces.clear();
        self.frames.clear();
        self.pending_element = None;
        self.phase = Phase::Idle;
    }

    fn require_in_document(&self, op: &'static str) -> Result<()> {
        if self.phase != Phase::InDocument {
            return Err(Error::IllegalState(format!(
                "{} called outside an open document (call write_xml_decl first)",
                op
            )));
        }
        Ok(())
    }

    fn require_no_pending_element(&self, op: &'static str) -> Result<()> {
        if self.pending_element.is_some() {
            return Err(Error::IllegalState(format!(
                "{} called with a start tag open (call close_start_tag or close_empty_tag first)",
                op
            )));
        }
        Ok(())
    }

    /// Interns `(prefix, uri)` and, if this handle has never been declared
    /// on the wire and isn't already waiting to be, queues it for the next
    /// element start.
    fn ensure_namespace_pending(&mut self, prefix: &str, uri: &str) -> u32 {
        let handle = self.namespaces.intern(prefix, uri);
        if !self.namespace_defined_on_wire.contains(&handle)
            && !self.pending_namespaces.contains(&handle)
        {
            self.pending_namespaces.push(handle);
        }
        handle
    }

    fn mark_parent_has_content(&mut self) {
        if let Some(frame) = self.frames.last() {
            let mark = frame.mark;
            self.out.patch(mark, |b| b | format::ELEMENT_HASCHILDREN_FLAG);
        }
    }

    fn emit_namespace_decl(&mut self, handle: u32) -> Result<()> {
        if self.namespace_defined_on_wire.insert(handle) {
            let ns = self
                .namespaces
                .get(handle)
                .expect("a pending namespace handle must already be interned")
                .clone();
            log::trace!("writer: defining namespace handle={} prefix={:?}", handle, ns.prefix);
            self.out
                .write_byte(format::NODE_NAMESPACEDECL_FLAG | format::NSDECL_NEW_FLAG)?;
            primitive::write_string(&mut self.out, &ns.prefix)?;
            primitive::write_string(&mut self.out, &ns.uri)?;
        } else {
            primitive::write_quick_value(
                &mut self.out,
                format::NODE_NAMESPACEDECL_FLAG,
                format::NSDECL_HANDLE_MASK,
                u64::from(handle),
            )?;
        }
        Ok(())
    }

    fn emit_element_lead(&mut self, namespace: u32, local: &str, has_attrs: bool) -> Result<usize> {
        let (handle, is_new) = self.element_names.intern(namespace, local);
        let mut flags = format::NODE_ELEMENT_FLAG;
        if has_attrs {
            flags |= format::ELEMENT_HASATTRIBUTES_FLAG;
        }
        if is_new {
            log::trace!("writer: defining element handle={} local={:?}", handle, local);
            flags |= format::ELEMENT_NEWNAME_FLAG;
            let mark = self.out.write_marked_byte(flags)?;
            primitive::write_value(&mut self.out, u64::from(namespace))?;
            primitive::write_string(&mut self.out, local)?;
            Ok(mark)
        } else {
            primitive::write_quick_value_marked(
                &mut self.out,
                flags,
                format::ELEMENT_HANDLE_MASK,
                u64::from(handle),
            )
        }
    }

    fn write_attribute_name(&mut self, namespace: u32, local: &str) -> Result<()> {
        let (handle, is_new) = self.attribute_names.intern(namespace, local);
        if is_new {
            self.out.write_byte(format::ATTRIBUTE_NEWREF_FLAG)?;
            primitive::write_value(&mut self.out, u64::from(namespace))?;
            primitive::write_string(&mut self.out, local)?;
        } else {
            primitive::write_quick_value(&mut self.out, 0, format::ATTRIBUTE_HANDLE_MASK, u64::from(handle))?;
        }
        Ok(())
    }

    fn write_attribute_value(&mut self, value: &str) -> Result<()> {
        if value.len() >= self.share_depth {
            if let Some(h) = self.shared_attr_values.find(value) {
                primitive::write_quick_value(
                    &mut self.out,
                    format::ATTRIBUTE_VALUEREF_FLAG,
                    format::ATTRIBUTE_VALUE_HANDLE_MASK,
                    u64::from(h),
                )?;
                return Ok(());
            }
        }
        self.out.write_byte(0)?;
        primitive::write_string(&mut self.out, value)?;
        if value.len() >= self.share_depth {
            self.shared_attr_values.push(value);
        }
        Ok(())
    }

    fn write_discrete_node(&mut self, node_type: u8, strings: &[&str]) -> Result<()> {
        self.require_in_document("writing node content")?;
        self.require_no_pending_element("writing node content")?;
        self.mark_parent_has_content();
        self.out.write_byte(node_type)?;
        for s in strings {
            primitive::write_string(&mut self.out, s)?;
        }
        Ok(())
    }
}

/// Push-based writer over an XBIS byte stream. Cheap to clone via
/// [`Writer::create_child_writer`]: all mutable state lives behind a shared
/// `Rc<RefCell<_>>`, since `spec.md` requires a single-threaded writer and
/// a child writer that stays in lock step with its parent's handle tables.
pub struct Writer<W> {
    core: Rc<RefCell<WriterCore<W>>>,
    namespace_uris: Vec<String>,
}

impl<W: Write> Writer<W> {
    /// Wraps `inner` and writes the stream header, using
    /// [`format::DEFAULT_SHARE_DEPTH`] as the share-depth threshold.
    pub fn new(inner: W) -> Result<Self> {
        Self::with_share_depth(inner, format::DEFAULT_SHARE_DEPTH)
    }

    /// Wraps `inner` and writes the stream header, using `share_depth` as
    /// the minimum UTF-8 byte length at which text and attribute values
    /// become eligible for sharing.
    pub fn with_share_depth(inner: W, share_depth: usize) -> Result<Self> {
        Ok(Writer {
            core: Rc::new(RefCell::new(WriterCore::new(inner, share_depth)?)),
            namespace_uris: Vec::new(),
        })
    }

    /// Emits the document-start marker (`spec.md` §4.4 step 1). XBIS has no
    /// on-wire encoding for an XML declaration's version/encoding/standalone
    /// attributes — they exist only as source-level ceremony in the
    /// original angle-bracket document — so this simply opens the document.
    pub fn write_xml_decl(&mut self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        if core.phase != Phase::Idle {
            return Err(Error::IllegalState(
                "write_xml_decl called more than once, or after close".into(),
            ));
        }
        core.out.write_byte(format::NODE_TYPE_DOCUMENT)?;
        core.phase = Phase::InDocument;
        Ok(())
    }

    /// Stages a pending namespace declaration, to be attached to whichever
    /// element starts next (`spec.md` §4.4 step 2). Calling this more than
    /// once for the same `(prefix, uri)` before the next element start is
    /// harmless — it accumulates idempotently.
    pub fn begin_namespace_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.require_in_document("begin_namespace_mapping")?;
        core.ensure_namespace_pending(prefix, uri);
        Ok(())
    }

    /// Opens a start tag. Nothing is written yet — see the module doc
    /// comment — the element's own namespace is interned (auto-queuing an
    /// implicit declaration if it hasn't been declared and isn't already
    /// pending) and its name and attribute list staged until
    /// [`Writer::close_start_tag`] or [`Writer::close_empty_tag`].
    pub fn start_tag_open(&mut self, prefix: &str, uri: &str, local: &str) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.require_in_document("start_tag_open")?;
        core.require_no_pending_element("start_tag_open")?;
        let namespace = core.ensure_namespace_pending(prefix, uri);
        core.pending_element = Some(PendingElement {
            namespace,
            local: local.to_string(),
            attributes: Vec::new(),
        });
        Ok(())
    }

    /// Convenience entry point combining namespace declarations with
    /// opening the tag they apply to. `spec.md` §9 flags the original
    /// `startTagNamespaces` as calling `startTagOpen` twice; here it is
    /// called exactly once, as the spec's own resolution recommends.
    pub fn start_tag_namespaces(
        &mut self,
        prefix: &str,
        uri: &str,
        local: &str,
        namespaces: &[(String, String)],
    ) -> Result<()> {
        for (p, u) in namespaces {
            self.begin_namespace_mapping(p, u)?;
        }
        self.start_tag_open(prefix, uri, local)
    }

    /// Adds an attribute to the currently open start tag.
    pub fn add_attribute(&mut self, prefix: &str, uri: &str, local: &str, value: &str) -> Result<()> {
        let mut core = self.core.borrow_mut();
        let namespace = core.ensure_namespace_pending(prefix, uri);
        let pending = core.pending_element.as_mut().ok_or_else(|| {
            Error::IllegalState("add_attribute called with no open start tag".into())
        })?;
        pending.attributes.push(PendingAttribute {
            namespace,
            local: local.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    /// Finalizes the open start tag: patches the parent's
    /// `ELEMENT_HASCHILDREN_FLAG`, emits any pending namespace declarations,
    /// the element's own lead byte, and its attribute list. Pushes a new
    /// [`ElementFrame`] that stays open for content until the matching
    /// [`Writer::end_tag`].
    pub fn close_start_tag(&mut self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        let pending = core
            .pending_element
            .take()
            .ok_or_else(|| Error::IllegalState("close_start_tag called with no open start tag".into()))?;
        core.mark_parent_has_content();
        let pending_ns = std::mem::take(&mut core.pending_namespaces);
        for handle in &pending_ns {
            core.emit_namespace_decl(*handle)?;
        }
        let has_attrs = !pending.attributes.is_empty();
        log::debug!(
            "writer: start tag ns={} local={:?} attrs={}",
            pending.namespace,
            pending.local,
            pending.attributes.len()
        );
        let mark = core.emit_element_lead(pending.namespace, &pending.local, has_attrs)?;
        if has_attrs {
            for attr in &pending.attributes {
                core.write_attribute_name(attr.namespace, &attr.local)?;
                core.write_attribute_value(&attr.value)?;
            }
            core.out.write_byte(format::TERMINATOR)?;
        }
        core.frames.push(ElementFrame {
            mark,
            namespace: pending.namespace,
            local: pending.local,
        });
        Ok(())
    }

    /// Finalizes the open start tag as a childless element in one call:
    /// equivalent to [`Writer::close_start_tag`] immediately followed by
    /// the matching [`Writer::end_tag`], without requiring the caller to
    /// repeat the element's name.
    pub fn close_empty_tag(&mut self) -> Result<()> {
        self.close_start_tag()?;
        let mut core = self.core.borrow_mut();
        core.frames
            .pop()
            .expect("close_start_tag just pushed a frame");
        core.out.write_byte(format::TERMINATOR)?;
        Ok(())
    }

    /// Closes the innermost open element. `prefix`/`uri`/`local` must match
    /// what was passed to the corresponding `start_tag_open` — checked here
    /// as an integrity guard, even though the wire encoding itself needs no
    /// closing name (the terminator byte alone is unambiguous).
    pub fn end_tag(&mut self, prefix: &str, uri: &str, local: &str) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.require_no_pending_element("end_tag")?;
        let namespace = core.namespaces.intern(prefix, uri);
        let frame = core
            .frames
            .pop()
            .ok_or_else(|| Error::IllegalState("end_tag called with no open element".into()))?;
        if frame.namespace != namespace || frame.local != local {
            return Err(Error::IllegalState(format!(
                "end_tag name mismatch: open element was {:?} (ns {}), got {:?} (ns {})",
                frame.local, frame.namespace, local, namespace
            )));
        }
        core.out.write_byte(format::TERMINATOR)?;
        Ok(())
    }

    /// Writes text content, choosing between `NODE_PLAINTEXT_FLAG` (short)
    /// and `NODE_TEXTREF_FLAG` (new-or-shared) per `spec.md` §4.1's
    /// share-depth rule.
    pub fn write_text_content(&mut self, text: &str) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.require_in_document("write_text_content")?;
        core.require_no_pending_element("write_text_content")?;
        core.mark_parent_has_content();
        if text.len() < core.share_depth {
            core.out.write_byte(format::NODE_PLAINTEXT_FLAG)?;
            primitive::write_string(&mut core.out, text)?;
        } else if let Some(handle) = core.shared_content.find(text) {
            primitive::write_quick_value(
                &mut core.out,
                format::NODE_TEXTREF_FLAG,
                format::TEXTREF_HANDLE_MASK,
                u64::from(handle),
            )?;
        } else {
            core.out
                .write_byte(format::NODE_TEXTREF_FLAG | format::TEXTREF_NEW_FLAG)?;
            primitive::write_string(&mut core.out, text)?;
            core.shared_content.push(text);
        }
        Ok(())
    }

    /// CDATA content. Never shared, unlike [`Writer::write_text_content`].
    pub fn write_cdata(&mut self, text: &str) -> Result<()> {
        self.core.borrow_mut().write_discrete_node(format::NODE_TYPE_CDATA, &[text])
    }

    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        self.core
            .borrow_mut()
            .write_discrete_node(format::NODE_TYPE_COMMENT, &[text])
    }

    pub fn write_pi(&mut self, target: &str, data: &str) -> Result<()> {
        self.core
            .borrow_mut()
            .write_discrete_node(format::NODE_TYPE_PI, &[target, data])
    }

    pub fn write_doctype(&mut self, root_name: &str, public_id: &str, system_id: &str) -> Result<()> {
        self.core
            .borrow_mut()
            .write_discrete_node(format::NODE_TYPE_DOCTYPE, &[root_name, public_id, system_id])
    }

    pub fn write_notation(&mut self, name: &str, public_id: &str, system_id: &str) -> Result<()> {
        self.core
            .borrow_mut()
            .write_discrete_node(format::NODE_TYPE_NOTATION, &[name, public_id, system_id])
    }

    pub fn write_element_decl(&mut self, name: &str, content_model: &str) -> Result<()> {
        self.core
            .borrow_mut()
            .write_discrete_node(format::NODE_TYPE_ELEMENTDECL, &[name, content_model])
    }

    pub fn write_attribute_decl(
        &mut self,
        element_name: &str,
        attribute_name: &str,
        attribute_type: &str,
        default_value_type: &str,
        default_value: &str,
    ) -> Result<()> {
        self.core.borrow_mut().write_discrete_node(
            format::NODE_TYPE_ATTRIBUTEDECL,
            &[
                element_name,
                attribute_name,
                attribute_type,
                default_value_type,
                default_value,
            ],
        )
    }

    pub fn write_external_entity_decl(&mut self, name: &str, public_id: &str, system_id: &str) -> Result<()> {
        self.core
            .borrow_mut()
            .write_discrete_node(format::NODE_TYPE_EXTERNALENTITYDECL, &[name, public_id, system_id])
    }

    pub fn write_unparsed_entity(
        &mut self,
        name: &str,
        public_id: &str,
        system_id: &str,
        notation_name: &str,
    ) -> Result<()> {
        self.core.borrow_mut().write_discrete_node(
            format::NODE_TYPE_UNPARSEDENTITY,
            &[name, public_id, system_id, notation_name],
        )
    }

    pub fn write_skipped_entity(&mut self, name: &str) -> Result<()> {
        self.core
            .borrow_mut()
            .write_discrete_node(format::NODE_TYPE_SKIPPEDENTITY, &[name])
    }

    /// Always unsupported: an entity reference has no `NODE_TYPE_*` wire
    /// representation anywhere in the format (DESIGN.md Open Question 3).
    pub fn write_entity_ref(&mut self, _name: &str) -> Result<()> {
        Err(Error::UnsupportedOperation("write_entity_ref"))
    }

    /// Flushes buffered bytes to the underlying sink without closing the
    /// document. Rejected while any element is open: every open element
    /// holds a mark (a `buf` index) that a flush would invalidate, since
    /// flushing clears the byte buffer out from under it.
    pub fn flush(&mut self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        if !core.frames.is_empty() {
            return Err(Error::IllegalState(
                "flush called with unclosed elements".into(),
            ));
        }
        core.out.flush()
    }

    /// Closes the document: emits the document's own child-list terminator
    /// and flushes. All elements must already be closed.
    pub fn close(&mut self) -> Result<()> {
        let mut core = self.core.borrow_mut();
        core.require_in_document("close")?;
        if !core.frames.is_empty() {
            return Err(Error::IllegalState(
                "close called with unclosed elements".into(),
            ));
        }
        core.out.write_byte(format::TERMINATOR)?;
        core.out.flush()?;
        core.phase = Phase::Closed;
        Ok(())
    }

    /// Restores the writer to its freshly constructed state (all handle
    /// tables, the frame stack, and the document phase), for reuse with a
    /// new document. Idempotent: calling it on a fresh writer is a no-op.
    pub fn reset(&mut self) {
        self.core.borrow_mut().reset();
    }

    /// Configures the index-addressed namespace URI convenience table used
    /// by the `_by_index` methods (`spec.md` §6: `uris[0]` is always `""`,
    /// `uris[1]` is always the XML namespace URI).
    pub fn set_namespace_uris(&mut self, uris: &[&str]) -> Result<()> {
        if let Some(&first) = uris.first() {
            if !first.is_empty() {
                return Err(Error::IllegalState("namespace_uris[0] must be \"\"".into()));
            }
        }
        if let Some(&second) = uris.get(1) {
            if second != crate::namespace::XML_NAMESPACE_URI {
                return Err(Error::IllegalState(
                    "namespace_uris[1] must be the XML namespace URI".into(),
                ));
            }
        }
        self.namespace_uris = uris.iter().map(|s| s.to_string()).collect();
        Ok(())
    }

    fn uri_by_index(&self, ns_index: usize) -> Result<&str> {
        self.namespace_uris
            .get(ns_index)
            .map(|s| s.as_str())
            .ok_or_else(|| Error::IllegalState(format!("namespace index {} out of range", ns_index)))
    }

    /// Index-addressed equivalent of [`Writer::start_tag_open`], resolving
    /// `ns_index` through the table set by [`Writer::set_namespace_uris`].
    pub fn start_tag_open_by_index(&mut self, ns_index: usize, local: &str) -> Result<()> {
        let uri = self.uri_by_index(ns_index)?.to_string();
        self.start_tag_open("", &uri, local)
    }

    pub fn add_attribute_by_index(&mut self, ns_index: usize, local: &str, value: &str) -> Result<()> {
        let uri = self.uri_by_index(ns_index)?.to_string();
        self.add_attribute("", &uri, local, value)
    }

    pub fn end_tag_by_index(&mut self, ns_index: usize, local: &str) -> Result<()> {
        let uri = self.uri_by_index(ns_index)?.to_string();
        self.end_tag("", &uri, local)
    }

    /// Creates a writer for a nested sub-binding that shares this writer's
    /// byte sink and every handle table — the two must never be driven
    /// concurrently (`spec.md` §5) — but keeps its own namespace URI
    /// convenience table.
    pub fn create_child_writer(&self, uris: &[&str]) -> Writer<W> {
        Writer {
            core: Rc::clone(&self.core),
            namespace_uris: uris.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Flushes and unwraps the underlying sink, consuming the writer.
    /// Panics if a [`Writer::create_child_writer`] clone is still alive —
    /// same restriction `Rc::try_unwrap` imposes on any shared owner.
    pub fn into_inner(self) -> Result<W> {
        self.core.borrow_mut().out.flush()?;
        Rc::try_unwrap(self.core)
            .ok()
            .expect("into_inner called with an outstanding child writer")
            .into_inner()
            .out
            .into_inner()
    }
}
