//! Element-name and attribute-name handle tables (`spec.md` §3/§4.2).
//!
//! Elements and attributes are two disjoint handle populations — an
//! element name and an attribute name with identical `(namespace, local)`
//! get different handles, each from its own monotonic counter starting at
//! 1 (handle 0 is the termination sentinel, never assigned). Both
//! directions use the same [`WriterNameTable`] / [`ReaderNameTable`] types,
//! one instance per population.
//!
//! The writer side keeps the "one local name → one namespace" common case
//! cheap without hashing a `(namespace, local)` tuple, the way
//! `tafia-quick-xml`'s `name.rs` calls out as worth preserving for
//! allocation behavior on large documents: a local name maps either
//! directly to its single `(namespace, handle)` pair, or — only once a
//! second namespace turns up under the same local name — to a small map
//! keyed by namespace handle. `spec.md` §9 ("Secondary name map") asks for
//! exactly this tagged-variant shape instead of always paying for a map.

use std::collections::HashMap;

/// A resolved name: local part plus the namespace handle it was qualified
/// with ([`crate::namespace::NamespaceTable`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub local: String,
    pub namespace: u32,
}

#[derive(Debug, Clone)]
enum NameSlot {
    /// The common case: this local name has only ever appeared in one
    /// namespace.
    Single { namespace: u32, handle: u32 },
    /// This local name has appeared in more than one namespace
    /// (`spec.md` §8 S6); fall back to a real map keyed by namespace
    /// handle.
    Multi(HashMap<u32, u32>),
}

/// Writer-side handle table for one name population (elements, or
/// attributes). Insertion assigns the next sequential handle, starting at
/// 1.
#[derive(Debug, Clone, Default)]
pub struct WriterNameTable {
    by_local: HashMap<String, NameSlot>,
    next_handle: u32,
}

impl WriterNameTable {
    pub fn new() -> Self {
        WriterNameTable {
            by_local: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn reset(&mut self) {
        self.by_local.clear();
        self.next_handle = 1;
    }

    /// Looks up an existing handle for `(namespace, local)` without
    /// assigning one.
    pub fn find(&self, namespace: u32, local: &str) -> Option<u32> {
        match self.by_local.get(local)? {
            NameSlot::Single {
                namespace: ns,
                handle,
            } => (*ns == namespace).then_some(*handle),
            NameSlot::Multi(map) => map.get(&namespace).copied(),
        }
    }

    /// Looks up or assigns a handle for `(namespace, local)`, reporting
    /// whether this is the first time this exact pair has been seen (the
    /// caller must then emit a new-name definition on the wire).
    pub fn intern(&mut self, namespace: u32, local: &str) -> (u32, bool) {
        if let Some(h) = self.find(namespace, local) {
            return (h, false);
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        match self.by_local.get_mut(local) {
            None => {
                self.by_local.insert(
                    local.to_string(),
                    NameSlot::Single { namespace, handle },
                );
            }
            Some(slot @ NameSlot::Single { .. }) => {
                let NameSlot::Single {
                    namespace: existing_ns,
                    handle: existing_handle,
                } = *slot
                else {
                    unreachable!()
                };
                let mut map = HashMap::with_capacity(2);
                map.insert(existing_ns, existing_handle);
                map.insert(namespace, handle);
                *slot = NameSlot::Multi(map);
            }
            Some(NameSlot::Multi(map)) => {
                map.insert(namespace, handle);
            }
        }
        (handle, true)
    }
}

/// Reader-side handle table for one name population: handle *h* indexes
/// slot *h - 1* (`spec.md` §4.2).
#[derive(Debug, Clone, Default)]
pub struct ReaderNameTable {
    names: Vec<Name>,
}

impl ReaderNameTable {
    pub fn new() -> Self {
        ReaderNameTable { names: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.names.clear();
    }

    /// Registers a newly defined name, returning its handle.
    pub fn define(&mut self, namespace: u32, local: &str) -> u32 {
        self.names.push(Name {
            local: local.to_string(),
            namespace,
        });
        self.names.len() as u32
    }

    /// Looks a name up by handle (1-based).
    pub fn get(&self, handle: u32) -> Option<&Name> {
        if handle == 0 {
            return None;
        }
        self.names.get((handle - 1) as usize)
    }
}
