//! Namespace interning and the nesting-scoped active-count stack
//! (`spec.md` §3: "Each namespace carries an active nesting count").
//!
//! Modeled on [`tafia-quick-xml`'s `NamespaceResolver`][teacher], which pops
//! namespace bindings by comparing a stored declaration level against the
//! current nesting level rather than keeping a per-element list of what to
//! pop; here the population is of whole interned `Namespace` handles rather
//! than raw buffer slices, since both writer and reader need stable handles
//! for [`crate::format::NSDECL_HANDLE_MASK`].
//!
//! [teacher]: https://docs.rs/quick-xml

/// A `(prefix, URI)` pair, interned per codec instance.
///
/// Handle 0 is always the empty namespace (`("", "")`) and handle 1 is
/// always the XML namespace, present in every instance regardless of
/// whether the document uses namespaces at all (`spec.md` §9, "Two
/// pre-interned namespaces").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

/// Namespace handle 0: the empty namespace, always active at depth 0.
pub const EMPTY_NAMESPACE_HANDLE: u32 = 0;
/// Namespace handle 1: the XML namespace.
pub const XML_NAMESPACE_HANDLE: u32 = 1;
/// `http://www.w3.org/XML/1998/namespace`, bound to prefix `xml`.
pub const XML_NAMESPACE_URI: &str = "http://www.w3.org/XML/1998/namespace";

fn pre_interned() -> Vec<Namespace> {
    vec![
        Namespace {
            prefix: String::new(),
            uri: String::new(),
        },
        Namespace {
            prefix: "xml".to_string(),
            uri: XML_NAMESPACE_URI.to_string(),
        },
    ]
}

/// Monotonic namespace table shared by writer and reader. Handles are
/// assigned strictly in order of first occurrence, 0-based (index ==
/// handle), which keeps writer and reader in lock step as long as they
/// process declarations in the same order (`spec.md` §4.2).
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    namespaces: Vec<Namespace>,
}

impl Default for NamespaceTable {
    fn default() -> Self {
        NamespaceTable {
            namespaces: pre_interned(),
        }
    }
}

impl NamespaceTable {
    /// A fresh table with only the two pre-interned namespaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the table to its freshly constructed state.
    pub fn reset(&mut self) {
        self.namespaces = pre_interned();
    }

    /// Looks up an existing handle for `(prefix, uri)`, if any.
    pub fn find(&self, prefix: &str, uri: &str) -> Option<u32> {
        self.namespaces
            .iter()
            .position(|n| n.prefix == prefix && n.uri == uri)
            .map(|i| i as u32)
    }

    /// Interns `(prefix, uri)`, returning its existing handle if already
    /// known or assigning — and returning — the next one.
    pub fn intern(&mut self, prefix: &str, uri: &str) -> u32 {
        if let Some(h) = self.find(prefix, uri) {
            return h;
        }
        self.namespaces.push(Namespace {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        (self.namespaces.len() - 1) as u32
    }

    /// Defines the namespace for a newly read handle; handles must be
    /// assigned in order, matching [`NamespaceTable::intern`]'s sequencing
    /// on the writer side.
    pub fn define(&mut self, prefix: &str, uri: &str) -> u32 {
        self.namespaces.push(Namespace {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        (self.namespaces.len() - 1) as u32
    }

    /// Looks a namespace up by handle.
    pub fn get(&self, handle: u32) -> Option<&Namespace> {
        self.namespaces.get(handle as usize)
    }

    /// Number of interned namespaces, including the two pre-interned ones.
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the two pre-interned namespaces are always present
    }
}

/// Tracks which namespace handles are in scope as elements nest, mirroring
/// the reader side's "active nesting count" (`spec.md` §3). A namespace is
/// in scope iff its active count is greater than zero.
#[derive(Debug, Clone, Default)]
pub struct ActiveScope {
    /// Active count per namespace handle, grown lazily.
    counts: Vec<u32>,
    /// One entry per currently open element frame: the namespace handles
    /// that frame activated, so they can be deactivated symmetrically on
    /// close (`spec.md` §3: "closed in reverse order on its end" — reverse
    /// order doesn't matter for a reference count, only that each push is
    /// matched by exactly one pop).
    frames: Vec<Vec<u32>>,
}

impl ActiveScope {
    pub fn new() -> Self {
        // The empty namespace is "always active at depth 0" (`spec.md` §3).
        let mut scope = ActiveScope::default();
        scope.ensure_len(EMPTY_NAMESPACE_HANDLE as usize + 1);
        scope.counts[EMPTY_NAMESPACE_HANDLE as usize] = 1;
        scope
    }

    pub fn reset(&mut self) {
        *self = ActiveScope::new();
    }

    fn ensure_len(&mut self, len: usize) {
        if self.counts.len() < len {
            self.counts.resize(len, 0);
        }
    }

    /// Begins a new element frame, activating every handle in
    /// `declared_here`.
    pub fn push_frame(&mut self, declared_here: Vec<u32>) {
        for &h in &declared_here {
            self.ensure_len(h as usize + 1);
            self.counts[h as usize] += 1;
        }
        self.frames.push(declared_here);
    }

    /// Ends the most recently opened frame, deactivating what it declared.
    pub fn pop_frame(&mut self) {
        if let Some(declared) = self.frames.pop() {
            for h in declared {
                self.counts[h as usize] -= 1;
            }
        }
    }

    /// Whether `handle` is currently in scope.
    pub fn is_active(&self, handle: u32) -> bool {
        self.counts
            .get(handle as usize)
            .copied()
            .map(|c| c > 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_interned_namespaces_have_fixed_handles() {
        let table = NamespaceTable::new();
        assert_eq!(table.get(EMPTY_NAMESPACE_HANDLE).unwrap().uri, "");
        assert_eq!(table.get(XML_NAMESPACE_HANDLE).unwrap().prefix, "xml");
        assert_eq!(
            table.get(XML_NAMESPACE_HANDLE).unwrap().uri,
            XML_NAMESPACE_URI
        );
    }

    #[test]
    fn intern_is_idempotent_and_monotonic() {
        let mut table = NamespaceTable::new();
        let a = table.intern("p", "urn:a");
        let b = table.intern("q", "urn:b");
        let a_again = table.intern("p", "urn:a");
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(a, 2);
        assert_eq!(b, 3);
    }

    #[test]
    fn reset_restores_only_pre_interned() {
        let mut table = NamespaceTable::new();
        table.intern("p", "urn:a");
        table.reset();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn empty_namespace_always_active_at_depth_zero() {
        let scope = ActiveScope::new();
        assert!(scope.is_active(EMPTY_NAMESPACE_HANDLE));
        assert!(!scope.is_active(XML_NAMESPACE_HANDLE));
    }

    #[test]
    fn scope_symmetry_across_push_and_pop() {
        let mut scope = ActiveScope::new();
        scope.push_frame(vec![2]);
        assert!(scope.is_active(2));
        scope.push_frame(vec![]);
        assert!(scope.is_active(2), "still in scope of the outer frame");
        scope.pop_frame();
        assert!(scope.is_active(2));
        scope.pop_frame();
        assert!(!scope.is_active(2), "scope ends with its declaring frame");
    }
}
