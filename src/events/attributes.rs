//! Decoded attribute list, valid while the reader's current event is
//! `START_TAG` (`spec.md` §4.6).

/// One decoded attribute: resolved name, namespace handle, and value. XBIS
/// has no escape sequences — content is length-prefixed raw UTF-8 — so,
/// unlike `tafia-quick-xml`'s `Attribute`, there is no unescape step here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub local_name: String,
    pub namespace: u32,
    pub value: String,
}

/// The attribute list of the element the reader is currently positioned on.
/// Order matches the wire order (`spec.md` §5: "attribute order is
/// preserved within an element").
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    items: Vec<Attribute>,
}

impl Attributes {
    pub(crate) fn new(items: Vec<Attribute>) -> Self {
        Attributes { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Attribute> {
        self.items.get(index)
    }

    /// Looks an attribute up by namespace URI and local name. `""` and the
    /// empty namespace are equivalent, per `spec.md` §4.6.
    pub fn value_by_name<'a>(
        &'a self,
        namespace_uri: Option<&str>,
        local_name: &str,
        resolve_uri: impl Fn(u32) -> &'a str,
    ) -> Option<&'a str> {
        let wanted = namespace_uri.unwrap_or("");
        self.items
            .iter()
            .find(|a| a.local_name == local_name && resolve_uri(a.namespace) == wanted)
            .map(|a| a.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
