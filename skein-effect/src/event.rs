use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// An emitted event: a type string plus an attribute map. The constructor
// deep-copies the attribute map and every value; the stored event must not
// observe later mutation of the caller's buffers.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Event {
    ty: String,
    attrs: BTreeMap<String, Vec<u8>>,
}

impl Event {
    pub fn new(ty: impl Into<String>, attrs: &BTreeMap<String, Vec<u8>>) -> Self {
        Event {
            ty: ty.into(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn attr(&self, key: &str) -> Option<&[u8]> {
        self.attrs.get(key).map(Vec::as_slice)
    }

    pub fn attrs(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.attrs
    }
}
