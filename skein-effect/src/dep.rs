// A dependency names one key an effect will read or write. The scheduler
// orders effects purely by (key, read_only); the kind is a routing hint for
// hosts that want to shard stores and has no bearing on correctness.

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DepKind {
    Account,
    Balance,
    Validator,
    Generic,
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Dependency {
    pub kind: DepKind,
    pub key: Vec<u8>,
    pub read_only: bool,
}

impl Dependency {
    pub fn read(kind: DepKind, key: Vec<u8>) -> Self {
        Dependency {
            kind,
            key,
            read_only: true,
        }
    }

    pub fn write(kind: DepKind, key: Vec<u8>) -> Self {
        Dependency {
            kind,
            key,
            read_only: false,
        }
    }
}
