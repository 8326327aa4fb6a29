use skein_effect::Effect;

// What two effects touching the same primary key mean for each other.
// ReadWrite pairs are safe once ordered; WriteWrite pairs must never share a
// batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Conflict {
    None,
    ReadWrite,
    WriteWrite,
}

impl Conflict {
    pub fn name(&self) -> &'static str {
        match self {
            Conflict::None => "none",
            Conflict::ReadWrite => "read-write",
            Conflict::WriteWrite => "write-write",
        }
    }
}

// Pure pairwise check. Events never conflict: they are neither read-like nor
// write-like, and their key space ("event/...") is disjoint from store keys
// by construction.
pub fn classify(a: &Effect, b: &Effect) -> Conflict {
    let (ka, kb) = (a.kind(), b.kind());
    let a_write = ka.is_write_like();
    let b_write = kb.is_write_like();
    if !a_write && !ka.is_read_like() {
        return Conflict::None;
    }
    if !b_write && !kb.is_read_like() {
        return Conflict::None;
    }
    if a.primary_key() != b.primary_key() {
        return Conflict::None;
    }
    match (a_write, b_write) {
        (true, true) => Conflict::WriteWrite,
        (true, false) | (false, true) => Conflict::ReadWrite,
        (false, false) => Conflict::None,
    }
}
