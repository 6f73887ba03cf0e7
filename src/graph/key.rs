use std::collections::BTreeSet;
use std::fmt;

/// Opaque identifier for one unknown vector variable.
///
/// Keys are created by the problem definition and never by the solver; the
/// solver only ever compares, hashes and orders them.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Key(pub u64);

impl From<u64> for Key {
    fn from(v: u64) -> Self {
        Key(v)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered set of keys.
pub type KeySet = BTreeSet<Key>;
