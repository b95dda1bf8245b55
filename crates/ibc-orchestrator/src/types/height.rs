// Client heights

use std::cmp::Ordering;
use std::fmt;

/// Height of a ledger as tracked by a light client.
///
/// Contract-based ledgers have a single revision, so a block number maps to
/// revision 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash, prost::Message)]
pub struct Height {
    #[prost(uint64, tag = "1")]
    pub revision_number: u64,
    #[prost(uint64, tag = "2")]
    pub revision_height: u64,
}

impl Height {
    pub fn new(revision_number: u64, revision_height: u64) -> Self {
        Self {
            revision_number,
            revision_height,
        }
    }

    /// Height of a block number on a single-revision ledger
    pub fn from_block_number(number: u64) -> Self {
        Self::new(0, number)
    }

    /// Block number to query the ledger at
    pub fn block_number(&self) -> u64 {
        self.revision_height
    }

    pub fn is_zero(&self) -> bool {
        self.revision_number == 0 && self.revision_height == 0
    }
}

impl PartialOrd for Height {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Height {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.revision_number, self.revision_height)
            .cmp(&(other.revision_number, other.revision_height))
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}
