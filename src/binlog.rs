use crate::access::AccessValue;
use serde::{Deserialize, Serialize};

/// Opcode of a journaled rule-table mutation. An update is journaled as a
/// delete followed by an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinlogOp {
    Insert,
    Delete,
}

impl BinlogOp {
    pub(crate) fn opcode(self) -> u8 {
        match self {
            BinlogOp::Insert => 0,
            BinlogOp::Delete => 1,
        }
    }

    pub(crate) fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0 => Some(BinlogOp::Insert),
            1 => Some(BinlogOp::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinlogEntry {
    pub op: BinlogOp,
    pub value: AccessValue,
}

/// Append-only journal of logical rule-table mutations, kept for audit and
/// replay. Cleared only by an explicit checkpoint after the host has
/// durably persisted the table; serialization alone leaves it intact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binlog {
    entries: Vec<BinlogEntry>,
}

impl Binlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<BinlogEntry>) -> Self {
        Self { entries }
    }

    pub(crate) fn record_insert(&mut self, value: AccessValue) {
        self.entries.push(BinlogEntry {
            op: BinlogOp::Insert,
            value,
        });
    }

    pub(crate) fn record_delete(&mut self, value: AccessValue) {
        self.entries.push(BinlogEntry {
            op: BinlogOp::Delete,
            value,
        });
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[BinlogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
