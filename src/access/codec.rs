//! Length-prefixed little-endian encoding of the rule table:
//!
//! ```text
//! Access      := Binlog Branches Users Hosts Values
//! Binlog      := u32 count, count x (u8 opcode, AccessValue)
//! Branches    := u32 count, count x MatchExpression   (Users, Hosts same)
//! Values      := u32 count, count x AccessValue
//! MatchExpr   := u32 collection_index, u32 nweights, nweights x u32 weight
//! AccessValue := VarStr branch, VarStr user, VarStr host, u64 permissions
//! VarStr      := u32 length, length bytes (UTF-8)
//! ```
//!
//! The format is versionless; trailing bytes after the values vector are
//! tolerated. Any error aborts the decode before the destination is touched.

use super::{Access, AccessValue, Permissions};
use crate::binlog::{BinlogEntry, BinlogOp};
use crate::expression::{MatchExpression, SortOrders, MAX_EXPRESSION_BYTES};
use thiserror::Error;

// Minimal encoded sizes, used to reject implausible count fields before
// allocating.
const MIN_BINLOG_ENTRY_BYTES: usize = 21;
const MIN_EXPRESSION_BYTES: usize = 8;
const MIN_VALUE_BYTES: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated input")]
    Truncated,
    #[error("count field exceeds remaining input")]
    ImplausibleCount,
    #[error("expression string is not valid utf-8")]
    InvalidUtf8,
    #[error("unknown journal opcode {0}")]
    UnknownOpcode(u8),
    #[error("expression of {len} bytes exceeds the {max}-byte maximum", max = MAX_EXPRESSION_BYTES)]
    ExpressionTooLong { len: usize },
    #[error("parallel columns have differing lengths")]
    ColumnLengthMismatch,
    #[error("collection index {index} out of range for {rows} rows")]
    CollectionIndexOutOfRange { index: u32, rows: u32 },
}

#[derive(Debug)]
pub(crate) struct DecodedAccess {
    pub(crate) binlog: Vec<BinlogEntry>,
    pub(crate) branches: Vec<MatchExpression>,
    pub(crate) users: Vec<MatchExpression>,
    pub(crate) hosts: Vec<MatchExpression>,
    pub(crate) values: Vec<AccessValue>,
}

pub(crate) fn encode(access: &Access) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, access.binlog.len() as u32);
    for entry in access.binlog.entries() {
        out.push(entry.op.opcode());
        put_value(&mut out, &entry.value);
    }
    put_expressions(&mut out, &access.branches);
    put_expressions(&mut out, &access.users);
    put_expressions(&mut out, &access.hosts);
    put_u32(&mut out, access.values.len() as u32);
    for value in &access.values {
        put_value(&mut out, value);
    }
    out
}

pub(crate) fn decode(bytes: &[u8]) -> Result<DecodedAccess, CodecError> {
    let mut reader = ByteReader::new(bytes);

    let binlog_count = reader.read_count(MIN_BINLOG_ENTRY_BYTES)?;
    let mut binlog = Vec::with_capacity(binlog_count);
    for _ in 0..binlog_count {
        let opcode = reader.read_u8()?;
        let op = BinlogOp::from_opcode(opcode).ok_or(CodecError::UnknownOpcode(opcode))?;
        let value = read_value(&mut reader)?;
        binlog.push(BinlogEntry { op, value });
    }

    let branches = read_expressions(&mut reader)?;
    let users = read_expressions(&mut reader)?;
    let hosts = read_expressions(&mut reader)?;

    let value_count = reader.read_count(MIN_VALUE_BYTES)?;
    let mut values = Vec::with_capacity(value_count);
    for _ in 0..value_count {
        values.push(read_value(&mut reader)?);
    }

    if branches.len() != values.len()
        || users.len() != values.len()
        || hosts.len() != values.len()
    {
        return Err(CodecError::ColumnLengthMismatch);
    }
    let rows = values.len() as u32;
    for column in [&branches, &users, &hosts] {
        for expression in column.iter() {
            if expression.collection_index >= rows {
                return Err(CodecError::CollectionIndexOutOfRange {
                    index: expression.collection_index,
                    rows,
                });
            }
        }
    }

    Ok(DecodedAccess {
        binlog,
        branches,
        users,
        hosts,
        values,
    })
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_var_str(out: &mut Vec<u8>, value: &str) {
    put_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

fn put_value(out: &mut Vec<u8>, value: &AccessValue) {
    put_var_str(out, &value.branch);
    put_var_str(out, &value.user);
    put_var_str(out, &value.host);
    put_u64(out, value.permissions.bits());
}

fn put_expressions(out: &mut Vec<u8>, expressions: &[MatchExpression]) {
    put_u32(out, expressions.len() as u32);
    for expression in expressions {
        put_u32(out, expression.collection_index);
        let weights = expression.sort_orders.as_slice();
        put_u32(out, weights.len() as u32);
        for &weight in weights {
            put_u32(out, weight);
        }
    }
}

fn read_value(reader: &mut ByteReader<'_>) -> Result<AccessValue, CodecError> {
    let branch = read_var_str(reader)?;
    let user = read_var_str(reader)?;
    let host = read_var_str(reader)?;
    let permissions = Permissions::from_bits(reader.read_u64()?);
    Ok(AccessValue {
        branch,
        user,
        host,
        permissions,
    })
}

fn read_var_str(reader: &mut ByteReader<'_>) -> Result<String, CodecError> {
    let len = reader.read_u32()? as usize;
    if len > MAX_EXPRESSION_BYTES {
        return Err(CodecError::ExpressionTooLong { len });
    }
    let bytes = reader.read_bytes(len)?;
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    Ok(text.to_string())
}

fn read_expressions(reader: &mut ByteReader<'_>) -> Result<Vec<MatchExpression>, CodecError> {
    let count = reader.read_count(MIN_EXPRESSION_BYTES)?;
    let mut expressions = Vec::with_capacity(count);
    for _ in 0..count {
        let collection_index = reader.read_u32()?;
        let nweights = reader.read_u32()? as usize;
        if nweights.saturating_mul(4) > reader.remaining() {
            return Err(CodecError::ImplausibleCount);
        }
        let mut weights = Vec::with_capacity(nweights);
        for _ in 0..nweights {
            weights.push(reader.read_u32()?);
        }
        expressions.push(MatchExpression::new(
            collection_index,
            SortOrders::from_weights(weights),
        ));
    }
    Ok(expressions)
}

struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < len {
            return Err(CodecError::Truncated);
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().map_err(|_| CodecError::Truncated)?))
    }

    fn read_u64(&mut self) -> Result<u64, CodecError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().map_err(|_| CodecError::Truncated)?))
    }

    /// Reads a vector count and rejects it when even minimally-sized
    /// elements could not fit in the remaining input.
    fn read_count(&mut self, min_element_bytes: usize) -> Result<usize, CodecError> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_element_bytes) > self.remaining() {
            return Err(CodecError::ImplausibleCount);
        }
        Ok(count)
    }
}
