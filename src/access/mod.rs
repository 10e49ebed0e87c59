pub(crate) mod codec;

use crate::binlog::{Binlog, BinlogEntry};
use crate::collation::Collation;
use crate::config::AccessConfig;
use crate::error::BranchgateError;
use crate::expression::{parse_expression, MatchExpression};
use crate::matcher::{self, PooledBuf, EXPR_POOL};
use crate::schema::permissions_to_set_string;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Flags denoting a principal's allowed functionality on a branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u64);

impl Permissions {
    /// Unrestricted control over a branch, including rule-table edits.
    pub const ADMIN: Permissions = Permissions(1);
    /// All modifying operations on a branch, but no rule-table edits.
    pub const WRITE: Permissions = Permissions(1 << 1);

    pub const fn empty() -> Self {
        Permissions(0)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn from_bits(bits: u64) -> Self {
        Permissions(bits)
    }

    pub const fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Permissions) -> Permissions {
        Permissions(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Permissions) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Permissions;

    fn bitand(self, rhs: Permissions) -> Permissions {
        Permissions(self.0 & rhs.0)
    }
}

/// The user-facing values of one rule row: folded pattern triple plus the
/// granted permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessValue {
    pub branch: String,
    pub user: String,
    pub host: String,
    pub permissions: Permissions,
}

/// The rule table backing branch write authorization: four parallel columns
/// sharing one index space, the superuser identity, and the change journal.
///
/// Every expression's `collection_index` equals its position, so a filtered
/// pass can re-index any column directly from surviving indexes.
#[derive(Debug)]
pub struct Access {
    pub(crate) binlog: Binlog,
    pub(crate) branches: Vec<MatchExpression>,
    pub(crate) users: Vec<MatchExpression>,
    pub(crate) hosts: Vec<MatchExpression>,
    pub(crate) values: Vec<AccessValue>,
    super_user: String,
    super_host: String,
}

impl Access {
    fn new(super_user: String, super_host: String) -> Self {
        Self {
            binlog: Binlog::new(),
            branches: Vec::new(),
            users: Vec::new(),
            hosts: Vec::new(),
            values: Vec::new(),
            super_user,
            super_host,
        }
    }

    /// Returns whether any rule matches the given branch, user, and host,
    /// along with the OR of the surviving rules' permissions. The superuser
    /// identity short-circuits to admin by exact equality, before any
    /// pattern evaluation.
    ///
    /// Filtering is pipelined over the columns from most to least selective:
    /// users (case-sensitive), then hosts of the survivors, then branches.
    pub fn matches(&self, branch: &str, user: &str, host: &str) -> (bool, Permissions) {
        if self.super_user == user && self.super_host == host {
            return (true, Permissions::ADMIN);
        }

        let user_indexes = matcher::match_expressions(&self.users, user, Collation::Utf8mb4Bin);
        let host_view = self.filter_column(&self.hosts, &user_indexes);
        drop(user_indexes);
        let host_indexes = matcher::match_expressions(&host_view, host, Collation::Utf8mb4AiCi);
        drop(host_view);

        let branch_view = self.filter_column(&self.branches, &host_indexes);
        drop(host_indexes);
        let branch_indexes =
            matcher::match_expressions(&branch_view, branch, Collation::Utf8mb4AiCi);
        drop(branch_view);

        (
            !branch_indexes.is_empty(),
            self.gather_permissions(&branch_indexes),
        )
    }

    /// Position of the row with the given folded expression triple.
    pub fn index_of(&self, branch: &str, user: &str, host: &str) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v.branch == branch && v.user == user && v.host == host)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[AccessValue] {
        &self.values
    }

    pub fn binlog(&self) -> &Binlog {
        &self.binlog
    }

    pub fn super_user(&self) -> &str {
        &self.super_user
    }

    pub fn super_host(&self) -> &str {
        &self.super_host
    }

    /// Appends an already-folded row to all four columns and journals the
    /// insert. The caller has checked uniqueness.
    pub(crate) fn insert_row(
        &mut self,
        branch: &str,
        user: &str,
        host: &str,
        permissions: Permissions,
    ) {
        let next_index = self.values.len() as u32;
        self.branches.push(MatchExpression::new(
            next_index,
            parse_expression(branch, Collation::Utf8mb4AiCi),
        ));
        self.users.push(MatchExpression::new(
            next_index,
            parse_expression(user, Collation::Utf8mb4Bin),
        ));
        self.hosts.push(MatchExpression::new(
            next_index,
            parse_expression(host, Collation::Utf8mb4AiCi),
        ));
        let value = AccessValue {
            branch: branch.into(),
            user: user.into(),
            host: host.into(),
            permissions,
        };
        self.binlog.record_insert(value.clone());
        self.values.push(value);
    }

    /// Removes the row with the given folded triple by swapping it with the
    /// last row and shrinking all four columns, then journals the delete.
    /// The moved row's `collection_index` back-references are reassigned to
    /// its new position. Absent rows are a no-op.
    pub(crate) fn delete_row(&mut self, branch: &str, user: &str, host: &str) {
        let Some(index) = self.index_of(branch, user, host) else {
            return;
        };
        let last = self.values.len() - 1;
        self.branches.swap(index, last);
        self.users.swap(index, last);
        self.hosts.swap(index, last);
        self.values.swap(index, last);
        self.branches.pop();
        self.users.pop();
        self.hosts.pop();
        if let Some(removed) = self.values.pop() {
            self.binlog.record_delete(removed);
        }
        if index < self.values.len() {
            let moved = index as u32;
            self.branches[index].collection_index = moved;
            self.users[index].collection_index = moved;
            self.hosts[index].collection_index = moved;
        }
    }

    /// Checks the cross-column length and back-reference invariants.
    pub(crate) fn verify_invariants(&self) -> Result<(), String> {
        let rows = self.values.len();
        if self.branches.len() != rows || self.users.len() != rows || self.hosts.len() != rows {
            return Err(format!(
                "parallel columns have differing lengths ({}/{}/{}/{})",
                self.branches.len(),
                self.users.len(),
                self.hosts.len(),
                rows
            ));
        }
        for i in 0..rows {
            let expected = i as u32;
            if self.branches[i].collection_index != expected
                || self.users[i].collection_index != expected
                || self.hosts[i].collection_index != expected
            {
                return Err(format!("collection index mismatch at row {i}"));
            }
        }
        Ok(())
    }

    fn filter_column(
        &self,
        column: &[MatchExpression],
        indexes: &[u32],
    ) -> PooledBuf<MatchExpression> {
        let mut view = EXPR_POOL.acquire();
        for &index in indexes {
            view.push(column[index as usize].clone());
        }
        view
    }

    fn gather_permissions(&self, indexes: &[u32]) -> Permissions {
        let mut permissions = Permissions::empty();
        for &index in indexes {
            permissions |= self.values[index as usize].permissions;
        }
        permissions
    }
}

/// Lock-protected handle to a rule table. Reads take the shared lock, edits
/// and deserialization take the exclusive lock. An integrity failure
/// poisons the handle: every subsequent operation fails until the process
/// restarts.
pub struct AccessControl {
    access: RwLock<Access>,
    poisoned: AtomicBool,
    read_locked_serialize: bool,
}

impl AccessControl {
    pub fn new(config: AccessConfig) -> Self {
        Self {
            access: RwLock::new(Access::new(config.super_user, config.super_host)),
            poisoned: AtomicBool::new(false),
            read_locked_serialize: config.read_locked_serialize,
        }
    }

    pub fn matches(
        &self,
        branch: &str,
        user: &str,
        host: &str,
    ) -> Result<(bool, Permissions), BranchgateError> {
        let access = self.read_guard()?;
        Ok(access.matches(branch, user, host))
    }

    pub fn index_of(
        &self,
        branch: &str,
        user: &str,
        host: &str,
    ) -> Result<Option<usize>, BranchgateError> {
        let access = self.read_guard()?;
        Ok(access.index_of(branch, user, host))
    }

    /// Index-level insert of an already-folded row. Rejects exact
    /// duplicates; policy checks (authorization, subsumption) belong to the
    /// editor.
    pub fn insert(
        &self,
        branch: &str,
        user: &str,
        host: &str,
        permissions: Permissions,
    ) -> Result<(), BranchgateError> {
        let mut access = self.write_guard()?;
        if let Some(existing) = access.index_of(branch, user, host) {
            let existing_permissions =
                permissions_to_set_string(access.values[existing].permissions);
            return Err(BranchgateError::DuplicatePrimaryKey {
                branch: branch.into(),
                user: user.into(),
                host: host.into(),
                existing_permissions,
            });
        }
        access.insert_row(branch, user, host, permissions);
        Ok(())
    }

    /// Index-level delete of an already-folded row. Absent rows are a
    /// no-op.
    pub fn delete(&self, branch: &str, user: &str, host: &str) -> Result<(), BranchgateError> {
        let mut access = self.write_guard()?;
        access.delete_row(branch, user, host);
        Ok(())
    }

    /// Encodes the table and its journal to the length-prefixed binary
    /// format. Takes the exclusive lock unless the config opted into
    /// read-locked snapshots.
    pub fn serialize(&self) -> Result<Vec<u8>, BranchgateError> {
        if self.read_locked_serialize {
            let access = self.read_guard()?;
            return Ok(codec::encode(&access));
        }
        let access = self.write_guard()?;
        Ok(codec::encode(&access))
    }

    /// Decodes a serialized table into this store. Fails without mutating
    /// the store if the input is malformed or the store is non-empty.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<(), BranchgateError> {
        let mut access = self.write_guard()?;
        if !access.values.is_empty() {
            return Err(BranchgateError::Decode(
                "cannot deserialize into a non-empty access table".into(),
            ));
        }
        let decoded =
            codec::decode(bytes).map_err(|e| BranchgateError::Decode(e.to_string()))?;
        access.binlog = Binlog::from_entries(decoded.binlog);
        access.branches = decoded.branches;
        access.users = decoded.users;
        access.hosts = decoded.hosts;
        access.values = decoded.values;
        info!(
            rules = access.values.len(),
            journal_entries = access.binlog.len(),
            "loaded serialized access table"
        );
        Ok(())
    }

    /// Clears the change journal. Called by the host after the serialized
    /// table has been durably persisted.
    pub fn checkpoint(&self) -> Result<(), BranchgateError> {
        let mut access = self.write_guard()?;
        access.binlog.clear();
        Ok(())
    }

    /// Snapshot of the change journal for host-side audit.
    pub fn journal(&self) -> Result<Vec<BinlogEntry>, BranchgateError> {
        let access = self.read_guard()?;
        Ok(access.binlog.entries().to_vec())
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    pub(crate) fn read_guard(&self) -> Result<RwLockReadGuard<'_, Access>, BranchgateError> {
        self.check_poisoned()?;
        Ok(self.access.read())
    }

    pub(crate) fn write_guard(&self) -> Result<RwLockWriteGuard<'_, Access>, BranchgateError> {
        self.check_poisoned()?;
        Ok(self.access.write())
    }

    pub(crate) fn poison(&self, reason: &str) {
        self.poisoned.store(true, Ordering::Release);
        warn!(reason, "access table poisoned; all further operations will fail");
    }

    fn check_poisoned(&self) -> Result<(), BranchgateError> {
        if self.poisoned.load(Ordering::Acquire) {
            return Err(BranchgateError::IntegrityError {
                message: "access table is poisoned".into(),
            });
        }
        Ok(())
    }
}
