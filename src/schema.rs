use crate::access::{AccessControl, Permissions};
use crate::collation::Collation;
use crate::error::BranchgateError;
use serde::{Deserialize, Serialize};

/// Name of the virtual table surfacing the rule store to the host engine.
pub const ACCESS_TABLE_NAME: &str = "branch_access";

/// String names of the permission flags, ordered by flag value.
pub const PERMISSION_STRINGS: [&str; 2] = ["admin", "write"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    VarChar {
        max_length: u32,
        collation: Collation,
    },
    /// SET over `PERMISSION_STRINGS`.
    PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub col_type: ColumnType,
    pub primary_key: bool,
}

/// Schema of the access table: a composite primary key over the three
/// pattern columns. Branch and host collate case-insensitively; user is
/// binary.
pub fn access_schema() -> Vec<ColumnDef> {
    vec![
        ColumnDef {
            name: "branch".into(),
            col_type: ColumnType::VarChar {
                max_length: 16383,
                collation: Collation::Utf8mb4AiCi,
            },
            primary_key: true,
        },
        ColumnDef {
            name: "user".into(),
            col_type: ColumnType::VarChar {
                max_length: 16383,
                collation: Collation::Utf8mb4Bin,
            },
            primary_key: true,
        },
        ColumnDef {
            name: "host".into(),
            col_type: ColumnType::VarChar {
                max_length: 16383,
                collation: Collation::Utf8mb4AiCi,
            },
            primary_key: true,
        },
        ColumnDef {
            name: "permissions".into(),
            col_type: ColumnType::PermissionSet,
            primary_key: false,
        },
    ]
}

/// A user-visible row of the access table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRow {
    pub branch: String,
    pub user: String,
    pub host: String,
    pub permissions: Permissions,
}

impl AccessRow {
    pub fn new(
        branch: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
        permissions: Permissions,
    ) -> Self {
        Self {
            branch: branch.into(),
            user: user.into(),
            host: host.into(),
            permissions,
        }
    }
}

/// Renders permissions as the SET literal, e.g. `admin,write`.
pub fn permissions_to_set_string(permissions: Permissions) -> String {
    let mut parts = Vec::new();
    if permissions.contains(Permissions::ADMIN) {
        parts.push(PERMISSION_STRINGS[0]);
    }
    if permissions.contains(Permissions::WRITE) {
        parts.push(PERMISSION_STRINGS[1]);
    }
    parts.join(",")
}

/// Parses a SET literal back into permissions. Empty elements are ignored;
/// an unknown element yields `None`.
pub fn permissions_from_set_string(set: &str) -> Option<Permissions> {
    let mut permissions = Permissions::empty();
    for part in set.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.eq_ignore_ascii_case(PERMISSION_STRINGS[0]) {
            permissions |= Permissions::ADMIN;
        } else if part.eq_ignore_ascii_case(PERMISSION_STRINGS[1]) {
            permissions |= Permissions::WRITE;
        } else {
            return None;
        }
    }
    Some(permissions)
}

/// Scans the table for the host engine: the synthetic superuser row first
/// (`('%', super_user, super_host, admin)`, never stored and never
/// editable), followed by the stored rules in index order.
pub fn rows(control: &AccessControl) -> Result<Vec<AccessRow>, BranchgateError> {
    let access = control.read_guard()?;
    let mut rows = Vec::with_capacity(access.len() + 1);
    rows.push(AccessRow {
        branch: "%".into(),
        user: access.super_user().into(),
        host: access.super_host().into(),
        permissions: Permissions::ADMIN,
    });
    for value in access.values() {
        rows.push(AccessRow {
            branch: value.branch.clone(),
            user: value.user.clone(),
            host: value.host.clone(),
            permissions: value.permissions,
        });
    }
    Ok(rows)
}
