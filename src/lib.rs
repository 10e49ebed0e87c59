pub mod access;
pub mod binlog;
pub mod collation;
pub mod config;
pub mod editor;
pub mod error;
pub mod expression;
pub mod matcher;
pub mod schema;

pub use crate::access::{Access, AccessControl, AccessValue, Permissions};
pub use crate::config::AccessConfig;
pub use crate::editor::{AccessTableEditor, SessionIdentity, StatementState};
pub use crate::error::{BranchgateError, BranchgateErrorCode};
pub use crate::schema::AccessRow;
