use crate::access::{Access, AccessControl, Permissions};
use crate::error::BranchgateError;
use crate::expression::{fold_expression, MAX_EXPRESSION_BYTES};
use crate::schema::{permissions_to_set_string, AccessRow};
use std::sync::Arc;

/// Host-session identity used to self-authorize rule edits. Operations
/// called without a session (startup loads) skip self-authorization.
pub trait SessionIdentity {
    fn user(&self) -> &str;
    fn host(&self) -> &str;
}

/// Statement lifecycle of the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Idle,
    Open,
    Committed,
    RolledBack,
}

/// Adapts the rule store to the host engine's row-level protocol. One
/// concrete type carries the insert, update, replace, and delete
/// capabilities; each operation folds its inputs, self-authorizes the
/// calling session against the pre-mutation store, enforces subsumption and
/// uniqueness, and mutates under a single write-lock critical section.
pub struct AccessTableEditor {
    control: Arc<AccessControl>,
    state: StatementState,
    rows_affected: u32,
}

struct FoldedTriple {
    branch: String,
    user: String,
    host: String,
}

/// Branch and host are case-insensitive columns and are lowercased after
/// folding; the user column is case-sensitive and keeps its case.
fn fold_row(branch: &str, user: &str, host: &str) -> FoldedTriple {
    FoldedTriple {
        branch: fold_expression(branch).to_lowercase(),
        user: fold_expression(user),
        host: fold_expression(host).to_lowercase(),
    }
}

fn check_lengths(folded: &FoldedTriple) -> Result<(), BranchgateError> {
    if folded.branch.len() > MAX_EXPRESSION_BYTES
        || folded.user.len() > MAX_EXPRESSION_BYTES
        || folded.host.len() > MAX_EXPRESSION_BYTES
    {
        return Err(BranchgateError::ExpressionsTooLong {
            branch: folded.branch.clone(),
            user: folded.user.clone(),
            host: folded.host.clone(),
        });
    }
    Ok(())
}

fn verify_store(control: &AccessControl, access: &Access) -> Result<(), BranchgateError> {
    if let Err(message) = access.verify_invariants() {
        control.poison(&message);
        return Err(BranchgateError::IntegrityError { message });
    }
    Ok(())
}

fn insert_folded(
    access: &mut Access,
    folded: &FoldedTriple,
    permissions: Permissions,
) -> Result<(), BranchgateError> {
    if let Some(existing) = access.index_of(&folded.branch, &folded.user, &folded.host) {
        let existing_permissions = permissions_to_set_string(access.values()[existing].permissions);
        return Err(BranchgateError::DuplicatePrimaryKey {
            branch: folded.branch.clone(),
            user: folded.user.clone(),
            host: folded.host.clone(),
            existing_permissions,
        });
    }
    access.insert_row(&folded.branch, &folded.user, &folded.host, permissions);
    Ok(())
}

impl AccessTableEditor {
    pub fn new(control: Arc<AccessControl>) -> Self {
        Self {
            control,
            state: StatementState::Idle,
            rows_affected: 0,
        }
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn statement_begin(&mut self) {
        self.state = StatementState::Open;
        self.rows_affected = 0;
    }

    /// Completes the open statement and returns the number of rows the
    /// statement affected.
    pub fn statement_complete(&mut self) -> u32 {
        self.state = StatementState::Committed;
        self.rows_affected
    }

    /// Abandons the open statement. Undoing accumulated mutations by
    /// journal replay is a reserved capability; the row counter is
    /// discarded.
    pub fn discard_changes(&mut self) {
        self.state = StatementState::RolledBack;
        self.rows_affected = 0;
    }

    pub fn insert(
        &mut self,
        session: Option<&dyn SessionIdentity>,
        row: &AccessRow,
    ) -> Result<(), BranchgateError> {
        let folded = fold_row(&row.branch, &row.user, &row.host);
        check_lengths(&folded)?;
        let mut access = self.control.write_guard()?;
        verify_store(&self.control, &access)?;

        if let Some(session) = session {
            // The folded branch expression doubles as a concrete branch name
            // for deciding whether the caller may edit rules covering it.
            let (_, session_permissions) =
                access.matches(&folded.branch, session.user(), session.host());
            if !session_permissions.contains(Permissions::ADMIN) {
                return Err(BranchgateError::InsertingRow {
                    user: session.user().into(),
                    host: session.host().into(),
                    row_branch: folded.branch,
                    row_user: folded.user,
                    row_host: folded.host,
                    row_permissions: permissions_to_set_string(row.permissions),
                });
            }
        }

        // An existing rule granting admin already matches every tuple this
        // row could match, so the new row would be dead.
        let (_, matched) = access.matches(&folded.branch, &folded.user, &folded.host);
        if matched.contains(Permissions::ADMIN) {
            return Err(BranchgateError::SubsetSubsumed {
                branch: folded.branch,
                user: folded.user,
                host: folded.host,
                existing_permissions: permissions_to_set_string(matched),
            });
        }

        insert_folded(&mut access, &folded, row.permissions)?;
        verify_store(&self.control, &access)?;
        drop(access);
        self.note_mutation();
        Ok(())
    }

    pub fn update(
        &mut self,
        session: Option<&dyn SessionIdentity>,
        old: &AccessRow,
        new: &AccessRow,
    ) -> Result<(), BranchgateError> {
        let old_folded = fold_row(&old.branch, &old.user, &old.host);
        let new_folded = fold_row(&new.branch, &new.user, &new.host);
        check_lengths(&new_folded)?;
        let mut access = self.control.write_guard()?;
        verify_store(&self.control, &access)?;

        let triple_changed = old_folded.branch != new_folded.branch
            || old_folded.user != new_folded.user
            || old_folded.host != new_folded.host;
        if triple_changed {
            if let Some(existing) =
                access.index_of(&new_folded.branch, &new_folded.user, &new_folded.host)
            {
                let existing_permissions =
                    permissions_to_set_string(access.values()[existing].permissions);
                return Err(BranchgateError::DuplicatePrimaryKey {
                    branch: new_folded.branch,
                    user: new_folded.user,
                    host: new_folded.host,
                    existing_permissions,
                });
            }
        }

        if let Some(session) = session {
            let (_, old_permissions) =
                access.matches(&old_folded.branch, session.user(), session.host());
            if !old_permissions.contains(Permissions::ADMIN) {
                return Err(BranchgateError::UpdatingRow {
                    user: session.user().into(),
                    host: session.host().into(),
                    row_branch: old_folded.branch,
                    row_user: old_folded.user,
                    row_host: old_folded.host,
                });
            }
            let (_, new_permissions) =
                access.matches(&new_folded.branch, session.user(), session.host());
            if !new_permissions.contains(Permissions::ADMIN) {
                return Err(BranchgateError::UpdatingToRow {
                    user: session.user().into(),
                    host: session.host().into(),
                    row_branch: old_folded.branch,
                    row_user: old_folded.user,
                    row_host: old_folded.host,
                    new_branch: new_folded.branch,
                });
            }
        }

        let (_, matched) = access.matches(&new_folded.branch, &new_folded.user, &new_folded.host);
        if matched.contains(Permissions::ADMIN) {
            return Err(BranchgateError::SubsetSubsumed {
                branch: new_folded.branch,
                user: new_folded.user,
                host: new_folded.host,
                existing_permissions: permissions_to_set_string(matched),
            });
        }

        access.delete_row(&old_folded.branch, &old_folded.user, &old_folded.host);
        insert_folded(&mut access, &new_folded, new.permissions)?;
        verify_store(&self.control, &access)?;
        drop(access);
        self.note_mutation();
        Ok(())
    }

    /// Replaces any exact-match row with the given row: a delete followed
    /// by an insert, each with its own authorization and checks.
    pub fn replace(
        &mut self,
        session: Option<&dyn SessionIdentity>,
        row: &AccessRow,
    ) -> Result<(), BranchgateError> {
        self.delete(session, row)?;
        self.insert(session, row)
    }

    pub fn delete(
        &mut self,
        session: Option<&dyn SessionIdentity>,
        row: &AccessRow,
    ) -> Result<(), BranchgateError> {
        let folded = fold_row(&row.branch, &row.user, &row.host);
        let mut access = self.control.write_guard()?;
        verify_store(&self.control, &access)?;

        if let Some(session) = session {
            let (_, session_permissions) =
                access.matches(&folded.branch, session.user(), session.host());
            if !session_permissions.contains(Permissions::ADMIN) {
                return Err(BranchgateError::DeletingRow {
                    user: session.user().into(),
                    host: session.host().into(),
                    row_branch: folded.branch,
                    row_user: folded.user,
                    row_host: folded.host,
                });
            }
        }

        access.delete_row(&folded.branch, &folded.user, &folded.host);
        verify_store(&self.control, &access)?;
        drop(access);
        self.note_mutation();
        Ok(())
    }

    fn note_mutation(&mut self) {
        if self.state == StatementState::Open {
            self.rows_affected += 1;
        }
    }
}
