use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchgateErrorCode {
    ExpressionsTooLong,
    InsertingRow,
    UpdatingRow,
    UpdatingToRow,
    DeletingRow,
    DuplicatePrimaryKey,
    SubsetSubsumed,
    Decode,
    IntegrityError,
}

impl BranchgateErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            BranchgateErrorCode::ExpressionsTooLong => "expressions_too_long",
            BranchgateErrorCode::InsertingRow => "inserting_row",
            BranchgateErrorCode::UpdatingRow => "updating_row",
            BranchgateErrorCode::UpdatingToRow => "updating_to_row",
            BranchgateErrorCode::DeletingRow => "deleting_row",
            BranchgateErrorCode::DuplicatePrimaryKey => "duplicate_primary_key",
            BranchgateErrorCode::SubsetSubsumed => "subset_subsumed",
            BranchgateErrorCode::Decode => "decode",
            BranchgateErrorCode::IntegrityError => "integrity_error",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BranchgateError {
    #[error(
        "the folded expressions [{branch:?}, {user:?}, {host:?}] exceed the maximum expression length"
    )]
    ExpressionsTooLong {
        branch: String,
        user: String,
        host: String,
    },
    #[error(
        "`{user}`@`{host}` does not have permission to insert the row [{row_branch:?}, {row_user:?}, {row_host:?}, {row_permissions:?}]"
    )]
    InsertingRow {
        user: String,
        host: String,
        row_branch: String,
        row_user: String,
        row_host: String,
        row_permissions: String,
    },
    #[error(
        "`{user}`@`{host}` does not have permission to update the row [{row_branch:?}, {row_user:?}, {row_host:?}]"
    )]
    UpdatingRow {
        user: String,
        host: String,
        row_branch: String,
        row_user: String,
        row_host: String,
    },
    #[error(
        "`{user}`@`{host}` does not have permission to move the row [{row_branch:?}, {row_user:?}, {row_host:?}] to the branch expression {new_branch:?}"
    )]
    UpdatingToRow {
        user: String,
        host: String,
        row_branch: String,
        row_user: String,
        row_host: String,
        new_branch: String,
    },
    #[error(
        "`{user}`@`{host}` does not have permission to delete the row [{row_branch:?}, {row_user:?}, {row_host:?}]"
    )]
    DeletingRow {
        user: String,
        host: String,
        row_branch: String,
        row_user: String,
        row_host: String,
    },
    #[error(
        "duplicate primary key [{branch:?}, {user:?}, {host:?}] (existing permissions: {existing_permissions})"
    )]
    DuplicatePrimaryKey {
        branch: String,
        user: String,
        host: String,
        existing_permissions: String,
    },
    #[error(
        "an existing rule already grants admin over every tuple matched by [{branch:?}, {user:?}, {host:?}] (matched permissions: {existing_permissions})"
    )]
    SubsetSubsumed {
        branch: String,
        user: String,
        host: String,
        existing_permissions: String,
    },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("integrity error: {message}")]
    IntegrityError { message: String },
}

impl BranchgateError {
    pub fn code(&self) -> BranchgateErrorCode {
        match self {
            BranchgateError::ExpressionsTooLong { .. } => BranchgateErrorCode::ExpressionsTooLong,
            BranchgateError::InsertingRow { .. } => BranchgateErrorCode::InsertingRow,
            BranchgateError::UpdatingRow { .. } => BranchgateErrorCode::UpdatingRow,
            BranchgateError::UpdatingToRow { .. } => BranchgateErrorCode::UpdatingToRow,
            BranchgateError::DeletingRow { .. } => BranchgateErrorCode::DeletingRow,
            BranchgateError::DuplicatePrimaryKey { .. } => BranchgateErrorCode::DuplicatePrimaryKey,
            BranchgateError::SubsetSubsumed { .. } => BranchgateErrorCode::SubsetSubsumed,
            BranchgateError::Decode(_) => BranchgateErrorCode::Decode,
            BranchgateError::IntegrityError { .. } => BranchgateErrorCode::IntegrityError,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }
}
