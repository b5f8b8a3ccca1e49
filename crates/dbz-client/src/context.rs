use std::fmt;

use dbz_core::identifier::DatabaseId;

/// Who is making a request, and against which database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionContext {
    database_id: DatabaseId,
    username: String,
}

impl ExecutionContext {
    pub fn new(database_id: DatabaseId, username: impl Into<String>) -> ExecutionContext {
        ExecutionContext {
            database_id,
            username: username.into(),
        }
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.database_id)
    }
}
