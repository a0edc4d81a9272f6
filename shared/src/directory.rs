use async_trait::async_trait;
use serde_json::Value;

/// Request to create one account in the directory's auth store.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub email_verified: bool,
    pub disabled: bool,
}

/// Errors surfaced by a directory backend.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("account creation rejected: {0}")]
    CreateAccount(String),

    #[error("account deletion rejected: {0}")]
    DeleteAccount(String),

    #[error("record read at {path} failed: {message}")]
    RecordRead { path: String, message: String },

    #[error("record write at {path} failed: {message}")]
    RecordWrite { path: String, message: String },

    #[error("record delete at {path} failed: {message}")]
    RecordDelete { path: String, message: String },

    #[error("directory configuration error: {0}")]
    Config(String),
}

/// Operations the seeding workflows invoke on the hosted backend.
///
/// The client is constructed by the caller and passed into each workflow,
/// so tests can substitute an in-memory directory.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Creates an auth account and returns the identifier assigned to it.
    async fn create_account(&self, account: &NewAccount) -> Result<String, DirectoryError>;

    /// Deletes the auth account with the given identifier.
    async fn delete_account(&self, identifier: &str) -> Result<(), DirectoryError>;

    /// Reads the record at `path`, or `None` if it does not exist.
    async fn read_record(&self, path: &str) -> Result<Option<Value>, DirectoryError>;

    /// Writes `value` at `path`. With `merge` the value's top-level fields
    /// are folded into the existing record; otherwise the record is
    /// replaced wholesale.
    async fn write_record(&self, path: &str, value: &Value, merge: bool)
        -> Result<(), DirectoryError>;

    /// Removes the record at `path`.
    async fn delete_record(&self, path: &str) -> Result<(), DirectoryError>;
}
