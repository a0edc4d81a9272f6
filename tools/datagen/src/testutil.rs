use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use cohort_shared::{DirectoryError, DirectoryService, NewAccount};

/// In-memory directory used by the workflow tests. The failure sets make
/// individual operations reject without touching sibling items: creates
/// are keyed by email, record writes by the profile's email or the record
/// path, deletes by identifier or path.
#[derive(Default)]
pub struct MockDirectory {
    pub accounts: Mutex<HashMap<String, NewAccount>>,
    pub records: Mutex<HashMap<String, Value>>,
    pub fail_creates: HashSet<String>,
    pub fail_profile_writes: HashSet<String>,
    pub fail_record_writes: HashSet<String>,
    pub fail_deletes: HashSet<String>,
    pub fail_record_deletes: HashSet<String>,
}

impl MockDirectory {
    pub fn identifier_for(&self, email: &str) -> Option<String> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|(_, account)| account.email == email)
            .map(|(identifier, _)| identifier.clone())
    }
}

#[async_trait]
impl DirectoryService for MockDirectory {
    async fn create_account(&self, account: &NewAccount) -> Result<String, DirectoryError> {
        let mut accounts = self.accounts.lock().unwrap();
        if self.fail_creates.contains(&account.email)
            || accounts.values().any(|existing| existing.email == account.email)
        {
            return Err(DirectoryError::CreateAccount(
                "an account with this email already exists".to_string(),
            ));
        }

        let identifier = Uuid::new_v4().to_string();
        accounts.insert(identifier.clone(), account.clone());
        Ok(identifier)
    }

    async fn delete_account(&self, identifier: &str) -> Result<(), DirectoryError> {
        let mut accounts = self.accounts.lock().unwrap();
        if self.fail_deletes.contains(identifier) || accounts.remove(identifier).is_none() {
            return Err(DirectoryError::DeleteAccount(
                "no account exists with this identifier".to_string(),
            ));
        }
        Ok(())
    }

    async fn read_record(&self, path: &str) -> Result<Option<Value>, DirectoryError> {
        Ok(self.records.lock().unwrap().get(path).cloned())
    }

    async fn write_record(
        &self,
        path: &str,
        value: &Value,
        merge: bool,
    ) -> Result<(), DirectoryError> {
        let written_email = value.get("email").and_then(Value::as_str).unwrap_or("");
        if self.fail_record_writes.contains(path) || self.fail_profile_writes.contains(written_email)
        {
            return Err(DirectoryError::RecordWrite {
                path: path.to_string(),
                message: "write rejected".to_string(),
            });
        }

        let mut records = self.records.lock().unwrap();
        match records.get_mut(path) {
            Some(Value::Object(existing)) if merge => {
                if let Value::Object(fields) = value {
                    for (name, field) in fields {
                        existing.insert(name.clone(), field.clone());
                    }
                }
            }
            _ => {
                records.insert(path.to_string(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete_record(&self, path: &str) -> Result<(), DirectoryError> {
        if self.fail_record_deletes.contains(path) {
            return Err(DirectoryError::RecordDelete {
                path: path.to_string(),
                message: "delete rejected".to_string(),
            });
        }
        self.records.lock().unwrap().remove(path);
        Ok(())
    }
}
