//! Opaque user-directory collaborator.
//!
//! Persistent storage, password hashing, and profile media live outside this
//! crate; the pipeline and handlers only need lookup and credential checks.
//! The in-memory implementation backs development and tests.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    Duplicate,
}

pub trait UserDirectory: Send + Sync {
    fn register(&self, email: &str, display_name: &str, password: &str) -> RegisterOutcome;
    fn verify_credentials(&self, email: &str, password: &str) -> Option<UserRecord>;
    fn find(&self, email: &str) -> Option<UserRecord>;
}

struct StoredUser {
    display_name: String,
    // Opaque credential material; hashing is the real directory's concern.
    password: String,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    users: Mutex<HashMap<String, StoredUser>>,
}

impl UserDirectory for InMemoryDirectory {
    fn register(&self, email: &str, display_name: &str, password: &str) -> RegisterOutcome {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if users.contains_key(email) {
            return RegisterOutcome::Duplicate;
        }
        users.insert(
            email.to_string(),
            StoredUser {
                display_name: display_name.to_string(),
                password: password.to_string(),
            },
        );
        RegisterOutcome::Created
    }

    fn verify_credentials(&self, email: &str, password: &str) -> Option<UserRecord> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        let stored = users.get(email)?;
        if stored.password == password {
            Some(UserRecord {
                email: email.to_string(),
                display_name: stored.display_name.clone(),
            })
        } else {
            None
        }
    }

    fn find(&self, email: &str) -> Option<UserRecord> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users.get(email).map(|stored| UserRecord {
            email: email.to_string(),
            display_name: stored.display_name.clone(),
        })
    }
}
