use rand::Rng;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use cohort_shared::{NewAccount, Role, UserProfile};

const TOKEN_LEN: usize = 7;
const TOKEN_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const DEFAULT_FIRST_NAME: &str = "First";
const DEFAULT_LAST_NAME: &str = "Last";
const DEFAULT_DISPLAY_NAME: &str = "Display";
const DEFAULT_POINTS: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("could not read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("person entry {index} is missing the required \"role\" field")]
    MissingRole { index: usize },
}

/// Batch definition document: a list of person templates.
#[derive(Debug, Deserialize)]
pub struct BatchTemplate {
    pub people: Vec<PersonTemplate>,
}

/// One entry of the input document. Only `role` is required; everything
/// else is filled in during resolution.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonTemplate {
    pub role: Option<Role>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub approval_status: Option<bool>,
    pub student_id: Option<String>,
    pub points: Option<i64>,
}

/// Fully resolved account: credentials for the auth store plus the
/// profile record written once creation succeeds.
#[derive(Debug, Clone)]
pub struct AccountSpec {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub profile: UserProfile,
}

impl AccountSpec {
    pub fn new_account(&self) -> NewAccount {
        NewAccount {
            email: self.email.clone(),
            password: self.password.clone(),
            display_name: self.display_name.clone(),
            email_verified: true,
            disabled: false,
        }
    }
}

/// Loads and resolves the batch template at `path`.
pub async fn load_specs(path: &Path) -> Result<Vec<AccountSpec>, TemplateError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let template: BatchTemplate =
        serde_json::from_str(&raw).map_err(|source| TemplateError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

    resolve_specs(template)
}

/// Applies defaults to every entry. Generated tokens are tracked across
/// the batch so defaulted emails and student IDs cannot collide within
/// one run.
pub fn resolve_specs(template: BatchTemplate) -> Result<Vec<AccountSpec>, TemplateError> {
    let mut used_tokens = HashSet::new();
    template
        .people
        .into_iter()
        .enumerate()
        .map(|(index, person)| resolve_person(index, person, &mut used_tokens))
        .collect()
}

fn resolve_person(
    index: usize,
    person: PersonTemplate,
    used_tokens: &mut HashSet<String>,
) -> Result<AccountSpec, TemplateError> {
    // Role has no default; authorization downstream depends on it.
    let role = person.role.ok_or(TemplateError::MissingRole { index })?;

    let token = fresh_token(used_tokens);
    let email = person
        .email
        .unwrap_or_else(|| format!("user{}@example.com", token));
    let password = person.password.unwrap_or_else(|| token.clone());
    let first_name = person
        .first_name
        .unwrap_or_else(|| DEFAULT_FIRST_NAME.to_string());
    let last_name = person
        .last_name
        .unwrap_or_else(|| DEFAULT_LAST_NAME.to_string());
    let display_name = person
        .display_name
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

    let (approval_status, student_id, points) = match role {
        Role::Student => (
            Some(person.approval_status.unwrap_or(false)),
            Some(
                person
                    .student_id
                    .unwrap_or_else(|| fresh_token(used_tokens)),
            ),
            Some(person.points.unwrap_or(DEFAULT_POINTS)),
        ),
        Role::Admin => (None, None, None),
    };

    Ok(AccountSpec {
        profile: UserProfile {
            role,
            email: email.clone(),
            first_name,
            last_name,
            approval_status,
            student_id,
            points,
            created_at: None,
        },
        email,
        password,
        display_name,
    })
}

fn fresh_token(used_tokens: &mut HashSet<String>) -> String {
    loop {
        let token = random_token();
        if used_tokens.insert(token.clone()) {
            return token;
        }
    }
}

fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_CHARS[rng.gen_range(0..TOKEN_CHARS.len())] as char)
        .collect()
}
