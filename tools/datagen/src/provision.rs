use chrono::Utc;
use futures::future::join_all;

use cohort_shared::{DirectoryError, DirectoryService};

use crate::ledger::Ledger;
use crate::template::AccountSpec;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("could not create account for {email}: {source}")]
    CreateAccount {
        email: String,
        #[source]
        source: DirectoryError,
    },

    #[error("account {identifier} created but its profile write failed: {source}")]
    ProfileWrite {
        identifier: String,
        #[source]
        source: DirectoryError,
    },

    #[error("account {identifier} created but could not be recorded in the ledger: {source}")]
    Ledger {
        identifier: String,
        #[source]
        source: std::io::Error,
    },
}

/// Identifier assigned by the directory, paired with the email it was
/// provisioned for.
#[derive(Debug, Clone)]
pub struct ProvisionResult {
    pub identifier: String,
    pub email: String,
}

/// Creates every account in `specs`, fanning the items out concurrently
/// and waiting for all of them to settle. Returns one result per input
/// spec; a failing item never aborts its siblings.
pub async fn provision<D: DirectoryService>(
    directory: &D,
    specs: Vec<AccountSpec>,
    ledger: &Ledger,
) -> Vec<Result<ProvisionResult, ProvisionError>> {
    let tasks = specs
        .into_iter()
        .map(|spec| provision_one(directory, spec, ledger));
    join_all(tasks).await
}

async fn provision_one<D: DirectoryService>(
    directory: &D,
    spec: AccountSpec,
    ledger: &Ledger,
) -> Result<ProvisionResult, ProvisionError> {
    let identifier = directory
        .create_account(&spec.new_account())
        .await
        .map_err(|source| ProvisionError::CreateAccount {
            email: spec.email.clone(),
            source,
        })?;

    let mut profile = spec.profile;
    profile.created_at = Some(Utc::now().to_rfc3339());

    let path = format!("users/{}", identifier);
    let record = serde_json::to_value(&profile).map_err(|e| ProvisionError::ProfileWrite {
        identifier: identifier.clone(),
        source: DirectoryError::RecordWrite {
            path: path.clone(),
            message: e.to_string(),
        },
    })?;

    // The account stays in place on a profile-write failure; the two
    // stores are then inconsistent until cleaned up out-of-band.
    if let Err(source) = directory.write_record(&path, &record, true).await {
        tracing::warn!(
            "Account {} exists but its profile write failed; auth and record stores now disagree",
            identifier
        );
        return Err(ProvisionError::ProfileWrite { identifier, source });
    }

    ledger
        .record(&identifier)
        .await
        .map_err(|source| ProvisionError::Ledger {
            identifier: identifier.clone(),
            source,
        })?;

    tracing::info!("Provisioned {} as {}", profile.email, identifier);
    Ok(ProvisionResult {
        identifier,
        email: profile.email,
    })
}

/// Logs the batch outcome and each per-item failure.
pub fn summarize(results: &[Result<ProvisionResult, ProvisionError>]) {
    let created = results.iter().filter(|result| result.is_ok()).count();
    let failed = results.len() - created;

    for result in results {
        if let Err(e) = result {
            tracing::error!("{}", e);
        }
    }

    tracing::info!("Provisioning finished: {} created, {} failed", created, failed);
}
