use aws_sdk_cognitoidentityprovider::types::{AttributeType, MessageActionType};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use async_trait::async_trait;
use serde_json::Value;
use std::env;

use crate::directory::{DirectoryError, DirectoryService, NewAccount};

/// Directory backend over Cognito (accounts) and DynamoDB (records).
pub struct AwsDirectory {
    cognito: CognitoClient,
    dynamo: DynamoClient,
    user_pool_id: String,
    table_name: String,
}

impl AwsDirectory {
    /// Builds the AWS clients once from the ambient environment.
    pub async fn connect() -> Result<Self, DirectoryError> {
        let config = aws_config::load_from_env().await;
        let user_pool_id = env::var("COGNITO_USER_POOL_ID")
            .map_err(|_| DirectoryError::Config("COGNITO_USER_POOL_ID must be set".to_string()))?;
        let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "cohort".to_string());

        Ok(Self {
            cognito: CognitoClient::new(&config),
            dynamo: DynamoClient::new(&config),
            user_pool_id,
            table_name,
        })
    }

    /// Releases the directory handle. The SDK clients hold no server-side
    /// session state, so closing only ends the handle's scope.
    pub fn close(self) {
        tracing::debug!("Directory connection closed");
    }
}

fn user_attribute(name: &str, value: &str) -> Result<AttributeType, DirectoryError> {
    AttributeType::builder()
        .name(name)
        .value(value)
        .build()
        .map_err(|e| DirectoryError::CreateAccount(format!("invalid user attribute {}: {}", name, e)))
}

/// Map well-known Cognito exceptions to operator-friendly text; anything
/// else keeps the SDK's debug rendering.
fn friendly_cognito_error(raw: String) -> String {
    if raw.contains("UsernameExistsException") {
        "an account with this email already exists".to_string()
    } else if raw.contains("InvalidPasswordException") {
        "password does not satisfy the user pool's password policy".to_string()
    } else if raw.contains("UserNotFoundException") {
        "no account exists with this identifier".to_string()
    } else if raw.contains("InvalidParameterException") {
        "invalid email or attribute format".to_string()
    } else {
        raw
    }
}

/// DynamoDB key for a record path. `users/{id}` style paths key the item
/// by collection and identifier; a bare path is a singleton record.
fn record_key(path: &str) -> (String, String) {
    match path.split_once('/') {
        Some((collection, id)) => {
            let pk = format!("{}#{}", collection.to_uppercase(), id);
            (pk.clone(), pk)
        }
        None => (path.to_uppercase(), "METADATA".to_string()),
    }
}

fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect(),
        ),
    }
}

fn from_attribute_value(attr: &AttributeValue) -> Value {
    match attr {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => serde_json::from_str::<serde_json::Number>(n)
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(n.clone())),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(items.iter().map(from_attribute_value).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_attribute_value(v)))
                .collect(),
        ),
        other => Value::String(format!("{:?}", other)),
    }
}

fn record_fields(path: &str, value: &Value) -> Result<serde_json::Map<String, Value>, DirectoryError> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(DirectoryError::RecordWrite {
            path: path.to_string(),
            message: "record value must be a JSON object".to_string(),
        }),
    }
}

#[async_trait]
impl DirectoryService for AwsDirectory {
    async fn create_account(&self, account: &NewAccount) -> Result<String, DirectoryError> {
        let email_verified = if account.email_verified { "true" } else { "false" };

        let result = self
            .cognito
            .admin_create_user()
            .user_pool_id(&self.user_pool_id)
            .username(&account.email)
            .message_action(MessageActionType::Suppress)
            .user_attributes(user_attribute("email", &account.email)?)
            .user_attributes(user_attribute("email_verified", email_verified)?)
            .user_attributes(user_attribute("name", &account.display_name)?)
            .send()
            .await
            .map_err(|e| {
                let raw = format!("{:?}", e);
                tracing::error!("Cognito create error for {}: {}", account.email, raw);
                DirectoryError::CreateAccount(friendly_cognito_error(raw))
            })?;

        let user = result.user().ok_or_else(|| {
            DirectoryError::CreateAccount("no user record returned".to_string())
        })?;

        // Admin calls address users by the pool-assigned username, so that
        // is the identifier every other store keys on.
        let identifier = user
            .username()
            .or_else(|| {
                user.attributes()
                    .iter()
                    .find(|attr| attr.name() == "sub")
                    .and_then(|attr| attr.value())
            })
            .map(|s| s.to_string())
            .ok_or_else(|| {
                DirectoryError::CreateAccount("created user has no identifier".to_string())
            })?;

        self.cognito
            .admin_set_user_password()
            .user_pool_id(&self.user_pool_id)
            .username(&identifier)
            .password(&account.password)
            .permanent(true)
            .send()
            .await
            .map_err(|e| {
                let raw = format!("{:?}", e);
                tracing::error!("Cognito set-password error for {}: {}", identifier, raw);
                DirectoryError::CreateAccount(friendly_cognito_error(raw))
            })?;

        if account.disabled {
            self.cognito
                .admin_disable_user()
                .user_pool_id(&self.user_pool_id)
                .username(&identifier)
                .send()
                .await
                .map_err(|e| {
                    DirectoryError::CreateAccount(friendly_cognito_error(format!("{:?}", e)))
                })?;
        }

        tracing::info!("Created account {} for {}", identifier, account.email);
        Ok(identifier)
    }

    async fn delete_account(&self, identifier: &str) -> Result<(), DirectoryError> {
        self.cognito
            .admin_delete_user()
            .user_pool_id(&self.user_pool_id)
            .username(identifier)
            .send()
            .await
            .map_err(|e| {
                let raw = format!("{:?}", e);
                tracing::error!("Cognito delete error for {}: {}", identifier, raw);
                DirectoryError::DeleteAccount(friendly_cognito_error(raw))
            })?;

        tracing::info!("Deleted account {}", identifier);
        Ok(())
    }

    async fn read_record(&self, path: &str) -> Result<Option<Value>, DirectoryError> {
        let (pk, sk) = record_key(path);

        let result = self
            .dynamo
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk))
            .send()
            .await
            .map_err(|e| DirectoryError::RecordRead {
                path: path.to_string(),
                message: format!("{:?}", e),
            })?;

        Ok(result.item().map(|item| {
            let mut map = serde_json::Map::new();
            for (name, attr) in item {
                if name == "PK" || name == "SK" {
                    continue;
                }
                map.insert(name.clone(), from_attribute_value(attr));
            }
            Value::Object(map)
        }))
    }

    async fn write_record(
        &self,
        path: &str,
        value: &Value,
        merge: bool,
    ) -> Result<(), DirectoryError> {
        let (pk, sk) = record_key(path);
        let fields = record_fields(path, value)?;

        if merge {
            if fields.is_empty() {
                return Ok(());
            }

            let mut update_expr = Vec::with_capacity(fields.len());
            let mut builder = self
                .dynamo
                .update_item()
                .table_name(&self.table_name)
                .key("PK", AttributeValue::S(pk))
                .key("SK", AttributeValue::S(sk));

            // Placeholder every attribute name; "role" and friends are
            // reserved words in DynamoDB expressions.
            for (i, (name, field)) in fields.iter().enumerate() {
                let name_ph = format!("#f{}", i);
                let value_ph = format!(":v{}", i);
                update_expr.push(format!("{} = {}", name_ph, value_ph));
                builder = builder
                    .expression_attribute_names(name_ph, name)
                    .expression_attribute_values(value_ph, to_attribute_value(field));
            }

            builder
                .update_expression(format!("SET {}", update_expr.join(", ")))
                .send()
                .await
                .map_err(|e| DirectoryError::RecordWrite {
                    path: path.to_string(),
                    message: format!("{:?}", e),
                })?;
        } else {
            let mut builder = self
                .dynamo
                .put_item()
                .table_name(&self.table_name)
                .item("PK", AttributeValue::S(pk))
                .item("SK", AttributeValue::S(sk));

            for (name, field) in &fields {
                builder = builder.item(name, to_attribute_value(field));
            }

            builder.send().await.map_err(|e| DirectoryError::RecordWrite {
                path: path.to_string(),
                message: format!("{:?}", e),
            })?;
        }

        tracing::info!("Wrote record at {}", path);
        Ok(())
    }

    async fn delete_record(&self, path: &str) -> Result<(), DirectoryError> {
        let (pk, sk) = record_key(path);

        self.dynamo
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk))
            .send()
            .await
            .map_err(|e| DirectoryError::RecordDelete {
                path: path.to_string(),
                message: format!("{:?}", e),
            })?;

        tracing::info!("Removed record at {}", path);
        Ok(())
    }
}
