// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Target account and the AWS provider bound to it.

use launchpad_engine::{ModuleOutput, ProviderRef, Resource, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::conf::{AccountConf, DEFAULT_ROLE_NAME};
use crate::config::{ConfigError, Violation};
use crate::error::Result;

/// Resolved target account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOutput {
    /// Account id.
    pub account_id: String,
    /// Role assumed for provisioning.
    pub role_arn: String,
    /// Whether the account was created by this stack.
    pub created: bool,
}

impl ModuleOutput for AccountOutput {}

/// Create the member account if requested and resolve the role to assume.
pub async fn setup(
    ctx: &StackContext,
    prefix: &str,
    conf: &AccountConf,
    protect: bool,
) -> Result<AccountOutput> {
    match (&conf.new_account, &conf.existing_account) {
        (Some(new), None) => {
            let role_name = new.role_name.as_deref().unwrap_or(DEFAULT_ROLE_NAME);
            let mut account = Resource::new(
                "aws:organizations/account:Account",
                format!("{}-account", prefix),
            )
            .input("name", new.name.as_str())
            .input("email", new.email.as_str())
            .input("roleName", role_name)
            .input("closeOnDeletion", false)
            .protect(protect);
            if let Some(parent) = &new.parent_id {
                account = account.input("parentId", parent.as_str());
            }
            let account = ctx.register(account).await?;
            info!(account_id = %account.id(), "Member account ready");

            Ok(AccountOutput {
                role_arn: format!("arn:aws:iam::{}:role/{}", account.id(), role_name),
                account_id: account.id().to_string(),
                created: true,
            })
        }
        (None, Some(existing)) => {
            let role_name = existing.role_name.as_deref().unwrap_or(DEFAULT_ROLE_NAME);
            Ok(AccountOutput {
                role_arn: format!("arn:aws:iam::{}:role/{}", existing.account_id, role_name),
                account_id: existing.account_id.clone(),
                created: false,
            })
        }
        _ => Err(ConfigError::Invalid(vec![Violation {
            field: "accountConf".to_string(),
            value: String::new(),
            message: "Exactly one of newAccount or existingAccount must be set".to_string(),
        }])
        .into()),
    }
}

/// Register the AWS provider that assumes the account role in `region`.
pub async fn provider(
    ctx: &StackContext,
    prefix: &str,
    region: &str,
    account: &AccountOutput,
) -> Result<ProviderRef> {
    Ok(ctx
        .provider(
            "aws",
            format!("{}-aws", prefix),
            json!({
                "region": region,
                "accountId": account.account_id,
                "assumeRoleArn": account.role_arn,
            }),
        )
        .await?)
}
