use std::collections::HashSet;

use async_trait::async_trait;
use aws_sdk_ssoadmin::error::DisplayErrorContext;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::config::DeploymentContext;
use crate::error::Error;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionSetSummary {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Serialize)]
pub struct PermissionSetListing {
    pub id: Uuid,
    pub permissions: Vec<PermissionSetSummary>,
}

/// Read side of SSO Admin, scoped to one instance ARN.
#[async_trait]
pub trait SsoAdminApi: Send + Sync {
    async fn permission_set_arns(&self) -> Result<Vec<String>, Error>;
    async fn provisioned_to_account(&self, account_id: &str) -> Result<Vec<String>, Error>;
    async fn describe(&self, arn: &str) -> Result<PermissionSetSummary, Error>;
}

/// Permission sets available to this deployment, sorted by name.
///
/// Outside the management account, sets already provisioned there are
/// excluded by ARN. A failed provisioned-set lookup degrades to "exclude
/// nothing" so the listing itself still succeeds.
pub async fn resolve_permission_sets(
    api: &dyn SsoAdminApi,
    ctx: &DeploymentContext,
) -> Result<PermissionSetListing, Error> {
    let excluded: HashSet<String> = if ctx.deployed_in_management() {
        HashSet::new()
    } else {
        match api.provisioned_to_account(&ctx.management_account_id).await {
            Ok(arns) => arns.into_iter().collect(),
            Err(err) => {
                warn!("listing management-account permission sets failed, excluding none: {err}");
                HashSet::new()
            }
        }
    };

    let mut permissions = Vec::new();
    for arn in api.permission_set_arns().await? {
        if excluded.contains(&arn) {
            continue;
        }
        permissions.push(api.describe(&arn).await?);
    }
    permissions.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(PermissionSetListing {
        id: Uuid::new_v4(),
        permissions,
    })
}

pub struct AwsSsoAdmin {
    client: aws_sdk_ssoadmin::Client,
    instance_arn: String,
}

impl AwsSsoAdmin {
    pub fn new(client: aws_sdk_ssoadmin::Client, instance_arn: String) -> Self {
        Self {
            client,
            instance_arn,
        }
    }
}

#[async_trait]
impl SsoAdminApi for AwsSsoAdmin {
    async fn permission_set_arns(&self) -> Result<Vec<String>, Error> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_permission_sets()
                .instance_arn(&self.instance_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| Error::api("sso-admin", DisplayErrorContext(&err)))?;
            arns.extend(response.permission_sets().iter().cloned());
            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(arns)
    }

    async fn provisioned_to_account(&self, account_id: &str) -> Result<Vec<String>, Error> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_permission_sets_provisioned_to_account()
                .instance_arn(&self.instance_arn)
                .account_id(account_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| Error::api("sso-admin", DisplayErrorContext(&err)))?;
            arns.extend(response.permission_sets().iter().cloned());
            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(arns)
    }

    async fn describe(&self, arn: &str) -> Result<PermissionSetSummary, Error> {
        let response = self
            .client
            .describe_permission_set()
            .instance_arn(&self.instance_arn)
            .permission_set_arn(arn)
            .send()
            .await
            .map_err(|err| Error::api("sso-admin", DisplayErrorContext(&err)))?;
        let set = response
            .permission_set()
            .ok_or(Error::MissingResource("the described permission set"))?;

        Ok(PermissionSetSummary {
            name: set.name().unwrap_or_default().to_string(),
            arn: set.permission_set_arn().unwrap_or_default().to_string(),
        })
    }
}
