use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use aws_sdk_organizations::error::DisplayErrorContext;
use serde::Serialize;

use crate::config::DeploymentContext;
use crate::error::Error;

/// One node of the organization hierarchy. The raw list calls leave
/// `children` empty; the tree builder fills it in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrgUnit {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub children: Vec<OrgUnit>,
}

/// Account reference as stored in entitlement records and returned to the
/// frontend, hence the lowercase field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrgParent {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Type")]
    pub parent_type: String,
}

/// Read side of the Organizations API used by the resolvers.
#[async_trait]
pub trait OrganizationsApi: Send + Sync {
    async fn roots(&self) -> Result<Vec<OrgUnit>, Error>;
    async fn child_units(&self, parent_id: &str) -> Result<Vec<OrgUnit>, Error>;
    async fn child_accounts(&self, parent_id: &str) -> Result<Vec<AccountRef>, Error>;
    async fn parents_of(&self, child_id: &str) -> Result<Vec<OrgParent>, Error>;
}

/// Recursively assembles the OU tree below `parent_id`, depth first, keeping
/// the API's ordering. An OU with no children is the base case. Any API
/// error aborts the whole build; nothing partial is returned.
///
/// No cycle detection: a real organization is a tree, so recursion depth is
/// bounded by its actual depth.
pub fn build_ou_tree<'a>(
    api: &'a dyn OrganizationsApi,
    parent_id: &'a str,
) -> Pin<Box<dyn Future<Output = Result<Vec<OrgUnit>, Error>> + Send + 'a>> {
    Box::pin(async move {
        let mut units = api.child_units(parent_id).await?;
        for unit in &mut units {
            let id = unit.id.clone();
            unit.children = build_ou_tree(api, &id).await?;
        }
        Ok(units)
    })
}

/// The full hierarchy: the organization root with every OU below it.
pub async fn organization_tree(api: &dyn OrganizationsApi) -> Result<OrgUnit, Error> {
    let mut roots = api.roots().await?;
    if roots.is_empty() {
        return Err(Error::MissingResource("an organization root"));
    }
    let mut root = roots.swap_remove(0);
    let root_id = root.id.clone();
    root.children = build_ou_tree(api, &root_id).await?;
    Ok(root)
}

/// First parent of an OU or account. Everything except the root has exactly
/// one.
pub async fn parent_of(api: &dyn OrganizationsApi, child_id: &str) -> Result<OrgParent, Error> {
    let mut parents = api.parents_of(child_id).await?;
    if parents.is_empty() {
        return Err(Error::MissingResource("a parent for the given id"));
    }
    Ok(parents.swap_remove(0))
}

/// Accounts directly under an OU. Deployments outside the management
/// account never see the management account itself in the result.
pub async fn accounts_for_unit(
    api: &dyn OrganizationsApi,
    ou_id: &str,
    ctx: &DeploymentContext,
) -> Result<Vec<AccountRef>, Error> {
    let accounts = api.child_accounts(ou_id).await?;
    if ctx.deployed_in_management() {
        return Ok(accounts);
    }
    Ok(accounts
        .into_iter()
        .filter(|account| account.id != ctx.management_account_id)
        .collect())
}

pub struct AwsOrganizations {
    client: aws_sdk_organizations::Client,
}

impl AwsOrganizations {
    pub fn new(client: aws_sdk_organizations::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrganizationsApi for AwsOrganizations {
    async fn roots(&self) -> Result<Vec<OrgUnit>, Error> {
        let mut roots = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_roots()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| Error::api("organizations", DisplayErrorContext(&err)))?;
            roots.extend(response.roots().iter().map(|root| OrgUnit {
                id: root.id().unwrap_or_default().to_string(),
                arn: root.arn().unwrap_or_default().to_string(),
                name: root.name().unwrap_or_default().to_string(),
                children: Vec::new(),
            }));
            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(roots)
    }

    async fn child_units(&self, parent_id: &str) -> Result<Vec<OrgUnit>, Error> {
        let mut units = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_organizational_units_for_parent()
                .parent_id(parent_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| Error::api("organizations", DisplayErrorContext(&err)))?;
            units.extend(response.organizational_units().iter().map(|unit| OrgUnit {
                id: unit.id().unwrap_or_default().to_string(),
                arn: unit.arn().unwrap_or_default().to_string(),
                name: unit.name().unwrap_or_default().to_string(),
                children: Vec::new(),
            }));
            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(units)
    }

    async fn child_accounts(&self, parent_id: &str) -> Result<Vec<AccountRef>, Error> {
        let mut accounts = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_accounts_for_parent()
                .parent_id(parent_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| Error::api("organizations", DisplayErrorContext(&err)))?;
            accounts.extend(response.accounts().iter().map(|account| AccountRef {
                id: account.id().unwrap_or_default().to_string(),
                name: account.name().unwrap_or_default().to_string(),
            }));
            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(accounts)
    }

    async fn parents_of(&self, child_id: &str) -> Result<Vec<OrgParent>, Error> {
        let mut parents = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_parents()
                .child_id(child_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| Error::api("organizations", DisplayErrorContext(&err)))?;
            parents.extend(response.parents().iter().map(|parent| OrgParent {
                id: parent.id().unwrap_or_default().to_string(),
                parent_type: parent
                    .r#type()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
            }));
            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(parents)
    }
}
