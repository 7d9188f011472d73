use async_trait::async_trait;
use aws_sdk_identitystore::error::DisplayErrorContext;
use serde::Serialize;

use crate::error::Error;

/// Identity-store user, trimmed to the fields the frontend renders.
/// PascalCase on the wire to match the upstream shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectoryUser {
    pub user_id: String,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Membership {
    pub membership_id: String,
    pub group_id: String,
    pub member_user_id: String,
}

#[derive(Debug, Serialize)]
pub struct MemberList {
    pub members: Vec<Membership>,
}

/// Read side of the identity store.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn users(&self) -> Result<Vec<DirectoryUser>, Error>;
    async fn group_memberships(&self, group_id: &str) -> Result<Vec<Membership>, Error>;
}

/// Every user in the directory, sorted ascending (case sensitive) by user
/// name.
pub async fn list_users_sorted(
    directory: &dyn IdentityDirectory,
) -> Result<Vec<DirectoryUser>, Error> {
    let mut users = directory.users().await?;
    users.sort_by(|a, b| a.user_name.cmp(&b.user_name));
    Ok(users)
}

/// Memberships of each requested group, concatenated in input order.
pub async fn list_members(
    directory: &dyn IdentityDirectory,
    group_ids: &[String],
) -> Result<MemberList, Error> {
    let mut members = Vec::new();
    for group_id in group_ids {
        members.extend(directory.group_memberships(group_id).await?);
    }
    Ok(MemberList { members })
}

pub struct AwsIdentityStore {
    client: aws_sdk_identitystore::Client,
    identity_store_id: String,
}

impl AwsIdentityStore {
    pub fn new(client: aws_sdk_identitystore::Client, identity_store_id: String) -> Self {
        Self {
            client,
            identity_store_id,
        }
    }
}

#[async_trait]
impl IdentityDirectory for AwsIdentityStore {
    async fn users(&self) -> Result<Vec<DirectoryUser>, Error> {
        let mut users = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_users()
                .identity_store_id(&self.identity_store_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| Error::api("identitystore", DisplayErrorContext(&err)))?;
            users.extend(response.users().iter().map(|user| DirectoryUser {
                user_id: user.user_id().to_string(),
                user_name: user.user_name().unwrap_or_default().to_string(),
                display_name: user.display_name().map(str::to_string),
            }));
            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(users)
    }

    async fn group_memberships(&self, group_id: &str) -> Result<Vec<Membership>, Error> {
        let mut members = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = self
                .client
                .list_group_memberships()
                .identity_store_id(&self.identity_store_id)
                .group_id(group_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| Error::api("identitystore", DisplayErrorContext(&err)))?;
            members.extend(
                response
                    .group_memberships()
                    .iter()
                    .map(|membership| Membership {
                        membership_id: membership.membership_id().unwrap_or_default().to_string(),
                        group_id: membership.group_id().unwrap_or_default().to_string(),
                        member_user_id: membership
                            .member_id()
                            .and_then(|member| member.as_user_id().ok())
                            .cloned()
                            .unwrap_or_default(),
                    }),
            );
            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(members)
    }
}
