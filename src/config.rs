use aws_sdk_ssoadmin::error::DisplayErrorContext;

use crate::error::Error;

/// SSO instance coordinates, resolved once per container at startup.
///
/// The identity store id drives directory lookups, the instance ARN drives
/// permission-set calls. The account runs a single IAM Identity Center
/// instance, so the first entry of `ListInstances` is the one.
#[derive(Debug, Clone)]
pub struct SsoInstance {
    pub instance_arn: String,
    pub identity_store_id: String,
}

impl SsoInstance {
    pub async fn resolve(client: &aws_sdk_ssoadmin::Client) -> Result<Self, Error> {
        let response = client
            .list_instances()
            .send()
            .await
            .map_err(|err| Error::api("sso-admin", DisplayErrorContext(&err)))?;
        let instance = response
            .instances()
            .first()
            .ok_or(Error::MissingResource("an SSO instance"))?;

        Ok(Self {
            instance_arn: instance
                .instance_arn()
                .ok_or(Error::MissingResource("the SSO instance ARN"))?
                .to_string(),
            identity_store_id: instance
                .identity_store_id()
                .ok_or(Error::MissingResource("the SSO identity store id"))?
                .to_string(),
        })
    }
}

/// Which account this stack is deployed into versus the organization's
/// management account. Resolved once per container; several operations
/// behave differently when the two coincide.
#[derive(Debug, Clone)]
pub struct DeploymentContext {
    pub deployment_account_id: String,
    pub management_account_id: String,
}

impl DeploymentContext {
    pub async fn resolve(client: &aws_sdk_organizations::Client) -> Result<Self, Error> {
        let deployment_account_id = env_var("ACCOUNT_ID")?;
        let response = client
            .describe_organization()
            .send()
            .await
            .map_err(|err| Error::api("organizations", DisplayErrorContext(&err)))?;
        let management_account_id = response
            .organization()
            .and_then(|org| org.master_account_id())
            .ok_or(Error::MissingResource("the organization management account"))?
            .to_string();

        Ok(Self {
            deployment_account_id,
            management_account_id,
        })
    }

    pub fn deployed_in_management(&self) -> bool {
        self.deployment_account_id == self.management_account_id
    }
}

pub fn env_var(name: &'static str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::MissingConfig(name))
}

#[cfg(test)]
mod tests {
    use super::DeploymentContext;

    fn context(deployment: &str, management: &str) -> DeploymentContext {
        DeploymentContext {
            deployment_account_id: deployment.to_string(),
            management_account_id: management.to_string(),
        }
    }

    #[test]
    fn management_deployment_is_detected_by_account_id() {
        assert!(context("111111111111", "111111111111").deployed_in_management());
        assert!(!context("222222222222", "111111111111").deployed_in_management());
    }
}
