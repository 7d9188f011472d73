use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use serde::Deserialize;
use tracing::{error, info};

use team_idc::config::{env_var, DeploymentContext};
use team_idc::entitlements::{resolve_entitlements, DynamoEntitlements, UserPolicy};
use team_idc::event::AppSyncEvent;
use team_idc::orgs::AwsOrganizations;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Arguments {
    user_id: Option<String>,
    #[serde(default)]
    group_ids: Vec<Option<String>>,
}

async fn handle(
    event: LambdaEvent<AppSyncEvent<Arguments>>,
    store: &DynamoEntitlements,
    orgs: &AwsOrganizations,
    ctx: &DeploymentContext,
) -> Result<UserPolicy, LambdaError> {
    let username = event
        .payload
        .identity
        .map(|identity| identity.username)
        .ok_or_else(|| LambdaError::from("request has no caller identity"))?;
    let arguments = event.payload.arguments;

    let result = resolve_entitlements(
        store,
        orgs,
        ctx,
        arguments.user_id.as_deref(),
        &arguments.group_ids,
        &username,
    )
    .await
    .map_err(|err| {
        error!("resolving entitlements for {username} failed: {err}");
        err
    })?;

    info!(
        "request {}: {} policies resolved for {}",
        result.id,
        result.policy.len(),
        result.username
    );
    Ok(result)
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .without_time() // CloudWatch will add the ingestion time
        .with_target(false)
        .init();

    let table_name = env_var("POLICY_TABLE_NAME")?;

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let org_client = aws_sdk_organizations::Client::new(&config);

    let ctx = DeploymentContext::resolve(&org_client).await?;
    let store = DynamoEntitlements::new(aws_sdk_dynamodb::Client::new(&config), table_name);
    let orgs = AwsOrganizations::new(org_client);

    run(service_fn(|event| handle(event, &store, &orgs, &ctx))).await
}
