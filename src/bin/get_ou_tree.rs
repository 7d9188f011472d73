use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use tracing::{error, info};

use team_idc::event::AppSyncEvent;
use team_idc::orgs::{organization_tree, AwsOrganizations, OrgUnit};

async fn handle(
    _event: LambdaEvent<AppSyncEvent<serde_json::Value>>,
    orgs: &AwsOrganizations,
) -> Result<OrgUnit, LambdaError> {
    let tree = organization_tree(orgs).await.map_err(|err| {
        error!("building the OU tree failed: {err}");
        err
    })?;

    info!("returning OU tree rooted at {}", tree.id);
    Ok(tree)
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .without_time() // CloudWatch will add the ingestion time
        .with_target(false)
        .init();

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let orgs = AwsOrganizations::new(aws_sdk_organizations::Client::new(&config));

    run(service_fn(|event| handle(event, &orgs))).await
}
