use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use serde::Deserialize;
use tracing::{error, info};

use team_idc::event::AppSyncEvent;
use team_idc::orgs::{parent_of, AwsOrganizations, OrgParent};

#[derive(Debug, Default, Deserialize)]
struct Arguments {
    id: String,
}

async fn handle(
    event: LambdaEvent<AppSyncEvent<Arguments>>,
    orgs: &AwsOrganizations,
) -> Result<OrgParent, LambdaError> {
    let child_id = event.payload.arguments.id;
    info!("resolving parent of {child_id}");

    let parent = parent_of(orgs, &child_id).await.map_err(|err| {
        error!("parent lookup for {child_id} failed: {err}");
        err
    })?;

    Ok(parent)
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
