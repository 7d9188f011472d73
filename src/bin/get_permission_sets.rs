use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use tracing::{error, info};

use team_idc::config::{DeploymentContext, SsoInstance};
use team_idc::event::AppSyncEvent;
use team_idc::permission_sets::{resolve_permission_sets, AwsSsoAdmin, PermissionSetListing};

async fn handle(
    _event: LambdaEvent<AppSyncEvent<serde_json::Value>>,
    sso: &AwsSsoAdmin,
    ctx: &DeploymentContext,
) -> Result<PermissionSetListing, LambdaError> {
    let listing = resolve_permission_sets(sso, ctx).await.map_err(|err| {
        error!("resolving permission sets failed: {err}");
        err
    })?;

    info!(
        "request {}: returning {} permission sets",
        listing.id,
        listing.permissions.len()
    );
    Ok(listing)
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
    let sso_client = aws_sdk_ssoadmin::Client::new(&config);
    let org_client = aws_sdk_organizations::Client::new(&config);

    let instance = SsoInstance::resolve(&sso_client).await?;
    let ctx = DeploymentContext::resolve(&org_client).await?;
    let sso = AwsSsoAdmin::new(sso_client, instance.instance_arn);

    run(service_fn(|event| handle(event, &sso, &ctx))).await
}
