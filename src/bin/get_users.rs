use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use tracing::{error, info};

use team_idc::config::SsoInstance;
use team_idc::directory::{list_users_sorted, AwsIdentityStore, DirectoryUser};
use team_idc::event::AppSyncEvent;

async fn handle(
    _event: LambdaEvent<AppSyncEvent<serde_json::Value>>,
    directory: &AwsIdentityStore,
) -> Result<Vec<DirectoryUser>, LambdaError> {
    let users = list_users_sorted(directory).await.map_err(|err| {
        error!("listing identity store users failed: {err}");
        err
    })?;

    info!("returning {} users", users.len());
    Ok(users)
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
    let instance = SsoInstance::resolve(&sso_client).await?;
    let directory = AwsIdentityStore::new(
        aws_sdk_identitystore::Client::new(&config),
        instance.identity_store_id,
    );

    run(service_fn(|event| handle(event, &directory))).await
}
