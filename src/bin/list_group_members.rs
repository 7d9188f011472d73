use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use serde::Deserialize;
use tracing::{error, info};

use team_idc::config::SsoInstance;
use team_idc::directory::{list_members, AwsIdentityStore, MemberList};
use team_idc::event::AppSyncEvent;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Arguments {
    #[serde(default)]
    group_ids: Vec<String>,
}

async fn handle(
    event: LambdaEvent<AppSyncEvent<Arguments>>,
    directory: &AwsIdentityStore,
) -> Result<MemberList, LambdaError> {
    let group_ids = event.payload.arguments.group_ids;
    let list = list_members(directory, &group_ids).await.map_err(|err| {
        error!("listing group memberships failed: {err}");
        err
    })?;

    info!(
        "returning {} members across {} groups",
        list.members.len(),
        group_ids.len()
    );
    Ok(list)
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
