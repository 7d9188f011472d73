use serde::Deserialize;

/// Envelope AppSync hands to a direct Lambda resolver.
///
/// `arguments` carries the operation-specific parameters; operations that
/// take none deserialize it into `serde_json::Value` and ignore it.
#[derive(Debug, Deserialize)]
pub struct AppSyncEvent<A: Default> {
    #[serde(default)]
    pub arguments: A,
    #[serde(default)]
    pub identity: Option<CallerIdentity>,
}

#[derive(Debug, Deserialize)]
pub struct CallerIdentity {
    pub username: String,
}
