use thiserror::Error;

/// Failure classes shared by every resolver operation.
///
/// Upstream AWS APIs are the only request-time failure source; `Api` keeps
/// the service name so CloudWatch searches can tell callers apart without
/// parsing the message. Configuration problems surface at startup, before
/// the runtime accepts events.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{service} call failed: {message}")]
    Api {
        service: &'static str,
        message: String,
    },

    #[error("environment variable {0} is not set")]
    MissingConfig(&'static str),

    #[error("expected {0} but the API returned none")]
    MissingResource(&'static str),

    #[error("entitlement record {id} is malformed: {reason}")]
    MalformedRecord { id: String, reason: String },
}

impl Error {
    /// SDK errors only show the provider's error code and message through
    /// their source chain, so call sites wrap them in `DisplayErrorContext`
    /// before flattening here.
    pub fn api(service: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Api {
            service,
            message: err.to_string(),
        }
    }
}
