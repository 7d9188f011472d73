use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::Serialize;
use uuid::Uuid;

use crate::config::DeploymentContext;
use crate::error::Error;
use crate::orgs::{accounts_for_unit, AccountRef, OrganizationsApi};

/// Stored authorization policy for one identity (user or group).
/// Administered out of band; read-only here.
#[derive(Debug, Clone)]
pub struct EntitlementRecord {
    pub id: String,
    pub accounts: Vec<AccountRef>,
    pub ous: Vec<OuRef>,
    pub permissions: Vec<String>,
    pub approval_required: bool,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuRef {
    pub id: String,
}

/// Exact-key lookup of entitlement records.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn record(&self, identity_id: &str) -> Result<Option<EntitlementRecord>, Error>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPolicy {
    pub accounts: Vec<AccountRef>,
    pub permissions: Vec<String>,
    pub approval_required: bool,
    pub duration: String,
}

#[derive(Debug, Serialize)]
pub struct UserPolicy {
    pub id: Uuid,
    pub username: String,
    pub policy: Vec<ResolvedPolicy>,
}

/// Resolves the caller's effective access policies.
///
/// Looks up the entitlement record of the user id and of every group id,
/// expands OU references into the accounts currently under them, and emits
/// one policy per matched record. The duration on every emitted policy is
/// the maximum across all matched records, as a decimal string. Identities
/// without a record are skipped; no matches at all is still a success with
/// an empty policy list.
pub async fn resolve_entitlements(
    store: &dyn EntitlementStore,
    orgs: &dyn OrganizationsApi,
    ctx: &DeploymentContext,
    user_id: Option<&str>,
    group_ids: &[Option<String>],
    username: &str,
) -> Result<UserPolicy, Error> {
    let mut matched = Vec::new();
    for id in candidate_ids(user_id, group_ids) {
        if let Some(record) = store.record(&id).await? {
            matched.push(record);
        }
    }

    let max_duration = matched.iter().map(|record| record.duration).max().unwrap_or(0);

    let mut policy = Vec::with_capacity(matched.len());
    for record in matched {
        let mut accounts = record.accounts;
        for ou in &record.ous {
            accounts.extend(accounts_for_unit(orgs, &ou.id, ctx).await?);
        }
        dedup_accounts(&mut accounts);

        policy.push(ResolvedPolicy {
            accounts,
            permissions: record.permissions,
            approval_required: record.approval_required,
            duration: max_duration.to_string(),
        });
    }

    Ok(UserPolicy {
        id: Uuid::new_v4(),
        username: username.to_string(),
        policy,
    })
}

/// User id first, then group ids, dropping null and empty entries.
fn candidate_ids(user_id: Option<&str>, group_ids: &[Option<String>]) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(id) = user_id {
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }
    for id in group_ids.iter().flatten() {
        if !id.is_empty() {
            ids.push(id.clone());
        }
    }
    ids
}

/// First occurrence wins; explicit accounts come before OU expansions, so
/// they keep their position.
fn dedup_accounts(accounts: &mut Vec<AccountRef>) {
    let mut seen = HashSet::new();
    accounts.retain(|account| seen.insert(account.id.clone()));
}

pub struct DynamoEntitlements {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoEntitlements {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl EntitlementStore for DynamoEntitlements {
    async fn record(&self, identity_id: &str) -> Result<Option<EntitlementRecord>, Error> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(identity_id.to_string()))
            .send()
            .await
            .map_err(|err| Error::api("dynamodb", DisplayErrorContext(&err)))?;

        match response.item() {
            Some(item) => decode_record(identity_id, item).map(Some),
            None => Ok(None),
        }
    }
}

fn decode_record(
    id: &str,
    item: &HashMap<String, AttributeValue>,
) -> Result<EntitlementRecord, Error> {
    let accounts = list_attr(id, item, "accounts")?
        .iter()
        .map(|value| {
            let entry = value
                .as_m()
                .map_err(|_| malformed(id, "accounts entry is not a map"))?;
            Ok(AccountRef {
                id: string_entry(id, entry, "id")?,
                name: string_entry(id, entry, "name")?,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let ous = list_attr(id, item, "ous")?
        .iter()
        .map(|value| {
            let entry = value
                .as_m()
                .map_err(|_| malformed(id, "ous entry is not a map"))?;
            Ok(OuRef {
                id: string_entry(id, entry, "id")?,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let permissions = list_attr(id, item, "permissions")?
        .iter()
        .map(|value| {
            value
                .as_s()
                .map(|permission| permission.clone())
                .map_err(|_| malformed(id, "permissions entry is not a string"))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let approval_required = item
        .get("approvalRequired")
        .and_then(|value| value.as_bool().ok())
        .copied()
        .ok_or_else(|| malformed(id, "approvalRequired missing or not a boolean"))?;

    let duration = duration_attr(id, item)?;

    Ok(EntitlementRecord {
        id: id.to_string(),
        accounts,
        ous,
        permissions,
        approval_required,
        duration,
    })
}

// Older records store duration as a string, newer ones as a number.
fn duration_attr(id: &str, item: &HashMap<String, AttributeValue>) -> Result<u64, Error> {
    let raw = match item.get("duration") {
        Some(AttributeValue::N(n)) => n.as_str(),
        Some(AttributeValue::S(s)) => s.as_str(),
        _ => return Err(malformed(id, "duration missing or not numeric")),
    };
    raw.parse()
        .map_err(|_| malformed(id, "duration is not an integer"))
}

fn malformed(id: &str, reason: &str) -> Error {
    Error::MalformedRecord {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

fn list_attr<'a>(
    id: &str,
    item: &'a HashMap<String, AttributeValue>,
    key: &str,
) -> Result<&'a Vec<AttributeValue>, Error> {
    item.get(key)
        .and_then(|value| value.as_l().ok())
        .ok_or_else(|| malformed(id, &format!("{key} missing or not a list")))
}

fn string_entry(
    id: &str,
    entry: &HashMap<String, AttributeValue>,
    key: &str,
) -> Result<String, Error> {
    entry
        .get(key)
        .and_then(|value| value.as_s().ok())
        .cloned()
        .ok_or_else(|| malformed(id, &format!("{key} missing or not a string")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orgs::tests::{account, FakeOrganizations};

    struct FakeStore {
        records: HashMap<String, EntitlementRecord>,
        lookups: std::sync::Mutex<Vec<String>>,
        fail_ids: HashSet<String>,
    }

    impl FakeStore {
        fn new(records: Vec<EntitlementRecord>) -> Self {
            Self {
                records: records
                    .into_iter()
                    .map(|record| (record.id.clone(), record))
                    .collect(),
                lookups: std::sync::Mutex::new(Vec::new()),
                fail_ids: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl EntitlementStore for FakeStore {
        async fn record(&self, identity_id: &str) -> Result<Option<EntitlementRecord>, Error> {
            self.lookups
                .lock()
                .unwrap()
                .push(identity_id.to_string());
            if self.fail_ids.contains(identity_id) {
                return Err(Error::api("dynamodb", "throughput exceeded"));
            }
            Ok(self.records.get(identity_id).cloned())
        }
    }

    fn record(id: &str, accounts: Vec<AccountRef>, ous: Vec<&str>, duration: u64) -> EntitlementRecord {
        EntitlementRecord {
            id: id.to_string(),
            accounts,
            ous: ous
                .into_iter()
                .map(|ou| OuRef { id: ou.to_string() })
                .collect(),
            permissions: vec!["P1".to_string()],
            approval_required: false,
            duration,
        }
    }

    fn member_context() -> DeploymentContext {
        DeploymentContext {
            deployment_account_id: "222222222222".to_string(),
            management_account_id: "111111111111".to_string(),
        }
    }

    #[tokio::test]
    async fn single_record_passes_through_verbatim() {
        let store = FakeStore::new(vec![record(
            "u1",
            vec![account("111", "prod")],
            vec![],
            3600,
        )]);
        let orgs = FakeOrganizations::default();

        let result = resolve_entitlements(
            &store,
            &orgs,
            &member_context(),
            Some("u1"),
            &[Some("g1".to_string())],
            "jdoe",
        )
        .await
        .unwrap();

        assert_eq!(result.username, "jdoe");
        assert_eq!(result.policy.len(), 1);
        assert_eq!(result.policy[0].accounts, vec![account("111", "prod")]);
        assert_eq!(result.policy[0].permissions, vec!["P1"]);
        assert!(!result.policy[0].approval_required);
        assert_eq!(result.policy[0].duration, "3600");
    }

    #[tokio::test]
    async fn every_policy_carries_the_global_maximum_duration() {
        let store = FakeStore::new(vec![
            record("u1", vec![account("111", "a")], vec![], 1800),
            record("g1", vec![account("222", "b")], vec![], 7200),
        ]);
        let orgs = FakeOrganizations::default();

        let result = resolve_entitlements(
            &store,
            &orgs,
            &member_context(),
            Some("u1"),
            &[Some("g1".to_string())],
            "jdoe",
        )
        .await
        .unwrap();

        assert_eq!(result.policy.len(), 2);
        assert_eq!(result.policy[0].duration, "7200");
        assert_eq!(result.policy[1].duration, "7200");
    }

    #[tokio::test]
    async fn null_and_empty_candidate_ids_are_never_looked_up() {
        let store = FakeStore::new(vec![]);
        let orgs = FakeOrganizations::default();

        let result = resolve_entitlements(
            &store,
            &orgs,
            &member_context(),
            None,
            &[Some("g1".to_string()), Some(String::new()), None],
            "jdoe",
        )
        .await
        .unwrap();

        assert!(result.policy.is_empty());
        assert_eq!(*store.lookups.lock().unwrap(), vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn ou_references_expand_into_their_accounts() {
        let store = FakeStore::new(vec![record(
            "u1",
            vec![account("111", "explicit")],
            vec!["ou-a"],
            3600,
        )]);
        let mut orgs = FakeOrganizations::default();
        orgs.accounts.insert(
            "ou-a".to_string(),
            vec![account("333", "from-ou"), account("111111111111", "mgmt")],
        );

        let result = resolve_entitlements(&store, &orgs, &member_context(), Some("u1"), &[], "jdoe")
            .await
            .unwrap();

        // Management account filtered out, explicit account kept first.
        assert_eq!(
            result.policy[0].accounts,
            vec![account("111", "explicit"), account("333", "from-ou")]
        );
    }

    #[tokio::test]
    async fn overlapping_explicit_and_ou_accounts_deduplicate_by_id() {
        let store = FakeStore::new(vec![record(
            "u1",
            vec![account("333", "explicit-name")],
            vec!["ou-a", "ou-b"],
            3600,
        )]);
        let mut orgs = FakeOrganizations::default();
        orgs.accounts
            .insert("ou-a".to_string(), vec![account("333", "ou-name")]);
        orgs.accounts
            .insert("ou-b".to_string(), vec![account("333", "ou-name")]);

        let result = resolve_entitlements(&store, &orgs, &member_context(), Some("u1"), &[], "jdoe")
            .await
            .unwrap();

        assert_eq!(
            result.policy[0].accounts,
            vec![account("333", "explicit-name")]
        );
    }

    #[tokio::test]
    async fn failing_ou_expansion_aborts_resolution() {
        let store = FakeStore::new(vec![record(
            "u1",
            vec![account("111", "prod")],
            vec!["ou-a"],
            3600,
        )]);
        let mut orgs = FakeOrganizations::default();
        orgs.account_errors.insert("ou-a".to_string());

        let result =
            resolve_entitlements(&store, &orgs, &member_context(), Some("u1"), &[], "jdoe").await;

        assert!(matches!(result, Err(Error::Api { .. })));
    }

    #[tokio::test]
    async fn failing_record_lookup_aborts_resolution() {
        let mut store = FakeStore::new(vec![record(
            "u1",
            vec![account("111", "prod")],
            vec![],
            3600,
        )]);
        store.fail_ids.insert("g1".to_string());
        let orgs = FakeOrganizations::default();

        let result = resolve_entitlements(
            &store,
            &orgs,
            &member_context(),
            Some("u1"),
            &[Some("g1".to_string())],
            "jdoe",
        )
        .await;

        assert!(matches!(result, Err(Error::Api { .. })));
    }

    #[tokio::test]
    async fn no_matching_records_is_an_empty_success() {
        let store = FakeStore::new(vec![]);
        let orgs = FakeOrganizations::default();

        let result = resolve_entitlements(
            &store,
            &orgs,
            &member_context(),
            Some("u1"),
            &[Some("g1".to_string())],
            "jdoe",
        )
        .await
        .unwrap();

        assert!(result.policy.is_empty());
        assert_eq!(result.username, "jdoe");
    }

    #[test]
    fn decode_accepts_numeric_and_string_durations() {
        let mut item = sample_item();
        assert_eq!(decode_record("u1", &item).unwrap().duration, 3600);

        item.insert(
            "duration".to_string(),
            AttributeValue::S("7200".to_string()),
        );
        assert_eq!(decode_record("u1", &item).unwrap().duration, 7200);
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let mut item = sample_item();
        item.remove("approvalRequired");

        assert!(matches!(
            decode_record("u1", &item),
            Err(Error::MalformedRecord { .. })
        ));
    }

    fn sample_item() -> HashMap<String, AttributeValue> {
        let mut account = HashMap::new();
        account.insert("id".to_string(), AttributeValue::S("111".to_string()));
        account.insert("name".to_string(), AttributeValue::S("prod".to_string()));

        let mut ou = HashMap::new();
        ou.insert("id".to_string(), AttributeValue::S("ou-a".to_string()));

        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S("u1".to_string()));
        item.insert(
            "accounts".to_string(),
            AttributeValue::L(vec![AttributeValue::M(account)]),
        );
        item.insert(
            "ous".to_string(),
            AttributeValue::L(vec![AttributeValue::M(ou)]),
        );
        item.insert(
            "permissions".to_string(),
            AttributeValue::L(vec![AttributeValue::S("P1".to_string())]),
        );
        item.insert("approvalRequired".to_string(), AttributeValue::Bool(false));
        item.insert("duration".to_string(), AttributeValue::N("3600".to_string()));
        item
    }
}
