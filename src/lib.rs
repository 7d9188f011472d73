//! Request-time logic for the Team IDC access-request backend.
//!
//! Each binary under `src/bin/` wires one GraphQL resolver operation to the
//! functions in these modules. All AWS access goes through small async port
//! traits (`OrganizationsApi`, `SsoAdminApi`, `IdentityDirectory`,
//! `EntitlementStore`) so the resolution logic can be exercised against
//! in-memory fakes without talking to the cloud.

pub mod config;
pub mod directory;
pub mod entitlements;
pub mod error;
pub mod event;
pub mod orgs;
pub mod permission_sets;
