//! hostvars-api: Shared API types and schemas
//!
//! Request bodies, the Ansible-shaped inventory listing and the error body
//! used by the daemon, the client and the CLI.

pub mod requests;
pub mod responses;
