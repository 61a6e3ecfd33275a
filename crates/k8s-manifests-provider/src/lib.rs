//! Kubernetes custom resources as read-only manifest data sources.
//!
//! Every data source is backed by a declarative [`ResourceSchema`](schema::ResourceSchema).
//! A single generic pipeline serves all of them:
//!
//! 1. decode and validate the configuration against the schema ([`materialize`]),
//! 2. inject `apiVersion` and `kind` and derive the `id` ([`materialize::Materializer`]),
//! 3. render the manifest as YAML ([`render`]),
//! 4. publish the attributes back to the caller ([`publish`]).
//!
//! The [`provider::Provider`] ties these together for all data sources in a
//! [`catalog::Catalog`].
pub mod catalog;
pub mod config;
pub mod logging;
pub mod materialize;
pub mod provider;
pub mod publish;
pub mod render;
pub mod schema;
pub mod validation;
pub mod value;

pub use k8s_manifests_shared as shared;
