//! Typed client for the Fly.io platform.
//!
//! Covers the two transports the platform exposes: the GraphQL API at
//! `/graphql` (apps, volumes, IP addresses, secrets, organizations) and the
//! Machines REST API under `/v1/apps/{app}/machines`. Every operation is a
//! single request/response pair; remote failures surface verbatim as
//! [`FlyError`] and retries are left to the caller.

pub mod app;
pub mod client;
pub mod error;
pub mod machine;
pub mod network;
pub mod organization;
pub mod secret;
pub mod volume;

pub use client::{ClientOptions, FlyClient, DEFAULT_GRAPHQL_ENDPOINT, DEFAULT_MACHINES_ENDPOINT};
pub use error::FlyError;
