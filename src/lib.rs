// Library exports for snapfeed
// The binary and the integration tests both build on these modules

pub mod auth;
pub mod blobs;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod graphql;
pub mod routes;
pub mod social;
pub mod state;
