#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone entry point for the roadwatch API server.

#[actix_web::main]
async fn main() -> Result<(), roadwatch_server::ServerError> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    roadwatch_server::run_server().await
}
