//! # Resource Framework Sample
//!
//! A demo run of the users / addresses / photos API.
//!
//! 1. Starts the [`ApiSystem`], optionally configured from the JSON file named by the first
//!    argument.
//! 2. Registers a user and gives them two addresses.
//! 3. Makes the second address primary, lists the addresses and deletes one.
//!
//! ```bash
//! RUST_LOG=info cargo run -p resource-sample -- config.json
//! ```

use resource_framework::tracing::setup_tracing;
use resource_framework::{ApiConfig, Identity, Request, Verb};
use resource_sample::lifecycle::{ApiSystem, SystemError};
use serde_json::json;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), SystemError> {
    setup_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => ApiConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ApiConfig::default(),
    };
    info!(root = %config.root, version = %config.version, "Starting sample API");

    let system = ApiSystem::new(config).await?;
    let root = system.api.config().root.trim_end_matches('/').to_string();
    let api = &system.api;

    let span = tracing::info_span!("registration");
    let user = async {
        api.handle(
            Verb::Post,
            &format!("{root}/users"),
            Request::new().with_body(json!({
                "username": "Alice",
                "email": "alice@example.com",
                "password": "hunter2",
            })),
        )
        .await
    }
    .instrument(span)
    .await;
    if user.status != 200 {
        error!(body = %user.body, "User registration failed");
        return system.shutdown().await;
    }
    let Some(user_id) = user.body["id"].as_str().map(str::to_string) else {
        error!(body = %user.body, "User without id");
        return system.shutdown().await;
    };
    info!(%user_id, "User registered");

    let alice = Identity::new(user_id.as_str());
    let addresses = format!("{root}/users/alice/addresses");

    let span = tracing::info_span!("addresses");
    async {
        for label in ["home", "office"] {
            let created = api
                .handle(
                    Verb::Post,
                    &addresses,
                    Request::new()
                        .with_identity(alice.clone())
                        .with_body(json!({ "label": label, "city": "Lisbon" })),
                )
                .await;
            info!(status = created.status, body = %created.body, "Address added");
        }

        let listed = api
            .handle(Verb::Get, &addresses, Request::new())
            .await;
        let office = listed.body["results"][1]["id"].as_str().unwrap_or_default().to_string();

        let promoted = api
            .handle(
                Verb::Put,
                &format!("{addresses}/{office}"),
                Request::new()
                    .with_identity(alice.clone())
                    .with_body(json!({ "primary": true })),
            )
            .await;
        info!(status = promoted.status, body = %promoted.body, "Office is now primary");

        let primary = api
            .handle(Verb::Get, &format!("{addresses}/primary"), Request::new())
            .await;
        info!(label = %primary.body["label"], "Primary address");

        let home = listed.body["results"][0]["id"].as_str().unwrap_or_default().to_string();
        let deleted = api
            .handle(
                Verb::Delete,
                &format!("{addresses}/{home}"),
                Request::new().with_identity(alice.clone()),
            )
            .await;
        info!(status = deleted.status, "Home address deleted");
    }
    .instrument(span)
    .await;

    let me = api
        .handle(
            Verb::Get,
            &format!("{root}/users/me"),
            Request::new().with_identity(alice),
        )
        .await;
    info!(body = %me.body, "Final state");

    system.shutdown().await?;
    info!("Sample completed successfully");
    Ok(())
}
