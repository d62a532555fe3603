use crate::resources::{
    AddressResource, PhotoResource, UserResource, ADDRESS_NOT_FOUND, AUTHORIZATION_REQUIRED,
    USER_NOT_FOUND,
};
use resource_framework::config::ConfigError;
use resource_framework::{Api, ApiConfig, FrameworkError, Route, StoreActor, StoreClient};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Priority of the `primary` endpoints, so they win over `:address_id` / `:photo_id`.
const PRIMARY_PRIORITY: i32 = 110;

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Api(#[from] FrameworkError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store task failed: {0}")]
    Store(#[from] tokio::task::JoinError),
}

/// The running sample API and the store behind it.
pub struct ApiSystem {
    pub api: Api,
    store: StoreClient,
    handle: JoinHandle<()>,
}

impl ApiSystem {
    pub async fn new(config: ApiConfig) -> Result<Self, SystemError> {
        let (actor, store) = StoreActor::new(config.store.buffer_size);
        let handle = tokio::spawn(actor.run());

        let api = Api::builder(Arc::new(store.clone()))
            .config(config)
            .resource("user", UserResource)
            .resource("address", AddressResource)
            .resource("photo", PhotoResource)
            .code(USER_NOT_FOUND, 404, "User not found")
            .code(ADDRESS_NOT_FOUND, 404, "Address not found")
            .code(AUTHORIZATION_REQUIRED, 401, "Authorization required")
            .route(users())
            .build()
            .await?;

        info!("API system started");
        Ok(Self { api, store, handle })
    }

    /// Drops every store client and waits for the store actor to finish.
    pub async fn shutdown(self) -> Result<(), SystemError> {
        info!("Shutting down API system");
        drop(self.api);
        drop(self.store);
        self.handle.await?;
        info!("API system stopped");
        Ok(())
    }
}

/// Every endpoint of the sample API, mounted under `users`.
pub fn users() -> Route {
    let mut route = Route::new("users")
        .controller("user")
        .get("")
        .post("")
        .get("me")
        .put("me")
        .get(":username")
        .put(":username")
        .delete(":username");

    for (children, param) in [("addresses", ":address_id"), ("photos", ":photo_id")] {
        let list = format!(":username/{children}");
        let member = format!("{list}/{param}");
        route = route
            .get(list.as_str())
            .post(list.as_str())
            .get_with_priority(format!("{list}/primary"), PRIMARY_PRIORITY)
            .get(member.as_str())
            .put(member.as_str())
            .delete(member.as_str());
    }
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_framework::route::RouteTable;
    use resource_framework::Verb;

    #[test]
    fn test_primary_wins_over_member() {
        let table = RouteTable::new(&[users()]);
        let matched = table.find(Verb::Get, "users/alice/photos/primary").unwrap();

        assert_eq!(matched.endpoint.path, ":username/photos/primary");
        assert_eq!(table.find(Verb::Get, "users/me").unwrap().endpoint.path, "me");
        assert!(table.find(Verb::Put, "users/alice/photos").is_none());
    }
}
