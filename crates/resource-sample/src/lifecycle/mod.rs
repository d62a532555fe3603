//! # System Lifecycle & Orchestration
//!
//! Starts the document store, registers every resource, route and exception code, and shuts
//! the whole thing down again.
//!
//! ## The ApiSystem Pattern
//!
//! ```rust,ignore
//! impl ApiSystem {
//!     pub async fn new(config: ApiConfig) -> Result<Self, SystemError> {
//!         // 1. Start the store actor
//!         let (actor, store) = StoreActor::new(config.store.buffer_size);
//!         let handle = tokio::spawn(actor.run());
//!
//!         // 2. Register resources and routes against the store client
//!         let api = Api::builder(Arc::new(store.clone()))
//!             .resource("user", UserResource)
//!             .route(users())
//!             .build()
//!             .await?;
//!
//!         Ok(Self { api, store, handle })
//!     }
//! }
//! ```
//!
//! ## Graceful Shutdown
//!
//! Every controller holds a clone of the store client. Dropping the [`Api`](resource_framework::Api)
//! and the system's own client closes the store's channel; the store actor drains what is
//! queued and exits, and [`ApiSystem::shutdown`] awaits it.

pub mod api_system;

pub use api_system::*;
