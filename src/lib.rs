//! # Iggy REST Proxy
//!
//! Accepts batches of records over HTTP and publishes them asynchronously to
//! Apache Iggy topics, counting every delivery outcome.
//!
//! ## Architecture
//!
//! ```text
//! POST /topics/{topic}
//!        │
//!        ▼
//! ┌──────────────────┐  submit   ┌──────────────────┐  send_messages
//! │  publish_records │ ────────► │  AsyncProducer   │ ──────────────► Iggy
//! └──────────────────┘ (200 now) │  (dispatcher)    │
//!                                └───┬──────────┬───┘
//!                          Successes │          │ Failures
//!                                    ▼          ▼
//!                                ┌──────────────────┐
//!                                │   Reconcilers    │ ──► MetricsRegistry
//!                                └──────────────────┘       │
//!                                                           ▼
//!                                                    Prometheus exporter
//! ```
//!
//! The HTTP caller only learns whether its batch was well formed. Whether the
//! broker took each record is visible through the `success` and `errors`
//! counters (`/stats`, Prometheus).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iggy_rest_proxy::{AppState, Config, IggyClientWrapper, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = IggyClientWrapper::new(config.clone()).await?;
//!     client.initialize().await?;
//!
//!     let connection = client.connection_state();
//!     let state = AppState::new(client, connection, config);
//!     let app = build_router(state.clone());
//!
//!     // Serve `app`, then drain deliveries:
//!     state.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod iggy_client;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod producer;
pub mod reconciler;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use iggy_client::IggyClientWrapper;
pub use metrics::{CounterName, MetricsRegistry};
pub use producer::{AsyncProducer, DeliveryTransport, ProducerHandle, ProducerMessage};
pub use routes::build_router;
pub use state::AppState;
