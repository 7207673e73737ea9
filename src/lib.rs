//! # outreach-engine
//!
//! Campaign execution engine for vendor outreach over email and WhatsApp.
//!
//! ## Design Philosophy
//!
//! outreach-engine is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Safe to retry** - A campaign that cannot be executed stays in Draft
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Sensible defaults** - Unconfigured channels simulate delivery out of the box
//!
//! ## Quick Start
//!
//! ```no_run
//! use outreach_engine::{
//!     CampaignEngine, Config, Database, ExecutionOptions, NewCampaign, TargetSpec,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let db = Arc::new(Database::new(&config.persistence.database_path).await?);
//!     let engine = CampaignEngine::with_database(config, Arc::clone(&db))?;
//!
//!     // Subscribe to events
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let campaign_id = db
//!         .insert_campaign(&NewCampaign {
//!             name: "Quarterly capacity survey".to_string(),
//!             target: TargetSpec::default(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let report = engine.execute(campaign_id, ExecutionOptions::default()).await?;
//!     println!("sent {} / failed {}", report.sent(), report.failed());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Email and messaging delivery clients
pub mod channels;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Batched, paced delivery of rendered messages
pub mod dispatch;
/// Campaign execution engine (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Storage seam used by the engine
pub mod store;
/// Template rendering and variable extraction
pub mod template;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use channels::{ChannelClient, Mailer, Messenger, SendError};
pub use config::{BatchPolicy, Config};
pub use db::{Database, NewCampaign};
pub use dispatch::{DispatchReport, SendJob, SendOutcome};
pub use engine::{CampaignEngine, ExecutionOutcome, ExecutionReport};
pub use error::{DatabaseError, Error, ExecutionError, Result};
pub use store::RecordStore;
pub use template::TemplateRenderer;
pub use types::{
    Campaign, CampaignId, CampaignStatus, Channel, Event, ExecutionOptions, ExecutionProgress,
    FilterCriterion, FilterKey, MessageTemplate, ResponseCounts, ResponseStatus, TargetSpec,
    TaskId, TemplateId, Vendor, VendorId, VendorResponse,
};

/// Helper function to run the engine with graceful signal handling.
///
/// Waits for a termination signal and then calls the engine's `shutdown()` method,
/// which cancels running executions and waits for them to stop.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use outreach_engine::{CampaignEngine, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = CampaignEngine::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(engine).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(engine: CampaignEngine) -> Result<()> {
    wait_for_signal().await;
    engine.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
