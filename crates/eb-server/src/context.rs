//! Shared application context.
//!
//! [`AppContext`] is handed to every route handler through Axum state and to
//! the job service. Everything in it is immutable after startup and shared
//! through `Arc`s, so cloning is cheap.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use eb_av::ToolRegistry;
use eb_core::config::Config;
use eb_pipeline::{EncodeBox, EncodeBoxOptions};
use eb_storage::ObjectStore;

use crate::notifier::{self, ProgressNotifier};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn ObjectStore>,
    pub tools: Arc<ToolRegistry>,
    pub notifier: Arc<dyn ProgressNotifier>,
    pub encode_box: EncodeBox,
    /// Cancelled on shutdown; every job runs under a child token.
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(
        config: Config,
        store: Arc<dyn ObjectStore>,
        tools: Arc<ToolRegistry>,
        notifier: Arc<dyn ProgressNotifier>,
        shutdown: CancellationToken,
    ) -> Self {
        let encode_box = EncodeBox::new(
            Arc::clone(&store),
            Arc::clone(&tools),
            EncodeBoxOptions::from_config(&config),
        );
        Self {
            config: Arc::new(config),
            store,
            tools,
            notifier,
            encode_box,
            shutdown,
        }
    }

    /// Build the store and notifier selected by `config`.
    pub fn from_config(
        config: Config,
        tools: Arc<ToolRegistry>,
        shutdown: CancellationToken,
    ) -> eb_core::Result<Self> {
        let store = eb_storage::from_config(&config)?;
        let notifier = notifier::from_config(&config);
        tracing::info!(store = store.name(), "Object store ready");
        Ok(Self::new(config, store, tools, notifier, shutdown))
    }
}
