use crate::handler::StoreHandler;
use crate::layer::StoreLayer;
use crate::store::Store;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Settings for the layer installed by [`init_tracing_with_config`].
///
/// **Fields**
/// - `channel_buffer`: how many records may wait for the writer task
///   before new ones are dropped.
/// - `level`: most verbose level that is persisted.
/// - `enable_stdout`: also print events to the console through a
///   `tracing_subscriber::fmt` layer.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub level: LevelFilter,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            level: LevelFilter::DEBUG,
            enable_stdout: true,
        }
    }
}

/// Install a [`StoreLayer`] writing into `store` as the global default
/// subscriber.
///
/// **Returns**
/// - The writer task's handle.
/// - `Err(..)` if a global subscriber was already set.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    store: Arc<Store>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    let handler = StoreHandler::new(store).with_level(config.level);
    let (layer, handle) = StoreLayer::new(handler, config.channel_buffer);

    // The two subscriber stacks have different types.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(handle)
}

/// [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(store: Arc<Store>) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    init_tracing_with_config(store, LayerConfig::default())
}
