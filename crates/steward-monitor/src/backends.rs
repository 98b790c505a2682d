//! Collaborators a [`Change`](crate::change::Change) needs while applying.

use std::sync::Arc;

use steward_common::config::MonitorConfig;

use crate::network::Networks;
use crate::registry::Registry;
use crate::translate::{DefaultTranslator, SpecTranslator};

/// Shared handles to the registry, network providers, and spec translator,
/// plus the controller settings that bound their use.
#[derive(Clone)]
pub struct Backends {
    /// Service registry.
    pub registry: Arc<dyn Registry>,
    /// Network providers keyed by network type.
    pub networks: Networks,
    /// Configuration translator used when creating tasks.
    pub translator: Arc<dyn SpecTranslator>,
    /// Controller settings.
    pub config: MonitorConfig,
}

impl Backends {
    /// Bundles the collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<dyn Registry>,
        networks: Networks,
        translator: Arc<dyn SpecTranslator>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            registry,
            networks,
            translator,
            config,
        }
    }

    /// Bundles the collaborators with a [`DefaultTranslator`] rooted at
    /// `config.root`, the directory Delete removes per-container state from.
    #[must_use]
    pub fn with_default_translator(
        registry: Arc<dyn Registry>,
        networks: Networks,
        config: MonitorConfig,
    ) -> Self {
        let translator = Arc::new(DefaultTranslator::from_config(&config));
        Self::new(registry, networks, translator, config)
    }
}
