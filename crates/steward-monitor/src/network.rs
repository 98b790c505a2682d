//! Network provider abstraction and the per-type provider table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use steward_common::error::{Result, StewardError};
use steward_common::types::{ContainerId, NetworkType};

use crate::runtime::{Container, Task};

/// Sets up and tears down network attachment for containers.
#[async_trait]
pub trait Network: Send + Sync {
    /// Attaches a freshly created task to the network, returning its address.
    ///
    /// # Errors
    ///
    /// Returns an error if the attachment cannot be created.
    async fn create(&self, task: &dyn Task) -> Result<String>;

    /// Removes the container's network attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the attachment cannot be removed.
    async fn remove(&self, container: &dyn Container) -> Result<()>;
}

/// Lookup table from network type to provider, populated at startup.
#[derive(Clone, Default)]
pub struct Networks {
    providers: HashMap<NetworkType, Arc<dyn Network>>,
}

impl Networks {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` for `network`, replacing any previous one.
    #[must_use]
    pub fn with(mut self, network: NetworkType, provider: Arc<dyn Network>) -> Self {
        let _ = self.providers.insert(network, provider);
        self
    }

    /// Resolves the provider for a container's network type.
    ///
    /// [`NetworkType::None`] without an explicit provider resolves to
    /// `Ok(None)`: such containers get no network attachment.
    ///
    /// # Errors
    ///
    /// Returns [`StewardError::UnknownNetwork`] for any other unmapped type.
    pub fn provider(&self, id: &ContainerId, network: NetworkType) -> Result<Option<&dyn Network>> {
        match self.providers.get(&network) {
            Some(provider) => Ok(Some(provider.as_ref())),
            None if network == NetworkType::None => Ok(None),
            None => Err(StewardError::UnknownNetwork {
                id: id.to_string(),
                network,
            }),
        }
    }

    /// Returns the network types that have a provider.
    pub fn types(&self) -> impl Iterator<Item = NetworkType> + '_ {
        self.providers.keys().copied()
    }
}
