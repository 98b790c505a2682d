//! Service registry abstraction.

use async_trait::async_trait;
use steward_common::config::Service;
use steward_common::error::Result;
use steward_common::types::ContainerId;

/// Announces container endpoints and health checks to a discovery backend.
///
/// Implementations must treat `register` as an upsert and `deregister`
/// of an unknown id as success: the controller retries both freely.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Registers service `name` of container `id` at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the registration.
    async fn register(
        &self,
        id: &ContainerId,
        name: &str,
        address: &str,
        service: &Service,
    ) -> Result<()>;

    /// Removes every registration held for container `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn deregister(&self, id: &ContainerId) -> Result<()>;

    /// Puts the container's services into maintenance with a reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn enable_maintenance(&self, id: &ContainerId, message: &str) -> Result<()>;

    /// Takes the container's services out of maintenance.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn disable_maintenance(&self, id: &ContainerId) -> Result<()>;
}
