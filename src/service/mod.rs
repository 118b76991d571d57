//! Provisioning service abstraction layer
//!
//! The workflow never talks to an OLT itself. Scans and registrations go
//! through a `ProvisioningService`, which is either the remote registration
//! service over HTTP or an in-process simulator.

pub mod offline;
pub mod remote;

#[cfg(test)]
pub(crate) mod fake;

pub use offline::OfflineService;
pub use remote::RemoteService;

use crate::error::ServiceError;
use crate::models::{
    OltId, OltRef, ProfileId, RegisterResponse, RegistrationEntry, RegistrationProfile, ScanResponse,
};
use async_trait::async_trait;

/// Operations the workflow consumes from the registration back end
#[async_trait]
pub trait ProvisioningService: Send + Sync {
    /// Human-readable name of this back end
    fn name(&self) -> &str;

    /// Configured OLT connections
    async fn list_olts(&self) -> Result<Vec<OltRef>, ServiceError>;

    /// All registration profiles, generic and OLT-bound
    async fn list_profiles(&self) -> Result<Vec<RegistrationProfile>, ServiceError>;

    /// Live autofind scan for unregistered ONTs; slow on real hardware
    async fn scan_devices(&self, olt: &OltId) -> Result<ScanResponse, ServiceError>;

    /// Synthetic scan result used when the live scan is unavailable
    async fn scan_devices_simulated(&self, olt: &OltId) -> Result<ScanResponse, ServiceError>;

    /// Provision every entry independently and report one outcome per entry
    async fn register_devices(
        &self,
        olt: &OltId,
        profile: &ProfileId,
        entries: &[RegistrationEntry],
    ) -> Result<RegisterResponse, ServiceError>;

    /// Profiles usable on `olt`: those bound to it plus the generic ones,
    /// highest priority first
    async fn profiles_for(&self, olt: &OltId) -> Result<Vec<RegistrationProfile>, ServiceError> {
        let mut profiles: Vec<RegistrationProfile> = self
            .list_profiles()
            .await?
            .into_iter()
            .filter(|p| p.applies_to(olt))
            .collect();
        profiles.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(profiles)
    }
}
