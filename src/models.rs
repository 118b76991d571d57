//! Data models for ONT discovery and registration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a configured OLT connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OltId(String);

/// Opaque identifier of a registration profile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(OltId);
string_id!(ProfileId);

/// A configured OLT connection, as listed by the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OltRef {
    pub id: OltId,
    pub name: String,
    pub ip_address: String,
    #[serde(default = "default_telnet_port")]
    pub port: u16,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

fn default_telnet_port() -> u16 {
    23
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PonType {
    #[default]
    Gpon,
    Epon,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Hgu,
    Sfu,
    Mdu,
    #[serde(other)]
    Unknown,
}

/// How the OLT authenticates the ONT. Only `Sn` (sn-auth) can be provisioned
/// from a discovery scan; the others need a password or LOID per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterMethod {
    #[default]
    Sn,
    Password,
    Loid,
    #[serde(other)]
    Unknown,
}

/// A named bundle of provisioning parameters applied to a whole batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationProfile {
    pub id: ProfileId,
    pub name: String,
    /// Owning OLT; absent or empty means the profile is generic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub olt_id: Option<OltId>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pon_type: PonType,
    #[serde(default)]
    pub device_type: DeviceType,
    pub line_profile_id: u32,
    pub srv_profile_id: u32,
    #[serde(default)]
    pub register_method: RegisterMethod,
    /// Comma separated VLANs, ranges allowed ("100,200-201")
    #[serde(default)]
    pub business_vlans: String,
    #[serde(default = "default_gemport")]
    pub gemport: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_vlan: Option<u32>,
    /// Listing order; higher comes first
    #[serde(default)]
    pub priority: u32,
}

fn default_gemport() -> u32 {
    1
}

impl RegistrationProfile {
    pub fn is_generic(&self) -> bool {
        self.olt_id.as_ref().map_or(true, |id| id.as_str().is_empty())
    }

    /// Whether this profile may be used against the given OLT
    pub fn applies_to(&self, olt: &OltId) -> bool {
        self.is_generic() || self.olt_id.as_ref() == Some(olt)
    }
}

/// One row of an autofind scan
///
/// Identity is the row's position in the scan that produced it, not the
/// serial number.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiscoveredOnt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    pub sn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sn_friendly: Option<String>,
    pub fsp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ont_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autofind_time: Option<String>,
}

impl DiscoveredOnt {
    /// Description used when registering: equipment id, else friendly serial
    pub fn registration_description(&self) -> String {
        [self.equipment_id.as_deref(), self.sn_friendly.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// Response body of both the live and the simulated scan endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResponse {
    #[serde(default)]
    pub onts: Vec<DiscoveredOnt>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<String>,
}

/// Per-device request line of a registration batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEntry {
    pub sn: String,
    pub fsp: String,
    #[serde(default)]
    pub description: String,
}

impl From<&DiscoveredOnt> for RegistrationEntry {
    fn from(ont: &DiscoveredOnt) -> Self {
        Self {
            sn: ont.sn.clone(),
            fsp: ont.fsp.clone(),
            description: ont.registration_description(),
        }
    }
}

/// Body of `POST /api/register`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub olt_id: &'a OltId,
    pub profile_id: &'a ProfileId,
    pub ont_entries: &'a [RegistrationEntry],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Registered { ont_id: u32, service_port_id: u32 },
    Failed { error: String },
}

/// Result of provisioning a single entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OutcomeRecord", into = "OutcomeRecord")]
pub struct RegistrationOutcome {
    pub sn: String,
    pub fsp: String,
    pub description: String,
    pub status: OutcomeStatus,
    /// CLI commands issued for this entry, in order, untouched
    pub commands: Vec<String>,
}

impl RegistrationOutcome {
    pub fn registered(entry: &RegistrationEntry, ont_id: u32, service_port_id: u32, commands: Vec<String>) -> Self {
        Self {
            sn: entry.sn.clone(),
            fsp: entry.fsp.clone(),
            description: entry.description.clone(),
            status: OutcomeStatus::Registered { ont_id, service_port_id },
            commands,
        }
    }

    pub fn failed(entry: &RegistrationEntry, error: impl Into<String>, commands: Vec<String>) -> Self {
        Self {
            sn: entry.sn.clone(),
            fsp: entry.fsp.clone(),
            description: entry.description.clone(),
            status: OutcomeStatus::Failed { error: error.into() },
            commands,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Registered { .. })
    }

    pub fn ont_id(&self) -> Option<u32> {
        match self.status {
            OutcomeStatus::Registered { ont_id, .. } => Some(ont_id),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    pub fn service_port_id(&self) -> Option<u32> {
        match self.status {
            OutcomeStatus::Registered { service_port_id, .. } => Some(service_port_id),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Registered { .. } => None,
            OutcomeStatus::Failed { error } => Some(error),
        }
    }
}

/// Flat wire shape of an outcome, as the registration service sends it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OutcomeRecord {
    sn: String,
    #[serde(default)]
    fsp: String,
    #[serde(default)]
    description: String,
    success: bool,
    #[serde(default)]
    ont_id: Option<u32>,
    #[serde(default)]
    service_port_id: Option<u32>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    commands: Vec<String>,
}

impl TryFrom<OutcomeRecord> for RegistrationOutcome {
    type Error = String;

    fn try_from(r: OutcomeRecord) -> Result<Self, Self::Error> {
        let status = if r.success {
            match (r.ont_id, r.service_port_id) {
                (Some(ont_id), Some(service_port_id)) => OutcomeStatus::Registered { ont_id, service_port_id },
                _ => return Err(format!("successful outcome for {} lacks ont_id/service_port_id", r.sn)),
            }
        } else {
            OutcomeStatus::Failed {
                error: r
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "registration failed".to_string()),
            }
        };

        Ok(Self {
            sn: r.sn,
            fsp: r.fsp,
            description: r.description,
            status,
            commands: r.commands,
        })
    }
}

impl From<RegistrationOutcome> for OutcomeRecord {
    fn from(o: RegistrationOutcome) -> Self {
        let (success, ont_id, service_port_id, error) = match o.status {
            OutcomeStatus::Registered { ont_id, service_port_id } => (true, Some(ont_id), Some(service_port_id), None),
            OutcomeStatus::Failed { error } => (false, None, None, Some(error)),
        };
        Self {
            sn: o.sn,
            fsp: o.fsp,
            description: o.description,
            success,
            ont_id,
            service_port_id,
            error,
            commands: o.commands,
        }
    }
}

/// Response body of `POST /api/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub success_count: usize,
    #[serde(default)]
    pub fail_count: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub results: Vec<RegistrationOutcome>,
}

impl From<Vec<RegistrationOutcome>> for RegisterResponse {
    fn from(results: Vec<RegistrationOutcome>) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        Self {
            success: success_count == results.len(),
            success_count,
            fail_count: results.len() - success_count,
            total: results.len(),
            results,
        }
    }
}

/// Aggregate of one registration batch
///
/// `success_count + fail_count == total == results.len()`, and `results[k]`
/// belongs to the k-th submitted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub results: Vec<RegistrationOutcome>,
}

impl BatchResult {
    pub fn from_outcomes(results: Vec<RegistrationOutcome>) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            success_count,
            fail_count: results.len() - success_count,
            results,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.fail_count == 0
    }
}
