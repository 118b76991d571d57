//! In-process simulator of the registration service
//!
//! The directory comes from configuration. There is never a live OLT, so
//! `scan_devices` always fails and callers fall back to the simulated scan.
//! Registrations run against a per-OLT chassis inventory seeded with a few
//! existing ONTs and service-ports.

use crate::command::{self, OntAdd, ServicePort};
use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{
    DiscoveredOnt, OltId, OltRef, ProfileId, RegisterMethod, RegisterResponse, RegistrationEntry,
    RegistrationOutcome, RegistrationProfile, ScanResponse,
};
use crate::parser::{self, Fsp};
use crate::service::ProvisioningService;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

const MAX_ONT_ID: u32 = 127;
const MAX_SERVICE_PORT: u32 = 4095;
const DEFAULT_VLAN: u16 = 40;

/// (F/S/P, SN, vendor, equipment id, ONT version, software version, autofind time)
const AUTOFIND: [(&str, &str, &str, &str, &str, &str, &str); 3] = [
    (
        "0/1/7",
        "414C434CB443689D",
        "ALCL",
        "G-140W-MD",
        "3FE56641AOCK20",
        "3FE56641AOCK20",
        "2024-01-15 10:30:25+07:00",
    ),
    (
        "0/2/3",
        "48575443D7B00234",
        "HWTC",
        "EG8145V5",
        "168D.A",
        "V5R020C10S115",
        "2024-01-15 10:31:45+07:00",
    ),
    (
        "0/1/3",
        "5A54454754A12345",
        "ZTEG",
        "F670L",
        "V6.0.10P6T3",
        "V6.0.10P6T3",
        "2024-01-15 10:32:10+07:00",
    ),
];

/// Provisioned state of one simulated OLT
#[derive(Debug)]
struct Chassis {
    ont_ids: HashMap<Fsp, BTreeSet<u32>>,
    serials: HashSet<String>,
    service_ports: BTreeSet<u32>,
}

impl Chassis {
    fn seeded() -> Self {
        let port = Fsp { frame: 0, slot: 1, port: 7 };
        Self {
            ont_ids: HashMap::from([(port, BTreeSet::from([0, 1, 3, 5]))]),
            serials: HashSet::from([
                "414C434CB443000A".to_string(),
                "48575443D7B00111".to_string(),
                "5A54454754A00222".to_string(),
                "414C434CB443333C".to_string(),
            ]),
            service_ports: BTreeSet::from([1, 2, 5, 100, 103, 104]),
        }
    }

    fn next_ont_id(&self, fsp: Fsp) -> Option<u32> {
        let used = self.ont_ids.get(&fsp);
        (0..=MAX_ONT_ID).find(|id| used.map_or(true, |u| !u.contains(id)))
    }

    fn next_service_port(&self) -> Option<u32> {
        (1..=MAX_SERVICE_PORT).find(|id| !self.service_ports.contains(id))
    }

    /// Provision one entry, returning its outcome and command trace
    fn provision(&mut self, profile: &RegistrationProfile, entry: &RegistrationEntry) -> RegistrationOutcome {
        let sn = parser::normalize_serial(&entry.sn);
        if sn.is_empty() {
            return RegistrationOutcome::failed(entry, "Empty serial number", Vec::new());
        }
        let fsp = match parser::parse_fsp(&entry.fsp) {
            Ok(fsp) => fsp,
            Err(e) => return RegistrationOutcome::failed(entry, format!("{:#}", e), Vec::new()),
        };
        let Some(ont_id) = self.next_ont_id(fsp) else {
            return RegistrationOutcome::failed(entry, format!("No free ONT ID on port {}", fsp), Vec::new());
        };
        let Some(sp_id) = self.next_service_port() else {
            return RegistrationOutcome::failed(entry, "No free service-port ID", Vec::new());
        };

        let mut commands = vec![
            command::interface_gpon(fsp),
            OntAdd {
                port: fsp.port,
                ont_id,
                sn: &sn,
                line_profile_id: profile.line_profile_id,
                srv_profile_id: profile.srv_profile_id,
                description: &entry.description,
            }
            .render(),
        ];

        if !self.serials.insert(sn.clone()) {
            return RegistrationOutcome::failed(entry, "ont add rejected by OLT: Failure: SN already exists", commands);
        }
        self.ont_ids.entry(fsp).or_default().insert(ont_id);

        let vlan = parser::parse_vlan_list(&profile.business_vlans)
            .first()
            .map(|r| *r.start())
            .unwrap_or(DEFAULT_VLAN);
        commands.push(command::quit());
        commands.push(
            ServicePort {
                index: sp_id,
                vlan,
                fsp,
                ont_id,
                gemport: profile.gemport,
                user_vlan: profile.user_vlan.unwrap_or(u32::from(vlan)),
            }
            .render(),
        );
        self.service_ports.insert(sp_id);

        RegistrationOutcome::registered(entry, ont_id, sp_id, commands)
    }
}

/// Synthetic back end for demos and offline use
pub struct OfflineService {
    olts: Vec<OltRef>,
    profiles: Vec<RegistrationProfile>,
    chassis: Mutex<HashMap<OltId, Chassis>>,
}

impl OfflineService {
    pub fn new(cfg: &Config) -> Self {
        Self {
            olts: cfg.olts.clone(),
            profiles: cfg.profiles.clone(),
            chassis: Mutex::new(HashMap::new()),
        }
    }

    fn olt(&self, id: &OltId) -> Result<&OltRef, ServiceError> {
        self.olts
            .iter()
            .find(|o| &o.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("OLT {}", id)))
    }

    fn with_chassis<T>(&self, olt: &OltId, f: impl FnOnce(&mut Chassis) -> T) -> T {
        let mut chassis = self.chassis.lock().unwrap_or_else(|e| e.into_inner());
        f(chassis.entry(olt.clone()).or_insert_with(Chassis::seeded))
    }
}

#[async_trait]
impl ProvisioningService for OfflineService {
    fn name(&self) -> &str {
        "offline"
    }

    async fn list_olts(&self) -> Result<Vec<OltRef>, ServiceError> {
        Ok(self.olts.clone())
    }

    async fn list_profiles(&self) -> Result<Vec<RegistrationProfile>, ServiceError> {
        Ok(self.profiles.clone())
    }

    async fn scan_devices(&self, olt: &OltId) -> Result<ScanResponse, ServiceError> {
        let olt = self.olt(olt)?;
        Err(ServiceError::Unavailable(format!(
            "no telnet session to {} ({}:{}) in offline mode",
            olt.name, olt.ip_address, olt.port
        )))
    }

    async fn scan_devices_simulated(&self, olt: &OltId) -> Result<ScanResponse, ServiceError> {
        self.olt(olt)?;
        let registered = self.with_chassis(olt, |c| c.serials.clone());

        let onts: Vec<DiscoveredOnt> = AUTOFIND
            .iter()
            .filter(|(_, sn, ..)| !registered.contains(*sn))
            .enumerate()
            .map(|(i, (fsp, sn, vendor, equipment, version, software, found))| DiscoveredOnt {
                number: Some(i as u32 + 1),
                sn: sn.to_string(),
                sn_friendly: parser::friendly_serial(sn),
                fsp: fsp.to_string(),
                vendor_id: Some(vendor.to_string()),
                equipment_id: Some(equipment.to_string()),
                ont_version: Some(version.to_string()),
                software_version: Some(software.to_string()),
                autofind_time: Some(found.to_string()),
            })
            .collect();

        Ok(ScanResponse {
            count: onts.len(),
            onts,
            scanned_at: None,
        })
    }

    async fn register_devices(
        &self,
        olt: &OltId,
        profile: &ProfileId,
        entries: &[RegistrationEntry],
    ) -> Result<RegisterResponse, ServiceError> {
        self.olt(olt)?;
        let profile = self
            .profiles
            .iter()
            .find(|p| &p.id == profile)
            .ok_or_else(|| ServiceError::NotFound(format!("profile {}", profile)))?;
        if !profile.applies_to(olt) {
            return Err(ServiceError::Api {
                status: 400,
                detail: format!("profile {} is bound to another OLT", profile.name),
            });
        }
        if profile.register_method != RegisterMethod::Sn {
            return Err(ServiceError::Api {
                status: 400,
                detail: format!(
                    "profile {} uses {:?} authentication, only sn-auth can be provisioned",
                    profile.name, profile.register_method
                ),
            });
        }

        let results = self.with_chassis(olt, |chassis| {
            entries
                .iter()
                .map(|entry| {
                    let outcome = chassis.provision(profile, entry);
                    match outcome.error() {
                        None => tracing::debug!("   -> {} registered on {}", entry.sn, entry.fsp),
                        Some(e) => tracing::debug!("   -> {} failed: {}", entry.sn, e),
                    }
                    outcome
                })
                .collect::<Vec<_>>()
        });

        Ok(RegisterResponse::from(results))
    }
}
