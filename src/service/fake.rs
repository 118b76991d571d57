//! Scriptable `ProvisioningService` for workflow tests

use crate::error::ServiceError;
use crate::models::{
    DiscoveredOnt, OltId, OltRef, ProfileId, RegisterResponse, RegistrationEntry, RegistrationOutcome,
    RegistrationProfile, ScanResponse,
};
use crate::service::ProvisioningService;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub(crate) fn device(sn: &str, fsp: &str) -> DiscoveredOnt {
    DiscoveredOnt {
        sn: sn.to_string(),
        fsp: fsp.to_string(),
        equipment_id: Some(format!("EQ-{}", sn)),
        ..Default::default()
    }
}

pub(crate) fn devices(n: usize) -> Vec<DiscoveredOnt> {
    (0..n).map(|i| device(&format!("SN{:04}", i), &format!("0/1/{}", i))).collect()
}

#[derive(Default)]
pub(crate) struct FakeService {
    /// `None` makes the live scan fail with a transport-like error
    live: Option<Vec<DiscoveredOnt>>,
    simulated: Vec<DiscoveredOnt>,
    simulated_fails: bool,
    scan_gate: Option<Arc<Notify>>,
    register_gate: Option<Arc<Notify>>,
    rejected: HashSet<String>,
    register_fails: bool,
    drop_last_result: bool,
    reversed: bool,
    pub scan_calls: AtomicUsize,
    pub simulated_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
}

impl FakeService {
    pub fn live(devices: Vec<DiscoveredOnt>) -> Self {
        Self {
            live: Some(devices),
            ..Default::default()
        }
    }

    pub fn unreachable(simulated: Vec<DiscoveredOnt>) -> Self {
        Self {
            simulated,
            ..Default::default()
        }
    }

    pub fn simulated_fails(mut self) -> Self {
        self.simulated_fails = true;
        self
    }

    /// Live scans wait for `gate` to be notified
    pub fn scan_gate(mut self, gate: Arc<Notify>) -> Self {
        self.scan_gate = Some(gate);
        self
    }

    /// Registrations wait for `gate` to be notified
    pub fn register_gate(mut self, gate: Arc<Notify>) -> Self {
        self.register_gate = Some(gate);
        self
    }

    pub fn rejecting(mut self, sn: &str) -> Self {
        self.rejected.insert(sn.to_string());
        self
    }

    pub fn register_fails(mut self) -> Self {
        self.register_fails = true;
        self
    }

    pub fn drop_last_result(mut self) -> Self {
        self.drop_last_result = true;
        self
    }

    /// Report outcomes in reverse submission order
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn response(onts: Vec<DiscoveredOnt>) -> ScanResponse {
    ScanResponse {
        count: onts.len(),
        onts,
        scanned_at: None,
    }
}

#[async_trait]
impl ProvisioningService for FakeService {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_olts(&self) -> Result<Vec<OltRef>, ServiceError> {
        Ok(Vec::new())
    }

    async fn list_profiles(&self) -> Result<Vec<RegistrationProfile>, ServiceError> {
        Ok(Vec::new())
    }

    async fn scan_devices(&self, _olt: &OltId) -> Result<ScanResponse, ServiceError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.scan_gate {
            gate.notified().await;
        }
        match &self.live {
            Some(onts) => Ok(response(onts.clone())),
            None => Err(ServiceError::Api {
                status: 500,
                detail: "Gagal koneksi ke OLT: timed out".to_string(),
            }),
        }
    }

    async fn scan_devices_simulated(&self, _olt: &OltId) -> Result<ScanResponse, ServiceError> {
        self.simulated_calls.fetch_add(1, Ordering::SeqCst);
        if self.simulated_fails {
            return Err(ServiceError::Unavailable("demo scan disabled".to_string()));
        }
        Ok(response(self.simulated.clone()))
    }

    async fn register_devices(
        &self,
        _olt: &OltId,
        _profile: &ProfileId,
        entries: &[RegistrationEntry],
    ) -> Result<RegisterResponse, ServiceError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.register_gate {
            gate.notified().await;
        }
        if self.register_fails {
            return Err(ServiceError::Unavailable("registration endpoint down".to_string()));
        }

        let mut results: Vec<RegistrationOutcome> = entries
            .iter()
            .enumerate()
            .map(|(k, entry)| {
                let commands = vec![format!("ont add 1 {} sn-auth \"{}\"", k, entry.sn)];
                if self.rejected.contains(&entry.sn) {
                    RegistrationOutcome::failed(entry, "Failure: SN already exists", commands)
                } else {
                    RegistrationOutcome::registered(entry, k as u32, 100 + k as u32, commands)
                }
            })
            .collect();
        if self.drop_last_result {
            results.pop();
        }
        if self.reversed {
            results.reverse();
        }

        Ok(RegisterResponse::from(results))
    }
}
