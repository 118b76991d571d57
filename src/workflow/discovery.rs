//! Discovery orchestrator
//!
//! Runs the autofind scan against an OLT, substitutes the simulated scan
//! when the live one fails, and tags every result with where it came from
//! and which scan generation it belongs to.

use crate::error::WorkflowError;
use crate::models::{DiscoveredOnt, OltId, ScanResponse};
use crate::parser;
use crate::service::ProvisioningService;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Which of two interchangeable operations produced a value
#[derive(Debug)]
pub enum Provenance<E> {
    Primary,
    /// The primary failed with this error and the fallback succeeded.
    Fallback(E),
}

#[derive(Debug)]
pub struct Sourced<T, E> {
    pub value: T,
    pub provenance: Provenance<E>,
}

/// Both the primary and the fallback failed
#[derive(Debug)]
pub struct FallbackFailed<E> {
    pub primary: E,
    pub fallback: E,
}

/// Run `primary`; if it fails, run `fallback` instead and record why
pub async fn with_fallback<T, E, P, PFut, F, FFut>(primary: P, fallback: F) -> Result<Sourced<T, E>, FallbackFailed<E>>
where
    P: FnOnce() -> PFut,
    PFut: Future<Output = Result<T, E>>,
    F: FnOnce() -> FFut,
    FFut: Future<Output = Result<T, E>>,
{
    match primary().await {
        Ok(value) => Ok(Sourced {
            value,
            provenance: Provenance::Primary,
        }),
        Err(primary) => match fallback().await {
            Ok(value) => Ok(Sourced {
                value,
                provenance: Provenance::Fallback(primary),
            }),
            Err(fallback) => Err(FallbackFailed { primary, fallback }),
        },
    }
}

/// Where a discovered sequence came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSource {
    Live,
    /// Synthetic data; `reason` is why the live scan failed.
    Simulated { reason: String },
}

impl ScanSource {
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated { .. })
    }
}

impl fmt::Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live scan"),
            Self::Simulated { reason } => write!(f, "simulated data (OLT unavailable: {})", reason),
        }
    }
}

/// One scan result; positions into `devices` are only valid for this generation
#[derive(Debug, Clone)]
pub struct Discovery {
    pub olt: OltId,
    pub generation: u64,
    pub devices: Vec<DiscoveredOnt>,
    pub source: ScanSource,
}

pub struct DiscoveryOrchestrator {
    service: Arc<dyn ProvisioningService>,
    in_flight: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    current: Mutex<Option<Arc<Discovery>>>,
}

impl DiscoveryOrchestrator {
    pub fn new(service: Arc<dyn ProvisioningService>) -> Self {
        Self {
            service,
            in_flight: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// The sequence produced by the last successful scan
    pub fn current(&self) -> Option<Arc<Discovery>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Scan `olt`, replacing the current sequence on success
    ///
    /// A second call while one is outstanding fails with `ScanInProgress`.
    /// A failed scan leaves the current sequence in place.
    pub async fn scan(&self, olt: &OltId) -> Result<Arc<Discovery>, WorkflowError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| WorkflowError::ScanInProgress)?;

        tracing::info!("[{}] Scanning OLT {} for unregistered ONTs...", self.service.name(), olt);

        let sourced = with_fallback(
            || self.service.scan_devices(olt),
            || self.service.scan_devices_simulated(olt),
        )
        .await
        .map_err(|failed| {
            tracing::error!(
                "Scan of OLT {} failed on both paths: {} / {}",
                olt,
                failed.primary,
                failed.fallback
            );
            WorkflowError::ScanFailed {
                live: failed.primary,
                simulated: failed.fallback,
            }
        })?;

        let source = match sourced.provenance {
            Provenance::Primary => ScanSource::Live,
            Provenance::Fallback(e) => {
                tracing::warn!("Live scan of OLT {} failed ({}), showing simulated data", olt, e);
                ScanSource::Simulated { reason: e.to_string() }
            }
        };

        let discovery = Arc::new(Discovery {
            olt: olt.clone(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            devices: normalize(sourced.value),
            source,
        });
        tracing::info!(
            "   -> {} ONT(s) found ({}), generation {}",
            discovery.devices.len(),
            discovery.source,
            discovery.generation
        );

        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&discovery));
        Ok(discovery)
    }
}

/// Bring live and simulated responses into one shape
fn normalize(resp: ScanResponse) -> Vec<DiscoveredOnt> {
    if resp.count != resp.onts.len() {
        tracing::warn!(
            "Scan reported count {} but carried {} ONT(s); using the list",
            resp.count,
            resp.onts.len()
        );
    }

    resp.onts
        .into_iter()
        .map(|mut ont| {
            ont.sn = parser::normalize_serial(&ont.sn);
            ont.fsp = ont.fsp.trim().to_string();
            if ont.sn_friendly.as_deref().map_or(true, str::is_empty) {
                ont.sn_friendly = parser::friendly_serial(&ont.sn);
            }
            ont
        })
        .collect()
}
