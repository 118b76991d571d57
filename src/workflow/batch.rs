//! Registration batch engine
//!
//! Validates a batch before anything goes on the wire, submits it as one
//! request, and puts the outcomes back into entry order.

use crate::error::{ValidationError, WorkflowError};
use crate::models::{BatchResult, OltId, ProfileId, RegisterResponse, RegistrationEntry, RegistrationOutcome};
use crate::parser;
use crate::service::ProvisioningService;
use std::sync::Arc;

/// Check the batch preconditions, in OLT, profile, entries order
pub fn validate<'a>(
    olt: Option<&'a OltId>,
    profile: Option<&'a ProfileId>,
    entries: &[RegistrationEntry],
) -> Result<(&'a OltId, &'a ProfileId), ValidationError> {
    let olt = olt
        .filter(|id| !id.as_str().is_empty())
        .ok_or(ValidationError::MissingOlt)?;
    let profile = profile
        .filter(|id| !id.as_str().is_empty())
        .ok_or(ValidationError::MissingProfile)?;
    if entries.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    Ok((olt, profile))
}

pub struct BatchEngine {
    service: Arc<dyn ProvisioningService>,
    in_flight: tokio::sync::Mutex<()>,
}

impl BatchEngine {
    pub fn new(service: Arc<dyn ProvisioningService>) -> Self {
        Self {
            service,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Submit `entries` for registration with one profile on one OLT
    ///
    /// Per-entry failures are part of the returned `BatchResult`; an `Err`
    /// means no result was produced at all.
    pub async fn register(
        &self,
        olt: Option<&OltId>,
        profile: Option<&ProfileId>,
        entries: &[RegistrationEntry],
    ) -> Result<BatchResult, WorkflowError> {
        let (olt, profile) = validate(olt, profile, entries)?;
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| WorkflowError::RegisterInProgress)?;

        tracing::info!(
            "[{}] Submitting {} ONT(s) to OLT {} with profile {}...",
            self.service.name(),
            entries.len(),
            olt,
            profile
        );

        let response = self
            .service
            .register_devices(olt, profile, entries)
            .await
            .map_err(|e| {
                tracing::error!("Registration batch for OLT {} failed: {}", olt, e);
                WorkflowError::Submission(e)
            })?;

        let result = reconcile(entries, response)?;
        if result.all_succeeded() {
            tracing::info!("   -> {} ONT(s) registered", result.success_count);
        } else {
            tracing::warn!(
                "   -> {} registered, {} failed",
                result.success_count,
                result.fail_count
            );
        }
        Ok(result)
    }
}

/// Whether `outcome` reports on `entry`; an outcome without F/S/P matches on serial alone
fn reports_on(entry: &RegistrationEntry, outcome: &RegistrationOutcome) -> bool {
    parser::normalize_serial(&entry.sn) == parser::normalize_serial(&outcome.sn)
        && (outcome.fsp.trim().is_empty() || outcome.fsp.trim() == entry.fsp.trim())
}

/// Put outcomes into entry order and recompute the counts
///
/// Outcomes already in entry order are taken as they are. Otherwise each
/// entry must match exactly one outcome by serial and F/S/P.
fn reconcile(entries: &[RegistrationEntry], response: RegisterResponse) -> Result<BatchResult, WorkflowError> {
    let reported = (response.total, response.success_count, response.fail_count);
    let results = align(entries, response.results)?;
    let result = BatchResult::from_outcomes(results);
    if reported != (result.total, result.success_count, result.fail_count) {
        tracing::warn!(
            "Service reported total/success/fail {:?}, outcomes say {}/{}/{}",
            reported,
            result.total,
            result.success_count,
            result.fail_count
        );
    }
    Ok(result)
}

fn align(
    entries: &[RegistrationEntry],
    results: Vec<RegistrationOutcome>,
) -> Result<Vec<RegistrationOutcome>, WorkflowError> {
    if results.len() != entries.len() {
        return Err(WorkflowError::MisalignedResponse(format!(
            "{} result(s) for {} entries",
            results.len(),
            entries.len()
        )));
    }

    if entries.iter().zip(&results).all(|(e, o)| reports_on(e, o)) {
        return Ok(results);
    }

    // each entry needs exactly one candidate, and each outcome may be claimed once
    let mut slots: Vec<Option<RegistrationOutcome>> = results.into_iter().map(Some).collect();
    let mut aligned = Vec::with_capacity(entries.len());
    for entry in entries {
        let candidates: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().map_or(false, |o| reports_on(entry, o)))
            .map(|(i, _)| i)
            .collect();
        let outcome = match candidates.as_slice() {
            [only] => slots[*only].take(),
            [] => None,
            _ => {
                return Err(WorkflowError::MisalignedResponse(format!(
                    "{} result(s) could belong to {} on {}",
                    candidates.len(),
                    entry.sn,
                    entry.fsp
                )))
            }
        };
        let outcome = outcome.ok_or_else(|| {
            WorkflowError::MisalignedResponse(format!("no result for {} on {}", entry.sn, entry.fsp))
        })?;
        aligned.push(outcome);
    }

    tracing::debug!("Service returned outcomes out of order, restored entry order");
    Ok(aligned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::service::fake::{self, FakeService};
    use tokio::sync::Notify;

    fn entries(n: usize) -> Vec<RegistrationEntry> {
        fake::devices(n).iter().map(RegistrationEntry::from).collect()
    }

    fn ids() -> (OltId, ProfileId) {
        (OltId::new("olt-1"), ProfileId::new("vlan40"))
    }

    #[test]
    fn test_validate_order() {
        let (olt, profile) = ids();
        let none = entries(0);
        let one = entries(1);

        assert_eq!(validate(None, None, &none), Err(ValidationError::MissingOlt));
        assert_eq!(validate(Some(&OltId::new("")), Some(&profile), &one), Err(ValidationError::MissingOlt));
        assert_eq!(validate(Some(&olt), None, &none), Err(ValidationError::MissingProfile));
        assert_eq!(validate(Some(&olt), Some(&profile), &none), Err(ValidationError::EmptySelection));
        assert!(validate(Some(&olt), Some(&profile), &one).is_ok());
    }

    #[tokio::test]
    async fn test_validation_never_reaches_service() {
        let service = Arc::new(FakeService::live(Vec::new()));
        let engine = BatchEngine::new(service.clone());
        let (olt, profile) = ids();

        for (o, p, e) in [
            (None, Some(&profile), entries(1)),
            (Some(&olt), None, entries(1)),
            (Some(&olt), Some(&profile), entries(0)),
        ] {
            let err = engine.register(o, p, &e).await.unwrap_err();
            assert!(err.is_validation(), "expected validation error, got {:?}", err);
        }
        assert_eq!(FakeService::calls(&service.register_calls), 0);
    }

    #[tokio::test]
    async fn test_second_entry_rejected() {
        let batch = entries(2);
        let service = Arc::new(FakeService::live(Vec::new()).rejecting(&batch[1].sn));
        let engine = BatchEngine::new(service);
        let (olt, profile) = ids();

        let result = engine.register(Some(&olt), Some(&profile), &batch).await.unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.fail_count, 1);

        assert_eq!(result.results[0].sn, batch[0].sn);
        assert!(result.results[0].ont_id().is_some());
        assert!(result.results[0].service_port_id().is_some());

        assert_eq!(result.results[1].sn, batch[1].sn);
        assert_eq!(result.results[1].ont_id(), None);
        assert_eq!(result.results[1].service_port_id(), None);
        assert_eq!(result.results[1].error(), Some("Failure: SN already exists"));
    }

    #[tokio::test]
    async fn test_submission_failure() {
        let engine = BatchEngine::new(Arc::new(FakeService::live(Vec::new()).register_fails()));
        let (olt, profile) = ids();

        let err = engine.register(Some(&olt), Some(&profile), &entries(1)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Submission(ServiceError::Unavailable(_))));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_short_response_is_misaligned() {
        let engine = BatchEngine::new(Arc::new(FakeService::live(Vec::new()).drop_last_result()));
        let (olt, profile) = ids();

        let err = engine.register(Some(&olt), Some(&profile), &entries(3)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::MisalignedResponse(_)));
    }

    #[test]
    fn test_reordered_response_is_put_back_in_entry_order() {
        let batch = entries(2);
        let response = RegisterResponse::from(vec![
            RegistrationOutcome::failed(&batch[1], "Failure: SN already exists", vec![]),
            RegistrationOutcome::registered(&batch[0], 0, 1, vec![]),
        ]);

        let result = reconcile(&batch, response).unwrap();
        assert_eq!(result.results[0].sn, batch[0].sn);
        assert_eq!(result.results[0].ont_id(), Some(0));
        assert_eq!(result.results[1].sn, batch[1].sn);
        assert_eq!(result.results[1].error(), Some("Failure: SN already exists"));
        assert_eq!((result.success_count, result.fail_count), (1, 1));
    }

    #[test]
    fn test_ambiguous_or_foreign_rows_are_misaligned() {
        let batch = entries(2);

        // same device twice, the other one missing
        let doubled = RegisterResponse::from(vec![
            RegistrationOutcome::registered(&batch[1], 1, 2, vec![]),
            RegistrationOutcome::registered(&batch[1], 1, 2, vec![]),
        ]);
        assert!(matches!(reconcile(&batch, doubled), Err(WorkflowError::MisalignedResponse(_))));

        // right serial on the wrong port
        let mut moved = batch[0].clone();
        moved.fsp = "0/9/9".into();
        let foreign = RegisterResponse::from(vec![
            RegistrationOutcome::registered(&batch[1], 1, 2, vec![]),
            RegistrationOutcome::registered(&moved, 0, 1, vec![]),
        ]);
        assert!(matches!(reconcile(&batch, foreign), Err(WorkflowError::MisalignedResponse(_))));
    }

    #[test]
    fn test_duplicate_entries_in_order_are_kept() {
        let batch = vec![entries(1)[0].clone(), entries(1)[0].clone()];
        let response = RegisterResponse::from(vec![
            RegistrationOutcome::registered(&batch[0], 0, 1, vec![]),
            RegistrationOutcome::failed(&batch[1], "Failure: SN already exists", vec![]),
        ]);

        let result = reconcile(&batch, response).unwrap();
        assert!(result.results[0].is_success());
        assert!(!result.results[1].is_success());
    }

    #[tokio::test]
    async fn test_engine_restores_order_of_reversed_outcomes() {
        let batch = entries(3);
        let engine = BatchEngine::new(Arc::new(FakeService::live(Vec::new()).reversed()));
        let (olt, profile) = ids();

        let result = engine.register(Some(&olt), Some(&profile), &batch).await.unwrap();
        let serials: Vec<&str> = result.results.iter().map(|o| o.sn.as_str()).collect();
        assert_eq!(serials, vec!["SN0000", "SN0001", "SN0002"]);
        assert_eq!(result.results[2].ont_id(), Some(2));
    }

    #[test]
    fn test_counts_are_recomputed() {
        let batch = entries(2);
        let mut response = RegisterResponse::from(vec![
            RegistrationOutcome::registered(&batch[0], 0, 1, vec![]),
            RegistrationOutcome::failed(&batch[1], "nope", vec![]),
        ]);
        response.success_count = 2;
        response.fail_count = 0;

        let result = reconcile(&batch, response).unwrap();
        assert_eq!(result.success_count + result.fail_count, result.total);
        assert_eq!(result.fail_count, 1);
    }

    #[tokio::test]
    async fn test_overlapping_register_is_rejected() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(FakeService::live(Vec::new()).register_gate(gate.clone()));
        let engine = BatchEngine::new(service.clone());
        let (olt, profile) = ids();
        let batch = entries(1);

        let (first, second) = tokio::join!(engine.register(Some(&olt), Some(&profile), &batch), async {
            let second = engine.register(Some(&olt), Some(&profile), &batch).await;
            gate.notify_one();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(WorkflowError::RegisterInProgress)));
        assert_eq!(FakeService::calls(&service.register_calls), 1);
    }
}
