use crate::error::{AppError, AppResult};
use crate::models::{ResultsSnapshot, Wager};
use crate::odds;
use crate::repositories::{SettleOutcome, SettlementStore, WagerSettlement};
use crate::services::audit::{AuditTrailService, UnitKind};
use crate::services::combination::CombinationSettler;
use crate::services::results_gateway::ResultsGateway;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What happened to one unit (wager, leg or ticket) during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Result missing or not final yet
    Awaiting,
    /// Terms could not be priced; left pending for inspection
    Unresolved,
    Settled,
    /// Another run got there first
    AlreadySettled,
    /// Persistence failed and was rolled back
    Failed,
}

/// Per-settler counts for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettlerReport {
    pub settled: usize,
    pub already_settled: usize,
    pub awaiting: usize,
    pub unresolved: usize,
    pub failed: usize,
}

impl SettlerReport {
    pub fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Awaiting => self.awaiting += 1,
            Disposition::Unresolved => self.unresolved += 1,
            Disposition::Settled => self.settled += 1,
            Disposition::AlreadySettled => self.already_settled += 1,
            Disposition::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.settled + self.already_settled + self.awaiting + self.unresolved + self.failed
    }
}

impl Extend<Disposition> for SettlerReport {
    fn extend<I: IntoIterator<Item = Disposition>>(&mut self, iter: I) {
        for disposition in iter {
            self.record(disposition);
        }
    }
}

impl FromIterator<Disposition> for SettlerReport {
    fn from_iter<I: IntoIterator<Item = Disposition>>(iter: I) -> Self {
        let mut report = Self::default();
        report.extend(iter);
        report
    }
}

/// Outcome of one full settlement cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Results in the fetched snapshot
    pub results: usize,
    pub wagers: SettlerReport,
    pub legs: SettlerReport,
    pub tickets: SettlerReport,
}

impl CycleReport {
    pub fn has_failures(&self) -> bool {
        self.wagers.failed + self.legs.failed + self.tickets.failed > 0
    }
}

/// Settles pending single wagers and combination tickets against one
/// results snapshot per cycle.
///
/// The engine attempts every pending unit on every cycle and applies each
/// payout at most once: a unit whose conditional update matches no row is
/// reported as already settled and nothing is credited.
pub struct SettlementService {
    store: Arc<dyn SettlementStore>,
    gateway: Arc<dyn ResultsGateway>,
    audit: Option<Arc<AuditTrailService>>,
    max_concurrency: usize,
}

impl SettlementService {
    /// Create a new settlement service
    pub fn new(
        store: Arc<dyn SettlementStore>,
        gateway: Arc<dyn ResultsGateway>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            gateway,
            audit: None,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Record unresolved and failed units in an inspection log
    pub fn with_audit(mut self, audit: Arc<AuditTrailService>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Fetch results once, settle single wagers, then combination tickets.
    ///
    /// Returns `Err` only when the cycle could not start or load its work;
    /// per-unit failures are counted in the report.
    pub async fn run_cycle(&self) -> AppResult<CycleReport> {
        let snapshot = match self.gateway.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = AppError::from(e);
                warn!("Settlement cycle skipped, results unavailable: {}", err);
                audit_cycle_aborted(self.audit.as_deref(), &err).await;
                return Err(err);
            }
        };

        let result = self.settle_snapshot(&snapshot).await;
        match &result {
            Ok(report) => {
                info!(
                    "Settlement cycle finished: {} results, wagers {:?}, legs {:?}, tickets {:?}",
                    report.results, report.wagers, report.legs, report.tickets
                );
                if let Some(audit) = &self.audit {
                    if let Err(e) = audit.log_cycle_completed(report).await {
                        warn!("Failed to write cycle summary to audit log: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("Settlement cycle aborted: {}", e);
                audit_cycle_aborted(self.audit.as_deref(), e).await;
            }
        }
        result
    }

    /// Settle everything pending against an already fetched snapshot
    pub async fn settle_snapshot(&self, snapshot: &ResultsSnapshot) -> AppResult<CycleReport> {
        let wagers = self.settle_wagers(snapshot).await?;

        let combinations = CombinationSettler::new(
            self.store.clone(),
            self.audit.clone(),
            self.max_concurrency,
        );
        let legs = combinations.settle_legs(snapshot).await?;
        let tickets = combinations.settle_tickets().await?;

        Ok(CycleReport {
            results: snapshot.len(),
            wagers,
            legs,
            tickets,
        })
    }

    /// Settle every pending single wager whose match is finished
    pub async fn settle_wagers(&self, snapshot: &ResultsSnapshot) -> AppResult<SettlerReport> {
        let pending = self.store.pending_wagers().await?;
        if pending.is_empty() {
            debug!("No pending wagers");
            return Ok(SettlerReport::default());
        }

        debug!("Settling {} pending wagers", pending.len());

        let report = stream::iter(pending)
            .map(|wager| async move { self.settle_wager(&wager, snapshot).await })
            .buffer_unordered(self.max_concurrency)
            .collect::<SettlerReport>()
            .await;

        Ok(report)
    }

    async fn settle_wager(&self, wager: &Wager, snapshot: &ResultsSnapshot) -> Disposition {
        let Some(score) = snapshot.final_score(&wager.match_id) else {
            return Disposition::Awaiting;
        };

        let verdict = match odds::settle(score, &wager.terms, wager.stake) {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(
                    "Wager {} on match {} left pending, unresolvable terms: {}",
                    wager.id, wager.match_id, e
                );
                audit_unresolved(
                    self.audit.as_deref(),
                    UnitKind::Wager,
                    wager.id,
                    &wager.match_id,
                    &e.to_string(),
                )
                .await;
                return Disposition::Unresolved;
            }
        };

        let settlement = WagerSettlement {
            wager_id: wager.id,
            account_id: wager.account_id,
            status: verdict.outcome.into(),
            payout: verdict.payout,
        };

        match self.store.settle_wager(&settlement).await {
            Ok(SettleOutcome::Applied { credited }) => {
                info!(
                    "Wager {} settled as {} with payout {} (balance after: {})",
                    wager.id,
                    settlement.status,
                    settlement.payout,
                    credited
                        .map(|entry| entry.balance_after.to_string())
                        .unwrap_or_else(|| "unchanged".to_string())
                );
                Disposition::Settled
            }
            Ok(SettleOutcome::AlreadySettled) => {
                debug!("Wager {} was already settled", wager.id);
                Disposition::AlreadySettled
            }
            Err(e) => {
                error!("Failed to settle wager {}: {}", wager.id, e);
                audit_failure(self.audit.as_deref(), UnitKind::Wager, wager.id, &e.to_string()).await;
                Disposition::Failed
            }
        }
    }
}

pub(crate) async fn audit_unresolved(
    audit: Option<&AuditTrailService>,
    unit: UnitKind,
    unit_id: Uuid,
    match_id: &str,
    reason: &str,
) {
    if let Some(audit) = audit {
        if let Err(e) = audit.log_unresolved(unit, unit_id, match_id, reason).await {
            warn!("Failed to write audit entry for {:?} {}: {}", unit, unit_id, e);
        }
    }
}

pub(crate) async fn audit_failure(
    audit: Option<&AuditTrailService>,
    unit: UnitKind,
    unit_id: Uuid,
    error: &str,
) {
    if let Some(audit) = audit {
        if let Err(e) = audit.log_failure(unit, unit_id, error).await {
            warn!("Failed to write audit entry for {:?} {}: {}", unit, unit_id, e);
        }
    }
}

async fn audit_cycle_aborted(audit: Option<&AuditTrailService>, err: &AppError) {
    if let Some(audit) = audit {
        if let Err(e) = audit.log_cycle_aborted(&err.to_string()).await {
            warn!("Failed to write audit entry for aborted cycle: {}", e);
        }
    }
}
