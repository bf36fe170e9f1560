//! Combination (parlay) settlement.
//!
//! Legs are resolved on their own as soon as their match finishes, so
//! progress survives restarts. A ticket is then settled once as a unit: any
//! losing leg decides it immediately, otherwise it waits until every leg is
//! terminal and pays `stake * product(leg multipliers)`.

use crate::error::AppResult;
use crate::models::{BetStatus, ComboTicket, ResultsSnapshot, TicketLeg};
use crate::odds::{self, OddsError, AMOUNT_SCALE};
use crate::repositories::{SettleOutcome, SettlementStore, TicketSettlement};
use crate::services::audit::{AuditTrailService, UnitKind};
use crate::services::settlement::{audit_failure, audit_unresolved, Disposition, SettlerReport};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Whether a ticket can be settled with the legs resolved so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketDecision {
    Undecided,
    Decided { multiplier: Decimal, status: BetStatus },
}

/// Ticket status for a combined multiplier
pub fn status_for_multiplier(multiplier: Decimal) -> BetStatus {
    if multiplier > Decimal::ONE {
        BetStatus::Win
    } else if multiplier == Decimal::ONE {
        BetStatus::Draw
    } else if multiplier > Decimal::ZERO {
        BetStatus::LoseHalf
    } else {
        BetStatus::Loss
    }
}

/// Decide a ticket from its legs' stored statuses
pub fn evaluate(legs: &[TicketLeg]) -> Result<TicketDecision, OddsError> {
    if legs.iter().any(|leg| leg.status == BetStatus::Loss) {
        return Ok(TicketDecision::Decided {
            multiplier: Decimal::ZERO,
            status: BetStatus::Loss,
        });
    }

    if legs.is_empty() || legs.iter().any(|leg| leg.status.is_pending()) {
        return Ok(TicketDecision::Undecided);
    }

    let mut multiplier = Decimal::ONE;
    for (resolved, leg) in legs.iter().enumerate() {
        let Some(outcome) = leg.status.outcome() else {
            return Ok(TicketDecision::Undecided);
        };
        let factor = odds::leg_multiplier(leg.terms.burmese_price()?, outcome);
        multiplier = multiplier
            .checked_mul(factor)
            .ok_or(OddsError::MultiplierOverflow(resolved + 1))?;
    }
    let multiplier = multiplier.round_dp(AMOUNT_SCALE);

    Ok(TicketDecision::Decided {
        multiplier,
        status: status_for_multiplier(multiplier),
    })
}

/// Amount credited for a decided ticket
pub fn ticket_payout(stake: Decimal, multiplier: Decimal) -> Result<Decimal, OddsError> {
    stake
        .checked_mul(multiplier)
        .map(|amount| amount.round_dp(AMOUNT_SCALE))
        .ok_or(OddsError::PayoutOverflow(stake))
}

/// Settles ticket legs and then the tickets themselves
pub struct CombinationSettler {
    store: Arc<dyn SettlementStore>,
    audit: Option<Arc<AuditTrailService>>,
    max_concurrency: usize,
}

impl CombinationSettler {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        audit: Option<Arc<AuditTrailService>>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            audit,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Resolve every pending leg whose match has finished, including legs of
    /// tickets already lost on another leg
    pub async fn settle_legs(&self, snapshot: &ResultsSnapshot) -> AppResult<SettlerReport> {
        let pending = self.store.pending_legs().await?;
        if pending.is_empty() {
            return Ok(SettlerReport::default());
        }

        debug!("Resolving {} pending ticket legs", pending.len());

        Ok(stream::iter(pending)
            .map(|leg| async move { self.settle_leg(&leg, snapshot).await })
            .buffer_unordered(self.max_concurrency)
            .collect::<SettlerReport>()
            .await)
    }

    async fn settle_leg(&self, leg: &TicketLeg, snapshot: &ResultsSnapshot) -> Disposition {
        let Some(score) = snapshot.final_score(&leg.match_id) else {
            return Disposition::Awaiting;
        };

        let outcome = match odds::classify(score, &leg.terms) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    "Leg {} of ticket {} left pending, unresolvable terms: {}",
                    leg.id, leg.ticket_id, e
                );
                audit_unresolved(
                    self.audit.as_deref(),
                    UnitKind::Leg,
                    leg.id,
                    &leg.match_id,
                    &e.to_string(),
                )
                .await;
                return Disposition::Unresolved;
            }
        };

        let status = BetStatus::from(outcome);
        match self.store.settle_leg(leg.id, status).await {
            Ok(true) => {
                debug!("Leg {} of ticket {} resolved as {}", leg.id, leg.ticket_id, status);
                Disposition::Settled
            }
            Ok(false) => Disposition::AlreadySettled,
            Err(e) => {
                error!("Failed to resolve leg {} of ticket {}: {}", leg.id, leg.ticket_id, e);
                audit_failure(self.audit.as_deref(), UnitKind::Leg, leg.id, &e.to_string()).await;
                Disposition::Failed
            }
        }
    }

    /// Settle every pending ticket its legs now decide
    pub async fn settle_tickets(&self) -> AppResult<SettlerReport> {
        let pending = self.store.pending_tickets().await?;
        if pending.is_empty() {
            return Ok(SettlerReport::default());
        }

        Ok(stream::iter(pending)
            .map(|ticket| async move { self.settle_ticket(&ticket).await })
            .buffer_unordered(self.max_concurrency)
            .collect::<SettlerReport>()
            .await)
    }

    async fn settle_ticket(&self, ticket: &ComboTicket) -> Disposition {
        let decided = evaluate(&ticket.legs).and_then(|decision| match decision {
            TicketDecision::Decided { multiplier, status } => {
                ticket_payout(ticket.stake, multiplier).map(|payout| Some((multiplier, status, payout)))
            }
            TicketDecision::Undecided => Ok(None),
        });

        let (multiplier, status, payout) = match decided {
            Ok(Some(decided)) => decided,
            Ok(None) => return Disposition::Awaiting,
            Err(e) => {
                error!("Ticket {} left pending, cannot be priced: {}", ticket.id, e);
                audit_unresolved(
                    self.audit.as_deref(),
                    UnitKind::Ticket,
                    ticket.id,
                    "",
                    &e.to_string(),
                )
                .await;
                return Disposition::Unresolved;
            }
        };

        let settlement = TicketSettlement {
            ticket_id: ticket.id,
            account_id: ticket.account_id,
            status,
            multiplier,
            payout,
        };

        match self.store.settle_ticket(&settlement).await {
            Ok(SettleOutcome::Applied { .. }) => {
                info!(
                    "Ticket {} settled as {} (multiplier {}, payout {}, {} legs still pending)",
                    ticket.id,
                    status,
                    multiplier,
                    settlement.payout,
                    ticket.pending_legs()
                );
                Disposition::Settled
            }
            Ok(SettleOutcome::AlreadySettled) => {
                debug!("Ticket {} was already settled", ticket.id);
                Disposition::AlreadySettled
            }
            Err(e) => {
                error!("Failed to settle ticket {}: {}", ticket.id, e);
                audit_failure(self.audit.as_deref(), UnitKind::Ticket, ticket.id, &e.to_string()).await;
                Disposition::Failed
            }
        }
    }
}
