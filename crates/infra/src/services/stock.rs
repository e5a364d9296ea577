//! Stock movements: single moves, mass edit and promoter bulk returns.
//!
//! Batches are all-settled: every line is its own command against its own
//! item stream, and one failing line never undoes the others.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use promostock_core::{TenantId, UserId};
use promostock_inventory::{
    BurnStock, InventoryCommand, InventoryItem, InventoryItemId, ItemSize, Quantity, Restock,
    ReturnStock, SizeId, TakeOut, TransactionType,
};
use promostock_promoters::PromoterId;

use super::{PromoStock, ServiceError};
use crate::command_dispatcher::DispatchError;

/// One movement on one size of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRequest {
    pub kind: TransactionType,
    pub size_id: SizeId,
    pub quantity: i64,
    /// Required for everything but restock.
    pub promoter_id: Option<PromoterId>,
    pub notes: Option<String>,
    /// Returns only: accept units beyond the promoter's holdings.
    pub force: bool,
}

impl StockRequest {
    pub fn take_out(size_id: SizeId, quantity: u64, promoter_id: PromoterId) -> Self {
        Self::with_promoter(TransactionType::TakeOut, size_id, quantity, promoter_id)
    }

    pub fn return_stock(size_id: SizeId, quantity: u64, promoter_id: PromoterId) -> Self {
        Self::with_promoter(TransactionType::Return, size_id, quantity, promoter_id)
    }

    pub fn burn(size_id: SizeId, quantity: u64, promoter_id: PromoterId) -> Self {
        Self::with_promoter(TransactionType::Burn, size_id, quantity, promoter_id)
    }

    pub fn restock(size_id: SizeId, quantity: u64) -> Self {
        Self {
            kind: TransactionType::Restock,
            size_id,
            quantity: quantity as i64,
            promoter_id: None,
            notes: None,
            force: false,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    fn with_promoter(kind: TransactionType, size_id: SizeId, quantity: u64, promoter_id: PromoterId) -> Self {
        Self {
            kind,
            size_id,
            quantity: quantity as i64,
            promoter_id: Some(promoter_id),
            notes: None,
            force: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementOutcome {
    /// Id of the stock event, which doubles as the transaction id.
    pub transaction_id: Uuid,
    pub item: InventoryItem,
    pub size_id: SizeId,
}

impl MovementOutcome {
    pub fn size(&self) -> Option<&ItemSize> {
        self.item.size(self.size_id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    #[serde(alias = "take-out")]
    TakeOut,
    Return,
    Burn,
}

impl BatchAction {
    pub fn kind(self) -> TransactionType {
        match self {
            BatchAction::TakeOut => TransactionType::TakeOut,
            BatchAction::Return => TransactionType::Return,
            BatchAction::Burn => TransactionType::Burn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLine {
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub action: BatchAction,
    pub promoter_id: PromoterId,
    pub notes: Option<String>,
    pub lines: Vec<BatchLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<BatchFailure>,
    pub skipped: usize,
}

impl BatchReport {
    fn record(&mut self, line: &BatchLine, result: Result<MovementOutcome, ServiceError>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(err) => self.failed.push(BatchFailure {
                item_id: line.item_id,
                size_id: line.size_id,
                quantity: line.quantity,
                reason: err.to_string(),
            }),
        }
    }
}

impl PromoStock {
    /// Apply one movement. The acting employee is recorded on the transaction.
    pub async fn move_stock(
        &self,
        tenant_id: TenantId,
        employee_id: UserId,
        item_id: InventoryItemId,
        request: StockRequest,
    ) -> Result<MovementOutcome, ServiceError> {
        match (request.kind, request.promoter_id) {
            (TransactionType::Restock, Some(_)) => {
                return Err(ServiceError::validation("restock does not take a promoter"));
            }
            (TransactionType::Restock, None) => {}
            (_, None) => return Err(ServiceError::validation("promoter_id is required")),
            (kind, Some(promoter_id)) => self.check_promoter(tenant_id, promoter_id, kind).await?,
        }
        self.apply_movement(tenant_id, employee_id, item_id, request).await
    }

    /// Mass edit: the same action for one promoter across many item sizes.
    pub async fn batch(
        &self,
        tenant_id: TenantId,
        employee_id: UserId,
        request: BatchRequest,
    ) -> Result<BatchReport, ServiceError> {
        let (lines, skipped): (Vec<_>, Vec<_>) =
            request.lines.into_iter().partition(|l| l.quantity > 0);
        if lines.is_empty() {
            return Err(ServiceError::validation(
                "no line has a quantity greater than zero",
            ));
        }

        let kind = request.action.kind();
        self.check_promoter(tenant_id, request.promoter_id, kind).await?;

        let notes = request
            .notes
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Mass edit: {kind}"));

        let mut report = BatchReport {
            skipped: skipped.len(),
            ..BatchReport::default()
        };
        for line in &lines {
            let result = self
                .apply_movement(
                    tenant_id,
                    employee_id,
                    line.item_id,
                    StockRequest {
                        kind,
                        size_id: line.size_id,
                        quantity: line.quantity,
                        promoter_id: Some(request.promoter_id),
                        notes: Some(notes.clone()),
                        force: false,
                    },
                )
                .await;
            report.record(line, result);
        }

        log_report("mass edit", &report);
        Ok(report)
    }

    /// Return everything the promoter holds.
    pub async fn return_all(
        &self,
        tenant_id: TenantId,
        employee_id: UserId,
        promoter_id: PromoterId,
    ) -> Result<BatchReport, ServiceError> {
        let promoter = self.live_promoter(tenant_id, promoter_id).await?;
        let selection: Vec<_> = self
            .projections
            .holdings()
            .inventory(tenant_id, promoter_id)
            .lines()
            .map(|(item_id, size_id, _)| (item_id, size_id))
            .collect();

        let notes = format!("Return of all items for {}", promoter.name());
        let report = self
            .return_held(tenant_id, employee_id, promoter_id, &selection, &notes)
            .await;
        log_report("return all", &report);
        Ok(report)
    }

    /// Return the full held quantity of each selected `(item, size)`.
    pub async fn return_selected(
        &self,
        tenant_id: TenantId,
        employee_id: UserId,
        promoter_id: PromoterId,
        selection: &[(InventoryItemId, SizeId)],
    ) -> Result<BatchReport, ServiceError> {
        if selection.is_empty() {
            return Err(ServiceError::validation("nothing selected"));
        }
        let promoter = self.live_promoter(tenant_id, promoter_id).await?;

        let notes = format!("Selected return for {}", promoter.name());
        let report = self
            .return_held(tenant_id, employee_id, promoter_id, selection, &notes)
            .await;
        log_report("selected return", &report);
        Ok(report)
    }

    async fn return_held(
        &self,
        tenant_id: TenantId,
        employee_id: UserId,
        promoter_id: PromoterId,
        selection: &[(InventoryItemId, SizeId)],
        notes: &str,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for &(item_id, size_id) in selection {
            let held = match self.live_item(tenant_id, item_id).await {
                Ok(item) => item.size(size_id).map(|s| s.held_by(promoter_id)).unwrap_or(0),
                Err(_) => 0,
            };
            let line = BatchLine {
                item_id,
                size_id,
                quantity: held as i64,
            };
            if held == 0 {
                report.record(
                    &line,
                    Err(ServiceError::validation("promoter holds none of this size")),
                );
                continue;
            }

            let result = self
                .apply_movement(
                    tenant_id,
                    employee_id,
                    item_id,
                    StockRequest::return_stock(size_id, held, promoter_id).with_notes(notes),
                )
                .await;
            report.record(&line, result);
        }
        report
    }

    /// Promoter rules that live outside the item aggregate: the promoter has
    /// to exist, and take-outs need an active one.
    async fn check_promoter(
        &self,
        tenant_id: TenantId,
        promoter_id: PromoterId,
        kind: TransactionType,
    ) -> Result<(), ServiceError> {
        let promoter = self.live_promoter(tenant_id, promoter_id).await?;
        if kind == TransactionType::TakeOut && !promoter.can_receive_stock() {
            return Err(ServiceError::PromoterInactive(promoter.name().to_string()));
        }
        Ok(())
    }

    async fn apply_movement(
        &self,
        tenant_id: TenantId,
        employee_id: UserId,
        item_id: InventoryItemId,
        request: StockRequest,
    ) -> Result<MovementOutcome, ServiceError> {
        let quantity = Quantity::from_signed(request.quantity)?;
        let occurred_at = Utc::now();
        let StockRequest {
            kind,
            size_id,
            promoter_id,
            notes,
            force,
            ..
        } = request;

        let command = match (kind, promoter_id) {
            (TransactionType::Restock, _) => InventoryCommand::Restock(Restock {
                tenant_id,
                item_id,
                size_id,
                quantity,
                employee_id,
                notes,
                occurred_at,
            }),
            (_, None) => return Err(ServiceError::validation("promoter_id is required")),
            (TransactionType::TakeOut, Some(promoter_id)) => InventoryCommand::TakeOut(TakeOut {
                tenant_id,
                item_id,
                size_id,
                quantity,
                promoter_id,
                employee_id,
                notes,
                occurred_at,
            }),
            (TransactionType::Return, Some(promoter_id)) => InventoryCommand::ReturnStock(ReturnStock {
                tenant_id,
                item_id,
                size_id,
                quantity,
                promoter_id,
                employee_id,
                notes,
                force,
                occurred_at,
            }),
            (TransactionType::Burn, Some(promoter_id)) => InventoryCommand::BurnStock(BurnStock {
                tenant_id,
                item_id,
                size_id,
                quantity,
                promoter_id,
                employee_id,
                notes,
                occurred_at,
            }),
        };

        let out = self.dispatch_item(tenant_id, item_id, command).await?;
        let transaction_id = out
            .committed
            .first()
            .map(|e| e.event_id)
            .ok_or_else(|| {
                ServiceError::Dispatch(DispatchError::InvariantViolation(
                    "stock movement committed no event".to_string(),
                ))
            })?;

        Ok(MovementOutcome {
            transaction_id,
            item: out.state,
            size_id,
        })
    }
}

fn log_report(what: &str, report: &BatchReport) {
    if report.failed.is_empty() {
        info!(operation = what, succeeded = report.succeeded, skipped = report.skipped, "batch settled");
    } else {
        warn!(
            operation = what,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            skipped = report.skipped,
            "batch settled with failures"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::fixtures::world;
    use super::*;
    use crate::projections::TransactionFilter;

    #[tokio::test]
    async fn single_moves_keep_counters_consistent() {
        let w = world().await;
        let (item_id, sizes) = w.item("Cap", &[("S", 10)]).await;
        let p = w.promoter("Ivy").await;
        let s = sizes[0];

        let out = w
            .svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::take_out(s, 4, p))
            .await
            .unwrap();
        let size = out.size().unwrap();
        assert_eq!((size.available_quantity(), size.in_circulation()), (6, 4));

        w.svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::burn(s, 1, p))
            .await
            .unwrap();
        w.svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::return_stock(s, 2, p))
            .await
            .unwrap();
        let out = w
            .svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::restock(s, 5))
            .await
            .unwrap();

        let size = out.size().unwrap();
        assert_eq!(size.original_quantity(), 15);
        assert_eq!(size.available_quantity(), 13);
        assert_eq!(size.in_circulation(), 1);
        assert_eq!(size.burned_quantity(), 1);
        assert!(w.svc.projections().transactions().get(w.tenant_id, out.transaction_id).is_some());

        let history = w.svc.transaction_history(w.tenant_id, &TransactionFilter::default(), None, None);
        assert_eq!(history.total, 4);
        assert_eq!(history.transactions[0].employee_id, w.employee);
    }

    #[tokio::test]
    async fn over_return_needs_force_and_books_unaccounted_units() {
        let w = world().await;
        let (item_id, sizes) = w.item("Cap", &[("S", 10)]).await;
        let p = w.promoter("Jon").await;
        let s = sizes[0];

        w.svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::take_out(s, 2, p))
            .await
            .unwrap();

        let err = w
            .svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::return_stock(s, 5, p))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Dispatch(DispatchError::InsufficientHoldings { requested: 5, held: 2 })
        ));

        let out = w
            .svc
            .move_stock(
                w.tenant_id,
                w.employee,
                item_id,
                StockRequest::return_stock(s, 5, p).forced(),
            )
            .await
            .unwrap();
        let size = out.size().unwrap();
        assert_eq!(size.original_quantity(), 13);
        assert_eq!(size.available_quantity(), 13);
        assert_eq!(size.in_circulation(), 0);

        let tx = w.svc.projections().transactions().get(w.tenant_id, out.transaction_id).unwrap();
        assert_eq!(tx.unaccounted_quantity, 3);
    }

    #[tokio::test]
    async fn take_out_requires_active_promoter_and_item() {
        let w = world().await;
        let (item_id, sizes) = w.item("Cap", &[("S", 10)]).await;
        let p = w.promoter("Kai").await;

        w.svc.set_promoter_active(w.tenant_id, p, false, false).await.unwrap();
        let err = w
            .svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::take_out(sizes[0], 1, p))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PromoterInactive(_)));

        w.svc.set_promoter_active(w.tenant_id, p, true, false).await.unwrap();
        w.svc.set_item_active(w.tenant_id, item_id, false).await.unwrap();
        let err = w
            .svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::take_out(sizes[0], 1, p))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Dispatch(DispatchError::Conflict(_))));

        let err = w
            .svc
            .move_stock(w.tenant_id, w.employee, item_id, StockRequest::take_out(sizes[0], 0, p))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Dispatch(DispatchError::Validation(_))));
    }

    #[tokio::test]
    async fn batch_is_all_settled_and_skips_empty_lines() {
        let w = world().await;
        let (cap, cap_sizes) = w.item("Cap", &[("S", 5)]).await;
        let (mug, mug_sizes) = w.item("Mug", &[("One size", 1)]).await;
        let p = w.promoter("Lea").await;

        let report = w
            .svc
            .batch(
                w.tenant_id,
                w.employee,
                BatchRequest {
                    action: BatchAction::TakeOut,
                    promoter_id: p,
                    notes: None,
                    lines: vec![
                        BatchLine { item_id: cap, size_id: cap_sizes[0], quantity: 3 },
                        BatchLine { item_id: mug, size_id: mug_sizes[0], quantity: 2 },
                        BatchLine { item_id: mug, size_id: mug_sizes[0], quantity: 0 },
                        BatchLine { item_id: cap, size_id: cap_sizes[0], quantity: -1 },
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].item_id, mug);
        assert!(report.failed[0].reason.contains("insufficient stock"));

        let history = w.svc.transaction_history(w.tenant_id, &TransactionFilter::default(), None, None);
        assert_eq!(history.transactions[0].notes.as_deref(), Some("Mass edit: take_out"));
        assert_eq!(
            w.svc.projections().holdings().inventory(w.tenant_id, p).held(cap, cap_sizes[0]),
            3
        );
    }

    #[tokio::test]
    async fn batch_without_positive_lines_is_rejected() {
        let w = world().await;
        let (cap, sizes) = w.item("Cap", &[("S", 5)]).await;
        let p = w.promoter("Max").await;

        let err = w
            .svc
            .batch(
                w.tenant_id,
                w.employee,
                BatchRequest {
                    action: BatchAction::Burn,
                    promoter_id: p,
                    notes: None,
                    lines: vec![BatchLine { item_id: cap, size_id: sizes[0], quantity: 0 }],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Dispatch(DispatchError::Validation(_))));
    }

    #[tokio::test]
    async fn return_all_and_selected_returns_empty_the_promoter() {
        let w = world().await;
        let (cap, cap_sizes) = w.item("Cap", &[("S", 5), ("M", 5)]).await;
        let (mug, mug_sizes) = w.item("Mug", &[("One size", 5)]).await;
        let p = w.promoter("Nora").await;

        for (item, size, qty) in [(cap, cap_sizes[0], 2), (cap, cap_sizes[1], 1), (mug, mug_sizes[0], 3)] {
            w.svc
                .move_stock(w.tenant_id, w.employee, item, StockRequest::take_out(size, qty, p))
                .await
                .unwrap();
        }

        let report = w
            .svc
            .return_selected(w.tenant_id, w.employee, p, &[(mug, mug_sizes[0]), (mug, cap_sizes[0])])
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed.len(), 1);

        let report = w.svc.return_all(w.tenant_id, w.employee, p).await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert!(report.failed.is_empty());
        assert!(!w.svc.projections().holdings().holds_stock(w.tenant_id, p));

        let history = w.svc.transaction_history(
            w.tenant_id,
            &TransactionFilter {
                kind: Some(TransactionType::Return),
                ..Default::default()
            },
            None,
            None,
        );
        assert_eq!(history.total, 3);
        assert!(
            history
                .transactions
                .iter()
                .any(|t| t.notes.as_deref() == Some("Return of all items for Nora"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_batches_never_oversell() {
        let w = world().await;
        let (cap, sizes) = w.item("Cap", &[("S", 6)]).await;
        let promoters = [w.promoter("A").await, w.promoter("B").await];
        let (tenant_id, employee) = (w.tenant_id, w.employee);
        let svc = Arc::new(w.svc.with_max_retries(50));

        let mut tasks = Vec::new();
        for p in promoters {
            for _ in 0..4 {
                let svc = svc.clone();
                let size_id = sizes[0];
                tasks.push(tokio::spawn(async move {
                    svc.batch(
                        tenant_id,
                        employee,
                        BatchRequest {
                            action: BatchAction::TakeOut,
                            promoter_id: p,
                            notes: None,
                            lines: vec![BatchLine { item_id: cap, size_id, quantity: 1 }],
                        },
                    )
                    .await
                    .unwrap()
                }));
            }
        }

        let mut moved = 0;
        for t in tasks {
            moved += t.await.unwrap().succeeded;
        }
        assert_eq!(moved, 6);

        let item = svc.live_item(tenant_id, cap).await.unwrap();
        item.check_invariants().unwrap();
        assert_eq!(item.sizes()[0].available_quantity(), 0);

        svc.rebuild_read_models().await.unwrap();
        let record = svc.projections().items().get(tenant_id, cap).unwrap();
        assert_eq!(record.totals().in_circulation, 6);
    }
}
