//! Transaction view of stock events.
//!
//! Stock events on an item stream are the transaction log. [`StockMovement`]
//! is the flat, append-only row derived from one of them.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promostock_core::{DomainError, TenantId, UserId};
use promostock_promoters::PromoterId;

use crate::item::{InventoryEvent, InventoryItemId};
use crate::size::SizeId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    TakeOut,
    Return,
    Burn,
    Restock,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::TakeOut => "take_out",
            TransactionType::Return => "return",
            TransactionType::Burn => "burn",
            TransactionType::Restock => "restock",
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "take_out" => Ok(TransactionType::TakeOut),
            "return" => Ok(TransactionType::Return),
            "burn" => Ok(TransactionType::Burn),
            "restock" => Ok(TransactionType::Restock),
            other => Err(DomainError::validation(format!(
                "unknown transaction type '{other}'"
            ))),
        }
    }
}

/// One stock movement, independent of the event that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub tenant_id: TenantId,
    pub kind: TransactionType,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: u64,
    pub unaccounted_quantity: u64,
    pub promoter_id: Option<PromoterId>,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    /// Signed change to the promoter's holdings caused by this movement.
    pub fn holdings_delta(&self) -> i64 {
        // Quantities are bounded by `MAX_UNITS`, which fits an i64.
        let signed = |units: u64| i64::try_from(units).unwrap_or(i64::MAX);
        let q = signed(self.quantity);
        match self.kind {
            TransactionType::TakeOut => q,
            TransactionType::Return => -signed(self.quantity.saturating_sub(self.unaccounted_quantity)),
            TransactionType::Burn => -q,
            TransactionType::Restock => 0,
        }
    }
}

impl InventoryEvent {
    /// The movement recorded by a stock event; `None` for catalog events.
    pub fn stock_movement(&self) -> Option<StockMovement> {
        let movement = match self {
            InventoryEvent::StockTakenOut(e) => StockMovement {
                tenant_id: e.tenant_id,
                kind: TransactionType::TakeOut,
                item_id: e.item_id,
                size_id: e.size_id,
                quantity: e.quantity,
                unaccounted_quantity: 0,
                promoter_id: Some(e.promoter_id),
                employee_id: e.employee_id,
                notes: e.notes.clone(),
                occurred_at: e.occurred_at,
            },
            InventoryEvent::StockReturned(e) => StockMovement {
                tenant_id: e.tenant_id,
                kind: TransactionType::Return,
                item_id: e.item_id,
                size_id: e.size_id,
                quantity: e.quantity,
                unaccounted_quantity: e.unaccounted_quantity,
                promoter_id: Some(e.promoter_id),
                employee_id: e.employee_id,
                notes: e.notes.clone(),
                occurred_at: e.occurred_at,
            },
            InventoryEvent::StockBurned(e) => StockMovement {
                tenant_id: e.tenant_id,
                kind: TransactionType::Burn,
                item_id: e.item_id,
                size_id: e.size_id,
                quantity: e.quantity,
                unaccounted_quantity: 0,
                promoter_id: Some(e.promoter_id),
                employee_id: e.employee_id,
                notes: e.notes.clone(),
                occurred_at: e.occurred_at,
            },
            InventoryEvent::StockRestocked(e) => StockMovement {
                tenant_id: e.tenant_id,
                kind: TransactionType::Restock,
                item_id: e.item_id,
                size_id: e.size_id,
                quantity: e.quantity,
                unaccounted_quantity: 0,
                promoter_id: None,
                employee_id: e.employee_id,
                notes: e.notes.clone(),
                occurred_at: e.occurred_at,
            },
            _ => return None,
        };
        Some(movement)
    }
}
