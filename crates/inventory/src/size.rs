//! Sized stock of an item.

use core::str::FromStr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use promostock_core::{DomainError, DomainResult, Entity};
use promostock_promoters::PromoterId;

/// Label used when an item is created without explicit sizes.
pub const DEFAULT_SIZE_LABEL: &str = "One size";

/// Identifier of a size within an item. Unique per item, assigned by the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeId(Uuid);

impl SizeId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for SizeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SizeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s)
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("SizeId: {e}")))
    }
}

/// A size as declared on creation or when added later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSpec {
    pub size_id: SizeId,
    pub label: String,
    pub quantity: u64,
}

/// Unit counters of one size plus who holds the circulating units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSize {
    id: SizeId,
    label: String,
    original_quantity: u64,
    available_quantity: u64,
    in_circulation: u64,
    burned_quantity: u64,
    holdings: BTreeMap<PromoterId, u64>,
}

impl Entity for ItemSize {
    type Id = SizeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ItemSize {
    pub(crate) fn from_spec(spec: &SizeSpec) -> Self {
        Self {
            id: spec.size_id,
            label: spec.label.clone(),
            original_quantity: spec.quantity,
            available_quantity: spec.quantity,
            in_circulation: 0,
            burned_quantity: 0,
            holdings: BTreeMap::new(),
        }
    }

    pub fn size_id(&self) -> SizeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn original_quantity(&self) -> u64 {
        self.original_quantity
    }

    pub fn available_quantity(&self) -> u64 {
        self.available_quantity
    }

    pub fn in_circulation(&self) -> u64 {
        self.in_circulation
    }

    pub fn burned_quantity(&self) -> u64 {
        self.burned_quantity
    }

    pub fn held_by(&self, promoter_id: PromoterId) -> u64 {
        self.holdings.get(&promoter_id).copied().unwrap_or(0)
    }

    pub fn holdings(&self) -> impl Iterator<Item = (PromoterId, u64)> + '_ {
        self.holdings.iter().map(|(p, q)| (*p, *q))
    }

    pub(crate) fn take_out(&mut self, promoter_id: PromoterId, quantity: u64) {
        self.available_quantity = self.available_quantity.saturating_sub(quantity);
        self.in_circulation = self.in_circulation.saturating_add(quantity);
        let held = self.holdings.entry(promoter_id).or_insert(0);
        *held = held.saturating_add(quantity);
    }

    /// `unaccounted` of the returned units were not attributed to the promoter
    /// and enter the books as new original stock.
    pub(crate) fn give_back(&mut self, promoter_id: PromoterId, quantity: u64, unaccounted: u64) {
        let from_holdings = quantity.saturating_sub(unaccounted);
        self.release(promoter_id, from_holdings);
        self.in_circulation = self.in_circulation.saturating_sub(from_holdings);
        self.available_quantity = self.available_quantity.saturating_add(quantity);
        self.original_quantity = self.original_quantity.saturating_add(unaccounted);
    }

    pub(crate) fn burn(&mut self, promoter_id: PromoterId, quantity: u64) {
        self.release(promoter_id, quantity);
        self.in_circulation = self.in_circulation.saturating_sub(quantity);
        self.burned_quantity = self.burned_quantity.saturating_add(quantity);
    }

    pub(crate) fn restock(&mut self, quantity: u64) {
        self.available_quantity = self.available_quantity.saturating_add(quantity);
        self.original_quantity = self.original_quantity.saturating_add(quantity);
    }

    fn release(&mut self, promoter_id: PromoterId, quantity: u64) {
        if let Some(held) = self.holdings.get_mut(&promoter_id) {
            *held = held.saturating_sub(quantity);
            if *held == 0 {
                self.holdings.remove(&promoter_id);
            }
        }
    }

    /// Conservation checks; a failure means a decision let through an illegal movement.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let accounted = self
            .available_quantity
            .checked_add(self.in_circulation)
            .and_then(|q| q.checked_add(self.burned_quantity));
        if accounted != Some(self.original_quantity) {
            return Err(DomainError::invariant(format!(
                "size '{}': original {} != available {} + in circulation {} + burned {}",
                self.label,
                self.original_quantity,
                self.available_quantity,
                self.in_circulation,
                self.burned_quantity
            )));
        }

        let held = self
            .holdings
            .values()
            .try_fold(0u64, |acc, q| acc.checked_add(*q));
        if held != Some(self.in_circulation) {
            return Err(DomainError::invariant(format!(
                "size '{}': promoters hold {held:?} units but {} are in circulation",
                self.label, self.in_circulation
            )));
        }

        if self.holdings.values().any(|q| *q == 0) {
            return Err(DomainError::invariant(format!(
                "size '{}': empty holding entry",
                self.label
            )));
        }

        Ok(())
    }
}
