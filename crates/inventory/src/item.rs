use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promostock_brands::BrandId;
use promostock_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use promostock_events::Event;
use promostock_promoters::PromoterId;

use crate::quantity::{MAX_UNITS, Quantity};
use crate::size::{ItemSize, SizeId, SizeSpec};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: a merchandise item with sized stock.
///
/// An item is owned by one brand and may be linked into others (a shared
/// item). Links never copy stock; every brand sees the same counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    id: InventoryItemId,
    tenant_id: Option<TenantId>,
    brand_id: Option<BrandId>,
    linked_brands: BTreeSet<BrandId>,
    name: String,
    product_id: String,
    image_url: Option<String>,
    active: bool,
    deleted: bool,
    sizes: Vec<ItemSize>,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Empty, not-yet-created instance for rehydration.
    pub fn empty(id: InventoryItemId) -> Self {
        Self {
            id,
            tenant_id: None,
            brand_id: None,
            linked_brands: BTreeSet::new(),
            name: String::new(),
            product_id: String::new(),
            image_url: None,
            active: false,
            deleted: false,
            sizes: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn brand_id(&self) -> Option<BrandId> {
        self.brand_id
    }

    pub fn linked_brands(&self) -> impl Iterator<Item = BrandId> + '_ {
        self.linked_brands.iter().copied()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn sizes(&self) -> &[ItemSize] {
        &self.sizes
    }

    pub fn size(&self, size_id: SizeId) -> Option<&ItemSize> {
        self.sizes.iter().find(|s| s.size_id() == size_id)
    }

    pub fn total_in_circulation(&self) -> u64 {
        self.sizes.iter().map(ItemSize::in_circulation).sum()
    }

    /// Check conservation on every size.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        self.sizes.iter().try_for_each(ItemSize::check_invariants)
    }

    fn size_mut(&mut self, size_id: SizeId) -> Option<&mut ItemSize> {
        self.sizes.iter_mut().find(|s| s.size_id() == size_id)
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ---- commands ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub brand_id: BrandId,
    pub name: String,
    pub product_id: String,
    pub image_url: Option<String>,
    pub sizes: Vec<SizeSpec>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemDetails {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub name: String,
    pub product_id: String,
    pub image_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetItemActive {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSize {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size: SizeSpec,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LinkBrand. Shares the item into another brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkBrand {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub brand_id: BrandId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkBrand {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub brand_id: BrandId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteItem, issued from the point of view of `brand_id`.
///
/// From a linked brand only the link goes away. From the owner the item is
/// tombstoned, which requires that no other brand links it and that no unit
/// is out with a promoter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteItem {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub brand_id: BrandId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeOut {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: Quantity,
    pub promoter_id: PromoterId,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReturnStock.
///
/// Without `force` the promoter must hold at least `quantity` units of the
/// size. With `force` any excess is booked as unaccounted stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnStock {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: Quantity,
    pub promoter_id: PromoterId,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub force: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnStock {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: Quantity,
    pub promoter_id: PromoterId,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restock {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: Quantity,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    CreateItem(CreateItem),
    UpdateItemDetails(UpdateItemDetails),
    SetItemActive(SetItemActive),
    AddSize(AddSize),
    LinkBrand(LinkBrand),
    UnlinkBrand(UnlinkBrand),
    DeleteItem(DeleteItem),
    TakeOut(TakeOut),
    ReturnStock(ReturnStock),
    BurnStock(BurnStock),
    Restock(Restock),
}

// ---- events ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub brand_id: BrandId,
    pub name: String,
    pub product_id: String,
    pub image_url: Option<String>,
    pub sizes: Vec<SizeSpec>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetailsUpdated {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub name: String,
    pub product_id: String,
    pub image_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemActivationChanged {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeAdded {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size: SizeSpec,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLinkedToBrand {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub brand_id: BrandId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUnlinkedFromBrand {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub brand_id: BrandId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDeleted {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTakenOut {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: u64,
    pub promoter_id: PromoterId,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReturned {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: u64,
    /// Part of `quantity` the promoter did not hold (forced returns only).
    #[serde(default)]
    pub unaccounted_quantity: u64,
    pub promoter_id: PromoterId,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBurned {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: u64,
    pub promoter_id: PromoterId,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRestocked {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub size_id: SizeId,
    pub quantity: u64,
    pub employee_id: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemCreated(ItemCreated),
    ItemDetailsUpdated(ItemDetailsUpdated),
    ItemActivationChanged(ItemActivationChanged),
    SizeAdded(SizeAdded),
    ItemLinkedToBrand(ItemLinkedToBrand),
    ItemUnlinkedFromBrand(ItemUnlinkedFromBrand),
    ItemDeleted(ItemDeleted),
    StockTakenOut(StockTakenOut),
    StockReturned(StockReturned),
    StockBurned(StockBurned),
    StockRestocked(StockRestocked),
}

impl InventoryEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            InventoryEvent::ItemCreated(e) => e.tenant_id,
            InventoryEvent::ItemDetailsUpdated(e) => e.tenant_id,
            InventoryEvent::ItemActivationChanged(e) => e.tenant_id,
            InventoryEvent::SizeAdded(e) => e.tenant_id,
            InventoryEvent::ItemLinkedToBrand(e) => e.tenant_id,
            InventoryEvent::ItemUnlinkedFromBrand(e) => e.tenant_id,
            InventoryEvent::ItemDeleted(e) => e.tenant_id,
            InventoryEvent::StockTakenOut(e) => e.tenant_id,
            InventoryEvent::StockReturned(e) => e.tenant_id,
            InventoryEvent::StockBurned(e) => e.tenant_id,
            InventoryEvent::StockRestocked(e) => e.tenant_id,
        }
    }

    pub fn item_id(&self) -> InventoryItemId {
        match self {
            InventoryEvent::ItemCreated(e) => e.item_id,
            InventoryEvent::ItemDetailsUpdated(e) => e.item_id,
            InventoryEvent::ItemActivationChanged(e) => e.item_id,
            InventoryEvent::SizeAdded(e) => e.item_id,
            InventoryEvent::ItemLinkedToBrand(e) => e.item_id,
            InventoryEvent::ItemUnlinkedFromBrand(e) => e.item_id,
            InventoryEvent::ItemDeleted(e) => e.item_id,
            InventoryEvent::StockTakenOut(e) => e.item_id,
            InventoryEvent::StockReturned(e) => e.item_id,
            InventoryEvent::StockBurned(e) => e.item_id,
            InventoryEvent::StockRestocked(e) => e.item_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemCreated(_) => "inventory.item.created",
            InventoryEvent::ItemDetailsUpdated(_) => "inventory.item.details_updated",
            InventoryEvent::ItemActivationChanged(_) => "inventory.item.activation_changed",
            InventoryEvent::SizeAdded(_) => "inventory.item.size_added",
            InventoryEvent::ItemLinkedToBrand(_) => "inventory.item.linked_to_brand",
            InventoryEvent::ItemUnlinkedFromBrand(_) => "inventory.item.unlinked_from_brand",
            InventoryEvent::ItemDeleted(_) => "inventory.item.deleted",
            InventoryEvent::StockTakenOut(_) => "inventory.stock.taken_out",
            InventoryEvent::StockReturned(_) => "inventory.stock.returned",
            InventoryEvent::StockBurned(_) => "inventory.stock.burned",
            InventoryEvent::StockRestocked(_) => "inventory.stock.restocked",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemCreated(e) => e.occurred_at,
            InventoryEvent::ItemDetailsUpdated(e) => e.occurred_at,
            InventoryEvent::ItemActivationChanged(e) => e.occurred_at,
            InventoryEvent::SizeAdded(e) => e.occurred_at,
            InventoryEvent::ItemLinkedToBrand(e) => e.occurred_at,
            InventoryEvent::ItemUnlinkedFromBrand(e) => e.occurred_at,
            InventoryEvent::ItemDeleted(e) => e.occurred_at,
            InventoryEvent::StockTakenOut(e) => e.occurred_at,
            InventoryEvent::StockReturned(e) => e.occurred_at,
            InventoryEvent::StockBurned(e) => e.occurred_at,
            InventoryEvent::StockRestocked(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemCreated(e) => {
                self.id = e.item_id;
                self.tenant_id = Some(e.tenant_id);
                self.brand_id = Some(e.brand_id);
                self.name = e.name.clone();
                self.product_id = e.product_id.clone();
                self.image_url = e.image_url.clone();
                self.sizes = e.sizes.iter().map(ItemSize::from_spec).collect();
                self.active = true;
                self.created = true;
            }
            InventoryEvent::ItemDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.product_id = e.product_id.clone();
                self.image_url = e.image_url.clone();
            }
            InventoryEvent::ItemActivationChanged(e) => self.active = e.active,
            InventoryEvent::SizeAdded(e) => self.sizes.push(ItemSize::from_spec(&e.size)),
            InventoryEvent::ItemLinkedToBrand(e) => {
                self.linked_brands.insert(e.brand_id);
            }
            InventoryEvent::ItemUnlinkedFromBrand(e) => {
                self.linked_brands.remove(&e.brand_id);
            }
            InventoryEvent::ItemDeleted(_) => self.deleted = true,
            InventoryEvent::StockTakenOut(e) => {
                if let Some(size) = self.size_mut(e.size_id) {
                    size.take_out(e.promoter_id, e.quantity);
                }
            }
            InventoryEvent::StockReturned(e) => {
                if let Some(size) = self.size_mut(e.size_id) {
                    size.give_back(e.promoter_id, e.quantity, e.unaccounted_quantity);
                }
            }
            InventoryEvent::StockBurned(e) => {
                if let Some(size) = self.size_mut(e.size_id) {
                    size.burn(e.promoter_id, e.quantity);
                }
            }
            InventoryEvent::StockRestocked(e) => {
                if let Some(size) = self.size_mut(e.size_id) {
                    size.restock(e.quantity);
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let events = match command {
            InventoryCommand::CreateItem(cmd) => self.handle_create(cmd)?,
            InventoryCommand::UpdateItemDetails(cmd) => self.handle_update_details(cmd)?,
            InventoryCommand::SetItemActive(cmd) => self.handle_set_active(cmd)?,
            InventoryCommand::AddSize(cmd) => self.handle_add_size(cmd)?,
            InventoryCommand::LinkBrand(cmd) => self.handle_link(cmd)?,
            InventoryCommand::UnlinkBrand(cmd) => self.handle_unlink(cmd)?,
            InventoryCommand::DeleteItem(cmd) => self.handle_delete(cmd)?,
            InventoryCommand::TakeOut(cmd) => self.handle_take_out(cmd)?,
            InventoryCommand::ReturnStock(cmd) => self.handle_return(cmd)?,
            InventoryCommand::BurnStock(cmd) => self.handle_burn(cmd)?,
            InventoryCommand::Restock(cmd) => self.handle_restock(cmd)?,
        };

        self.verify(&events)?;
        Ok(events)
    }
}

fn clean_optional(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(v: &str, what: &str) -> Result<String, DomainError> {
    let v = v.trim();
    if v.is_empty() {
        return Err(DomainError::validation(format!("{what} cannot be empty")));
    }
    Ok(v.to_string())
}

impl InventoryItem {
    fn ensure_live(&self, tenant_id: TenantId, item_id: InventoryItemId) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.active {
            return Err(DomainError::conflict(format!(
                "item '{}' is inactive",
                self.name
            )));
        }
        Ok(())
    }

    fn existing_size(&self, size_id: SizeId) -> Result<&ItemSize, DomainError> {
        self.size(size_id).ok_or_else(|| {
            DomainError::validation(format!("size {size_id} does not belong to item '{}'", self.name))
        })
    }

    /// Reject growth of the item's original units past [`MAX_UNITS`].
    fn ensure_room_for(&self, extra: u64) -> Result<(), DomainError> {
        let total = self
            .sizes
            .iter()
            .map(ItemSize::original_quantity)
            .chain([extra])
            .try_fold(0u64, u64::checked_add);
        match total {
            Some(t) if t <= MAX_UNITS => Ok(()),
            _ => Err(DomainError::validation("quantity too large")),
        }
    }

    fn label_taken(&self, label: &str) -> bool {
        self.sizes
            .iter()
            .any(|s| s.label().eq_ignore_ascii_case(label))
    }

    /// Apply decided events to a scratch copy and check conservation.
    fn verify(&self, events: &[InventoryEvent]) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut next = self.clone();
        for e in events {
            next.apply(e);
        }
        next.check_invariants()
    }

    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        let name = required(&cmd.name, "item name")?;
        let product_id = required(&cmd.product_id, "product id")?;

        if cmd.sizes.is_empty() {
            return Err(DomainError::validation("an item needs at least one size"));
        }

        let mut labels = HashSet::new();
        let mut ids = HashSet::new();
        let mut sizes = Vec::with_capacity(cmd.sizes.len());
        for spec in &cmd.sizes {
            let label = required(&spec.label, "size label")?;
            if !labels.insert(label.to_lowercase()) {
                return Err(DomainError::validation(format!("duplicate size label '{label}'")));
            }
            if !ids.insert(spec.size_id) {
                return Err(DomainError::validation(format!("duplicate size id {}", spec.size_id)));
            }
            sizes.push(SizeSpec {
                size_id: spec.size_id,
                label,
                quantity: spec.quantity,
            });
        }

        let total = sizes
            .iter()
            .map(|s| s.quantity)
            .try_fold(0u64, u64::checked_add)
            .filter(|t| *t <= MAX_UNITS)
            .ok_or_else(|| DomainError::validation("quantity too large"))?;
        if total == 0 {
            return Err(DomainError::validation("total quantity must be greater than zero"));
        }

        Ok(vec![InventoryEvent::ItemCreated(ItemCreated {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            brand_id: cmd.brand_id,
            name,
            product_id,
            image_url: clean_optional(&cmd.image_url),
            sizes,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_details(
        &self,
        cmd: &UpdateItemDetails,
    ) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;
        let name = required(&cmd.name, "item name")?;
        let product_id = required(&cmd.product_id, "product id")?;
        let image_url = clean_optional(&cmd.image_url);

        if name == self.name && product_id == self.product_id && image_url == self.image_url {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::ItemDetailsUpdated(ItemDetailsUpdated {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            name,
            product_id,
            image_url,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_active(&self, cmd: &SetItemActive) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;
        if self.active == cmd.active {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::ItemActivationChanged(
            ItemActivationChanged {
                tenant_id: cmd.tenant_id,
                item_id: cmd.item_id,
                active: cmd.active,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_add_size(&self, cmd: &AddSize) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;
        let label = required(&cmd.size.label, "size label")?;
        if self.label_taken(&label) {
            return Err(DomainError::conflict(format!("size '{label}' already exists")));
        }
        if self.size(cmd.size.size_id).is_some() {
            return Err(DomainError::conflict(format!(
                "size id {} already exists",
                cmd.size.size_id
            )));
        }
        self.ensure_room_for(cmd.size.quantity)?;

        Ok(vec![InventoryEvent::SizeAdded(SizeAdded {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            size: SizeSpec {
                size_id: cmd.size.size_id,
                label,
                quantity: cmd.size.quantity,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link(&self, cmd: &LinkBrand) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;
        if self.brand_id == Some(cmd.brand_id) {
            return Err(DomainError::conflict("item already belongs to this brand"));
        }
        if self.linked_brands.contains(&cmd.brand_id) {
            return Err(DomainError::conflict("item is already shared with this brand"));
        }

        Ok(vec![InventoryEvent::ItemLinkedToBrand(ItemLinkedToBrand {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            brand_id: cmd.brand_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_unlink(&self, cmd: &UnlinkBrand) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;
        if !self.linked_brands.contains(&cmd.brand_id) {
            return Err(DomainError::validation("item is not shared with this brand"));
        }

        Ok(vec![InventoryEvent::ItemUnlinkedFromBrand(
            ItemUnlinkedFromBrand {
                tenant_id: cmd.tenant_id,
                item_id: cmd.item_id,
                brand_id: cmd.brand_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_delete(&self, cmd: &DeleteItem) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;

        if self.linked_brands.contains(&cmd.brand_id) {
            return self.handle_unlink(&UnlinkBrand {
                tenant_id: cmd.tenant_id,
                item_id: cmd.item_id,
                brand_id: cmd.brand_id,
                occurred_at: cmd.occurred_at,
            });
        }
        if self.brand_id != Some(cmd.brand_id) {
            return Err(DomainError::validation("item does not belong to this brand"));
        }
        if !self.linked_brands.is_empty() {
            return Err(DomainError::conflict(format!(
                "item is still shared with {} other brand(s)",
                self.linked_brands.len()
            )));
        }
        let out = self.total_in_circulation();
        if out > 0 {
            return Err(DomainError::conflict(format!(
                "{out} unit(s) are still with promoters"
            )));
        }

        Ok(vec![InventoryEvent::ItemDeleted(ItemDeleted {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_take_out(&self, cmd: &TakeOut) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;
        self.ensure_active()?;
        let size = self.existing_size(cmd.size_id)?;

        let quantity = cmd.quantity.get();
        if quantity > size.available_quantity() {
            return Err(DomainError::insufficient_stock(
                quantity,
                size.available_quantity(),
            ));
        }

        Ok(vec![InventoryEvent::StockTakenOut(StockTakenOut {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            size_id: cmd.size_id,
            quantity,
            promoter_id: cmd.promoter_id,
            employee_id: cmd.employee_id,
            notes: clean_optional(&cmd.notes),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_return(&self, cmd: &ReturnStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;
        let size = self.existing_size(cmd.size_id)?;

        let quantity = cmd.quantity.get();
        let held = size.held_by(cmd.promoter_id);
        if quantity > held && !cmd.force {
            return Err(DomainError::insufficient_holdings(quantity, held));
        }
        let unaccounted = quantity.saturating_sub(held);
        self.ensure_room_for(unaccounted)?;

        Ok(vec![InventoryEvent::StockReturned(StockReturned {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            size_id: cmd.size_id,
            quantity,
            unaccounted_quantity: unaccounted,
            promoter_id: cmd.promoter_id,
            employee_id: cmd.employee_id,
            notes: clean_optional(&cmd.notes),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_burn(&self, cmd: &BurnStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;
        let size = self.existing_size(cmd.size_id)?;

        let quantity = cmd.quantity.get();
        let held = size.held_by(cmd.promoter_id);
        if quantity > held {
            return Err(DomainError::insufficient_holdings(quantity, held));
        }

        Ok(vec![InventoryEvent::StockBurned(StockBurned {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            size_id: cmd.size_id,
            quantity,
            promoter_id: cmd.promoter_id,
            employee_id: cmd.employee_id,
            notes: clean_optional(&cmd.notes),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restock(&self, cmd: &Restock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.item_id)?;
        self.ensure_active()?;
        self.existing_size(cmd.size_id)?;
        self.ensure_room_for(cmd.quantity.get())?;

        Ok(vec![InventoryEvent::StockRestocked(StockRestocked {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            size_id: cmd.size_id,
            quantity: cmd.quantity.get(),
            employee_id: cmd.employee_id,
            notes: clean_optional(&cmd.notes),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        tenant_id: TenantId,
        item_id: InventoryItemId,
        brand_id: BrandId,
        size_m: SizeId,
        size_l: SizeId,
        employee: UserId,
        item: InventoryItem,
    }

    impl Fixture {
        fn new(m: u64, l: u64) -> Self {
            let tenant_id = TenantId::new();
            let item_id = InventoryItemId::new(AggregateId::new());
            let brand_id = BrandId::new(AggregateId::new());
            let size_m = SizeId::new();
            let size_l = SizeId::new();
            let mut item = InventoryItem::empty(item_id);
            let events = item
                .handle(&InventoryCommand::CreateItem(CreateItem {
                    tenant_id,
                    item_id,
                    brand_id,
                    name: "Rain jacket".to_string(),
                    product_id: "RJ-01".to_string(),
                    image_url: None,
                    sizes: vec![
                        SizeSpec { size_id: size_m, label: "M".to_string(), quantity: m },
                        SizeSpec { size_id: size_l, label: "L".to_string(), quantity: l },
                    ],
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            for e in &events {
                item.apply(e);
            }
            Self {
                tenant_id,
                item_id,
                brand_id,
                size_m,
                size_l,
                employee: UserId::new(),
                item,
            }
        }

        fn run(&mut self, cmd: InventoryCommand) -> Result<Vec<InventoryEvent>, DomainError> {
            let events = self.item.handle(&cmd)?;
            for e in &events {
                self.item.apply(e);
            }
            Ok(events)
        }

        fn take_out(&self, size_id: SizeId, promoter_id: PromoterId, qty: u64) -> InventoryCommand {
            InventoryCommand::TakeOut(TakeOut {
                tenant_id: self.tenant_id,
                item_id: self.item_id,
                size_id,
                quantity: Quantity::new(qty).unwrap(),
                promoter_id,
                employee_id: self.employee,
                notes: None,
                occurred_at: Utc::now(),
            })
        }

        fn give_back(&self, size_id: SizeId, promoter_id: PromoterId, qty: u64, force: bool) -> InventoryCommand {
            InventoryCommand::ReturnStock(ReturnStock {
                tenant_id: self.tenant_id,
                item_id: self.item_id,
                size_id,
                quantity: Quantity::new(qty).unwrap(),
                promoter_id,
                employee_id: self.employee,
                notes: None,
                force,
                occurred_at: Utc::now(),
            })
        }

        fn burn(&self, size_id: SizeId, promoter_id: PromoterId, qty: u64) -> InventoryCommand {
            InventoryCommand::BurnStock(BurnStock {
                tenant_id: self.tenant_id,
                item_id: self.item_id,
                size_id,
                quantity: Quantity::new(qty).unwrap(),
                promoter_id,
                employee_id: self.employee,
                notes: None,
                occurred_at: Utc::now(),
            })
        }

        fn restock(&self, size_id: SizeId, qty: u64) -> InventoryCommand {
            InventoryCommand::Restock(Restock {
                tenant_id: self.tenant_id,
                item_id: self.item_id,
                size_id,
                quantity: Quantity::new(qty).unwrap(),
                employee_id: self.employee,
                notes: Some("  delivery 42 ".to_string()),
                occurred_at: Utc::now(),
            })
        }

        fn set_active(&self, active: bool) -> InventoryCommand {
            InventoryCommand::SetItemActive(SetItemActive {
                tenant_id: self.tenant_id,
                item_id: self.item_id,
                active,
                occurred_at: Utc::now(),
            })
        }

        fn delete_from(&self, brand_id: BrandId) -> InventoryCommand {
            InventoryCommand::DeleteItem(DeleteItem {
                tenant_id: self.tenant_id,
                item_id: self.item_id,
                brand_id,
                occurred_at: Utc::now(),
            })
        }

        fn link(&self, brand_id: BrandId) -> InventoryCommand {
            InventoryCommand::LinkBrand(LinkBrand {
                tenant_id: self.tenant_id,
                item_id: self.item_id,
                brand_id,
                occurred_at: Utc::now(),
            })
        }
    }

    fn promoter() -> PromoterId {
        PromoterId::new(AggregateId::new())
    }

    #[test]
    fn create_validates_sizes() {
        let item_id = InventoryItemId::new(AggregateId::new());
        let base = CreateItem {
            tenant_id: TenantId::new(),
            item_id,
            brand_id: BrandId::new(AggregateId::new()),
            name: "Cap".to_string(),
            product_id: "CAP".to_string(),
            image_url: None,
            sizes: vec![],
            occurred_at: Utc::now(),
        };
        let item = InventoryItem::empty(item_id);

        let err = item.handle(&InventoryCommand::CreateItem(base.clone())).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let dup = CreateItem {
            sizes: vec![
                SizeSpec { size_id: SizeId::new(), label: "s".to_string(), quantity: 1 },
                SizeSpec { size_id: SizeId::new(), label: " S ".to_string(), quantity: 1 },
            ],
            ..base.clone()
        };
        let err = item.handle(&InventoryCommand::CreateItem(dup)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.contains("duplicate")));

        let empty_stock = CreateItem {
            sizes: vec![SizeSpec { size_id: SizeId::new(), label: "S".to_string(), quantity: 0 }],
            ..base
        };
        let err = item.handle(&InventoryCommand::CreateItem(empty_stock)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.contains("total quantity")));
    }

    #[test]
    fn take_out_moves_units_to_promoter() {
        let mut fx = Fixture::new(10, 5);
        let p = promoter();

        fx.run(fx.take_out(fx.size_m, p, 4)).unwrap();

        let m = fx.item.size(fx.size_m).unwrap();
        assert_eq!(m.available_quantity(), 6);
        assert_eq!(m.in_circulation(), 4);
        assert_eq!(m.original_quantity(), 10);
        assert_eq!(m.held_by(p), 4);
        assert_eq!(fx.item.size(fx.size_l).unwrap().available_quantity(), 5);
    }

    #[test]
    fn take_out_beyond_available_is_rejected() {
        let mut fx = Fixture::new(3, 0);
        let err = fx.run(fx.take_out(fx.size_m, promoter(), 4)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(4, 3));

        let err = fx.run(fx.take_out(fx.size_l, promoter(), 1)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(1, 0));
    }

    #[test]
    fn take_out_and_restock_require_active_item() {
        let mut fx = Fixture::new(3, 3);
        let p = promoter();
        fx.run(fx.take_out(fx.size_m, p, 2)).unwrap();
        fx.run(fx.set_active(false)).unwrap();

        assert!(matches!(
            fx.run(fx.take_out(fx.size_m, p, 1)),
            Err(DomainError::Conflict(_))
        ));
        assert!(matches!(
            fx.run(fx.restock(fx.size_m, 1)),
            Err(DomainError::Conflict(_))
        ));

        // Settling outstanding units still works.
        fx.run(fx.give_back(fx.size_m, p, 1, false)).unwrap();
        fx.run(fx.burn(fx.size_m, p, 1)).unwrap();
        assert_eq!(fx.item.size(fx.size_m).unwrap().in_circulation(), 0);
    }

    #[test]
    fn return_more_than_held_needs_force() {
        let mut fx = Fixture::new(10, 0);
        let a = promoter();
        let b = promoter();
        fx.run(fx.take_out(fx.size_m, a, 5)).unwrap();
        fx.run(fx.take_out(fx.size_m, b, 1)).unwrap();

        let err = fx.run(fx.give_back(fx.size_m, b, 3, false)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_holdings(3, 1));

        let events = fx.run(fx.give_back(fx.size_m, b, 3, true)).unwrap();
        match &events[0] {
            InventoryEvent::StockReturned(e) => assert_eq!(e.unaccounted_quantity, 2),
            other => panic!("unexpected event {other:?}"),
        }

        let m = fx.item.size(fx.size_m).unwrap();
        assert_eq!(m.held_by(a), 5);
        assert_eq!(m.held_by(b), 0);
        assert_eq!(m.in_circulation(), 5);
        assert_eq!(m.available_quantity(), 7);
        assert_eq!(m.original_quantity(), 12);
        m.check_invariants().unwrap();
    }

    #[test]
    fn burn_is_limited_to_holdings() {
        let mut fx = Fixture::new(10, 0);
        let p = promoter();
        fx.run(fx.take_out(fx.size_m, p, 2)).unwrap();

        let err = fx.run(fx.burn(fx.size_m, p, 3)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_holdings(3, 2));

        fx.run(fx.burn(fx.size_m, p, 2)).unwrap();
        let m = fx.item.size(fx.size_m).unwrap();
        assert_eq!(m.burned_quantity(), 2);
        assert_eq!(m.available_quantity(), 8);
        assert_eq!(m.original_quantity(), 10);
    }

    #[test]
    fn restock_grows_original_and_trims_notes() {
        let mut fx = Fixture::new(1, 0);
        let events = fx.run(fx.restock(fx.size_l, 6)).unwrap();
        match &events[0] {
            InventoryEvent::StockRestocked(e) => assert_eq!(e.notes.as_deref(), Some("delivery 42")),
            other => panic!("unexpected event {other:?}"),
        }
        let l = fx.item.size(fx.size_l).unwrap();
        assert_eq!(l.original_quantity(), 6);
        assert_eq!(l.available_quantity(), 6);
    }

    #[test]
    fn unknown_size_is_a_validation_error() {
        let mut fx = Fixture::new(1, 1);
        let err = fx.run(fx.take_out(SizeId::new(), promoter(), 1)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn shared_item_delete_from_linked_brand_only_unlinks() {
        let mut fx = Fixture::new(2, 0);
        let other = BrandId::new(AggregateId::new());
        fx.run(fx.link(other)).unwrap();
        assert!(matches!(fx.run(fx.link(other)), Err(DomainError::Conflict(_))));
        assert!(matches!(fx.run(fx.link(fx.brand_id)), Err(DomainError::Conflict(_))));

        // Owner cannot delete while shared.
        assert!(matches!(
            fx.run(fx.delete_from(fx.brand_id)),
            Err(DomainError::Conflict(_))
        ));

        let events = fx.run(fx.delete_from(other)).unwrap();
        assert!(matches!(events[0], InventoryEvent::ItemUnlinkedFromBrand(_)));
        assert!(!fx.item.is_deleted());
        assert_eq!(fx.item.linked_brands().count(), 0);

        fx.run(fx.delete_from(fx.brand_id)).unwrap();
        assert!(fx.item.is_deleted());
        assert_eq!(fx.run(fx.restock(fx.size_m, 1)), Err(DomainError::NotFound));
    }

    #[test]
    fn delete_is_blocked_while_units_circulate() {
        let mut fx = Fixture::new(2, 0);
        let p = promoter();
        fx.run(fx.take_out(fx.size_m, p, 1)).unwrap();
        assert!(matches!(
            fx.run(fx.delete_from(fx.brand_id)),
            Err(DomainError::Conflict(m)) if m.contains("promoters")
        ));
        fx.run(fx.give_back(fx.size_m, p, 1, false)).unwrap();
        fx.run(fx.delete_from(fx.brand_id)).unwrap();
    }

    #[test]
    fn add_size_rejects_existing_label() {
        let mut fx = Fixture::new(1, 1);
        let cmd = |label: &str| {
            InventoryCommand::AddSize(AddSize {
                tenant_id: fx.tenant_id,
                item_id: fx.item_id,
                size: SizeSpec { size_id: SizeId::new(), label: label.to_string(), quantity: 0 },
                occurred_at: Utc::now(),
            })
        };
        let (dup, fresh) = (cmd("m"), cmd("XL"));
        assert!(matches!(fx.run(dup), Err(DomainError::Conflict(_))));
        fx.run(fresh).unwrap();
        assert_eq!(fx.item.sizes().len(), 3);
    }

    fn create_with(sizes: &[u64]) -> Result<Vec<InventoryEvent>, DomainError> {
        let item_id = InventoryItemId::new(AggregateId::new());
        InventoryItem::empty(item_id).handle(&InventoryCommand::CreateItem(CreateItem {
            tenant_id: TenantId::new(),
            item_id,
            brand_id: BrandId::new(AggregateId::new()),
            name: "Cap".to_string(),
            product_id: "CP-01".to_string(),
            image_url: None,
            sizes: sizes
                .iter()
                .enumerate()
                .map(|(i, q)| SizeSpec { size_id: SizeId::new(), label: format!("S{i}"), quantity: *q })
                .collect(),
            occurred_at: Utc::now(),
        }))
    }

    #[test]
    fn create_rejects_totals_beyond_unit_bound() {
        let too_large = Err(DomainError::validation("quantity too large"));
        assert_eq!(create_with(&[u64::MAX, 1]), too_large);
        assert_eq!(create_with(&[MAX_UNITS, 1]), too_large);
        assert_eq!(create_with(&[u64::MAX]), too_large);
        assert!(create_with(&[MAX_UNITS, 0]).is_ok());
    }

    #[test]
    fn restock_return_and_new_sizes_stop_at_unit_bound() {
        let too_large = Err(DomainError::validation("quantity too large"));
        let mut fx = Fixture::new(MAX_UNITS - 2, 1);
        let p = promoter();

        assert_eq!(fx.run(fx.restock(fx.size_m, 2)), too_large);
        assert_eq!(fx.run(fx.restock(fx.size_m, MAX_UNITS)), too_large);
        fx.run(fx.restock(fx.size_m, 1)).unwrap();
        assert_eq!(fx.item.size(fx.size_m).unwrap().available_quantity(), MAX_UNITS - 1);

        // Units nobody held would grow the item past the bound.
        assert_eq!(fx.run(fx.give_back(fx.size_l, p, 1, true)), too_large);
        fx.run(fx.take_out(fx.size_l, p, 1)).unwrap();
        assert_eq!(fx.run(fx.give_back(fx.size_l, p, 2, true)), too_large);
        fx.run(fx.give_back(fx.size_l, p, 1, true)).unwrap();

        let add = |quantity: u64| {
            InventoryCommand::AddSize(AddSize {
                tenant_id: fx.tenant_id,
                item_id: fx.item_id,
                size: SizeSpec { size_id: SizeId::new(), label: format!("X{quantity}"), quantity },
                occurred_at: Utc::now(),
            })
        };
        let (over, empty) = (add(1), add(0));
        assert_eq!(fx.run(over), too_large);
        fx.run(empty).unwrap();

        let original: u64 = fx.item.sizes().iter().map(ItemSize::original_quantity).sum();
        assert_eq!(original, MAX_UNITS);
        fx.item.check_invariants().unwrap();
    }

    #[test]
    fn events_roundtrip_through_json_for_replay() {
        let mut fx = Fixture::new(4, 0);
        let p = promoter();
        let e1 = fx.run(fx.take_out(fx.size_m, p, 3)).unwrap();
        let e2 = fx.run(fx.give_back(fx.size_m, p, 4, true)).unwrap();

        let mut replayed = InventoryItem::empty(fx.item_id);
        let created = InventoryEvent::ItemCreated(ItemCreated {
            tenant_id: fx.tenant_id,
            item_id: fx.item_id,
            brand_id: fx.brand_id,
            name: "Rain jacket".to_string(),
            product_id: "RJ-01".to_string(),
            image_url: None,
            sizes: fx
                .item
                .sizes()
                .iter()
                .map(|s| SizeSpec {
                    size_id: s.size_id(),
                    label: s.label().to_string(),
                    quantity: if s.size_id() == fx.size_m { 4 } else { 0 },
                })
                .collect(),
            occurred_at: Utc::now(),
        });
        for e in std::iter::once(created).chain(e1).chain(e2) {
            let json = serde_json::to_value(&e).unwrap();
            let back: InventoryEvent = serde_json::from_value(json).unwrap();
            replayed.apply(&back);
        }

        assert_eq!(replayed.sizes(), fx.item.sizes());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            TakeOut { size: usize, promoter: usize, qty: u64 },
            Return { size: usize, promoter: usize, qty: u64, force: bool },
            Burn { size: usize, promoter: usize, qty: u64 },
            Restock { size: usize, qty: u64 },
            Toggle(bool),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => (0..2usize, 0..3usize, 1..8u64).prop_map(|(size, promoter, qty)| Op::TakeOut { size, promoter, qty }),
                3 => (0..2usize, 0..3usize, 1..8u64, any::<bool>()).prop_map(|(size, promoter, qty, force)| Op::Return { size, promoter, qty, force }),
                2 => (0..2usize, 0..3usize, 1..5u64).prop_map(|(size, promoter, qty)| Op::Burn { size, promoter, qty }),
                1 => (0..2usize, 1..10u64).prop_map(|(size, qty)| Op::Restock { size, qty }),
                1 => any::<bool>().prop_map(Op::Toggle),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 500, ..ProptestConfig::default() })]

            /// Whatever sequence of movements is attempted, accepted ones keep
            /// every size balanced and rejected ones leave state untouched.
            #[test]
            fn movements_preserve_conservation(
                m in 0..20u64,
                l in 1..20u64,
                ops in proptest::collection::vec(op(), 1..60),
            ) {
                let mut fx = Fixture::new(m, l);
                let promoters = [promoter(), promoter(), promoter()];
                let sizes = [fx.size_m, fx.size_l];

                for op in ops {
                    let cmd = match op {
                        Op::TakeOut { size, promoter, qty } => fx.take_out(sizes[size], promoters[promoter], qty),
                        Op::Return { size, promoter, qty, force } => fx.give_back(sizes[size], promoters[promoter], qty, force),
                        Op::Burn { size, promoter, qty } => fx.burn(sizes[size], promoters[promoter], qty),
                        Op::Restock { size, qty } => fx.restock(sizes[size], qty),
                        Op::Toggle(active) => fx.set_active(active),
                    };

                    let before = fx.item.clone();
                    if fx.run(cmd).is_err() {
                        prop_assert_eq!(&before, &fx.item);
                    }
                    prop_assert!(fx.item.check_invariants().is_ok());
                }
            }

            /// Near the unit bound, movements of any size are either accepted
            /// or rejected cleanly; the item never grows past the bound.
            #[test]
            fn movements_near_unit_bound_never_overflow(
                headroom in 0..50u64,
                ops in proptest::collection::vec(
                    (0..5usize, 0..2usize, 0..2usize, prop_oneof![1..60u64, (MAX_UNITS - 60)..=MAX_UNITS]),
                    1..40,
                ),
            ) {
                let mut fx = Fixture::new(MAX_UNITS - headroom - 1, 1);
                let promoters = [promoter(), promoter()];
                let sizes = [fx.size_m, fx.size_l];

                for (kind, size, promoter, qty) in ops {
                    let (size, promoter) = (sizes[size], promoters[promoter]);
                    let cmd = match kind {
                        0 => fx.take_out(size, promoter, qty),
                        1 => fx.give_back(size, promoter, qty, false),
                        2 => fx.give_back(size, promoter, qty, true),
                        3 => fx.burn(size, promoter, qty),
                        _ => fx.restock(size, qty),
                    };

                    let before = fx.item.clone();
                    if fx.run(cmd).is_err() {
                        prop_assert_eq!(&before, &fx.item);
                    }
                    prop_assert!(fx.item.check_invariants().is_ok());
                    let original = fx
                        .item
                        .sizes()
                        .iter()
                        .try_fold(0u64, |acc, s| acc.checked_add(s.original_quantity()));
                    prop_assert!(original.is_some_and(|t| t <= MAX_UNITS));
                }
            }
        }
    }
}
