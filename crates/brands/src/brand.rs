use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promostock_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use promostock_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrandId(pub AggregateId);

impl BrandId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BrandId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brand {
    id: BrandId,
    tenant_id: Option<TenantId>,
    name: String,
    logo_url: Option<String>,
    active: bool,
    pinned: bool,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Brand {
    /// Empty, not-yet-created instance for rehydration.
    pub fn empty(id: BrandId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            logo_url: None,
            active: false,
            pinned: false,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BrandId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logo_url(&self) -> Option<&str> {
        self.logo_url.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for Brand {
    type Id = BrandId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBrand {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub name: String,
    pub logo_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBrand {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub name: String,
    pub logo_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBrandActive {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBrandPinned {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub pinned: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteBrand.
///
/// The aggregate cannot see items, so "no items left" is checked by the caller
/// against the catalog read model before dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBrand {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrandCommand {
    CreateBrand(CreateBrand),
    UpdateBrand(UpdateBrand),
    SetBrandActive(SetBrandActive),
    SetBrandPinned(SetBrandPinned),
    DeleteBrand(DeleteBrand),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandCreated {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub name: String,
    pub logo_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandUpdated {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub name: String,
    pub logo_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandActivationChanged {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandPinChanged {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub pinned: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandDeleted {
    pub tenant_id: TenantId,
    pub brand_id: BrandId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrandEvent {
    BrandCreated(BrandCreated),
    BrandUpdated(BrandUpdated),
    BrandActivationChanged(BrandActivationChanged),
    BrandPinChanged(BrandPinChanged),
    BrandDeleted(BrandDeleted),
}

impl BrandEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            BrandEvent::BrandCreated(e) => e.tenant_id,
            BrandEvent::BrandUpdated(e) => e.tenant_id,
            BrandEvent::BrandActivationChanged(e) => e.tenant_id,
            BrandEvent::BrandPinChanged(e) => e.tenant_id,
            BrandEvent::BrandDeleted(e) => e.tenant_id,
        }
    }

    pub fn brand_id(&self) -> BrandId {
        match self {
            BrandEvent::BrandCreated(e) => e.brand_id,
            BrandEvent::BrandUpdated(e) => e.brand_id,
            BrandEvent::BrandActivationChanged(e) => e.brand_id,
            BrandEvent::BrandPinChanged(e) => e.brand_id,
            BrandEvent::BrandDeleted(e) => e.brand_id,
        }
    }
}

impl Event for BrandEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BrandEvent::BrandCreated(_) => "brands.brand.created",
            BrandEvent::BrandUpdated(_) => "brands.brand.updated",
            BrandEvent::BrandActivationChanged(_) => "brands.brand.activation_changed",
            BrandEvent::BrandPinChanged(_) => "brands.brand.pin_changed",
            BrandEvent::BrandDeleted(_) => "brands.brand.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BrandEvent::BrandCreated(e) => e.occurred_at,
            BrandEvent::BrandUpdated(e) => e.occurred_at,
            BrandEvent::BrandActivationChanged(e) => e.occurred_at,
            BrandEvent::BrandPinChanged(e) => e.occurred_at,
            BrandEvent::BrandDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Brand {
    type Command = BrandCommand;
    type Event = BrandEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BrandEvent::BrandCreated(e) => {
                self.id = e.brand_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.logo_url = e.logo_url.clone();
                self.active = true;
                self.pinned = false;
                self.created = true;
            }
            BrandEvent::BrandUpdated(e) => {
                self.name = e.name.clone();
                self.logo_url = e.logo_url.clone();
            }
            BrandEvent::BrandActivationChanged(e) => self.active = e.active,
            BrandEvent::BrandPinChanged(e) => self.pinned = e.pinned,
            BrandEvent::BrandDeleted(_) => self.deleted = true,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BrandCommand::CreateBrand(cmd) => self.handle_create(cmd),
            BrandCommand::UpdateBrand(cmd) => self.handle_update(cmd),
            BrandCommand::SetBrandActive(cmd) => self.handle_set_active(cmd),
            BrandCommand::SetBrandPinned(cmd) => self.handle_set_pinned(cmd),
            BrandCommand::DeleteBrand(cmd) => self.handle_delete(cmd),
        }
    }
}

fn normalized_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("brand name cannot be empty"));
    }
    Ok(name.to_string())
}

fn normalized_url(url: &Option<String>) -> Option<String> {
    url.as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

impl Brand {
    /// Existing, live brand of the given tenant.
    fn ensure_live(&self, tenant_id: TenantId, brand_id: BrandId) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != brand_id {
            return Err(DomainError::invariant("brand_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateBrand) -> Result<Vec<BrandEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("brand already exists"));
        }
        let name = normalized_name(&cmd.name)?;

        Ok(vec![BrandEvent::BrandCreated(BrandCreated {
            tenant_id: cmd.tenant_id,
            brand_id: cmd.brand_id,
            name,
            logo_url: normalized_url(&cmd.logo_url),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateBrand) -> Result<Vec<BrandEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.brand_id)?;
        let name = normalized_name(&cmd.name)?;
        let logo_url = normalized_url(&cmd.logo_url);

        if name == self.name && logo_url == self.logo_url {
            return Ok(vec![]);
        }

        Ok(vec![BrandEvent::BrandUpdated(BrandUpdated {
            tenant_id: cmd.tenant_id,
            brand_id: cmd.brand_id,
            name,
            logo_url,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_active(&self, cmd: &SetBrandActive) -> Result<Vec<BrandEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.brand_id)?;
        if self.active == cmd.active {
            return Ok(vec![]);
        }

        Ok(vec![BrandEvent::BrandActivationChanged(
            BrandActivationChanged {
                tenant_id: cmd.tenant_id,
                brand_id: cmd.brand_id,
                active: cmd.active,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_set_pinned(&self, cmd: &SetBrandPinned) -> Result<Vec<BrandEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.brand_id)?;
        if self.pinned == cmd.pinned {
            return Ok(vec![]);
        }

        Ok(vec![BrandEvent::BrandPinChanged(BrandPinChanged {
            tenant_id: cmd.tenant_id,
            brand_id: cmd.brand_id,
            pinned: cmd.pinned,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteBrand) -> Result<Vec<BrandEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.brand_id)?;

        Ok(vec![BrandEvent::BrandDeleted(BrandDeleted {
            tenant_id: cmd.tenant_id,
            brand_id: cmd.brand_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
