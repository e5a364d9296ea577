use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promostock_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use promostock_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromoterId(pub AggregateId);

impl PromoterId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PromoterId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Free-form contact and profile details of a promoter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub clothing_size: Option<String>,
    pub photo_url: Option<String>,
    pub notes: Option<String>,
}

impl ContactDetails {
    /// Trim every field and drop the ones left empty.
    pub fn normalized(&self) -> Self {
        fn clean(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        Self {
            address: clean(&self.address),
            phone_number: clean(&self.phone_number),
            clothing_size: clean(&self.clothing_size),
            photo_url: clean(&self.photo_url),
            notes: clean(&self.notes),
        }
    }
}

/// Aggregate root: Promoter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promoter {
    id: PromoterId,
    tenant_id: Option<TenantId>,
    name: String,
    contact: ContactDetails,
    active: bool,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Promoter {
    pub fn empty(id: PromoterId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            contact: ContactDetails::default(),
            active: false,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PromoterId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactDetails {
        &self.contact
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Only active promoters may receive new stock. Returns and burns stay
    /// possible after deactivation so outstanding units can be settled.
    pub fn can_receive_stock(&self) -> bool {
        self.created && !self.deleted && self.active
    }
}

impl AggregateRoot for Promoter {
    type Id = PromoterId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePromoter {
    pub tenant_id: TenantId,
    pub promoter_id: PromoterId,
    pub name: String,
    pub contact: ContactDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdatePromoter. `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePromoter {
    pub tenant_id: TenantId,
    pub promoter_id: PromoterId,
    pub name: Option<String>,
    pub contact: Option<ContactDetails>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPromoterActive {
    pub tenant_id: TenantId,
    pub promoter_id: PromoterId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePromoter {
    pub tenant_id: TenantId,
    pub promoter_id: PromoterId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromoterCommand {
    CreatePromoter(CreatePromoter),
    UpdatePromoter(UpdatePromoter),
    SetPromoterActive(SetPromoterActive),
    DeletePromoter(DeletePromoter),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoterCreated {
    pub tenant_id: TenantId,
    pub promoter_id: PromoterId,
    pub name: String,
    pub contact: ContactDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoterUpdated {
    pub tenant_id: TenantId,
    pub promoter_id: PromoterId,
    pub name: String,
    pub contact: ContactDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoterActivationChanged {
    pub tenant_id: TenantId,
    pub promoter_id: PromoterId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoterDeleted {
    pub tenant_id: TenantId,
    pub promoter_id: PromoterId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromoterEvent {
    PromoterCreated(PromoterCreated),
    PromoterUpdated(PromoterUpdated),
    PromoterActivationChanged(PromoterActivationChanged),
    PromoterDeleted(PromoterDeleted),
}

impl PromoterEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            PromoterEvent::PromoterCreated(e) => e.tenant_id,
            PromoterEvent::PromoterUpdated(e) => e.tenant_id,
            PromoterEvent::PromoterActivationChanged(e) => e.tenant_id,
            PromoterEvent::PromoterDeleted(e) => e.tenant_id,
        }
    }

    pub fn promoter_id(&self) -> PromoterId {
        match self {
            PromoterEvent::PromoterCreated(e) => e.promoter_id,
            PromoterEvent::PromoterUpdated(e) => e.promoter_id,
            PromoterEvent::PromoterActivationChanged(e) => e.promoter_id,
            PromoterEvent::PromoterDeleted(e) => e.promoter_id,
        }
    }
}

impl Event for PromoterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PromoterEvent::PromoterCreated(_) => "promoters.promoter.created",
            PromoterEvent::PromoterUpdated(_) => "promoters.promoter.updated",
            PromoterEvent::PromoterActivationChanged(_) => "promoters.promoter.activation_changed",
            PromoterEvent::PromoterDeleted(_) => "promoters.promoter.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PromoterEvent::PromoterCreated(e) => e.occurred_at,
            PromoterEvent::PromoterUpdated(e) => e.occurred_at,
            PromoterEvent::PromoterActivationChanged(e) => e.occurred_at,
            PromoterEvent::PromoterDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Promoter {
    type Command = PromoterCommand;
    type Event = PromoterEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PromoterEvent::PromoterCreated(e) => {
                self.id = e.promoter_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.active = true;
                self.created = true;
            }
            PromoterEvent::PromoterUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
            }
            PromoterEvent::PromoterActivationChanged(e) => self.active = e.active,
            PromoterEvent::PromoterDeleted(_) => self.deleted = true,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PromoterCommand::CreatePromoter(cmd) => self.handle_create(cmd),
            PromoterCommand::UpdatePromoter(cmd) => self.handle_update(cmd),
            PromoterCommand::SetPromoterActive(cmd) => self.handle_set_active(cmd),
            PromoterCommand::DeletePromoter(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Promoter {
    fn ensure_live(&self, tenant_id: TenantId, promoter_id: PromoterId) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != promoter_id {
            return Err(DomainError::invariant("promoter_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePromoter) -> Result<Vec<PromoterEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("promoter already exists"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("promoter name cannot be empty"));
        }

        Ok(vec![PromoterEvent::PromoterCreated(PromoterCreated {
            tenant_id: cmd.tenant_id,
            promoter_id: cmd.promoter_id,
            name: name.to_string(),
            contact: cmd.contact.normalized(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdatePromoter) -> Result<Vec<PromoterEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.promoter_id)?;

        let name = match &cmd.name {
            Some(n) => n.trim().to_string(),
            None => self.name.clone(),
        };
        if name.is_empty() {
            return Err(DomainError::validation("promoter name cannot be empty"));
        }
        let contact = match &cmd.contact {
            Some(c) => c.normalized(),
            None => self.contact.clone(),
        };

        if name == self.name && contact == self.contact {
            return Ok(vec![]);
        }

        Ok(vec![PromoterEvent::PromoterUpdated(PromoterUpdated {
            tenant_id: cmd.tenant_id,
            promoter_id: cmd.promoter_id,
            name,
            contact,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_active(&self, cmd: &SetPromoterActive) -> Result<Vec<PromoterEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.promoter_id)?;
        if self.active == cmd.active {
            return Ok(vec![]);
        }

        Ok(vec![PromoterEvent::PromoterActivationChanged(
            PromoterActivationChanged {
                tenant_id: cmd.tenant_id,
                promoter_id: cmd.promoter_id,
                active: cmd.active,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_delete(&self, cmd: &DeletePromoter) -> Result<Vec<PromoterEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.promoter_id)?;

        Ok(vec![PromoterEvent::PromoterDeleted(PromoterDeleted {
            tenant_id: cmd.tenant_id,
            promoter_id: cmd.promoter_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
