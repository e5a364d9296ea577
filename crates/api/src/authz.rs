//! Permission guard for mutations, checked before anything is dispatched.
//! Reads only need a valid token.

use promostock_auth::{
    AuthzError, Permission, Principal, TenantMembership, authorize, permissions_for_roles,
};

use crate::context::{PrincipalContext, TenantContext};

pub fn require(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &Permission,
) -> Result<(), AuthzError> {
    let principal = resolve(tenant, principal);
    authorize(&principal, permission)
}

fn resolve(tenant: &TenantContext, principal: &PrincipalContext) -> Principal {
    Principal {
        user_id: principal.user_id(),
        active_tenant_id: tenant.tenant_id(),
        membership: TenantMembership {
            tenant_id: tenant.tenant_id(),
            roles: principal.roles().to_vec(),
            permissions: permissions_for_roles(principal.roles()),
        },
    }
}
