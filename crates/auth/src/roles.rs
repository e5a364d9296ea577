use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role name as carried in the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const EMPLOYEE: Role = Role(Cow::Borrowed("employee"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role policy: `admin` gets everything, `employee` may move stock.
/// Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r == &Role::ADMIN) {
        return vec![Permission::ALL];
    }

    let mut perms = Vec::new();
    if roles.iter().any(|r| r == &Role::EMPLOYEE) {
        perms.push(Permission::STOCK_MOVE);
    }
    perms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_policy() {
        assert_eq!(permissions_for_roles(&[Role::new("admin")]), vec![Permission::ALL]);
        assert_eq!(
            permissions_for_roles(&[Role::EMPLOYEE, Role::new("viewer")]),
            vec![Permission::STOCK_MOVE]
        );
        assert!(permissions_for_roles(&[Role::new("viewer")]).is_empty());
    }
}
