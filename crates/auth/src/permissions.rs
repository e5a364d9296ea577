use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, e.g. `"stock.move"`. `"*"` allows everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ALL: Permission = Permission(Cow::Borrowed("*"));
    pub const BRANDS_MANAGE: Permission = Permission(Cow::Borrowed("brands.manage"));
    pub const ITEMS_MANAGE: Permission = Permission(Cow::Borrowed("items.manage"));
    pub const PROMOTERS_MANAGE: Permission = Permission(Cow::Borrowed("promoters.manage"));
    pub const STOCK_MOVE: Permission = Permission(Cow::Borrowed("stock.move"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
