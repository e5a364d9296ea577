//! Inventory domain module (event-sourced).
//!
//! An [`InventoryItem`] owns its sizes and every unit counter on them. Stock
//! movements (take-out, return, burn, restock) are events on the item stream,
//! and that stream doubles as the transaction log: see [`StockMovement`].
//!
//! Per size, after every event:
//! - `original == available + in_circulation + burned`
//! - `in_circulation == sum of promoter holdings`
//!
//! Per item, the original units summed over all sizes never exceed
//! [`MAX_UNITS`].

pub mod item;
pub mod quantity;
pub mod size;
pub mod transaction;

pub use item::{
    AddSize, BurnStock, CreateItem, DeleteItem, InventoryCommand, InventoryEvent, InventoryItem,
    InventoryItemId, ItemActivationChanged, ItemCreated, ItemDeleted, ItemDetailsUpdated,
    ItemLinkedToBrand, ItemUnlinkedFromBrand, LinkBrand, Restock, ReturnStock, SetItemActive,
    SizeAdded, StockBurned, StockRestocked, StockReturned, StockTakenOut, TakeOut, UnlinkBrand,
    UpdateItemDetails,
};
pub use quantity::{MAX_UNITS, Quantity};
pub use size::{DEFAULT_SIZE_LABEL, ItemSize, SizeId, SizeSpec};
pub use transaction::{StockMovement, TransactionType};

/// Aggregate type tag used for item streams in the event store.
pub const AGGREGATE_TYPE: &str = "inventory.item";
