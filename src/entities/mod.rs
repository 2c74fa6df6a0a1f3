//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables. Each entity has a Model
//! struct for data and an Entity struct for operations.

pub mod order;
pub mod system_state;
pub mod unpaid_archive;

// Re-export specific types to avoid conflicts
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use unpaid_archive::{
    Column as UnpaidArchiveColumn, Entity as UnpaidArchive, Model as UnpaidArchiveModel,
};
