//! Customers: the write-side record served by the API and its read-side view.
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod customer;
pub mod view;

pub use customer::{Customer, CustomerId};
pub use view::{CUSTOMER_VIEWS, CustomerView, register_mappings};
