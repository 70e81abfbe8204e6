//! Read-side view of a customer, stored as a document and returned by the API.

use serde::{Deserialize, Serialize};

use keystone_mapping::{MapTarget, MapperConfiguration};

use crate::customer::Customer;

/// Document collection holding [`CustomerView`]s.
pub const CUSTOMER_VIEWS: &str = "customer_views";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub member_since: String,
    pub updated_at: String,
}

impl MapTarget for CustomerView {
    const MEMBERS: &'static [&'static str] = &["id", "name", "email", "member_since", "updated_at"];
}

/// Register the customer mapping rules.
pub fn register_mappings(config: &mut MapperConfiguration) {
    config
        .create_map::<Customer, CustomerView, _>(|c| CustomerView {
            id: c.id().to_string(),
            name: c.name().to_string(),
            email: c.email().to_string(),
            member_since: c.created_at().date_naive().to_string(),
            updated_at: c.updated_at().to_rfc3339(),
        })
        .map_members(&["id", "name", "email", "member_since", "updated_at"]);
}
