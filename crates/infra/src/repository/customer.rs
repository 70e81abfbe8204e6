//! Row mapping for the `customers` table.

use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use keystone_customers::{Customer, CustomerId};

use super::{PgEntity, SqlValue};

impl PgEntity for Customer {
    const COLUMNS: &'static [&'static str] = &["id", "name", "email", "created_at", "updated_at"];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(*self.id().as_uuid()),
            SqlValue::Text(self.name().to_string()),
            SqlValue::Text(self.email().to_string()),
            SqlValue::Timestamp(self.created_at()),
            SqlValue::Timestamp(self.updated_at()),
        ]
    }

    fn key_value(key: &CustomerId) -> SqlValue {
        SqlValue::Uuid(*key.as_uuid())
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let id: Uuid = row.try_get("id")?;
        Ok(Customer::restore(
            CustomerId::from_uuid(id),
            row.try_get("name")?,
            row.try_get("email")?,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }
}
