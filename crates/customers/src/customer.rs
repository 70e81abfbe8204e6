use chrono::{DateTime, Utc};

use keystone_core::{DomainError, DomainResult, Entity};

keystone_core::uuid_newtype!(
    /// Customer identifier (write-store primary key).
    pub CustomerId,
    "CustomerId"
);

const MAX_NAME_LEN: usize = 200;

/// Write-side customer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    id: CustomerId,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Customer {
    /// Validate input and build a new customer.
    pub fn register(
        id: CustomerId,
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: normalize_name(name)?,
            email: normalize_email(email)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a customer from stored columns (no validation).
    pub fn restore(
        id: CustomerId,
        name: String,
        email: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            created_at,
            updated_at,
        }
    }

    pub fn rename(&mut self, name: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.name = normalize_name(name)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn change_email(&mut self, email: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.email = normalize_email(email)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn id(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for Customer {
    type Key = CustomerId;

    const COLLECTION: &'static str = "customers";

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

fn normalize_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("invalid email address: {email}")));
    }
    Ok(email.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn register_normalizes_input() {
        let c = Customer::register(CustomerId::new(), "  Ada Lovelace ", "Ada@Example.COM", now())
            .unwrap();
        assert_eq!(c.name(), "Ada Lovelace");
        assert_eq!(c.email(), "ada@example.com");
        assert_eq!(c.created_at(), c.updated_at());
    }

    #[test]
    fn register_rejects_blank_name() {
        let err = Customer::register(CustomerId::new(), "   ", "a@b.c", now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn register_rejects_bad_email() {
        for email in ["", "no-at-sign", "@example.com", "ada@", "a@b@c", "a b@c.d"] {
            let err = Customer::register(CustomerId::new(), "Ada", email, now()).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "accepted {email:?}");
        }
    }

    #[test]
    fn rename_keeps_previous_name_on_failure() {
        let mut c = Customer::register(CustomerId::new(), "Ada", "ada@example.com", now()).unwrap();
        assert!(c.rename("", now()).is_err());
        assert_eq!(c.name(), "Ada");
    }

    #[test]
    fn key_is_the_customer_id() {
        let id = CustomerId::new();
        let c = Customer::register(id, "Ada", "ada@example.com", now()).unwrap();
        assert_eq!(*c.key(), id);
        assert_eq!(Customer::COLLECTION, "customers");
        assert_eq!(Customer::KEY_FIELD, "id");
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: surrounding whitespace never survives registration.
            #[test]
            fn names_are_trimmed(
                name in "[A-Za-z][A-Za-z0-9 ]{0,50}",
                pad_left in " {0,5}",
                pad_right in " {0,5}",
            ) {
                let padded = format!("{pad_left}{name}{pad_right}");
                let c = Customer::register(CustomerId::new(), &padded, "x@y.z", Utc::now()).unwrap();
                prop_assert_eq!(c.name(), name.trim());
            }

            /// Property: stored emails are lowercase.
            #[test]
            fn emails_are_lowercased(local in "[A-Za-z0-9.]{1,20}", domain in "[A-Za-z0-9]{1,20}\\.[a-z]{2,4}") {
                let email = format!("{local}@{domain}");
                let c = Customer::register(CustomerId::new(), "Ada", &email, Utc::now()).unwrap();
                prop_assert_eq!(c.email(), email.to_ascii_lowercase());
            }
        }
    }
}
