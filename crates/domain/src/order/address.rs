//! Address snapshots stored on orders.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// A complete postal address with contact phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub phone: String,
    pub line: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl Address {
    /// Fails on the first blank field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("name", &self.name),
            ("phone", &self.phone),
            ("line", &self.line),
            ("city", &self.city),
            ("state", &self.state),
            ("zip", &self.zip),
            ("country", &self.country),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(DomainError::MissingField { field: *field }),
            None => Ok(()),
        }
    }
}

/// Billing details where every field is optional.
///
/// Missing fields are taken from the shipping address one by one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

impl BillingInfo {
    pub fn resolve(self, shipping: &Address) -> Address {
        Address {
            name: self.name.unwrap_or_else(|| shipping.name.clone()),
            phone: self.phone.unwrap_or_else(|| shipping.phone.clone()),
            line: self.line.unwrap_or_else(|| shipping.line.clone()),
            city: self.city.unwrap_or_else(|| shipping.city.clone()),
            state: self.state.unwrap_or_else(|| shipping.state.clone()),
            zip: self.zip.unwrap_or_else(|| shipping.zip.clone()),
            country: self.country.unwrap_or_else(|| shipping.country.clone()),
        }
    }
}

impl From<Address> for BillingInfo {
    fn from(address: Address) -> Self {
        Self {
            name: Some(address.name),
            phone: Some(address.phone),
            line: Some(address.line),
            city: Some(address.city),
            state: Some(address.state),
            zip: Some(address.zip),
            country: Some(address.country),
        }
    }
}
