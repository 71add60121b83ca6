//! Odoo search domains.
//!
//! A domain is a list in Polish notation: leaves `[field, operator, value]`
//! combined with the `"&"`, `"|"` and `"!"` operators. Consecutive leaves
//! are implicitly AND-ed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An Odoo search domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(Vec<Value>);

impl Domain {
    /// The empty domain (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A domain with a single leaf.
    #[must_use]
    pub fn leaf(field: &str, operator: &str, value: impl Into<Value>) -> Self {
        let mut domain = Self::new();
        domain.push(field, operator, value);
        domain
    }

    /// Builder-style variant of [`Domain::push`].
    #[must_use]
    pub fn and(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.push(field, operator, value);
        self
    }

    /// Append a leaf (implicit AND with what is already there).
    pub fn push(&mut self, field: &str, operator: &str, value: impl Into<Value>) {
        self.0.push(Value::Array(vec![
            Value::String(field.to_string()),
            Value::String(operator.to_string()),
            value.into(),
        ]));
    }

    /// Append every term of another domain.
    pub fn extend(&mut self, other: &Domain) {
        self.0.extend(other.0.iter().cloned());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw terms.
    #[must_use]
    pub fn terms(&self) -> &[Value] {
        &self.0
    }

    /// Parse a domain from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a message if the text is not a JSON array of leaves and
    /// operators.
    pub fn parse(text: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| format!("invalid domain JSON: {e}"))?;
        Self::try_from(value)
    }
}

impl TryFrom<Value> for Domain {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Array(terms) = value else {
            return Err("domain must be a JSON array".to_string());
        };

        for (index, term) in terms.iter().enumerate() {
            match term {
                Value::String(op) if matches!(op.as_str(), "&" | "|" | "!") => {}
                Value::Array(leaf) if leaf.len() == 3 && leaf[0].is_string() && leaf[1].is_string() => {}
                _ => {
                    return Err(format!(
                        "invalid domain term at position {index}: expected [field, operator, value] or '&', '|', '!'"
                    ));
                }
            }
        }

        Ok(Self(terms))
    }
}
