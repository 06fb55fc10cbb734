use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Customer Value Objects
// ============================================================================

/// Customer record as served by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// National ID wrapper whose `Display` only shows the last digits, for logs.
#[derive(Clone, Copy)]
pub struct NationalId<'a>(pub &'a str);

impl fmt::Display for NationalId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self
            .0
            .chars()
            .rev()
            .take(2)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "***{visible}")
    }
}

impl fmt::Debug for NationalId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_deserializes_partial_payload() {
        let customer: Customer = serde_json::from_str(r#"{"name": "Maria"}"#).unwrap();
        assert_eq!(customer.name, "Maria");
        assert_eq!(customer.cpf, None);
    }

    #[test]
    fn test_national_id_masked() {
        assert_eq!(NationalId("12345678900").to_string(), "***00");
        assert_eq!(NationalId("7").to_string(), "***7");
    }
}
