//! Product catalog model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A catalog entry the agent can sell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    /// Units on hand. `None` means the product is not stock-tracked.
    pub stock: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn has_stock_for(&self, quantity: i32) -> bool {
        match self.stock {
            Some(stock) => stock >= quantity,
            None => true,
        }
    }

    /// One catalog line for the assistant prompt.
    pub fn catalog_line(&self) -> String {
        let price = format_price(self.price_cents, &self.currency);
        match self.stock {
            Some(0) => format!("- {} : {} (rupture de stock)", self.name, price),
            _ => format!("- {} : {}", self.name, price),
        }
    }
}

/// Formats an amount in minor units, e.g. `1250 EUR` → `12.50 EUR`.
pub fn format_price(amount_cents: i64, currency: &str) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency)
}

fn default_currency() -> String {
    "XOF".to_string()
}

/// Request payload for creating a product.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_cents: i64,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    #[serde(default = "default_currency")]
    pub currency: String,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
}

/// Request payload for updating a product (partial update).
///
/// `stock` accepts `null` to stop tracking stock; omit the field to keep it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_cents: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub stock: Option<Option<i32>>,

    pub active: Option<bool>,
}

fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl UpdateProductRequest {
    /// Stock must not be negative when provided.
    pub fn stock_is_valid(&self) -> bool {
        !matches!(self.stock, Some(Some(s)) if s < 0)
    }
}

/// Query parameters for listing products.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProductsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: Option<i32>) -> Product {
        Product {
            product_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Savon karité".to_string(),
            description: None,
            price_cents: 150000,
            currency: "XOF".to_string(),
            stock,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_has_stock_for() {
        assert!(product(None).has_stock_for(1_000));
        assert!(product(Some(3)).has_stock_for(3));
        assert!(!product(Some(3)).has_stock_for(4));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1250, "EUR"), "12.50 EUR");
        assert_eq!(format_price(5, "EUR"), "0.05 EUR");
        assert_eq!(format_price(-300, "EUR"), "-3.00 EUR");
    }

    #[test]
    fn test_catalog_line_marks_out_of_stock() {
        assert!(product(Some(0)).catalog_line().contains("rupture"));
        assert!(!product(Some(2)).catalog_line().contains("rupture"));
    }

    #[test]
    fn test_update_request_distinguishes_null_stock() {
        let cleared: UpdateProductRequest = serde_json::from_str(r#"{"stock":null}"#).unwrap();
        assert_eq!(cleared.stock, Some(None));

        let untouched: UpdateProductRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(untouched.stock, None);

        let negative: UpdateProductRequest = serde_json::from_str(r#"{"stock":-1}"#).unwrap();
        assert!(!negative.stock_is_valid());
    }
}
