//! Message templates for campaigns and order recaps.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::models::order::Order;
use crate::models::product::format_price;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid placeholder regex");
}

/// Values available to a campaign template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub name: Option<&'a str>,
    pub phone: &'a str,
}

/// Replaces `{{name}}` and `{{phone}}`. Unknown placeholders are left as written.
pub fn render(template: &str, vars: TemplateVars<'_>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "name" => vars.name.unwrap_or("").to_string(),
            "phone" => vars.phone.to_string(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Customer-facing recap of a freshly created order.
pub fn order_summary(order: &Order, language: &str) -> String {
    let english = language.eq_ignore_ascii_case("en");
    let mut out = if english {
        format!("Thank you! Order {} received:\n", order.reference())
    } else {
        format!("Merci ! Commande {} bien reçue :\n", order.reference())
    };

    for item in &order.items {
        out.push_str(&format!(
            "- {} x {} : {}\n",
            item.quantity,
            item.product_name,
            format_price(item.line_total_cents(), &order.currency)
        ));
    }

    if english {
        out.push_str(&format!(
            "Total: {}\nWe will confirm shortly.",
            format_price(order.total_cents, &order.currency)
        ));
    } else {
        out.push_str(&format!(
            "Total : {}\nNous vous confirmons très vite.",
            format_price(order.total_cents, &order.currency)
        ));
    }

    out
}

/// Notice sent when the business validates an order.
pub fn order_validated_notice(order: &Order, language: &str) -> String {
    if language.eq_ignore_ascii_case("en") {
        format!("Your order {} is confirmed.", order.reference())
    } else {
        format!("Votre commande {} est confirmée.", order.reference())
    }
}

/// Notice sent when the business rejects an order.
pub fn order_rejected_notice(order: &Order, reason: Option<&str>, language: &str) -> String {
    let english = language.eq_ignore_ascii_case("en");
    let mut out = if english {
        format!("Sorry, your order {} could not be accepted.", order.reference())
    } else {
        format!(
            "Désolé, votre commande {} n'a pas pu être acceptée.",
            order.reference()
        )
    };
    if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
        out.push(' ');
        out.push_str(reason);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::{OrderItem, OrderStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn vars<'a>(name: Option<&'a str>, phone: &'a str) -> TemplateVars<'a> {
        TemplateVars { name, phone }
    }

    #[test]
    fn test_render_known_placeholders() {
        let out = render(
            "Bonjour {{name}}, offre pour le {{ phone }} !",
            vars(Some("Awa"), "+221770000000"),
        );
        assert_eq!(out, "Bonjour Awa, offre pour le +221770000000 !");
    }

    #[test]
    fn test_render_missing_name_is_empty() {
        assert_eq!(render("Bonjour {{name}}!", vars(None, "+33600000000")), "Bonjour !");
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        assert_eq!(
            render("Code {{promo}} {{name}", vars(Some("Awa"), "+33600000000")),
            "Code {{promo}} {{name}"
        );
    }

    fn order() -> Order {
        let items = vec![
            OrderItem {
                product_id: Uuid::new_v4(),
                product_name: "Savon".to_string(),
                quantity: 2,
                unit_price_cents: 1500,
            },
            OrderItem {
                product_id: Uuid::new_v4(),
                product_name: "Miel".to_string(),
                quantity: 1,
                unit_price_cents: 4000,
            },
        ];
        Order {
            order_id: Uuid::parse_str("0a1b2c3d-0000-4000-8000-000000000000").unwrap(),
            user_id: Uuid::new_v4(),
            conversation_id: None,
            contact_phone: "+221770000000".to_string(),
            status: OrderStatus::Pending,
            total_cents: crate::models::order::total_cents(&items),
            currency: "XOF".to_string(),
            items,
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            validated_at: None,
        }
    }

    #[test]
    fn test_order_summary_french() {
        let summary = order_summary(&order(), "fr");
        assert!(summary.starts_with("Merci ! Commande 0A1B2C3D"));
        assert!(summary.contains("- 2 x Savon : 30.00 XOF"));
        assert!(summary.contains("Total : 70.00 XOF"));
    }

    #[test]
    fn test_order_summary_english() {
        let summary = order_summary(&order(), "EN");
        assert!(summary.contains("Order 0A1B2C3D received"));
        assert!(summary.contains("Total: 70.00 XOF"));
    }

    #[test]
    fn test_rejected_notice_appends_reason() {
        let notice = order_rejected_notice(&order(), Some(" Rupture de stock "), "fr");
        assert!(notice.ends_with("acceptée. Rupture de stock"));
    }
}
