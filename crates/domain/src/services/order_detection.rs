//! Detects catalog products and quantities in an order message.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use super::text::{normalize, tokens};
use crate::models::Product;

pub const MAX_QUANTITY: i32 = 999;

/// A product the customer asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

struct Candidate {
    start: usize,
    len: usize,
    product_id: Uuid,
}

/// Finds the products of `catalog` mentioned in `text`.
///
/// Longer names win over names they contain ("huile de coco" beats "huile"),
/// repeated mentions are summed and the result follows order of first mention.
pub fn detect_items(text: &str, catalog: &[Product]) -> Vec<DetectedItem> {
    let normalized = normalize(text);
    let toks = tokens(&normalized);
    if toks.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for product in catalog.iter().filter(|p| p.active) {
        for variant in name_variants(&product.name) {
            let len = variant.len();
            if len == 0 || len > toks.len() {
                continue;
            }
            for start in 0..=toks.len() - len {
                if toks[start..start + len]
                    .iter()
                    .zip(&variant)
                    .all(|(a, b)| *a == b.as_str())
                {
                    candidates.push(Candidate {
                        start,
                        len,
                        product_id: product.product_id,
                    });
                }
            }
        }
    }

    candidates.sort_by(|a, b| b.len.cmp(&a.len).then(a.start.cmp(&b.start)));

    let mut taken = vec![false; toks.len()];
    let mut accepted: Vec<&Candidate> = Vec::new();
    for candidate in &candidates {
        let span = candidate.start..candidate.start + candidate.len;
        if taken[span.clone()].iter().any(|t| *t) {
            continue;
        }
        taken[span].iter_mut().for_each(|t| *t = true);
        accepted.push(candidate);
    }
    accepted.sort_by_key(|c| c.start);

    let mut items: Vec<DetectedItem> = Vec::new();
    for candidate in accepted {
        let quantity = quantity_at(&toks, candidate.start, candidate.start + candidate.len);
        match items.iter_mut().find(|i| i.product_id == candidate.product_id) {
            Some(item) => item.quantity = (item.quantity + quantity).min(MAX_QUANTITY),
            None => items.push(DetectedItem {
                product_id: candidate.product_id,
                quantity,
            }),
        }
    }

    items
}

/// Normalized token sequences a product name may appear as: the name itself
/// and the name with its last word pluralized or singularized.
fn name_variants(name: &str) -> Vec<Vec<String>> {
    let normalized = normalize(name);
    let base: Vec<String> = tokens(&normalized).into_iter().map(String::from).collect();
    let Some(last) = base.last() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut variants = Vec::new();
    let mut push = |v: Vec<String>| {
        if seen.insert(v.clone()) {
            variants.push(v);
        }
    };

    push(base.clone());

    let mut plural = base.clone();
    if let Some(word) = plural.last_mut() {
        if !word.ends_with('s') && !word.ends_with('x') {
            word.push('s');
            push(plural);
        }
    }

    if last.len() > 2 && last.ends_with('s') {
        let mut singular = base.clone();
        if let Some(word) = singular.last_mut() {
            word.pop();
            push(singular);
        }
    }

    variants
}

/// Quantity for a match spanning `start..end`: the token just before it, or an
/// `x3` style token just after it. Defaults to 1.
fn quantity_at(toks: &[&str], start: usize, end: usize) -> i32 {
    let before = start
        .checked_sub(1)
        .and_then(|i| toks.get(i))
        .and_then(|t| parse_quantity(t));
    let after = toks
        .get(end)
        .filter(|t| t.starts_with('x'))
        .and_then(|t| parse_quantity(t));

    before.or(after).unwrap_or(1)
}

/// Parses `3`, `x3`, `3x` or a French / English number word.
pub fn parse_quantity(token: &str) -> Option<i32> {
    let digits = token
        .strip_prefix('x')
        .or_else(|| token.strip_suffix('x'))
        .unwrap_or(token);

    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        let value = digits.parse::<i64>().unwrap_or(i64::from(MAX_QUANTITY));
        return Some(value.clamp(1, i64::from(MAX_QUANTITY)) as i32);
    }

    let value = match token {
        "un" | "une" | "one" => 1,
        "deux" | "two" => 2,
        "trois" | "three" => 3,
        "quatre" | "four" => 4,
        "cinq" | "five" => 5,
        "six" => 6,
        "sept" | "seven" => 7,
        "huit" | "eight" => 8,
        "neuf" | "nine" => 9,
        "dix" | "ten" => 10,
        "onze" | "eleven" => 11,
        "douze" | "twelve" => 12,
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(name: &str) -> Product {
        Product {
            product_id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            description: None,
            price_cents: 1000,
            currency: "XOF".to_string(),
            stock: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_detects_quantity_before_name() {
        let savon = product("Savon");
        let items = detect_items("Je veux 3 savons svp", &[savon.clone()]);
        assert_eq!(
            items,
            vec![DetectedItem {
                product_id: savon.product_id,
                quantity: 3
            }]
        );
    }

    #[test]
    fn test_number_words_and_multiplier_forms() {
        let savon = product("savon");
        let miel = product("Miel");
        let beurre = product("Beurre de karité");

        let items = detect_items(
            "deux savons, miel x4 et 2x beurre de karite",
            &[savon.clone(), miel.clone(), beurre.clone()],
        );

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].product_id, savon.product_id);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[1].product_id, miel.product_id);
        assert_eq!(items[1].quantity, 4);
        assert_eq!(items[2].product_id, beurre.product_id);
        assert_eq!(items[2].quantity, 2);
    }

    #[test]
    fn test_default_quantity_is_one() {
        let miel = product("miel");
        let items = detect_items("je prends du miel", &[miel]);
        assert_eq!(items[0].quantity, 1);
    }

    #[test]
    fn test_longest_name_wins() {
        let huile = product("Huile");
        let coco = product("Huile de coco");
        let items = detect_items("je veux 2 huile de coco", &[huile, coco.clone()]);
        assert_eq!(
            items,
            vec![DetectedItem {
                product_id: coco.product_id,
                quantity: 2
            }]
        );
    }

    #[test]
    fn test_repeated_mentions_are_summed() {
        let savon = product("savon");
        let items = detect_items("2 savons ... et encore 3 savons", &[savon]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
    }

    #[test]
    fn test_singular_name_of_plural_product() {
        let lunettes = product("Lunettes");
        let items = detect_items("une lunette noire", &[lunettes.clone()]);
        assert_eq!(items[0].product_id, lunettes.product_id);
    }

    #[test]
    fn test_inactive_products_and_partial_words_ignored() {
        let mut savon = product("savon");
        savon.active = false;
        let the = product("thé");
        let items = detect_items("3 savons et des théières", &[savon, the]);
        assert!(items.is_empty());
    }

    #[test]
    fn test_quantities_are_clamped() {
        let savon = product("savon");
        let items = detect_items("5000 savons", &[savon.clone()]);
        assert_eq!(items[0].quantity, MAX_QUANTITY);
        let items = detect_items("0 savon", &[savon]);
        assert_eq!(items[0].quantity, 1);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("12"), Some(12));
        assert_eq!(parse_quantity("x3"), Some(3));
        assert_eq!(parse_quantity("3x"), Some(3));
        assert_eq!(parse_quantity("douze"), Some(12));
        assert_eq!(parse_quantity("x"), None);
        assert_eq!(parse_quantity("savon"), None);
    }
}
