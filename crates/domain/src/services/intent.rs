//! Keyword-based intent classification for inbound customer messages.
//!
//! Precedence is Refusal > Order > Question > Other. Order vocabulary inside a
//! leading interrogative clause ("est-ce que je peux commander ?") does not
//! count; an order made after that clause ("Comment ça va ? Je veux 2 savons")
//! does.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use super::text::{contains_phrase, normalize, normalize_all, starts_with_phrase};

/// What the customer is trying to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageIntent {
    Refusal,
    Order,
    Question,
    Other,
}

impl MessageIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageIntent::Refusal => "refusal",
            MessageIntent::Order => "order",
            MessageIntent::Question => "question",
            MessageIntent::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "refusal" => Some(MessageIntent::Refusal),
            "order" => Some(MessageIntent::Order),
            "question" => Some(MessageIntent::Question),
            "other" => Some(MessageIntent::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const REFUSAL_PHRASES: &[&str] = &[
    "non merci",
    "pas interesse",
    "pas interessee",
    "pas interessé",
    "ça ne m'intéresse pas",
    "ça m'intéresse pas",
    "je ne suis pas intéressé",
    "je ne veux pas",
    "je veux pas",
    "je n'en veux pas",
    "j'en veux pas",
    "pas besoin",
    "pas pour le moment",
    "pas maintenant",
    "laisse tomber",
    "laissez tomber",
    "annule",
    "annuler",
    "annulez",
    "arrêtez",
    "désabonner",
    "no thanks",
    "no thank you",
    "not interested",
    "i don't want",
    "i do not want",
    "cancel",
    "unsubscribe",
    "never mind",
];

/// Bare negations only count as the first word of the message.
const LEADING_NEGATIONS: &[&str] = &["non", "no", "nope", "nan", "nah", "stop"];

const ORDER_PHRASES: &[&str] = &[
    "je veux",
    "je voudrais",
    "j'aimerais",
    "je souhaite",
    "je commande",
    "commander",
    "acheter",
    "j'achète",
    "je prends",
    "je vais prendre",
    "réserver",
    "livrez",
    "livrez-moi",
    "envoyez-moi",
    "mettez-moi",
    "i want",
    "i would like",
    "i'd like",
    "order",
    "buy",
    "purchase",
    "i'll take",
    "i will take",
    "send me",
];

const INTERROGATIVE_LEADS: &[&str] = &[
    "combien",
    "c'est combien",
    "quel",
    "quelle",
    "quels",
    "quelles",
    "comment",
    "pourquoi",
    "quand",
    "où",
    "est-ce que",
    "est-ce qu'",
    "qu'est-ce",
    "avez-vous",
    "how",
    "what",
    "which",
    "when",
    "where",
    "why",
    "do you",
    "does",
    "is there",
    "are there",
    "can i",
    "could",
];

lazy_static! {
    static ref REFUSALS: Vec<String> = normalize_all(REFUSAL_PHRASES);
    static ref NEGATIONS: Vec<String> = normalize_all(LEADING_NEGATIONS);
    static ref ORDERS: Vec<String> = normalize_all(ORDER_PHRASES);
    static ref INTERROGATIVES: Vec<String> = normalize_all(INTERROGATIVE_LEADS);
}

/// Classifies a raw customer message.
pub fn classify(text: &str) -> MessageIntent {
    let (lead, rest) = split_leading_clause(text);
    classify_clauses(&normalize(lead), &normalize(rest))
}

/// Classifies text that has already gone through [`normalize`]. The leading
/// clause ends at the first `?`, the only sentence mark normalization keeps.
pub fn classify_normalized(normalized: &str) -> MessageIntent {
    match normalized.find('?') {
        Some(end) => classify_clauses(&normalized[..=end], normalized[end + 1..].trim()),
        None => classify_clauses(normalized, ""),
    }
}

fn classify_clauses(lead: &str, rest: &str) -> MessageIntent {
    let whole = match (lead.is_empty(), rest.is_empty()) {
        (_, true) => lead.to_string(),
        (true, false) => rest.to_string(),
        (false, false) => format!("{lead} {rest}"),
    };
    if whole.is_empty() {
        return MessageIntent::Other;
    }

    if is_refusal(&whole) {
        return MessageIntent::Refusal;
    }

    let leading_interrogative = INTERROGATIVES.iter().any(|p| starts_with_phrase(&whole, p));
    let question = leading_interrogative || contains_phrase(&whole, "?");
    let order_scope = if leading_interrogative { rest } else { whole.as_str() };
    let order = ORDERS.iter().any(|p| contains_phrase(order_scope, p));

    if order {
        MessageIntent::Order
    } else if question {
        MessageIntent::Question
    } else {
        MessageIntent::Other
    }
}

/// Splits raw text after its first sentence: at `?`, `!`, a line break, or a
/// `.` followed by whitespace.
fn split_leading_clause(text: &str) -> (&str, &str) {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let end = match c {
            '?' | '!' | '\n' => true,
            '.' => chars.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if end {
            let at = i + c.len_utf8();
            return (&text[..at], &text[at..]);
        }
    }
    (text, "")
}

fn is_refusal(normalized: &str) -> bool {
    NEGATIONS.iter().any(|n| starts_with_phrase(normalized, n))
        || REFUSALS.iter().any(|p| contains_phrase(normalized, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusals() {
        for text in [
            "Non merci",
            "non",
            "NON!",
            "Ça ne m'intéresse pas",
            "ca m interesse pas du tout",
            "Je ne veux pas commander",
            "Pas besoin pour l'instant",
            "Annulez ma commande svp",
            "No thanks",
            "not interested, sorry",
            "stop",
        ] {
            assert_eq!(classify(text), MessageIntent::Refusal, "{text}");
        }
    }

    #[test]
    fn test_negation_inside_sentence_is_not_refusal() {
        assert_eq!(
            classify("je prends 2 savons, no problem"),
            MessageIntent::Order
        );
        assert_eq!(classify("C'est nonchalant"), MessageIntent::Other);
    }

    #[test]
    fn test_orders() {
        for text in [
            "Je veux 2 savons",
            "je voudrais commander du beurre de karité",
            "J’achète 3 bouteilles",
            "I'd like two soaps",
            "je prends le pack",
            "Je veux 2 savons, vous livrez à Dakar ?",
        ] {
            assert_eq!(classify(text), MessageIntent::Order, "{text}");
        }
    }

    #[test]
    fn test_questions() {
        for text in [
            "Combien coûte le savon ?",
            "c'est combien",
            "Est-ce que je peux commander ?",
            "Où est ma commande ?",
            "Vous êtes ouverts le dimanche?",
            "How much is the soap",
            "do you deliver to Thies",
        ] {
            assert_eq!(classify(text), MessageIntent::Question, "{text}");
        }
    }

    #[test]
    fn test_order_after_leading_question_counts() {
        assert_eq!(classify("Comment ça va ? Je veux 2 savons"), MessageIntent::Order);
        assert_eq!(classify("Quel beau savon ! Je prends 3 savons"), MessageIntent::Order);
        assert_eq!(
            classify("Est-ce que vous livrez à Abidjan. Je voudrais 2 pagnes"),
            MessageIntent::Order
        );
        assert_eq!(
            classify("Est-ce que je peux commander ? Merci"),
            MessageIntent::Question
        );
    }

    #[test]
    fn test_order_noun_alone_is_not_an_order() {
        assert_eq!(classify("J'ai bien reçu ma commande, merci"), MessageIntent::Other);
        assert_eq!(
            classify("Ma commande n'est toujours pas arrivée"),
            MessageIntent::Other
        );
        assert_eq!(classify("Je commande 2 savons"), MessageIntent::Order);
    }

    #[test]
    fn test_classify_normalized_scopes_leading_question() {
        assert_eq!(
            classify_normalized(&normalize("Comment ça va ? Je veux 2 savons")),
            MessageIntent::Order
        );
        assert_eq!(
            classify_normalized(&normalize("est-ce que je peux commander ?")),
            MessageIntent::Question
        );
    }

    #[test]
    fn test_other() {
        assert_eq!(classify("Bonjour"), MessageIntent::Other);
        assert_eq!(classify("Merci beaucoup"), MessageIntent::Other);
        assert_eq!(classify(""), MessageIntent::Other);
        assert_eq!(classify("   😀  "), MessageIntent::Other);
    }

    #[test]
    fn test_refusal_beats_order_and_question() {
        assert_eq!(
            classify("Non, je ne veux pas acheter, c'est combien déjà ?"),
            MessageIntent::Refusal
        );
    }

    #[test]
    fn test_intent_parse_roundtrip() {
        for intent in [
            MessageIntent::Refusal,
            MessageIntent::Order,
            MessageIntent::Question,
            MessageIntent::Other,
        ] {
            assert_eq!(MessageIntent::parse(intent.as_str()), Some(intent));
        }
        assert_eq!(MessageIntent::parse("greeting"), None);
    }
}
