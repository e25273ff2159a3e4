//! Common validation utilities.

use validator::ValidationError;

/// Minimum digits in an international phone number (without the `+`).
const MIN_PHONE_DIGITS: usize = 8;

/// Maximum digits allowed by E.164.
const MAX_PHONE_DIGITS: usize = 15;

/// Maximum length of a campaign or reply template.
pub const MAX_TEMPLATE_LENGTH: usize = 4096;

/// Normalizes a WhatsApp phone number into `+<digits>` form.
///
/// Spaces, dashes, dots and parentheses are dropped and a leading `00` is read as
/// the international prefix. WhatsApp ids such as `221770000000@s.whatsapp.net`
/// lose their suffix.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let raw = raw.split('@').next().unwrap_or_default().trim();
    let mut digits = String::with_capacity(raw.len());

    for (i, c) in raw.chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            '+' if i == 0 => {}
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(phone_error()),
        }
    }

    let digits = digits.strip_prefix("00").unwrap_or(&digits).to_string();

    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(phone_error());
    }

    Ok(format!("+{}", digits))
}

/// Validator-compatible phone check.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    normalize_phone(phone).map(|_| ())
}

/// Validates a message template (non-blank, bounded length).
pub fn validate_template(template: &str) -> Result<(), ValidationError> {
    if template.trim().is_empty() {
        let mut err = ValidationError::new("template_blank");
        err.message = Some("Message template cannot be empty".into());
        return Err(err);
    }
    if template.chars().count() > MAX_TEMPLATE_LENGTH {
        let mut err = ValidationError::new("template_length");
        err.message = Some(
            format!(
                "Message template cannot exceed {} characters",
                MAX_TEMPLATE_LENGTH
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

fn phone_error() -> ValidationError {
    let mut err = ValidationError::new("phone_format");
    err.message = Some("Phone number must be in international format".into());
    err
}
