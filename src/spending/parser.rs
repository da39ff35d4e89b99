//! Free-text spending parsers.
//!
//! Two input shapes end up as spendings:
//! - `"12.5 Coffee"` typed into the bot or the Mini App quick-add box;
//! - forwarded bank notifications, three lines with the amount on the
//!   second line (`Kwota 87,19 PLN`) and the merchant on the third.
//!
//! Comma decimal separators are accepted and normalized to a dot at this
//! boundary. That is a locale policy, nothing more: some banks and most
//! Polish keyboards emit `87,19`, and rejecting those here just loses the
//! record.

use once_cell::sync::Lazy;
use regex::Regex;

/// Amount line of a forwarded bank notification, e.g. "Kwota 87,19 PLN".
static AMOUNT_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // literal pattern, covered by tests
    Regex::new(r"(?i)Kwota\s+(\d+[,.]\d{1,2})").unwrap()
});

/// A successfully parsed spending candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSpending {
    pub amount: f64,
    pub name: String,
}

/// Parse an "amount name" message, e.g. `"12.5 Coffee"` or `"12,5 Coffee"`.
///
/// The first whitespace-separated token must be a positive number; the
/// rest of the line becomes the spending name. Returns `None` when either
/// part is missing or invalid.
pub fn parse_spending_text(text: &str) -> Option<ParsedSpending> {
    let mut tokens = text.trim().split_whitespace();
    let amount_token = tokens.next()?;
    let amount = parse_amount(amount_token)?;

    let name = tokens.collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return None;
    }

    Some(ParsedSpending { amount, name })
}

/// Parse a forwarded bank notification.
///
/// Accepts literal `%0A` as a newline (the forwarding automation passes
/// the message through a URL). Amount comes from the second non-empty
/// line, name from the third; anything else is `None`.
pub fn parse_forwarded_transaction(message: &str) -> Option<ParsedSpending> {
    let normalized = message.replace("%0A", "\n");
    let lines: Vec<&str> = normalized
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let amount_line = lines.get(1)?;
    let captures = AMOUNT_LINE_REGEX.captures(amount_line)?;
    let amount = parse_amount(captures.get(1)?.as_str())?;

    let name = lines.get(2)?.to_string();
    if name.is_empty() {
        return None;
    }

    Some(ParsedSpending { amount, name })
}

/// Parse a decimal amount, normalizing a comma separator to a dot.
fn parse_amount(token: &str) -> Option<f64> {
    let normalized = token.replace(',', ".");
    let amount: f64 = normalized.parse().ok()?;
    if amount.is_finite() && amount > 0.0 {
        Some(amount)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_amount_and_multiword_name() {
        let parsed = parse_spending_text("12.5 Coffee with friends").unwrap();
        assert_eq!(parsed.amount, 12.5);
        assert_eq!(parsed.name, "Coffee with friends");
    }

    #[test]
    fn comma_decimal_is_normalized() {
        let parsed = parse_spending_text("12,5 Coffee").unwrap();
        assert_eq!(parsed.amount, 12.5);
    }

    #[test]
    fn integer_amounts_work() {
        assert_eq!(parse_spending_text("40 Taxi").unwrap().amount, 40.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_spending_text("").is_none());
        assert!(parse_spending_text("Coffee").is_none());
        assert!(parse_spending_text("12.5").is_none());
        assert!(parse_spending_text("-5 Refund").is_none());
        assert!(parse_spending_text("0 Nothing").is_none());
        assert!(parse_spending_text("NaN Coffee").is_none());
    }

    #[test]
    fn parses_forwarded_bank_message() {
        let msg = "Płatność kartą\nKwota 87,19 PLN\nBiedronka Warszawa";
        let parsed = parse_forwarded_transaction(msg).unwrap();
        assert_eq!(parsed.amount, 87.19);
        assert_eq!(parsed.name, "Biedronka Warszawa");
    }

    #[test]
    fn forwarded_message_accepts_encoded_newlines() {
        let msg = "Płatność kartą%0AKwota 12.30 PLN%0AZabka";
        let parsed = parse_forwarded_transaction(msg).unwrap();
        assert_eq!(parsed.amount, 12.30);
        assert_eq!(parsed.name, "Zabka");
    }

    #[test]
    fn forwarded_message_requires_all_three_lines() {
        assert!(parse_forwarded_transaction("Kwota 87,19 PLN").is_none());
        assert!(parse_forwarded_transaction("a\nKwota 87,19 PLN").is_none());
        assert!(parse_forwarded_transaction("a\nno amount here\nshop").is_none());
    }
}
