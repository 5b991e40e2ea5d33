//! Deterministic keyword classifier and free-text extraction helpers.
//!
//! This is the always-available fallback behind the LLM classifier: pure,
//! total, and cheap. Every function returns a valid value for any input.

use chrono::{Duration, NaiveDate};

use crate::orchestrator::state::{CounterpartIntent, RefusalKind};

const AGREEMENT_PHRASES: &[&str] = &[
    "we accept",
    "i accept",
    "sounds good",
    "agreed",
    "we have a deal",
    "it's a deal",
    "its a deal",
    "let's do it",
    "lets do it",
    "works for us",
    "works for me",
];

const REFUSAL_PHRASES: &[&str] = &[
    "can't share",
    "cannot share",
    "can't give",
    "cannot give",
    "won't share",
    "will not share",
    "not able to",
    "unable to",
    "rather not",
    "prefer not",
    "no comment",
    "not yet",
    "not at this time",
    "already sent",
    "already shared",
    "already gave",
    "don't understand",
    "do not understand",
];

const GREETING_PHRASES: &[&str] =
    &["hello", "hi ", "hi,", "hi!", "hey", "good morning", "good afternoon", "good evening"];

const SMALL_TALK_PHRASES: &[&str] = &[
    "how are you",
    "how's it going",
    "hows it going",
    "hope you are",
    "hope you're",
    "nice weather",
    "the weather",
    "weekend",
    "nice to meet",
    "thanks for",
    "thank you",
];

const NEGOTIATE_KEYWORDS: &[&str] =
    &["price", "discount", "cheaper", "terms", "cost", "rate", "budget", "quote"];

/// Coarse counterpart intent. Checks are ordered so that substantive signals
/// (agreement, refusal, a concrete offer) win over pleasantries.
pub fn classify_intent(text: &str) -> CounterpartIntent {
    let normalized = normalize(text);
    if normalized.trim().is_empty() {
        return CounterpartIntent::Negotiate;
    }

    if contains_any(&normalized, AGREEMENT_PHRASES) {
        return CounterpartIntent::Agree;
    }
    if contains_any(&normalized, REFUSAL_PHRASES) {
        return CounterpartIntent::Refusal;
    }
    if extract_price(text).is_some() || extract_payment_terms(text).is_some() {
        return CounterpartIntent::ProvideOffer;
    }
    if GREETING_PHRASES
        .iter()
        .any(|phrase| normalized.starts_with(phrase) || normalized == phrase.trim())
    {
        return CounterpartIntent::Greeting;
    }
    if normalized.contains('?') {
        return CounterpartIntent::AskQuestion;
    }
    if contains_any(&normalized, SMALL_TALK_PHRASES) {
        return CounterpartIntent::SmallTalk;
    }
    if contains_any(&normalized, NEGOTIATE_KEYWORDS) {
        return CounterpartIntent::Negotiate;
    }
    CounterpartIntent::Negotiate
}

/// Refusal subtype for an already refusal-classified message.
pub fn classify_refusal(text: &str) -> RefusalKind {
    let normalized = normalize(text);
    if normalized.contains("already") {
        return RefusalKind::AlreadyShared;
    }
    if contains_any(&normalized, &["later", "not yet", "next week", "tomorrow", "get back to you"])
    {
        return RefusalKind::Later;
    }
    if contains_any(&normalized, &["confus", "understand", "what do you mean", "unclear"]) {
        return RefusalKind::Confused;
    }
    RefusalKind::No
}

/// Best-effort price in whole currency units from free text.
pub fn extract_price(text: &str) -> Option<f64> {
    let tokens = tokenize(text);
    let price_context = ["price", "cost", "costs", "offer", "quote", "at", "is", "for", "usd"];
    for (index, token) in tokens.iter().enumerate() {
        let in_context = index > 0 && price_context.contains(&tokens[index - 1].as_str());
        if token.starts_with('$') || (in_context && token.chars().next().is_some_and(|c| c.is_ascii_digit())) {
            if let Some(amount) = parse_money_token(token) {
                return Some(amount);
            }
        }
    }
    None
}

/// Best-effort payment-terms phrase, normalized to "Net N" where possible.
pub fn extract_payment_terms(text: &str) -> Option<String> {
    let normalized = normalize(text);
    if normalized.contains("due on receipt") || normalized.contains("cash on delivery") {
        return Some("Net 0".to_string());
    }

    let tokens = tokenize(&normalized);
    for (index, token) in tokens.iter().enumerate() {
        if let Some(rest) = token.strip_prefix("net") {
            // "net30" in one token, or "net 30" across two
            if let Ok(days) = rest.parse::<u32>() {
                return Some(format!("Net {days}"));
            }
            if let Some(days) = tokens.get(index + 1).and_then(|next| next.parse::<u32>().ok()) {
                return Some(format!("Net {days}"));
            }
        }
        if token.starts_with("day") {
            if let Some(days) = index
                .checked_sub(1)
                .and_then(|previous| tokens[previous].parse::<u32>().ok())
            {
                return Some(format!("Net {days}"));
            }
        }
    }
    None
}

/// Best-effort delivery date: ISO dates, or relative "in N days/weeks".
pub fn extract_delivery_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    for token in text.split_whitespace() {
        let trimmed = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '-');
        if trimmed.len() == 10 {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                return Some(date);
            }
        }
    }

    let tokens = tokenize(&normalize(text));
    for window in tokens.windows(3) {
        let [lead, value, unit] = window else { continue };
        if lead != "in" && lead != "within" {
            continue;
        }
        let Ok(count) = value.parse::<i64>() else { continue };
        if unit.starts_with("day") {
            return today.checked_add_signed(Duration::days(count));
        }
        if unit.starts_with("week") {
            return today.checked_add_signed(Duration::weeks(count));
        }
    }
    None
}

fn normalize(text: &str) -> String {
    text.to_ascii_lowercase()
}

fn contains_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| normalized.contains(phrase))
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() || matches!(character, '$' | '.' | ',') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized
        .split_whitespace()
        .map(|token| token.trim_end_matches([',', '.']).to_ascii_lowercase())
        .collect()
}

fn parse_money_token(token: &str) -> Option<f64> {
    let trimmed = token.trim_start_matches('$').replace(',', "");
    if trimmed.is_empty() {
        return None;
    }
    let (number_part, multiplier) = if let Some(prefix) = trimmed.strip_suffix('k') {
        (prefix, 1_000.0)
    } else if let Some(prefix) = trimmed.strip_suffix('m') {
        (prefix, 1_000_000.0)
    } else {
        (trimmed.as_str(), 1.0)
    };
    let amount = number_part.parse::<f64>().ok()?;
    if amount <= 0.0 {
        return None;
    }
    Some(amount * multiplier)
}
