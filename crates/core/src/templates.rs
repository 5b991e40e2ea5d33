//! Pre-authored reply templates and deterministic selection.
//!
//! Selection hashes `deal_id + round + intent` so the same turn always picks
//! the same wording, while different turns rotate naturally through the set.
//! The tables are process-wide constants; nothing mutates them after startup.

use std::collections::HashMap;

use crate::orchestrator::state::ResponseIntent;

const GREET: &[&str] = &[
    "Hi {vendor}, thanks for getting back to us. Could you share your current pricing when you have a moment?",
    "Hello {vendor}! Good to hear from you. We'd love to see your latest offer for this order.",
    "Hi {vendor}, appreciate you reaching out. What price and payment terms can you offer us?",
    "Hello! Thanks for connecting. Could you send over your unit price and terms so we can get started?",
    "Hi {vendor}, great to be in touch. Whenever you're ready, please share your proposal for this order.",
    "Hello {vendor}, thanks for the note. To move quickly, could you share your pricing and payment terms?",
    "Hi there! Thanks for following up. We're ready to review your offer whenever you can send it.",
];

const ASK_FOR_OFFER: &[&str] = &[
    "Could you share your unit price and payment terms so we can evaluate the proposal?",
    "To keep things moving, please send over your current price and terms for this order.",
    "We'd like to review concrete numbers. What unit price and payment terms can you offer?",
    "Whenever you're ready, please share your pricing. Price and payment terms are all we need to proceed.",
    "Happy to continue once we have your numbers. Could you send your price and terms?",
    "Let's get to specifics. What's your unit price, and what payment terms would you propose?",
    "We're keen to make progress. Please share your offer, including price and payment terms.",
];

const ASK_CLARIFY: &[&str] = &[
    "Could you clarify {reason}? That would help us respond with specifics.",
    "To make sure we're aligned, could you spell out {reason}?",
    "We want to get this right. Can you confirm {reason}?",
    "Quick clarification: could you share {reason}? Then we can move forward.",
    "I may have missed something. Could you restate {reason}?",
    "Before we go further, could you help us with {reason}?",
    "Thanks for bearing with us. To proceed we still need {reason}.",
];

const COUNTER: &[&str] = &[
    "Thanks for the offer at {current_price}. We'd be comfortable at {target_price} on {payment_terms}. {reason}",
    "We appreciate the proposal. {current_price} is above where we need to land. Could you do {target_price} with {payment_terms}? {reason}",
    "Thanks for the numbers. Our position is {target_price} on {payment_terms}. {reason}",
    "We reviewed your offer of {current_price}. We can move forward at {target_price} with {payment_terms}. {reason}",
    "Appreciate you sharing pricing. {target_price} on {payment_terms} works on our side. Can you meet us there? {reason}",
    "Thanks. To close this out, we propose {target_price} with {payment_terms} rather than {current_price}. {reason}",
    "We value the partnership and want this to work. Our counter is {target_price} on {payment_terms}. {reason}",
];

const ACCEPT: &[&str] = &[
    "Great news. We're happy to accept {current_price} on {payment_terms}. We'll send the paperwork over shortly.",
    "That works for us! We accept your offer at {current_price} with {payment_terms}. Looking forward to working together.",
    "Excellent. We're pleased to confirm the deal at {current_price} on {payment_terms}.",
    "Perfect. We accept. {current_price} with {payment_terms} is agreed on our side.",
];

const ESCALATE: &[&str] = &[
    "Thanks for your time so far. I'm looping in our procurement lead to take this forward, since {reason}.",
    "I appreciate the discussion. Given {reason}, a colleague on our sourcing team will pick this up from here.",
    "To make sure this gets the right attention, I'm handing the conversation to our procurement manager. {reason}",
    "Thanks for working through this with us. Since {reason}, our team lead will follow up directly.",
];

const WALK_AWAY: &[&str] = &[
    "Thank you for the discussion. Unfortunately {reason}, so we'll step back from this one for now.",
    "We appreciate the time you've put in. Given {reason}, we won't be moving forward at this point.",
    "Thanks for the offers. {reason}, so we'll pass for now and keep you in mind for future orders.",
    "We've given this careful thought. {reason}, and we have to decline. We hope to work together another time.",
];

const SMALL_TALK: &[&str] = &[
    "All good here, thanks for asking! Whenever you're ready, happy to talk numbers.",
    "Doing well, hope you are too. Looking forward to seeing your proposal.",
    "Likewise! Always good to catch up. Shall we dig into the details?",
    "Thanks, same to you! Ready when you are to go through the offer.",
    "Appreciate it! Things are busy but good. Let's keep this deal moving.",
];

/// Single hard-coded fallback per intent, used when even template variables
/// cannot be prepared.
pub fn fallback_reply(intent: ResponseIntent) -> &'static str {
    match intent {
        ResponseIntent::Greet => "Hello! Thanks for reaching out. Could you share your pricing so we can get started?",
        ResponseIntent::AskForOffer => "Could you share your unit price and payment terms so we can proceed?",
        ResponseIntent::AskClarify => "Could you clarify your last message? A unit price and payment terms would help us respond.",
        ResponseIntent::Counter => "Thanks for the offer. We'd need better pricing to move forward. Could you improve on price or terms?",
        ResponseIntent::Accept => "Great, that works for us. We accept your offer and will follow up with next steps.",
        ResponseIntent::Escalate => "Thanks for your time. I'm handing this conversation to a colleague who will follow up directly.",
        ResponseIntent::WalkAway => "Thank you for the discussion, but we won't be moving forward at this time.",
        ResponseIntent::SmallTalk => "Thanks! Happy to chat, and ready to look at numbers whenever you are.",
    }
}

fn template_set(intent: ResponseIntent) -> &'static [&'static str] {
    match intent {
        ResponseIntent::Greet => GREET,
        ResponseIntent::AskForOffer => ASK_FOR_OFFER,
        ResponseIntent::AskClarify => ASK_CLARIFY,
        ResponseIntent::Counter => COUNTER,
        ResponseIntent::Accept => ACCEPT,
        ResponseIntent::Escalate => ESCALATE,
        ResponseIntent::WalkAway => WALK_AWAY,
        ResponseIntent::SmallTalk => SMALL_TALK,
    }
}

/// Stable template choice for a (deal, round, intent) triple.
pub fn select_template(deal_id: &str, round: u32, intent: ResponseIntent) -> &'static str {
    let set = template_set(intent);
    let digest = blake3::hash(format!("{deal_id}:{round}:{}", intent.key()).as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    let index = (u64::from_le_bytes(prefix) % set.len() as u64) as usize;
    set[index]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedReply {
    pub text: String,
    /// Placeholder names that had no value. Partial output is acceptable for
    /// a fallback path; callers log these instead of failing the turn.
    pub unresolved: Vec<String>,
}

/// Substitute `{name}` placeholders. Unknown placeholders are left verbatim
/// and reported, never an error.
pub fn render(template: &str, variables: &HashMap<String, String>) -> RenderedReply {
    let mut text = String::with_capacity(template.len());
    let mut unresolved = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        match after_open.find('}') {
            Some(close) => {
                let name = &after_open[..close];
                match variables.get(name) {
                    Some(value) => text.push_str(value),
                    None => {
                        unresolved.push(name.to_string());
                        text.push('{');
                        text.push_str(name);
                        text.push('}');
                    }
                }
                rest = &after_open[close + 1..];
            }
            None => {
                // Unbalanced brace; keep the remainder as-is.
                text.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    text.push_str(rest);

    RenderedReply { text, unresolved }
}

/// Select and render in one step.
pub fn render_reply(
    deal_id: &str,
    round: u32,
    intent: ResponseIntent,
    variables: &HashMap<String, String>,
) -> RenderedReply {
    render(select_template(deal_id, round, intent), variables)
}
