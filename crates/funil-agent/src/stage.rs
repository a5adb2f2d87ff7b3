// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent-driven stage advancement.
//!
//! The funnel stage only ever moves forward under normal flow. Each inbound
//! message is scanned for pt-BR buying signals and the strongest signal that
//! outranks the current stage wins; a message with no signal (a bare
//! greeting, a thank-you) leaves the stage alone. Entering `Closing` or
//! `PostSale` never auto-closes the conversation, and `PostSale` itself is
//! only reachable through the operator override.

use funil_core::types::ConversationStage;

/// Signals that the client is ready to enroll.
const CLOSING_SIGNALS: &[&str] = &[
    "matricul",
    "inscri",
    "quero fechar",
    "vamos fechar",
    "contrat",
    "quero come\u{e7}ar",
    "como pago",
];

/// Signals that the client is discussing terms.
const NEGOTIATION_SIGNALS: &[&str] = &[
    "valor",
    "pre\u{e7}o",
    "preco",
    "mensalidade",
    "desconto",
    "parcel",
    "pagamento",
    "bolsa",
    "quanto custa",
];

/// Signals that the client is exploring fit.
const QUALIFICATION_SIGNALS: &[&str] = &[
    "curso",
    "gradua\u{e7}\u{e3}o",
    "graduacao",
    "ead",
    "presencial",
    "enem",
    "turno",
    "vestibular",
];

/// Signals that the client wants to be served at all.
const IN_SERVICE_SIGNALS: &[&str] = &[
    "d\u{fa}vida",
    "duvida",
    "informa\u{e7}",
    "informac",
    "ajuda",
    "saber mais",
    "interesse",
];

/// Decide whether `text` advances the conversation past `current`.
///
/// Returns the stage to advance to, or `None` when the message carries no
/// signal stronger than where the conversation already is.
pub fn detect_advance(current: ConversationStage, text: &str) -> Option<ConversationStage> {
    let text = text.to_lowercase();

    let candidate = if contains_any(&text, CLOSING_SIGNALS) {
        ConversationStage::Closing
    } else if contains_any(&text, NEGOTIATION_SIGNALS) {
        ConversationStage::Negotiation
    } else if contains_any(&text, QUALIFICATION_SIGNALS) {
        ConversationStage::Qualification
    } else if contains_any(&text, IN_SERVICE_SIGNALS) {
        ConversationStage::InService
    } else {
        return None;
    };

    (candidate.rank() > current.rank()).then_some(candidate)
}

fn contains_any(text: &str, signals: &[&str]) -> bool {
    signals.iter().any(|signal| text.contains(signal))
}
