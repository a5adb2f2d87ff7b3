// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pre-rendered follow-up message texts.
//!
//! Built once at startup and shared by reference; the scheduler copies the
//! selected text into each follow-up row so the dispatcher sends exactly
//! what was scheduled, even if templates change across a deploy.

use std::collections::HashMap;

use funil_core::types::FollowupKind;

/// Read-mostly lookup table of nudge texts per follow-up kind.
#[derive(Debug, Clone)]
pub struct FollowupTemplates {
    texts: HashMap<FollowupKind, String>,
}

impl FollowupTemplates {
    /// The stock pt-BR nudge sequence.
    pub fn default_pt_br() -> Self {
        let mut texts = HashMap::new();
        texts.insert(
            FollowupKind::ThreeHours,
            "Olá! 👋\n\nVi que você demonstrou interesse em fazer faculdade conosco há algumas horas.\n\nAinda tem alguma dúvida? Estou aqui para ajudar! 😊"
                .to_string(),
        );
        texts.insert(
            FollowupKind::OneDay,
            "Oi! Como vai?\n\nNão queria deixar sua dúvida sem resposta!\n\nSobre a faculdade que você perguntou, posso te passar mais informações?"
                .to_string(),
        );
        texts.insert(
            FollowupKind::ThreeDays,
            "Olá!\n\nPercebi que você estava interessado em começar uma graduação.\n\nEsse é um passo importante e quero te ajudar a tomar a melhor decisão! Posso tirar suas dúvidas? Temos condições especiais agora!"
                .to_string(),
        );
        texts.insert(
            FollowupKind::SevenDays,
            "Oi! Tudo bem?\n\nVi que você demonstrou interesse em fazer faculdade há uma semana.\n\nQueria saber se ainda tem interesse? Posso te passar informações sobre cursos, valores e o processo de matrícula. O que acha?"
                .to_string(),
        );
        Self { texts }
    }

    /// The message text for a follow-up kind.
    pub fn render(&self, kind: FollowupKind) -> &str {
        self.texts
            .get(&kind)
            .map(String::as_str)
            .unwrap_or("Oi! Ainda posso te ajudar com alguma coisa?")
    }
}

impl Default for FollowupTemplates {
    fn default() -> Self {
        Self::default_pt_br()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_distinct_text() {
        let templates = FollowupTemplates::default_pt_br();
        let texts: Vec<&str> = FollowupKind::ALL.iter().map(|k| templates.render(*k)).collect();
        for text in &texts {
            assert!(!text.is_empty());
        }
        let mut unique = texts.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), texts.len());
    }
}
