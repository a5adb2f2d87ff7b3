// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt assembly.
//!
//! The [`PromptLibrary`] is a read-mostly table of stage-keyed sales
//! guidance, built once at startup and shared by reference. The final system
//! prompt layers: base persona, stage guidance, lead summary, and the
//! retrieved knowledge context (truncated at a paragraph boundary when over
//! budget).

use std::collections::HashMap;

use funil_core::types::{ConversationStage, Lead};

/// Character budget for the knowledge context block.
const MAX_CONTEXT_CHARS: usize = 2000;

const BASE_PERSONA: &str = "Você é a Sofia, consultora de admissões de uma faculdade. \
Atenda pelo WhatsApp de forma acolhedora, objetiva e em português brasileiro. \
Responda em no máximo três parágrafos curtos e sempre termine com uma pergunta \
que ajude o cliente a dar o próximo passo. Se não souber algo ou o assunto fugir \
da admissão, diga que vai transferir para um atendente.";

/// Read-mostly lookup table of per-stage prompt guidance.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    stage_guidance: HashMap<ConversationStage, String>,
}

impl PromptLibrary {
    /// The stock pt-BR sales guidance, keyed by funnel stage.
    pub fn default_pt_br() -> Self {
        let mut stage_guidance = HashMap::new();
        stage_guidance.insert(
            ConversationStage::New,
            "O cliente acabou de chegar. Dê boas-vindas, pergunte o nome e o que procura."
                .to_string(),
        );
        stage_guidance.insert(
            ConversationStage::InService,
            "Tire as dúvidas do cliente e descubra qual curso e modalidade interessam."
                .to_string(),
        );
        stage_guidance.insert(
            ConversationStage::Qualification,
            "Aprofunde: curso desejado, turno, modalidade (EAD ou presencial), se já fez ENEM \
             e qual a urgência para começar."
                .to_string(),
        );
        stage_guidance.insert(
            ConversationStage::Negotiation,
            "Fale de valores, bolsas e formas de pagamento. Destaque condições vigentes e \
             contorne objeções sem pressionar."
                .to_string(),
        );
        stage_guidance.insert(
            ConversationStage::Closing,
            "O cliente quer se matricular. Explique o processo de matrícula passo a passo e \
             os documentos necessários."
                .to_string(),
        );
        stage_guidance.insert(
            ConversationStage::PostSale,
            "O cliente já é aluno. Acolha, resolva a dúvida e reforce os canais oficiais."
                .to_string(),
        );
        Self { stage_guidance }
    }

    /// Assemble the full system prompt for one responder call.
    pub fn system_prompt(&self, stage: ConversationStage, lead: &Lead, rag_context: &str) -> String {
        let guidance = self
            .stage_guidance
            .get(&stage)
            .map(String::as_str)
            .unwrap_or("");

        let mut prompt = format!("{BASE_PERSONA}\n\n## Momento da conversa\n{guidance}");

        prompt.push_str("\n\n## Dados do cliente\n");
        prompt.push_str(&format_lead(lead));

        let context = truncate_context(rag_context, MAX_CONTEXT_CHARS);
        if !context.is_empty() {
            prompt.push_str("\n\n## Informações da instituição\n");
            prompt.push_str(&context);
        }

        prompt
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::default_pt_br()
    }
}

fn format_lead(lead: &Lead) -> String {
    let mut parts = Vec::new();
    if let Some(name) = lead.name.as_deref() {
        parts.push(format!("Nome: {name}"));
    }
    parts.push(format!("Telefone: {}", lead.phone));
    if let Some(email) = lead.email.as_deref() {
        parts.push(format!("Email: {email}"));
    }
    if let Some(profile) = lead.profile.as_deref()
        && !profile.is_empty()
    {
        parts.push(format!("Perfil: {profile}"));
    }
    if parts.len() == 1 {
        return "Novo lead - informações ainda não coletadas".to_string();
    }
    parts.join("\n")
}

/// Truncate a context block, preferring a paragraph boundary near the limit.
fn truncate_context(context: &str, max_chars: usize) -> String {
    if context.chars().count() <= max_chars {
        return context.to_string();
    }

    let truncated: String = context.chars().take(max_chars).collect();
    let cut = match truncated.rfind('\n') {
        // Keep the boundary cut only when it lands near the end.
        Some(pos) if pos > max_chars * 4 / 5 => &truncated[..pos],
        _ => truncated.as_str(),
    };
    format!("{cut}\n\n[... contexto truncado ...]")
}
