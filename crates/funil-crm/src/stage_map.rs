// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Funnel-stage to CRM-pipeline-stage mapping.

use funil_core::types::ConversationStage;

/// Map an internal funnel stage to the DataCrazy pipeline stage id.
///
/// The ids follow the default pipeline layout; deployments with a custom
/// pipeline adjust the ids on the CRM side, not here.
pub fn pipeline_stage_id(stage: ConversationStage) -> i64 {
    match stage {
        ConversationStage::New => 1,
        ConversationStage::InService => 2,
        ConversationStage::Qualification => 3,
        ConversationStage::Negotiation => 4,
        ConversationStage::Closing => 5,
        ConversationStage::PostSale => 6,
    }
}
