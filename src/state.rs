// src/state.rs

use crate::{
    attachment::{store::InMemoryProfileStore, AttachmentLearner},
    config::TonebridgeConfig,
    kb::KnowledgeBase,
    parser::ParserGateway,
    services::AnalyzeService,
};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub analyze_service: Arc<AnalyzeService>,
    pub gateway: Arc<ParserGateway>,
    pub learner: Arc<AttachmentLearner>,
    pub kb: Arc<KnowledgeBase>,
}

/// Assemble the full pipeline. Everything downstream of the knowledge base
/// is cheap to build; the KB itself is loaded once and shared.
pub fn create_app_state(config: &TonebridgeConfig) -> AppState {
    let kb = Arc::new(KnowledgeBase::load(Path::new(&config.kb_dir)));
    create_app_state_with_kb(kb, config)
}

pub fn create_app_state_with_kb(kb: Arc<KnowledgeBase>, config: &TonebridgeConfig) -> AppState {
    let gateway = Arc::new(ParserGateway::from_config(config));
    let store = Arc::new(InMemoryProfileStore::new());
    let learner = Arc::new(AttachmentLearner::new(kb.clone(), store, config));
    let analyze_service = Arc::new(AnalyzeService::new(
        kb.clone(),
        gateway.clone(),
        learner.clone(),
        config,
    ));

    AppState {
        analyze_service,
        gateway,
        learner,
        kb,
    }
}
