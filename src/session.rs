//! Session context: one retriever, one conversation.
//!
//! A [`Session`] is built once by [`Session::initialize`] (load, normalize,
//! chunk, index) and then answers turns through
//! [`Session::get_response`]. Turns take `&mut self`, so a session never
//! has two turns in flight.

use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::{AnswerConfig, Config, API_KEY_VAR};
use crate::embedding::{EmbeddingProvider, OpenAIProvider};
use crate::error::{StartupError, TurnError};
use crate::index::{build_retriever, Retriever};
use crate::ingest::{prepare, Prepared};
use crate::llm::{ChatModel, OpenAIChat};
use crate::models::{AnswerMode, ConversationTurn, Exchange, StructuredResponse};
use crate::pipeline::run_turn;
use crate::sources::LoaderRegistry;

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub chat: Arc<dyn ChatModel>,
}

impl Services {
    /// OpenAI-backed services. Fails when the API key is not set.
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| StartupError::MissingCredential {
                var: API_KEY_VAR.to_string(),
            })?;

        let embedder = OpenAIProvider::new(&config.embedding, api_key.clone())
            .map_err(StartupError::Config)?;
        let chat = OpenAIChat::new(&config.llm, api_key).map_err(StartupError::Config)?;

        Ok(Self {
            embedder: Arc::new(embedder),
            chat: Arc::new(chat),
        })
    }
}

pub struct Session {
    id: String,
    mode: AnswerMode,
    retriever: Retriever,
    chat: Arc<dyn ChatModel>,
    answers: AnswerConfig,
    turns: Vec<ConversationTurn>,
    exchanges: Vec<Exchange>,
}

impl Session {
    /// Build the retriever from the configured sources.
    pub async fn initialize(config: &Config, services: Services) -> Result<Self, StartupError> {
        Self::initialize_with(config, services, &LoaderRegistry::default()).await
    }

    pub async fn initialize_with(
        config: &Config,
        services: Services,
        registry: &LoaderRegistry,
    ) -> Result<Self, StartupError> {
        let id = Uuid::new_v4().simple().to_string();
        let span = info_span!("session", session_id = %id);
        let id_for_log = id.clone();

        async move {
            let Prepared { documents, chunks } = prepare(config, registry).await?;

            let retriever = build_retriever(
                chunks,
                Arc::clone(&services.embedder),
                config.embedding.batch_size,
                config.retrieval.top_k,
            )
            .await?;

            info!(
                documents = documents.len(),
                chunks = retriever.len(),
                k = retriever.k(),
                "Retriever initialized"
            );

            Ok(Self {
                id,
                mode: AnswerMode::default(),
                retriever,
                chat: services.chat,
                answers: config.answer.clone(),
                turns: Vec::new(),
                exchanges: Vec::new(),
            })
        }
        .instrument(span)
        .await
        .inspect_err(|e| error!(session_id = %id_for_log, error = %e, "Session initialization failed"))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> AnswerMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AnswerMode) {
        self.mode = mode;
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Display-oriented history, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Raw question/answer pairs fed back into prompts.
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Answer one user message in the current mode.
    ///
    /// History is only extended when the turn succeeds.
    pub async fn get_response(&mut self, text: &str) -> Result<StructuredResponse, TurnError> {
        let span = info_span!("session", session_id = %self.id);
        let mode = self.mode;

        let output = async {
            info!(mode = %mode, message = %text, "User message");
            run_turn(
                mode,
                &self.retriever,
                self.chat.as_ref(),
                &self.answers,
                &self.exchanges,
                text,
            )
            .await
            .inspect_err(|e| error!(error = %e, "Turn failed"))
        }
        .instrument(span.clone())
        .await?;

        span.in_scope(|| info!(response = ?output.response, "Turn answered"));

        self.turns.push(ConversationTurn::user(text));
        self.turns
            .push(ConversationTurn::assistant(output.response.clone()));
        self.exchanges.push(Exchange {
            question: text.to_string(),
            answer: output.answer,
        });
        Ok(output.response)
    }
}
