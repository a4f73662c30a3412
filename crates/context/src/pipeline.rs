//! End-to-end query pipeline
//!
//! extract entities -> expand query -> retrieve (MMR) -> bind citations
//! -> compose answer -> assemble response
//!
//! Collaborators are built once and shared; a pipeline holds no per-request
//! state and can serve concurrent requests through an `Arc`.

use crate::answer_composer::AnswerComposer;
use crate::citation_binder::CitationBinder;
use crate::entity_extractor::EntityExtractor;
use crate::generator::{create_generator, DecodingConfig};
use crate::ner::create_ner_model;
use crate::query_expander::QueryExpander;
use crate::response_assembler::ResponseAssembler;
use medrag_common::config::AppConfig;
use medrag_common::embeddings::create_embedder;
use medrag_common::errors::{AppError, Result};
use medrag_common::metrics::{self, Stage, StageTimer};
use medrag_common::AnswerResult;
use medrag_search::{create_index, RetrievalParams, RetrievalTimeouts, VectorRetriever};
use tracing::Instrument;
use uuid::Uuid;

pub struct QueryPipeline {
    extractor: EntityExtractor,
    expander: QueryExpander,
    retriever: VectorRetriever,
    binder: CitationBinder,
    composer: AnswerComposer,
    assembler: ResponseAssembler,
    params: RetrievalParams,
}

impl QueryPipeline {
    pub fn new(
        extractor: EntityExtractor,
        retriever: VectorRetriever,
        composer: AnswerComposer,
    ) -> Self {
        Self {
            extractor,
            expander: QueryExpander::default(),
            retriever,
            binder: CitationBinder::new(),
            composer,
            assembler: ResponseAssembler::default(),
            params: RetrievalParams::default(),
        }
    }

    pub fn with_expander(mut self, expander: QueryExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn with_assembler(mut self, assembler: ResponseAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_retrieval_params(mut self, params: RetrievalParams) -> Self {
        self.params = params;
        self
    }

    /// Build every collaborator from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let params = RetrievalParams::from_config(config);
        params.validate()?;

        let embedder = create_embedder(&config.embedding)?;
        let index = create_index(&config.index, config.embedding.dimension)?;
        let ner = create_ner_model(&config.ner)?;
        let generator = create_generator(&config.generation)?;

        tracing::info!(
            embedding_model = embedder.model_name(),
            index = index.name(),
            metric = index.metric().as_str(),
            ner = ner.model_name(),
            generator = generator.model_name(),
            k = params.k,
            fetch_k = params.fetch_k,
            lambda = params.lambda,
            "Query pipeline initialized"
        );

        let retriever = VectorRetriever::new(embedder, index)
            .with_timeouts(RetrievalTimeouts::from_config(config));
        let extractor = EntityExtractor::new(ner, config.ner_timeout());
        let composer = AnswerComposer::new(
            generator,
            DecodingConfig::from(&config.generation),
            config.generation_timeout(),
        );

        Ok(Self::new(extractor, retriever, composer)
            .with_expander(QueryExpander::new(config.retrieval.max_expansion_words))
            .with_assembler(ResponseAssembler::new(config.response.preview_chars))
            .with_retrieval_params(params))
    }

    pub fn retrieval_params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Answer a medical question with numbered citations
    pub async fn process_query(&self, text: &str) -> Result<AnswerResult> {
        let query = text.trim();
        if query.is_empty() {
            metrics::record_query("rejected");
            return Err(AppError::Validation {
                message: "Query text must not be empty".to_string(),
                field: Some("text".to_string()),
            });
        }

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("process_query", %request_id);
        let timer = StageTimer::start(Stage::Total);

        let result = self.run(query).instrument(span).await;
        let elapsed_ms = timer.finish(result.is_ok());

        match result {
            Ok((answer, degraded)) => {
                metrics::record_query(if degraded { "degraded" } else { "success" });
                tracing::info!(
                    %request_id,
                    citations = answer.citations.len(),
                    entities = answer.entities.len(),
                    expanded = answer.was_expanded(),
                    degraded,
                    elapsed_ms,
                    "Query answered"
                );
                Ok(answer)
            }
            Err(e) => {
                metrics::record_query("error");
                if e.is_fatal_to_request() {
                    tracing::error!(%request_id, error = %e, code = ?e.code(), elapsed_ms, "Query failed");
                } else {
                    tracing::warn!(%request_id, error = %e, code = ?e.code(), elapsed_ms, "Query rejected");
                }
                Err(e)
            }
        }
    }

    async fn run(&self, query: &str) -> Result<(AnswerResult, bool)> {
        let extraction = self.extractor.extract(query).await;
        let degraded = extraction.is_degraded();
        if let Some(reason) = extraction.reason() {
            metrics::record_degraded_extraction();
            tracing::debug!(reason, "Continuing without entities");
        }
        let entities = extraction.into_value();

        let search_query = self.expander.expand(query, &entities);
        if search_query != query {
            metrics::record_expansion();
            tracing::debug!(expanded = %search_query, "Query expanded");
        }

        let passages = self.retriever.retrieve(&search_query, &self.params).await?;
        metrics::record_retrieved(passages.len());

        let citations = self.binder.bind(passages);
        let answer_text = self.composer.compose(query, &citations).await?;

        let result = self
            .assembler
            .assemble(answer_text, entities, citations, &search_query, query);
        Ok((result, degraded))
    }
}
