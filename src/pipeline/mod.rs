//! Orchestrator: documents -> graph + chunk index, queries -> claims -> verdicts.
//!
//! Each stage runs its per-row calls through `buffer_unordered` with the
//! configured concurrency limit; no stage relies on row ordering.

pub mod output;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::{Mutex, RwLock};

use crate::claims::ClaimDecomposer;
use crate::config::{Config, PerformanceConfig};
use crate::embeddings::{Embedder, EmbeddingBackend, GeminiEmbeddingClient};
use crate::error::Result;
use crate::graph::{load_schema_prompt, GraphIngestor, GraphSearcher, GraphStore};
use crate::ingest::{chunk_document, discover_documents, read_document, read_queries, QueryRow, SourceDocument};
use crate::llm::{GeminiClient, LanguageModel};
use crate::reasoner::Reasoner;
use crate::search::ChunkIndex;
use crate::watch::{classify_path, spawn_watcher, DocumentEvent};

pub use output::{IngestionStatusRow, OutputTable, VerdictRecord};

/// Text evidence handed to the reasoner when a claim matches no chunk
pub const NO_TEXT_EVIDENCE: &str = "No text evidence found.";

/// A claim with everything it needs before matching: its vector and graph evidence
#[derive(Debug, Clone)]
pub struct PreparedClaim {
    pub query_id: String,
    pub character: String,
    pub claim: String,
    pub vector: Vec<f32>,
    pub graph_evidence: String,
}

/// Counts from one pass over the corpus and queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub documents: usize,
    pub chunks: usize,
    pub claims: usize,
    pub verdicts: usize,
}

/// Matching key: the same claim is reasoned against the same chunk once per run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum EvidenceKey {
    Chunk(String),
    NoEvidence,
}

struct ReasoningJob {
    claim_index: usize,
    evidence_text: String,
    source_path: String,
}

pub struct Pipeline {
    docs_folder: PathBuf,
    queries_csv: PathBuf,
    performance: PerformanceConfig,
    debounce_ms: u64,
    top_k: usize,
    store: Arc<GraphStore>,
    ingestor: GraphIngestor,
    searcher: GraphSearcher,
    decomposer: ClaimDecomposer,
    embedder: Embedder,
    reasoner: Reasoner,
    index: ChunkIndex,
    ingestion_log: OutputTable<IngestionStatusRow>,
    results: OutputTable<VerdictRecord>,
    claims: RwLock<Vec<PreparedClaim>>,
    emitted: Mutex<HashSet<(usize, EvidenceKey)>>,
}

impl Pipeline {
    /// Wire the pipeline from explicit service handles. The graph store is
    /// shared by the ingestor and the searcher.
    pub fn new(
        config: &Config,
        llm: Arc<dyn LanguageModel>,
        embeddings: Arc<dyn EmbeddingBackend>,
        store: Arc<GraphStore>,
    ) -> Self {
        let schema_prompt = load_schema_prompt(&config.pipeline.schema_prompt_path);
        Self {
            docs_folder: config.pipeline.docs_folder.clone(),
            queries_csv: config.pipeline.queries_csv.clone(),
            performance: config.performance.clone(),
            debounce_ms: config.performance.debounce_ms,
            top_k: config.search.top_k,
            ingestor: GraphIngestor::new(
                llm.clone(),
                store.clone(),
                &config.llm.extraction_model,
                schema_prompt,
            ),
            searcher: GraphSearcher::new(
                llm.clone(),
                store.clone(),
                &config.llm.entity_model,
                config.search.graph_evidence_limit,
            ),
            decomposer: ClaimDecomposer::new(llm.clone(), &config.llm.decomposition_model),
            embedder: Embedder::new(embeddings, config.embeddings.dimensions),
            reasoner: Reasoner::new(llm, &config.llm.reasoning_model),
            store,
            index: ChunkIndex::new(),
            ingestion_log: OutputTable::new(&config.pipeline.ingestion_log),
            results: OutputTable::new(&config.pipeline.results_csv),
            claims: RwLock::new(Vec::new()),
            emitted: Mutex::new(HashSet::new()),
        }
    }

    /// Build the Gemini clients and connect the graph store. A graph store
    /// that cannot be opened leaves the pipeline running without graph evidence.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config.api_key()?;
        let timeout = Duration::from_secs(config.llm.timeout_secs);

        let llm: Arc<dyn LanguageModel> =
            Arc::new(GeminiClient::new(api_key.clone(), config.llm.base_url.clone(), timeout)?);
        let embeddings: Arc<dyn EmbeddingBackend> = Arc::new(GeminiEmbeddingClient::new(
            api_key,
            config.llm.base_url.clone(),
            config.embeddings.model.clone(),
            timeout,
        )?);
        let store = Arc::new(GraphStore::connect(config.db_path()).await);

        Ok(Self::new(config, llm, embeddings, store))
    }

    pub fn docs_folder(&self) -> &Path {
        &self.docs_folder
    }

    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Graph extraction and chunk indexing for one document, run side by side.
    /// Appends one ingestion-status row and returns the status.
    pub async fn ingest_document(&self, doc: &SourceDocument) -> Result<String> {
        let (status, chunks) = tokio::join!(self.ingestor.process(&doc.text), self.index_document(doc));
        log::info!("Ingested {}: {} ({} chunks)", doc.path, status, chunks);

        if self.store.is_connected() {
            if let Err(e) = self.store.record_document(&doc.path, &doc.content_hash, &status).await {
                log::warn!("Failed to record {} in documents ledger: {}", doc.path, e);
            }
        }

        self.ingestion_log
            .append(&[IngestionStatusRow {
                path: doc.path.clone(),
                ingestion_status: status.clone(),
            }])
            .await?;
        Ok(status)
    }

    /// Chunk, embed and (re)index one document. Returns the chunk count.
    pub async fn index_document(&self, doc: &SourceDocument) -> usize {
        let chunks = chunk_document(&doc.path, &doc.text, &self.performance);
        let embedder = &self.embedder;

        let mut entries: Vec<_> = stream::iter(chunks)
            .map(|chunk| async move {
                let vector = embedder.embed(&chunk.text).await;
                (chunk, vector)
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        entries.sort_by_key(|(chunk, _)| chunk.ordinal);

        let count = entries.len();
        let usable = self.index.replace_document(&doc.path, entries).await;
        if usable < count {
            log::warn!("{}: {} of {} chunks have no embedding", doc.path, count - usable, count);
        }
        count
    }

    /// Forget a deleted document's chunks. Graph facts it contributed stay.
    pub async fn remove_document(&self, doc_path: &str) -> bool {
        let removed = self.index.remove_document(doc_path).await;
        if removed {
            log::info!("Removed {} from the chunk index", doc_path);
        }
        removed
    }

    pub async fn handle_event(&self, event: DocumentEvent) -> Result<()> {
        match event {
            DocumentEvent::Changed(doc) => {
                self.ingest_document(&doc).await?;
            }
            DocumentEvent::Removed(path) => {
                self.remove_document(&path).await;
            }
        }
        Ok(())
    }

    /// Ingest every document currently in the docs folder.
    pub async fn initial_scan(&self) -> Result<usize> {
        let mut documents = Vec::new();
        for path in discover_documents(&self.docs_folder)? {
            match read_document(&self.docs_folder, &path) {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        let count = documents.len();
        let results: Vec<Result<String>> = stream::iter(documents.iter())
            .map(|doc| self.ingest_document(doc))
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        for result in results {
            result?;
        }
        log::info!("Initial scan: {} documents, {} chunks indexed", count, self.index.len().await);
        Ok(count)
    }

    /// Read the query table, decompose every narrative and prepare each claim.
    /// Replaces any previously prepared claims.
    pub async fn load_claims(&self) -> Result<usize> {
        let rows = read_queries(&self.queries_csv)?;
        let prepared = self.prepare_claims(rows).await;
        let count = prepared.len();

        *self.claims.write().await = prepared;
        self.emitted.lock().await.clear();
        log::info!("Prepared {} claims", count);
        Ok(count)
    }

    /// Decompose rows into claims, then embed each claim and fetch its graph evidence.
    pub async fn prepare_claims(&self, rows: Vec<QueryRow>) -> Vec<PreparedClaim> {
        let decomposer = &self.decomposer;
        let mut decomposed: Vec<(usize, QueryRow, Vec<String>)> = stream::iter(rows.into_iter().enumerate())
            .map(|(position, row)| async move {
                let claims = decomposer.decompose(&row.content).await;
                if claims.is_empty() {
                    log::debug!("Query {} produced no claims", row.query_id);
                }
                (position, row, claims)
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        decomposed.sort_by_key(|(position, _, _)| *position);

        let pending: Vec<(QueryRow, String)> = decomposed
            .into_iter()
            .flat_map(|(_, row, claims)| claims.into_iter().map(move |claim| (row.clone(), claim)))
            .collect();

        let embedder = &self.embedder;
        let searcher = &self.searcher;
        stream::iter(pending)
            .map(|(row, claim)| async move {
                let (vector, graph_evidence) = tokio::join!(embedder.embed(&claim), searcher.search(&claim));
                PreparedClaim {
                    query_id: row.query_id,
                    character: row.character,
                    claim,
                    vector,
                    graph_evidence,
                }
            })
            .buffered(self.concurrency())
            .collect()
            .await
    }

    /// Match every prepared claim against the index and reason over each
    /// (claim, chunk) pair not seen before in this run. Appends the new
    /// verdict rows and returns how many were written.
    pub async fn evaluate_claims(&self) -> Result<usize> {
        let claims = self.claims.read().await;
        let jobs = self.collect_jobs(&claims).await;
        if jobs.is_empty() {
            return Ok(0);
        }

        let reasoner = &self.reasoner;
        let claims_ref: &[PreparedClaim] = &claims;
        let records: Vec<VerdictRecord> = stream::iter(jobs)
            .map(|job| async move {
                let claim = &claims_ref[job.claim_index];
                let (verdict, rationale) = reasoner
                    .generate_verdict(&claim.claim, &job.evidence_text, &claim.graph_evidence)
                    .await;
                VerdictRecord {
                    query_id: claim.query_id.clone(),
                    character: claim.character.clone(),
                    claim: claim.claim.clone(),
                    verdict,
                    rationale,
                    evidence_text: job.evidence_text,
                    evidence_graph: claim.graph_evidence.clone(),
                    source_path: job.source_path,
                }
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        self.results.append(&records).await?;
        log::info!("Wrote {} verdicts", records.len());
        Ok(records.len())
    }

    async fn collect_jobs(&self, claims: &[PreparedClaim]) -> Vec<ReasoningJob> {
        let mut emitted = self.emitted.lock().await;
        let mut jobs = Vec::new();

        for (claim_index, claim) in claims.iter().enumerate() {
            let matches = self.index.top_k(&claim.vector, self.top_k).await;
            if matches.is_empty() {
                if emitted.insert((claim_index, EvidenceKey::NoEvidence)) {
                    jobs.push(ReasoningJob {
                        claim_index,
                        evidence_text: NO_TEXT_EVIDENCE.to_string(),
                        source_path: String::new(),
                    });
                }
                continue;
            }
            for m in matches {
                if emitted.insert((claim_index, EvidenceKey::Chunk(m.chunk.chunk_id.clone()))) {
                    jobs.push(ReasoningJob {
                        claim_index,
                        evidence_text: m.chunk.text,
                        source_path: m.chunk.doc_path,
                    });
                }
            }
        }
        jobs
    }

    /// Scan the corpus, prepare claims and write verdicts once.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let documents = self.initial_scan().await?;
        let claims = self.load_claims().await?;
        let verdicts = self.evaluate_claims().await?;
        Ok(RunSummary {
            documents,
            chunks: self.index.len().await,
            claims,
            verdicts,
        })
    }

    /// Run continuously: one full pass, then re-evaluate after every
    /// document change until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        // Watch before scanning so edits made during the scan are not lost
        let mut changes = spawn_watcher(&self.docs_folder, self.debounce_ms)?;

        let summary = self.run_once().await?;
        log::info!(
            "Initial pass complete: {} documents, {} chunks, {} claims, {} verdicts",
            summary.documents,
            summary.chunks,
            summary.claims,
            summary.verdicts
        );

        while let Some(path) = changes.recv().await {
            let events = match classify_path(&self.docs_folder, &path) {
                Ok(events) if events.is_empty() => continue,
                Ok(events) => events,
                Err(e) => {
                    log::error!("watch {}: {}", path.display(), e);
                    continue;
                }
            };
            for event in events {
                self.handle_event(event).await?;
            }
            self.evaluate_claims().await?;
        }

        log::warn!("Watcher stopped; exiting");
        Ok(())
    }

    fn concurrency(&self) -> usize {
        self.performance.max_concurrency.max(1)
    }
}
