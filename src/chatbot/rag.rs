//! Retrieval over local data
//!
//! Documents are built from the crop guide, soil rows, a season note and
//! every CSV under the data directory (200-row chunks). Their embeddings are
//! cached in `ai_agri_embeddings.json` keyed by embedding model; the cache is
//! only rebuilt when `RAG_REBUILD=1`, never during a normal chat.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{info, warn};

use super::context::{ChatContext, SoilRow};
use super::llm::ChatProviders;
use crate::data::crop_guide::CropDetails;
use crate::data::{column_as_strings, read_csv};

pub const TOP_K: usize = 4;
pub const CSV_CHUNK_ROWS: usize = 200;
const EMBED_BATCH: usize = 256;
const CHAT_HISTORY_FILE: &str = "ai_chat_history.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagDocument {
    pub id: String,
    pub title: String,
    pub text: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    #[serde(flatten)]
    pub document: RagDocument,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FileStamp {
    pub mtime: i64,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    pub model: String,
    #[serde(default)]
    pub signature: BTreeMap<String, FileStamp>,
    #[serde(default)]
    pub documents: Vec<EmbeddedDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDoc {
    pub title: String,
    pub text: String,
    pub source: String,
}

// ============================================================================
// Documents
// ============================================================================

pub fn crop_document(key: &str, crop: &CropDetails) -> RagDocument {
    let or_na = |text: &str| if text.is_empty() { "Not specified".to_string() } else { text.to_string() };
    let first = |items: &[String], n: usize, sep: &str| items.iter().take(n).cloned().collect::<Vec<_>>().join(sep);
    let name = crop.display_name(key);

    let text = [
        format!("Crop: {}", name),
        format!("Type: {}", or_na(&crop.crop_type)),
        format!("Season: {}", or_na(&crop.season)),
        format!("Duration: {}", or_na(&crop.duration)),
        format!("Stages: {}", crop.stage_summary()),
        format!("Soil/Notes: {}", or_na(&crop.irrigation.notes)),
        format!("Fertilizer: {}", or_na(&crop.fertilizer.basal)),
        format!("Top dressing: {}", first(&crop.fertilizer.top_dressing, 3, "; ")),
        format!("Irrigation: {}", first(&crop.irrigation.stage_wise, 3, "; ")),
        format!("Pests: {}", first(&crop.pests.common_pests, 6, ", ")),
        format!("Diseases: {}", first(&crop.pests.common_diseases, 6, ", ")),
        format!("Prevention: {}", or_na(&crop.pests.prevention)),
        format!("Harvest: {}", or_na(&crop.harvest.indicators)),
        format!("Post-harvest: {}", or_na(&crop.harvest.post_harvest)),
    ]
    .join("\n");

    RagDocument {
        id: format!("crop::{}", key),
        title: format!("{} crop advisory", name),
        text,
        source: "crop_details".to_string(),
    }
}

pub fn soil_document(idx: usize, row: &SoilRow) -> RagDocument {
    let field = |names: &[&str], default: &str| {
        names
            .iter()
            .find_map(|n| row.get(*n).filter(|v| !v.is_empty()))
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };
    let region = field(&["REGION", "Region", "region"], "Region");

    RagDocument {
        id: format!("soil::{}", idx),
        title: format!("Soil profile {}", region),
        text: format!(
            "Region: {}; Soil: {}; pH: {}; N: {}; P: {}; K: {}.",
            region,
            field(&["SOIL_TYPE", "Soil", "soil"], "Soil"),
            field(&["PH", "ph", "pH"], "NA"),
            field(&["N", "n"], "NA"),
            field(&["P", "p"], "NA"),
            field(&["K", "k"], "NA"),
        ),
        source: "soil_profiles".to_string(),
    }
}

fn season_document() -> RagDocument {
    RagDocument {
        id: "general::seasons".to_string(),
        title: "Seasonal cropping overview".to_string(),
        text: "Season guide: Kharif (monsoon), Rabi (winter), Zaid (summer). \
               Match crop to local climate window and rainfall pattern."
            .to_string(),
        source: "general".to_string(),
    }
}

/// Every file below `dir`, sorted for a stable document order
fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn relative_name(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn csv_file_documents(path: &Path, rel: &str, chunk_rows: usize) -> Result<Vec<RagDocument>> {
    let df = read_csv(path)?;
    let names: Vec<String> = df.get_column_names().into_iter().map(|s| s.to_string()).collect();
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        columns.push(column_as_strings(&df, name)?);
    }

    let mut documents = Vec::new();
    let height = df.height();
    for (chunk_idx, start) in (0..height).step_by(chunk_rows.max(1)).enumerate() {
        let end = (start + chunk_rows).min(height);
        let rows: Vec<String> = (start..end)
            .filter_map(|row| {
                let parts: Vec<String> = names
                    .iter()
                    .zip(&columns)
                    .filter_map(|(name, values)| values[row].as_ref().map(|v| format!("{}={}", name, v)))
                    .collect();
                (!parts.is_empty()).then(|| format!("row {}: {}", row, parts.join(", ")))
            })
            .collect();
        if rows.is_empty() {
            continue;
        }

        documents.push(RagDocument {
            id: format!("csv::{}::chunk{}", rel, chunk_idx),
            title: format!("Dataset {} (rows {}-{})", rel, start, end - 1),
            text: rows.join("\n"),
            source: rel.to_string(),
        });
    }
    Ok(documents)
}

/// 200-row chunks of every CSV under the data directory
pub fn csv_documents(data_dir: &Path, chunk_rows: usize) -> Vec<RagDocument> {
    let mut documents = Vec::new();
    for path in walk_files(data_dir).into_iter().filter(|p| has_extension(p, &["csv"])) {
        let rel = relative_name(&path, data_dir);
        match csv_file_documents(&path, &rel, chunk_rows) {
            Ok(docs) => documents.extend(docs),
            Err(e) => warn!(file = %rel, error = %e, "Skipping CSV for retrieval"),
        }
    }
    documents
}

pub fn build_documents(ctx: &ChatContext) -> Vec<RagDocument> {
    let mut documents: Vec<RagDocument> = ctx.crops().iter().map(|(key, crop)| crop_document(key, crop)).collect();
    documents.extend(ctx.soil_rows().iter().take(200).enumerate().map(|(idx, row)| soil_document(idx, row)));
    documents.push(season_document());
    documents.extend(csv_documents(ctx.paths().data_dir.as_path(), CSV_CHUNK_ROWS));
    documents
}

/// mtime and size of every CSV/JSON data file, chat history excluded
pub fn dataset_signature(data_dir: &Path) -> BTreeMap<String, FileStamp> {
    walk_files(data_dir)
        .into_iter()
        .filter(|p| has_extension(p, &["csv", "json"]))
        .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some(CHAT_HISTORY_FILE))
        .filter_map(|p| {
            let meta = std::fs::metadata(&p).ok()?;
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_secs() as i64);
            Some((relative_name(&p, data_dir), FileStamp { mtime, size: meta.len() }))
        })
        .collect()
}

// ============================================================================
// Index
// ============================================================================

pub fn load_index(path: &Path) -> Option<EmbeddingIndex> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(index) => Some(index),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable embeddings cache");
            None
        }
    }
}

pub fn save_index(index: &EmbeddingIndex, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string(index).context("Failed to serialise embeddings")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Cached index for the configured model, or a rebuild when allowed
///
/// Cache reads and writes run on the blocking pool.
pub async fn ensure_index(ctx: &ChatContext, providers: &ChatProviders) -> Option<EmbeddingIndex> {
    let path = ctx.paths().embeddings_cache();
    let load_path = path.clone();
    let cached = tokio::task::spawn_blocking(move || load_index(&load_path))
        .await
        .ok()
        .flatten();
    if let Some(cached) = cached {
        if cached.model == providers.embedding_model {
            return Some(cached);
        }
    }
    if !providers.rag_rebuild {
        return None;
    }

    let build_ctx = ctx.clone();
    let (documents, signature) = tokio::task::spawn_blocking(move || {
        let documents = build_documents(&build_ctx);
        let signature = dataset_signature(&build_ctx.paths().data_dir);
        (documents, signature)
    })
    .await
    .ok()?;

    let mut embedded = Vec::with_capacity(documents.len());
    for batch in documents.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
        let vectors = providers.embed_texts(&texts).await?;
        embedded.extend(
            batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(document, embedding)| EmbeddedDocument { document, embedding }),
        );
    }

    let index = EmbeddingIndex {
        model: providers.embedding_model.clone(),
        signature,
        documents: embedded,
    };
    let save_path = path.clone();
    let (index, saved) = tokio::task::spawn_blocking(move || {
        let saved = save_index(&index, &save_path);
        (index, saved)
    })
    .await
    .ok()?;
    match saved {
        Ok(()) => info!(documents = index.documents.len(), path = %path.display(), "Rebuilt embeddings cache"),
        Err(e) => warn!(error = %e, "Failed to save embeddings cache"),
    }
    Some(index)
}

/// Cosine score with a small epsilon on both norms
pub fn cosine_similarity(doc: &[f32], query: &[f32]) -> f32 {
    if doc.len() != query.len() || doc.is_empty() {
        return 0.0;
    }
    let dot: f32 = doc.iter().zip(query).map(|(a, b)| a * b).sum();
    let doc_norm = doc.iter().map(|x| x * x).sum::<f32>().sqrt();
    let query_norm = query.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (doc_norm * (query_norm + 1e-8) + 1e-8)
}

pub fn top_matches(index: &EmbeddingIndex, query: &[f32], k: usize) -> Vec<RetrievedDoc> {
    let mut scored: Vec<(f32, &EmbeddedDocument)> = index
        .documents
        .iter()
        .map(|d| (cosine_similarity(&d.embedding, query), d))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    scored
        .into_iter()
        .take(k)
        .map(|(_, d)| RetrievedDoc {
            title: d.document.title.clone(),
            text: d.document.text.clone(),
            source: d.document.source.clone(),
        })
        .collect()
}

/// Top documents for a query; empty when embeddings are unavailable
pub async fn retrieve_context(query: &str, ctx: &ChatContext, providers: &ChatProviders) -> Vec<RetrievedDoc> {
    if !providers.openai_configured() {
        return Vec::new();
    }
    let Some(index) = ctx.embedding_index(providers).await else {
        return Vec::new();
    };
    if index.documents.is_empty() {
        return Vec::new();
    }
    match providers.embed_texts(&[query.to_string()]).await {
        Some(vectors) => vectors
            .first()
            .map(|q| top_matches(&index, q, TOP_K))
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::context::tests::sample_context;
    use approx::assert_relative_eq;

    fn embedded(id: &str, embedding: Vec<f32>) -> EmbeddedDocument {
        EmbeddedDocument {
            document: RagDocument {
                id: id.to_string(),
                title: format!("Doc {}", id),
                text: format!("text {}", id),
                source: "general".to_string(),
            },
            embedding,
        }
    }

    #[test]
    fn test_crop_document_layout() {
        let ctx = sample_context();
        let rice = ctx.crops().get("rice").unwrap();
        let doc = crop_document("rice", rice);

        assert_eq!(doc.id, "crop::rice");
        assert_eq!(doc.title, "Rice crop advisory");
        let lines: Vec<&str> = doc.text.lines().collect();
        assert_eq!(lines.len(), 14);
        assert_eq!(lines[0], "Crop: Rice");
        assert_eq!(lines[7], "Top dressing: Urea at tillering; Urea at panicle");
        assert_eq!(lines[9], "Pests: Stem borer");
    }

    #[test]
    fn test_soil_document_field_fallbacks() {
        let ctx = sample_context();
        let doc = soil_document(0, &ctx.soil_rows()[0]);
        assert_eq!(doc.id, "soil::0");
        assert_eq!(doc.title, "Soil profile Punjab");
        assert_eq!(doc.text, "Region: Punjab; Soil: Soil; pH: 7.4; N: NA; P: NA; K: NA.");
    }

    #[test]
    fn test_csv_chunks_and_signature() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();

        let mut csv = String::from("crop,n\n");
        for i in 0..5 {
            csv.push_str(&format!("rice,{}\n", i));
        }
        std::fs::write(raw.join("tiny.csv"), csv).unwrap();
        std::fs::write(dir.path().join("ai_chat_history.json"), "[]").unwrap();
        std::fs::write(dir.path().join("crop_details.json"), "{}").unwrap();

        let docs = csv_documents(dir.path(), 2);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].id, "csv::raw/tiny.csv::chunk0");
        assert_eq!(docs[0].title, "Dataset raw/tiny.csv (rows 0-1)");
        assert_eq!(docs[0].text, "row 0: crop=rice, n=0\nrow 1: crop=rice, n=1");
        assert_eq!(docs[2].title, "Dataset raw/tiny.csv (rows 4-4)");

        let signature = dataset_signature(dir.path());
        let keys: Vec<&str> = signature.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["crop_details.json", "raw/tiny.csv"]);
        assert_eq!(signature["crop_details.json"].size, 2);
    }

    #[test]
    fn test_build_documents_without_data_dir() {
        let ctx = sample_context();
        let docs = build_documents(&ctx);
        // 4 crops, 1 soil row, season note
        assert_eq!(docs.len(), 6);
        assert_eq!(docs[5].id, "general::seasons");
    }

    #[test]
    fn test_cosine_and_ranking() {
        assert_relative_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0, epsilon = 1e-5);
        assert_relative_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0, epsilon = 1e-5);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);

        let index = EmbeddingIndex {
            model: "test".to_string(),
            signature: BTreeMap::new(),
            documents: vec![
                embedded("a", vec![0.0, 1.0]),
                embedded("b", vec![1.0, 0.1]),
                embedded("c", vec![1.0, 0.0]),
                embedded("d", vec![-1.0, 0.0]),
                embedded("e", vec![0.7, 0.7]),
            ],
        };
        let top = top_matches(&index, &[1.0, 0.0], TOP_K);
        let titles: Vec<&str> = top.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Doc c", "Doc b", "Doc e", "Doc a"]);
    }

    #[test]
    fn test_index_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ai_agri_embeddings.json");
        let index = EmbeddingIndex {
            model: "text-embedding-3-small".to_string(),
            signature: BTreeMap::new(),
            documents: vec![embedded("a", vec![0.5, 0.5])],
        };
        save_index(&index, &path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        // Flat document records, as other tools read them
        assert_eq!(raw["documents"][0]["id"], "a");
        assert!(raw["documents"][0]["embedding"].is_array());

        let loaded = load_index(&path).unwrap();
        assert_eq!(loaded.model, index.model);
        assert_eq!(loaded.documents[0].document, index.documents[0].document);
        assert!(load_index(&dir.path().join("missing.json")).is_none());
    }

    #[tokio::test]
    async fn test_ensure_index_uses_cache_for_matching_model() {
        use crate::config::ProjectPaths;
        use crate::data::crop_guide::CropGuide;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path(), &dir.path().join("artifacts"));
        let guide = CropGuide::from_parts(BTreeMap::new(), BTreeMap::new(), BTreeMap::new());
        let ctx = ChatContext::new(Arc::new(guide), Vec::new(), &paths);

        let providers = ChatProviders::disabled();
        let index = EmbeddingIndex {
            model: providers.embedding_model.clone(),
            signature: BTreeMap::new(),
            documents: vec![embedded("a", vec![0.5, 0.5])],
        };
        save_index(&index, &paths.embeddings_cache()).unwrap();

        let loaded = ensure_index(&ctx, &providers).await.unwrap();
        assert_eq!(loaded.documents.len(), 1);

        let mut other = providers.clone();
        other.embedding_model = "another-model".to_string();
        other.rag_rebuild = false;
        assert!(ensure_index(&ctx, &other).await.is_none());
    }
}
