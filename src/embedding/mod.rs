pub mod routes;

use std::path::PathBuf;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
pub use routes::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SIMILARITY_THRESHOLD;
use crate::server::errors::AppError;

pub type Embedding = Vec<f32>;

/// Anything that turns texts into fixed-size vectors, one per input, in order.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Embedding>>;

    fn model_info(&self) -> JSONModelInfo;
}

/// A fastembed text model together with its catalogue entry.
pub struct FastEmbedModel {
    text_embedding: TextEmbedding,
    info: JSONModelInfo,
}

impl FastEmbedModel {
    pub fn try_new(
        model_name: &EmbeddingModel,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> anyhow::Result<Self> {
        let info = get_current_model_info(model_name)?;
        let text_embedding = TextEmbedding::try_new(InitOptions {
            cache_dir,
            model_name: model_name.clone(),
            show_download_progress,
            ..Default::default()
        })?;
        Ok(Self {
            text_embedding,
            info,
        })
    }
}

impl Embedder for FastEmbedModel {
    fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Embedding>> {
        self.text_embedding.embed(texts, None)
    }

    fn model_info(&self) -> JSONModelInfo {
        self.info.clone()
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding inference failed: {0}")]
    Inference(String),
    #[error("model returned {got} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
    #[error("no candidate texts to compare against")]
    NoCandidates,
}

impl From<anyhow::Error> for EmbeddingError {
    fn from(err: anyhow::Error) -> Self {
        EmbeddingError::Inference(format!("{err:#}"))
    }
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Default)]
pub struct EmbedRequest {
    /// Text to embed; missing or null is treated as the empty string.
    #[serde(default)]
    pub text: Option<String>,
}

impl EmbedRequest {
    pub fn into_text(self) -> String {
        self.text.unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct EmbedResponse {
    pub embedding: Embedding,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Default)]
pub struct CompareRequest {
    /// Text to look up among `old_texts`.
    #[serde(default)]
    pub new_text: String,
    /// Candidate texts, scored in this order.
    #[serde(default)]
    pub old_texts: Vec<String>,
}

impl CompareRequest {
    /// Both fields must be non-empty.
    pub fn validate(&self) -> std::result::Result<(), AppError> {
        if self.new_text.is_empty() || self.old_texts.is_empty() {
            return Err(AppError::InvalidRequest);
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, JsonSchema, PartialEq)]
pub struct CompareResponse {
    pub new_text: String,
    pub scores: Vec<f32>,
    pub best_match_index: usize,
    pub best_score: f32,
    pub threshold_met: bool,
}

pub fn embed_text(
    model: &dyn Embedder,
    text: &str,
) -> std::result::Result<Embedding, EmbeddingError> {
    let start = tokio::time::Instant::now();
    let mut embeddings = model.embed(vec![text.to_string()])?;
    if embeddings.len() != 1 {
        return Err(EmbeddingError::CountMismatch {
            expected: 1,
            got: embeddings.len(),
        });
    }
    tracing::debug!(
        chars = text.chars().count(),
        elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "embedded text"
    );
    Ok(embeddings.swap_remove(0))
}

/// Scores every old text against `new_text`. Callers validate the request first.
pub fn compare_texts(
    model: &dyn Embedder,
    new_text: &str,
    old_texts: &[String],
) -> std::result::Result<CompareResponse, EmbeddingError> {
    let start = tokio::time::Instant::now();
    let new_embedding = embed_text(model, new_text)?;
    let old_embeddings = model.embed(old_texts.to_vec())?;
    if old_embeddings.len() != old_texts.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: old_texts.len(),
            got: old_embeddings.len(),
        });
    }

    let scores: Vec<f32> = old_embeddings
        .iter()
        .map(|old| cosine_similarity(&new_embedding, old))
        .collect();
    let (best_match_index, best_score) =
        best_match(&scores).ok_or(EmbeddingError::NoCandidates)?;

    tracing::debug!(
        candidates = scores.len(),
        best_match_index,
        best_score,
        elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "compared texts"
    );

    Ok(CompareResponse {
        new_text: new_text.to_string(),
        scores,
        best_match_index,
        best_score,
        threshold_met: threshold_met(best_score),
    })
}

/// Cosine of the angle between `a` and `b`, in [-1.0, 1.0].
///
/// Empty, mismatched or zero-norm inputs score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot = x.mul_add(y, dot);
        norm_a = x.mul_add(x, norm_a);
        norm_b = y.mul_add(y, norm_b);
    }

    let denom = (norm_a * norm_b).sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    (dot / denom) as f32
}

/// Index and value of the highest score. The first index wins ties and NaN never wins.
pub fn best_match(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        let better = match best {
            None => true,
            Some((_, current)) => score > current || (current.is_nan() && !score.is_nan()),
        };
        if better {
            best = Some((i, score));
        }
    }
    best
}

pub fn threshold_met(best_score: f32) -> bool {
    best_score > SIMILARITY_THRESHOLD
}

pub fn get_current_model_info(current_model: &EmbeddingModel) -> Result<JSONModelInfo> {
    let models_info = TextEmbedding::list_supported_models();
    if let Some(model) = models_info.iter().find(|s| s.model == *current_model) {
        Ok(JSONModelInfo {
            name: model.model_code.to_string(),
            dimension: model.dim as u32,
            description: model.description.clone(),
        })
    } else {
        Err(ModelNotFoundError)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct JSONModelInfo {
    pub name: String,
    pub dimension: u32,
    pub description: String,
}

type Result<T> = std::result::Result<T, ModelNotFoundError>;

#[derive(Debug, Clone, Error)]
#[error("The model you have searched for has not been found")]
pub struct ModelNotFoundError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns preset vectors keyed by text, zeros otherwise.
    struct TableEmbedder(Vec<(&'static str, Embedding)>);

    impl Embedder for TableEmbedder {
        fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Embedding>> {
            Ok(texts
                .iter()
                .map(|t| {
                    self.0
                        .iter()
                        .find(|(k, _)| *k == t.as_str())
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| vec![0.0; 3])
                })
                .collect())
        }

        fn model_info(&self) -> JSONModelInfo {
            JSONModelInfo {
                name: "table".to_string(),
                dimension: 3,
                description: "test".to_string(),
            }
        }
    }

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn embed(&self, _texts: Vec<String>) -> anyhow::Result<Vec<Embedding>> {
            Ok(Vec::new())
        }

        fn model_info(&self) -> JSONModelInfo {
            JSONModelInfo {
                name: "broken".to_string(),
                dimension: 0,
                description: String::new(),
            }
        }
    }

    fn strings(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, -1.2, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_and_opposite_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn best_match_prefers_first_of_equal_maxima() {
        assert_eq!(best_match(&[0.2, 0.9, 0.9, 0.1]), Some((1, 0.9)));
        assert_eq!(best_match(&[0.5, 0.5]), Some((0, 0.5)));
        assert_eq!(best_match(&[]), None);
    }

    #[test]
    fn best_match_skips_nan() {
        assert_eq!(best_match(&[f32::NAN, 0.1, 0.4]), Some((2, 0.4)));
        assert_eq!(best_match(&[0.3, f32::NAN]), Some((0, 0.3)));
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!threshold_met(0.70));
        assert!(!threshold_met(0.5));
        assert!(threshold_met(0.7001));
        assert!(threshold_met(1.0));
    }

    #[test]
    fn embed_request_defaults_missing_or_null_text() {
        let req: EmbedRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.into_text(), "");
        let req: EmbedRequest = serde_json::from_str(r#"{"text": null}"#).unwrap();
        assert_eq!(req.into_text(), "");
        let req: EmbedRequest = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert_eq!(req.into_text(), "hi");
    }

    #[test]
    fn compare_request_missing_fields_are_invalid() {
        let req: CompareRequest =
            serde_json::from_str(r#"{"old_texts": ["a"]}"#).unwrap();
        assert!(matches!(req.validate(), Err(AppError::InvalidRequest)));
        let req: CompareRequest = serde_json::from_str(r#"{"new_text": "a"}"#).unwrap();
        assert!(matches!(req.validate(), Err(AppError::InvalidRequest)));
        let req: CompareRequest =
            serde_json::from_str(r#"{"new_text": "a", "old_texts": []}"#).unwrap();
        assert!(matches!(req.validate(), Err(AppError::InvalidRequest)));
        let req: CompareRequest =
            serde_json::from_str(r#"{"new_text": "a", "old_texts": [""]}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn compare_scores_follow_input_order() {
        let model = TableEmbedder(vec![
            ("query", vec![1.0, 0.0, 0.0]),
            ("far", vec![0.0, 1.0, 0.0]),
            ("near", vec![1.0, 0.1, 0.0]),
            ("same", vec![2.0, 0.0, 0.0]),
        ]);
        let old = strings(&["far", "near", "same"]);
        let result = compare_texts(&model, "query", &old).unwrap();

        assert_eq!(result.new_text, "query");
        assert_eq!(result.scores.len(), 3);
        assert_eq!(result.scores[0], 0.0);
        assert!(result.scores[1] > 0.99 && result.scores[1] < 1.0);
        assert!((result.scores[2] - 1.0).abs() < 1e-6);
        assert_eq!(result.best_match_index, 2);
        assert_eq!(result.best_score, result.scores[2]);
        assert!(result.threshold_met);
    }

    #[test]
    fn compare_threshold_tracks_best_score() {
        let model = TableEmbedder(vec![
            ("query", vec![1.0, 0.0, 0.0]),
            ("other", vec![1.0, 1.0, 0.0]),
        ]);
        let result = compare_texts(&model, "query", &strings(&["other"])).unwrap();
        assert_eq!(result.best_match_index, 0);
        assert!((result.best_score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(result.best_score > 0.70);
        assert!(result.threshold_met);

        let result = compare_texts(&model, "query", &strings(&["unknown"])).unwrap();
        assert_eq!(result.best_score, 0.0);
        assert!(!result.threshold_met);
    }

    #[test]
    fn compare_without_candidates_fails() {
        let model = TableEmbedder(vec![]);
        let err = compare_texts(&model, "query", &[]).unwrap_err();
        assert!(matches!(err, EmbeddingError::NoCandidates));
    }

    #[test]
    fn embed_text_rejects_short_batches() {
        let err = embed_text(&BrokenEmbedder, "x").unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CountMismatch {
                expected: 1,
                got: 0
            }
        ));
    }

    #[test]
    fn default_model_is_in_catalogue() {
        let info = get_current_model_info(&EmbeddingModel::AllMiniLML6V2).unwrap();
        assert_eq!(info.dimension, 384);
    }
}
