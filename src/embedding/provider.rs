// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! The default provider runs sentence-transformers/all-MiniLM-L6-v2 through
//! fastembed. A command provider and a deterministic hashing provider cover
//! external embedders and offline use.

use anyhow::{bail, Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde_json::Value;
use std::borrow::Cow;
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::config::{EmbeddingConfig, EmbeddingProviderType};

/// Output dimension of all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

const DEFAULT_FASTEMBED_MODEL: &str = "minilm";
const DEFAULT_FASTEMBED_BATCH_SIZE: usize = 256;
const MAX_FASTEMBED_BATCH_SIZE: usize = 1024;
const DEFAULT_FASTEMBED_MAX_CHARS: usize = 2000;
const DEFAULT_COMMAND_BATCH_SIZE: usize = 64;

/// Configuration for the fastembed provider.
#[derive(Debug, Clone)]
pub struct EmbeddingProviderConfig {
    pub model: EmbeddingModel,
    pub batch_size: usize,
    pub max_chars: usize,
    pub normalize: bool,
}

impl EmbeddingProviderConfig {
    pub fn from_env() -> Result<Self> {
        let model = parse_model(&env::var("FASTEMBED_MODEL").unwrap_or_default())?;
        let mut batch_size = parse_usize_env("FASTEMBED_BATCH_SIZE", DEFAULT_FASTEMBED_BATCH_SIZE)?;
        if batch_size == 0 {
            batch_size = DEFAULT_FASTEMBED_BATCH_SIZE;
        }
        if batch_size > MAX_FASTEMBED_BATCH_SIZE {
            tracing::warn!(
                batch_size,
                max = MAX_FASTEMBED_BATCH_SIZE,
                "FASTEMBED_BATCH_SIZE exceeds maximum; clamping"
            );
            batch_size = MAX_FASTEMBED_BATCH_SIZE;
        }

        let mut max_chars = parse_usize_env("FASTEMBED_MAX_CHARS", DEFAULT_FASTEMBED_MAX_CHARS)?;
        if max_chars == 0 {
            max_chars = DEFAULT_FASTEMBED_MAX_CHARS;
        }

        let normalize = parse_bool_env("FASTEMBED_NORMALIZE", true)?;

        Ok(Self {
            model,
            batch_size,
            max_chars,
            normalize,
        })
    }
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self {
            model: EmbeddingModel::AllMiniLML6V2,
            batch_size: DEFAULT_FASTEMBED_BATCH_SIZE,
            max_chars: DEFAULT_FASTEMBED_MAX_CHARS,
            normalize: true,
        }
    }
}

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Returns the length of every vector this provider produces.
    fn dimension(&self) -> usize;

    /// Returns the batch size used by the provider.
    fn batch_size(&self) -> usize;

    /// Generates embeddings for the given texts.
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()])?;
        let vector = result
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))?;
        if vector.len() != self.dimension() {
            bail!(
                "Model {} returned a {}-dimensional vector, expected {}",
                self.model_id(),
                vector.len(),
                self.dimension()
            );
        }
        Ok(vector)
    }
}

/// Builds the provider selected by the embedding configuration.
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    let provider: Box<dyn EmbeddingProvider> = match config.provider() {
        EmbeddingProviderType::Builtin => {
            let mut provider_config = EmbeddingProviderConfig::from_env()?;
            if let Some(model) = config.model.as_deref() {
                provider_config.model = parse_model(model)?;
            }
            Box::new(FastEmbedder::new(provider_config)?)
        }
        EmbeddingProviderType::Command => Box::new(CommandProvider::new(
            config.command().to_string(),
            config.model().to_string(),
            config.dimension(),
        )),
        EmbeddingProviderType::Hash => Box::new(HashEmbedder::new(config.dimension())),
    };

    tracing::debug!(
        model = provider.model_id(),
        dimension = provider.dimension(),
        "embedding provider ready"
    );
    Ok(provider)
}

/// FastEmbed provider using sentence-transformers/all-MiniLM-L6-v2.
pub struct FastEmbedder {
    embedder: TextEmbedding,
    config: EmbeddingProviderConfig,
    model_id: String,
}

impl FastEmbedder {
    pub fn new(config: EmbeddingProviderConfig) -> Result<Self> {
        let model = config.model.clone();
        let model_id = model.to_string();
        let init = InitOptions::new(model);
        let embedder =
            TextEmbedding::try_new(init).context("Failed to initialize fastembed model")?;

        Ok(Self {
            embedder,
            config,
            model_id,
        })
    }

}

impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        DEFAULT_EMBEDDING_DIM
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = truncate_texts(texts, self.config.max_chars);
        let mut embeddings = self
            .embedder
            .embed(&prepared, Some(self.config.batch_size))?;

        if self.config.normalize {
            for embedding in embeddings.iter_mut() {
                l2_normalize(embedding);
            }
        }

        Ok(embeddings)
    }
}

/// Command provider that shells out to an external embedder process.
///
/// The command receives `{"model": ..., "texts": [...]}` on stdin and must
/// print a JSON array of vectors (or an object holding one under
/// `embeddings`, `vectors` or `data`).
pub struct CommandProvider {
    command: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl CommandProvider {
    pub fn new(command: String, model: String, dimension: usize) -> Self {
        Self {
            command,
            model,
            dimension,
            batch_size: DEFAULT_COMMAND_BATCH_SIZE,
        }
    }

    fn run_command(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": texts,
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.to_string().as_bytes())
                .context("Failed to write embeddings payload to stdin")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to read embeddings command output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Embedding command failed (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: Value = serde_json::from_str(stdout.trim())
            .context("Failed to parse embeddings command output as JSON")?;
        let vectors = parse_vectors(parsed)?;

        if vectors.len() != texts.len() {
            bail!(
                "Embedding command returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.run_command(batch)?);
        }
        Ok(vectors)
    }
}

/// Deterministic feature-hashing embedder.
///
/// Lower-cased word tokens are hashed into `dimension` signed buckets and the
/// result is L2-normalized, so texts sharing words land close together.
/// Needs no model download; used for tests and offline runs.
pub struct HashEmbedder {
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model: "feature-hash".to_string(),
            dimension: dimension.max(1),
            batch_size: DEFAULT_FASTEMBED_BATCH_SIZE,
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (bucket, sign) = token_bucket(&token.to_lowercase(), self.dimension);
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

/// Bucket and sign for one token, from its blake3 digest.
///
/// The digest is stable across builds, so vectors written to a persistent
/// store stay comparable with new queries.
fn token_bucket(token: &str, dimension: usize) -> (usize, f32) {
    let hash = blake3::hash(token.as_bytes());
    let bytes = hash.as_bytes();
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);

    let bucket = (u64::from_le_bytes(word) % dimension as u64) as usize;
    let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
    (bucket, sign)
}

impl EmbeddingProvider for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

fn parse_vectors(parsed: Value) -> Result<Vec<Vec<f32>>> {
    let embeddings_value = match parsed {
        Value::Array(arr) => Value::Array(arr),
        Value::Object(mut obj) => ["embeddings", "vectors", "data"]
            .iter()
            .find_map(|key| obj.remove(*key))
            .ok_or_else(|| anyhow::anyhow!("Embeddings command output missing 'embeddings' field"))?,
        _ => bail!("Embeddings command output must be JSON array or object"),
    };

    embeddings_value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Embeddings output must be a JSON array"))?
        .iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| anyhow::anyhow!("Embedding row must be an array"))?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .ok_or_else(|| anyhow::anyhow!("Embedding value must be a number"))
                        .map(|v| v as f32)
                })
                .collect::<Result<Vec<f32>>>()
        })
        .collect()
}

fn truncate_texts(texts: &[String], max_chars: usize) -> Vec<Cow<'_, str>> {
    texts
        .iter()
        .map(|text| truncate_to_chars(text.as_str(), max_chars))
        .collect()
}

fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

fn parse_model(raw: &str) -> Result<EmbeddingModel> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(EmbeddingModel::AllMiniLML6V2);
    }

    match value.to_lowercase().as_str() {
        "minilm"
        | "all-minilm-l6-v2"
        | "allminilm-l6-v2"
        | "sentence-transformers/all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        other => bail!(
            "Unsupported embedding model '{}'. Supported value: {}",
            other,
            DEFAULT_FASTEMBED_MODEL
        ),
    }
}

fn parse_usize_env(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                Ok(default)
            } else {
                value
                    .parse::<usize>()
                    .with_context(|| format!("Invalid {} value: {}", name, value))
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}

fn parse_bool_env(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw.trim().to_lowercase();
            if value.is_empty() {
                return Ok(default);
            }
            match value.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => bail!("Invalid {} value: {}", name, other),
            }
        }
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_dimension() {
        let mut provider = HashEmbedder::new(384);
        assert_eq!(provider.model_id(), "feature-hash");

        let result = provider
            .embed_texts(&["hello".to_string(), "world".to_string()])
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 384);
    }

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let mut provider = HashEmbedder::new(64);
        let first = provider.embed_one("The cat sat on the mat").unwrap();
        let second = provider.embed_one("The cat sat on the mat").unwrap();
        assert_eq!(first, second);

        let mut other = HashEmbedder::new(64);
        assert_eq!(other.embed_one("The cat sat on the mat").unwrap(), first);
    }

    #[test]
    fn test_hash_embedder_is_normalized() {
        let mut provider = HashEmbedder::new(32);
        let vector = provider.embed_one("vectors and embeddings").unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let blank = provider.embed_one("  ").unwrap();
        assert!(blank.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_hash_embedder_buckets_are_pinned() {
        assert_eq!(token_bucket("hello", 384), (362, 1.0));
        assert_eq!(token_bucket("abc", 384), (356, -1.0));

        let mut provider = HashEmbedder::new(384);
        let vector = provider.embed_one("Hello").unwrap();
        assert_eq!(vector[362], 1.0);
        assert_eq!(vector.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn test_hash_embedder_ignores_case_and_punctuation() {
        let mut provider = HashEmbedder::new(128);
        let a = provider.embed_one("Hello, World!").unwrap();
        let b = provider.embed_one("hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_embed() {
        let mut provider = HashEmbedder::new(384);
        let result = provider.embed_texts(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_command_provider_reads_vectors() {
        let mut provider = CommandProvider::new(
            r#"cat > /dev/null; echo '{"embeddings": [[1, 0, 0], [0, 1, 0]]}'"#.to_string(),
            "test-model".to_string(),
            3,
        );
        let vectors = provider
            .embed_texts(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_command_provider_dimension_mismatch() {
        let mut provider = CommandProvider::new(
            "cat > /dev/null; echo '[[1, 2]]'".to_string(),
            "test-model".to_string(),
            3,
        );
        assert!(provider.embed_one("a").is_err());
    }

    #[test]
    fn test_command_provider_failure() {
        let mut provider = CommandProvider::new(
            "cat > /dev/null; echo boom >&2; exit 3".to_string(),
            "test-model".to_string(),
            3,
        );
        let err = provider.embed_one("a").unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_parse_vectors_shapes() {
        let vectors = parse_vectors(serde_json::json!({"data": [[0.5]]})).unwrap();
        assert_eq!(vectors, vec![vec![0.5]]);
        assert!(parse_vectors(serde_json::json!({"other": []})).is_err());
        assert!(parse_vectors(serde_json::json!("nope")).is_err());
        assert!(parse_vectors(serde_json::json!([["x"]])).is_err());
    }

    #[test]
    fn test_parse_model() {
        assert!(matches!(parse_model(""), Ok(EmbeddingModel::AllMiniLML6V2)));
        assert!(matches!(
            parse_model("sentence-transformers/all-MiniLM-L6-v2"),
            Ok(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(parse_model("gpt-embed").is_err());
    }

    #[test]
    fn test_truncate_to_chars() {
        let input = "hello";
        assert_eq!(
            truncate_to_chars(input, 2),
            Cow::<str>::Owned("he".to_string())
        );
        assert_eq!(truncate_to_chars(input, 5), Cow::Borrowed(input));
        assert_eq!(truncate_to_chars("héllo", 2), Cow::<str>::Owned("hé".to_string()));
    }
}
