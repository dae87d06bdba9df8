//! Tokenizer loading for the served model.

use crate::hub::HubClient;
use crate::traits::TextTokenizer;
use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info, instrument};

const TOKENIZER_FILE: &str = "tokenizer.json";

/// A `tokenizer.json` tokenizer.
pub struct HfTokenizer {
    inner: Tokenizer,
    source: String,
}

impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer")
            .field("source", &self.source)
            .finish()
    }
}

impl HfTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> ServeResult<Self> {
        let path = path.as_ref();
        let inner = Tokenizer::from_file(path).map_err(|e| {
            ServeError::new(ServeErrorKind::Tokenizer(format!(
                "Failed to load {}: {e}",
                path.display()
            )))
        })?;
        debug!(path = %path.display(), "Loaded tokenizer file");
        Ok(Self {
            inner,
            source: path.display().to_string(),
        })
    }

    /// Load a tokenizer by file path, model directory or hub repository id.
    ///
    /// Local paths win; anything else is fetched through `hub`.
    #[instrument(skip(hub))]
    pub fn from_pretrained(name_or_path: &str, hub: &HubClient) -> ServeResult<Self> {
        let local = Path::new(name_or_path);
        let mut tokenizer = if local.is_file() {
            Self::from_file(local)?
        } else if local.is_dir() {
            Self::from_file(local.join(TOKENIZER_FILE))?
        } else {
            Self::from_file(hub.fetch(name_or_path, TOKENIZER_FILE)?)?
        };
        tokenizer.source = name_or_path.to_string();
        info!(
            source = name_or_path,
            vocab_size = tokenizer.inner.get_vocab_size(true),
            "Tokenizer ready"
        );
        Ok(tokenizer)
    }

    /// Where the tokenizer was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> ServeResult<Vec<u32>> {
        let encoding = self.inner.encode(text, true).map_err(|e| {
            ServeError::new(ServeErrorKind::Tokenizer(format!("Failed to encode: {e}")))
        })?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, token_ids: &[u32]) -> ServeResult<String> {
        self.inner.decode(token_ids, true).map_err(|e| {
            ServeError::new(ServeErrorKind::Tokenizer(format!("Failed to decode: {e}")))
        })
    }
}
