use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use tiktoken_rs::{CoreBPE, cl100k_base, o200k_base, p50k_base, r50k_base};

static CL100K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| cl100k_base().map_err(|e| format!("Failed to load cl100k_base: {}", e)));
static O200K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| o200k_base().map_err(|e| format!("Failed to load o200k_base: {}", e)));
static P50K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| p50k_base().map_err(|e| format!("Failed to load p50k_base: {}", e)));
static R50K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| r50k_base().map_err(|e| format!("Failed to load r50k_base: {}", e)));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tokenizer {
    #[default]
    Cl100k,
    O200k,
    P50k,
    R50k,
    /// Word and punctuation runs; needs no encoding tables.
    Words,
}

impl Tokenizer {
    pub fn available() -> &'static [&'static str] {
        &["cl100k", "o200k", "p50k", "r50k", "words"]
    }

    fn bpe(&self) -> Option<&'static Lazy<Result<CoreBPE, String>>> {
        match self {
            Tokenizer::Cl100k => Some(&CL100K_BPE),
            Tokenizer::O200k => Some(&O200K_BPE),
            Tokenizer::P50k => Some(&P50K_BPE),
            Tokenizer::R50k => Some(&R50K_BPE),
            Tokenizer::Words => None,
        }
    }

    pub fn count(&self, text: &str) -> Result<usize> {
        match self.bpe() {
            Some(table) => {
                let bpe = table
                    .as_ref()
                    .map_err(|e| AppError::TikToken(e.clone()))?;
                Ok(bpe.encode_ordinary(text).len())
            }
            None => Ok(count_word_runs(text)),
        }
    }
}

impl fmt::Display for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tokenizer::Cl100k => "cl100k",
            Tokenizer::O200k => "o200k",
            Tokenizer::P50k => "p50k",
            Tokenizer::R50k => "r50k",
            Tokenizer::Words => "words",
        };
        f.write_str(name)
    }
}

impl FromStr for Tokenizer {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cl100k" | "cl100k_base" | "gpt-4" => Ok(Tokenizer::Cl100k),
            "o200k" | "o200k_base" | "gpt-4o" => Ok(Tokenizer::O200k),
            "p50k" | "p50k_base" => Ok(Tokenizer::P50k),
            "r50k" | "r50k_base" | "gpt2" => Ok(Tokenizer::R50k),
            "words" => Ok(Tokenizer::Words),
            _ => Err(AppError::Tokenizer(format!(
                "Unknown tokenizer '{}'. Available: {}",
                s,
                Tokenizer::available().join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFormat {
    Raw,
    Format,
}

impl FromStr for TokenFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Ok(TokenFormat::Raw),
            "format" => Ok(TokenFormat::Format),
            other => Err(AppError::Config(format!(
                "Unknown token display mode '{}'. Expected 'raw' or 'format'",
                other
            ))),
        }
    }
}

impl TokenFormat {
    /// `Raw` yields the bare integer, `Format` a short summary such as `~1.2k tokens`.
    pub fn describe(&self, count: usize) -> String {
        match self {
            TokenFormat::Raw => count.to_string(),
            TokenFormat::Format => {
                if count < 1_000 {
                    format!("~{} tokens", count)
                } else if count < 999_950 {
                    // Above this the one-decimal k value would round up to 1000.0k.
                    format!("~{:.1}k tokens", count as f64 / 1_000.0)
                } else {
                    format!("~{:.1}M tokens", count as f64 / 1_000_000.0)
                }
            }
        }
    }
}

fn count_word_runs(text: &str) -> usize {
    let mut count = 0;
    let mut previous: Option<bool> = None;
    for c in text.chars() {
        if c.is_whitespace() {
            previous = None;
            continue;
        }
        let is_word = c.is_alphanumeric() || c == '_';
        if previous != Some(is_word) {
            count += 1;
        }
        previous = Some(is_word);
    }
    count
}
