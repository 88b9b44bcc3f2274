//! Text preparation for synthesis: normalization, tokenization and budgeted chunking.

mod chunker;
mod normalize;
mod tokenizer;

pub use chunker::{TextChunk, TextChunker};
pub use normalize::{normalize_text, normalized_paragraphs};
pub use tokenizer::{CharTokenizer, TextTokenizer};
