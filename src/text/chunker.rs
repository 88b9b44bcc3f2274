use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::normalize::normalized_paragraphs;
use super::tokenizer::TextTokenizer;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?:]\s+").expect("sentence regex must compile"));

/// Contiguous piece of normalized text sized for one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub token_count: usize,
}

/// Splits long text into chunks of at most `max_tokens` tokens.
///
/// Pieces end at sentence punctuation or paragraph breaks and are packed greedily.
/// A piece that alone exceeds the budget is packed word by word instead, and a
/// single word longer than the budget is cut into exact token windows.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    max_tokens: usize,
}

impl TextChunker {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn chunk(&self, text: &str, tokenizer: &dyn TextTokenizer) -> Vec<TextChunk> {
        let mut packer = Packer::new(self.max_tokens, tokenizer);
        for paragraph in normalized_paragraphs(text) {
            for sentence in split_sentences(&paragraph) {
                packer.push_piece(sentence);
            }
        }
        let chunks = packer.finish();
        debug!(
            "Chunked {} chars into {} chunks (budget {} tokens)",
            text.len(),
            chunks.len(),
            self.max_tokens
        );
        chunks
    }
}

/// Split after sentence punctuation that is followed by whitespace, keeping the punctuation.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for found in SENTENCE_END.find_iter(paragraph) {
        let end = found.start() + 1;
        push_trimmed(&mut pieces, &paragraph[start..end]);
        start = found.end();
    }
    push_trimmed(&mut pieces, &paragraph[start..]);
    pieces
}

fn push_trimmed<'a>(pieces: &mut Vec<&'a str>, piece: &'a str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        pieces.push(piece);
    }
}

struct Packer<'t> {
    max_tokens: usize,
    tokenizer: &'t dyn TextTokenizer,
    current: Vec<String>,
    current_tokens: usize,
    chunks: Vec<TextChunk>,
}

impl<'t> Packer<'t> {
    fn new(max_tokens: usize, tokenizer: &'t dyn TextTokenizer) -> Self {
        Self {
            max_tokens,
            tokenizer,
            current: Vec::new(),
            current_tokens: 0,
            chunks: Vec::new(),
        }
    }

    fn push_piece(&mut self, piece: &str) {
        let tokens = self.tokenizer.count(piece);
        if tokens > self.max_tokens {
            self.flush();
            self.push_words(piece);
            self.flush();
            return;
        }
        self.append(piece, tokens);
    }

    fn push_words(&mut self, piece: &str) {
        for word in piece.split(' ').filter(|word| !word.is_empty()) {
            let tokens = self.tokenizer.count(word);
            if tokens > self.max_tokens {
                self.flush();
                self.push_sliced_word(word);
            } else {
                self.append(word, tokens);
            }
        }
    }

    fn push_sliced_word(&mut self, word: &str) {
        let ids = self.tokenizer.encode(word);
        for window in ids.chunks(self.max_tokens) {
            let text = self.tokenizer.decode(window);
            if !text.is_empty() {
                self.chunks.push(TextChunk {
                    text,
                    token_count: window.len(),
                });
            }
        }
    }

    fn append(&mut self, piece: &str, tokens: usize) {
        let joined = if self.current.is_empty() {
            tokens
        } else {
            self.current_tokens + 1 + tokens
        };
        if !self.current.is_empty() && joined > self.max_tokens {
            self.flush();
            self.current_tokens = tokens;
        } else {
            self.current_tokens = joined;
        }
        self.current.push(piece.to_string());
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let text = self.current.join(" ");
        let token_count = self.tokenizer.count(&text);
        self.chunks.push(TextChunk { text, token_count });
        self.current.clear();
        self.current_tokens = 0;
    }

    fn finish(mut self) -> Vec<TextChunk> {
        self.flush();
        self.chunks
    }
}
