/// Maps text to the integer ids a speech model consumes.
pub trait TextTokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;

    fn decode(&self, ids: &[u32]) -> String;

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// Character-level tokenizer; ids are Unicode scalar values.
///
/// One token per character, including spaces, so joining two pieces with a
/// space costs exactly one token.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl TextTokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, ids: &[u32]) -> String {
        ids.iter().filter_map(|&id| char::from_u32(id)).collect()
    }

    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_inverts_encode() {
        let text = "Caf\u{e9} \u{2014} ok?";
        let ids = CharTokenizer.encode(text);
        assert_eq!(ids.len(), CharTokenizer.count(text));
        assert_eq!(CharTokenizer.decode(&ids), text);
    }

    #[test]
    fn invalid_ids_are_dropped() {
        assert_eq!(CharTokenizer.decode(&[104, 0xD800, 105]), "hi");
    }
}
