//! Whitespace tokenization of a single card header line.
//!
//! A line is split into at most six tokens. The first five are individual
//! whitespace-delimited words; if content remains after the fifth, the
//! sixth token is the untouched remainder of the line (this is what lets
//! a card like `pragma link URL ARG MTIME` carry an unbounded tail without
//! the tokenizer needing to know the verb's arity in advance).
pub fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::with_capacity(6);
    let mut rest = line;
    for _ in 0..5 {
        let trimmed = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        if trimmed.is_empty() {
            rest = trimmed;
            break;
        }
        match trimmed.find(|c: char| c.is_ascii_whitespace()) {
            Some(idx) => {
                tokens.push(&trimmed[..idx]);
                rest = &trimmed[idx..];
            }
            None => {
                tokens.push(trimmed);
                rest = "";
                break;
            }
        }
    }
    let remainder = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
    if !remainder.is_empty() {
        tokens.push(remainder);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_line() {
        assert_eq!(tokenize("have a1b2"), vec!["have", "a1b2"]);
    }

    #[test]
    fn caps_at_six_tokens_preserving_remainder() {
        let toks = tokenize("pragma link http://x A B C D E F");
        assert_eq!(toks.len(), 6);
        assert_eq!(toks[5], "C D E F");
    }

    #[test]
    fn collapses_repeated_whitespace_between_tokens() {
        assert_eq!(tokenize("have   a1b2  1"), vec!["have", "a1b2", "1"]);
    }

    #[test]
    fn empty_line_yields_no_tokens() {
        assert!(tokenize("").is_empty());
    }
}
