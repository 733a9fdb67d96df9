//! Whitespace and quote aware splitting of multi-valued fields.
//!
//! Tokens are returned as (offset, length) spans into the caller's text so a
//! caller can highlight an offending token without re-scanning.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Unterminated quoted token starting at position {position}")]
    UnclosedQuote { position: usize },
}

/// Byte span of one token inside the parsed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct TokenParser {
    whitespace: Vec<char>,
    open_quotes: Vec<char>,
    close_quotes: Vec<char>,
    max_tokens: usize,
}

impl Default for TokenParser {
    /// Splits on blanks and commas, double quotes group.
    fn default() -> Self {
        Self::new(" \t\r\n,", "\"", "\"", 1024)
    }
}

impl TokenParser {
    pub fn new(whitespace: &str, open_quotes: &str, close_quotes: &str, max_tokens: usize) -> Self {
        Self {
            whitespace: whitespace.chars().collect(),
            open_quotes: open_quotes.chars().collect(),
            close_quotes: close_quotes.chars().collect(),
            max_tokens,
        }
    }

    pub fn set_whitespace(&mut self, chars: &str) { self.whitespace = chars.chars().collect(); }
    pub fn set_quotes(&mut self, open: &str, close: &str) {
        self.open_quotes = open.chars().collect();
        self.close_quotes = close.chars().collect();
    }
    pub fn set_max_tokens(&mut self, max: usize) { self.max_tokens = max; }

    fn is_close_for(&self, open_idx: usize, c: char) -> bool {
        // Quote pairs match by position when the alphabets line up.
        if self.open_quotes.len() == self.close_quotes.len() {
            self.close_quotes[open_idx] == c
        } else {
            self.close_quotes.contains(&c)
        }
    }

    /// Splits `text` into tokens. Tokens past the cap are dropped silently.
    pub fn parse<'a>(&self, text: &'a str) -> Result<Tokens<'a>, TokenError> {
        let mut spans = Vec::new();
        let mut chars = text.char_indices().peekable();

        while let Some(&(pos, c)) = chars.peek() {
            if self.whitespace.contains(&c) {
                chars.next();
                continue;
            }
            if spans.len() >= self.max_tokens {
                break;
            }

            if let Some(open_idx) = self.open_quotes.iter().position(|&q| q == c) {
                // Quoted: runs verbatim to the matching close quote.
                chars.next();
                let start = pos + c.len_utf8();
                let mut end = None;
                for (p, ch) in chars.by_ref() {
                    if self.is_close_for(open_idx, ch) {
                        end = Some(p);
                        break;
                    }
                }
                let end = end.ok_or(TokenError::UnclosedQuote { position: start })?;
                spans.push(Span { offset: start, len: end - start });
            } else {
                let start = pos;
                let mut end = text.len();
                while let Some(&(p, ch)) = chars.peek() {
                    if self.whitespace.contains(&ch) {
                        end = p;
                        break;
                    }
                    chars.next();
                }
                spans.push(Span { offset: start, len: end - start });
            }
        }

        Ok(Tokens { text, spans })
    }

    /// Number of tokens in `text`.
    pub fn count(&self, text: &str) -> Result<usize, TokenError> {
        Ok(self.parse(text)?.len())
    }
}

/// The tokens of one parsed text, borrowed from it.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    text: &'a str,
    spans: Vec<Span>,
}

impl<'a> Tokens<'a> {
    pub fn len(&self) -> usize { self.spans.len() }
    pub fn is_empty(&self) -> bool { self.spans.is_empty() }

    pub fn get(&self, idx: usize) -> Option<&'a str> {
        let span = self.spans.get(idx)?;
        self.text.get(span.offset..span.offset + span.len)
    }

    pub fn span(&self, idx: usize) -> Option<Span> { self.spans.get(idx).copied() }

    pub fn iter(&self) -> impl Iterator<Item = (Span, &'a str)> + '_ {
        let text = self.text;
        self.spans.iter().map(move |s| (*s, &text[s.offset..s.offset + s.len]))
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(|(_, t)| t.to_string()).collect()
    }
}
