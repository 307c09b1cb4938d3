//! Prefix tree over the registered operator spellings.
//!
//! The tokenizer falls back to [`SymbolTrie::longest_match`] when no token
//! reader claims the input, so `>>=` wins over `>>` and `>`.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Every multi- and single-character operator or punctuation mark.
pub const SYMBOLS: &[&str] = &[
    "(", ")", "[", "]", "{", "}", ",", ";", ".", ":", "?", "??", "??=", "=>", "=", "==", "!", "!=",
    "<", "<=", "<<", "<<=", ">", ">=", ">>", ">>=", "+", "++", "+=", "-", "--", "-=", "*", "**",
    "*=", "/", "/=", "%", "%=", "&", "&&", "&=", "|", "||", "|=", "^", "^=", "~",
];

#[derive(Debug, Default)]
pub struct SymbolTrie {
    children: HashMap<char, SymbolTrie>,
    terminal: bool,
}

impl SymbolTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_symbols<'s, I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut trie = SymbolTrie::new();
        for symbol in symbols {
            trie.insert(symbol);
        }
        trie
    }

    pub fn insert(&mut self, symbol: &str) {
        let mut node = self;
        for c in symbol.chars() {
            node = node.children.entry(c).or_default();
        }
        node.terminal = true;
    }

    /// Byte length of the longest registered symbol that prefixes `text`.
    pub fn longest_match(&self, text: &str) -> Option<usize> {
        let mut node = self;
        let mut best = None;

        for (i, c) in text.char_indices() {
            match node.children.get(&c) {
                Some(next) => {
                    node = next;
                    if node.terminal {
                        best = Some(i + c.len_utf8());
                    }
                }
                None => break,
            }
        }

        best
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.longest_match(symbol) == Some(symbol.len())
    }
}

/// Shared trie over [`SYMBOLS`].
pub fn default_symbols() -> &'static SymbolTrie {
    static TRIE: OnceLock<SymbolTrie> = OnceLock::new();
    TRIE.get_or_init(|| SymbolTrie::from_symbols(SYMBOLS.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let trie = default_symbols();
        assert_eq!(trie.longest_match(">>= 1"), Some(3));
        assert_eq!(trie.longest_match(">> 1"), Some(2));
        assert_eq!(trie.longest_match("> 1"), Some(1));
        assert_eq!(trie.longest_match("**2"), Some(2));
    }

    #[test]
    fn unknown_symbol_has_no_match() {
        assert_eq!(default_symbols().longest_match("#x"), None);
        assert_eq!(default_symbols().longest_match(""), None);
    }

    #[test]
    fn partial_path_is_not_a_symbol() {
        let trie = SymbolTrie::from_symbols(["<<="]);
        assert_eq!(trie.longest_match("<<"), None);
        assert!(trie.contains("<<="));
    }
}
