//! Glob-style key patterns with Redis `MATCH` semantics.
//!
//! Supports:
//! - `*` matches any sequence of characters (including empty)
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from the set or range
//! - `[^abc]` matches one character NOT in the set
//! - `\x` matches `x` literally
//!
//! Edge cases follow Redis `stringmatchlen`: an unterminated `[` opens a class
//! that runs to the end of the pattern, and `[a-]` is the range `a` to `]`.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    AnySequence,
    Class { negated: bool, items: Vec<ClassItem> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Single(char),
    Range(char, char),
}

impl Token {
    fn matches_char(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyChar => true,
            Token::AnySequence => false,
            Token::Class { negated, items } => {
                let hit = items.iter().any(|item| match item {
                    ClassItem::Single(s) => *s == c,
                    ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&c),
                });
                hit != *negated
            }
        }
    }
}

/// Pre-compiled glob pattern, tested against every key a scan visits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    source: String,
    tokens: Vec<Token>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            source: pattern.to_string(),
            tokens: parse(pattern),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the pattern matches every key (`*`, `**`, ...).
    pub fn matches_all(&self) -> bool {
        self.tokens.iter().all(|t| *t == Token::AnySequence) && !self.tokens.is_empty()
    }

    /// Literal text every matching key starts with.
    ///
    /// Ordered backends use it to seek straight to the candidate range.
    pub fn literal_prefix(&self) -> String {
        self.tokens
            .iter()
            .map_while(|t| match t {
                Token::Literal(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    pub fn matches(&self, key: &str) -> bool {
        let text: Vec<char> = key.chars().collect();
        let tokens = &self.tokens;

        let mut pi = 0;
        let mut ti = 0;
        // backtracking point for the most recent '*'
        let mut star: Option<(usize, usize)> = None;

        while ti < text.len() {
            if let Some(token) = tokens.get(pi) {
                if *token == Token::AnySequence {
                    star = Some((pi, ti));
                    pi += 1;
                    continue;
                }
                if token.matches_char(text[ti]) {
                    pi += 1;
                    ti += 1;
                    continue;
                }
            }

            match star {
                Some((star_pi, star_ti)) => {
                    // let the star swallow one more character
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    star = Some((star_pi, star_ti + 1));
                }
                None => return false,
            }
        }

        tokens[pi..].iter().all(|t| *t == Token::AnySequence)
    }
}

impl From<&str> for GlobPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

fn parse(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                if tokens.last() != Some(&Token::AnySequence) {
                    tokens.push(Token::AnySequence);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::AnyChar);
                i += 1;
            }
            '\\' if i + 1 < chars.len() => {
                tokens.push(Token::Literal(chars[i + 1]));
                i += 2;
            }
            '[' => {
                let (token, next) = parse_class(&chars, i + 1);
                tokens.push(token);
                i = next;
            }
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }

    tokens
}

/// Parse a character class body starting right after `[`.
/// Returns the token and the index after the class.
fn parse_class(chars: &[char], start: usize) -> (Token, usize) {
    let mut i = start;
    let negated = chars.get(i) == Some(&'^');
    if negated {
        i += 1;
    }

    let mut items = Vec::new();
    loop {
        match chars.get(i) {
            // unterminated class: it runs to the end of the pattern
            None => return (Token::Class { negated, items }, i),
            Some('\\') if i + 1 < chars.len() => {
                items.push(ClassItem::Single(chars[i + 1]));
                i += 2;
            }
            Some(']') => return (Token::Class { negated, items }, i + 1),
            Some(&c) if i + 2 < chars.len() && chars[i + 1] == '-' => {
                let end = chars[i + 2];
                let (lo, hi) = if c <= end { (c, end) } else { (end, c) };
                items.push(ClassItem::Range(lo, hi));
                i += 3;
            }
            Some(&c) => {
                items.push(ClassItem::Single(c));
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_prefix_family() {
        let p = GlobPattern::new("user:*");
        assert!(p.matches("user:1"));
        assert!(p.matches("user:"));
        assert!(p.matches("user:1:profile"));
        assert!(!p.matches("post:1"));
        assert!(!p.matches("users:1"));
    }

    #[test]
    fn test_match_all() {
        let p = GlobPattern::new("*");
        assert!(p.matches_all());
        assert!(p.matches(""));
        assert!(p.matches("anything:at:all"));
        assert!(!GlobPattern::new("a*").matches_all());
        assert!(!GlobPattern::new("").matches_all());
    }

    #[test]
    fn test_question_mark_and_inner_star() {
        let p = GlobPattern::new("h?llo*world");
        assert!(p.matches("hello world"));
        assert!(p.matches("hallo-big-world"));
        assert!(!p.matches("hllo world"));
        assert!(!p.matches("hello worlds"));
    }

    #[test]
    fn test_character_classes() {
        let p = GlobPattern::new("h[ae]llo");
        assert!(p.matches("hello"));
        assert!(p.matches("hallo"));
        assert!(!p.matches("hillo"));

        let negated = GlobPattern::new("h[^e]llo");
        assert!(negated.matches("hallo"));
        assert!(!negated.matches("hello"));

        let range = GlobPattern::new("key:[0-3]");
        assert!(range.matches("key:0"));
        assert!(range.matches("key:3"));
        assert!(!range.matches("key:4"));

        let reversed = GlobPattern::new("[z-a]");
        assert!(reversed.matches("m"));
    }

    #[test]
    fn test_escapes() {
        let p = GlobPattern::new(r"literal\*");
        assert!(p.matches("literal*"));
        assert!(!p.matches("literally"));

        let class = GlobPattern::new(r"[\]x]");
        assert!(class.matches("]"));
        assert!(class.matches("x"));
    }

    #[test]
    fn test_unterminated_class_runs_to_pattern_end() {
        let p = GlobPattern::new("a[b");
        assert!(p.matches("ab"));
        assert!(!p.matches("a[b"));

        let open = GlobPattern::new("key:[12");
        assert!(open.matches("key:1"));
        assert!(open.matches("key:2"));
        assert!(!open.matches("key:12"));
    }

    #[test]
    fn test_trailing_dash_is_range_to_bracket() {
        // ']' sorts before 'a', so the range is ']'..='a'
        let p = GlobPattern::new("x[a-]");
        assert!(p.matches("xa"));
        assert!(p.matches("x_"));
        assert!(!p.matches("x-"));
        assert!(!p.matches("xb"));
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(GlobPattern::new("user:*").literal_prefix(), "user:");
        assert_eq!(GlobPattern::new(r"a\?b?").literal_prefix(), "a?b");
        assert_eq!(GlobPattern::new("*").literal_prefix(), "");
        assert_eq!(GlobPattern::new("[ab]x").literal_prefix(), "");
    }
}
