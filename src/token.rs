use std::fmt::Display;

/// One tokenized physical source line.
pub type Line = Vec<Token>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    TypeName,
    Identifier,
    Numeric,
    Keyword,
    Macro,
    Operator,
    Comparison,
    Comment,
    Scope,
    Semicolon,
    Assignment,
    Referral,
    Parenthesis,
    IndexBracket,
    Unknown,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::TypeName => write!(f, "a variable type"),
            TokenKind::Identifier => write!(f, "a name of a variable or function"),
            TokenKind::Numeric => write!(f, "a numeric literal (number)"),
            TokenKind::Keyword => write!(f, "a keyword"),
            TokenKind::Macro => write!(f, "a macro"),
            TokenKind::Operator => write!(f, "an operator"),
            TokenKind::Comparison => write!(f, "a boolean operator"),
            TokenKind::Comment => write!(f, "a comment"),
            TokenKind::Scope => write!(f, "a scope brace"),
            TokenKind::Semicolon => write!(f, "a semicolon"),
            TokenKind::Assignment => write!(f, "an assignment operator"),
            TokenKind::Referral => write!(f, "a referral"),
            TokenKind::Parenthesis => write!(f, "a parenthesis"),
            TokenKind::IndexBracket => write!(f, "square brackets"),
            TokenKind::Unknown => write!(f, "no valid token"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    #[inline]
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}
