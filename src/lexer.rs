use crate::token::{Line, Token, TokenKind};

const TYPE_NAMES: &[&str] = &[
    "bool", "boolean", "byte", "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64",
    "uint64", "void",
];
const MACROS: &[&str] = &["exit!", "negate!", "clamp!", "repeat!", "swap!"];
const KEYWORDS: &[&str] = &["global", "local", "if", "define", "return", "true", "false"];
const COMPARISONS: &[&str] = &["?", "<=", "<", ">=", ">", "==", "!="];
const OPERATORS: &[&str] = &["++", "--", "->", "+", "-", "*", "/", ","];

#[inline]
fn is_operator_char(ch: char) -> bool {
    matches!(ch, '+' | '-' | '*' | '/' | ',')
}

#[inline]
fn is_comparison_char(ch: char) -> bool {
    matches!(ch, '=' | '!' | '<' | '>' | '?')
}

// Characters that terminate an identifier run. Everything else, including
// '!' and '=', is swallowed into the run (that is how macro names like
// "exit!" become a single token).
#[inline]
fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace()
        || matches!(ch, ':' | '(' | ')' | ';' | '[' | ']' | '{' | '}')
        || is_operator_char(ch)
}

pub struct Lexer<'a> {
    source: &'a str,
    in_comment: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            in_comment: false,
        }
    }

    /// Tokenizes the whole source and hands the finished line sequence to
    /// `on_complete`. The callback runs exactly once, after the last line.
    pub fn run<F: FnOnce(Vec<Line>)>(self, on_complete: F) {
        on_complete(self.collect());
    }

    /// Tokenizes the whole source. Lines that yield no tokens are dropped,
    /// so every token carries its own source line number.
    pub fn collect(mut self) -> Vec<Line> {
        let source = self.source;
        let mut lines = Vec::new();
        for (number, line) in source.lines().enumerate() {
            let tokens = self.scan_line(line, number as u32 + 1);
            if !tokens.is_empty() {
                lines.push(tokens);
            }
        }
        lines
    }

    fn scan_line(&mut self, line: &str, number: u32) -> Line {
        let chars: Vec<char> = line.chars().collect();
        let len = chars.len();
        let mut tokens = Line::new();
        let mut i = 0;

        while i < len {
            if self.in_comment {
                if chars[i] == '*' && i + 1 < len && chars[i + 1] == '/' {
                    self.in_comment = false;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }

            let ch = chars[i];

            if ch == '/' && i + 1 < len {
                if chars[i + 1] == '/' {
                    break;
                }
                if chars[i + 1] == '*' {
                    self.in_comment = true;
                    i += 2;
                    continue;
                }
            }

            if ch.is_whitespace() {
                i += 1;
                continue;
            }

            if ch.is_ascii_alphabetic() || ch == '_' {
                let start = i;
                while i < len && !is_delimiter(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let kind = if TYPE_NAMES.contains(&word.as_str()) {
                    TokenKind::TypeName
                } else if MACROS.contains(&word.as_str()) {
                    TokenKind::Macro
                } else if KEYWORDS.contains(&word.as_str()) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Identifier
                };
                tokens.push(Token::new(kind, word, number));
                continue;
            }

            let negative = ch == '-' && i + 1 < len && chars[i + 1].is_ascii_digit();
            if ch.is_ascii_digit() || negative {
                let start = i;
                if negative {
                    i += 1;
                }
                while i < len && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let number_text: String = chars[start..i].iter().collect();
                tokens.push(Token::new(TokenKind::Numeric, number_text, number));
                continue;
            }

            if is_comparison_char(ch) {
                let start = i;
                while i < len && is_comparison_char(chars[i]) {
                    i += 1;
                }
                let mut run: String = chars[start..i].iter().collect();
                if !COMPARISONS.contains(&run.as_str()) && run.len() > 1 {
                    run.pop();
                    i -= 1;
                }
                if COMPARISONS.contains(&run.as_str()) {
                    tokens.push(Token::new(TokenKind::Comparison, run, number));
                } else if run == "=" {
                    tokens.push(Token::new(TokenKind::Assignment, run, number));
                } else {
                    // unrecognized run, drop its first character
                    i = start + 1;
                }
                continue;
            }

            if is_operator_char(ch) || ch == '>' {
                let start = i;
                while i < len && (is_operator_char(chars[i]) || chars[i] == '>') {
                    i += 1;
                }
                let mut run: String = chars[start..i].iter().collect();
                if !OPERATORS.contains(&run.as_str()) && run.len() > 1 {
                    run.truncate(run.len() - 1);
                    i -= 1;
                }
                if OPERATORS.contains(&run.as_str()) {
                    tokens.push(Token::new(TokenKind::Operator, run, number));
                } else {
                    i = start + 1;
                }
                continue;
            }

            match ch {
                '(' | ')' => tokens.push(Token::new(TokenKind::Parenthesis, ch, number)),
                '[' | ']' => tokens.push(Token::new(TokenKind::IndexBracket, ch, number)),
                '{' | '}' => tokens.push(Token::new(TokenKind::Scope, ch, number)),
                ':' => tokens.push(Token::new(TokenKind::Referral, ch, number)),
                ';' => tokens.push(Token::new(TokenKind::Semicolon, ch, number)),
                _ => {} // unrecognized characters are dropped
            }
            i += 1;
        }

        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &Line) -> Vec<TokenKind> {
        line.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn blank_and_comment_lines_yield_nothing() {
        let source = "\n   \n// only a comment\n/* block\nstill inside\n*/\n";
        let lines = Lexer::new(source).collect();
        assert!(lines.is_empty());
    }

    #[test]
    fn block_comment_spans_lines() {
        let source = "local a : int32 = 1; /* start\nthis is skipped\nend */ local b : int32 = 2;";
        let lines = Lexer::new(source).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0][1].text, "a");
        assert_eq!(lines[1][1].text, "b");
        assert_eq!(lines[1][0].line, 3);
    }

    #[test]
    fn line_comment_ends_the_line() {
        let lines = Lexer::new("x++; // trailing words ( ) {").collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            kinds(&lines[0]),
            vec![TokenKind::Identifier, TokenKind::Operator, TokenKind::Semicolon]
        );
    }

    #[test]
    fn numeric_literals_keep_exact_text() {
        for text in ["0", "42", "-7", "123456789"] {
            let lines = Lexer::new(text).collect();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].len(), 1);
            assert_eq!(lines[0][0].kind, TokenKind::Numeric);
            assert_eq!(lines[0][0].text, text);
        }
    }

    #[test]
    fn declaration_token_sequence() {
        let lines = Lexer::new("local x : int32 = 5;").collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            kinds(&lines[0]),
            vec![
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Referral,
                TokenKind::TypeName,
                TokenKind::Assignment,
                TokenKind::Numeric,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn macro_names_are_single_tokens() {
        let lines = Lexer::new("exit!(0);").collect();
        assert_eq!(lines[0][0].kind, TokenKind::Macro);
        assert_eq!(lines[0][0].text, "exit!");
    }

    #[test]
    fn multi_character_operators() {
        let lines = Lexer::new("define add(a : int32) -> int32").collect();
        let arrow = lines[0].iter().find(|t| t.text == "->").unwrap();
        assert_eq!(arrow.kind, TokenKind::Operator);

        let lines = Lexer::new("counter++;").collect();
        assert_eq!(lines[0][1].kind, TokenKind::Operator);
        assert_eq!(lines[0][1].text, "++");

        let lines = Lexer::new("a <= b == c != d").collect();
        let cmp: Vec<&str> = lines[0]
            .iter()
            .filter(|t| t.kind == TokenKind::Comparison)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(cmp, vec!["<=", "==", "!="]);
    }

    #[test]
    fn completion_callback_receives_all_lines() {
        let mut seen = 0;
        Lexer::new("x++;\ny--;").run(|lines| seen = lines.len());
        assert_eq!(seen, 2);
    }

    #[test]
    fn lone_assignment_token() {
        let lines = Lexer::new("x = 5;").collect();
        assert_eq!(lines[0][1].kind, TokenKind::Assignment);
    }

    #[test]
    fn unknown_characters_are_dropped() {
        let lines = Lexer::new("x @ # = $ 5;").collect();
        assert_eq!(
            kinds(&lines[0]),
            vec![
                TokenKind::Identifier,
                TokenKind::Assignment,
                TokenKind::Numeric,
                TokenKind::Semicolon,
            ]
        );
    }
}
