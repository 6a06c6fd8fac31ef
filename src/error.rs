use std::fmt::Display;

/// Driver-side failures: command line misuse and file I/O. Diagnostics
/// produced during compilation never surface here; compilation always runs
/// to completion.
#[derive(Debug)]
pub enum Error {
    Cli(String),
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn cli<T>(message: &str) -> Result<T> {
        Err(Error::Cli(String::from(message)))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Cli(message) => write!(f, "{message}"),
            Error::Io(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    SyntaxShape,
    UnresolvedSymbol,
    SemanticRule,
    Warning,
    Completeness,
}

/// One recoverable finding from code generation. All kinds are non-fatal:
/// the compiler reports and keeps emitting best-effort output.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub line: u32,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DiagnosticKind::Warning => {
                write!(f, "[Error / Warning] {} Line {}", self.message, self.line)
            }
            DiagnosticKind::Completeness => write!(f, "[Error] {}!", self.message),
            _ => write!(f, "[Error] {}! Line {}", self.message, self.line),
        }
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: DiagnosticKind, line: u32, message: String) {
        self.0.push(Diagnostic {
            kind,
            line,
            message,
        });
    }

    pub fn syntax(&mut self, line: u32, message: impl Into<String>) {
        self.push(DiagnosticKind::SyntaxShape, line, message.into());
    }

    pub fn unresolved(&mut self, line: u32, message: impl Into<String>) {
        self.push(DiagnosticKind::UnresolvedSymbol, line, message.into());
    }

    pub fn semantic(&mut self, line: u32, message: impl Into<String>) {
        self.push(DiagnosticKind::SemanticRule, line, message.into());
    }

    pub fn warning(&mut self, line: u32, message: impl Into<String>) {
        self.push(DiagnosticKind::Warning, line, message.into());
    }

    pub fn completeness(&mut self, message: impl Into<String>) {
        self.push(DiagnosticKind::Completeness, 0, message.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(move |d| d.kind == kind)
    }
}
