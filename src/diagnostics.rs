//! Unified, `miette`-based diagnostics for the stitching pipeline.
//!
//! Every stage (session creation, parsing, locating, merging, analysis) reports failure
//! through [`StitchError`]. Build errors with the `err_msg!` and `err_ctx!` macros rather
//! than by hand:
//!
//! - `err_msg!(NoNodesFound, "fragment contract '{}' is empty", name)`
//! - `err_ctx!(ParseFailed, message, &source, span)`
//!
//! Collaborator text (parser messages, analyzer diagnostics) is carried verbatim in
//! `message`; it is never parsed or reinterpreted here.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::syntax::Span;

pub type SourceArc = Arc<NamedSource<String>>;

pub type Result<T, E = StitchError> = std::result::Result<T, E>;

/// Type-safe classification of [`StitchError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The parser/analyzer session could not be created
    ParserInitFailed,
    /// Syntax error in a fragment or target source
    ParseFailed,
    /// The fragment contributed no declarations
    NoNodesFound,
    /// Target tree lacks a usable container, or the named one is missing
    InvalidContractStructure,
    /// The semantic analyzer rejected the merged tree
    AnalysisFailed,
    /// JSON encoding or decoding failed
    Serialization,
    /// Configuration could not be read or decoded
    Config,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::ParserInitFailed => "ParserInitFailed",
            ErrorType::ParseFailed => "ParseFailed",
            ErrorType::NoNodesFound => "NoNodesFound",
            ErrorType::InvalidContractStructure => "InvalidContractStructure",
            ErrorType::AnalysisFailed => "AnalysisFailed",
            ErrorType::Serialization => "Serialization",
            ErrorType::Config => "Config",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    /// The source the error points into (if any).
    pub source: Option<SourceArc>,
    /// The primary span inside `source` (if any).
    pub span: Option<Span>,
    /// An optional help message.
    pub help: Option<String>,
    /// The offending identifier, e.g. a contract name that was not found.
    pub subject: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            ..Self::default()
        }
    }

    pub fn with_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}


/// Every failure the stitching pipeline can surface.
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("Parser initialisation failed: {message}")]
    ParserInitFailed {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Parse failed: {message}")]
    ParseFailed {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("No nodes found: {message}")]
    NoNodesFound {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Invalid contract structure: {message}")]
    InvalidContractStructure {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Analysis failed: {message}")]
    AnalysisFailed {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("JSON error: {message}")]
    Serialization {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl StitchError {
    fn ctx(&self) -> &ErrorContext {
        match self {
            StitchError::ParserInitFailed { ctx, .. }
            | StitchError::ParseFailed { ctx, .. }
            | StitchError::NoNodesFound { ctx, .. }
            | StitchError::InvalidContractStructure { ctx, .. }
            | StitchError::AnalysisFailed { ctx, .. }
            | StitchError::Serialization { ctx, .. }
            | StitchError::Config { ctx, .. } => ctx,
        }
    }

    /// The raw message: collaborator text for parse and analysis failures.
    pub fn message(&self) -> &str {
        match self {
            StitchError::ParserInitFailed { message, .. }
            | StitchError::ParseFailed { message, .. }
            | StitchError::NoNodesFound { message, .. }
            | StitchError::InvalidContractStructure { message, .. }
            | StitchError::AnalysisFailed { message, .. }
            | StitchError::Serialization { message, .. }
            | StitchError::Config { message, .. } => message,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            StitchError::ParserInitFailed { .. } => ErrorType::ParserInitFailed,
            StitchError::ParseFailed { .. } => ErrorType::ParseFailed,
            StitchError::NoNodesFound { .. } => ErrorType::NoNodesFound,
            StitchError::InvalidContractStructure { .. } => ErrorType::InvalidContractStructure,
            StitchError::AnalysisFailed { .. } => ErrorType::AnalysisFailed,
            StitchError::Serialization { .. } => ErrorType::Serialization,
            StitchError::Config { .. } => ErrorType::Config,
        }
    }

    /// The identifier the error is about, when there is one.
    pub fn subject(&self) -> Option<&str> {
        self.ctx().subject.as_deref()
    }

    /// A named container was requested but the target does not define it.
    pub fn container_not_found(name: &str) -> Self {
        StitchError::InvalidContractStructure {
            message: format!("Contract '{name}' not found"),
            ctx: ErrorContext::with_subject(name)
                .help("check the contract name, or omit it to use the container policy"),
            source: None,
        }
    }

    pub(crate) fn caused_by(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        match &mut self {
            StitchError::ParserInitFailed { source, .. }
            | StitchError::ParseFailed { source, .. }
            | StitchError::NoNodesFound { source, .. }
            | StitchError::InvalidContractStructure { source, .. }
            | StitchError::AnalysisFailed { source, .. }
            | StitchError::Serialization { source, .. }
            | StitchError::Config { source, .. } => *source = Some(Box::new(cause)),
        }
        self
    }
}

impl From<serde_json::Error> for StitchError {
    fn from(err: serde_json::Error) -> Self {
        crate::err_msg!(Serialization, err.to_string()).caused_by(err)
    }
}

impl From<serde_yaml::Error> for StitchError {
    fn from(err: serde_yaml::Error) -> Self {
        crate::err_msg!(Config, err.to_string()).caused_by(err)
    }
}

impl Diagnostic for StitchError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self.error_type() {
            ErrorType::ParserInitFailed => "stitch::session::init",
            ErrorType::ParseFailed => "stitch::parse",
            ErrorType::NoNodesFound => "stitch::extract::no_nodes",
            ErrorType::InvalidContractStructure => "stitch::locate::structure",
            ErrorType::AnalysisFailed => "stitch::analysis",
            ErrorType::Serialization => "stitch::json",
            ErrorType::Config => "stitch::config",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.ctx();
        let span = ctx.span?;
        let len = if span.end > span.start {
            span.end - span.start
        } else {
            1
        };
        let label = LabeledSpan::new(Some(self.message().to_string()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Wraps source text as a named miette source.
pub fn to_error_source(name: &str, source: &str) -> SourceArc {
    Arc::new(NamedSource::new(name, source.to_string()))
}

/// Constructs a [`StitchError`] variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::StitchError::$variant {
            message: format!($msg $(, $arg)*),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::StitchError::$variant {
            message: ($msg).to_string(),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a [`StitchError`] variant pointing at a span of a named source.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $help:expr) => {
        $crate::StitchError::$variant {
            message: ($msg).to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(
                $crate::diagnostics::SourceArc::clone($src),
                $span,
            )
            .help($help),
            source: None,
        }
    };
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::StitchError::$variant {
            message: ($msg).to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(
                $crate::diagnostics::SourceArc::clone($src),
                $span,
            ),
            source: None,
        }
    };
}
