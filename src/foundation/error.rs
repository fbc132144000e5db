use std::path::PathBuf;

pub type SceneResult<T> = Result<T, SceneError>;

#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    #[error("malformed line {line}: {reason}: '{text}'")]
    MalformedLine {
        line: usize,
        reason: String,
        text: String,
    },

    #[error("invalid duration on line {line}: {value}")]
    InvalidDuration { line: usize, value: f64 },

    #[error("invalid loop duration: {value}s (loops must be positive and not vanishingly short)")]
    InvalidLoopDuration { value: f64 },

    #[error("invalid pan on line {line}: {value} (expected -1..=1)")]
    InvalidPan { line: usize, value: f64 },

    #[error("duplicate background track on line {line}: '{description}' is already playing")]
    DuplicateBackgroundTrack { line: usize, description: String },

    #[error("unknown background track on line {line}: '{description}' was never started")]
    UnknownBackgroundTrack { line: usize, description: String },

    #[error("generation failed on line {line} for '{key}': {message}")]
    GenerationFailed {
        line: usize,
        key: String,
        message: String,
    },

    #[error("probe failed for '{}': {message}", path.display())]
    ProbeFailed { path: PathBuf, message: String },

    #[error("render failed: {message}")]
    RenderFailed { message: String },

    #[error("cancelled: {what}")]
    Cancelled { what: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<SceneError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SceneError {
    pub fn malformed(line: usize, reason: impl Into<String>, text: impl Into<String>) -> Self {
        Self::MalformedLine {
            line,
            reason: reason.into(),
            text: text.into(),
        }
    }

    pub fn generation(line: usize, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            line,
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProbeFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::RenderFailed {
            message: message.into(),
        }
    }

    pub fn cancelled(what: impl Into<String>) -> Self {
        Self::Cancelled { what: what.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Attach the originating script line to errors that do not already carry one.
    pub fn at_line(self, line: usize) -> Self {
        if self.line().is_some() {
            return self;
        }
        Self::AtLine {
            line,
            source: Box::new(self),
        }
    }

    /// Script line this error originated from, when known.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::MalformedLine { line, .. }
            | Self::InvalidDuration { line, .. }
            | Self::InvalidPan { line, .. }
            | Self::DuplicateBackgroundTrack { line, .. }
            | Self::UnknownBackgroundTrack { line, .. }
            | Self::GenerationFailed { line, .. }
            | Self::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::AtLine { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
