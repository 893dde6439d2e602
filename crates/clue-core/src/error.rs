use std::fmt;

/// Invalid tuning parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid config `{}`: {}", self.field, self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// Case content failed validation at load time.
///
/// Every variant names the offending item so content authors can find it.
#[derive(Debug)]
pub enum CatalogError {
    Json(serde_json::Error),
    Config(ConfigError),
    InvalidId {
        kind: &'static str,
        id: String,
    },
    DuplicateCase(String),
    DuplicateEvidence {
        case_id: String,
        evidence_id: String,
    },
    DuplicateClue {
        evidence_id: String,
        clue_id: String,
    },
    InvalidRadius {
        evidence_id: String,
        clue_id: String,
        radius: f64,
    },
    OutOfBounds {
        evidence_id: String,
        clue_id: String,
        x: f64,
        y: f64,
    },
    ThresholdOrder {
        evidence_id: String,
        clue_id: String,
        effective_radius: f64,
        falloff: f64,
    },
    UnknownDiscovered {
        evidence_id: String,
        clue_id: String,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Json(e) => write!(f, "catalog JSON error: {e}"),
            CatalogError::Config(e) => write!(f, "{e}"),
            CatalogError::InvalidId { kind, id } => write!(f, "invalid {kind} id '{id}'"),
            CatalogError::DuplicateCase(id) => write!(f, "duplicate case id '{id}'"),
            CatalogError::DuplicateEvidence {
                case_id,
                evidence_id,
            } => write!(f, "case '{case_id}': duplicate evidence id '{evidence_id}'"),
            CatalogError::DuplicateClue {
                evidence_id,
                clue_id,
            } => write!(f, "evidence '{evidence_id}': duplicate clue id '{clue_id}'"),
            CatalogError::InvalidRadius {
                evidence_id,
                clue_id,
                radius,
            } => write!(
                f,
                "evidence '{evidence_id}', clue '{clue_id}': radius must be > 0, got {radius}"
            ),
            CatalogError::OutOfBounds {
                evidence_id,
                clue_id,
                x,
                y,
            } => write!(
                f,
                "evidence '{evidence_id}', clue '{clue_id}': position ({x}, {y}) outside [0,100]"
            ),
            CatalogError::ThresholdOrder {
                evidence_id,
                clue_id,
                effective_radius,
                falloff,
            } => write!(
                f,
                "evidence '{evidence_id}', clue '{clue_id}': discovery radius {effective_radius} \
                 must be smaller than falloff distance {falloff}"
            ),
            CatalogError::UnknownDiscovered {
                evidence_id,
                clue_id,
            } => write!(
                f,
                "evidence '{evidence_id}': discovered id '{clue_id}' is not one of its clues"
            ),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Json(e) => Some(e),
            CatalogError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Json(e)
    }
}

impl From<ConfigError> for CatalogError {
    fn from(e: ConfigError) -> Self {
        CatalogError::Config(e)
    }
}

/// Misuse of the case-file session API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    UnknownEvidence {
        case_id: String,
        evidence_id: String,
    },
    NoActiveSession,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::UnknownEvidence {
                case_id,
                evidence_id,
            } => write!(f, "case '{case_id}' has no evidence '{evidence_id}'"),
            SessionError::NoActiveSession => write!(f, "no evidence is open for analysis"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Progress export/import failure.
#[derive(Debug)]
pub enum WireError {
    Json(serde_json::Error),
    UnsupportedVersion(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Json(e) => write!(f, "progress JSON error: {e}"),
            WireError::UnsupportedVersion(v) => write!(f, "unsupported export version '{v}'"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<serde_json::Error> for WireError {
    fn from(e: serde_json::Error) -> Self {
        WireError::Json(e)
    }
}
