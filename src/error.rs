use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    /// A list-query parameter failed normalization. Carries the offending field.
    Validation { field: String, message: String },
    /// Sort column not declared sortable for the entity. The caller decides
    /// whether to fall back to the default order; the builder never does.
    UnsupportedSort(String),
    /// A read or write addressed data outside the caller's organization.
    ScopeViolation,
    NotFound,
    Deserialize(String),
    /// Wraps any underlying data-store failure. The store-specific text stays
    /// inside the variant; it is never rendered verbatim at the UI boundary.
    Store(String),
    /// The entity write succeeded but the activity-log append did not.
    AuditWrite(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Validation { field, message } => {
                write!(f, "Invalid value for `{}`: {}", field, message)
            }
            Error::UnsupportedSort(field) => write!(f, "Unsupported sort column `{}`", field),
            Error::ScopeViolation => write!(f, "Operation outside organization scope"),
            Error::NotFound => write!(f, "Not found"),
            Error::Deserialize(err) => write!(f, "Deserialization error: {}", err),
            Error::Store(err) => write!(f, "Storage error: {}", err),
            Error::AuditWrite(err) => write!(f, "Activity log write failed: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}
