use std::{
    error::Error as StdError,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use thiserror::Error;

/// Where an [`AppError`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub function: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl Location {
    pub const fn new(function: &'static str, file: &'static str, line: u32) -> Self {
        Self { function, file, line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.function, self.file, self.line)
    }
}

/// Strips the helper item and async closure segments from a `type_name` path.
#[doc(hidden)]
pub fn function_path(raw: &'static str) -> &'static str {
    let mut name = raw.strip_suffix("::f").unwrap_or(raw);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name
}

/// Captures the enclosing function, file and line as a [`Location`].
#[macro_export]
macro_rules! here {
    () => {{
        fn f() {}
        fn name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::error::Location::new($crate::error::function_path(name_of(f)), file!(), line!())
    }};
}

/// Builds an [`AppError`] of the given kind at the call site, optionally wrapping a cause.
#[macro_export]
macro_rules! app_error {
    ($kind:ident) => {
        $crate::error::AppError::new($crate::error::ErrorKind::$kind, $crate::here!())
    };
    ($kind:ident, $source:expr) => {
        $crate::error::AppError::new($crate::error::ErrorKind::$kind, $crate::here!())
            .with_source($source)
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request construction, transport, non-200 status or undecodable body.
    Networking,
    /// The city search returned no matches.
    CityNotFound,
    /// An internal invariant did not hold.
    UnexpectedNil,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Networking => "networking",
            ErrorKind::CityNotFound => "city not found",
            ErrorKind::UnexpectedNil => "unexpected nil",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a search, tagged with the place it was detected.
///
/// Two errors are equal when their kind and location match; the wrapped
/// source never takes part in comparison or hashing.
#[derive(Debug, Clone, Error)]
#[error("{kind} error at {location}")]
pub struct AppError {
    kind: ErrorKind,
    location: Location,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl AppError {
    pub fn new(kind: ErrorKind, location: Location) -> Self {
        Self { kind, location, source: None }
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Fixed, user-facing message for this error's kind.
    pub fn user_description(&self) -> &'static str {
        match self.kind {
            ErrorKind::Networking => {
                "An error occurred while performing your request, please retry."
            }
            ErrorKind::CityNotFound => "No city matching your search was found.",
            ErrorKind::UnexpectedNil => "An error occurred, please retry.",
        }
    }
}

impl PartialEq for AppError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.location == other.location
    }
}

impl Eq for AppError {}

impl Hash for AppError {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.location.hash(state);
    }
}
