use std::sync::Arc;

use remap_core::CoreError;

/// Errors raised while configuring, compiling or running a mapping.
///
/// Paths are destination (or source) route paths joined with the
/// configured separator; the empty path is the root.
#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    /// A path segment does not name a member of the type it is applied to.
    UnknownMember {
        /// The type that was searched.
        ty: String,
        /// The segment that was not found.
        member: String,
        /// The closest existing member name, if any is close enough.
        suggestion: Option<String>,
    },

    /// No resolver exists or could be built for a required conversion.
    InvalidTypeBinding {
        /// The destination path that needed the conversion.
        path: String,
        /// Source type name.
        source: String,
        /// Destination type name.
        destination: String,
    },

    /// A null was dereferenced while navigating to a member.
    ValueNotInitialized {
        /// The path of the value that was null.
        path: String,
        /// Source type of the mapping that failed.
        source: String,
        /// Destination type of the mapping that failed.
        destination: String,
    },

    /// More than one remap record matches a reverse lookup.
    AmbiguousResolution {
        /// The source path that was looked up.
        source_path: String,
        /// Destination paths of every matching record.
        candidates: Vec<String>,
    },

    /// An expression shape the inliner or the lowering pass does not support.
    NotImplemented(&'static str),

    /// An inliner was used again after it produced its rewrite.
    InlinerSealed,

    /// A remap or resolver was registered after the context was compiled.
    ContextFrozen {
        /// Source type name.
        source: String,
        /// Destination type name.
        destination: String,
    },

    /// A value could not be converted.
    Conversion {
        /// Rendering of the value that failed to convert.
        value: String,
        /// Source type name.
        from: String,
        /// Destination type name.
        to: String,
    },

    /// The mapper owning a context was dropped.
    MapperDropped,

    /// A user selector or resolver function failed.
    Selector(String),

    /// An error from the type model.
    Core(CoreError),
}

fn or_root(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

impl core::fmt::Display for MapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MapError::UnknownMember {
                ty,
                member,
                suggestion,
            } => {
                write!(f, "type `{ty}` has no member `{member}`")?;
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean `{suggestion}`?)")?;
                }
                Ok(())
            }
            MapError::InvalidTypeBinding {
                path,
                source,
                destination,
            } => write!(
                f,
                "no conversion from `{source}` to `{destination}` for `{}`",
                or_root(path)
            ),
            MapError::ValueNotInitialized {
                path,
                source,
                destination,
            } => write!(
                f,
                "`{}` is null while mapping `{source}` to `{destination}`",
                or_root(path)
            ),
            MapError::AmbiguousResolution {
                source_path,
                candidates,
            } => write!(
                f,
                "`{}` is consumed by several remaps: {}",
                or_root(source_path),
                candidates.join(", ")
            ),
            MapError::NotImplemented(what) => write!(f, "not implemented: {what}"),
            MapError::InlinerSealed => write!(f, "inliner was already used for a rewrite"),
            MapError::ContextFrozen {
                source,
                destination,
            } => write!(
                f,
                "mapping `{source}` to `{destination}` is compiled and can no longer be configured"
            ),
            MapError::Conversion { value, from, to } => {
                write!(f, "cannot convert {value} from `{from}` to `{to}`")
            }
            MapError::MapperDropped => write!(f, "the mapper owning this context was dropped"),
            MapError::Selector(message) => write!(f, "selector failed: {message}"),
            MapError::Core(error) => core::fmt::Display::fmt(error, f),
        }
    }
}

impl core::error::Error for MapError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            MapError::Core(error) => Some(error),
            _ => None,
        }
    }
}

impl From<CoreError> for MapError {
    fn from(error: CoreError) -> Self {
        MapError::Core(error)
    }
}

/// Attribution for null dereferences: the path being navigated and the
/// type pair of the mapping doing the navigation.
#[derive(Debug, Clone)]
pub(crate) struct Fault {
    path: Arc<str>,
    pair: Arc<(String, String)>,
}

impl Fault {
    pub(crate) fn new(path: &str, pair: &Arc<(String, String)>) -> Self {
        Self {
            path: Arc::from(path),
            pair: pair.clone(),
        }
    }

    /// Null targets become `ValueNotInitialized`, everything else passes through.
    pub(crate) fn wrap(&self, error: CoreError) -> MapError {
        match error {
            CoreError::NullTarget { .. } => MapError::ValueNotInitialized {
                path: self.path.to_string(),
                source: self.pair.0.clone(),
                destination: self.pair.1.clone(),
            },
            other => MapError::Core(other),
        }
    }
}
