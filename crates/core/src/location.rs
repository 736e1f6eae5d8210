//! Object locations
//!
//! A `Location` is an immutable `scheme://container/path` value. Keys are
//! opaque: `.` and `..` segments are never collapsed and no percent-encoding
//! is applied. Every transformation returns a new value, so a `Location` can
//! be shared across concurrent transfers without synchronization.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

const SCHEME_SEPARATOR: &str = "://";

/// An addressable position in an object store
///
/// Equality and hashing consider only `container` and `path`; the scheme is
/// kept for rendering.
#[derive(Debug, Clone)]
pub struct Location {
    scheme: String,
    container: String,
    path: String,
}

impl Location {
    /// Parse a canonical `scheme://container[/path]` string
    ///
    /// Leading slashes of the path are stripped, so `s3://bucket//a` parses
    /// to path `a`.
    pub fn parse(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| Error::MalformedLocation(format!("missing scheme in '{s}'")))?;

        validate_scheme(scheme).map_err(|reason| {
            Error::MalformedLocation(format!("invalid scheme in '{s}': {reason}"))
        })?;

        let (container, path) = match rest.split_once('/') {
            Some((container, path)) => (container, path),
            None => (rest, ""),
        };

        if container.is_empty() {
            return Err(Error::MalformedLocation(format!("missing container in '{s}'")));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            container: container.to_string(),
            path: path.trim_start_matches('/').to_string(),
        })
    }

    /// Build a location from parts
    ///
    /// The container must be non-empty and must not contain `/`.
    pub fn new(
        scheme: impl Into<String>,
        container: impl Into<String>,
        path: impl AsRef<str>,
    ) -> Result<Self> {
        let scheme = scheme.into();
        let container = container.into();

        validate_scheme(&scheme).map_err(|reason| {
            Error::MalformedLocation(format!("invalid scheme '{scheme}': {reason}"))
        })?;
        if container.is_empty() || container.contains('/') {
            return Err(Error::MalformedLocation(format!(
                "invalid container '{container}'"
            )));
        }

        Ok(Self {
            scheme,
            container,
            path: path.as_ref().trim_start_matches('/').to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The top-level namespace (bucket)
    pub fn container(&self) -> &str {
        &self.container
    }

    /// The object key, empty for the container root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final `/`-delimited segment of the path
    ///
    /// Empty when the path is empty or ends in `/`.
    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[idx + 1..],
            None => &self.path,
        }
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Whether the path names a prefix rather than an object
    pub fn is_dir_like(&self) -> bool {
        self.path.is_empty() || self.path.ends_with('/')
    }

    /// Same container, path fully replaced
    pub fn with_path(&self, new_path: impl AsRef<str>) -> Self {
        Self {
            scheme: self.scheme.clone(),
            container: self.container.clone(),
            path: new_path.as_ref().trim_start_matches('/').to_string(),
        }
    }

    /// Same container and path, different scheme
    pub fn with_scheme(&self, scheme: &str) -> Result<Self> {
        Self::new(scheme, self.container.clone(), &self.path)
    }

    /// Descend by one segment
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        self.with_path(join_segment(&self.path, segment.as_ref()))
    }

    /// Descend by each segment in turn
    ///
    /// Redundant slashes are collapsed only where segments meet; slashes
    /// inside the existing path or inside a segment are kept as-is.
    pub fn join<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = segments
            .into_iter()
            .fold(self.path.clone(), |acc, segment| {
                join_segment(&acc, segment.as_ref())
            });
        self.with_path(path)
    }

    /// The enclosing prefix, `None` at the container root
    ///
    /// The parent of `a/b/c` is `a/b/`; the parent of `a` is the root.
    pub fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            return None;
        }
        let trimmed = self.path.trim_end_matches('/');
        let parent = match trimmed.rfind('/') {
            Some(idx) => &trimmed[..=idx],
            None => "",
        };
        Some(self.with_path(parent))
    }

    /// Key suffix of `self` under `base`
    ///
    /// Returns `None` when the containers differ or `base` is not a prefix
    /// of `self` at a segment boundary.
    pub fn relative_to(&self, base: &Location) -> Option<&str> {
        if self.container != base.container {
            return None;
        }
        if base.path.is_empty() {
            return Some(&self.path);
        }
        if self.path == base.path {
            return Some("");
        }
        let rest = self.path.strip_prefix(&base.path)?;
        if base.path.ends_with('/') {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }
}

fn join_segment(base: &str, segment: &str) -> String {
    let segment = segment.trim_start_matches('/');
    if base.is_empty() {
        return segment.to_string();
    }
    format!("{}/{segment}", base.trim_end_matches('/'))
}

fn validate_scheme(scheme: &str) -> std::result::Result<(), &'static str> {
    let mut chars = scheme.chars();
    match chars.next() {
        None => return Err("scheme is empty"),
        Some(c) if !c.is_ascii_alphabetic() => return Err("must start with a letter"),
        Some(_) => {}
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        Ok(())
    } else {
        Err("unexpected character")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}://{}", self.scheme, self.container)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.container, self.path)
        }
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container && self.path == other.path
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.container.hash(state);
        self.path.hash(state);
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.container
            .cmp(&other.container)
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Location::parse(&s).map_err(serde::de::Error::custom)
    }
}
