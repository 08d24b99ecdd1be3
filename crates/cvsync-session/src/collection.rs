//! Collection configuration: the unit of syncing between a server and a
//! client, plus the handful of per-collection knobs the pipeline stages
//! consult (release format, path prefixes, error handling policy, filters).

use crate::error::SessionError;
use crate::filter::FilterList;

/// On-disk layout a collection's server-side copy is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// A plain file tree; files are compared and transferred as opaque blobs.
    List,
    /// An RCS repository (`,v` files); revisions are compared and
    /// transferred delta-aware.
    Rcs,
}

impl Release {
    pub fn parse(s: &str) -> Result<Self, SessionError> {
        match s {
            "list" => Ok(Release::List),
            "rcs" => Ok(Release::Rcs),
            other => Err(SessionError::UnknownRelease(other.to_string())),
        }
    }
}

/// How the server reacts to a scanned tree that disagrees with its own
/// inventory (a file missing where the scanfile says it should exist, an
/// RCS file that fails to parse, and similar inconsistencies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Abort the whole collection's sync on the first inconsistency.
    Abort,
    /// Log the inconsistency, repair the inventory from what's actually on
    /// disk, and continue.
    #[default]
    Fixup,
    /// Log the inconsistency and otherwise proceed as if nothing happened.
    Ignore,
}

impl ErrorMode {
    pub fn parse(s: &str) -> Result<Self, SessionError> {
        match s {
            "abort" => Ok(ErrorMode::Abort),
            "fixup" => Ok(ErrorMode::Fixup),
            "ignore" => Ok(ErrorMode::Ignore),
            other => Err(SessionError::UnknownErrorMode(other.to_string())),
        }
    }
}

/// One collection as configured on the server (and, for the subset the
/// client needs, as advertised to it during negotiation).
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: String,
    pub release: Release,
    /// Path to the collection's data on the server, relative to the
    /// configured root.
    pub prefix: String,
    /// Path the client should materialize the collection under locally.
    pub rprefix: String,
    /// Permission bits cleared from every file/directory mode on apply.
    pub umask: u32,
    pub errormode: ErrorMode,
    pub filters: FilterList,
}

impl Collection {
    pub fn new(name: impl Into<String>, release: Release, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            name: name.into(),
            release,
            rprefix: prefix.clone(),
            prefix,
            umask: 0o022,
            errormode: ErrorMode::default(),
            filters: FilterList::default(),
        }
    }

    pub fn with_rprefix(mut self, rprefix: impl Into<String>) -> Self {
        self.rprefix = rprefix.into();
        self
    }

    pub fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask;
        self
    }

    pub fn with_errormode(mut self, errormode: ErrorMode) -> Self {
        self.errormode = errormode;
        self
    }

    pub fn with_filters(mut self, filters: FilterList) -> Self {
        self.filters = filters;
        self
    }
}

/// The set of collections a server offers, keyed by name and preserving
/// configuration order (the order collections are offered during
/// negotiation).
#[derive(Debug, Clone, Default)]
pub struct CollectionList {
    collections: Vec<Collection>,
}

impl CollectionList {
    pub fn new(collections: Vec<Collection>) -> Self {
        Self { collections }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.collections.iter()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&Collection, SessionError> {
        self.collections
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SessionError::UnknownCollection(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_preserves_order() {
        let list = CollectionList::new(vec![
            Collection::new("base", Release::Rcs, "base"),
            Collection::new("ports", Release::List, "ports"),
        ]);
        assert_eq!(list.names().collect::<Vec<_>>(), vec!["base", "ports"]);
        assert!(list.get("ports").is_ok());
        assert!(matches!(
            list.get("missing"),
            Err(SessionError::UnknownCollection(_))
        ));
    }

    #[test]
    fn defaults_are_fixup_and_prefix_mirrors_rprefix() {
        let c = Collection::new("base", Release::Rcs, "cvs/base");
        assert_eq!(c.errormode, ErrorMode::Fixup);
        assert_eq!(c.rprefix, "cvs/base");
    }
}
