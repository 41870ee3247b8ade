//! Engine version catalog
//!
//! An immutable, pre-parsed snapshot of every published engine version. All
//! resolver operations read from a catalog passed in by the caller; nothing
//! here caches or reaches into global state.

use std::collections::HashSet;

use crate::config::CURRENT_MINOR_LINES;
use crate::version::constraint::Constraint;
use crate::version::error::ResolverError;
use crate::version::semver::{Version, parse_version};
use crate::version::types::EngineVersion;

/// Display hint derived from how far a version's minor line is from the newest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorClass {
    Green,
    LightGreen,
    Yellow,
    Red,
    Gray,
}

impl ColorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorClass::Green => "green",
            ColorClass::LightGreen => "light-green",
            ColorClass::Yellow => "yellow",
            ColorClass::Red => "red",
            ColorClass::Gray => "gray",
        }
    }

    /// Colour for a minor line by rank (0 = newest line)
    fn for_rank(rank: usize) -> Self {
        match rank {
            0 => ColorClass::Green,
            1 => ColorClass::LightGreen,
            2 => ColorClass::Yellow,
            _ => ColorClass::Red,
        }
    }
}

/// An engine version together with its parsed form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    engine: EngineVersion,
    parsed: Version,
}

impl CatalogEntry {
    pub fn engine(&self) -> &EngineVersion {
        &self.engine
    }

    pub fn version(&self) -> &Version {
        &self.parsed
    }

    /// The version string as published
    pub fn as_str(&self) -> &str {
        &self.engine.version
    }

    /// Colour hint; always set once the entry is part of a catalog
    pub fn color_class(&self) -> &str {
        self.engine.color_class.as_deref().unwrap_or(ColorClass::Gray.as_str())
    }
}

/// Snapshot of engine versions, ordered newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineCatalog {
    entries: Vec<CatalogEntry>,
}

impl EngineCatalog {
    /// Build a catalog, failing on the first malformed version
    pub fn new(versions: Vec<EngineVersion>) -> Result<Self, ResolverError> {
        let entries = versions
            .into_iter()
            .map(|engine| {
                let parsed = parse_version(&engine.version)?;
                Ok(CatalogEntry { engine, parsed })
            })
            .collect::<Result<Vec<_>, ResolverError>>()?;

        Ok(Self::from_entries(entries))
    }

    /// Build a catalog from the well-formed versions only.
    ///
    /// Returns the rejected versions' errors alongside so the caller can
    /// report them.
    pub fn lenient(versions: Vec<EngineVersion>) -> (Self, Vec<ResolverError>) {
        let mut entries = Vec::with_capacity(versions.len());
        let mut rejected = Vec::new();

        for engine in versions {
            match parse_version(&engine.version) {
                Ok(parsed) => entries.push(CatalogEntry { engine, parsed }),
                Err(e) => rejected.push(e),
            }
        }

        (Self::from_entries(entries), rejected)
    }

    fn from_entries(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by(|a, b| b.parsed.cmp(&a.parsed));

        let mut catalog = Self { entries };
        let lines = catalog.minor_lines();

        for entry in &mut catalog.entries {
            if entry.engine.color_class.is_none() {
                let color = if entry.parsed.is_placeholder() {
                    ColorClass::Gray
                } else {
                    lines
                        .iter()
                        .position(|line| *line == entry.parsed.minor_line())
                        .map(ColorClass::for_rank)
                        .unwrap_or(ColorClass::Gray)
                };
                entry.engine.color_class = Some(color.as_str().to_string());
            }
        }

        catalog
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, newest first
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// The newest engine version
    pub fn latest(&self) -> Option<&CatalogEntry> {
        self.entries.first()
    }

    /// Look up an entry by version (ignoring how the string was written)
    pub fn find(&self, version: &Version) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.parsed == *version)
    }

    /// Colour hint for `version`; gray when the catalog does not know it
    pub fn color_class(&self, version: &Version) -> &str {
        self.find(version)
            .map_or(ColorClass::Gray.as_str(), CatalogEntry::color_class)
    }

    /// Distinct `(major, minor)` lines, newest first. The `0.0.0` placeholder
    /// does not form a line.
    pub fn minor_lines(&self) -> Vec<(u64, u64)> {
        let mut lines: Vec<(u64, u64)> = Vec::new();
        for entry in self.entries.iter().filter(|e| !e.parsed.is_placeholder()) {
            let line = entry.parsed.minor_line();
            // Entries are sorted, so equal lines are adjacent
            if lines.last() != Some(&line) {
                lines.push(line);
            }
        }
        lines
    }

    /// True when no catalog version on the same minor line orders after `version`
    pub fn is_latest_minor(&self, version: &Version) -> bool {
        !self.entries.iter().any(|entry| {
            entry.parsed.minor_line() == version.minor_line() && entry.parsed > *version
        })
    }

    /// The tip of every minor line (the "hotfix" set), newest first
    pub fn latest_minor_versions(&self) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| self.is_latest_minor(&entry.parsed))
            .collect()
    }

    /// Every version belonging to the three newest minor lines.
    ///
    /// All patches of those lines are included, not just their tips. With
    /// fewer than three lines every version is returned; an empty catalog
    /// yields an empty set.
    pub fn versions_for_last_three_minors(&self) -> Vec<&CatalogEntry> {
        let current: HashSet<(u64, u64)> = self
            .minor_lines()
            .into_iter()
            .take(CURRENT_MINOR_LINES)
            .collect();

        self.entries
            .iter()
            .filter(|entry| {
                !entry.parsed.is_placeholder() && current.contains(&entry.parsed.minor_line())
            })
            .collect()
    }

    /// Whether `version` is one of [`Self::versions_for_last_three_minors`]
    pub fn is_current(&self, version: &Version) -> bool {
        self.versions_for_last_three_minors()
            .iter()
            .any(|entry| entry.parsed == *version)
    }

    /// Catalog versions satisfying `constraint`, newest first
    pub fn satisfying(&self, constraint: &Constraint) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| constraint.satisfies(&entry.parsed))
            .collect()
    }
}
