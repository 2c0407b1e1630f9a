//! Family registry: loads every index family from embedded TOML configs.
//!
//! Each `.toml` file in `packages/engine/families/` is baked into the binary
//! at compile time via [`include_str!`]. A directory of override files can
//! replace (or add to) the embedded definitions by id, so fallback caps and
//! weights can be recalibrated without a rebuild.
//!
//! Families that read other families' same-day results form a dependency
//! graph. The registry rejects unknown dependencies and cycles at load time
//! and keeps a topological order for computing every family of a date.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use risk_index_models::{FamilyDefinition, FamilyId, InvalidFamilyError};
use thiserror::Error;

/// TOML configs embedded at compile time.
const FAMILY_TOMLS: &[(&str, &str)] = &[
    ("global", include_str!("../families/global.toml")),
    ("middle_east", include_str!("../families/middle_east.toml")),
    ("black_sea", include_str!("../families/black_sea.toml")),
    ("europe", include_str!("../families/europe.toml")),
    (
        "market_stress",
        include_str!("../families/market_stress.toml"),
    ),
];

/// Errors raised while loading or validating families.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A family file could not be parsed.
    #[error("Failed to parse {file}: {source}")]
    Parse {
        /// File (or embedded config) name.
        file: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A family definition is internally inconsistent.
    #[error(transparent)]
    Invalid(#[from] InvalidFamilyError),

    /// Two definitions share an id.
    #[error("Family {0} is defined twice")]
    Duplicate(String),

    /// A family depends on a family that does not exist.
    #[error("Family {family} depends on unknown family {dependency}")]
    UnknownDependency {
        /// The dependent family.
        family: String,
        /// The missing dependency.
        dependency: String,
    },

    /// Family dependencies contain a cycle.
    #[error("Family dependency cycle through {0}")]
    Cycle(String),

    /// An override directory could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Parses a single family definition from TOML text.
///
/// # Errors
///
/// Returns a TOML error if the text is malformed or has unknown fields.
pub fn parse_family_toml(text: &str) -> Result<FamilyDefinition, toml::de::Error> {
    toml::from_str(text)
}

/// Every known family, validated, with its dependency order.
#[derive(Debug, Clone)]
pub struct FamilyRegistry {
    families: BTreeMap<FamilyId, FamilyDefinition>,
    order: Vec<FamilyId>,
}

impl FamilyRegistry {
    /// The embedded family set.
    ///
    /// # Panics
    ///
    /// Panics if any embedded config is malformed or the embedded set is
    /// inconsistent (both are compile-time guarantees since the configs are
    /// embedded and covered by tests).
    #[must_use]
    pub fn builtin() -> Self {
        let definitions = FAMILY_TOMLS
            .iter()
            .map(|(name, toml)| {
                parse_family_toml(toml)
                    .unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
            })
            .collect();
        Self::from_definitions(definitions)
            .unwrap_or_else(|e| panic!("Embedded family configs are invalid: {e}"))
    }

    /// Builds a registry from explicit definitions.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if a definition is invalid, an id repeats,
    /// a dependency is unknown, or dependencies form a cycle.
    pub fn from_definitions(definitions: Vec<FamilyDefinition>) -> Result<Self, RegistryError> {
        let mut families = BTreeMap::new();
        for family in definitions {
            family.validate()?;
            let id = family.id.clone();
            if families.insert(id.clone(), family).is_some() {
                return Err(RegistryError::Duplicate(id.to_string()));
            }
        }

        let order = dependency_order(&families)?;
        Ok(Self { families, order })
    }

    /// Replaces or adds definitions from every `*.toml` file in `dir`.
    ///
    /// Files are applied in name order; a file whose id matches an existing
    /// family replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the directory cannot be read, a file
    /// does not parse, or the merged set is invalid.
    pub fn with_overrides_from_dir(self, dir: &Path) -> Result<Self, RegistryError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|source| RegistryError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut families = self.families;
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|source| RegistryError::Io {
                path: path.clone(),
                source,
            })?;
            let family = parse_family_toml(&text).map_err(|source| RegistryError::Parse {
                file: path.display().to_string(),
                source,
            })?;
            log::info!(
                "Family {} overridden from {}",
                family.id,
                path.display()
            );
            families.insert(family.id.clone(), family);
        }

        Self::from_definitions(families.into_values().collect())
    }

    /// Embedded families plus optional overrides.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the overrides cannot be applied.
    pub fn load(override_dir: Option<&Path>) -> Result<Self, RegistryError> {
        let registry = Self::builtin();
        match override_dir {
            Some(dir) => registry.with_overrides_from_dir(dir),
            None => Ok(registry),
        }
    }

    /// Looks up a family by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FamilyDefinition> {
        self.families.get(id)
    }

    /// Family ids with every family after all of its dependencies.
    #[must_use]
    pub fn dependency_order(&self) -> &[FamilyId] {
        &self.order
    }

    /// Families in dependency order.
    pub fn families(&self) -> impl Iterator<Item = &FamilyDefinition> {
        self.order.iter().filter_map(|id| self.families.get(id))
    }

    /// Number of families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

fn dependency_order(
    families: &BTreeMap<FamilyId, FamilyDefinition>,
) -> Result<Vec<FamilyId>, RegistryError> {
    let mut graph: DiGraph<&FamilyId, ()> = DiGraph::new();
    let nodes: BTreeMap<&FamilyId, NodeIndex> = families
        .keys()
        .map(|id| (id, graph.add_node(id)))
        .collect();

    for family in families.values() {
        let target = nodes[&family.id];
        for dep in family.dependency_ids() {
            let Some(&source) = nodes.get(dep) else {
                return Err(RegistryError::UnknownDependency {
                    family: family.id.to_string(),
                    dependency: dep.to_string(),
                });
            };
            graph.add_edge(source, target, ());
        }
    }

    toposort(&graph, None)
        .map(|sorted| sorted.into_iter().map(|n| graph[n].clone()).collect())
        .map_err(|cycle| RegistryError::Cycle(graph[cycle.node_id()].to_string()))
}
