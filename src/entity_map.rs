// 🗺️ Entity Catalog - Accounts to legal/economic entities
// Maps ledger accounts to logical entities (a person, several businesses
// sharing one book) using explicit GUID overrides, per-entity regex patterns,
// and parent-to-child inheritance over the account tree.
//
// Resolution is total: every account resolves to SOME entity key, with the
// built-in default entity as the floor. Whether an account was deliberately
// mapped or merely fell through is a separate, first-class question
// (is_explicitly_mapped) - falling through is the signal validation uses to
// detect mapping gaps.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::book::Account;

/// Entity key every unmatched account falls back to
pub const DEFAULT_ENTITY_KEY: &str = "unassigned";

/// Entity key for placeholder (organizational) accounts
pub const PLACEHOLDER_ENTITY_KEY: &str = "placeholder_only";

// ============================================================================
// ENTITY DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A person's own finances
    Individual,
    /// A business (LLC, corporation, ...)
    Business,
    /// Bookkeeping bucket, not a legal entity - excluded from balancing
    /// and equation checks
    Structural,
}

/// Definition of one logical entity within the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Stable short identifier (e.g. "personal", "alpha_llc")
    pub key: String,

    /// Human-readable display name
    pub label: String,

    pub kind: EntityKind,
}

impl EntityDefinition {
    pub fn is_structural(&self) -> bool {
        self.kind == EntityKind::Structural
    }
}

// ============================================================================
// PERSISTED DOCUMENT
// ============================================================================

// On-disk shape: {"version":1, "entities":{key:{label,kind}},
// "accounts":{guid:key}, "patterns":{key:[regex,...]}}

#[derive(Debug, Serialize, Deserialize)]
struct EntityEntry {
    label: String,
    kind: EntityKind,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogDocument {
    version: u32,
    entities: BTreeMap<String, EntityEntry>,
    accounts: BTreeMap<String, String>,
    patterns: BTreeMap<String, Vec<String>>,
}

// ============================================================================
// ENTITY CATALOG
// ============================================================================

/// Entity definitions plus the persisted account→entity assignment.
///
/// Patterns are compiled once (on load or mutation) and evaluated in sorted
/// entity-key order, so lookups are deterministic regardless of insertion
/// order.
#[derive(Debug)]
pub struct EntityCatalog {
    version: u32,
    entities: BTreeMap<String, EntityDefinition>,
    account_entities: HashMap<String, String>,
    patterns: BTreeMap<String, Vec<String>>,
    compiled: BTreeMap<String, Vec<Regex>>,
}

impl EntityCatalog {
    /// Catalog containing only the built-in default and placeholder entities
    pub fn new() -> Self {
        let mut catalog = EntityCatalog {
            version: 1,
            entities: BTreeMap::new(),
            account_entities: HashMap::new(),
            patterns: BTreeMap::new(),
            compiled: BTreeMap::new(),
        };
        catalog.ensure_builtin_entities();
        catalog
    }

    /// The built-in entities exist in every catalog, whatever was loaded
    fn ensure_builtin_entities(&mut self) {
        self.entities
            .entry(DEFAULT_ENTITY_KEY.to_string())
            .or_insert_with(|| EntityDefinition {
                key: DEFAULT_ENTITY_KEY.to_string(),
                label: "Unassigned".to_string(),
                kind: EntityKind::Structural,
            });
        self.entities
            .entry(PLACEHOLDER_ENTITY_KEY.to_string())
            .or_insert_with(|| EntityDefinition {
                key: PLACEHOLDER_ENTITY_KEY.to_string(),
                label: "Placeholder Only".to_string(),
                kind: EntityKind::Structural,
            });
    }

    pub fn default_entity(&self) -> &str {
        DEFAULT_ENTITY_KEY
    }

    pub fn entity(&self, key: &str) -> Option<&EntityDefinition> {
        self.entities.get(key)
    }

    /// All entity definitions in sorted-key order
    pub fn entities(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.entities.values()
    }

    pub fn is_structural(&self, key: &str) -> bool {
        self.entities.get(key).map(|e| e.is_structural()).unwrap_or(false)
    }

    pub fn explicit_mapping_count(&self) -> usize {
        self.account_entities.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.values().map(|p| p.len()).sum()
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Add a new entity definition
    pub fn add_entity(&mut self, key: &str, label: &str, kind: EntityKind) -> Result<()> {
        if self.entities.contains_key(key) {
            bail!("Entity key '{}' already exists", key);
        }
        self.entities.insert(
            key.to_string(),
            EntityDefinition {
                key: key.to_string(),
                label: label.to_string(),
                kind,
            },
        );
        Ok(())
    }

    /// Add or update an explicit account→entity mapping
    pub fn add_account_mapping(&mut self, guid: &str, entity_key: &str) -> Result<()> {
        if !self.entities.contains_key(entity_key) {
            bail!("Entity key '{}' not found in entity definitions", entity_key);
        }
        self.account_entities
            .insert(guid.to_string(), entity_key.to_string());
        Ok(())
    }

    /// Replace an entity's pattern list and recompile
    pub fn set_patterns(&mut self, entity_key: &str, patterns: Vec<String>) -> Result<()> {
        if !self.entities.contains_key(entity_key) {
            bail!("Entity key '{}' not found in entity definitions", entity_key);
        }
        self.patterns.insert(entity_key.to_string(), patterns);
        self.compile_patterns();
        Ok(())
    }

    /// Compile all patterns; invalid ones are reported and skipped
    fn compile_patterns(&mut self) {
        self.compiled.clear();
        for (entity_key, pattern_list) in &self.patterns {
            let mut compiled_list = Vec::new();
            for pattern_str in pattern_list {
                match Regex::new(pattern_str) {
                    Ok(regex) => compiled_list.push(regex),
                    Err(e) => eprintln!(
                        "Invalid regex pattern for entity '{}': '{}' - {}",
                        entity_key, pattern_str, e
                    ),
                }
            }
            self.compiled.insert(entity_key.clone(), compiled_list);
        }
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Partial resolution: explicit GUID map first, then each entity's
    /// compiled patterns in sorted entity-key order.
    ///
    /// None is a first-class outcome - it is what the cross-entity analyzer
    /// uses to exclude unattributable splits.
    pub fn match_account(&self, guid: &str, full_name: &str) -> Option<&str> {
        if let Some(entity_key) = self.account_entities.get(guid) {
            return Some(entity_key.as_str());
        }
        self.match_patterns(full_name)
    }

    /// Pattern-only matching against the account's full name
    fn match_patterns(&self, full_name: &str) -> Option<&str> {
        for (entity_key, patterns) in &self.compiled {
            for pattern in patterns {
                if pattern.is_match(full_name) {
                    return Some(entity_key.as_str());
                }
            }
        }
        None
    }

    /// Total resolution: match_account falling back to the default entity.
    /// Never fails and never returns "no entity".
    pub fn resolve(&self, guid: &str, full_name: &str) -> &str {
        self.match_account(guid, full_name)
            .unwrap_or(DEFAULT_ENTITY_KEY)
    }

    /// True when the account was deliberately attributed - an explicit GUID
    /// mapping or a pattern hit to a non-default entity. Falling through to
    /// the default entity (or being pinned to it) is the signal that a
    /// mapping gap exists, and returns false.
    pub fn is_explicitly_mapped(&self, guid: &str, full_name: &str) -> bool {
        match self.match_account(guid, full_name) {
            Some(key) => key != DEFAULT_ENTITY_KEY,
            None => false,
        }
    }

    // ========================================================================
    // REMAP (tree walk)
    // ========================================================================

    /// Regenerate the explicit map from the full account set.
    ///
    /// Tree DFS, parent before child, so each assignment depends only on
    /// ancestors already visited:
    ///   placeholder  → placeholder entity (own key never propagates; any
    ///                  inherited entity passes through to children)
    ///   own pattern  → that entity, propagated to descendants
    ///   inherited    → nearest ancestor's propagated entity
    ///   otherwise    → default entity, propagating nothing
    ///
    /// Every account receives exactly one entity, giving 100% coverage in a
    /// single pass. Returns the number of accounts assigned.
    pub fn remap(&mut self, accounts: &[Account]) -> usize {
        let by_guid: HashMap<&str, &Account> =
            accounts.iter().map(|a| (a.guid.as_str(), a)).collect();

        let mut children: HashMap<&str, Vec<&Account>> = HashMap::new();
        let mut roots: Vec<&Account> = Vec::new();
        for account in accounts {
            match account.parent_guid.as_deref().filter(|p| by_guid.contains_key(p)) {
                Some(parent) => children.entry(parent).or_default().push(account),
                None => roots.push(account),
            }
        }

        // Deterministic walk order regardless of input order
        roots.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        for list in children.values_mut() {
            list.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        }

        let mut assignments: HashMap<String, String> = HashMap::new();
        for root in roots {
            self.assign_recursive(root, None, &children, &mut assignments);
        }

        let assigned = assignments.len();
        self.account_entities = assignments;
        assigned
    }

    fn assign_recursive(
        &self,
        account: &Account,
        inherited: Option<&str>,
        children: &HashMap<&str, Vec<&Account>>,
        assignments: &mut HashMap<String, String>,
    ) {
        let (assigned, to_pass): (&str, Option<&str>) = if account.is_placeholder {
            (PLACEHOLDER_ENTITY_KEY, inherited)
        } else if let Some(matched) = self.match_patterns(&account.full_name) {
            (matched, Some(matched))
        } else if let Some(inherited) = inherited {
            (inherited, Some(inherited))
        } else {
            (DEFAULT_ENTITY_KEY, None)
        };

        assignments.insert(account.guid.clone(), assigned.to_string());

        if let Some(list) = children.get(account.guid.as_str()) {
            for child in list {
                self.assign_recursive(child, to_pass, children, assignments);
            }
        }
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Load the catalog from a JSON document.
    ///
    /// A missing file is not an error - it yields a catalog with only the
    /// built-in entities.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(EntityCatalog::new());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read entity catalog: {}", path.display()))?;
        let document: CatalogDocument = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid entity catalog JSON: {}", path.display()))?;

        let mut catalog = EntityCatalog {
            version: document.version,
            entities: document
                .entities
                .into_iter()
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        EntityDefinition {
                            key,
                            label: entry.label,
                            kind: entry.kind,
                        },
                    )
                })
                .collect(),
            account_entities: document.accounts.into_iter().collect(),
            patterns: document.patterns,
            compiled: BTreeMap::new(),
        };
        catalog.ensure_builtin_entities();
        catalog.compile_patterns();

        Ok(catalog)
    }

    /// Save the catalog back to its JSON document
    pub fn save(&self, path: &Path) -> Result<()> {
        let document = CatalogDocument {
            version: self.version,
            entities: self
                .entities
                .iter()
                .map(|(key, def)| {
                    (
                        key.clone(),
                        EntityEntry {
                            label: def.label.clone(),
                            kind: def.kind,
                        },
                    )
                })
                .collect(),
            accounts: self
                .account_entities
                .iter()
                .map(|(guid, key)| (guid.clone(), key.clone()))
                .collect(),
            patterns: self.patterns.clone(),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&document)
            .context("Failed to serialize entity catalog")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write entity catalog: {}", path.display()))?;

        Ok(())
    }
}

impl Default for EntityCatalog {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
