//! User-defined categories and keyword-based categorization.
//!
//! The store is a JSON object of category name -> keyword list. Key order is
//! significant: it is the evaluation order of the categorizer.

use anyhow::{Context, Result, anyhow};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::{Transaction, UNCATEGORIZED};
use crate::error::CategoryOpError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keywords: Vec::new(),
        }
    }
}

/// Ordered list of categories that (de)serializes as a JSON object.
#[derive(Debug, Clone)]
struct CategoryList(Vec<Category>);

impl Serialize for CategoryList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for c in &self.0 {
            map.serialize_entry(&c.name, &c.keywords)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ListVisitor;

        impl<'de> Visitor<'de> for ListVisitor {
            type Value = CategoryList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping category names to keyword arrays")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut out: Vec<Category> = Vec::new();
                while let Some((name, keywords)) = access.next_entry::<String, Vec<String>>()? {
                    // A repeated key keeps its first position and its last value.
                    match out.iter_mut().find(|c| c.name == name) {
                        Some(existing) => existing.keywords = keywords,
                        None => out.push(Category { name, keywords }),
                    }
                }
                Ok(CategoryList(out))
            }
        }

        deserializer.deserialize_map(ListVisitor)
    }
}

/// The persisted category mapping, owned by one session.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    path: PathBuf,
    categories: Vec<Category>,
}

impl CategoryStore {
    /// A fresh store holding only the fallback category. Nothing is written yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            categories: vec![Category::new(UNCATEGORIZED)],
        }
    }

    /// Loads the store from `path`, or starts fresh if the file does not exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "no category store yet; starting fresh");
            return Ok(Self::new(path));
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let CategoryList(mut categories): CategoryList = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if !categories.iter().any(|c| c.name == UNCATEGORIZED) {
            categories.insert(0, Category::new(UNCATEGORIZED));
        }

        debug!(path = %path.display(), categories = categories.len(), "loaded category store");
        Ok(Self { path, categories })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create dir {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(&CategoryList(self.categories.clone()))?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!(path = %self.path.display(), "saved category store");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// In-memory only; see [`CategoryStore::add_category`] for the persisting form.
    pub fn insert_category(&mut self, name: &str) -> std::result::Result<(), CategoryOpError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CategoryOpError::EmptyCategoryName);
        }
        if self.contains(name) {
            return Err(CategoryOpError::DuplicateCategory(name.to_string()));
        }
        self.categories.push(Category::new(name));
        Ok(())
    }

    /// In-memory only; see [`CategoryStore::add_keyword`] for the persisting form.
    pub fn insert_keyword(
        &mut self,
        category: &str,
        keyword: &str,
    ) -> std::result::Result<(), CategoryOpError> {
        let keyword = keyword.trim();
        let entry = self
            .categories
            .iter_mut()
            .find(|c| c.name == category)
            .ok_or_else(|| CategoryOpError::UnknownCategory(category.to_string()))?;

        if keyword.is_empty() {
            return Err(CategoryOpError::EmptyKeyword);
        }
        if entry.keywords.iter().any(|k| k == keyword) {
            return Err(CategoryOpError::DuplicateKeyword {
                category: category.to_string(),
                keyword: keyword.to_string(),
            });
        }
        entry.keywords.push(keyword.to_string());
        Ok(())
    }

    /// Creates an empty category and persists. `false` if the name is empty or taken.
    pub fn add_category(&mut self, name: &str) -> Result<bool> {
        Ok(self.try_add_category(name)?.is_ok())
    }

    /// Appends a keyword and persists. `false` if it is empty or already listed
    /// under `category`. An unknown category is an error.
    pub fn add_keyword(&mut self, category: &str, keyword: &str) -> Result<bool> {
        Ok(self.try_add_keyword(category, keyword)?.is_ok())
    }

    /// Like [`CategoryStore::add_category`], but hands back the reason a
    /// rejected edit was refused.
    pub fn try_add_category(
        &mut self,
        name: &str,
    ) -> Result<std::result::Result<(), CategoryOpError>> {
        self.persist_if_applied(|store| store.insert_category(name))
    }

    /// Like [`CategoryStore::add_keyword`], but hands back the reason a
    /// rejected edit was refused.
    pub fn try_add_keyword(
        &mut self,
        category: &str,
        keyword: &str,
    ) -> Result<std::result::Result<(), CategoryOpError>> {
        self.persist_if_applied(|store| store.insert_keyword(category, keyword))
    }

    /// Saves after a successful edit. Rejections come back in the inner
    /// `Result`; every other failure is an error.
    fn persist_if_applied<F>(&mut self, op: F) -> Result<std::result::Result<(), CategoryOpError>>
    where
        F: FnOnce(&mut Self) -> std::result::Result<(), CategoryOpError>,
    {
        match op(self) {
            Ok(()) => {
                self.save()?;
                Ok(Ok(()))
            }
            Err(err) if err.is_rejection() => {
                debug!(%err, "category store edit rejected");
                Ok(Err(err))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Assigns one category per transaction. Returns a new table in the same order.
///
/// Categories are tried in store order and the first one with a matching
/// keyword wins. Matching is a case-insensitive substring test on the details.
pub fn categorize(transactions: &[Transaction], store: &CategoryStore) -> Vec<Transaction> {
    let rules: Vec<(&str, Vec<String>)> = store
        .categories()
        .iter()
        .filter(|c| c.name != UNCATEGORIZED && !c.keywords.is_empty())
        .filter_map(|c| {
            let keywords: Vec<String> = c
                .keywords
                .iter()
                .map(|k| k.to_lowercase().trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
            (!keywords.is_empty()).then_some((c.name.as_str(), keywords))
        })
        .collect();

    debug!(rules = rules.len(), rows = transactions.len(), "categorizing");

    transactions
        .iter()
        .map(|t| {
            let details = t.details.to_lowercase();
            let details = details.trim();
            let category = rules
                .iter()
                .find(|(_, keywords)| keywords.iter().any(|k| details.contains(k.as_str())))
                .map(|(name, _)| (*name).to_string())
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            Transaction {
                category,
                ..t.clone()
            }
        })
        .collect()
}

/// Moves one row (0-based) to `category` and learns its details as a keyword
/// of that category, so future imports categorize it the same way.
pub fn reassign(
    transactions: &[Transaction],
    row: usize,
    category: &str,
    store: &mut CategoryStore,
) -> Result<Vec<Transaction>> {
    if !store.contains(category) {
        return Err(CategoryOpError::UnknownCategory(category.to_string()).into());
    }
    let current = transactions.get(row).ok_or_else(|| {
        anyhow!(
            "Row {} is out of range (statement has {} rows)",
            row + 1,
            transactions.len()
        )
    })?;

    let mut out = transactions.to_vec();
    if current.category == category {
        return Ok(out);
    }

    let learned = store.add_keyword(category, &current.details)?;
    debug!(row, category, learned, "reassigned transaction");
    out[row].category = category.to_string();
    Ok(out)
}
