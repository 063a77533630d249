// Category filters — which alert categories a consumer wants to see.
//
// The live stream reads a runtime-updatable FilterStore; the push sink gets
// a fixed CategoryFilters from configuration. The JSON field names match
// what the filter form posts.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::alerts::AlertCategory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryFilters {
    #[serde(rename = "chitChat", alias = "chit_chat")]
    pub chit_chat: bool,
    pub police: bool,
    pub jam: bool,
    pub accident: bool,
    pub unknown: bool,
}

impl CategoryFilters {
    /// Every category enabled.
    pub fn all() -> Self {
        Self {
            chit_chat: true,
            police: true,
            jam: true,
            accident: true,
            unknown: true,
        }
    }

    /// Enable exactly the categories named in a comma-separated list
    /// (e.g. "police,jam"). "all" enables everything. Returns an error
    /// naming the first unrecognized entry.
    pub fn from_names(list: &str) -> Result<Self, String> {
        if list.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        let mut filters = Self::default();
        for name in list.split(',').filter(|n| !n.trim().is_empty()) {
            let category = AlertCategory::parse_name(name)
                .ok_or_else(|| format!("unknown alert category '{}'", name.trim()))?;
            filters.set(category, true);
        }
        Ok(filters)
    }

    pub fn allows(&self, category: AlertCategory) -> bool {
        match category {
            AlertCategory::Comment => self.chit_chat,
            AlertCategory::Police => self.police,
            AlertCategory::Jam => self.jam,
            AlertCategory::Accident => self.accident,
            AlertCategory::Unknown => self.unknown,
        }
    }

    pub fn set(&mut self, category: AlertCategory, enabled: bool) {
        let slot = match category {
            AlertCategory::Comment => &mut self.chit_chat,
            AlertCategory::Police => &mut self.police,
            AlertCategory::Jam => &mut self.jam,
            AlertCategory::Accident => &mut self.accident,
            AlertCategory::Unknown => &mut self.unknown,
        };
        *slot = enabled;
    }

    pub fn enabled(&self) -> Vec<AlertCategory> {
        AlertCategory::ALL
            .into_iter()
            .filter(|c| self.allows(*c))
            .collect()
    }
}

/// Shared, runtime-updatable filters for the live stream.
#[derive(Debug, Default)]
pub struct FilterStore {
    current: RwLock<CategoryFilters>,
}

impl FilterStore {
    pub fn new(initial: CategoryFilters) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    pub fn get(&self) -> CategoryFilters {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn replace(&self, filters: CategoryFilters) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = filters;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_nothing() {
        let filters = CategoryFilters::default();
        assert!(AlertCategory::ALL.iter().all(|c| !filters.allows(*c)));
    }

    #[test]
    fn test_json_field_names() {
        let filters: CategoryFilters =
            serde_json::from_str(r#"{"chitChat": true, "jam": true}"#).unwrap();
        assert!(filters.allows(AlertCategory::Comment));
        assert!(filters.allows(AlertCategory::Jam));
        assert!(!filters.allows(AlertCategory::Police));

        // The HTML form posts snake_case checkbox names
        let filters: CategoryFilters = serde_json::from_str(r#"{"chit_chat": true}"#).unwrap();
        assert!(filters.chit_chat);

        let json = serde_json::to_value(CategoryFilters::all()).unwrap();
        assert_eq!(json["chitChat"], true);
    }

    #[test]
    fn test_from_names() {
        let filters = CategoryFilters::from_names("police, jam").unwrap();
        assert_eq!(
            filters.enabled(),
            vec![AlertCategory::Police, AlertCategory::Jam]
        );
        assert_eq!(CategoryFilters::from_names("ALL").unwrap(), CategoryFilters::all());
        assert_eq!(
            CategoryFilters::from_names("").unwrap(),
            CategoryFilters::default()
        );
        assert!(CategoryFilters::from_names("police,hazard").is_err());
    }

    #[test]
    fn test_store_replace() {
        let store = FilterStore::default();
        assert!(!store.get().police);
        store.replace(CategoryFilters::all());
        assert!(store.get().police);
    }
}
