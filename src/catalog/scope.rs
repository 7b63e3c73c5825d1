//! Category scope resolution.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::entities::category;

/// Slugs that mean "the whole catalog".
pub const ALL_CATEGORIES: [&str; 2] = ["all", "tous"];

/// The set of categories a browse or facet request covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    /// The requested category; `None` for the whole catalog.
    pub root: Option<category::Model>,
    pub category_ids: BTreeSet<i64>,
}

impl Scope {
    pub fn contains(&self, category_id: i64) -> bool {
        self.category_ids.contains(&category_id)
    }

    /// Stable identifier used in cache keys.
    pub fn key(&self) -> String {
        match &self.root {
            Some(root) => root.slug.clone(),
            None => ALL_CATEGORIES[0].to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("Category '{0}' not found")]
    UnknownCategory(String),
}

fn normalize(slug: Option<&str>) -> Option<String> {
    slug.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

/// Resolves `category` / `subcategory` slugs against the category table.
///
/// `subcategory` wins when both are given. The named category must exist and be
/// active; the scope is that category plus every active descendant reachable
/// through active parents.
pub fn resolve(
    categories: &[category::Model],
    category: Option<&str>,
    subcategory: Option<&str>,
) -> Result<Scope, ScopeError> {
    let requested = normalize(subcategory).or_else(|| {
        normalize(category).filter(|slug| !ALL_CATEGORIES.contains(&slug.as_str()))
    });

    let Some(slug) = requested else {
        return Ok(Scope {
            root: None,
            category_ids: categories
                .iter()
                .filter(|c| c.is_active)
                .map(|c| c.id)
                .collect(),
        });
    };

    let root = categories
        .iter()
        .find(|c| c.is_active && c.slug.eq_ignore_ascii_case(&slug))
        .ok_or(ScopeError::UnknownCategory(slug))?;

    Ok(Scope {
        category_ids: descendants(categories, root.id),
        root: Some(root.clone()),
    })
}

/// `root` plus its active descendants. Cycles in the parent links terminate.
pub fn descendants(categories: &[category::Model], root: i64) -> BTreeSet<i64> {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for c in categories.iter().filter(|c| c.is_active) {
        if let Some(parent) = c.parent_id {
            children.entry(parent).or_default().push(c.id);
        }
    }

    let mut visited = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().copied());
        }
    }
    visited.into_iter().collect()
}

/// `category_id` and all of its ancestors, nearest first.
pub fn ancestors(categories: &[category::Model], category_id: i64) -> Vec<i64> {
    let by_id: HashMap<i64, &category::Model> = categories.iter().map(|c| (c.id, c)).collect();
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(category_id);
    while let Some(id) = cursor {
        if !seen.insert(id) {
            break;
        }
        chain.push(id);
        cursor = by_id.get(&id).and_then(|c| c.parent_id);
    }
    chain
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    pub(crate) fn cat(id: i64, parent: Option<i64>, slug: &str, active: bool) -> category::Model {
        category::Model {
            id,
            parent_id: parent,
            name: slug.to_uppercase(),
            slug: slug.to_string(),
            description: None,
            image_url: None,
            position: 0,
            is_active: active,
            created_at: Utc::now(),
        }
    }

    fn tree() -> Vec<category::Model> {
        vec![
            cat(1, None, "computers", true),
            cat(2, Some(1), "laptops", true),
            cat(3, Some(2), "gaming-laptops", true),
            cat(4, Some(1), "retired", false),
            cat(5, Some(4), "orphaned", true),
            cat(6, None, "phones", true),
        ]
    }

    #[test]
    fn category_scope_is_active_closure() {
        let scope = resolve(&tree(), Some("computers"), None).unwrap();
        assert_eq!(scope.category_ids, BTreeSet::from([1, 2, 3]));
        assert_eq!(scope.key(), "computers");
    }

    #[test]
    fn subcategory_takes_precedence() {
        let scope = resolve(&tree(), Some("phones"), Some("Laptops")).unwrap();
        assert_eq!(scope.category_ids, BTreeSet::from([2, 3]));
    }

    #[test]
    fn all_keywords_cover_every_active_category() {
        for slug in [None, Some("all"), Some("tous"), Some("  ")] {
            let scope = resolve(&tree(), slug, None).unwrap();
            assert_eq!(scope.root, None);
            assert_eq!(scope.category_ids, BTreeSet::from([1, 2, 3, 5, 6]));
        }
    }

    #[test]
    fn unknown_or_inactive_slug_is_not_found() {
        assert_matches!(
            resolve(&tree(), Some("nope"), None),
            Err(ScopeError::UnknownCategory(slug)) if slug == "nope"
        );
        assert_matches!(resolve(&tree(), Some("retired"), None), Err(_));
    }

    #[test]
    fn cycles_terminate() {
        let cyclic = vec![cat(1, Some(2), "a", true), cat(2, Some(1), "b", true)];
        assert_eq!(descendants(&cyclic, 1), BTreeSet::from([1, 2]));
        assert_eq!(ancestors(&cyclic, 1), vec![1, 2]);
    }

    #[test]
    fn ancestors_walk_to_root() {
        assert_eq!(ancestors(&tree(), 3), vec![3, 2, 1]);
    }
}
