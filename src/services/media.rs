//! Media URL resolution for stored image paths.

/// Turns a stored media path into an absolute URL.
pub trait MediaResolver: Send + Sync {
    fn resolve_url(&self, stored_path: &str) -> String;

    /// Blank paths resolve to nothing.
    fn resolve_opt(&self, stored_path: Option<&str>) -> Option<String> {
        stored_path
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| self.resolve_url(p))
    }
}

/// Prefixes relative paths with a configured base URL. Absolute URLs pass through.
#[derive(Debug, Clone, Default)]
pub struct BaseUrlMediaResolver {
    base_url: Option<String>,
}

impl BaseUrlMediaResolver {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url
                .map(|b| b.trim().trim_end_matches('/').to_string())
                .filter(|b| !b.is_empty()),
        }
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://") || path.starts_with("//")
}

impl MediaResolver for BaseUrlMediaResolver {
    fn resolve_url(&self, stored_path: &str) -> String {
        match &self.base_url {
            Some(base) if !is_absolute(stored_path) => {
                format!("{}/{}", base, stored_path.trim_start_matches('/'))
            }
            _ => stored_path.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_relative_paths_only() {
        let resolver = BaseUrlMediaResolver::new(Some("https://cdn.example.com/media/".into()));
        assert_eq!(
            resolver.resolve_url("/items/a.jpg"),
            "https://cdn.example.com/media/items/a.jpg"
        );
        assert_eq!(
            resolver.resolve_url("https://img.example.org/b.jpg"),
            "https://img.example.org/b.jpg"
        );
        assert_eq!(resolver.resolve_opt(Some("  ")), None);
    }

    #[test]
    fn without_base_paths_are_unchanged() {
        let resolver = BaseUrlMediaResolver::new(None);
        assert_eq!(resolver.resolve_url("items/a.jpg"), "items/a.jpg");
    }
}
