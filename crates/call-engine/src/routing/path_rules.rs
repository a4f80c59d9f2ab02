//! Page URL to pool selection

use greeter_infra_common::protocol::{OrgId, PoolId, SiteId};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub pattern: String,
    pub pool_id: PoolId,
    /// Higher runs first
    pub priority: i32,
    pub is_active: bool,
}

impl PathRule {
    pub fn new(pattern: impl Into<String>, pool_id: impl Into<PoolId>, priority: i32) -> Self {
        Self {
            pattern: pattern.into(),
            pool_id: pool_id.into(),
            priority,
            is_active: true,
        }
    }
}

/// Routing settings for one embedded site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub site_id: SiteId,
    pub org_id: Option<OrgId>,
    pub default_pool_id: Option<PoolId>,
    pub path_rules: Vec<PathRule>,
}

impl SiteConfig {
    pub fn new(site_id: impl Into<SiteId>) -> Self {
        Self {
            site_id: site_id.into(),
            org_id: None,
            default_pool_id: None,
            path_rules: Vec::new(),
        }
    }

    pub fn with_org(mut self, org_id: impl Into<OrgId>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_default_pool(mut self, pool_id: impl Into<PoolId>) -> Self {
        self.default_pool_id = Some(pool_id.into());
        self
    }

    pub fn with_rule(mut self, rule: PathRule) -> Self {
        self.path_rules.push(rule);
        self
    }

    /// Pool for `page_url`: the first matching active rule by descending
    /// priority, else the default pool.
    pub fn select_pool(&self, page_url: &str) -> Option<PoolId> {
        let path = extract_path(page_url);

        let mut rules: Vec<&PathRule> = self.path_rules.iter().filter(|r| r.is_active).collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        if let Some(rule) = rules.into_iter().find(|r| matches_pattern(&path, &r.pattern)) {
            debug!(site_id = %self.site_id, path = %path, pattern = %rule.pattern, pool_id = %rule.pool_id, "Path rule matched");
            return Some(rule.pool_id.clone());
        }

        debug!(site_id = %self.site_id, path = %path, default_pool = ?self.default_pool_id, "No path rule matched");
        self.default_pool_id.clone()
    }
}

/// Path component of a page URL. Input that is not an absolute URL is
/// treated as a path.
pub fn extract_path(page_url: &str) -> String {
    match Url::parse(page_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => {
            let path = page_url.split(['?', '#']).next().unwrap_or_default();
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            }
        }
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Match `path` against an exact, `prefix*`, `/dir/*` or `/dir/**` pattern.
pub fn matches_pattern(path: &str, pattern: &str) -> bool {
    let path = normalize(path);
    let pattern = normalize(pattern);

    if path == pattern {
        return true;
    }

    if let Some(base) = pattern.strip_suffix("/**") {
        return path == base || path.starts_with(&format!("{}/", base));
    }

    if let Some(base) = pattern.strip_suffix("/*") {
        return match path.strip_prefix(&format!("{}/", base)) {
            Some(rest) => !rest.contains('/'),
            None => false,
        };
    }

    if let Some(prefix) = pattern.strip_suffix('*') {
        return path.starts_with(prefix);
    }

    false
}
