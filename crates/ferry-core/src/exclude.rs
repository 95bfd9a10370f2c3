//! Exclusion rules applied while packaging the project tree.
//!
//! Patterns follow `zip -x` conventions: `*` may cross directory separators,
//! `dir/*` drops everything below `dir`, and a pattern without a `/` is
//! compared against every path component so it applies at any depth.

use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Rules present in every fresh rule set, before the secrets file.
const DEFAULT_RULES: &[&str] = &[
    ".idea",
    ".phpunit.result.cache",
    ".DS_Store",
    ".editorconfig",
    ".gitattributes",
    ".git/*",
    ".github/*",
    ".scribe/*",
];

const RUNTIME_STORAGE_RULES: &[&str] = &[
    "storage/app/images/*",
    "storage/app/public/*",
    "storage/logs/*",
    "storage/framework/cache/*",
    "storage/framework/sessions/*",
    "storage/framework/views/*",
];

/// The remote host keeps its own variants of these files.
const REMOTE_ORIGINAL_RULES: &[&str] = &[".htaccess", "public/.htaccess", "public/index.php"];

/// Ordered, de-duplicated set of exclusion patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeRuleSet {
    patterns: Vec<String>,
}

impl ExcludeRuleSet {
    /// An empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock rule set: VCS and IDE metadata, the secrets file, runtime
    /// storage and the remote-original entrypoint files.
    pub fn defaults(secrets_file: &str) -> Self {
        let mut rules = Self::new();
        for pattern in DEFAULT_RULES {
            rules.add(*pattern);
        }
        rules.add(secrets_file);
        for pattern in RUNTIME_STORAGE_RULES.iter().chain(REMOTE_ORIGINAL_RULES) {
            rules.add(*pattern);
        }
        rules
    }

    /// Append a pattern. Returns `false` if it was already present.
    pub fn add(&mut self, pattern: impl Into<String>) -> bool {
        let pattern = normalize(&pattern.into());
        if pattern.is_empty() || self.patterns.contains(&pattern) {
            return false;
        }
        self.patterns.push(pattern);
        true
    }

    /// Remove a pattern. Returns `false` if it was not present.
    pub fn remove(&mut self, pattern: &str) -> bool {
        let pattern = normalize(pattern);
        let before = self.patterns.len();
        self.patterns.retain(|p| *p != pattern);
        self.patterns.len() != before
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.patterns.contains(&normalize(pattern))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a `/`-separated path relative to the project root is excluded.
    pub fn matches(&self, relative_path: &str) -> bool {
        let path = relative_path.trim_start_matches("./");
        self.patterns.iter().any(|p| pattern_matches(p, path))
    }
}

fn normalize(pattern: &str) -> String {
    pattern.trim().trim_start_matches("./").to_string()
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(dir) = pattern.strip_suffix("/*") {
        // Contents only: `storage/logs` itself stays in the tree.
        if let Some(rest) = path.strip_prefix(dir) {
            if rest.starts_with('/') && rest.len() > 1 {
                return true;
            }
        }
    }

    if pattern.contains('/') {
        return glob_matches(pattern, path);
    }

    path.split('/').any(|component| glob_matches(pattern, component))
}

fn glob_matches(pattern: &str, candidate: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(glob) => glob.matches_with(candidate, MATCH_OPTIONS),
        Err(_) => pattern == candidate,
    }
}
