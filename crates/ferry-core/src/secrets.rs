//! Migration token generation and the local secrets file.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;

/// Key written into the secrets file for the remote migration endpoint.
pub const MIGRATION_HASH_KEY: &str = "MIGRATION_HASH";

/// Shortest token the remote endpoint accepts.
pub const MIN_TOKEN_LENGTH: usize = 10;

static MIGRATION_HASH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^MIGRATION_HASH=[^\r\n]*(\r?)$").expect("static regex is valid")
});

/// Per-run credential gating the remote migration trigger.
#[derive(Clone, PartialEq, Eq)]
pub struct MigrationToken(String);

impl MigrationToken {
    /// Generate a fresh alphanumeric token. Lengths below
    /// [`MIN_TOKEN_LENGTH`] are raised to the minimum.
    pub fn generate(length: usize) -> Self {
        let length = length.max(MIN_TOKEN_LENGTH);
        let token = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short prefix that is safe to print.
    pub fn redacted(&self) -> String {
        format!("{}…", &self.0[..4])
    }
}

// Never print the full token through `{:?}`.
impl std::fmt::Debug for MigrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MigrationToken").field(&self.redacted()).finish()
    }
}

/// Replace the `MIGRATION_HASH` entry in `content`, or append one.
///
/// Every other byte of `content` is preserved.
pub fn upsert_migration_hash(content: &str, token: &MigrationToken) -> String {
    if MIGRATION_HASH_LINE.is_match(content) {
        let replacement = format!("{}={}${{1}}", MIGRATION_HASH_KEY, token.as_str());
        return MIGRATION_HASH_LINE
            .replace_all(content, replacement.as_str())
            .into_owned();
    }

    let mut next = content.to_string();
    if !next.is_empty() && !next.ends_with('\n') {
        next.push('\n');
    }
    next.push_str(MIGRATION_HASH_KEY);
    next.push('=');
    next.push_str(token.as_str());
    next.push('\n');
    next
}

/// Read-modify-write the secrets file at `path`, creating it if missing.
pub fn write_migration_hash(path: &Path, token: &MigrationToken) -> std::io::Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err),
    };
    fs::write(path, upsert_migration_hash(&existing, token))
}

/// Interpret an environment flag value the way dotenv files spell booleans.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
