//! TOML parser with helpful error messages

use super::schema::FerryConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse ferry.toml with detailed error messages
pub fn parse_ferry_toml(path: &Path) -> Result<FerryConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_ferry_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse ferry.toml content from string
pub fn parse_ferry_toml_str(content: &str) -> Result<FerryConfig> {
    let config: FerryConfig =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    config.validate()?;

    Ok(config)
}

/// Attach the offending lines to a TOML parse error
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let error_msg = error.message().to_string();

    let line_num = error
        .span()
        .map(|span| {
            let before = &content.as_bytes()[..span.start.min(content.len())];
            before.iter().filter(|b| **b == b'\n').count() + 1
        });

    match line_num {
        Some(line_num) => anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            get_line_context(content, line_num),
            error_msg
        ),
        None => anyhow::anyhow!("TOML parsing error: {}", error_msg),
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &FerryConfig) -> Result<String> {
    toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration to TOML")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
[deploy]
before = ["composer install --no-dev"]
timeout_secs = 30

[deploy.hosting_patch]
file = "vendor/composer/platform_check.php"
search = "80002"
replace = "80001"

[excludes]
add = ["node_modules"]
remove = [".editorconfig"]

[targets.stagingFTP]
root = "/mnt/staging"
base_path = "domains/test.example.com"
hostname = "test.example.com"
"#;

        let config = parse_ferry_toml_str(toml).unwrap();
        assert_eq!(config.deploy.before, vec!["composer install --no-dev"]);
        assert_eq!(config.deploy.timeout_secs, Some(30));
        assert_eq!(config.deploy.archive_name, "deploy.zip");
        assert!(config.deploy.hosting_patch.is_some());
        assert_eq!(config.excludes.add, vec!["node_modules"]);

        let target = config.target("stagingFTP").unwrap();
        assert_eq!(target.scheme, "https");
        assert_eq!(target.hostname, "test.example.com");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_ferry_toml_str("").unwrap();
        assert_eq!(config, FerryConfig::new());
    }

    #[test]
    fn test_parse_invalid_toml_reports_line() {
        let toml = "[deploy]\narchive_name = \"deploy.zip\"\n[targets.staging\nroot = \"/x\"\n";

        let err = parse_ferry_toml_str(toml).unwrap_err().to_string();
        assert!(err.contains("TOML parsing error at line"), "unexpected error: {}", err);
        assert!(err.contains(">>>"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = parse_ferry_toml_str("[deploy]\narchive = \"x.zip\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let result = parse_ferry_toml_str("[deploy]\ntoken_length = 4\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = FerryConfig::new();
        config.deploy.before.push("npm run build".to_string());
        let text = to_toml(&config).unwrap();
        let parsed = parse_ferry_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
