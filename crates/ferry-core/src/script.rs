//! The remote bootstrap script.
//!
//! The script is PHP because the remote host only runs what its web server
//! executes. It is rendered from a fixed template with typed parameters, so
//! its content can be checked without a PHP interpreter.

/// Directories the remote framework expects to exist after unpacking.
pub const DEFAULT_RUNTIME_DIRS: &[&str] = &[
    "storage/framework/cache",
    "storage/framework/sessions",
    "storage/framework/testing",
    "storage/framework/views",
];

/// Body the script prints when extraction succeeded.
pub const STATUS_COMPLETE: &str = "complete";

/// Body the script prints when the archive could not be opened.
pub const STATUS_ERROR: &str = "error";

const TEMPLATE: &str = r#"<?php
$archive = '../{{archive}}';
$zip = new ZipArchive;

$res = $zip->open($archive);

if ($res === TRUE) {
    $files = array();
    for ($i = 0; $i < $zip->numFiles; $i++) {
        $files[] = $zip->getNameIndex($i);
    }

    $zip->extractTo('../', $files);
    $zip->close();

    $runtimeDirs = array({{runtime_dirs}});
    foreach ($runtimeDirs as $dir) {
        if (!is_dir('../' . $dir)) {
            mkdir('../' . $dir, 0755, true);
        }
    }
{{hosting_patch}}
    echo "{{complete}}";
} else {
    echo "{{error}}";
}
"#;

/// In-place string replacement applied to one remote file after unpacking.
///
/// Used for hosts whose platform checks reject the deployed runtime version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostingPatch {
    /// Path relative to the project root.
    pub file: String,
    pub search: String,
    pub replace: String,
}

/// Parameters of the remote unpack script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapScript {
    pub archive_name: String,
    pub runtime_dirs: Vec<String>,
    pub hosting_patch: Option<HostingPatch>,
}

impl BootstrapScript {
    pub fn new(archive_name: impl Into<String>) -> Self {
        Self {
            archive_name: archive_name.into(),
            runtime_dirs: DEFAULT_RUNTIME_DIRS.iter().map(|d| d.to_string()).collect(),
            hosting_patch: None,
        }
    }

    pub fn with_runtime_dirs(mut self, dirs: Vec<String>) -> Self {
        self.runtime_dirs = dirs;
        self
    }

    pub fn with_hosting_patch(mut self, patch: Option<HostingPatch>) -> Self {
        self.hosting_patch = patch;
        self
    }

    /// Render the PHP source uploaded to the public web root.
    pub fn render(&self) -> String {
        let runtime_dirs = self
            .runtime_dirs
            .iter()
            .map(|d| php_string(d.trim_matches('/')))
            .collect::<Vec<_>>()
            .join(", ");

        let hosting_patch = match &self.hosting_patch {
            Some(patch) => format!(
                concat!(
                    "\n    $patchFile = '../' . {file};\n",
                    "    if (is_file($patchFile)) {{\n",
                    "        $content = file_get_contents($patchFile);\n",
                    "        $content = str_replace({search}, {replace}, $content);\n",
                    "        file_put_contents($patchFile, $content);\n",
                    "    }}\n",
                ),
                file = php_string(patch.file.trim_start_matches('/')),
                search = php_string(&patch.search),
                replace = php_string(&patch.replace),
            ),
            None => String::new(),
        };

        TEMPLATE
            .replace("{{archive}}", &php_escape(&self.archive_name))
            .replace("{{runtime_dirs}}", &runtime_dirs)
            .replace("{{hosting_patch}}", &hosting_patch)
            .replace("{{complete}}", STATUS_COMPLETE)
            .replace("{{error}}", STATUS_ERROR)
    }
}

/// Escape for the inside of a single-quoted PHP string.
fn php_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn php_string(value: &str) -> String {
    format!("'{}'", php_escape(value))
}

/// Whether a bootstrap response body reports success.
pub fn reports_complete(body: &str) -> bool {
    body.trim() == STATUS_COMPLETE
}
