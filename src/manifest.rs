//! Package manager detection and `package.json` access.

use crate::error::{Result, UpdaterError};
use crate::updates::VersionDelta;
use crate::{log_debug, log_warn};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file shared by every supported package manager
pub const MANIFEST_FILE: &str = "package.json";

/// Supported package managers, each identified by its lockfile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManager {
    /// Detection order: yarn, then pnpm, falling back to npm
    pub const DETECTION_ORDER: &'static [PackageManager] = &[Self::Yarn, Self::Pnpm];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    pub const fn lockfile(self) -> &'static str {
        match self {
            Self::Npm => "package-lock.json",
            Self::Yarn => "yarn.lock",
            Self::Pnpm => "pnpm-lock.yaml",
        }
    }

    /// Files staged for a dependency update commit
    pub fn tracked_files(self) -> [&'static str; 2] {
        [MANIFEST_FILE, self.lockfile()]
    }

    /// Arguments that install a tool globally with this manager
    pub fn global_install_args(self, tool: &str) -> Vec<String> {
        let prefix: &[&str] = match self {
            Self::Npm => &["install", "-g"],
            Self::Yarn => &["global", "add"],
            Self::Pnpm => &["add", "-g"],
        };
        prefix
            .iter()
            .map(|s| (*s).to_string())
            .chain(std::iter::once(tool.to_string()))
            .collect()
    }

    /// Detect the package manager of the project rooted at `dir`
    pub fn detect(dir: &Path) -> Self {
        let detected = Self::DETECTION_ORDER
            .iter()
            .copied()
            .find(|pm| dir.join(pm.lockfile()).exists())
            .unwrap_or(Self::Npm);
        log_debug!("Detected package manager {} in {}", detected, dir.display());
        detected
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The dependency sections of a `package.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: HashMap<String, String>,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| UpdaterError::Manifest(format!("Invalid {MANIFEST_FILE}: {e}")))
    }

    /// Declared version of a package, looking in dependencies before dev-dependencies
    pub fn current_version(&self, package: &str) -> Option<&str> {
        self.dependencies
            .get(package)
            .or_else(|| self.dev_dependencies.get(package))
            .map(String::as_str)
    }
}

/// The `package.json` text as declared before discovery rewrote it.
///
/// Discovery may bump every outdated entry, major ones included. Only the safe deltas
/// are written back on top of the declared text, and everything else keeps the value
/// it had before the run.
#[derive(Debug, Clone)]
pub struct ManifestSnapshot {
    path: PathBuf,
    content: String,
    manifest: Manifest,
}

impl ManifestSnapshot {
    pub fn capture(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            UpdaterError::Manifest(format!("Failed to read {}: {e}", path.display()))
        })?;
        let manifest = Manifest::parse(&content)?;
        Ok(Self {
            path,
            content,
            manifest,
        })
    }

    /// Dependencies as declared before discovery
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Write the declared manifest with only `deltas` applied
    pub fn apply(&self, deltas: &[VersionDelta]) -> Result<()> {
        // Ranges chosen by the scanner, when it rewrote the file
        let rewritten = fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| Manifest::parse(&content).ok());

        let mut content = self.content.clone();
        for delta in deltas {
            let name = delta.package_name();
            let Some(declared) = self.manifest.current_version(name) else {
                log_warn!("{} is not declared in {}, not updating it", name, MANIFEST_FILE);
                continue;
            };
            let range = rewritten
                .as_ref()
                .and_then(|manifest| manifest.current_version(name))
                .filter(|range| *range != declared)
                .map_or_else(
                    || bump_range(declared, &delta.target_version().to_string()),
                    str::to_string,
                );
            content = replace_range(&content, name, declared, &range)?;
        }

        self.write(&content)?;
        log_debug!("Applied {} update(s) to {}", deltas.len(), MANIFEST_FILE);
        Ok(())
    }

    /// Write the declared manifest back unchanged
    pub fn restore(&self) -> Result<()> {
        self.write(&self.content)
    }

    fn write(&self, content: &str) -> Result<()> {
        fs::write(&self.path, content).map_err(|e| {
            UpdaterError::Manifest(format!("Failed to write {}: {e}", self.path.display()))
        })
    }
}

/// Keep the declared range operator in front of the new version (`~1.2.0` to `~1.4.1`)
fn bump_range(declared: &str, target: &str) -> String {
    let version = declared.trim_start_matches(['^', '~', '=', '<', '>', 'v']);
    let operator = declared.strip_suffix(version).unwrap_or_default();
    format!("{operator}{target}")
}

/// Replace the value of every `"name": "declared"` entry
fn replace_range(content: &str, name: &str, declared: &str, range: &str) -> Result<String> {
    let quote = |value: &str| {
        serde_json::to_string(value)
            .map_err(|e| UpdaterError::Manifest(format!("Cannot encode {value:?}: {e}")))
    };
    let pattern = format!(
        r"(?P<key>{}\s*:\s*){}",
        regex::escape(&quote(name)?),
        regex::escape(&quote(declared)?)
    );
    let entry = Regex::new(&pattern)
        .map_err(|e| UpdaterError::Manifest(format!("Cannot match entry {name}: {e}")))?;
    let value = quote(range)?;
    Ok(entry
        .replace_all(content, |caps: &Captures| format!("{}{value}", &caps["key"]))
        .into_owned())
}
