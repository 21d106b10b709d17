//! Version deltas: parsing scanner output and classifying updates by risk.

use crate::log_warn;
use crate::manifest::Manifest;
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Range operators and prefixes stripped from declared versions (`^1.2.0`, `>=2`, `v3.1`)
static RANGE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    // Valid literal pattern
    Regex::new(r"^(?:[\^~=<>]|v)*\s*").expect("valid range prefix pattern")
});

/// A single package moving from its declared version to a newer one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDelta {
    package_name: String,
    current_version: Version,
    target_version: Version,
}

impl VersionDelta {
    /// Returns `None` when the package name is empty
    pub fn new(package_name: &str, current: Version, target: Version) -> Option<Self> {
        let package_name = package_name.trim();
        if package_name.is_empty() {
            return None;
        }
        Some(Self {
            package_name: package_name.to_string(),
            current_version: current,
            target_version: target,
        })
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn current_version(&self) -> &Version {
        &self.current_version
    }

    pub fn target_version(&self) -> &Version {
        &self.target_version
    }

    pub fn is_noop(&self) -> bool {
        self.current_version == self.target_version
    }
}

impl fmt::Display for VersionDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} → {}",
            self.package_name, self.current_version, self.target_version
        )
    }
}

/// Parse a declared or reported version into a semantic version.
///
/// Leading range operators are dropped and missing minor/patch components are
/// padded with zero, so `^1.2` becomes `1.2.0`.
pub fn normalize_version(raw: &str) -> Option<Version> {
    let trimmed = RANGE_PREFIX.replace(raw.trim(), "");
    let trimmed = trimmed.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    // Pad only the numeric core; anything after it must belong to a full version anyway
    let core_len = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(core_len);
    let components: Vec<&str> = core.split('.').filter(|c| !c.is_empty()).collect();
    if components.is_empty() || components.len() > 3 || !rest.is_empty() {
        return None;
    }
    let mut padded = components.join(".");
    for _ in components.len()..3 {
        padded.push_str(".0");
    }
    Version::parse(&padded).ok()
}

/// Turn raw scanner output into version deltas.
///
/// Each candidate line is `package: target`. Lines without the delimiter are skipped,
/// and a line whose package is not declared in the manifest, or whose versions do not
/// parse, is dropped with a warning. Parsing never stops early.
pub fn parse_updates(output: &str, manifest: &Manifest) -> Vec<VersionDelta> {
    output
        .lines()
        .filter_map(|line| parse_line(line, manifest))
        .collect()
}

fn parse_line(line: &str, manifest: &Manifest) -> Option<VersionDelta> {
    let (package, target) = line.split_once(':')?;
    let package = package.trim();
    if package.is_empty() {
        log_warn!("Skipping update line without a package name: {:?}", line);
        return None;
    }

    let Some(declared) = manifest.current_version(package) else {
        log_warn!("Package {} is not declared in the manifest, skipping", package);
        return None;
    };
    let Some(current) = normalize_version(declared) else {
        log_warn!(
            "Declared version {:?} of {} is not a semantic version, skipping",
            declared,
            package
        );
        return None;
    };
    let Some(target) = normalize_version(target) else {
        log_warn!(
            "Target version {:?} of {} is not a semantic version, skipping",
            target.trim(),
            package
        );
        return None;
    };

    VersionDelta::new(package, current, target)
}

/// How deltas on `0.x` versions are judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroMajorPolicy {
    /// Only an increase of the major component is breaking, `0.x` included
    #[default]
    Numeric,
    /// While major is 0, a minor bump is treated as breaking too
    MinorIsMajor,
}

/// Risk classification policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassifyPolicy {
    pub zero_major: ZeroMajorPolicy,
}

impl ClassifyPolicy {
    pub fn is_major(&self, delta: &VersionDelta) -> bool {
        let current = delta.current_version();
        let target = delta.target_version();
        if target.major > current.major {
            return true;
        }
        self.zero_major == ZeroMajorPolicy::MinorIsMajor
            && current.major == 0
            && target.major == 0
            && target.minor > current.minor
    }
}

/// Deltas partitioned into safe (minor/patch) and major (breaking) buckets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedUpdates {
    pub safe: Vec<VersionDelta>,
    pub major: Vec<VersionDelta>,
}

impl ClassifiedUpdates {
    pub fn len(&self) -> usize {
        self.safe.len() + self.major.len()
    }

    pub fn is_empty(&self) -> bool {
        self.safe.is_empty() && self.major.is_empty()
    }
}

/// Stable, total partition of `deltas` by the policy's major-bump rule
pub fn classify(deltas: Vec<VersionDelta>, policy: ClassifyPolicy) -> ClassifiedUpdates {
    let (major, safe) = deltas.into_iter().partition(|delta| policy.is_major(delta));
    ClassifiedUpdates { safe, major }
}

/// Human-readable list, one delta per line
pub fn format_deltas(deltas: &[VersionDelta]) -> String {
    deltas
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(entries: &[(&str, &str)]) -> Manifest {
        let mut manifest = Manifest::default();
        for (name, version) in entries {
            manifest
                .dependencies
                .insert((*name).to_string(), (*version).to_string());
        }
        manifest
    }

    fn delta(current: &str, target: &str) -> VersionDelta {
        VersionDelta::new(
            "pkg",
            Version::parse(current).expect("valid current"),
            Version::parse(target).expect("valid target"),
        )
        .expect("non-empty name")
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("^1.2.0"), Version::parse("1.2.0").ok());
        assert_eq!(normalize_version("~1.2"), Version::parse("1.2.0").ok());
        assert_eq!(normalize_version(">=2"), Version::parse("2.0.0").ok());
        assert_eq!(normalize_version(" v3.1.4 "), Version::parse("3.1.4").ok());
        assert_eq!(
            normalize_version("^2.0.0-beta.1"),
            Version::parse("2.0.0-beta.1").ok()
        );
        assert_eq!(normalize_version("garbage"), None);
        assert_eq!(normalize_version("latest"), None);
        assert_eq!(normalize_version(""), None);
        assert_eq!(normalize_version("1.2.3.4"), None);
    }

    #[test]
    fn test_parse_drops_malformed_lines() {
        let manifest = manifest(&[("left-pad", "1.1.3")]);
        let deltas = parse_updates(
            "left-pad: 1.1.3\nleft-pad: garbage\nleft-pad: 2.0.0",
            &manifest,
        );

        assert_eq!(deltas.len(), 2);
        assert!(deltas[0].is_noop());
        assert_eq!(deltas[1].target_version(), &Version::new(2, 0, 0));
    }

    #[test]
    fn test_parse_skips_lines_without_delimiter_or_manifest_entry() {
        let manifest = manifest(&[("react", "^18.2.0")]);
        let output = "Checking package.json\n\n react : ^18.3.1 \nvue: 3.4.0\n: 1.0.0\n";
        let deltas = parse_updates(output, &manifest);

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].package_name(), "react");
        assert_eq!(deltas[0].current_version(), &Version::new(18, 2, 0));
        assert_eq!(deltas[0].target_version(), &Version::new(18, 3, 1));
    }

    #[test]
    fn test_parse_scoped_package_and_dev_dependency() {
        let mut manifest = manifest(&[]);
        manifest
            .dev_dependencies
            .insert("@types/node".to_string(), "^20.1.0".to_string());

        let deltas = parse_updates("@types/node: ^22.0.0", &manifest);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].to_string(), "@types/node: 20.1.0 → 22.0.0");
    }

    #[test]
    fn test_classify_rule() {
        let policy = ClassifyPolicy::default();
        assert!(!policy.is_major(&delta("1.2.0", "1.9.0")));
        assert!(policy.is_major(&delta("1.2.0", "2.0.0")));
        assert!(!policy.is_major(&delta("0.9.0", "0.10.0")));
        assert!(!policy.is_major(&delta("2.0.0", "1.5.0")));
        assert!(!policy.is_major(&delta("1.1.3", "1.1.3")));
    }

    #[test]
    fn test_zero_major_policy() {
        let policy = ClassifyPolicy {
            zero_major: ZeroMajorPolicy::MinorIsMajor,
        };
        assert!(policy.is_major(&delta("0.9.0", "0.10.0")));
        assert!(!policy.is_major(&delta("0.9.0", "0.9.4")));
        assert!(!policy.is_major(&delta("1.2.0", "1.9.0")));
        assert!(policy.is_major(&delta("0.9.0", "1.0.0")));
    }

    #[test]
    fn test_classify_is_total_disjoint_and_stable() {
        let deltas = vec![
            delta("1.0.0", "2.0.0"),
            delta("1.0.0", "1.1.0"),
            delta("3.0.0", "4.1.0"),
            delta("0.1.0", "0.1.1"),
        ];
        let input_len = deltas.len();
        let classified = classify(deltas, ClassifyPolicy::default());

        assert_eq!(classified.len(), input_len);
        assert_eq!(classified.major.len(), 2);
        assert_eq!(classified.major[0].target_version(), &Version::new(2, 0, 0));
        assert_eq!(classified.major[1].target_version(), &Version::new(4, 1, 0));
        assert_eq!(classified.safe[0].target_version(), &Version::new(1, 1, 0));
        assert_eq!(classified.safe[1].target_version(), &Version::new(0, 1, 1));
    }

    #[test]
    fn test_format_deltas() {
        let formatted = format_deltas(&[delta("1.0.0", "1.1.0"), delta("1.0.0", "2.0.0")]);
        assert_eq!(formatted, "pkg: 1.0.0 → 1.1.0\npkg: 1.0.0 → 2.0.0");
    }

    #[test]
    fn test_empty_package_name_rejected() {
        assert!(VersionDelta::new("  ", Version::new(1, 0, 0), Version::new(1, 0, 1)).is_none());
    }
}
