//! Package URL parsing: `pkg:<ecosystem>/[namespace/]name@version?qualifiers`.

use std::collections::BTreeMap;
use std::fmt;

/// A parsed Package URL, decomposed into the fields the rest of the system
/// cares about. `namespace` and `qualifiers` are retained for completeness
/// but only `ecosystem`/`name`/`version` drive admission and storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purl {
    pub ecosystem: Ecosystem,
    pub namespace: Option<String>,
    pub name: String,
    pub version: String,
    pub qualifiers: BTreeMap<String, String>,
    pub original: String,
}

impl Purl {
    /// The package name as used for display, storage, and sandbox
    /// invocation: namespace folded in per ecosystem convention (npm scope,
    /// maven group:artifact). Maven already folds namespace into `name` at
    /// parse time, so this only has work to do for npm.
    pub fn package_name(&self) -> String {
        match (&self.ecosystem, &self.namespace) {
            (Ecosystem::Npm, Some(ns)) => format!("{ns}/{}", self.name),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ecosystem {
    Pypi,
    Npm,
    Rubygems,
    Maven,
    Packagist,
}

impl Ecosystem {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "pypi" => Some(Ecosystem::Pypi),
            "npm" => Some(Ecosystem::Npm),
            "gem" => Some(Ecosystem::Rubygems),
            "maven" => Some(Ecosystem::Maven),
            "packagist" => Some(Ecosystem::Packagist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Pypi => "pypi",
            Ecosystem::Npm => "npm",
            Ecosystem::Rubygems => "rubygems",
            Ecosystem::Maven => "maven",
            Ecosystem::Packagist => "packagist",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PurlError {
    #[error("invalid purl: must start with 'pkg:'")]
    MissingScheme,
    #[error("invalid purl: missing ecosystem separator")]
    MissingEcosystemSeparator,
    #[error("unsupported ecosystem: {0}")]
    UnsupportedEcosystem(String),
    #[error("invalid purl: missing package name")]
    MissingName,
    #[error("invalid purl: empty version")]
    EmptyVersion,
}

/// Parse a PURL string in full. Order of operations matters: qualifiers are
/// split off before the version, and the version before the namespace/name
/// split — a qualifier value or a version is never mistaken for part of a
/// name.
pub fn parse(purl: &str) -> Result<Purl, PurlError> {
    let rest = purl.strip_prefix("pkg:").ok_or(PurlError::MissingScheme)?;

    let (ecosystem_token, rest) = rest
        .split_once('/')
        .ok_or(PurlError::MissingEcosystemSeparator)?;
    let ecosystem = Ecosystem::from_token(ecosystem_token)
        .ok_or_else(|| PurlError::UnsupportedEcosystem(ecosystem_token.to_string()))?;

    let (rest, qualifiers) = match rest.split_once('?') {
        Some((rest, quals)) => (rest, parse_qualifiers(quals)),
        None => (rest, BTreeMap::new()),
    };

    let (name_part, version) = match rest.split_once('@') {
        Some((name_part, version)) => {
            let version = percent_decode(version);
            if version.is_empty() {
                return Err(PurlError::EmptyVersion);
            }
            (name_part, version)
        }
        None => return Err(PurlError::EmptyVersion),
    };

    let (mut namespace, mut name) = match name_part.split_once('/') {
        Some((ns, name)) => (Some(percent_decode(ns)), percent_decode(name)),
        None => (None, percent_decode(name_part)),
    };

    if name.is_empty() && namespace.is_none() {
        return Err(PurlError::MissingName);
    }

    if ecosystem == Ecosystem::Maven {
        name = match (&namespace, name.is_empty()) {
            (Some(ns), false) => format!("{ns}:{name}"),
            (Some(ns), true) => ns.clone(),
            (None, _) => name,
        };
        namespace = None;
    }

    Ok(Purl {
        ecosystem,
        namespace,
        name,
        version,
        qualifiers,
        original: purl.to_string(),
    })
}

/// Convenience wrapper returning `(package_name, version, ecosystem)`, the
/// shape the admission controller and worker consume directly.
pub fn extract_package_info(purl: &str) -> Result<(String, String, Ecosystem), PurlError> {
    let parsed = parse(purl)?;
    let ecosystem = parsed.ecosystem;
    let version = parsed.version.clone();
    Ok((parsed.package_name(), version, ecosystem))
}

pub fn validate(purl: &str) -> bool {
    parse(purl).is_ok()
}

fn parse_qualifiers(s: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if s.is_empty() {
        return out;
    }
    for pair in s.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            out.insert(percent_decode(k), percent_decode(v));
        }
    }
    out
}

/// Minimal `%XX` percent-decoder. PURLs only need byte-level decoding of
/// ASCII-range escapes (`%40` for `@`, etc.); anything malformed is passed
/// through literally rather than rejected, matching the permissive decoding
/// the rest of the ecosystem expects from `unquote`-style helpers.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_pypi() {
        let p = parse("pkg:pypi/django@1.11.1").unwrap();
        assert_eq!(p.package_name(), "django");
        assert_eq!(p.version, "1.11.1");
        assert_eq!(p.ecosystem, Ecosystem::Pypi);
    }

    #[test]
    fn preserves_npm_scope_from_percent_encoded_at() {
        let p = parse("pkg:npm/%40angular/animation@12.3.1").unwrap();
        assert_eq!(p.package_name(), "@angular/animation");
        assert_eq!(p.version, "12.3.1");
        assert_eq!(p.ecosystem, Ecosystem::Npm);
    }

    #[test]
    fn npm_without_scope() {
        let p = parse("pkg:npm/foobar@12.3.1").unwrap();
        assert_eq!(p.package_name(), "foobar");
        assert_eq!(p.ecosystem, Ecosystem::Npm);
    }

    #[test]
    fn gem_with_qualifiers() {
        let p = parse("pkg:gem/jruby-launcher@1.1.2?platform=java").unwrap();
        assert_eq!(p.package_name(), "jruby-launcher");
        assert_eq!(p.version, "1.1.2");
        assert_eq!(p.ecosystem, Ecosystem::Rubygems);
        assert_eq!(p.qualifiers.get("platform"), Some(&"java".to_string()));
    }

    #[test]
    fn maven_composes_group_and_artifact() {
        let p = parse(
            "pkg:maven/org.apache.xmlgraphics/batik-anim@1.9.1?packaging=sources",
        )
        .unwrap();
        assert_eq!(p.package_name(), "org.apache.xmlgraphics:batik-anim");
        assert_eq!(p.version, "1.9.1");
        assert_eq!(p.ecosystem, Ecosystem::Maven);
        assert!(p.namespace.is_none());
    }

    #[test]
    fn rejects_missing_scheme() {
        assert_eq!(parse("pypi/django@1.0"), Err(PurlError::MissingScheme));
    }

    #[test]
    fn rejects_unsupported_ecosystem() {
        assert_eq!(
            parse("pkg:cargo/serde@1.0.0"),
            Err(PurlError::UnsupportedEcosystem("cargo".to_string()))
        );
    }

    #[test]
    fn rejects_missing_version() {
        assert_eq!(parse("pkg:pypi/django"), Err(PurlError::EmptyVersion));
    }

    #[test]
    fn validate_is_a_bool_wrapper() {
        assert!(validate("pkg:pypi/django@1.11.1"));
        assert!(!validate("not-a-purl"));
    }

    #[test]
    fn extract_package_info_matches_scenarios_table() {
        let cases = [
            ("pkg:pypi/django@1.11.1", "django", "1.11.1", Ecosystem::Pypi),
            (
                "pkg:npm/%40angular/animation@12.3.1",
                "@angular/animation",
                "12.3.1",
                Ecosystem::Npm,
            ),
            ("pkg:npm/foobar@12.3.1", "foobar", "12.3.1", Ecosystem::Npm),
            (
                "pkg:gem/jruby-launcher@1.1.2?platform=java",
                "jruby-launcher",
                "1.1.2",
                Ecosystem::Rubygems,
            ),
            (
                "pkg:maven/org.apache.xmlgraphics/batik-anim@1.9.1?packaging=sources",
                "org.apache.xmlgraphics:batik-anim",
                "1.9.1",
                Ecosystem::Maven,
            ),
        ];
        for (purl, name, version, eco) in cases {
            let (n, v, e) = extract_package_info(purl).unwrap();
            assert_eq!(n, name, "purl={purl}");
            assert_eq!(v, version, "purl={purl}");
            assert_eq!(e, eco, "purl={purl}");
        }
    }
}
