//! Declarative run configuration.
//!
//! A [`ConfigTree`] is a parsed view of the text format that drives model and
//! sampler assembly: named `[section]` blocks of `key = value` pairs, with
//! bare keys allowed (the `[variable_params]` section lists names with no
//! value) and `${section|key}` references resolved by textual substitution
//! once the whole file has been read.
//!
//! Section names may carry a suffix discriminator (`prior-k`,
//! `sampler-burn_in`) so the same shape of block can appear once per
//! parameter.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use thiserror::Error;

/// Failure to resolve a `${section|key}` reference.
#[derive(Debug, Error)]
pub enum InterpolationError {
    #[error("unresolved reference ${{{section}|{key}}} in [{at_section}].{at_key}")]
    Unresolved {
        section: String,
        key: String,
        at_section: String,
        at_key: String,
    },
    #[error("cyclic reference while resolving [{section}].{key}")]
    Cycle { section: String, key: String },
    #[error("malformed reference `{reference}` in [{section}].{key}")]
    Malformed {
        reference: String,
        section: String,
        key: String,
    },
}

/// Malformed or incomplete configuration. Fatal at assembly time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("config syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("missing required config section [{section}]")]
    MissingSection { section: String },
    #[error("missing required option `{key}` in section [{section}]")]
    MissingKey { section: String, key: String },
    #[error("invalid value `{value}` for [{section}].{key}: expected {expected}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
}

type Section = IndexMap<String, String>;

/// A parsed configuration: `(section, key) -> string value`, order preserving.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    sections: IndexMap<String, Section>,
}

impl ConfigTree {
    /// Parses config text and resolves all `${section|key}` references.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut sections: IndexMap<String, Section> = IndexMap::new();
        let mut current: Option<String> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            let lineno = idx + 1;
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[') {
                let Some(name) = name.strip_suffix(']') else {
                    return Err(ConfigError::Syntax {
                        line: lineno,
                        message: format!("unterminated section header `{line}`"),
                    });
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConfigError::Syntax {
                        line: lineno,
                        message: "empty section name".to_string(),
                    });
                }
                // repeated headers merge into the existing section
                sections.entry(name.to_string()).or_default();
                current = Some(name.to_string());
                continue;
            }
            let Some(section) = current.as_ref() else {
                return Err(ConfigError::Syntax {
                    line: lineno,
                    message: format!("option `{line}` appears before any [section]"),
                });
            };
            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (line, ""),
            };
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    line: lineno,
                    message: "option with empty name".to_string(),
                });
            }
            sections
                .get_mut(section)
                .expect("current section exists")
                .insert(key.to_string(), value.to_string());
        }

        let mut tree = ConfigTree { sections };
        tree.resolve_interpolations()?;
        Ok(tree)
    }

    /// Reads and parses a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    fn resolve_interpolations(&mut self) -> Result<(), InterpolationError> {
        let pairs: Vec<(String, String)> = self
            .sections
            .iter()
            .flat_map(|(s, opts)| opts.keys().map(move |k| (s.clone(), k.clone())))
            .collect();
        for (section, key) in pairs {
            let mut stack = Vec::new();
            let resolved = self.resolve_value(&section, &key, &mut stack)?;
            self.sections[&section][&key] = resolved;
        }
        Ok(())
    }

    fn resolve_value(
        &self,
        section: &str,
        key: &str,
        stack: &mut Vec<(String, String)>,
    ) -> Result<String, InterpolationError> {
        if stack.iter().any(|(s, k)| s == section && k == key) {
            return Err(InterpolationError::Cycle {
                section: section.to_string(),
                key: key.to_string(),
            });
        }
        stack.push((section.to_string(), key.to_string()));

        let raw = self
            .sections
            .get(section)
            .and_then(|opts| opts.get(key))
            .cloned()
            .unwrap_or_default();

        let mut out = String::with_capacity(raw.len());
        let mut rest = raw.as_str();
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let tail = &rest[start + 2..];
            let Some(end) = tail.find('}') else {
                return Err(InterpolationError::Malformed {
                    reference: rest[start..].to_string(),
                    section: section.to_string(),
                    key: key.to_string(),
                });
            };
            let reference = &tail[..end];
            let Some((ref_section, ref_key)) = reference.split_once('|') else {
                return Err(InterpolationError::Malformed {
                    reference: format!("${{{reference}}}"),
                    section: section.to_string(),
                    key: key.to_string(),
                });
            };
            let known = self
                .sections
                .get(ref_section)
                .is_some_and(|opts| opts.contains_key(ref_key));
            if !known {
                return Err(InterpolationError::Unresolved {
                    section: ref_section.to_string(),
                    key: ref_key.to_string(),
                    at_section: section.to_string(),
                    at_key: key.to_string(),
                });
            }
            out.push_str(&self.resolve_value(ref_section, ref_key, stack)?);
            rest = &tail[end + 1..];
        }
        out.push_str(rest);

        stack.pop();
        Ok(out)
    }

    /// Returns the value at `(section, key)`, or the error naming both.
    pub fn get(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        self.section(section)?
            .get(key)
            .map(|v| v.as_str())
            .ok_or_else(|| ConfigError::MissingKey {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    pub fn get_opt(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(|v| v.as_str())
    }

    pub fn get_f64(&self, section: &str, key: &str) -> Result<f64, ConfigError> {
        let raw = self.get(section, key)?;
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            expected: "a float",
        })
    }

    pub fn get_u64(&self, section: &str, key: &str) -> Result<u64, ConfigError> {
        let raw = self.get(section, key)?;
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            expected: "a non-negative integer",
        })
    }

    /// Like [`get_u64`](Self::get_u64) but with a default for an absent key.
    pub fn get_u64_or(&self, section: &str, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.get_opt(section, key) {
            Some(_) => self.get_u64(section, key),
            None => Ok(default),
        }
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn section(&self, section: &str) -> Result<&Section, ConfigError> {
        self.sections
            .get(section)
            .ok_or_else(|| ConfigError::MissingSection {
                section: section.to_string(),
            })
    }

    pub fn section_opt(&self, section: &str) -> Option<&Section> {
        self.sections.get(section)
    }

    /// Section names of the form `<prefix>-<suffix>`, yielding the suffixes.
    pub fn sections_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.sections
            .keys()
            .filter_map(move |name| name.strip_prefix(prefix).and_then(|s| s.strip_prefix('-')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
[model]
name = test_poisson

[variable_params]
k =

[static_params]
mu = 3

[prior-k]
name = uniform
min-k = 0
max-k = 20

[jump_proposal-k]
name = bounded_discrete
min-k = ${prior-k|min-k}
max-k = ${prior-k|max-k}
"#;

    #[test]
    fn parses_sections_and_bare_keys() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        assert_eq!(tree.get("model", "name").unwrap(), "test_poisson");
        assert_eq!(tree.get("variable_params", "k").unwrap(), "");
        assert_eq!(tree.get_f64("static_params", "mu").unwrap(), 3.0);
    }

    #[test]
    fn interpolation_resolves_across_sections() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        assert_eq!(
            tree.get("jump_proposal-k", "min-k").unwrap(),
            tree.get("prior-k", "min-k").unwrap()
        );
        assert_eq!(tree.get("jump_proposal-k", "max-k").unwrap(), "20");
    }

    #[test]
    fn unresolved_reference_errors() {
        let err = ConfigTree::parse("[a]\nx = ${b|y}\n").unwrap_err();
        let ConfigError::Interpolation(InterpolationError::Unresolved { section, key, .. }) = err
        else {
            panic!("expected unresolved interpolation, got {err}");
        };
        assert_eq!(section, "b");
        assert_eq!(key, "y");
    }

    #[test]
    fn cyclic_reference_errors() {
        let err = ConfigTree::parse("[a]\nx = ${a|y}\ny = ${a|x}\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Interpolation(InterpolationError::Cycle { .. })
        ));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let err = ConfigTree::parse("[a]\nx = ${a|x}\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Interpolation(InterpolationError::Cycle { .. })
        ));
    }

    #[test]
    fn option_outside_section_is_a_syntax_error() {
        let err = ConfigTree::parse("stray = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 1, .. }));
    }

    #[test]
    fn missing_lookups_name_the_location() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        let err = tree.get("model", "nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
        let err = tree.section("sampler").unwrap_err();
        assert!(err.to_string().contains("sampler"));
    }

    #[test]
    fn suffixed_sections_enumerate() {
        let tree = ConfigTree::parse(SAMPLE).unwrap();
        let suffixes: Vec<_> = tree.sections_with_prefix("prior").collect();
        assert_eq!(suffixes, vec!["k"]);
    }
}
