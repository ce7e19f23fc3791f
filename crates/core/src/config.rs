//! Configuration file parsing.
//!
//! The config file is an INI-like grammar: `[section]` headers, followed by
//! `key: value` or `key = value` lines. Comments start with `#` or `;` and
//! are only recognized at the start of a whitespace-stripped line — there is
//! no trailing-comment support. No ecosystem INI crate matches the
//! `organization` section's `count*type` shorthand or the dual `:`/`=`
//! delimiter, so parsing here is bespoke, kept deliberately small and
//! line-oriented rather than pulled in as a dependency.

use std::collections::HashMap;
use std::path::Path;

use crate::common::SimError;

/// One `[section]` of a parsed config file.
#[derive(Debug, Clone, Default)]
pub struct Section {
    name: String,
    entries: HashMap<String, String>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    /// Returns the section's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw string value of `key`.
    pub fn get_string(&self, key: &str) -> Result<String, SimError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| SimError::ConfigNoSuchKey {
                section: self.name.clone(),
                key: key.to_string(),
            })
    }

    /// Returns the raw string value of `key`, or `default` if absent.
    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Parses `key` as a `u64`.
    pub fn get_u64(&self, key: &str) -> Result<u64, SimError> {
        let value = self.get_string(key)?;
        value
            .parse::<u64>()
            .map_err(|_| SimError::ConfigValueType {
                key: key.to_string(),
                value,
                expected: "u64",
            })
    }

    /// Parses `key` as a `u64`, or returns `default` if the key is absent.
    pub fn get_u64_or(&self, key: &str, default: u64) -> Result<u64, SimError> {
        match self.entries.get(key) {
            Some(value) => value.parse::<u64>().map_err(|_| SimError::ConfigValueType {
                key: key.to_string(),
                value: value.clone(),
                expected: "u64",
            }),
            None => Ok(default),
        }
    }

    /// Parses `key` as an `f64`.
    pub fn get_f64(&self, key: &str) -> Result<f64, SimError> {
        let value = self.get_string(key)?;
        value
            .parse::<f64>()
            .map_err(|_| SimError::ConfigValueType {
                key: key.to_string(),
                value,
                expected: "f64",
            })
    }

    /// Parses `key` as a `usize`.
    pub fn get_usize(&self, key: &str) -> Result<usize, SimError> {
        Ok(self.get_u64(key)? as usize)
    }
}

/// The full parsed config file: a map of section name to [`Section`].
#[derive(Debug, Clone, Default)]
pub struct RootConfig {
    sections: HashMap<String, Section>,
}

impl RootConfig {
    /// Parses a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimError::io(path.display().to_string(), e))?;
        Self::parse(&text)
    }

    /// Parses a config file already read into memory.
    pub fn parse(text: &str) -> Result<Self, SimError> {
        let mut sections: HashMap<String, Section> = HashMap::new();
        let mut current: Option<String> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let stripped: String = raw_line.chars().filter(|c| !c.is_whitespace()).collect();

            if stripped.is_empty() || stripped.starts_with('#') || stripped.starts_with(';') {
                continue;
            }

            if stripped.starts_with('[') {
                let name = stripped
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .ok_or_else(|| SimError::ConfigSyntax {
                        line: line_no,
                        text: stripped.clone(),
                    })?
                    .to_string();
                let _ = sections.entry(name.clone()).or_insert_with(|| Section::new(&name));
                current = Some(name);
                continue;
            }

            let section_name = current.clone().ok_or(SimError::ConfigNoSection { line: line_no })?;
            let (key, value) = split_key_value(&stripped).ok_or_else(|| SimError::ConfigSyntax {
                line: line_no,
                text: stripped.clone(),
            })?;
            let _ = sections
                .entry(section_name.clone())
                .or_insert_with(|| Section::new(&section_name))
                .entries
                .insert(key, value);
        }

        Ok(Self { sections })
    }

    /// Returns the section named `name`.
    pub fn section(&self, name: &str) -> Result<&Section, SimError> {
        self.sections
            .get(name)
            .ok_or_else(|| SimError::ConfigNoSuchSection(name.to_string()))
    }

    /// Returns whether a section named `name` exists.
    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Parses the `organization` section's `count*type` shorthand for `key`.
    ///
    /// `key` names a component instance (e.g. `root`, `imc`); the value is
    /// `"1*rmw"` meaning this component has one child of type `rmw`.
    pub fn organization(&self, key: &str) -> Result<(usize, String), SimError> {
        let section = self.section("organization")?;
        let raw = section.get_string(key)?;
        let (count_str, type_str) = raw
            .split_once('*')
            .ok_or_else(|| SimError::ConfigOrganizationSyntax(raw.clone()))?;
        let count: usize = count_str
            .parse()
            .map_err(|_| SimError::ConfigOrganizationSyntax(raw.clone()))?;
        Ok((count, type_str.to_string()))
    }
}

/// Splits a stripped `key:value` or `key=value` line on the first delimiter,
/// preferring `:` and falling back to `=`.
fn split_key_value(stripped: &str) -> Option<(String, String)> {
    let delim_idx = stripped
        .find(':')
        .or_else(|| stripped.find('='))?;
    let (key, value) = stripped.split_at(delim_idx);
    Some((key.to_string(), value[1..].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_keys() {
        let text = "\
            [basic]\n\
            clock : 1\n\
            # a comment\n\
            [dump]\n\
            type = cli\n\
            ; another comment\n\
        ";
        let cfg = RootConfig::parse(text).unwrap();
        assert_eq!(cfg.section("basic").unwrap().get_u64("clock").unwrap(), 1);
        assert_eq!(cfg.section("dump").unwrap().get_string("type").unwrap(), "cli");
    }

    #[test]
    fn whitespace_is_stripped_before_parsing() {
        let text = "[ basic ]\n  key  :   value  \n";
        let cfg = RootConfig::parse(text).unwrap();
        assert_eq!(cfg.section("basic").unwrap().get_string("key").unwrap(), "value");
    }

    #[test]
    fn key_before_section_is_an_error() {
        let text = "key: value\n";
        assert!(matches!(
            RootConfig::parse(text),
            Err(SimError::ConfigNoSection { line: 1 })
        ));
    }

    #[test]
    fn organization_parses_count_and_type() {
        let text = "[organization]\nimc: 1*rmw\n";
        let cfg = RootConfig::parse(text).unwrap();
        assert_eq!(cfg.organization("imc").unwrap(), (1, "rmw".to_string()));
    }

    #[test]
    fn unknown_section_is_an_error() {
        let cfg = RootConfig::parse("[basic]\nk: v\n").unwrap();
        assert!(matches!(
            cfg.section("missing"),
            Err(SimError::ConfigNoSuchSection(_))
        ));
    }
}
