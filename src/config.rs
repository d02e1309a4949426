//! Module configuration
//!
//! Configuration is a properties file. Each module to patch is a group of
//! three keys sharing an id:
//!
//! ```properties
//! friendlizer.target=com.viettel.vep.tools
//!
//! module.webcommon.key=org.netbeans.modules.web.common
//! module.webcommon.description=Web common support
//! module.webcommon.dependencies=ide/modules/org-netbeans-modules-web-common.jar \
//!     ide/modules/org-netbeans-modules-html-editor-lib.jar
//! ```
//!
//! `dependencies` lists the archives, relative to the installation root,
//! whose friend lists must name the target.
//!
//! The syntax follows Java properties files: `=`, `:` or whitespace separate
//! keys from values, backslash escapes (including `\uXXXX`) are resolved and a
//! trailing backslash continues the line. Identifiers read from the file are
//! trimmed.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::friends::{DEFAULT_TARGET, FRIENDS_ATTRIBUTE};

const TARGET_KEY: &str = "friendlizer.target";
const ATTRIBUTE_KEY: &str = "friendlizer.attribute";
const MODULE_PREFIX: &str = "module.";
const KEY_SUFFIX: &str = ".key";

/// One module group from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Group id, the `<id>` in `module.<id>.key`
    pub id: String,
    pub key: String,
    pub description: String,
    /// Archive paths relative to the installation root
    pub dependencies: Vec<String>,
}

/// Parsed configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendlizerConfig {
    /// Identifier added to friend lists
    pub target: String,
    /// Manifest attribute holding the friend list
    pub attribute: String,
    /// Module groups in file order
    pub modules: Vec<ModuleConfig>,
}

impl Default for FriendlizerConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            attribute: FRIENDS_ATTRIBUTE.to_string(),
            modules: Vec::new(),
        }
    }
}

impl FriendlizerConfig {
    /// Load configuration from a properties file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Parse configuration from properties text
    pub fn parse(text: &str) -> Result<Self> {
        let entries = parse_properties(text)?;

        let mut values: HashMap<&str, &str> = HashMap::new();
        let mut ids: Vec<&str> = Vec::new();
        for (key, value) in &entries {
            values.insert(key, value);
            if let Some(id) = key
                .strip_prefix(MODULE_PREFIX)
                .and_then(|rest| rest.strip_suffix(KEY_SUFFIX))
            {
                if id.is_empty() {
                    return Err(Error::Config(format!("module key without an id: {}", key)));
                }
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        let property = |id: &str, name: &str| {
            values
                .get(format!("{}{}.{}", MODULE_PREFIX, id, name).as_str())
                .copied()
        };

        let modules = ids
            .into_iter()
            .map(|id| ModuleConfig {
                id: id.to_string(),
                key: property(id, "key").unwrap_or_default().trim().to_string(),
                description: property(id, "description")
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                dependencies: property(id, "dependencies")
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            })
            .collect();

        let mut config = Self {
            modules,
            ..Self::default()
        };
        if let Some(target) = override_value(&values, TARGET_KEY) {
            config.target = target.to_string();
        }
        if let Some(attribute) = override_value(&values, ATTRIBUTE_KEY) {
            config.attribute = attribute.to_string();
        }

        Ok(config)
    }
}

fn override_value<'a>(values: &HashMap<&str, &'a str>, key: &str) -> Option<&'a str> {
    values
        .get(key)
        .copied()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// A line continues on the next one when it ends with an odd number of backslashes
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split a logical line at the first unescaped `=`, `:` or whitespace
fn split_key_value(line: &str) -> (String, String) {
    let mut escaped = false;
    let mut end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || c.is_whitespace() {
            end = i;
            break;
        }
    }

    let rest = line[end..].trim_start();
    let rest = rest
        .strip_prefix(|c: char| c == '=' || c == ':')
        .unwrap_or(rest)
        .trim_start();
    (unescape(&line[..end]), unescape(rest))
}

/// Resolve backslash escapes: `\t`, `\n`, `\r`, `\f`, `\uXXXX`, and `\x` for any other `x`
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                let decoded = Some(&hex)
                    .filter(|hex| hex.len() == 4 && hex.chars().all(|c| c.is_ascii_hexdigit()))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => {
                        out.push(decoded);
                        chars.nth(3);
                    }
                    None => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

/// Parse properties text into key/value pairs in file order
fn parse_properties(text: &str) -> Result<Vec<(String, String)>> {
    let mut entries = Vec::new();
    let mut lines = text.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let mut logical = line.to_string();
        while continues(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        if key.is_empty() {
            return Err(Error::Config(format!("line {}: missing key", index + 1)));
        }
        entries.push((key, value));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Modules patched for the platform tools
friendlizer.target = org.example.tools

module.webcommon.key=org.netbeans.modules.web.common
module.webcommon.description=Web common support
module.webcommon.dependencies=ide/modules/org-netbeans-modules-web-common.jar \\
    ide/modules/org-netbeans-modules-html-editor-lib.jar

! persistence support
module.persistence.key: org.netbeans.modules.j2ee.persistence
module.persistence.dependencies java/modules/org-netbeans-modules-j2ee-persistence.jar
";

    #[test]
    fn test_parse_modules_in_order() {
        let config = FriendlizerConfig::parse(SAMPLE).unwrap();

        assert_eq!(config.target, "org.example.tools");
        assert_eq!(config.attribute, FRIENDS_ATTRIBUTE);
        assert_eq!(config.modules.len(), 2);

        let web = &config.modules[0];
        assert_eq!(web.id, "webcommon");
        assert_eq!(web.key, "org.netbeans.modules.web.common");
        assert_eq!(web.description, "Web common support");
        assert_eq!(
            web.dependencies,
            vec![
                "ide/modules/org-netbeans-modules-web-common.jar",
                "ide/modules/org-netbeans-modules-html-editor-lib.jar",
            ]
        );

        let persistence = &config.modules[1];
        assert_eq!(persistence.id, "persistence");
        assert_eq!(persistence.key, "org.netbeans.modules.j2ee.persistence");
        assert_eq!(persistence.description, "");
        assert_eq!(
            persistence.dependencies,
            vec!["java/modules/org-netbeans-modules-j2ee-persistence.jar"]
        );
    }

    #[test]
    fn test_defaults() {
        let config = FriendlizerConfig::parse("").unwrap();
        assert_eq!(config, FriendlizerConfig::default());
        assert_eq!(config.target, DEFAULT_TARGET);
    }

    #[test]
    fn test_module_without_dependencies() {
        let config = FriendlizerConfig::parse("module.a.key=a\nmodule.a.dependencies=\n").unwrap();
        assert!(config.modules[0].dependencies.is_empty());
    }

    #[test]
    fn test_later_values_override() {
        let config =
            FriendlizerConfig::parse("module.a.key=first\nmodule.a.key=second\n").unwrap();
        assert_eq!(config.modules.len(), 1);
        assert_eq!(config.modules[0].key, "second");
    }

    #[test]
    fn test_invalid_lines() {
        assert!(matches!(
            FriendlizerConfig::parse("=value\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            FriendlizerConfig::parse("module..key=x\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_split_key_value() {
        let pair = |line: &str| split_key_value(line);
        let expect = |key: &str, value: &str| (key.to_string(), value.to_string());
        assert_eq!(pair("a=b"), expect("a", "b"));
        assert_eq!(pair("a = b"), expect("a", "b"));
        assert_eq!(pair("a: b"), expect("a", "b"));
        assert_eq!(pair("a b c"), expect("a", "b c"));
        assert_eq!(pair("a"), expect("a", ""));
        assert_eq!(pair("a=b  "), expect("a", "b  "));
        assert!(continues("a\\"));
        assert!(!continues("a\\\\"));
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            split_key_value("key\\=with\\:separators = a\\=b"),
            ("key=with:separators".to_string(), "a=b".to_string())
        );
        assert_eq!(unescape("tab\\there"), "tab\there");
        assert_eq!(unescape("caf\\u00e9"), "caf\u{e9}");
        assert_eq!(unescape("C:\\\\tools"), "C:\\tools");
        assert_eq!(unescape("\\uZZ"), "uZZ");

        let config =
            FriendlizerConfig::parse("friendlizer.target=org.example\\u002etools  \n").unwrap();
        assert_eq!(config.target, "org.example.tools");
    }

    #[test]
    fn test_load_missing_file() {
        let result = FriendlizerConfig::load(Path::new("/nonexistent/friendlizer.properties"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
