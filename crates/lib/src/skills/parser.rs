//! SKILL.md parsing: YAML frontmatter between the first pair of `---` lines, then a markdown body.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Definition file inside every skill directory.
pub const SKILL_FILE: &str = "SKILL.md";

const DELIMITER: &str = "---";

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("missing frontmatter: file must start with a '---' line")]
    MissingFrontmatter,
    #[error("unterminated frontmatter: no closing '---' line")]
    UnterminatedFrontmatter,
    #[error("invalid frontmatter YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid skill name '{0}': use lowercase letters, digits and single hyphens, not starting or ending with a hyphen")]
    InvalidName(String),
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parsed frontmatter. Fields other than the known ones land in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFrontmatter {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    compatibility: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// Check the skill naming grammar: `^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$` with no `--`.
pub fn validate_name(name: &str) -> Result<(), SkillError> {
    if !NAME_REGEX.is_match(name) || name.contains("--") {
        return Err(SkillError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Split a definition file into (frontmatter YAML, body).
pub fn split_frontmatter(content: &str) -> Result<(&str, &str), SkillError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');
    let first = lines.next().ok_or(SkillError::MissingFrontmatter)?;
    if first.trim_end() != DELIMITER {
        return Err(SkillError::MissingFrontmatter);
    }
    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            let yaml = &content[start..offset];
            let body = &content[offset + line.len()..];
            return Ok((yaml, body.trim_start_matches(['\r', '\n'])));
        }
        offset += line.len();
    }
    Err(SkillError::UnterminatedFrontmatter)
}

/// Parse and validate frontmatter YAML.
pub fn parse_metadata(yaml: &str) -> Result<SkillMetadata, SkillError> {
    let raw: RawFrontmatter = if yaml.trim().is_empty() {
        RawFrontmatter::default()
    } else {
        serde_yaml::from_str(yaml)?
    };
    let name = raw
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or(SkillError::MissingField("name"))?;
    let description = raw
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or(SkillError::MissingField("description"))?;
    validate_name(&name)?;
    Ok(SkillMetadata {
        name,
        description,
        license: raw.license,
        compatibility: raw.compatibility,
        extra: raw.extra,
    })
}

/// Parse a whole definition file into metadata and body.
pub fn parse_skill(content: &str) -> Result<(SkillMetadata, String), SkillError> {
    let (yaml, body) = split_frontmatter(content)?;
    Ok((parse_metadata(yaml)?, body.to_string()))
}

/// Read only the frontmatter of a definition file; stops at the closing delimiter.
pub async fn read_frontmatter(path: &Path) -> Result<SkillMetadata, SkillError> {
    let io_err = |source: std::io::Error| SkillError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let mut lines = BufReader::new(file).lines();

    let first = lines.next_line().await.map_err(io_err)?;
    match first {
        Some(l) if l.trim_start_matches('\u{feff}').trim_end() == DELIMITER => {}
        _ => return Err(SkillError::MissingFrontmatter),
    }
    let mut yaml = String::new();
    while let Some(line) = lines.next_line().await.map_err(io_err)? {
        if line.trim_end() == DELIMITER {
            return parse_metadata(&yaml);
        }
        yaml.push_str(&line);
        yaml.push('\n');
    }
    Err(SkillError::UnterminatedFrontmatter)
}

/// Read and parse a whole definition file.
pub async fn read_skill(path: &Path) -> Result<(SkillMetadata, String), SkillError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SkillError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_skill(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\nname: pdf-tools\ndescription: Work with PDF files\nlicense: MIT\nmetadata:\n  author: someone\n---\n\n# PDF tools\n\nUse scripts/extract.py.\n";

    #[test]
    fn parses_metadata_and_body() {
        let (meta, body) = parse_skill(SAMPLE).unwrap();
        assert_eq!(meta.name, "pdf-tools");
        assert_eq!(meta.description, "Work with PDF files");
        assert_eq!(meta.license.as_deref(), Some("MIT"));
        assert!(meta.compatibility.is_none());
        assert!(meta.extra.contains_key("metadata"));
        assert!(body.starts_with("# PDF tools"));
    }

    #[test]
    fn body_may_contain_delimiters() {
        let content = "---\nname: a\ndescription: d\n---\nintro\n---\nmore\n";
        let (_, body) = parse_skill(content).unwrap();
        assert_eq!(body, "intro\n---\nmore\n");
    }

    #[test]
    fn crlf_line_endings() {
        let content = "---\r\nname: a\r\ndescription: d\r\n---\r\nbody\r\n";
        let (meta, body) = parse_skill(content).unwrap();
        assert_eq!(meta.name, "a");
        assert_eq!(body, "body\r\n");
    }

    #[test]
    fn missing_frontmatter() {
        assert!(matches!(
            parse_skill("# just markdown\n"),
            Err(SkillError::MissingFrontmatter)
        ));
        assert!(matches!(
            parse_skill("---\nname: a\n"),
            Err(SkillError::UnterminatedFrontmatter)
        ));
    }

    #[test]
    fn missing_required_fields() {
        assert!(matches!(
            parse_skill("---\nname: a\n---\nbody"),
            Err(SkillError::MissingField("description"))
        ));
        assert!(matches!(
            parse_skill("---\ndescription: d\n---\nbody"),
            Err(SkillError::MissingField("name"))
        ));
        assert!(matches!(
            parse_skill("---\n---\nbody"),
            Err(SkillError::MissingField("name"))
        ));
    }

    #[test]
    fn name_grammar() {
        for ok in ["a", "a1", "pdf-tools", "x-y-z", "0day"] {
            assert!(validate_name(ok).is_ok(), "{} should be valid", ok);
        }
        for bad in ["", "-a", "a-", "foo--bar", "Foo", "a_b", "a b", "ä"] {
            assert!(validate_name(bad).is_err(), "{} should be invalid", bad);
        }
    }

    #[test]
    fn invalid_name_error_includes_value() {
        let err = parse_skill("---\nname: foo--bar\ndescription: d\n---\n").unwrap_err();
        assert!(matches!(err, SkillError::InvalidName(ref n) if n == "foo--bar"));
        assert!(err.to_string().contains("foo--bar"));
    }

    #[tokio::test]
    async fn read_frontmatter_ignores_body() {
        let dir = std::env::temp_dir().join(format!("tether-parser-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SKILL_FILE);
        std::fs::write(&path, SAMPLE).unwrap();
        let meta = read_frontmatter(&path).await.unwrap();
        assert_eq!(meta.name, "pdf-tools");

        let missing = read_frontmatter(&dir.join("nope.md")).await;
        assert!(matches!(missing, Err(SkillError::Io { .. })));
    }
}
