//! Skill directory checks beyond what loading enforces.
//!
//! Loading rejects only unparsable frontmatter, missing fields and bad names. This also
//! flags a directory whose name differs from the declared skill name, and overlong fields.

use std::fmt;
use std::path::Path;

use super::parser::{self, SkillError, SKILL_FILE};

pub const MAX_NAME_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The skill will not load.
    Error,
    /// The skill loads but should be fixed.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Check one skill directory. Empty result means the skill is clean.
pub async fn validate_skill_dir(dir: &Path) -> Vec<ValidationIssue> {
    let file = dir.join(SKILL_FILE);
    let (meta, _) = match parser::read_skill(&file).await {
        Ok(parsed) => parsed,
        Err(SkillError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            return vec![ValidationIssue::error(format!("{} not found", file.display()))];
        }
        Err(e) => return vec![ValidationIssue::error(e.to_string())],
    };

    let mut issues = Vec::new();
    let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if dir_name != meta.name {
        issues.push(ValidationIssue::warning(format!(
            "directory name '{}' does not match declared name '{}'",
            dir_name, meta.name
        )));
    }
    if meta.name.chars().count() > MAX_NAME_LEN {
        issues.push(ValidationIssue::warning(format!(
            "name is longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    if meta.description.chars().count() > MAX_DESCRIPTION_LEN {
        issues.push(ValidationIssue::warning(format!(
            "description is longer than {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    issues
}
