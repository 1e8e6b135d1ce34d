//! Skills: AgentSkills-style `SKILL.md` bundles loaded in three stages.
//!
//! Each skill is `<root>/<name>/SKILL.md` with optional `scripts/`, `references/` and
//! `assets/`. Discovery reads frontmatter only; activation reads the full file once;
//! resources are read on demand.

mod context;
mod manager;
mod parser;
mod validate;

pub use context::catalog_context;
pub use manager::{ActivatedSkill, SkillManager, SkillSummary, RESOURCE_DIRS};
pub use parser::{
    parse_metadata, parse_skill, read_frontmatter, read_skill, split_frontmatter, validate_name,
    SkillError, SkillMetadata, SKILL_FILE,
};
pub use validate::{validate_skill_dir, Severity, ValidationIssue};
