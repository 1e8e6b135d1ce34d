//! Compact skill list for a system prompt: the model sees names and descriptions only
//! and asks for a skill's full content when a task needs it.

use super::manager::SkillSummary;

/// Render summaries as a markdown list. Empty input renders nothing.
pub fn catalog_context(skills: &[SkillSummary]) -> String {
    if skills.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "## Available skills\n\nActivate a skill by name to read its full instructions before using it.\n\n",
    );
    for s in skills {
        out.push_str(&format!("- **{}**: {}\n", s.name, s.description.trim()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn lists_each_skill_once() {
        let skills = vec![
            SkillSummary {
                name: "notes".to_string(),
                description: "Take notes ".to_string(),
                path: PathBuf::from("/s/notes"),
            },
            SkillSummary {
                name: "pdf".to_string(),
                description: "Read PDFs".to_string(),
                path: PathBuf::from("/s/pdf"),
            },
        ];
        let ctx = catalog_context(&skills);
        assert!(ctx.starts_with("## Available skills"));
        assert!(ctx.contains("- **notes**: Take notes\n"));
        assert!(ctx.contains("- **pdf**: Read PDFs\n"));
        assert!(!ctx.contains("/s/notes"));
    }

    #[test]
    fn empty_catalog_is_empty() {
        assert_eq!(catalog_context(&[]), "");
    }
}
