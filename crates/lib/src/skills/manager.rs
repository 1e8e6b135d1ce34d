//! Progressive skill loading over a skill root (`<root>/<name>/SKILL.md`).
//!
//! Stage 1 reads only frontmatter of every skill, stage 2 reads one skill's full
//! definition file, stage 3 reads one resource file. Stage 1 and 2 results are cached
//! separately, keyed by the declared (parsed) skill name; stage 3 is never cached.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::parser::{self, SkillMetadata, SKILL_FILE};

/// Directories under a skill that hold loadable resources.
pub const RESOURCE_DIRS: [&str; 3] = ["scripts", "references", "assets"];

/// Stage 1: what discovery knows about a skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillSummary {
    pub name: String,
    pub description: String,
    /// Skill directory.
    pub path: PathBuf,
}

/// Stage 2: full definition of one skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivatedSkill {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
    /// Markdown body after the frontmatter.
    pub content: String,
    pub metadata: SkillMetadata,
}

pub struct SkillManager {
    root: PathBuf,
    metadata: RwLock<HashMap<String, SkillSummary>>,
    activated: RwLock<HashMap<String, Arc<ActivatedSkill>>>,
}

impl SkillManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metadata: RwLock::new(HashMap::new()),
            activated: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rebuild the metadata cache from every immediate subdirectory of the root, in path order.
    /// A skill that fails to parse or validate is logged and left out; discovery itself never fails.
    /// When two directories declare the same name, the one that sorts first wins.
    pub async fn discover_skills(&self) -> Vec<SkillSummary> {
        self.metadata.write().await.clear();

        let mut found: HashMap<String, SkillSummary> = HashMap::new();
        let mut read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(d) => d,
            Err(e) => {
                log::debug!("skill root {} not readable: {}", self.root.display(), e);
                return Vec::new();
            }
        };
        let mut dirs = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => dirs.push(entry.path()),
                Ok(None) => break,
                Err(e) => {
                    log::warn!("listing skill root {}: {}", self.root.display(), e);
                    break;
                }
            }
        }
        dirs.sort();

        for dir in dirs {
            if !tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
                continue;
            }
            let meta = match parser::read_frontmatter(&dir.join(SKILL_FILE)).await {
                Ok(meta) => meta,
                Err(e) => {
                    log::warn!("skipping skill {}: {}", dir.display(), e);
                    continue;
                }
            };
            warn_on_dir_mismatch(&dir, &meta.name);
            if let Some(existing) = found.get(&meta.name) {
                log::warn!(
                    "skipping skill {}: name '{}' already declared by {}",
                    dir.display(),
                    meta.name,
                    existing.path.display()
                );
                continue;
            }
            found.insert(
                meta.name.clone(),
                SkillSummary {
                    name: meta.name,
                    description: meta.description,
                    path: dir,
                },
            );
        }

        let mut skills: Vec<SkillSummary> = found.values().cloned().collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        *self.metadata.write().await = found;
        log::info!("discovered {} skill(s) in {}", skills.len(), self.root.display());
        skills
    }

    /// Cached summaries; runs discovery first when the cache is empty.
    pub async fn get_available_skills(&self) -> Vec<SkillSummary> {
        let cached: Vec<SkillSummary> = self.metadata.read().await.values().cloned().collect();
        if cached.is_empty() {
            return self.discover_skills().await;
        }
        let mut skills = cached;
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }

    /// Full definition of `name`, read once and then served from cache for the life of the manager.
    /// None when the skill directory or definition file is missing or invalid.
    pub async fn activate_skill(&self, name: &str) -> Option<Arc<ActivatedSkill>> {
        if let Some(hit) = self.activated.read().await.get(name) {
            return Some(Arc::clone(hit));
        }

        let dir = self.skill_dir(name).await?;
        let (metadata, content) = match parser::read_skill(&dir.join(SKILL_FILE)).await {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("cannot activate skill '{}' from {}: {}", name, dir.display(), e);
                return None;
            }
        };
        if metadata.name != name {
            log::warn!(
                "cannot activate skill '{}': {} declares name '{}'",
                name,
                dir.display(),
                metadata.name
            );
            return None;
        }
        warn_on_dir_mismatch(&dir, &metadata.name);

        let skill = Arc::new(ActivatedSkill {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            path: dir,
            content,
            metadata,
        });
        let mut activated = self.activated.write().await;
        Some(Arc::clone(
            activated.entry(name.to_string()).or_insert(skill),
        ))
    }

    /// Text of one file under the skill directory, by relative path. Never cached.
    /// None when the file is missing, unreadable, or the path (after resolving symlinks)
    /// leaves the skill directory.
    pub async fn load_skill_resource(&self, skill_name: &str, resource_path: &str) -> Option<String> {
        if !is_contained_relative(Path::new(resource_path)) {
            log::debug!(
                "rejecting resource path '{}' for skill '{}'",
                resource_path,
                skill_name
            );
            return None;
        }
        let dir = self.skill_dir(skill_name).await?;
        let path = match resolve_inside(&dir, resource_path).await {
            Ok(path) => path,
            Err(e) => {
                log::debug!(
                    "resource '{}' of skill '{}' not loaded: {}",
                    resource_path,
                    skill_name,
                    e
                );
                return None;
            }
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => Some(s),
            Err(e) => {
                log::debug!("resource {} not loaded: {}", path.display(), e);
                None
            }
        }
    }

    /// Relative paths (with `/` separators) of every file under the skill's resource directories.
    pub async fn list_skill_resources(&self, skill_name: &str) -> Vec<String> {
        let Some(dir) = self.skill_dir(skill_name).await else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut pending: Vec<PathBuf> = RESOURCE_DIRS.iter().map(|d| dir.join(d)).collect();
        while let Some(current) = pending.pop() {
            let Ok(mut entries) = tokio::fs::read_dir(&current).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                match entry.file_type().await {
                    Ok(t) if t.is_dir() => pending.push(path),
                    Ok(t) if t.is_file() => {
                        if let Ok(rel) = path.strip_prefix(&dir) {
                            let rel: Vec<String> = rel
                                .components()
                                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                                .collect();
                            out.push(rel.join("/"));
                        }
                    }
                    _ => {}
                }
            }
        }
        out.sort();
        out
    }

    /// Directory of a skill: the discovered path when known, else `<root>/<name>` for a valid name.
    async fn skill_dir(&self, name: &str) -> Option<PathBuf> {
        if let Some(summary) = self.metadata.read().await.get(name) {
            return Some(summary.path.clone());
        }
        if let Err(e) = parser::validate_name(name) {
            log::warn!("skill lookup: {}", e);
            return None;
        }
        let dir = self.root.join(name);
        match tokio::fs::metadata(&dir).await {
            Ok(m) if m.is_dir() => Some(dir),
            _ => {
                log::warn!("skill '{}' not found under {}", name, self.root.display());
                None
            }
        }
    }
}

fn warn_on_dir_mismatch(dir: &Path, declared: &str) {
    let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if dir_name != declared {
        log::warn!(
            "skill directory '{}' declares name '{}'; directory and name should match",
            dir.display(),
            declared
        );
    }
}

/// Non-empty relative path made only of normal components.
fn is_contained_relative(path: &Path) -> bool {
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Canonical path of `relative` under `dir`; an error when it resolves outside `dir`.
async fn resolve_inside(dir: &Path, relative: &str) -> std::io::Result<PathBuf> {
    let dir = tokio::fs::canonicalize(dir).await?;
    let path = tokio::fs::canonicalize(dir.join(relative)).await?;
    if !path.starts_with(&dir) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("{} is outside {}", path.display(), dir.display()),
        ));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_paths_must_stay_inside() {
        assert!(is_contained_relative(Path::new("references/guide.md")));
        assert!(is_contained_relative(Path::new("scripts/run.sh")));
        assert!(!is_contained_relative(Path::new("")));
        assert!(!is_contained_relative(Path::new("../other/SKILL.md")));
        assert!(!is_contained_relative(Path::new("scripts/../../x")));
        assert!(!is_contained_relative(Path::new("/etc/passwd")));
        assert!(!is_contained_relative(Path::new("./SKILL.md")));
    }
}
