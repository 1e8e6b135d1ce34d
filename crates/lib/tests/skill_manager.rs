//! Three-stage skill loading over a temporary skill root.

use lib::skills::{catalog_context, SkillManager, SKILL_FILE};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("tether-skills-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).expect("create skill root");
    root
}

fn write_skill(root: &Path, dir: &str, content: &str) -> PathBuf {
    let path = root.join(dir);
    std::fs::create_dir_all(&path).expect("create skill dir");
    std::fs::write(path.join(SKILL_FILE), content).expect("write SKILL.md");
    path
}

fn skill(name: &str, description: &str, body: &str) -> String {
    format!("---\nname: {}\ndescription: {}\n---\n{}", name, description, body)
}

#[tokio::test]
async fn discovery_skips_invalid_skills() {
    let root = temp_root();
    write_skill(&root, "notes", &skill("notes", "Take notes", "# Notes\n"));
    write_skill(&root, "broken", "---\nname: broken\n---\nno description\n");
    write_skill(&root, "foo--bar", &skill("foo--bar", "Bad name", ""));
    write_skill(&root, "plain", "# no frontmatter\n");
    std::fs::create_dir_all(root.join("no-definition")).unwrap();
    std::fs::write(root.join("stray.txt"), "not a skill").unwrap();

    let m = SkillManager::new(&root);
    let found = m.discover_skills().await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "notes");
    assert_eq!(found[0].description, "Take notes");
    assert_eq!(found[0].path, root.join("notes"));
}

#[tokio::test]
async fn missing_root_discovers_nothing() {
    let m = SkillManager::new(std::env::temp_dir().join(format!("tether-none-{}", uuid::Uuid::new_v4())));
    assert!(m.discover_skills().await.is_empty());
    assert!(m.get_available_skills().await.is_empty());
}

#[tokio::test]
async fn discovery_rebuilds_the_cache() {
    let root = temp_root();
    write_skill(&root, "a", &skill("a", "first", ""));
    let m = SkillManager::new(&root);
    assert_eq!(m.discover_skills().await.len(), 1);

    write_skill(&root, "b", &skill("b", "second", ""));
    // Cache is populated, so no rescan yet.
    assert_eq!(m.get_available_skills().await.len(), 1);

    std::fs::remove_dir_all(root.join("a")).unwrap();
    let names: Vec<_> = m.discover_skills().await.into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["b"]);
    assert_eq!(m.get_available_skills().await.len(), 1);
}

#[tokio::test]
async fn available_skills_discover_lazily() {
    let root = temp_root();
    write_skill(&root, "zeta", &skill("zeta", "z", ""));
    write_skill(&root, "alpha", &skill("alpha", "a", ""));
    let m = SkillManager::new(&root);
    let names: Vec<_> = m.get_available_skills().await.into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[tokio::test]
async fn activation_is_cached_for_the_process_lifetime() {
    let root = temp_root();
    let dir = write_skill(
        &root,
        "pdf",
        "---\nname: pdf\ndescription: Read PDFs\nlicense: Apache-2.0\nallowed-tools: Bash\n---\n# PDF\n\nSteps.\n",
    );
    let m = SkillManager::new(&root);

    let first = m.activate_skill("pdf").await.expect("activates");
    assert_eq!(first.name, "pdf");
    assert_eq!(first.description, "Read PDFs");
    assert_eq!(first.content, "# PDF\n\nSteps.\n");
    assert_eq!(first.metadata.license.as_deref(), Some("Apache-2.0"));
    assert!(first.metadata.extra.contains_key("allowed-tools"));
    assert_eq!(first.path, dir);

    std::fs::write(dir.join(SKILL_FILE), skill("pdf", "Changed", "new body")).unwrap();
    let second = m.activate_skill("pdf").await.expect("cache hit");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.description, "Read PDFs");
}

#[tokio::test]
async fn activation_not_found_cases() {
    let root = temp_root();
    write_skill(&root, "foo--bar", &skill("foo--bar", "Bad name", ""));
    write_skill(&root, "half", "---\nname: half\n---\n");
    write_skill(&root, "renamed", &skill("other-name", "d", ""));
    let m = SkillManager::new(&root);

    assert!(m.activate_skill("foo--bar").await.is_none());
    assert!(m.activate_skill("half").await.is_none());
    assert!(m.activate_skill("missing").await.is_none());
    assert!(m.activate_skill("../etc").await.is_none());
    assert!(m.activate_skill("renamed").await.is_none());
}

#[tokio::test]
async fn discovered_skill_activates_from_its_directory() {
    let root = temp_root();
    write_skill(&root, "notes-dir", &skill("notes", "Take notes", "body"));
    let m = SkillManager::new(&root);
    let found = m.discover_skills().await;
    assert_eq!(found[0].name, "notes");

    let activated = m.activate_skill("notes").await.expect("keyed by declared name");
    assert_eq!(activated.path, root.join("notes-dir"));
    assert!(m.activate_skill("notes-dir").await.is_none());
}

#[tokio::test]
async fn resources_load_on_demand_without_caching() {
    let root = temp_root();
    let dir = write_skill(&root, "deploy", &skill("deploy", "Deploy things", ""));
    std::fs::create_dir_all(dir.join("references")).unwrap();
    std::fs::create_dir_all(dir.join("scripts/lib")).unwrap();
    std::fs::create_dir_all(dir.join("assets")).unwrap();
    std::fs::write(dir.join("references/guide.md"), "v1").unwrap();
    std::fs::write(dir.join("scripts/run.sh"), "echo hi").unwrap();
    std::fs::write(dir.join("scripts/lib/util.sh"), "true").unwrap();
    std::fs::write(root.join("secret.txt"), "top secret").unwrap();
    let m = SkillManager::new(&root);

    assert_eq!(
        m.load_skill_resource("deploy", "references/guide.md").await.as_deref(),
        Some("v1")
    );
    std::fs::write(dir.join("references/guide.md"), "v2").unwrap();
    assert_eq!(
        m.load_skill_resource("deploy", "references/guide.md").await.as_deref(),
        Some("v2")
    );

    assert!(m.load_skill_resource("deploy", "references/missing.md").await.is_none());
    assert!(m.load_skill_resource("deploy", "../secret.txt").await.is_none());
    assert!(m.load_skill_resource("nobody", "references/guide.md").await.is_none());

    assert_eq!(
        m.list_skill_resources("deploy").await,
        vec!["references/guide.md", "scripts/lib/util.sh", "scripts/run.sh"]
    );
}

#[tokio::test]
async fn catalog_lists_discovered_skills() {
    let root = temp_root();
    write_skill(&root, "notes", &skill("notes", "Take notes", ""));
    let m = SkillManager::new(&root);
    let ctx = catalog_context(&m.get_available_skills().await);
    assert!(ctx.contains("- **notes**: Take notes"));
}

#[tokio::test]
async fn duplicate_declared_names_keep_the_first_directory_by_path() {
    let root = temp_root();
    for dir in ["c-notes", "a-notes", "b-notes"] {
        write_skill(&root, dir, &skill("notes", dir, ""));
    }
    let m = SkillManager::new(&root);
    for _ in 0..3 {
        let found = m.discover_skills().await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].description, "a-notes");
        assert_eq!(found[0].path, root.join("a-notes"));
    }
}

#[cfg(unix)]
#[tokio::test]
async fn resource_symlinks_cannot_leave_the_skill_directory() {
    use std::os::unix::fs::symlink;

    let root = temp_root();
    let dir = write_skill(&root, "deploy", &skill("deploy", "Deploy things", ""));
    std::fs::create_dir_all(dir.join("references")).unwrap();
    std::fs::write(dir.join("references/guide.md"), "inside").unwrap();
    std::fs::write(root.join("secret.txt"), "top secret").unwrap();
    symlink(root.join("secret.txt"), dir.join("references/leak.md")).unwrap();
    symlink(root.join("deploy/references/guide.md"), dir.join("references/alias.md")).unwrap();
    symlink(&root, dir.join("assets")).unwrap();
    let m = SkillManager::new(&root);

    assert!(m.load_skill_resource("deploy", "references/leak.md").await.is_none());
    assert!(m.load_skill_resource("deploy", "assets/secret.txt").await.is_none());
    assert_eq!(
        m.load_skill_resource("deploy", "references/alias.md").await.as_deref(),
        Some("inside")
    );
}
