use std::path::Path;

use crate::error::{RegistryError, Result};
use crate::frontmatter;
use crate::model::ResolvedAgent;

/// Who is asking to resolve a system agent. Plain users never have standing
/// to invoke a system agent directly — only the two privileged callers
/// below do, and then only if the agent's own `access` frontmatter grants
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerProfile {
    CosInternal,
    Admin,
    User,
}

impl CallerProfile {
    /// `cos_internal` and `admin` are reserved; any other string is a
    /// regular user with no system-agent standing.
    pub fn parse(s: &str) -> Self {
        match s {
            "cos_internal" => Self::CosInternal,
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

fn access_granted(access: &[String], caller: CallerProfile) -> bool {
    match caller {
        CallerProfile::CosInternal => access.iter().any(|a| a == "cos_internal"),
        CallerProfile::Admin => access.iter().any(|a| a == "admin_direct" || a == "cos_internal"),
        CallerProfile::User => false,
    }
}

fn read_optional(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

/// Assemble the bootstrap body for a system agent: its own `BOOTSTRAP.md`,
/// then every markdown file under `docs/` in lexicographic order, each
/// prefixed with a `Reference: {stem}` header.
fn assemble_bootstrap(agent_dir: &Path) -> String {
    let mut out = read_optional(&agent_dir.join("BOOTSTRAP.md"));

    let docs_dir = agent_dir.join("docs");
    if !docs_dir.is_dir() {
        return out;
    }

    let mut doc_paths: Vec<_> = std::fs::read_dir(&docs_dir)
        .into_iter()
        .flatten()
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    doc_paths.sort();

    for path in doc_paths {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("doc");
        let content = read_optional(&path);
        out.push_str(&format!("\n\n---\nReference: {stem}\n---\n{content}"));
    }

    out
}

/// Read a system agent fresh from `system_agents_dir/<agent_name>/` and
/// enforce `access` frontmatter against `caller`. System agents carry no
/// `soul_md` and never self-schedule, so `heartbeat_md` is always empty.
pub fn load_system_agent(
    system_agents_dir: &Path,
    agent_name: &str,
    caller: CallerProfile,
) -> Result<ResolvedAgent> {
    let agent_dir = system_agents_dir.join(agent_name);
    let agent_md_path = agent_dir.join("AGENT.md");
    if !agent_md_path.is_file() {
        return Err(RegistryError::NotFound(agent_name.to_string()));
    }

    let agent_md = read_optional(&agent_md_path);
    let access = frontmatter::access_tags(&agent_md);
    if !access_granted(&access, caller) {
        return Err(RegistryError::AccessDenied {
            caller: format!("{caller:?}"),
            agent: agent_name.to_string(),
        });
    }

    Ok(ResolvedAgent::FromSystem {
        agent_name: agent_name.to_string(),
        agent_md,
        tools_md: read_optional(&agent_dir.join("TOOLS.md")),
        bootstrap_md: assemble_bootstrap(&agent_dir),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn cos_internal_allowed_when_access_lists_it() {
        assert!(access_granted(&["cos_internal".to_string()], CallerProfile::CosInternal));
    }

    #[test]
    fn admin_allowed_via_admin_direct() {
        assert!(access_granted(&["admin_direct".to_string()], CallerProfile::Admin));
    }

    #[test]
    fn admin_allowed_via_cos_internal_tag() {
        assert!(access_granted(&["cos_internal".to_string()], CallerProfile::Admin));
    }

    #[test]
    fn plain_user_never_allowed() {
        assert!(!access_granted(&["cos_internal".to_string(), "admin_direct".to_string()], CallerProfile::User));
    }

    #[test]
    fn parse_recognizes_reserved_profiles_and_defaults_to_user() {
        assert_eq!(CallerProfile::parse("cos_internal"), CallerProfile::CosInternal);
        assert_eq!(CallerProfile::parse("admin"), CallerProfile::Admin);
        assert_eq!(CallerProfile::parse("personal"), CallerProfile::User);
    }

    #[test]
    fn missing_access_tag_denies_everyone() {
        assert!(!access_granted(&[], CallerProfile::Admin));
        assert!(!access_granted(&[], CallerProfile::CosInternal));
    }

    #[test]
    fn load_system_agent_not_found_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_system_agent(dir.path(), "ghost", CallerProfile::Admin);
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn load_system_agent_denies_unlisted_caller() {
        let root = tempfile::tempdir().unwrap();
        let agent_dir = root.path().join("ops");
        std::fs::create_dir(&agent_dir).unwrap();
        write(&agent_dir, "AGENT.md", "---\naccess: [cos_internal]\n---\nYou help with ops.");

        let result = load_system_agent(root.path(), "ops", CallerProfile::Admin);
        assert!(matches!(result, Err(RegistryError::AccessDenied { .. })));
    }

    #[test]
    fn load_system_agent_assembles_docs_in_order() {
        let root = tempfile::tempdir().unwrap();
        let agent_dir = root.path().join("ops");
        let docs_dir = agent_dir.join("docs");
        std::fs::create_dir_all(&docs_dir).unwrap();
        write(&agent_dir, "AGENT.md", "---\naccess: [admin_direct]\n---\nYou help with ops.");
        write(&agent_dir, "BOOTSTRAP.md", "base bootstrap");
        write(&docs_dir, "b.md", "second");
        write(&docs_dir, "a.md", "first");

        let resolved = load_system_agent(root.path(), "ops", CallerProfile::Admin).unwrap();
        let a_pos = resolved.bootstrap_md().find("Reference: a").unwrap();
        let b_pos = resolved.bootstrap_md().find("Reference: b").unwrap();
        assert!(a_pos < b_pos);
        assert!(resolved.bootstrap_md().starts_with("base bootstrap"));
        assert!(matches!(resolved, ResolvedAgent::FromSystem { .. }));
    }
}
