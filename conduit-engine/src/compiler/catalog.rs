use conduit_core::domain::step::CatalogUpgrade;

use super::upgrade::target_flags;
use super::{escape_shell, source_env};

/// Working directory catalog files are written to
const CATALOG_DIR: &str = ".r_cicd_catalog";

/// Parsed `catalog:[base*]template[:revision]` identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateId {
    pub catalog: String,
    /// Template base; system templates carry one
    pub base: Option<String>,
    pub template: String,
    pub revision: Option<String>,
}

impl TemplateId {
    /// Parse an external template id, `None` if it is malformed
    pub fn parse(external_id: &str) -> Option<Self> {
        let parts: Vec<&str> = external_id.split(':').collect();
        let (catalog, path, revision) = match parts.as_slice() {
            [catalog, path] => (*catalog, *path, None),
            [catalog, path, revision] => (*catalog, *path, Some(revision.to_string())),
            _ => return None,
        };

        let path_parts: Vec<&str> = path.split('*').collect();
        let (base, template) = match path_parts.as_slice() {
            [template] => (None, *template),
            [base, template] => (Some(base.to_string()), *template),
            _ => return None,
        };

        Some(Self {
            catalog: catalog.to_string(),
            base: base.filter(|b| !b.is_empty()),
            template: template.to_string(),
            revision,
        })
    }
}

/// Body of the first attached file whose name starts with `prefix`
fn file_body<'a>(upgrade: &'a CatalogUpgrade, prefix: &str) -> &'a str {
    upgrade
        .files
        .iter()
        .find(|file| file.name.starts_with(prefix))
        .map(|file| file.body.as_str())
        .unwrap_or_default()
}

/// Publish a new template version to the catalog repository, then optionally deploy it
pub(super) fn compile(upgrader_image: &str, upgrade: &CatalogUpgrade) -> String {
    let template = TemplateId::parse(&upgrade.external_id).unwrap_or_else(|| {
        tracing::warn!("Malformed catalog template id: {}", upgrade.external_id);
        TemplateId::default()
    });
    let system_flag = if template.base.is_some() { "--system " } else { "" };

    let mut script = source_env();
    script.push_str(&format!("mkdir -p {}\n", CATALOG_DIR));
    for (file, prefix) in [
        ("docker-compose.yml", "docker-compose"),
        ("rancher-compose.yml", "rancher-compose"),
        ("README.md", "README.md"),
    ] {
        script.push_str(&format!(
            "cat>{}/{}<<EOF\n{}\nEOF\n",
            CATALOG_DIR,
            file,
            escape_shell(file_body(upgrade, prefix))
        ));
    }
    script.push_str(&format!(
        "cat>{}/answers.txt<<'EOF'\n{}\nEOF\n",
        CATALOG_DIR, upgrade.answers
    ));

    script.push_str(&format!(
        "docker run --rm --volumes-from ${{HOSTNAME}} -w ${{PWD}}/{} {} catalog --repourl {} --branch {} --username {} --password {} {}--templatename {} --answers answers.txt",
        CATALOG_DIR,
        upgrader_image,
        upgrade.repository,
        upgrade.branch,
        upgrade.credentials.username,
        upgrade.credentials.password,
        system_flag,
        template.template
    ));
    if upgrade.deploy {
        script.push_str(&format!(
            " --deploy true --stackname {}{}",
            upgrade.stack_name,
            target_flags(&upgrade.target)
        ));
    }

    script
}
