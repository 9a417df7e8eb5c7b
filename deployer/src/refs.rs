//! Stable project reference derivation
//!
//! The project reference doubles as the Fly app name, so re-runs for the
//! same branch must always derive the same value. An externally-visible
//! deploy URL wins; otherwise the repository and branch pair is slugged.

use url::Url;

/// Derive the project reference for this run.
pub fn derive_project_ref(
    deploy_url: Option<&str>,
    repository: Option<&str>,
    branch: Option<&str>,
) -> String {
    if let Some(label) = deploy_url.and_then(host_label) {
        return slugify(&label);
    }

    let repo = repository
        .and_then(|full| full.rsplit('/').next())
        .filter(|name| !name.is_empty());
    match (repo, branch) {
        (Some(repo), Some(branch)) => slugify(&format!("{repo}-{branch}")),
        (None, Some(branch)) => slugify(branch),
        (Some(repo), None) => slugify(repo),
        (None, None) => "default".to_string(),
    }
}

/// First DNS label of the hint's host, e.g. `https://abc.fly.dev` -> `abc`.
fn host_label(hint: &str) -> Option<String> {
    let parsed = Url::parse(hint)
        .or_else(|_| Url::parse(&format!("https://{hint}")))
        .ok()?;
    let host = parsed.host_str()?;
    host.split('.').next().map(str::to_string)
}

fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_dash = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "default".to_string()
    } else {
        trimmed.to_string()
    }
}
