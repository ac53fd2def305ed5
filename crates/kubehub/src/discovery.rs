//! Served-resource catalog and name matching.

use anyhow::{anyhow, Context, Result};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::core::ApiResource;
use kube::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub singular: String,
    pub short_names: Vec<String>,
    pub namespaced: bool,
}

impl DiscoveredResource {
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }

    /// Plural, singular, short names, kind, or `plural.group`; case-insensitive.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        name == self.plural
            || name == self.singular
            || name == self.kind.to_ascii_lowercase()
            || self.short_names.iter().any(|s| *s == name)
            || (!self.group.is_empty() && name == format!("{}.{}", self.plural, self.group))
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        [self.plural.as_str(), self.singular.as_str()].into_iter().chain(self.short_names.iter().map(String::as_str))
    }
}

/// Core `v1` first, then every group's preferred version, in server order.
pub async fn discover(client: &Client) -> Result<Vec<DiscoveredResource>> {
    let mut out = Vec::new();
    let core = client.list_core_api_versions().await.context("listing core API versions")?;
    for v in &core.versions {
        let list = client.list_core_api_resources(v).await.with_context(|| format!("listing core {} resources", v))?;
        collect(&mut out, "", v, list);
    }
    let groups = client.list_api_groups().await.context("listing API groups")?;
    for g in groups.groups {
        let Some(pv) = g.preferred_version.or_else(|| g.versions.into_iter().next()) else {
            continue;
        };
        match client.list_api_group_resources(&pv.group_version).await {
            Ok(list) => collect(&mut out, &g.name, &pv.version, list),
            // Aggregated APIs can be down without the cluster being unusable.
            Err(e) => debug!(group_version = %pv.group_version, error = %e, "skipping unavailable group"),
        }
    }
    debug!(resources = out.len(), "discovery complete");
    Ok(out)
}

fn collect(out: &mut Vec<DiscoveredResource>, group: &str, version: &str, list: APIResourceList) {
    for r in list.resources {
        if r.name.contains('/') || !r.verbs.iter().any(|v| v == "list") {
            continue;
        }
        let singular = if r.singular_name.is_empty() { r.kind.to_ascii_lowercase() } else { r.singular_name };
        out.push(DiscoveredResource {
            group: group.to_string(),
            version: version.to_string(),
            kind: r.kind,
            plural: r.name,
            singular,
            short_names: r.short_names.unwrap_or_default(),
            namespaced: r.namespaced,
        });
    }
}

/// First resource answering to `name`, or an error with a close-match hint.
pub fn find<'a>(resources: &'a [DiscoveredResource], name: &str) -> Result<&'a DiscoveredResource> {
    if let Some(r) = resources.iter().find(|r| r.matches(name)) {
        return Ok(r);
    }
    match suggest(resources, name) {
        Some(hint) => Err(anyhow!("failed to find resource \"{}\", did you mean \"{}\"?", name, hint)),
        None => Err(anyhow!("failed to find resource \"{}\"", name)),
    }
}

/// Best fuzzy match among every name a resource answers to.
pub fn suggest<'a>(resources: &'a [DiscoveredResource], name: &str) -> Option<&'a str> {
    let matcher = SkimMatcherV2::default();
    let needle = name.to_ascii_lowercase();
    resources
        .iter()
        .flat_map(|r| r.names())
        .filter_map(|cand| matcher.fuzzy_match(cand, &needle).map(|score| (score, cand)))
        .max_by(|(a, ca), (b, cb)| a.cmp(b).then_with(|| cb.len().cmp(&ca.len())))
        .map(|(_, cand)| cand)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(group: &str, kind: &str, plural: &str, short: &[&str], namespaced: bool) -> DiscoveredResource {
        DiscoveredResource {
            group: group.into(),
            version: "v1".into(),
            kind: kind.into(),
            plural: plural.into(),
            singular: kind.to_ascii_lowercase(),
            short_names: short.iter().map(|s| s.to_string()).collect(),
            namespaced,
        }
    }

    fn catalog() -> Vec<DiscoveredResource> {
        vec![
            res("", "Pod", "pods", &["po"], true),
            res("", "Node", "nodes", &["no"], false),
            res("apps", "Deployment", "deployments", &["deploy"], true),
            res("kubevirt.io", "VirtualMachine", "virtualmachines", &["vm", "vms"], true),
        ]
    }

    #[test]
    fn matches_every_spelling() {
        let c = catalog();
        for name in ["pods", "pod", "po", "Pod", "PODS"] {
            assert_eq!(find(&c, name).unwrap().kind, "Pod", "{name}");
        }
        assert_eq!(find(&c, "deploy").unwrap().kind, "Deployment");
        assert_eq!(find(&c, "virtualmachines.kubevirt.io").unwrap().kind, "VirtualMachine");
        assert_eq!(find(&c, "vm").unwrap().api_version(), "kubevirt.io/v1");
        assert_eq!(find(&c, "nodes").unwrap().api_version(), "v1");
    }

    #[test]
    fn unknown_names_get_a_hint() {
        let c = catalog();
        let err = find(&c, "deploymnts").unwrap_err().to_string();
        assert!(err.starts_with("failed to find resource \"deploymnts\""), "{err}");
        assert!(err.contains("did you mean \"deployments\""), "{err}");
        let err = find(&c, "zzzz").unwrap_err().to_string();
        assert_eq!(err, "failed to find resource \"zzzz\"");
    }

    #[test]
    fn api_resource_carries_plural_and_version() {
        let ar = catalog()[2].api_resource();
        assert_eq!(ar.api_version, "apps/v1");
        assert_eq!(ar.plural, "deployments");
        assert_eq!(ar.kind, "Deployment");
    }
}
