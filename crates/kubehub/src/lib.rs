//! kubeql kubehub: kube-rs client, resource discovery and listing

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use kube::{
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::{DynamicObject, TypeMeta},
    Client, Config,
};
use kubeql_core::{Document, ListRequest, ResourceLister};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod discovery;

pub use discovery::DiscoveredResource;

/// Standard cluster-connection flags.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    /// Overrides the context's namespace.
    pub namespace: Option<String>,
}

/// Build a client config from an explicit kubeconfig, a named context, or the usual inference chain.
pub async fn client_config(opts: &ClientOptions) -> Result<Config> {
    let kc_opts = KubeConfigOptions { context: opts.context.clone(), ..Default::default() };
    let mut config = match &opts.kubeconfig {
        Some(path) => {
            let kc = Kubeconfig::read_from(path).with_context(|| format!("reading kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kc, &kc_opts).await.context("loading kubeconfig")?
        }
        None if opts.context.is_some() => Config::from_kubeconfig(&kc_opts).await.context("loading kubeconfig")?,
        None => Config::infer().await.context("inferring cluster config")?,
    };
    if let Some(ns) = &opts.namespace {
        config.default_namespace = ns.clone();
    }
    Ok(config)
}

/// Cluster collaborator backed by a kube client. Discovery runs once, on first use.
pub struct KubeLister {
    client: Client,
    namespace: String,
    resources: OnceCell<Vec<DiscoveredResource>>,
}

impl KubeLister {
    pub async fn connect(opts: &ClientOptions) -> Result<Self> {
        let config = client_config(opts).await?;
        let namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("creating kube client")?;
        debug!(ns = %namespace, "kube client ready");
        Ok(Self::new(client, namespace))
    }

    pub fn new(client: Client, namespace: String) -> Self {
        Self { client, namespace, resources: OnceCell::new() }
    }

    /// Namespace used when a request names none.
    pub fn current_namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn server_version(&self) -> Result<String> {
        let info = self.client.apiserver_version().await.context("querying server version")?;
        Ok(info.git_version)
    }

    pub async fn resources(&self) -> Result<&[DiscoveredResource]> {
        let list = self
            .resources
            .get_or_try_init(|| async {
                let started = Instant::now();
                let found = discovery::discover(&self.client).await?;
                metrics::histogram!("kube_discovery_ms", started.elapsed().as_secs_f64() * 1_000.0);
                Ok::<_, anyhow::Error>(found)
            })
            .await?;
        Ok(list.as_slice())
    }

    pub async fn resolve(&self, name: &str) -> Result<&DiscoveredResource> {
        discovery::find(self.resources().await?, name)
    }

    async fn fetch(&self, req: &ListRequest) -> Result<Vec<Document>> {
        let res = self.resolve(&req.resource).await?;
        let ar = res.api_resource();
        let ns = req.namespace.as_deref().unwrap_or(&self.namespace);
        let api: Api<DynamicObject> = if res.namespaced && !req.all_namespaces {
            Api::namespaced_with(self.client.clone(), ns, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        };
        let started = Instant::now();
        let list = api.list(&ListParams::default()).await?;
        let took = started.elapsed();
        metrics::histogram!("kube_list_ms", took.as_secs_f64() * 1_000.0);
        info!(gvk = %format!("{}/{}", ar.api_version, ar.kind), ns = ?res.namespaced.then_some(ns), items = list.items.len(), took_ms = took.as_millis() as u64, "listed");
        list.items.into_iter().map(|o| to_document(o, res)).collect()
    }
}

#[async_trait::async_trait]
impl ResourceLister for KubeLister {
    async fn list(&self, req: &ListRequest, cancel: &CancellationToken) -> Result<Vec<Document>> {
        tokio::select! {
            _ = cancel.cancelled() => Err(anyhow!("request cancelled")),
            r = self.fetch(req) => r,
        }
    }
}

fn strip_managed_fields(v: &mut serde_json::Value) {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
        }
    }
}

/// List items usually come without `apiVersion`/`kind`; fill them from discovery.
fn to_document(mut obj: DynamicObject, res: &DiscoveredResource) -> Result<Document> {
    if obj.types.is_none() {
        obj.types = Some(TypeMeta { api_version: res.api_version(), kind: res.kind.clone() });
    }
    let mut raw = serde_json::to_value(&obj).context("serializing DynamicObject")?;
    strip_managed_fields(&mut raw);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ManagedFieldsEntry, ObjectMeta};
    use serde_json::json;

    fn pods() -> DiscoveredResource {
        DiscoveredResource {
            group: String::new(),
            version: "v1".into(),
            kind: "Pod".into(),
            plural: "pods".into(),
            singular: "pod".into(),
            short_names: vec!["po".into()],
            namespaced: true,
        }
    }

    #[test]
    fn documents_get_type_meta_and_lose_managed_fields() {
        let obj = DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some("web-1".into()),
                namespace: Some("default".into()),
                managed_fields: Some(vec![ManagedFieldsEntry::default()]),
                ..Default::default()
            },
            data: json!({ "spec": { "nodeName": "n1" }, "status": { "phase": "Running" } }),
        };
        let doc = to_document(obj, &pods()).unwrap();
        assert_eq!(doc["apiVersion"], "v1");
        assert_eq!(doc["kind"], "Pod");
        assert_eq!(doc["metadata"]["name"], "web-1");
        assert!(doc["metadata"].get("managedFields").is_none());
        assert_eq!(doc["status"]["phase"], "Running");
    }

    #[test]
    fn existing_type_meta_is_kept() {
        let obj = DynamicObject {
            types: Some(TypeMeta { api_version: "v1".into(), kind: "Pod".into() }),
            metadata: ObjectMeta { name: Some("a".into()), ..Default::default() },
            data: json!({}),
        };
        let doc = to_document(obj, &pods()).unwrap();
        assert_eq!(doc["kind"], "Pod");
    }
}
