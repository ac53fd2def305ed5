//! Default projections used for `SELECT *`.
//!
//! This module provides:
//! - Built-in column sets per kind, as `(title, select expression)` pairs
//! - A resource-name -> kind map for plural and short names
//! - `ProjectionTable`, the built-ins merged with user `table-fields`

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Fallback entry for kinds without their own column set.
pub const OTHER: &str = "other";

/// One default column: header title and the select expression that fills it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableField {
    pub title: String,
    pub name: String,
}

fn col(title: &str, name: &str) -> TableField {
    TableField { title: title.to_string(), name: name.to_string() }
}

/// Column set for a built-in kind. Namespaced kinds lead with NAMESPACE, every set ends with CREATED.
pub fn builtin_columns_for(kind: &str) -> Option<Vec<TableField>> {
    let namespaced = !matches!(kind, "Node" | "Namespace" | "CDI" | "CDIConfig");
    let mut cols: Vec<TableField> = Vec::new();
    if namespaced {
        cols.push(col("NAMESPACE", "namespace"));
    }
    cols.push(col("NAME", "name"));

    match kind {
        "Pod" => {
            cols.push(col("STATUS", "status.phase"));
            cols.push(col("RESTARTS", "sum(status.containerStatuses[*].restartCount)"));
            cols.push(col("NODE", "spec.nodeName"));
        }
        "Deployment" => {
            cols.push(col("REPLICAS", "status.replicas"));
            cols.push(col("READY", "status.readyReplicas"));
            cols.push(col("AVAILABLE", "status.availableReplicas"));
        }
        "StatefulSet" => {
            cols.push(col("REPLICAS", "status.replicas"));
            cols.push(col("READY", "status.readyReplicas"));
        }
        "DaemonSet" => {
            cols.push(col("DESIRED", "status.desiredNumberScheduled"));
            cols.push(col("CURRENT", "status.currentNumberScheduled"));
            cols.push(col("READY", "status.numberReady"));
        }
        "Service" => {
            cols.push(col("TYPE", "spec.type"));
            cols.push(col("CLUSTER_IP", "spec.clusterIP"));
            cols.push(col("PORTS", "spec.ports[*].port"));
        }
        "Ingress" => {
            cols.push(col("CLASS", "spec.ingressClassName"));
            cols.push(col("HOSTS", "spec.rules[*].host"));
        }
        "Job" => {
            cols.push(col("COMPLETIONS", "spec.completions"));
            cols.push(col("SUCCEEDED", "status.succeeded"));
        }
        "CronJob" => {
            cols.push(col("SCHEDULE", "spec.schedule"));
            cols.push(col("SUSPEND", "spec.suspend"));
            cols.push(col("LAST_SCHEDULE", "status.lastScheduleTime"));
        }
        "ConfigMap" => {}
        "Secret" => {
            cols.push(col("TYPE", "type"));
        }
        "PersistentVolumeClaim" => {
            cols.push(col("STATUS", "status.phase"));
            cols.push(col("VOLUME", "spec.volumeName"));
            cols.push(col("CAPACITY", "status.capacity.storage"));
            cols.push(col("STORAGECLASS", "spec.storageClassName"));
        }
        "Node" => {
            cols.push(col("VERSION", "status.nodeInfo.kubeletVersion"));
            cols.push(col("OS_IMAGE", "status.nodeInfo.osImage"));
        }
        "Namespace" => {
            cols.push(col("STATUS", "status.phase"));
        }
        // KubeVirt
        "VirtualMachine" => {
            cols.push(col("RUNNING", "spec.running"));
            cols.push(col("READY", "status.ready"));
        }
        "VirtualMachineInstance" => {
            cols.push(col("PHASE", "status.phase"));
            cols.push(col("NODE", "status.nodeName"));
        }
        "VirtualMachineInstanceReplicaSet" => {
            cols.push(col("REPLICAS", "spec.replicas"));
            cols.push(col("READY", "status.readyReplicas"));
        }
        "VirtualMachineInstanceMigration" => {
            cols.push(col("VM", "spec.vmiName"));
            cols.push(col("PHASE", "status.phase"));
        }
        // CDI
        "DataVolume" => {
            cols.push(col("PHASE", "status.phase"));
            cols.push(col("PROGRESS", "status.progress"));
            cols.push(col("STORAGECLASS", "spec.pvc.storageClassName"));
        }
        "CDI" => {
            cols.push(col("PHASE", "status.phase"));
        }
        "CDIConfig" => {
            cols.push(col("SCRATCH_CLASS", "spec.scratchSpaceStorageClass"));
            cols.push(col("UPLOAD_URL", "spec.uploadProxyURLOverride"));
        }
        // Forklift
        "Provider" => {
            cols.push(col("TYPE", "spec.type"));
            cols.push(col("URL", "spec.url"));
        }
        "Plan" => {
            cols.push(col("SOURCE", "spec.provider.source.name"));
            cols.push(col("DESTINATION", "spec.provider.destination.name"));
        }
        "Migration" => {
            cols.push(col("PLAN", "spec.plan.name"));
            cols.push(col("PHASE", "status.phase"));
        }
        _ => return None,
    }

    cols.push(col("CREATED", "created"));
    Some(cols)
}

/// Fallback columns for kinds nothing else describes.
pub fn other_columns() -> Vec<TableField> {
    vec![
        col("NAMESPACE", "namespace"),
        col("NAME", "name"),
        col("PHASE", "status.phase"),
        col("CREATION_TIME(RFC3339)", "created"),
    ]
}

const BUILTIN_KINDS: &[&str] = &[
    "Pod",
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "Service",
    "Ingress",
    "Job",
    "CronJob",
    "ConfigMap",
    "Secret",
    "PersistentVolumeClaim",
    "Node",
    "Namespace",
    "VirtualMachine",
    "VirtualMachineInstance",
    "VirtualMachineInstanceReplicaSet",
    "VirtualMachineInstanceMigration",
    "DataVolume",
    "CDI",
    "CDIConfig",
    "Provider",
    "Plan",
    "Migration",
];

/// Map plural, singular and short resource names to their kind.
pub fn kind_for_resource(name: &str) -> Option<&'static str> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "pods" | "pod" | "po" => "Pod",
        "deployments" | "deployment" | "deploy" => "Deployment",
        "statefulsets" | "statefulset" | "sts" => "StatefulSet",
        "daemonsets" | "daemonset" | "ds" => "DaemonSet",
        "services" | "service" | "svc" => "Service",
        "ingresses" | "ingress" | "ing" => "Ingress",
        "jobs" | "job" => "Job",
        "cronjobs" | "cronjob" | "cj" => "CronJob",
        "configmaps" | "configmap" | "cm" => "ConfigMap",
        "secrets" | "secret" => "Secret",
        "persistentvolumeclaims" | "persistentvolumeclaim" | "pvc" => "PersistentVolumeClaim",
        "nodes" | "node" | "no" => "Node",
        "namespaces" | "namespace" | "ns" => "Namespace",
        "virtualmachines" | "virtualmachine" | "vm" | "vms" => "VirtualMachine",
        "virtualmachineinstances" | "virtualmachineinstance" | "vmi" | "vmis" => "VirtualMachineInstance",
        "virtualmachineinstancereplicasets" | "virtualmachineinstancereplicaset" | "vmirs" | "vmirss" => {
            "VirtualMachineInstanceReplicaSet"
        }
        "virtualmachineinstancemigrations" | "virtualmachineinstancemigration" | "vmim" | "vmims" => {
            "VirtualMachineInstanceMigration"
        }
        "datavolumes" | "datavolume" | "dv" | "dvs" => "DataVolume",
        "cdis" | "cdi" => "CDI",
        "cdiconfigs" | "cdiconfig" => "CDIConfig",
        "providers" | "provider" => "Provider",
        "plans" | "plan" => "Plan",
        "migrations" | "migration" => "Migration",
        _ => return None,
    };
    Some(kind)
}

/// Kind -> default columns. Read-only once a query starts.
#[derive(Debug, Clone)]
pub struct ProjectionTable {
    kinds: FxHashMap<String, Vec<TableField>>,
}

impl Default for ProjectionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProjectionTable {
    pub fn builtin() -> Self {
        let mut kinds: FxHashMap<String, Vec<TableField>> = BUILTIN_KINDS
            .iter()
            .filter_map(|k| builtin_columns_for(k).map(|cols| ((*k).to_string(), cols)))
            .collect();
        kinds.insert(OTHER.to_string(), other_columns());
        Self { kinds }
    }

    /// Replace whole column sets per kind; later entries win.
    pub fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Vec<TableField>)>,
    {
        for (kind, cols) in entries {
            self.kinds.insert(kind, cols);
        }
    }

    pub fn get(&self, kind: &str) -> Option<&[TableField]> {
        self.kinds.get(kind).map(Vec::as_slice)
    }

    /// Columns for a resource as typed in FROM: exact kind, built-in resource name,
    /// case-insensitive kind or plural, then `other`.
    pub fn columns_for(&self, resource: &str) -> &[TableField] {
        if let Some(cols) = self.get(resource) {
            return cols;
        }
        if let Some(cols) = kind_for_resource(resource).and_then(|k| self.get(k)) {
            return cols;
        }
        let lower = resource.to_ascii_lowercase();
        let by_kind = self.kinds.iter().filter(|(k, _)| k.as_str() != OTHER).find(|(k, _)| {
            let k = k.to_ascii_lowercase();
            lower == k || lower == format!("{}s", k) || lower == format!("{}es", k)
        });
        if let Some((_, cols)) = by_kind {
            return cols;
        }
        self.get(OTHER).unwrap_or(&[])
    }
}
