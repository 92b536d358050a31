use apss_config::AdmissionConfig;
use k8s_openapi::api::core::v1::Pod;
use serde_json::{json, Value};

const SIDECAR_NAME: &str = "apss-agent";
const INJECT_ANNOTATION: &str = "apss.invisible.tech/inject";
const INJECTED_ANNOTATION: &str = "apss.invisible.tech/injected";
const PROC_VOLUME_NAME: &str = "apss-proc";
const SIDECAR_UID: i64 = 1000;

pub fn should_skip(pod: &Pod, config: &AdmissionConfig, namespace: &str) -> bool {
    if config.exclude_namespaces.iter().any(|ns| ns == namespace) {
        return true;
    }
    if has_existing_sidecar(pod) {
        return true;
    }
    if opted_out(pod) {
        return true;
    }
    if host_network(pod) {
        return true;
    }
    false
}

fn has_existing_sidecar(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .map(|spec| spec.containers.iter().any(|c| c.name == SIDECAR_NAME))
        .unwrap_or(false)
}

fn opted_out(pod: &Pod) -> bool {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(INJECT_ANNOTATION))
        .map(|v| v == "false")
        .unwrap_or(false)
}

fn host_network(pod: &Pod) -> bool {
    pod.spec.as_ref().and_then(|s| s.host_network).unwrap_or(false)
}

/// Builds the four-step RFC 6902 patch: add the sidecar container, add or
/// append the in-memory proc scratch volume, turn on `shareProcessNamespace`
/// if it isn't already, and stamp the injected annotation.
pub fn build_patch(pod: &Pod, config: &AdmissionConfig) -> Vec<Value> {
    let mut ops = Vec::with_capacity(4);
    ops.push(container_op(pod, config));
    ops.push(volume_op(pod));
    if let Some(op) = share_process_namespace_op(pod) {
        ops.push(op);
    }
    ops.push(annotation_op(pod));
    ops
}

fn container_op(pod: &Pod, config: &AdmissionConfig) -> Value {
    let pod_name = pod.metadata.name.clone().unwrap_or_default();
    let pod_namespace = pod.metadata.namespace.clone().unwrap_or_default();
    let agent_id = format!("{pod_name}-{pod_namespace}");
    let container = json!({
        "name": SIDECAR_NAME,
        "image": config.sidecar_image,
        "env": [
            { "name": "AGENT_ID", "value": agent_id },
            { "name": "CONTROLLER_ENDPOINT", "value": config.controller_endpoint },
            { "name": "POD_NAME", "valueFrom": { "fieldRef": { "fieldPath": "metadata.name" } } },
            { "name": "POD_NAMESPACE", "valueFrom": { "fieldRef": { "fieldPath": "metadata.namespace" } } },
            { "name": "NODE_NAME", "valueFrom": { "fieldRef": { "fieldPath": "spec.nodeName" } } },
        ],
        "resources": {
            "requests": { "cpu": "10m", "memory": "32Mi" },
            "limits": { "cpu": "100m", "memory": "128Mi" },
        },
        "securityContext": {
            "runAsNonRoot": true,
            "runAsUser": SIDECAR_UID,
            "readOnlyRootFilesystem": true,
            "allowPrivilegeEscalation": false,
            "capabilities": { "drop": ["ALL"] },
        },
        "volumeMounts": [
            { "name": PROC_VOLUME_NAME, "mountPath": "/proc", "readOnly": true },
        ],
    });
    json!({ "op": "add", "path": "/spec/containers/-", "value": container })
}

fn volume_op(pod: &Pod) -> Value {
    let volume = json!({
        "name": PROC_VOLUME_NAME,
        "emptyDir": { "medium": "Memory" },
    });
    let has_volumes = pod
        .spec
        .as_ref()
        .map(|s| !s.volumes.as_deref().unwrap_or_default().is_empty())
        .unwrap_or(false);
    if has_volumes {
        json!({ "op": "add", "path": "/spec/volumes/-", "value": volume })
    } else {
        json!({ "op": "add", "path": "/spec/volumes", "value": [volume] })
    }
}

fn share_process_namespace_op(pod: &Pod) -> Option<Value> {
    let already = pod.spec.as_ref().and_then(|s| s.share_process_namespace).unwrap_or(false);
    if already {
        None
    } else {
        Some(json!({ "op": "add", "path": "/spec/shareProcessNamespace", "value": true }))
    }
}

/// JSON Pointer escapes `/` as `~1` in the annotation key (RFC 6901), so the
/// path segment is `apss.invisible.tech~1injected`, not a literal slash.
fn annotation_op(pod: &Pod) -> Value {
    let has_annotations = pod
        .metadata
        .annotations
        .as_ref()
        .map(|a| !a.is_empty())
        .unwrap_or(false);
    if has_annotations {
        json!({
            "op": "add",
            "path": "/metadata/annotations/apss.invisible.tech~1injected",
            "value": "true",
        })
    } else {
        json!({
            "op": "add",
            "path": "/metadata/annotations",
            "value": { INJECTED_ANNOTATION: "true" },
        })
    }
}
