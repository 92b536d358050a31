use std::sync::Arc;

use apss_config::AdmissionConfig;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn config() -> AdmissionConfig {
    AdmissionConfig {
        http_addr: ":8443".into(),
        sidecar_image: "apss-agent:latest".into(),
        controller_endpoint: "apss-controller:8080".into(),
        exclude_namespaces: vec!["kube-system".into()],
        tls_cert_file: String::new(),
        tls_key_file: String::new(),
    }
}

fn review_body(pod: Value, namespace: &str) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "11111111-1111-1111-1111-111111111111",
            "kind": { "group": "", "version": "v1", "kind": "Pod" },
            "resource": { "group": "", "version": "v1", "resource": "pods" },
            "namespace": namespace,
            "operation": "CREATE",
            "userInfo": { "username": "system:serviceaccount:default:default" },
            "object": pod,
        }
    })
}

fn bare_pod() -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": "web-0", "namespace": "default" },
        "spec": {
            "containers": [{ "name": "app", "image": "nginx" }],
        },
    })
}

/// Applies the subset of RFC 6902 "add" operations our patch generator
/// emits, so the test can assert on the resulting document instead of
/// trusting the raw op list.
fn apply_add_ops(doc: &mut Value, ops: &[Value]) {
    for op in ops {
        assert_eq!(op["op"], "add");
        let pointer = op["path"].as_str().unwrap();
        let parts: Vec<String> = pointer
            .split('/')
            .skip(1)
            .map(|p| p.replace("~1", "/").replace("~0", "~"))
            .collect();
        apply_at(doc, &parts, op["value"].clone());
    }
}

fn apply_at(doc: &mut Value, parts: &[String], value: Value) {
    if parts.len() == 1 {
        let key = &parts[0];
        if key == "-" {
            if !doc.is_array() {
                *doc = json!([]);
            }
            doc.as_array_mut().unwrap().push(value);
        } else {
            if !doc.is_object() {
                *doc = json!({});
            }
            doc.as_object_mut().unwrap().insert(key.clone(), value);
        }
        return;
    }
    if !doc.is_object() {
        *doc = json!({});
    }
    let entry = doc.as_object_mut().unwrap().entry(parts[0].clone()).or_insert(Value::Null);
    apply_at(entry, &parts[1..], value);
}

#[tokio::test]
async fn bare_pod_is_patched_with_sidecar_volume_and_annotation() {
    let router = apss_admission::server::router(Arc::new(config()));
    let body = serde_json::to_vec(&review_body(bare_pod(), "default")).unwrap();

    let response = router
        .oneshot(
            axum::http::Request::post("/mutate")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let review: Value = serde_json::from_slice(&bytes).unwrap();
    let resp = &review["response"];
    assert_eq!(resp["allowed"], true);
    assert_eq!(resp["patchType"], "JSONPatch");

    let patch_b64 = resp["patch"].as_str().unwrap();
    let patch_bytes = base64::engine::general_purpose::STANDARD.decode(patch_b64).unwrap();
    let ops: Vec<Value> = serde_json::from_slice(&patch_bytes).unwrap();
    assert_eq!(ops.len(), 4);

    let mut pod = bare_pod();
    apply_add_ops(&mut pod, &ops);

    let containers = pod["spec"]["containers"].as_array().unwrap();
    assert!(containers.iter().any(|c| c["name"] == "apss-agent"));
    assert_eq!(pod["spec"]["shareProcessNamespace"], true);
    assert_eq!(pod["metadata"]["annotations"]["apss.invisible.tech/injected"], "true");
    assert!(pod["spec"]["volumes"].as_array().unwrap().iter().any(|v| v["name"] == "apss-proc"));
}

#[tokio::test]
async fn excluded_namespace_pod_is_not_patched() {
    let router = apss_admission::server::router(Arc::new(config()));
    let body = serde_json::to_vec(&review_body(bare_pod(), "kube-system")).unwrap();

    let response = router
        .oneshot(
            axum::http::Request::post("/mutate")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let review: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(review["response"].get("patch").is_none());
}
