use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use k8s_openapi::api::core::v1::Pod;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use tracing::warn;

use apss_config::AdmissionConfig;

use crate::patch::{build_patch, should_skip};

pub async fn mutate(
    State(config): State<Arc<AdmissionConfig>>,
    Json(review): Json<AdmissionReview<Pod>>,
) -> Json<AdmissionReview<Pod>> {
    let req: AdmissionRequest<Pod> = match review.try_into() {
        Ok(req) => req,
        Err(err) => {
            warn!(%err, "admission: malformed AdmissionReview, admitting unmodified");
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };

    let mut response = AdmissionResponse::from(&req);

    if let Some(pod) = &req.object {
        let namespace = req.namespace.clone().unwrap_or_default();
        if !should_skip(pod, &config, &namespace) {
            let ops = serde_json::Value::Array(build_patch(pod, &config));
            match serde_json::from_value::<json_patch::Patch>(ops) {
                Ok(patch) => match response.clone().with_patch(patch) {
                    Ok(patched) => response = patched,
                    Err(err) => warn!(%err, "admission: failed to encode patch"),
                },
                Err(err) => warn!(%err, "admission: failed to deserialize patch ops"),
            }
        }
    }

    Json(response.into_review())
}

pub async fn health() -> &'static str {
    "ok"
}
