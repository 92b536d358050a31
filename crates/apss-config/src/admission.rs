use crate::env::{var_opt, var_or, list_or, EnvError};

pub const DEFAULT_HTTP_ADDR: &str = ":8443";
pub const DEFAULT_EXCLUDE_NAMESPACES: [&str; 3] = ["kube-system", "kube-public", "apss-system"];

#[derive(Clone, Debug)]
pub struct AdmissionConfig {
    pub http_addr: String,
    pub sidecar_image: String,
    pub controller_endpoint: String,
    pub exclude_namespaces: Vec<String>,
    pub tls_cert_file: String,
    pub tls_key_file: String,
}

impl AdmissionConfig {
    pub fn from_env() -> Result<Self, EnvError> {
        Ok(Self {
            http_addr: var_or("HTTP_ADDR", DEFAULT_HTTP_ADDR),
            sidecar_image: var_or("SIDECAR_IMAGE", "apss-agent:latest"),
            controller_endpoint: var_or(
                "CONTROLLER_ENDPOINT",
                crate::agent::DEFAULT_CONTROLLER_ENDPOINT,
            ),
            exclude_namespaces: list_or("EXCLUDE_NAMESPACES", &DEFAULT_EXCLUDE_NAMESPACES),
            tls_cert_file: var_opt("TLS_CERT_FILE").unwrap_or_default(),
            tls_key_file: var_opt("TLS_KEY_FILE").unwrap_or_default(),
        })
    }
}
