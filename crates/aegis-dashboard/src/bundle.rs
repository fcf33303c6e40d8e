//! Deployment bundle generation.
//!
//! Turns the wizard form into a zip containing a `docker-compose.yml` for
//! the Core A / Core B pair (plus optional Redis) and a short README.

use std::io::{Cursor, Write};

use serde::Deserialize;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Download name for the generated archive.
pub const BUNDLE_FILENAME: &str = "aegis_config.zip";

/// Errors produced while building a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wizard form contents.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BundleRequest {
    /// The service Core B forwards decrypted traffic to.
    pub backend_url: String,
    pub core_a_port: u16,
    pub core_b_grpc_port: u16,
    pub core_b_http_port: u16,
    /// Session key lifetime in seconds.
    pub session_ttl: u64,
    pub use_redis: bool,
    pub redis_url: String,
}

impl Default for BundleRequest {
    fn default() -> Self {
        Self {
            backend_url: "http://host.docker.internal:8080".to_string(),
            core_a_port: 8000,
            core_b_grpc_port: 50051,
            core_b_http_port: 8001,
            session_ttl: 600,
            use_redis: false,
            redis_url: "redis://redis:6379".to_string(),
        }
    }
}

impl BundleRequest {
    pub fn validate(&self) -> Result<(), BundleError> {
        if self.backend_url.trim().is_empty() {
            return Err(BundleError::Invalid("backend_url is required".to_string()));
        }
        for (name, port) in [
            ("core_a_port", self.core_a_port),
            ("core_b_grpc_port", self.core_b_grpc_port),
            ("core_b_http_port", self.core_b_http_port),
        ] {
            if port == 0 {
                return Err(BundleError::Invalid(format!("{name} must be non-zero")));
            }
        }
        if self.core_b_grpc_port == self.core_b_http_port {
            return Err(BundleError::Invalid(
                "core_b_grpc_port and core_b_http_port must differ".to_string(),
            ));
        }
        if self.session_ttl == 0 {
            return Err(BundleError::Invalid("session_ttl must be non-zero".to_string()));
        }
        if self.use_redis && self.redis_url.trim().is_empty() {
            return Err(BundleError::Invalid(
                "redis_url is required when use_redis is set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Quote a scalar for YAML. JSON string syntax is valid YAML double-quoted style.
fn q(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Render the compose file.
pub fn render_compose(req: &BundleRequest) -> String {
    let grpc = req.core_b_grpc_port;
    let http = req.core_b_http_port;
    let mut out = String::new();

    out.push_str("version: \"3.8\"\n");
    out.push_str("services:\n");

    out.push_str("  aegis-core-b:\n");
    out.push_str("    image: aegis-core:latest\n");
    out.push_str("    command: python -m aegis_core.core_b\n");
    out.push_str("    ports:\n");
    out.push_str(&format!("      - {}\n", q(&format!("{grpc}:{grpc}"))));
    out.push_str(&format!("      - {}\n", q(&format!("{http}:{http}"))));
    out.push_str("    environment:\n");
    out.push_str(&format!("      TARGET_APP_URL: {}\n", q(&req.backend_url)));
    out.push_str(&format!("      GRPC_PORT: {}\n", q(&grpc.to_string())));
    out.push_str(&format!("      CORE_B_HTTP_PORT: {}\n", q(&http.to_string())));
    out.push_str(&format!("      SESSION_TTL: {}\n", q(&req.session_ttl.to_string())));
    out.push_str(&format!("      REDIS_URL: {}\n", q(&req.redis_url)));
    out.push_str("    networks:\n");
    out.push_str("      - aegis-net\n");

    out.push_str("  aegis-core-a:\n");
    out.push_str("    image: aegis-core:latest\n");
    out.push_str("    command: python -m aegis_core.core_a\n");
    out.push_str("    ports:\n");
    out.push_str(&format!("      - {}\n", q(&format!("{}:8000", req.core_a_port))));
    out.push_str("    environment:\n");
    out.push_str(&format!(
        "      CORE_B_GRPC_TARGET: {}\n",
        q(&format!("aegis-core-b:{grpc}"))
    ));
    out.push_str(&format!(
        "      CORE_B_HTTP_URL: {}\n",
        q(&format!("http://aegis-core-b:{http}"))
    ));
    out.push_str("      CORE_A_PORT: \"8000\"\n");
    out.push_str("    depends_on:\n");
    out.push_str("      - aegis-core-b\n");
    out.push_str("    networks:\n");
    out.push_str("      - aegis-net\n");

    if req.use_redis {
        out.push_str("  redis:\n");
        out.push_str("    image: redis:alpine\n");
        out.push_str("    ports:\n");
        out.push_str("      - \"6379:6379\"\n");
        out.push_str("    networks:\n");
        out.push_str("      - aegis-net\n");
    }

    out.push_str("networks:\n");
    out.push_str("  aegis-net:\n");
    out.push_str("    driver: bridge\n");
    out
}

/// Render the bundled README.
pub fn render_readme(req: &BundleRequest) -> String {
    format!(
        "# Aegis Deployment\n\
         \n\
         1. Ensure you have Docker and Docker Compose installed.\n\
         2. Build the base image if you haven't:\n   \
            `docker build -t aegis-core:latest .` (from the root of the aegis-core repo)\n\
         3. Run the stack:\n   \
            `docker-compose up -d`\n\
         \n\
         Your Aegis Core A is listening on port {}.\n\
         It forwards traffic securely to Core B, which sends it to {}.\n\
         Core B metrics are exposed at http://localhost:{}/metrics.\n",
        req.core_a_port, req.backend_url, req.core_b_http_port
    )
}

/// Build the zip archive for a validated request.
pub fn build_bundle(req: &BundleRequest) -> Result<Vec<u8>, BundleError> {
    req.validate()?;

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    zip.start_file("docker-compose.yml", options)?;
    zip.write_all(render_compose(req).as_bytes())?;

    zip.start_file("README.txt", options)?;
    zip.write_all(render_readme(req).as_bytes())?;

    Ok(zip.finish()?.into_inner())
}
