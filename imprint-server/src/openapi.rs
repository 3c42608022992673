//! OpenAPI documentation configuration
//!
//! OpenAPI 3.0 document served under /docs.

use utoipa::OpenApi;

use crate::handlers::{
    AnalyzeResponse, ArtifactsResponse, DeleteFingerprintResponse, FingerprintListResponse,
    FingerprintResponse, HealthResponse, ReadyResponse, SimilarMatchResponse, StageErrorResponse,
    VerdictResponse,
};

/// Imprint API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Imprint API",
        version = "0.1.0",
        description = r#"
## Image Misuse Detection API

Imprint checks an uploaded image against a reference dataset and previous
uploads, and asks an authenticity classifier whether it is synthetic.

### How It Works

1. **Analyze** an image via `POST /analyze`
2. The image is fingerprinted (SHA-256 over a normalized raster, plus a 64-bit perceptual hash)
3. Exact duplicates are found in the reference dataset, near-duplicates among stored uploads
4. The classifier labels the image REAL or FAKE
5. Suspicious results produce alert and takedown artifacts

Store, search and report failures do not abort an analysis; they are listed
in `stage_errors`.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Analysis", description = "Fingerprint, search and classify uploaded images"),
        (name = "Fingerprints", description = "Fingerprint store administration"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::analyze::analyze_handler,
        crate::handlers::fingerprints::list_fingerprints_handler,
        crate::handlers::fingerprints::get_fingerprint_handler,
        crate::handlers::fingerprints::delete_fingerprint_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            AnalyzeResponse,
            SimilarMatchResponse,
            VerdictResponse,
            ArtifactsResponse,
            StageErrorResponse,
            FingerprintResponse,
            FingerprintListResponse,
            DeleteFingerprintResponse,
        )
    )
)]
pub struct ApiDoc;
