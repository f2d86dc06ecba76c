//! Axum request handlers for all service endpoints.
//!
//! Each handler decodes its JSON body, moves the CPU-bound work onto the
//! blocking pool and maps any [`ServiceError`] to `{code, message}` with the
//! category's status code.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{
    protocol::{
        AutoDecryptRequest, DataEncoding, EccKeyRequest, ErrorResponse, FileRequest, FileResponse,
        HashRequest, HashResponse, HealthResponse, ImageRequest, ImageResponse, KeyPairResponse,
        NoncePolicy, Operation, PartialRequest, Scope,
    },
    ErrorCategory, ServiceError,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    params::{self, RegionInputs},
    state::AppState,
};
use crate::crypto::{
    keys::{self, Curve, KeyPairPem},
    CipherContext,
};
use crate::hashing::HashAlgorithm;
use crate::imaging::{self, raster, DetectParams, ProcessedImage, RegionCipher};
use crate::partial;

const SUCCESS: &str = "Success";

/// `POST /api/encrypt`: whole-file or partial-text encrypt/decrypt.
///
/// Whole files come back as Base64 after encryption and as UTF-8 text after
/// decryption when the plaintext is valid UTF-8. Partial requests always
/// return the rewritten document as text.
pub async fn encrypt(
    State(state): State<AppState>,
    payload: Result<Json<FileRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejected(rejection),
    };
    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        operation = ?req.operation,
        algorithm = %req.algorithm,
        mode = req.mode.as_deref().unwrap_or("default"),
        partial = req.partial.is_some(),
        "file request"
    );
    respond(request_id, run_blocking(move || process_file(&state, req)).await)
}

/// `POST /api/image/process`: encipher or decipher the listed regions.
pub async fn process_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejected(rejection),
    };
    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        operation = ?req.operation,
        algorithm = %req.algorithm,
        nonce_policy = ?req.nonce_policy,
        "image request"
    );
    respond(request_id, run_blocking(move || process_regions(&state, req)).await)
}

/// `POST /api/image/auto-decrypt`: detect enciphered regions and decrypt them.
pub async fn auto_decrypt(
    State(state): State<AppState>,
    payload: Result<Json<AutoDecryptRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejected(rejection),
    };
    let request_id = Uuid::new_v4();
    info!(%request_id, algorithm = %req.algorithm, "auto-decrypt request");
    respond(request_id, run_blocking(move || detect_and_decrypt(&state, req)).await)
}

/// `POST /api/hash`: hex digest of a file.
pub async fn hash(payload: Result<Json<HashRequest>, JsonRejection>) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return rejected(rejection),
    };
    let request_id = Uuid::new_v4();
    info!(%request_id, algorithm = %req.algorithm, "hash request");
    respond(request_id, run_blocking(move || digest(req)).await)
}

/// `POST /api/keys/rsa`: generate a 2048-bit RSA pair.
pub async fn rsa_keys(State(state): State<AppState>) -> Response {
    let request_id = Uuid::new_v4();
    info!(%request_id, "rsa key generation");
    let result = run_blocking(move || Ok(key_pair(keys::generate_rsa(&*state.rng)?))).await;
    respond(request_id, result)
}

/// `POST /api/keys/ecc`: generate an EC pair. The body is optional and
/// defaults to secp256r1.
pub async fn ecc_keys(
    State(state): State<AppState>,
    payload: Option<Json<EccKeyRequest>>,
) -> Response {
    let req = payload.map(|Json(r)| r).unwrap_or_default();
    let request_id = Uuid::new_v4();
    let result = run_blocking(move || {
        let curve = Curve::parse(req.curve.as_deref())?;
        info!(%request_id, curve = curve.as_str(), "ecc key generation");
        Ok(key_pair(keys::generate_ec(curve, &*state.rng)?))
    })
    .await;
    respond(request_id, result)
}

/// `GET /health`: liveness check.
pub async fn health(State(state): State<AppState>) -> Response {
    let body = HealthResponse {
        status: "ok".into(),
        suites: state.registry.len(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

// ---------------------------------------------------------------------------
// Response plumbing
// ---------------------------------------------------------------------------

async fn run_blocking<T, F>(f: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(format!("blocking task failed: {e}")))?
}

fn respond<T: Serialize>(request_id: Uuid, result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => {
            match &err {
                ServiceError::Internal(detail) => {
                    warn!(%request_id, error = %detail, "request failed")
                }
                _ => warn!(%request_id, code = err.category().as_str(), "request rejected"),
            }
            error_response(&err)
        }
    }
}

fn error_response(err: &ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(err))).into_response()
}

fn rejected(rejection: JsonRejection) -> Response {
    let status = match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    let err = ErrorResponse::new(ErrorCategory::BadRequest.as_str(), rejection.body_text());
    (status, Json(err)).into_response()
}

/// Final path component of a caller-supplied filename.
fn base_name(filename: Option<&str>, fallback: &str) -> String {
    filename
        .and_then(|f| f.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(fallback)
        .to_owned()
}

fn key_pair(pair: KeyPairPem) -> KeyPairResponse {
    KeyPairResponse {
        private_key: pair.private_key.as_str().to_owned(),
        public_key: pair.public_key,
    }
}

// ---------------------------------------------------------------------------
// Blocking work
// ---------------------------------------------------------------------------

fn process_file(state: &AppState, req: FileRequest) -> Result<FileResponse, ServiceError> {
    let suite = state
        .registry
        .resolve(&req.algorithm, req.mode.as_deref())?;
    let key = params::file_key(&req, suite, &state.kdf_defaults)?;
    let mut ctx = CipherContext::new(suite, key, &*state.rng)
        .with_curve(Curve::parse(req.curve.as_deref())?);
    if req.operation == Operation::Encrypt {
        if let Some(iv) = params::explicit_iv(&req)? {
            ctx = ctx.with_iv(iv);
        }
    }
    let content = params::decode_base64("fileContent", &req.file_content)?;
    let name = base_name(req.filename.as_deref(), "file");

    match &req.partial {
        Some(partial) => partial_text(&ctx, req.operation, partial, content, &name),
        None => whole_file(&ctx, req.operation, &content, &name),
    }
}

fn whole_file(
    ctx: &CipherContext<'_>,
    op: Operation,
    content: &[u8],
    name: &str,
) -> Result<FileResponse, ServiceError> {
    let (data, encoding) = match op {
        Operation::Encrypt => (STANDARD.encode(ctx.encrypt(content)?), DataEncoding::Base64),
        Operation::Decrypt => match String::from_utf8(ctx.decrypt(content)?) {
            Ok(text) => (text, DataEncoding::Utf8),
            Err(e) => (STANDARD.encode(e.into_bytes()), DataEncoding::Base64),
        },
    };
    Ok(FileResponse {
        filename: format!("{}_{name}", op.past_tense()),
        data,
        encoding,
        message: SUCCESS.into(),
        tokens: None,
        failures: Vec::new(),
    })
}

fn partial_text(
    ctx: &CipherContext<'_>,
    op: Operation,
    req: &PartialRequest,
    content: Vec<u8>,
    name: &str,
) -> Result<FileResponse, ServiceError> {
    let text = String::from_utf8(content).map_err(|_| {
        ServiceError::operation(
            ErrorCategory::InvalidEncoding,
            "partial operations need a UTF-8 text document",
        )
    })?;

    let range = match (req.start, req.end) {
        (Some(start), Some(end)) => Some((start, end)),
        (None, None) => None,
        _ => {
            return Err(ServiceError::BadRequest(
                "start and end must be given together".into(),
            ))
        }
    };

    let (data, tokens, failures) = match (op, range) {
        (Operation::Encrypt, Some((start, end))) => (
            partial::encrypt_span(ctx, &text, start, end, req.selected_text.as_deref())?,
            1,
            Vec::new(),
        ),
        (Operation::Encrypt, None) => {
            let target = req.selected_text.as_deref().ok_or_else(|| {
                ServiceError::BadRequest(
                    "selected text or a character range is required for partial encryption"
                        .into(),
                )
            })?;
            let out = partial::encrypt_substring(ctx, &text, target, req.scope == Scope::All)?;
            (out.text, out.tokens, Vec::new())
        }
        (Operation::Decrypt, Some((start, end))) => {
            (partial::decrypt_span(ctx, &text, start, end)?, 1, Vec::new())
        }
        (Operation::Decrypt, None) => {
            let out = partial::decrypt_tokens(ctx, &text)?;
            (out.text, out.decrypted, out.failures)
        }
    };

    let message = if failures.is_empty() {
        SUCCESS.to_owned()
    } else {
        format!("{tokens} tokens decrypted, {} failed", failures.len())
    };
    Ok(FileResponse {
        filename: format!("partially_{}_{name}", op.past_tense()),
        data,
        encoding: DataEncoding::Utf8,
        message,
        tokens: Some(tokens),
        failures,
    })
}

fn process_regions(state: &AppState, req: ImageRequest) -> Result<ImageResponse, ServiceError> {
    let suite = state
        .registry
        .resolve_region(&req.algorithm, req.mode.as_deref())?;
    let regions = req.regions.into_regions()?;
    let inputs = RegionInputs::decode(&req.keys, &state.kdf_defaults)?;
    let cipher = RegionCipher::new(suite, inputs.params(req.nonce_policy))?;
    let image = params::decode_base64("imageContent", &req.image_content)?;
    let out = imaging::process_regions(&image, &regions, &cipher, req.operation)?;
    Ok(image_response(req.operation, out))
}

fn detect_and_decrypt(
    state: &AppState,
    req: AutoDecryptRequest,
) -> Result<ImageResponse, ServiceError> {
    let detect = DetectParams {
        block_size: req.block_size.unwrap_or(state.detect.block_size),
        threshold: req.threshold.unwrap_or(state.detect.threshold),
    };
    if detect.block_size == 0 {
        return Err(ServiceError::BadRequest("blockSize must be > 0".into()));
    }
    if !(detect.threshold.is_finite() && detect.threshold > 0.0) {
        return Err(ServiceError::BadRequest(
            "threshold must be a positive number".into(),
        ));
    }

    let suite = state
        .registry
        .resolve_region(&req.algorithm, req.mode.as_deref())?;
    let inputs = RegionInputs::decode(&req.keys, &state.kdf_defaults)?;
    // Detected regions carry no index, so only the restart policy can be undone.
    let cipher = RegionCipher::new(suite, inputs.params(NoncePolicy::Restart))?;
    let image = params::decode_base64("imageContent", &req.image_content)?;
    let out = imaging::auto_decrypt(&image, &detect, &cipher)?;
    Ok(image_response(Operation::Decrypt, out))
}

fn image_response(op: Operation, out: ProcessedImage) -> ImageResponse {
    ImageResponse {
        processed_image: STANDARD.encode(&out.bytes),
        filename: format!("{}_image.{}", op.past_tense(), raster::extension(out.format)),
        regions_processed: out.regions,
        message: SUCCESS.into(),
    }
}

fn digest(req: HashRequest) -> Result<HashResponse, ServiceError> {
    let algorithm = HashAlgorithm::parse(&req.algorithm)?;
    let content = params::decode_base64("fileContent", &req.file_content)?;
    Ok(HashResponse {
        filename: format!("hashed_{}", base_name(req.filename.as_deref(), "file")),
        algorithm: algorithm.as_str().into(),
        hash: algorithm.hex_digest(&content),
    })
}
