//! The HTTP transport (spec §4.10/§6): a single-method POST endpoint and a
//! batch-framed POST endpoint, both bounded by [`SafeParseLimits`] before
//! the body ever reaches [`RpcContext::dispatch`]. Grounded on
//! `near-jsonrpc`'s `actix-web`/`actix-cors` stack (the teacher's own
//! choice for this exact concern).

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use edgegraph_rpc::{parse_safe, run_batch, BatchFrame, RpcContext, RpcError, RpcErrorCode, SafeParseLimits};
use tracing::{info, warn};

#[derive(serde::Deserialize)]
struct SingleRequest {
    method: String,
    #[serde(default)]
    args: serde_json::Value,
}

async fn rpc_single(ctx: web::Data<Arc<RpcContext>>, limits: web::Data<SafeParseLimits>, body: web::Bytes) -> HttpResponse {
    let parsed: SingleRequest = match parse_safe(&body, &limits).and_then(|v| {
        serde_json::from_value(v).map_err(|e| edgegraph_rpc::SafeParseError::ParseError(e.to_string()))
    }) {
        Ok(req) => req,
        Err(e) => return error_response(RpcError::from(e)),
    };

    match ctx.dispatch(&parsed.method, parsed.args).await {
        Ok(result) => HttpResponse::Ok().json(serde_json::json!({ "result": result })),
        Err(e) => error_response(e),
    }
}

async fn rpc_batch(ctx: web::Data<Arc<RpcContext>>, limits: web::Data<SafeParseLimits>, body: web::Bytes) -> HttpResponse {
    let frame: BatchFrame = match parse_safe(&body, &limits)
        .and_then(|v| serde_json::from_value(v).map_err(|e| edgegraph_rpc::SafeParseError::ParseError(e.to_string())))
    {
        Ok(frame) => frame,
        Err(e) => return error_response(RpcError::from(e)),
    };

    let ctx = ctx.get_ref().clone();
    let response = run_batch(frame, move |method, args| {
        let ctx = ctx.clone();
        async move { ctx.dispatch(&method, args).await }
    })
    .await;
    HttpResponse::Ok().json(response)
}

async fn metrics() -> HttpResponse {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = edgegraph_o11y::REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok().content_type(encoder.format_type()).body(buffer)
}

fn error_response(err: RpcError) -> HttpResponse {
    let status = match err.code {
        RpcErrorCode::NotFound => actix_web::http::StatusCode::NOT_FOUND,
        RpcErrorCode::Unauthorized => actix_web::http::StatusCode::UNAUTHORIZED,
        RpcErrorCode::Forbidden => actix_web::http::StatusCode::FORBIDDEN,
        RpcErrorCode::Timeout => actix_web::http::StatusCode::REQUEST_TIMEOUT,
        RpcErrorCode::Conflict => actix_web::http::StatusCode::CONFLICT,
        RpcErrorCode::MethodNotAllowed => actix_web::http::StatusCode::METHOD_NOT_ALLOWED,
        RpcErrorCode::NotImplemented => actix_web::http::StatusCode::NOT_IMPLEMENTED,
        RpcErrorCode::InternalError => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
        _ => actix_web::http::StatusCode::BAD_REQUEST,
    };
    HttpResponse::build(status).json(err.to_http_envelope())
}

pub async fn serve(addr: &str, rpc: Arc<RpcContext>, limits: SafeParseLimits) -> std::io::Result<()> {
    info!(addr, "starting HTTP RPC listener");
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(rpc.clone()))
            .app_data(web::Data::new(limits))
            .app_data(web::PayloadConfig::new(limits.max_size))
            .route("/rpc", web::post().to(rpc_single))
            .route("/rpc/batch", web::post().to(rpc_batch))
            .route("/metrics", web::get().to(metrics))
    })
    .bind(addr)
    .inspect_err(|e| warn!(addr, error = %e, "failed to bind HTTP listener"))?
    .run()
    .await
}
