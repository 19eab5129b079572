use axum::{
    Json, Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::handlers;
use super::{ApiError, AppState};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "IPAM",
        version = "0.1.0",
        description = "REST API for the IPv4 address pool: subnets, reservations, assignments and lease history."
    ),
    tags(
        (name = "system", description = "System information"),
        (name = "addresses", description = "Address listing, assignment and release"),
        (name = "reservations", description = "MAC to address reservations"),
        (name = "history", description = "Transition history"),
        (name = "subnets", description = "Subnet creation and usage")
    ),
    paths(
        handlers::get_version,
        handlers::list_ips,
        handlers::assign_ip,
        handlers::free_ip,
        handlers::get_stats,
        handlers::list_reservations,
        handlers::create_reservation,
        handlers::list_history,
        handlers::list_subnets,
        handlers::create_subnet,
    ),
    components(schemas(
        handlers::VersionInfo,
        handlers::Address,
        handlers::AssignIpRequest,
        handlers::AssignIpResponse,
        handlers::CreateReservationRequest,
        handlers::Reservation,
        handlers::FreeIpRequest,
        handlers::FreeIpResponse,
        handlers::History,
        handlers::Stats,
        handlers::Subnet,
        handlers::CreateSubnetRequest,
        handlers::CreateSubnetResponse,
        ApiError,
    ))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let dhcp_routes = Router::new()
        // Addresses
        .route("/ips", get(handlers::list_ips))
        .route("/assign-ip", post(handlers::assign_ip))
        .route("/free", post(handlers::free_ip))
        .route("/stats", get(handlers::get_stats))
        // Reservations
        .route(
            "/reservations",
            get(handlers::list_reservations).post(handlers::create_reservation),
        )
        // History
        .route("/history", get(handlers::list_history))
        // Subnets
        .route(
            "/subnets",
            get(handlers::list_subnets).post(handlers::create_subnet),
        );

    Router::new()
        .route("/api/version", get(handlers::get_version))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/dhcp", dhcp_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
