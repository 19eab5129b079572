use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::engine::CreateSubnetRequest as EngineCreateSubnetRequest;
use crate::model::{AddressFilter, AddressView, HistoryEntry, PoolStats, ReservationEntry};

use super::{ApiError, AppState};

// =============================================================================
// Types
// =============================================================================

/// Version information
#[derive(Serialize, ToSchema)]
pub struct VersionInfo {
    pub version: String,
}

/// Address with its subnet and current owner
#[derive(Serialize, ToSchema)]
pub struct Address {
    pub ip: String,
    pub subnet_id: String,
    pub cidr: String,
    pub description: String,
    /// One of "free", "reserved", "assigned"
    pub status: String,
    /// Owner MAC, "N/A" when unknown
    pub mac: String,
    pub device_name: String,
    pub last_assigned: Option<String>,
    pub reserved: bool,
}

impl From<AddressView> for Address {
    fn from(view: AddressView) -> Self {
        Self {
            ip: view.ip.to_string(),
            subnet_id: view.subnet_id,
            cidr: view.cidr,
            description: view.description,
            status: view.status.to_string(),
            mac: view.mac,
            device_name: view.device_label,
            last_assigned: view.last_assigned,
            reserved: view.reserved,
        }
    }
}

/// Address listing filters
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAddressesQuery {
    /// Only addresses in this status
    pub status: Option<String>,
    /// Only addresses of this subnet (CIDR)
    pub cidr: Option<String>,
}

/// Request an address for a device
#[derive(Deserialize, ToSchema)]
pub struct AssignIpRequest {
    #[serde(default)]
    pub mac: String,
    pub device_name: Option<String>,
}

/// Address handed out to a device
#[derive(Serialize, ToSchema)]
pub struct AssignIpResponse {
    pub ip: String,
    /// False when the device already held this address
    pub changed: bool,
}

/// Pin an address to a MAC
#[derive(Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub ip: String,
    pub device_name: Option<String>,
}

/// Reservation resource
#[derive(Serialize, ToSchema)]
pub struct Reservation {
    pub mac: String,
    pub ip: String,
    pub device_name: String,
    pub created_at: String,
}

impl From<ReservationEntry> for Reservation {
    fn from(entry: ReservationEntry) -> Self {
        Self {
            mac: entry.mac,
            ip: entry.ip.to_string(),
            device_name: entry.device_label,
            created_at: entry.created_at,
        }
    }
}

/// Release an address
#[derive(Deserialize, ToSchema)]
pub struct FreeIpRequest {
    #[serde(default)]
    pub ip: String,
}

#[derive(Serialize, ToSchema)]
pub struct FreeIpResponse {
    pub ip: String,
    pub message: String,
}

/// History filters
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Only entries for this address
    pub ip: Option<String>,
}

/// History log entry
#[derive(Serialize, ToSchema)]
pub struct History {
    pub id: i64,
    pub ip: String,
    pub mac: String,
    pub device_name: String,
    /// One of "reserved", "assigned", "released"
    pub action: String,
    pub timestamp: String,
}

impl From<HistoryEntry> for History {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.id,
            ip: entry.ip.to_string(),
            mac: entry.mac,
            device_name: entry.device_label,
            action: entry.action.to_string(),
            timestamp: entry.timestamp,
        }
    }
}

/// Address counts per status
#[derive(Serialize, ToSchema)]
pub struct Stats {
    pub total: u64,
    pub free: u64,
    pub reserved: u64,
    pub assigned: u64,
}

impl From<PoolStats> for Stats {
    fn from(stats: PoolStats) -> Self {
        Self {
            total: stats.total,
            free: stats.free,
            reserved: stats.reserved,
            assigned: stats.assigned,
        }
    }
}

/// Subnet resource
#[derive(Serialize, ToSchema)]
pub struct Subnet {
    pub id: String,
    pub cidr: String,
    pub description: String,
    /// Lowest address in the pool, null when empty
    pub start_ip: Option<String>,
    /// Highest address in the pool, null when empty
    pub end_ip: Option<String>,
    pub stats: Stats,
}

/// Create a subnet
#[derive(Deserialize, ToSchema)]
pub struct CreateSubnetRequest {
    /// IPv4 prefix, e.g. "192.168.1.0/24"
    #[serde(default)]
    pub cidr: String,
    pub description: Option<String>,
    /// First address to materialise (default: network + 1)
    pub start_ip: Option<String>,
    /// Last address to materialise (default: broadcast - 1)
    pub end_ip: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CreateSubnetResponse {
    pub id: String,
    pub cidr: String,
    pub description: String,
    pub start_ip: Option<String>,
    pub end_ip: Option<String>,
    pub address_count: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// Get service version
#[utoipa::path(
    get,
    path = "/api/version",
    responses(
        (status = 200, description = "Service version", body = VersionInfo)
    ),
    tag = "system"
)]
pub async fn get_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List addresses
#[utoipa::path(
    get,
    path = "/api/dhcp/ips",
    params(ListAddressesQuery),
    responses(
        (status = 200, description = "Addresses by numeric value", body = [Address]),
        (status = 400, description = "Invalid filter", body = ApiError)
    ),
    tag = "addresses"
)]
pub async fn list_ips(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAddressesQuery>,
) -> Result<Json<Vec<Address>>, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(
            s.parse()
                .map_err(|_| ApiError::bad_request(format!("Invalid status: {}", s)))?,
        ),
        _ => None,
    };
    let filter = AddressFilter {
        status,
        cidr: query.cidr,
    };

    let views = state.engine.list_addresses(&filter).await?;
    Ok(Json(views.into_iter().map(Address::from).collect()))
}

/// Assign an address to a device
#[utoipa::path(
    post,
    path = "/api/dhcp/assign-ip",
    request_body = AssignIpRequest,
    responses(
        (status = 200, description = "Address assigned", body = AssignIpResponse),
        (status = 400, description = "Invalid MAC", body = ApiError),
        (status = 503, description = "No free address left", body = ApiError)
    ),
    tag = "addresses"
)]
pub async fn assign_ip(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssignIpRequest>,
) -> Result<Json<AssignIpResponse>, ApiError> {
    let assignment = state
        .engine
        .assign_ip(&req.mac, req.device_name.as_deref())
        .await?;
    Ok(Json(AssignIpResponse {
        ip: assignment.ip.to_string(),
        changed: assignment.changed,
    }))
}

/// Release an address
#[utoipa::path(
    post,
    path = "/api/dhcp/free",
    request_body = FreeIpRequest,
    responses(
        (status = 200, description = "Address released", body = FreeIpResponse),
        (status = 404, description = "Unknown address", body = ApiError),
        (status = 409, description = "Address already free", body = ApiError)
    ),
    tag = "addresses"
)]
pub async fn free_ip(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FreeIpRequest>,
) -> Result<Json<FreeIpResponse>, ApiError> {
    let entry = state.engine.free(&req.ip).await?;
    Ok(Json(FreeIpResponse {
        ip: entry.ip.to_string(),
        message: "Address released".to_string(),
    }))
}

/// Pool usage
#[utoipa::path(
    get,
    path = "/api/dhcp/stats",
    responses(
        (status = 200, description = "Address counts", body = Stats)
    ),
    tag = "addresses"
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<Stats>, ApiError> {
    Ok(Json(state.engine.stats().await?.into()))
}

/// List reservations
#[utoipa::path(
    get,
    path = "/api/dhcp/reservations",
    responses(
        (status = 200, description = "Live reservations", body = [Reservation])
    ),
    tag = "reservations"
)]
pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let entries = state.engine.list_reservations().await?;
    Ok(Json(entries.into_iter().map(Reservation::from).collect()))
}

/// Reserve an address for a MAC
#[utoipa::path(
    post,
    path = "/api/dhcp/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 400, description = "Invalid MAC or address", body = ApiError),
        (status = 409, description = "Address not free or MAC already reserved", body = ApiError)
    ),
    tag = "reservations"
)]
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let entry = state
        .engine
        .reserve(&req.mac, &req.ip, req.device_name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// Transition history, newest first
#[utoipa::path(
    get,
    path = "/api/dhcp/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "History entries", body = [History]),
        (status = 400, description = "Invalid address", body = ApiError)
    ),
    tag = "history"
)]
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<History>>, ApiError> {
    let entries = state.engine.list_history(query.ip.as_deref()).await?;
    Ok(Json(entries.into_iter().map(History::from).collect()))
}

/// List subnets
#[utoipa::path(
    get,
    path = "/api/dhcp/subnets",
    responses(
        (status = 200, description = "Subnets with usage", body = [Subnet])
    ),
    tag = "subnets"
)]
pub async fn list_subnets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Subnet>>, ApiError> {
    let summaries = state.engine.list_subnets().await?;
    Ok(Json(
        summaries
            .into_iter()
            .map(|s| Subnet {
                id: s.id,
                cidr: s.cidr,
                description: s.description,
                start_ip: s.start_ip.map(|ip| ip.to_string()),
                end_ip: s.end_ip.map(|ip| ip.to_string()),
                stats: s.stats.into(),
            })
            .collect(),
    ))
}

/// Create a subnet and its free addresses
#[utoipa::path(
    post,
    path = "/api/dhcp/subnets",
    request_body = CreateSubnetRequest,
    responses(
        (status = 201, description = "Subnet created", body = CreateSubnetResponse),
        (status = 400, description = "Invalid CIDR or bounds", body = ApiError),
        (status = 409, description = "Overlaps an existing subnet", body = ApiError)
    ),
    tag = "subnets"
)]
pub async fn create_subnet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSubnetRequest>,
) -> Result<(StatusCode, Json<CreateSubnetResponse>), ApiError> {
    let created = state
        .engine
        .create_subnet(&EngineCreateSubnetRequest {
            cidr: req.cidr,
            description: req.description.unwrap_or_default(),
            start_ip: req.start_ip,
            end_ip: req.end_ip,
        })
        .await?;

    let subnet = created.subnet;
    Ok((
        StatusCode::CREATED,
        Json(CreateSubnetResponse {
            id: subnet.id,
            cidr: subnet.cidr,
            description: subnet.description,
            start_ip: subnet.start_ip,
            end_ip: subnet.end_ip,
            address_count: created.address_count,
        }),
    ))
}
