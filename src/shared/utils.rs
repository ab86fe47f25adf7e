use axum::http::HeaderMap;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use diesel::PgConnection;
use uuid::Uuid;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(database_url: &str) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().max_size(10).build(manager)
}

/// Tenant scoping comes from the gateway as a header; auth itself lives
/// upstream of this service.
pub const TENANT_HEADER: &str = "x-tenant-id";

pub fn tenant_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
}
