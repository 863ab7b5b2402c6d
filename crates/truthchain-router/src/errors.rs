use thiserror::Error;

/// Routing-layer errors (`spec.md` §7).
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("message rejected as a duplicate")]
    Duplicate,

    #[error("source {0} exceeded the per-minute message rate limit")]
    RateLimited(String),

    #[error("message ttl exhausted, not forwarded")]
    TtlExhausted,

    #[error("mesh transport error: {0}")]
    Mesh(#[from] truthchain_mesh::MeshError),
}
