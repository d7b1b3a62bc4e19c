use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("not allowed to modify this {0}")]
    Forbidden(&'static str),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Conflict(String),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("could not build connection pool: {0}")]
    PoolBuild(#[from] deadpool_postgres::BuildError),

    #[error("query parameter `{0}` was never bound")]
    UnboundParam(String),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: &'static str,
        #[source]
        source: tokio_postgres::Error,
    },
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Error::NotFound { entity, id }
    }

    /// True for failures of the storage layer itself, as opposed to
    /// rejections of the request.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Postgres(_)
                | Error::Pool(_)
                | Error::PoolBuild(_)
                | Error::UnboundParam(_)
                | Error::Migration { .. }
        )
    }
}
