//! Query logging around tokio-postgres clients.
//!
//! Every statement runs inside a `db.query` or `db.execute` debug span that
//! carries the SQL, the parameter count and, once it finishes, the number of
//! rows returned or affected.

use recipebox_sql::{Render, render};
use tokio_postgres::types::ToSql;
use tokio_postgres::{GenericClient, Row};
use tracing::{Instrument, Span};

use crate::{Params, Result, SqlParam};

type PgParams<'p> = [&'p (dyn ToSql + Sync)];

fn query_span(sql: &str, params: usize) -> Span {
    tracing::debug_span!(
        "db.query",
        sql = %sql,
        params,
        rows = tracing::field::Empty,
    )
}

/// A borrowed client whose statements are logged.
///
/// ```ignore
/// let conn = pool.get().await?;
/// let rows = conn.traced().fetch(&stmt, &params).await?;
/// ```
pub struct TracedConn<'c, C: ?Sized> {
    client: &'c C,
}

impl<'c, C> TracedConn<'c, C>
where
    C: GenericClient + Sync + ?Sized,
{
    pub fn new(client: &'c C) -> Self {
        Self { client }
    }

    pub async fn execute(&self, sql: &str, params: &PgParams<'_>) -> Result<u64> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            params = params.len(),
            affected = tracing::field::Empty,
        );
        let affected = self
            .client
            .execute(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("affected", affected);
        Ok(affected)
    }

    pub async fn query(&self, sql: &str, params: &PgParams<'_>) -> Result<Vec<Row>> {
        let span = query_span(sql, params.len());
        let rows = self.client.query(sql, params).instrument(span.clone()).await?;
        span.record("rows", rows.len());
        Ok(rows)
    }

    /// Zero or one row; more than one is an error.
    pub async fn query_opt(&self, sql: &str, params: &PgParams<'_>) -> Result<Option<Row>> {
        let span = query_span(sql, params.len());
        let row = self
            .client
            .query_opt(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", usize::from(row.is_some()));
        Ok(row)
    }

    /// Exactly one row.
    pub async fn query_one(&self, sql: &str, params: &PgParams<'_>) -> Result<Row> {
        let span = query_span(sql, params.len());
        let row = self.client.query_one(sql, params).instrument(span.clone()).await?;
        span.record("rows", 1);
        Ok(row)
    }

    /// Render `stmt` and return all of its rows.
    pub async fn fetch(&self, stmt: &impl Render, params: &Params) -> Result<Vec<Row>> {
        let rendered = render(stmt);
        let bound = params.bind(&rendered.params)?;
        self.query(&rendered.sql, &pg_params(&bound)).await
    }

    pub async fn fetch_opt(&self, stmt: &impl Render, params: &Params) -> Result<Option<Row>> {
        let rendered = render(stmt);
        let bound = params.bind(&rendered.params)?;
        self.query_opt(&rendered.sql, &pg_params(&bound)).await
    }

    pub async fn fetch_one(&self, stmt: &impl Render, params: &Params) -> Result<Row> {
        let rendered = render(stmt);
        let bound = params.bind(&rendered.params)?;
        self.query_one(&rendered.sql, &pg_params(&bound)).await
    }

    /// Render and execute `stmt`, returning the affected row count.
    pub async fn run(&self, stmt: &impl Render, params: &Params) -> Result<u64> {
        let rendered = render(stmt);
        let bound = params.bind(&rendered.params)?;
        self.execute(&rendered.sql, &pg_params(&bound)).await
    }
}

fn pg_params<'a>(bound: &'a [SqlParam<'a>]) -> Vec<&'a (dyn ToSql + Sync)> {
    bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

/// Anything that can hand out a [`TracedConn`]: plain clients, pooled
/// connections and transactions.
pub trait ConnectionExt {
    type Client: GenericClient + Sync + ?Sized;

    fn pg_client(&self) -> &Self::Client;

    fn traced(&self) -> TracedConn<'_, Self::Client> {
        TracedConn::new(self.pg_client())
    }
}

impl ConnectionExt for tokio_postgres::Client {
    type Client = Self;

    fn pg_client(&self) -> &Self {
        self
    }
}

impl ConnectionExt for deadpool_postgres::Object {
    type Client = tokio_postgres::Client;

    fn pg_client(&self) -> &tokio_postgres::Client {
        self
    }
}

impl<'t> ConnectionExt for deadpool_postgres::Transaction<'t> {
    type Client = tokio_postgres::Transaction<'t>;

    fn pg_client(&self) -> &tokio_postgres::Transaction<'t> {
        self
    }
}
