use crate::{
    error::{ConnectorError, pg_fetch_error},
    sql::postgres::{
        row::{column_meta, decode_rows},
        utils::{connect_client, count_query, paged_query},
    },
};
use async_trait::async_trait;
use cursor_core::{
    error::FetchError,
    fetcher::{BatchFetcher, FetchDirection, FetchRequest},
};
use model::records::{batch::Batch, column::ColumnMeta};
use tokio::sync::OnceCell;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info, warn};

/// Pages through an arbitrary Postgres query with `LIMIT`/`OFFSET`.
pub struct PgFetcher {
    client: Client,
    query: String,
    count_rows: bool,
    total: OnceCell<i64>,
}

impl PgFetcher {
    pub fn new(client: Client, query: impl Into<String>) -> Self {
        Self {
            client,
            query: query.into(),
            count_rows: false,
            total: OnceCell::new(),
        }
    }

    pub async fn connect(url: &str, query: impl Into<String>) -> Result<Self, ConnectorError> {
        let client = connect_client(url).await?;
        Ok(Self::new(client, query))
    }

    /// Run `count(*)` once so every batch carries the authoritative last row.
    pub fn with_row_count(mut self) -> Self {
        self.count_rows = true;
        self
    }

    pub async fn columns(&self) -> Result<Vec<ColumnMeta>, ConnectorError> {
        let statement = self.client.prepare(&paged_query(&self.query)).await?;
        Ok(column_meta(statement.columns()))
    }

    async fn total_rows(&self) -> Result<Option<i64>, FetchError> {
        if !self.count_rows {
            return Ok(None);
        }
        let total = self
            .total
            .get_or_try_init(|| async {
                let row = self
                    .client
                    .query_one(&count_query(&self.query), &[])
                    .await
                    .map_err(|e| pg_fetch_error(&e))?;
                let total: i64 = row.try_get(0).map_err(|e| pg_fetch_error(&e))?;
                info!(total, "Counted result rows.");
                Ok::<i64, FetchError>(total)
            })
            .await?;
        Ok(Some(*total))
    }
}

#[async_trait]
impl BatchFetcher for PgFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<Batch, FetchError> {
        let begin = request.lowest_row();
        let limit = match request.direction {
            FetchDirection::Forward => request.fetch_size as i64,
            FetchDirection::Backward => request.begin_row - begin + 1,
        };
        if limit <= 0 {
            return Ok(Batch::empty());
        }

        let offset = begin - 1;
        let rows = self
            .client
            .query(&paged_query(&self.query), &[&limit, &offset])
            .await
            .map_err(|e| pg_fetch_error(&e))?;
        let fetched = rows.len() as i64;
        debug!(
            begin_row = begin,
            direction = %request.direction,
            rows = fetched,
            "Fetched block."
        );

        let total = self.total_rows().await?;
        let (begin_row, end_row) = match fetched {
            0 => (0, 0),
            n => (begin, begin + n - 1),
        };
        let is_last = fetched > 0
            && ((request.direction == FetchDirection::Forward && fetched < limit)
                || total == Some(end_row));
        Batch::from_parts(decode_rows(&rows), begin_row, end_row, is_last, total)
            .map_err(|e| FetchError::protocol(e.to_string()))
    }

    async fn cancel(&self) {
        let token = self.client.cancel_token();
        if let Err(err) = token.cancel_query(NoTls).await {
            warn!(%err, "Failed to cancel Postgres query");
        }
    }
}
