//! Fan one query out to several endpoints and merge the answers.
//!
//! Failures of individual remote endpoints are logged and skipped: a
//! statistics page should not go blank because one federation member is
//! down.

use std::time::Duration;

use tracing::warn;
use triplify_common::Result;

use crate::client::{Row, SparqlClient, StoreEndpoint};
use crate::endpoints::RegisteredEndpoint;

const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct MultiQuery<'a> {
    local: &'a SparqlClient,
}

impl<'a> MultiQuery<'a> {
    pub fn new(local: &'a SparqlClient) -> Self {
        Self { local }
    }

    /// Run `query` against the local store and every given endpoint,
    /// concatenating rows. The local store is authoritative: its failure
    /// is an error, a remote failure is a warning.
    pub async fn select(
        &self,
        query: &str,
        endpoints: &[RegisteredEndpoint],
    ) -> Result<Vec<Row>> {
        let mut rows = self.local.select(query).await?;

        for endpoint in endpoints.iter().filter(|e| e.enabled) {
            let client = match SparqlClient::new(StoreEndpoint::public(&endpoint.url), REMOTE_TIMEOUT)
            {
                Ok(c) => c,
                Err(e) => {
                    warn!(endpoint = %endpoint.url, error = %e, "skipping endpoint");
                    continue;
                }
            };
            match client.select(query).await {
                Ok(mut remote_rows) => rows.append(&mut remote_rows),
                Err(e) => warn!(endpoint = %endpoint.url, error = %e, "endpoint query failed"),
            }
        }

        Ok(rows)
    }
}
