//! HTTP client for the remote accounting API.
//!
//! This is the default implementation of
//! [`RemoteLedgerRepository`](crate::ledger::sync::remote::RemoteLedgerRepository):
//! a thin REST/JSON binding with no sync logic of its own. Transport-level
//! failures (connect, timeout) and gateway unavailability map onto
//! [`RemoteError::Offline`], which the orchestrator absorbs; every other
//! non-success status surfaces as an API error.

use crate::client::types::{AccountingDto, ApiErrorBody, NewEntryBody, PostingLineDto};
use crate::ledger::document::{
    Account, AccountGroup, AddressAccount, BudgetAccount, BudgetAccountGroup, PostingLine,
};
use crate::ledger::sync::remote::{NewEntry, RemoteAccounting, RemoteError, RemoteLedgerRepository};
use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the remote accounting service.
#[derive(Clone)]
pub struct HttpLedgerClient {
    http_client: Client,
    base_url: String,
}

impl HttpLedgerClient {
    /// Create a new client for the given base URL
    /// (e.g. `https://accounting.example.com`).
    pub fn new(base_url: &str) -> Self {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn transport_error(error: reqwest::Error) -> RemoteError {
        if error.is_connect() || error.is_timeout() || error.is_request() {
            RemoteError::Offline
        } else {
            RemoteError::Payload(error.to_string())
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: String,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let mut request = self.http_client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await.map_err(Self::transport_error)?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        let status = response.status();
        let body = response.text().await.map_err(Self::transport_error)?;

        if !status.is_success() {
            return Err(Self::status_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|error| RemoteError::Payload(format!("{} in `{}`", error, body)))
    }

    fn status_error(status: u16, body: &str) -> RemoteError {
        // The service being down or unreachable through a gateway counts as
        // offline; everything else is a real API failure.
        if matches!(status, 502 | 503 | 504) {
            return RemoteError::Offline;
        }

        let message = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|error| error.message.or(error.code))
            .unwrap_or_else(|| body.to_string());
        RemoteError::Api { status, message }
    }

    fn status_date_query(status_date: NaiveDate) -> (&'static str, String) {
        ("statusDate", status_date.format("%Y-%m-%d").to_string())
    }
}

#[async_trait::async_trait]
impl RemoteLedgerRepository for HttpLedgerClient {
    async fn get_account_groups(&self) -> Result<Vec<AccountGroup>, RemoteError> {
        self.get_json("/api/accountgroups".to_string(), &[]).await
    }

    async fn get_budget_account_groups(&self) -> Result<Vec<BudgetAccountGroup>, RemoteError> {
        self.get_json("/api/budgetaccountgroups".to_string(), &[])
            .await
    }

    async fn get_accountings(&self) -> Result<Vec<RemoteAccounting>, RemoteError> {
        let accountings: Vec<AccountingDto> =
            self.get_json("/api/accountings".to_string(), &[]).await?;
        Ok(accountings.into_iter().map(RemoteAccounting::from).collect())
    }

    async fn get_account_plan(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
    ) -> Result<Vec<Account>, RemoteError> {
        self.get_json(
            format!("/api/accountings/{}/accounts", accounting_no),
            &[Self::status_date_query(status_date)],
        )
        .await
    }

    async fn get_budget_account_plan(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
    ) -> Result<Vec<BudgetAccount>, RemoteError> {
        self.get_json(
            format!("/api/accountings/{}/budgetaccounts", accounting_no),
            &[Self::status_date_query(status_date)],
        )
        .await
    }

    async fn get_address_accounts(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
    ) -> Result<Vec<AddressAccount>, RemoteError> {
        self.get_json(
            format!("/api/accountings/{}/addressaccounts", accounting_no),
            &[Self::status_date_query(status_date)],
        )
        .await
    }

    async fn get_posting_lines(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
        limit: u32,
    ) -> Result<Vec<PostingLine>, RemoteError> {
        let lines: Vec<PostingLineDto> = self
            .get_json(
                format!("/api/accountings/{}/postinglines", accounting_no),
                &[
                    Self::status_date_query(status_date),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(lines.into_iter().map(PostingLine::from).collect())
    }

    async fn post_entry(&self, accounting_no: i32, entry: NewEntry) -> Result<(), RemoteError> {
        let url = format!("{}/api/accountings/{}/postinglines", self.base_url, accounting_no);
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&NewEntryBody::from(entry))
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.map_err(Self::transport_error)?;
        Err(Self::status_error(status.as_u16(), &body))
    }
}
