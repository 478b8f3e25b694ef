use crate::config::{normalize_base_url, Config, DEFAULT_BASE_URL};
use crate::errors::{ProsperError, Result};
use crate::models::{Listing, Note, Page, Payment, TokenResponse};
use futures::future;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use futures::TryFutureExt;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Largest page the list endpoints will serve.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Largest number of loan numbers the payments endpoint accepts per request.
pub const MAX_LOANS_PER_PAYMENT_REQUEST: usize = 25;

const TOKEN_PATH: &str = "security/oauth/token";
const ACCOUNT_PATH: &str = "accounts/prosper/";
const NOTES_PATH: &str = "notes/";
const LISTINGS_PATH: &str = "listingsvc/v2/listings";
const PAYMENTS_PATH: &str = "loans/payments/";

const CREDIT_BUREAU_VALUES: &str = "experian,transunion";

type QueryParams = Vec<(&'static str, String)>;

/// Client for the Prosper investor API.
///
/// Docs: <https://developers.prosper.com/docs/investor/>
///
/// List endpoints are exposed as lazy streams. Each call starts a fresh
/// iteration from offset 0 and pages are fetched one at a time, only when the
/// previous page has been consumed.
#[derive(Clone)]
pub struct ProsperClient {
    client: reqwest::Client,
    base_address: String,
    token: Option<String>,
}

impl Default for ProsperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProsperClient {
    /// Creates an unauthenticated client against the production API.
    pub fn new() -> Self {
        Self::with_base_address(DEFAULT_BASE_URL)
    }

    /// Creates an unauthenticated client against `base_address`.
    pub fn with_base_address(base_address: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_address: normalize_base_url(base_address.into()),
            token: None,
        }
    }

    /// Creates an unauthenticated client with a transport-level timeout.
    pub fn with_timeout(base_address: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_address: normalize_base_url(base_address.into()),
            token: None,
        })
    }

    /// Initializes a client via the password auth flow.
    pub async fn by_username_password(
        client_id: &str,
        client_secret: &str,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let mut client = Self::new();
        client
            .authenticate(client_id, client_secret, username, password)
            .await?;
        Ok(client)
    }

    /// Builds and authenticates a client from configuration.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut client = Self::with_timeout(config.base_url.clone(), config.timeout())?;
        client
            .authenticate(
                &config.client_id,
                &config.client_secret,
                &config.username,
                &config.password,
            )
            .await?;
        Ok(client)
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Acquires an OAuth2 access token via the password grant.
    ///
    /// On failure the previously held token, if any, is left in place.
    pub async fn authenticate(
        &mut self,
        client_id: &str,
        client_secret: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let url = format!("{}{}", self.base_address, TOKEN_PATH);
        tracing::info!("Requesting Prosper access token for client {}", client_id);

        let form = [
            ("grant_type", "password"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("username", username),
            ("password", password),
        ];

        let response = self.client.post(&url).form(&form).send().await?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("Prosper token request rejected with {}", status);
            return Err(ProsperError::AuthenticationFailed { status, body });
        }

        let auth: TokenResponse = response.json().await?;
        self.token = Some(auth.access_token);

        tracing::info!("✓ Prosper access token acquired");
        Ok(())
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(ProsperError::NotAuthenticated)
    }

    /// Performs an authenticated GET of `path` relative to the base address.
    ///
    /// Fails with [`ProsperError::NotAuthenticated`] before touching the
    /// network if no token has been acquired.
    pub async fn get_authenticated<T>(&self, path: &str, params: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let token = self.token()?;
        let url = format!("{}{}", self.base_address, path);
        tracing::debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .header(AUTHORIZATION, format!("bearer {}", token))
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Returns a summary of the account.
    pub async fn account(&self) -> Result<Value> {
        self.get_authenticated(ACCOUNT_PATH, &[]).await
    }

    /// Streams every note held by the account.
    pub fn notes(&self) -> impl Stream<Item = Result<Note>> + '_ {
        self.paginate(NOTES_PATH, Vec::new())
    }

    /// Streams loan listings.
    ///
    /// Listings already invested in are only reachable with
    /// `include_only_invested = Some(true)` and `include_only_biddable = false`,
    /// and even then charged-off or sold loans are not returned.
    pub fn listings(
        &self,
        include_only_biddable: bool,
        include_only_invested: Option<bool>,
    ) -> impl Stream<Item = Result<Listing>> + '_ {
        self.fetch_listings(include_only_biddable, include_only_invested, false)
    }

    /// Streams the listings currently open for investment.
    pub fn biddable_listings(&self) -> impl Stream<Item = Result<Listing>> + '_ {
        self.listings(true, None)
    }

    pub(crate) fn fetch_listings(
        &self,
        include_only_biddable: bool,
        include_only_invested: Option<bool>,
        include_credit_bureau_data: bool,
    ) -> impl Stream<Item = Result<Listing>> + '_ {
        let mut params: QueryParams = vec![("biddable", include_only_biddable.to_string())];
        if let Some(invested) = include_only_invested {
            params.push(("invested", invested.to_string()));
        }
        if include_credit_bureau_data {
            params.push((
                "include_credit_bureau_values",
                CREDIT_BUREAU_VALUES.to_string(),
            ));
        }
        self.paginate(LISTINGS_PATH, params)
    }

    /// Streams payments from the last 90 days for every note in the account.
    ///
    /// All notes are enumerated before the first payment request is made.
    pub fn payments(&self) -> impl Stream<Item = Result<Payment>> + '_ {
        self.notes()
            .map_ok(|note| note.loan_number)
            .try_collect::<Vec<u64>>()
            .map_ok(move |loan_numbers| {
                tracing::info!("Fetching payments for {} loans", loan_numbers.len());
                self.payments_by_loan_number(loan_numbers)
            })
            .try_flatten_stream()
    }

    /// Streams payments for the given loans, 25 loans per request.
    ///
    /// Records come out chunk by chunk in the order of `loan_numbers`.
    pub fn payments_by_loan_number(
        &self,
        loan_numbers: Vec<u64>,
    ) -> impl Stream<Item = Result<Payment>> + '_ {
        let chunks = chunk_loan_numbers(&loan_numbers);
        tracing::debug!(
            "Split {} loan numbers into {} payment requests",
            loan_numbers.len(),
            chunks.len()
        );

        stream::iter(chunks)
            .map(move |chunk| match self.payments_for_loan_chunk(&chunk) {
                Ok(payments) => payments.left_stream(),
                Err(e) => {
                    stream::once(future::ready(Err::<Payment, ProsperError>(e))).right_stream()
                }
            })
            .flatten()
    }

    /// Streams payments for a single request's worth of loans.
    ///
    /// The endpoint rejects more than 25 loan numbers, so a larger chunk is a
    /// caller bug and fails immediately. So does an empty chunk.
    pub fn payments_for_loan_chunk(
        &self,
        loan_numbers: &[u64],
    ) -> Result<impl Stream<Item = Result<Payment>> + '_> {
        if loan_numbers.is_empty() {
            return Err(ProsperError::InvalidArgument(
                "Requests for payments need at least one loan number".to_string(),
            ));
        }
        if loan_numbers.len() > MAX_LOANS_PER_PAYMENT_REQUEST {
            return Err(ProsperError::InvalidArgument(format!(
                "Requests for payments must be chunked into {} loans or less, got {}",
                MAX_LOANS_PER_PAYMENT_REQUEST,
                loan_numbers.len()
            )));
        }

        let joined = loan_numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(",");

        Ok(self.paginate(PAYMENTS_PATH, vec![("loan_number", joined)]))
    }

    /// Walks an offset/limit paginated endpoint, yielding one record at a time.
    ///
    /// `offset` advances by each page's `result_count`; iteration ends once it
    /// reaches `total_count` or a page comes back empty.
    fn paginate<T>(
        &self,
        path: &'static str,
        params: QueryParams,
    ) -> impl Stream<Item = Result<T>> + '_
    where
        T: DeserializeOwned + 'static,
    {
        stream::try_unfold(PageCursor::default(), move |cursor| {
            let mut query = params.clone();
            async move {
                if cursor.exhausted {
                    return Ok::<_, ProsperError>(None);
                }

                query.push(("limit", MAX_PAGE_SIZE.to_string()));
                query.push(("offset", cursor.offset.to_string()));

                let page: Page<T> = self.get_authenticated(path, &query).await?;
                let next = cursor.advance(&page);
                tracing::debug!(
                    "{}: received {} of {} records (offset now {})",
                    path,
                    page.result_count,
                    page.total_count,
                    next.offset
                );

                Ok::<_, ProsperError>(Some((page.result, next)))
            }
        })
        .map_ok(|records: Vec<T>| stream::iter(records.into_iter().map(Ok::<T, ProsperError>)))
        .try_flatten()
    }
}

/// Position of a pagination walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PageCursor {
    offset: u64,
    exhausted: bool,
}

impl PageCursor {
    fn advance<T>(self, page: &Page<T>) -> Self {
        let offset = self.offset + page.result_count;
        Self {
            offset,
            exhausted: page.result_count == 0 || offset >= page.total_count,
        }
    }
}

/// Splits loan numbers into consecutive groups the payments endpoint accepts.
pub fn chunk_loan_numbers(loan_numbers: &[u64]) -> Vec<Vec<u64>> {
    loan_numbers
        .chunks(MAX_LOANS_PER_PAYMENT_REQUEST)
        .map(|chunk| chunk.to_vec())
        .collect()
}
