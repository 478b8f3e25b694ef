use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============ Envelope Models ============

/// One page of a paginated Prosper resource.
///
/// Every list endpoint (notes, listings, payments) answers with this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    /// Records in this page, in server order.
    pub result: Vec<T>,
    /// Number of records in this page.
    pub result_count: u64,
    /// Number of records across all pages.
    pub total_count: u64,
}

/// Response body of the OAuth2 token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for subsequent requests.
    pub access_token: String,
    /// Usually "bearer".
    pub token_type: Option<String>,
    /// Lifetime of the token in seconds.
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

// ============ Resource Models ============

/// A note: the investor's fractional ownership in a loan.
///
/// Only `loan_number` is interpreted; every other field is kept as sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    /// Identifier of the loan the note belongs to.
    pub loan_number: u64,
    /// Remaining fields of the record.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A payment made on a loan the investor holds a note in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    /// "Success" for payments that reached the investor.
    pub payment_status: String,
    /// Disbursement timestamp, e.g. `2024-03-05T00:00:00.000+0000`.
    pub investor_disbursement_date: Option<String>,
    /// Investor's pro-rata share of the payment.
    pub payment_amount: Option<f64>,
    /// Remaining fields of the record.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Payment {
    /// Status value the server uses for a completed payment.
    pub const SUCCESS: &'static str = "Success";

    pub fn is_successful(&self) -> bool {
        self.payment_status == Self::SUCCESS
    }
}

/// A loan listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub listing_number: Option<u64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}
