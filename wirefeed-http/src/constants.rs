//! HTTP-specific constants for the vendor API.

/// Header carrying the base64 payment payload (client → server).
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Header carrying the current access token on `extend`.
pub const X_SESSION_HEADER: &str = "X-SESSION";

/// HTTP 402 Payment Required status code.
pub const HTTP_STATUS_PAYMENT_REQUIRED: u16 = 402;

/// Error fragments the facilitator uses when it refuses to settle.
///
/// Matched case-insensitively against error text to label a failure as a
/// settlement rejection in logs.
pub const SETTLEMENT_FAILURE_MARKERS: &[&str] = &[
    "transaction_simulation_failed",
    "invalid_exact_svm_payload",
    "insufficient_funds",
    "blockhash",
    "fee payer",
];
