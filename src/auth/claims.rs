use serde::{Deserialize, Serialize};

/// JWT payload. `user_id` is optional on the wire so that a token without it
/// is reported as a missing claim rather than a decoding failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,          // email
    pub user_id: Option<i64>, // account id
    pub iat: i64,             // issued at (unix timestamp)
    pub exp: i64,             // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

/// Identity asserted by a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub user_id: i64,
    pub email: String,
}
