use serde::{Deserialize, Serialize};

/// Claims carried by a PawHome access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
    /// Issuer (optional)
    pub iss: Option<String>,
    /// User email
    pub email: String,
    /// User role (e.g., "adopter", "shelter", "admin")
    pub role: String,
}
