use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, dev::Payload};
use serde::{Deserialize, Serialize};
use std::future::{Ready, ready};
use uuid::Uuid;

use crate::models::recipient::NotificationRecipient;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

impl AuthenticatedUser {
    /// The notification recipient slot this user's role maps to.
    /// Shelter accounts receive shelter-addressed notifications; every
    /// other role (adopter, admin) uses the adopter slot.
    pub fn as_recipient(&self) -> NotificationRecipient {
        if self.role == "shelter" {
            NotificationRecipient::Shelter(self.user_id)
        } else {
            NotificationRecipient::Adopter(self.user_id)
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
            ready(Ok(user.clone()))
        } else {
            ready(Err(actix_web::error::ErrorUnauthorized("Not authenticated")))
        }
    }
}
