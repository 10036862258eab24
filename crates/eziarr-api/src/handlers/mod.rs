//! HTTP handlers for eziarr-api.

pub mod library;
pub mod settings;
pub mod sources;

use eziarr_core::Service;

use crate::ApiError;

fn parse_service(name: &str) -> Result<Service, ApiError> {
    name.parse()
        .map_err(|_| ApiError::BadRequest("Invalid service".into()))
}
