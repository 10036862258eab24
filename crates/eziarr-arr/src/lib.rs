//! # eziarr-arr
//!
//! Clients for the upstream services eziarr mirrors and drives: the movie,
//! episode and album managers (one [`ArrClient`] each, implementing
//! [`MediaService`](eziarr_core::MediaService)) and the indexer aggregator
//! ([`IndexerClient`]).
//!
//! Every request carries the service's API key in `X-Api-Key` and is bounded
//! by the configured timeout. Transport errors and non-2xx answers surface as
//! [`Error::Upstream`](eziarr_core::Error::Upstream).

pub mod client;
pub mod config;
pub mod prowlarr;
pub mod wanted;

pub use client::ArrClient;
pub use config::ServiceConfig;
pub use prowlarr::IndexerClient;
pub use wanted::{episode_title, map_record, poster_url};

use std::sync::Arc;

use eziarr_core::{MediaServices, Result, Service};

/// Build the registry of all three media services from the environment.
pub fn media_services_from_env() -> Result<MediaServices> {
    let mut services = MediaServices::new();
    for service in Service::ALL {
        services = services.with(Arc::new(ArrClient::from_env(service)?));
    }
    Ok(services)
}
