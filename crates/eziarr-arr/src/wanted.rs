//! Mapping of wanted/missing listing entries to [`MissingRecord`]s.

use serde_json::Value as JsonValue;
use tracing::trace;

use eziarr_core::{MissingRecord, Service};

use crate::config::ServiceConfig;

/// Resolve the display image of type `cover_type` from an image list.
///
/// A service-relative `url` is proxied through the service and carries the
/// API key; otherwise the absolute `remoteUrl` is used.
pub fn poster_url(images: Option<&JsonValue>, cover_type: &str, config: &ServiceConfig) -> Option<String> {
    let image = images?
        .as_array()?
        .iter()
        .find(|img| img.get("coverType").and_then(JsonValue::as_str) == Some(cover_type))?;

    match image.get("url").and_then(JsonValue::as_str) {
        Some(url) if !url.is_empty() => Some(format!(
            "{}{}?apikey={}",
            config.base_url, url, config.api_key
        )),
        _ => image
            .get("remoteUrl")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
    }
}

fn str_field(value: &JsonValue, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Episode display title: `Series - S01E05`, or `S01E05` without a series.
pub fn episode_title(series: Option<&str>, season: i64, episode: i64) -> String {
    let code = format!("S{season:02}E{episode:02}");
    match series {
        Some(series) if !series.is_empty() => format!("{series} - {code}"),
        _ => code,
    }
}

/// Map one listing entry. Entries without an integer `id` are skipped.
pub fn map_record(service: Service, entry: &JsonValue, config: &ServiceConfig) -> Option<MissingRecord> {
    let Some(id) = entry.get("id").and_then(JsonValue::as_i64) else {
        trace!(service = %service, "Skipping listing entry without id");
        return None;
    };
    let cover_type = service.spec().cover_type;

    let record = match service {
        Service::Radarr => {
            let title = str_field(entry, "title").unwrap_or_default();
            let release = str_field(entry, "inCinemas").or_else(|| str_field(entry, "digitalRelease"));
            let mut record = MissingRecord::new(service, id, title)
                .with_release_date(release)
                .with_poster_url(poster_url(entry.get("images"), cover_type, config));
            if let Some(status) = str_field(entry, "status") {
                record = record.with_status(status);
            }
            record
        }
        Service::Sonarr => {
            let series = entry.get("series");
            let series_title = series.and_then(|s| str_field(s, "title"));
            let season = entry.get("seasonNumber").and_then(JsonValue::as_i64).unwrap_or(0);
            let number = entry.get("episodeNumber").and_then(JsonValue::as_i64).unwrap_or(0);
            MissingRecord::new(service, id, episode_title(series_title.as_deref(), season, number))
                .with_series_title(series_title)
                .with_release_date(str_field(entry, "airDateUtc"))
                .with_poster_url(poster_url(
                    series.and_then(|s| s.get("images")),
                    cover_type,
                    config,
                ))
        }
        Service::Lidarr => {
            let album = str_field(entry, "title").unwrap_or_default();
            let artist = entry.get("artist").and_then(|a| str_field(a, "artistName"));
            let title = match artist {
                Some(artist) => format!("{artist} - {album}"),
                None => album,
            };
            MissingRecord::new(service, id, title)
                .with_release_date(str_field(entry, "releaseDate"))
                .with_poster_url(poster_url(entry.get("images"), cover_type, config))
        }
    };

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ServiceConfig {
        ServiceConfig::new("http://arr:1", "KEY")
    }

    #[test]
    fn test_poster_prefers_proxied_url() {
        let images = json!([
            {"coverType": "fanart", "url": "/f.jpg"},
            {"coverType": "poster", "url": "/MediaCover/1/poster.jpg", "remoteUrl": "http://cdn/p.jpg"}
        ]);
        assert_eq!(
            poster_url(Some(&images), "poster", &config()).as_deref(),
            Some("http://arr:1/MediaCover/1/poster.jpg?apikey=KEY")
        );
    }

    #[test]
    fn test_poster_falls_back_to_remote_url() {
        let images = json!([{"coverType": "cover", "remoteUrl": "http://cdn/c.jpg"}]);
        assert_eq!(
            poster_url(Some(&images), "cover", &config()).as_deref(),
            Some("http://cdn/c.jpg")
        );
        assert!(poster_url(Some(&images), "poster", &config()).is_none());
        assert!(poster_url(None, "poster", &config()).is_none());
    }

    #[test]
    fn test_movie_mapping() {
        let entry = json!({
            "id": 12, "title": "Heat", "status": "released",
            "digitalRelease": "1996-01-01T00:00:00Z"
        });
        let record = map_record(Service::Radarr, &entry, &config()).unwrap();
        assert_eq!(record.id, "radarr-12");
        assert_eq!(record.status, "released");
        assert_eq!(record.release_date.as_deref(), Some("1996-01-01T00:00:00Z"));
    }

    #[test]
    fn test_movie_prefers_cinema_date() {
        let entry = json!({
            "id": 1, "title": "X",
            "inCinemas": "2020-01-01T00:00:00Z", "digitalRelease": "2020-05-01T00:00:00Z"
        });
        let record = map_record(Service::Radarr, &entry, &config()).unwrap();
        assert_eq!(record.release_date.as_deref(), Some("2020-01-01T00:00:00Z"));
        assert_eq!(record.status, "missing");
    }

    #[test]
    fn test_episode_mapping() {
        let entry = json!({
            "id": 55, "seriesId": 3, "seasonNumber": 2, "episodeNumber": 7,
            "airDateUtc": "2023-03-04T01:00:00Z",
            "series": {"title": "Severance", "images": [{"coverType": "poster", "remoteUrl": "http://cdn/s.jpg"}]}
        });
        let record = map_record(Service::Sonarr, &entry, &config()).unwrap();
        assert_eq!(record.title, "Severance - S02E07");
        assert_eq!(record.series_title.as_deref(), Some("Severance"));
        assert_eq!(record.poster_url.as_deref(), Some("http://cdn/s.jpg"));
        assert_eq!(record.status, "missing");
    }

    #[test]
    fn test_episode_without_series() {
        assert_eq!(episode_title(None, 1, 5), "S01E05");
    }

    #[test]
    fn test_album_mapping() {
        let entry = json!({
            "id": 9, "title": "Kid A", "releaseDate": "2000-10-02T00:00:00Z",
            "artist": {"artistName": "Radiohead"}
        });
        let record = map_record(Service::Lidarr, &entry, &config()).unwrap();
        assert_eq!(record.title, "Radiohead - Kid A");
        assert_eq!(record.id, "lidarr-9");
    }

    #[test]
    fn test_entry_without_id_is_skipped() {
        assert!(map_record(Service::Radarr, &json!({"title": "x"}), &config()).is_none());
    }
}
