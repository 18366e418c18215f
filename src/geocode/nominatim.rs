use async_trait::async_trait;
use reqwest::{header::ACCEPT_LANGUAGE, Client};
use serde::Deserialize;
use tracing::debug;

use super::{GeocodeError, GeocodeQuery, Geocoder};
use crate::{bounds::LatLng, config::GeocoderConfig};

/// Klient `/search` w stylu OSM Nominatim, zawężony do prostokąta i kraju.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    country_codes: String,
    language: String,
}

#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            country_codes: config.country_codes.clone(),
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &GeocodeQuery) -> Result<Option<LatLng>, GeocodeError> {
        // viewbox: minlon,minlat,maxlon,maxlat (najpierw długość!)
        let b = query.viewbox;
        let viewbox = format!("{},{},{},{}", b.west, b.south, b.east, b.north);

        let response = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT_LANGUAGE, &self.language)
            .query(&[
                ("format", "jsonv2"),
                ("limit", "1"),
                ("dedupe", "1"),
                ("bounded", "1"),
                ("countrycodes", self.country_codes.as_str()),
                ("accept-language", self.language.as_str()),
                ("viewbox", viewbox.as_str()),
                ("q", query.text.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let hit = parse_first_hit(&body)?;
        debug!("Geocoded {:?} -> {:?}", query.text, hit);
        Ok(hit)
    }
}

/// Pierwsze trafienie z odpowiedzi; pusta tablica to `None`.
fn parse_first_hit(body: &str) -> Result<Option<LatLng>, GeocodeError> {
    let hits: Vec<NominatimHit> =
        serde_json::from_str(body).map_err(|e| GeocodeError::Parse(e.to_string()))?;
    let Some(first) = hits.first() else {
        return Ok(None);
    };
    let lat = first.lat.trim().parse::<f64>();
    let lng = first.lon.trim().parse::<f64>();
    match (lat, lng) {
        (Ok(lat), Ok(lng)) => LatLng::checked(lat, lng)
            .map(Some)
            .ok_or_else(|| GeocodeError::Parse(format!("non-finite coordinate {lat},{lng}"))),
        _ => Err(GeocodeError::Parse(format!("bad coordinate {:?},{:?}", first.lat, first.lon))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_hit_is_parsed_from_strings() {
        let body = r#"[{"place_id":1,"lat":"47.6849","lon":"16.5831","display_name":"Sopron"},
                       {"lat":"0","lon":"0"}]"#;
        assert_eq!(parse_first_hit(body).unwrap(), Some(LatLng::new(47.6849, 16.5831)));
    }

    #[test]
    fn empty_result_is_none() {
        assert_eq!(parse_first_hit("[]").unwrap(), None);
    }

    #[test]
    fn malformed_bodies_are_parse_errors() {
        assert!(matches!(parse_first_hit("{\"error\":1}"), Err(GeocodeError::Parse(_))));
        assert!(matches!(parse_first_hit(r#"[{"lat":"x","lon":"1"}]"#), Err(GeocodeError::Parse(_))));
    }
}
