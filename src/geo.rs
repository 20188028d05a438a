//! Public IP geolocation lookup.

use std::fmt;

use reqwest::Client;
use serde::Serialize;

use crate::api::GeoApiResponse;
use crate::error::{NetpeekError, Result};

const UNKNOWN: &str = "Unknown";

/// Latest geolocation snapshot. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoRecord {
    pub ip: String,
    pub country: String,
    pub city: String,
    pub region: String,
    pub organization: String,
}

impl GeoRecord {
    /// Map an API body onto the display record.
    ///
    /// `success: false` is an API-level failure carrying the body's `message`.
    /// `organization` prefers `connection.org`, then `connection.isp`.
    pub fn from_response(resp: GeoApiResponse) -> Result<Self> {
        if !resp.success {
            let detail = resp
                .message
                .unwrap_or_else(|| "geolocation lookup failed".to_string());
            return Err(NetpeekError::ApiSemanticFailure(detail));
        }

        let connection = resp.connection.unwrap_or_default();
        let or_unknown = |v: Option<String>| {
            v.filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };

        Ok(GeoRecord {
            ip: or_unknown(resp.ip),
            country: or_unknown(resp.country),
            city: or_unknown(resp.city),
            region: or_unknown(resp.region),
            organization: or_unknown(connection.org.or(connection.isp)),
        })
    }
}

impl fmt::Display for GeoRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "IP:  {}", self.ip)?;
        writeln!(f, "Loc: {}, {}, {}", self.city, self.region, self.country)?;
        write!(f, "Org: {}", self.organization)
    }
}

/// Display state of the geo panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoStatus {
    Idle,
    Pending,
    Success(GeoRecord),
    Error(String),
}

impl GeoStatus {
    pub fn from_result(result: Result<GeoRecord>) -> Self {
        match result {
            Ok(record) => GeoStatus::Success(record),
            Err(e) => GeoStatus::Error(e.to_string()),
        }
    }
}

/// One GET against the geolocation endpoint.
pub async fn fetch_geo(client: &Client, url: &str) -> Result<GeoRecord> {
    tracing::debug!(target: "netpeek::geo", %url, "requesting geolocation");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| NetpeekError::NetworkFailure(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(target: "netpeek::geo", status = status.as_u16(), "geo lookup rejected");
        return Err(NetpeekError::HttpStatusFailure {
            status: status.as_u16(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| NetpeekError::NetworkFailure(e.to_string()))?;
    let body: GeoApiResponse = serde_json::from_slice(&bytes).map_err(|e| {
        NetpeekError::ApiSemanticFailure(format!("unexpected geolocation payload: {e}"))
    })?;

    let record = GeoRecord::from_response(body)?;
    tracing::info!(target: "netpeek::geo", ip = %record.ip, country = %record.country, "geolocation resolved");
    Ok(record)
}
