//! Outlet catalog (`outlets.json`).
//!
//! The catalog maps each country to the outlets the ingester fetches:
//!
//! ```json
//! { "countries": { "US": [ { "id": "npr", "name": "NPR", "type": "public",
//!                            "homepage": "https://npr.org", "feeds": ["..."] } ] } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::data_paths::{first_existing, DataPaths, OUTLETS_FILE};
use crate::error::{ApiError, Result};
use crate::metrics::CatalogMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outlet {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub outlet_type: String,
    pub homepage: String,
    pub feeds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryOutlets {
    pub country: String,
    pub outlets: Vec<Outlet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletsResponse {
    pub countries: Vec<CountryOutlets>,
}

#[derive(Debug, Clone)]
pub struct OutletsService {
    candidates: Vec<PathBuf>,
}

impl OutletsService {
    pub fn new(paths: &DataPaths) -> Self {
        Self {
            candidates: paths.candidates(OUTLETS_FILE),
        }
    }

    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// Load the catalog; an absent or unreadable catalog is an empty one.
    pub fn load_outlets(&self) -> OutletsResponse {
        let Some(path) = first_existing(&self.candidates) else {
            debug!("no outlet catalog found");
            CatalogMetrics::record_catalog_unavailable();
            return OutletsResponse::default();
        };

        match fs::read_to_string(&path)
            .map_err(ApiError::from)
            .and_then(|content| parse_catalog(&content))
        {
            Ok(response) => {
                CatalogMetrics::record_catalog_load(response.countries.len());
                response
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load outlet catalog");
                CatalogMetrics::record_catalog_unavailable();
                OutletsResponse::default()
            }
        }
    }
}

pub fn parse_catalog(content: &str) -> Result<OutletsResponse> {
    let root: Value = serde_json::from_str(content)?;
    let Some(countries) = root.get("countries").and_then(Value::as_object) else {
        return Ok(OutletsResponse::default());
    };

    let countries = countries
        .iter()
        .map(|(country, list)| CountryOutlets {
            country: country.clone(),
            outlets: list
                .as_array()
                .map(|items| items.iter().map(outlet_from_value).collect())
                .unwrap_or_default(),
        })
        .collect();

    Ok(OutletsResponse { countries })
}

fn outlet_from_value(node: &Value) -> Outlet {
    let text = |field: &str| match node.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    };
    let feeds = node
        .get("feeds")
        .and_then(Value::as_array)
        .map(|feeds| {
            feeds
                .iter()
                .filter_map(|f| f.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Outlet {
        id: text("id"),
        name: text("name"),
        outlet_type: text("type"),
        homepage: text("homepage"),
        feeds,
    }
}
