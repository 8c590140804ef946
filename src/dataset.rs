use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::PersistenceError;
use crate::models::{Coordinates, Dataset, PublishedListing, ScrapeResult};

const STREET_VIEW_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/streetview";

/// Street View image for a location; `None` when there are no coordinates.
pub fn street_view_url(coordinates: Option<&Coordinates>, api_key: &str) -> Option<String> {
    coordinates.map(|c| {
        format!(
            "{}?size=400x250&location={},{}&key={}",
            STREET_VIEW_ENDPOINT,
            c.lat,
            c.lng,
            urlencoding::encode(api_key)
        )
    })
}

/// Builds the front-end document for a run.
pub fn build_dataset(result: &ScrapeResult, api_key: &str) -> Dataset {
    let listings = result
        .listings
        .iter()
        .map(|record| PublishedListing {
            formatted_address: record
                .coordinates
                .as_ref()
                .map(|c| c.formatted_address.clone())
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| record.address.clone()),
            url: result.source.clone(),
            street_view_url: street_view_url(record.coordinates.as_ref(), api_key),
            record: record.clone(),
        })
        .collect::<Vec<_>>();

    Dataset {
        scraped_at: result.scraped_at,
        source: result.source.clone(),
        sale_dates: result.sale_dates.clone(),
        count: listings.len(),
        listings,
    }
}

/// Writes the dataset JSON, replacing whatever was there before.
pub struct DatasetWriter {
    path: PathBuf,
    api_key: String,
}

impl DatasetWriter {
    pub fn new(path: impl Into<PathBuf>, api_key: Option<&str>) -> Self {
        Self {
            path: path.into(),
            api_key: api_key.unwrap_or_default().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, result: &ScrapeResult) -> Result<Dataset, PersistenceError> {
        let dataset = build_dataset(result, &self.api_key);
        let json = serde_json::to_string_pretty(&dataset)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        // Write beside the target and rename so readers never see a partial file.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|source| PersistenceError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })?;

        Ok(dataset)
    }
}

/// Reads a previously written dataset, `None` if the file doesn't exist yet.
pub fn load_dataset(path: &Path) -> Result<Option<Dataset>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
    let dataset = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse dataset: {}", path.display()))?;
    Ok(Some(dataset))
}
