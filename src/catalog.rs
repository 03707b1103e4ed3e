//! Product catalog loading.
//!
//! Reads the input CSV (header: `slug,title,short_description,body,tags,
//! affiliate_link,publish_date,image_query`) into validated [`Product`]
//! records. Validation is row-scoped: a row missing a required field or
//! carrying an unparseable date is logged and skipped, never fatal.

use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One validated product record.
///
/// Invariant: `slug`, `title` and `affiliate_link` are non-empty and
/// `publish_date` parsed; rows violating this never become a `Product`.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Stable unique identifier; database key and filename stem.
    pub slug: String,
    pub title: String,
    pub short_description: String,
    pub body: String,
    pub tags: Vec<String>,
    pub affiliate_link: String,
    pub publish_date: NaiveDate,
    /// Search text for the illustration; falls back to the title.
    pub image_query: String,
}

/// Raw CSV row before validation. Missing columns deserialize as empty.
#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    slug: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    short_description: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    affiliate_link: String,
    #[serde(default)]
    publish_date: String,
    #[serde(default)]
    image_query: String,
}

impl Row {
    /// Validate and normalize into a [`Product`], or explain why not.
    fn into_product(self) -> Option<Product> {
        let slug = self.slug.trim().to_string();
        let title = self.title.trim().to_string();
        let affiliate_link = self.affiliate_link.trim().to_string();
        let date_raw = self.publish_date.trim();

        if slug.is_empty() || title.is_empty() || affiliate_link.is_empty() || date_raw.is_empty()
        {
            warn!(slug = %slug, "skipping row missing required fields");
            return None;
        }

        let publish_date = match NaiveDate::parse_from_str(date_raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                warn!(slug = %slug, publish_date = %date_raw, "invalid publish_date; skipping row");
                return None;
            }
        };

        let tags = self
            .tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let image_query = {
            let query = self.image_query.trim();
            if query.is_empty() {
                title.clone()
            } else {
                query.to_string()
            }
        };

        Some(Product {
            slug,
            title,
            short_description: self.short_description.trim().to_string(),
            body: self.body.trim().to_string(),
            tags,
            affiliate_link,
            publish_date,
            image_query,
        })
    }
}

/// Load and validate the product table.
///
/// A missing file is logged and yields an empty catalog; the run then has
/// nothing to do, which is not an error.
pub fn load_products(path: &Path) -> Result<Vec<Product>, CatalogError> {
    if !path.exists() {
        error!(path = %path.display(), "CSV file not found");
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)?;
    Ok(read_products(file))
}

/// Parse products from any reader, skipping invalid rows.
fn read_products(input: impl Read) -> Vec<Product> {
    let mut reader = csv::Reader::from_reader(input);
    let mut products = Vec::new();

    for result in reader.deserialize::<Row>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "skipping unreadable CSV row");
                continue;
            }
        };
        if let Some(product) = row.into_product() {
            products.push(product);
        }
    }

    products
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "slug,title,short_description,body,tags,affiliate_link,publish_date,image_query\n";

    fn parse(rows: &str) -> Vec<Product> {
        read_products(format!("{HEADER}{rows}").as_bytes())
    }

    #[test]
    fn parses_a_complete_row() {
        let products = parse(
            "widget-1,Widget One,A widget,Long text,\"tools, gadgets\",https://shop.example/w1,2026-03-01,blue widget\n",
        );
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.slug, "widget-1");
        assert_eq!(p.title, "Widget One");
        assert_eq!(p.tags, vec!["tools", "gadgets"]);
        assert_eq!(p.publish_date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(p.image_query, "blue widget");
    }

    #[test]
    fn image_query_falls_back_to_title() {
        let products = parse("widget-1,Widget One,,,,https://shop.example/w1,2026-03-01,\n");
        assert_eq!(products[0].image_query, "Widget One");
    }

    #[test]
    fn empty_tags_become_empty_vec() {
        let products = parse("widget-1,Widget One,,,,https://shop.example/w1,2026-03-01,q\n");
        assert!(products[0].tags.is_empty());

        let products = parse("widget-1,Widget One,,,\" , ,\",https://shop.example/w1,2026-03-01,q\n");
        assert!(products[0].tags.is_empty());
    }

    #[test]
    fn rows_missing_required_fields_are_skipped() {
        let products = parse(
            ",No Slug,,,,https://shop.example/a,2026-03-01,\n\
             no-title,,,,,https://shop.example/b,2026-03-01,\n\
             no-link,Has Title,,,,,2026-03-01,\n\
             no-date,Has Title,,,,https://shop.example/c,,\n\
             ok,Fine,,,,https://shop.example/d,2026-03-01,\n",
        );
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].slug, "ok");
    }

    #[test]
    fn unparseable_date_is_skipped() {
        let products = parse("widget-1,Widget One,,,,https://shop.example/w1,03/01/2026,\n");
        assert!(products.is_empty());
    }

    #[test]
    fn fields_are_trimmed() {
        let products = parse(
            "  widget-1 , Widget One ,  desc , body text ,,https://shop.example/w1,2026-03-01,\n",
        );
        let p = &products[0];
        assert_eq!(p.slug, "widget-1");
        assert_eq!(p.title, "Widget One");
        assert_eq!(p.short_description, "desc");
        assert_eq!(p.body, "body text");
    }

    #[test]
    fn missing_file_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let products = load_products(&dir.path().join("absent.csv")).unwrap();
        assert!(products.is_empty());
    }
}
