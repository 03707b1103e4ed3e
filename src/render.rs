//! Front matter and body composition.
//!
//! Pure string work: a [`Product`] plus whatever the image pipeline managed
//! to produce goes in, a complete Jekyll document comes out. Front-matter
//! fields with an absent or empty value are omitted entirely, never
//! written empty.
//!
//! The body has a fixed shape (disclosure, image, text, attribution,
//! buy box) and no section's presence depends on any other's.

use crate::assets::DerivedImages;
use crate::catalog::Product;
use serde::Serialize;
use std::collections::HashMap;

/// Static notice opening every post.
const DISCLOSURE: &str = "**Disclosure:** This post contains affiliate links. \
If you purchase using the links below I may earn a small commission at no \
extra cost to you.\n\n";

/// YAML front matter for one post or draft.
///
/// Field order is the emitted order.
#[derive(Debug, Serialize)]
pub struct FrontMatter {
    layout: &'static str,
    title: String,
    date: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_date: Option<String>,
}

/// A rendered document, front matter and body still separate.
#[derive(Debug)]
pub struct Document {
    pub front_matter: FrontMatter,
    pub body: String,
}

impl Document {
    /// Emit the full `---`-delimited markdown file.
    pub fn to_markdown(&self) -> String {
        // A flat struct of strings and lists cannot fail to serialize.
        let yaml = serde_yaml::to_string(&self.front_matter).expect("front matter serializes");
        format!("---\n{yaml}---\n\n{}", self.body)
    }
}

/// Render a product into a post (or, with `scheduled`, a draft).
pub fn render(
    product: &Product,
    images: &DerivedImages,
    metadata: Option<&HashMap<String, String>>,
    scheduled: bool,
) -> Document {
    let date = product.publish_date.format("%Y-%m-%d").to_string();
    let front_matter = FrontMatter {
        layout: "post",
        title: product.title.clone(),
        date: date.clone(),
        tags: product.tags.clone(),
        excerpt: non_empty(&product.short_description),
        image: images.main.clone(),
        thumbnail: images.thumb.clone(),
        scheduled_date: scheduled.then_some(date),
    };
    Document {
        front_matter,
        body: compose_body(product, images.main.as_deref(), metadata),
    }
}

fn compose_body(
    product: &Product,
    main_path: Option<&str>,
    metadata: Option<&HashMap<String, String>>,
) -> String {
    let mut body = String::from(DISCLOSURE);

    if let Some(path) = main_path {
        body.push_str(&format!(
            "![{}]({{{{ site.baseurl | default: '' }}}}/{})\n\n",
            product.title, path
        ));
    }

    if !product.body.is_empty() {
        body.push_str(&product.body);
    } else {
        body.push_str(&product.short_description);
    }

    if let Some(credit) = attribution(metadata) {
        body.push_str(&credit);
    }

    body.push_str(&format!(
        "\n\n---\n\n**Buy now:** [{}]({})\n\n",
        product.title, product.affiliate_link
    ));

    body
}

/// `*Image credit:* artist (license) [license](url)`: each fragment only
/// when its metadata value is non-empty, the whole block only when at
/// least one is.
fn attribution(metadata: Option<&HashMap<String, String>>) -> Option<String> {
    let metadata = metadata?;
    let field = |key: &str| metadata.get(key).map(String::as_str).unwrap_or("");

    let mut parts = Vec::new();
    let artist = field("Artist");
    if !artist.is_empty() {
        parts.push(artist.to_string());
    }
    let license = field("LicenseShortName");
    if !license.is_empty() {
        parts.push(format!("({license})"));
    }
    let license_url = field("LicenseUrl");
    if !license_url.is_empty() {
        parts.push(format!("[license]({license_url})"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(format!("\n\n*Image credit:* {}\n\n", parts.join(" ")))
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::product;

    fn no_images() -> DerivedImages {
        DerivedImages::default()
    }

    fn with_images() -> DerivedImages {
        DerivedImages {
            main: Some("assets/images/widget-1.jpg".to_string()),
            thumb: Some("assets/images/widget-1-thumb.jpg".to_string()),
        }
    }

    #[test]
    fn front_matter_includes_populated_fields_in_order() {
        let doc = render(&product("widget-1", "2026-03-01"), &with_images(), None, false);
        let markdown = doc.to_markdown();

        let fm_end = markdown[3..].find("---").unwrap() + 3;
        let fm = &markdown[..fm_end];
        assert!(fm.contains("layout: post"));
        assert!(fm.contains("title: Widget One"));
        assert!(fm.contains("date: 2026-03-01"));
        assert!(fm.contains("image: assets/images/widget-1.jpg"));
        assert!(fm.contains("thumbnail: assets/images/widget-1-thumb.jpg"));
        assert!(fm.find("layout").unwrap() < fm.find("title").unwrap());
        assert!(fm.find("title").unwrap() < fm.find("date").unwrap());
    }

    #[test]
    fn empty_fields_are_omitted_not_written_empty() {
        let mut p = product("widget-1", "2026-03-01");
        p.tags.clear();
        p.short_description.clear();
        let doc = render(&p, &no_images(), None, false);
        let markdown = doc.to_markdown();

        assert!(!markdown.contains("tags:"));
        assert!(!markdown.contains("excerpt:"));
        assert!(!markdown.contains("image:"));
        assert!(!markdown.contains("thumbnail:"));
        assert!(!markdown.contains("scheduled_date:"));
    }

    #[test]
    fn drafts_carry_a_scheduled_date() {
        let doc = render(&product("widget-1", "2026-03-01"), &no_images(), None, true);
        assert!(doc.to_markdown().contains("scheduled_date: 2026-03-01"));
    }

    #[test]
    fn body_starts_with_disclosure_and_ends_with_buy_box() {
        let doc = render(&product("widget-1", "2026-03-01"), &no_images(), None, false);
        assert!(doc.body.starts_with("**Disclosure:**"));
        assert!(
            doc.body
                .ends_with("**Buy now:** [Widget One](https://shop.example/w1)\n\n")
        );
    }

    #[test]
    fn image_block_precedes_text_and_uses_site_relative_path() {
        let doc = render(&product("widget-1", "2026-03-01"), &with_images(), None, false);
        let image_block =
            "![Widget One]({{ site.baseurl | default: '' }}/assets/images/widget-1.jpg)";
        let image_at = doc.body.find(image_block).unwrap();
        let text_at = doc.body.find("Long body text.").unwrap();
        assert!(image_at < text_at);
    }

    #[test]
    fn body_falls_back_to_short_description() {
        let mut p = product("widget-1", "2026-03-01");
        p.body.clear();
        let doc = render(&p, &no_images(), None, false);
        assert!(doc.body.contains("A short description."));
    }

    #[test]
    fn attribution_renders_only_non_empty_fragments() {
        let mut metadata = HashMap::new();
        metadata.insert("Artist".to_string(), "Jane Painter".to_string());
        metadata.insert("LicenseShortName".to_string(), String::new());
        metadata.insert(
            "LicenseUrl".to_string(),
            "https://creativecommons.org/licenses/by-sa/4.0".to_string(),
        );

        let doc = render(
            &product("widget-1", "2026-03-01"),
            &with_images(),
            Some(&metadata),
            false,
        );
        assert!(doc.body.contains(
            "*Image credit:* Jane Painter \
             [license](https://creativecommons.org/licenses/by-sa/4.0)"
        ));
        assert!(!doc.body.contains("()"));
    }

    #[test]
    fn attribution_block_absent_when_all_fields_empty() {
        let metadata = HashMap::new();
        let doc = render(
            &product("widget-1", "2026-03-01"),
            &with_images(),
            Some(&metadata),
            false,
        );
        assert!(!doc.body.contains("Image credit"));
    }

    #[test]
    fn document_is_front_matter_then_body() {
        let doc = render(&product("widget-1", "2026-03-01"), &no_images(), None, false);
        let markdown = doc.to_markdown();
        assert!(markdown.starts_with("---\n"));
        assert!(markdown.contains("---\n\n**Disclosure:**"));
    }
}
