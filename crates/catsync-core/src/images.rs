//! Rendered-image URL composition.
//!
//! The ad catalog and the CSV feeds never link the original product photo
//! directly; they link the external render service, which overlays price and
//! name on the photo and crops to the requested aspect ratio. The service is
//! opaque to us; this module only builds URLs against it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use url::Url;

use crate::product::FeedStyle;

/// The render service prices are always tagged with the local currency
/// abbreviation, independent of the configured item-price suffix.
const RENDER_CURRENCY_SUFFIX: &str = "KM";

/// One rendered image in the ad-catalog wire shape: `{url, tag: [..]}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RenderedImage {
    pub url: String,
    pub tag: Vec<String>,
}

/// Aspect ratios and placement tags, in the exact order the catalog expects.
const ASPECT_SPECS: [(&str, &[&str]); 3] = [
    ("1:1", &[]),
    ("4:5", &["ASPECT_RATIO_4_5_PREFERRED"]),
    ("9:16", &["STORY_PREFERRED", "REELS_PREFERRED"]),
];

/// Composes the three rendered-image URLs for a product.
///
/// `price` and `discount_price` are bare amounts (no currency suffix);
/// `image_url` is the original photo, carried as URL-safe base64 in the
/// `img` parameter. Index 0 doubles as the item's `image_link`.
#[must_use]
pub fn rendered_images(
    render_base_url: &str,
    name: &str,
    price: &str,
    discount_price: Option<&str>,
    image_url: Option<&str>,
    style: FeedStyle,
) -> Vec<RenderedImage> {
    let encoded_img = image_url
        .map(|u| URL_SAFE_NO_PAD.encode(u.as_bytes()))
        .unwrap_or_default();

    ASPECT_SPECS
        .iter()
        .map(|(aspect_ratio, tags)| {
            let url = match Url::parse(render_base_url) {
                Ok(mut url) => {
                    {
                        let mut pairs = url.query_pairs_mut();
                        pairs.append_pair("price", &format!("{price} {RENDER_CURRENCY_SUFFIX}"));
                        if let Some(discount) = discount_price {
                            pairs.append_pair(
                                "discount_price",
                                &format!("{discount} {RENDER_CURRENCY_SUFFIX}"),
                            );
                        }
                        pairs.append_pair("name", name);
                        pairs.append_pair("img", &encoded_img);
                        pairs.append_pair("style", style.as_str());
                        pairs.append_pair("aspect_ratio", aspect_ratio);
                    }
                    url.to_string()
                }
                // An unparsable base URL is a configuration defect; emit it
                // verbatim so the failure is visible downstream.
                Err(_) => render_base_url.to_string(),
            };
            RenderedImage {
                url,
                tag: tags.iter().map(|t| (*t).to_string()).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://render.example.com/render";

    fn images() -> Vec<RenderedImage> {
        rendered_images(
            BASE,
            "Shirt",
            "10.00",
            Some("8.00"),
            Some("https://x/s.jpg"),
            FeedStyle::Standard,
        )
    }

    #[test]
    fn produces_three_images_in_aspect_order() {
        let images = images();
        assert_eq!(images.len(), 3);
        assert!(images[0].url.contains("aspect_ratio=1%3A1"));
        assert!(images[1].url.contains("aspect_ratio=4%3A5"));
        assert!(images[2].url.contains("aspect_ratio=9%3A16"));
    }

    #[test]
    fn tag_sets_are_exact() {
        let images = images();
        assert!(images[0].tag.is_empty());
        assert_eq!(images[1].tag, vec!["ASPECT_RATIO_4_5_PREFERRED"]);
        assert_eq!(images[2].tag, vec!["STORY_PREFERRED", "REELS_PREFERRED"]);
    }

    #[test]
    fn price_params_carry_local_suffix() {
        let images = images();
        assert!(images[0].url.contains("price=10.00+KM"));
        assert!(images[0].url.contains("discount_price=8.00+KM"));
    }

    #[test]
    fn discount_price_absent_without_sale() {
        let images = rendered_images(BASE, "Shirt", "10.00", None, None, FeedStyle::Standard);
        assert!(!images[0].url.contains("discount_price"));
    }

    #[test]
    fn img_param_is_url_safe_base64_of_source_url() {
        let images = images();
        let expected = URL_SAFE_NO_PAD.encode("https://x/s.jpg".as_bytes());
        assert!(images[0].url.contains(&format!("img={expected}")));
    }

    #[test]
    fn style_flows_into_query() {
        let standard = rendered_images(BASE, "n", "1", None, None, FeedStyle::Standard);
        let christmas = rendered_images(BASE, "n", "1", None, None, FeedStyle::Christmas);
        assert!(standard[0].url.contains("style=standard"));
        assert!(christmas[0].url.contains("style=christmas"));
        // Style is the only difference.
        assert_eq!(
            standard[0].url.replace("style=standard", "style=christmas"),
            christmas[0].url
        );
    }

    #[test]
    fn missing_image_yields_empty_img_param() {
        let images = rendered_images(BASE, "n", "1", None, None, FeedStyle::Standard);
        assert!(images[0].url.contains("img=&") || images[0].url.ends_with("img="));
    }

    #[test]
    fn deterministic_for_identical_input() {
        assert_eq!(images(), images());
    }
}
