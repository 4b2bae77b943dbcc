use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref PRODUCT_RE: Regex = Regex::new(r"/product/(\d+)").expect("valid regex");
}

/// Path segment that marks a product page.
pub const PRODUCT_MARKER: &str = "/product/";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_id: Option<String>,
    pub variant: Option<String>,
}

/// Pulls the numeric product id out of `/product/<id>` and the first non-empty `variant` query value.
pub fn extract_product_info(url: &str) -> ProductInfo {
    let product_id = PRODUCT_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let query = url
        .split_once('?')
        .map(|(_, rest)| rest.split('#').next().unwrap_or(""))
        .unwrap_or("");
    let variant = url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, v)| k == "variant" && !v.is_empty())
        .map(|(_, v)| v.into_owned());

    ProductInfo { product_id, variant }
}

pub fn is_product_url(url: &str) -> bool {
    url.contains(PRODUCT_MARKER)
}
