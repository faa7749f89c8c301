// src/services/parser.rs

//! Page text parsing.
//!
//! Pulls a SKU code, L x W x H dimensions and a Chinese product name out of the
//! raw text of a catalog page. All three are heuristics; any of them may be absent.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Dimensions;

/// Vendor SKU codes such as `A95`, `SF-1020` or `TB12A`.
static SKU_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{1,6}-?[0-9]{1,6}[A-Z0-9]*)\b").expect("valid SKU regex"));

/// Three numbers separated by `x`, `X`, `×` or `*`, e.g. `1020 x 1020 x 300`.
static DIMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9]{2,4})\s*[x×*]\s*([0-9]{2,4})\s*[x×*]\s*([0-9]{2,4})")
        .expect("valid dimensions regex")
});

/// Runs of 2 to 30 CJK unified ideographs.
static CN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x{4e00}-\x{9fff}]{2,30}").expect("valid CJK regex"));

/// Furniture terms that mark a Chinese run as the likely product name.
const FURNITURE_KEYWORDS: &[&str] = &[
    "沙发", "床", "椅", "柜", "茶几", "凳", "桌", "架", "几", "圆", "方", "长", "边",
];

/// Metadata recovered from one page of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub sku: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub cn_name: Option<String>,
}

/// Extract SKU, dimensions and Chinese name from page text.
pub fn parse_page_text(text: &str) -> PageMetadata {
    PageMetadata {
        sku: find_sku(text),
        dimensions: find_dimensions(text),
        cn_name: best_cn_name(text),
    }
}

/// First SKU-looking token in the text.
pub fn find_sku(text: &str) -> Option<String> {
    SKU_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// First `L x W x H` triple in the text.
pub fn find_dimensions(text: &str) -> Option<Dimensions> {
    let caps = DIMS_RE.captures(text)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i64>().ok());
    Some(Dimensions {
        length: num(1)?,
        width: num(2)?,
        height: num(3)?,
    })
}

/// Pick the most product-like Chinese name in the text.
///
/// Returns the first CJK run containing a furniture keyword, otherwise the
/// first run found.
pub fn best_cn_name(text: &str) -> Option<String> {
    let runs: Vec<&str> = CN_RE.find_iter(text).map(|m| m.as_str()).collect();

    runs.iter()
        .find(|run| FURNITURE_KEYWORDS.iter().any(|kw| run.contains(kw)))
        .or_else(|| runs.first())
        .map(|run| run.to_string())
}

/// SKU used when a page carries no recognisable code.
pub fn fallback_sku(page_number: u32) -> String {
    format!("P{:03}", page_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_sku() {
        assert_eq!(find_sku("Model SF-1020 and TB12"), Some("SF-1020".to_string()));
        assert_eq!(find_sku("A95 sofa"), Some("A95".to_string()));
        assert_eq!(find_sku("TB12A-x"), Some("TB12A".to_string()));
    }

    #[test]
    fn sku_requires_uppercase_prefix_and_word_boundary() {
        assert_eq!(find_sku("sf-1020 lowercase"), None);
        assert_eq!(find_sku("1020 only digits"), None);
        assert_eq!(find_sku("ABCDEFG123"), None);
    }

    #[test]
    fn finds_dimensions_with_various_separators() {
        let expected = Some(Dimensions {
            length: 1020,
            width: 1020,
            height: 300,
        });
        assert_eq!(find_dimensions("size 1020 x 1020 x 300 mm"), expected);
        assert_eq!(find_dimensions("1020×1020×300"), expected);
        assert_eq!(find_dimensions("1020X1020X300"), expected);
        assert_eq!(find_dimensions("1020*1020*300"), expected);
    }

    #[test]
    fn dimensions_need_three_parts() {
        assert_eq!(find_dimensions("1020 x 300"), None);
        assert_eq!(find_dimensions("no numbers here"), None);
    }

    #[test]
    fn cn_name_prefers_furniture_keyword() {
        let text = "现代简约 风格\n真皮沙发三人位\n客厅";
        assert_eq!(best_cn_name(text), Some("真皮沙发三人位".to_string()));
    }

    #[test]
    fn cn_name_falls_back_to_first_run() {
        assert_eq!(best_cn_name("品牌 现代"), Some("品牌".to_string()));
    }

    #[test]
    fn cn_name_ignores_single_characters() {
        assert_eq!(best_cn_name("A 床 B"), None);
        assert_eq!(best_cn_name("english only"), None);
    }

    #[test]
    fn parse_page_text_combines_fields() {
        let meta = parse_page_text("A95\n实木餐桌\n1600 x 900 x 750");
        assert_eq!(meta.sku.as_deref(), Some("A95"));
        assert_eq!(meta.cn_name.as_deref(), Some("实木餐桌"));
        assert_eq!(
            meta.dimensions,
            Some(Dimensions {
                length: 1600,
                width: 900,
                height: 750
            })
        );
    }

    #[test]
    fn parse_empty_page() {
        assert_eq!(parse_page_text(""), PageMetadata::default());
    }

    #[test]
    fn fallback_sku_is_zero_padded() {
        assert_eq!(fallback_sku(1), "P001");
        assert_eq!(fallback_sku(42), "P042");
        assert_eq!(fallback_sku(1234), "P1234");
    }
}
