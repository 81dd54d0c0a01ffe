//! HTML parsing helpers shared by feed sources and crawlers

pub mod sanitize;
pub mod selectors;

use scraper::{ElementRef, Selector};

use self::sanitize::paragraph;
use crate::utils::normalize_whitespace;

/// Text of the first element matching `selector`, whitespace collapsed
pub fn first_text(root: ElementRef<'_>, selector: &Selector) -> String {
    root.select(selector)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// Whitespace-collapsed text of one element
pub fn element_text(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

/// Every element matching `selector` as a `<p>` paragraph, blanks skipped
pub fn paragraphs(root: ElementRef<'_>, selector: &Selector) -> String {
    root.select(selector)
        .filter_map(|el| paragraph(&el.text().collect::<String>()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_text_helpers() {
        let html = Html::parse_fragment(
            "<div><h1> Заголовок\n статьи </h1><p>Раз</p><p> </p><p>Два <b>три</b></p></div>",
        );
        let h1 = Selector::parse("h1").unwrap();
        let p = Selector::parse("p").unwrap();
        let missing = Selector::parse("h2").unwrap();

        assert_eq!(first_text(html.root_element(), &h1), "Заголовок статьи");
        assert_eq!(first_text(html.root_element(), &missing), "");
        assert_eq!(
            paragraphs(html.root_element(), &p),
            "<p>Раз</p><p>Два три</p>"
        );
    }
}
