//! CSS selectors for the supported site layouts
//!
//! mid.ru publishes articles in two layouts (photo article and announcement
//! list) and its listing pages as an announce list. mil.ru article pages
//! keep everything under `#center`.

use scraper::Selector;
use std::sync::LazyLock;

// Helper macro to parse selectors safely at first use
macro_rules! parse_selector {
    ($s:expr) => {
        LazyLock::new(|| Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s)))
    };
}

// mid.ru photo article layout
pub static MID_ARTICLE_BLOCK: LazyLock<Selector> = parse_selector!("div.photo-content");
pub static MID_ARTICLE_TITLE: LazyLock<Selector> = parse_selector!("h1.photo-content__title");
pub static MID_ARTICLE_NUMBER: LazyLock<Selector> =
    parse_selector!("p.article-line__note.article-line__note_small");
pub static MID_ARTICLE_PARAGRAPHS: LazyLock<Selector> =
    parse_selector!("div.text.article-content p");

// mid.ru announcement layout
pub static MID_ANNOUNCEMENT_BLOCK: LazyLock<Selector> = parse_selector!("ul.announcements");
pub static MID_ANNOUNCEMENT_TITLE: LazyLock<Selector> = parse_selector!("h3.announcement__title");
pub static MID_ANNOUNCEMENT_NUMBER: LazyLock<Selector> =
    parse_selector!("div.announcement__doc-num");
pub static MID_ANNOUNCEMENT_PARAGRAPHS: LazyLock<Selector> =
    parse_selector!("div.announcement__text > p");

// mid.ru listing pages
pub static MID_LIST: LazyLock<Selector> = parse_selector!("ul.announce.announce_articles");
pub static MID_LIST_ITEM: LazyLock<Selector> = parse_selector!("li.announce__item");
pub static MID_LIST_DATE: LazyLock<Selector> = parse_selector!("span.announce__date");
pub static MID_LIST_TIME: LazyLock<Selector> = parse_selector!("span.announce__time");
pub static LINK: LazyLock<Selector> = parse_selector!("a");

// mil.ru article pages
pub static MIL_ARTICLE_BLOCK: LazyLock<Selector> = parse_selector!("#center");
pub static MIL_ARTICLE_TITLE: LazyLock<Selector> = parse_selector!("h1");
pub static MIL_ARTICLE_PARAGRAPHS: LazyLock<Selector> = parse_selector!("p");
pub static MIL_ARTICLE_AUTHOR: LazyLock<Selector> = parse_selector!("div a.date");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_selectors_parse() {
        let all: [&LazyLock<Selector>; 17] = [
            &MID_ARTICLE_BLOCK,
            &MID_ARTICLE_TITLE,
            &MID_ARTICLE_NUMBER,
            &MID_ARTICLE_PARAGRAPHS,
            &MID_ANNOUNCEMENT_BLOCK,
            &MID_ANNOUNCEMENT_TITLE,
            &MID_ANNOUNCEMENT_NUMBER,
            &MID_ANNOUNCEMENT_PARAGRAPHS,
            &MID_LIST,
            &MID_LIST_ITEM,
            &MID_LIST_DATE,
            &MID_LIST_TIME,
            &LINK,
            &MIL_ARTICLE_BLOCK,
            &MIL_ARTICLE_TITLE,
            &MIL_ARTICLE_PARAGRAPHS,
            &MIL_ARTICLE_AUTHOR,
        ];
        for selector in all {
            LazyLock::force(selector);
        }
    }
}
