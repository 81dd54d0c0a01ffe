//! Test fixtures for integration tests
//!
//! Provides sample feed pages and article HTML for the mocked sources

/// Atom page with two entries and a relative `next` link
pub const KREMLIN_PAGE_1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xml:lang="ru">
  <title>Президент России</title>
  <id>http://kremlin.ru/events/all/feed</id>
  <updated>2024-05-15T18:00:00+04:00</updated>
  <link rel="self" href="/feed"/>
  <link rel="next" href="/feed?page=2"/>
  <entry>
    <title>Совещание с членами Правительства</title>
    <id>http://kremlin.ru/events/president/news/74001</id>
    <updated>2024-05-15T17:30:00+04:00</updated>
    <published>2024-05-15T15:00:00+04:00</published>
    <summary type="html">&lt;p&gt;Кратко&lt;/p&gt;</summary>
    <content type="html">&lt;p&gt;Владимир Путин провёл совещание.&lt;/p&gt;</content>
  </entry>
  <entry>
    <title>Телефонный разговор</title>
    <id>http://kremlin.ru/events/president/news/74002</id>
    <updated>2024-05-15T16:00:00+04:00</updated>
    <content type="html">&lt;p&gt;Состоялся телефонный разговор.&lt;/p&gt;</content>
  </entry>
</feed>"#;

/// Last Atom page: one entry, no `next` link
pub const KREMLIN_PAGE_2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xml:lang="ru">
  <title>Президент России</title>
  <id>http://kremlin.ru/events/all/feed</id>
  <updated>2024-05-15T18:00:00+04:00</updated>
  <link rel="self" href="/feed?page=2"/>
  <link rel="prev" href="/feed"/>
  <entry>
    <title>Встреча с губернатором</title>
    <id>http://kremlin.ru/events/president/news/73990</id>
    <updated>2024-05-14T12:00:00+04:00</updated>
    <content type="html">&lt;p&gt;Глава региона доложил об итогах.&lt;/p&gt;</content>
  </entry>
</feed>"#;

/// mid.ru listing page; links are relative to the mock server
pub const MID_LISTING: &str = r#"
<html><body>
  <ul class="announce announce_articles">
    <li class="announce__item">
      <span class="announce__date">15.05.2024</span>
      <span class="announce__time">12:30</span>
      <a href="/ru/foreign_policy/news/1950000/">Брифинг официального представителя</a>
    </li>
    <li class="announce__item">
      <span class="announce__date">15.05.2024</span>
      <span class="announce__time">10:00</span>
      <a href="/ru/foreign_policy/news/1949999/">Заявление МИД России</a>
    </li>
  </ul>
</body></html>
"#;

/// mid.ru listing page past the last article
pub const MID_LISTING_EMPTY: &str = r#"<html><body><div class="content"></div></body></html>"#;

/// mid.ru photo article page with `paragraphs` body paragraphs
pub fn mid_article(title: &str, paragraphs: usize) -> String {
    let body: String = (0..paragraphs)
        .map(|i| format!("<p>Абзац {i}. {}</p>\n", "Текст заявления. ".repeat(30)))
        .collect();
    format!(
        r#"<html><body>
  <div class="photo-content">
    <h1 class="photo-content__title">{title}</h1>
    <p class="article-line__note article-line__note_small">1001-15-05-2024</p>
    <div class="text article-content">
{body}
    </div>
  </div>
</body></html>"#
    )
}

/// mil.ru JSON news page
pub const MIL_NEWS: &str = r#"{
  "data": [
    {
      "id": 12500001,
      "title": "Учения в Западном военном округе",
      "text": "<p>Военнослужащие выполнили задачи.</p><p>Учения завершены.</p>",
      "link": "/news/12500001",
      "date": "2024-05-15T10:00:00+03:00",
      "preview": "Кратко"
    },
    {
      "id": "12500002",
      "title": "Торжественная церемония",
      "text": "<p>Состоялась церемония.</p>",
      "date": "2024-05-15T09:00:00+03:00"
    }
  ]
}"#;

/// Encode `text` as windows-1251
pub fn cp1251(text: &str) -> Vec<u8> {
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(text);
    bytes.into_owned()
}
