use newsbot::news::rss::RssNewsSource;
use newsbot::news::NewsSource;

fn feed_body(title: &str, items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(item_title, link, date)| {
            format!(
                "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate>\
                 <description>{} description</description></item>",
                item_title, link, date, item_title
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0"><channel><title>{}</title>{}</channel></rss>"#,
        title, items
    )
}

#[tokio::test]
async fn test_rss_source_merges_and_sorts_feeds() {
    let mut server = mockito::Server::new_async().await;

    let older = server
        .mock("GET", "/older.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(feed_body(
            "Older Wire",
            &[("Old story", "https://example.com/old", "Wed, 01 May 2024 08:00:00 GMT")],
        ))
        .create_async()
        .await;

    let newer = server
        .mock("GET", "/newer.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(feed_body(
            "Newer Wire",
            &[("Fresh story", "https://example.com/new", "Wed, 01 May 2024 18:00:00 GMT")],
        ))
        .create_async()
        .await;

    let source = RssNewsSource::new(
        vec![
            format!("{}/older.xml", server.url()),
            format!("{}/newer.xml", server.url()),
        ],
        5,
    )
    .expect("source");

    let articles = source.fetch(None).await;
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].title, "Fresh story");
    assert_eq!(articles[0].source, "Newer Wire");
    assert_eq!(articles[1].title, "Old story");

    older.assert_async().await;
    newer.assert_async().await;
}

#[tokio::test]
async fn test_rss_source_survives_one_broken_feed() {
    let mut server = mockito::Server::new_async().await;

    let broken = server
        .mock("GET", "/broken.xml")
        .with_status(500)
        .create_async()
        .await;

    let healthy = server
        .mock("GET", "/healthy.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(feed_body(
            "Healthy Wire",
            &[("Still here", "https://example.com/ok", "Wed, 01 May 2024 10:00:00 GMT")],
        ))
        .create_async()
        .await;

    let source = RssNewsSource::new(
        vec![
            format!("{}/broken.xml", server.url()),
            format!("{}/healthy.xml", server.url()),
        ],
        5,
    )
    .expect("source");

    let articles = source.fetch(None).await;
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Still here");

    broken.assert_async().await;
    healthy.assert_async().await;
}

#[tokio::test]
async fn test_rss_source_unmatched_query_falls_back_to_full_list() {
    let mut server = mockito::Server::new_async().await;

    // Typical headlines contain none of the default category words
    let _mock = server
        .mock("GET", "/feed.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(feed_body(
            "World Wire",
            &[
                ("Ceasefire talks resume in Cairo", "https://example.com/1", "Wed, 01 May 2024 10:00:00 GMT"),
                ("Markets rally after rate decision", "https://example.com/2", "Wed, 01 May 2024 11:00:00 GMT"),
            ],
        ))
        .create_async()
        .await;

    let source = RssNewsSource::new(vec![format!("{}/feed.xml", server.url())], 5)
        .expect("source");

    let query = newsbot::settings::Settings::default().default_query();
    let articles = source.fetch(Some(query.as_str())).await;

    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].title, "Markets rally after rate decision");
}

#[tokio::test]
async fn test_rss_source_query_filters_entries() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/feed.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(feed_body(
            "Mixed Wire",
            &[
                ("Elections update", "https://example.com/1", "Wed, 01 May 2024 10:00:00 GMT"),
                ("Sports roundup", "https://example.com/2", "Wed, 01 May 2024 11:00:00 GMT"),
            ],
        ))
        .create_async()
        .await;

    let source = RssNewsSource::new(vec![format!("{}/feed.xml", server.url())], 5)
        .expect("source");

    let articles = source.fetch(Some("elections")).await;
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Elections update");
}
