// tests/store_memory.rs
//
// Unique-key semantics of the in-memory reference store.

use chrono::{Duration, NaiveDate, Utc};
use stock_report_hub::store::{
    content_hash, ContentStore, NewReport, NewSummary, SourceKind,
};
use stock_report_hub::MemoryStore;

fn asof(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn upsert_source_is_idempotent_by_url() {
    let store = MemoryStore::new();
    let a = store
        .upsert_source("Research Page", SourceKind::Html, "https://r.example/daily")
        .await
        .unwrap();
    let b = store
        .upsert_source("Another Name", SourceKind::Html, "https://r.example/daily")
        .await
        .unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(b.name, "Research Page", "existing row is returned unchanged");
    assert_eq!(store.list_sources().await.unwrap().len(), 1);
}

#[tokio::test]
async fn strict_create_reports_taken_keys_without_writing() {
    let store = MemoryStore::new();

    let first = store
        .create_source("Research Page", SourceKind::Html, "https://r.example/daily")
        .await
        .unwrap();
    assert!(first.is_some());
    let dup = store
        .create_source("Other Name", SourceKind::Pdf, "https://r.example/daily")
        .await
        .unwrap();
    assert!(dup.is_none(), "taken url is reported, nothing is written");
    assert_eq!(store.list_sources().await.unwrap().len(), 1);

    assert!(store.create_ticker("005930", "삼성전자").await.unwrap().is_some());
    assert!(store.create_ticker("005930", "삼성 전자").await.unwrap().is_none());
    assert_eq!(store.list_tickers().await.unwrap().len(), 1);

    // Upsert keeps its own contract on the same key.
    let upserted = store.upsert_ticker("005930", "무시되는 이름").await.unwrap();
    assert_eq!(upserted.name, "삼성전자");
}

#[tokio::test]
async fn identical_text_dedups_across_publish_timestamps() {
    let store = MemoryStore::new();
    let source = store
        .upsert_source("Research Page", SourceKind::Html, "https://r.example/daily")
        .await
        .unwrap();

    let text = "삼성전자 실적 전망 상향.";
    let first = store
        .insert_report_if_new(NewReport {
            source_id: source.id,
            title: "아침 리포트".into(),
            published_at: Utc::now(),
            raw_text: text.into(),
            raw_hash: content_hash(text),
        })
        .await
        .unwrap();
    assert!(first.is_some());

    // Same content an hour later: the hash guard wins regardless of timestamp.
    let second = store
        .insert_report_if_new(NewReport {
            source_id: source.id,
            title: "저녁 리포트".into(),
            published_at: Utc::now() + Duration::hours(1),
            raw_text: text.into(),
            raw_hash: content_hash(text),
        })
        .await
        .unwrap();
    assert!(second.is_none(), "duplicate content is a silent skip");
}

#[tokio::test]
async fn mention_upsert_reports_created_exactly_once() {
    let store = MemoryStore::new();
    let source = store
        .upsert_source("Research Page", SourceKind::Html, "https://r.example/daily")
        .await
        .unwrap();
    let report = store
        .insert_report_if_new(NewReport {
            source_id: source.id,
            title: "리포트".into(),
            published_at: Utc::now(),
            raw_text: "본문".into(),
            raw_hash: content_hash("본문"),
        })
        .await
        .unwrap()
        .unwrap();
    let ticker = store.upsert_ticker("005930", "삼성전자").await.unwrap();

    let first = store
        .create_or_update_mention(report.id, ticker.id, &["스니펫 A".into()])
        .await
        .unwrap();
    assert!(first.created);

    let second = store
        .create_or_update_mention(
            report.id,
            ticker.id,
            &["스니펫 A".into(), "스니펫 B".into()],
        )
        .await
        .unwrap();
    assert!(!second.created, "same (report, ticker) pair updates in place");

    let stored = store
        .find_mention(report.id, ticker.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.snippet_lines(), vec!["스니펫 A", "스니펫 B"]);
}

#[tokio::test]
async fn recent_mentions_order_by_publish_time_desc() {
    let store = MemoryStore::new();
    let source = store
        .upsert_source("Research Page", SourceKind::Html, "https://r.example/daily")
        .await
        .unwrap();
    let ticker = store.upsert_ticker("005930", "삼성전자").await.unwrap();

    let now = Utc::now();
    for (offset, text) in [(2, "오래된 본문"), (0, "최신 본문"), (1, "중간 본문")] {
        let report = store
            .insert_report_if_new(NewReport {
                source_id: source.id,
                title: "리포트".into(),
                published_at: now - Duration::days(offset),
                raw_text: text.into(),
                raw_hash: content_hash(text),
            })
            .await
            .unwrap()
            .unwrap();
        store
            .create_or_update_mention(report.id, ticker.id, &[text.to_string()])
            .await
            .unwrap();
    }

    let rows = store.recent_mentions(ticker.id, 2).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].snippets, "최신 본문");
    assert_eq!(rows[1].snippets, "중간 본문");
}

#[tokio::test]
async fn summary_insert_is_once_per_symbol_and_date() {
    let store = MemoryStore::new();
    let date = asof("2026-08-30");

    assert!(!store.summary_exists("005930", date).await.unwrap());
    let created = store
        .insert_summary(NewSummary {
            symbol: "005930".into(),
            asof_date: date,
            summary: "요약".into(),
            bullets: vec!["핵심".into()],
            confidence: 70,
        })
        .await
        .unwrap();
    assert!(created);
    assert!(store.summary_exists("005930", date).await.unwrap());

    // Racing duplicate converts to a no-op, not an error.
    let raced = store
        .insert_summary(NewSummary {
            symbol: "005930".into(),
            asof_date: date,
            summary: "다른 요약".into(),
            bullets: Vec::new(),
            confidence: 10,
        })
        .await
        .unwrap();
    assert!(!raced);

    let row = store.find_summary("005930", date).await.unwrap().unwrap();
    assert_eq!(row.summary, "요약");
    assert_eq!(row.bullets, vec!["핵심"]);
    assert_eq!(row.confidence, 70);

    // A different date is a fresh slot.
    assert!(!store.summary_exists("005930", asof("2026-08-31")).await.unwrap());
}
