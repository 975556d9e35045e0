use anyhow::Result;
use feedback_collector::{
    CanonicalTable, CollectorConfig, CollectorError, CollectorSettings, EtlEngine,
    FeedbackCollector, TableSink, TableTarget,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct RecordingSink {
    writes: Arc<Mutex<Vec<(TableTarget, CanonicalTable)>>>,
}

impl RecordingSink {
    async fn write_count(&self) -> usize {
        self.writes.lock().await.len()
    }
}

impl TableSink for RecordingSink {
    async fn replace_table(
        &self,
        target: &TableTarget,
        table: &CanonicalTable,
    ) -> feedback_collector::Result<()> {
        self.writes
            .lock()
            .await
            .push((target.clone(), table.clone()));
        Ok(())
    }
}

fn collector_for(server: &MockServer, sink: RecordingSink) -> FeedbackCollector<RecordingSink> {
    let config = CollectorConfig {
        base_url: server.url("/v1/responses?page="),
        token: "test-token".to_string(),
        target: TableTarget::new("ml_output", "customer_feedback"),
        settings: CollectorSettings::default(),
    };
    FeedbackCollector::new(config, sink).unwrap()
}

/// 模擬調查 API 的一筆回饋
fn feedback_record(i: usize) -> Value {
    json!({
        "id": i,
        "score": i % 11,
        "score_type": "nps",
        "comment": format!("Thanks {}", i),
        "posted_date": "2024-03-01T12:00:00Z",
        "survey": {"name": "Post purchase"},
        "contact": {
            "email": format!("customer{}@example.com", i),
            "attributes": {
                "Order Id": format!("A{}", i),
                "order id": null,
                "Order Number": format!("N{}", i),
                "Campaign": "spring"
            }
        }
    })
}

fn page_body(count: usize, range: std::ops::Range<usize>) -> Value {
    let results: Vec<Value> = range.map(feedback_record).collect();
    json!({"count": count, "results": results})
}

#[tokio::test]
async fn test_end_to_end_two_pages_stored_once() -> Result<()> {
    let server = MockServer::start();
    let page1 = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/responses")
            .query_param("page", "1")
            .header("Authorization", "Token test-token");
        then.status(200).json_body(page_body(150, 0..100));
    });
    let page2 = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/responses")
            .query_param("page", "2")
            .header("Authorization", "Token test-token");
        then.status(200).json_body(page_body(150, 100..150));
    });

    let sink = RecordingSink::default();
    let mut engine = EtlEngine::new(collector_for(&server, sink.clone()));

    let destination = engine.run().await?;

    assert_eq!(destination, "ml_output.customer_feedback");
    page1.assert_hits(2);
    page2.assert_hits(1);

    let writes = sink.writes.lock().await;
    assert_eq!(writes.len(), 1);
    let (target, table) = &writes[0];
    assert_eq!(target, &TableTarget::new("ml_output", "customer_feedback"));
    assert_eq!(table.len(), 150);
    assert_eq!(
        table.columns,
        vec![
            "order_id",
            "order_number",
            "contact_email",
            "score",
            "score_type",
            "posted_date",
            "comment",
            "campaign"
        ]
    );
    assert_eq!(table.cell(0, "order_id"), Some(&json!("A0")));
    assert_eq!(table.cell(149, "contact_email"), Some(&json!("customer149@example.com")));
    assert!(table.cell(0, "survey_name").is_none());

    // 收集結果仍保留在收集器中
    let collector = engine.into_pipeline();
    assert_eq!(collector.feedback().map(|t| t.len()), Some(150));
    Ok(())
}

#[tokio::test]
async fn test_server_error_on_middle_page_aborts_before_store() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "1");
        then.status(200).json_body(page_body(300, 0..100));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "2");
        then.status(500);
    });
    let page3 = server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "3");
        then.status(200).json_body(page_body(300, 200..300));
    });

    let sink = RecordingSink::default();
    let mut engine = EtlEngine::new(collector_for(&server, sink.clone()));

    let err = engine.run().await.unwrap_err();

    match err {
        CollectorError::ApiStatusError { url, status } => {
            assert_eq!(status, 500);
            assert!(url.ends_with("page=2"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    page3.assert_hits(0);
    assert_eq!(sink.write_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_results_key_halts_collection() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "1");
        then.status(200).json_body(page_body(250, 0..100));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "2");
        then.status(200).json_body(json!({"count": 250, "detail": "throttled"}));
    });
    let page3 = server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "3");
        then.status(200).json_body(page_body(250, 200..250));
    });

    let sink = RecordingSink::default();
    let mut collector = collector_for(&server, sink.clone());

    let err = collector.collect_feedback().await.unwrap_err();

    match err {
        CollectorError::ApiShapeError { keys, .. } => {
            assert_eq!(keys, vec!["count", "detail"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    page3.assert_hits(0);
    assert!(collector.feedback().is_none());
    assert_eq!(sink.write_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_row_count_matches_reported_total() -> Result<()> {
    for total in [1usize, 99, 100, 101, 399] {
        let server = MockServer::start();
        let pages = total.div_ceil(100);
        for page in 1..=pages {
            let start = (page - 1) * 100;
            let end = (start + 100).min(total);
            server.mock(|when, then| {
                when.method(GET)
                    .path("/v1/responses")
                    .query_param("page", page.to_string());
                then.status(200).json_body(page_body(total, start..end));
            });
        }

        let mut collector = collector_for(&server, RecordingSink::default());
        let table = collector.accumulate_pages().await?;

        assert_eq!(table.len(), total, "total={}", total);
    }
    Ok(())
}

#[tokio::test]
async fn test_page_without_order_id_is_not_backfilled() -> Result<()> {
    let server = MockServer::start();
    let mut second_page: Vec<Value> = Vec::new();
    for i in 100..102 {
        let mut record = feedback_record(i);
        let attributes = record["contact"]["attributes"]
            .as_object_mut()
            .expect("fixture has attributes");
        attributes.remove("Order Id");
        attributes.remove("order id");
        second_page.push(record);
    }

    server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "1");
        then.status(200).json_body(page_body(102, 0..100));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "2");
        then.status(200)
            .json_body(json!({"count": 102, "results": second_page}));
    });

    let mut collector = collector_for(&server, RecordingSink::default());
    let table = collector.collect_feedback().await?;

    assert_eq!(table.len(), 102);
    assert_eq!(table.cell(99, "order_id"), Some(&json!("A99")));
    // 第二頁兩種寫法都沒有：保持無值，不從其他頁補
    assert!(table.cell(100, "order_id").is_none());
    assert!(table.cell(101, "order_id").is_none());
    Ok(())
}

#[tokio::test]
async fn test_comment_sanitized_end_to_end() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "1");
        then.status(200).json_body(json!({
            "count": 3,
            "results": [
                {"id": 1, "comment": "Great\u{0}ñ service"},
                {"id": 2, "comment": null},
                {"id": 3, "comment": ""}
            ]
        }));
    });

    let mut collector = collector_for(&server, RecordingSink::default());
    let table = collector.collect_feedback().await?;

    assert_eq!(table.cell(0, "comment"), Some(&json!("Great  service")));
    assert_eq!(table.cell(1, "comment"), Some(&Value::Null));
    assert_eq!(table.cell(2, "comment"), Some(&json!("")));
    Ok(())
}

#[tokio::test]
async fn test_zero_records_replaces_with_empty_table() -> Result<()> {
    let server = MockServer::start();
    let page1 = server.mock(|when, then| {
        when.method(GET).path("/v1/responses").query_param("page", "1");
        then.status(200).json_body(json!({"count": 0, "results": []}));
    });

    let sink = RecordingSink::default();
    let mut engine = EtlEngine::new(collector_for(&server, sink.clone()));
    engine.run().await?;

    // 只有計數請求
    page1.assert_hits(1);
    let writes = sink.writes.lock().await;
    assert_eq!(writes.len(), 1);
    assert!(writes[0].1.is_empty());
    Ok(())
}
