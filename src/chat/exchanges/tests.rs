use super::*;
use tempfile::TempDir;

fn exchange(question: &str, answer: Option<&str>) -> Exchange {
    Exchange {
        request_id: Uuid::new_v4(),
        question: question.to_string(),
        prompt: format!("Question: {question}"),
        answer: answer.map(str::to_string),
        reply: answer.unwrap_or("fallback").to_string(),
        source_urls: vec!["https://aframe.io/docs/master/core/entity.md".to_string()],
        error: answer.is_none().then(|| "model not loaded".to_string()),
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

#[tokio::test]
async fn memory_log_keeps_order() {
    let log = MemoryExchangeLog::new();
    let first = exchange("What is an entity?", Some("An object."));
    let second = exchange("What is a light?", None);

    log.record(&first).await.expect("record");
    log.record(&second).await.expect("record");

    let recorded = log.exchanges().expect("exchanges");
    assert_eq!(recorded, vec![first, second]);
    assert!(recorded[0].is_answered());
    assert!(!recorded[1].is_answered());
}

#[tokio::test]
async fn jsonl_log_appends_and_loads() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let log = JsonlExchangeLog::new(temp_dir.path().join("nested").join("exchanges.jsonl"));

    assert!(log.load().await.expect("load").is_empty());

    let first = exchange("What is an entity?", Some("An object.\nWith lines."));
    let second = exchange("What is a light?", None);
    log.record(&first).await.expect("record");
    log.record(&second).await.expect("record");

    let content = std::fs::read_to_string(log.path()).expect("read log");
    assert_eq!(content.lines().count(), 2);
    assert_eq!(log.load().await.expect("load"), vec![first, second]);
}

#[tokio::test]
async fn malformed_line_is_reported() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("exchanges.jsonl");
    std::fs::write(&path, "{not json}\n").expect("write");

    assert!(JsonlExchangeLog::new(path).load().await.is_err());
}
