use super::*;

#[test]
fn record_serialization_roundtrip() {
    let record = DocumentRecord {
        id: "doc1".to_string(),
        content: "Some passage text".to_string(),
        vector: vec![0.1, 0.2, 0.3],
        created_at: "2024-01-01T00:00:00Z".to_string(),
    };

    let json = serde_json::to_string(&record).expect("should serialize record");
    let parsed: DocumentRecord = serde_json::from_str(&json).expect("should parse record");
    assert_eq!(record, parsed);
}

#[test]
fn new_record_is_timestamped() {
    let record = DocumentRecord::new("doc1".to_string(), "text".to_string(), vec![0.5]);
    assert_eq!(record.id, "doc1");
    assert!(!record.created_at.is_empty());
    assert!(
        record.created_at.parse::<chrono::DateTime<chrono::Utc>>().is_ok(),
        "created_at should be a valid RFC 3339 timestamp"
    );
}
