use crate::error::NotificationError;
use crate::models::StorageLocator;
use crate::models::notification::{S3Event, S3EventRecord, SnsEvent, SnsMessage};
use crate::utils::keys::decode_event_key;

/// Only these events describe a newly written object.
pub const CREATED_EVENT_PREFIX: &str = "ObjectCreated:";

/// One storage-change entry of a notification, key already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub locator: StorageLocator,
    pub event_name: Option<String>,
}

impl StorageChange {
    /// Why this change must not go through the pipeline, if it must not.
    ///
    /// Removals have nothing to fetch, and archives written by the pipeline
    /// land in the same bucket and come back as notifications.
    pub fn skip_reason(&self) -> Option<String> {
        if let Some(event) = &self.event_name {
            if !event.starts_with(CREATED_EVENT_PREFIX) {
                return Some(format!("event {} is not an object creation", event));
            }
        }
        if self.locator.key.to_lowercase().ends_with(".zip") {
            return Some("object is an archive".to_string());
        }
        None
    }
}

/// Parse the raw inbound batch.
pub fn parse_batch(payload: &str) -> Result<SnsEvent, NotificationError> {
    serde_json::from_str(payload).map_err(NotificationError::InvalidBatch)
}

/// Extract the storage-change entries wrapped in one notification message.
///
/// The outer error means the message itself is unreadable. Entries are
/// converted one by one, so a malformed entry is reported in its own slot
/// and its siblings are still returned.
pub fn storage_changes(
    message: &SnsMessage,
) -> Result<Vec<Result<StorageChange, NotificationError>>, NotificationError> {
    let message_id = || {
        message
            .message_id
            .clone()
            .unwrap_or_else(|| "<unknown>".to_string())
    };

    let event: S3Event = serde_json::from_str(&message.message).map_err(|source| {
        NotificationError::InvalidMessage {
            message_id: message_id(),
            source,
        }
    })?;

    Ok(event
        .records
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let record: S3EventRecord = serde_json::from_value(raw).map_err(|source| {
                NotificationError::InvalidEntry {
                    message_id: message_id(),
                    index,
                    source,
                }
            })?;
            Ok(StorageChange {
                locator: StorageLocator::new(
                    record.s3.bucket.name,
                    decode_event_key(&record.s3.object.key),
                ),
                event_name: record.event_name,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sns_batch(messages: &[String]) -> String {
        let records: Vec<_> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| {
                json!({
                    "EventSource": "aws:sns",
                    "Sns": { "MessageId": format!("msg-{}", i), "Message": m }
                })
            })
            .collect();
        json!({ "Records": records }).to_string()
    }

    fn change(key: &str, event: Option<&str>) -> StorageChange {
        StorageChange {
            locator: StorageLocator::new("media", key),
            event_name: event.map(str::to_string),
        }
    }

    #[test]
    fn test_nested_s3_event() {
        let s3_event = json!({
            "Records": [
                {
                    "eventName": "ObjectCreated:Put",
                    "s3": {
                        "bucket": { "name": "media" },
                        "object": { "key": "photos/2023/my+cat.png", "size": 1024 }
                    }
                },
                {
                    "s3": {
                        "bucket": { "name": "media" },
                        "object": { "key": "photos/dog.jpg" }
                    }
                }
            ]
        })
        .to_string();

        let batch = parse_batch(&sns_batch(&[s3_event])).unwrap();
        assert_eq!(batch.records.len(), 1);

        let changes: Vec<_> = storage_changes(&batch.records[0].sns)
            .unwrap()
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            changes,
            vec![
                change("photos/2023/my cat.png", Some("ObjectCreated:Put")),
                change("photos/dog.jpg", None),
            ]
        );
    }

    #[test]
    fn test_malformed_entry_keeps_siblings() {
        let s3_event = json!({
            "Records": [
                { "s3": { "bucket": { "name": "media" }, "object": {} } },
                { "s3": { "bucket": { "name": "media" }, "object": { "key": "ok.png" } } }
            ]
        })
        .to_string();

        let batch = parse_batch(&sns_batch(&[s3_event])).unwrap();
        let changes = storage_changes(&batch.records[0].sns).unwrap();

        assert_eq!(changes.len(), 2);
        match &changes[0] {
            Err(NotificationError::InvalidEntry { index, message_id, .. }) => {
                assert_eq!(*index, 0);
                assert_eq!(message_id, "msg-0");
            }
            other => panic!("expected invalid entry, got {:?}", other),
        }
        assert_eq!(changes[1].as_ref().unwrap(), &change("ok.png", None));
    }

    #[test]
    fn test_s3_test_event_has_no_changes() {
        let test_event = json!({
            "Service": "Amazon S3",
            "Event": "s3:TestEvent",
            "Bucket": "media"
        })
        .to_string();

        let batch = parse_batch(&sns_batch(&[test_event])).unwrap();
        assert!(storage_changes(&batch.records[0].sns).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_message_reports_message_id() {
        let batch = parse_batch(&sns_batch(&["not json".to_string()])).unwrap();
        let err = storage_changes(&batch.records[0].sns).unwrap_err();
        assert!(err.to_string().contains("msg-0"));
    }

    #[test]
    fn test_invalid_batch() {
        assert!(matches!(
            parse_batch("{\"Records\": 5}"),
            Err(NotificationError::InvalidBatch(_))
        ));
    }

    #[test]
    fn test_skip_reason() {
        assert!(change("a/b.png", Some("ObjectCreated:Put")).skip_reason().is_none());
        assert!(change("a/b.png", None).skip_reason().is_none());
        assert!(change("a/b.png", Some("ObjectRemoved:Delete")).skip_reason().is_some());
        assert!(change("a/b.ZIP", Some("ObjectCreated:Put")).skip_reason().is_some());
    }
}
