use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════
//  Producer side: records in flight
// ═══════════════════════════════════════════════════════════════

/// A key/value pair submitted to a producer session.
///
/// Submitting moves the record into the broker client. The client hands
/// it back exactly once through its delivery callback, which calls
/// [`PendingRecord::complete`]; that is where the buffers are released.
/// No other path owns the record after submission.
#[derive(Debug)]
pub struct PendingRecord {
    seq: u64,
    key: Arc<[u8]>,
    value: Arc<[u8]>,
}

impl PendingRecord {
    /// Build the record for input line number `seq`. The key is `Key_<seq>`;
    /// the value is the line as read, with no encoding assumed.
    pub fn new(seq: u64, line: &[u8]) -> Self {
        Self {
            seq,
            key: Arc::from(format!("Key_{seq}").into_bytes()),
            value: Arc::from(line),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Shared handles to the key and value bytes, for clients that need
    /// to borrow them while the record itself travels as the callback
    /// payload.
    pub fn payload_handles(&self) -> (Arc<[u8]>, Arc<[u8]>) {
        (Arc::clone(&self.key), Arc::clone(&self.value))
    }

    /// Delivery callback body: release the record. Nothing else happens
    /// here, the client invokes it at most once per submitted record.
    pub fn complete(self, delivery: &Delivery) {
        match delivery {
            Delivery::Delivered { partition, offset } => {
                tracing::trace!(seq = self.seq, partition, offset, "record delivered");
            }
            Delivery::Failed(reason) => {
                tracing::debug!(seq = self.seq, %reason, "record not delivered");
            }
        }
    }
}

/// Outcome reported by the broker client for one submitted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered { partition: i32, offset: i64 },
    Failed(String),
}

// ═══════════════════════════════════════════════════════════════
//  Consumer side: polled batches
// ═══════════════════════════════════════════════════════════════

/// One message inside a polled record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

/// Messages of one topic partition returned by a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    pub topic: String,
    pub partition: i32,
    pub messages: Vec<ConsumedMessage>,
}

impl ConsumerRecord {
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Group a flat poll result into records by (topic, partition),
    /// keeping the order in which partitions first appeared.
    pub fn group<I>(messages: I) -> Vec<ConsumerRecord>
    where
        I: IntoIterator<Item = (String, i32, ConsumedMessage)>,
    {
        let mut records: Vec<ConsumerRecord> = Vec::new();
        for (topic, partition, msg) in messages {
            match records
                .iter_mut()
                .find(|r| r.partition == partition && r.topic == topic)
            {
                Some(rec) => rec.messages.push(msg),
                None => records.push(ConsumerRecord {
                    topic,
                    partition,
                    messages: vec![msg],
                }),
            }
        }
        records
    }
}

/// How a commit waits for the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Sync,
    Async,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(offset: i64, value: &str) -> ConsumedMessage {
        ConsumedMessage {
            offset,
            key: None,
            value: Some(value.as_bytes().to_vec()),
        }
    }

    #[test]
    fn key_is_derived_from_sequence() {
        let rec = PendingRecord::new(41, b"hello");
        assert_eq!(rec.key(), b"Key_41");
        assert_eq!(rec.value(), b"hello");
        assert_eq!(rec.seq(), 41);
    }

    #[test]
    fn value_keeps_non_utf8_bytes() {
        let rec = PendingRecord::new(3, b"caf\xe9");
        assert_eq!(rec.value(), &[b'c', b'a', b'f', 0xe9][..]);
        assert_eq!(rec.key(), b"Key_3");
    }

    #[test]
    fn complete_releases_the_buffers() {
        let rec = PendingRecord::new(0, b"line");
        let (key, value) = rec.payload_handles();
        assert_eq!(Arc::strong_count(&key), 2);
        rec.complete(&Delivery::Delivered { partition: 0, offset: 7 });
        assert_eq!(Arc::strong_count(&key), 1);
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn group_keeps_partition_order() {
        let grouped = ConsumerRecord::group(vec![
            ("a".to_string(), 0, msg(0, "x")),
            ("b".to_string(), 0, msg(0, "y")),
            ("a".to_string(), 0, msg(1, "z")),
            ("a".to_string(), 1, msg(0, "w")),
        ]);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].topic, "a");
        assert_eq!(grouped[0].message_count(), 2);
        assert_eq!(grouped[1].topic, "b");
        assert_eq!(grouped[2].partition, 1);
    }
}
