//! Scripted service clients
//!
//! Each mock answers from a closure of `(call number, request)` and records
//! every request it receives. Clones share the script and the call log.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use super::{
    IdBatchResponse, MessageEntry, ObjectApi, QueueApi, ServiceCallError, StreamApi, StreamEntry,
    StreamEntryResult, TableApi, TableItem, TopicApi,
};

type Script<Q, R> = dyn Fn(usize, &Q) -> Result<R, ServiceCallError> + Send + Sync;

/// A request received by a mock client
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall<Q> {
    /// Queue URL, topic ARN, stream, table or bucket
    pub destination: String,
    pub request: Q,
}

struct Recorder<Q, R> {
    script: Box<Script<Q, R>>,
    calls: Mutex<Vec<MockCall<Q>>>,
}

impl<Q: Clone, R> Recorder<Q, R> {
    fn new(script: impl Fn(usize, &Q) -> Result<R, ServiceCallError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call(&self, destination: &str, request: Q) -> Result<R, ServiceCallError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            calls.push(MockCall {
                destination: destination.to_string(),
                request: request.clone(),
            });
            calls.len() - 1
        };
        (self.script)(call_number, &request)
    }

    fn calls(&self) -> Vec<MockCall<Q>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Mock SQS/SNS client
#[derive(Clone)]
pub struct MockMessageClient {
    inner: Arc<Recorder<Vec<MessageEntry>, IdBatchResponse>>,
}

impl MockMessageClient {
    pub fn new(
        script: impl Fn(usize, &Vec<MessageEntry>) -> Result<IdBatchResponse, ServiceCallError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Recorder::new(script)),
        }
    }

    /// Every entry succeeds
    pub fn accepting_all() -> Self {
        Self::new(|_, entries| Ok(IdBatchResponse::all_successful(entries)))
    }

    /// Every call fails as a whole
    pub fn failing(err: ServiceCallError) -> Self {
        Self::new(move |_, _| Err(err.clone()))
    }

    pub fn calls(&self) -> Vec<MockCall<Vec<MessageEntry>>> {
        self.inner.calls()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls().len()
    }
}

impl QueueApi for MockMessageClient {
    async fn send_batch(
        &self,
        queue_url: &str,
        entries: Vec<MessageEntry>,
    ) -> Result<IdBatchResponse, ServiceCallError> {
        self.inner.call(queue_url, entries)
    }
}

impl TopicApi for MockMessageClient {
    async fn send_batch(
        &self,
        topic_arn: &str,
        entries: Vec<MessageEntry>,
    ) -> Result<IdBatchResponse, ServiceCallError> {
        self.inner.call(topic_arn, entries)
    }
}

/// Mock Kinesis/Firehose client
#[derive(Clone)]
pub struct MockStreamClient {
    inner: Arc<Recorder<Vec<StreamEntry>, Vec<StreamEntryResult>>>,
}

impl MockStreamClient {
    pub fn new(
        script: impl Fn(usize, &Vec<StreamEntry>) -> Result<Vec<StreamEntryResult>, ServiceCallError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Recorder::new(script)),
        }
    }

    pub fn accepting_all() -> Self {
        Self::new(|_, entries| Ok(vec![StreamEntryResult::ok(); entries.len()]))
    }

    pub fn failing(err: ServiceCallError) -> Self {
        Self::new(move |_, _| Err(err.clone()))
    }

    pub fn calls(&self) -> Vec<MockCall<Vec<StreamEntry>>> {
        self.inner.calls()
    }
}

impl StreamApi for MockStreamClient {
    async fn put_batch(
        &self,
        stream: &str,
        entries: Vec<StreamEntry>,
    ) -> Result<Vec<StreamEntryResult>, ServiceCallError> {
        self.inner.call(stream, entries)
    }
}

/// Mock DynamoDB client; the script returns unprocessed item ids
#[derive(Clone)]
pub struct MockTableClient {
    inner: Arc<Recorder<Vec<TableItem>, Vec<String>>>,
}

impl MockTableClient {
    pub fn new(
        script: impl Fn(usize, &Vec<TableItem>) -> Result<Vec<String>, ServiceCallError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Recorder::new(script)),
        }
    }

    pub fn accepting_all() -> Self {
        Self::new(|_, _| Ok(Vec::new()))
    }

    pub fn failing(err: ServiceCallError) -> Self {
        Self::new(move |_, _| Err(err.clone()))
    }

    pub fn calls(&self) -> Vec<MockCall<Vec<TableItem>>> {
        self.inner.calls()
    }
}

impl TableApi for MockTableClient {
    async fn batch_write(
        &self,
        table: &str,
        items: Vec<TableItem>,
    ) -> Result<Vec<String>, ServiceCallError> {
        self.inner.call(table, items)
    }
}

/// Object written through [`MockObjectClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub key: String,
    pub body: Bytes,
}

/// Mock S3 client
#[derive(Clone)]
pub struct MockObjectClient {
    inner: Arc<Recorder<PutObjectRequest, ()>>,
}

impl MockObjectClient {
    pub fn new(
        script: impl Fn(usize, &PutObjectRequest) -> Result<(), ServiceCallError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Recorder::new(script)),
        }
    }

    pub fn accepting_all() -> Self {
        Self::new(|_, _| Ok(()))
    }

    pub fn failing(err: ServiceCallError) -> Self {
        Self::new(move |_, _| Err(err.clone()))
    }

    pub fn calls(&self) -> Vec<MockCall<PutObjectRequest>> {
        self.inner.calls()
    }
}

impl ObjectApi for MockObjectClient {
    async fn write_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), ServiceCallError> {
        self.inner.call(
            bucket,
            PutObjectRequest {
                key: key.to_string(),
                body,
            },
        )
    }
}
