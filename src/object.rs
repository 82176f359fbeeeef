//! The progressive, append-only object buffer.
//!
//! An [`Object`] is written once by a single producer and read by any number
//! of concurrent consumers, including consumers that started reading before
//! the producer finished (tailing reads). Unlike a plain byte buffer, a read
//! past the currently written data is not EOF until the writer calls
//! [`Object::close`] — it instead parks until more data arrives or the
//! object closes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::HeaderMap;
use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::body::CacheBody;

struct State {
    buffer: Vec<u8>,
    eof: bool,
    on_disk: bool,
}

/// A single named object tracked by the cache.
///
/// `name`, `headers`, `max_age_seconds` and `received_at` are fixed at
/// creation; only `buffer`, `eof` and `on_disk` mutate over the object's
/// life, guarded by one RW lock.
pub struct Object {
    name: String,
    headers: HeaderMap,
    max_age_seconds: i64,
    received_at: Instant,
    lock: RwLock<State>,
    notify: Notify,
}

impl Object {
    pub fn new(name: impl Into<String>, headers: HeaderMap, max_age_seconds: i64) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            headers,
            max_age_seconds,
            received_at: Instant::now(),
            lock: RwLock::new(State {
                buffer: Vec::new(),
                eof: false,
                on_disk: false,
            }),
            notify: Notify::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
    }

    pub fn is_closed(&self) -> bool {
        self.lock.read().eof
    }

    pub fn is_on_disk(&self) -> bool {
        self.lock.read().on_disk
    }

    pub fn len(&self) -> usize {
        self.lock.read().buffer.len()
    }

    /// Whether this object is past its `maxAge` and eligible for eviction.
    pub fn is_expired(&self, now: Instant) -> bool {
        if self.max_age_seconds < 0 || !self.is_closed() {
            return false;
        }
        now > self.received_at + Duration::from_secs(self.max_age_seconds as u64)
    }

    /// Appends a chunk to the buffer and wakes any parked tailing readers.
    pub fn write(&self, chunk: &[u8]) {
        {
            let mut state = self.lock.write();
            state.buffer.extend_from_slice(chunk);
        }
        self.notify.notify_waiters();
    }

    /// Marks the object complete. After this, tailing reads past the end of
    /// the buffer return EOF instead of parking.
    pub fn close(&self) {
        {
            let mut state = self.lock.write();
            state.eof = true;
        }
        self.notify.notify_waiters();
    }

    fn disk_path(base_path: &Path, name: &str) -> PathBuf {
        base_path.join(name.trim_start_matches('/'))
    }

    /// Persists the buffer to `base_path/name`, then releases it. Only
    /// valid once the object is closed; the caller upholds that ordering.
    pub async fn write_to_disk(&self, base_path: &Path) -> std::io::Result<()> {
        debug_assert!(self.is_closed(), "write_to_disk called before close");

        let path = Self::disk_path(base_path, &self.name);
        let data = self.lock.read().buffer.clone();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;

        let mut state = self.lock.write();
        state.on_disk = true;
        state.buffer = Vec::new();
        Ok(())
    }

    /// Best-effort unlink of the on-disk file. Clears `on_disk` and the
    /// buffer regardless of whether the unlink succeeded.
    pub async fn remove_from_disk(&self, base_path: &Path) -> std::io::Result<()> {
        let path = Self::disk_path(base_path, &self.name);
        let result = tokio::fs::remove_file(&path).await;

        let mut state = self.lock.write();
        state.on_disk = false;
        state.buffer = Vec::new();

        result
    }

    /// Opens a reader appropriate to this object's current state: a
    /// streaming file read once spilled to disk, or a tailing in-memory
    /// stream otherwise.
    pub async fn open_reader(self: &Arc<Self>, base_path: &Path) -> std::io::Result<CacheBody> {
        if self.is_on_disk() {
            let path = Self::disk_path(base_path, &self.name);
            let file = tokio::fs::File::open(path).await?;
            let stream = tokio_util::io::ReaderStream::new(file);
            Ok(CacheBody::from_stream(stream))
        } else {
            Ok(self.tail())
        }
    }

    /// Produces a streaming body that yields data as it becomes available,
    /// ending only once the object is closed. Reading an already-closed
    /// in-memory object yields its buffer in one frame and completes.
    ///
    /// The `Notified` future for each park is created *before* the buffer
    /// is re-checked and held alive across the `.await` point (the
    /// generator's state machine keeps it pinned in place rather than
    /// dropping it on a `Pending` return). Both are required: creating it
    /// first closes the window where a `write`/`close` between the check
    /// and the park would otherwise be missed — tokio's `Notify` guarantees
    /// a `Notified` observes any `notify_waiters()` call that happens after
    /// it was constructed, even before it is first polled — and holding it
    /// alive keeps the waker registered while parked, since dropping a
    /// `Notified` mid-wait deregisters it.
    fn tail(self: &Arc<Self>) -> CacheBody {
        let object = self.clone();
        CacheBody::from_stream(tail_stream(object))
    }
}

fn tail_stream(
    object: Arc<Object>,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    async_stream::try_stream! {
        let mut offset = 0usize;
        loop {
            let notified = object.notify.notified();
            tokio::pin!(notified);

            let (chunk, eof) = {
                let state = object.lock.read();
                if offset < state.buffer.len() {
                    (
                        Some(Bytes::copy_from_slice(&state.buffer[offset..])),
                        state.eof,
                    )
                } else {
                    (None, state.eof)
                }
            };

            if let Some(chunk) = chunk {
                offset += chunk.len();
                yield chunk;
                continue;
            }

            if eof {
                break;
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use http_body_util::BodyExt;

    fn headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(http::header::CONTENT_TYPE, "text/plain".parse().unwrap());
        h
    }

    /// Regression test for a lost-wakeup bug: a reader that catches up to
    /// the writer and parks must still observe a later `write`/`close`.
    /// Before the fix, the `Notified` future backing the park was dropped
    /// on every `Poll::Pending` return, deregistering its waker, so this
    /// would hang instead of observing "world" and then EOF.
    #[tokio::test]
    async fn tail_stream_waits_for_more_data_then_completes() {
        let object = Object::new("s1", headers(), -1);
        object.write(b"hello ");

        let mut body = object.tail();
        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), Bytes::from_static(b"hello "));

        let producer = object.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            producer.write(b"world");
            producer.close();
        });

        let second = body.frame().await.unwrap().unwrap();
        assert_eq!(second.into_data().unwrap(), Bytes::from_static(b"world"));
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn closed_object_yields_everything_then_ends() {
        let object = Object::new("s2", headers(), -1);
        object.write(b"abc");
        object.close();

        let stream = tail_stream(object.clone());
        tokio::pin!(stream);
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk, Bytes::from_static(b"abc"));
        assert!(stream.next().await.is_none());
    }

    /// Two readers tailing the same object both observe the same bytes
    /// after parking, since `write`/`close` use `notify_waiters()` rather
    /// than waking a single reader.
    #[tokio::test]
    async fn multiple_tailing_readers_are_all_woken() {
        let object = Object::new("s5", headers(), -1);

        let mut reader_a = object.tail();
        let mut reader_b = object.tail();

        let producer = object.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            producer.write(b"data");
            producer.close();
        });

        let a = reader_a.frame().await.unwrap().unwrap();
        let b = reader_b.frame().await.unwrap().unwrap();
        assert_eq!(a.into_data().unwrap(), Bytes::from_static(b"data"));
        assert_eq!(b.into_data().unwrap(), Bytes::from_static(b"data"));
        assert!(reader_a.frame().await.is_none());
        assert!(reader_b.frame().await.is_none());
    }

    #[test]
    fn expiry_requires_eof_and_nonnegative_max_age() {
        let object = Object::new("s3", headers(), 0);
        assert!(!object.is_expired(Instant::now()));
        object.close();
        assert!(object.is_expired(Instant::now() + Duration::from_millis(1)));
    }

    #[test]
    fn negative_max_age_never_expires() {
        let object = Object::new("s4", headers(), -1);
        object.close();
        assert!(!object.is_expired(Instant::now() + Duration::from_secs(9999)));
    }

    #[tokio::test]
    async fn disk_round_trip_clears_buffer_and_serves_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let object = Object::new("nested/stream.ts", headers(), -1);
        object.write(b"segment-bytes");
        object.close();

        object.write_to_disk(dir.path()).await.unwrap();
        assert!(object.is_on_disk());
        assert_eq!(object.len(), 0);

        let mut body = object.open_reader(dir.path()).await.unwrap();
        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(
            frame.into_data().unwrap(),
            Bytes::from_static(b"segment-bytes")
        );

        object.remove_from_disk(dir.path()).await.unwrap();
        assert!(!object.is_on_disk());
    }
}
