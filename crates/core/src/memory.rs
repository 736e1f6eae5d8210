//! In-process transfer port
//!
//! `MemoryStore` keeps objects in a map and records every call it receives,
//! which makes it the fake of choice for exercising the client without a
//! network. Failures and latency can be injected per location.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::location::Location;
use crate::port::{ByteStream, LocationStream, ObjectInfo, TransferPort};

/// A call observed by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCall {
    Get(Location),
    Put(Location),
    List(Location),
    Exists(Location),
    Stat(Location),
    Copy(Location, Location),
    Delete(Location),
    MultipartGet(Location),
    MultipartPut(Location),
}

impl PortCall {
    /// The location the call targets (the destination for copies)
    pub fn location(&self) -> &Location {
        match self {
            PortCall::Get(l)
            | PortCall::Put(l)
            | PortCall::List(l)
            | PortCall::Exists(l)
            | PortCall::Stat(l)
            | PortCall::Delete(l)
            | PortCall::MultipartGet(l)
            | PortCall::MultipartPut(l)
            | PortCall::Copy(_, l) => l,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<Location, Bytes>>,
    calls: Mutex<Vec<PortCall>>,
    failing: Mutex<HashSet<Location>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object
    pub fn insert(&self, location: &Location, data: impl Into<Bytes>) {
        self.lock_objects().insert(location.clone(), data.into());
    }

    pub fn object(&self, location: &Location) -> Option<Bytes> {
        self.lock_objects().get(location).cloned()
    }

    /// Every stored location, sorted
    pub fn locations(&self) -> Vec<Location> {
        self.lock_objects().keys().cloned().collect()
    }

    /// Make every operation on `location` fail with a transfer error
    pub fn fail_on(&self, location: &Location) {
        lock(&self.failing).insert(location.clone());
    }

    /// Delay each multipart transfer by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = Some(latency);
    }

    pub fn calls(&self) -> Vec<PortCall> {
        lock(&self.calls).clone()
    }

    /// Calls whose target is `location`
    pub fn calls_for(&self, location: &Location) -> Vec<PortCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.location() == location)
            .cloned()
            .collect()
    }

    /// Number of put-type calls (stream or multipart) that targeted `location`
    pub fn put_count(&self, location: &Location) -> usize {
        self.calls_for(location)
            .iter()
            .filter(|call| matches!(call, PortCall::Put(_) | PortCall::MultipartPut(_)))
            .count()
    }

    /// Highest number of multipart transfers observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<Location, Bytes>> {
        lock(&self.objects)
    }

    fn record(&self, call: PortCall) {
        lock(&self.calls).push(call);
    }

    fn check_failure(&self, location: &Location) -> Result<()> {
        if lock(&self.failing).contains(location) {
            return Err(Error::Transfer(format!("injected failure for {location}")));
        }
        Ok(())
    }

    fn lookup(&self, location: &Location) -> Result<Bytes> {
        self.object(location)
            .ok_or_else(|| Error::NotFound(location.to_string()))
    }

    async fn enter_transfer(&self) -> InFlight<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        InFlight(&self.in_flight)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl TransferPort for MemoryStore {
    async fn get_stream(&self, location: &Location) -> Result<ByteStream> {
        self.record(PortCall::Get(location.clone()));
        self.check_failure(location)?;
        let data = self.lookup(location)?;
        Ok(futures::stream::once(async move { Ok(data) }).boxed())
    }

    async fn put_stream(&self, location: &Location, body: ByteStream) -> Result<()> {
        self.record(PortCall::Put(location.clone()));
        self.check_failure(location)?;
        let data = body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        self.insert(location, data);
        Ok(())
    }

    fn list(&self, prefix: &Location, recursive: bool) -> LocationStream {
        self.record(PortCall::List(prefix.clone()));
        if let Err(e) = self.check_failure(prefix) {
            return futures::stream::once(async move { Err(e) }).boxed();
        }

        let key_prefix = prefix.path().to_string();
        let mut entries = BTreeSet::new();
        for location in self.lock_objects().keys() {
            if location.container() != prefix.container() {
                continue;
            }
            let Some(rest) = location.path().strip_prefix(&key_prefix) else {
                continue;
            };
            match rest.find('/') {
                Some(idx) if !recursive => {
                    entries.insert(format!("{key_prefix}{}", &rest[..=idx]));
                }
                _ => {
                    entries.insert(location.path().to_string());
                }
            }
        }

        let base = prefix.clone();
        futures::stream::iter(entries.into_iter().map(move |path| Ok(base.with_path(path))))
            .boxed()
    }

    async fn exists(&self, location: &Location) -> Result<bool> {
        self.record(PortCall::Exists(location.clone()));
        self.check_failure(location)?;
        Ok(self.object(location).is_some())
    }

    async fn stat(&self, location: &Location) -> Result<ObjectInfo> {
        self.record(PortCall::Stat(location.clone()));
        self.check_failure(location)?;
        let data = self.lookup(location)?;
        Ok(ObjectInfo::new(location.clone(), data.len() as u64))
    }

    async fn copy(&self, src: &Location, dst: &Location) -> Result<()> {
        self.record(PortCall::Copy(src.clone(), dst.clone()));
        self.check_failure(src)?;
        self.check_failure(dst)?;
        let data = self.lookup(src)?;
        self.insert(dst, data);
        Ok(())
    }

    async fn delete(&self, location: &Location) -> Result<()> {
        self.record(PortCall::Delete(location.clone()));
        self.check_failure(location)?;
        self.lock_objects().remove(location);
        Ok(())
    }

    async fn multipart_get(
        &self,
        location: &Location,
        dest: &Path,
        chunk_size: u64,
    ) -> Result<u64> {
        self.record(PortCall::MultipartGet(location.clone()));
        let _guard = self.enter_transfer().await;
        self.check_failure(location)?;
        let data = self.lookup(location)?;

        let mut file = tokio::fs::File::create(dest).await?;
        for part in data.chunks(chunk_size.max(1) as usize) {
            file.write_all(part).await?;
        }
        file.flush().await?;
        Ok(data.len() as u64)
    }

    async fn multipart_put(
        &self,
        source: &Path,
        location: &Location,
        chunk_size: u64,
    ) -> Result<()> {
        self.record(PortCall::MultipartPut(location.clone()));
        let _guard = self.enter_transfer().await;
        self.check_failure(location)?;

        let mut file = tokio::fs::File::open(source).await?;
        let mut data = Vec::new();
        let mut part = vec![0u8; chunk_size.clamp(1, 1 << 20) as usize];
        loop {
            let n = file.read(&mut part).await?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&part[..n]);
        }
        self.insert(location, data);
        Ok(())
    }
}
