//! Directory sync engine
//!
//! Mirrors every regular file under a local root to a destination prefix.
//! Files are enumerated up front, filtered against an exact relative-path
//! exclusion set, and queued. A fixed pool of workers drains the queue, each
//! transfer succeeding or failing on its own. The call returns once every
//! task is terminal; per-file failures land in the [`SyncResult`].

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::port::TransferPort;

/// Callback invoked once per finished task, with the error on failure
pub type ProgressFn = Arc<dyn Fn(&TransferTask, Option<&Error>) + Send + Sync>;

/// One file's transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    pub source: PathBuf,
    /// `/`-separated path relative to the sync root
    pub relative_path: String,
    pub destination: Location,
}

/// Tasks a sync would dispatch
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Sorted by relative path
    pub tasks: Vec<TransferTask>,
    /// Files skipped by the exclusion set
    pub excluded: usize,
}

/// A failed transfer
#[derive(Debug)]
pub struct SyncFailure {
    pub source: PathBuf,
    pub relative_path: String,
    pub destination: Location,
    pub error: Error,
}

/// Outcome of one directory sync
#[derive(Debug, Default)]
pub struct SyncResult {
    /// Relative paths uploaded, in completion order
    pub succeeded: Vec<String>,
    /// Failed transfers, in completion order
    pub failures: Vec<SyncFailure>,
    pub excluded: usize,
}

impl SyncResult {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of dispatched tasks
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Per-call sync settings
///
/// Unset concurrency and chunk size fall back to the client's config.
#[derive(Clone, Default)]
pub struct SyncOptions {
    pub exclude: HashSet<String>,
    pub concurrency: Option<usize>,
    pub chunk_size: Option<u64>,
    pub progress: Option<ProgressFn>,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude files by `/`-separated path relative to the root
    pub fn exclude<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn on_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("exclude", &self.exclude)
            .field("concurrency", &self.concurrency)
            .field("chunk_size", &self.chunk_size)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Client {
    /// Enumerate and filter `root` without transferring anything
    pub async fn plan_sync(
        &self,
        root: &Path,
        destination: &Location,
        exclude: &HashSet<String>,
    ) -> Result<SyncPlan> {
        let files = enumerate_files(root).await?;
        let mut plan = SyncPlan::default();

        for (source, relative_path) in files {
            if exclude.contains(&relative_path) {
                tracing::debug!(path = %relative_path, "Excluded from sync");
                plan.excluded += 1;
                continue;
            }
            let destination = destination.join(relative_path.split('/'));
            plan.tasks.push(TransferTask {
                source,
                relative_path,
                destination,
            });
        }

        Ok(plan)
    }

    /// Upload every file under `root` to `destination`
    ///
    /// Fails only for invalid settings or when the tree cannot be
    /// enumerated; both are detected before any transfer starts.
    #[tracing::instrument(skip_all, fields(root = %root.display(), destination = %destination))]
    pub async fn sync_dir(
        &self,
        root: &Path,
        destination: &Location,
        options: SyncOptions,
    ) -> Result<SyncResult> {
        self.pool_settings(&options)?;
        let plan = self.plan_sync(root, destination, &options.exclude).await?;
        self.run_plan(plan, options).await
    }

    /// Dispatch a plan built by [`Client::plan_sync`] without walking the tree again
    ///
    /// Only the plan's tasks are transferred; `options.exclude` is not
    /// consulted because the plan is already filtered.
    pub async fn run_plan(&self, plan: SyncPlan, options: SyncOptions) -> Result<SyncResult> {
        let (concurrency, chunk_size) = self.pool_settings(&options)?;
        tracing::info!(
            tasks = plan.tasks.len(),
            excluded = plan.excluded,
            concurrency,
            chunk_size,
            "Starting directory sync"
        );

        let mut result = run_pool(
            self.port.clone(),
            plan.tasks,
            concurrency,
            chunk_size,
            options.progress,
        )
        .await;
        result.excluded = plan.excluded;

        tracing::info!(
            succeeded = result.succeeded_count(),
            failed = result.failed_count(),
            "Directory sync finished"
        );
        Ok(result)
    }

    /// Effective `(concurrency, chunk_size)`, both required to be positive
    fn pool_settings(&self, options: &SyncOptions) -> Result<(usize, u64)> {
        let concurrency = options.concurrency.unwrap_or(self.config.concurrency);
        let chunk_size = options.chunk_size.unwrap_or(self.config.chunk_size);
        if concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be a positive integer".to_string(),
            ));
        }
        if chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "chunk_size must be a positive integer".to_string(),
            ));
        }
        Ok((concurrency, chunk_size))
    }
}

/// Collect `(path, relative path)` for every regular file under `root`
///
/// Symlinks are neither followed nor transferred.
async fn enumerate_files(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    let meta = tokio::fs::metadata(root).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(format!("local directory {}", root.display()))
        } else {
            Error::Io(e)
        }
    })?;
    if !meta.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            format!("{} is not a directory", root.display()),
        )));
    }

    let mut files = Vec::new();
    let mut pending: Vec<(PathBuf, Option<String>)> = vec![(root.to_path_buf(), None)];

    while let Some((dir, prefix)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().into_string().map_err(|raw| {
                Error::General(format!(
                    "non UTF-8 file name {raw:?} in {}",
                    dir.display()
                ))
            })?;
            let relative = match &prefix {
                Some(prefix) => format!("{prefix}/{name}"),
                None => name,
            };

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push((entry.path(), Some(relative)));
            } else if file_type.is_file() {
                files.push((entry.path(), relative));
            } else {
                tracing::debug!(path = %relative, "Skipping non-regular file");
            }
        }
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

struct TaskOutcome {
    task: TransferTask,
    result: Result<()>,
}

/// Drain `tasks` with `concurrency` workers sharing one queue
///
/// The same path runs at every concurrency level, including 1. Dropping
/// the returned future drops the `JoinSet`, aborting in-flight workers.
async fn run_pool(
    port: Arc<dyn TransferPort>,
    tasks: Vec<TransferTask>,
    concurrency: usize,
    chunk_size: u64,
    progress: Option<ProgressFn>,
) -> SyncResult {
    let worker_count = concurrency.min(tasks.len());

    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    for task in tasks {
        // the receiver is alive until the workers are spawned below
        let _ = queue_tx.send(task);
    }
    drop(queue_tx);
    let queue = Arc::new(Mutex::new(queue_rx));

    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<TaskOutcome>();
    let mut workers = JoinSet::new();

    for worker in 0..worker_count {
        let queue = queue.clone();
        let port = port.clone();
        let outcome_tx = outcome_tx.clone();

        workers.spawn(async move {
            loop {
                let next = queue.lock().await.recv().await;
                let Some(task) = next else {
                    break;
                };
                let result = transfer(port.as_ref(), &task, chunk_size).await;
                if outcome_tx.send(TaskOutcome { task, result }).is_err() {
                    break;
                }
            }
            tracing::trace!(worker, "Sync worker drained queue");
        });
    }
    drop(outcome_tx);

    let mut result = SyncResult::default();
    while let Some(TaskOutcome { task, result: outcome }) = outcome_rx.recv().await {
        if let Some(progress) = &progress {
            let error = outcome.as_ref().err();
            if std::panic::catch_unwind(AssertUnwindSafe(|| progress(&task, error))).is_err() {
                tracing::warn!(path = %task.relative_path, "Progress callback panicked");
            }
        }
        match outcome {
            Ok(()) => result.succeeded.push(task.relative_path),
            Err(error) => {
                tracing::warn!(
                    path = %task.relative_path,
                    destination = %task.destination,
                    error = %error,
                    "Transfer failed"
                );
                result.failures.push(SyncFailure {
                    source: task.source,
                    relative_path: task.relative_path,
                    destination: task.destination,
                    error,
                });
            }
        }
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Sync worker terminated abnormally");
        }
    }

    result
}

/// Upload one file, turning a panic inside the port into a task failure
async fn transfer(port: &dyn TransferPort, task: &TransferTask, chunk_size: u64) -> Result<()> {
    tracing::debug!(
        source = %task.source.display(),
        destination = %task.destination,
        "Uploading"
    );
    let upload = async { port.multipart_put(&task.source, &task.destination, chunk_size).await };
    match AssertUnwindSafe(upload).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::Transfer(format!("transfer panicked: {reason}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferConfig;
    use crate::memory::{MemoryStore, PortCall};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn loc(s: &str) -> Location {
        Location::parse(s).unwrap()
    }

    fn write_tree(root: &Path, files: &[&str]) {
        for file in files {
            let path = root.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, format!("content of {file}")).unwrap();
        }
    }

    fn client_with(store: &Arc<MemoryStore>) -> Client {
        Client::new(store.clone(), TransferConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_sync_with_exclusion() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["a.txt", "sub/b.txt"]);
        let store = Arc::new(MemoryStore::new());
        let client = client_with(&store);

        let result = client
            .sync_dir(
                dir.path(),
                &loc("s3://bucket/out"),
                SyncOptions::new().exclude(["sub/b.txt"]),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded, vec!["a.txt".to_string()]);
        assert_eq!(result.excluded, 1);
        assert!(result.is_success());
        assert_eq!(
            store.calls(),
            vec![PortCall::MultipartPut(loc("s3://bucket/out/a.txt"))]
        );
        assert!(store.calls_for(&loc("s3://bucket/out/sub/b.txt")).is_empty());
    }

    #[tokio::test]
    async fn test_sync_preserves_structure() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["top.txt", "a/b/c/deep.bin", "a/side.md"]);
        let store = Arc::new(MemoryStore::new());
        let client = client_with(&store);

        let result = client
            .sync_dir(dir.path(), &loc("s3://bucket/mirror/"), SyncOptions::new())
            .await
            .unwrap();

        assert_eq!(result.succeeded_count(), 3);
        assert_eq!(
            store.locations(),
            vec![
                loc("s3://bucket/mirror/a/b/c/deep.bin"),
                loc("s3://bucket/mirror/a/side.md"),
                loc("s3://bucket/mirror/top.txt"),
            ]
        );
        assert_eq!(
            store.object(&loc("s3://bucket/mirror/a/side.md")).unwrap(),
            &b"content of a/side.md"[..]
        );
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("empty-sub")).unwrap();
        let store = Arc::new(MemoryStore::new());

        let result = client_with(&store)
            .sync_dir(dir.path(), &loc("s3://bucket"), SyncOptions::new())
            .await
            .unwrap();

        assert_eq!(result.total(), 0);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_raises() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());

        let err = client_with(&store)
            .sync_dir(
                &dir.path().join("missing"),
                &loc("s3://bucket"),
                SyncOptions::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_root_is_file_raises() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["file.txt"]);
        let store = Arc::new(MemoryStore::new());

        let err = client_with(&store)
            .sync_dir(
                &dir.path().join("file.txt"),
                &loc("s3://bucket"),
                SyncOptions::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_zero_concurrency_raises_before_dispatch() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["a.txt"]);
        let store = Arc::new(MemoryStore::new());

        let err = client_with(&store)
            .sync_dir(
                dir.path(),
                &loc("s3://bucket"),
                SyncOptions::new().concurrency(0),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["ok1", "bad", "ok2", "nested/ok3"]);
        let store = Arc::new(MemoryStore::new());
        store.fail_on(&loc("s3://bucket/dst/bad"));

        let result = client_with(&store)
            .sync_dir(
                dir.path(),
                &loc("s3://bucket/dst"),
                SyncOptions::new().concurrency(2),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded_count(), 3);
        assert_eq!(result.failed_count(), 1);
        let failure = &result.failures[0];
        assert_eq!(failure.relative_path, "bad");
        assert_eq!(failure.destination, loc("s3://bucket/dst/bad"));
        assert_eq!(failure.source, dir.path().join("bad"));
        assert!(matches!(failure.error, Error::Transfer(_)));
    }

    #[tokio::test]
    async fn test_outcomes_invariant_across_concurrency() {
        let dir = TempDir::new().unwrap();
        let files: Vec<String> = (0..40)
            .map(|i| format!("group{}/file{i:02}.dat", i % 5))
            .collect();
        let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
        write_tree(dir.path(), &file_refs);

        let exclude = ["group0/file00.dat", "group3/file13.dat"];
        let failing = ["group1/file01.dat", "group4/file39.dat"];

        let mut outcomes_by_limit = Vec::new();
        for limit in [1, 4, 64] {
            let store = Arc::new(MemoryStore::new());
            for path in failing {
                store.fail_on(&loc("s3://bucket/base").child(path));
            }

            let result = client_with(&store)
                .sync_dir(
                    dir.path(),
                    &loc("s3://bucket/base"),
                    SyncOptions::new().concurrency(limit).exclude(exclude),
                )
                .await
                .unwrap();

            let mut outcomes = BTreeMap::new();
            for path in &result.succeeded {
                outcomes.insert(path.clone(), true);
            }
            for failure in &result.failures {
                outcomes.insert(failure.relative_path.clone(), false);
            }
            assert_eq!(outcomes.len(), result.total());
            assert!(store.max_in_flight() <= limit);
            outcomes_by_limit.push(outcomes);
        }

        assert_eq!(outcomes_by_limit[0].len(), 38);
        assert_eq!(outcomes_by_limit[0], outcomes_by_limit[1]);
        assert_eq!(outcomes_by_limit[1], outcomes_by_limit[2]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let dir = TempDir::new().unwrap();
        let files: Vec<String> = (0..12).map(|i| format!("f{i}")).collect();
        let file_refs: Vec<&str> = files.iter().map(String::as_str).collect();
        write_tree(dir.path(), &file_refs);

        let store = Arc::new(MemoryStore::new());
        store.set_latency(std::time::Duration::from_millis(20));

        let result = client_with(&store)
            .sync_dir(
                dir.path(),
                &loc("s3://bucket"),
                SyncOptions::new().concurrency(3),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded_count(), 12);
        assert!(store.max_in_flight() <= 3);
        assert!(store.max_in_flight() >= 2);
    }

    #[tokio::test]
    async fn test_progress_called_per_task() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["a", "b", "c"]);
        let store = Arc::new(MemoryStore::new());
        store.fail_on(&loc("s3://bucket/b"));

        let done = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let (done_cb, failed_cb) = (done.clone(), failed.clone());
        let progress: ProgressFn = Arc::new(move |_task, error| {
            done_cb.fetch_add(1, Ordering::SeqCst);
            if error.is_some() {
                failed_cb.fetch_add(1, Ordering::SeqCst);
            }
        });

        client_with(&store)
            .sync_dir(
                dir.path(),
                &loc("s3://bucket"),
                SyncOptions::new().on_progress(progress),
            )
            .await
            .unwrap();

        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_progress_callback_does_not_abort_sync() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["a", "b", "c", "d"]);
        let store = Arc::new(MemoryStore::new());
        let progress: ProgressFn = Arc::new(|task: &TransferTask, _error: Option<&Error>| {
            if task.relative_path == "b" {
                panic!("progress display failed");
            }
        });

        let result = client_with(&store)
            .sync_dir(
                dir.path(),
                &loc("s3://bucket"),
                SyncOptions::new().concurrency(2).on_progress(progress),
            )
            .await
            .unwrap();

        assert_eq!(result.succeeded_count(), 4);
        assert!(result.is_success());
        assert_eq!(store.locations().len(), 4);
    }

    #[tokio::test]
    async fn test_run_plan_dispatches_planned_tasks_only() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["a.txt", "skip.txt"]);
        let store = Arc::new(MemoryStore::new());
        let client = client_with(&store);

        let exclude = HashSet::from(["skip.txt".to_string()]);
        let plan = client
            .plan_sync(dir.path(), &loc("s3://bucket/out"), &exclude)
            .await
            .unwrap();
        // Files appearing after planning are not picked up
        write_tree(dir.path(), &["late.txt"]);

        let result = client.run_plan(plan, SyncOptions::new()).await.unwrap();

        assert_eq!(result.succeeded, vec!["a.txt".to_string()]);
        assert_eq!(result.excluded, 1);
        assert_eq!(
            store.calls(),
            vec![PortCall::MultipartPut(loc("s3://bucket/out/a.txt"))]
        );
    }

    #[tokio::test]
    async fn test_run_plan_rejects_zero_chunk_size() {
        let store = Arc::new(MemoryStore::new());
        let err = client_with(&store)
            .run_plan(SyncPlan::default(), SyncOptions::new().chunk_size(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    /// Delegates to a `MemoryStore` but panics when uploading `boom`
    struct PanickingPort(MemoryStore);

    #[async_trait::async_trait]
    impl TransferPort for PanickingPort {
        async fn get_stream(&self, location: &Location) -> Result<crate::port::ByteStream> {
            self.0.get_stream(location).await
        }
        async fn put_stream(
            &self,
            location: &Location,
            body: crate::port::ByteStream,
        ) -> Result<()> {
            self.0.put_stream(location, body).await
        }
        fn list(&self, prefix: &Location, recursive: bool) -> crate::port::LocationStream {
            self.0.list(prefix, recursive)
        }
        async fn exists(&self, location: &Location) -> Result<bool> {
            self.0.exists(location).await
        }
        async fn stat(&self, location: &Location) -> Result<crate::port::ObjectInfo> {
            self.0.stat(location).await
        }
        async fn copy(&self, src: &Location, dst: &Location) -> Result<()> {
            self.0.copy(src, dst).await
        }
        async fn delete(&self, location: &Location) -> Result<()> {
            self.0.delete(location).await
        }
        async fn multipart_get(
            &self,
            location: &Location,
            dest: &Path,
            chunk_size: u64,
        ) -> Result<u64> {
            self.0.multipart_get(location, dest, chunk_size).await
        }
        async fn multipart_put(
            &self,
            source: &Path,
            location: &Location,
            chunk_size: u64,
        ) -> Result<()> {
            if location.name() == "boom" {
                panic!("simulated SDK bug");
            }
            self.0.multipart_put(source, location, chunk_size).await
        }
    }

    #[tokio::test]
    async fn test_panicking_transfer_is_recorded_as_failure() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["boom", "fine"]);

        let port = Arc::new(PanickingPort(MemoryStore::new()));
        let client = Client::new(port.clone(), TransferConfig::default()).unwrap();
        let result = client
            .sync_dir(dir.path(), &loc("s3://bucket"), SyncOptions::new())
            .await
            .unwrap();

        assert_eq!(result.succeeded, vec!["fine".to_string()]);
        assert_eq!(result.failed_count(), 1);
        assert!(result.failures[0].error.to_string().contains("simulated SDK bug"));
        assert!(port.0.object(&loc("s3://bucket/fine")).is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_not_transferred() {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &["real.txt", "inner/x.txt"]);
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("inner"), dir.path().join("inner-link"))
            .unwrap();

        let store = Arc::new(MemoryStore::new());
        let plan = client_with(&store)
            .plan_sync(dir.path(), &loc("s3://bucket"), &HashSet::new())
            .await
            .unwrap();

        let paths: Vec<&str> = plan.tasks.iter().map(|t| t.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["inner/x.txt", "real.txt"]);
    }
}
