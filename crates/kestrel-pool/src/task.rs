use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use kestrel_core::{FileReviewResult, FileReviewer, KestrelError, Result};

/// Outcome of one executed task: the task's identity plus its error, if any.
///
/// The pool produces exactly one `TaskResult` per submitted task, in
/// completion order, unless the pool is torn down mid-flight.
#[derive(Debug)]
pub struct TaskResult {
    /// Caller-assigned task identity, stable across calls for correlation.
    pub task_id: String,
    /// `None` on success.
    pub error: Option<KestrelError>,
}

impl TaskResult {
    /// Whether the task completed without error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// An opaque unit of review work executed by the [`crate::WorkerPool`].
///
/// The pool imposes no constraint on what `execute` does; it only guarantees
/// the shared cancellation token is passed through. Cancellation is
/// *cooperative*: implementations must poll `cancel` at safe points — the
/// pool cannot interrupt a running task.
#[async_trait::async_trait]
pub trait Task: Send + Sync {
    /// Stable identity used to correlate the task with its [`TaskResult`].
    fn id(&self) -> &str;

    /// Run the task to completion or until it observes cancellation.
    ///
    /// # Errors
    ///
    /// Any error is recorded in the pool's error counter and surfaced through
    /// this task's [`TaskResult`]; it never affects other tasks or the pool.
    async fn execute(&self, cancel: &CancellationToken) -> Result<()>;
}

type TaskFn = Box<
    dyn Fn(CancellationToken) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync,
>;

/// A task wrapping an async closure.
///
/// # Examples
///
/// ```
/// use kestrel_pool::{FnTask, Task};
///
/// let task = FnTask::new("noop", |_cancel| async { Ok(()) });
/// assert_eq!(task.id(), "noop");
/// ```
pub struct FnTask {
    id: String,
    f: TaskFn,
}

impl FnTask {
    /// Wrap `f` as a task with the given identity.
    pub fn new<F, Fut>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            f: Box::new(move |cancel| Box::pin(f(cancel))),
        }
    }
}

#[async_trait::async_trait]
impl Task for FnTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<()> {
        (self.f)(cancel.clone()).await
    }
}

/// A task that reviews one file through a [`FileReviewer`] backend.
///
/// The review payload is owned by the task, not the pool: successful results
/// are pushed into the sink handed to [`FileReviewTask::new`], and the shared
/// result stream only carries identity + error.
pub struct FileReviewTask {
    id: String,
    path: PathBuf,
    content: String,
    reviewer: Arc<dyn FileReviewer>,
    sink: Arc<Mutex<Vec<FileReviewResult>>>,
}

impl FileReviewTask {
    /// Create a review task for `path` with the post-change `content`.
    pub fn new(
        path: PathBuf,
        content: String,
        reviewer: Arc<dyn FileReviewer>,
        sink: Arc<Mutex<Vec<FileReviewResult>>>,
    ) -> Self {
        Self {
            id: format!("review:{}", path.display()),
            path,
            content,
            reviewer,
            sink,
        }
    }
}

#[async_trait::async_trait]
impl Task for FileReviewTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(KestrelError::Review("review cancelled".into()));
        }
        let result = self
            .reviewer
            .review_file(cancel, &self.path, &self.content)
            .await?;
        self.sink
            .lock()
            .expect("review sink lock poisoned")
            .push(result);
        Ok(())
    }
}

/// A task running a sequence of sub-tasks, stopping at the first error.
///
/// Checks the cancellation token between sub-tasks, so a batch observes
/// shutdown even when its members do not.
pub struct BatchTask {
    id: String,
    tasks: Vec<Box<dyn Task>>,
}

impl BatchTask {
    /// Group `tasks` under one identity.
    pub fn new(id: impl Into<String>, tasks: Vec<Box<dyn Task>>) -> Self {
        Self {
            id: id.into(),
            tasks,
        }
    }

    /// Number of sub-tasks in the batch.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the batch holds no sub-tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait::async_trait]
impl Task for BatchTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<()> {
        for task in &self.tasks {
            if cancel.is_cancelled() {
                return Err(KestrelError::Pool(format!(
                    "batch {} cancelled before sub-task {}",
                    self.id,
                    task.id()
                )));
            }
            task.execute(cancel).await?;
        }
        Ok(())
    }
}
