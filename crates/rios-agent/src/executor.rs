//! Job executor
//!
//! Turns one job into a container run mediated by the filesystem:
//!
//! 1. create `<work_root>/<job_id>/{input,output}`
//! 2. stage the job inputs into `input/`
//! 3. run the container with both directories mounted
//! 4. require at least one file in `output/`
//! 5. publish `output/` to the job's destination
//!
//! The job directory is removed before `execute` returns, whichever step
//! failed.

use async_trait::async_trait;
use rios_core::{reference_file_name, Job, JobError, TaskType, WORKFLOW_FILE_NAME};
use rios_runtime::{ContainerRuntime, ContainerSpec};
use rios_store::{list_files, ObjectStore};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Something that can execute a job and produce an output reference
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn execute(&self, job: &Job) -> Result<String, JobError>;
}

/// Executes jobs with a container runtime and an object store
pub struct JobExecutor<R, S> {
    work_root: PathBuf,
    runtime: R,
    store: S,
}

impl<R, S> JobExecutor<R, S>
where
    R: ContainerRuntime,
    S: ObjectStore,
{
    pub fn new(work_root: PathBuf, runtime: R, store: S) -> Self {
        Self {
            work_root,
            runtime,
            store,
        }
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    async fn create_work_dir(&self, job: &Job) -> Result<WorkDir, JobError> {
        let root = self.work_root.join(job.work_dir_name()?);

        if tokio::fs::try_exists(&root).await.unwrap_or(false) {
            debug!(job_id = %job.job_id, "Removing stale job directory");
            tokio::fs::remove_dir_all(&root)
                .await
                .map_err(|e| JobError::WorkDir(format!("{}: {}", root.display(), e)))?;
        }
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| JobError::WorkDir(format!("{}: {}", root.display(), e)))?;

        // Owns the directory from here on; dropping it removes everything.
        let mut work_dir = WorkDir::new(root);

        // Bind mounts need absolute paths
        let root = tokio::fs::canonicalize(&work_dir.root)
            .await
            .map_err(|e| JobError::WorkDir(e.to_string()))?;
        work_dir.root = root;

        for dir in [work_dir.input(), work_dir.output()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| JobError::WorkDir(format!("{}: {}", dir.display(), e)))?;
        }
        Ok(work_dir)
    }

    async fn stage_inputs(&self, job: &Job, input_dir: &Path) -> Result<(), JobError> {
        let payload = &job.payload;
        let mut primary = None;

        if let Some(reference) = payload.input_reference() {
            let name = job.task_type.input_file_name(reference);
            info!(job_id = %job.job_id, reference, "Downloading input");
            self.store
                .fetch(reference, &input_dir.join(&name))
                .await
                .map_err(|e| JobError::InputStaging(e.to_string()))?;
            primary = Some(name);
        } else if let (TaskType::ComfyUi, Some(workflow)) = (job.task_type, &payload.workflow_json) {
            let document = serde_json::to_vec_pretty(workflow)
                .map_err(|e| JobError::InputStaging(e.to_string()))?;
            tokio::fs::write(input_dir.join(WORKFLOW_FILE_NAME), document)
                .await
                .map_err(|e| JobError::InputStaging(e.to_string()))?;
            debug!(job_id = %job.job_id, "Wrote inline workflow");
            primary = Some(WORKFLOW_FILE_NAME.to_string());
        }

        if let Some(reference) = payload.init_video_reference() {
            let name = init_video_file_name(reference, primary.as_deref());
            info!(job_id = %job.job_id, reference, file = %name, "Downloading init video");
            self.store
                .fetch(reference, &input_dir.join(name))
                .await
                .map_err(|e| JobError::InputStaging(e.to_string()))?;
        }

        Ok(())
    }

    async fn run_container(&self, job: &Job, work_dir: &WorkDir) -> Result<(), JobError> {
        let spec = ContainerSpec {
            image: job.payload.docker_image.clone(),
            input_dir: work_dir.input(),
            output_dir: work_dir.output(),
            args: job.task_type.container_args(&job.payload),
        };

        info!(
            job_id = %job.job_id,
            runtime = self.runtime.name(),
            image = %spec.image,
            "Running container"
        );
        self.runtime
            .run(&spec)
            .await
            .map_err(|e| JobError::Execution(e.to_string()))
    }

    async fn publish_outputs(&self, job: &Job, output_dir: &Path) -> Result<String, JobError> {
        let files = list_files(output_dir)
            .await
            .map_err(|e| JobError::OutputPublish(format!("failed to list output: {}", e)))?;
        if files.is_empty() {
            return Err(JobError::NoOutput);
        }

        let destination = job
            .payload
            .output_destination()
            .ok_or_else(|| JobError::OutputPublish("job has no output destination".to_string()))?;

        info!(job_id = %job.job_id, files = files.len(), destination, "Uploading output");
        self.store
            .publish(output_dir, &files, destination)
            .await
            .map_err(|e| JobError::OutputPublish(e.to_string()))
    }
}

#[async_trait]
impl<R, S> JobRunner for JobExecutor<R, S>
where
    R: ContainerRuntime,
    S: ObjectStore,
{
    async fn execute(&self, job: &Job) -> Result<String, JobError> {
        let work_dir = self.create_work_dir(job).await?;

        self.stage_inputs(job, &work_dir.input()).await?;
        self.run_container(job, &work_dir).await?;
        let output_url = self.publish_outputs(job, &work_dir.output()).await?;

        work_dir.remove().await;
        Ok(output_url)
    }
}

/// Name the init video is staged under; never the primary input's name
fn init_video_file_name(reference: &str, primary: Option<&str>) -> String {
    let name = reference_file_name(reference).unwrap_or_else(|| "init_video".to_string());
    if primary == Some(name.as_str()) {
        format!("init_video_{}", name)
    } else {
        name
    }
}

/// Job working directory, removed when dropped
struct WorkDir {
    root: PathBuf,
    removed: bool,
}

impl WorkDir {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            removed: false,
        }
    }

    fn input(&self) -> PathBuf {
        self.root.join("input")
    }

    fn output(&self) -> PathBuf {
        self.root.join("output")
    }

    async fn remove(mut self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            warn!(path = %self.root.display(), error = %e, "Failed to remove job directory");
            return;
        }
        self.removed = true;
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => debug!(path = %self.root.display(), "Removed job directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.root.display(), error = %e, "Failed to remove job directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rios_core::{JobPayload, RiosError, RiosResult};
    use rios_store::LocalStore;
    use std::sync::Mutex;

    /// Runtime that writes canned files into the output directory
    struct FakeRuntime {
        outputs: Vec<(&'static str, &'static [u8])>,
        fail: bool,
        specs: Mutex<Vec<ContainerSpec>>,
        staged_inputs: Mutex<Vec<String>>,
    }

    impl FakeRuntime {
        fn producing(outputs: Vec<(&'static str, &'static [u8])>) -> Self {
            Self {
                outputs,
                fail: false,
                specs: Mutex::new(Vec::new()),
                staged_inputs: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::producing(Vec::new())
            }
        }

        fn calls(&self) -> usize {
            self.specs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn run(&self, spec: &ContainerSpec) -> RiosResult<()> {
            self.specs.lock().unwrap().push(spec.clone());
            let mut names: Vec<String> = std::fs::read_dir(&spec.input_dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            self.staged_inputs.lock().unwrap().extend(names);

            if self.fail {
                return Err(RiosError::Runtime("container exited with exit status: 1".to_string()));
            }
            for (name, data) in &self.outputs {
                let path = spec.output_dir.join(name);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, data).unwrap();
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    struct Fixture {
        work: tempfile::TempDir,
        remote: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let fixture = Self {
                work: tempfile::tempdir().unwrap(),
                remote: tempfile::tempdir().unwrap(),
            };
            std::fs::write(fixture.remote.path().join("workflow.json"), b"{\"nodes\":[]}").unwrap();
            fixture
        }

        fn executor(&self, runtime: FakeRuntime) -> JobExecutor<FakeRuntime, LocalStore> {
            JobExecutor::new(self.work.path().to_path_buf(), runtime, LocalStore::new())
        }

        fn job(&self, id: &str, task_type: TaskType) -> Job {
            Job {
                job_id: id.to_string(),
                task_type,
                payload: JobPayload {
                    docker_image: "rios/test:latest".to_string(),
                    input_url: Some(format!(
                        "file://{}",
                        self.remote.path().join("workflow.json").display()
                    )),
                    output_path: Some(format!("file://{}/results/{}/", self.remote.path().display(), id)),
                    prompt: Some("a lighthouse at dusk".to_string()),
                    ..Default::default()
                },
            }
        }

        fn job_dir_exists(&self, id: &str) -> bool {
            self.work.path().join(id).exists()
        }
    }

    #[tokio::test]
    async fn test_successful_execution() {
        let fixture = Fixture::new();
        let executor = fixture.executor(FakeRuntime::producing(vec![
            ("result.mp4", b"video"),
            ("frames/0001.png", b"png"),
        ]));
        let job = fixture.job("job-ok", TaskType::ComfyUi);

        let output_url = executor.execute(&job).await.unwrap();

        assert_eq!(
            output_url,
            format!("file://{}/results/job-ok/frames/0001.png", fixture.remote.path().display())
        );
        assert_eq!(
            std::fs::read(fixture.remote.path().join("results/job-ok/result.mp4")).unwrap(),
            b"video"
        );
        assert_eq!(*executor.runtime.staged_inputs.lock().unwrap(), vec!["workflow.json"]);
        assert!(!fixture.job_dir_exists("job-ok"));
    }

    #[tokio::test]
    async fn test_container_spec_carries_task_arguments() {
        let fixture = Fixture::new();
        let executor = fixture.executor(FakeRuntime::producing(vec![("out.bin", b"1")]));

        executor.execute(&fixture.job("job-c", TaskType::ComfyUi)).await.unwrap();
        executor.execute(&fixture.job("job-t", TaskType::Training)).await.unwrap();

        let specs = executor.runtime.specs.lock().unwrap();
        assert!(specs[0].args.contains(&"--prompt".to_string()));
        assert!(specs[0].input_dir.is_absolute());
        assert!(specs[0].input_dir.ends_with("job-c/input"));
        assert!(!specs[1].args.contains(&"--prompt".to_string()));
        assert_eq!(specs[1].args[0], "--dataset");
    }

    #[tokio::test]
    async fn test_empty_output_is_no_output_error() {
        let fixture = Fixture::new();
        let executor = fixture.executor(FakeRuntime::producing(Vec::new()));

        let err = executor
            .execute(&fixture.job("job-empty", TaskType::Training))
            .await
            .unwrap_err();

        assert!(err.is_no_output());
        assert!(!fixture.job_dir_exists("job-empty"));
    }

    #[tokio::test]
    async fn test_container_failure_is_execution_error() {
        let fixture = Fixture::new();
        let executor = fixture.executor(FakeRuntime::failing());

        let err = executor
            .execute(&fixture.job("job-fail", TaskType::ComfyUi))
            .await
            .unwrap_err();

        assert!(err.is_execution());
        assert!(!fixture.job_dir_exists("job-fail"));
    }

    #[tokio::test]
    async fn test_missing_input_is_staging_error() {
        let fixture = Fixture::new();
        let executor = fixture.executor(FakeRuntime::producing(vec![("out.bin", b"1")]));
        let mut job = fixture.job("job-noinput", TaskType::Training);
        job.payload.input_url = Some("file:///nonexistent/rios/dataset.tar".to_string());

        let err = executor.execute(&job).await.unwrap_err();

        assert!(err.is_input_staging());
        assert_eq!(executor.runtime.calls(), 0);
        assert!(!fixture.job_dir_exists("job-noinput"));
    }

    #[tokio::test]
    async fn test_unpublishable_output_is_publish_error() {
        let fixture = Fixture::new();
        let executor = fixture.executor(FakeRuntime::producing(vec![("out.bin", b"1")]));
        let mut job = fixture.job("job-s3", TaskType::Training);
        job.payload.output_path = Some("s3://bucket/results/".to_string());

        let err = executor.execute(&job).await.unwrap_err();

        assert!(err.is_output_publish());
        assert!(!fixture.job_dir_exists("job-s3"));
    }

    #[tokio::test]
    async fn test_missing_destination_is_publish_error() {
        let fixture = Fixture::new();
        let executor = fixture.executor(FakeRuntime::producing(vec![("out.bin", b"1")]));
        let mut job = fixture.job("job-nodest", TaskType::Training);
        job.payload.output_path = None;

        assert!(executor.execute(&job).await.unwrap_err().is_output_publish());
        assert!(!fixture.job_dir_exists("job-nodest"));
    }

    #[tokio::test]
    async fn test_unsafe_job_id_creates_nothing() {
        let fixture = Fixture::new();
        let executor = fixture.executor(FakeRuntime::producing(vec![("out.bin", b"1")]));
        let job = fixture.job("../escape", TaskType::Training);

        let err = executor.execute(&job).await.unwrap_err();

        assert!(err.is_work_dir());
        assert_eq!(executor.runtime.calls(), 0);
        assert_eq!(std::fs::read_dir(fixture.work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_inline_workflow_is_staged() {
        let fixture = Fixture::new();
        let executor = fixture.executor(FakeRuntime::producing(vec![("image.png", b"png")]));
        let mut job = fixture.job("job-inline", TaskType::ComfyUi);
        job.payload.input_url = None;
        job.payload.workflow_json = Some(serde_json::json!({"nodes": [1, 2]}));

        executor.execute(&job).await.unwrap();

        assert_eq!(*executor.runtime.staged_inputs.lock().unwrap(), vec!["workflow.json"]);
    }

    #[tokio::test]
    async fn test_init_video_never_replaces_primary_input() {
        let fixture = Fixture::new();
        let videos = fixture.remote.path().join("videos");
        std::fs::create_dir_all(&videos).unwrap();
        std::fs::write(videos.join("workflow.json"), b"not a workflow").unwrap();

        let executor = fixture.executor(FakeRuntime::producing(vec![("out.mp4", b"mp4")]));
        let mut job = fixture.job("job-video", TaskType::ComfyUi);
        job.payload.init_video_url =
            Some(format!("file://{}", videos.join("workflow.json").display()));

        executor.execute(&job).await.unwrap();

        assert_eq!(
            *executor.runtime.staged_inputs.lock().unwrap(),
            vec!["init_video_workflow.json", "workflow.json"]
        );
        assert_eq!(
            init_video_file_name("https://cdn.example/clip.mp4?sig=1", Some("workflow.json")),
            "clip.mp4"
        );
    }

    #[tokio::test]
    async fn test_work_root_that_is_a_file_is_work_dir_error() {
        let fixture = Fixture::new();
        let work_root = fixture.work.path().join("not-a-dir");
        std::fs::write(&work_root, b"file").unwrap();
        let executor = JobExecutor::new(
            work_root.clone(),
            FakeRuntime::producing(vec![("out.bin", b"1")]),
            LocalStore::new(),
        );

        let err = executor
            .execute(&fixture.job("job-blocked", TaskType::Training))
            .await
            .unwrap_err();

        assert!(err.is_work_dir());
        assert_eq!(executor.runtime.calls(), 0);
        assert!(work_root.is_file());
        assert_eq!(std::fs::read_dir(fixture.work.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_stale_job_directory_is_replaced() {
        let fixture = Fixture::new();
        let stale_output = fixture.work.path().join("job-retry/output");
        std::fs::create_dir_all(&stale_output).unwrap();
        std::fs::write(stale_output.join("old.bin"), b"stale").unwrap();

        let executor = fixture.executor(FakeRuntime::producing(Vec::new()));
        let err = executor
            .execute(&fixture.job("job-retry", TaskType::Training))
            .await
            .unwrap_err();

        assert!(err.is_no_output());
        assert!(!fixture.job_dir_exists("job-retry"));
    }
}
