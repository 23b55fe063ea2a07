//! Pipeline orchestration for one run

use super::{
    Buffer, BufferKeys, Extractor, Loader, RunState, Stage, Transformer, extract_data, load_data,
    transform_data,
};
use crate::dag::{Dag, Task};
use crate::error::PipelineError;
use crate::notify::{LogNotifier, Notifier, RunEvent};
use crate::table::{Cell, Row};
use std::sync::Arc;

/// Outcome of one run
#[derive(Debug)]
pub struct RunReport {
    /// Final state, `LOADED` or `FAILED`
    pub state: RunState,
    /// Every state the run passed through, in order
    pub history: Vec<RunState>,
    pub rows_loaded: usize,
    pub error: Option<PipelineError>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            state: RunState::Pending,
            history: vec![RunState::Pending],
            rows_loaded: 0,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == RunState::Loaded
    }

    /// Whether the run ever reached `state`
    pub fn reached(&self, state: RunState) -> bool {
        self.history.contains(&state)
    }

    pub fn into_result(self) -> Result<usize, PipelineError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.rows_loaded),
        }
    }

    fn enter(&mut self, state: RunState) {
        log::debug!("Run state {} -> {}", self.state, state);
        self.state = state;
        self.history.push(state);
    }
}

/// ETL Pipeline that runs the declared tasks in dependency order
///
/// Stages communicate only through the buffer, so any single stage can be
/// re-run with [`Pipeline::run_stage`] without repeating its predecessors.
///
/// # Type Parameters
/// - `E`: Extractor type
/// - `T`: cell Transformer type
/// - `L`: Loader type (loads rows)
/// - `B`: Buffer type
///
/// # Example
/// ```no_run
/// use simple_etl::etl::Pipeline;
/// use simple_etl::storage::{CsvReader, MemoryBuffer, MemoryCollection};
/// use simple_etl::transform::TitleCase;
///
/// # async fn example() {
/// let pipeline = Pipeline::new(
///     CsvReader::new("people.csv"),
///     TitleCase,
///     MemoryCollection::new(),
///     MemoryBuffer::new(),
/// );
///
/// let report = pipeline.run().await;
/// println!("{} after loading {} rows", report.state, report.rows_loaded);
/// # }
/// ```
pub struct Pipeline<E, T, L, B> {
    extractor: E,
    transformer: T,
    loader: L,
    buffer: B,
    keys: BufferKeys,
    dag: Dag,
    notifier: Arc<dyn Notifier>,
}

impl<E, T, L, B> Pipeline<E, T, L, B>
where
    E: Extractor,
    T: Transformer<Input = Cell, Output = Cell>,
    L: Loader<Item = Row>,
    B: Buffer,
{
    /// Create a new pipeline with the default declaration and bare keys
    pub fn new(extractor: E, transformer: T, loader: L, buffer: B) -> Self {
        let dag = Dag::default();
        let notifier = Arc::new(LogNotifier::from_dag(&dag));
        Self {
            extractor,
            transformer,
            loader,
            buffer,
            keys: BufferKeys::default(),
            dag,
            notifier,
        }
    }

    /// Use `dag` for task order and retry policies
    ///
    /// The notifier is re-addressed to the new owner; call
    /// [`Pipeline::with_notifier`] afterwards to override it.
    pub fn with_dag(mut self, dag: Dag) -> Self {
        self.notifier = Arc::new(LogNotifier::from_dag(&dag));
        self.dag = dag;
        self
    }

    pub fn with_keys(mut self, keys: BufferKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    pub fn keys(&self) -> &BufferKeys {
        &self.keys
    }

    /// Run every task once, in dependency order
    ///
    /// A failed task ends the run in `FAILED`; no downstream task starts.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new();
        log::info!("Starting run of {}", self.dag.dag_id);

        let order = match self.dag.execution_order() {
            Ok(order) => order,
            Err(err) => {
                log::error!("{}", err);
                report.error = Some(err);
                return report;
            }
        };

        for task in order {
            let stage = task.task_id;
            match report.state.start(stage) {
                Ok(state) => report.enter(state),
                Err(err) => {
                    report.error = Some(err);
                    return report;
                }
            }

            match self.run_task(task).await {
                Ok(rows) => {
                    if stage == Stage::Load {
                        report.rows_loaded = rows;
                    }
                    match report.state.complete() {
                        Ok(state) => report.enter(state),
                        Err(err) => {
                            report.error = Some(err);
                            return report;
                        }
                    }
                }
                Err(err) => {
                    if let Ok(state) = report.state.fail() {
                        report.enter(state);
                    }
                    report.error = Some(err);
                    return report;
                }
            }
        }

        if report.state != RunState::Loaded {
            let err = PipelineError::Definition(format!(
                "run ended in {} without loading",
                report.state
            ));
            log::error!("{}", err);
            report.error = Some(err);
            return report;
        }

        log::info!(
            "Run of {} finished in {} with {} rows loaded",
            self.dag.dag_id,
            report.state,
            report.rows_loaded
        );
        report
    }

    /// Run a single stage under its retry policy
    ///
    /// The stage reads whatever its predecessor last left in the buffer.
    pub async fn run_stage(&self, stage: Stage) -> Result<usize, PipelineError> {
        let task = self.dag.task(stage)?;
        self.run_task(task).await
    }

    async fn run_task(&self, task: &Task) -> Result<usize, PipelineError> {
        let stage = task.task_id;
        let policy = task.retry;
        let mut attempt = 1;

        loop {
            log::debug!("Running {} (attempt {})", stage, attempt);
            let err = match self.invoke(stage).await {
                Ok(rows) => return Ok(rows),
                Err(err) => err,
            };

            if err.is_retryable() && policy.allows_retry_after(attempt) {
                self.notifier.notify(&RunEvent::Retry {
                    stage,
                    attempt,
                    max_attempts: policy.max_attempts,
                    error: &err,
                });
                tokio::time::sleep(policy.delay()).await;
                attempt += 1;
                continue;
            }

            let failed = PipelineError::StageFailed {
                stage,
                attempts: attempt,
                source: Box::new(err),
            };
            self.notifier.notify(&RunEvent::Failure {
                stage,
                error: &failed,
            });
            return Err(failed);
        }
    }

    async fn invoke(&self, stage: Stage) -> Result<usize, PipelineError> {
        match stage {
            Stage::Extract => extract_data(&self.extractor, &self.buffer, &self.keys).await,
            Stage::Transform => transform_data(&self.transformer, &self.buffer, &self.keys).await,
            Stage::Load => load_data(&self.loader, &self.buffer, &self.keys).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::{IdentityTransformer, RetryPolicy};
    use crate::storage::{MemoryBuffer, MemoryCollection};
    use crate::table::Table;
    use std::sync::Mutex;

    struct MockExtractor(Table);

    impl Extractor for MockExtractor {
        async fn extract(&self) -> Result<Table, PipelineError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<String>>);

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: &RunEvent<'_>) {
            let line = match event {
                RunEvent::Retry { stage, attempt, .. } => format!("retry {} {}", stage, attempt),
                RunEvent::Failure { stage, .. } => format!("failure {}", stage),
            };
            self.0.lock().unwrap().push(line);
        }
    }

    fn no_delay_dag() -> Dag {
        let mut dag = Dag::default();
        for task in &mut dag.tasks {
            task.retry.delay_secs = 0;
        }
        dag
    }

    fn numbers() -> Table {
        let mut table = Table::new(vec!["n".to_string()]).unwrap();
        for i in 1..=3 {
            table.push_cells(vec![Cell::from(i)]).unwrap();
        }
        table
    }

    #[tokio::test]
    async fn test_pipeline() {
        let collection = MemoryCollection::new();
        let pipeline = Pipeline::new(
            MockExtractor(numbers()),
            IdentityTransformer,
            collection.clone(),
            MemoryBuffer::new(),
        );

        let report = pipeline.run().await;
        assert!(report.succeeded());
        assert_eq!(report.rows_loaded, 3);
        assert_eq!(report.history.len(), 7);
        assert_eq!(collection.documents(), numbers().into_rows());
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let collection = MemoryCollection::new();
        let pipeline = Pipeline::new(
            MockExtractor(Table::new(vec!["n".to_string()]).unwrap()),
            IdentityTransformer,
            collection.clone(),
            MemoryBuffer::new(),
        );

        let report = pipeline.run().await;
        assert!(report.succeeded());
        assert_eq!(report.rows_loaded, 0);
        assert_eq!(collection.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_then_failure_notifications() {
        let buffer = MemoryBuffer::new();
        buffer.set_offline(true);
        let notifier = Arc::new(RecordingNotifier::default());

        let pipeline = Pipeline::new(
            MockExtractor(numbers()),
            IdentityTransformer,
            MemoryCollection::new(),
            buffer,
        )
        .with_dag(no_delay_dag())
        .with_notifier(notifier.clone());

        let report = pipeline.run().await;
        assert_eq!(report.state, RunState::Failed);
        assert_eq!(
            *notifier.0.lock().unwrap(),
            vec![
                "retry extract_data 1",
                "retry extract_data 2",
                "failure extract_data"
            ]
        );
        assert!(matches!(
            report.error,
            Some(PipelineError::StageFailed {
                stage: Stage::Extract,
                attempts: 3,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let collection = MemoryCollection::new();
        collection.stop_after(1);
        let mut dag = no_delay_dag();
        dag.tasks[2].retry = RetryPolicy::new(5, 0);

        let pipeline = Pipeline::new(
            MockExtractor(numbers()),
            IdentityTransformer,
            collection.clone(),
            MemoryBuffer::new(),
        )
        .with_dag(dag);

        let report = pipeline.run().await;
        assert_eq!(report.state, RunState::Failed);
        assert!(report.reached(RunState::Loading));
        assert_eq!(collection.insert_calls(), 1);
        assert!(matches!(
            report.error.as_ref().map(PipelineError::root),
            Some(PipelineError::PartialInsert { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_dag_never_starts() {
        let buffer = MemoryBuffer::new();
        let mut dag = Dag::default();
        dag.edges.push((Stage::Load, Stage::Extract));

        let pipeline = Pipeline::new(
            MockExtractor(numbers()),
            IdentityTransformer,
            MemoryCollection::new(),
            buffer.clone(),
        )
        .with_dag(dag);

        let report = pipeline.run().await;
        assert_eq!(report.state, RunState::Pending);
        assert!(matches!(report.error, Some(PipelineError::Definition(_))));
        assert!(!buffer.contains("extracted_data"));
    }

    #[tokio::test]
    async fn test_dag_without_load_task_is_not_a_success() {
        let buffer = MemoryBuffer::new();
        let collection = MemoryCollection::new();
        let mut dag = no_delay_dag();
        dag.tasks.retain(|t| t.task_id != Stage::Load);
        dag.edges.retain(|(_, to)| *to != Stage::Load);

        let pipeline = Pipeline::new(
            MockExtractor(numbers()),
            IdentityTransformer,
            collection.clone(),
            buffer.clone(),
        )
        .with_dag(dag);

        let report = pipeline.run().await;
        assert!(!report.succeeded());
        assert_eq!(report.state, RunState::Pending);
        assert!(!buffer.contains("extracted_data"));
        assert_eq!(collection.insert_calls(), 0);
        assert!(matches!(
            report.into_result(),
            Err(PipelineError::Definition(_))
        ));
    }

    #[tokio::test]
    async fn test_run_stage_alone() {
        let buffer = MemoryBuffer::new();
        let pipeline = Pipeline::new(
            MockExtractor(numbers()),
            IdentityTransformer,
            MemoryCollection::new(),
            buffer.clone(),
        )
        .with_dag(no_delay_dag());

        let err = pipeline.run_stage(Stage::Transform).await.unwrap_err();
        assert!(matches!(
            err.root(),
            PipelineError::MissingUpstreamArtifact { .. }
        ));

        assert_eq!(pipeline.run_stage(Stage::Extract).await.unwrap(), 3);
        assert_eq!(pipeline.run_stage(Stage::Transform).await.unwrap(), 3);
        assert!(buffer.contains("transformed_data"));
    }
}
