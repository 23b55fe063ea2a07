//! Orchestrator-facing declaration of the pipeline
//!
//! The crate does not schedule anything itself. A [`Dag`] names the three
//! tasks, their retry policies, the dependency edges between them and the
//! schedule/notification metadata an external scheduler needs. The runner in
//! [`crate::etl::Pipeline`] consumes the same declaration through
//! [`Dag::execution_order`].

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::etl::{RetryPolicy, Stage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DAG_ID: &str = "simple_etl_dag";

/// Seconds in one day, the default trigger interval
pub const DAILY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub interval_secs: u64,
    pub start_date: String,
    /// Missed intervals are not run retroactively when `false`
    pub catchup: bool,
    pub depends_on_past: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval_secs: DAILY,
            start_date: "2023-01-01".to_string(),
            catchup: false,
            depends_on_past: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Stage,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dag {
    pub dag_id: String,
    pub owner: String,
    pub email: Option<String>,
    pub email_on_failure: bool,
    pub email_on_retry: bool,
    pub schedule: Schedule,
    pub tasks: Vec<Task>,
    /// `(upstream, downstream)` pairs
    pub edges: Vec<(Stage, Stage)>,
}

impl Dag {
    /// The extract → transform → load chain with policies from `config`
    pub fn from_config(config: &PipelineConfig) -> Self {
        let retry = &config.retry;
        let default_policy = RetryPolicy::new(retry.default_attempts, retry.delay_secs);

        Self {
            dag_id: DAG_ID.to_string(),
            owner: config.notify.owner.clone(),
            email: config.notify.email.clone(),
            email_on_failure: config.notify.on_failure,
            email_on_retry: config.notify.on_retry,
            schedule: Schedule::default(),
            tasks: vec![
                Task {
                    task_id: Stage::Extract,
                    retry: RetryPolicy::new(retry.extract_attempts, retry.delay_secs),
                },
                Task {
                    task_id: Stage::Transform,
                    retry: default_policy,
                },
                Task {
                    task_id: Stage::Load,
                    retry: default_policy,
                },
            ],
            edges: vec![
                (Stage::Extract, Stage::Transform),
                (Stage::Transform, Stage::Load),
            ],
        }
    }

    pub fn task(&self, stage: Stage) -> Result<&Task, PipelineError> {
        self.tasks
            .iter()
            .find(|t| t.task_id == stage)
            .ok_or_else(|| PipelineError::Definition(format!("no task declared for {}", stage)))
    }

    /// Tasks that must complete before `stage` may start
    pub fn upstream(&self, stage: Stage) -> Vec<Stage> {
        self.edges
            .iter()
            .filter(|(_, to)| *to == stage)
            .map(|(from, _)| *from)
            .collect()
    }

    /// Tasks in dependency order
    ///
    /// Ties are broken by declaration order. Fails on duplicate tasks, edges to
    /// undeclared tasks, self-edges and cycles.
    pub fn execution_order(&self) -> Result<Vec<&Task>, PipelineError> {
        let mut indegree: HashMap<Stage, usize> = HashMap::new();
        for task in &self.tasks {
            if indegree.insert(task.task_id, 0).is_some() {
                return Err(PipelineError::Definition(format!(
                    "task {} declared twice",
                    task.task_id
                )));
            }
        }

        if let Some(missing) = Stage::ALL.iter().find(|s| !indegree.contains_key(*s)) {
            return Err(PipelineError::Definition(format!(
                "task {} is not declared",
                missing
            )));
        }

        for (from, to) in &self.edges {
            if from == to {
                return Err(PipelineError::Definition(format!(
                    "task {} depends on itself",
                    from
                )));
            }
            if !indegree.contains_key(from) || !indegree.contains_key(to) {
                return Err(PipelineError::Definition(format!(
                    "edge {} -> {} references an undeclared task",
                    from, to
                )));
            }
            *indegree.entry(*to).or_default() += 1;
        }

        let mut order: Vec<&Task> = Vec::with_capacity(self.tasks.len());
        while order.len() < self.tasks.len() {
            let next = self
                .tasks
                .iter()
                .find(|t| indegree.get(&t.task_id) == Some(&0))
                .ok_or_else(|| PipelineError::Definition("dependency cycle".to_string()))?;

            indegree.remove(&next.task_id);
            for (_, to) in self.edges.iter().filter(|(from, _)| *from == next.task_id) {
                if let Some(count) = indegree.get_mut(to) {
                    *count -= 1;
                }
            }
            order.push(next);
        }

        Ok(order)
    }

    pub fn to_yaml(&self) -> Result<String, PipelineError> {
        serde_yaml::to_string(self).map_err(|e| PipelineError::Serialization(e.to_string()))
    }
}

impl Default for Dag {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(order: &[&Task]) -> Vec<Stage> {
        order.iter().map(|t| t.task_id).collect()
    }

    #[test]
    fn test_default_declaration() {
        let dag = Dag::default();
        assert_eq!(dag.dag_id, "simple_etl_dag");
        assert_eq!(dag.owner, "airflow");
        assert!(dag.email_on_failure);
        assert!(dag.email_on_retry);
        assert_eq!(dag.schedule.interval_secs, DAILY);
        assert!(!dag.schedule.catchup);
        assert_eq!(
            dag.edges,
            vec![
                (Stage::Extract, Stage::Transform),
                (Stage::Transform, Stage::Load)
            ]
        );
        assert_eq!(dag.task(Stage::Extract).unwrap().retry, RetryPolicy::new(3, 60));
        assert_eq!(dag.task(Stage::Transform).unwrap().retry, RetryPolicy::new(2, 60));
        assert_eq!(dag.task(Stage::Load).unwrap().retry, RetryPolicy::new(2, 60));
    }

    #[test]
    fn test_execution_order_follows_edges() {
        let mut dag = Dag::default();
        dag.tasks.reverse();
        assert_eq!(
            ids(&dag.execution_order().unwrap()),
            vec![Stage::Extract, Stage::Transform, Stage::Load]
        );
        assert_eq!(dag.upstream(Stage::Load), vec![Stage::Transform]);
        assert!(dag.upstream(Stage::Extract).is_empty());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut dag = Dag::default();
        dag.edges.push((Stage::Load, Stage::Extract));
        let err = dag.execution_order().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_undeclared_task_is_rejected() {
        let mut dag = Dag::default();
        dag.tasks.retain(|t| t.task_id != Stage::Load);
        assert!(dag.execution_order().is_err());
        assert!(dag.task(Stage::Load).is_err());
    }

    #[test]
    fn test_incomplete_declaration_is_rejected() {
        let mut dag = Dag::default();
        dag.tasks.retain(|t| t.task_id != Stage::Load);
        dag.edges.retain(|(_, to)| *to != Stage::Load);
        let err = dag.execution_order().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid pipeline definition: task load_data is not declared"
        );

        let mut dag = Dag::default();
        dag.tasks.clear();
        dag.edges.clear();
        assert!(matches!(
            dag.execution_order(),
            Err(PipelineError::Definition(_))
        ));
    }

    #[test]
    fn test_duplicate_task_and_self_edge_are_rejected() {
        let mut dag = Dag::default();
        dag.tasks.push(dag.tasks[0].clone());
        assert!(dag.execution_order().is_err());

        let mut dag = Dag::default();
        dag.edges.push((Stage::Load, Stage::Load));
        assert!(dag.execution_order().is_err());
    }

    #[test]
    fn test_yaml_declaration() {
        let yaml = Dag::default().to_yaml().unwrap();
        assert!(yaml.contains("dag_id: simple_etl_dag"));
        assert!(yaml.contains("task_id: extract_data"));
        assert!(yaml.contains("catchup: false"));

        let parsed: Dag = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, Dag::default());
    }
}
