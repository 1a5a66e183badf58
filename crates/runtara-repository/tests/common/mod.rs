// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for runtara-repository integration tests.
//!
//! Provides an in-memory repository, recording collaborators and process
//! model fixtures.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use runtara_repository::entities::{
    EventSubscription, IdentityLink, Job, MESSAGE_EVENT_TYPE, ProcessInstance, SIGNAL_EVENT_TYPE,
    TIMER_START_EVENT_HANDLER, TimerJob, instance_status,
};
use runtara_repository::events::{EngineEvent, EventDispatcher};
use runtara_repository::process_model::{
    EventDefinition, FlowElement, ProcessModel, StartEvent, TimerEventDefinition,
};
use runtara_repository::store::sqlite::SqliteJobRegistry;
use runtara_repository::store::{
    Collaborators, Connection, IdentityLinkStore, JobRegistry, ProcessInstanceManager,
};
use runtara_repository::{DeploymentBuilder, ProcessDefinition, RepositoryService};

/// Shared, ordered log of collaborator calls and dispatched events.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Dispatcher that records every event it receives.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub events: Mutex<Vec<EngineEvent>>,
    pub journal: Journal,
    pub disabled: AtomicBool,
}

impl RecordingDispatcher {
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            journal,
            disabled: AtomicBool::new(false),
        }
    }

    /// Report notifications as disabled from now on.
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn is_enabled(&self) -> bool {
        !self.disabled.load(Ordering::SeqCst)
    }

    fn dispatch(&self, event: EngineEvent) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("dispatch:{}:{}", event.event_type, event.entity_id));
        self.events.lock().unwrap().push(event);
    }
}

/// Job registry that journals deletes before delegating to SQLite.
pub struct RecordingJobRegistry {
    pub journal: Journal,
}

#[async_trait]
impl JobRegistry for RecordingJobRegistry {
    async fn find_by_id(
        &self,
        conn: &mut Connection,
        job_id: &str,
    ) -> runtara_repository::Result<Option<Job>> {
        SqliteJobRegistry.find_by_id(conn, job_id).await
    }

    async fn find_by_type_and_process_definition_id(
        &self,
        conn: &mut Connection,
        handler_type: &str,
        process_definition_id: &str,
    ) -> runtara_repository::Result<Vec<Job>> {
        SqliteJobRegistry
            .find_by_type_and_process_definition_id(conn, handler_type, process_definition_id)
            .await
    }

    async fn schedule(
        &self,
        conn: &mut Connection,
        timer: &TimerJob,
    ) -> runtara_repository::Result<Job> {
        SqliteJobRegistry.schedule(conn, timer).await
    }

    async fn delete(&self, conn: &mut Connection, job: &Job) -> runtara_repository::Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("delete:{}", job.id));
        SqliteJobRegistry.delete(conn, job).await
    }
}

/// Identity link store whose deletes always fail.
pub struct FailingIdentityLinkStore;

#[async_trait]
impl IdentityLinkStore for FailingIdentityLinkStore {
    async fn insert(
        &self,
        _conn: &mut Connection,
        _link: &IdentityLink,
    ) -> runtara_repository::Result<()> {
        Ok(())
    }

    async fn find_by_process_definition(
        &self,
        _conn: &mut Connection,
        _process_definition_id: &str,
    ) -> runtara_repository::Result<Vec<IdentityLink>> {
        Ok(Vec::new())
    }

    async fn delete_by_process_definition(
        &self,
        _conn: &mut Connection,
        _process_definition_id: &str,
    ) -> runtara_repository::Result<u64> {
        Err(runtara_repository::Error::Other(
            "identity link store unavailable".to_string(),
        ))
    }
}

/// Create an in-memory SQLite pool with migrations applied.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    runtara_repository::migrations::run_sqlite(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Test context with a repository over an in-memory database.
pub struct TestContext {
    pub pool: SqlitePool,
    pub service: RepositoryService,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub journal: Journal,
}

impl TestContext {
    /// Repository backed entirely by the SQLite collaborators.
    pub async fn new() -> Self {
        Self::with_collaborators(|c| c).await
    }

    /// Repository whose collaborators are adjusted by `customize`.
    pub async fn with_collaborators(
        customize: impl FnOnce(Collaborators) -> Collaborators,
    ) -> Self {
        let pool = test_pool().await;
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Arc::new(RecordingDispatcher::with_journal(journal.clone()));
        let collaborators = customize(Collaborators::sqlite(dispatcher.clone()));
        let service = RepositoryService::new(pool.clone(), collaborators);

        Self {
            pool,
            service,
            dispatcher,
            journal,
        }
    }

    /// Repository whose job deletes are journaled.
    pub async fn with_recording_jobs() -> Self {
        let pool = test_pool().await;
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Arc::new(RecordingDispatcher::with_journal(journal.clone()));
        let mut collaborators = Collaborators::sqlite(dispatcher.clone());
        collaborators.jobs = Arc::new(RecordingJobRegistry {
            journal: journal.clone(),
        });
        let service = RepositoryService::new(pool.clone(), collaborators);

        Self {
            pool,
            service,
            dispatcher,
            journal,
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().unwrap().clear();
        self.dispatcher.clear();
    }

    /// Deploy `model` as `<key>.process.json` and return the deployment id
    /// with the registered definition.
    pub async fn deploy(&self, model: &ProcessModel, tenant_id: &str) -> (String, ProcessDefinition) {
        let deployment = DeploymentBuilder::new(format!("{} deployment", model.id))
            .tenant_id(tenant_id)
            .resource(
                format!("{}.process.json", model.id),
                serde_json::to_vec(model).unwrap(),
            )
            .build();

        let mut definitions = self.service.deploy(&deployment).await.unwrap();
        assert_eq!(definitions.len(), 1);
        (deployment.deployment.id, definitions.remove(0))
    }

    /// Timer-start jobs bound to `process_definition_id`.
    pub async fn timer_start_jobs(&self, process_definition_id: &str) -> Vec<Job> {
        let mut conn = self.pool.acquire().await.unwrap();
        SqliteJobRegistry
            .find_by_type_and_process_definition_id(
                &mut conn,
                TIMER_START_EVENT_HANDLER,
                process_definition_id,
            )
            .await
            .unwrap()
    }

    /// Message-start subscriptions of `definition`.
    pub async fn message_subscriptions(&self, definition: &ProcessDefinition) -> Vec<EventSubscription> {
        let mut conn = self.pool.acquire().await.unwrap();
        self.service
            .manager()
            .collaborators()
            .event_subscriptions
            .find_by_configuration(&mut conn, MESSAGE_EVENT_TYPE, &definition.id, &definition.tenant_id)
            .await
            .unwrap()
    }

    /// Subscribe `definition` to a signal.
    pub async fn add_signal_subscription(&self, definition: &ProcessDefinition, signal: &str) {
        let mut conn = self.pool.acquire().await.unwrap();
        let subscription = EventSubscription {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: SIGNAL_EVENT_TYPE.to_string(),
            event_name: Some(signal.to_string()),
            configuration: Some(definition.id.clone()),
            activity_id: Some("signalStart".to_string()),
            process_instance_id: None,
            tenant_id: definition.tenant_id.clone(),
            created_at: Utc::now(),
        };
        self.service
            .manager()
            .collaborators()
            .event_subscriptions
            .insert(&mut conn, &subscription)
            .await
            .unwrap();
    }

    /// Number of rows in `table`.
    pub async fn count_rows(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Attach a candidate group link to a process definition.
    pub async fn add_identity_link(&self, process_definition_id: &str, group: &str) {
        let mut conn = self.pool.acquire().await.unwrap();
        let link = IdentityLink {
            id: uuid::Uuid::new_v4().to_string(),
            process_definition_id: process_definition_id.to_string(),
            link_type: "candidate".to_string(),
            user_id: None,
            group_id: Some(group.to_string()),
            created_at: Utc::now(),
        };
        runtara_repository::store::sqlite::SqliteIdentityLinkStore
            .insert(&mut conn, &link)
            .await
            .unwrap();
    }

    /// Start a running instance of a process definition.
    pub async fn start_instance(&self, process_definition_id: &str, parent: Option<&str>) -> String {
        let mut conn = self.pool.acquire().await.unwrap();
        let instance = ProcessInstance {
            id: uuid::Uuid::new_v4().to_string(),
            process_definition_id: process_definition_id.to_string(),
            super_instance_id: parent.map(str::to_string),
            business_key: None,
            tenant_id: String::new(),
            status: instance_status::RUNNING.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            termination_reason: None,
        };
        runtara_repository::store::sqlite::SqliteProcessInstanceManager
            .insert(&mut conn, &instance)
            .await
            .unwrap();
        instance.id
    }

    pub async fn instance(&self, instance_id: &str) -> ProcessInstance {
        let mut conn = self.pool.acquire().await.unwrap();
        runtara_repository::store::sqlite::SqliteProcessInstanceManager
            .find_by_id(&mut conn, instance_id)
            .await
            .unwrap()
            .unwrap()
    }
}

/// Start event with the given trigger definitions.
pub fn start_event(id: &str, event_definitions: Vec<EventDefinition>) -> FlowElement {
    FlowElement::StartEvent(StartEvent {
        id: id.to_string(),
        name: None,
        event_definitions,
    })
}

/// Timer trigger firing `duration` after deployment.
pub fn duration_timer(duration: &str) -> EventDefinition {
    EventDefinition::Timer(TimerEventDefinition {
        time_duration: Some(duration.to_string()),
        ..Default::default()
    })
}

/// Message trigger.
pub fn message(message_ref: &str) -> EventDefinition {
    EventDefinition::Message {
        message_ref: message_ref.to_string(),
    }
}

/// Process with the given flow elements followed by a task and an end event.
pub fn process(key: &str, start_events: Vec<FlowElement>) -> ProcessModel {
    let mut flow_elements = start_events;
    flow_elements.push(FlowElement::Activity {
        id: "work".to_string(),
        name: Some("Do the work".to_string()),
    });
    flow_elements.push(FlowElement::EndEvent {
        id: "end".to_string(),
    });

    ProcessModel {
        id: key.to_string(),
        name: Some(format!("{key} process")),
        flow_elements,
    }
}

/// Process started hourly by a timer on `timerStart`.
pub fn timer_process(key: &str) -> ProcessModel {
    process(key, vec![start_event("timerStart", vec![duration_timer("PT1H")])])
}

/// Process started by `message_ref` on `messageStart`.
pub fn message_process(key: &str, message_ref: &str) -> ProcessModel {
    process(key, vec![start_event("messageStart", vec![message(message_ref)])])
}

/// Process with a plain start event.
pub fn plain_process(key: &str) -> ProcessModel {
    process(key, vec![start_event("start", Vec::new())])
}
