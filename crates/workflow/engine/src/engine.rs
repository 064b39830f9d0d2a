//! The workflow engine: per-instance state machine and dispatch loop.
//!
//! States: `Instantiated → Running ⇄ Paused → {Succeeded, Failed, Stopped}`.
//! `Running` is re-entered from `Paused` only through an explicit [`resume`]
//! call. Exactly one dispatch loop is active per instance: a claim table
//! keyed by instance id serializes dispatch against concurrent control
//! calls, which are rejected with `ConcurrentModification`.
//!
//! Every state transition is persisted through the [`PersistenceStore`] and
//! fanned out to subscribed [`TransitionListener`]s. A persistence or
//! listener failure is logged and never rolls back a committed transition:
//! the engine's own state is the source of truth.
//!
//! [`resume`]: WorkflowEngine::resume

use crate::definitions::DefinitionRegistry;
use crate::executor::{ExecutionOutcome, OperationExecutor};
use crate::instantiator::Instantiator;
use crate::notify::{StateTransition, TransitionListener};
use crate::persistence::{InMemoryStore, PersistenceStore};
use crate::registry::HandlerRegistry;
use alder_workflow_types::{
    Action, FailurePolicy, MediaItem, WorkflowDefinitionId, WorkflowError, WorkflowInstance,
    WorkflowInstanceId, WorkflowResult, WorkflowState, WorkflowStatus,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Owns the lifecycle of all workflow instances.
pub struct WorkflowEngine {
    definitions: DefinitionRegistry,
    handlers: HandlerRegistry,
    instantiator: Instantiator,
    executor: OperationExecutor,
    store: Arc<dyn PersistenceStore>,
    listeners: RwLock<Vec<Arc<dyn TransitionListener>>>,
    dispatching: Mutex<HashMap<WorkflowInstanceId, Arc<DispatchSlot>>>,
}

/// Bookkeeping for one active dispatch: the cooperative interrupt flags,
/// honored at the next transition boundary.
#[derive(Default)]
struct DispatchSlot {
    stop: AtomicBool,
    pause: AtomicBool,
}

/// Exclusive dispatch claim on one instance; released on drop.
struct Claim<'a> {
    engine: &'a WorkflowEngine,
    id: WorkflowInstanceId,
    slot: Arc<DispatchSlot>,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.engine
            .dispatching
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        let handlers = HandlerRegistry::new();
        Self {
            definitions: DefinitionRegistry::new(),
            instantiator: Instantiator::new(handlers.clone()),
            executor: OperationExecutor::new(handlers.clone()),
            handlers,
            store,
            listeners: RwLock::new(Vec::new()),
            dispatching: Mutex::new(HashMap::new()),
        }
    }

    /// Engine backed by the in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }

    /// Subscribe to state-transition events.
    pub fn subscribe(&self, listener: Arc<dyn TransitionListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    // ── Instance Control ─────────────────────────────────────────────

    /// Instantiate a registered definition against a media item. The
    /// instance is persisted in `Instantiated` state and not yet dispatched.
    pub fn start(
        &self,
        definition_id: &WorkflowDefinitionId,
        media: MediaItem,
        variables: HashMap<String, String>,
    ) -> WorkflowResult<WorkflowInstanceId> {
        let definition = self.definitions.get(definition_id)?;
        let instance = self.instantiator.instantiate(&definition, media, variables)?;
        let id = instance.id.clone();
        self.store.save(&instance)?;
        Ok(id)
    }

    /// Convenience: start and dispatch on the calling thread.
    pub fn run(
        &self,
        definition_id: &WorkflowDefinitionId,
        media: MediaItem,
        variables: HashMap<String, String>,
    ) -> WorkflowResult<(WorkflowInstanceId, WorkflowState)> {
        let id = self.start(definition_id, media, variables)?;
        let state = self.dispatch(&id)?;
        Ok((id, state))
    }

    /// Run the dispatch loop for one instance until it pauses or reaches a
    /// terminal state. Occupies the calling thread for the duration,
    /// including any blocking handler work.
    pub fn dispatch(&self, id: &WorkflowInstanceId) -> WorkflowResult<WorkflowState> {
        let claim = self.claim(id)?;
        let mut instance = self.store.load(id)?;
        match instance.state {
            WorkflowState::Instantiated => {
                self.transition(&mut instance, WorkflowState::Running);
            }
            WorkflowState::Running => {
                tracing::warn!(
                    instance_id = %id,
                    "instance already marked running; continuing an interrupted dispatch"
                );
            }
            // a paused instance re-enters Running only through resume
            WorkflowState::Paused => {
                return Err(WorkflowError::ConcurrentModification(id.clone()))
            }
            state => return Ok(state),
        }
        self.drive(&claim, instance, None)
    }

    /// Resume a paused instance, optionally redirecting execution to a
    /// specific operation index ("retry from step N") and passing resume
    /// data to the first dispatched operation's `resume` entry point.
    pub fn resume(
        &self,
        id: &WorkflowInstanceId,
        from: Option<usize>,
        resume_data: Option<String>,
    ) -> WorkflowResult<WorkflowState> {
        let claim = self.claim(id)?;
        let mut instance = self.store.load(id)?;
        if instance.state != WorkflowState::Paused {
            return Err(WorkflowError::ConcurrentModification(id.clone()));
        }
        if let Some(from) = from {
            if from >= instance.operation_count() {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "resume override {} is out of bounds for instance '{}' with {} operations",
                    from,
                    id,
                    instance.operation_count()
                )));
            }
            // explicit retry directive: the targeted suffix returns to Pending
            instance.reset_operations_from(from);
            instance.position = from;
        }
        self.transition(&mut instance, WorkflowState::Running);
        self.drive(&claim, instance, resume_data)
    }

    /// Stop an instance, abandoning remaining operations without invoking
    /// their handlers. On an instance under active dispatch this sets the
    /// cooperative stop flag (honored at the next transition boundary) and
    /// rejects, so the caller retries once the boundary is reached.
    pub fn stop(&self, id: &WorkflowInstanceId) -> WorkflowResult<()> {
        let _claim = {
            let mut dispatching = self.dispatching.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = dispatching.get(id) {
                slot.stop.store(true, Ordering::SeqCst);
                return Err(WorkflowError::ConcurrentModification(id.clone()));
            }
            let slot = Arc::new(DispatchSlot::default());
            dispatching.insert(id.clone(), slot.clone());
            Claim {
                engine: self,
                id: id.clone(),
                slot,
            }
        };
        let mut instance = self.store.load(id)?;
        match instance.state {
            WorkflowState::Instantiated | WorkflowState::Running | WorkflowState::Paused => {
                self.transition(&mut instance, WorkflowState::Stopped);
                Ok(())
            }
            _ => Err(WorkflowError::ConcurrentModification(id.clone())),
        }
    }

    /// Suspend an instance between operations. Same claim discipline as
    /// [`stop`](WorkflowEngine::stop).
    pub fn pause(&self, id: &WorkflowInstanceId) -> WorkflowResult<()> {
        let _claim = {
            let mut dispatching = self.dispatching.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = dispatching.get(id) {
                slot.pause.store(true, Ordering::SeqCst);
                return Err(WorkflowError::ConcurrentModification(id.clone()));
            }
            let slot = Arc::new(DispatchSlot::default());
            dispatching.insert(id.clone(), slot.clone());
            Claim {
                engine: self,
                id: id.clone(),
                slot,
            }
        };
        let mut instance = self.store.load(id)?;
        match instance.state {
            WorkflowState::Instantiated | WorkflowState::Running => {
                self.transition(&mut instance, WorkflowState::Paused);
                Ok(())
            }
            WorkflowState::Paused => Ok(()),
            _ => Err(WorkflowError::ConcurrentModification(id.clone())),
        }
    }

    /// Consistent snapshot of an instance, read from the store, never a
    /// partially updated mid-dispatch view.
    pub fn status(&self, id: &WorkflowInstanceId) -> WorkflowResult<WorkflowStatus> {
        Ok(self.store.load(id)?.status())
    }

    /// Status of every stored instance.
    pub fn list(&self) -> WorkflowResult<Vec<WorkflowStatus>> {
        Ok(self
            .store
            .list()?
            .iter()
            .map(WorkflowInstance::status)
            .collect())
    }

    // ── Dispatch Loop ────────────────────────────────────────────────

    fn drive(
        &self,
        claim: &Claim<'_>,
        mut instance: WorkflowInstance,
        mut resume_data: Option<String>,
    ) -> WorkflowResult<WorkflowState> {
        while instance.state == WorkflowState::Running {
            if claim.slot.stop.load(Ordering::SeqCst) {
                self.transition(&mut instance, WorkflowState::Stopped);
                break;
            }
            if claim.slot.pause.load(Ordering::SeqCst) {
                self.transition(&mut instance, WorkflowState::Paused);
                break;
            }
            let position = instance.position;
            if position >= instance.operation_count() {
                self.transition(&mut instance, WorkflowState::Succeeded);
                break;
            }
            if instance
                .operation(position)
                .is_some_and(|op| op.state.is_finished())
            {
                instance.position = position + 1;
                continue;
            }

            let data = resume_data.take();
            let outcome = self.executor.execute(&mut instance, position, data.as_deref());
            match outcome {
                ExecutionOutcome::Advance { action } => match action {
                    Action::Continue => {
                        instance.position = position + 1;
                        self.persist(&instance);
                    }
                    Action::Pause => {
                        instance.position = position + 1;
                        self.transition(&mut instance, WorkflowState::Paused);
                        break;
                    }
                    Action::Skip { additional } => {
                        let end =
                            (position + 1 + additional as usize).min(instance.operation_count());
                        for skipped in position + 1..end {
                            instance.skip_operation(skipped);
                        }
                        instance.position = end;
                        self.persist(&instance);
                    }
                    Action::Stop => {
                        // the handler asserts "good enough": terminal success
                        self.transition(&mut instance, WorkflowState::Succeeded);
                        break;
                    }
                },
                ExecutionOutcome::Failed { error } => {
                    let (policy, fallback) = instance
                        .operation(position)
                        .map(|op| (op.failure_policy, op.exception_handler_workflow.clone()))
                        .unwrap_or((FailurePolicy::Fail, None));
                    self.persist(&instance);
                    match policy {
                        FailurePolicy::Continue => {
                            tracing::warn!(
                                instance_id = %instance.id,
                                position,
                                %error,
                                "operation failed; continuing per failure policy"
                            );
                            instance.position = position + 1;
                            self.persist(&instance);
                        }
                        FailurePolicy::Fail => {
                            tracing::warn!(
                                instance_id = %instance.id,
                                position,
                                %error,
                                "operation failed"
                            );
                            match fallback {
                                Some(definition_id) => {
                                    self.run_exception_handler(&mut instance, &definition_id);
                                }
                                None => self.transition(&mut instance, WorkflowState::Failed),
                            }
                            break;
                        }
                    }
                }
            }
        }
        Ok(instance.state)
    }

    /// Divert a failed instance to its exception-handler workflow. The
    /// original's terminal state equals the fallback's: Failed only if the
    /// fallback also failed to succeed.
    fn run_exception_handler(
        &self,
        instance: &mut WorkflowInstance,
        definition_id: &WorkflowDefinitionId,
    ) {
        tracing::info!(
            instance_id = %instance.id,
            fallback = %definition_id,
            "routing to exception-handler workflow"
        );
        match self.run_fallback_instance(instance, definition_id) {
            Ok(WorkflowState::Succeeded) => {
                self.transition(instance, WorkflowState::Succeeded);
            }
            Ok(state) => {
                tracing::warn!(
                    instance_id = %instance.id,
                    fallback = %definition_id,
                    fallback_state = %state,
                    "exception-handler workflow did not succeed"
                );
                self.transition(instance, WorkflowState::Failed);
            }
            Err(error) => {
                tracing::warn!(
                    instance_id = %instance.id,
                    fallback = %definition_id,
                    %error,
                    "exception-handler workflow could not run"
                );
                self.transition(instance, WorkflowState::Failed);
            }
        }
    }

    fn run_fallback_instance(
        &self,
        original: &mut WorkflowInstance,
        definition_id: &WorkflowDefinitionId,
    ) -> WorkflowResult<WorkflowState> {
        let definition = self.definitions.get(definition_id)?;
        let fallback = self.instantiator.instantiate(
            &definition,
            original.media.clone(),
            original.variables.clone(),
        )?;
        let fallback_id = fallback.id.clone();
        original.exception_handler_instance = Some(fallback_id.clone());
        self.store.save(&fallback)?;
        self.dispatch(&fallback_id)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn claim(&self, id: &WorkflowInstanceId) -> WorkflowResult<Claim<'_>> {
        let mut dispatching = self.dispatching.lock().unwrap_or_else(|e| e.into_inner());
        if dispatching.contains_key(id) {
            return Err(WorkflowError::ConcurrentModification(id.clone()));
        }
        let slot = Arc::new(DispatchSlot::default());
        dispatching.insert(id.clone(), slot.clone());
        Ok(Claim {
            engine: self,
            id: id.clone(),
            slot,
        })
    }

    fn transition(&self, instance: &mut WorkflowInstance, new_state: WorkflowState) {
        let old_state = instance.state;
        if old_state == new_state {
            return;
        }
        match new_state {
            WorkflowState::Instantiated => {}
            WorkflowState::Running => {
                if old_state == WorkflowState::Paused {
                    instance.resume();
                } else {
                    instance.start();
                }
            }
            WorkflowState::Paused => {
                let position = instance.position;
                instance.pause_at(position);
            }
            WorkflowState::Succeeded => instance.succeed(),
            WorkflowState::Failed => instance.fail(),
            WorkflowState::Stopped => instance.stop(),
        }
        self.persist(instance);
        tracing::info!(
            instance_id = %instance.id,
            from = %old_state,
            to = %new_state,
            position = instance.position,
            "workflow state transition"
        );
        self.emit(StateTransition {
            instance_id: instance.id.clone(),
            old_state,
            new_state,
            position: instance.position,
            occurred_at: Utc::now(),
        });
    }

    fn persist(&self, instance: &WorkflowInstance) {
        // a failed save never rolls back the committed transition
        if let Err(error) = self.store.save(instance) {
            tracing::error!(
                instance_id = %instance.id,
                %error,
                "failed to persist workflow instance"
            );
        }
    }

    fn emit(&self, transition: StateTransition) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            if let Err(error) = listener.on_transition(&transition) {
                tracing::warn!(
                    instance_id = %transition.instance_id,
                    %error,
                    "transition listener failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerContext, HandlerError, OperationHandler, OperationResult};
    use crate::notify::NotifyError;
    use alder_workflow_types::{
        MediaItemId, OperationInstance, OperationSpec, OperationState, WorkflowDefinition,
    };
    use std::sync::atomic::AtomicUsize;

    struct Succeed;

    impl OperationHandler for Succeed {
        fn start(
            &self,
            _operation: &OperationInstance,
            _ctx: &mut HandlerContext<'_>,
        ) -> Result<OperationResult, HandlerError> {
            Ok(OperationResult::new(Action::Continue))
        }
    }

    struct Pausing;

    impl OperationHandler for Pausing {
        fn start(
            &self,
            _operation: &OperationInstance,
            _ctx: &mut HandlerContext<'_>,
        ) -> Result<OperationResult, HandlerError> {
            Ok(OperationResult::new(Action::Pause))
        }
    }

    struct Stopping;

    impl OperationHandler for Stopping {
        fn start(
            &self,
            _operation: &OperationInstance,
            _ctx: &mut HandlerContext<'_>,
        ) -> Result<OperationResult, HandlerError> {
            Ok(OperationResult::new(Action::Stop))
        }
    }

    struct Skipping {
        additional: u32,
    }

    impl OperationHandler for Skipping {
        fn start(
            &self,
            _operation: &OperationInstance,
            _ctx: &mut HandlerContext<'_>,
        ) -> Result<OperationResult, HandlerError> {
            Ok(OperationResult::new(Action::skip_ahead(self.additional)))
        }
    }

    struct Failing;

    impl OperationHandler for Failing {
        fn start(
            &self,
            _operation: &OperationInstance,
            _ctx: &mut HandlerContext<'_>,
        ) -> Result<OperationResult, HandlerError> {
            Err(HandlerError::new("boom"))
        }
    }

    struct Counting {
        invocations: Arc<AtomicUsize>,
    }

    impl OperationHandler for Counting {
        fn start(
            &self,
            _operation: &OperationInstance,
            _ctx: &mut HandlerContext<'_>,
        ) -> Result<OperationResult, HandlerError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(OperationResult::new(Action::Continue))
        }
    }

    struct SetVariable;

    impl OperationHandler for SetVariable {
        fn start(
            &self,
            operation: &OperationInstance,
            ctx: &mut HandlerContext<'_>,
        ) -> Result<OperationResult, HandlerError> {
            for (key, value) in &operation.configuration {
                ctx.variables.insert(key.clone(), value.clone());
            }
            Ok(OperationResult::new(Action::Continue))
        }
    }

    struct Recorder {
        transitions: Mutex<Vec<(WorkflowState, WorkflowState)>>,
    }

    impl TransitionListener for Recorder {
        fn on_transition(&self, transition: &StateTransition) -> Result<(), NotifyError> {
            self.transitions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((transition.old_state, transition.new_state));
            Ok(())
        }
    }

    fn make_engine() -> WorkflowEngine {
        let engine = WorkflowEngine::in_memory();
        engine.handlers().register("ok", Arc::new(Succeed));
        engine.handlers().register("pausing", Arc::new(Pausing));
        engine.handlers().register("stopping", Arc::new(Stopping));
        engine.handlers().register("failing", Arc::new(Failing));
        engine.handlers().register("set-variables", Arc::new(SetVariable));
        engine
    }

    fn media() -> MediaItem {
        MediaItem::new(MediaItemId::new("media-1"))
    }

    fn linear_definition(id: &str, handlers: &[&str]) -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new(id).with_id(id);
        for handler in handlers {
            def.add_operation(OperationSpec::new(*handler));
        }
        def
    }

    #[test]
    fn test_linear_run_succeeds_every_operation() {
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("linear", &["ok", "ok", "ok"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);

        let status = engine.status(&id).unwrap();
        assert_eq!(status.state, WorkflowState::Succeeded);
        assert_eq!(status.operations.len(), 3);
        assert!(status
            .operations
            .iter()
            .all(|op| op.state == OperationState::Succeeded));
        assert!(status.failure.is_none());
    }

    #[test]
    fn test_start_does_not_dispatch() {
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("linear", &["ok"]))
            .unwrap();

        let id = engine.start(&def_id, media(), HashMap::new()).unwrap();
        let status = engine.status(&id).unwrap();
        assert_eq!(status.state, WorkflowState::Instantiated);
        assert_eq!(status.position, 0);
    }

    #[test]
    fn test_conditional_scenario() {
        // [A(always), B(if var.x == true), C(always)] with x=false
        let engine = make_engine();
        let invocations = Arc::new(AtomicUsize::new(0));
        engine.handlers().register(
            "counting",
            Arc::new(Counting {
                invocations: invocations.clone(),
            }),
        );
        let def = WorkflowDefinition::new("conditional")
            .with_id("conditional")
            .with_operation(OperationSpec::new("ok"))
            .with_operation(OperationSpec::new("counting").with_condition("${x} == true"))
            .with_operation(OperationSpec::new("ok"));
        let def_id = engine.definitions().register(def).unwrap();

        let mut variables = HashMap::new();
        variables.insert("x".to_string(), "false".to_string());
        let (id, state) = engine.run(&def_id, media(), variables).unwrap();

        assert_eq!(state, WorkflowState::Succeeded);
        let status = engine.status(&id).unwrap();
        assert_eq!(status.operations[0].state, OperationState::Succeeded);
        assert_eq!(status.operations[1].state, OperationState::Skipped);
        assert_eq!(status.operations[2].state, OperationState::Succeeded);
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pause_then_resume_to_success() {
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("pausing", &["ok", "pausing", "ok"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Paused);

        let status = engine.status(&id).unwrap();
        assert_eq!(status.state, WorkflowState::Paused);
        assert_eq!(status.position, 2);
        assert_eq!(status.operations[1].state, OperationState::Succeeded);
        assert_eq!(status.operations[2].state, OperationState::Pending);

        let state = engine.resume(&id, None, None).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);
    }

    #[test]
    fn test_pause_preserves_variables() {
        let engine = make_engine();
        let def = WorkflowDefinition::new("vars")
            .with_id("vars")
            .with_operation(OperationSpec::new("set-variables").with_configuration("x", "42"))
            .with_operation(OperationSpec::new("pausing"))
            .with_operation(OperationSpec::new("ok"));
        let def_id = engine.definitions().register(def).unwrap();

        let (id, _) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        let paused = engine.store.load(&id).unwrap();
        assert_eq!(paused.state, WorkflowState::Paused);
        assert_eq!(paused.variables.get("x").unwrap(), "42");

        engine.resume(&id, None, None).unwrap();
        let finished = engine.store.load(&id).unwrap();
        assert_eq!(finished.variables.get("x").unwrap(), "42");
    }

    #[test]
    fn test_stop_while_paused_leaves_pending_operations() {
        let engine = make_engine();
        let invocations = Arc::new(AtomicUsize::new(0));
        engine.handlers().register(
            "counting",
            Arc::new(Counting {
                invocations: invocations.clone(),
            }),
        );
        let def_id = engine
            .definitions()
            .register(linear_definition("stoppable", &["ok", "pausing", "counting"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Paused);

        engine.stop(&id).unwrap();
        let status = engine.status(&id).unwrap();
        assert_eq!(status.state, WorkflowState::Stopped);
        assert_eq!(status.operations[2].state, OperationState::Pending);
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_action_is_terminal_success() {
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("early", &["ok", "stopping", "ok"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);

        let status = engine.status(&id).unwrap();
        assert_eq!(status.operations[1].state, OperationState::Succeeded);
        assert_eq!(status.operations[2].state, OperationState::Pending);
    }

    #[test]
    fn test_skip_action_with_additional_count() {
        let engine = make_engine();
        engine
            .handlers()
            .register("skipping", Arc::new(Skipping { additional: 1 }));
        let def_id = engine
            .definitions()
            .register(linear_definition("skippy", &["ok", "skipping", "ok", "ok"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);

        let status = engine.status(&id).unwrap();
        assert_eq!(status.operations[1].state, OperationState::Skipped);
        assert_eq!(status.operations[2].state, OperationState::Skipped);
        assert_eq!(status.operations[3].state, OperationState::Succeeded);
    }

    #[test]
    fn test_skip_count_clamped_to_tail() {
        let engine = make_engine();
        engine
            .handlers()
            .register("skipping", Arc::new(Skipping { additional: 10 }));
        let def_id = engine
            .definitions()
            .register(linear_definition("clamped", &["skipping", "ok"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);
        let status = engine.status(&id).unwrap();
        assert_eq!(status.operations[0].state, OperationState::Skipped);
        assert_eq!(status.operations[1].state, OperationState::Skipped);
    }

    #[test]
    fn test_failure_without_fallback_is_terminal() {
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("doomed", &["ok", "failing", "ok"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Failed);

        let status = engine.status(&id).unwrap();
        let failure = status.failure.unwrap();
        assert_eq!(failure.position, 1);
        assert_eq!(failure.handler, "failing");
        assert_eq!(failure.kind, "handler-execution");
        assert_eq!(status.operations[2].state, OperationState::Pending);
    }

    #[test]
    fn test_failure_policy_continue_proceeds() {
        let engine = make_engine();
        let def = WorkflowDefinition::new("tolerant")
            .with_id("tolerant")
            .with_operation(OperationSpec::new("failing").continue_on_error())
            .with_operation(OperationSpec::new("ok"));
        let def_id = engine.definitions().register(def).unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);

        let status = engine.status(&id).unwrap();
        assert_eq!(status.operations[0].state, OperationState::Failed);
        assert_eq!(status.operations[1].state, OperationState::Succeeded);
        // the failure stays recorded for audit
        assert_eq!(status.failure.unwrap().position, 0);
    }

    #[test]
    fn test_fallback_workflow_success_rescues_instance() {
        let engine = make_engine();
        let cleanup_id = engine
            .definitions()
            .register(linear_definition("cleanup", &["ok"]))
            .unwrap();
        let def = WorkflowDefinition::new("guarded")
            .with_id("guarded")
            .with_operation(
                OperationSpec::new("failing").with_exception_handler(cleanup_id.clone()),
            );
        let def_id = engine.definitions().register(def).unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);

        let original = engine.store.load(&id).unwrap();
        let fallback_id = original.exception_handler_instance.clone().unwrap();
        let fallback = engine.store.load(&fallback_id).unwrap();
        assert_eq!(fallback.state, WorkflowState::Succeeded);
        assert_eq!(fallback.definition_id, cleanup_id);
    }

    #[test]
    fn test_fallback_workflow_failure_fails_instance() {
        let engine = make_engine();
        let cleanup_id = engine
            .definitions()
            .register(linear_definition("cleanup", &["failing"]))
            .unwrap();
        let def = WorkflowDefinition::new("guarded")
            .with_id("guarded")
            .with_operation(OperationSpec::new("failing").with_exception_handler(cleanup_id));
        let def_id = engine.definitions().register(def).unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Failed);

        let fallback_id = engine
            .store
            .load(&id)
            .unwrap()
            .exception_handler_instance
            .clone()
            .unwrap();
        assert_eq!(
            engine.store.load(&fallback_id).unwrap().state,
            WorkflowState::Failed
        );
    }

    #[test]
    fn test_unresolved_variable_honors_failure_policy() {
        let engine = make_engine();
        let def = WorkflowDefinition::new("templated")
            .with_id("templated")
            .with_operation(
                OperationSpec::new("ok").with_configuration("source", "${missing}"),
            );
        let def_id = engine.definitions().register(def).unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Failed);
        assert_eq!(
            engine.status(&id).unwrap().failure.unwrap().kind,
            "unresolved-variable"
        );
    }

    #[test]
    fn test_handler_unregistered_between_start_and_dispatch() {
        let engine = make_engine();
        engine.handlers().register("ghost", Arc::new(Succeed));
        let def_id = engine
            .definitions()
            .register(linear_definition("ghostly", &["ok", "ghost"]))
            .unwrap();

        let id = engine.start(&def_id, media(), HashMap::new()).unwrap();
        engine.handlers().unregister("ghost");

        let state = engine.dispatch(&id).unwrap();
        assert_eq!(state, WorkflowState::Failed);
        assert_eq!(
            engine.status(&id).unwrap().failure.unwrap().kind,
            "handler-not-found"
        );
    }

    #[test]
    fn test_resume_on_non_paused_is_rejected() {
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("linear", &["ok"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);

        let result = engine.resume(&id, None, None);
        assert!(matches!(
            result,
            Err(WorkflowError::ConcurrentModification(_))
        ));
        assert_eq!(
            engine.status(&id).unwrap().state,
            WorkflowState::Succeeded
        );
    }

    #[test]
    fn test_resume_override_retries_from_index() {
        let engine = make_engine();
        let invocations = Arc::new(AtomicUsize::new(0));
        engine.handlers().register(
            "counting",
            Arc::new(Counting {
                invocations: invocations.clone(),
            }),
        );
        let def_id = engine
            .definitions()
            .register(linear_definition("retry", &["counting", "pausing", "ok"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Paused);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);

        // retry from step 0: the whole suffix resets and re-runs
        let state = engine.resume(&id, Some(0), None).unwrap();
        assert_eq!(state, WorkflowState::Paused);
        assert_eq!(invocations.load(Ordering::SeqCst), 2);

        let state = engine.resume(&id, None, None).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);
    }

    #[test]
    fn test_resume_override_out_of_bounds() {
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("short", &["pausing"]))
            .unwrap();
        let (id, _) = engine.run(&def_id, media(), HashMap::new()).unwrap();

        let result = engine.resume(&id, Some(5), None);
        assert!(matches!(result, Err(WorkflowError::InvalidDefinition(_))));
    }

    #[test]
    fn test_transition_events_emitted_in_order() {
        let engine = make_engine();
        let recorder = Arc::new(Recorder {
            transitions: Mutex::new(Vec::new()),
        });
        engine.subscribe(recorder.clone());

        let def_id = engine
            .definitions()
            .register(linear_definition("observed", &["pausing"]))
            .unwrap();
        let (id, _) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        engine.resume(&id, None, None).unwrap();

        let transitions = recorder
            .transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        assert_eq!(
            transitions,
            vec![
                (WorkflowState::Instantiated, WorkflowState::Running),
                (WorkflowState::Running, WorkflowState::Paused),
                (WorkflowState::Paused, WorkflowState::Running),
                (WorkflowState::Running, WorkflowState::Succeeded),
            ]
        );
    }

    #[test]
    fn test_listener_failure_does_not_affect_engine() {
        struct Broken;

        impl TransitionListener for Broken {
            fn on_transition(&self, _transition: &StateTransition) -> Result<(), NotifyError> {
                Err(NotifyError::new("subscriber down"))
            }
        }

        let engine = make_engine();
        let recorder = Arc::new(Recorder {
            transitions: Mutex::new(Vec::new()),
        });
        engine.subscribe(Arc::new(Broken));
        engine.subscribe(recorder.clone());

        let def_id = engine
            .definitions()
            .register(linear_definition("observed", &["ok"]))
            .unwrap();
        let (_, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();

        assert_eq!(state, WorkflowState::Succeeded);
        let seen = recorder
            .transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len();
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_stop_during_dispatch_takes_effect_at_boundary() {
        struct SelfStopping {
            engine: Arc<WorkflowEngine>,
        }

        impl OperationHandler for SelfStopping {
            fn start(
                &self,
                _operation: &OperationInstance,
                ctx: &mut HandlerContext<'_>,
            ) -> Result<OperationResult, HandlerError> {
                // a concurrent stop is rejected but leaves the interrupt flag
                let result = self.engine.stop(ctx.instance_id);
                assert!(matches!(
                    result,
                    Err(WorkflowError::ConcurrentModification(_))
                ));
                Ok(OperationResult::new(Action::Continue))
            }
        }

        let engine = Arc::new(make_engine());
        engine.handlers().register(
            "self-stopping",
            Arc::new(SelfStopping {
                engine: engine.clone(),
            }),
        );
        let def_id = engine
            .definitions()
            .register(linear_definition("interrupted", &["self-stopping", "ok"]))
            .unwrap();

        let (id, state) = engine.run(&def_id, media(), HashMap::new()).unwrap();
        assert_eq!(state, WorkflowState::Stopped);

        let status = engine.status(&id).unwrap();
        // the first operation finished before the boundary; the rest never ran
        assert_eq!(status.operations[0].state, OperationState::Succeeded);
        assert_eq!(status.operations[1].state, OperationState::Pending);
    }

    #[test]
    fn test_pause_control_call_on_idle_running_instance() {
        // an instance left marked running (interrupted process) can be paused
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("limbo", &["ok"]))
            .unwrap();
        let id = engine.start(&def_id, media(), HashMap::new()).unwrap();

        engine.pause(&id).unwrap();
        assert_eq!(engine.status(&id).unwrap().state, WorkflowState::Paused);

        let state = engine.resume(&id, None, None).unwrap();
        assert_eq!(state, WorkflowState::Succeeded);
    }

    #[test]
    fn test_stop_on_terminal_instance_is_rejected() {
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("done", &["ok"]))
            .unwrap();
        let (id, _) = engine.run(&def_id, media(), HashMap::new()).unwrap();

        let result = engine.stop(&id);
        assert!(matches!(
            result,
            Err(WorkflowError::ConcurrentModification(_))
        ));
    }

    #[test]
    fn test_status_of_unknown_instance() {
        let engine = make_engine();
        let result = engine.status(&WorkflowInstanceId::new("nope"));
        assert!(matches!(result, Err(WorkflowError::InstanceNotFound(_))));
    }

    #[test]
    fn test_list_instances() {
        let engine = make_engine();
        let def_id = engine
            .definitions()
            .register(linear_definition("linear", &["ok"]))
            .unwrap();
        engine.run(&def_id, media(), HashMap::new()).unwrap();
        engine.start(&def_id, media(), HashMap::new()).unwrap();

        let statuses = engine.list().unwrap();
        assert_eq!(statuses.len(), 2);
    }
}
