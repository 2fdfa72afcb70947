//! State contract for graph workflows.
//!
//! Nodes never mutate state directly. Each node receives a snapshot of the
//! current state and returns a *partial update*; the engine applies that
//! update through the state's own reducer. This keeps the merge rules in one
//! place (the state type) and makes node outputs observable: the updates
//! stream emits exactly what each node returned, before it is merged.
//!
//! A state type declares its update shape and merge semantics by implementing
//! [`GraphState`]:
//!
//! ```rust
//! use agentgraph_core::state::GraphState;
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterState {
//!     events: Vec<String>,
//!     total: i64,
//! }
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterUpdate {
//!     events: Vec<String>,
//!     add: i64,
//! }
//!
//! impl GraphState for CounterState {
//!     type Update = CounterUpdate;
//!
//!     fn apply(&mut self, update: CounterUpdate) {
//!         self.events.extend(update.events);
//!         self.total += update.add;
//!     }
//! }
//! ```

/// Typed graph state with an associated partial-update type.
///
/// `apply` is the reducer: it merges a node's partial update into the current
/// state. Implementations decide per field whether an update appends,
/// overwrites, or merges. `apply` must be total - it cannot fail - so
/// validation belongs in the nodes that produce updates, not here.
///
/// States are cloned when handed to a node, so keep them cheap to clone
/// (`Arc` large payloads if necessary).
pub trait GraphState: Clone + Send + Sync + 'static {
    /// The partial update returned by nodes.
    type Update: Clone + Send + Sync + 'static;

    /// Merge a partial update into this state.
    fn apply(&mut self, update: Self::Update);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct TestState {
        log: Vec<String>,
        cursor: usize,
    }

    #[derive(Clone, Debug, Default)]
    struct TestUpdate {
        log: Vec<String>,
        cursor: Option<usize>,
    }

    impl GraphState for TestState {
        type Update = TestUpdate;

        fn apply(&mut self, update: TestUpdate) {
            self.log.extend(update.log);
            if let Some(cursor) = update.cursor {
                self.cursor = cursor;
            }
        }
    }

    #[test]
    fn test_apply_merges_per_field() {
        let mut state = TestState::default();
        state.apply(TestUpdate {
            log: vec!["a".into()],
            cursor: None,
        });
        state.apply(TestUpdate {
            log: vec!["b".into()],
            cursor: Some(2),
        });

        assert_eq!(state.log, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(state.cursor, 2);
    }

    #[test]
    fn test_empty_update_is_identity() {
        let mut state = TestState {
            log: vec!["x".into()],
            cursor: 1,
        };
        let before = state.clone();
        state.apply(TestUpdate::default());
        assert_eq!(state, before);
    }
}
