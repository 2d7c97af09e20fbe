use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, oneshot};

use tagbid_core::connector::DemandGateway;
use tagbid_core::{SlotDemand, SlotId, TagbidError, Targeting};

/// Instruction for how one `fetch_demand` call should behave.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return this demand, filtered down to the requested slots.
    Return(SlotDemand),
    /// Return one record per requested slot tagged with the call number.
    Echo,
    /// Fail with the provided error.
    Fail(TagbidError),
    /// Hang indefinitely.
    Hang,
}

/// Releases one gated call when opened (or dropped).
#[derive(Debug)]
pub struct Gate {
    tx: oneshot::Sender<()>,
}

impl Gate {
    /// Let the gated call answer.
    pub fn open(self) {
        let _ = self.tx.send(());
    }
}

#[derive(Debug)]
struct Scripted {
    behavior: MockBehavior,
    gate: Option<oneshot::Receiver<()>>,
}

#[derive(Debug)]
struct InternalState {
    script: VecDeque<Scripted>,
    fallback: MockBehavior,
    requests: Vec<Vec<SlotId>>,
}

impl Default for InternalState {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: MockBehavior::Echo,
            requests: Vec::new(),
        }
    }
}

/// Controller handle used by tests to drive the dynamic mock from the outside.
///
/// Scripted behaviors are consumed one per call in the order they were
/// pushed; once the script runs dry every call uses the fallback.
pub struct DynamicMockController {
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockController {
    /// Script the behavior of the next unscripted call.
    pub async fn push(&self, behavior: MockBehavior) {
        let mut guard = self.state.lock().await;
        guard.script.push_back(Scripted {
            behavior,
            gate: None,
        });
    }

    /// Script a call that waits until the returned gate is opened.
    pub async fn push_gated(&self, behavior: MockBehavior) -> Gate {
        let (tx, rx) = oneshot::channel();
        let mut guard = self.state.lock().await;
        guard.script.push_back(Scripted {
            behavior,
            gate: Some(rx),
        });
        Gate { tx }
    }

    /// Behavior used once the script is exhausted. Defaults to [`MockBehavior::Echo`].
    pub async fn set_fallback(&self, behavior: MockBehavior) {
        let mut guard = self.state.lock().await;
        guard.fallback = behavior;
    }

    /// Slot batches received so far, in call order.
    pub async fn requests(&self) -> Vec<Vec<SlotId>> {
        let guard = self.state.lock().await;
        guard.requests.clone()
    }

    /// Number of calls received so far.
    pub async fn call_count(&self) -> usize {
        let guard = self.state.lock().await;
        guard.requests.len()
    }

    /// Clear the script and the request log and restore the default fallback.
    pub async fn clear(&self) {
        let mut guard = self.state.lock().await;
        *guard = InternalState::default();
    }
}

/// A gateway that defers all behavior to an external controller.
pub struct DynamicMockGateway {
    name: &'static str,
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockGateway {
    /// Create a new dynamic mock gateway and its controller.
    #[must_use]
    pub fn new_with_controller(
        name: &'static str,
    ) -> (Arc<dyn DemandGateway>, DynamicMockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = DynamicMockController {
            state: Arc::clone(&state),
        };
        let me = Arc::new(Self { name, state });
        (me as Arc<dyn DemandGateway>, controller)
    }
}

/// Targeting produced by [`MockBehavior::Echo`] for `slot` on call `call`.
#[must_use]
pub fn echo_targeting(slot: &SlotId, call: usize) -> Targeting {
    let mut t = Targeting::new();
    t.insert("slot".to_string(), slot.to_string());
    t.insert("call".to_string(), call.to_string());
    t
}

#[async_trait]
impl DemandGateway for DynamicMockGateway {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_demand(&self, slots: &[SlotId]) -> Result<SlotDemand, TagbidError> {
        // Log the request and pick the behavior without holding the lock across awaits
        let (call, scripted) = {
            let mut guard = self.state.lock().await;
            guard.requests.push(slots.to_vec());
            let call = guard.requests.len();
            let scripted = match guard.script.pop_front() {
                Some(s) => s,
                None => Scripted {
                    behavior: guard.fallback.clone(),
                    gate: None,
                },
            };
            (call, scripted)
        };

        if let Some(gate) = scripted.gate {
            let _ = gate.await;
        }

        match scripted.behavior {
            MockBehavior::Return(mut demand) => {
                demand.retain(|slot, _| slots.contains(slot));
                Ok(demand)
            }
            MockBehavior::Echo => Ok(slots
                .iter()
                .map(|s| (s.clone(), echo_targeting(s, call)))
                .collect()),
            MockBehavior::Fail(e) => Err(e),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}
