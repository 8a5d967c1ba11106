// ── Parameter switch ──
//
// An on/off entity backed by one writable system parameter. State comes
// from `parameters-updated` signals; commands go straight to the remote
// client.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Signal, Topic};
use crate::error::RemoteFetchError;
use crate::model::{Parameter, ParameterId, SystemId};
use crate::remote::RemoteApi;

const ON: &str = "1";
const OFF: &str = "0";

/// Switch entity for one (system, parameter) pair.
///
/// Listens on the bus until [`detach`](Self::detach) is called or the
/// switch is dropped.
pub struct ParameterSwitch<A: RemoteApi> {
    system_id: SystemId,
    parameter_id: ParameterId,
    client: Arc<A>,
    state: Arc<ArcSwapOption<Parameter>>,
    listener: JoinHandle<()>,
}

impl<A: RemoteApi> ParameterSwitch<A> {
    pub fn new(
        system_id: SystemId,
        parameter_id: ParameterId,
        client: Arc<A>,
        bus: &EventBus,
    ) -> Self {
        let state = Arc::new(ArcSwapOption::empty());
        let rx = bus.subscribe(Topic::ParametersUpdated);
        let listener = tokio::spawn(listen(system_id, parameter_id, rx, Arc::clone(&state)));
        Self {
            system_id,
            parameter_id,
            client,
            state,
            listener,
        }
    }

    pub fn system_id(&self) -> SystemId {
        self.system_id
    }

    pub fn parameter_id(&self) -> ParameterId {
        self.parameter_id
    }

    /// Latest parameter payload, if one has been observed.
    pub fn parameter(&self) -> Option<Arc<Parameter>> {
        self.state.load_full()
    }

    /// `None` until the first poll carrying this parameter.
    pub fn is_on(&self) -> Option<bool> {
        self.state.load().as_ref().map(|p| p.raw_value == 1)
    }

    /// Stop following parameter updates. The last observed state is kept.
    pub fn detach(&self) {
        self.listener.abort();
    }

    pub fn is_attached(&self) -> bool {
        !self.listener.is_finished()
    }

    pub async fn turn_on(&self) -> Result<(), RemoteFetchError> {
        self.write(ON).await
    }

    pub async fn turn_off(&self) -> Result<(), RemoteFetchError> {
        self.write(OFF).await
    }

    async fn write(&self, value: &str) -> Result<(), RemoteFetchError> {
        self.client
            .put_parameter(self.system_id, self.parameter_id, value)
            .await?;
        info!(
            system_id = self.system_id,
            parameter_id = self.parameter_id,
            value,
            "parameter written"
        );
        Ok(())
    }
}

impl<A: RemoteApi> Drop for ParameterSwitch<A> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<A: RemoteApi> std::fmt::Debug for ParameterSwitch<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterSwitch")
            .field("system_id", &self.system_id)
            .field("parameter_id", &self.parameter_id)
            .field("is_on", &self.is_on())
            .finish_non_exhaustive()
    }
}

async fn listen(
    system_id: SystemId,
    parameter_id: ParameterId,
    mut rx: broadcast::Receiver<Signal>,
    state: Arc<ArcSwapOption<Parameter>>,
) {
    loop {
        match rx.recv().await {
            Ok(Signal::ParametersUpdated {
                system_id: from,
                parameters,
            }) if from == system_id => {
                if let Some(parameter) = parameters.get(&parameter_id) {
                    state.store(Some(Arc::new(parameter.clone())));
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(system_id, parameter_id, skipped, "switch listener lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!(system_id, parameter_id, "switch listener stopped");
}
