use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use avs_types::OperatorId;

/// Expected values this aggregator instance validates `InitOperator`
/// requests against.
#[derive(Debug, Clone)]
pub struct AggregatorIdentity {
    pub operator_state_retriever_addr: String,
    pub registry_coordinator_addr: String,
    pub layer1_chain_id: u64,
}

#[derive(Debug, Clone)]
pub struct InitOperatorRequest {
    pub operator_address: String,
    pub operator_id: OperatorId,
    pub operator_state_retriever_addr: String,
    pub registry_coordinator_addr: String,
    pub layer1_chain_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigMismatch;

#[derive(Debug, Clone, Copy)]
pub struct OperatorSession {
    pub operator_id: OperatorId,
    pub last_seen: SystemTime,
}

/// Records which operators have initialized against this aggregator with
/// matching configuration. Multi-writer: one writer per `InitOperator`
/// call, guarded by a plain mutex rather than funneled through the
/// dispatcher's single-writer loop, since this table never gates engine
/// behavior.
#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<String, OperatorSession>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_operator(
        &self,
        identity: &AggregatorIdentity,
        req: InitOperatorRequest,
    ) -> Result<(), ConfigMismatch> {
        if req.operator_state_retriever_addr != identity.operator_state_retriever_addr
            || req.registry_coordinator_addr != identity.registry_coordinator_addr
            || req.layer1_chain_id != identity.layer1_chain_id
        {
            return Err(ConfigMismatch);
        }

        self.sessions.lock().expect("mutex poisoned").insert(
            req.operator_address,
            OperatorSession {
                operator_id: req.operator_id,
                last_seen: SystemTime::now(),
            },
        );
        Ok(())
    }

    pub fn session_of(&self, operator_address: &str) -> Option<OperatorSession> {
        self.sessions
            .lock()
            .expect("mutex poisoned")
            .get(operator_address)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> AggregatorIdentity {
        AggregatorIdentity {
            operator_state_retriever_addr: "0xretriever".into(),
            registry_coordinator_addr: "0xcoordinator".into(),
            layer1_chain_id: 1,
        }
    }

    #[test]
    fn matching_config_is_accepted_and_recorded() {
        let table = SessionTable::new();
        let req = InitOperatorRequest {
            operator_address: "0xoperator".into(),
            operator_id: [1u8; 32],
            operator_state_retriever_addr: "0xretriever".into(),
            registry_coordinator_addr: "0xcoordinator".into(),
            layer1_chain_id: 1,
        };
        table.init_operator(&identity(), req).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.session_of("0xoperator").is_some());
    }

    #[test]
    fn mismatched_config_is_rejected() {
        let table = SessionTable::new();
        let req = InitOperatorRequest {
            operator_address: "0xoperator".into(),
            operator_id: [1u8; 32],
            operator_state_retriever_addr: "0xwrong".into(),
            registry_coordinator_addr: "0xcoordinator".into(),
            layer1_chain_id: 1,
        };
        assert_eq!(table.init_operator(&identity(), req), Err(ConfigMismatch));
        assert!(table.is_empty());
    }
}
