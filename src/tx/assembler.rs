//! Transaction assembler
//!
//! Orchestrates one assembly cycle: build an unsigned transaction,
//! simulate it, run a restore sub-transaction when the simulation finds
//! archived state, collect signatures, submit, and poll to a terminal
//! status. Operations compose sequentially; one assembled transaction is
//! never mutated concurrently. Restore runs through the same assembler
//! with restoration disabled, so it cannot recurse.

use super::{Operation, SignedTransaction, TimeBounds, Transaction};
use crate::address::Address;
use crate::auth::{sign_auth_entry_with, InvocationNode, SignatureValue, Signer};
use crate::error::{EngineError, EngineResult};
use crate::rpc::{LedgerRpc, RestorePreamble, SimulateResponse, TxStatus};
use crate::tx::ResourceData;
use crate::types::{AssemblyOptions, NetworkConfig};
use crate::utils::logging;
use crate::xdr::Value;
use ed25519_dalek::SigningKey;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Ledgers an authorization signature stays valid for when the caller
/// does not pick an expiration ledger explicitly
const DEFAULT_AUTH_VALIDITY_LEDGERS: u32 = 60;

/// Derived result of the most recent simulation
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub resource_data: ResourceData,
    pub min_resource_fee: i64,
    pub return_value: Option<Value>,
    pub latest_ledger: u32,
}

/// Terminal outcome of a submitted transaction
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub id: String,
    pub status: TxStatus,
    pub return_value: Option<Value>,
    pub error: Option<String>,
}

/// One contract invocation moving through the assembly state machine
pub struct AssembledTransaction<R: LedgerRpc> {
    rpc: Arc<R>,
    network: NetworkConfig,
    options: AssemblyOptions,
    source_key: Option<SigningKey>,
    pub tx: Transaction,
    /// Most recent raw simulation response
    pub simulation: Option<SimulateResponse>,
    /// Derived simulation result
    pub simulation_data: Option<SimulationResult>,
    /// The signed envelope, never mutated once produced
    pub signed: Option<SignedTransaction>,
}

impl<R: LedgerRpc> AssembledTransaction<R> {
    /// Compose an unsigned contract invocation with a time-bound
    /// validity window
    pub async fn build(
        rpc: Arc<R>,
        network: NetworkConfig,
        options: AssemblyOptions,
        source: Address,
        invocation: InvocationNode,
    ) -> EngineResult<Self> {
        Self::build_with_operation(rpc, network, options, source, Operation::InvokeContract(invocation)).await
    }

    async fn build_with_operation(
        rpc: Arc<R>,
        network: NetworkConfig,
        options: AssemblyOptions,
        source: Address,
        operation: Operation,
    ) -> EngineResult<Self> {
        if !source.is_account() {
            return Err(EngineError::invalid_input(
                "Transaction source must be an account address",
            ));
        }

        let account = rpc.get_account(&source.to_strkey()).await?;
        let now = unix_now();

        let tx = Transaction {
            source,
            sequence: account.sequence + 1,
            fee: options.base_fee,
            time_bounds: TimeBounds {
                min_time: now.saturating_sub(options.skew_secs),
                max_time: now + options.timeout_secs,
            },
            operation,
            auth_entries: Vec::new(),
            resource_data: None,
            resource_fee: 0,
        };

        Ok(Self {
            rpc,
            network,
            options,
            source_key: None,
            tx,
            simulation: None,
            simulation_data: None,
            signed: None,
        })
    }

    /// Attach the source account's signing key
    pub fn with_source_key(mut self, key: SigningKey) -> Self {
        self.source_key = Some(key);
        self
    }

    /// Simulate the transaction and copy its resource footprint, required
    /// authorization entries, and minimum resource fee.
    ///
    /// When the simulation reports archived state and restoration is
    /// enabled, a restore sub-transaction runs first and the simulation
    /// transparently repeats once. The repeat never restores again.
    pub async fn simulate(&mut self) -> EngineResult<()> {
        if self.signed.is_some() {
            return Err(EngineError::invalid_input(
                "Transaction is already signed; re-simulate from an unsigned clone",
            ));
        }

        let mut allow_restore = self.options.restore;
        loop {
            let response = self.rpc.simulate(&self.tx).await?;

            if let Some(preamble) = &response.restore_preamble {
                if !allow_restore {
                    return Err(if self.options.restore {
                        EngineError::restore_failed(
                            "Simulation still reports archived state after a restore",
                        )
                    } else {
                        EngineError::restore_failed(
                            "Archived state requires a restore but restoration is disabled",
                        )
                    });
                }
                self.run_restore(preamble).await?;
                allow_restore = false;
                continue;
            }

            if let Some(error) = &response.error {
                return Err(EngineError::simulation_failed(format!(
                    "Simulation reported an error: {}",
                    error
                )));
            }

            self.apply_simulation(response);
            return Ok(());
        }
    }

    fn apply_simulation(&mut self, response: SimulateResponse) {
        let resource_data = response.resource_data.clone().unwrap_or_default();

        self.tx.resource_data = Some(resource_data.clone());
        self.tx.resource_fee = response.min_resource_fee;
        self.tx.fee = self
            .options
            .base_fee
            .saturating_add(response.min_resource_fee.try_into().unwrap_or(u32::MAX));
        self.tx.auth_entries = response.auth.clone();

        logging::debug("assembler", "simulation applied")
            .field("min_resource_fee", response.min_resource_fee.to_string())
            .field("auth_entries", response.auth.len().to_string())
            .emit();

        self.simulation_data = Some(SimulationResult {
            resource_data,
            min_resource_fee: response.min_resource_fee,
            return_value: response.return_value.clone(),
            latest_ledger: response.latest_ledger,
        });
        self.simulation = Some(response);
    }

    /// Build, sign, and run the restore sub-transaction described by a
    /// simulation's restore preamble, then refresh the sequence number.
    async fn run_restore(&mut self, preamble: &RestorePreamble) -> EngineResult<()> {
        let key = self
            .source_key
            .as_ref()
            .ok_or_else(|| {
                EngineError::restore_failed(
                    "Archived state requires a restore but no signing key is attached",
                )
            })?
            .clone();

        logging::info("assembler", "restoring archived state")
            .field("restore_fee", preamble.min_resource_fee.to_string())
            .emit();

        let mut restore = Self::build_with_operation(
            self.rpc.clone(),
            self.network.clone(),
            self.options.clone().with_restore(false).with_force(true),
            self.tx.source.clone(),
            Operation::RestoreFootprint,
        )
        .await?;
        restore.source_key = Some(key);

        // The preamble is the restore transaction's simulation result
        restore.apply_simulation(SimulateResponse {
            resource_data: Some(preamble.resource_data.clone()),
            min_resource_fee: preamble.min_resource_fee,
            ..Default::default()
        });

        restore.sign()?;
        let outcome = restore.send().await?;
        if outcome.status != TxStatus::Success {
            return Err(EngineError::restore_failed(format!(
                "Restore transaction {} ended with status {:?}",
                outcome.id, outcome.status
            )));
        }

        // The restore consumed a sequence number
        let account = self.rpc.get_account(&self.tx.source.to_strkey()).await?;
        self.tx.sequence = account.sequence + 1;
        Ok(())
    }

    /// True iff the simulation declares no write-footprint entries and no
    /// required authorization entries. Read calls never need signing
    /// unless the caller forces it.
    pub fn is_read_call(&self) -> EngineResult<bool> {
        let data = self
            .simulation_data
            .as_ref()
            .ok_or_else(|| EngineError::simulation_failed("Transaction has not been simulated"))?;
        Ok(data.resource_data.footprint.read_write.is_empty() && self.tx.auth_entries.is_empty())
    }

    /// Address-credential principals other than the source whose
    /// signature is still empty, or all of them when
    /// `include_already_signed` is set
    pub fn needs_non_invoker_signing_by(&self, include_already_signed: bool) -> Vec<Address> {
        let mut principals = Vec::new();
        for entry in &self.tx.auth_entries {
            let Some(address) = entry.address() else {
                continue;
            };
            if *address == self.tx.source {
                continue;
            }
            if (include_already_signed || entry.is_unsigned()) && !principals.contains(address) {
                principals.push(address.clone());
            }
        }
        principals
    }

    /// Apply the source account's signature
    pub fn sign(&mut self) -> EngineResult<()> {
        if self.signed.is_some() {
            return Err(EngineError::signing_failed(
                "Transaction is already signed; re-sign from an unsigned clone",
            ));
        }
        if self.simulation_data.is_none() {
            return Err(EngineError::signing_failed(
                "Transaction must be simulated before signing",
            ));
        }
        if self.is_read_call()? && !self.options.force {
            return Err(EngineError::signing_failed(
                "Read call does not need signing; set the force option to sign anyway",
            ));
        }

        let outstanding = self.needs_non_invoker_signing_by(false);
        if !outstanding.is_empty() {
            let contracts: Vec<String> = outstanding
                .iter()
                .filter(|a| a.is_contract())
                .map(Address::to_strkey)
                .collect();
            let err = if contracts.is_empty() {
                EngineError::multiple_signers_required(format!(
                    "{} non-invoker signer(s) still outstanding",
                    outstanding.len()
                ))
            } else {
                // Contract principals cannot be satisfied by a local
                // signature at all
                EngineError::multiple_signers_required(format!(
                    "Contract signers require a cooperative signing flow: {}",
                    contracts.join(", ")
                ))
            };
            return Err(err);
        }

        let key = self
            .source_key
            .as_ref()
            .ok_or_else(|| EngineError::signing_failed("No signing key attached"))?;
        self.signed = Some(self.tx.sign(key, &self.network.network_id())?);
        Ok(())
    }

    /// Sign every unsigned authorization entry belonging to `address`
    /// using an asynchronous signature callback. Returns how many entries
    /// were signed.
    pub async fn sign_auth_entries_with<F, Fut>(
        &mut self,
        signer: &Signer,
        address: &Address,
        expiration_ledger: Option<u32>,
        sign: F,
    ) -> EngineResult<usize>
    where
        F: Fn([u8; 32]) -> Fut,
        Fut: Future<Output = EngineResult<SignatureValue>>,
    {
        if self.signed.is_some() {
            return Err(EngineError::signing_failed(
                "Transaction is already signed; re-sign from an unsigned clone",
            ));
        }

        let expiration = match expiration_ledger {
            Some(ledger) => ledger,
            None => {
                let latest = self.rpc.get_latest_ledger().await?;
                latest.sequence + DEFAULT_AUTH_VALIDITY_LEDGERS
            }
        };

        let network_id = self.network.network_id();
        let mut signed_count = 0;
        for index in 0..self.tx.auth_entries.len() {
            let entry = &self.tx.auth_entries[index];
            if entry.address() != Some(address) || !entry.is_unsigned() {
                continue;
            }
            let replacement =
                sign_auth_entry_with(entry, signer, expiration, &network_id, &sign).await?;
            self.tx.auth_entries[index] = replacement;
            signed_count += 1;
        }
        Ok(signed_count)
    }

    /// Submit the signed transaction and poll to a terminal status
    pub async fn send(&mut self) -> EngineResult<SubmitOutcome> {
        let signed = self
            .signed
            .as_ref()
            .ok_or_else(|| EngineError::signing_failed("Transaction must be signed before sending"))?;

        let response = self.rpc.submit(signed).await?;
        if response.status == "ERROR" {
            return Err(EngineError::transaction_failed(format!(
                "Submission rejected by the network: {}",
                response.error.as_deref().unwrap_or("no error detail")
            ))
            .with_details(response.id));
        }

        self.poll(&response.id).await
    }

    /// Poll a transaction id at a fixed interval until it leaves the
    /// not-found/pending states or the configured timeout elapses.
    /// Public so callers can resume polling out-of-band after a timeout.
    pub async fn poll(&self, id: &str) -> EngineResult<SubmitOutcome> {
        let started = Instant::now();
        let budget = Duration::from_secs(self.options.timeout_secs);
        let interval = Duration::from_millis(self.options.poll_interval_ms);

        loop {
            let poll = self.rpc.poll_status(id).await?;
            match poll.status {
                TxStatus::Success => {
                    return Ok(SubmitOutcome {
                        id: id.to_string(),
                        status: TxStatus::Success,
                        return_value: poll.return_value,
                        error: None,
                    })
                }
                TxStatus::Failed => {
                    return Ok(SubmitOutcome {
                        id: id.to_string(),
                        status: TxStatus::Failed,
                        return_value: poll.return_value,
                        error: poll.error.or_else(|| Some("Transaction failed".to_string())),
                    })
                }
                TxStatus::NotFound | TxStatus::Pending => {
                    if started.elapsed() >= budget {
                        return Err(EngineError::timeout(format!(
                            "Gave up polling after {:.1}s: transaction {} is still {:?}",
                            started.elapsed().as_secs_f64(),
                            id,
                            poll.status
                        )));
                    }
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    /// A fresh unsigned copy of this assembly; the starting point for
    /// re-signing
    pub fn unsigned_clone(&self) -> Self {
        Self {
            rpc: self.rpc.clone(),
            network: self.network.clone(),
            options: self.options.clone(),
            source_key: self.source_key.clone(),
            tx: self.tx.clone(),
            simulation: self.simulation.clone(),
            simulation_data: self.simulation_data.clone(),
            signed: None,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthEntry, Credentials};
    use crate::error::ErrorCode;
    use crate::rpc::{AccountResponse, LatestLedgerResponse, PollResponse, SubmitResponse};
    use crate::tx::Footprint;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockRpc {
        simulations: Mutex<VecDeque<SimulateResponse>>,
        submits: Mutex<VecDeque<SubmitResponse>>,
        polls: Mutex<VecDeque<PollResponse>>,
        sequence: AtomicI64,
        submit_count: AtomicUsize,
    }

    impl MockRpc {
        fn new() -> Self {
            Self {
                simulations: Mutex::new(VecDeque::new()),
                submits: Mutex::new(VecDeque::new()),
                polls: Mutex::new(VecDeque::new()),
                sequence: AtomicI64::new(100),
                submit_count: AtomicUsize::new(0),
            }
        }

        fn script_simulation(&self, response: SimulateResponse) {
            self.simulations.lock().unwrap().push_back(response);
        }

        fn script_submit(&self, response: SubmitResponse) {
            self.submits.lock().unwrap().push_back(response);
        }

        fn script_poll(&self, response: PollResponse) {
            self.polls.lock().unwrap().push_back(response);
        }
    }

    impl LedgerRpc for MockRpc {
        async fn simulate(&self, _tx: &Transaction) -> EngineResult<SimulateResponse> {
            self.simulations
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| EngineError::internal("no scripted simulation"))
        }

        async fn submit(&self, _tx: &SignedTransaction) -> EngineResult<SubmitResponse> {
            self.submit_count.fetch_add(1, Ordering::SeqCst);
            self.submits
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| EngineError::internal("no scripted submit"))
        }

        async fn poll_status(&self, _id: &str) -> EngineResult<PollResponse> {
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| EngineError::internal("no scripted poll"))
        }

        async fn get_account(&self, account_id: &str) -> EngineResult<AccountResponse> {
            Ok(AccountResponse {
                id: account_id.to_string(),
                sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            })
        }

        async fn get_latest_ledger(&self) -> EngineResult<LatestLedgerResponse> {
            Ok(LatestLedgerResponse { sequence: 5000 })
        }
    }

    fn source_key() -> SigningKey {
        SigningKey::from_bytes(&[0x42; 32])
    }

    fn source_address() -> Address {
        Address::Account(source_key().verifying_key().to_bytes())
    }

    fn invocation() -> InvocationNode {
        InvocationNode::new(Address::Contract([1u8; 32]), "transfer", vec![Value::I64(10)])
    }

    fn write_simulation() -> SimulateResponse {
        SimulateResponse {
            resource_data: Some(ResourceData {
                footprint: Footprint {
                    read_only: vec!["ro-key".to_string()],
                    read_write: vec!["rw-key".to_string()],
                },
                instructions: 1000,
                read_bytes: 64,
                write_bytes: 32,
            }),
            min_resource_fee: 500,
            latest_ledger: 4000,
            ..Default::default()
        }
    }

    fn read_simulation() -> SimulateResponse {
        SimulateResponse {
            resource_data: Some(ResourceData::default()),
            return_value: Some(Value::U32(7)),
            latest_ledger: 4000,
            ..Default::default()
        }
    }

    async fn assembled(rpc: &Arc<MockRpc>, options: AssemblyOptions) -> AssembledTransaction<MockRpc> {
        AssembledTransaction::build(
            rpc.clone(),
            NetworkConfig::testnet("http://localhost:8000"),
            options,
            source_address(),
            invocation(),
        )
        .await
        .unwrap()
        .with_source_key(source_key())
    }

    #[tokio::test]
    async fn test_build_sets_window_and_sequence() {
        let rpc = Arc::new(MockRpc::new());
        let asm = assembled(&rpc, AssemblyOptions::default()).await;

        assert_eq!(asm.tx.sequence, 101);
        assert!(asm.tx.time_bounds.min_time < asm.tx.time_bounds.max_time);
        assert!(asm.simulation.is_none());
    }

    #[tokio::test]
    async fn test_contract_source_rejected() {
        let rpc = Arc::new(MockRpc::new());
        let result = AssembledTransaction::build(
            rpc,
            NetworkConfig::testnet("http://localhost:8000"),
            AssemblyOptions::default(),
            Address::Contract([1u8; 32]),
            invocation(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_simulate_copies_outputs() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(write_simulation());

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();

        assert_eq!(asm.tx.resource_fee, 500);
        assert_eq!(asm.tx.fee, 600, "base fee plus resource fee");
        assert!(asm.tx.resource_data.is_some());
        assert_eq!(asm.simulation_data.as_ref().unwrap().latest_ledger, 4000);
    }

    #[tokio::test]
    async fn test_simulation_error_is_fatal() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(SimulateResponse {
            error: Some("host function trapped".to_string()),
            ..Default::default()
        });

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        let err = asm.simulate().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SimulationFailed);
    }

    fn restore_preamble_simulation() -> SimulateResponse {
        SimulateResponse {
            error: Some("archived entry".to_string()),
            restore_preamble: Some(RestorePreamble {
                resource_data: ResourceData {
                    footprint: Footprint {
                        read_only: vec![],
                        read_write: vec!["archived-key".to_string()],
                    },
                    instructions: 0,
                    read_bytes: 0,
                    write_bytes: 128,
                },
                min_resource_fee: 200,
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_restore_then_resimulate() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(restore_preamble_simulation());
        // Restore submit succeeds
        rpc.script_submit(SubmitResponse {
            id: "restore-tx".to_string(),
            status: "PENDING".to_string(),
            error: None,
        });
        rpc.script_poll(PollResponse {
            status: TxStatus::Success,
            return_value: None,
            error: None,
        });
        // Re-simulation succeeds
        rpc.script_simulation(write_simulation());

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();

        assert_eq!(rpc.submit_count.load(Ordering::SeqCst), 1, "restore was submitted");
        assert_eq!(asm.tx.resource_fee, 500);
        // Sequence was refreshed after the restore consumed one
        assert_eq!(asm.tx.sequence, 103);
    }

    #[tokio::test]
    async fn test_restore_disabled_is_fatal() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(restore_preamble_simulation());

        let mut asm = assembled(&rpc, AssemblyOptions::default().with_restore(false)).await;
        let err = asm.simulate().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RestoreFailed);
        assert_eq!(rpc.submit_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restore_never_recurses() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(restore_preamble_simulation());
        rpc.script_submit(SubmitResponse {
            id: "restore-tx".to_string(),
            status: "PENDING".to_string(),
            error: None,
        });
        rpc.script_poll(PollResponse {
            status: TxStatus::Success,
            return_value: None,
            error: None,
        });
        // Re-simulation still demands a restore: must fail, not loop
        rpc.script_simulation(restore_preamble_simulation());

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        let err = asm.simulate().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RestoreFailed);
        assert_eq!(rpc.submit_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_restore_is_fatal() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(restore_preamble_simulation());
        rpc.script_submit(SubmitResponse {
            id: "restore-tx".to_string(),
            status: "PENDING".to_string(),
            error: None,
        });
        rpc.script_poll(PollResponse {
            status: TxStatus::Failed,
            return_value: None,
            error: Some("restore reverted".to_string()),
        });

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        let err = asm.simulate().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RestoreFailed);
    }

    #[tokio::test]
    async fn test_read_call_classification() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(read_simulation());

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        assert!(asm.is_read_call().is_err(), "unsimulated classification must fail");

        asm.simulate().await.unwrap();
        assert!(asm.is_read_call().unwrap());
    }

    #[tokio::test]
    async fn test_write_footprint_flips_classification() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(write_simulation());

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();
        assert!(!asm.is_read_call().unwrap());
    }

    #[tokio::test]
    async fn test_auth_entries_flip_classification() {
        let rpc = Arc::new(MockRpc::new());
        let mut simulation = read_simulation();
        simulation.auth = vec![AuthEntry::for_address(
            Address::Contract([9u8; 32]),
            1,
            invocation(),
        )];
        rpc.script_simulation(simulation);

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();
        assert!(!asm.is_read_call().unwrap());
    }

    #[tokio::test]
    async fn test_sign_refuses_unsimulated() {
        let rpc = Arc::new(MockRpc::new());
        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        let err = asm.sign().unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionSigningFailed);
    }

    #[tokio::test]
    async fn test_sign_refuses_read_call_unless_forced() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(read_simulation());
        rpc.script_simulation(read_simulation());

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();
        assert!(asm.sign().is_err());

        let mut forced = assembled(&rpc, AssemblyOptions::default().with_force(true)).await;
        forced.simulate().await.unwrap();
        assert!(forced.sign().is_ok());
    }

    #[tokio::test]
    async fn test_contract_signer_requires_cooperative_flow() {
        let rpc = Arc::new(MockRpc::new());
        let mut simulation = write_simulation();
        simulation.auth = vec![AuthEntry::for_address(
            Address::Contract([9u8; 32]),
            1,
            invocation(),
        )];
        rpc.script_simulation(simulation);

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();

        let err = asm.sign().unwrap_err();
        assert_eq!(err.code, ErrorCode::MultipleSignersRequired);
    }

    #[tokio::test]
    async fn test_source_account_auth_signs_locally() {
        let rpc = Arc::new(MockRpc::new());
        let mut simulation = write_simulation();
        simulation.auth = vec![AuthEntry {
            credentials: Credentials::SourceAccount,
            invocation: invocation(),
        }];
        rpc.script_simulation(simulation);

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();
        assert!(asm.needs_non_invoker_signing_by(false).is_empty());
        assert!(asm.sign().is_ok());
    }

    #[tokio::test]
    async fn test_needs_non_invoker_signing_by() {
        let rpc = Arc::new(MockRpc::new());
        let other = Address::Contract([9u8; 32]);
        let mut simulation = write_simulation();
        simulation.auth = vec![
            AuthEntry::for_address(other.clone(), 1, invocation()),
            AuthEntry {
                credentials: Credentials::SourceAccount,
                invocation: invocation(),
            },
        ];
        rpc.script_simulation(simulation);

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();

        assert_eq!(asm.needs_non_invoker_signing_by(false), vec![other.clone()]);
        assert_eq!(asm.needs_non_invoker_signing_by(true), vec![other]);
    }

    #[tokio::test]
    async fn test_sign_auth_entries_marks_entries_signed() {
        let rpc = Arc::new(MockRpc::new());
        let wallet = Address::Contract([9u8; 32]);
        let mut simulation = write_simulation();
        simulation.auth = vec![AuthEntry::for_address(wallet.clone(), 1, invocation())];
        rpc.script_simulation(simulation);

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();

        let mut key = vec![0x04];
        key.extend_from_slice(&[0xAA; 64]);
        let signer = Signer::webauthn(Address::Contract([0x55; 32]), key).unwrap();

        let count = asm
            .sign_auth_entries_with(&signer, &wallet, None, |hash| async move {
                Ok(SignatureValue::Bearer(Value::Bytes(hash.to_vec())))
            })
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(asm.needs_non_invoker_signing_by(false).is_empty());
        assert!(asm.sign().is_ok());
    }

    #[tokio::test]
    async fn test_send_refuses_unsigned() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(write_simulation());

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();
        let err = asm.send().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionSigningFailed);
    }

    #[tokio::test]
    async fn test_send_success_returns_outcome() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(write_simulation());
        rpc.script_submit(SubmitResponse {
            id: "tx-1".to_string(),
            status: "PENDING".to_string(),
            error: None,
        });
        rpc.script_poll(PollResponse {
            status: TxStatus::Pending,
            return_value: None,
            error: None,
        });
        rpc.script_poll(PollResponse {
            status: TxStatus::Success,
            return_value: Some(Value::U32(1)),
            error: None,
        });

        let mut options = AssemblyOptions::default();
        options.poll_interval_ms = 1;
        let mut asm = assembled(&rpc, options).await;
        asm.simulate().await.unwrap();
        asm.sign().unwrap();

        let outcome = asm.send().await.unwrap();
        assert_eq!(outcome.id, "tx-1");
        assert_eq!(outcome.status, TxStatus::Success);
        assert_eq!(outcome.return_value, Some(Value::U32(1)));
    }

    #[tokio::test]
    async fn test_immediate_rejection_is_fatal() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(write_simulation());
        rpc.script_submit(SubmitResponse {
            id: "tx-2".to_string(),
            status: "ERROR".to_string(),
            error: Some("txBadSeq".to_string()),
        });

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();
        asm.sign().unwrap();

        let err = asm.send().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionFailed);
        assert_eq!(err.details.as_deref(), Some("tx-2"));
    }

    #[tokio::test]
    async fn test_poll_timeout_names_id() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(write_simulation());
        rpc.script_submit(SubmitResponse {
            id: "tx-slow".to_string(),
            status: "PENDING".to_string(),
            error: None,
        });
        rpc.script_poll(PollResponse {
            status: TxStatus::NotFound,
            return_value: None,
            error: None,
        });

        let mut options = AssemblyOptions::default();
        options.timeout_secs = 0;
        let mut asm = assembled(&rpc, options).await;
        asm.simulate().await.unwrap();
        asm.sign().unwrap();

        let err = asm.send().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
        assert!(err.message.contains("tx-slow"));
    }

    #[tokio::test]
    async fn test_signed_transaction_is_immutable() {
        let rpc = Arc::new(MockRpc::new());
        rpc.script_simulation(write_simulation());

        let mut asm = assembled(&rpc, AssemblyOptions::default()).await;
        asm.simulate().await.unwrap();
        asm.sign().unwrap();

        assert!(asm.sign().is_err(), "double signing refused");
        assert!(asm.simulate().await.is_err(), "re-simulation refused once signed");

        let mut clone = asm.unsigned_clone();
        assert!(clone.signed.is_none());
        assert!(clone.sign().is_ok(), "unsigned clone re-signs");
    }
}
