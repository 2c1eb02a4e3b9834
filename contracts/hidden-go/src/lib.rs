#![no_std]

//! Hidden-move Go — confidential move commitment and reveal.
//!
//! Providers submit moves as opaque encrypted coordinate triples that
//! accumulate into numbered batches. Plaintext coordinates only exist after a
//! verified round trip with an external decryption oracle: a decryption
//! request snapshots a fingerprint of the batch's ciphertexts, and the
//! oracle's callback is accepted only if the fingerprint still matches, the
//! proof binds the cleartext to the request, and the request was never
//! answered before.

use soroban_sdk::{
    contract, contractclient, contracterror, contractimpl, contracttype, symbol_short,
    xdr::ToXdr, Address, Bytes, BytesN, Env, Vec,
};



mod decoder;

pub use decoder::{RECORD_SIZE, WORD_SIZE};

// ============================================================================
// Decryption Oracle Interface
// ============================================================================

/// External oracle performing off-ledger decryption. `request_decryption`
/// returns a request identifier; the oracle later invokes
/// `decryption_callback` on this contract with the cleartext and a proof,
/// which `verify_proof` must accept.
#[contractclient(name = "DecryptionOracleClient")]
pub trait DecryptionOracle {
    fn request_decryption(env: Env, handles: Vec<BytesN<32>>) -> u64;

    fn verify_proof(env: Env, request_id: u64, cleartext: Bytes, proof: BytesN<32>) -> bool;
}

// ============================================================================
// Errors
// ============================================================================

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    // Authorization
    NotOwner = 1,
    NotProvider = 2,
    // Lifecycle
    ContractPaused = 3,
    AlreadyPaused = 4,
    NotPaused = 5,
    CooldownActive = 6,
    BatchAlreadyOpen = 7,
    NoOpenBatch = 8,
    // Validation
    InvalidBatchId = 9,
    EmptyBatch = 10,
    UninitializedHandle = 11,
    InvalidCooldown = 12,
    // Integrity
    ReplayDetected = 13,
    StateMismatch = 14,
    InvalidProof = 15,
}

// ============================================================================
// Data Types
// ============================================================================

/// One hidden move: three opaque ciphertext handles, each referencing an
/// encrypted u32. The all-zero handle is the uninitialized sentinel and is
/// rejected before storage.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncryptedMove {
    pub x: BytesN<32>,
    pub y: BytesN<32>,
    pub reveal_step: BytesN<32>,
}

/// Plaintext coordinates, produced only via a verified oracle callback.
#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DecryptedMove {
    pub x: u32,
    pub y: u32,
    pub reveal_step: u32,
}

/// Pending decryption, keyed by the oracle-issued request id. The fingerprint
/// is captured at request time and never refreshed; `processed` flips to true
/// exactly once.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecryptionContext {
    pub batch_id: u32,
    pub fingerprint: BytesN<32>,
    pub processed: bool,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchView {
    pub batch_id: u32,
    pub open: bool,
    pub move_count: u32,
}

#[contracttype]
pub enum DataKey {
    Owner,
    Oracle,
    Provider(Address),
    Paused,
    CooldownSecs,
    LastSubmit(Address),
    LastRequest(Address),
    BatchCount,
    OpenBatch,
    BatchMoves(u32),
    DecryptedMoves(u32),
    Context(u64),
}

// ============================================================================
// Contract Implementation
// ============================================================================

#[contract]
pub struct HiddenGo;

#[contractimpl]
impl HiddenGo {
    pub fn __constructor(env: Env, owner: Address, oracle: Address, cooldown_secs: u64) {
        env.storage().instance().set(&DataKey::Owner, &owner);
        env.storage().instance().set(&DataKey::Oracle, &oracle);
        env.storage().instance().set(&DataKey::CooldownSecs, &cooldown_secs);
        env.storage().instance().set(&DataKey::BatchCount, &0u32);
    }

    // ----- Access control ---------------------------------------------------

    pub fn transfer_ownership(env: Env, owner: Address, new_owner: Address) -> Result<(), Error> {
        Self::require_owner(&env, &owner)?;
        env.storage().instance().set(&DataKey::Owner, &new_owner);
        env.events()
            .publish((symbol_short!("own_xfer"),), (owner, new_owner));
        Ok(())
    }

    /// Idempotent: re-adding an existing provider is a no-op with no event.
    pub fn add_provider(env: Env, owner: Address, provider: Address) -> Result<(), Error> {
        Self::require_owner(&env, &owner)?;
        if env
            .storage()
            .instance()
            .has(&DataKey::Provider(provider.clone()))
        {
            return Ok(());
        }
        env.storage()
            .instance()
            .set(&DataKey::Provider(provider.clone()), &true);
        env.events().publish((symbol_short!("prov_add"),), provider);
        Ok(())
    }

    pub fn remove_provider(env: Env, owner: Address, provider: Address) -> Result<(), Error> {
        Self::require_owner(&env, &owner)?;
        if !env
            .storage()
            .instance()
            .has(&DataKey::Provider(provider.clone()))
        {
            return Ok(());
        }
        env.storage()
            .instance()
            .remove(&DataKey::Provider(provider.clone()));
        env.events().publish((symbol_short!("prov_rem"),), provider);
        Ok(())
    }

    // ----- Lifecycle --------------------------------------------------------

    pub fn pause(env: Env, owner: Address) -> Result<(), Error> {
        Self::require_owner(&env, &owner)?;
        if Self::paused(&env) {
            return Err(Error::AlreadyPaused);
        }
        env.storage().instance().set(&DataKey::Paused, &true);
        env.events().publish((symbol_short!("paused"),), owner);
        Ok(())
    }

    pub fn unpause(env: Env, owner: Address) -> Result<(), Error> {
        Self::require_owner(&env, &owner)?;
        if !Self::paused(&env) {
            return Err(Error::NotPaused);
        }
        env.storage().instance().set(&DataKey::Paused, &false);
        env.events().publish((symbol_short!("unpaused"),), owner);
        Ok(())
    }

    pub fn set_cooldown(env: Env, owner: Address, cooldown_secs: u64) -> Result<(), Error> {
        Self::require_owner(&env, &owner)?;
        if cooldown_secs == 0 {
            return Err(Error::InvalidCooldown);
        }
        env.storage()
            .instance()
            .set(&DataKey::CooldownSecs, &cooldown_secs);
        env.events()
            .publish((symbol_short!("cooldown"),), cooldown_secs);
        Ok(())
    }

    // ----- Batch lifecycle --------------------------------------------------

    /// Opens the next batch. Batch ids start at 1 and are never reused.
    pub fn open_batch(env: Env, owner: Address) -> Result<u32, Error> {
        Self::require_owner(&env, &owner)?;
        Self::ensure_not_paused(&env)?;
        if env.storage().instance().has(&DataKey::OpenBatch) {
            return Err(Error::BatchAlreadyOpen);
        }

        let batch_id = Self::batch_count(&env) + 1;
        env.storage().instance().set(&DataKey::BatchCount, &batch_id);
        env.storage().instance().set(&DataKey::OpenBatch, &batch_id);
        env.storage()
            .instance()
            .set(&DataKey::BatchMoves(batch_id), &Vec::<EncryptedMove>::new(&env));
        env.events().publish((symbol_short!("b_open"),), batch_id);
        Ok(batch_id)
    }

    pub fn close_batch(env: Env, owner: Address) -> Result<(), Error> {
        Self::require_owner(&env, &owner)?;
        Self::ensure_not_paused(&env)?;
        let batch_id: u32 = env
            .storage()
            .instance()
            .get(&DataKey::OpenBatch)
            .ok_or(Error::NoOpenBatch)?;
        env.storage().instance().remove(&DataKey::OpenBatch);
        env.events().publish((symbol_short!("b_close"),), batch_id);
        Ok(())
    }

    /// Appends a hidden move to the open batch. Returns the move's index
    /// within the batch. The event carries only ciphertext handles.
    pub fn submit_hidden_move(
        env: Env,
        provider: Address,
        x: BytesN<32>,
        y: BytesN<32>,
        reveal_step: BytesN<32>,
    ) -> Result<u32, Error> {
        Self::require_provider(&env, &provider)?;
        Self::ensure_not_paused(&env)?;
        Self::enforce_cooldown(&env, &DataKey::LastSubmit(provider.clone()))?;
        let batch_id: u32 = env
            .storage()
            .instance()
            .get(&DataKey::OpenBatch)
            .ok_or(Error::NoOpenBatch)?;

        if !Self::handle_initialized(&x)
            || !Self::handle_initialized(&y)
            || !Self::handle_initialized(&reveal_step)
        {
            return Err(Error::UninitializedHandle);
        }

        let mut moves = Self::load_batch_moves(&env, batch_id);
        moves.push_back(EncryptedMove {
            x: x.clone(),
            y: y.clone(),
            reveal_step: reveal_step.clone(),
        });
        let index = moves.len() - 1;
        env.storage()
            .instance()
            .set(&DataKey::BatchMoves(batch_id), &moves);
        Self::stamp_cooldown(&env, &DataKey::LastSubmit(provider.clone()));

        env.events().publish(
            (symbol_short!("move_sub"), provider),
            (batch_id, x, y, reveal_step),
        );
        Ok(index)
    }

    // ----- Decryption request -----------------------------------------------

    /// Requests oracle decryption of a batch. Snapshots a fingerprint over
    /// the batch's current ciphertexts bound to this contract's address, so a
    /// result computed for another instance or for a since-mutated batch can
    /// never be accepted.
    pub fn request_batch_decryption(
        env: Env,
        provider: Address,
        batch_id: u32,
    ) -> Result<u64, Error> {
        Self::require_provider(&env, &provider)?;
        Self::ensure_not_paused(&env)?;
        Self::enforce_cooldown(&env, &DataKey::LastRequest(provider.clone()))?;

        if batch_id == 0 || batch_id > Self::batch_count(&env) {
            return Err(Error::InvalidBatchId);
        }
        let moves = Self::load_batch_moves(&env, batch_id);
        if moves.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let fingerprint = Self::compute_fingerprint(&env, &moves);
        let mut handles = Vec::new(&env);
        for mv in moves.iter() {
            handles.push_back(mv.x);
            handles.push_back(mv.y);
            handles.push_back(mv.reveal_step);
        }

        let oracle_addr: Address = env.storage().instance().get(&DataKey::Oracle).unwrap();
        let oracle = DecryptionOracleClient::new(&env, &oracle_addr);
        let request_id = oracle.request_decryption(&handles);

        env.storage().instance().set(
            &DataKey::Context(request_id),
            &DecryptionContext {
                batch_id,
                fingerprint,
                processed: false,
            },
        );
        Self::stamp_cooldown(&env, &DataKey::LastRequest(provider));

        env.events()
            .publish((symbol_short!("dec_req"),), (request_id, batch_id));
        Ok(request_id)
    }

    // ----- Oracle callback --------------------------------------------------

    /// Single entry point for the oracle's decryption result. Gates, in
    /// order: replay protection, fingerprint consistency, proof validity.
    /// Only then is the cleartext decoded and the context finalized.
    pub fn decryption_callback(
        env: Env,
        request_id: u64,
        cleartext: Bytes,
        proof: BytesN<32>,
    ) -> Result<Vec<DecryptedMove>, Error> {
        let oracle_addr: Address = env.storage().instance().get(&DataKey::Oracle).unwrap();
        oracle_addr.require_auth();

        let mut ctx: DecryptionContext = env
            .storage()
            .instance()
            .get(&DataKey::Context(request_id))
            .ok_or(Error::ReplayDetected)?;
        if ctx.processed {
            return Err(Error::ReplayDetected);
        }

        // Any move appended to the batch after the request was issued makes
        // the pending result out of date, permanently.
        let moves = Self::load_batch_moves(&env, ctx.batch_id);
        if Self::compute_fingerprint(&env, &moves) != ctx.fingerprint {
            return Err(Error::StateMismatch);
        }

        let oracle = DecryptionOracleClient::new(&env, &oracle_addr);
        if !oracle.verify_proof(&request_id, &cleartext, &proof) {
            return Err(Error::InvalidProof);
        }

        let decoded = decoder::decode_moves(&env, &cleartext);
        env.storage()
            .instance()
            .set(&DataKey::DecryptedMoves(ctx.batch_id), &decoded);
        ctx.processed = true;
        env.storage()
            .instance()
            .set(&DataKey::Context(request_id), &ctx);

        env.events().publish(
            (symbol_short!("dec_done"),),
            (request_id, ctx.batch_id, decoded.clone()),
        );
        Ok(decoded)
    }

    // ----- Read surface -----------------------------------------------------

    pub fn get_owner(env: Env) -> Address {
        env.storage().instance().get(&DataKey::Owner).unwrap()
    }

    pub fn get_oracle(env: Env) -> Address {
        env.storage().instance().get(&DataKey::Oracle).unwrap()
    }

    pub fn is_provider(env: Env, addr: Address) -> bool {
        env.storage().instance().has(&DataKey::Provider(addr))
    }

    pub fn is_paused(env: Env) -> bool {
        Self::paused(&env)
    }

    pub fn get_cooldown(env: Env) -> u64 {
        env.storage().instance().get(&DataKey::CooldownSecs).unwrap()
    }

    pub fn get_batch_count(env: Env) -> u32 {
        Self::batch_count(&env)
    }

    /// Id of the currently open batch, if any.
    pub fn get_current_batch_id(env: Env) -> Option<u32> {
        env.storage().instance().get(&DataKey::OpenBatch)
    }

    pub fn get_batch(env: Env, batch_id: u32) -> Result<BatchView, Error> {
        if batch_id == 0 || batch_id > Self::batch_count(&env) {
            return Err(Error::InvalidBatchId);
        }
        let open = env
            .storage()
            .instance()
            .get(&DataKey::OpenBatch)
            .map_or(false, |open_id: u32| open_id == batch_id);
        Ok(BatchView {
            batch_id,
            open,
            move_count: Self::load_batch_moves(&env, batch_id).len(),
        })
    }

    pub fn get_batch_moves(env: Env, batch_id: u32) -> Result<Vec<EncryptedMove>, Error> {
        if batch_id == 0 || batch_id > Self::batch_count(&env) {
            return Err(Error::InvalidBatchId);
        }
        Ok(Self::load_batch_moves(&env, batch_id))
    }

    pub fn get_decrypted_moves(env: Env, batch_id: u32) -> Option<Vec<DecryptedMove>> {
        env.storage().instance().get(&DataKey::DecryptedMoves(batch_id))
    }

    pub fn get_context(env: Env, request_id: u64) -> Option<DecryptionContext> {
        env.storage().instance().get(&DataKey::Context(request_id))
    }

    // --- Internals ---

    fn require_owner(env: &Env, actor: &Address) -> Result<(), Error> {
        let owner: Address = env.storage().instance().get(&DataKey::Owner).unwrap();
        if *actor != owner {
            return Err(Error::NotOwner);
        }
        actor.require_auth();
        Ok(())
    }

    fn require_provider(env: &Env, actor: &Address) -> Result<(), Error> {
        if !env
            .storage()
            .instance()
            .has(&DataKey::Provider(actor.clone()))
        {
            return Err(Error::NotProvider);
        }
        actor.require_auth();
        Ok(())
    }

    fn paused(env: &Env) -> bool {
        env.storage()
            .instance()
            .get(&DataKey::Paused)
            .unwrap_or(false)
    }

    fn ensure_not_paused(env: &Env) -> Result<(), Error> {
        if Self::paused(env) {
            Err(Error::ContractPaused)
        } else {
            Ok(())
        }
    }

    // Fails strictly before `last + cooldown`; succeeds at or after that
    // instant. Submission and request domains use distinct keys.
    fn enforce_cooldown(env: &Env, key: &DataKey) -> Result<(), Error> {
        let cooldown: u64 = env.storage().instance().get(&DataKey::CooldownSecs).unwrap();
        if let Some(last) = env.storage().instance().get::<DataKey, u64>(key) {
            if env.ledger().timestamp() < last.saturating_add(cooldown) {
                return Err(Error::CooldownActive);
            }
        }
        Ok(())
    }

    fn stamp_cooldown(env: &Env, key: &DataKey) {
        env.storage().instance().set(key, &env.ledger().timestamp());
    }

    fn batch_count(env: &Env) -> u32 {
        env.storage().instance().get(&DataKey::BatchCount).unwrap()
    }

    fn load_batch_moves(env: &Env, batch_id: u32) -> Vec<EncryptedMove> {
        env.storage()
            .instance()
            .get(&DataKey::BatchMoves(batch_id))
            .unwrap_or(Vec::new(env))
    }

    fn handle_initialized(handle: &BytesN<32>) -> bool {
        handle.to_array() != [0u8; 32]
    }

    /// sha256 over the batch's handles in submission order, bound to this
    /// contract's address so fingerprints never collide across instances.
    fn compute_fingerprint(env: &Env, moves: &Vec<EncryptedMove>) -> BytesN<32> {
        let mut buf = Bytes::new(env);
        for mv in moves.iter() {
            buf.append(&mv.x.into());
            buf.append(&mv.y.into());
            buf.append(&mv.reveal_step.into());
        }
        buf.append(&env.current_contract_address().to_xdr(env));
        env.crypto().sha256(&buf).to_bytes()
    }
}
