use crate::fetch::HttpChainFetcher;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::constants::{MINING_REWARD, REWARD_SENDER};
use ledger_core::consensus::Resolver;
use ledger_core::mine::mine_parallel;
use ledger_core::{Block, ChainResponse, Error, Ledger, PeerSet, Transaction, TransactionRequest};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) peers: Arc<RwLock<PeerSet>>,
    pub(crate) resolver: Arc<Resolver<HttpChainFetcher>>,
    /// Serializes proof searches; only one runs at a time.
    pub(crate) miner: Arc<tokio::sync::Mutex<()>>,
    pub(crate) node_id: String,
}

impl AppState {
    pub(crate) fn new(
        ledger: Ledger,
        peers: PeerSet,
        resolver: Resolver<HttpChainFetcher>,
        node_id: String,
    ) -> Self {
        Self {
            ledger: Arc::new(ledger),
            peers: Arc::new(RwLock::new(peers)),
            resolver: Arc::new(resolver),
            miner: Arc::new(tokio::sync::Mutex::new(())),
            node_id,
        }
    }

    fn peer_list(&self) -> Vec<String> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::MissingField(_) | Error::InvalidAddress { .. } => StatusCode::BAD_REQUEST,
            Error::Cancelled | Error::StaleTip { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct MineResponse {
    message: String,
    index: u64,
    transactions: Vec<Transaction>,
    proof: u64,
    previous_hash: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RegisterRequest {
    nodes: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterResponse {
    message: String,
    total_nodes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResolveResponse {
    message: String,
    chain: Vec<Block>,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(full_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(consensus))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) async fn mine(State(state): State<AppState>) -> Result<Json<MineResponse>, ApiError> {
    let mining = state.miner.clone().lock_owned().await;
    let job = state.ledger.mining_job()?;

    let search = job.clone();
    let (proof, _mining) = spawn_exclusive(mining, move || {
        mine_parallel(search.previous_proof, &search.previous_hash, &search.cancel)
    })
    .await
    .map_err(|e| ApiError::internal(format!("mining task failed: {e}")))?;
    let proof = proof.inspect_err(|e| warn!("Mining block {} abandoned: {}", job.index, e))?;

    let reward = Transaction::new(REWARD_SENDER, state.node_id.clone(), MINING_REWARD);
    let block = state.ledger.commit_mined(&job, proof, Some(reward))?;

    Ok(Json(MineResponse {
        message: "New Block Forged".to_string(),
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

/// Runs `work` on the blocking pool with `guard` moved in. The guard is
/// handed back with the result, so it is released when the work ends even if
/// the awaiting request has gone away.
fn spawn_exclusive<T, F>(guard: OwnedMutexGuard<()>, work: F) -> JoinHandle<(T, OwnedMutexGuard<()>)>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || (work(), guard))
}

pub(crate) async fn new_transaction(
    State(state): State<AppState>,
    Json(req): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let tx = Transaction::try_from(req)?;
    let index = state.ledger.submit(tx)?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to Block {index}"),
        }),
    ))
}

pub(crate) async fn full_chain(State(state): State<AppState>) -> Json<ChainResponse> {
    Json(ChainResponse::from_chain(state.ledger.chain()))
}

pub(crate) async fn register_nodes(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let nodes = match req.nodes {
        Some(nodes) if !nodes.is_empty() => nodes,
        _ => return Err(ApiError::bad_request("Please supply a valid list of nodes")),
    };

    let total_nodes = {
        let mut peers = state.peers.write().unwrap_or_else(PoisonError::into_inner);
        let added = peers.register_all(nodes.iter().map(String::as_str))?;
        info!("Registered {} new peers ({} known)", added, peers.len());
        peers.to_vec()
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "New nodes have been added".to_string(),
            total_nodes,
        }),
    ))
}

pub(crate) async fn consensus(State(state): State<AppState>) -> Json<ResolveResponse> {
    let peers = state.peer_list();
    let resolution = state.resolver.resolve(&state.ledger, &peers).await;
    let message = if resolution.replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };
    Json(ResolveResponse {
        message: message.to_string(),
        chain: resolution.chain,
    })
}

/// Background consensus rounds for nodes started with a resolve interval.
pub(crate) async fn resolve_periodically(state: AppState, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let peers = state.peer_list();
        if peers.is_empty() {
            continue;
        }
        let resolution = state.resolver.resolve(&state.ledger, &peers).await;
        if resolution.replaced {
            info!(
                "Periodic resolution adopted a chain of length {}",
                resolution.chain.len()
            );
        }
    }
}
