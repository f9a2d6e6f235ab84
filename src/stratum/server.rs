//! Stratum pool server
//!
//! Accepts miner connections, keeps the job table in step with the node and
//! routes Stratum requests to the share processor.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::persistence::Persistence;
use crate::protocol::{BlockTemplate, BlockchainRpc};
use crate::stratum::job::{Job, JobManager};
use crate::stratum::protocol::*;
use crate::stratum::session::{Connection, SessionId};
use crate::stratum::shares::{ShareProcessor, ShareValidator, Submission, SubmitError};
use crate::utils::{estimate_hashrate, format_hashrate};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, tcp::OwnedWriteHalf};
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Capacity of the job broadcast channel
const JOB_CHANNEL_CAPACITY: usize = 100;

/// Size of the pool-assigned extranonce in bytes
const EXTRANONCE1_SIZE: usize = 4;

/// Shared server state
struct ServerState {
    connections: DashMap<SessionId, Arc<Connection>>,
    jobs: Arc<JobManager>,
    processor: Arc<ShareProcessor>,
    rpc: Arc<dyn BlockchainRpc>,
    template: parking_lot::RwLock<Option<BlockTemplate>>,
    job_tx: broadcast::Sender<Arc<Job>>,
    base_difficulty: f64,
    extranonce2_size: usize,
    connection_timeout: Duration,
    rpc_timeout: Duration,
}

/// Stratum server for ECCPoW miners
pub struct PoolServer {
    config: Config,
    state: Arc<ServerState>,
    shutdown_tx: watch::Sender<bool>,
}

impl PoolServer {
    /// Create a server; nothing is bound until [`PoolServer::run`]
    pub fn new(
        config: Config,
        rpc: Arc<dyn BlockchainRpc>,
        persistence: Arc<dyn Persistence>,
        validator: Arc<dyn ShareValidator>,
    ) -> Self {
        let jobs = Arc::new(JobManager::new(config.pool.max_jobs));
        let processor = Arc::new(ShareProcessor::new(
            &config,
            Arc::clone(&jobs),
            validator,
            Arc::clone(&rpc),
            persistence,
        ));
        let (job_tx, _) = broadcast::channel(JOB_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);

        let state = Arc::new(ServerState {
            connections: DashMap::new(),
            jobs,
            processor,
            rpc,
            template: parking_lot::RwLock::new(None),
            job_tx,
            base_difficulty: config.pool.base_difficulty,
            extranonce2_size: config.pool.extranonce2_size,
            connection_timeout: Duration::from_secs(config.pool.connection_timeout_secs),
            rpc_timeout: config.node.timeout(),
        });

        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    /// Share processor used by every connection
    pub fn processor(&self) -> Arc<ShareProcessor> {
        Arc::clone(&self.state.processor)
    }

    /// Job table
    pub fn jobs(&self) -> Arc<JobManager> {
        Arc::clone(&self.state.jobs)
    }

    /// Open connections
    pub fn connection_count(&self) -> usize {
        self.state.connections.len()
    }

    /// Template jobs are currently built from
    pub fn current_template(&self) -> Option<BlockTemplate> {
        self.state.template.read().clone()
    }

    /// Stop accepting and close all connections
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Fetch a template and publish a job when the work changed
    pub async fn refresh_template(&self) -> Result<bool> {
        refresh_template(&self.state).await
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.pool.host, self.config.pool.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::network(format!("Failed to bind to {}: {}", addr, e)))?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown
    ///
    /// Fails without accepting anyone when no initial template can be fetched.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        refresh_template(&self.state)
            .await
            .map_err(|e| Error::rpc(format!("No initial block template: {}", e)))?;

        let local = listener.local_addr()?;
        info!("Stratum server listening on {}", local);

        let refresher = self.start_template_refresher();
        let reporter = self.start_stats_reporter();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("Accept failed: {}", e);
                            continue;
                        }
                    };

                    if self.state.connections.len() >= self.config.pool.max_connections {
                        warn!("Max connections reached, rejecting {}", addr);
                        continue;
                    }

                    let state = Arc::clone(&self.state);
                    let job_rx = self.state.job_tx.subscribe();
                    let shutdown_rx = self.shutdown_tx.subscribe();
                    let connection = Arc::new(Connection::new(
                        Some(addr),
                        generate_extranonce1(),
                        state.base_difficulty,
                    ));
                    let span = info_span!("connection", session = %connection.id(), peer = %addr);

                    tokio::spawn(
                        async move {
                            if let Err(e) = handle_client(stream, connection, state, job_rx, shutdown_rx).await {
                                error!("Connection error: {}", e);
                            }
                        }
                        .instrument(span),
                    );
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down Stratum server");
                    self.shutdown();
                    break;
                }
            }
        }

        refresher.abort();
        reporter.abort();
        Ok(())
    }

    fn start_template_refresher(&self) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let period = self.config.node.refresh_interval();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = refresh_template(&state).await {
                    warn!("Template refresh failed, keeping last job: {}", e);
                }
            }
        })
    }

    fn start_stats_reporter(&self) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let secs = self.config.pool.stats_interval_secs.max(1);

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            let mut last_difficulty = state.processor.stats().accepted_difficulty;

            loop {
                ticker.tick().await;
                let stats = state.processor.stats();
                let hashrate = estimate_hashrate(stats.accepted_difficulty - last_difficulty, secs);
                last_difficulty = stats.accepted_difficulty;
                let authorized = state
                    .connections
                    .iter()
                    .filter(|c| c.value().is_authorized())
                    .count();

                info!(
                    connections = state.connections.len(),
                    authorized,
                    jobs = state.jobs.job_count(),
                    accepted = stats.accepted,
                    rejected = stats.rejected,
                    duplicates = stats.duplicates,
                    blocks = stats.blocks_submitted,
                    "Pool hashrate {}",
                    format_hashrate(hashrate)
                );
            }
        })
    }
}

/// Fetch the next template and publish a job when it differs
async fn refresh_template(state: &ServerState) -> Result<bool> {
    let template = tokio::time::timeout(state.rpc_timeout, state.rpc.get_block_template())
        .await
        .map_err(|_| Error::timeout("Block template request timed out"))??;

    let changed = state
        .template
        .read()
        .as_ref()
        .is_none_or(|current| template.differs_from(current));
    if !changed {
        return Ok(false);
    }

    let job = state.jobs.create_job(template.clone());
    state.processor.prune_claims(template.height);
    *state.template.write() = Some(template);

    info!(
        job_id = %job.id(),
        height = job.height(),
        difficulty = %job.template().network_difficulty,
        "New job"
    );
    // No receivers just means no miners are connected
    let _ = state.job_tx.send(job);
    Ok(true)
}

/// Handle a client connection
async fn handle_client(
    stream: TcpStream,
    connection: Arc<Connection>,
    state: Arc<ServerState>,
    mut job_rx: broadcast::Receiver<Arc<Job>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    info!("New connection");
    state
        .connections
        .insert(connection.id(), Arc::clone(&connection));

    let result = serve_client(stream, &connection, &state, &mut job_rx, &mut shutdown_rx).await;

    connection.disconnect();
    state.connections.remove(&connection.id());
    let info = connection.snapshot();
    info!(
        valid = info.valid_shares,
        invalid = info.invalid_shares,
        uptime_secs = connection.uptime().as_secs(),
        "Connection closed"
    );
    result
}

async fn serve_client(
    stream: TcpStream,
    connection: &Connection,
    state: &ServerState,
    job_rx: &mut broadcast::Receiver<Arc<Job>>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    // `next_line` is cancel-safe, so a partial line survives a lost select race
    let mut lines = BufReader::new(reader).lines();
    let idle = tokio::time::sleep(state.connection_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            _ = &mut idle => {
                info!("Idle timeout");
                break;
            }

            result = lines.next_line() => {
                match result {
                    Ok(None) => {
                        debug!("Client disconnected");
                        break;
                    }
                    Ok(Some(message)) => {
                        // only inbound data refreshes the idle deadline
                        idle.as_mut().reset(Instant::now() + state.connection_timeout);
                        let trimmed = message.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        handle_line(trimmed, connection, state, &mut writer).await?;
                    }
                    Err(e) => {
                        error!("Read error: {}", e);
                        break;
                    }
                }
            }

            received = job_rx.recv() => {
                match received {
                    Ok(job) => {
                        if connection.is_subscribed() && connection.is_authorized() {
                            send_message(&mut writer, &job.notify_params(true).into_notification()).await?;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Job broadcast lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            _ = shutdown_rx.changed() => break,
        }
    }

    Ok(())
}

async fn handle_line(
    line: &str,
    connection: &Connection,
    state: &ServerState,
    writer: &mut OwnedWriteHalf,
) -> Result<()> {
    match StratumMessage::from_json(line) {
        Ok(StratumMessage::Request(req)) => {
            let (response, followups) = handle_request(req, connection, state).await;
            send_message(writer, &response).await?;
            for notification in followups {
                send_message(writer, &notification).await?;
            }
        }
        Ok(_) => {
            debug!("Ignoring non-request message");
        }
        Err(e) => {
            debug!("Failed to parse message: {}", e);
            let response = StratumResponse::error_with_code(Value::Null, StratumErrorCode::ParseError);
            send_message(writer, &response).await?;
        }
    }
    Ok(())
}

/// Handle a Stratum request, returning the reply and any pushes that follow it
async fn handle_request(
    req: StratumRequest,
    connection: &Connection,
    state: &ServerState,
) -> (StratumResponse, Vec<StratumNotification>) {
    match req.method_enum() {
        StratumMethod::Subscribe => {
            connection.subscribe();
            let result = Value::Array(vec![
                Value::String(connection.id().simple()),
                Value::String(connection.extranonce1().to_string()),
                Value::Number(state.extranonce2_size.into()),
            ]);
            (StratumResponse::success(req.id, result), Vec::new())
        }

        StratumMethod::Authorize => {
            let Some(username) = req.params.first().and_then(Value::as_str) else {
                return (
                    StratumResponse::error_with_code_and_message(
                        req.id,
                        StratumErrorCode::Other,
                        "Missing username",
                    ),
                    Vec::new(),
                );
            };
            let password = req.params.get(1).and_then(Value::as_str);

            match state.processor.on_authorize(connection, username, password).await {
                Ok(_) => {
                    let mut followups =
                        vec![StratumNotification::set_difficulty(connection.difficulty())];
                    if let Some(job) = state.jobs.current_job() {
                        followups.push(job.notify_params(true).into_notification());
                    }
                    (StratumResponse::success(req.id, Value::Bool(true)), followups)
                }
                Err(e) => {
                    warn!(username, "Authorization failed: {}", e);
                    (StratumResponse::success(req.id, Value::Bool(false)), Vec::new())
                }
            }
        }

        StratumMethod::Submit => {
            let outcome = match Submission::from_params(&req.params) {
                Ok(submission) => state.processor.on_submit(connection, submission).await,
                Err(_) if !connection.is_authorized() => Err(SubmitError::Unauthorized),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(outcome) => {
                    let followups = outcome
                        .new_difficulty
                        .map(StratumNotification::set_difficulty)
                        .into_iter()
                        .collect();
                    (
                        StratumResponse::success(req.id, Value::Bool(outcome.accepted)),
                        followups,
                    )
                }
                Err(e) => {
                    debug!("Submit rejected: {}", e);
                    (
                        StratumResponse::error_with_code_and_message(req.id, e.code(), &e.to_string()),
                        Vec::new(),
                    )
                }
            }
        }

        StratumMethod::Notify | StratumMethod::SetDifficulty | StratumMethod::Unknown(_) => {
            debug!(method = %req.method, "Unsupported method");
            (
                StratumResponse::error_with_code(req.id, StratumErrorCode::MethodNotFound),
                Vec::new(),
            )
        }
    }
}

async fn send_message<T: serde::Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> Result<()> {
    let json = serde_json::to_string(message)? + "\n";
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}

/// Generate a random extranonce1
fn generate_extranonce1() -> String {
    let mut bytes = [0u8; EXTRANONCE1_SIZE];
    if getrandom::fill(&mut bytes).is_err() {
        bytes = rand::random();
    }
    hex::encode(bytes)
}
