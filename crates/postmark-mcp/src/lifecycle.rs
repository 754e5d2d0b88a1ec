//! Process lifecycle: startup checks, stdio serving, signal shutdown.
//!
//! Startup runs in a fixed order and every step is fatal:
//! 1. resolve credentials from the loaded configuration
//! 2. build the provider client and make one liveness call
//! 3. register the tool definitions with a new dispatcher
//! 4. serve MCP over stdio
//!
//! Serving ends on stdin EOF or on the first SIGINT/SIGTERM. A second signal
//! during shutdown is ignored.

use anyhow::{Context, Result};
use postmark_conf::{ConfigError, ProviderCredentials, ServerConfig};
use rmcp::service::ServerInitializeError;
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;
#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::handler::PostmarkHandler;
use crate::provider::{EmailProvider, PostmarkClient, ProviderError, ServerSummary};
use crate::tools_registry::{RegistryError, ToolRegistry};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build Postmark client: {0}")]
    Client(#[source] ProviderError),

    #[error("Postmark liveness check failed: {0}")]
    Liveness(#[source] ProviderError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    ShuttingDown,
    Exited,
}

impl Phase {
    fn from_u8(value: u8) -> Phase {
        match value {
            0 => Phase::Running,
            1 => Phase::ShuttingDown,
            _ => Phase::Exited,
        }
    }
}

/// `Running -> ShuttingDown -> Exited`, each transition taken at most once.
#[derive(Debug)]
pub struct Lifecycle {
    phase: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Running as u8),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// True only for the caller that moved the state out of `Running`.
    pub fn begin_shutdown(&self) -> bool {
        self.phase
            .compare_exchange(
                Phase::Running as u8,
                Phase::ShuttingDown as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    pub fn mark_exited(&self) {
        self.phase.store(Phase::Exited as u8, Ordering::SeqCst);
    }
}

/// A server that passed startup and is ready to bind a transport.
pub struct Server {
    pub dispatcher: Arc<Dispatcher>,
    pub account: ServerSummary,
}

/// Startup steps 1-3 against the Postmark API.
pub async fn start(config: &ServerConfig) -> Result<Server, StartupError> {
    start_with(config, PostmarkClient::new).await
}

/// Startup steps 1-3 with a caller-supplied provider constructor.
pub async fn start_with<F, P>(config: &ServerConfig, connect: F) -> Result<Server, StartupError>
where
    F: FnOnce(&str, Arc<ProviderCredentials>) -> Result<P, ProviderError>,
    P: EmailProvider + 'static,
{
    let credentials = Arc::new(config.credentials()?);
    info!(
        sender = %credentials.default_sender,
        stream = %credentials.default_message_stream,
        "Loaded Postmark credentials"
    );

    let api_url = config.postmark.api_url();
    let provider = connect(api_url, credentials).map_err(StartupError::Client)?;
    let account = provider.server_info().await.map_err(StartupError::Liveness)?;
    info!(server = %account.name, id = account.id, api_url, "Connected to Postmark");

    let registry = ToolRegistry::standard()?;
    debug!(tools = registry.len(), "Registered tools");
    let dispatcher = Dispatcher::new(Arc::new(provider), registry);

    Ok(Server {
        dispatcher: Arc::new(dispatcher),
        account,
    })
}

/// Serve MCP over stdin/stdout until EOF or a shutdown signal.
pub async fn serve_stdio(server: Server, lifecycle: Arc<Lifecycle>) -> Result<()> {
    let handler = PostmarkHandler::new(Arc::clone(&server.dispatcher));
    let cancel = CancellationToken::new();

    // Registered before the transport is bound so the handshake is covered.
    let signals = ShutdownSignals::install().context("Failed to install signal handlers")?;
    let watcher = tokio::spawn(watch_signals(signals, Arc::clone(&lifecycle), cancel.clone()));

    // rmcp handles JSON-RPC framing
    let service = match handler.serve_with_ct(stdio(), cancel).await {
        Ok(service) => service,
        Err(e) => {
            watcher.abort();
            return handshake_outcome(e, &lifecycle);
        }
    };

    info!(
        server = %server.account.name,
        tools = server.dispatcher.registry().len(),
        "Postmark MCP server running on stdio"
    );

    let outcome = service.waiting().await;
    watcher.abort();
    lifecycle.mark_exited();

    let reason = outcome.context("MCP service task failed")?;
    info!(?reason, "Stdio MCP server shutdown");
    Ok(())
}

/// A handshake cut short by a shutdown signal or by stdin EOF is a clean exit.
fn handshake_outcome(error: ServerInitializeError, lifecycle: &Lifecycle) -> Result<()> {
    let signalled = lifecycle.phase() != Phase::Running;
    lifecycle.mark_exited();
    if signalled || matches!(error, ServerInitializeError::ConnectionClosed(_)) {
        info!(reason = %error, "Stdio MCP server closed before initialization");
        return Ok(());
    }
    Err(anyhow::Error::new(error).context("Failed to start stdio MCP service"))
}

/// SIGINT/SIGTERM listeners.
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn recv(&mut self) -> std::io::Result<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => Ok("SIGINT"),
                _ = self.terminate.recv() => Ok("SIGTERM"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            Ok("ctrl-c")
        }
    }
}

/// Cancel serving on the first signal.
async fn watch_signals(
    mut signals: ShutdownSignals,
    lifecycle: Arc<Lifecycle>,
    cancel: CancellationToken,
) {
    loop {
        let signal = match signals.recv().await {
            Ok(signal) => signal,
            Err(e) => {
                error!(error = %e, "Failed to listen for shutdown signals");
                return;
            }
        };

        if lifecycle.begin_shutdown() {
            info!(signal, "Received shutdown signal");
            cancel.cancel();
        } else {
            warn!(signal, "Already shutting down");
        }
    }
}

/// Make any panic fatal: log it, run the default hook, exit 1.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(panic = %info, "Unrecoverable panic, terminating");
        default_hook(info);
        std::process::exit(1);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        OutboundEmail, OutboundStats, SendReceipt, StatsFilter, TemplateSummary, TemplatedEmail,
    };
    use async_trait::async_trait;
    use postmark_conf::ServerToken;

    #[test]
    fn test_shutdown_transition_happens_once() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.phase(), Phase::Running);
        assert!(lifecycle.begin_shutdown());
        assert!(!lifecycle.begin_shutdown());
        assert_eq!(lifecycle.phase(), Phase::ShuttingDown);
        lifecycle.mark_exited();
        assert_eq!(lifecycle.phase(), Phase::Exited);
        assert!(!lifecycle.begin_shutdown());
    }

    #[test]
    fn test_concurrent_signals_single_winner() {
        let lifecycle = Arc::new(Lifecycle::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                std::thread::spawn(move || lifecycle.begin_shutdown())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_eof_before_handshake_is_clean() {
        let lifecycle = Lifecycle::new();
        let error = ServerInitializeError::ConnectionClosed("initialized request".into());
        assert!(handshake_outcome(error, &lifecycle).is_ok());
        assert_eq!(lifecycle.phase(), Phase::Exited);
    }

    #[test]
    fn test_signal_during_handshake_is_clean() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.begin_shutdown());
        assert!(handshake_outcome(ServerInitializeError::Cancelled, &lifecycle).is_ok());
        assert_eq!(lifecycle.phase(), Phase::Exited);
    }

    #[test]
    fn test_bad_handshake_is_an_error() {
        let lifecycle = Lifecycle::new();
        let error = ServerInitializeError::ExpectedInitializeRequest(None);
        let err = handshake_outcome(error, &lifecycle).unwrap_err();
        assert!(err.to_string().contains("Failed to start stdio MCP service"));
    }

    struct StaticProvider {
        alive: bool,
    }

    #[async_trait]
    impl EmailProvider for StaticProvider {
        async fn send_email(&self, _: &OutboundEmail) -> Result<SendReceipt, ProviderError> {
            unreachable!("not used during startup")
        }
        async fn send_email_with_template(
            &self,
            _: &TemplatedEmail,
        ) -> Result<SendReceipt, ProviderError> {
            unreachable!("not used during startup")
        }
        async fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError> {
            unreachable!("not used during startup")
        }
        async fn outbound_stats(&self, _: &StatsFilter) -> Result<OutboundStats, ProviderError> {
            unreachable!("not used during startup")
        }
        async fn server_info(&self) -> Result<ServerSummary, ProviderError> {
            if self.alive {
                Ok(ServerSummary { id: 7, name: "Production".into() })
            } else {
                Err(ProviderError::Api {
                    status: 401,
                    code: 10,
                    message: "Bad or missing API token".into(),
                })
            }
        }
    }

    fn configured() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.postmark.server_token = Some(ServerToken::new("token"));
        config.postmark.default_sender = Some("from@example.com".into());
        config.postmark.default_message_stream = Some("outbound".into());
        config
    }

    #[tokio::test]
    async fn test_start_registers_tools() {
        let server = start_with(&configured(), |_, _| Ok(StaticProvider { alive: true }))
            .await
            .unwrap();
        assert_eq!(server.account.name, "Production");
        assert_eq!(server.dispatcher.registry().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_config_fails_before_connecting() {
        let mut config = configured();
        config.postmark.default_sender = None;
        let result = start_with(&config, |_, _| -> Result<StaticProvider, ProviderError> {
            panic!("client must not be built without credentials")
        })
        .await;
        assert!(matches!(result, Err(StartupError::Config(_))));
    }

    #[tokio::test]
    async fn test_liveness_failure_is_fatal() {
        let result = start_with(&configured(), |_, _| Ok(StaticProvider { alive: false })).await;
        match result {
            Err(StartupError::Liveness(ProviderError::Api { code, .. })) => assert_eq!(code, 10),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("startup should fail"),
        }
    }
}
