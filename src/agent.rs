use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::export::{ExportServer, StatFileWriter};
use crate::report::MapResolver;
use crate::rotator::IntervalRotator;
use crate::state::{Engine, Reconfigured};

/// Agent orchestrates the engine, its periodic tasks and the export server.
pub struct Agent {
    cfg: Config,
    engine: Arc<Engine>,
    server: ExportServer,
    tasks: parking_lot::Mutex<Vec<tokio::task::JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Agent {
    /// Creates a new Agent. Nothing runs until [`Agent::start`].
    pub fn new(cfg: Config) -> Result<Self> {
        let engine = Arc::new(Engine::new());
        let resolver = Arc::new(MapResolver::from_config(&cfg.identities));
        let server = ExportServer::new(&cfg.export.addr, Arc::clone(&engine), resolver)
            .context("creating export server")?;

        Ok(Self {
            cfg,
            engine,
            server,
            tasks: parking_lot::Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Initializes the engine, then starts the export server, the rotator
    /// and the stat file writer when one is configured.
    pub async fn start(&self) -> Result<()> {
        self.engine
            .initialize(&self.cfg.engine)
            .context("initializing engine")?;

        self.server
            .start()
            .await
            .context("starting export server")?;

        let mut tasks = self.tasks.lock();

        let rotator = IntervalRotator::new(Arc::clone(&self.engine));
        tasks.push(tokio::spawn(rotator.run(self.cancel.clone())));

        if let Some(path) = &self.cfg.export.file {
            let writer = StatFileWriter::new(path, Arc::clone(&self.engine));
            tasks.push(tokio::spawn(writer.run(self.cancel.clone())));
        }
        drop(tasks);

        info!(addr = %self.cfg.export.addr, "agent started");

        Ok(())
    }

    /// Applies a reloaded configuration.
    ///
    /// The log level and listen address only take effect on restart.
    pub fn reload(&mut self, cfg: Config) -> Result<()> {
        cfg.validate().context("validating reloaded config")?;

        let outcome = self
            .engine
            .configure(&cfg.engine)
            .context("applying engine config")?;
        match outcome {
            Reconfigured::Rebuilt => warn!("engine geometry changed, stored events discarded"),
            Reconfigured::ExclusionsUpdated => info!(
                excluded = cfg.engine.excluded_codes.len(),
                "exclusion list reloaded",
            ),
            Reconfigured::Initialized => info!("engine initialized on reload"),
        }

        self.server
            .set_resolver(Arc::new(MapResolver::from_config(&cfg.identities)));

        if cfg.export.addr != self.cfg.export.addr {
            warn!(
                current = %self.cfg.export.addr,
                requested = %cfg.export.addr,
                "export.addr change requires a restart",
            );
        }
        if cfg.export.file != self.cfg.export.file {
            warn!("export.file change requires a restart");
        }
        if cfg.log_level != self.cfg.log_level {
            warn!("log_level change requires a restart");
        }

        self.cfg = cfg;
        Ok(())
    }

    /// Stops the periodic tasks and the server, then detaches the engine
    /// state.
    pub async fn stop(&self) -> Result<()> {
        self.cancel.cancel();

        let handles = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "agent task join failed");
            }
        }

        self.server.stop().await.context("stopping export server")?;
        self.engine.shutdown();

        info!("agent stopped");

        Ok(())
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn server(&self) -> &ExportServer {
        &self.server
    }
}
