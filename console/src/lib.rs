// Merchant onboarding admin console core.
//
// Library surface behind the headless binary: form state, autosave,
// dual-write persistence, document uploads, dashboard queries and invites.

use log::{error, info};

pub mod api;
pub mod autosave;
pub mod config;
pub mod form;
pub mod models;
pub mod persistence;
pub mod remote;
pub mod utils;

fn init_logging(with_stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = utils::path_resolver::resolve_log_folder()?;
    std::fs::create_dir_all(&log_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");

    // JSON log file for structured parsing
    let json_log_file = log_dir.join(format!("console-{}.log", timestamp));

    // Human-readable log file (.txt)
    let txt_log_file = log_dir.join(format!("console-{}.txt", timestamp));

    // Dual-format logging:
    // - JSON format to .log file
    // - Human-readable format to .txt file
    // - Optional: human-readable to stdout
    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(&json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(&txt_log_file)?),
        );

    dispatch.apply()?;
    Ok(())
}

/// Deterministic workflow proof mode (no database, no network).
/// Writes `W1_workflow_smoke_transcript.log` under `Console_Log/` and exits 0/1.
pub fn run_workflow_smoke() {
    if let Err(e) = init_logging(true) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] Workflow smoke starting at {}",
        chrono::Utc::now()
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    let result = match rt {
        Ok(rt) => rt.block_on(api::smoke::workflow_smoke()),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to create async runtime for workflow smoke: {}",
            e
        )),
    };

    if let Err(e) = result {
        error!(
            "[PHASE: workflow] [STEP: smoke] Smoke exited with error: {:?}",
            e
        );
        eprintln!("Console error: {}", e);
        std::process::exit(1);
    }
}

/// Deterministic upload pipeline proof mode (no network).
/// Writes `W2_upload_smoke_transcript.log` under `Console_Log/` and exits 0/1.
pub fn run_upload_smoke() {
    if let Err(e) = init_logging(true) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] Upload smoke starting at {}",
        chrono::Utc::now()
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    let result = match rt {
        Ok(rt) => rt.block_on(api::smoke::upload_smoke()),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to create async runtime for upload smoke: {}",
            e
        )),
    };

    if let Err(e) = result {
        error!(
            "[PHASE: documents] [STEP: smoke] Smoke exited with error: {:?}",
            e
        );
        eprintln!("Console error: {}", e);
        std::process::exit(1);
    }
}

/// Push unsynced write-ahead cache entries to the record store and report.
/// Needs real configuration (database URL); run at startup or after an
/// outage.
pub fn run_reconcile() {
    if let Err(e) = init_logging(true) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] Reconcile starting at {}",
        chrono::Utc::now()
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    let result = match rt {
        Ok(rt) => rt.block_on(reconcile_once()),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to create async runtime for reconcile: {}",
            e
        )),
    };

    match result {
        Ok(report) => {
            info!(
                "[PHASE: reconcile] [STEP: done] pending={} pushed={} failed={}",
                report.pending,
                report.pushed.len(),
                report.failed.len()
            );
            if !report.failed.is_empty() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("[PHASE: reconcile] [STEP: fatal] Reconcile failed: {:?}", e);
            eprintln!("Console error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn reconcile_once() -> anyhow::Result<models::responses::ReconcileReport> {
    let backends = ConsoleBackends::connect().await?;
    backends.gateway().reconcile().await
}

/// Everything the console talks to, assembled from one configuration: the
/// record store, the object-storage and functions clients, and the
/// on-device cache.
pub struct ConsoleBackends {
    pub config: config::ConsoleConfig,
    pub records: std::sync::Arc<dyn remote::records::ApplicationRecords>,
    pub object_store: remote::storage::ObjectStore,
    pub functions: remote::functions::FunctionsClient,
    pub cache: std::sync::Arc<persistence::local_cache::LocalCache>,
}

impl ConsoleBackends {
    /// Load configuration and connect the real record store.
    pub async fn connect() -> anyhow::Result<Self> {
        let cfg = config::ConsoleConfig::load()?;
        let records =
            std::sync::Arc::new(remote::records::RecordStore::connect(&cfg.database_url).await?);
        Self::assemble(cfg, records)
    }

    /// Wire the HTTP clients and cache from an already-resolved record
    /// store. Split out so the assembly itself is testable offline.
    pub fn assemble(
        config: config::ConsoleConfig,
        records: std::sync::Arc<dyn remote::records::ApplicationRecords>,
    ) -> anyhow::Result<Self> {
        let object_store =
            remote::storage::ObjectStore::new(&config.backend, &config.document_bucket)?;
        let functions = remote::functions::FunctionsClient::new(&config.backend)?;
        let cache = match &config.data_dir {
            Some(dir) => std::sync::Arc::new(persistence::local_cache::LocalCache::new(
                dir.join("cache"),
            )?),
            None => std::sync::Arc::new(persistence::local_cache::LocalCache::open_default()?),
        };
        Ok(Self {
            config,
            records,
            object_store,
            functions,
            cache,
        })
    }

    pub fn gateway(&self) -> persistence::gateway::PersistenceGateway {
        persistence::gateway::PersistenceGateway::new(
            self.records.clone(),
            self.cache.clone(),
            self.config.save_timeout(),
            self.config.close_save_timeout(),
        )
    }

    pub fn document_pipeline(&self) -> api::documents::DocumentPipeline<'_> {
        api::documents::DocumentPipeline {
            store: &self.object_store,
            functions: &self.functions,
            cache: &self.cache,
            max_bytes: self.config.max_upload_bytes,
        }
    }
}
