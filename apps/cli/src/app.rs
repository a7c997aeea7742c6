//! Wires the store, the HTTP client and the engine together for each
//! subcommand.

use std::sync::Arc;

use cloudsync_remote::XpanClient;
use cloudsync_store::{Credentials, FjallStore, KvStore, PendingTransfers, TransferKind, TransferReport};
use cloudsync_sync::Reconciler;

use crate::Command;
use crate::config::Config;
use crate::progress::TransferBars;

pub async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let store_path = config.store_path();
    let store = Arc::new(FjallStore::open(&store_path)?);
    tracing::debug!(path = %store_path.display(), "state database opened");

    let result = match command {
        Command::Login {
            access_token,
            refresh_token,
        } => {
            Credentials::new(store.clone()).store_tokens(&access_token, &refresh_token)?;
            println!("credentials stored");
            Ok(())
        }
        Command::Status => status(store.clone()),
        Command::Cache => {
            let reconciler = reconciler(&config, store.clone())?;
            let cached = reconciler.cache_fingerprints().await?;
            println!("cached {cached} fingerprints");
            Ok(())
        }
        Command::Sync { no_progress } => {
            let mut reconciler = reconciler(&config, store.clone())?;
            if !no_progress {
                reconciler = reconciler.with_progress(TransferBars::new().callback());
            }
            let summary = reconciler.run().await?;
            println!("{summary}");
            Ok(())
        }
    };

    store.persist()?;
    result
}

fn reconciler(config: &Config, store: Arc<FjallStore>) -> anyhow::Result<Reconciler> {
    let sync_config = config.sync_config()?;
    std::fs::create_dir_all(&sync_config.scratch_dir)?;
    let client = XpanClient::new(config.client_config())?;
    tracing::info!(
        local = %sync_config.local_root.display(),
        remote = %sync_config.remote_root,
        "configuration loaded"
    );
    Ok(Reconciler::new(Arc::new(client), store, sync_config))
}

fn status(store: Arc<dyn KvStore>) -> anyhow::Result<()> {
    for kind in [TransferKind::Upload, TransferKind::Download] {
        let report = PendingTransfers::new(Arc::clone(&store), kind).report()?;
        print_report(kind, &report);
    }
    Ok(())
}

fn print_report(kind: TransferKind, report: &TransferReport) {
    let label = match kind {
        TransferKind::Upload => "uploads",
        TransferKind::Download => "downloads",
    };
    println!(
        "{label}: {} done, {} pending",
        report.done.len(),
        report.pending.len()
    );
    for key in &report.pending {
        println!("  pending {key}");
    }
}
