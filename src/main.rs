use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use remitflow::application::flow::RemittanceFlow;
use remitflow::application::pipeline::SubmissionPipeline;
use remitflow::application::rate_engine::RateEngine;
use remitflow::application::settings_cache::SettingsCache;
use remitflow::config::AppConfig;
use remitflow::domain::corridor::CorridorRegistry;
use remitflow::domain::draft::Recipient;
use remitflow::domain::ports::{
    BeneficiaryStoreBox, ObjectStoreBox, RateSourceBox, RemittanceBackendBox, SessionProviderBox,
    SettingsStoreBox,
};
use remitflow::domain::rates::RateQuote;
use remitflow::domain::remittance::ReceiptFile;
use remitflow::domain::settings::{
    DEFAULT_FEE_PERCENTAGE, DEFAULT_MARGIN_EXCHANGE, FEE_PERCENTAGE_KEY, MARGIN_EXCHANGE_KEY,
    SettingEntry,
};
use remitflow::infrastructure::http::HttpApi;
use remitflow::infrastructure::in_memory::{
    InMemoryBeneficiaryStore, InMemoryObjectStore, InMemoryRateSource, InMemoryRemittanceBackend,
    InMemorySettingsStore, StaticSessionProvider,
};
#[cfg(feature = "storage-rocksdb")]
use remitflow::infrastructure::rocksdb::RocksDBStore;
use remitflow::interfaces::csv::corridor_reader::CorridorReader;
use remitflow::interfaces::csv::report_writer::ReportWriter;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (TOML). Defaults to config/remitflow.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Corridor catalog CSV replacing the built-in one.
    #[arg(long, global = true)]
    corridors: Option<PathBuf>,

    /// Use in-memory adapters and baseline rates instead of the remote API.
    #[arg(long, global = true)]
    offline: bool,

    /// Path to persistent database (optional). If provided, saved
    /// beneficiaries are kept in RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the supported corridors as CSV.
    Corridors,
    /// Price a transfer without sending it.
    Quote {
        #[arg(long)]
        amount: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Walk a transfer through every step and submit it.
    Send {
        #[arg(long)]
        amount: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Saved beneficiary to pre-fill the recipient from.
        #[arg(long)]
        beneficiary: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bank: Option<String>,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        document: Option<String>,
        /// Payment proof to upload.
        #[arg(long)]
        receipt: PathBuf,
        #[arg(long)]
        save_beneficiary: bool,
    },
    /// List saved beneficiaries as CSV.
    Beneficiaries,
}

struct Adapters {
    sessions: SessionProviderBox,
    rates: RateSourceBox,
    settings: SettingsStoreBox,
    object_store: ObjectStoreBox,
    backend: RemittanceBackendBox,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).into_diagnostic()?;
    init_tracing(&config.log_level);

    let registry = Arc::new(load_registry(
        cli.corridors.as_deref().or(config.corridors_path.as_deref()),
    )?);

    if let Command::Corridors = cli.command {
        let mut writer = ReportWriter::new(io::stdout().lock());
        writer.write_corridors(registry.iter()).into_diagnostic()?;
        return Ok(());
    }

    let adapters = if cli.offline {
        offline_adapters(&registry, &config)
    } else {
        remote_adapters(&config)?
    };
    let beneficiaries = beneficiary_store(cli.db_path)?;

    let settings = Arc::new(SettingsCache::new(adapters.settings));
    let rates = Arc::new(
        RateEngine::new(adapters.rates, registry.clone(), settings.clone())
            .with_refresh_interval(config.refresh_interval()),
    );
    let pipeline = SubmissionPipeline::new(adapters.sessions, adapters.object_store, adapters.backend);
    let flow = RemittanceFlow::new(rates.clone(), settings, pipeline, beneficiaries);

    let status = flow.prepare().await;
    if status.using_fallback() {
        tracing::warn!("live rates unavailable; quoting with baseline rates");
    }

    match cli.command {
        Command::Corridors => {}
        Command::Quote { amount, from, to } => {
            flow.edit(|draft| {
                draft.set_corridor(&from.to_uppercase(), &to.to_uppercase())?;
                draft.set_amount_text(&amount)
            })
            .await
            .into_diagnostic()?;
            let quote = flow
                .quote()
                .await
                .ok_or_else(|| miette!("cannot price {amount} from {from} to {to}"))?;
            let draft = flow.draft().await;
            let mut writer = ReportWriter::new(io::stdout().lock());
            writer
                .write_quote(
                    draft.from_code().unwrap_or_default(),
                    draft.to_code().unwrap_or_default(),
                    &quote,
                )
                .into_diagnostic()?;
        }
        Command::Send {
            amount,
            from,
            to,
            beneficiary,
            name,
            bank,
            account,
            document,
            receipt,
            save_beneficiary,
        } => {
            flow.edit(|draft| draft.set_corridor(&from.to_uppercase(), &to.to_uppercase()))
                .await
                .into_diagnostic()?;
            if let Some(id) = beneficiary {
                flow.prefill_saved(&id).await.into_diagnostic()?;
            }
            flow.edit(|draft| {
                let saved = draft.recipient().clone();
                draft.set_amount_text(&amount)?;
                draft.set_recipient(Recipient {
                    name: name.unwrap_or(saved.name),
                    bank: bank.unwrap_or(saved.bank),
                    account_number: account.unwrap_or(saved.account_number),
                    document_id: document.unwrap_or(saved.document_id),
                })?;
                draft.set_save_as_beneficiary(save_beneficiary)
            })
            .await
            .into_diagnostic()?;

            // Amount -> Recipient -> Payment -> Upload
            for _ in 0..3 {
                flow.advance().await.into_diagnostic()?;
            }
            flow.upload_receipt(read_receipt(&receipt)?)
                .await
                .into_diagnostic()?;
            let quote = flow
                .quote()
                .await
                .ok_or_else(|| miette!("cannot price {amount} from {from} to {to}"))?;
            let transaction_id = flow.submit().await.into_diagnostic()?;

            let draft = flow.draft().await;
            let mut writer = ReportWriter::new(io::stdout().lock());
            writer
                .write_quote(
                    draft.from_code().unwrap_or_default(),
                    draft.to_code().unwrap_or_default(),
                    &quote,
                )
                .into_diagnostic()?;
            println!("transaction_id: {transaction_id}");
        }
        Command::Beneficiaries => {
            let mut writer = csv::Writer::from_writer(io::stdout().lock());
            for beneficiary in flow.saved_beneficiaries().await.into_diagnostic()? {
                writer.serialize(beneficiary).into_diagnostic()?;
            }
            writer.flush().into_diagnostic()?;
        }
    }

    rates.stop();
    flow.close();
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("remitflow={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn load_registry(path: Option<&Path>) -> Result<CorridorRegistry> {
    match path {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            let registry = CorridorReader::new(file).into_registry().into_diagnostic()?;
            tracing::info!(corridors = registry.len(), path = %path.display(), "corridor catalog loaded");
            Ok(registry)
        }
        None => Ok(CorridorRegistry::builtin()),
    }
}

fn offline_adapters(registry: &CorridorRegistry, config: &AppConfig) -> Adapters {
    let mut seen = HashSet::new();
    let quotes = registry
        .iter()
        .filter(|entry| seen.insert(entry.currency.clone()))
        .map(|entry| RateQuote {
            currency: entry.currency.clone(),
            rate_to_usd: entry.baseline_rate_to_usd,
        })
        .collect();
    let settings = vec![
        SettingEntry::new(MARGIN_EXCHANGE_KEY, &DEFAULT_MARGIN_EXCHANGE.to_string()),
        SettingEntry::new(FEE_PERCENTAGE_KEY, &DEFAULT_FEE_PERCENTAGE.to_string()),
    ];
    let sessions = match config.session() {
        Some(session) => StaticSessionProvider::signed_in(&session.access_token, &session.user_id),
        None => StaticSessionProvider::signed_in("offline", "offline-user"),
    };

    Adapters {
        sessions: Box::new(sessions),
        rates: Box::new(InMemoryRateSource::new(quotes)),
        settings: Box::new(InMemorySettingsStore::new(settings)),
        object_store: Box::new(InMemoryObjectStore::new()),
        backend: Box::new(InMemoryRemittanceBackend::new()),
    }
}

fn remote_adapters(config: &AppConfig) -> Result<Adapters> {
    let api = HttpApi::new(&config.api_base_url).into_diagnostic()?;
    let sessions = match config.session() {
        Some(session) => StaticSessionProvider::signed_in(&session.access_token, &session.user_id),
        None => StaticSessionProvider::signed_out(),
    };

    Ok(Adapters {
        sessions: Box::new(sessions),
        rates: Box::new(api.clone()),
        settings: Box::new(api.clone()),
        object_store: Box::new(api.clone()),
        backend: Box::new(api),
    })
}

fn beneficiary_store(db_path: Option<PathBuf>) -> Result<BeneficiaryStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Box::new(RocksDBStore::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
            );
            Ok(Box::new(InMemoryBeneficiaryStore::new()))
        }
        None => Ok(Box::new(InMemoryBeneficiaryStore::new())),
    }
}

fn read_receipt(path: &Path) -> Result<ReceiptFile> {
    let bytes = std::fs::read(path).into_diagnostic()?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| miette!("receipt path {} has no file name", path.display()))?;
    let content_type = ReceiptFile::content_type_for(&file_name);
    Ok(ReceiptFile::new(file_name, content_type, bytes))
}
