use std::collections::HashSet;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use license_admission_webhook::admission::{router, AppState};
use license_admission_webhook::cache::{kv::KvCache, lru::LruCache, memory::MemoryCache, CachingResolver};
use license_admission_webhook::config::{CacheKind, Config};
use license_admission_webhook::error::ValidationError;
use license_admission_webhook::module::License;
use license_admission_webhook::notify::{UnknownLicenseNotifier, WebhookNotifier};
use license_admission_webhook::resolve::{
    ArchiveResolver, ChainedResolver, HeuristicDetector, LicenseResolver, MetadataResolver,
};
use license_admission_webhook::ruleset::{ModuleMatcher, RuleSet};
use license_admission_webhook::translate::{
    ChainedTranslator, GolangXTranslator, OverrideTranslator, Translator, VanityPkgTranslator,
};
use license_admission_webhook::validate::{NotifyingValidator, RuleSetValidator, Validator};

#[derive(Parser)]
#[command(name = "license-admission-webhook")]
#[command(about = "Admission webhook validating module licenses for a module-proxy server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the admission webhook (default behavior)
    Serve {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print a fully populated example configuration and exit
    SampleConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve {
        config: PathBuf::from("config.toml"),
    }) {
        Commands::SampleConfig => {
            match toml::to_string_pretty(&Config::sample()) {
                Ok(rendered) => {
                    println!("{rendered}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("failed to render sample config: {e}");
                    ExitCode::from(1)
                }
            }
        }
        Commands::Serve { config } => run_serve(config).await,
    }
}

async fn run_serve(config_path: PathBuf) -> ExitCode {
    let config = match load_config(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    init_tracing(config.debug);
    tracing::info!("starting admission webhook");

    let validator = match build_validator(&config).await {
        Ok(validator) => validator,
        Err(e) => {
            tracing::error!(error = %e, "failed to build validation pipeline");
            return ExitCode::from(1);
        }
    };

    let listen_addr: SocketAddr = match config.server.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "invalid listen address");
            return ExitCode::from(1);
        }
    };

    if config.server.enable_pprof {
        tracing::warn!("enable_pprof is set but this build exposes no pprof endpoint");
    }
    if config.trace.is_some() {
        tracing::warn!("a [trace] section is configured but no trace exporter is wired up");
    }

    let state = Arc::new(AppState {
        validator,
        forbidden_hosts: config.server.forbidden_hosts.iter().cloned().collect::<HashSet<_>>(),
    });

    let listener = match tokio::net::TcpListener::bind(listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %listen_addr, "failed to bind listen address");
            return ExitCode::from(2);
        }
    };

    tracing::info!(addr = %listen_addr, "listening");

    let serve_result = axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    match serve_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server shut down with an error");
            ExitCode::from(3)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut signal) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            std::future::pending::<()>().await;
            return;
        };
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining connections");
}

async fn load_config(path: &PathBuf) -> Result<Config, ValidationError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ValidationError::config(format!("cannot read {}: {e}", path.display())))?;
    Config::from_toml_str(&content)
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_translator(config: &Config) -> Result<Box<dyn Translator>, ValidationError> {
    let mut override_rules = Vec::with_capacity(config.path_overrides.len());
    for rule in &config.path_overrides {
        let pattern = regex::Regex::new(&rule.name_match)
            .map_err(|e| ValidationError::config(format!("invalid path override pattern: {e}")))?;
        override_rules.push((pattern, rule.replace.clone()));
    }

    Ok(Box::new(ChainedTranslator::new(vec![
        Box::new(OverrideTranslator::new(override_rules)),
        Box::new(GolangXTranslator::default()),
        Box::new(VanityPkgTranslator::default()),
    ])))
}

fn build_rule_set(config: &Config) -> Result<RuleSet, ValidationError> {
    let rule_set = &config.validation.rule_set;

    let to_matchers = |entries: &[license_admission_webhook::config::ModuleMatcherConfig]| {
        entries
            .iter()
            .map(|m| ModuleMatcher::new(&m.name, m.version_constraint.as_deref()))
            .collect::<Result<Vec<_>, _>>()
    };

    let to_licenses = |entries: &[license_admission_webhook::config::LicenseConfig]| {
        entries
            .iter()
            .map(|l| {
                if !l.spdx_id.is_empty() && license_admission_webhook::spdx::license_by_id(&l.spdx_id).is_none() {
                    return Err(ValidationError::config(format!("unknown SPDX id {:?}", l.spdx_id)));
                }
                Ok(License::new(l.spdx_id.clone(), l.name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()
    };

    Ok(RuleSet {
        whitelisted_modules: to_matchers(&rule_set.whitelisted_modules)?,
        blacklisted_modules: to_matchers(&rule_set.blacklisted_modules)?,
        allowed_licenses: to_licenses(&rule_set.allowed_licenses)?,
        denied_licenses: to_licenses(&rule_set.denied_licenses)?,
    })
}

async fn build_resolver(config: &Config, http_client: reqwest::Client) -> Result<Box<dyn LicenseResolver>, ValidationError> {
    let github_base = url::Url::parse(&config.github.api_base_url)
        .map_err(|e| ValidationError::config(format!("invalid github api_base_url: {e}")))?;
    let go_proxy_base = url::Url::parse(&config.go_proxy.base_url)
        .map_err(|e| ValidationError::config(format!("invalid go_proxy base_url: {e}")))?;

    let confidence_threshold = config.validation.confidence_threshold;

    let metadata = MetadataResolver::new(
        http_client.clone(),
        github_base,
        config.github.access_token.as_ref().map(|s| s.expose().to_string()),
        tokio_util::sync::CancellationToken::new(),
        HeuristicDetector::new(confidence_threshold),
    );

    let archive = ArchiveResolver::new(http_client, go_proxy_base, HeuristicDetector::new(confidence_threshold));

    let chained: Box<dyn LicenseResolver> =
        Box::new(ChainedResolver::new(vec![Box::new(metadata), Box::new(archive)]));

    let ttl = config.cache.ttl_secs.map(Duration::from_secs);

    let resolver: Box<dyn LicenseResolver> = match config.cache.kind {
        CacheKind::None => chained,
        CacheKind::Memory => Box::new(CachingResolver::new(MemoryCache::new(), chained, ttl)),
        CacheKind::Lru => {
            let capacity = NonZeroUsize::new(config.cache.size_items.max(1))
                .expect("size_items.max(1) is never zero");
            Box::new(CachingResolver::new(LruCache::new(capacity), chained, ttl))
        }
        CacheKind::Kv => {
            let kv = config
                .cache
                .kv
                .as_ref()
                .ok_or_else(|| ValidationError::config("cache.kind = \"redis\" requires a [cache.kv] section"))?;
            if kv.addrs.len() > 1 {
                tracing::warn!("cache.kv.addrs has more than one entry; only the first is used");
            }
            if kv.pool_size != 10
                || kv.connect_timeout_secs.is_some()
                || kv.read_timeout_secs.is_some()
                || kv.write_timeout_secs.is_some()
            {
                tracing::warn!(
                    "cache.kv.{{pool_size,connect_timeout_secs,read_timeout_secs,write_timeout_secs}} \
                     are accepted but not wired to the underlying connection manager"
                );
            }
            let cache = KvCache::connect(&kv.connection_url()?).await?;
            Box::new(CachingResolver::new(cache, chained, ttl))
        }
    };

    Ok(resolver)
}

fn build_notifier(config: &Config, http_client: reqwest::Client) -> Result<Option<Box<dyn UnknownLicenseNotifier>>, ValidationError> {
    let Some(webhook) = &config.webhook else {
        return Ok(None);
    };

    let url = url::Url::parse(&webhook.url)
        .map_err(|e| ValidationError::config(format!("invalid webhook url: {e}")))?;

    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in &webhook.headers {
        let name = reqwest::header::HeaderName::try_from(name.as_str())
            .map_err(|e| ValidationError::config(format!("invalid webhook header name {name:?}: {e}")))?;
        let value = reqwest::header::HeaderValue::from_str(value.expose())
            .map_err(|e| ValidationError::config(format!("invalid webhook header value: {e}")))?;
        headers.insert(name, value);
    }

    Ok(Some(Box::new(WebhookNotifier::new(
        http_client,
        url,
        &webhook.method,
        webhook.body_template.clone(),
        headers,
    ))))
}

async fn build_validator(config: &Config) -> Result<Arc<dyn Validator>, ValidationError> {
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("license-admission-webhook/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| ValidationError::config(format!("failed to build http client: {e}")))?;

    let translator = build_translator(config)?;
    let resolver = build_resolver(config, http_client.clone()).await?;
    let rule_set = build_rule_set(config)?;

    let core = RuleSetValidator::new(translator, resolver, rule_set);

    let notifier = build_notifier(config, http_client)?;
    let validator = NotifyingValidator::new(
        Box::new(core),
        config.validation.unknown_license_action,
        notifier,
    );

    Ok(Arc::new(validator))
}
