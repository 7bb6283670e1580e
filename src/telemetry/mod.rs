//! # Módulo de Telemetria
//!
//! Instala o subscriber global do `tracing`. A saída no console está
//! sempre disponível; quando um endpoint OTLP está configurado, os spans
//! (execuções do runner, execução de steps, cargas cache-first) também são
//! exportados via gRPC.
//!
//! ## Para todos entenderem:
//!
//! Telemetria é o diário de bordo da execução. Cada step escreve uma linha
//! quando começa e quando termina, com quanto tempo levou e por que falhou.
//! Com um coletor como Jaeger ou Grafana Tempo dá para ver essas linhas
//! como uma linha do tempo.
//!
//! ## Configuração via variáveis de ambiente:
//!
//! - `OTEL_SERVICE_NAME`: nome do serviço anexado aos spans exportados
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: URL do coletor, ex. `http://localhost:4317`
//! - `OTEL_TRACES_SAMPLER_ARG`: taxa de sampling entre 0.0 e 1.0
//! - `RUST_LOG`: filtros do `EnvFilter`, cai no nível configurado se ausente
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! init_telemetry(TelemetryConfig::from_env())?;
//! // ... rodar cenários ...
//! shutdown_telemetry(); // Flush dos dados
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::runtime::Tokio;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{trace as sdktrace, Resource};
use tracing::Level;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_SERVICE_NAME: &str = "acceptance-steps";

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,

    /// OTLP collector. `None` keeps output on the console only.
    pub otlp_endpoint: Option<String>,

    /// Fraction of traces exported, clamped to `0.0..=1.0`.
    pub sampling_ratio: f64,

    pub enable_console_logging: bool,

    /// Level used when `RUST_LOG` is unset.
    pub log_level: Level,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            otlp_endpoint: None,
            sampling_ratio: 1.0,
            enable_console_logging: true,
            log_level: Level::INFO,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }

        if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.otlp_endpoint = Some(endpoint);
            }
        }

        if let Some(ratio) = lookup("OTEL_TRACES_SAMPLER_ARG") {
            if let Ok(r) = ratio.parse::<f64>() {
                config.sampling_ratio = r.clamp(0.0, 1.0);
            }
        }

        config
    }

    /// Lowers the fallback level to DEBUG.
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.log_level = Level::DEBUG;
        }
        self
    }
}

// ============================================================================
// INIT
// ============================================================================

/// Installs the subscriber. Returns the tracer when OTLP export is active.
pub fn init_telemetry(config: TelemetryConfig) -> anyhow::Result<Option<Tracer>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(endpoint) = &config.otlp_endpoint {
        let tracer = init_otlp_tracer(&config.service_name, endpoint, config.sampling_ratio)?;
        let telemetry_layer = OpenTelemetryLayer::new(tracer.clone());

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(telemetry_layer);

        if config.enable_console_logging {
            subscriber
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init()?;
        } else {
            subscriber.try_init()?;
        }

        tracing::info!(
            service_name = %config.service_name,
            endpoint = %endpoint,
            sampling_ratio = config.sampling_ratio,
            "OTLP telemetry initialised"
        );

        Ok(Some(tracer))
    } else {
        let subscriber = tracing_subscriber::registry().with(env_filter);

        if config.enable_console_logging {
            subscriber
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init()?;
        } else {
            subscriber.try_init()?;
        }

        tracing::debug!("Telemetry initialised (console only)");
        Ok(None)
    }
}

fn sampler_for(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

fn init_otlp_tracer(
    service_name: &str,
    endpoint: &str,
    sampling_ratio: f64,
) -> anyhow::Result<Tracer> {
    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .build_span_exporter()?,
            Tokio,
        )
        .with_config(
            sdktrace::Config::default()
                .with_sampler(sampler_for(sampling_ratio))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    service_name.to_string(),
                )])),
        )
        .build();

    let tracer = tracer_provider.tracer(service_name.to_string());
    global::set_tracer_provider(tracer_provider);

    Ok(tracer)
}

// ============================================================================
// SHUTDOWN
// ============================================================================

/// Flushes batched spans. Call before the process exits.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
    tracing::debug!("Telemetry shut down");
}
