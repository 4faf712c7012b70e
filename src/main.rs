use clap::Parser;
use log::{error, info, warn};
use pingora::prelude::*;
use pingora::server::configuration::Opt;
use pingora_proxy::http_proxy_service;
use std::sync::Arc;
use tamper_shield::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/shield.yaml")]
    config: String,

    /// Upstream backend host
    #[arg(short = 'u', long)]
    upstream_host: Option<String>,

    /// Upstream backend port
    #[arg(short = 'p', long)]
    upstream_port: Option<u16>,

    /// Connect to the upstream over TLS
    #[arg(long)]
    upstream_tls: bool,

    /// SNI sent to a TLS upstream (defaults to the upstream host)
    #[arg(long)]
    upstream_sni: Option<String>,

    /// Shield listening address
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    listen_addr: String,

    /// Shield listening port
    #[arg(short = 'P', long, default_value = "6188")]
    listen_port: u16,

    /// Metrics port
    #[arg(short = 'm', long, default_value = "6190")]
    metrics_port: u16,

    /// Trusted frontend origin, overrides the config file
    #[arg(short = 'f', long, env = "FRONTEND_URL")]
    frontend_url: Option<String>,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    info!("Starting Tamper Shield...");
    info!("Loading configuration from: {}", args.config);

    let mut config = ShieldConfig::from_file(&args.config).unwrap_or_else(|e| {
        warn!("{}", e);
        warn!("Using default configuration");
        ShieldConfig::default()
    });

    if let Some(frontend_url) = args.frontend_url {
        config.frontend_url = frontend_url;
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    if !config.block_mode {
        warn!("Block mode disabled - findings are logged only");
    }

    let inspector = Arc::new(RequestInspector::new(
        TrustPolicy::new(&config.frontend_url),
        config.block_mode,
    ));
    let metrics = Arc::new(MetricsCollector::new());

    let upstream_host = args
        .upstream_host
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let upstream_port = args.upstream_port.unwrap_or(8080);
    let upstream = Upstream {
        sni: args.upstream_sni.unwrap_or_else(|| upstream_host.clone()),
        host: upstream_host,
        port: upstream_port,
        tls: args.upstream_tls,
    };

    info!(
        "Upstream backend: {}:{} (tls: {})",
        upstream.host, upstream.port, upstream.tls
    );

    let shield_proxy = ShieldProxy::new(upstream.clone(), inspector, metrics, &config);

    let mut server = match Server::new(Some(Opt::default())) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to create server: {}", e);
            std::process::exit(1);
        }
    };
    server.bootstrap();

    let mut proxy_service = http_proxy_service(&server.configuration, shield_proxy);
    let listen_address = format!("{}:{}", args.listen_addr, args.listen_port);
    proxy_service.add_tcp(&listen_address);
    server.add_service(proxy_service);

    // Built-in Prometheus service serves the default registry
    let metrics_address = format!("{}:{}", args.listen_addr, args.metrics_port);
    let mut prometheus_service_http =
        pingora::services::listening::Service::prometheus_http_service();
    prometheus_service_http.add_tcp(&metrics_address);
    server.add_service(prometheus_service_http);

    info!("Tamper Shield:   http://{}", listen_address);
    info!("Metrics:         http://{}/metrics", metrics_address);
    info!("Upstream:        {}:{}", upstream.host, upstream.port);
    info!("Frontend:        {}", config.frontend_url);
    if config.beacon.enabled {
        info!("Beacon:          {}", config.beacon.path);
    }
    if config.not_found_page {
        info!("404 monitoring page enabled");
    }

    server.run_forever();
}
