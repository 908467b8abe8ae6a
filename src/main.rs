//! wirecall - text-framed RPC server
//!
//! Serves registered methods over a separator-framed TCP protocol with
//! optional schema validation of request payloads.

use serde_json::{json, Map};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wirecall_schema::CompiledSchema;
use wirecall_server::{Config, Dispatcher, Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if WIRECALL_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("WIRECALL_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if std::env::var("WIRECALL_CONFIG").is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    tracing::info!("Starting wirecall server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Max message size: {} bytes", config.protocol.max_message_size);

    // Compile the annotation schema if one is configured. A broken schema
    // is fatal; serving with unvalidated methods would hide the defect.
    let schema = match config.schema.load()? {
        Some(raw) => match CompiledSchema::compile(&raw) {
            Ok(compiled) => {
                tracing::info!(
                    "  Schema: {} methods, {} objects, {} enums",
                    compiled.methods.len(),
                    compiled.objects.len(),
                    compiled.enums.len()
                );
                Some(Arc::new(compiled))
            }
            Err(e) => {
                let fault = e.fault();
                tracing::error!("Schema compilation failed: {} ({})", e, fault.error_code);
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!("  Schema: none (payloads not validated)");
            None
        }
    };

    let mut dispatcher = Dispatcher::new();
    register_builtin_methods(&mut dispatcher)?;
    if let Some(schema) = schema {
        dispatcher = dispatcher.with_schema(schema);
    }

    let server = Arc::new(Server::new(
        ServerConfig::from_config(&config),
        dispatcher,
    ));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Registers the built-in demonstration methods.
fn register_builtin_methods(
    dispatcher: &mut Dispatcher,
) -> Result<(), wirecall_server::ServerError> {
    dispatcher.register("ping", |request, _session| async move {
        let mut payload = Map::new();
        payload.insert("pong".to_string(), json!(true));
        if let Some(n) = request.payload.get("n") {
            payload.insert("n".to_string(), n.clone());
        }
        Ok(payload)
    })?;

    dispatcher.register("echo", |request, _session| async move { Ok(request.payload) })?;

    Ok(())
}
