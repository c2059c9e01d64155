use std::time::Duration;

use clap::{Args, Subcommand};
use serde_json::json;

pub mod config;
pub mod definitions;
pub mod resolver;
pub mod rpc;
pub mod stdio;
pub mod tools;

use config::{Mapsets, ResolverConfig, ToolLimits};
use resolver::GaluchatClient;
use rpc::{MCP_SERVER_NAME, McpServer};
use tools::ToolDispatcher;

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the Galuchat MCP server over stdio
    Serve(McpServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct McpServeArgs {
    /// Galuchat provider base URL
    #[arg(long, env = "GALUCHAT_API_URL")]
    pub api_url: String,
    /// Provider request timeout in milliseconds
    #[arg(long, env = "GALUCHAT_TIMEOUT_MS", default_value_t = config::DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,
    /// Quantization step in degrees
    #[arg(long, env = "GALUCHAT_UNIT", default_value_t = config::DEFAULT_UNIT)]
    pub unit: f64,
    #[arg(long, env = "GALUCHAT_MAPSET_ADMIN", default_value = "ma10000")]
    pub mapset_admin: String,
    #[arg(long, env = "GALUCHAT_MAPSET_ESTAT", default_value = "estatremap10000")]
    pub mapset_estat: String,
    #[arg(long, env = "GALUCHAT_MAPSET_JARL", default_value = "ma10000")]
    pub mapset_jarl: String,
    /// Largest batch accepted per tool call
    #[arg(long, env = "GALUCHAT_MAX_POINTS", default_value_t = config::DEFAULT_MAX_POINTS)]
    pub max_points: usize,
}

impl McpServeArgs {
    pub fn resolver_config(&self) -> Result<ResolverConfig, config::ConfigError> {
        if !(self.unit.is_finite() && self.unit > 0.0) {
            return Err(config::ConfigError::Invalid {
                var: "GALUCHAT_UNIT",
                value: self.unit.to_string(),
            });
        }
        let mut resolver = ResolverConfig::new(self.api_url.clone());
        if resolver.api_url.is_empty() {
            return Err(config::ConfigError::Missing("GALUCHAT_API_URL"));
        }
        resolver.timeout = Duration::from_millis(self.timeout_ms.max(1));
        resolver.unit = self.unit;
        resolver.mapsets = Mapsets {
            admin: self.mapset_admin.clone(),
            estat: self.mapset_estat.clone(),
            jarl: self.mapset_jarl.clone(),
        };
        Ok(resolver)
    }

    pub fn tool_limits(&self) -> ToolLimits {
        ToolLimits {
            max_points: self.max_points.max(1),
        }
    }
}

/// Build the dispatcher shared by the HTTP service and the stdio server.
pub fn build_dispatcher(
    resolver: ResolverConfig,
    limits: ToolLimits,
) -> Result<ToolDispatcher, String> {
    let client = GaluchatClient::new(resolver)
        .map_err(|e| format!("Failed to build provider client: {e}"))?;
    Ok(ToolDispatcher::new(client, limits))
}

pub async fn run(command: McpCommands) -> i32 {
    match command {
        McpCommands::Serve(args) => {
            let server = match args
                .resolver_config()
                .map_err(|e| e.to_string())
                .and_then(|resolver| build_dispatcher(resolver, args.tool_limits()))
            {
                Ok(dispatcher) => McpServer::new(dispatcher),
                Err(err) => {
                    eprintln!("{}", json!({ "error": "mcp_config_error", "message": err }));
                    return 1;
                }
            };

            tracing::info!(
                event = "mcp_stdio_start",
                server = MCP_SERVER_NAME,
                version = env!("CARGO_PKG_VERSION"),
                max_points = server.dispatcher().limits().max_points,
                "Serving MCP over stdio"
            );

            match stdio::serve_stdio(&server).await {
                Ok(()) => 0,
                Err(err) => {
                    eprintln!("{}", json!({ "error": "mcp_server_error", "message": err }));
                    1
                }
            }
        }
    }
}
