//! Beeatm CLI - serve the ATM over HTTP, or run a scripted demo
//!
//!   beeatm serve [--port N] [--rpc URL | --simulate]
//!   beeatm demo
//!   beeatm config
//!
//! Output is JSON: pretty on a terminal, compact otherwise.

use anyhow::{anyhow, Context};
use beeatm::logging::init_logging;
use beeatm::{Address, Client, ClientConfig, FixedHost, HttpHost, OperationPolicy, SimWallet, U256};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{debug, info};

/// First unlocked account of a local development node; owns the simulated ledger.
const SIM_OWNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("beeatm {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("serve") => cmd_serve(&opts),
        Some("demo") => cmd_demo(&opts),
        Some("config") => cmd_config(&opts),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || std::io::stdout().is_terminal();
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    port: Option<u16>,
    rpc_url: Option<String>,
    policy: Option<String>,
    simulate: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        // Load .env file if present
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let value = value.trim().trim_matches('"');
                    if !value.is_empty() && env::var(key.trim()).is_err() {
                        env::set_var(key.trim(), value);
                    }
                }
            }
        }

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--pretty" => opts.pretty = true,
                "--simulate" | "-s" => opts.simulate = true,
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        opts.port = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--rpc" | "-r" => {
                    if i + 1 < args.len() {
                        opts.rpc_url = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--policy" => {
                    if i + 1 < args.len() {
                        opts.policy = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        opts
    }
}

/// Config file and `BEEATM_*` variables, then command-line overrides.
fn load_config(opts: &ParsedArgs) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::load().context("Failed to load config")?;
    if let Some(port) = opts.port {
        config = config.with_port(port);
    }
    if let Some(url) = opts.rpc_url.as_deref() {
        config = config.with_rpc_url(url);
    }
    if let Some(policy) = opts.policy.as_deref() {
        let policy = OperationPolicy::from_str(policy).ok_or_else(|| anyhow!("Unknown policy: {}", policy))?;
        config = config.with_policy(policy);
    }
    Ok(config)
}

fn simulated_client(config: ClientConfig) -> anyhow::Result<(Client, Arc<SimWallet>)> {
    let owner = Address::parse(SIM_OWNER)?;
    let wallet = Arc::new(SimWallet::new(owner).with_contract(config.ledger.address.clone()));
    let client = Client::new(FixedHost::new(wallet.clone()), config);
    Ok((client, wallet))
}

fn print_usage() {
    println!(
        r#"beeatm - wallet-connected ATM for a ledger contract

USAGE:
    beeatm <command> [options]

COMMANDS:
    serve                   Start HTTP server
    demo                    Run a scripted session against the simulator
    config                  Print the effective configuration

SERVER OPTIONS:
    --port, -p <port>       Server port (default: 8080, env: BEEATM_PORT)
    --rpc, -r <url>         JSON-RPC endpoint of a development node (env: BEEATM_RPC_URL)
    --simulate, -s          Use the in-process simulated wallet
    --policy <policy>       single-flight|concurrent (env: BEEATM_POLICY)

OUTPUT OPTIONS:
    --pretty                Pretty-print JSON
    --version, -V           Print version

ENVIRONMENT:
    BEEATM_ROOT             Directory holding config.json
    BEEATM_LEDGER_ADDRESS   Ledger contract address
    BEEATM_LOG_JSON=1       JSON log lines on stderr
    BEEATM_LOG, RUST_LOG    Log filter (default: info,beeatm=debug,hyper=warn,reqwest=warn)

ROUTES:
    GET  /health            → {{status, service}}
    GET  /state             → {{status, prompt, session, contract, ledger, transactions}}
    GET  /transactions      → {{transactions, lines, count}}
    POST /connect           ← {{}}
    POST /disconnect        ← {{}}
    POST /balance           ← {{}}
    POST /deposit           ← {{amount}}
    POST /withdraw          ← {{amount}}
"#
    );
}

fn cmd_config(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = load_config(opts)?;
    Ok(json!({
        "path": beeatm::client::config_path(),
        "config": config,
    }))
}

fn cmd_serve(opts: &ParsedArgs) -> anyhow::Result<Value> {
    use beeatm::{create_router, install_signal_handlers};

    let config = load_config(opts)?;
    let port = config.port;
    let simulate = opts.simulate || env::var("BEEATM_SIMULATE").is_ok_and(|v| v == "1");
    let client = if simulate {
        info!("Using simulated wallet (owner {})", SIM_OWNER);
        simulated_client(config)?.0
    } else {
        let host = HttpHost::new(config.rpc_url.clone());
        Client::new(host, config)
    };
    let client = Arc::new(client);

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;

    rt.block_on(async {
        let shutdown = install_signal_handlers();

        let status = client.load().await;
        info!(?status, "Wallet discovery finished");

        let router = create_router(client.clone());
        let addr = format!("0.0.0.0:{}", port);

        info!("Beeatm server listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /health              - Health check");
        info!("  GET  /state               - Client snapshot");
        info!("  POST /deposit {{amount}}    - Deposit and wait for confirmation");
        debug!("  POST /withdraw {{amount}}   - Withdraw and wait for confirmation");

        let listener = tokio::net::TcpListener::bind(&addr).await
            .with_context(|| format!("Failed to bind {}", addr))?;

        let mut shutdown_rx = shutdown.subscribe();
        tokio::select! {
            result = axum::serve(listener, router) => {
                result.context("Server error")?;
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping server...");
            }
        }

        Ok::<(), anyhow::Error>(())
    })?;

    Ok(json!({"status": "stopped", "transactions": client.transactions().len()}))
}

/// Connect, deposit, withdraw, then attempt an overdraw against the simulator.
fn cmd_demo(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = load_config(opts)?.with_poll_interval_ms(10);
    let (client, wallet) = simulated_client(config)?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;

    rt.block_on(async {
        let mut steps = Vec::new();
        steps.push(json!({"load": client.load().await}));

        let session = client.connect().await.context("connect")?;
        steps.push(json!({"connect": session}));

        let confirmation = client.deposit(U256::from(5)).await.context("deposit")?;
        steps.push(json!({"deposit": confirmation}));

        let confirmation = client.withdraw(U256::from(3)).await.context("withdraw")?;
        steps.push(json!({"withdraw": confirmation}));

        match client.withdraw(U256::from(100)).await {
            Ok(c) => steps.push(json!({"overdraw": c})),
            Err(e) => steps.push(json!({"overdraw": {"error": e.kind(), "message": e.to_string()}})),
        }

        let balance = client.query_balance().await.context("balance")?;
        steps.push(json!({"balance": balance.to_string()}));

        let lines: Vec<String> = client.transactions().iter().map(|r| r.display_line()).collect();
        Ok::<Value, anyhow::Error>(json!({
            "steps": steps,
            "history": lines,
            "chain_balance": wallet.balance().to_string(),
            "snapshot": client.snapshot(),
        }))
    })
}
