use std::sync::Arc;

use colored::Colorize;
use serde_json::json;

use refhub_client::{Client, NullHandler};
use refhub_protocol::{methods, RefInfoResult, RefListItem};
use refhub_server::{ExtensionRegistry, Hub, Server, ServerConfig};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        match cli.command {
            Command::Serve(args) => cmd_serve(args).await,
            Command::Ping(args) => cmd_ping(args).await,
            Command::Repos(args) => cmd_repos(args).await,
            Command::Refs(args) => cmd_refs(args).await,
            Command::Ref(args) => cmd_ref(args).await,
        }
    })
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.private {
        config.is_private = true;
    }

    let hub = Hub::new(config, ExtensionRegistry::new())?;
    let server = Server::bind(hub).await?;
    let mode = if server.hub().config().is_private {
        "private".yellow()
    } else {
        "public".green()
    };
    println!(
        "refhub listening on {} ({} mode)",
        server.local_addr()?.to_string().bold(),
        mode
    );
    server.serve().await?;
    Ok(())
}

async fn connect(endpoint: &str) -> anyhow::Result<Client> {
    let client = Client::connect(endpoint, Arc::new(NullHandler)).await?;
    client.initialize(None).await?;
    Ok(client)
}

async fn cmd_ping(args: PingArgs) -> anyhow::Result<()> {
    let client = connect(&args.endpoint).await?;
    let reply = client.ping().await?;
    println!("{} {} from {}", "✓".green().bold(), reply, args.endpoint.bold());
    Ok(())
}

async fn cmd_repos(args: ReposArgs) -> anyhow::Result<()> {
    let client = connect(&args.endpoint).await?;
    let repos: Vec<String> =
        serde_json::from_value(client.request(methods::REPO_LIST, None).await?)?;
    if repos.is_empty() {
        println!("No repos.");
    }
    for repo in repos {
        println!("{repo}");
    }
    Ok(())
}

async fn cmd_refs(args: RefsArgs) -> anyhow::Result<()> {
    let client = connect(&args.endpoint).await?;
    let items: Vec<RefListItem> = serde_json::from_value(
        client
            .request(methods::REF_LIST, Some(json!({"repo": args.repo})))
            .await?,
    )?;
    if items.is_empty() {
        println!("No refs in {}.", args.repo.bold());
    }
    for item in items {
        let watchers = if item.watchers.is_empty() {
            "no watchers".dimmed().to_string()
        } else {
            item.watchers.join(", ")
        };
        println!(
            "{}  base {}  {} ops  ({})",
            item.ref_name.yellow(),
            item.state.base.dimmed(),
            item.state.history_len(),
            watchers,
        );
    }
    Ok(())
}

async fn cmd_ref(args: RefArgs) -> anyhow::Result<()> {
    let client = connect(&args.endpoint).await?;
    let info: RefInfoResult = serde_json::from_value(
        client
            .request(
                methods::REF_INFO,
                Some(json!({"repo": args.repo, "ref": args.name, "fuzzy": true})),
            )
            .await?,
    )?;
    println!("{}", info.ref_name.yellow().bold());
    println!("  base:    {}", info.state.base);
    println!("  branch:  {}", info.state.branch);
    println!("  history: {} ops", info.state.history_len());
    Ok(())
}
