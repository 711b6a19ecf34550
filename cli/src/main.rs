mod client;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use client::NodeClient;
use gradeseal_config::GradesealConfig;
use gradeseal_handle::Category;
use gradeseal_identity::Identity;
use gradeseal_keypair::Keypair;
use gradeseal_privacy::EncryptionPipeline;
use gradeseal_reader::{DecryptPolicy, DecryptionFlow, HttpOracle, SystemClock};
use gradeseal_transaction::LedgerCall;

#[derive(Parser, Debug)]
#[command(name = "gradeseal")]
#[command(about = "Confidential per-subject grades", long_about = None)]
struct Cli {
    /// Ledger node URL
    #[arg(long, global = true, env = "GS_NODE_URL")]
    node: Option<String>,

    /// Decryption oracle URL
    #[arg(long, global = true)]
    oracle: Option<String>,

    /// Key file to sign with
    #[arg(long, global = true, env = "GS_KEYPAIR")]
    keypair: Option<PathBuf>,

    /// Config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new key file
    Genkey {
        /// Where to write it (defaults to the configured key file)
        path: Option<PathBuf>,
    },
    /// Show this key's address and the ledger's deployment
    Address,
    /// Store a grade (writer only)
    Set {
        /// Student address
        owner: String,
        /// Subject id (0-4) or name
        category: String,
        /// Grade, 0-100
        grade: i64,
    },
    /// Show the handle stored for a student and subject
    Get {
        owner: String,
        category: String,
    },
    /// Decrypt a stored grade (owner or granted viewer)
    Decrypt {
        owner: String,
        category: String,
    },
    /// Let another address decrypt one of your grades
    Allow {
        category: String,
        viewer: String,
    },
    /// Print a sample config file
    Config,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => GradesealConfig::load_from(path)?,
        None => GradesealConfig::load()?,
    };
    let node_url = cli.node.clone().unwrap_or_else(|| config.node_url());
    let oracle_url = cli.oracle.clone().unwrap_or_else(|| config.oracle.url.clone());
    let key_path = keypair_path(&cli, &config)?;
    let node = NodeClient::new(&node_url);

    match cli.command {
        Command::Genkey { path } => genkey(path.as_deref().unwrap_or(&key_path)),
        Command::Address => address(&node, &key_path).await,
        Command::Set {
            owner,
            category,
            grade,
        } => {
            let owner = parse_address(&owner)?;
            let category = parse_category(&category)?;
            set(&node, &key_path, owner, category, grade).await
        }
        Command::Get { owner, category } => {
            let owner = parse_address(&owner)?;
            let category = parse_category(&category)?;
            get(&node, owner, category).await
        }
        Command::Decrypt { owner, category } => {
            let owner = parse_address(&owner)?;
            let category = parse_category(&category)?;
            decrypt(&node, &oracle_url, &config, &key_path, owner, category).await
        }
        Command::Allow { category, viewer } => {
            let category = parse_category(&category)?;
            let viewer = parse_address(&viewer)?;
            allow(&node, &key_path, category, viewer).await
        }
        Command::Config => {
            print!("{}", GradesealConfig::generate_sample());
            Ok(())
        }
    }
}

fn keypair_path(cli: &Cli, config: &GradesealConfig) -> Result<PathBuf> {
    if let Some(path) = &cli.keypair {
        return Ok(path.clone());
    }
    if let Some(path) = &config.client.keypair_path {
        return Ok(PathBuf::from(path));
    }
    GradesealConfig::default_keypair_path()
        .ok_or_else(|| anyhow!("Could not determine home directory; pass --keypair"))
}

fn parse_address(text: &str) -> Result<Identity> {
    text.parse()
        .map_err(|_| anyhow!("Invalid address {text:?}: expected 0x followed by 40 hex digits"))
}

/// Accepts a subject id or its name, case-insensitively.
fn parse_category(text: &str) -> Result<Category> {
    if let Ok(id) = text.parse::<u8>() {
        return Ok(Category::try_from(id)?);
    }
    Category::ALL
        .into_iter()
        .find(|c| c.name().eq_ignore_ascii_case(text))
        .ok_or_else(|| {
            let names: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
            anyhow!("Unknown subject {text:?} (expected 0-4 or one of {})", names.join(", "))
        })
}

fn load_keypair(path: &Path) -> Result<Keypair> {
    Keypair::from_file(path).with_context(|| {
        format!(
            "Cannot load key file {} (create one with `gradeseal genkey`)",
            path.display()
        )
    })
}

fn genkey(path: &Path) -> Result<()> {
    println!("🔐 Generating new keypair...");
    let key = Keypair::new_random();
    key.write_file(path)?;

    println!("✅ Wrote new keypair to {}", path.display());
    println!("🔑 Address: {}", key.identity());
    Ok(())
}

async fn address(node: &NodeClient, key_path: &Path) -> Result<()> {
    let key = load_keypair(key_path)?;
    println!("Address  : {}", key.identity());

    match node.info().await {
        Ok(info) => {
            println!("Node     : {}", node.base_url());
            println!("Contract : {}", info.contract);
            println!("Writer   : {}", info.writer);
            println!("Chain id : {}", info.chain_id);
            if info.writer == key.identity() {
                println!("This key is the ledger writer.");
            }
        }
        Err(e) => log::warn!("Node unavailable: {:#}", e),
    }
    Ok(())
}

async fn set(
    node: &NodeClient,
    key_path: &Path,
    owner: Identity,
    category: Category,
    grade: i64,
) -> Result<()> {
    let key = load_keypair(key_path)?;
    let info = node.info().await?;

    let pipeline = EncryptionPipeline::new(info.network_key()?);
    let input = pipeline.encrypt_grade(grade, info.contract, key.identity())?;
    let call = LedgerCall::SetGrade {
        owner,
        category: category.id(),
        input,
    };
    let receipt = node
        .submit(&key.sign_call(call, &info.contract, info.chain_id))
        .await?;

    let handle = receipt
        .handle
        .ok_or_else(|| anyhow!("Node accepted the write but returned no handle"))?;
    println!("✅ {} grade for {} stored by {}", category, owner, receipt.caller);
    println!("Handle: {}", handle);
    Ok(())
}

async fn get(node: &NodeClient, owner: Identity, category: Category) -> Result<()> {
    let record = node.record(&owner, category.id()).await?;
    if record.exists {
        println!("{}", record.handle);
    } else {
        println!("Not set");
    }
    Ok(())
}

async fn decrypt(
    node: &NodeClient,
    oracle_url: &str,
    config: &GradesealConfig,
    key_path: &Path,
    owner: Identity,
    category: Category,
) -> Result<()> {
    let key = load_keypair(key_path)?;
    let info = node.info().await?;
    let record = node.record(&owner, category.id()).await?;
    if !record.exists {
        println!("Not set");
        return Ok(());
    }

    let policy = DecryptPolicy {
        duration_days: config.decrypt.duration_days,
        request_timeout: Duration::from_millis(config.decrypt.request_timeout_ms),
        max_retries: config.decrypt.max_retries,
        retry_base: Duration::from_millis(config.decrypt.retry_base_ms),
    };
    let oracle = HttpOracle::new(oracle_url, policy.request_timeout)?;
    let flow = DecryptionFlow::new(
        oracle,
        SystemClock,
        info.decryption_domain,
        info.contract,
        policy,
    );

    let value = flow.decrypt(record.handle, &key).await?;
    println!("{} grade for {}: {}", category, owner, value);
    Ok(())
}

async fn allow(node: &NodeClient, key_path: &Path, category: Category, viewer: Identity) -> Result<()> {
    let key = load_keypair(key_path)?;
    if viewer == key.identity() {
        bail!("You can always decrypt your own grades");
    }
    let info = node.info().await?;
    let call = LedgerCall::AllowViewer {
        category: category.id(),
        viewer,
    };
    node.submit(&key.sign_call(call, &info.contract, info.chain_id))
        .await?;

    println!("✅ {} may now decrypt your {} grade", viewer, category);
    Ok(())
}
