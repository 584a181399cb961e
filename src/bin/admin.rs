use std::collections::VecDeque;

use attested_rewards::infra::RewardStore;
use attested_rewards::server::seed_pool_from_file;
use attested_rewards::SqliteRewardStore;

fn print_help() {
    eprintln!(
        "\
attested-rewards-admin

USAGE:
  attested-rewards-admin <command> [options]

COMMANDS:
  migrate             Run database migrations
  load-pool           Seed the reward pool from a links file
  pool-status         Show remaining pool inventory
  list-assignments    List all reward assignments

COMMON OPTIONS:
  --database <path>   (defaults to env DATABASE_PATH, then rewards.db)

load-pool OPTIONS:
  --file <path>       (required) Newline-separated reward links
"
    );
}

struct CommonOptions {
    database_path: String,
}

fn parse_common(args: &mut VecDeque<String>) -> anyhow::Result<(CommonOptions, VecDeque<String>)> {
    let mut database_path = None;
    let mut rest = VecDeque::new();

    while let Some(arg) = args.pop_front() {
        match arg.as_str() {
            "--database" => {
                let value = args
                    .pop_front()
                    .ok_or_else(|| anyhow::anyhow!("--database requires a value"))?;
                database_path = Some(value);
            }
            _ => rest.push_back(arg),
        }
    }

    let database_path = database_path
        .or_else(|| std::env::var("DATABASE_PATH").ok())
        .unwrap_or_else(|| "rewards.db".to_string());

    Ok((CommonOptions { database_path }, rest))
}

async fn open_store(options: &CommonOptions) -> anyhow::Result<SqliteRewardStore> {
    let store = SqliteRewardStore::from_path(&options.database_path).await?;
    store.initialize().await?;
    Ok(store)
}

async fn cmd_migrate(options: CommonOptions) -> anyhow::Result<()> {
    open_store(&options).await?;
    println!("Migrations applied to {}", options.database_path);
    Ok(())
}

async fn cmd_load_pool(options: CommonOptions, mut rest: VecDeque<String>) -> anyhow::Result<()> {
    let mut file = None;
    while let Some(arg) = rest.pop_front() {
        match arg.as_str() {
            "--file" => {
                file = Some(
                    rest.pop_front()
                        .ok_or_else(|| anyhow::anyhow!("--file requires a value"))?,
                );
            }
            other => anyhow::bail!("unknown option: {other}"),
        }
    }
    let file = file.ok_or_else(|| anyhow::anyhow!("--file is required"))?;

    let store = open_store(&options).await?;
    let inserted = seed_pool_from_file(&store, &file).await?;
    let remaining = store.pool_size().await?;
    println!("Inserted {inserted} new entries; pool now holds {remaining}");
    Ok(())
}

async fn cmd_pool_status(options: CommonOptions) -> anyhow::Result<()> {
    let store = open_store(&options).await?;
    let remaining = store.pool_size().await?;
    let assigned = store.list_assignments().await?.len();
    println!("Pool remaining: {remaining}");
    println!("Assigned:       {assigned}");
    Ok(())
}

async fn cmd_list_assignments(options: CommonOptions) -> anyhow::Result<()> {
    let store = open_store(&options).await?;
    let assignments = store.list_assignments().await?;

    if assignments.is_empty() {
        println!("No assignments");
        return Ok(());
    }

    for assignment in assignments {
        println!(
            "{}\t{}\t{}",
            assignment.assigned_at.to_rfc3339(),
            assignment.identity,
            assignment.link
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: VecDeque<String> = std::env::args().skip(1).collect();

    let Some(command) = args.pop_front() else {
        print_help();
        anyhow::bail!("no command given");
    };

    let (options, rest) = parse_common(&mut args)?;

    match command.as_str() {
        "migrate" => cmd_migrate(options).await,
        "load-pool" => cmd_load_pool(options, rest).await,
        "pool-status" => cmd_pool_status(options).await,
        "list-assignments" => cmd_list_assignments(options).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}");
        }
    }
}
