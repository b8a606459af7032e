// Auction desk entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open the document store, seed first-run documents
// 4. Run the auctioneer command loop on stdin
//
// Domain errors (bad bid, no lot, busy) are printed and the loop continues;
// only storage failures terminate the process.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use auction_desk::auction::engine::AuctionEngine;
use auction_desk::auction::model::Player;
use auction_desk::config;
use auction_desk::error::AuctionError;
use auction_desk::store::Store;

fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Auction desk starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {} teams, {} players, {} users",
        config.teams.len(),
        config.players.len(),
        config.users.len()
    );

    // 3. Open the document store and seed anything never written
    let db_path = config.database_path()?;
    let store = Arc::new(
        Store::open(db_path.to_str().context("database path is not valid UTF-8")?)
            .context("failed to open document store")?,
    );
    info!("Document store opened at {}", db_path.display());

    let engine = AuctionEngine::new(store, config.engine.lock_timeout());
    engine.seed(&config.users, &config.seed_teams(), &config.seed_players())?;

    // 4. Command loop
    println!("auction desk ready. type `help` for commands.");
    run_repl(&engine)?;

    info!("Auction desk shut down cleanly");
    Ok(())
}

fn run_repl(engine: &AuctionEngine) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = parts.split_first() else {
            continue;
        };

        let result = dispatch(engine, command, args);
        match result {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) if err.is_fatal() => {
                return Err(anyhow::Error::from(err).context("storage failure"));
            }
            Err(err) => println!("error: {err}"),
        }
    }
    Ok(())
}

/// Run one command. Returns `Ok(true)` when the loop should exit.
fn dispatch(engine: &AuctionEngine, command: &str, args: &[&str]) -> Result<bool, AuctionError> {
    match command {
        "players" => {
            for player in engine.available_players()? {
                print_player(&player);
            }
        }
        "state" => print_state(engine)?,
        "sold" => {
            for record in engine.sold_records()? {
                println!(
                    "  {} -> {} for {} at {}",
                    record.player.name, record.team_name, record.final_price, record.sold_at
                );
            }
        }
        "select" => {
            let Some(id) = args.first().and_then(|s| s.parse().ok()) else {
                println!("usage: select <player-id>");
                return Ok(false);
            };
            let player = engine.select_lot(id)?;
            println!("on the block: {} (base {})", player.name, player.base_price);
        }
        "bid" => {
            let [username, password, id, amount] = args else {
                println!("usage: bid <username> <password> <player-id> <amount>");
                return Ok(false);
            };
            let (Ok(id), Ok(amount)) = (id.parse(), amount.parse()) else {
                println!("usage: bid <username> <password> <player-id> <amount>");
                return Ok(false);
            };
            let user = engine.authenticate(username, password)?;
            let accepted = engine.place_bid(&user.username, &user.team_name, id, amount)?;
            println!("bid accepted: {} at {}", accepted.team_name, accepted.amount);
        }
        "sell" => {
            let settlement = engine.sell_current()?;
            println!(
                "sold: {} to {} for {}",
                settlement.player.name, settlement.sold_to, settlement.final_price
            );
        }
        "pass" => {
            engine.pass_current()?;
            println!("lot passed");
        }
        "rollback" => {
            engine.rollback_last()?;
            println!("last sale rolled back");
        }
        "reset" => {
            engine.reset_auction()?;
            println!("auction reset");
        }
        "help" => print_help(),
        "quit" | "exit" => return Ok(true),
        other => println!("unknown command `{other}`; type `help`"),
    }
    Ok(false)
}

fn print_state(engine: &AuctionEngine) -> Result<(), AuctionError> {
    let view = engine.state_view()?;
    match &view.current_player {
        Some(player) => {
            println!(
                "on the block: {} (base {}, min increment {})",
                player.name, player.base_price, view.min_increment
            );
            match view.highest_bid {
                Some(amount) => println!("  highest bid: {} by {}", amount, view.last_bid_team),
                None => println!("  no bids yet"),
            }
            for event in &view.bid_history {
                println!("    {} ({}) bid {}", event.bidder, event.team_name, event.amount);
            }
        }
        None if !view.sold_to.is_empty() => println!("last lot sold to {}", view.sold_to),
        None => println!("no lot selected"),
    }
    for team in &view.teams {
        println!(
            "  {}: purse {}/{} ({} players)",
            team.team_name,
            team.purse,
            team.default_purse,
            team.players.len()
        );
    }
    Ok(())
}

fn print_player(player: &Player) {
    println!(
        "  [{}] {} ({}, {}, grade {}) base {}",
        player.id, player.name, player.role, player.age, player.grade, player.base_price
    );
}

fn print_help() {
    println!("commands:");
    println!("  players                                  list unsold players");
    println!("  state                                    show the live auction state");
    println!("  sold                                     show completed sales");
    println!("  select <player-id>                       put a player up for auction");
    println!("  bid <user> <password> <player-id> <amt>  place a bid");
    println!("  sell                                     settle the lot to the high bid");
    println!("  pass                                     skip the current lot");
    println!("  rollback                                 undo the most recent sale");
    println!("  reset                                    reinitialize the whole auction");
    println!("  quit                                     exit");
}

/// Initialize tracing to log to a file (the terminal belongs to the REPL).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("auction-desk.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auction_desk=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
