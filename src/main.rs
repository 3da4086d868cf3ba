// Pulse Market Engine - Market Simulator
// Randomized end-to-end run of the fee-governance + LMSR + settlement core

use rand::Rng;
use std::str::FromStr;

use pulse_market_engine::{
    lmsr_cost, AccountDirectory, AccountInfo, MarketEngine, MarketError, SettlementError,
    SettlementResult,
};

// ============================================================================
// CONFIG
// ============================================================================

/// Simulation knobs, read from the environment with the reference defaults
struct SimConfig {
    users: usize,
    options: usize,
    min_bet: f64,
    max_bet: f64,
    liquidity_b: f64,
    platform_bps: u16,
    validator_bps: u16,
    creator_bps: u16,
    /// Optional path for a JSON dump of the settlement result
    report_path: Option<String>,
}

impl SimConfig {
    fn from_env() -> Self {
        Self {
            users: env_or("SIM_USERS", 1000),
            options: env_or("SIM_OPTIONS", 4),
            min_bet: env_or("SIM_MIN_BET", 10.0),
            max_bet: env_or("SIM_MAX_BET", 100.0),
            liquidity_b: env_or("SIM_LIQUIDITY_B", 100.0),
            platform_bps: env_or("SIM_PLATFORM_BPS", 500),
            validator_bps: env_or("SIM_VALIDATOR_BPS", 500),
            creator_bps: env_or("SIM_CREATOR_BPS", 10),
            report_path: std::env::var("SIM_REPORT").ok(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// RANDOM BETTOR BEHAVIOR
// ============================================================================

/// Normally distributed sample via Box-Muller
fn random_normal(rng: &mut impl Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + z * std_dev
}

/// Option choice skewed toward the low indices (crowd herding)
fn biased_choice(rng: &mut impl Rng, num_options: usize) -> usize {
    let r: f64 = rng.gen();
    ((r.powf(1.5) * num_options as f64) as usize).min(num_options - 1)
}

// ============================================================================
// SIMULATION
// ============================================================================

fn main() {
    tracing_subscriber::fmt().init();

    if let Err(e) = run() {
        eprintln!("❌ Simulation failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n═══════════════════════════════════════════════");
    println!("     🎲 Pulse Market Simulator");
    println!("═══════════════════════════════════════════════\n");

    let cfg = SimConfig::from_env();
    println!(
        "⚙️  {} users | {} options | bets {}-{} | b = {} | fees {}/{}/{} bps",
        cfg.users,
        cfg.options,
        cfg.min_bet,
        cfg.max_bet,
        cfg.liquidity_b,
        cfg.platform_bps,
        cfg.validator_bps,
        cfg.creator_bps
    );

    // Admin path: deployer initializes the registry and sets the rates
    let directory = AccountDirectory::new();
    let deployer = AccountInfo::from(directory.deployer()).address;
    println!("🔑 Deployer: {}...", &deployer[..14]);
    let engine = MarketEngine::new(&deployer);
    engine.initialize_global(&deployer)?;
    engine.set_global_fees(&deployer, cfg.platform_bps, cfg.validator_bps, cfg.creator_bps)?;

    let outcomes: Vec<String> = (1..=cfg.options).map(|i| format!("Option {}", i)).collect();
    let market_id = "sim_pool";
    engine.create_market(market_id, "Simulated pool", outcomes, cfg.liquidity_b)?;

    // Stake phase: every user quotes the live LMSR price when betting
    let mut rng = rand::thread_rng();
    let mean = (cfg.min_bet + cfg.max_bet) / 2.0;
    let std_dev = (cfg.max_bet - cfg.min_bet) / 3.0;

    for i in 0..cfg.users {
        let choice = biased_choice(&mut rng, cfg.options);
        let amount = random_normal(&mut rng, mean, std_dev).clamp(cfg.min_bet, cfg.max_bet);
        engine.place_bet(market_id, &format!("user_{:04}", i), choice, amount)?;
    }

    let market = engine.market(market_id)?;
    let prices = market.prices()?;
    let exposure = lmsr_cost(&market.stakes, market.liquidity_b)?;

    println!("\n📊 Pool after {} bets:", market.bets.len());
    for (i, label) in market.outcomes.iter().enumerate() {
        println!(
            "   {:10} stake {:>12.2}  price {:.4}",
            label, market.stakes[i], prices[i]
        );
    }
    println!("   Total pool: {:.2}", market.total_pool());
    println!("   LMSR treasury exposure: {:.2}", exposure);

    // Resolution: random winner, settled through the real engine
    let winning = rng.gen_range(0..cfg.options);
    println!("\n🏁 Winning option: {}", winning + 1);

    match engine.settle_market(market_id, winning) {
        Ok(result) => {
            print_report(&result);
            if let Some(path) = &cfg.report_path {
                let json = serde_json::to_string_pretty(&result)?;
                std::fs::write(path, json)?;
                println!("💾 Settlement report written to {}", path);
            }
        }
        Err(MarketError::Settlement(SettlementError::NoWinners)) => {
            // Caller policy for the empty-winner edge: refund every stake
            println!("⚠️  No bets on the winning option - applying refund policy");
            let market = engine.market(market_id)?;
            let refunded: f64 = market.bets.iter().map(|b| b.amount).sum();
            println!(
                "💸 Refunded {:.2} across {} bets, no fees taken",
                refunded,
                market.bets.len()
            );
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn print_report(result: &SettlementResult) {
    let total_users = result.outcomes.len();
    let winners = result.winner_count();
    let avg_roi: f64 = result
        .outcomes
        .iter()
        .map(|o| o.payout / o.amount - 1.0)
        .sum::<f64>()
        / total_users as f64;
    let avg_profit: f64 =
        result.outcomes.iter().map(|o| o.profit).sum::<f64>() / total_users as f64;

    println!(
        "\n✅ Settled at {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("   Platform fee:  {:>12.2}", result.platform_fee);
    println!("   Validator fee: {:>12.2}", result.validator_fee);
    println!("   Creator fee:   {:>12.2}", result.creator_fee);
    println!("   Prize pool:    {:>12.2}", result.prize_pool);
    println!(
        "   Winners: {} | Losers: {} | Avg ROI: {:.2}% | Avg profit: {:.2}",
        winners,
        total_users - winners,
        avg_roi * 100.0,
        avg_profit
    );

    let check = &result.conservation;
    println!(
        "🔎 Integrity: distributed {:.2} of {:.2}, diff {:+.6} → {}",
        check.distributed,
        check.total_pool,
        check.diff,
        if check.ok { "fully paid" } else { "VIOLATION" }
    );
}
