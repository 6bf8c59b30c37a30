//! `crossarb check-config`: validate a deployment before running it.

use anyhow::Result;
use clap::Args;
use crossarb_core::config_loader::DEFAULT_CONFIG_PATH;
use crossarb_core::{AppConfig, ConfigLoader};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct CheckConfigArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

pub fn check_config(args: &CheckConfigArgs) -> Result<()> {
    let config = ConfigLoader::load(&args.config)?;
    print!("{}", render(&config));
    Ok(())
}

/// Formats the effective settings as a plain-text report.
fn render(config: &AppConfig) -> String {
    let trading = &config.trading;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "exchange   {} ({} req/s)",
        config.exchange.api_url, config.exchange.requests_per_second
    );
    let _ = writeln!(out, "feed       {}", config.exchange.ws_url);
    let _ = writeln!(
        out,
        "timing     poll {}ms, buy timeout {}ms, balance refresh {}ms",
        trading.poll_interval_ms, trading.buy_timeout_ms, trading.balance_refresh_interval_ms
    );
    let _ = writeln!(
        out,
        "execution  pool {}, max placement errors {}",
        trading.client_pool_size, trading.max_placement_errors
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "pair", "min qty", "max qty", "min amt", "max amt", "threshold", "fee"
    );
    for entry in &config.pairs {
        let limits = &entry.limits;
        let _ = writeln!(
            out,
            "{:<8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
            entry.pair.to_string(),
            limits.min_order_quantity.to_string(),
            limits.max_order_quantity.to_string(),
            limits.min_order_amount.to_string(),
            limits.max_order_amount.to_string(),
            format!("{}bps", limits.profit_threshold_bps),
            format!("{}bps", limits.fee_rate_bps),
        );
    }
    out
}
