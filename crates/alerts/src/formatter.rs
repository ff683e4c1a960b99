//! Telegram HTML rendering for alerts, the started notice and the daily digest.
//!
//! Every renderer returns `None` for an empty category so callers can
//! forward the result straight to the delivery queue.

use chrono::NaiveDate;
use rate_monitor_core::{
    bps_to_percent, format_usd, group_by_chain, utilization_percent, AlertRef, AlertSet,
    HighUtilization, NewAsset, RateChange, RewardChange, Snapshot, Thresholds, TvlMove,
};
use std::time::Duration;
use teloxide::utils::html::escape;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

/// Max liquidity rows per chain in the daily digest.
const DIGEST_LIQUIDITY_ROWS: usize = 15;

fn header(title: &str) -> String {
    format!("<b>{}</b>\n{}\n\n", title, RULE)
}

fn arrow(change: f64) -> &'static str {
    if change > 0.0 {
        "UP"
    } else {
        "DOWN"
    }
}

/// `+12.3%` / `-4.0%`.
fn signed_percent(change: f64) -> String {
    let sign = if change > 0.0 { "+" } else { "" };
    format!("{}{:.1}%", sign, change)
}

/// Threshold percentages without trailing zeros: `10`, `7.5`.
fn plain_percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn every(interval: Duration) -> String {
    let secs = interval.as_secs();
    match secs {
        3600 => "hour".to_string(),
        s if s > 0 && s % 3600 == 0 => format!("{} hours", s / 3600),
        60 => "minute".to_string(),
        s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{} seconds", s),
    }
}

pub fn render_rate_changes(alerts: &[RateChange]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }
    let mut html = header("RATE CHANGE ALERTS");
    for (chain, items) in group_by_chain(alerts) {
        html.push_str(&format!("<b>[{}]</b>\n", escape(chain)));
        for a in items {
            html.push_str(&format!(
                "  [{}] <b>{}</b> | {}\n",
                a.source.tag(),
                escape(&a.symbol),
                a.metric
            ));
            html.push_str(&format!(
                "  {} -> {} ({} {:.1}%)\n\n",
                bps_to_percent(a.prev_bps),
                bps_to_percent(a.curr_bps),
                arrow(a.change_percent),
                a.change_percent.abs()
            ));
        }
    }
    Some(html)
}

pub fn render_tvl_changes(alerts: &[TvlMove]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }
    let mut html = header("TVL CHANGE ALERTS");
    for (chain, items) in group_by_chain(alerts) {
        html.push_str(&format!("<b>[{}]</b>\n", escape(chain)));
        for a in items {
            let direction = if a.is_inflow() { "INFLOW" } else { "OUTFLOW" };
            html.push_str(&format!("  <b>{}</b>\n", escape(&a.label())));
            html.push_str(&format!(
                "  {}: {} ({})\n",
                direction,
                format_usd(a.delta()),
                signed_percent(a.change_percent)
            ));
            html.push_str(&format!(
                "  TVL: {} -> {}\n\n",
                format_usd(a.prev_usd),
                format_usd(a.curr_usd)
            ));
        }
    }
    Some(html)
}

pub fn render_reward_changes(alerts: &[RewardChange]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }
    let mut html = header("REWARD RATE CHANGES");
    for (chain, items) in group_by_chain(alerts) {
        html.push_str(&format!("<b>[{}]</b>\n", escape(chain)));
        for a in items {
            match &a.reward_token {
                Some(token) => {
                    html.push_str(&format!(
                        "  <b>{}</b> · {} rewards\n",
                        escape(&a.symbol),
                        escape(token)
                    ));
                }
                None => {
                    html.push_str(&format!("  <b>{}</b>\n", escape(&a.symbol)));
                }
            }
            html.push_str(&format!(
                "  {} -> {} ({} {:.1}%)\n\n",
                bps_to_percent(a.prev_bps),
                bps_to_percent(a.curr_bps),
                arrow(a.change_percent),
                a.change_percent.abs()
            ));
        }
    }
    Some(html)
}

pub fn render_new_assets(alerts: &[NewAsset]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }
    let mut html = header("NEW ASSETS DETECTED");
    for a in alerts {
        match a {
            NewAsset::Lending { chain, instrument } => {
                html.push_str(&format!(
                    "<b>[{}]</b> New fToken: <b>{}</b> ({})\n",
                    escape(chain),
                    escape(&instrument.symbol),
                    escape(&instrument.asset_symbol)
                ));
                html.push_str(&format!("  Supply: {}", bps_to_percent(instrument.supply_rate_bps)));
                if instrument.rewards_rate_bps > 0 {
                    html.push_str(&format!(
                        " + {} rewards",
                        bps_to_percent(instrument.rewards_rate_bps)
                    ));
                }
                if !instrument.total_assets_usd.is_zero() {
                    html.push_str(&format!(" | TVL: {}", format_usd(instrument.total_assets_usd)));
                }
            }
            NewAsset::Liquidity { chain, instrument } => {
                html.push_str(&format!(
                    "<b>[{}]</b> New Liquidity Token: <b>{}</b>\n",
                    escape(chain),
                    escape(&instrument.symbol)
                ));
                html.push_str(&format!(
                    "  Supply: {} | Borrow: {}",
                    bps_to_percent(instrument.supply_rate_bps),
                    bps_to_percent(instrument.borrow_rate_bps)
                ));
                if instrument.utilization_bps > 0 {
                    html.push_str(&format!(
                        " | Util: {:.1}%",
                        utilization_percent(instrument.utilization_bps)
                    ));
                }
            }
        }
        html.push_str("\n\n");
    }
    Some(html)
}

pub fn render_high_utilization(alerts: &[HighUtilization]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }
    let mut html = header("HIGH UTILIZATION WARNING");
    for a in alerts {
        html.push_str(&format!("<b>[{}]</b> {}\n", escape(&a.chain), escape(&a.symbol)));
        html.push_str(&format!(
            "  Utilization: {:.1}%\n",
            utilization_percent(a.utilization_bps)
        ));
        html.push_str(&format!(
            "  Supply: {} | Borrow: {}\n",
            bps_to_percent(a.supply_rate_bps),
            bps_to_percent(a.borrow_rate_bps)
        ));
        html.push_str("  Rates may spike soon!\n\n");
    }
    Some(html)
}

pub fn render_whale_activity(alerts: &[TvlMove]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }
    let mut html = header("WHALE ACTIVITY");
    for a in alerts {
        let direction = if a.is_inflow() {
            "LARGE DEPOSIT"
        } else {
            "LARGE WITHDRAWAL"
        };
        html.push_str(&format!("<b>[{}]</b> {}\n", escape(&a.chain), escape(&a.label())));
        html.push_str(&format!(
            "  {}: {} ({})\n\n",
            direction,
            format_usd(a.delta()),
            signed_percent(a.change_percent)
        ));
    }
    Some(html)
}

/// One message per non-empty category, in delivery order.
pub fn render_alerts(alerts: &AlertSet) -> Vec<String> {
    [
        render_rate_changes(&alerts.rate_changes),
        render_tvl_changes(&alerts.tvl_changes),
        render_reward_changes(&alerts.reward_changes),
        render_new_assets(&alerts.new_assets),
        render_high_utilization(&alerts.high_utilization),
        render_whale_activity(&alerts.whale_activity),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Plain one-line description of an alert, for logs and history rows.
pub fn describe_alert(alert: AlertRef<'_>) -> String {
    match alert {
        AlertRef::RateChange(a) => format!(
            "[{}] {} [{}] {}: {} -> {} ({})",
            a.chain,
            a.symbol,
            a.source.tag(),
            a.metric,
            bps_to_percent(a.prev_bps),
            bps_to_percent(a.curr_bps),
            signed_percent(a.change_percent)
        ),
        AlertRef::TvlChange(a) => format!(
            "[{}] {}: {} -> {} ({})",
            a.chain,
            a.label(),
            format_usd(a.prev_usd),
            format_usd(a.curr_usd),
            signed_percent(a.change_percent)
        ),
        AlertRef::RewardChange(a) => {
            let program = match &a.reward_token {
                Some(token) => format!("{} {} rewards", a.symbol, token),
                None => format!("{} rewards", a.symbol),
            };
            format!(
                "[{}] {}: {} -> {} ({})",
                a.chain,
                program,
                bps_to_percent(a.prev_bps),
                bps_to_percent(a.curr_bps),
                signed_percent(a.change_percent)
            )
        }
        AlertRef::NewAsset(a) => format!(
            "[{}] new {} {} ({})",
            rate_monitor_core::ChainScoped::chain(a),
            a.kind().tag(),
            a.symbol(),
            a.address()
        ),
        AlertRef::HighUtilization(a) => format!(
            "[{}] {} utilization {:.1}%",
            a.chain,
            a.symbol,
            utilization_percent(a.utilization_bps)
        ),
        AlertRef::WhaleActivity(a) => format!(
            "[{}] {} {} {} ({})",
            a.chain,
            a.label(),
            if a.is_inflow() {
                "large deposit"
            } else {
                "large withdrawal"
            },
            format_usd(a.delta()),
            signed_percent(a.change_percent)
        ),
    }
}

/// First-run message: what is being watched and when alerts fire.
pub fn format_started_notice(
    snapshot: &Snapshot,
    thresholds: &Thresholds,
    poll_interval: Duration,
) -> String {
    let mut html = header("Fluid Rate Monitor Started");

    for chain in snapshot {
        html.push_str(&format!("<b>[{}]</b>\n", escape(&chain.name)));
        if !chain.liquidity.is_empty() {
            let tickers: Vec<String> = chain.liquidity.iter().map(|t| escape(&t.symbol)).collect();
            html.push_str(&format!("  {}\n", tickers.join(", ")));
        }
        html.push('\n');
    }

    html.push_str(&format!(
        "Checking every {}. Alerts fire when:\n",
        every(poll_interval)
    ));
    html.push_str(&format!(
        "  - Rate changes > {}%\n",
        plain_percent(thresholds.rate_change_percent)
    ));
    html.push_str(&format!(
        "  - TVL moves > {}% (min {})\n",
        plain_percent(thresholds.tvl_change_percent),
        format_usd(thresholds.min_tvl_change_usd)
    ));
    html.push_str(&format!(
        "  - Utilization crosses {}%\n",
        plain_percent(utilization_percent(thresholds.utilization_warning_bps))
    ));
    html.push_str("  - New assets listed");
    html
}

/// Daily overview of every chain's current rates.
pub fn format_daily_digest(snapshot: &Snapshot, date: NaiveDate) -> String {
    let mut html = String::from("<b>FLUID PROTOCOL - DAILY DIGEST</b>\n");
    html.push_str(&format!("<i>{}</i>\n", date.format("%Y-%m-%d")));
    html.push_str(&format!("{}\n\n", RULE));

    for chain in snapshot {
        if chain.is_empty() {
            continue;
        }
        html.push_str(&format!("<b>[{}]</b>\n", escape(&chain.name)));

        if !chain.lending.is_empty() {
            html.push_str("<u>Lending (fTokens)</u>\n");
            let mut lending: Vec<_> = chain.lending.iter().collect();
            lending.sort_by(|a, b| b.total_rate_bps.cmp(&a.total_rate_bps));
            for t in lending {
                html.push_str(&format!(
                    "  {}: {} APR",
                    escape(&t.symbol),
                    bps_to_percent(t.total_rate_bps)
                ));
                if t.rewards_rate_bps > 0 {
                    html.push_str(&format!(
                        " ({} + {} rewards)",
                        bps_to_percent(t.supply_rate_bps),
                        bps_to_percent(t.rewards_rate_bps)
                    ));
                }
                if !t.total_assets_usd.is_zero() {
                    html.push_str(&format!(" | {}", format_usd(t.total_assets_usd)));
                }
                html.push('\n');
            }
            html.push('\n');
        }

        if !chain.liquidity.is_empty() {
            html.push_str("<u>Liquidity (Supply/Borrow)</u>\n");
            let mut liquidity: Vec<_> = chain.liquidity.iter().filter(|t| t.has_activity()).collect();
            liquidity.sort_by(|a, b| b.borrow_rate_bps.cmp(&a.borrow_rate_bps));
            for t in liquidity.into_iter().take(DIGEST_LIQUIDITY_ROWS) {
                html.push_str(&format!(
                    "  {}: S:{} B:{} | Util:{:.1}%",
                    escape(&t.symbol),
                    bps_to_percent(t.supply_rate_bps),
                    bps_to_percent(t.borrow_rate_bps),
                    utilization_percent(t.utilization_bps)
                ));
                if !t.total_supply_usd.is_zero() {
                    html.push_str(&format!(" | {}", format_usd(t.total_supply_usd)));
                }
                html.push('\n');
            }
            html.push('\n');
        }
    }

    html
}

/// Remove HTML tags and decode the entities the renderers emit.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
