use crate::models::RebateConfig;

/// Suggested rebate percent for a spend on `card_id` tagged with
/// `categories`.
///
/// Starts from the card's basic rate and takes the best matching category
/// rate; rates never stack. Cards without a config earn 0.
pub fn suggest_rebate(configs: &[RebateConfig], card_id: &str, categories: &[String]) -> f64 {
    let Some(config) = configs.iter().find(|c| c.card_id == card_id) else {
        return 0.0;
    };
    categories
        .iter()
        .filter_map(|m| config.merchant_type_rebates.get(m))
        .fold(config.basic_rebate, |best, rate| best.max(*rate))
}

/// Parse a free-text percent the lenient way: anything unparsable is 0.
pub fn parse_percent(raw: &str) -> f64 {
    raw.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
