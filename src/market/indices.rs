//! Constituents of the market indices a watchlist can be seeded from.

const NIFTY50: &[&str] = &[
    "RELIANCE.NS", "TCS.NS", "HDFCBANK.NS", "INFY.NS", "ICICIBANK.NS",
    "HINDUNILVR.NS", "ITC.NS", "SBIN.NS", "BHARTIARTL.NS", "KOTAKBANK.NS",
    "LT.NS", "AXISBANK.NS", "ASIANPAINT.NS", "MARUTI.NS", "SUNPHARMA.NS",
    "TITAN.NS", "BAJFINANCE.NS", "ULTRACEMCO.NS", "NESTLEIND.NS", "WIPRO.NS",
    "HCLTECH.NS", "TATAMOTORS.NS", "ONGC.NS", "NTPC.NS", "POWERGRID.NS",
    "TATASTEEL.NS", "M&M.NS", "TECHM.NS", "ADANIENT.NS", "JSWSTEEL.NS",
    "INDUSINDBK.NS", "HINDALCO.NS", "COALINDIA.NS", "BAJAJFINSV.NS", "CIPLA.NS",
    "DRREDDY.NS", "EICHERMOT.NS", "BRITANNIA.NS", "GRASIM.NS", "APOLLOHOSP.NS",
    "BPCL.NS", "DIVISLAB.NS", "TATACONSUM.NS", "HEROMOTOCO.NS", "SHRIRAMFIN.NS",
    "SBILIFE.NS", "ADANIPORTS.NS", "UPL.NS", "BAJAJ-AUTO.NS", "LTIM.NS",
];

const BANKNIFTY: &[&str] = &[
    "HDFCBANK.NS", "ICICIBANK.NS", "SBIN.NS", "KOTAKBANK.NS", "AXISBANK.NS",
    "INDUSINDBK.NS", "BANDHANBNK.NS", "FEDERALBNK.NS", "AUBANK.NS", "IDFCFIRSTB.NS",
    "PNB.NS", "BANKBARODA.NS",
];

// TODO: populate nifty100 and niftynext50 constituents.
const INDICES: &[(&str, &[&str])] = &[
    ("nifty50", NIFTY50),
    ("banknifty", BANKNIFTY),
    ("nifty100", &[]),
    ("niftynext50", &[]),
];

/// Names of every known index, in catalog order.
pub fn available() -> Vec<&'static str> {
    INDICES.iter().map(|(name, _)| *name).collect()
}

/// Case-insensitive lookup of an index's symbols.
pub fn constituents(index_name: &str) -> Option<&'static [&'static str]> {
    let wanted = index_name.trim().to_lowercase();
    INDICES
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, symbols)| *symbols)
}

pub fn default_watchlist_name(index_name: &str) -> String {
    format!("{} Stocks", index_name.trim().to_uppercase())
}

pub fn default_description(index_name: &str) -> String {
    format!("Auto-generated from {} index", index_name.trim().to_uppercase())
}

/// Display fallback when the provider has no name: `RELIANCE.NS` -> `RELIANCE`.
pub fn strip_exchange_suffix(symbol: &str) -> &str {
    symbol
        .strip_suffix(".NS")
        .or_else(|| symbol.strip_suffix(".BO"))
        .unwrap_or(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(constituents("NIFTY50").map(<[_]>::len), Some(50));
        assert_eq!(constituents(" BankNifty ").map(<[_]>::len), Some(12));
        assert_eq!(constituents("nifty100").map(<[_]>::len), Some(0));
        assert!(constituents("sensex").is_none());
    }

    #[test]
    fn derived_names() {
        assert_eq!(default_watchlist_name("nifty50"), "NIFTY50 Stocks");
        assert_eq!(default_description("banknifty"), "Auto-generated from BANKNIFTY index");
        assert_eq!(strip_exchange_suffix("TCS.NS"), "TCS");
        assert_eq!(strip_exchange_suffix("500325.BO"), "500325");
        assert_eq!(strip_exchange_suffix("AAPL"), "AAPL");
    }

    #[test]
    fn nifty50_has_no_duplicates() {
        let mut symbols = NIFTY50.to_vec();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), NIFTY50.len());
    }
}
