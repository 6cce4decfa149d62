//! Concrete price sources

mod yahoo_finance;

pub use yahoo_finance::YahooFinanceSource;
