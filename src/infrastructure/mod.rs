//! Infrastructure layer - external data sources, transports and storage

pub mod notifications;
pub mod persistence;
pub mod price_source;

pub use notifications::{system_audio_channel, TelegramChannel};
pub use persistence::{CsvExporter, SessionSnapshot, SessionStore};
pub use price_source::YahooFinanceSource;
