//! Notification transports

mod audio;
mod telegram;

pub use audio::system_audio_channel;
pub use telegram::TelegramChannel;
