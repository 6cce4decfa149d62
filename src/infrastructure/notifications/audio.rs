//! Platform audio alerts

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::alert::AudioAlertChannel;
use crate::shared::errors::NotificationError;

const BEEP_GAP: Duration = Duration::from_millis(200);

/// The audio channel for the platform this binary was built for
pub fn system_audio_channel() -> Box<dyn AudioAlertChannel> {
    #[cfg(windows)]
    {
        Box::new(ConsoleBeep::default())
    }
    #[cfg(not(windows))]
    {
        Box::new(TerminalBell)
    }
}

/// Rings the terminal bell twice
#[cfg(not(windows))]
pub struct TerminalBell;

#[cfg(not(windows))]
#[async_trait]
impl AudioAlertChannel for TerminalBell {
    fn name(&self) -> &str {
        "system beep"
    }

    async fn fire(&self) -> Result<(), NotificationError> {
        use tokio::io::AsyncWriteExt;

        let mut stdout = tokio::io::stdout();
        let result: std::io::Result<()> = async {
            stdout.write_all(b"\x07").await?;
            stdout.flush().await?;
            tokio::time::sleep(BEEP_GAP).await;
            stdout.write_all(b"\x07").await?;
            stdout.flush().await
        }
        .await;

        result.map_err(|e| NotificationError::Delivery {
            channel: "system beep".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Two console beeps through PowerShell
#[cfg(windows)]
pub struct ConsoleBeep {
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

#[cfg(windows)]
impl Default for ConsoleBeep {
    fn default() -> Self {
        Self {
            frequency_hz: 1000,
            duration_ms: 500,
        }
    }
}

#[cfg(windows)]
#[async_trait]
impl AudioAlertChannel for ConsoleBeep {
    fn name(&self) -> &str {
        "system beep"
    }

    async fn fire(&self) -> Result<(), NotificationError> {
        let script = format!(
            "[console]::beep({f},{d}); Start-Sleep -Milliseconds {gap}; [console]::beep({f},{d})",
            f = self.frequency_hz,
            d = self.duration_ms,
            gap = BEEP_GAP.as_millis()
        );

        let status = tokio::process::Command::new("powershell")
            .args(["-NoProfile", "-Command", &script])
            .status()
            .await
            .map_err(|e| NotificationError::Delivery {
                channel: "system beep".to_string(),
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(NotificationError::Delivery {
                channel: "system beep".to_string(),
                reason: format!("powershell exited with {}", status),
            })
        }
    }
}
