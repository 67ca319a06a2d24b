use std::time::Duration;

use tracing::{debug, info};

use crate::error::{AppError, TimetableError};
use crate::services::TimetableService;

/// 定期リフレッシュのスケジューラー
/// Reloads the selected timetable so edits made elsewhere show up.
pub struct RefreshScheduler {
    service: TimetableService,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(service: TimetableService, interval_secs: u64) -> Self {
        Self {
            service,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// 無限ループで定期実行
    pub async fn start(self) {
        info!("Starting refresh scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.service.refresh().await {
                Ok(visible) => {
                    debug!(
                        "Scheduled refresh completed - {} visible entries",
                        visible.entries.len()
                    );
                }
                Err(AppError::Timetable(TimetableError::NoTimetableSelected)) => {
                    debug!("Scheduled refresh skipped: no timetable selected");
                }
                Err(e) => {
                    // エラーが発生してもループは継続
                    tracing::warn!("Scheduled refresh failed: {:?}", e);
                }
            }
        }
    }
}
