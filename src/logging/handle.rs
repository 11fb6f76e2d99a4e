use std::time::{Duration, Instant};

use tracing_appender::non_blocking::WorkerGuard;

/// Порог времени shutdown, после которого выводится предупреждение.
const FLUSH_WARN_THRESHOLD: Duration = Duration::from_secs(5);

/// Handle для управления жизненным циклом логирования.
///
/// Держит `WorkerGuard` файлового вывода: пока handle жив, неблокирующий
/// писатель продолжает сбрасывать буфер.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self { file_guard }
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Завершает логирование: сбрасывает файловый буфер и сообщает время.
    pub fn shutdown(mut self) {
        tracing::info!(
            file_sink = self.file_guard.is_some(),
            "Initiating logging shutdown"
        );

        let start = Instant::now();
        drop(self.file_guard.take());
        let elapsed = start.elapsed();

        if elapsed > FLUSH_WARN_THRESHOLD {
            eprintln!(
                "WARNING: Logging shutdown took {}ms (threshold: {}ms)",
                elapsed.as_millis(),
                FLUSH_WARN_THRESHOLD.as_millis()
            );
        } else {
            tracing::info!(
                shutdown_duration_ms = elapsed.as_millis() as u64,
                "Logging shutdown completed"
            );
        }
    }
}
