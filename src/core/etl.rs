use crate::domain::model::RunOutcome;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        tracing::info!("Starting ETL process");
        self.monitor.log_stats("Start");

        // Extract
        let lines = self.pipeline.extract().await?;
        self.monitor.log_stats("Extract");

        // Transform
        let result = self.pipeline.transform(lines).await?;
        tracing::info!(
            "Processed {} records ({} accepted, {} rejected, {} filtered out)",
            result.summary.total(),
            result.summary.succeeded,
            result.summary.failed,
            result.filtered_lines
        );
        self.monitor
            .log_throughput("Transform", result.summary.total() + result.filtered_lines);

        let summary = result.summary.clone();
        let filtered_lines = result.filtered_lines;

        // Load
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.log_final_stats();

        Ok(RunOutcome {
            output_path,
            summary,
            filtered_lines,
        })
    }
}
