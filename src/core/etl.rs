use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::PhaseMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: PhaseMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: PhaseMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn into_pipeline(self) -> P {
        self.pipeline
    }

    /// extract -> transform -> load；任何一步失敗即中止，不會寫入部分結果
    pub async fn run(&mut self) -> Result<String> {
        tracing::info!("🚀 Starting ETL process");

        let raw = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} records", raw.len());
        self.monitor.log_phase("extract");

        let canonical = self.pipeline.transform(raw).await?;
        tracing::info!("🔄 Transformed {} records", canonical.len());
        self.monitor.log_phase("transform");

        let destination = self.pipeline.load(canonical).await?;
        tracing::info!("💾 Loaded into {}", destination);
        self.monitor.log_phase("load");
        self.monitor.log_final_stats();

        Ok(destination)
    }
}
