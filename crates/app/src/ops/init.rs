use clap::Args;

use crate::state::{AppConfig, AppState, DatasourceConfig};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Name of the first datasource, the leading segment of its paths
    #[arg(long, default_value = "pydata")]
    pub datasource: String,

    /// Bucket holding the datasource's blobs
    #[arg(long, default_value = "objects")]
    pub bucket: String,

    /// Key blobs by path instead of by node uuid
    #[arg(long)]
    pub hierarchical: bool,

    /// Refuse single copies above this many bytes (0 for no limit)
    #[arg(long, default_value_t = 0)]
    pub multipart_copy_threshold: i64,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut datasource = DatasourceConfig::new(self.datasource.clone(), self.bucket.clone());
        datasource.flat = !self.hierarchical;
        datasource.multipart_copy_threshold = self.multipart_copy_threshold;

        let config = AppConfig {
            log_level: self.log_level.clone(),
            datasources: vec![datasource],
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let layout = if self.hierarchical { "hierarchical" } else { "flat" };
        let output = format!(
            "Initialized flatsync directory at: {}\n\
             - Index: {}\n\
             - Objects: {}\n\
             - Config: {}\n\
             - Datasource: {} (bucket '{}', {})",
            state.state_dir.display(),
            state.index_path.display(),
            state.objects_path.display(),
            state.config_path.display(),
            self.datasource,
            self.bucket,
            layout,
        );

        Ok(output)
    }
}
