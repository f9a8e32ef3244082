use clap::Args;

use common::models::collect_stream;
use common::prelude::{GetRequestData, Node};

use crate::runtime::{Runtime, RuntimeError, Target};

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// File to read, as <datasource>/<path>
    pub path: String,

    /// First byte to read
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Number of bytes to read (everything by default)
    #[arg(long)]
    pub length: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("cat failed: {0}")]
    Pipeline(#[from] common::Error),
    #[error("failed to read object body: {0}")]
    Body(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::op::Op for Cat {
    type Error = CatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let target = Target::parse(&self.path)?;
        let runtime = Runtime::load(ctx).await?;
        let request_ctx = runtime.context(&target)?;

        let request = GetRequestData {
            start_offset: self.offset,
            length: self.length,
            version_id: None,
        };
        let mut node = Node::new(target.path.clone());
        let body = runtime
            .pipeline()
            .get_object(&request_ctx, &mut node, &request)
            .await?;
        let bytes = collect_stream(body).await?;

        Ok(render(&target.path, &bytes))
    }
}

/// Text as-is, binary content as hex
fn render(path: &str, bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => format!("File: {}\nSize: {} bytes\n\n{}", path, bytes.len(), text),
        Err(_) => {
            let hex = bytes
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "File: {}\nSize: {} bytes\nBinary content (hex): {}",
                path,
                bytes.len(),
                hex
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_and_binary() {
        assert_eq!(
            render("pydata/a.txt", b"hi"),
            "File: pydata/a.txt\nSize: 2 bytes\n\nhi"
        );
        assert_eq!(
            render("pydata/a.bin", &[0xff, 0x00]),
            "File: pydata/a.bin\nSize: 2 bytes\nBinary content (hex): ff 00"
        );
    }
}
