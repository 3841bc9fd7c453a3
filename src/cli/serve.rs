use std::net::SocketAddr;

use clap::Parser;
use tracing::instrument;

use super::Context;

#[derive(Debug, Parser)]
pub struct Command {
    /// Address to listen on, overriding the configuration file
    #[arg(long, short)]
    listen: Option<SocketAddr>,
}

impl Command {
    #[instrument(skip(context))]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let library = context.open()?;
        let listen = self.listen.unwrap_or(context.config.listen);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(costlib::server::serve(library, listen))?;
        Ok(())
    }
}
