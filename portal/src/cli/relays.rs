use clap::Args;
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;

use crate::{
    cli::{Error, error},
    config::Config,
    ui::table::RelaySpecExt,
};

#[derive(Args, Clone)]
pub struct RelaysCommand {}

impl RelaysCommand {
    /// Prints the configured relay presets.
    ///
    /// # Errors
    ///
    /// Fails if standard output cannot be written.
    pub async fn run(self, config: Config) -> Result<(), Error> {
        let table = config.relays.render_table(&config.default_relay);
        let mut stdout = tokio::io::stdout();
        stdout.write_all(table.as_bytes()).await.context(error::WriteStdoutSnafu)?;
        stdout.write_u8(b'\n').await.context(error::WriteStdoutSnafu)?;
        stdout.flush().await.context(error::WriteStdoutSnafu)
    }
}
