use crate::{client::UpstreamClient, state::cache::TabCache};
use log::{debug, info};
use tab_bridge_api::command::{render_count, render_list, Command, INVALID_COMMAND_RESPONSE};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
};

/// Commands longer than this are cut off, and rejected
const MAX_COMMAND_LEN: u64 = 1024;

/// Everything a launcher connection needs to serve its command
#[derive(Clone)]
pub struct ConnectionSession {
    pub pid: u32,
    pub client: UpstreamClient,
    pub cache: TabCache,
}

impl ConnectionSession {
    /// Executes the command, returning the response body
    pub async fn execute(&self, command: Command) -> anyhow::Result<String> {
        let response = match command {
            Command::Count => render_count(self.client.count().await?),
            Command::List => render_list(self.pid, &self.cache.snapshot()),
            Command::Select(tab_id) => {
                self.client.select(tab_id).await?;
                String::new()
            }
        };

        Ok(response)
    }
}

/// Reads one command, writes the response, and closes the connection.
pub async fn accept_connection(session: ConnectionSession, stream: UnixStream) -> anyhow::Result<()> {
    let (read, mut write) = stream.into_split();

    let mut line = Vec::new();
    BufReader::new(read.take(MAX_COMMAND_LEN))
        .read_until(b'\n', &mut line)
        .await?;

    let line = String::from_utf8_lossy(&line);
    debug!("recv: {}", line.trim());

    let command = match line.parse::<Command>() {
        Ok(command) => command,
        Err(err) => {
            write.write_all(INVALID_COMMAND_RESPONSE.as_bytes()).await?;
            write.shutdown().await.ok();
            return Err(err.into());
        }
    };

    info!("received command: {}", command);

    let response = session.execute(command).await?;
    write.write_all(response.as_bytes()).await?;
    write.shutdown().await?;

    Ok(())
}
