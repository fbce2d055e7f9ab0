mod devices;
mod diagnostics;
mod host;
mod publisher;
mod routes;
mod store;
mod watcher;
mod weather;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
