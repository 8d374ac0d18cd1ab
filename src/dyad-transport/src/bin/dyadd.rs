//! Reference coordinator binary standing in for the pre-existing KVS/RPC
//! service the spec treats as an external collaborator. Only useful for
//! local testing and demos; production deployments bring their own
//! distributed KVS (spec §1).

use clap::Parser;
use dyad_transport::tcp::TcpCoordinator;
use tracing::info;

#[derive(Parser)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:9753")]
    listen: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let (addr, handle) = TcpCoordinator::spawn(&args.listen)?;
    info!("dyadd listening on {addr}");
    handle.join().expect("coordinator thread panicked");
    Ok(())
}
