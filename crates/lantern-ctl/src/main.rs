//! lantern-ctl — command-line diagnostic client for the SDE responder.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};

use lantern_core::sde::SDE_PORT;
use lantern_ctl::SdeClient;

fn print_usage() {
    println!("Usage: lantern-ctl [--addr <host:port>] <command>");
    println!();
    println!("Commands");
    println!("  metadata                 Modification timestamps of the published services");
    println!("  describe <pos> [...]     Full descriptions of the services at the positions");
    println!();
    println!(
        "Options:\n  --addr <host:port>       Responder address (default: 127.0.0.1:{})",
        SDE_PORT
    );
    println!();
    println!("Examples:");
    println!("  lantern-ctl metadata");
    println!("  lantern-ctl --addr 192.168.1.1:30003 describe 0 2");
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let mut server: SocketAddr = format!("127.0.0.1:{SDE_PORT}")
        .parse()
        .expect("default address is valid");
    if let Some(at) = args.iter().position(|a| a == "--addr") {
        if at + 1 >= args.len() {
            print_usage();
            bail!("--addr needs a value");
        }
        server = args[at + 1]
            .parse()
            .with_context(|| format!("invalid address '{}'", args[at + 1]))?;
        args.drain(at..=at + 1);
    }

    let Some(command) = args.first() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "metadata" => {
            let mut client = SdeClient::connect(server).await?;
            let timestamps = client.metadata().await?;
            println!("{} published service(s)", timestamps.len());
            for (pos, ts) in timestamps.iter().enumerate() {
                println!("  #{pos}  modified at {ts} (epoch seconds)");
            }
        }
        "describe" => {
            if args.len() < 2 {
                print_usage();
                bail!("describe needs at least one position");
            }
            let positions = args[1..]
                .iter()
                .map(|a| {
                    a.parse::<u8>()
                        .with_context(|| format!("invalid position '{a}'"))
                })
                .collect::<Result<Vec<u8>>>()?;

            let mut client = SdeClient::connect(server).await?;
            let descriptions = client.describe(&positions).await?;
            if descriptions.is_empty() {
                println!("no matching services");
            }
            for d in descriptions {
                println!("service #{}", d.pos);
                println!("  category:   {}", d.cat_id);
                println!("  uri:        {}", d.uri);
                if let Some(desc) = &d.short_desc {
                    println!("  short desc: {desc}");
                }
                if let Some(long_desc) = &d.long_desc {
                    println!("  long desc:  {long_desc}");
                }
                println!("  modified:   {} (epoch seconds)", d.mod_time);
            }
        }
        other => {
            print_usage();
            bail!("unknown command '{other}'");
        }
    }

    Ok(())
}
