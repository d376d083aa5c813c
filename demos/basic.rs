extern crate pop3;

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Log in to a POP3 maildrop, print its listing and the last message, and log out.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host name
    #[arg(long)]
    host: String,

    /// Server port; defaults to 995 with --tls and 110 without
    #[arg(long)]
    port: Option<u16>,

    /// Connect over TLS
    #[arg(long)]
    tls: bool,

    /// Mailbox user name
    #[arg(short, long)]
    user: String,

    /// Mailbox password
    #[arg(long, env = "POP3_PASSWORD", hide_env_values = true)]
    password: String,

    /// Read/write timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let port = args.port.unwrap_or(if args.tls {
        pop3::POP3S_PORT
    } else {
        pop3::POP3_PORT
    });

    let mut client = pop3::ClientBuilder::new(args.host.as_str(), port)
        .tls(args.tls)
        .timeout(Duration::from_secs(args.timeout))
        .connect()?;

    client.login(&args.user, &args.password)?;
    client.noop()?;

    let stat = client.stat()?;
    println!("{}", stat);

    let sizes = client.list_all()?;
    println!("{:?}", sizes);

    for i in 1..=stat.count {
        println!("{}", client.list(i)?);
    }

    if stat.count > 0 {
        let message = client.retr(stat.count)?;
        println!("{}", String::from_utf8_lossy(&message));
    }

    client.quit()?;
    Ok(())
}
