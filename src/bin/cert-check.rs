use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use secure_listener::security::{
    check_certificate_expiry, verify_certificate_address, verify_certificate_chain,
};

#[derive(Parser)]
#[command(name = "cert-check")]
#[command(about = "Certificate health checks for the secure listener", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report days until the certificate expires
    Expiry {
        #[arg(long)]
        cert: PathBuf,
        #[arg(long)]
        key: PathBuf,
    },
    /// Check that an IP address or host name is in the certificate's SANs
    Address {
        #[arg(long)]
        cert: PathBuf,
        address: String,
    },
    /// Verify the certificate chains to the given CA bundle
    Chain {
        #[arg(long)]
        cert: PathBuf,
        #[arg(long)]
        ca: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Expiry { cert, key } => check_certificate_expiry(&cert, &key).map(|status| {
            let note = if status.expiring_soon { " (renew soon)" } else { "" };
            format!(
                "{}: expires {} ({} days){}",
                status.subject, status.not_after, status.days_remaining, note
            )
        }),
        Commands::Address { cert, address } => verify_certificate_address(&cert, &address)
            .map(|()| format!("{address} is covered by {}", cert.display())),
        Commands::Chain { cert, ca } => verify_certificate_chain(&cert, &ca)
            .map(|()| format!("{} chains to {}", cert.display(), ca.display())),
    };

    match outcome {
        Ok(message) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
