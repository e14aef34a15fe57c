use clap::Parser;
use gossip_chain::cli::write_key_file;
use gossip_chain::{BlockStore, Command, Identity, Ledger, Node, Opt, Payload};
use log::{error, info, LevelFilter};
use std::process;
use std::thread;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Keygen { out } => {
            let keys = Identity::generate()?.keys();
            match out {
                Some(path) => {
                    write_key_file(&path, &keys)?;
                    println!("Wrote keypair to {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&keys)?),
            }
        }
        Command::StartNode { node } => {
            let config = node.to_config()?;
            let running = Node::start(&config, node.identity()?)?;
            info!("Node {} is up, press Ctrl-C to stop", running.self_address());
            loop {
                thread::park();
            }
        }
        Command::Insert { name, data, node } => {
            let value: serde_json::Value = serde_json::from_str(&data)?;
            let config = node.to_ephemeral_config()?;
            let running = Node::start(&config, node.identity()?)?;
            let block = running.submit(&name, Payload::from(value))?;
            println!("{}", serde_json::to_string_pretty(&block)?);
        }
        Command::PrintChain { node } => {
            let ledger = open_ledger(&node.to_config()?)?;
            println!("{}", serde_json::to_string_pretty(ledger.chain())?);
        }
        Command::Select { name, node } => {
            let ledger = open_ledger(&node.to_config()?)?;
            println!("{}", serde_json::to_string_pretty(&ledger.records(&name))?);
        }
        Command::Validate { node } => {
            let ledger = open_ledger(&node.to_config()?)?;
            if !Ledger::valid_chain(ledger.chain()) {
                return Err(format!("Chain of {} blocks is invalid", ledger.len()).into());
            }
            println!("Chain of {} blocks is valid", ledger.len());
        }
    }
    Ok(())
}

fn open_ledger(config: &gossip_chain::Config) -> gossip_chain::Result<Ledger> {
    Ledger::open(BlockStore::for_ledger(&config.data_dir, &config.ledger_name))
}
