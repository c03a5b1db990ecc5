extern crate chatterbox;
extern crate env_logger;
#[macro_use]
extern crate log;

use std::process;

use chatterbox::{seed, Config, Error, Store};

fn main() {
    env_logger::init();
    if let Err(error) = run() {
        error!("{}", error);
        process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let config = Config::load()?;
    let store = Store::open(&config.database)?;
    let report = seed::seed(&store)?;
    info!("Cleared {} existing messages", report.cleared);
    println!("Database seeded successfully!");
    println!("Added {} messages to the database", report.added);
    Ok(())
}
