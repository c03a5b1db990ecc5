extern crate chatterbox;
extern crate env_logger;
extern crate hyper;
#[macro_use]
extern crate log;

use std::process;

use chatterbox::{Config, Error, MessageService, Store};

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
    let server = hyper::server::Http::new()
        .bind(&config.address, move || Ok(MessageService::new(store.clone())))?;

    info!("Running chatterbox at {}", config.address);
    server.run()?;
    Ok(())
}
