use clap::Parser;
use cli::{Cli, Command};

mod cities;
mod cli;
mod config;
mod db;
mod email;
mod fetcher;
mod readings;
mod scheduler;
mod server;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Cli::parse();
    let database_url = &config::config().database_url;

    match args.cmd {
        Command::Http { address } => {
            db::init(database_url)
                .unwrap_or_else(|e| panic!("Failed to open DB {}: {}", database_url, e));
            server::run(address).await;
        }
        Command::Fetch { lat, lon } => {
            db::init(database_url)
                .unwrap_or_else(|e| panic!("Failed to open DB {}: {}", database_url, e));
            match fetcher::fetch_current(lat, lon).await {
                Ok(weather) => {
                    let reading = db::with_connection(|conn| {
                        readings::insert(
                            conn,
                            weather.temperature_c,
                            weather.windspeed_kmh,
                            weather.latitude,
                            weather.longitude,
                            None,
                        )
                    })
                    .expect("Failed to save reading");
                    println!(
                        "Saved reading #{}: {:.1} °C, wind {:.1} km/h at ({}, {})",
                        reading.id,
                        reading.temperature_c,
                        reading.windspeed_kmh,
                        reading.latitude,
                        reading.longitude
                    );
                }
                Err(e) => {
                    eprintln!("Fetch failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Db(db_cmd) => match db_cmd.cmd {
            cli::DbSubCommand::Reset => {
                db::init(database_url)
                    .unwrap_or_else(|e| panic!("Failed to open DB {}: {}", database_url, e));
                let deleted =
                    db::with_connection(readings::reset).expect("Failed to reset database");
                println!("Deleted {} readings.", deleted);
            }
        },
    }
}
