use clap::Parser;
use tracing::{error, info, Level};

use astro_geoloc::{
    config::Config,
    export,
    pipeline::Extractor,
    transport::{astrocast::AstrocastClient, mqtt::CloudLocateClient},
    AGResult,
};

fn main() {
    let config = Config::parse();

    let level = match config.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> AGResult<()> {
    let source = AstrocastClient::new(&config.api_url, &config.api_token)?;
    let resolver = CloudLocateClient::new(
        &config.mqtt_host,
        config.mqtt_port,
        &config.mqtt_device_id,
        &config.mqtt_username,
        &config.mqtt_password,
    );
    let topics = resolver.topics();

    let mut extractor = Extractor::new(source, resolver, topics, config.response_timeout())
        .with_carry_forward(config.carry_forward());
    let table = extractor.run(&config.device_guid, &config.start)?;

    for s in &table.skipped {
        info!("message {} skipped ({} byte payload)", s.message, s.len);
    }
    export::write_outputs(&table, &config.output)?;
    Ok(())
}
