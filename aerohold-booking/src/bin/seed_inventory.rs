use aerohold_booking::Backends;
use aerohold_store::app_config::Config;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "seed-inventory")]
#[command(about = "Load unsold tickets into the flight queues")]
#[command(version)]
struct Cli {
    /// Rebuild airports, routes, flights, tickets and travelers before seeding
    #[arg(long)]
    generate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aerohold_booking=debug,aerohold_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let backends = Backends::connect(&config).await?;

    if cli.generate {
        backends.generator(&config).generate().await?;
    }

    let seeded = backends.provisioner().seed_all().await?;
    tracing::info!("Queued {} unsold tickets", seeded);

    let orchestrator = backends.orchestrator(&config);
    for route in orchestrator.get_route_list().await? {
        for flight in orchestrator.get_flight_list(route.id).await? {
            tracing::info!(
                "Route {} ({} - {}) flight {}: {} of {} held, price {}",
                route.id,
                route.airports[0].name,
                route.airports[1].name,
                flight.id,
                flight.booked.unwrap_or(0),
                flight.capacity,
                flight.current_ticket_price.unwrap_or(flight.base_price),
            );
        }
    }

    Ok(())
}
