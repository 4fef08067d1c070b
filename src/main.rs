use heart_rate_zones::config::ListenerConfig;
use heart_rate_zones::listener::ZoneListener;
use heart_rate_zones::mq::HeartRateSubscriber;
use heart_rate_zones::telemetry;

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting heart rate zone listener");

    let config = ListenerConfig::default();
    let subscriber = HeartRateSubscriber::new(config.clone())?;
    let mut listener = ZoneListener::stdout(&config);

    subscriber.run(&mut listener)?;
    Ok(())
}
