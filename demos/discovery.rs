//! Replica-set discovery walkthrough.
//!
//! Seeds a cluster with one address, replays the notifications a heartbeat
//! layer would produce during discovery and a failover, and prints the
//! resulting cluster descriptions.
//!
//! Run with: `cargo run --example discovery`

use std::sync::Arc;
use std::time::Duration;
use topomon::cluster::ClusterSettings;
use topomon::testing::TestServerFactory;
use topomon::{
    ClusterChangedEvent, ClusterDescription, ClusterListener, MultiServerCluster, ServerAddress,
    ServerDescription, ServerType,
};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

struct PrintingListener;

impl ClusterListener for PrintingListener {
    fn cluster_changed(&self, event: &ClusterChangedEvent) {
        println!("  change: {} -> {}", event.previous, event.current);
    }
}

fn primary(address: &ServerAddress, hosts: &[ServerAddress]) -> ServerDescription {
    ServerDescription::builder(address.clone())
        .server_type(ServerType::ReplicaSetPrimary)
        .set_name("rs0")
        .hosts(hosts.iter().cloned())
        .round_trip_time(Duration::from_millis(4))
        .build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let seed: ServerAddress = "seed.example.com:27017".parse()?;
    let members: Vec<ServerAddress> = ["h1:27017", "h2:27017", "h3:27017"]
        .iter()
        .map(|s| s.parse())
        .collect::<Result<_, _>>()?;

    let factory = Arc::new(TestServerFactory::new());
    let settings = ClusterSettings::builder().host(seed.clone()).build()?;
    let cluster = MultiServerCluster::new(settings, factory.clone());
    cluster.add_listener(Arc::new(PrintingListener));

    println!("initial: {}", cluster.description());

    // The seed identifies itself as h1 and advertises the whole set; the
    // seed alias drops out and the advertised members take its place.
    println!("\nseed reports the replica set:");
    factory.notify(primary(&seed, &members));

    // The discovered members report in: h1 as primary, the rest as
    // secondaries.
    factory.notify(primary(&members[0], &members));
    for member in &members[1..] {
        factory.notify(
            ServerDescription::builder(member.clone())
                .server_type(ServerType::ReplicaSetSecondary)
                .set_name("rs0")
                .hosts(members.iter().cloned())
                .build(),
        );
    }

    // h2 wins an election; h1 is demoted on the spot.
    println!("\nfailover to h2:");
    factory.notify(primary(&members[1], &members));

    let select_primary = |description: &ClusterDescription| {
        description
            .servers()
            .iter()
            .filter(|s| s.is_primary())
            .cloned()
            .collect::<Vec<_>>()
    };
    let server = cluster.select_server(&select_primary, Duration::from_secs(1))?;
    println!("\nselected primary: {}", server.address());

    println!(
        "\nfinal description:\n{}",
        serde_json::to_string_pretty(&*cluster.description())?
    );

    cluster.close();
    Ok(())
}
