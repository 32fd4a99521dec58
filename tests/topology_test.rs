//! End-to-end topology scenarios for the cluster monitor.
//!
//! Each test drives a fresh cluster through a `TestServerFactory`, pushing
//! server descriptions the way a heartbeat layer would, and asserts on the
//! published cluster description:
//! 1. Initial descriptions and replica-set discovery from a seed list
//! 2. Primary failover and stale-primary demotion
//! 3. Membership pruning (standalones, wrong set names, DNS aliases)
//! 4. Immunity to late notifications from removed members

use std::sync::Arc;
use topomon::cluster::ClusterSettings;
use topomon::testing::TestServerFactory;
use topomon::{
    ClusterType, MultiServerCluster, ServerAddress, ServerConnectionState, ServerDescription,
    ServerType,
};

fn addr(s: &str) -> ServerAddress {
    s.parse().unwrap()
}

fn cluster_with_seeds(seeds: &[&str]) -> (MultiServerCluster, Arc<TestServerFactory>) {
    let factory = Arc::new(TestServerFactory::new());
    let settings = ClusterSettings::builder()
        .hosts(seeds.iter().map(|s| addr(s)))
        .build()
        .unwrap();
    let cluster = MultiServerCluster::new(settings, factory.clone());
    (cluster, factory)
}

fn primary(address: &str, set_name: &str, hosts: &[&str]) -> ServerDescription {
    ServerDescription::builder(addr(address))
        .server_type(ServerType::ReplicaSetPrimary)
        .set_name(set_name)
        .hosts(hosts.iter().map(|h| addr(h)))
        .build()
}

fn addresses(cluster: &MultiServerCluster) -> Vec<ServerAddress> {
    cluster.description().addresses().cloned().collect()
}

#[test]
fn test_initial_description_is_connecting() {
    let (cluster, _factory) = cluster_with_seeds(&["h1:27017"]);

    let description = cluster.description();
    assert_eq!(description.cluster_type(), ClusterType::Unknown);
    assert!(description.is_connecting());
    assert_eq!(description.servers().len(), 1);

    let member = description.server(&addr("h1:27017")).unwrap();
    assert_eq!(member.state, ServerConnectionState::Connecting);
}

#[test]
fn test_replica_set_discovery_from_one_seed() {
    let (cluster, factory) = cluster_with_seeds(&["h1:27017"]);

    factory.notify(primary(
        "h1:27017",
        "rs0",
        &["h1:27017", "h2:27018", "h3:27019"],
    ));

    let description = cluster.description();
    assert_eq!(description.cluster_type(), ClusterType::ReplicaSet);
    assert_eq!(
        addresses(&cluster),
        vec![addr("h1:27017"), addr("h2:27018"), addr("h3:27019")]
    );
}

#[test]
fn test_primary_failover_demotes_the_old_primary() {
    let (cluster, factory) = cluster_with_seeds(&["h1:27017", "h2:27017"]);

    factory.notify(primary("h1:27017", "rs0", &["h1:27017", "h2:27017"]));
    factory.notify(primary("h2:27017", "rs0", &["h1:27017", "h2:27017"]));

    let description = cluster.description();
    let old = description.server(&addr("h1:27017")).unwrap();
    assert_eq!(old.server_type, ServerType::Unknown);
    assert_eq!(old.state, ServerConnectionState::Connecting);

    let new = description.server(&addr("h2:27017")).unwrap();
    assert!(new.is_primary());

    // The demotion is visible on the server handle as well
    let handle = cluster.server_at(&addr("h1:27017")).unwrap();
    assert_eq!(handle.description().server_type, ServerType::Unknown);
}

#[test]
fn test_standalone_among_many_hosts_is_pruned() {
    let (cluster, factory) = cluster_with_seeds(&["h1:27017", "h2:27017"]);

    factory.notify(
        ServerDescription::builder(addr("h1:27017"))
            .server_type(ServerType::StandAlone)
            .build(),
    );
    factory.notify(primary("h2:27017", "rs0", &["h2:27017", "h3:27017"]));

    let description = cluster.description();
    assert_eq!(description.cluster_type(), ClusterType::ReplicaSet);
    assert!(!description.contains(&addr("h1:27017")));
    assert_eq!(addresses(&cluster), vec![addr("h2:27017"), addr("h3:27017")]);
}

#[test]
fn test_required_set_name_rejects_mismatched_member() {
    let factory = Arc::new(TestServerFactory::new());
    let settings = ClusterSettings::builder()
        .host(addr("h2:27017"))
        .required_replica_set_name("test1")
        .build()
        .unwrap();
    let cluster = MultiServerCluster::new(settings, factory.clone());

    factory.notify(primary(
        "h2:27017",
        "test2",
        &["h1:27017", "h2:27017", "h3:27017"],
    ));

    let description = cluster.description();
    assert_eq!(description.cluster_type(), ClusterType::ReplicaSet);
    assert!(description.servers().is_empty());
}

#[test]
fn test_required_set_name_accepts_matching_member_later() {
    let factory = Arc::new(TestServerFactory::new());
    let settings = ClusterSettings::builder()
        .host(addr("h1:27017"))
        .host(addr("h2:27017"))
        .required_replica_set_name("rs0")
        .build()
        .unwrap();
    let cluster = MultiServerCluster::new(settings, factory.clone());

    factory.notify(primary("h1:27017", "other", &["h1:27017"]));
    assert!(!cluster.description().contains(&addr("h1:27017")));

    factory.notify(primary("h2:27017", "rs0", &["h2:27017", "h3:27017"]));
    let description = cluster.description();
    assert_eq!(description.cluster_type(), ClusterType::ReplicaSet);
    assert_eq!(addresses(&cluster), vec![addr("h2:27017"), addr("h3:27017")]);
}

#[test]
fn test_seed_alias_is_replaced_by_canonical_addresses() {
    let (cluster, factory) = cluster_with_seeds(&["alias:27017"]);

    factory.notify(primary(
        "alias:27017",
        "rs0",
        &["h1:27017", "h2:27017", "h3:27017"],
    ));

    let description = cluster.description();
    assert!(!description.contains(&addr("alias:27017")));
    assert_eq!(
        addresses(&cluster),
        vec![addr("h1:27017"), addr("h2:27017"), addr("h3:27017")]
    );
}

#[test]
fn test_not_ok_notification_keeps_membership() {
    let (cluster, factory) = cluster_with_seeds(&["h1:27017", "h2:27017"]);

    factory.notify(primary(
        "h1:27017",
        "rs0",
        &["h1:27017", "h2:27017", "h3:27017"],
    ));
    factory.notify(
        ServerDescription::builder(addr("h2:27017"))
            .server_type(ServerType::ReplicaSetSecondary)
            .set_name("rs0")
            .ok(false)
            .build(),
    );

    let description = cluster.description();
    assert_eq!(
        addresses(&cluster),
        vec![addr("h1:27017"), addr("h2:27017"), addr("h3:27017")]
    );
    let failed = description.server(&addr("h2:27017")).unwrap();
    assert!(!failed.ok);
    assert_eq!(failed.state, ServerConnectionState::Connecting);
}

#[test]
fn test_late_notification_from_removed_member_is_ignored() {
    let factory = Arc::new(TestServerFactory::new());
    factory.keep_servers_open();
    let settings = ClusterSettings::builder()
        .host(addr("h1:27017"))
        .host(addr("h2:27017"))
        .build()
        .unwrap();
    let cluster = MultiServerCluster::new(settings, factory.clone());

    // h1's report drops h2 from the membership
    factory.notify(primary("h1:27017", "rs0", &["h1:27017"]));
    let before = cluster.description();
    assert!(!before.contains(&addr("h2:27017")));

    // h2's handle is still open; its late report must change nothing
    factory.notify(primary("h2:27017", "rs0", &["h2:27017", "h4:27017"]));

    let after = cluster.description();
    assert_eq!(*before, *after);
    assert!(!after.contains(&addr("h4:27017")));
}

#[test]
fn test_membership_converges_on_advertised_hosts() {
    let (cluster, factory) = cluster_with_seeds(&["s1:27017", "s2:27017", "s3:27017"]);

    factory.notify(primary("s2:27017", "rs0", &["h1:27017", "s2:27017"]));

    assert_eq!(addresses(&cluster), vec![addr("h1:27017"), addr("s2:27017")]);
}

#[test]
fn test_type_stays_pinned_under_required_cluster_type() {
    let factory = Arc::new(TestServerFactory::new());
    let settings = ClusterSettings::builder()
        .host(addr("r1:27017"))
        .host(addr("r2:27017"))
        .required_cluster_type(ClusterType::Sharded)
        .build()
        .unwrap();
    let cluster = MultiServerCluster::new(settings, factory.clone());

    assert_eq!(cluster.description().cluster_type(), ClusterType::Sharded);

    factory.notify(primary("r1:27017", "rs0", &["r1:27017", "r2:27017"]));
    let description = cluster.description();
    assert_eq!(description.cluster_type(), ClusterType::Sharded);
    assert!(!description.contains(&addr("r1:27017")));

    factory.notify(
        ServerDescription::builder(addr("r2:27017"))
            .server_type(ServerType::ShardRouter)
            .build(),
    );
    let description = cluster.description();
    assert_eq!(description.cluster_type(), ClusterType::Sharded);
    assert!(description.contains(&addr("r2:27017")));
}

#[test]
fn test_at_most_one_primary_after_any_sequence() {
    let (cluster, factory) = cluster_with_seeds(&["h1:27017", "h2:27017", "h3:27017"]);
    let all = &["h1:27017", "h2:27017", "h3:27017"];

    factory.notify(primary("h1:27017", "rs0", all));
    factory.notify(primary("h3:27017", "rs0", all));
    factory.notify(primary("h2:27017", "rs0", all));
    factory.notify(primary("h1:27017", "rs0", all));

    let description = cluster.description();
    let primaries: Vec<_> = description
        .servers()
        .iter()
        .filter(|s| s.is_primary())
        .collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(primaries[0].address, addr("h1:27017"));
}

#[test]
fn test_secondary_report_also_discovers_peers() {
    let (cluster, factory) = cluster_with_seeds(&["h1:27017"]);

    factory.notify(
        ServerDescription::builder(addr("h1:27017"))
            .server_type(ServerType::ReplicaSetSecondary)
            .set_name("rs0")
            .hosts([addr("h1:27017"), addr("h2:27017")])
            .build(),
    );

    let description = cluster.description();
    assert_eq!(description.cluster_type(), ClusterType::ReplicaSet);
    assert_eq!(addresses(&cluster), vec![addr("h1:27017"), addr("h2:27017")]);
}

#[test]
fn test_passthrough_metadata_survives_into_the_description() {
    let (cluster, factory) = cluster_with_seeds(&["h1:27017"]);

    factory.notify(
        ServerDescription::builder(addr("h1:27017"))
            .server_type(ServerType::StandAlone)
            .round_trip_time(std::time::Duration::from_millis(12))
            .tag("dc", "east")
            .max_wire_version(17)
            .build(),
    );

    let description = cluster.description();
    let member = description.server(&addr("h1:27017")).unwrap();
    assert_eq!(
        member.round_trip_time,
        Some(std::time::Duration::from_millis(12))
    );
    assert_eq!(member.tags.get("dc").map(String::as_str), Some("east"));
    assert_eq!(member.max_wire_version, Some(17));
}
