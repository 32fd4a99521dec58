//! Server selection seam.
//!
//! Selection *policies* (primary, secondary, nearest, tag sets) live in the
//! enclosing driver; the monitor only applies a caller-supplied selector to
//! its current description.

use crate::description::{ClusterDescription, ServerDescription};

/// Chooses the members of a cluster description that satisfy a read/write
/// intent.
///
/// Selectors must be pure: no side effects, no retained references to the
/// description they are given.
pub trait ServerSelector: Send + Sync {
    /// Return the subset of members this selector accepts.
    fn select(&self, description: &ClusterDescription) -> Vec<ServerDescription>;
}

impl<F> ServerSelector for F
where
    F: Fn(&ClusterDescription) -> Vec<ServerDescription> + Send + Sync,
{
    fn select(&self, description: &ClusterDescription) -> Vec<ServerDescription> {
        self(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ServerAddress;
    use crate::description::{ClusterType, ConnectionMode, ServerType};

    #[test]
    fn test_closures_are_selectors() {
        let selector = |description: &ClusterDescription| {
            description
                .servers()
                .iter()
                .filter(|s| s.server_type == ServerType::ReplicaSetPrimary)
                .cloned()
                .collect()
        };

        let addr: ServerAddress = "h1:27017".parse().unwrap();
        let primary = ServerDescription::builder(addr.clone())
            .server_type(ServerType::ReplicaSetPrimary)
            .set_name("rs0")
            .build();
        let description = ClusterDescription::new(
            ConnectionMode::Multiple,
            ClusterType::ReplicaSet,
            [primary],
        );

        let selected = ServerSelector::select(&selector, &description);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].address, addr);
    }
}
