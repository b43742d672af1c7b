//! Neighbor wiring: runs once, after every group exists.
//!
//! RULE: A group never lists itself. With at least NEIGHBOR_COUNT + 1
//! groups every group gets exactly NEIGHBOR_COUNT neighbors; smaller
//! maps clamp to whatever is available.
//!
//! Candidates are drawn pool by pool, closest locality first:
//!   1. same city and village
//!   2. same city only
//!   3. everyone else
//!
//! Edges are directed. A listing B does not make B list A.

use crate::{
    group::Group,
    risk::RiskBand,
    rng::{RngBank, RngSlot},
    types::GroupId,
};
use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const NEIGHBOR_COUNT: usize = 3;
pub const MIN_DISTANCE_M: i64 = 20;
pub const MAX_DISTANCE_M: i64 = 500;
/// Below this distance a non-contagion link is relabelled Geo-Cluster.
pub const GEO_CLUSTER_RADIUS_M: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "Risk Contagion")]
    RiskContagion,
    #[serde(rename = "Same Village")]
    SameVillage,
    #[serde(rename = "Same City")]
    SameCity,
    #[serde(rename = "Shared Agent")]
    SharedAgent,
    #[serde(rename = "Geo-Cluster")]
    GeoCluster,
}

impl Relation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RiskContagion => "Risk Contagion",
            Self::SameVillage => "Same Village",
            Self::SameCity => "Same City",
            Self::SharedAgent => "Shared Agent",
            Self::GeoCluster => "Geo-Cluster",
        }
    }
}

/// Whole meters, written as `"<n>m"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Meters(pub u32);

impl fmt::Display for Meters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

impl Serialize for Meters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Meters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.strip_suffix('m')
            .and_then(|n| n.trim().parse().ok())
            .map(Meters)
            .ok_or_else(|| de::Error::custom(format!("invalid distance '{raw}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: GroupId,
    pub name: String,
    pub risk: RiskBand,
    pub distance: Meters,
    pub relation: Relation,
}

/// Label for a link from `from` to `to` at `distance`.
pub fn relation_between(from: &Group, to: &Group, distance: Meters) -> Relation {
    let same_city = from.header.location_city == to.header.location_city;
    let same_village = same_city && from.header.location_village == to.header.location_village;

    let relation = if to.risk == RiskBand::Toxic {
        Relation::RiskContagion
    } else if same_village {
        Relation::SameVillage
    } else if same_city {
        Relation::SameCity
    } else {
        Relation::SharedAgent
    };

    if distance.0 < GEO_CLUSTER_RADIUS_M && relation != Relation::RiskContagion {
        Relation::GeoCluster
    } else {
        relation
    }
}

/// Fill `overview.neighbors` for every group in the map.
pub fn wire_neighbors(groups: &mut IndexMap<GroupId, Group>, bank: &RngBank) {
    let wanted = NEIGHBOR_COUNT.min(groups.len().saturating_sub(1));
    if groups.len() <= NEIGHBOR_COUNT {
        log::warn!(
            "wiring: only {} group(s), clamping neighbor count to {wanted}",
            groups.len()
        );
    }

    let mut wired: Vec<Vec<Neighbor>> = Vec::with_capacity(groups.len());
    for (id, group) in groups.iter() {
        let mut rng = bank.for_group(id, RngSlot::Wiring);

        let mut village: Vec<&Group> = Vec::new();
        let mut city: Vec<&Group> = Vec::new();
        let mut rest: Vec<&Group> = Vec::new();
        for (other_id, other) in groups.iter() {
            if other_id == id {
                continue;
            }
            let same_city = other.header.location_city == group.header.location_city;
            if same_city && other.header.location_village == group.header.location_village {
                village.push(other);
            } else if same_city {
                city.push(other);
            } else {
                rest.push(other);
            }
        }

        let mut chosen: Vec<&Group> = Vec::with_capacity(wanted);
        for pool in [&mut village, &mut city, &mut rest] {
            if chosen.len() == wanted {
                break;
            }
            rng.shuffle(pool);
            let take = (wanted - chosen.len()).min(pool.len());
            chosen.extend_from_slice(&pool[..take]);
        }

        let neighbors = chosen
            .into_iter()
            .map(|target| {
                let distance = Meters(rng.range_inclusive(MIN_DISTANCE_M, MAX_DISTANCE_M) as u32);
                Neighbor {
                    id: target.id.clone(),
                    name: target.header.name.clone(),
                    risk: target.risk,
                    distance,
                    relation: relation_between(group, target, distance),
                }
            })
            .collect();
        wired.push(neighbors);
    }

    for (group, neighbors) in groups.values_mut().zip(wired) {
        group.overview.neighbors = neighbors;
    }
    log::info!("wiring: {} group(s) wired, {wanted} neighbor(s) each", groups.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::GroupAggregate;
    use crate::group::{placeholder, GroupContext};
    use chrono::NaiveDate;

    fn group(index: usize, band: RiskBand, city: &str, village: &str) -> Group {
        let agg = GroupAggregate {
            index,
            id: crate::types::group_id(index),
            members: vec![format!("C{index}")],
            total_dpd: 0,
            avg_dpd: 0.0,
            total_outstanding: 0.0,
            business_type: "Warung".into(),
            location: None,
        };
        let mut g = placeholder(GroupContext {
            aggregate: &agg,
            band,
            image_url: "placeholder.jpg",
            audit_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        });
        g.header.location_city = city.into();
        g.header.location_village = village.into();
        g
    }

    fn map(groups: Vec<Group>) -> IndexMap<GroupId, Group> {
        groups.into_iter().map(|g| (g.id.clone(), g)).collect()
    }

    #[test]
    fn every_group_gets_three_distinct_non_self_neighbors() {
        let mut groups = map(
            (0..8)
                .map(|i| group(i, RiskBand::Healthy, if i % 2 == 0 { "Bogor" } else { "Depok" }, "Desa A"))
                .collect(),
        );
        wire_neighbors(&mut groups, &RngBank::new(11));
        for (id, g) in &groups {
            let ids: Vec<&str> = g.overview.neighbors.iter().map(|n| n.id.as_str()).collect();
            assert_eq!(ids.len(), NEIGHBOR_COUNT);
            assert!(!ids.contains(&id.as_str()));
            let mut dedup = ids.clone();
            dedup.sort_unstable();
            dedup.dedup();
            assert_eq!(dedup.len(), ids.len());
        }
    }

    #[test]
    fn same_village_pool_is_drawn_first() {
        let mut groups = map(vec![
            group(0, RiskBand::Healthy, "Bogor", "Desa A"),
            group(1, RiskBand::Healthy, "Bogor", "Desa A"),
            group(2, RiskBand::Healthy, "Bogor", "Desa A"),
            group(3, RiskBand::Healthy, "Bogor", "Desa A"),
            group(4, RiskBand::Healthy, "Depok", "Desa B"),
            group(5, RiskBand::Healthy, "Depok", "Desa B"),
        ]);
        wire_neighbors(&mut groups, &RngBank::new(3));
        let ids: Vec<&str> = groups["G001"].overview.neighbors.iter().map(|n| n.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec!["G002", "G003", "G004"]);
    }

    #[test]
    fn small_maps_clamp_neighbor_count() {
        let mut groups = map(vec![
            group(0, RiskBand::Healthy, "Bogor", "Desa A"),
            group(1, RiskBand::Medium, "Bogor", "Desa A"),
        ]);
        wire_neighbors(&mut groups, &RngBank::new(3));
        assert_eq!(groups["G001"].overview.neighbors.len(), 1);
        assert_eq!(groups["G001"].overview.neighbors[0].id, "G002");

        let mut single = map(vec![group(0, RiskBand::Healthy, "Bogor", "Desa A")]);
        wire_neighbors(&mut single, &RngBank::new(3));
        assert!(single["G001"].overview.neighbors.is_empty());
    }

    #[test]
    fn distances_stay_in_range() {
        let mut groups = map((0..10).map(|i| group(i, RiskBand::Medium, "Bogor", "Desa A")).collect());
        wire_neighbors(&mut groups, &RngBank::new(8));
        for g in groups.values() {
            for n in &g.overview.neighbors {
                assert!((20..=500).contains(&n.distance.0));
            }
        }
    }

    #[test]
    fn toxic_target_is_always_contagion() {
        let from = group(0, RiskBand::Healthy, "Bogor", "Desa A");
        let to = group(1, RiskBand::Toxic, "Bogor", "Desa A");
        assert_eq!(relation_between(&from, &to, Meters(30)), Relation::RiskContagion);
        assert_eq!(relation_between(&from, &to, Meters(400)), Relation::RiskContagion);
    }

    #[test]
    fn locality_labels_and_geo_cluster_override() {
        let from = group(0, RiskBand::Healthy, "Bogor", "Desa A");
        let village = group(1, RiskBand::Healthy, "Bogor", "Desa A");
        let city = group(2, RiskBand::Medium, "Bogor", "Desa B");
        let far = group(3, RiskBand::Healthy, "Depok", "Desa A");
        assert_eq!(relation_between(&from, &village, Meters(300)), Relation::SameVillage);
        assert_eq!(relation_between(&from, &city, Meters(300)), Relation::SameCity);
        assert_eq!(relation_between(&from, &far, Meters(300)), Relation::SharedAgent);
        assert_eq!(relation_between(&from, &far, Meters(99)), Relation::GeoCluster);
        assert_eq!(relation_between(&from, &far, Meters(100)), Relation::SharedAgent);
    }

    #[test]
    fn neighbor_serializes_in_snapshot_shape() {
        let n = Neighbor {
            id: "G002".into(),
            name: "KELOMPOK MAJU JAYA 2".into(),
            risk: RiskBand::Toxic,
            distance: Meters(123),
            relation: Relation::GeoCluster,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["distance"], "123m");
        assert_eq!(json["relation"], "Geo-Cluster");
        assert_eq!(json["risk"], "toxic");
        let back: Neighbor = serde_json::from_value(json).unwrap();
        assert_eq!(back, n);
    }
}
